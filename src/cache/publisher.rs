//! Per-component credential publication.
//!
//! Every Harbor component gets a Secret holding the cache URL. Publication
//! is get-or-create: an existing Secret is never modified, so a pass that
//! stopped half way simply continues on the next run.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use tracing::{debug, info, instrument};

use super::backend::SecretStore;
use super::components::ConsumerComponent;
use super::connection::ConnectionDescriptor;
use super::error::PublishError;

/// Secret data key holding the connection URL.
pub const URL_SECRET_KEY: &str = "redis-url";

/// Label carrying the Harbor component a secret belongs to.
pub const COMPONENT_LABEL: &str = "goharbor.io/component";

/// Label naming the HarborCluster a secret was published for.
pub const INSTANCE_LABEL: &str = "app.kubernetes.io/instance";

/// Label marking secrets managed by this operator.
pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";

pub const MANAGED_BY: &str = "harbor-cache-operator";

/// Owner attached to every published secret.
#[derive(Clone, Debug, PartialEq)]
pub struct CredentialOwner {
    /// Namespace secrets are created in.
    pub namespace: String,
    /// HarborCluster name, used for the instance label.
    pub instance: String,
    /// Controller reference to the HarborCluster or RedisFailover.
    pub reference: OwnerReference,
    /// Extra labels declared on the HarborCluster.
    pub labels: BTreeMap<String, String>,
}

/// Labels applied to every published secret.
pub fn standard_labels(
    owner: &CredentialOwner,
    component: &ConsumerComponent,
) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    labels.insert(MANAGED_BY_LABEL.to_string(), MANAGED_BY.to_string());
    labels.insert(INSTANCE_LABEL.to_string(), owner.instance.clone());
    labels.insert(COMPONENT_LABEL.to_string(), component.name().to_string());

    for (key, value) in &owner.labels {
        labels.entry(key.clone()).or_insert_with(|| value.clone());
    }

    labels
}

/// Build the credential Secret for `component`.
pub fn generate_component_secret(
    component: &ConsumerComponent,
    descriptor: &ConnectionDescriptor,
    owner: &CredentialOwner,
) -> Secret {
    let mut string_data = BTreeMap::new();
    string_data.insert(URL_SECRET_KEY.to_string(), descriptor.connection_url());

    Secret {
        metadata: ObjectMeta {
            name: Some(component.secret_name()),
            namespace: Some(owner.namespace.clone()),
            labels: Some(standard_labels(owner, component)),
            owner_references: Some(vec![owner.reference.clone()]),
            ..Default::default()
        },
        type_: Some("Opaque".to_string()),
        string_data: Some(string_data),
        ..Default::default()
    }
}

/// Publishes component secrets through a [`SecretStore`].
pub struct CredentialPublisher<'a, S: ?Sized> {
    store: &'a S,
}

impl<'a, S> CredentialPublisher<'a, S>
where
    S: SecretStore + ?Sized,
{
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Ensure the secret for `component` exists and return its name.
    #[instrument(skip_all, fields(component = %component, namespace = %owner.namespace))]
    pub async fn publish(
        &self,
        component: &ConsumerComponent,
        descriptor: &ConnectionDescriptor,
        owner: &CredentialOwner,
    ) -> Result<String, PublishError> {
        let name = component.secret_name();

        match self.store.get(&name, &owner.namespace).await {
            Ok(_) => {
                debug!(secret = %name, "Component secret already exists");
                Ok(name)
            }
            Err(e) if e.is_not_found() => {
                let secret = generate_component_secret(component, descriptor, owner);
                info!(secret = %name, "Creating Harbor component secret");
                self.store
                    .create(&secret)
                    .await
                    .map_err(|source| PublishError::Create {
                        name: name.clone(),
                        source,
                    })?;
                Ok(name)
            }
            Err(source) => Err(PublishError::Lookup { name, source }),
        }
    }
}
