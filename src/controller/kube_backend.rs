//! Kubernetes implementations of the cache collaborator contracts.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Pod, Secret};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::api::{ListParams, PostParams};
use kube::{Api, Client, Resource, ResourceExt};
use tracing::{debug, warn};

use crate::cache::backend::{
    CredentialSource, FailoverGroupSource, MemberHealth, SecretStore, WorkloadMember,
    WorkloadRole, WorkloadSource,
};
use crate::cache::error::StoreError;
use crate::crd::RedisFailover;

/// Key of the password entry in cache auth secrets.
pub const PASSWORD_SECRET_KEY: &str = "password";

/// `app.kubernetes.io/part-of` value the redis-operator sets on failover pods.
const FAILOVER_PART_OF: &str = "redis-failover";

/// Control-plane access through the Kubernetes API.
#[derive(Clone)]
pub struct KubeBackend {
    client: Client,
}

impl KubeBackend {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

/// Classify a kube error for the cache core.
pub fn store_error(kind: &str, name: &str, err: kube::Error) -> StoreError {
    match err {
        kube::Error::Api(e) if e.code == 404 => StoreError::not_found(kind, name),
        kube::Error::Api(e) => StoreError::Backend {
            message: format!("{} {}: {}", kind, name, e.message),
            retryable: e.code >= 500 || e.code == 429 || e.code == 409,
        },
        other => StoreError::transient(format!("{} {}: {}", kind, name, other)),
    }
}

/// Label selector for the pods of one failover-group role.
pub fn failover_pod_selector(cluster: &str, role: WorkloadRole) -> String {
    format!(
        "app.kubernetes.io/name={},app.kubernetes.io/component={},app.kubernetes.io/part-of={}",
        cluster,
        role.component_label(),
        FAILOVER_PART_OF
    )
}

/// Health of a pod: healthy when running and ready, unhealthy when failed or
/// explicitly not ready, unknown otherwise.
pub fn pod_health(pod: &Pod) -> MemberHealth {
    let Some(status) = pod.status.as_ref() else {
        return MemberHealth::Unknown;
    };

    if pod.metadata.deletion_timestamp.is_some() {
        return MemberHealth::Unhealthy;
    }

    let ready = status
        .conditions
        .as_ref()
        .and_then(|conds| conds.iter().find(|c| c.type_ == "Ready"))
        .map(|c| c.status.as_str());

    match (status.phase.as_deref(), ready) {
        (Some("Running"), Some("True")) => MemberHealth::Healthy,
        (Some("Failed"), _) | (_, Some("False")) => MemberHealth::Unhealthy,
        _ => MemberHealth::Unknown,
    }
}

#[async_trait]
impl CredentialSource for KubeBackend {
    async fn password(&self, namespace: &str, secret_name: &str) -> Result<String, StoreError> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        let secret = api
            .get(secret_name)
            .await
            .map_err(|e| store_error("Secret", secret_name, e))?;

        let bytes = secret
            .data
            .as_ref()
            .and_then(|data| data.get(PASSWORD_SECRET_KEY))
            .ok_or_else(|| {
                warn!(
                    secret = %secret_name,
                    key = PASSWORD_SECRET_KEY,
                    "Password key not found in secret"
                );
                StoreError::not_found(
                    "Secret key",
                    format!("{}/{}", secret_name, PASSWORD_SECRET_KEY),
                )
            })?;

        String::from_utf8(bytes.0.clone()).map_err(|e| StoreError::Backend {
            message: format!("invalid password encoding in secret {}: {}", secret_name, e),
            retryable: false,
        })
    }
}

#[async_trait]
impl WorkloadSource for KubeBackend {
    async fn members(
        &self,
        namespace: &str,
        cluster: &str,
        role: WorkloadRole,
    ) -> Result<Vec<WorkloadMember>, StoreError> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let selector = failover_pod_selector(cluster, role);

        let pods = api
            .list(&ListParams::default().labels(&selector))
            .await
            .map_err(|e| store_error("Pod", &selector, e))?;

        let members: Vec<WorkloadMember> = pods
            .items
            .iter()
            .map(|pod| WorkloadMember::new(pod.name_any(), pod_health(pod)))
            .collect();

        debug!(role = %role, pods = members.len(), "Listed failover pods");
        Ok(members)
    }
}

#[async_trait]
impl SecretStore for KubeBackend {
    async fn get(&self, name: &str, namespace: &str) -> Result<Secret, StoreError> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        api.get(name).await.map_err(|e| store_error("Secret", name, e))
    }

    async fn create(&self, secret: &Secret) -> Result<(), StoreError> {
        let name = secret.name_any();
        let namespace = secret.namespace().unwrap_or_else(|| "default".to_string());
        let api: Api<Secret> = Api::namespaced(self.client.clone(), &namespace);

        match api.create(&PostParams::default(), secret).await {
            Ok(_) => Ok(()),
            // Lost a race with another writer; the secret exists, which is all we need.
            Err(kube::Error::Api(e)) if e.code == 409 => {
                debug!(secret = %name, "Secret created concurrently");
                Ok(())
            }
            Err(e) => Err(store_error("Secret", &name, e)),
        }
    }
}

#[async_trait]
impl FailoverGroupSource for KubeBackend {
    async fn failover_owner(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<OwnerReference, StoreError> {
        let api: Api<RedisFailover> = Api::namespaced(self.client.clone(), namespace);
        let failover = api
            .get(name)
            .await
            .map_err(|e| store_error("RedisFailover", name, e))?;

        failover
            .controller_owner_ref(&())
            .ok_or_else(|| StoreError::Backend {
                message: format!("RedisFailover {} has no uid", name),
                retryable: false,
            })
    }
}
