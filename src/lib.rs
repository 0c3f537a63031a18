//! harbor-cache-operator library crate
//!
//! This module exports the cache readiness core, the HarborCluster
//! controller, CRD definitions and the health server.

pub mod cache;
pub mod config;
pub mod controller;
pub mod crd;
pub mod health;

pub use config::OperatorConfig;
pub use health::HealthState;

use std::sync::Arc;

use futures::{Stream, StreamExt};
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::runtime::reflector::ObjectRef;
use kube::runtime::watcher::Config as WatcherConfig;
use kube::runtime::{Controller, WatchStreamExt, metadata_watcher, predicates, reflector, watcher};
use kube::core::PartialObjectMeta;
use kube::{Api, Client, Resource};
use serde::de::DeserializeOwned;
use tracing::{debug, error, info};

use cache::publisher::{INSTANCE_LABEL, MANAGED_BY, MANAGED_BY_LABEL};
use controller::{context::Context, reconciler::reconcile};
use crd::HarborCluster;

/// Create namespaced or cluster-wide API based on scope
pub fn scoped_api<T>(client: Client, namespace: Option<&str>) -> Api<T>
where
    T: Resource<Scope = k8s_openapi::NamespaceResourceScope>,
    <T as Resource>::DynamicType: Default,
    T: Clone + DeserializeOwned + std::fmt::Debug,
{
    match namespace {
        Some(ns) => Api::namespaced(client, ns),
        None => Api::all(client),
    }
}

fn default_watcher_config() -> WatcherConfig {
    WatcherConfig::default().any_semantic()
}

/// Create a reflector-backed stream that retries with backoff and drops
/// status-only updates.
fn create_filtered_stream<K>(
    api: Api<K>,
    watcher_config: WatcherConfig,
) -> (
    reflector::Store<K>,
    impl Stream<Item = Result<K, watcher::Error>>,
)
where
    K: Resource + Clone + DeserializeOwned + std::fmt::Debug + Send + 'static,
    K::DynamicType: Default + Eq + std::hash::Hash + Clone,
{
    let (reader, writer) = reflector::store();
    let stream = reflector(writer, watcher(api, watcher_config))
        .default_backoff()
        .applied_objects()
        .predicate_filter(predicates::generation);
    (reader, stream)
}

/// HarborCluster a managed component secret was published for.
///
/// In-cluster secrets are owned by the RedisFailover, so the instance label
/// leads back to the cluster instead of the owner reference.
pub fn cluster_for_secret(meta: &ObjectMeta) -> Option<ObjectRef<HarborCluster>> {
    let labels = meta.labels.as_ref()?;
    if labels.get(MANAGED_BY_LABEL).map(String::as_str) != Some(MANAGED_BY) {
        return None;
    }
    let instance = labels.get(INSTANCE_LABEL)?;
    let namespace = meta.namespace.as_deref()?;
    Some(ObjectRef::new(instance).within(namespace))
}

/// Run the HarborCluster controller.
///
/// Scope comes from `config.watch_namespace`. If health_state is provided,
/// metrics are recorded for reconciliations.
pub async fn run_controller(
    client: Client,
    config: OperatorConfig,
    health_state: Option<Arc<HealthState>>,
) {
    let namespace = config.watch_namespace.clone();
    run_controller_scoped(client, config, health_state, namespace.as_deref()).await
}

/// Run the HarborCluster controller with optional namespace scoping.
///
/// When `namespace` is `Some(ns)`, only watches resources in that namespace.
/// When `namespace` is `None`, watches resources cluster-wide.
pub async fn run_controller_scoped(
    client: Client,
    config: OperatorConfig,
    health_state: Option<Arc<HealthState>>,
    namespace: Option<&str>,
) {
    let scope_msg = namespace.unwrap_or("cluster-wide");
    info!(
        "Starting controller for HarborCluster resources (scope: {})",
        scope_msg
    );

    if let Some(ref state) = health_state {
        state.set_ready(true).await;
    }

    let metrics_state = health_state.clone();
    let ctx = Arc::new(Context::new(client.clone(), config, health_state));

    let clusters: Api<HarborCluster> = scoped_api(client.clone(), namespace);
    let secrets: Api<Secret> = scoped_api(client.clone(), namespace);

    let watcher_config = default_watcher_config();
    let (reader, cluster_stream) = create_filtered_stream(clusters, watcher_config.clone());

    // Component secrets are only checked for existence, so metadata is enough.
    let secret_config = watcher_config.labels(&format!("{MANAGED_BY_LABEL}={MANAGED_BY}"));
    let secret_stream = metadata_watcher(secrets, secret_config).touched_objects();

    Controller::for_stream(cluster_stream, reader)
        .watches_stream(secret_stream, |secret: PartialObjectMeta<Secret>| {
            cluster_for_secret(&secret.metadata)
        })
        .run(reconcile, controller::reconciler::error_policy, ctx)
        .for_each(|result| {
            let metrics_state = metrics_state.clone();
            async move {
                match result {
                    Ok((obj, _action)) => {
                        debug!("Reconciled: {}", obj.name);
                    }
                    Err(e) => {
                        let is_not_found = match &e {
                            kube::runtime::controller::Error::ObjectNotFound(obj_ref) => {
                                if let (Some(state), Some(ns)) =
                                    (&metrics_state, &obj_ref.namespace)
                                {
                                    state.metrics.forget_cluster(ns, &obj_ref.name);
                                }
                                true
                            }
                            kube::runtime::controller::Error::ReconcilerFailed(err, _) => {
                                err.is_not_found()
                            }
                            _ => false,
                        };
                        if is_not_found {
                            debug!("Object no longer exists (likely deleted): {:?}", e);
                        } else {
                            error!("Reconciliation error: {:?}", e);
                        }
                    }
                }
            }
        })
        .await;

    error!("Controller stream ended unexpectedly");
}
