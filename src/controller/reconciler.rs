//! Reconciliation loop for HarborCluster.
//!
//! Each pass runs the cache readiness check, writes the outcome to status and
//! picks the next requeue interval from the not-ready reason.

use std::sync::Arc;
use std::time::{Duration, Instant};

use kube::{
    Api, ResourceExt,
    api::{Patch, PatchParams},
    runtime::controller::Action,
};
use tracing::{debug, error, info, warn};

use crate::{
    cache::{CacheReadiness, NotReadyReason, ReadinessStatus},
    controller::{
        context::{Context, FIELD_MANAGER},
        error::Error,
        status::build_status,
    },
    crd::{CachePhase, HarborCluster, HarborClusterStatus},
};

/// Requeue interval while the cache is ready.
pub const READY_REQUEUE: Duration = Duration::from_secs(300);

/// Requeue interval after a failure that needs a spec change.
pub const NON_RETRYABLE_REQUEUE: Duration = Duration::from_secs(300);

/// Reconcile a HarborCluster
pub async fn reconcile(obj: Arc<HarborCluster>, ctx: Arc<Context>) -> Result<Action, Error> {
    let start_time = Instant::now();
    let name = obj.name_any();
    let namespace = obj.namespace().unwrap_or_else(|| "default".to_string());

    debug!(name = %name, namespace = %namespace, "Reconciling HarborCluster");

    if obj.metadata.deletion_timestamp.is_some() {
        // Published secrets carry owner references and are garbage collected.
        debug!(name = %name, "HarborCluster is being deleted, skipping");
        if let Some(ref health_state) = ctx.health_state {
            health_state.metrics.forget_cluster(&namespace, &name);
        }
        return Ok(Action::await_change());
    }

    let observed_gen = obj.status.as_ref().and_then(|s| s.observed_generation);
    let current_gen = obj.metadata.generation;
    if observed_gen != current_gen {
        info!(
            name = %name,
            current_gen = ?current_gen,
            observed_gen = ?observed_gen,
            "Spec changed, reconciling"
        );
    }

    let readiness = CacheReadiness::new(ctx.backend(), ctx.connector());
    let outcome = readiness.reconcile(&obj).await;

    let status = build_status(obj.status.as_ref(), &outcome, current_gen);
    publish_transition_event(&obj, &ctx, obj.status.as_ref(), &status).await;

    let api: Api<HarborCluster> = Api::namespaced(ctx.client.clone(), &namespace);
    update_status(&api, &name, &status).await?;

    if let Some(ref health_state) = ctx.health_state {
        let duration = start_time.elapsed().as_secs_f64();
        health_state
            .metrics
            .record_reconcile(&namespace, &name, duration);
        health_state
            .metrics
            .set_cache_ready(&namespace, &name, outcome.is_ready());
        if let Some(reason) = outcome.reason() {
            health_state.metrics.record_not_ready(reason.as_str());
        }
    }

    Ok(Action::requeue(requeue_after(&outcome)))
}

/// Error policy for the controller
pub fn error_policy(obj: Arc<HarborCluster>, error: &Error, ctx: Arc<Context>) -> Action {
    let name = obj.name_any();
    let namespace = obj.namespace().unwrap_or_else(|| "default".to_string());

    if let Some(ref health_state) = ctx.health_state {
        health_state.metrics.record_error(&namespace, &name);
    }

    if error.is_not_found() {
        debug!(name = %name, "Resource not found (likely deleted)");
        return Action::await_change();
    }

    if error.is_retryable() {
        warn!(name = %name, error = %error, "Retryable error, will retry");
    } else {
        error!(name = %name, error = %error, "Non-retryable error");
    }
    Action::requeue(error.requeue_after())
}

/// Next pass interval for a readiness outcome.
pub fn requeue_after(outcome: &ReadinessStatus) -> Duration {
    match outcome {
        ReadinessStatus::Ready { .. } => READY_REQUEUE,
        ReadinessStatus::NotReady(n) if !n.retryable => NON_RETRYABLE_REQUEUE,
        ReadinessStatus::NotReady(n) => match n.reason {
            NotReadyReason::WaitingForDependency => Duration::from_secs(10),
            NotReadyReason::HealthCheckFailed
            | NotReadyReason::CredentialPublishFailed
            | NotReadyReason::InvalidConfig => Duration::from_secs(30),
        },
    }
}

/// Emit an event when the phase or reason changed since the last pass.
async fn publish_transition_event(
    obj: &HarborCluster,
    ctx: &Context,
    previous: Option<&HarborClusterStatus>,
    next: &HarborClusterStatus,
) {
    let previous_phase = previous.map(|s| s.phase).unwrap_or_default();
    let previous_reason = previous
        .and_then(|s| s.cache.as_ref())
        .and_then(|c| c.reason.clone());
    let next_reason = next.cache.as_ref().and_then(|c| c.reason.clone());

    if previous_phase == next.phase && previous_reason == next_reason {
        return;
    }

    let note = next.cache.as_ref().map(|c| c.message.clone());
    if next.phase == CachePhase::Ready {
        ctx.publish_normal_event(obj, "CacheReady", "Reconciling", note)
            .await;
    } else {
        ctx.publish_warning_event(obj, "CacheNotReady", "Reconciling", note)
            .await;
    }
}

/// Update the status of a HarborCluster
async fn update_status(
    api: &Api<HarborCluster>,
    name: &str,
    status: &HarborClusterStatus,
) -> Result<(), Error> {
    let patch = serde_json::json!({
        "status": serde_json::to_value(status)?
    });

    api.patch_status(
        name,
        &PatchParams::apply(FIELD_MANAGER),
        &Patch::Merge(&patch),
    )
    .await?;

    Ok(())
}
