//! Status management utilities.
//!
//! Projects a cache readiness outcome onto the HarborCluster status and keeps
//! the condition list stable across passes.

use crate::cache::orchestrator::ReadinessStatus;
use crate::crd::{CachePhase, CacheStatus, Condition, HarborClusterStatus};

/// Reason of the Ready condition once the cache is usable.
pub const READY_REASON: &str = "CacheReady";

/// Builder for managing conditions list
pub struct ConditionBuilder {
    conditions: Vec<Condition>,
}

impl ConditionBuilder {
    /// Create a new condition builder
    pub fn new() -> Self {
        Self {
            conditions: Vec::new(),
        }
    }

    /// Start from the conditions currently on the resource
    pub fn from_existing(conditions: &[Condition]) -> Self {
        Self {
            conditions: conditions.to_vec(),
        }
    }

    /// Add or update a condition.
    ///
    /// The transition time of an existing condition is kept when its status
    /// does not change.
    pub fn set(&mut self, mut condition: Condition) -> &mut Self {
        if let Some(existing) = self
            .conditions
            .iter_mut()
            .find(|c| c.r#type == condition.r#type)
        {
            if existing.status == condition.status {
                condition.last_transition_time = existing.last_transition_time.clone();
            }
            *existing = condition;
        } else {
            self.conditions.push(condition);
        }
        self
    }

    /// Set Ready condition
    pub fn ready(
        &mut self,
        ready: bool,
        reason: &str,
        message: &str,
        generation: Option<i64>,
    ) -> &mut Self {
        self.set(Condition::ready(ready, reason, message, generation))
    }

    /// Set Degraded condition
    pub fn degraded(
        &mut self,
        degraded: bool,
        reason: &str,
        message: &str,
        generation: Option<i64>,
    ) -> &mut Self {
        self.set(Condition::degraded(degraded, reason, message, generation))
    }

    /// Build the conditions list
    pub fn build(self) -> Vec<Condition> {
        self.conditions
    }
}

impl Default for ConditionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Check if a condition type is true
pub fn is_condition_true(conditions: &[Condition], condition_type: &str) -> bool {
    conditions
        .iter()
        .find(|c| c.r#type == condition_type)
        .is_some_and(|c| c.status == "True")
}

/// Get the reason for a condition
pub fn get_condition_reason<'a>(
    conditions: &'a [Condition],
    condition_type: &str,
) -> Option<&'a str> {
    conditions
        .iter()
        .find(|c| c.r#type == condition_type)
        .map(|c| c.reason.as_str())
}

/// Phase for a readiness outcome.
pub fn phase_for(outcome: &ReadinessStatus) -> CachePhase {
    match outcome {
        ReadinessStatus::Ready { .. } => CachePhase::Ready,
        ReadinessStatus::NotReady(n) if n.retryable => CachePhase::NotReady,
        ReadinessStatus::NotReady(_) => CachePhase::Failed,
    }
}

/// Build the status written after a pass.
pub fn build_status(
    previous: Option<&HarborClusterStatus>,
    outcome: &ReadinessStatus,
    generation: Option<i64>,
) -> HarborClusterStatus {
    let existing = previous.map(|s| s.conditions.as_slice()).unwrap_or_default();
    let mut conditions = ConditionBuilder::from_existing(existing);

    let cache = match outcome {
        ReadinessStatus::Ready {
            properties,
            endpoint,
        } => {
            let message = format!("{} component secrets published", properties.len());
            conditions
                .ready(true, READY_REASON, &message, generation)
                .degraded(false, READY_REASON, &message, generation);
            CacheStatus {
                ready: true,
                reason: None,
                message,
                endpoint: Some(endpoint.clone()),
                properties: properties.clone(),
            }
        }
        ReadinessStatus::NotReady(n) => {
            let reason = n.reason.as_str();
            conditions
                .ready(false, reason, &n.message, generation)
                .degraded(!n.retryable, reason, &n.message, generation);
            CacheStatus {
                ready: false,
                reason: Some(reason.to_string()),
                message: n.message.clone(),
                endpoint: None,
                properties: Default::default(),
            }
        }
    };

    HarborClusterStatus {
        phase: phase_for(outcome),
        observed_generation: generation,
        conditions: conditions.build(),
        cache: Some(cache),
    }
}
