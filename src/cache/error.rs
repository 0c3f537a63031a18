//! Error types for the cache readiness core.
//!
//! Every stage returns its own typed error. The orchestrator folds the first
//! failure of a pass into a [`NotReadyReason`](super::NotReadyReason) and
//! never recovers locally.

use thiserror::Error;

/// Failure reported by an external collaborator (object store, credential
/// lookup, workload query).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The requested object does not exist.
    #[error("{kind} {name} not found")]
    NotFound { kind: String, name: String },

    /// Any other failure talking to the collaborator.
    #[error("{message}")]
    Backend { message: String, retryable: bool },
}

impl StoreError {
    /// Shorthand for a not-found error.
    pub fn not_found(kind: impl Into<String>, name: impl Into<String>) -> Self {
        StoreError::NotFound {
            kind: kind.into(),
            name: name.into(),
        }
    }

    /// Shorthand for a transient backend failure.
    pub fn transient(message: impl Into<String>) -> Self {
        StoreError::Backend {
            message: message.into(),
            retryable: true,
        }
    }

    /// Check if this error indicates a not-found condition
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }

    /// Check if this error should be retried
    pub fn is_retryable(&self) -> bool {
        match self {
            StoreError::NotFound { .. } => true,
            StoreError::Backend { retryable, .. } => *retryable,
        }
    }
}

/// A connection descriptor (or a URL describing one) violates its invariants.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DescriptorError {
    #[error("server schema requires exactly one endpoint, got {0}")]
    ServerEndpointCount(usize),

    #[error("sentinel schema requires at least one endpoint")]
    NoSentinelEndpoints,

    #[error("sentinel schema requires a group name")]
    MissingGroupName,

    #[error("invalid port {0:?}")]
    InvalidPort(String),

    #[error("invalid endpoint host {0:?}")]
    InvalidHost(String),

    #[error("invalid connection url: {0}")]
    InvalidUrl(String),
}

/// Topology resolution failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// The declared cache spec is malformed or inconsistent.
    #[error("{0}")]
    InvalidSpec(String),

    /// The in-cluster coordinator or server pods do not exist yet.
    #[error("pod list is empty (sentinel pods: {coordinators}, redis pods: {servers}), waiting")]
    PodsNotReady { coordinators: usize, servers: usize },

    /// Coordinator pods exist but none of them is healthy.
    #[error("none of the {total} sentinel pods is healthy")]
    NoHealthyCoordinators { total: usize },

    /// Password lookup failed.
    #[error("failed to read password from secret {secret}: {source}")]
    Credential { secret: String, source: StoreError },

    /// Workload status query failed.
    #[error("failed to query {role} pods: {source}")]
    Workload { role: String, source: StoreError },
}

impl ResolveError {
    /// Check if this error should be retried
    pub fn is_retryable(&self) -> bool {
        match self {
            ResolveError::InvalidSpec(_) => false,
            ResolveError::PodsNotReady { .. } | ResolveError::NoHealthyCoordinators { .. } => true,
            ResolveError::Credential { source, .. } | ResolveError::Workload { source, .. } => {
                source.is_retryable()
            }
        }
    }
}

impl From<DescriptorError> for ResolveError {
    fn from(e: DescriptorError) -> Self {
        ResolveError::InvalidSpec(e.to_string())
    }
}

/// Liveness probe failure. Carries the client error text verbatim.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProbeError {
    #[error("failed to build cache client: {0}")]
    Client(String),

    #[error("{0}")]
    Ping(String),
}

/// Credential publication failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PublishError {
    /// The owner of the credential objects could not be resolved.
    #[error("failed to resolve credential owner: {0}")]
    Owner(String),

    /// Looking up the existing secret failed for a reason other than not-found.
    #[error("failed to get secret {name}: {source}")]
    Lookup { name: String, source: StoreError },

    /// Creating the secret failed.
    #[error("failed to create secret {name}: {source}")]
    Create { name: String, source: StoreError },
}

impl PublishError {
    /// Check if this error should be retried
    pub fn is_retryable(&self) -> bool {
        match self {
            PublishError::Owner(_) => false,
            PublishError::Lookup { source, .. } | PublishError::Create { source, .. } => {
                source.is_retryable()
            }
        }
    }
}
