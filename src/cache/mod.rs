//! Cache readiness core.
//!
//! Determines whether the Redis cache of a HarborCluster is usable and
//! publishes one connection Secret per Harbor component once it is.
//!
//! ## Architecture
//!
//! - `connection`: connection descriptor, URL rendering/parsing, `fred` config
//! - `topology`: external endpoint validation and in-cluster sentinel discovery
//! - `readiness`: scoped PING probe
//! - `publisher`: get-or-create of component secrets
//! - `orchestrator`: sequences one pass into a [`ReadinessStatus`]
//! - `backend`: contracts for the control-plane collaborators
//!
//! ## Example
//!
//! ```rust,ignore
//! use harbor_cache_operator::cache::{CacheReadiness, FredConnector};
//!
//! let readiness = CacheReadiness::new(backend, FredConnector::default());
//! match readiness.reconcile(&cluster).await {
//!     ReadinessStatus::Ready { properties, .. } => println!("{properties:?}"),
//!     ReadinessStatus::NotReady(n) => println!("{}: {}", n.reason, n.message),
//! }
//! ```

pub mod backend;
pub mod components;
pub mod connection;
pub mod error;
pub mod orchestrator;
pub mod publisher;
pub mod readiness;
pub mod topology;

pub use backend::{
    CacheBackend, CredentialSource, FailoverGroupSource, MemberHealth, SecretStore,
    WorkloadMember, WorkloadRole, WorkloadSource,
};
pub use components::{CONSUMER_COMPONENTS, ConsumerComponent};
pub use connection::{ConnectionDescriptor, Schema};
pub use error::{DescriptorError, ProbeError, PublishError, ResolveError, StoreError};
pub use orchestrator::{CacheReadiness, NotReady, NotReadyReason, ReadinessStatus};
pub use publisher::{CredentialOwner, CredentialPublisher};
pub use readiness::{CacheConnector, CacheHandle, FredConnector, check};
pub use topology::{CacheTarget, CacheTopology, ExternalCache, TopologyResolver};
