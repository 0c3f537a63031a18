//! Custom Resource Definitions used by harbor-cache-operator.
//!
//! - `HarborCluster`: declares the cache a Harbor installation uses (owned here)
//! - `RedisFailover`: in-cluster sentinel deployment (read-only, owner of secrets)

mod harbor_cluster;
mod redis_failover;

pub use harbor_cluster::*;
pub use redis_failover::*;
