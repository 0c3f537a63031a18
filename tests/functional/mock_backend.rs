//! In-memory collaborators for whole-pass tests.
//!
//! `MockBackend` stands in for the Kubernetes API (secrets, failover pods,
//! RedisFailover owner) and `MockConnector` for the cache itself. Both count
//! the calls they receive so tests can assert what a pass did and did not do.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};

use harbor_cache_operator::cache::{
    CacheConnector, CacheHandle, ConnectionDescriptor, CredentialSource, FailoverGroupSource,
    MemberHealth, ProbeError, SecretStore, StoreError, WorkloadMember, WorkloadRole,
    WorkloadSource,
};
use harbor_cache_operator::crd::{
    ComponentKind, ExternalRedisSpec, HarborCluster, HarborClusterSpec, RedisComponent,
    RedisHost, RedisSchema,
};

pub const NAMESPACE: &str = "registry";
pub const CLUSTER: &str = "harbor";

/// Simulated control plane.
#[derive(Default)]
pub struct MockBackend {
    /// Secret name to password.
    passwords: Mutex<HashMap<String, String>>,
    members: Mutex<HashMap<WorkloadRole, Vec<WorkloadMember>>>,
    /// Secrets by name, in the single test namespace.
    secrets: Mutex<BTreeMap<String, Secret>>,
    failover_owner: Mutex<Option<OwnerReference>>,
    /// Secret names whose create fails.
    failing_creates: Mutex<Vec<String>>,
    /// Secret names whose lookup fails with a transient error.
    failing_gets: Mutex<Vec<String>>,
    pub password_calls: AtomicUsize,
    pub member_calls: AtomicUsize,
    pub get_calls: AtomicUsize,
    pub create_calls: AtomicUsize,
    pub owner_calls: AtomicUsize,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_password(self, secret: &str, password: &str) -> Self {
        self.passwords
            .lock()
            .unwrap()
            .insert(secret.to_string(), password.to_string());
        self
    }

    pub fn with_members(self, role: WorkloadRole, health: &[MemberHealth]) -> Self {
        let members = health
            .iter()
            .enumerate()
            .map(|(i, h)| WorkloadMember::new(format!("{}-{}", role, i), *h))
            .collect();
        self.members.lock().unwrap().insert(role, members);
        self
    }

    /// Three healthy sentinels and three healthy servers.
    pub fn with_healthy_failover(self) -> Self {
        self.with_members(WorkloadRole::Coordinator, &[MemberHealth::Healthy; 3])
            .with_members(WorkloadRole::Server, &[MemberHealth::Healthy; 3])
    }

    pub fn with_failover_owner(self) -> Self {
        *self.failover_owner.lock().unwrap() = Some(OwnerReference {
            api_version: "databases.spotahome.com/v1".to_string(),
            kind: "RedisFailover".to_string(),
            name: CLUSTER.to_string(),
            uid: "failover-uid".to_string(),
            controller: Some(true),
            block_owner_deletion: Some(true),
        });
        self
    }

    pub fn with_secret(self, name: &str, key: &str, value: &str) -> Self {
        let mut string_data = BTreeMap::new();
        string_data.insert(key.to_string(), value.to_string());
        let secret = Secret {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(NAMESPACE.to_string()),
                ..Default::default()
            },
            string_data: Some(string_data),
            ..Default::default()
        };
        self.secrets
            .lock()
            .unwrap()
            .insert(name.to_string(), secret);
        self
    }

    pub fn failing_create(self, name: &str) -> Self {
        self.failing_creates.lock().unwrap().push(name.to_string());
        self
    }

    pub fn failing_get(self, name: &str) -> Self {
        self.failing_gets.lock().unwrap().push(name.to_string());
        self
    }

    pub fn secret(&self, name: &str) -> Option<Secret> {
        self.secrets.lock().unwrap().get(name).cloned()
    }

    pub fn secret_names(&self) -> Vec<String> {
        self.secrets.lock().unwrap().keys().cloned().collect()
    }

    /// `redis-url` of a published secret.
    pub fn published_url(&self, name: &str) -> Option<String> {
        self.secret(name)
            .and_then(|s| s.string_data)
            .and_then(|data| data.get("redis-url").cloned())
    }

    /// Total number of control-plane calls received.
    pub fn total_calls(&self) -> usize {
        self.password_calls.load(Ordering::SeqCst)
            + self.member_calls.load(Ordering::SeqCst)
            + self.get_calls.load(Ordering::SeqCst)
            + self.create_calls.load(Ordering::SeqCst)
            + self.owner_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialSource for MockBackend {
    async fn password(&self, _namespace: &str, secret_name: &str) -> Result<String, StoreError> {
        self.password_calls.fetch_add(1, Ordering::SeqCst);
        self.passwords
            .lock()
            .unwrap()
            .get(secret_name)
            .cloned()
            .ok_or_else(|| StoreError::not_found("Secret", secret_name))
    }
}

#[async_trait]
impl WorkloadSource for MockBackend {
    async fn members(
        &self,
        _namespace: &str,
        _cluster: &str,
        role: WorkloadRole,
    ) -> Result<Vec<WorkloadMember>, StoreError> {
        self.member_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .members
            .lock()
            .unwrap()
            .get(&role)
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait]
impl SecretStore for MockBackend {
    async fn get(&self, name: &str, _namespace: &str) -> Result<Secret, StoreError> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_gets.lock().unwrap().iter().any(|n| n == name) {
            return Err(StoreError::transient("apiserver unavailable"));
        }
        self.secret(name)
            .ok_or_else(|| StoreError::not_found("Secret", name))
    }

    async fn create(&self, secret: &Secret) -> Result<(), StoreError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        let name = secret.metadata.name.clone().unwrap_or_default();
        if self.failing_creates.lock().unwrap().contains(&name) {
            return Err(StoreError::transient("admission webhook timed out"));
        }
        self.secrets.lock().unwrap().insert(name, secret.clone());
        Ok(())
    }
}

#[async_trait]
impl FailoverGroupSource for MockBackend {
    async fn failover_owner(
        &self,
        _namespace: &str,
        name: &str,
    ) -> Result<OwnerReference, StoreError> {
        self.owner_calls.fetch_add(1, Ordering::SeqCst);
        self.failover_owner
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| StoreError::not_found("RedisFailover", name))
    }
}

/// Simulated cache: every handle answers PING when `reachable` is set.
#[derive(Default)]
pub struct MockConnector {
    reachable: AtomicBool,
    pub connects: AtomicUsize,
    pub releases: Arc<AtomicUsize>,
    /// Connection URLs seen by `connect`.
    pub urls: Mutex<Vec<String>>,
}

impl MockConnector {
    pub fn reachable() -> Self {
        let connector = Self::default();
        connector.reachable.store(true, Ordering::SeqCst);
        connector
    }

    pub fn unreachable() -> Self {
        Self::default()
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn release_count(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CacheConnector for MockConnector {
    async fn connect(
        &self,
        descriptor: &ConnectionDescriptor,
    ) -> Result<Box<dyn CacheHandle>, ProbeError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        self.urls.lock().unwrap().push(descriptor.connection_url());
        Ok(Box::new(MockHandle {
            reachable: self.reachable.load(Ordering::SeqCst),
            releases: self.releases.clone(),
        }))
    }
}

struct MockHandle {
    reachable: bool,
    releases: Arc<AtomicUsize>,
}

#[async_trait]
impl CacheHandle for MockHandle {
    async fn ping(&self) -> Result<(), ProbeError> {
        if self.reachable {
            Ok(())
        } else {
            Err(ProbeError::Ping("connection refused".to_string()))
        }
    }

    async fn release(self: Box<Self>) {
        self.releases.fetch_add(1, Ordering::SeqCst);
    }
}

fn cluster(redis: RedisComponent) -> HarborCluster {
    let mut cluster = HarborCluster::new(
        CLUSTER,
        HarborClusterSpec {
            redis,
            labels: BTreeMap::new(),
        },
    );
    cluster.metadata.namespace = Some(NAMESPACE.to_string());
    cluster.metadata.uid = Some("cluster-uid".to_string());
    cluster.metadata.generation = Some(1);
    cluster
}

/// HarborCluster using the in-cluster failover group.
pub fn in_cluster() -> HarborCluster {
    cluster(RedisComponent {
        kind: ComponentKind::InCluster,
        spec: None,
    })
}

/// HarborCluster pointing at an external cache.
pub fn external(
    schema: RedisSchema,
    hosts: &[(&str, &str)],
    group_name: &str,
    secret_name: Option<&str>,
) -> HarborCluster {
    cluster(RedisComponent {
        kind: ComponentKind::External,
        spec: Some(ExternalRedisSpec {
            schema,
            hosts: hosts.iter().map(|(h, p)| RedisHost::new(*h, *p)).collect(),
            group_name: group_name.to_string(),
            secret_name: secret_name.map(str::to_string),
        }),
    })
}
