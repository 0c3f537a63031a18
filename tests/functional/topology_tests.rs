//! Resolution of external and in-cluster caches through a full pass.

use harbor_cache_operator::cache::{
    CacheReadiness, MemberHealth, NotReadyReason, ReadinessStatus, WorkloadRole,
};
use harbor_cache_operator::crd::RedisSchema;

use crate::mock_backend::*;

#[tokio::test]
async fn test_external_server_ready() {
    let backend = MockBackend::new().with_password("cache-auth", "s3cret");
    let readiness = CacheReadiness::new(backend, MockConnector::reachable());
    let cluster = external(
        RedisSchema::Redis,
        &[("cache.example.com", "6379")],
        "",
        Some("cache-auth"),
    );

    let status = readiness.reconcile(&cluster).await;

    let ReadinessStatus::Ready {
        properties,
        endpoint,
    } = status
    else {
        panic!("expected Ready");
    };
    assert_eq!(endpoint, "redis://:****@cache.example.com:6379");
    assert_eq!(properties.len(), 4);
    assert_eq!(properties["chartMuseumSecret"], "chartmuseum-redis");
    assert_eq!(properties["clairSecret"], "clair-redis");
    assert_eq!(properties["jobServiceSecret"], "jobservice-redis");
    assert_eq!(properties["registrySecret"], "registry-redis");

    let backend = readiness.backend();
    assert_eq!(
        backend.published_url("registry-redis").as_deref(),
        Some("redis://:s3cret@cache.example.com:6379")
    );

    let owner = backend
        .secret("clair-redis")
        .unwrap()
        .metadata
        .owner_references
        .unwrap();
    assert_eq!(owner[0].kind, "HarborCluster");
    assert_eq!(owner[0].uid, "cluster-uid");
    assert_eq!(owner[0].controller, Some(true));
}

#[tokio::test]
async fn test_external_sentinel_without_password() {
    let readiness = CacheReadiness::new(MockBackend::new(), MockConnector::reachable());
    let cluster = external(
        RedisSchema::Sentinel,
        &[("s0", "26379"), ("s1", "26379"), ("s2", "26379")],
        "mymaster",
        None,
    );

    let status = readiness.reconcile(&cluster).await;
    assert!(status.is_ready(), "{status:?}");

    let expected = "redis+sentinel://s0:26379,s1:26379,s2:26379/mymaster";
    assert_eq!(
        readiness.connector().urls.lock().unwrap().as_slice(),
        [expected.to_string()]
    );
    assert_eq!(
        readiness.backend().published_url("jobservice-redis").as_deref(),
        Some(expected)
    );
    assert_eq!(
        readiness
            .backend()
            .password_calls
            .load(std::sync::atomic::Ordering::SeqCst),
        0
    );
}

#[tokio::test]
async fn test_external_sentinel_last_port_wins() {
    let readiness = CacheReadiness::new(MockBackend::new(), MockConnector::reachable());
    let cluster = external(
        RedisSchema::Sentinel,
        &[("s0", "26379"), ("s1", "26380")],
        "mymaster",
        None,
    );

    assert!(readiness.reconcile(&cluster).await.is_ready());
    assert_eq!(
        readiness.backend().published_url("clair-redis").as_deref(),
        Some("redis+sentinel://s0:26380,s1:26380/mymaster")
    );
}

#[tokio::test]
async fn test_server_with_two_hosts_is_invalid_config() {
    let readiness = CacheReadiness::new(MockBackend::new(), MockConnector::reachable());
    let cluster = external(
        RedisSchema::Redis,
        &[("a", "6379"), ("b", "6379")],
        "",
        Some("cache-auth"),
    );

    let status = readiness.reconcile(&cluster).await;
    let ReadinessStatus::NotReady(n) = status else {
        panic!("expected NotReady");
    };
    assert_eq!(n.reason, NotReadyReason::InvalidConfig);
    assert!(!n.retryable);
    assert!(n.message.contains(".redis.spec.hosts"));

    assert_eq!(readiness.backend().total_calls(), 0);
    assert_eq!(readiness.connector().connect_count(), 0);
}

#[tokio::test]
async fn test_sentinel_without_group_is_invalid_config() {
    let readiness = CacheReadiness::new(MockBackend::new(), MockConnector::reachable());
    let cluster = external(RedisSchema::Sentinel, &[("s0", "26379")], "", None);

    let status = readiness.reconcile(&cluster).await;
    assert_eq!(status.reason(), Some(NotReadyReason::InvalidConfig));
    assert_eq!(readiness.backend().total_calls(), 0);
}

#[tokio::test]
async fn test_external_missing_password_secret_waits() {
    let readiness = CacheReadiness::new(MockBackend::new(), MockConnector::reachable());
    let cluster = external(
        RedisSchema::Redis,
        &[("cache", "6379")],
        "",
        Some("cache-auth"),
    );

    let status = readiness.reconcile(&cluster).await;
    assert_eq!(status.reason(), Some(NotReadyReason::WaitingForDependency));
    assert_eq!(readiness.connector().connect_count(), 0);
}

#[tokio::test]
async fn test_in_cluster_ready() {
    let backend = MockBackend::new()
        .with_password(CLUSTER, "pw")
        .with_healthy_failover()
        .with_failover_owner();
    let readiness = CacheReadiness::new(backend, MockConnector::reachable());

    let status = readiness.reconcile(&in_cluster()).await;
    let ReadinessStatus::Ready { endpoint, .. } = status else {
        panic!("expected Ready");
    };
    assert_eq!(
        endpoint,
        "redis+sentinel://:****@rfs-harbor.registry.svc:26379/mymaster"
    );

    let backend = readiness.backend();
    assert_eq!(
        backend.published_url("chartmuseum-redis").as_deref(),
        Some("redis+sentinel://:pw@rfs-harbor.registry.svc:26379/mymaster")
    );
    let owner = backend
        .secret("chartmuseum-redis")
        .unwrap()
        .metadata
        .owner_references
        .unwrap();
    assert_eq!(owner[0].kind, "RedisFailover");
    assert_eq!(owner[0].uid, "failover-uid");
}

#[tokio::test]
async fn test_in_cluster_without_pods_waits() {
    let backend = MockBackend::new()
        .with_password(CLUSTER, "pw")
        .with_members(WorkloadRole::Coordinator, &[MemberHealth::Healthy; 3])
        .with_failover_owner();
    let readiness = CacheReadiness::new(backend, MockConnector::reachable());

    let status = readiness.reconcile(&in_cluster()).await;
    let ReadinessStatus::NotReady(n) = status else {
        panic!("expected NotReady");
    };
    assert_eq!(n.reason, NotReadyReason::WaitingForDependency);
    assert!(n.retryable);

    assert_eq!(readiness.connector().connect_count(), 0);
    assert!(readiness.backend().secret_names().is_empty());
}

#[tokio::test]
async fn test_in_cluster_unhealthy_sentinels_wait() {
    let backend = MockBackend::new()
        .with_password(CLUSTER, "pw")
        .with_members(
            WorkloadRole::Coordinator,
            &[MemberHealth::Unhealthy, MemberHealth::Unknown],
        )
        .with_members(WorkloadRole::Server, &[MemberHealth::Healthy])
        .with_failover_owner();
    let readiness = CacheReadiness::new(backend, MockConnector::reachable());

    let status = readiness.reconcile(&in_cluster()).await;
    assert_eq!(status.reason(), Some(NotReadyReason::WaitingForDependency));
    assert_eq!(readiness.connector().connect_count(), 0);
}

#[tokio::test]
async fn test_in_cluster_one_healthy_sentinel_is_enough() {
    let backend = MockBackend::new()
        .with_password(CLUSTER, "pw")
        .with_members(
            WorkloadRole::Coordinator,
            &[MemberHealth::Unhealthy, MemberHealth::Healthy],
        )
        .with_members(WorkloadRole::Server, &[MemberHealth::Unknown])
        .with_failover_owner();
    let readiness = CacheReadiness::new(backend, MockConnector::reachable());

    assert!(readiness.reconcile(&in_cluster()).await.is_ready());
}

#[tokio::test]
async fn test_in_cluster_missing_password_waits() {
    let backend = MockBackend::new()
        .with_healthy_failover()
        .with_failover_owner();
    let readiness = CacheReadiness::new(backend, MockConnector::reachable());

    let status = readiness.reconcile(&in_cluster()).await;
    let ReadinessStatus::NotReady(n) = status else {
        panic!("expected NotReady");
    };
    assert_eq!(n.reason, NotReadyReason::WaitingForDependency);
    assert!(n.message.contains("harbor"));
}
