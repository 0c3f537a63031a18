//! Unit tests for harbor-cache-operator.
//!
//! These tests run without a Kubernetes cluster and test individual
//! components in isolation.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]

mod crd_tests {
    use harbor_cache_operator::crd::{
        CachePhase, ComponentKind, Condition, HarborCluster, HarborClusterSpec, RedisSchema,
    };
    use kube::CustomResourceExt;

    #[test]
    fn test_phase_default() {
        assert_eq!(CachePhase::default(), CachePhase::Pending);
    }

    #[test]
    fn test_kind_defaults_to_in_cluster() {
        let spec: HarborClusterSpec = serde_json::from_value(serde_json::json!({
            "redis": {}
        }))
        .unwrap();
        assert_eq!(spec.redis.kind, ComponentKind::InCluster);
        assert!(spec.redis.spec.is_none());
        assert!(spec.labels.is_empty());
    }

    #[test]
    fn test_external_server_spec() {
        let spec: HarborClusterSpec = serde_json::from_value(serde_json::json!({
            "redis": {
                "kind": "external",
                "spec": {
                    "hosts": [{"host": "cache.example.com", "port": "6379"}]
                }
            },
            "labels": {"team": "registry"}
        }))
        .unwrap();

        assert_eq!(spec.redis.kind, ComponentKind::External);
        let external = spec.redis.spec.unwrap();
        assert_eq!(external.schema, RedisSchema::Redis);
        assert_eq!(external.hosts[0].host, "cache.example.com");
        assert_eq!(external.secret_name, None);
        assert_eq!(spec.labels["team"], "registry");
    }

    #[test]
    fn test_condition_ready() {
        let condition =
            Condition::ready(true, "CacheReady", "4 component secrets published", Some(1));
        assert_eq!(condition.r#type, "Ready");
        assert_eq!(condition.status, "True");
        assert_eq!(condition.reason, "CacheReady");
        assert_eq!(condition.observed_generation, Some(1));
    }

    #[test]
    fn test_condition_degraded() {
        let condition = Condition::degraded(true, "InvalidConfig", "bad hosts", None);
        assert_eq!(condition.r#type, "Degraded");
        assert_eq!(condition.status, "True");
    }

    #[test]
    fn test_crd_generation() {
        let crd = HarborCluster::crd();
        assert_eq!(crd.spec.group, "goharbor.io");
        assert_eq!(crd.spec.names.kind, "HarborCluster");
        assert_eq!(crd.spec.names.plural, "harborclusters");
        assert_eq!(crd.spec.scope, "Namespaced");
    }
}

mod component_tests {
    use harbor_cache_operator::cache::{CONSUMER_COMPONENTS, ConsumerComponent};

    #[test]
    fn test_component_secret_names() {
        let names: Vec<String> = CONSUMER_COMPONENTS.iter().map(|c| c.secret_name()).collect();
        assert_eq!(
            names,
            vec![
                "chartmuseum-redis",
                "clair-redis",
                "jobservice-redis",
                "registry-redis"
            ]
        );
    }

    #[test]
    fn test_component_property_names() {
        assert_eq!(
            ConsumerComponent::CHART_MUSEUM.property_name(),
            "chartMuseumSecret"
        );
        assert_eq!(ConsumerComponent::JOB_SERVICE.property_name(), "jobServiceSecret");
    }
}

mod status_tests {
    use std::collections::BTreeMap;

    use harbor_cache_operator::cache::{NotReady, NotReadyReason, ReadinessStatus};
    use harbor_cache_operator::controller::status::{
        READY_REASON, build_status, get_condition_reason, is_condition_true,
    };
    use harbor_cache_operator::crd::CachePhase;

    #[test]
    fn test_not_ready_then_ready() {
        let waiting = ReadinessStatus::NotReady(NotReady {
            reason: NotReadyReason::HealthCheckFailed,
            message: "connection refused".to_string(),
            retryable: true,
        });
        let first = build_status(None, &waiting, Some(1));
        assert_eq!(first.phase, CachePhase::NotReady);
        assert_eq!(
            get_condition_reason(&first.conditions, "Ready"),
            Some("HealthCheckFailed")
        );

        let ready = ReadinessStatus::Ready {
            properties: BTreeMap::new(),
            endpoint: "redis://cache:6379".to_string(),
        };
        let second = build_status(Some(&first), &ready, Some(1));
        assert_eq!(second.phase, CachePhase::Ready);
        assert_eq!(second.conditions.len(), 2);
        assert!(is_condition_true(&second.conditions, "Ready"));
        assert_eq!(
            get_condition_reason(&second.conditions, "Ready"),
            Some(READY_REASON)
        );
        assert_eq!(second.cache.unwrap().reason, None);
    }

    #[test]
    fn test_non_retryable_marks_degraded() {
        let invalid = ReadinessStatus::NotReady(NotReady {
            reason: NotReadyReason::InvalidConfig,
            message: ".redis.spec.hosts is invalid".to_string(),
            retryable: false,
        });
        let status = build_status(None, &invalid, Some(2));
        assert_eq!(status.phase, CachePhase::Failed);
        assert!(is_condition_true(&status.conditions, "Degraded"));
    }
}

mod config_tests {
    use std::time::Duration;

    use harbor_cache_operator::OperatorConfig;

    #[test]
    fn test_from_lookup_partial() {
        let cfg = OperatorConfig::from_lookup(|key| match key {
            "WATCH_NAMESPACE" => Some("harbor".to_string()),
            "CACHE_COMMAND_TIMEOUT_SECS" => Some("7".to_string()),
            _ => None,
        });
        assert_eq!(cfg.watch_namespace.as_deref(), Some("harbor"));
        assert_eq!(cfg.command_timeout, Duration::from_secs(7));
        assert_eq!(cfg.connect_timeout, Duration::from_secs(10));
        assert_eq!(cfg.health_port, 8080);
        assert_eq!(cfg.pod_namespace, "default");
    }
}

mod backend_tests {
    use harbor_cache_operator::cache::{StoreError, WorkloadRole};
    use harbor_cache_operator::controller::kube_backend::{failover_pod_selector, store_error};

    #[test]
    fn test_server_selector() {
        assert!(failover_pod_selector("harbor", WorkloadRole::Server)
            .contains("app.kubernetes.io/component=redis"));
    }

    #[test]
    fn test_not_found_classification() {
        let err = kube::Error::Api(kube::error::ErrorResponse {
            status: "Failure".to_string(),
            message: "secrets \"harbor\" not found".to_string(),
            reason: "NotFound".to_string(),
            code: 404,
        });
        let store = store_error("Secret", "harbor", err);
        assert!(store.is_not_found());
        assert!(matches!(store, StoreError::NotFound { .. }));
    }

    #[test]
    fn test_forbidden_is_not_retryable() {
        let err = kube::Error::Api(kube::error::ErrorResponse {
            status: "Failure".to_string(),
            message: "forbidden".to_string(),
            reason: "Forbidden".to_string(),
            code: 403,
        });
        assert!(!store_error("Secret", "harbor", err).is_retryable());
    }
}

mod watch_tests {
    use std::collections::BTreeMap;

    use harbor_cache_operator::cluster_for_secret;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    fn secret_meta(labels: &[(&str, &str)]) -> ObjectMeta {
        ObjectMeta {
            name: Some("clair-redis".to_string()),
            namespace: Some("registry".to_string()),
            labels: Some(
                labels
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect::<BTreeMap<_, _>>(),
            ),
            ..Default::default()
        }
    }

    #[test]
    fn test_managed_secret_maps_to_cluster() {
        let meta = secret_meta(&[
            ("app.kubernetes.io/managed-by", "harbor-cache-operator"),
            ("app.kubernetes.io/instance", "harbor"),
        ]);
        let cluster = cluster_for_secret(&meta).unwrap();
        assert_eq!(cluster.name, "harbor");
        assert_eq!(cluster.namespace.as_deref(), Some("registry"));
    }

    #[test]
    fn test_foreign_secret_is_ignored() {
        let meta = secret_meta(&[("app.kubernetes.io/instance", "harbor")]);
        assert!(cluster_for_secret(&meta).is_none());

        let meta = secret_meta(&[("app.kubernetes.io/managed-by", "harbor-cache-operator")]);
        assert!(cluster_for_secret(&meta).is_none());
    }
}

mod error_tests {
    use harbor_cache_operator::controller::error::Error;

    #[test]
    fn test_error_is_retryable() {
        let kube_err = Error::Kube(kube::Error::Api(kube::error::ErrorResponse {
            status: "Failure".to_string(),
            message: "timeout".to_string(),
            reason: "Timeout".to_string(),
            code: 504,
        }));
        assert!(kube_err.is_retryable());

        let not_found = Error::Kube(kube::Error::Api(kube::error::ErrorResponse {
            status: "Failure".to_string(),
            message: "not found".to_string(),
            reason: "NotFound".to_string(),
            code: 404,
        }));
        assert!(not_found.is_not_found());
        assert!(!not_found.is_retryable());
    }
}
