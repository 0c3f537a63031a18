//! Controller module for harbor-cache-operator.
//!
//! Contains the reconciliation loop, error handling, status management and
//! the Kubernetes-backed collaborators of the cache readiness core.

pub mod context;
pub mod error;
pub mod kube_backend;
pub mod reconciler;
pub mod status;
