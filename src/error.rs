//! Errors surfaced by the discovery engine.

use thiserror::Error;

use crate::marathon::MarathonError;

#[derive(Debug, Error)]
pub enum ResolverError {
    #[error("no marathon application is labelled for service {0}")]
    ServiceNotFound(String),

    #[error("service name collision: {count} applications match {name}")]
    ServiceNameCollision { name: String, count: usize },

    #[error("no label binds service {name} in application {app_id}")]
    LabelNotFound { name: String, app_id: String },

    #[error("invalid port index in label {label}")]
    InvalidPortIndex { label: String },

    #[error("service {name} is bound by several labels: {}", .labels.join(", "))]
    AmbiguousLabel { name: String, labels: Vec<String> },

    #[error("marathon error: {0}")]
    Upstream(#[from] MarathonError),

    #[error("invalid address {address}: {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("resource is closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, ResolverError>;
