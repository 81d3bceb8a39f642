//! Marathon orchestrator access.
//!
//! The discovery engine only needs three calls from the orchestrator, so
//! they are expressed as the [`Marathon`] trait and injected as a trait
//! object.  [`MarathonClient`] talks to a real Marathon over HTTP and
//! [`InMemoryMarathon`] serves tests and local development.

use async_trait::async_trait;
use thiserror::Error;

pub mod application;
pub mod client;
pub mod memory;

pub use application::{Application, IpAddress, PortDefinition, Task};
pub use client::{ClientConfig, MarathonClient};
pub use memory::InMemoryMarathon;

/// Errors raised while talking to the orchestrator.
#[derive(Debug, Error)]
pub enum MarathonError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("marathon returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("invalid marathon uri {uri}: {reason}")]
    InvalidUri { uri: String, reason: String },

    #[error("marathon is unreachable: {0}")]
    Unreachable(String),
}

#[async_trait]
pub trait Marathon: Send + Sync {
    /// Returns an error if the orchestrator cannot be reached.
    async fn ping(&self) -> Result<(), MarathonError>;

    /// Lists the applications matching a label selector.
    async fn applications(&self, label: &str) -> Result<Vec<Application>, MarathonError>;

    /// Lists the running tasks of one application.
    async fn tasks(&self, app_id: &str) -> Result<Vec<Task>, MarathonError>;
}
