//! Entry point of the discovery engine: turns a service name into a
//! [`Watcher`].

use std::sync::Arc;
use std::time::Duration;

use log::info;

use crate::error::Result;
use crate::label::{resolve_binding, DEFAULT_LABEL_PREFIX};
use crate::marathon::{ClientConfig, Marathon, MarathonClient};
use crate::poller::Poller;
use crate::watcher::{Watcher, DEFAULT_POLL_INTERVAL};

/// Tuning knobs shared by every watcher a [`Resolver`] creates.
#[derive(Debug, Clone)]
pub struct WatchOptions {
    pub label_prefix: String,
    pub poll_interval: Duration,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            label_prefix: DEFAULT_LABEL_PREFIX.to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

pub struct Resolver {
    client: Arc<dyn Marathon>,
    options: WatchOptions,
}

impl Resolver {
    /// Connects to Marathon and checks that it answers.
    pub async fn connect(config: ClientConfig, options: WatchOptions) -> Result<Self> {
        let client = MarathonClient::new(config)?;
        client.ping().await?;
        info!("Connected to marathon at {}", client.uri());
        Ok(Self::with_client(Arc::new(client), options))
    }

    /// Uses an already built orchestrator client as is.
    pub fn with_client(client: Arc<dyn Marathon>, options: WatchOptions) -> Self {
        Self { client, options }
    }

    pub fn options(&self) -> &WatchOptions {
        &self.options
    }

    /// Binds `service_name` to one application port and returns a watcher
    /// over its endpoints.  Binding errors are returned as is; no watcher
    /// is created.
    pub async fn resolve(&self, service_name: &str) -> Result<Watcher> {
        let apps = self.client.applications(service_name).await?;
        let binding = resolve_binding(service_name, &self.options.label_prefix, &apps)?;

        info!(
            "Resolved {} to {} port index {}",
            service_name, binding.app_id, binding.port_index
        );

        let poller = Poller::new(Arc::clone(&self.client), binding);
        Ok(Watcher::new(poller, self.options.poll_interval))
    }
}
