//! Marathon resolver daemon entry point.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::signal;

use marathon_resolver::{
    Config, ConnectivityState, Operation, Probe, Resolver, ResolverError, Watcher,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    env_logger::init();

    // Load configuration
    let cfg = Config::load()?;
    if cfg.service_name.is_empty() {
        anyhow::bail!("No service name configured (MARATHON_RESOLVER_SERVICE_NAME)");
    }
    info!(
        "Starting marathon resolver for {} against {}",
        cfg.service_name, cfg.marathon_uri
    );

    let resolver = Resolver::connect(cfg.client_config(), cfg.watch_options()).await?;
    let watcher = Arc::new(resolver.resolve(&cfg.service_name).await?);

    let probe_timeout = cfg.probe_endpoints.then(|| cfg.probe_timeout());
    let follow_handle = tokio::spawn(follow(Arc::clone(&watcher), probe_timeout));

    // Graceful Shutdown
    match signal::ctrl_c().await {
        Ok(()) => {
            info!("Received Ctrl+C, shutting down...");
        }
        Err(err) => {
            error!("Unable to listen for shutdown signal: {}", err);
        }
    }

    watcher.close();
    if let Err(e) = follow_handle.await {
        error!("Watch task failed: {}", e);
    }

    info!("Shutdown complete.");
    Ok(())
}

/// Logs every update batch and keeps one probe per live endpoint.
async fn follow(watcher: Arc<Watcher>, probe_timeout: Option<Duration>) {
    let mut probes: HashMap<String, Arc<Probe>> = HashMap::new();

    loop {
        let updates = match watcher.next().await {
            Ok(updates) => updates,
            Err(ResolverError::Closed) => break,
            Err(e) => {
                error!("Watcher failed: {}", e);
                break;
            }
        };

        for update in updates {
            info!("Endpoint update: {}", update);
            match update.op {
                Operation::Add => {
                    let Some(timeout) = probe_timeout else {
                        continue;
                    };
                    match Probe::new(&update.addr, timeout) {
                        Ok(probe) => {
                            let probe = Arc::new(probe);
                            tokio::spawn(log_states(Arc::clone(&probe), timeout));
                            probes.insert(update.addr, probe);
                        }
                        Err(e) => warn!("Cannot probe {}: {}", update.addr, e),
                    }
                }
                Operation::Delete => {
                    if let Some(probe) = probes.remove(&update.addr) {
                        probe.close();
                    }
                }
            }
        }
    }

    for (_, probe) in probes.drain() {
        probe.close();
    }
}

/// Keeps observing one endpoint until its probe is closed.  Each run
/// starts from Idle again, so only changes of the settled state are
/// logged at info.
async fn log_states(probe: Arc<Probe>, pause: Duration) {
    let mut settled = None;
    probe
        .follow(pause, |state| match state {
            ConnectivityState::Idle | ConnectivityState::Connecting => {
                debug!("Connectivity of {}: {}", probe.address(), state);
            }
            _ if settled != Some(state) => {
                info!("Connectivity of {}: {}", probe.address(), state);
                settled = Some(state);
            }
            _ => {}
        })
        .await;
    debug!("Stopped observing {}", probe.address());
}
