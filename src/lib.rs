//! Service discovery for Marathon-managed applications.
//!
//! A logical service name is bound to a Marathon application and port
//! index through a label `RESOLVER_<index>_NAME=<service name>`.  The
//! [`Resolver`] performs that binding once and hands back a [`Watcher`]
//! that reports endpoint additions and deletions as tasks come and go.
//!
//! ```rust,ignore
//! use marathon_resolver::{ClientConfig, Resolver, WatchOptions};
//!
//! let resolver = Resolver::connect(
//!     ClientConfig::new("http://marathon.mesos:8080"),
//!     WatchOptions::default(),
//! )
//! .await?;
//!
//! let watcher = resolver.resolve("billing-grpc").await?;
//! loop {
//!     for update in watcher.next().await? {
//!         println!("{}", update);
//!     }
//! }
//! ```
//!
//! A [`Probe`] can additionally be attached to any discovered address to
//! follow its connectivity state.

pub mod config;
pub mod error;
pub mod label;
pub mod marathon;
pub mod poller;
pub mod probe;
pub mod resolver;
pub mod types;
pub mod watcher;

pub use config::Config;
pub use error::{ResolverError, Result};
pub use marathon::{ClientConfig, InMemoryMarathon, Marathon, MarathonClient, MarathonError};
pub use probe::{ConnectivityStates, Probe, TcpTransport, Transport};
pub use resolver::{Resolver, WatchOptions};
pub use types::{ConnectivityState, Endpoint, EndpointSet, Operation, ServiceBinding, Update};
pub use watcher::{Watcher, WatcherState};
