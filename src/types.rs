//! Data structures shared by the discovery engine.
//!
//! Endpoints are plain `host:port` strings: their identity is the string
//! itself and they are recomputed from the orchestrator on every poll
//! cycle.  [`Update`] values are the only thing a watcher hands back to
//! its caller.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A `host:port` address of one service instance.
pub type Endpoint = String;

/// The endpoints observed by one poll cycle.
///
/// Kept ordered so that update batches come out in a stable order.
pub type EndpointSet = BTreeSet<Endpoint>;

/// Kind of change carried by an [`Update`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    /// The address appeared since the previous cycle.
    Add,
    /// The address is no longer reported by the orchestrator.
    Delete,
}

/// One change to the observed endpoint set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Update {
    pub op: Operation,
    pub addr: Endpoint,
}

impl Update {
    pub fn add(addr: impl Into<Endpoint>) -> Self {
        Self {
            op: Operation::Add,
            addr: addr.into(),
        }
    }

    pub fn delete(addr: impl Into<Endpoint>) -> Self {
        Self {
            op: Operation::Delete,
            addr: addr.into(),
        }
    }
}

impl fmt::Display for Update {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.op {
            Operation::Add => write!(f, "+{}", self.addr),
            Operation::Delete => write!(f, "-{}", self.addr),
        }
    }
}

/// The resolved identity of a logical service name.
///
/// `port_index` is a zero-based index into each task's port list.  The
/// binding is by index, not by port value: if the application's ports are
/// reshuffled a new watcher has to be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceBinding {
    pub app_id: String,
    pub port_index: usize,
}

/// Live transport state of a single endpoint, as seen by a probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectivityState {
    Idle,
    Connecting,
    Ready,
    TransientFailure,
    Shutdown,
}

impl fmt::Display for ConnectivityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectivityState::Idle => "IDLE",
            ConnectivityState::Connecting => "CONNECTING",
            ConnectivityState::Ready => "READY",
            ConnectivityState::TransientFailure => "TRANSIENT_FAILURE",
            ConnectivityState::Shutdown => "SHUTDOWN",
        };
        f.write_str(s)
    }
}
