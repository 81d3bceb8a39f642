//! Connectivity probe.
//!
//! A [`Probe`] watches the transport state of a single endpoint and
//! exposes the transitions as a [`Stream`].  It never retries or proxies
//! anything: the [`Transport`] owns the connection, the probe only
//! relays what the transport reports.  Failures are reported as
//! [`ConnectivityState::TransientFailure`], not as errors.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures_util::{Stream, StreamExt};
use log::debug;
use tokio::sync::{mpsc, watch};
use tokio::time;

use crate::error::Result;
use crate::types::ConnectivityState;

pub mod tcp;

pub use tcp::TcpTransport;

/// Something that can report the connectivity of one endpoint.
pub trait Transport: Send + Sync + 'static {
    /// Starts observing and returns the raw feed of state transitions.
    /// The transport stops once the receiver is dropped.
    fn open(&self) -> mpsc::UnboundedReceiver<ConnectivityState>;
}

pub struct Probe {
    address: String,
    timeout: Duration,
    transport: Arc<dyn Transport>,
    shutdown: watch::Sender<bool>,
}

impl Probe {
    /// Probes `address` (`host:port`) over TCP.  `timeout` bounds the wait
    /// for each state transition, connection establishment included.
    pub fn new(address: &str, timeout: Duration) -> Result<Self> {
        let transport = TcpTransport::new(address, connect_timeout_for(timeout))?;
        Ok(Self::with_transport(address, timeout, transport))
    }

    pub fn with_transport(
        address: impl Into<String>,
        timeout: Duration,
        transport: impl Transport,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            address: address.into(),
            timeout,
            transport: Arc::new(transport),
            shutdown,
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Starts a new observation of the endpoint.  Must be called from
    /// within a tokio runtime.  After [`Probe::close`] the returned stream
    /// is already finished.
    pub fn exec(&self) -> ConnectivityStates {
        let (tx, rx) = mpsc::channel(1);
        let shutdown = self.shutdown.subscribe();

        if !*shutdown.borrow() {
            tokio::spawn(relay(
                self.address.clone(),
                self.transport.open(),
                tx,
                self.timeout,
                shutdown,
            ));
        }

        ConnectivityStates { rx }
    }

    /// Runs observations back to back until the probe is closed, handing
    /// every state to `on_state` and waiting `pause` between two runs.
    ///
    /// A single observation ends once the endpoint stays quiet for the
    /// probe timeout, so this is the way to keep watching a live endpoint.
    pub async fn follow<F>(&self, pause: Duration, mut on_state: F)
    where
        F: FnMut(ConnectivityState),
    {
        let mut shutdown = self.shutdown.subscribe();

        while !*shutdown.borrow() {
            let mut states = self.exec();
            while let Some(state) = states.next().await {
                on_state(state);
            }

            tokio::select! {
                _ = time::sleep(pause) => {}
                _ = shutdown.wait_for(|c| *c) => break,
            }
        }
    }

    /// Ends every running observation.  Safe to call more than once.
    pub fn close(&self) {
        if !self.shutdown.send_replace(true) {
            debug!("Probe for {} closed", self.address);
        }
    }

    pub fn is_closed(&self) -> bool {
        *self.shutdown.borrow()
    }
}

impl Drop for Probe {
    fn drop(&mut self) {
        self.shutdown.send_replace(true);
    }
}

/// Connection attempts give up a fifth of the timeout early, so a failed
/// attempt is still reported before the relay stops waiting.
fn connect_timeout_for(timeout: Duration) -> Duration {
    timeout - timeout / 5
}

/// Ordered connectivity states of one [`Probe::exec`] call.
///
/// Ends when the probe is closed, when the transport stops reporting, or
/// when no transition shows up within the probe timeout.
pub struct ConnectivityStates {
    rx: mpsc::Receiver<ConnectivityState>,
}

impl Stream for ConnectivityStates {
    type Item = ConnectivityState;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

async fn relay(
    address: String,
    mut raw: mpsc::UnboundedReceiver<ConnectivityState>,
    tx: mpsc::Sender<ConnectivityState>,
    timeout: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut last = None;

    loop {
        let next = tokio::select! {
            next = time::timeout(timeout, raw.recv()) => next,
            _ = shutdown.wait_for(|c| *c) => break,
        };

        let state = match next {
            Ok(Some(state)) => state,
            Ok(None) => break,
            Err(_) => {
                debug!("No transition for {} within {:?}", address, timeout);
                break;
            }
        };

        if last == Some(state) {
            continue;
        }
        last = Some(state);
        debug!("{} is {}", address, state);

        tokio::select! {
            sent = tx.send(state) => {
                if sent.is_err() {
                    break;
                }
            }
            _ = shutdown.wait_for(|c| *c) => break,
        }
    }
}
