//! Pull-based view over a [`Poller`].
//!
//! The first [`Watcher::next`] call polls once and returns the initial
//! snapshot as a batch of adds.  It then starts a background task that
//! polls on a fixed interval and drops every non-empty batch into a
//! one-item mailbox; later `next` calls wait on that mailbox.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};
use tokio::sync::{mpsc, watch, Mutex};
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::error::{ResolverError, Result};
use crate::poller::Poller;
use crate::types::{EndpointSet, ServiceBinding, Update};

/// Interval between two polls of the orchestrator.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Shortest interval accepted; tokio tickers reject a zero period.
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherState {
    /// Built, `next` never called.
    Constructed,
    Watching,
    Closed,
}

pub struct Watcher {
    poller: Arc<Poller>,
    interval: Duration,
    mailbox: Mutex<Option<mpsc::Receiver<Vec<Update>>>>,
    started: AtomicBool,
    shutdown: watch::Sender<bool>,
}

impl Watcher {
    /// Intervals shorter than one millisecond are raised to it.
    pub fn new(poller: Poller, interval: Duration) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            poller: Arc::new(poller),
            interval: interval.max(MIN_POLL_INTERVAL),
            mailbox: Mutex::new(None),
            started: AtomicBool::new(false),
            shutdown,
        }
    }

    pub fn binding(&self) -> &ServiceBinding {
        self.poller.binding()
    }

    pub fn state(&self) -> WatcherState {
        if *self.shutdown.borrow() {
            WatcherState::Closed
        } else if self.started.load(Ordering::Acquire) {
            WatcherState::Watching
        } else {
            WatcherState::Constructed
        }
    }

    /// Endpoints observed by the last completed poll.
    pub async fn endpoints(&self) -> EndpointSet {
        self.poller.endpoints().await
    }

    /// Waits for the next batch of endpoint changes.
    ///
    /// The first call returns right away with the initial snapshot, which
    /// may be empty.  Every later call blocks until a poll observes a
    /// change.  Returns [`ResolverError::Closed`] once the watcher is
    /// closed, including for a call that was waiting when `close` ran.
    pub async fn next(&self) -> Result<Vec<Update>> {
        let mut closed = self.shutdown.subscribe();
        if *closed.borrow() {
            return Err(ResolverError::Closed);
        }

        let mut mailbox = tokio::select! {
            guard = self.mailbox.lock() => guard,
            _ = closed.wait_for(|c| *c) => return Err(ResolverError::Closed),
        };

        if mailbox.is_none() {
            let initial = tokio::select! {
                updates = self.poller.poll() => updates,
                _ = closed.wait_for(|c| *c) => return Err(ResolverError::Closed),
            };

            let (tx, rx) = mpsc::channel(1);
            tokio::spawn(watch_loop(
                Arc::clone(&self.poller),
                self.interval,
                tx,
                self.shutdown.subscribe(),
            ));
            *mailbox = Some(rx);
            self.started.store(true, Ordering::Release);

            info!(
                "Watching {} port index {}: {} initial updates",
                self.binding().app_id,
                self.binding().port_index,
                initial.len()
            );
            return Ok(initial);
        }

        let rx = mailbox.as_mut().ok_or(ResolverError::Closed)?;
        tokio::select! {
            batch = rx.recv() => batch.ok_or(ResolverError::Closed),
            _ = closed.wait_for(|c| *c) => Err(ResolverError::Closed),
        }
    }

    /// Stops polling.  Safe to call more than once.
    pub fn close(&self) {
        let was_closed = self.shutdown.send_replace(true);
        if !was_closed {
            debug!("Watcher for {} closed", self.binding().app_id);
        }
    }
}

impl Drop for Watcher {
    fn drop(&mut self) {
        self.shutdown.send_replace(true);
    }
}

async fn watch_loop(
    poller: Arc<Poller>,
    period: Duration,
    tx: mpsc::Sender<Vec<Update>>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.wait_for(|c| *c) => break,
        }

        let updates = tokio::select! {
            updates = poller.poll() => updates,
            _ = shutdown.wait_for(|c| *c) => break,
        };
        if updates.is_empty() {
            continue;
        }

        debug!(
            "{} updates for {}: {:?}",
            updates.len(),
            poller.binding().app_id,
            updates
        );

        tokio::select! {
            sent = tx.send(updates) => {
                if sent.is_err() {
                    break;
                }
            }
            _ = shutdown.wait_for(|c| *c) => break,
        }
    }

    debug!("Watch loop for {} stopped", poller.binding().app_id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marathon::{InMemoryMarathon, Task};

    const INTERVAL: Duration = Duration::from_millis(20);

    fn watcher(marathon: &InMemoryMarathon) -> Watcher {
        watcher_with_interval(marathon, INTERVAL)
    }

    fn watcher_with_interval(marathon: &InMemoryMarathon, interval: Duration) -> Watcher {
        let poller = Poller::new(
            Arc::new(marathon.clone()),
            ServiceBinding {
                app_id: "/test".into(),
                port_index: 0,
            },
        );
        Watcher::new(poller, interval)
    }

    #[tokio::test]
    async fn test_state_machine() {
        let marathon = InMemoryMarathon::new();
        let watcher = watcher(&marathon);
        assert_eq!(watcher.state(), WatcherState::Constructed);

        assert!(watcher.next().await.unwrap().is_empty());
        assert_eq!(watcher.state(), WatcherState::Watching);

        watcher.close();
        assert_eq!(watcher.state(), WatcherState::Closed);
        watcher.close();
        assert_eq!(watcher.state(), WatcherState::Closed);
    }

    #[tokio::test]
    async fn test_initial_snapshot_is_returned_immediately() {
        let marathon = InMemoryMarathon::new();
        marathon
            .set_tasks(
                "/test",
                vec![
                    Task::new("/test", "10.0.0.1", vec![80]),
                    Task::new("/test", "10.0.0.2", vec![80]),
                ],
            )
            .await;

        let watcher = watcher(&marathon);
        let updates = watcher.next().await.unwrap();
        assert_eq!(
            updates,
            vec![Update::add("10.0.0.1:80"), Update::add("10.0.0.2:80")]
        );
        assert_eq!(watcher.endpoints().await.len(), 2);
    }

    #[tokio::test]
    async fn test_next_after_close() {
        let marathon = InMemoryMarathon::new();
        let watcher = watcher(&marathon);
        watcher.close();

        assert!(matches!(watcher.next().await, Err(ResolverError::Closed)));
    }

    #[tokio::test]
    async fn test_close_releases_pending_next() {
        let marathon = InMemoryMarathon::new();
        let watcher = Arc::new(watcher(&marathon));
        watcher.next().await.unwrap();

        let pending = tokio::spawn({
            let watcher = Arc::clone(&watcher);
            async move { watcher.next().await }
        });

        time::sleep(INTERVAL * 3).await;
        watcher.close();

        let result = time::timeout(Duration::from_secs(1), pending)
            .await
            .expect("next() should return after close")
            .unwrap();
        assert!(matches!(result, Err(ResolverError::Closed)));
    }

    #[tokio::test]
    async fn test_zero_interval_keeps_watching() {
        let marathon = InMemoryMarathon::new();
        let watcher = watcher_with_interval(&marathon, Duration::ZERO);
        assert!(watcher.next().await.unwrap().is_empty());

        marathon
            .set_tasks("/test", vec![Task::new("/test", "10.0.0.1", vec![80])])
            .await;

        let updates = time::timeout(Duration::from_secs(1), watcher.next())
            .await
            .expect("watch loop should still be running")
            .unwrap();
        assert_eq!(updates, vec![Update::add("10.0.0.1:80")]);
        assert_eq!(watcher.state(), WatcherState::Watching);
    }

    #[tokio::test]
    async fn test_poll_failures_are_not_surfaced() {
        let marathon = InMemoryMarathon::new();
        marathon
            .set_tasks("/test", vec![Task::new("/test", "10.0.0.1", vec![80])])
            .await;

        let watcher = watcher(&marathon);
        assert_eq!(watcher.next().await.unwrap().len(), 1);

        marathon.set_unreachable(true).await;
        time::sleep(INTERVAL * 3).await;
        marathon.set_unreachable(false).await;
        marathon
            .set_tasks("/test", vec![Task::new("/test", "10.0.0.2", vec![80])])
            .await;

        let updates = time::timeout(Duration::from_secs(1), watcher.next())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            updates,
            vec![Update::add("10.0.0.2:80"), Update::delete("10.0.0.1:80")]
        );
    }
}
