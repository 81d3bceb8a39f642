//! Poll-and-diff over the tasks of one bound application.

use std::sync::Arc;

use log::{debug, warn};
use tokio::sync::Mutex;

use crate::marathon::Marathon;
use crate::types::{EndpointSet, ServiceBinding, Update};

/// Result of asking the orchestrator for the current endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    Observed(EndpointSet),
    /// The orchestrator could not be queried this cycle.
    TransientFailure,
}

pub struct Poller {
    client: Arc<dyn Marathon>,
    binding: ServiceBinding,
    last: Mutex<EndpointSet>,
}

impl Poller {
    pub fn new(client: Arc<dyn Marathon>, binding: ServiceBinding) -> Self {
        Self {
            client,
            binding,
            last: Mutex::new(EndpointSet::new()),
        }
    }

    pub fn binding(&self) -> &ServiceBinding {
        &self.binding
    }

    /// Queries the orchestrator once.  Does not touch the stored set.
    pub async fn cycle(&self) -> CycleOutcome {
        let tasks = match self.client.tasks(&self.binding.app_id).await {
            Ok(tasks) => tasks,
            Err(e) => {
                warn!(
                    "Failed to list tasks of {}: {}. Keeping last known endpoints",
                    self.binding.app_id, e
                );
                return CycleOutcome::TransientFailure;
            }
        };

        let mut endpoints = EndpointSet::new();
        for task in &tasks {
            match task.endpoint(self.binding.port_index) {
                Some(endpoint) => {
                    endpoints.insert(endpoint);
                }
                // Still starting up, ports not bound yet.
                None => debug!(
                    "Task {} of {} exposes {} ports, skipping",
                    task.id,
                    self.binding.app_id,
                    task.ports.len()
                ),
            }
        }

        CycleOutcome::Observed(endpoints)
    }

    /// Computes the changes from the stored set to `latest` and stores
    /// `latest`, in one critical section.
    pub async fn diff(&self, latest: EndpointSet) -> Vec<Update> {
        let mut last = self.last.lock().await;

        let mut updates: Vec<Update> = latest.difference(&last).map(Update::add).collect();
        updates.extend(last.difference(&latest).map(Update::delete));

        *last = latest;
        updates
    }

    /// One cycle followed by a diff.  A failed cycle produces no updates
    /// and leaves the stored set as it was.
    pub async fn poll(&self) -> Vec<Update> {
        match self.cycle().await {
            CycleOutcome::Observed(latest) => self.diff(latest).await,
            CycleOutcome::TransientFailure => Vec::new(),
        }
    }

    /// Snapshot of the endpoints observed by the last completed cycle.
    pub async fn endpoints(&self) -> EndpointSet {
        self.last.lock().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marathon::{InMemoryMarathon, Task};
    use crate::types::Operation;

    fn set(addrs: &[&str]) -> EndpointSet {
        addrs.iter().map(|a| a.to_string()).collect()
    }

    fn poller(marathon: &InMemoryMarathon, port_index: usize) -> Poller {
        Poller::new(
            Arc::new(marathon.clone()),
            ServiceBinding {
                app_id: "/test".into(),
                port_index,
            },
        )
    }

    #[tokio::test]
    async fn test_cycle_picks_bound_port() {
        let marathon = InMemoryMarathon::new();
        marathon
            .set_tasks(
                "/test",
                vec![
                    Task::new("/test", "10.0.0.1", vec![2221, 31001, 2223]),
                    Task::new("/test", "10.0.0.2", vec![2221, 31002]),
                    Task::new("/test", "10.0.0.3", vec![2221]),
                ],
            )
            .await;

        let outcome = poller(&marathon, 1).cycle().await;
        assert_eq!(
            outcome,
            CycleOutcome::Observed(set(&["10.0.0.1:31001", "10.0.0.2:31002"]))
        );
    }

    #[tokio::test]
    async fn test_cycle_does_not_store() {
        let marathon = InMemoryMarathon::new();
        marathon
            .set_tasks("/test", vec![Task::new("/test", "10.0.0.1", vec![80])])
            .await;

        let poller = poller(&marathon, 0);
        poller.cycle().await;
        assert!(poller.endpoints().await.is_empty());
    }

    #[tokio::test]
    async fn test_diff_completeness() {
        let marathon = InMemoryMarathon::new();
        let poller = poller(&marathon, 0);

        poller.diff(set(&["a:1", "b:1", "c:1"])).await;
        let updates = poller.diff(set(&["b:1", "c:1", "d:1", "e:1"])).await;

        let adds: Vec<_> = updates
            .iter()
            .filter(|u| u.op == Operation::Add)
            .map(|u| u.addr.as_str())
            .collect();
        let deletes: Vec<_> = updates
            .iter()
            .filter(|u| u.op == Operation::Delete)
            .map(|u| u.addr.as_str())
            .collect();

        assert_eq!(adds, vec!["d:1", "e:1"]);
        assert_eq!(deletes, vec!["a:1"]);
        assert_eq!(updates.len(), 3);
        assert_eq!(poller.endpoints().await, set(&["b:1", "c:1", "d:1", "e:1"]));
    }

    #[tokio::test]
    async fn test_diff_idempotence() {
        let marathon = InMemoryMarathon::new();
        let poller = poller(&marathon, 0);

        let latest = set(&["a:1", "b:2"]);
        assert_eq!(poller.diff(latest.clone()).await.len(), 2);
        assert!(poller.diff(latest).await.is_empty());
    }

    #[tokio::test]
    async fn test_transient_failure_keeps_last_set() {
        let marathon = InMemoryMarathon::new();
        marathon
            .set_tasks("/test", vec![Task::new("/test", "10.0.0.1", vec![80])])
            .await;

        let poller = poller(&marathon, 0);
        assert_eq!(poller.poll().await, vec![Update::add("10.0.0.1:80")]);

        marathon.set_unreachable(true).await;
        assert_eq!(poller.cycle().await, CycleOutcome::TransientFailure);
        assert!(poller.poll().await.is_empty());
        assert_eq!(poller.endpoints().await, set(&["10.0.0.1:80"]));

        marathon.set_unreachable(false).await;
        assert!(poller.poll().await.is_empty());
    }
}
