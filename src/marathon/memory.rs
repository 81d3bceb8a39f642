//! In-memory orchestrator (for testing)

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{Application, Marathon, MarathonError, Task};

#[derive(Default)]
struct State {
    apps: Vec<Application>,
    tasks: HashMap<String, Vec<Task>>,
    unreachable: bool,
}

/// In-memory orchestrator (for testing/development)
#[derive(Clone, Default)]
pub struct InMemoryMarathon {
    state: Arc<RwLock<State>>,
}

impl InMemoryMarathon {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_application(&self, app: Application) {
        self.state.write().await.apps.push(app);
    }

    /// Replaces the task list of an application.
    pub async fn set_tasks(&self, app_id: &str, tasks: Vec<Task>) {
        self.state
            .write()
            .await
            .tasks
            .insert(app_id.to_string(), tasks);
    }

    pub async fn clear_tasks(&self, app_id: &str) {
        self.state.write().await.tasks.remove(app_id);
    }

    /// Makes every call fail as if the orchestrator were down.
    pub async fn set_unreachable(&self, unreachable: bool) {
        self.state.write().await.unreachable = unreachable;
    }
}

#[async_trait]
impl Marathon for InMemoryMarathon {
    async fn ping(&self) -> Result<(), MarathonError> {
        if self.state.read().await.unreachable {
            return Err(MarathonError::Unreachable("in-memory marathon is down".into()));
        }
        Ok(())
    }

    async fn applications(&self, label: &str) -> Result<Vec<Application>, MarathonError> {
        let state = self.state.read().await;
        if state.unreachable {
            return Err(MarathonError::Unreachable("in-memory marathon is down".into()));
        }

        Ok(state
            .apps
            .iter()
            .filter(|app| app.labels.iter().any(|(k, v)| k == label || v == label))
            .cloned()
            .collect())
    }

    async fn tasks(&self, app_id: &str) -> Result<Vec<Task>, MarathonError> {
        let state = self.state.read().await;
        if state.unreachable {
            return Err(MarathonError::Unreachable("in-memory marathon is down".into()));
        }
        Ok(state.tasks.get(app_id).cloned().unwrap_or_default())
    }
}
