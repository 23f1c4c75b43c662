use crate::config::AppConfig;
use crate::dataset::Dataset;
use crate::dispatch::QueryDispatcher;
use crate::wizard::{Command, Wizard, WizardEvent};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// Sessions idle longer than this are dropped the next time one is minted.
const SESSION_IDLE_HOURS: i64 = 24;

/// Per-client session: the wizard plus the dataset it gates on. Sessions are
/// isolated from each other; the dataset is the only thing a retry prompt
/// shares with the prompt before it.
#[derive(Debug)]
pub struct Session {
    pub wizard: Wizard,
    pub dataset: Option<Dataset>,
    pub last_seen: chrono::DateTime<chrono::Utc>,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            wizard: Wizard::new(),
            dataset: None,
            last_seen: chrono::Utc::now(),
        }
    }
}

/// Shared application state for the web server.
pub struct AppState {
    pub config: AppConfig,
    pub dispatcher: QueryDispatcher,
    pub sessions: RwLock<HashMap<String, Session>>,
    pub startup_time: chrono::DateTime<chrono::Utc>,
}

impl AppState {
    pub fn new(config: AppConfig, dispatcher: QueryDispatcher) -> Self {
        Self {
            config,
            dispatcher,
            sessions: RwLock::new(HashMap::new()),
            startup_time: chrono::Utc::now(),
        }
    }

    /// Mints a fresh session with the wizard at the upload step. Abandoned
    /// sessions are swept here so the map stays bounded by active clients.
    pub async fn create_session(&self) -> String {
        let session_id = Uuid::new_v4().to_string();
        let cutoff = chrono::Utc::now() - chrono::Duration::hours(SESSION_IDLE_HOURS);
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| session.last_seen > cutoff);
        if sessions.len() < before {
            debug!("Evicted {} idle session(s)", before - sessions.len());
        }
        sessions.insert(session_id.clone(), Session::default());
        debug!("Created session {}", session_id);
        session_id
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Stores a dataset in the session, replacing any prior one, and tells
    /// the wizard about it.
    pub async fn store_dataset(&self, session_id: &str, dataset: Dataset) -> Option<Wizard> {
        let mut sessions = self.sessions.write().await;
        let session = sessions.get_mut(session_id)?;
        session.dataset = Some(dataset);
        session.last_seen = chrono::Utc::now();
        session.wizard.apply(WizardEvent::DatasetLoaded);
        Some(session.wizard.clone())
    }

    /// Applies wizard events and returns the resulting view plus any emitted
    /// commands for the caller to execute.
    pub async fn apply_events(
        &self,
        session_id: &str,
        events: Vec<WizardEvent>,
    ) -> Option<(Wizard, Vec<Command>)> {
        let mut sessions = self.sessions.write().await;
        let session = sessions.get_mut(session_id)?;
        session.last_seen = chrono::Utc::now();
        let mut commands = Vec::new();
        for event in events {
            commands.extend(session.wizard.apply(event));
        }
        Some((session.wizard.clone(), commands))
    }

    pub async fn wizard_snapshot(&self, session_id: &str) -> Option<Wizard> {
        let sessions = self.sessions.read().await;
        sessions.get(session_id).map(|s| s.wizard.clone())
    }

    pub async fn dataset_snapshot(&self, session_id: &str) -> Option<Option<Dataset>> {
        let sessions = self.sessions.read().await;
        sessions.get(session_id).map(|s| s.dataset.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::QueryDispatcher;
    use crate::llm::{ChartGenerator, ChartOutput, LlmError, TabularAgent};
    use async_trait::async_trait;

    struct NullChart;

    #[async_trait]
    impl ChartGenerator for NullChart {
        async fn generate(&self, _: &Dataset, _: &str) -> Result<ChartOutput, LlmError> {
            Err(LlmError::ConfigError("unused".to_string()))
        }
    }

    struct NullAgent;

    #[async_trait]
    impl TabularAgent for NullAgent {
        async fn answer(&self, _: &Dataset, _: &str) -> Result<String, LlmError> {
            Err(LlmError::ConfigError("unused".to_string()))
        }
    }

    fn state() -> AppState {
        AppState::new(
            AppConfig::default(),
            QueryDispatcher::new(Box::new(NullChart), Box::new(NullAgent)),
        )
    }

    #[tokio::test]
    async fn sessions_are_isolated() {
        let state = state();
        let first = state.create_session().await;
        let second = state.create_session().await;
        assert_ne!(first, second);

        let dataset = Dataset::from_csv(b"a\n1\n").unwrap();
        state.store_dataset(&first, dataset).await.unwrap();

        assert!(state.dataset_snapshot(&first).await.unwrap().is_some());
        assert!(state.dataset_snapshot(&second).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unknown_session_yields_none() {
        let state = state();
        assert!(state.wizard_snapshot("missing").await.is_none());
        assert!(
            state
                .apply_events("missing", vec![WizardEvent::Next])
                .await
                .is_none()
        );
    }

    #[tokio::test]
    async fn idle_sessions_are_evicted_when_a_new_one_is_minted() {
        let state = state();
        let stale = state.create_session().await;
        {
            let mut sessions = state.sessions.write().await;
            sessions.get_mut(&stale).unwrap().last_seen =
                chrono::Utc::now() - chrono::Duration::hours(48);
        }

        let fresh = state.create_session().await;
        assert!(state.wizard_snapshot(&stale).await.is_none());
        assert!(state.wizard_snapshot(&fresh).await.is_some());
    }

    #[tokio::test]
    async fn activity_refreshes_the_idle_clock() {
        let state = state();
        let id = state.create_session().await;
        {
            let mut sessions = state.sessions.write().await;
            sessions.get_mut(&id).unwrap().last_seen =
                chrono::Utc::now() - chrono::Duration::hours(48);
        }

        let dataset = Dataset::from_csv(b"a\n1\n").unwrap();
        state.store_dataset(&id, dataset).await.unwrap();
        state.create_session().await;
        assert!(state.wizard_snapshot(&id).await.is_some());
    }

    #[tokio::test]
    async fn new_upload_replaces_prior_dataset() {
        let state = state();
        let id = state.create_session().await;

        let first = Dataset::from_csv(b"a\n1\n").unwrap();
        state.store_dataset(&id, first).await.unwrap();
        let second = Dataset::from_csv(b"x,y\n1,2\n").unwrap();
        state.store_dataset(&id, second.clone()).await.unwrap();

        let stored = state.dataset_snapshot(&id).await.unwrap().unwrap();
        assert_eq!(stored, second);
    }
}
