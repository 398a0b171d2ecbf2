use consim_llm::ProviderConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

pub const SESSION_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    Counselor,
    Client,
}

impl Speaker {
    pub fn label(&self) -> &'static str {
        match self {
            Speaker::Counselor => "Counselor",
            Speaker::Client => "Client",
        }
    }
}

/// One committed conversation turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub speaker: Speaker,
    pub dialogue: String,
}

impl Turn {
    pub fn counselor(dialogue: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::Counselor,
            dialogue: dialogue.into(),
        }
    }

    pub fn client(dialogue: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::Client,
            dialogue: dialogue.into(),
        }
    }
}

/// Mutable traversal state for one stage within one user session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionState {
    pub schema_version: u32,
    pub current_node_id: String,
    pub last_counselor_message: String,
    pub history: Vec<Turn>,
}

impl SessionState {
    pub fn new(current_node_id: impl Into<String>) -> Self {
        Self {
            schema_version: SESSION_SCHEMA_VERSION,
            current_node_id: current_node_id.into(),
            last_counselor_message: String::new(),
            history: Vec::new(),
        }
    }
}

/// Everything stored for one session id: per-stage traversal states, the
/// stage most recently started, and an optional session-supplied provider
/// configuration that overrides the process default.
#[derive(Debug, Default)]
pub struct SessionData {
    pub active_stage: Option<String>,
    pub stages: HashMap<String, SessionState>,
    pub provider_override: Option<ProviderConfig>,
}

/// In-memory store of per-session payloads.
///
/// Each session's data sits behind its own async mutex, so operations on
/// the same session serialize (no lost read-modify-write on history or the
/// node pointer) while distinct sessions proceed concurrently. Session
/// identity and expiry belong to the HTTP layer's session collaborator;
/// this store only manages the payloads.
#[derive(Default)]
pub struct SessionStore {
    inner: RwLock<HashMap<String, Arc<Mutex<SessionData>>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle for `session_id`, created empty on first use.
    pub async fn entry(&self, session_id: &str) -> Arc<Mutex<SessionData>> {
        {
            let map = self.inner.read().await;
            if let Some(entry) = map.get(session_id) {
                return Arc::clone(entry);
            }
        }

        let mut map = self.inner.write().await;
        Arc::clone(
            map.entry(session_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(SessionData::default()))),
        )
    }

    /// Handle for `session_id` if it already exists.
    pub async fn get(&self, session_id: &str) -> Option<Arc<Mutex<SessionData>>> {
        self.inner.read().await.get(session_id).map(Arc::clone)
    }

    pub async fn list_stages(&self, session_id: &str) -> Vec<String> {
        match self.get(session_id).await {
            Some(entry) => {
                let data = entry.lock().await;
                let mut stages: Vec<String> = data.stages.keys().cloned().collect();
                stages.sort();
                stages
            }
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn entry_creates_once() {
        let store = SessionStore::new();
        let a = store.entry("s1").await;
        let b = store.entry("s1").await;
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn get_does_not_create() {
        let store = SessionStore::new();
        assert!(store.get("missing").await.is_none());
    }

    #[tokio::test]
    async fn list_stages_sorted() {
        let store = SessionStore::new();
        let entry = store.entry("s1").await;
        {
            let mut data = entry.lock().await;
            data.stages.insert("M2".to_string(), SessionState::new("M2-01"));
            data.stages.insert("M1".to_string(), SessionState::new("M1-01"));
        }
        assert_eq!(store.list_stages("s1").await, vec!["M1", "M2"]);
        assert!(store.list_stages("s2").await.is_empty());
    }

    #[test]
    fn turn_serde_shape() {
        let turn = Turn::counselor("hi");
        let json = serde_json::to_string(&turn).unwrap();
        assert_eq!(json, r#"{"speaker":"counselor","dialogue":"hi"}"#);
    }

    #[test]
    fn new_state_shape() {
        let state = SessionState::new("M1-01");
        assert_eq!(state.schema_version, SESSION_SCHEMA_VERSION);
        assert_eq!(state.current_node_id, "M1-01");
        assert!(state.last_counselor_message.is_empty());
        assert!(state.history.is_empty());
    }
}
