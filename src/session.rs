use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::models::{Location, QueryClassification, QueryType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InputType {
    Text,
    Voice,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationHistoryEntry {
    pub location: Location,
    pub changed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryHistoryEntry {
    pub query: String,
    pub classification: QueryClassification,
    pub input_type: InputType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VoiceInput {
    pub transcript: String,
    pub confidence: f64,
    pub audio_duration: f64,
    pub timestamp: DateTime<Utc>,
}

/// Per-conversation state
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub session_id: String,
    pub current_location: Location,
    pub location_history: Vec<LocationHistoryEntry>,
    pub query_history: Vec<QueryHistoryEntry>,
    pub message_count: u64,
    pub last_context_type: Option<QueryType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_voice_input: Option<VoiceInput>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionStatistics {
    pub total_queries: usize,
    pub query_type_distribution: BTreeMap<&'static str, usize>,
    pub location_changes: usize,
}

impl Session {
    pub fn new(session_id: impl Into<String>, default_location: Location) -> Self {
        Self {
            session_id: session_id.into(),
            current_location: default_location,
            location_history: Vec::new(),
            query_history: Vec::new(),
            message_count: 0,
            last_context_type: None,
            last_voice_input: None,
            created_at: Utc::now(),
        }
    }

    /// Returns true when the location changed; the previous one is archived first
    pub fn apply_location(&mut self, location: Location) -> bool {
        if location == self.current_location {
            return false;
        }
        let previous = std::mem::replace(&mut self.current_location, location);
        self.location_history.push(LocationHistoryEntry {
            location: previous,
            changed_at: Utc::now(),
        });
        true
    }

    pub fn record_query(
        &mut self,
        query: &str,
        classification: &QueryClassification,
        input_type: InputType,
        confidence: Option<f64>,
    ) {
        self.query_history.push(QueryHistoryEntry {
            query: query.to_string(),
            classification: classification.clone(),
            input_type,
            confidence,
            timestamp: Utc::now(),
        });
        self.message_count += 1;
        self.last_context_type = Some(classification.query_type);
    }

    pub fn statistics(&self) -> SessionStatistics {
        let mut query_type_distribution: BTreeMap<&'static str, usize> =
            QueryType::ALL.iter().map(|q| (q.as_str(), 0)).collect();
        for entry in &self.query_history {
            *query_type_distribution
                .entry(entry.classification.query_type.as_str())
                .or_insert(0) += 1;
        }
        SessionStatistics {
            total_queries: self.query_history.len(),
            query_type_distribution,
            location_changes: self.location_history.len(),
        }
    }
}

pub type SharedSession = Arc<Mutex<Session>>;

/// Keyed session storage with explicit lifecycle
pub trait SessionStore: Send + Sync {
    /// Look up `id`, creating a session under it (or a fresh id) when absent
    fn get_or_create(&self, id: Option<&str>) -> (String, SharedSession);

    fn get(&self, id: &str) -> Option<SharedSession>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

struct SessionSlot {
    session: SharedSession,
    last_active: Instant,
}

pub struct InMemorySessionStore {
    sessions: DashMap<String, SessionSlot>,
    ttl: Duration,
    max_sessions: usize,
    default_location: Location,
}

impl InMemorySessionStore {
    pub fn new(ttl: Duration, max_sessions: usize, default_location: Location) -> Self {
        Self {
            sessions: DashMap::new(),
            ttl,
            max_sessions: max_sessions.max(1),
            default_location,
        }
    }

    fn purge_expired(&self) {
        let before = self.sessions.len();
        self.sessions
            .retain(|_, slot| slot.last_active.elapsed() < self.ttl);
        let purged = before.saturating_sub(self.sessions.len());
        if purged > 0 {
            tracing::info!("Purged {} idle sessions", purged);
        }
    }

    fn evict_oldest(&self) {
        let oldest = self
            .sessions
            .iter()
            .min_by_key(|entry| entry.value().last_active)
            .map(|entry| entry.key().clone());
        if let Some(id) = oldest {
            self.sessions.remove(&id);
            tracing::info!("Session store at capacity - evicted {}", id);
        }
    }
}

impl SessionStore for InMemorySessionStore {
    fn get_or_create(&self, id: Option<&str>) -> (String, SharedSession) {
        let id = id.map(str::trim).filter(|s| !s.is_empty());
        if let Some(id) = id {
            if let Some(existing) = self.get(id) {
                return (id.to_string(), existing);
            }
        }

        self.purge_expired();
        while self.sessions.len() >= self.max_sessions {
            self.evict_oldest();
        }

        let session_id = id
            .map(str::to_string)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let fresh = || SessionSlot {
            session: Arc::new(Mutex::new(Session::new(
                session_id.clone(),
                self.default_location.clone(),
            ))),
            last_active: Instant::now(),
        };

        // A concurrent first request for the same id may have created the slot already
        let session = match self.sessions.entry(session_id.clone()) {
            Entry::Occupied(mut slot) if slot.get().last_active.elapsed() < self.ttl => {
                slot.get_mut().last_active = Instant::now();
                slot.get().session.clone()
            }
            Entry::Occupied(mut slot) => {
                slot.insert(fresh());
                tracing::info!("Replaced expired session {}", session_id);
                slot.get().session.clone()
            }
            Entry::Vacant(vacant) => {
                let session = vacant.insert(fresh()).session.clone();
                tracing::info!("Created session {}", session_id);
                session
            }
        };
        (session_id, session)
    }

    fn get(&self, id: &str) -> Option<SharedSession> {
        {
            let mut slot = self.sessions.get_mut(id)?;
            if slot.last_active.elapsed() < self.ttl {
                slot.last_active = Instant::now();
                return Some(slot.session.clone());
            }
        }
        self.sessions.remove(id);
        tracing::info!("Session {} expired", id);
        None
    }

    fn len(&self) -> usize {
        self.sessions.len()
    }
}
