use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::{Mutex, RwLock};
use tracing::info;

use skyrchitect_core::config::{AppConfig, MemoryConfig};
use skyrchitect_core::domain::session::{Session, SessionId, Turn};

pub const DEFAULT_HISTORY_TURNS: usize = 10;

/// Bounded per-session conversation history.
///
/// The outer map lock is held only to find or insert a session handle; all
/// reads and writes of a session go through that session's own mutex, so
/// distinct sessions never wait on each other.
pub struct SessionMemoryStore {
    sessions: RwLock<HashMap<SessionId, Arc<Mutex<Session>>>>,
    retention: Duration,
    max_turns: usize,
}

impl SessionMemoryStore {
    pub fn new(retention: Duration, max_turns: usize) -> Self {
        Self { sessions: RwLock::new(HashMap::new()), retention, max_turns: max_turns.max(1) }
    }

    pub fn from_config(config: &MemoryConfig) -> Self {
        Self::new(Duration::days(i64::from(config.retention_days)), config.max_turns_per_session)
    }

    async fn handle(&self, id: &SessionId, now: DateTime<Utc>) -> Arc<Mutex<Session>> {
        if let Some(existing) = self.sessions.read().await.get(id) {
            return Arc::clone(existing);
        }
        let mut sessions = self.sessions.write().await;
        Arc::clone(
            sessions
                .entry(id.clone())
                .or_insert_with(|| Arc::new(Mutex::new(Session::new(id.clone(), now)))),
        )
    }

    /// Runs `update` on the session under its lock.
    ///
    /// A handle evicted between lookup and locking is detached from the map, so
    /// the lookup is retried until the locked handle is the one the map holds.
    async fn with_session<T>(
        &self,
        id: &SessionId,
        now: DateTime<Utc>,
        update: impl FnOnce(&mut Session) -> T,
    ) -> T {
        loop {
            let handle = self.handle(id, now).await;
            let mut session = handle.lock().await;
            if self.is_live(id, &handle).await {
                session.last_access = now;
                return update(&mut session);
            }
        }
    }

    async fn is_live(&self, id: &SessionId, handle: &Arc<Mutex<Session>>) -> bool {
        self.sessions.read().await.get(id).is_some_and(|current| Arc::ptr_eq(current, handle))
    }

    /// Returns the session, creating an empty one when absent.
    pub async fn get(&self, id: &SessionId) -> Session {
        self.get_at(id, Utc::now()).await
    }

    pub async fn get_at(&self, id: &SessionId, now: DateTime<Utc>) -> Session {
        self.with_session(id, now, |session| session.clone()).await
    }

    pub async fn append(&self, id: &SessionId, turn: Turn) {
        self.append_at(id, turn, Utc::now()).await;
    }

    pub async fn append_at(&self, id: &SessionId, turn: Turn, now: DateTime<Utc>) {
        let max_turns = self.max_turns;
        self.with_session(id, now, |session| push_capped(session, [turn], max_turns)).await;
    }

    /// Appends a user turn and its reply as one unit, so concurrent runs on the
    /// same session never interleave their exchanges.
    pub async fn append_exchange(&self, id: &SessionId, user: Turn, assistant: Turn) {
        let max_turns = self.max_turns;
        self.with_session(id, Utc::now(), |session| {
            push_capped(session, [user, assistant], max_turns)
        })
        .await;
    }

    /// Trailing `max_turns` turns, most recent last.
    pub async fn recent(&self, id: &SessionId, max_turns: usize) -> Vec<Turn> {
        self.with_session(id, Utc::now(), |session| session.recent(max_turns)).await
    }

    /// Drops every session idle for longer than the retention window.
    pub async fn evict_stale(&self, now: DateTime<Utc>) -> usize {
        let cutoff = now - self.retention;
        let mut sessions = self.sessions.write().await;
        let mut stale = Vec::new();
        for (id, handle) in sessions.iter() {
            // A session busy in another task is in use, so not stale.
            if let Ok(session) = handle.try_lock() {
                if session.last_access < cutoff {
                    stale.push(id.clone());
                }
            }
        }
        for id in &stale {
            sessions.remove(id);
        }
        if !stale.is_empty() {
            info!(
                event_name = "agent.memory.evicted",
                evicted = stale.len(),
                remaining = sessions.len(),
                "evicted stale sessions"
            );
        }
        stale.len()
    }

    pub async fn clear(&self, id: &SessionId) -> bool {
        self.sessions.write().await.remove(id).is_some()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

fn push_capped<const N: usize>(session: &mut Session, turns: [Turn; N], max_turns: usize) {
    session.turns.extend(turns);
    while session.turns.len() > max_turns {
        session.turns.pop_front();
    }
}

impl Default for SessionMemoryStore {
    fn default() -> Self {
        Self::from_config(&AppConfig::default().memory)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use skyrchitect_core::domain::session::{SessionId, Turn};

    use super::SessionMemoryStore;

    #[tokio::test]
    async fn get_creates_empty_session_on_first_read() {
        let store = SessionMemoryStore::default();
        let session = store.get(&SessionId::new("s-1")).await;
        assert!(session.is_empty());
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn turns_beyond_the_cap_drop_oldest_first() {
        let store = SessionMemoryStore::new(Duration::days(1), 3);
        let id = SessionId::new("s-cap");
        for index in 0..5 {
            store.append(&id, Turn::user(format!("turn {index}"))).await;
        }

        let recent = store.recent(&id, 10).await;
        let contents = recent.iter().map(|turn| turn.content.as_str()).collect::<Vec<_>>();
        assert_eq!(contents, vec!["turn 2", "turn 3", "turn 4"]);
    }

    #[tokio::test]
    async fn eviction_only_touches_idle_sessions() {
        let store = SessionMemoryStore::new(Duration::hours(1), 10);
        let now = Utc::now();
        store.append_at(&SessionId::new("old"), Turn::user("a"), now - Duration::hours(3)).await;
        store.append_at(&SessionId::new("fresh"), Turn::user("b"), now).await;

        assert_eq!(store.evict_stale(now).await, 1);
        assert_eq!(store.len().await, 1);
        assert!(!store.get(&SessionId::new("fresh")).await.is_empty());
    }

    #[tokio::test]
    async fn exchanges_are_capped_as_a_unit() {
        let store = SessionMemoryStore::new(Duration::days(1), 3);
        let id = SessionId::new("s-exchange");
        store.append_exchange(&id, Turn::user("q1"), Turn::assistant("a1")).await;
        store.append_exchange(&id, Turn::user("q2"), Turn::assistant("a2")).await;

        let recent = store.recent(&id, 10).await;
        assert_eq!(recent, vec![Turn::assistant("a1"), Turn::user("q2"), Turn::assistant("a2")]);
    }

    #[tokio::test]
    async fn handle_evicted_before_locking_is_not_written() {
        let store = SessionMemoryStore::new(Duration::hours(1), 10);
        let id = SessionId::new("s-orphan");
        let now = Utc::now();
        let stale = store.handle(&id, now - Duration::hours(3)).await;
        assert!(store.is_live(&id, &stale).await);

        assert_eq!(store.evict_stale(now).await, 1);
        assert!(!store.is_live(&id, &stale).await);

        store.append(&id, Turn::user("late")).await;
        assert!(stale.lock().await.is_empty());
        assert_eq!(store.recent(&id, 10).await, vec![Turn::user("late")]);
        assert_eq!(store.len().await, 1);
    }
}
