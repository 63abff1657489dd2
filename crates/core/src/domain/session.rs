use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnRole {
    User,
    Assistant,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: TurnRole,
    pub content: String,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: TurnRole::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: TurnRole::Assistant, content: content.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub turns: VecDeque<Turn>,
    pub created_at: DateTime<Utc>,
    pub last_access: DateTime<Utc>,
}

impl Session {
    pub fn new(id: SessionId, now: DateTime<Utc>) -> Self {
        Self { id, turns: VecDeque::new(), created_at: now, last_access: now }
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Most-recent-last view of the trailing `max_turns` turns.
    pub fn recent(&self, max_turns: usize) -> Vec<Turn> {
        let skip = self.turns.len().saturating_sub(max_turns);
        self.turns.iter().skip(skip).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::{Session, SessionId, Turn};

    #[test]
    fn recent_keeps_most_recent_last() {
        let mut session = Session::new(SessionId::new("s-1"), Utc::now());
        for index in 0..5 {
            session.turns.push_back(Turn::user(format!("turn {index}")));
        }

        let recent = session.recent(2);
        assert_eq!(recent, vec![Turn::user("turn 3"), Turn::user("turn 4")]);
        assert_eq!(session.recent(50).len(), 5);
        assert!(session.recent(0).is_empty());
    }
}
