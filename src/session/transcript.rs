use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

impl Role {
    /// Speaker label shown to people
    pub fn display_name(&self) -> &'static str {
        match self {
            Role::User => "You",
            Role::Model => "Gemini",
        }
    }
}

/// A committed turn of the conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptTurn {
    pub role: Role,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

/// Collects transcript fragments per role until a turn boundary
#[derive(Debug, Default)]
pub struct TranscriptAggregator {
    pending_user: String,
    pending_model: String,
    log: Vec<TranscriptTurn>,
}

impl TranscriptAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append_user(&mut self, fragment: &str) {
        self.pending_user.push_str(fragment);
    }

    pub fn append_model(&mut self, fragment: &str) {
        self.pending_model.push_str(fragment);
    }

    /// Commit both accumulators as two turns, user first, even when empty.
    pub fn complete_turn(&mut self) -> [TranscriptTurn; 2] {
        let timestamp = Utc::now();
        let turns = [
            TranscriptTurn {
                role: Role::User,
                text: std::mem::take(&mut self.pending_user),
                timestamp,
            },
            TranscriptTurn {
                role: Role::Model,
                text: std::mem::take(&mut self.pending_model),
                timestamp,
            },
        ];
        self.log.extend(turns.iter().cloned());
        debug!("Turn committed ({} entries in log)", self.log.len());
        turns
    }

    pub fn pending_user(&self) -> &str {
        &self.pending_user
    }

    pub fn pending_model(&self) -> &str {
        &self.pending_model
    }

    pub fn clear_pending(&mut self) {
        self.pending_user.clear();
        self.pending_model.clear();
    }

    pub fn log(&self) -> &[TranscriptTurn] {
        &self.log
    }

    pub fn clear(&mut self) {
        self.clear_pending();
        self.log.clear();
    }
}
