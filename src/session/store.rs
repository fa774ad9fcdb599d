//! Session persistence for the command line: the conversation, any open
//! clarification and captured training examples, stored as one JSON file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::engine::{TrainingExample, TurnOutcome};
use crate::error::TanyaError;
use crate::models::clarification::ClarificationSituation;
use crate::session::context::ConversationContext;

/// Default session file name inside the data path.
pub const SESSION_FILE: &str = "session.json";

/// Training examples kept before the oldest are dropped.
const MAX_TRAINING_EXAMPLES: usize = 500;

/// Session state that persists across process restarts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionState {
    pub context: ConversationContext,
    /// Clarification the user has not answered yet.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_clarification: Option<ClarificationSituation>,
    /// Id of the last committed turn.
    pub last_turn_id: u64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub training: Vec<TrainingExample>,
}

impl SessionState {
    /// Record the bookkeeping parts of a committed turn.
    pub fn record(&mut self, outcome: &TurnOutcome) {
        self.last_turn_id = outcome.turn_id;
        if let Some(example) = &outcome.training {
            self.training.push(example.clone());
            if self.training.len() > MAX_TRAINING_EXAMPLES {
                let excess = self.training.len() - MAX_TRAINING_EXAMPLES;
                self.training.drain(..excess);
            }
        }
    }
}

/// Manages session state persistence to disk.
#[derive(Debug)]
pub struct SessionStore {
    path: PathBuf,
    pub state: SessionState,
}

impl SessionStore {
    /// Load session state from disk or create a new default state.
    pub fn load_or_create(path: &Path) -> Result<Self, TanyaError> {
        let state = if path.exists() {
            let json = std::fs::read_to_string(path).map_err(|e| {
                TanyaError::Session(format!("Failed to read session state: {}", e))
            })?;
            serde_json::from_str(&json).map_err(|e| {
                TanyaError::Session(format!("Failed to parse session state: {}", e))
            })?
        } else {
            SessionState::default()
        };
        debug!(path = %path.display(), "Session state loaded");

        Ok(Self {
            path: path.to_path_buf(),
            state,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persist current state to disk.
    pub fn save(&self) -> Result<(), TanyaError> {
        let json = serde_json::to_string_pretty(&self.state).map_err(|e| {
            TanyaError::Session(format!("Failed to serialize session state: {}", e))
        })?;

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                TanyaError::Session(format!("Failed to create session directory: {}", e))
            })?;
        }

        std::fs::write(&self.path, json)
            .map_err(|e| TanyaError::Session(format!("Failed to write session state: {}", e)))?;
        Ok(())
    }

    /// Forget the conversation and any open clarification. Turn numbering and
    /// training examples are kept.
    pub fn clear(&mut self) {
        self.state.context.clear();
        self.state.pending_clarification = None;
    }
}
