//! Conversation memory.
//!
//! Reads a session's prior turns from the history store and hands them to
//! the generator as question/answer pairs, oldest first.

use std::sync::Arc;

use tracing::debug;

use docqa_core::error::Result;
use docqa_core::traits::HistoryStore;
use docqa_core::types::{ConversationTurn, HistoryPair};

/// Assembles and records conversation history.
#[derive(Clone)]
pub struct ConversationMemory {
    history: Arc<dyn HistoryStore>,
    /// Most recent turns to keep. 0 keeps every turn.
    max_turns: usize,
}

impl ConversationMemory {
    pub fn new(history: Arc<dyn HistoryStore>, max_turns: usize) -> Self {
        Self { history, max_turns }
    }

    pub fn max_turns(&self) -> usize {
        self.max_turns
    }

    /// Prior exchanges for a session, oldest first.
    pub fn assemble(&self, session_id: &str, user_id: &str) -> Result<Vec<HistoryPair>> {
        let turns = self.history.turns(session_id, user_id)?;
        let skip = if self.max_turns == 0 {
            0
        } else {
            turns.len().saturating_sub(self.max_turns)
        };
        let pairs: Vec<HistoryPair> = turns.iter().skip(skip).map(HistoryPair::from).collect();
        debug!(session_id, turns = turns.len(), kept = pairs.len(), "Memory assembled");
        Ok(pairs)
    }

    /// Persist a finished turn.
    pub fn record(&self, turn: &ConversationTurn) -> Result<()> {
        self.history.append(turn)
    }

    pub fn history(&self) -> &Arc<dyn HistoryStore> {
        &self.history
    }
}
