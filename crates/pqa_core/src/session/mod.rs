use serde::{Deserialize, Serialize};

use crate::domain::{now_rfc3339_utc, ConversationTurn, Role};

/// Lifecycle of the answer pipeline within one session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    /// No index has been built yet.
    Uninitialized,
    /// An index exists but no pipeline is bound to it.
    NeedsRebuild,
    /// A pipeline is bound to the current index.
    Ready,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineEvent {
    IndexBuilt,
    PipelineBuilt,
}

/// Pure transition function. Pairs that make no sense leave the state unchanged.
pub fn transition(state: PipelineState, event: PipelineEvent) -> PipelineState {
    match (state, event) {
        (_, PipelineEvent::IndexBuilt) => PipelineState::NeedsRebuild,
        (PipelineState::NeedsRebuild, PipelineEvent::PipelineBuilt) => PipelineState::Ready,
        (s, PipelineEvent::PipelineBuilt) => s,
    }
}

/// Append-only, in-memory conversation record.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConversationHistory {
    turns: Vec<ConversationTurn>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append_turn(&mut self, role: Role, content: impl Into<String>) -> &ConversationTurn {
        // A clock formatting failure must not lose the turn.
        let at = now_rfc3339_utc().unwrap_or_default();
        self.turns.push(ConversationTurn {
            role,
            content: content.into(),
            at,
        });
        &self.turns[self.turns.len() - 1]
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }
}
