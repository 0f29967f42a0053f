//! The NLU adapter interface (spec §6 "NLU adapter contract") — the only
//! coupling to the understanding layer, which is out of scope (spec §1).

use crate::command::Command;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// `dialogue_context` passed to the adapter alongside the raw message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DialogueContext {
    pub current_slots: HashMap<String, Value>,
    pub available_flows: Vec<String>,
    pub current_flow: Option<String>,
    pub waiting_for_slot: Option<String>,
    pub recent_commands: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryMessage {
    pub role: String,
    pub content: String,
}

/// NLU adapter input (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NluInput {
    pub user_message: String,
    pub conversation_history: Vec<HistoryMessage>,
    pub dialogue_context: DialogueContext,
    /// Passed to the adapter on every call but excluded from cache keys
    /// per §9's Open Question resolution.
    pub now: f64,
}

/// NLU adapter output (spec §6). Must never be considered absent; adapters
/// return an empty `commands` vec rather than a null/None.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NluOutput {
    pub commands: Vec<Command>,
    #[serde(default)]
    pub entities: Vec<Value>,
    pub confidence: f64,
    pub reasoning: String,
}

impl NluOutput {
    pub fn empty(reasoning: impl Into<String>) -> Self {
        Self {
            commands: Vec::new(),
            entities: Vec::new(),
            confidence: 0.0,
            reasoning: reasoning.into(),
        }
    }
}

/// The capability interface the `understand` node calls through (spec §4.6).
#[async_trait]
pub trait NluAdapter: Send + Sync {
    async fn predict(&self, input: NluInput) -> crate::error::Result<NluOutput>;
}

/// Build the cache key for an `NluInput`, excluding `now` per §9's Open
/// Question resolution ("this spec excludes datetime from cache keys while
/// still passing it to the adapter").
pub fn cache_key(input: &NluInput) -> String {
    let keyed = serde_json::json!({
        "user_message": input.user_message,
        "conversation_history": input.conversation_history,
        "dialogue_context": input.dialogue_context,
    });
    keyed.to_string()
}
