//! The dialogue state model (spec §3).
//!
//! `DialogueState` is the single serialized unit per session, organized into
//! semantically-scoped groups the way the teacher's `Envelope` composes
//! `Identity` / `Pipeline` / `Bounds` / `InterruptState` / `Execution` / `Audit`
//! sub-structs rather than one flat bag of fields.

mod flow_context;

pub use flow_context::{FlowContext, FlowState};

use crate::error::{Error, Result};
use crate::ids::FlowId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// `conversation_state` (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConversationState {
    #[default]
    Idle,
    Understanding,
    WaitingForSlot,
    ValidatingSlot,
    ExecutingAction,
    Confirming,
    Completed,
    Error,
}

/// A single chat turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub timestamp: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

/// One entry in the bounded audit log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEvent {
    pub event: String,
    #[serde(default)]
    pub data: HashMap<String, Value>,
    pub timestamp: f64,
}

impl TraceEvent {
    pub fn new(event: impl Into<String>, timestamp: f64) -> Self {
        Self {
            event: event.into(),
            data: HashMap::new(),
            timestamp,
        }
    }

    pub fn with_data(mut self, key: impl Into<String>, value: Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }

    /// `{event: error, kind, where}` per spec §7.
    pub fn error(kind: &str, location: &str, timestamp: f64) -> Self {
        Self::new("error", timestamp)
            .with_data("kind", Value::String(kind.to_string()))
            .with_data("where", Value::String(location.to_string()))
    }
}

/// One entry in the bounded command log (spec §4.4 point 3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandLogEntry {
    pub command_type: String,
    pub args: Value,
    pub result_status: String,
    pub timestamp: f64,
}

/// `metadata` reserved keys (spec §3), kept as typed fields instead of a raw
/// map so callers cannot typo a reserved key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Metadata {
    #[serde(default)]
    pub completed_flows: Vec<FlowContext>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub queued_messages: Vec<String>,
    /// Free-form extension map for fields outside the reserved set.
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

/// The single serialized unit per session (spec §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialogueState {
    pub user_message: String,
    pub last_response: String,
    pub messages: Vec<Message>,
    pub flow_stack: Vec<FlowContext>,
    pub flow_slots: HashMap<String, HashMap<String, Value>>,
    pub conversation_state: ConversationState,
    pub current_step: Option<String>,
    pub waiting_for_slot: Option<String>,
    pub nlu_result: Option<Value>,
    pub last_nlu_call: Option<f64>,
    pub digression_depth: u32,
    pub last_digression_type: Option<String>,
    /// Consecutive `DenyConfirmation`s since the last `AffirmConfirmation`,
    /// checked against `confirmation.max_retries` (spec §4.5).
    pub confirmation_retries: u32,
    /// Set while `CONFIRMING` represents "confirm the pending cancellation"
    /// rather than a flow's own `Confirm` step, so `AffirmConfirmation`/
    /// `DenyConfirmation` know which thing they're resolving.
    pub pending_cancellation: bool,
    pub turn_count: u64,
    pub trace: Vec<TraceEvent>,
    pub command_log: Vec<CommandLogEntry>,
    pub metadata: Metadata,
}

impl Default for DialogueState {
    fn default() -> Self {
        Self {
            user_message: String::new(),
            last_response: String::new(),
            messages: Vec::new(),
            flow_stack: Vec::new(),
            flow_slots: HashMap::new(),
            conversation_state: ConversationState::Idle,
            current_step: None,
            waiting_for_slot: None,
            nlu_result: None,
            last_nlu_call: None,
            digression_depth: 0,
            last_digression_type: None,
            confirmation_retries: 0,
            pending_cancellation: false,
            turn_count: 0,
            trace: Vec::new(),
            command_log: Vec::new(),
            metadata: Metadata::default(),
        }
    }
}

impl DialogueState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Top of `flow_stack`, or `None` if empty.
    pub fn active_flow(&self) -> Option<&FlowContext> {
        self.flow_stack.last()
    }

    pub fn active_flow_mut(&mut self) -> Option<&mut FlowContext> {
        self.flow_stack.last_mut()
    }

    /// Slot map for a given flow instance id.
    pub fn slots_for(&self, flow_id: &str) -> Option<&HashMap<String, Value>> {
        self.flow_slots.get(flow_id)
    }

    /// Check the invariants of spec §3. Returns the first violated invariant
    /// as an error; used by tests and by the runtime before every save.
    pub fn check_invariants(&self, max_stack_depth: usize) -> Result<()> {
        // Invariant 1: at most one ACTIVE, and it must be the top.
        let active_count = self
            .flow_stack
            .iter()
            .filter(|f| f.flow_state == FlowState::Active)
            .count();
        if active_count > 1 {
            return Err(Error::state_invariant_violation(
                "more than one ACTIVE flow in flow_stack",
            ));
        }
        if active_count == 1 {
            match self.flow_stack.last() {
                Some(top) if top.flow_state == FlowState::Active => {}
                _ => {
                    return Err(Error::state_invariant_violation(
                        "ACTIVE flow is not at the top of flow_stack",
                    ))
                }
            }
        }
        if self.flow_stack.is_empty()
            && !matches!(
                self.conversation_state,
                ConversationState::Idle | ConversationState::Completed
            )
        {
            return Err(Error::state_invariant_violation(
                "empty flow_stack requires conversation_state IDLE or COMPLETED",
            ));
        }

        // Invariant 2: every flow_id in flow_slots exists in flow_stack or completed_flows.
        let known_ids: std::collections::HashSet<&str> = self
            .flow_stack
            .iter()
            .map(|f| f.flow_id.as_str())
            .chain(self.metadata.completed_flows.iter().map(|f| f.flow_id.as_str()))
            .collect();
        for flow_id in self.flow_slots.keys() {
            if !known_ids.contains(flow_id.as_str()) {
                return Err(Error::state_invariant_violation(format!(
                    "flow_slots references unknown flow_id {flow_id}"
                )));
            }
        }

        // Invariant 3.
        if self.waiting_for_slot.is_some()
            && self.conversation_state != ConversationState::WaitingForSlot
        {
            return Err(Error::state_invariant_violation(
                "waiting_for_slot set without conversation_state=WAITING_FOR_SLOT",
            ));
        }

        // Invariant 6.
        if self.flow_stack.len() > max_stack_depth {
            return Err(Error::stack_depth_exceeded(format!(
                "flow_stack length {} exceeds max_stack_depth {}",
                self.flow_stack.len(),
                max_stack_depth
            )));
        }

        Ok(())
    }
}

/// Identifier newtype used where a slot map is looked up by `FlowId` rather
/// than by its string form, avoiding ad hoc `.as_str()` calls at lookup sites.
pub fn flow_slots_key(id: &FlowId) -> String {
    id.as_str().to_string()
}
