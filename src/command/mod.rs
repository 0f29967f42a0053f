//! The command model (spec §4.3): a closed sum of data-only variants produced
//! by the NLU adapter and consumed by a type-keyed handler registry.

pub mod executor;
pub mod handlers;

pub use executor::{CommandExecutor, StateUpdate};

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Command {
    StartFlow {
        flow_name: String,
        #[serde(default)]
        slots: std::collections::HashMap<String, Value>,
    },
    SetSlot {
        slot_name: String,
        value: Value,
        confidence: f64,
    },
    CorrectSlot {
        slot_name: String,
        new_value: Value,
    },
    CancelFlow {
        #[serde(default)]
        reason: Option<String>,
    },
    Clarify {
        topic: String,
    },
    AffirmConfirmation,
    DenyConfirmation {
        #[serde(default)]
        slot_to_change: Option<String>,
    },
    HumanHandoff {
        #[serde(default)]
        reason: Option<String>,
    },
    ChitChat {
        #[serde(default)]
        hint: Option<String>,
    },
    OutOfScope {
        topic: String,
    },
}

impl Command {
    /// The type tag recorded in `command_log` (spec §4.4 point 3).
    pub fn type_name(&self) -> &'static str {
        match self {
            Command::StartFlow { .. } => "StartFlow",
            Command::SetSlot { .. } => "SetSlot",
            Command::CorrectSlot { .. } => "CorrectSlot",
            Command::CancelFlow { .. } => "CancelFlow",
            Command::Clarify { .. } => "Clarify",
            Command::AffirmConfirmation => "AffirmConfirmation",
            Command::DenyConfirmation { .. } => "DenyConfirmation",
            Command::HumanHandoff { .. } => "HumanHandoff",
            Command::ChitChat { .. } => "ChitChat",
            Command::OutOfScope { .. } => "OutOfScope",
        }
    }
}
