//! `FlowContext` — a single flow instance's control-plane record (spec §3).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// `flow_state` (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlowState {
    Active,
    Paused,
    Completed,
    Cancelled,
    Abandoned,
    Error,
}

impl FlowState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            FlowState::Completed | FlowState::Cancelled | FlowState::Abandoned | FlowState::Error
        )
    }
}

/// A concrete invocation of a flow definition (spec §3, GLOSSARY: "Flow instance").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowContext {
    pub flow_id: String,
    pub flow_name: String,
    pub flow_state: FlowState,
    pub current_step: Option<String>,
    #[serde(default)]
    pub outputs: HashMap<String, Value>,
    pub started_at: Option<f64>,
    pub paused_at: Option<f64>,
    pub completed_at: Option<f64>,
    pub context: Option<String>,
}

impl FlowContext {
    pub fn new(flow_name: &str, flow_id: &str, started_at: f64) -> Self {
        Self {
            flow_id: flow_id.to_string(),
            flow_name: flow_name.to_string(),
            flow_state: FlowState::Active,
            current_step: None,
            outputs: HashMap::new(),
            started_at: Some(started_at),
            paused_at: None,
            completed_at: None,
            context: None,
        }
    }

    pub fn pause(&mut self, at: f64, reason: Option<String>) {
        self.flow_state = FlowState::Paused;
        self.paused_at = Some(at);
        self.context = reason;
    }

    pub fn resume(&mut self) {
        self.flow_state = FlowState::Active;
        self.paused_at = None;
    }
}
