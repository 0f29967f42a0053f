//! The `interrupt(prompt_value)` suspension primitive (spec §4.6, §4.7).
//!
//! Contract:
//! 1. Calling `interrupt` suspends the current node and hands control back to
//!    the runtime loop, which records a `PendingInterrupt` in the next
//!    checkpoint instead of advancing to another node.
//! 2. Everything a node does *before* calling `interrupt` must be idempotent:
//!    on resume, the node runs again from the top and may call `interrupt`
//!    again with the same `prompt_value` if the resuming input still isn't
//!    what it needed.
//! 3. Resume happens when a new user message arrives for a session whose
//!    latest checkpoint carries a pending interrupt; the graph re-enters the
//!    interrupted node directly rather than starting again from `understand`.
//! 4. A pending interrupt is cleared by whichever node consumed the response
//!    that satisfied it — never by the runtime loop itself.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// What a node showed the user while suspended, and which node to resume
/// into.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingInterrupt {
    pub node: String,
    pub prompt_value: Value,
}

impl PendingInterrupt {
    pub fn new(node: impl Into<String>, prompt_value: Value) -> Self {
        Self {
            node: node.into(),
            prompt_value,
        }
    }
}

/// What a graph node hands back to the runtime loop after a step.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeOutcome {
    /// Keep walking the graph.
    Continue,
    /// Suspend here; persist `interrupt` and stop the turn.
    Interrupt(PendingInterrupt),
}

/// The suspension primitive itself. Nodes call this instead of returning
/// `NodeOutcome::Interrupt` directly so every call site reads the same way.
pub fn interrupt(node: &str, prompt_value: Value) -> NodeOutcome {
    NodeOutcome::Interrupt(PendingInterrupt::new(node, prompt_value))
}
