//! `FlowStepManager` (spec §4.2): step completion checks and the bounded
//! step-advancement walk through steps that require no further user input.

use crate::error::{Error, Result};
use crate::flow::definition::{FlowDefinition, Step};
use crate::patterns::PredicateEvaluator;
use crate::state::{ConversationState, DialogueState};
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

/// A hard ceiling on consecutive auto-advanced steps per turn, so a
/// misconfigured flow (e.g. a branch cycle) can't spin the runtime forever.
const MAX_STEP_ADVANCES: u32 = 20;

/// Where a flow landed after `advance_through_completed_steps`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdvanceResult {
    /// `state.current_step` now names a step that still needs something
    /// (user input, an action dispatch) before it's complete.
    AwaitingStep,
    /// Every step in the flow is complete; there is no next step to resolve.
    FlowComplete,
}

#[derive(Debug, Default)]
pub struct FlowStepManager;

impl FlowStepManager {
    pub fn new() -> Self {
        Self
    }

    /// Whether `step` has everything it needs to be considered done, given
    /// the slots currently recorded for `flow_id`.
    pub fn is_step_complete(&self, step: &Step, state: &DialogueState, flow_id: &str) -> bool {
        let slots = state.flow_slots.get(flow_id);
        match step {
            Step::Collect { slot, optional, .. } => {
                *optional || slots.map(|s| s.contains_key(slot)).unwrap_or(false)
            }
            Step::Action { outputs, .. } => outputs
                .values()
                .all(|target| slots.map(|s| s.contains_key(target)).unwrap_or(false)),
            Step::Branch { .. } | Step::Say { .. } => true,
            Step::Confirm { .. } => state.conversation_state != ConversationState::Confirming,
        }
    }

    /// Resolve the next step id, evaluating `Branch` cases against the
    /// current slot values when `current` is a branch.
    pub fn resolve_next<'a>(
        &self,
        def: &'a FlowDefinition,
        current: &Step,
        state: &DialogueState,
        flow_id: &str,
        evaluator: &dyn PredicateEvaluator,
    ) -> Option<&'a Step> {
        if let Step::Branch { cases, default, .. } = current {
            let ctx = self.branch_context(state, flow_id);
            for case in cases {
                if evaluator.evaluate(&case.when, &ctx) {
                    return def.step_at(&case.next);
                }
            }
            return def.step_at(default);
        }
        def.next_step(current.id())
    }

    fn branch_context(&self, state: &DialogueState, flow_id: &str) -> HashMap<String, Value> {
        state.flow_slots.get(flow_id).cloned().unwrap_or_default()
    }

    /// Walk forward from `state.current_step` through every step that's
    /// already complete (Say/Branch/finished Action/Confirm), stopping at the
    /// first step still awaiting user input, and write the result back into
    /// `state.current_step`. Bounded by `MAX_STEP_ADVANCES` (spec §4.2).
    pub fn advance_through_completed_steps(
        &self,
        state: &mut DialogueState,
        flow_id: &str,
        def: &FlowDefinition,
        evaluator: &dyn PredicateEvaluator,
    ) -> Result<AdvanceResult> {
        let mut current_id = match &state.current_step {
            Some(id) => id.clone(),
            None => match def.first_step() {
                Some(step) => step.id().to_string(),
                None => {
                    state.current_step = None;
                    return Ok(AdvanceResult::FlowComplete);
                }
            },
        };

        for _ in 0..MAX_STEP_ADVANCES {
            let step = match def.step_at(&current_id) {
                Some(s) => s,
                None => {
                    state.current_step = None;
                    return Ok(AdvanceResult::FlowComplete);
                }
            };
            if !self.is_step_complete(step, state, flow_id) {
                state.current_step = Some(current_id);
                return Ok(AdvanceResult::AwaitingStep);
            }
            // `Say` is always "complete" (spec §4.2's completion table has no
            // precondition for it), so this walk is the only place it's ever
            // visited — render it here rather than at a stopping point it
            // will never be the target of.
            if let Step::Say { text, .. } = step {
                say(state, text);
            }
            match self.resolve_next(def, step, state, flow_id, evaluator) {
                Some(next) => current_id = next.id().to_string(),
                None => {
                    state.current_step = None;
                    return Ok(AdvanceResult::FlowComplete);
                }
            }
        }

        debug!(flow_id, steps = MAX_STEP_ADVANCES, "step advancement bound reached");
        state.conversation_state = ConversationState::Error;
        state.metadata.error = Some("step_advancement_exhausted".to_string());
        Err(Error::state_invariant_violation(format!(
            "step advancement exhausted {MAX_STEP_ADVANCES} iterations for flow {flow_id}: possible branch cycle"
        )))
    }
}

/// Append `text` to `last_response` and record it in `messages`, the same
/// way `graph::nodes::generate_response` does for a step landed on directly.
fn say(state: &mut DialogueState, text: &str) {
    if state.last_response.is_empty() {
        state.last_response = text.to_string();
    } else {
        state.last_response = format!("{} {}", state.last_response, text);
    }
    state.messages.push(crate::state::Message {
        role: crate::state::Role::Assistant,
        content: text.to_string(),
        timestamp: crate::clock::now_seconds(),
    });
}
