//! The graph runtime (spec §4.6, §4.7): `understand -> execute_commands ->
//! run_current_step*` per turn, suspending via `interrupt` or completing
//! flows as their step sequence is exhausted.

pub mod interrupt;
pub mod nodes;

pub use interrupt::{NodeOutcome, PendingInterrupt};
pub use nodes::StepOutcome;

use crate::command::executor::ExecutionOutcome;
use crate::context::RuntimeContext;
use crate::error::Result;
use crate::flow::manager::PopResult;
use crate::state::{ConversationState, DialogueState};
use tracing::{info, instrument};

/// A hard ceiling on flow completions cascading in one turn (completing a
/// flow resumes whatever was paused beneath it, which might itself complete
/// immediately). Bounded well above any realistic nesting (`max_stack_depth`
/// is at most a handful).
const MAX_CASCADE_COMPLETIONS: u32 = 32;

#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    /// The turn produced a response and is waiting for the next user message.
    Responded,
    /// A node suspended mid-step; `last_response` already carries the prompt.
    Interrupted(PendingInterrupt),
}

/// Run one full turn: understand the message, execute its commands, then
/// drive the active flow's step sequence until it needs user input again.
#[instrument(skip(state, runtime), fields(session_turn = state.turn_count))]
pub async fn run_turn(state: &mut DialogueState, runtime: &RuntimeContext) -> Result<TurnOutcome> {
    state.turn_count += 1;
    state.last_response.clear();

    let commands = nodes::understand(state, runtime).await?;
    let outcome = nodes::execute_commands(&commands, state, runtime).await;

    if let ExecutionOutcome::Failed = outcome {
        nodes::handle_error(state);
        return Ok(TurnOutcome::Responded);
    }

    if runtime.patterns.should_hand_off(state) {
        info!("conversation pattern triggered human handoff");
        state.conversation_state = ConversationState::Completed;
        state.last_response = "Let me connect you with a human agent.".to_string();
        return Ok(TurnOutcome::Responded);
    }

    if let ExecutionOutcome::SkippedAfterCancel = outcome {
        if state.flow_stack.is_empty() {
            state.conversation_state = ConversationState::Idle;
        }
    }

    if state.active_flow().is_none() {
        state.conversation_state = ConversationState::Idle;
    }

    if state.pending_cancellation && state.conversation_state == ConversationState::Confirming {
        return Ok(TurnOutcome::Interrupted(PendingInterrupt::new(
            "confirm_cancel_flow",
            serde_json::Value::String(state.last_response.clone()),
        )));
    }

    for _ in 0..MAX_CASCADE_COMPLETIONS {
        if state.active_flow().is_none() {
            break;
        }

        match nodes::run_current_step(state, runtime).await {
            Ok(StepOutcome::Advanced) => continue,
            Ok(StepOutcome::FlowComplete) => {
                let flow_id = state.active_flow().unwrap().flow_id.clone();
                let outputs = state.flow_slots.get(&flow_id).cloned().unwrap_or_default();
                runtime.flow_manager.pop_flow(state, outputs, PopResult::Completed);
                state.waiting_for_slot = None;
                if state.flow_stack.is_empty() {
                    state.conversation_state = ConversationState::Completed;
                }
                continue;
            }
            Ok(StepOutcome::Interrupted(prompt)) => {
                let text = prompt
                    .prompt_value
                    .as_str()
                    .map(str::to_string)
                    .unwrap_or_else(|| prompt.prompt_value.to_string());
                if state.last_response.is_empty() {
                    state.last_response = text;
                } else {
                    state.last_response = format!("{} {}", state.last_response, text);
                }
                runtime.flow_manager.prune(state);
                return Ok(TurnOutcome::Interrupted(prompt));
            }
            Err(e) => {
                // `advance_through_completed_steps` sets a sentinel
                // `metadata.error` itself before returning its error (spec
                // §4.2); don't clobber it with the generic stringified cause.
                if state.metadata.error.is_none() {
                    state.metadata.error = Some(e.to_string());
                }
                state.conversation_state = ConversationState::Error;
                nodes::handle_error(state);
                runtime.flow_manager.prune(state);
                return Ok(TurnOutcome::Responded);
            }
        }
    }

    runtime.flow_manager.prune(state);
    Ok(TurnOutcome::Responded)
}
