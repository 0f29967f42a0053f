//! `FlowManager` — sole authority over `flow_stack` and `flow_slots` (spec §4.1).

use crate::clock::now_seconds;
use crate::config::{FlowManagementConfig, MemoryManagementConfig, OnLimitReached};
use crate::error::{Error, Result};
use crate::ids::new_flow_id;
use crate::state::{DialogueState, FlowContext, FlowState};
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Outcome of a flow instance at `pop_flow` time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PopResult {
    Completed,
    Cancelled,
    Abandoned,
    Error,
}

impl From<PopResult> for FlowState {
    fn from(r: PopResult) -> Self {
        match r {
            PopResult::Completed => FlowState::Completed,
            PopResult::Cancelled => FlowState::Cancelled,
            PopResult::Abandoned => FlowState::Abandoned,
            PopResult::Error => FlowState::Error,
        }
    }
}

#[derive(Debug, Default)]
pub struct FlowManager {
    pub flow_management: FlowManagementConfig,
    pub memory_management: MemoryManagementConfig,
}

impl FlowManager {
    pub fn new(flow_management: FlowManagementConfig, memory_management: MemoryManagementConfig) -> Self {
        Self {
            flow_management,
            memory_management,
        }
    }

    /// Push a new flow instance, pausing whatever is currently ACTIVE.
    ///
    /// Returns the freshly-allocated flow id.
    pub fn push_flow(
        &self,
        state: &mut DialogueState,
        flow_name: &str,
        initial_slots: HashMap<String, Value>,
        reason: Option<String>,
    ) -> Result<String> {
        // Enforce the depth limit against the *post-push* stack length.
        if state.flow_stack.len() + 1 > self.flow_management.max_stack_depth {
            match self.flow_management.on_limit_reached {
                OnLimitReached::CancelOldest => {
                    if !state.flow_stack.is_empty() {
                        let oldest = state.flow_stack.remove(0);
                        self.archive(state, oldest, PopResult::Cancelled);
                        warn!(flow = flow_name, "cancelled oldest flow to respect max_stack_depth");
                    }
                }
                OnLimitReached::RejectNew => {
                    return Err(Error::stack_depth_exceeded(format!(
                        "cannot start {flow_name}: stack already at max_stack_depth {}",
                        self.flow_management.max_stack_depth
                    )));
                }
                OnLimitReached::AskUser => {
                    return Err(Error::stack_depth_exceeded(format!(
                        "cannot start {flow_name}: ask the user to finish or cancel the active flow first"
                    )));
                }
            }
        }

        let now = now_seconds();
        if let Some(top) = state.flow_stack.last_mut() {
            top.pause(now, reason);
        }

        let flow_id = new_flow_id(flow_name).as_str().to_string();
        state.flow_stack.push(FlowContext::new(flow_name, &flow_id, now));
        state.flow_slots.insert(flow_id.clone(), initial_slots);

        info!(flow_id = %flow_id, flow_name, "flow pushed");
        Ok(flow_id)
    }

    /// Archive the top flow and promote the new top (if any) to ACTIVE.
    pub fn pop_flow(
        &self,
        state: &mut DialogueState,
        outputs: HashMap<String, Value>,
        result: PopResult,
    ) {
        let mut top = match state.flow_stack.pop() {
            Some(top) => top,
            None => {
                // Per spec §4.1: popping an empty stack indicates a logic bug.
                tracing::error!("pop_flow called on empty flow_stack");
                return;
            }
        };

        top.flow_state = result.into();
        top.outputs = outputs;
        top.completed_at = Some(now_seconds());
        self.archive(state, top, result);

        if let Some(new_top) = state.flow_stack.last_mut() {
            new_top.resume();
        }
    }

    fn archive(&self, state: &mut DialogueState, mut flow: FlowContext, result: PopResult) {
        flow.flow_state = result.into();
        if flow.completed_at.is_none() {
            flow.completed_at = Some(now_seconds());
        }
        // Archive a shallow copy of the slots into the record before dropping
        // the live slot map, per §4.1.
        if let Some(slots) = state.flow_slots.remove(&flow.flow_id) {
            for (k, v) in slots {
                flow.outputs.entry(k).or_insert(v);
            }
        }
        state.metadata.completed_flows.push(flow);
    }

    pub fn get_active_context<'a>(&self, state: &'a DialogueState) -> Option<&'a FlowContext> {
        state.active_flow()
    }

    pub fn get_slot(&self, state: &DialogueState, name: &str) -> Result<Option<Value>> {
        let active = state
            .active_flow()
            .ok_or_else(|| Error::no_active_flow("get_slot requires an active flow"))?;
        Ok(state
            .flow_slots
            .get(&active.flow_id)
            .and_then(|slots| slots.get(name))
            .cloned())
    }

    pub fn set_slot(&self, state: &mut DialogueState, name: &str, value: Value) -> Result<()> {
        let flow_id = state
            .active_flow()
            .ok_or_else(|| Error::no_active_flow("set_slot requires an active flow"))?
            .flow_id
            .clone();
        state
            .flow_slots
            .entry(flow_id)
            .or_default()
            .insert(name.to_string(), value);
        Ok(())
    }

    /// Trim bounded collections to the configured maxima (spec §4.1, §6).
    pub fn prune(&self, state: &mut DialogueState) {
        let mem = &self.memory_management;
        if state.messages.len() > mem.max_history_messages {
            let drop = state.messages.len() - mem.max_history_messages;
            state.messages.drain(0..drop);
        }
        if state.trace.len() > mem.max_trace_events {
            let drop = state.trace.len() - mem.max_trace_events;
            state.trace.drain(0..drop);
        }
        if state.command_log.len() > mem.max_command_log {
            let drop = state.command_log.len() - mem.max_command_log;
            state.command_log.drain(0..drop);
        }
        if state.metadata.completed_flows.len() > mem.archive_completed_flows_after {
            let drop = state.metadata.completed_flows.len() - mem.archive_completed_flows_after;
            state.metadata.completed_flows.drain(0..drop);
        }
        // `queued_messages` uses a fixed default bound of 5 per §4.1 (no
        // configuration option is exposed for it in §6).
        const MAX_QUEUED_MESSAGES: usize = 5;
        if state.metadata.queued_messages.len() > MAX_QUEUED_MESSAGES {
            let drop = state.metadata.queued_messages.len() - MAX_QUEUED_MESSAGES;
            state.metadata.queued_messages.drain(0..drop);
        }
        debug!("pruned dialogue state collections to configured bounds");
    }

    /// Sweep PAUSED flows that have exceeded `abandon_timeout` (spec §5),
    /// transitioning them to ABANDONED. Grounded on the teacher's
    /// `CleanupService::cleanup_zombies` age-based removal idiom.
    pub fn expire_paused_flows(&self, state: &mut DialogueState) {
        let now = now_seconds();
        let timeout = self.flow_management.abandon_timeout.as_secs_f64();
        let mut expired_indices = Vec::new();
        for (i, f) in state.flow_stack.iter().enumerate() {
            if f.flow_state == FlowState::Paused {
                if let Some(paused_at) = f.paused_at {
                    if now - paused_at > timeout {
                        expired_indices.push(i);
                    }
                }
            }
        }
        for &i in expired_indices.iter().rev() {
            let flow = state.flow_stack.remove(i);
            info!(flow_id = %flow.flow_id, "abandoning expired PAUSED flow");
            self.archive(state, flow, PopResult::Abandoned);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> FlowManager {
        FlowManager::new(FlowManagementConfig::default(), MemoryManagementConfig::default())
    }

    #[test]
    fn push_then_get_active() {
        let mgr = manager();
        let mut state = DialogueState::new();
        let id = mgr.push_flow(&mut state, "book_flight", HashMap::new(), None).unwrap();
        let active = mgr.get_active_context(&state).unwrap();
        assert_eq!(active.flow_id, id);
        assert_eq!(active.flow_state, FlowState::Active);
    }

    #[test]
    fn second_push_pauses_first() {
        let mgr = manager();
        let mut state = DialogueState::new();
        mgr.push_flow(&mut state, "book_flight", HashMap::new(), None).unwrap();
        mgr.push_flow(&mut state, "check_balance", HashMap::new(), Some("digression".into()))
            .unwrap();
        assert_eq!(state.flow_stack[0].flow_state, FlowState::Paused);
        assert_eq!(state.flow_stack[1].flow_state, FlowState::Active);
    }

    #[test]
    fn pop_promotes_paused_to_active() {
        let mgr = manager();
        let mut state = DialogueState::new();
        mgr.push_flow(&mut state, "book_flight", HashMap::new(), None).unwrap();
        mgr.push_flow(&mut state, "check_balance", HashMap::new(), None).unwrap();
        mgr.pop_flow(&mut state, HashMap::new(), PopResult::Completed);
        assert_eq!(state.flow_stack.len(), 1);
        assert_eq!(state.flow_stack[0].flow_name, "book_flight");
        assert_eq!(state.flow_stack[0].flow_state, FlowState::Active);
        assert_eq!(state.metadata.completed_flows.len(), 1);
    }

    #[test]
    fn set_slot_requires_active_flow() {
        let mgr = manager();
        let mut state = DialogueState::new();
        let err = mgr.set_slot(&mut state, "origin", Value::from("NYC")).unwrap_err();
        assert!(matches!(err, Error::NoActiveFlow(_)));
    }

    #[test]
    fn reject_new_errors_above_depth() {
        let mut cfg = FlowManagementConfig::default();
        cfg.max_stack_depth = 1;
        cfg.on_limit_reached = OnLimitReached::RejectNew;
        let mgr = FlowManager::new(cfg, MemoryManagementConfig::default());
        let mut state = DialogueState::new();
        mgr.push_flow(&mut state, "a", HashMap::new(), None).unwrap();
        let err = mgr.push_flow(&mut state, "b", HashMap::new(), None).unwrap_err();
        assert!(matches!(err, Error::StackDepthExceeded(_)));
        assert_eq!(state.flow_stack.len(), 1);
    }

    #[test]
    fn cancel_oldest_drops_bottom_of_stack() {
        let mut cfg = FlowManagementConfig::default();
        cfg.max_stack_depth = 1;
        cfg.on_limit_reached = OnLimitReached::CancelOldest;
        let mgr = FlowManager::new(cfg, MemoryManagementConfig::default());
        let mut state = DialogueState::new();
        mgr.push_flow(&mut state, "a", HashMap::new(), None).unwrap();
        mgr.push_flow(&mut state, "b", HashMap::new(), None).unwrap();
        assert_eq!(state.flow_stack.len(), 1);
        assert_eq!(state.flow_stack[0].flow_name, "b");
        assert_eq!(state.metadata.completed_flows.len(), 1);
        assert_eq!(state.metadata.completed_flows[0].flow_state, FlowState::Cancelled);
    }

    #[test]
    fn prune_trims_to_configured_bounds() {
        let mut cfg = MemoryManagementConfig::default();
        cfg.max_history_messages = 2;
        let mgr = FlowManager::new(FlowManagementConfig::default(), cfg);
        let mut state = DialogueState::new();
        for i in 0..5 {
            state.messages.push(crate::state::Message {
                role: crate::state::Role::User,
                content: format!("msg {i}"),
                timestamp: i as f64,
            });
        }
        mgr.prune(&mut state);
        assert_eq!(state.messages.len(), 2);
        assert_eq!(state.messages[0].content, "msg 3");
    }

    #[test]
    fn expire_paused_flows_abandons_stale_entries() {
        let mgr = manager();
        let mut state = DialogueState::new();
        mgr.push_flow(&mut state, "a", HashMap::new(), None).unwrap();
        mgr.push_flow(&mut state, "b", HashMap::new(), None).unwrap();
        state.flow_stack[0].paused_at = Some(0.0);
        mgr.expire_paused_flows(&mut state);
        assert_eq!(state.flow_stack.len(), 1);
        assert_eq!(state.flow_stack[0].flow_name, "b");
        assert!(state
            .metadata
            .completed_flows
            .iter()
            .any(|f| f.flow_name == "a" && f.flow_state == FlowState::Abandoned));
    }
}
