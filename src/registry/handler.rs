//! Type-keyed command handler dispatch (spec §4.3): `execute(command, state,
//! runtime) -> state_updates`. Closed over the `Command` enum — adding a
//! command variant means adding a handler and a registration entry, the same
//! open/closed shape as `ActionRegistry`.

use crate::command::{Command, StateUpdate};
use crate::context::RuntimeContext;
use crate::error::Result;
use crate::state::DialogueState;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// A handler mutates `state` in place using the correct per-field operation
/// (scalar replace via direct assignment, append via `Vec::push`, slot merge
/// via `FlowManager::set_slot`) and returns a `StateUpdate` carrying control
/// signals the executor can't infer from the mutation alone.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn execute(
        &self,
        command: &Command,
        state: &mut DialogueState,
        runtime: &RuntimeContext,
    ) -> Result<StateUpdate>;
}

impl std::fmt::Debug for dyn CommandHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("dyn CommandHandler").finish_non_exhaustive()
    }
}

#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<&'static str, Arc<dyn CommandHandler>>,
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("registered", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, type_name: &'static str, handler: Arc<dyn CommandHandler>) {
        self.handlers.insert(type_name, handler);
    }

    pub fn get(&self, type_name: &str) -> Option<Arc<dyn CommandHandler>> {
        self.handlers.get(type_name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoOp;

    #[async_trait]
    impl CommandHandler for NoOp {
        async fn execute(&self, _command: &Command, _state: &mut DialogueState, _runtime: &RuntimeContext) -> Result<StateUpdate> {
            Ok(StateUpdate::default())
        }
    }

    #[test]
    fn register_and_get_roundtrip() {
        let mut registry = HandlerRegistry::new();
        registry.register("StartFlow", Arc::new(NoOp));
        assert!(registry.get("StartFlow").is_some());
        assert!(registry.get("SetSlot").is_none());
    }
}
