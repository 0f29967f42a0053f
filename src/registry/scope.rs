//! `ScopeManager` — which flows/actions are currently eligible (spec §2, §4.6).
//!
//! Grounded on the teacher's `ServiceRegistry` (list/health/stats over a
//! process-wide registry), generalized from "is this service healthy" to
//! "is this flow/action eligible given the current dialogue state".

use crate::state::DialogueState;
use std::collections::HashSet;

#[derive(Debug, Default)]
pub struct ScopeManager {
    /// Flows disabled process-wide (e.g. feature-flagged off), independent of
    /// per-session dialogue state.
    disabled_flows: HashSet<String>,
}

impl ScopeManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn disable_flow(&mut self, name: impl Into<String>) {
        self.disabled_flows.insert(name.into());
    }

    /// Flows eligible to be started via `StartFlow` given the current state.
    /// A flow already on the stack (PAUSED or ACTIVE) is still eligible —
    /// `StartFlow` on an in-progress flow is a no-op handled by the command
    /// handler, not filtered out here.
    pub fn eligible_flows<'a>(
        &self,
        all_flow_names: impl Iterator<Item = &'a str>,
        _state: &DialogueState,
    ) -> Vec<&'a str> {
        all_flow_names
            .filter(|name| !self.disabled_flows.contains(*name))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_flow_is_excluded() {
        let mut scope = ScopeManager::new();
        scope.disable_flow("beta_flow");
        let names = vec!["book_flight", "beta_flow"];
        let state = DialogueState::new();
        let eligible = scope.eligible_flows(names.into_iter(), &state);
        assert_eq!(eligible, vec!["book_flight"]);
    }
}
