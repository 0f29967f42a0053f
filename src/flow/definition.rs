//! Declarative flow definitions (spec §6's abstract grammar).
//!
//! The YAML loader and schema validator that turn an on-disk flow definition
//! into these types are an external collaborator (spec §1); this module only
//! fixes the shape they must produce.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FlowTriggers {
    #[serde(default)]
    pub intents: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowMetadata {
    #[serde(default = "default_true")]
    pub can_be_paused: bool,
    #[serde(default = "default_true")]
    pub can_be_resumed: bool,
    pub max_pause_duration: Option<u64>,
}

fn default_true() -> bool {
    true
}

impl Default for FlowMetadata {
    fn default() -> Self {
        Self {
            can_be_paused: true,
            can_be_resumed: true,
            max_pause_duration: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotDef {
    pub name: String,
    #[serde(rename = "type")]
    pub slot_type: String,
    pub validator: Option<String>,
    pub normalizer: Option<String>,
    pub prompt: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BranchCase {
    pub when: String,
    pub next: String,
}

/// A single step in a flow's ordered step sequence (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Step {
    Collect {
        id: String,
        slot: String,
        #[serde(default)]
        optional: bool,
    },
    Action {
        id: String,
        call: String,
        #[serde(default)]
        inputs: HashMap<String, String>,
        #[serde(default)]
        outputs: HashMap<String, String>,
    },
    Branch {
        id: String,
        cases: Vec<BranchCase>,
        default: String,
    },
    Say {
        id: String,
        text: String,
    },
    Confirm {
        id: String,
        summary: String,
    },
}

impl Step {
    pub fn id(&self) -> &str {
        match self {
            Step::Collect { id, .. }
            | Step::Action { id, .. }
            | Step::Branch { id, .. }
            | Step::Say { id, .. }
            | Step::Confirm { id, .. } => id,
        }
    }
}

/// A declarative flow definition (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowDefinition {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub triggers: FlowTriggers,
    #[serde(default)]
    pub metadata: FlowMetadata,
    #[serde(default)]
    pub slots: Vec<SlotDef>,
    pub steps: Vec<Step>,
}

impl FlowDefinition {
    /// Steps are totally ordered by their position in this vector (spec §4.2
    /// "Tie-breaks").
    pub fn step_at(&self, id: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.id() == id)
    }

    pub fn first_step(&self) -> Option<&Step> {
        self.steps.first()
    }

    /// The step following `current`, or `None` at exhaustion.
    pub fn next_step(&self, current: &str) -> Option<&Step> {
        let idx = self.steps.iter().position(|s| s.id() == current)?;
        self.steps.get(idx + 1)
    }

    pub fn slot(&self, name: &str) -> Option<&SlotDef> {
        self.slots.iter().find(|s| s.name == name)
    }

    /// A single-step flow with no slots, useful for tests exercising flow
    /// lifecycle rather than step content.
    pub fn minimal(name: &str) -> Self {
        Self {
            name: name.to_string(),
            description: String::new(),
            triggers: FlowTriggers::default(),
            metadata: FlowMetadata::default(),
            slots: Vec::new(),
            steps: vec![Step::Say {
                id: "start".to_string(),
                text: String::new(),
            }],
        }
    }
}

/// Process-wide, read-only registry of flow definitions, frozen after init
/// (spec §9 "Global state").
#[derive(Debug, Default)]
pub struct FlowDefinitionRegistry {
    flows: HashMap<String, FlowDefinition>,
}

impl FlowDefinitionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, def: FlowDefinition) {
        self.flows.insert(def.name.clone(), def);
    }

    pub fn get(&self, name: &str) -> Option<&FlowDefinition> {
        self.flows.get(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.flows.keys().map(|s| s.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> FlowDefinition {
        FlowDefinition {
            name: "book_flight".to_string(),
            description: "book a flight".to_string(),
            triggers: FlowTriggers::default(),
            metadata: FlowMetadata::default(),
            slots: vec![
                SlotDef {
                    name: "origin".to_string(),
                    slot_type: "string".to_string(),
                    validator: None,
                    normalizer: None,
                    prompt: "Where from?".to_string(),
                },
            ],
            steps: vec![
                Step::Collect {
                    id: "collect_origin".to_string(),
                    slot: "origin".to_string(),
                    optional: false,
                },
                Step::Action {
                    id: "confirm_flight_booking".to_string(),
                    call: "confirm_flight_booking".to_string(),
                    inputs: HashMap::new(),
                    outputs: HashMap::new(),
                },
            ],
        }
    }

    #[test]
    fn next_step_walks_declaration_order() {
        let def = sample();
        let second = def.next_step("collect_origin").unwrap();
        assert_eq!(second.id(), "confirm_flight_booking");
        assert!(def.next_step("confirm_flight_booking").is_none());
    }

    #[test]
    fn registry_lookup() {
        let mut reg = FlowDefinitionRegistry::new();
        reg.register(sample());
        assert!(reg.get("book_flight").is_some());
        assert!(reg.get("missing").is_none());
    }
}
