//! Flow lifecycle and step-sequencing (spec §4.1, §4.2).

pub mod definition;
pub mod manager;
pub mod step;

pub use definition::{FlowDefinition, FlowDefinitionRegistry};
pub use manager::{FlowManager, PopResult};
pub use step::FlowStepManager;
