//! Process-wide, read-only registries (spec §3 "Ownership", §9 "Global state").
//!
//! All registries here are populated at startup and frozen before the first
//! message is processed; concurrent readers are safe because nothing mutates
//! them after `RuntimeContext` construction.

pub mod action;
pub mod handler;
pub mod normalizer;
pub mod scope;
pub mod validator;

pub use action::{Action, ActionRegistry};
pub use handler::{CommandHandler, HandlerRegistry};
pub use normalizer::{Normalizer, NormalizerRegistry};
pub use scope::ScopeManager;
pub use validator::{Validator, ValidatorRegistry};
