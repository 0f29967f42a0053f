//! # dialogue-core — a resumable, checkpointed task-oriented conversation runtime
//!
//! Drives a declarative flow through a graph of nodes (`understand`,
//! `execute_commands`, per-step-kind nodes), suspending at `interrupt` points
//! whenever a node needs another message from the user, and resuming exactly
//! where it left off from a persisted checkpoint.
//!
//! ## Architecture
//!
//! ```text
//!                    ┌───────────────────────────────────┐
//!  inbound message → │           RuntimeLoop             │
//!                    │  ┌──────────────┐ ┌─────────────┐ │
//!                    │  │ Checkpointer │ │ RuntimeCtx  │ │
//!                    │  │  (snapshot)  │ │ (registries)│ │
//!                    │  └──────────────┘ └─────────────┘ │
//!                    │  ┌──────────────┐ ┌─────────────┐ │
//!                    │  │ graph::      │ │ Conversation│ │
//!                    │  │ run_turn     │ │ Patterns    │ │
//!                    │  └──────────────┘ └─────────────┘ │
//!                    └───────────────────────────────────┘
//! ```

#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]
#![warn(rust_2018_idioms)]

pub mod checkpoint;
pub mod clock;
pub mod command;
pub mod config;
pub mod context;
pub mod error;
pub mod flow;
pub mod graph;
pub mod ids;
pub mod nlu;
pub mod observability;
pub mod patterns;
pub mod recovery;
pub mod registry;
pub mod runtime;
pub mod state;

pub use config::RuntimeConfig;
pub use context::{RuntimeContext, RuntimeContextBuilder};
pub use error::{Error, Result};
pub use runtime::RuntimeLoop;
