//! Monotonic-enough wall clock helper.
//!
//! `DialogueState` timestamps are `float` per spec §3; the runtime always
//! reads the clock through this module so call sites and tests can agree on
//! one representation (seconds since the Unix epoch).

use chrono::Utc;

pub fn now_seconds() -> f64 {
    Utc::now().timestamp_millis() as f64 / 1000.0
}
