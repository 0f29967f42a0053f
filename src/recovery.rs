//! Panic recovery utilities for action/validator invocation.
//!
//! Registered actions and validators are arbitrary user-supplied callbacks;
//! a panic inside one must not bring down a session's in-flight node, let
//! alone the whole runtime.

use crate::error::Error;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Execute a function with panic recovery.
///
/// If the function panics, the panic is captured, logged, and converted
/// to an `Error::action_internal`.
pub fn with_recovery<F, T>(operation: F, operation_name: &str) -> Result<T, Error>
where
    F: FnOnce() -> Result<T, Error>,
{
    match catch_unwind(AssertUnwindSafe(operation)) {
        Ok(result) => result,
        Err(panic_payload) => {
            let panic_msg = extract_panic_message(&panic_payload);
            tracing::error!(
                operation = operation_name,
                panic = %panic_msg,
                "panic_recovered"
            );
            Err(Error::action_internal(format!(
                "panic in {operation_name}: {panic_msg}"
            )))
        }
    }
}

/// Execute an async function with panic recovery.
pub async fn with_recovery_async<F, Fut, T>(operation: F, operation_name: &str) -> Result<T, Error>
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = Result<T, Error>>,
{
    let future = operation();

    match catch_unwind(AssertUnwindSafe(|| future)) {
        Ok(fut) => fut.await,
        Err(panic_payload) => {
            let panic_msg = extract_panic_message(&panic_payload);
            tracing::error!(
                operation = operation_name,
                panic = %panic_msg,
                "async_panic_recovered"
            );
            Err(Error::action_internal(format!(
                "async panic in {operation_name}: {panic_msg}"
            )))
        }
    }
}

fn extract_panic_message(payload: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic (no message)".to_string()
    }
}
