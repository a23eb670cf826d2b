//! Step requests and in-flight step records.
//!
//! A `StepRequest` pairs a forward action with its optional compensation as
//! explicit closures over explicit captured inputs, so rollback behavior is
//! unit-testable on its own. The engine turns each request into a `Step`
//! record that it mutates in place as the step runs.

use std::time::Duration;

use futures_util::future::BoxFuture;
use serde_json::Value;

use workpass_types::transaction::{StepStatus, StepSummary};

/// Boxed forward action: a zero-argument unit of work producing a JSON
/// result or failing. Failure is signalled exclusively via `Err` -- a
/// `Value::Null` success is a legitimate result.
pub type StepAction = Box<dyn FnOnce() -> BoxFuture<'static, anyhow::Result<Value>> + Send>;

/// Boxed compensation: takes the step's stored result and undoes its effect.
pub type StepRollback = Box<dyn FnOnce(Value) -> BoxFuture<'static, anyhow::Result<()>> + Send>;

// ---------------------------------------------------------------------------
// StepRequest
// ---------------------------------------------------------------------------

/// One named unit of work submitted to `Transaction::execute_step`.
///
/// Steps are critical by default: a critical failure surfaces as a
/// `TransactionError` and the workflow is expected to roll back. Mark a
/// step `non_critical` when its failure should degrade rather than abort.
pub struct StepRequest {
    pub(crate) name: String,
    pub(crate) action: StepAction,
    pub(crate) rollback: Option<StepRollback>,
    pub(crate) cache_key: Option<String>,
    pub(crate) cache_ttl: Option<Duration>,
    pub(crate) critical: bool,
    pub(crate) error_message: Option<String>,
}

impl StepRequest {
    /// Create a critical step with no compensation or caching.
    pub fn new<F, Fut>(name: impl Into<String>, action: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: std::future::Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        Self {
            name: name.into(),
            action: Box::new(move || Box::pin(action())),
            rollback: None,
            cache_key: None,
            cache_ttl: None,
            critical: true,
            error_message: None,
        }
    }

    /// Register the compensation invoked with the step's result on rollback.
    pub fn rollback<F, Fut>(mut self, rollback: F) -> Self
    where
        F: FnOnce(Value) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.rollback = Some(Box::new(move |result| Box::pin(rollback(result))));
        self
    }

    /// Memoize this step's result under `key`, and serve it from the cache
    /// on retry instead of re-running the action.
    pub fn cache_key(mut self, key: impl Into<String>) -> Self {
        self.cache_key = Some(key.into());
        self
    }

    /// Override the cache TTL for this step's result (defaults to the
    /// cache's standard TTL).
    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = Some(ttl);
        self
    }

    /// Tolerate failure: the step's error is logged, the caller receives
    /// `None`, and the workflow continues.
    pub fn non_critical(mut self) -> Self {
        self.critical = false;
        self
    }

    /// Custom user-facing message carried by the error if this critical
    /// step fails.
    pub fn error_message(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Step record
// ---------------------------------------------------------------------------

/// Mutable record of one step's execution inside a transaction.
///
/// Created when `execute_step` is called, transitioned in place, never
/// deleted. Holds the compensation closure until rollback consumes it.
pub struct Step {
    pub name: String,
    pub status: StepStatus,
    pub result: Option<Value>,
    pub error: Option<String>,
    pub duration_ms: u64,
    pub from_cache: bool,
    /// Error from the compensation itself, if rollback was attempted and
    /// failed. The step keeps its completed status in that case.
    pub rollback_error: Option<String>,
    pub(crate) rollback: Option<StepRollback>,
}

impl Step {
    pub(crate) fn new(name: String, rollback: Option<StepRollback>) -> Self {
        Self {
            name,
            status: StepStatus::Pending,
            result: None,
            error: None,
            duration_ms: 0,
            from_cache: false,
            rollback_error: None,
            rollback,
        }
    }

    pub fn summary(&self) -> StepSummary {
        StepSummary {
            name: self.name.clone(),
            status: self.status,
            duration_ms: self.duration_ms,
            error: self.error.clone(),
            from_cache: self.from_cache,
        }
    }
}
