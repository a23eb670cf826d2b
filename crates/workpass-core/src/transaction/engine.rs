//! Workflow transaction engine.
//!
//! A `Transaction` drives an ordered sequence of named steps, each wrapping
//! a side-effecting action and an optional compensation. Step results are
//! memoized through the two-tier result cache so retried workflows skip
//! completed expensive work. On critical failure the caller rolls back,
//! unwinding completed steps in reverse completion order.
//!
//! A transaction is single-owner: it is created, driven through sequential
//! `execute_step` calls by one request handler, then committed or rolled
//! back. Only the cache is shared across concurrent transactions.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use uuid::Uuid;

use workpass_types::transaction::{
    RollbackOutcome, RollbackStatus, StepStatus, TransactionStatus, TransactionSummary,
};

use crate::cache::{DurableCacheStore, ResultCache};

use super::step::{Step, StepRequest};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors surfaced by `Transaction::execute_step`.
#[derive(Debug, thiserror::Error)]
pub enum TransactionError {
    /// A step was attempted on a transaction that is no longer active.
    #[error("transaction {transaction_id} ({workflow}) is {status}, not active")]
    NotActive {
        transaction_id: Uuid,
        workflow: String,
        status: TransactionStatus,
    },

    /// A critical step failed. `message` is suitable for surfacing to an
    /// end user; `source` is the underlying cause for diagnostics.
    #[error("{message}")]
    StepFailed {
        transaction_id: Uuid,
        step: String,
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

impl TransactionError {
    /// Name of the step that failed, if this is a step failure.
    pub fn step(&self) -> Option<&str> {
        match self {
            Self::StepFailed { step, .. } => Some(step),
            Self::NotActive { .. } => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Transaction
// ---------------------------------------------------------------------------

/// One logical multi-step business operation.
///
/// Generic over `S: DurableCacheStore` so the same engine runs against the
/// SQLite-backed cache in production and an in-memory store in tests.
pub struct Transaction<S: DurableCacheStore> {
    id: Uuid,
    workflow: String,
    context: HashMap<String, Value>,
    status: TransactionStatus,
    steps: Vec<Step>,
    /// Indices into `steps`, in completion order. Rollback walks this in
    /// reverse.
    completed: Vec<usize>,
    /// Step name -> result, for lookup by later steps.
    results: HashMap<String, Value>,
    started: Instant,
    cache: Arc<ResultCache<S>>,
}

impl<S: DurableCacheStore> Transaction<S> {
    /// Open a transaction for `workflow` with a fresh random id.
    ///
    /// `context` is an arbitrary description of the business request (e.g.
    /// which applicant this workflow concerns), carried for observability.
    pub fn new(
        workflow: impl Into<String>,
        context: HashMap<String, Value>,
        cache: Arc<ResultCache<S>>,
    ) -> Self {
        let id = Uuid::now_v7();
        let workflow = workflow.into();
        tracing::info!(transaction_id = %id, workflow = %workflow, "transaction started");
        Self {
            id,
            workflow,
            context,
            status: TransactionStatus::Active,
            steps: Vec::new(),
            completed: Vec::new(),
            results: HashMap::new(),
            started: Instant::now(),
            cache,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn workflow(&self) -> &str {
        &self.workflow
    }

    pub fn status(&self) -> TransactionStatus {
        self.status
    }

    pub fn context(&self) -> &HashMap<String, Value> {
        &self.context
    }

    /// Execute one named step.
    ///
    /// If the request carries a cache key and the cache holds a live value,
    /// the action is never invoked: the step is recorded as `Cached` with
    /// zero duration and the cached value is returned. Otherwise the action
    /// runs; on success the result is recorded (and cached when a key was
    /// given and the result is non-null).
    ///
    /// A failing critical step returns `TransactionError::StepFailed` and
    /// leaves the transaction `Active` -- the caller decides whether to
    /// roll back; nothing is unwound inline. A failing non-critical step
    /// is logged and absorbed: the caller receives `Ok(None)` and the
    /// workflow continues.
    pub async fn execute_step(
        &mut self,
        request: StepRequest,
    ) -> Result<Option<Value>, TransactionError> {
        if self.status != TransactionStatus::Active {
            tracing::warn!(
                transaction_id = %self.id,
                step = %request.name,
                status = %self.status,
                "step attempted on non-active transaction"
            );
            return Err(TransactionError::NotActive {
                transaction_id: self.id,
                workflow: self.workflow.clone(),
                status: self.status,
            });
        }

        let StepRequest {
            name,
            action,
            rollback,
            cache_key,
            cache_ttl,
            critical,
            error_message,
        } = request;

        let index = self.steps.len();
        self.steps.push(Step::new(name.clone(), rollback));

        if let Some(key) = &cache_key {
            if let Some(value) = self.cache.get(key).await {
                tracing::debug!(
                    transaction_id = %self.id,
                    step = %name,
                    cache_key = %key,
                    "step served from cache"
                );
                let step = &mut self.steps[index];
                step.status = StepStatus::Cached;
                step.from_cache = true;
                step.result = Some(value.clone());
                self.completed.push(index);
                self.results.insert(name, value.clone());
                return Ok(Some(value));
            }
        }

        self.steps[index].status = StepStatus::Running;
        let start = Instant::now();

        match action().await {
            Ok(value) => {
                let duration_ms = start.elapsed().as_millis() as u64;
                let step = &mut self.steps[index];
                step.status = StepStatus::Completed;
                step.duration_ms = duration_ms;
                step.result = Some(value.clone());
                self.completed.push(index);
                self.results.insert(name.clone(), value.clone());

                if let Some(key) = cache_key {
                    // A null result carries nothing worth reusing.
                    if !value.is_null() {
                        self.cache.set(&key, value.clone(), cache_ttl).await;
                    }
                }

                tracing::debug!(
                    transaction_id = %self.id,
                    step = %name,
                    duration_ms,
                    "step completed"
                );
                Ok(Some(value))
            }
            Err(cause) => {
                let duration_ms = start.elapsed().as_millis() as u64;
                let step = &mut self.steps[index];
                step.status = StepStatus::Failed;
                step.duration_ms = duration_ms;
                step.error = Some(cause.to_string());

                if critical {
                    let message = error_message
                        .unwrap_or_else(|| format!("step '{name}' failed: {cause}"));
                    tracing::error!(
                        transaction_id = %self.id,
                        step = %name,
                        error = %cause,
                        duration_ms,
                        "critical step failed"
                    );
                    Err(TransactionError::StepFailed {
                        transaction_id: self.id,
                        step: name,
                        message,
                        source: cause,
                    })
                } else {
                    tracing::warn!(
                        transaction_id = %self.id,
                        step = %name,
                        error = %cause,
                        duration_ms,
                        "non-critical step failed, continuing"
                    );
                    Ok(None)
                }
            }
        }
    }

    /// Look up a prior step's result by name.
    pub fn get_step_result(&self, name: &str) -> Option<&Value> {
        self.results.get(name)
    }

    /// Unwind completed steps in reverse completion order.
    ///
    /// The contract is strict LIFO over completion order -- later effects
    /// are undone before earlier ones, so any dependency of a later step on
    /// an earlier one's effect is respected without the engine knowing step
    /// semantics. Each registered compensation is invoked with the step's
    /// stored result; a failing compensation is logged and recorded but
    /// never aborts the remaining sequence, and the transaction always
    /// reaches `RolledBack`. Best-effort, not ACID: a failed compensation
    /// leaves a real inconsistency that is logged, not retried.
    ///
    /// Calling this on a `Committed` or already `RolledBack` transaction is
    /// a warned no-op returning no outcomes.
    pub async fn rollback(&mut self) -> Vec<RollbackOutcome> {
        if matches!(
            self.status,
            TransactionStatus::Committed | TransactionStatus::RolledBack
        ) {
            tracing::warn!(
                transaction_id = %self.id,
                status = %self.status,
                "rollback requested on finished transaction, ignoring"
            );
            return Vec::new();
        }

        self.status = TransactionStatus::RollingBack;
        tracing::info!(
            transaction_id = %self.id,
            workflow = %self.workflow,
            completed_steps = self.completed.len(),
            "rolling back transaction"
        );

        let order: Vec<usize> = self.completed.iter().rev().copied().collect();
        let mut outcomes = Vec::with_capacity(order.len());

        for index in order {
            let (name, result, rollback) = {
                let step = &mut self.steps[index];
                if !step.status.is_completed() {
                    continue;
                }
                (
                    step.name.clone(),
                    step.result.clone().unwrap_or(Value::Null),
                    step.rollback.take(),
                )
            };

            let Some(rollback) = rollback else {
                tracing::debug!(
                    transaction_id = %self.id,
                    step = %name,
                    "no rollback registered for step"
                );
                outcomes.push(RollbackOutcome {
                    step: name,
                    status: RollbackStatus::NoRollback,
                });
                continue;
            };

            match rollback(result).await {
                Ok(()) => {
                    self.steps[index].status = StepStatus::RolledBack;
                    tracing::debug!(transaction_id = %self.id, step = %name, "step rolled back");
                    outcomes.push(RollbackOutcome {
                        step: name,
                        status: RollbackStatus::RolledBack,
                    });
                }
                Err(error) => {
                    tracing::error!(
                        transaction_id = %self.id,
                        step = %name,
                        %error,
                        "rollback failed for step, continuing with remaining steps"
                    );
                    self.steps[index].rollback_error = Some(error.to_string());
                    outcomes.push(RollbackOutcome {
                        step: name,
                        status: RollbackStatus::Failed(error.to_string()),
                    });
                }
            }
        }

        self.status = TransactionStatus::RolledBack;
        tracing::info!(
            transaction_id = %self.id,
            steps = outcomes.len(),
            "transaction rolled back"
        );
        outcomes
    }

    /// Commit the transaction. No further steps may execute afterward.
    ///
    /// Committing a non-active transaction is a warned no-op returning the
    /// current summary.
    pub fn commit(&mut self) -> TransactionSummary {
        if self.status != TransactionStatus::Active {
            tracing::warn!(
                transaction_id = %self.id,
                status = %self.status,
                "commit on non-active transaction, returning current summary"
            );
            return self.get_summary();
        }

        self.status = TransactionStatus::Committed;
        let summary = self.get_summary();
        tracing::info!(
            transaction_id = %self.id,
            workflow = %self.workflow,
            total_steps = summary.total_steps,
            cached_steps = summary.cached_steps,
            elapsed_ms = summary.elapsed_ms,
            "transaction committed"
        );
        summary
    }

    /// Point-in-time, side-effect-free snapshot of the transaction.
    pub fn get_summary(&self) -> TransactionSummary {
        TransactionSummary {
            transaction_id: self.id,
            workflow: self.workflow.clone(),
            status: self.status,
            total_steps: self.steps.len(),
            completed_steps: self.completed.len(),
            cached_steps: self.steps.iter().filter(|s| s.from_cache).count(),
            elapsed_ms: self.started.elapsed().as_millis() as u64,
            steps: self.steps.iter().map(Step::summary).collect(),
        }
    }
}
