//! Transaction and step lifecycle types.
//!
//! A transaction is one multi-step enrollment workflow; steps are the named
//! units of work inside it. These types carry no behavior beyond status
//! queries -- the engine that drives them lives in `workpass-core`.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Transaction lifecycle
// ---------------------------------------------------------------------------

/// Overall status of a workflow transaction.
///
/// `Active` is the only state that accepts further steps. `Committed` and
/// `RolledBack` are terminal. `Failed` is reserved for engine-level failure
/// (as opposed to step failure, which leaves the transaction `Active` for
/// the caller to roll back); no nominal code path produces it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Active,
    Committed,
    RollingBack,
    RolledBack,
    Failed,
}

impl TransactionStatus {
    /// Stable lowercase name, used in logs and summaries.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Committed => "committed",
            Self::RollingBack => "rolling_back",
            Self::RolledBack => "rolled_back",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Step lifecycle
// ---------------------------------------------------------------------------

/// Status of an individual step within a transaction.
///
/// `Cached` is a terminal success served from the result cache; it is
/// equivalent to `Completed` for rollback purposes. `RolledBack` is reached
/// only after the step's compensation ran successfully.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cached,
    RolledBack,
}

impl StepStatus {
    /// Stable lowercase name, used in logs and summaries.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cached => "cached",
            Self::RolledBack => "rolled_back",
        }
    }

    /// Whether this step finished successfully (live or from cache) and is
    /// therefore a candidate for compensation.
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed | Self::Cached)
    }
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Summaries (operator-facing snapshots)
// ---------------------------------------------------------------------------

/// Point-in-time snapshot of one step, embedded in `TransactionSummary`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepSummary {
    pub name: String,
    pub status: StepStatus,
    pub duration_ms: u64,
    /// Error string if the step (not its rollback) failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub from_cache: bool,
}

/// Side-effect-free snapshot of a transaction.
///
/// Usable both for success responses and for error responses after a
/// failed/rolled-back transaction, so operators can see exactly which step
/// failed and which compensations ran.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionSummary {
    pub transaction_id: Uuid,
    pub workflow: String,
    pub status: TransactionStatus,
    pub total_steps: usize,
    pub completed_steps: usize,
    pub cached_steps: usize,
    pub elapsed_ms: u64,
    pub steps: Vec<StepSummary>,
}

// ---------------------------------------------------------------------------
// Rollback outcomes
// ---------------------------------------------------------------------------

/// What happened to one step during the rollback sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RollbackStatus {
    /// The step's compensation ran successfully.
    RolledBack,
    /// The step's compensation failed; the effect may persist.
    Failed(String),
    /// The step had no compensation registered.
    NoRollback,
}

/// Per-step outcome record returned by `Transaction::rollback`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbackOutcome {
    pub step: String,
    pub status: RollbackStatus,
}
