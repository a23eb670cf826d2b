//! Multi-step workflow transactions with compensation and result caching.
//!
//! - `step` -- step requests (action + optional compensation) and records
//! - `engine` -- the `Transaction` engine: execute, commit, rollback, summarize
//! - `scope` -- scoped execution with automatic commit/rollback

pub mod engine;
pub mod scope;
pub mod step;

pub use engine::{Transaction, TransactionError};
pub use scope::RunFailure;
pub use step::StepRequest;
