//! Scoped transaction execution.
//!
//! `Transaction::run` gives workflow call sites the enter/exit discipline:
//! drive the transaction inside a closure; on error the transaction is
//! rolled back, on success it is committed (if the closure left it Active).
//! Either way, no transaction is ever left dangling in the Active state
//! when its scope ends.

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde_json::Value;

use workpass_types::transaction::{RollbackOutcome, TransactionStatus, TransactionSummary};

use crate::cache::{DurableCacheStore, ResultCache};

use super::engine::Transaction;

/// A scoped run that failed: the closure's error plus the post-rollback
/// transaction state, for translation into an operator-facing response.
#[derive(Debug)]
pub struct RunFailure<E> {
    pub error: E,
    pub summary: TransactionSummary,
    pub rollback: Vec<RollbackOutcome>,
}

impl<S: DurableCacheStore> Transaction<S> {
    /// Run a workflow closure inside a fresh transaction.
    ///
    /// The closure receives the transaction and drives its steps. If it
    /// returns `Err`, completed steps are rolled back and the error is
    /// returned together with the final summary and per-step rollback
    /// outcomes. If it returns `Ok` and the transaction is still Active,
    /// it is committed; a closure that already committed or rolled back
    /// keeps that state.
    pub async fn run<T, E, F>(
        workflow: &str,
        context: HashMap<String, Value>,
        cache: Arc<ResultCache<S>>,
        f: F,
    ) -> Result<(T, TransactionSummary), RunFailure<E>>
    where
        F: for<'a> FnOnce(&'a mut Transaction<S>) -> BoxFuture<'a, Result<T, E>>,
    {
        let mut txn = Transaction::new(workflow, context, cache);
        match f(&mut txn).await {
            Ok(value) => {
                let summary = if txn.status() == TransactionStatus::Active {
                    txn.commit()
                } else {
                    txn.get_summary()
                };
                Ok((value, summary))
            }
            Err(error) => {
                let rollback = txn.rollback().await;
                Err(RunFailure {
                    error,
                    summary: txn.get_summary(),
                    rollback,
                })
            }
        }
    }
}
