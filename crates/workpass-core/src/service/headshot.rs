//! AI headshot generation workflow.
//!
//! Two critical steps: upload the source photo, then run AI generation.
//! Both are memoized -- the generation result with the extended 24-hour
//! TTL, since re-running the model is the most expensive call in the
//! system and clients routinely retry after transient downstream failures.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Value, json};

use workpass_types::enrollment::{HeadshotRequest, HeadshotResult};

use crate::cache::{DurableCacheStore, EXTENDED_TTL, ResultCache};
use crate::transaction::{StepRequest, Transaction, TransactionError};

use super::{AssetStorage, HeadshotGenerator, WorkflowFailure, content_hash};

const WORKFLOW: &str = "headshot_generation";

/// Drives the AI headshot workflow against the collaborator ports.
pub struct HeadshotService<S, A, G>
where
    S: DurableCacheStore,
    A: AssetStorage,
    G: HeadshotGenerator,
{
    cache: Arc<ResultCache<S>>,
    storage: Arc<A>,
    generator: Arc<G>,
}

impl<S, A, G> HeadshotService<S, A, G>
where
    S: DurableCacheStore,
    A: AssetStorage + 'static,
    G: HeadshotGenerator + 'static,
{
    pub fn new(cache: Arc<ResultCache<S>>, storage: Arc<A>, generator: Arc<G>) -> Self {
        Self {
            cache,
            storage,
            generator,
        }
    }

    /// Generate a styled headshot from a source photo.
    pub async fn generate(
        &self,
        request: HeadshotRequest,
    ) -> Result<HeadshotResult, WorkflowFailure> {
        let context = HashMap::from([("style".to_string(), json!(request.style.as_str()))]);

        let storage = Arc::clone(&self.storage);
        let generator = Arc::clone(&self.generator);

        let run = Transaction::run(
            WORKFLOW,
            context,
            Arc::clone(&self.cache),
            move |txn: &mut Transaction<S>| {
                Box::pin(headshot_steps(txn, storage, generator, request))
            },
        )
        .await;

        match run {
            Ok(((source_url, headshot_url), summary)) => Ok(HeadshotResult {
                source_url,
                headshot_url,
                transaction: summary,
            }),
            Err(failure) => Err(WorkflowFailure {
                workflow: WORKFLOW.to_string(),
                source: failure.error,
                summary: failure.summary,
                rollback: failure.rollback,
            }),
        }
    }
}

async fn headshot_steps<S, A, G>(
    txn: &mut Transaction<S>,
    storage: Arc<A>,
    generator: Arc<G>,
    request: HeadshotRequest,
) -> Result<(String, String), TransactionError>
where
    S: DurableCacheStore,
    A: AssetStorage + 'static,
    G: HeadshotGenerator + 'static,
{
    let photo_hash = content_hash(&request.photo);
    let style = request.style;

    let source_name = format!("headshots/source/{photo_hash}.jpg");
    let source_bytes = request.photo.clone();
    let upload_storage = Arc::clone(&storage);
    let delete_storage = Arc::clone(&storage);
    let source_url = txn
        .execute_step(
            StepRequest::new("upload_source", move || async move {
                let url = upload_storage.upload(&source_name, &source_bytes).await?;
                Ok(json!(url))
            })
            .rollback(move |result| async move {
                if let Some(url) = result.as_str() {
                    delete_storage.delete(url).await?;
                }
                Ok(())
            })
            .cache_key(format!("headshot:src:{photo_hash}"))
            .error_message("source photo upload failed"),
        )
        .await?;
    let source_url = as_string(&source_url);

    let generate_url = source_url.clone();
    let generate = Arc::clone(&generator);
    let discard = Arc::clone(&generator);
    let headshot_url = txn
        .execute_step(
            StepRequest::new("generate_headshot", move || async move {
                let url = generate.generate(&generate_url, style).await?;
                Ok(json!(url))
            })
            .rollback(move |result| async move {
                if let Some(url) = result.as_str() {
                    discard.discard(url).await?;
                }
                Ok(())
            })
            .cache_key(format!("headshot:gen:{photo_hash}:{style}"))
            .cache_ttl(EXTENDED_TTL)
            .error_message("headshot generation failed"),
        )
        .await?;
    let headshot_url = as_string(&headshot_url);

    Ok((source_url, headshot_url))
}

fn as_string(value: &Option<Value>) -> String {
    value
        .as_ref()
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}
