use thiserror::Error;

/// Errors from durable cache store operations (used by trait definitions in
/// workpass-core).
///
/// The result cache treats every variant as a miss -- the durable tier is
/// best-effort and never a source of hard failure.
#[derive(Debug, Error)]
pub enum CacheStoreError {
    #[error("cache store connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}
