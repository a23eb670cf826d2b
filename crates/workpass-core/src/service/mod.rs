//! Workflow call sites: the services that assemble step sequences.
//!
//! Each service owns a set of collaborator ports and the shared result
//! cache, builds the step sequence for one workflow, and translates a
//! failed run (error + rollback outcomes + summary) into an
//! operator-facing failure.

pub mod collaborators;
pub mod enrollment;
pub mod headshot;

use sha2::{Digest, Sha256};
use thiserror::Error;

use workpass_types::transaction::{RollbackOutcome, TransactionSummary};

use crate::transaction::TransactionError;

pub use collaborators::{AssetStorage, EmployeeDirectory, HeadshotGenerator, RosterSheet};
pub use enrollment::EnrollmentService;
pub use headshot::HeadshotService;

/// A workflow that failed and was rolled back.
///
/// Carries the transaction summary and per-step rollback outcomes so the
/// response layer can show operators exactly which step failed and which
/// compensations ran.
#[derive(Debug, Error)]
#[error("workflow '{workflow}' failed: {source}")]
pub struct WorkflowFailure {
    pub workflow: String,
    #[source]
    pub source: TransactionError,
    pub summary: TransactionSummary,
    pub rollback: Vec<RollbackOutcome>,
}

/// Lowercase hex SHA-256 of raw content bytes.
///
/// Used to build deterministic cache keys for uploaded images: the bytes
/// are too long to embed in a key literally, the hash is stable across
/// client retries of the same submission.
pub(crate) fn content_hash(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    format!("{digest:x}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_hash_known_value() {
        // SHA-256 of the empty byte string
        assert_eq!(
            content_hash(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_content_hash_deterministic() {
        let photo = vec![0xff, 0xd8, 0xff, 0xe0];
        assert_eq!(content_hash(&photo), content_hash(&photo));
        assert_ne!(content_hash(&photo), content_hash(b"other"));
    }
}
