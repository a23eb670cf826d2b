//! Collaborator ports for the enrollment workflows.
//!
//! These traits are the call signatures and failure contracts of the
//! external side-effecting services (cloud asset storage, AI headshot
//! generation, the employee directory, the roster sheet). Implementations
//! wrap third-party SaaS clients and live outside this crate; tests use
//! in-memory fakes. Each call either returns its result or fails with an
//! opaque error -- soft-failure conventions are not part of the contract.
//! Uses RPITIT (native async fn in traits, Rust 2024 edition).

use workpass_types::enrollment::{EmployeeRecord, HeadshotStyle};

/// Cloud object storage for uploaded images.
pub trait AssetStorage: Send + Sync {
    /// Upload a named blob, returning its public URL.
    fn upload(
        &self,
        name: &str,
        bytes: &[u8],
    ) -> impl std::future::Future<Output = anyhow::Result<String>> + Send;

    /// Delete a previously uploaded asset by URL.
    fn delete(&self, url: &str) -> impl std::future::Future<Output = anyhow::Result<()>> + Send;
}

/// AI headshot generation from an uploaded source photo.
pub trait HeadshotGenerator: Send + Sync {
    /// Generate a styled ID headshot, returning the generated asset's URL.
    fn generate(
        &self,
        source_url: &str,
        style: HeadshotStyle,
    ) -> impl std::future::Future<Output = anyhow::Result<String>> + Send;

    /// Discard a generated asset by URL.
    fn discard(&self, url: &str) -> impl std::future::Future<Output = anyhow::Result<()>> + Send;
}

/// The relational employee directory.
pub trait EmployeeDirectory: Send + Sync {
    /// Insert an employee row, returning its assigned id.
    fn insert(
        &self,
        record: &EmployeeRecord,
    ) -> impl std::future::Future<Output = anyhow::Result<i64>> + Send;

    /// Delete an employee row by id.
    fn delete(
        &self,
        employee_id: i64,
    ) -> impl std::future::Future<Output = anyhow::Result<()>> + Send;
}

/// The HR roster spreadsheet/bitable.
pub trait RosterSheet: Send + Sync {
    /// Append an employee row, returning the sheet's row reference.
    fn append(
        &self,
        employee_id: i64,
        record: &EmployeeRecord,
    ) -> impl std::future::Future<Output = anyhow::Result<String>> + Send;
}
