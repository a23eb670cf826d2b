//! Shared domain types for Workpass.
//!
//! This crate contains the core domain types used across the Workpass
//! enrollment platform: transaction/step lifecycle types, cache entries,
//! enrollment records, and their associated error types.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod cache;
pub mod enrollment;
pub mod error;
pub mod transaction;
