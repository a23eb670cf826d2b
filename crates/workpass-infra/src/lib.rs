//! Infrastructure layer for Workpass.
//!
//! Contains implementations of the ports defined in `workpass-core`:
//! the SQLite-backed durable cache store.

pub mod sqlite;
