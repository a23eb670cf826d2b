//! Transaction engine and result cache for Workpass.
//!
//! This crate defines the workflow transaction core and the "ports" that the
//! infrastructure layer implements (the durable cache store, the external
//! collaborators). It depends only on `workpass-types` -- never on
//! `workpass-infra` or any database/IO crate.

pub mod cache;
pub mod service;
pub mod transaction;
