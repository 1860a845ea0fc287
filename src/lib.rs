//! archivist - load ADR documents into a vector-search collection
//!
//! This crate provides:
//! - CLI commands for managing collections and loading documents
//! - A path access control engine guarding every filesystem read
//! - Content-addressed chunk identity with collision recovery
//! - Token-bucket rate limiting for the database and embedding backends

pub mod chunk;
pub mod commands;
pub mod config;
pub mod db;
pub mod embed;
pub mod error;
pub mod identity;
pub mod pipeline;
pub mod policy;
pub mod progress;
pub mod throttle;

pub use config::Config;
pub use error::{Error, Result};
