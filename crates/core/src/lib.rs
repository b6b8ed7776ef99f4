//! Core types and shared functionality for linkcard.
//!
//! This crate provides:
//! - The `MetadataRecord` data model and resolution options
//! - An in-memory TTL cache store
//! - The curated known-site registry
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod registry;
pub mod types;

pub use cache::MetaCache;
pub use config::AppConfig;
pub use error::Error;
pub use registry::Registry;
pub use types::{MetadataRecord, PartialMeta, ResolveOptions, ResolvePolicy};
