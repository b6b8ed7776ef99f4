//! Resolution engine for linkcard.
//!
//! This crate provides URL normalization, the HTTP fetch pipeline, HTML
//! meta extraction, favicon probing, and the dual-source resolver that
//! orchestrates them into cached `MetadataRecord`s.

pub mod backend;
pub mod error;
pub mod extract;
pub mod favicon;
pub mod fetch;
pub mod resolve;

pub use backend::{BackendRetrieve, HttpBackend};
pub use error::StrategyError;
pub use extract::extract_meta;
pub use favicon::probe_favicon;
pub use fetch::{FetchClient, FetchConfig, PageFetch, url::NormalizedUrl, url::normalize};
pub use resolve::Resolver;
