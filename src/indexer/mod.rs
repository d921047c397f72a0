//! Indexer integration module
//!
//! This module provides the authenticated HTTP client and the resource types of the
//! ledger-indexing service, plus the retry wrapper applied to its read endpoints.

/// Authenticated HTTP client
mod client;
/// Retry policy and wrapper for read operations
mod retry;
/// Type definitions for indexer resources
mod types;

pub use client::{IndexerClient, Session};
pub use retry::{RetryPolicy, retry_transient};
pub use types::*;
