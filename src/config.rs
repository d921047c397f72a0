//! Configuration for the indexer client, the transaction fetcher and the sync loop.

use crate::indexer::RetryPolicy;
use std::time::Duration;

/// Default public endpoint of the indexing service.
pub const DEFAULT_ENDPOINT: &str = "https://api.blockset.com";

/// Connection settings for [`IndexerClient`](crate::indexer::IndexerClient).
#[derive(Debug, Clone)]
pub struct IndexerConfig {
	/// Base URL every resource path is appended to.
	pub endpoint: String,
	/// Bearer token for authenticated calls, if already known.
	pub token: Option<String>,
	/// Timeout for a single HTTP request.
	pub request_timeout: Duration,
	/// Retry policy for blockchain and transaction reads.
	pub retry: RetryPolicy,
}

impl Default for IndexerConfig {
	fn default() -> Self {
		Self {
			endpoint: DEFAULT_ENDPOINT.to_string(),
			token: None,
			request_timeout: Duration::from_secs(30),
			retry: RetryPolicy::default(),
		}
	}
}

impl IndexerConfig {
	/// Load from `INDEXER_ENDPOINT`, `INDEXER_TOKEN` and `INDEXER_TIMEOUT_SECS`, falling back
	/// to the defaults for anything unset or unparsable.
	pub fn from_env() -> Self {
		Self::from_vars(|key| std::env::var(key).ok())
	}

	/// Same as [`from_env`](Self::from_env), reading variables through `var`.
	pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
		let defaults = Self::default();

		let endpoint = var("INDEXER_ENDPOINT").unwrap_or(defaults.endpoint);
		let token = var("INDEXER_TOKEN").filter(|t| !t.trim().is_empty());
		let request_timeout = var("INDEXER_TIMEOUT_SECS")
			.and_then(|s| s.trim().parse::<u64>().ok())
			.map(Duration::from_secs)
			.unwrap_or(defaults.request_timeout);

		tracing::debug!(
			endpoint = %endpoint,
			has_token = token.is_some(),
			timeout_secs = request_timeout.as_secs(),
			"Loaded indexer configuration"
		);

		Self {
			endpoint,
			token,
			request_timeout,
			retry: defaults.retry,
		}
	}

	pub fn with_token(mut self, token: impl Into<String>) -> Self {
		self.token = Some(token.into());
		self
	}
}

/// Settings for [`TransactionFetcher`](crate::wallet::TransactionFetcher).
#[derive(Debug, Clone)]
pub struct FetcherConfig {
	/// Maximum cumulative address bytes per request.
	pub bucket_threshold: usize,
	/// Emit per-call progress logs.
	pub enable_logging: bool,
}

impl Default for FetcherConfig {
	fn default() -> Self {
		Self {
			bucket_threshold: crate::wallet::DEFAULT_BUCKET_THRESHOLD,
			enable_logging: true,
		}
	}
}

/// Timing of the sync orchestrator
#[derive(Debug, Clone)]
pub struct SyncConfig {
	/// How often the event buffers are checked for a terminal event
	pub poll_interval: Duration,
	/// Pause before issuing `sync` and again before `connect`
	pub settle_delay: Duration,
}

impl Default for SyncConfig {
	fn default() -> Self {
		Self {
			poll_interval: Duration::from_millis(100),
			settle_delay: Duration::from_millis(100),
		}
	}
}
