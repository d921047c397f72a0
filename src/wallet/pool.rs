//! Per-worker-thread indexer clients.
//!
//! The sync engine calls the chain data capability from its own worker threads, and an
//! HTTP session is never shared between them. [`ThreadLocalClientPool`] keys one
//! [`TransactionFetcher`] per calling thread and builds it on first use from the pool's
//! configuration and current token.

use super::fetcher::{BlockchainClient, RawTransactionRecord, TransactionFetcher};
use crate::config::{FetcherConfig, IndexerConfig};
use crate::indexer::{IndexerClient, IndexerError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::thread::{self, ThreadId};
use tracing::debug;

pub struct ThreadLocalClientPool {
	config: IndexerConfig,
	fetcher_config: FetcherConfig,
	/// Seed token for clients built from now on.
	token: RwLock<Option<String>>,
	clients: Mutex<HashMap<ThreadId, Arc<TransactionFetcher>>>,
}

impl ThreadLocalClientPool {
	pub fn new(config: IndexerConfig, fetcher_config: FetcherConfig) -> Self {
		let token = RwLock::new(config.token.clone());
		Self {
			config,
			fetcher_config,
			token,
			clients: Mutex::new(HashMap::new()),
		}
	}

	/// The fetcher bound to the calling thread, built and cached on first use.
	pub fn client_for_current_thread(&self) -> Result<Arc<TransactionFetcher>, IndexerError> {
		let thread_id = thread::current().id();
		let mut clients = self.clients.lock().unwrap_or_else(PoisonError::into_inner);

		if let Some(fetcher) = clients.get(&thread_id) {
			return Ok(fetcher.clone());
		}

		let mut config = self.config.clone();
		config.token = self
			.token
			.read()
			.unwrap_or_else(PoisonError::into_inner)
			.clone();
		let client = IndexerClient::new(&config)?;
		let fetcher = Arc::new(TransactionFetcher::new(client, self.fetcher_config.clone()));

		debug!("Created indexer client for thread {:?}", thread_id);
		clients.insert(thread_id, fetcher.clone());
		Ok(fetcher)
	}

	/// Seed token for clients created after this call. Cached clients keep their token
	/// until [`invalidate`](Self::invalidate) is called.
	pub fn set_token(&self, token: impl Into<String>) {
		*self.token.write().unwrap_or_else(PoisonError::into_inner) = Some(token.into());
	}

	/// Drop every cached client so the next call on each thread builds a fresh one.
	pub fn invalidate(&self) {
		self.clients
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.clear();
	}

	/// Number of threads with a cached client.
	pub fn len(&self) -> usize {
		self.clients
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

/// Resolves the calling thread's client when the call starts and keeps it for the rest of
/// the call.
///
/// The returned future must be polled to completion on the thread that created it, as an
/// engine worker does with `block_on` on a current-thread runtime. Polled on a work-stealing
/// runtime it may resume on another worker while still holding the first thread's client.
#[async_trait]
impl BlockchainClient for ThreadLocalClientPool {
	async fn get_block_height(&self, blockchain_id: &str) -> Result<u64, IndexerError> {
		let fetcher = self.client_for_current_thread()?;
		fetcher.get_block_height(blockchain_id).await
	}

	async fn get_raw_transactions(
		&self,
		blockchain_id: &str,
		addresses: &[String],
		currency: &str,
		start_height: u64,
		end_height: u64,
	) -> Result<Vec<RawTransactionRecord>, IndexerError> {
		let fetcher = self.client_for_current_thread()?;
		fetcher
			.get_raw_transactions(blockchain_id, addresses, currency, start_height, end_height)
			.await
	}
}
