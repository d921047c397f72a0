//! Engine-facing chain data capability backed by the indexing service.
//!
//! The sync engine pulls block heights and raw transactions through [`BlockchainClient`].
//! [`TransactionFetcher`] implements it by bucketing the engine's address set, issuing one
//! transaction listing per bucket (following pagination links) and decoding every
//! transaction's base64 payload into a [`RawTransactionRecord`].

use super::buckets::partition_addresses;
use crate::config::FetcherConfig;
use crate::indexer::{
	BLOCK_HEIGHT_UNBOUND, Blockchain, IndexerClient, IndexerError, TransactionPage,
	TransactionQuery, TransactionResource, TransactionStatus,
};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::future::Future;
use tracing::{debug, error, info};

/// A transaction as handed to the sync engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTransactionRecord {
	pub status: TransactionStatus,
	/// Unix timestamp in seconds.
	pub timestamp: i64,
	/// `BLOCK_HEIGHT_UNBOUND` while pending.
	pub block_height: u64,
	/// Serialized transaction bytes.
	pub data: Vec<u8>,
}

impl TryFrom<TransactionResource> for RawTransactionRecord {
	type Error = IndexerError;

	fn try_from(resource: TransactionResource) -> Result<Self, Self::Error> {
		let raw = resource.raw.ok_or_else(|| {
			IndexerError::Decode(format!(
				"transaction {} has no raw payload",
				resource.transaction_id
			))
		})?;
		let data = STANDARD.decode(raw.as_bytes()).map_err(|e| {
			IndexerError::Decode(format!(
				"transaction {} raw payload: {}",
				resource.transaction_id, e
			))
		})?;

		Ok(Self {
			status: resource.status,
			timestamp: resource.timestamp.timestamp(),
			block_height: resource.block_height.unwrap_or(BLOCK_HEIGHT_UNBOUND),
			data,
		})
	}
}

/// Chain data capability the sync engine calls into, possibly from several threads.
#[async_trait]
pub trait BlockchainClient: Send + Sync {
	/// Current height of `blockchain_id`.
	async fn get_block_height(&self, blockchain_id: &str) -> Result<u64, IndexerError>;

	/// All transactions touching `addresses` between the two heights.
	///
	/// Any unrecovered request failure aborts the whole call; no partial result is returned.
	async fn get_raw_transactions(
		&self,
		blockchain_id: &str,
		addresses: &[String],
		currency: &str,
		start_height: u64,
		end_height: u64,
	) -> Result<Vec<RawTransactionRecord>, IndexerError>;
}

/// The indexer reads the fetcher depends on.
#[async_trait]
pub trait IndexerApi: Send + Sync {
	async fn get_blockchain(&self, blockchain_id: &str) -> Result<Blockchain, IndexerError>;

	async fn get_transactions(
		&self,
		query: &TransactionQuery,
	) -> Result<TransactionPage, IndexerError>;

	async fn get_transactions_page(&self, href: &str) -> Result<TransactionPage, IndexerError>;
}

#[async_trait]
impl IndexerApi for IndexerClient {
	async fn get_blockchain(&self, blockchain_id: &str) -> Result<Blockchain, IndexerError> {
		IndexerClient::get_blockchain(self, blockchain_id).await
	}

	async fn get_transactions(
		&self,
		query: &TransactionQuery,
	) -> Result<TransactionPage, IndexerError> {
		IndexerClient::get_transactions(self, query).await
	}

	async fn get_transactions_page(&self, href: &str) -> Result<TransactionPage, IndexerError> {
		IndexerClient::get_transactions_page(self, href).await
	}
}

/// Log any error from `operation` under `name` before handing it back unchanged.
pub async fn report_errors<T, Fut>(name: &str, operation: Fut) -> Result<T, IndexerError>
where
	Fut: Future<Output = Result<T, IndexerError>>,
{
	let result = operation.await;
	if let Err(e) = &result {
		error!("[TransactionFetcher] {} failed: {}", name, e);
	}
	result
}

/// Remote-service-backed implementation of [`BlockchainClient`].
pub struct TransactionFetcher<A = IndexerClient> {
	api: A,
	config: FetcherConfig,
}

impl<A: IndexerApi> TransactionFetcher<A> {
	pub fn new(api: A, config: FetcherConfig) -> Self {
		Self { api, config }
	}

	pub fn api(&self) -> &A {
		&self.api
	}

	async fn block_height(&self, blockchain_id: &str) -> Result<u64, IndexerError> {
		self.log(format_args!("get_block_height blockchain_id={}", blockchain_id));
		let blockchain = self.api.get_blockchain(blockchain_id).await?;
		let height = blockchain.block_height.ok_or(IndexerError::NoData)?;
		self.log(format_args!(
			"get_block_height completed blockchain_id={} block_height={}",
			blockchain_id, height
		));
		Ok(height)
	}

	async fn raw_transactions(
		&self,
		blockchain_id: &str,
		addresses: &[String],
		currency: &str,
		start_height: u64,
		end_height: u64,
	) -> Result<Vec<RawTransactionRecord>, IndexerError> {
		self.log(format_args!(
			"get_raw_transactions blockchain_id={} currency={} addresses={} start={} end={}",
			blockchain_id,
			currency,
			addresses.len(),
			start_height,
			end_height
		));

		let buckets = partition_addresses(addresses.iter().cloned(), self.config.bucket_threshold);
		let bucket_lens: Vec<usize> = buckets.iter().map(|b| b.len()).collect();
		self.log(format_args!(
			"get_raw_transactions making {} requests {:?}",
			buckets.len(),
			bucket_lens
		));

		let mut records = Vec::new();
		for bucket in buckets {
			let query = TransactionQuery::new(blockchain_id)
				.addresses(bucket.into_addresses())
				.heights(start_height, end_height)
				.include_raw(true);
			records.extend(self.fetch_bucket(&query).await?);
		}

		self.log(format_args!(
			"get_raw_transactions finished blockchain_id={} tx_count={}",
			blockchain_id,
			records.len()
		));
		Ok(records)
	}

	/// Every page of one bucket, decoded in response order.
	async fn fetch_bucket(
		&self,
		query: &TransactionQuery,
	) -> Result<Vec<RawTransactionRecord>, IndexerError> {
		let mut records = Vec::new();
		let mut page = self.api.get_transactions(query).await?;

		loop {
			let next = page.next.take();
			for transaction in page.transactions {
				records.push(RawTransactionRecord::try_from(transaction)?);
			}

			match next {
				Some(href) => {
					debug!("Following next page {}", href);
					page = self.api.get_transactions_page(&href).await?;
				}
				None => break,
			}
		}
		Ok(records)
	}

	fn log(&self, message: std::fmt::Arguments<'_>) {
		if self.config.enable_logging {
			info!("[TransactionFetcher] {}", message);
		}
	}
}

#[async_trait]
impl<A: IndexerApi> BlockchainClient for TransactionFetcher<A> {
	async fn get_block_height(&self, blockchain_id: &str) -> Result<u64, IndexerError> {
		report_errors("get_block_height", self.block_height(blockchain_id)).await
	}

	async fn get_raw_transactions(
		&self,
		blockchain_id: &str,
		addresses: &[String],
		currency: &str,
		start_height: u64,
		end_height: u64,
	) -> Result<Vec<RawTransactionRecord>, IndexerError> {
		report_errors(
			"get_raw_transactions",
			self.raw_transactions(blockchain_id, addresses, currency, start_height, end_height),
		)
		.await
	}
}
