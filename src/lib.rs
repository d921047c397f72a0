//! Bridge between a native wallet-synchronization engine and a remote ledger-indexing
//! HTTP service.
//!
//! - [`indexer`]: authenticated, retrying client for the indexer's resources.
//! - [`wallet`]: the chain data capability the engine pulls from
//!   ([`TransactionFetcher`](wallet::TransactionFetcher) behind a
//!   [`ThreadLocalClientPool`](wallet::ThreadLocalClientPool)), the listener that buffers
//!   engine events, and the orchestrator that runs a sync to completion.

pub mod config;
pub mod indexer;
pub mod utils;
pub mod wallet;

#[cfg(test)]
mod test_support;

pub use config::{FetcherConfig, IndexerConfig, SyncConfig};
pub use indexer::{IndexerClient, IndexerError, RetryPolicy};
pub use wallet::{
	BlockchainClient, RawTransactionRecord, SyncEventAggregator, SyncOrchestrator, SyncOutcome,
	ThreadLocalClientPool, TransactionFetcher, WalletEngine, WalletSyncError,
};
