//! Engine-facing side of the bridge: the chain data capability, per-thread client caching
//! and synchronization.

pub mod buckets;
pub mod fetcher;
pub mod pool;
pub mod sync;
pub mod types;

pub use buckets::{AddressBucket, DEFAULT_BUCKET_THRESHOLD, partition_addresses};
pub use fetcher::{BlockchainClient, IndexerApi, RawTransactionRecord, TransactionFetcher};
pub use pool::ThreadLocalClientPool;
pub use sync::{SyncEventAggregator, SyncOrchestrator, SyncOutcome, SyncState, WalletEngine};
pub use types::*;
