use crate::wallet::sync::SyncState;

/// Errors from driving a sync run
#[derive(Debug, thiserror::Error)]
pub enum WalletSyncError {
	#[error("Sync already started (state {0:?})")]
	AlreadyStarted(SyncState),
}
