//! Event system for wallet synchronization.
//!
//! The sync engine reports progress through [`WalletManagerListener`] from its own worker
//! threads. Three event families exist: wallet-manager events (connection state, sync
//! progress, block height), wallet events (balance and fee changes, transfers attached to
//! a wallet) and transfer events (a single transfer's lifecycle).
//!
//! [`SyncEventAggregator`] is the listener used by the orchestrator. It buffers each family
//! in arrival order until the buffers are drained.

use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Connection state of a wallet manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WalletManagerState {
    Created,
    Disconnected { reason: DisconnectReason },
    Connected,
    Syncing,
    Deleted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DisconnectReason {
    Requested,
    Unknown,
    Posix { errno: i32, message: Option<String> },
}

/// Why a sync ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncStoppedReason {
    Complete,
    Requested,
    Unknown,
    Posix { errno: i32, message: Option<String> },
}

/// How far back the engine suggests re-syncing from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncDepth {
    FromLastConfirmedSend,
    FromLastTrustedBlock,
    FromCreation,
}

/// Events about the wallet manager as a whole
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WalletManagerEvent {
    Created,
    Changed {
        old_state: WalletManagerState,
        new_state: WalletManagerState,
    },
    Deleted,
    WalletAdded {
        wallet_id: String,
    },
    WalletChanged {
        wallet_id: String,
    },
    WalletDeleted {
        wallet_id: String,
    },
    SyncStarted,
    /// Sync progress; `timestamp` is the unix time of the last processed block, if known.
    SyncContinues {
        timestamp: Option<u64>,
        percent_complete: f32,
    },
    /// Terminal event of a sync run.
    SyncStopped {
        reason: SyncStoppedReason,
    },
    SyncRecommended {
        depth: SyncDepth,
    },
    BlockHeightUpdated {
        height: u64,
    },
}

impl WalletManagerEvent {
    pub fn is_sync_stopped(&self) -> bool {
        matches!(self, WalletManagerEvent::SyncStopped { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WalletEventKind {
    Created,
    /// New balance in the currency's base unit.
    BalanceUpdated { amount: String },
    FeeBasisUpdated { fee_per_kb: u64 },
    FeeBasisEstimated { cookie: u64, fee: Option<u64> },
    TransferAdded { transfer_id: String },
    TransferChanged { transfer_id: String },
    TransferSubmitted { transfer_id: String },
    TransferDeleted { transfer_id: String },
    Deleted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletEvent {
    pub wallet_id: String,
    pub kind: WalletEventKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferState {
    Created,
    Signed,
    Submitted,
    Included { block_height: u64, success: bool },
    Errored { message: String },
    Deleted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferEventKind {
    Created,
    Changed {
        old_state: TransferState,
        new_state: TransferState,
    },
    Deleted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferEvent {
    pub wallet_id: String,
    pub transfer_id: String,
    pub kind: TransferEventKind,
}

/// Any event the engine can report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SyncEvent {
    WalletManager(WalletManagerEvent),
    Wallet(WalletEvent),
    Transfer(TransferEvent),
}

/// Progress listener the sync engine calls back into.
///
/// Called from engine worker threads; implementations must return quickly.
pub trait WalletManagerListener: Send + Sync {
    fn on_wallet_manager_event(&self, event: WalletManagerEvent);

    fn on_wallet_event(&self, event: WalletEvent);

    fn on_transfer_event(&self, event: TransferEvent);

    /// Route an event of any family to its entry point.
    fn on_event(&self, event: SyncEvent) {
        match event {
            SyncEvent::WalletManager(e) => self.on_wallet_manager_event(e),
            SyncEvent::Wallet(e) => self.on_wallet_event(e),
            SyncEvent::Transfer(e) => self.on_transfer_event(e),
        }
    }
}

/// The three event streams taken out of an aggregator in one step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DrainedEvents {
    pub wallet_manager_events: Vec<WalletManagerEvent>,
    pub wallet_events: Vec<WalletEvent>,
    pub transfer_events: Vec<TransferEvent>,
}

impl DrainedEvents {
    pub fn is_empty(&self) -> bool {
        self.wallet_manager_events.is_empty()
            && self.wallet_events.is_empty()
            && self.transfer_events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.wallet_manager_events.len() + self.wallet_events.len() + self.transfer_events.len()
    }

    fn contains_sync_stopped(&self) -> bool {
        self.wallet_manager_events
            .iter()
            .any(WalletManagerEvent::is_sync_stopped)
    }
}

/// Listener that buffers every event until drained.
///
/// All three buffers sit behind one lock, so appends never interleave and a drain sees a
/// consistent snapshot of all of them.
#[derive(Debug, Default)]
pub struct SyncEventAggregator {
    buffers: Mutex<DrainedEvents>,
}

impl SyncEventAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    fn buffers(&self) -> MutexGuard<'_, DrainedEvents> {
        self.buffers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Take all buffered events, leaving the buffers empty.
    pub fn drain(&self) -> DrainedEvents {
        std::mem::take(&mut *self.buffers())
    }

    /// Whether a `SyncStopped` event is buffered and not yet drained.
    pub fn is_stopped(&self) -> bool {
        self.buffers().contains_sync_stopped()
    }

    /// Drain only if a `SyncStopped` event is buffered, checked under the same lock.
    pub fn take_if_stopped(&self) -> Option<DrainedEvents> {
        let mut buffers = self.buffers();
        if buffers.contains_sync_stopped() {
            Some(std::mem::take(&mut *buffers))
        } else {
            None
        }
    }

    /// Number of buffered events across all three streams.
    pub fn len(&self) -> usize {
        self.buffers().len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers().is_empty()
    }
}

impl WalletManagerListener for SyncEventAggregator {
    fn on_wallet_manager_event(&self, event: WalletManagerEvent) {
        tracing::debug!("Wallet manager event: {:?}", event);
        self.buffers().wallet_manager_events.push(event);
    }

    fn on_wallet_event(&self, event: WalletEvent) {
        tracing::debug!("Wallet event: {:?}", event);
        self.buffers().wallet_events.push(event);
    }

    fn on_transfer_event(&self, event: TransferEvent) {
        tracing::debug!("Transfer event: {:?}", event);
        self.buffers().transfer_events.push(event);
    }
}
