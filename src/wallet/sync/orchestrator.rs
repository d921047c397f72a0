//! Sync orchestrator: drives one synchronization run of the wallet engine.
//!
//! The orchestrator starts the engine, then polls the [`SyncEventAggregator`] at a fixed
//! interval until the engine reports `SyncStopped` or a caller requests a stop. Either
//! way the run ends by draining the aggregator and returning everything it buffered.
//!
//! State moves IDLE -> SYNCING -> STOPPED and never goes back; a new run needs a new
//! orchestrator.

use super::events::{DrainedEvents, SyncEventAggregator, SyncStoppedReason, WalletManagerEvent};
use crate::config::SyncConfig;
use crate::wallet::WalletSyncError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::time::{MissedTickBehavior, interval, sleep};
use tracing::{debug, info};

/// Commands the orchestrator issues to the wallet engine.
pub trait WalletEngine: Send + Sync {
    /// Begin (or resume) synchronization of registered wallets.
    fn sync(&self);
    fn connect(&self);
    fn disconnect(&self);
    fn stop(&self);
}

/// Run state as observed by the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    Syncing,
    Stopped,
}

/// Requests a stop from another task. Observed at the next poll tick.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    requested: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }
}

/// Events collected over one run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncOutcome {
    pub events: DrainedEvents,
    /// The run ended on a caller stop rather than an engine `SyncStopped`.
    pub forced: bool,
}

impl SyncOutcome {
    pub fn was_forced(&self) -> bool {
        self.forced
    }

    /// Reason carried by the last `SyncStopped` event, if any.
    pub fn stop_reason(&self) -> Option<&SyncStoppedReason> {
        self.events
            .wallet_manager_events
            .iter()
            .rev()
            .find_map(|event| match event {
                WalletManagerEvent::SyncStopped { reason } => Some(reason),
                _ => None,
            })
    }

    /// Most recent block height reported during the run.
    pub fn latest_block_height(&self) -> Option<u64> {
        self.events
            .wallet_manager_events
            .iter()
            .rev()
            .find_map(|event| match event {
                WalletManagerEvent::BlockHeightUpdated { height } => Some(*height),
                _ => None,
            })
    }
}

/// Drives one run of a [`WalletEngine`] whose listener is `aggregator`.
pub struct SyncOrchestrator<E> {
    engine: Arc<E>,
    aggregator: Arc<SyncEventAggregator>,
    config: SyncConfig,
    state: Mutex<SyncState>,
    stop: StopHandle,
}

impl<E: WalletEngine> SyncOrchestrator<E> {
    pub fn new(engine: Arc<E>, aggregator: Arc<SyncEventAggregator>, config: SyncConfig) -> Self {
        Self {
            engine,
            aggregator,
            config,
            state: Mutex::new(SyncState::Idle),
            stop: StopHandle::default(),
        }
    }

    pub fn state(&self) -> SyncState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: SyncState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    /// Request a stop. The engine is disconnected and stopped on the next poll tick.
    pub fn stop(&self) {
        self.stop.stop();
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Run one sync to completion and return every event buffered along the way.
    ///
    /// No timeout is applied; wrap the returned future to impose one.
    ///
    /// # Errors
    /// `WalletSyncError::AlreadyStarted` if this orchestrator has already been started.
    pub async fn start(&self) -> Result<SyncOutcome, WalletSyncError> {
        {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            if *state != SyncState::Idle {
                return Err(WalletSyncError::AlreadyStarted(*state));
            }
            *state = SyncState::Syncing;
        }
        info!("Starting wallet synchronization");

        // Give the engine time to register its wallets before each command.
        sleep(self.config.settle_delay).await;
        self.engine.sync();
        sleep(self.config.settle_delay).await;
        self.engine.connect();

        let mut ticker = interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let outcome = loop {
            ticker.tick().await;

            if self.stop.is_requested() {
                info!("Stop requested, disconnecting engine");
                self.engine.disconnect();
                self.engine.stop();
                break SyncOutcome {
                    events: self.aggregator.drain(),
                    forced: true,
                };
            }

            if let Some(events) = self.aggregator.take_if_stopped() {
                break SyncOutcome {
                    events,
                    forced: false,
                };
            }
            debug!("Sync in progress, {} events buffered", self.aggregator.len());
        };

        self.set_state(SyncState::Stopped);
        info!(
            "Wallet synchronization finished: {} events, reason {:?}",
            outcome.events.len(),
            outcome.stop_reason()
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wallet::sync::events::{
        TransferEvent, TransferEventKind, WalletEvent, WalletEventKind, WalletManagerListener,
    };
    use std::thread;
    use std::time::Duration;

    /// Records commands; on `connect` emits a scripted event sequence from its own thread.
    struct ScriptedEngine {
        listener: Arc<SyncEventAggregator>,
        commands: Mutex<Vec<&'static str>>,
        finishes: bool,
    }

    impl ScriptedEngine {
        fn new(listener: Arc<SyncEventAggregator>, finishes: bool) -> Arc<Self> {
            Arc::new(Self {
                listener,
                commands: Mutex::new(Vec::new()),
                finishes,
            })
        }

        fn commands(&self) -> Vec<&'static str> {
            self.commands.lock().unwrap().clone()
        }
    }

    impl WalletEngine for ScriptedEngine {
        fn sync(&self) {
            self.commands.lock().unwrap().push("sync");
        }

        fn connect(&self) {
            self.commands.lock().unwrap().push("connect");
            let listener = self.listener.clone();
            let finishes = self.finishes;
            thread::spawn(move || {
                listener.on_wallet_manager_event(WalletManagerEvent::SyncStarted);
                thread::sleep(Duration::from_millis(10));
                listener.on_wallet_manager_event(WalletManagerEvent::BlockHeightUpdated {
                    height: 1_721_000,
                });
                listener.on_wallet_event(WalletEvent {
                    wallet_id: "btc".to_string(),
                    kind: WalletEventKind::BalanceUpdated {
                        amount: "5000".to_string(),
                    },
                });
                listener.on_transfer_event(TransferEvent {
                    wallet_id: "btc".to_string(),
                    transfer_id: "t1".to_string(),
                    kind: TransferEventKind::Created,
                });
                if finishes {
                    thread::sleep(Duration::from_millis(10));
                    listener.on_wallet_manager_event(WalletManagerEvent::SyncStopped {
                        reason: SyncStoppedReason::Complete,
                    });
                }
            });
        }

        fn disconnect(&self) {
            self.commands.lock().unwrap().push("disconnect");
        }

        fn stop(&self) {
            self.commands.lock().unwrap().push("stop");
        }
    }

    fn fast() -> SyncConfig {
        SyncConfig {
            poll_interval: Duration::from_millis(5),
            settle_delay: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn run_ends_on_sync_stopped() {
        let aggregator = Arc::new(SyncEventAggregator::new());
        let engine = ScriptedEngine::new(aggregator.clone(), true);
        let orchestrator = SyncOrchestrator::new(engine.clone(), aggregator.clone(), fast());
        assert_eq!(orchestrator.state(), SyncState::Idle);

        let outcome = orchestrator.start().await.unwrap();

        assert_eq!(orchestrator.state(), SyncState::Stopped);
        assert!(!outcome.was_forced());
        assert_eq!(outcome.stop_reason(), Some(&SyncStoppedReason::Complete));
        assert_eq!(outcome.latest_block_height(), Some(1_721_000));
        assert_eq!(outcome.events.wallet_events.len(), 1);
        assert_eq!(outcome.events.transfer_events.len(), 1);
        assert_eq!(engine.commands(), vec!["sync", "connect"]);
        assert!(aggregator.is_empty());
    }

    #[tokio::test]
    async fn stop_request_forces_drain() {
        let aggregator = Arc::new(SyncEventAggregator::new());
        let engine = ScriptedEngine::new(aggregator.clone(), false);
        let orchestrator = SyncOrchestrator::new(engine.clone(), aggregator.clone(), fast());

        let handle = orchestrator.stop_handle();
        tokio::spawn(async move {
            sleep(Duration::from_millis(50)).await;
            handle.stop();
        });
        let outcome = orchestrator.start().await.unwrap();

        assert!(outcome.was_forced());
        assert_eq!(outcome.stop_reason(), None);
        assert_eq!(outcome.events.wallet_manager_events.len(), 2);
        assert_eq!(engine.commands(), vec!["sync", "connect", "disconnect", "stop"]);
        assert_eq!(orchestrator.state(), SyncState::Stopped);
    }

    #[tokio::test]
    async fn stop_before_first_tick_still_returns() {
        let aggregator = Arc::new(SyncEventAggregator::new());
        let engine = ScriptedEngine::new(aggregator.clone(), false);
        let orchestrator = SyncOrchestrator::new(engine.clone(), aggregator, fast());

        orchestrator.stop();
        let outcome = orchestrator.start().await.unwrap();

        assert!(outcome.was_forced());
        assert_eq!(engine.commands(), vec!["sync", "connect", "disconnect", "stop"]);
    }

    #[tokio::test]
    async fn second_start_is_rejected() {
        let aggregator = Arc::new(SyncEventAggregator::new());
        let engine = ScriptedEngine::new(aggregator.clone(), true);
        let orchestrator = SyncOrchestrator::new(engine, aggregator, fast());

        orchestrator.start().await.unwrap();
        let err = orchestrator.start().await.unwrap_err();

        assert!(matches!(
            err,
            WalletSyncError::AlreadyStarted(SyncState::Stopped)
        ));
    }
}
