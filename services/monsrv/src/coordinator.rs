//! Periodic poll coordinator
//!
//! Owns one device's polling cadence and its published state slot. Each
//! tick runs a full `Poller` pass and replaces the slot wholesale, so readers
//! always see one complete snapshot. Ticks that would overlap a slow pass are
//! skipped, never queued.

use std::sync::Arc;
use std::time::Duration;

use charge_calc::FormulaEngine;
use charge_model::{DerivedSnapshot, Snapshot};
use chrono::{DateTime, Utc};
use errors::{MonitorError, MonitorResult};
use serde::Serialize;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::poller::{PollOutcome, Poller};

/// Availability summary carried with every published state
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PollHealth {
    pub last_success: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
    pub last_error: Option<String>,
    /// Keys that were absent because their read failed on the last tick
    pub failed_registers: Vec<String>,
}

impl PollHealth {
    /// At least one register answered on the last tick
    pub fn is_available(&self) -> bool {
        self.consecutive_failures == 0 && self.last_success.is_some()
    }

    fn record(&mut self, outcome: &PollOutcome) {
        self.failed_registers = outcome.failures.iter().map(|f| f.key.to_string()).collect();
        if outcome.is_total_failure() {
            self.consecutive_failures = self.consecutive_failures.saturating_add(1);
            self.last_error = outcome.first_error().map(|f| f.reason.clone());
        } else {
            self.consecutive_failures = 0;
            self.last_success = Some(outcome.snapshot.taken_at());
            self.last_error = outcome.first_error().map(|f| f.reason.clone());
        }
    }
}

/// One published tick: raw snapshot plus health
#[derive(Debug, Clone)]
pub struct PolledState {
    pub snapshot: Snapshot,
    pub health: PollHealth,
}

impl PolledState {
    /// Derived values, recomputed from this snapshot on every call
    pub fn derived(&self) -> DerivedSnapshot {
        FormulaEngine::new().derive(&self.snapshot)
    }
}

struct CoordinatorInner {
    poller: Poller,
    period: Duration,
    health: Mutex<PollHealth>,
    state_tx: watch::Sender<Arc<PolledState>>,
    cancel: CancellationToken,
}

/// Fixed-cadence scheduler for one device
pub struct Coordinator {
    inner: Arc<CoordinatorInner>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Coordinator {
    pub fn new(poller: Poller, period: Duration) -> Self {
        let initial = Arc::new(PolledState {
            snapshot: Snapshot::absent(poller.profile()),
            health: PollHealth::default(),
        });
        let (state_tx, _) = watch::channel(initial);

        Self {
            inner: Arc::new(CoordinatorInner {
                poller,
                period,
                health: Mutex::new(PollHealth::default()),
                state_tx,
                cancel: CancellationToken::new(),
            }),
            task: Mutex::new(None),
        }
    }

    pub fn period(&self) -> Duration {
        self.inner.period
    }

    pub fn poller(&self) -> &Poller {
        &self.inner.poller
    }

    /// Synchronous first tick; a device that yields no value fails startup
    ///
    /// The error is a protocol failure when the device responded to some
    /// read, and a connection failure when it never did.
    pub async fn first_refresh(&self) -> MonitorResult<Arc<PolledState>> {
        let (state, answered) = self.inner.tick().await;
        if state.health.consecutive_failures > 0 {
            let device = self.inner.poller.device_name();
            let reason = state
                .health
                .last_error
                .clone()
                .unwrap_or_else(|| "no register answered".to_string());
            return Err(if answered {
                MonitorError::Protocol(format!("{}: first poll failed: {}", device, reason))
            } else {
                MonitorError::ConnectionFailed {
                    endpoint: device.to_string(),
                    reason: format!("first poll failed: {}", reason),
                }
            });
        }
        Ok(state)
    }

    /// Run one tick now and publish it
    pub async fn refresh(&self) -> Arc<PolledState> {
        self.inner.refresh().await
    }

    /// Start the periodic task; the first scheduled tick is one period away
    pub async fn start(&self) {
        let mut task = self.task.lock().await;
        if task.is_some() {
            return;
        }

        let inner = Arc::clone(&self.inner);
        *task = Some(tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + inner.period, inner.period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    () = inner.cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        tokio::select! {
                            () = inner.cancel.cancelled() => break,
                            _ = inner.refresh() => {},
                        }
                    },
                }
            }
            debug!("{}: poll loop exited", inner.poller.device_name());
        }));

        info!(
            "{}: polling every {:?}",
            self.inner.poller.device_name(),
            self.inner.period
        );
    }

    /// False once `stop` has been called
    pub fn is_running(&self) -> bool {
        !self.inner.cancel.is_cancelled()
    }

    /// Stop ticking and wait for the task to finish; idempotent
    pub async fn stop(&self) {
        self.inner.cancel.cancel();
        if let Some(handle) = self.task.lock().await.take() {
            if let Err(e) = handle.await {
                error!("{}: poll task ended abnormally: {}", self.inner.poller.device_name(), e);
            }
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<PolledState>> {
        self.inner.state_tx.subscribe()
    }

    /// Latest published state
    pub fn current(&self) -> Arc<PolledState> {
        Arc::clone(&self.inner.state_tx.borrow())
    }
}

impl CoordinatorInner {
    async fn refresh(&self) -> Arc<PolledState> {
        self.tick().await.0
    }

    /// One published pass, plus whether the device responded at all
    async fn tick(&self) -> (Arc<PolledState>, bool) {
        // Held for the whole pass: refreshes never run concurrently
        let mut health = self.health.lock().await;
        let outcome = self.poller.poll_once().await;
        health.record(&outcome);

        if outcome.is_total_failure() {
            error!(
                "{}: poll failed ({} consecutive): {}",
                self.poller.device_name(),
                health.consecutive_failures,
                health.last_error.as_deref().unwrap_or("unknown error")
            );
        } else if !outcome.failures.is_empty() {
            warn!(
                "{}: {} of {} registers unavailable",
                self.poller.device_name(),
                outcome.failures.len(),
                outcome.snapshot.len()
            );
        }

        let answered = outcome.answered;
        let state = Arc::new(PolledState {
            snapshot: outcome.snapshot,
            health: health.clone(),
        });
        self.state_tx.send_replace(Arc::clone(&state));
        (state, answered)
    }
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("device", &self.inner.poller.device_name())
            .field("period", &self.inner.period)
            .field("running", &self.is_running())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use async_trait::async_trait;
    use charge_modbus::{ExceptionCode, ModbusError, RegisterTransport, Result as ModbusResult};
    use charge_model::profiles::SMART_BATTERY_PROFILE;
    use errors::{ErrorCategory, MonitorErrorTrait};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Answers every read with one value unless switched offline or rejecting
    #[derive(Default)]
    struct SwitchTransport {
        offline: AtomicBool,
        rejecting: AtomicBool,
        reads: AtomicUsize,
    }

    #[async_trait]
    impl RegisterTransport for SwitchTransport {
        async fn read_registers(&self, _address: u16, count: u16) -> ModbusResult<Vec<u16>> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            if self.offline.load(Ordering::SeqCst) {
                return Err(ModbusError::connection("Connection refused"));
            }
            if self.rejecting.load(Ordering::SeqCst) {
                return Err(ModbusError::Exception {
                    function: 0x03,
                    code: ExceptionCode(0x02),
                });
            }
            Ok(vec![100; count as usize])
        }

        async fn write_registers(&self, _address: u16, _values: &[u16]) -> ModbusResult<()> {
            Ok(())
        }

        async fn close(&self) {}
    }

    fn coordinator(transport: Arc<SwitchTransport>, period: Duration) -> Coordinator {
        Coordinator::new(
            Poller::new("house", &SMART_BATTERY_PROFILE, transport),
            period,
        )
    }

    #[tokio::test]
    async fn test_first_refresh_publishes_snapshot() {
        let transport = Arc::new(SwitchTransport::default());
        let coordinator = coordinator(transport, Duration::from_secs(5));
        assert!(coordinator.current().snapshot.all_absent());

        let state = coordinator.first_refresh().await.unwrap();
        assert_eq!(state.snapshot.present_count(), 11);
        assert!(state.health.is_available());
        assert_eq!(coordinator.current().snapshot.get("cycles"), Some(100.0));
    }

    #[tokio::test]
    async fn test_first_refresh_fails_when_unreachable() {
        let transport = Arc::new(SwitchTransport::default());
        transport.offline.store(true, Ordering::SeqCst);
        let coordinator = coordinator(transport, Duration::from_secs(5));

        let err = coordinator.first_refresh().await.unwrap_err();
        assert!(err.to_string().contains("first poll failed"));
        assert_eq!(err.category(), ErrorCategory::Connection);
    }

    #[tokio::test]
    async fn test_first_refresh_all_exceptions_is_protocol_failure() {
        let transport = Arc::new(SwitchTransport::default());
        transport.rejecting.store(true, Ordering::SeqCst);
        let coordinator = coordinator(transport.clone(), Duration::from_secs(5));

        let err = coordinator.first_refresh().await.unwrap_err();
        assert!(matches!(err, MonitorError::Protocol(_)));
        assert_eq!(err.category(), ErrorCategory::Protocol);
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("first poll failed"));
        assert!(err.to_string().contains("Illegal Data Address"));
        // Exceptions do not abort the pass
        assert_eq!(transport.reads.load(Ordering::SeqCst), 11);
    }

    #[tokio::test]
    async fn test_failed_tick_publishes_all_absent_and_counts() {
        let transport = Arc::new(SwitchTransport::default());
        let coordinator = coordinator(transport.clone(), Duration::from_secs(5));
        coordinator.first_refresh().await.unwrap();

        transport.offline.store(true, Ordering::SeqCst);
        coordinator.refresh().await;
        let state = coordinator.refresh().await;

        assert!(state.snapshot.all_absent());
        assert_eq!(state.health.consecutive_failures, 2);
        assert!(state.health.last_success.is_some());
        assert_eq!(state.health.failed_registers.len(), 11);
        assert!(!state.health.is_available());

        transport.offline.store(false, Ordering::SeqCst);
        let state = coordinator.refresh().await;
        assert_eq!(state.health.consecutive_failures, 0);
        assert!(state.health.last_error.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_ticks_and_stop() {
        let transport = Arc::new(SwitchTransport::default());
        let coordinator = coordinator(transport.clone(), Duration::from_secs(5));
        let mut rx = coordinator.subscribe();

        coordinator.start().await;
        rx.changed().await.unwrap();
        assert_eq!(transport.reads.load(Ordering::SeqCst), 11);
        rx.changed().await.unwrap();
        assert_eq!(transport.reads.load(Ordering::SeqCst), 22);

        coordinator.stop().await;
        assert!(!coordinator.is_running());
        let reads = transport.reads.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(transport.reads.load(Ordering::SeqCst), reads);

        // Second stop is a no-op
        coordinator.stop().await;
    }

    #[tokio::test]
    async fn test_derived_values_follow_snapshot() {
        let transport = Arc::new(SwitchTransport::default());
        let coordinator = coordinator(transport, Duration::from_secs(5));
        let state = coordinator.first_refresh().await.unwrap();

        // current = 100 * 0.01 A
        assert_eq!(state.derived().text("state"), Some("Charging"));
        assert!(state.derived().number("wattage").is_some());
    }
}
