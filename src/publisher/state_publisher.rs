use super::record::PublishRecord;
use super::store::StateStore;
use crate::config::{ControllerConfig, StoreConfig};
use crate::shared_data::{StoreUpdate, TrafficState};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinHandle;

#[derive(Debug, Clone)]
pub struct PublisherSettings {
    pub heartbeat: Duration,
    pub send_timeout: Duration,
    pub retry_backoff: Duration,
    pub store: StoreConfig,
}

impl PublisherSettings {
    pub fn from_config(config: &ControllerConfig) -> Self {
        Self {
            heartbeat: config.heartbeat(),
            send_timeout: config.send_timeout(),
            retry_backoff: config.retry_backoff(),
            store: config.store.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct PendingPublish {
    state: TrafficState,
    requested_at: Instant,
}

#[derive(Debug, Default)]
pub struct PublisherStats {
    offered: AtomicU64,
    sent: AtomicU64,
    failed: AtomicU64,
    skipped: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublisherStatsSnapshot {
    /// States handed to the slot by the decision loop
    pub offered: u64,
    pub sent: u64,
    pub failed: u64,
    /// Slot values the worker dropped because they were no longer due
    pub skipped: u64,
}

impl PublisherStats {
    pub fn snapshot(&self) -> PublisherStatsSnapshot {
        PublisherStatsSnapshot {
            offered: self.offered.load(Ordering::Relaxed),
            sent: self.sent.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
        }
    }
}

impl fmt::Display for PublisherStatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "offered={} sent={} failed={} skipped={}",
            self.offered, self.sent, self.failed, self.skipped
        )
    }
}

fn lock_record(record: &Mutex<PublishRecord>) -> MutexGuard<'_, PublishRecord> {
    record.lock().unwrap_or_else(|e| e.into_inner())
}

/// Debounced, non-blocking delivery of traffic states to the store.
///
/// `publish` only decides eligibility and drops the state into a
/// single-value slot; one worker task drains the slot and performs at most
/// one send at a time. A newer state overwrites an unsent one.
pub struct StatePublisher {
    slot: Option<watch::Sender<Option<PendingPublish>>>,
    record: Arc<Mutex<PublishRecord>>,
    stats: Arc<PublisherStats>,
    heartbeat: Duration,
    retry_backoff: Duration,
    worker: Option<JoinHandle<()>>,
}

impl StatePublisher {
    /// Starts the worker on the current tokio runtime.
    pub fn spawn(store: Arc<dyn StateStore>, settings: PublisherSettings) -> Self {
        let (tx, rx) = watch::channel(None);
        let record = Arc::new(Mutex::new(PublishRecord::new()));
        let stats = Arc::new(PublisherStats::default());

        let worker = PublishWorker {
            store,
            slot: rx,
            record: Arc::clone(&record),
            stats: Arc::clone(&stats),
            heartbeat: settings.heartbeat,
            send_timeout: settings.send_timeout,
            retry_backoff: settings.retry_backoff,
            store_config: settings.store,
            stalled: None,
        };
        let handle = tokio::spawn(worker.run());

        Self {
            slot: Some(tx),
            record,
            stats,
            heartbeat: settings.heartbeat,
            retry_backoff: settings.retry_backoff,
            worker: Some(handle),
        }
    }

    /// Offers the tick's state. Never waits on the network; returns whether
    /// the state was due and placed in the slot.
    pub fn publish(&self, state: &TrafficState, now: Instant) -> bool {
        let Some(slot) = &self.slot else {
            return false;
        };
        let due = lock_record(&self.record).is_due(state, now, self.heartbeat, self.retry_backoff);
        if !due {
            return false;
        }
        self.stats.offered.fetch_add(1, Ordering::Relaxed);
        slot.send_replace(Some(PendingPublish {
            state: *state,
            requested_at: now,
        }));
        true
    }

    pub fn stats(&self) -> PublisherStatsSnapshot {
        self.stats.snapshot()
    }

    /// Closes the slot and waits for the worker to deliver whatever was
    /// still pending.
    pub async fn shutdown(mut self) {
        self.slot.take();
        if let Some(worker) = self.worker.take() {
            if let Err(err) = worker.await {
                log::error!("[Publisher] worker ended abnormally: {}", err);
            }
        }
    }
}

impl Drop for StatePublisher {
    fn drop(&mut self) {
        // Dropping the sender lets a detached worker finish on its own.
        self.slot.take();
    }
}

struct PublishWorker {
    store: Arc<dyn StateStore>,
    slot: watch::Receiver<Option<PendingPublish>>,
    record: Arc<Mutex<PublishRecord>>,
    stats: Arc<PublisherStats>,
    heartbeat: Duration,
    send_timeout: Duration,
    retry_backoff: Duration,
    store_config: StoreConfig,
    /// Store call that outlived `send_timeout` and is still running.
    stalled: Option<JoinHandle<anyhow::Result<()>>>,
}

impl PublishWorker {
    async fn run(mut self) {
        while self.slot.changed().await.is_ok() {
            // At most one store call runs at a time, including abandoned ones.
            self.wait_for_stalled().await;
            let pending = *self.slot.borrow_and_update();
            let Some(pending) = pending else {
                continue;
            };

            // The slot may hold a value that an earlier send already covered.
            let still_due = lock_record(&self.record).is_due(
                &pending.state,
                pending.requested_at,
                self.heartbeat,
                self.retry_backoff,
            );
            if !still_due {
                self.stats.skipped.fetch_add(1, Ordering::Relaxed);
                continue;
            }

            self.send(pending).await;
        }
        if self.stalled.is_some() {
            log::warn!("[Publisher] exiting with a timed-out send still running");
        }
        log::debug!("[Publisher] slot closed, worker exiting");
    }

    async fn wait_for_stalled(&mut self) {
        let Some(stalled) = self.stalled.take() else {
            return;
        };
        log::debug!("[Publisher] waiting for the timed-out send to return");
        match stalled.await {
            Ok(Ok(())) => log::debug!("[Publisher] timed-out send completed late"),
            Ok(Err(err)) => log::debug!("[Publisher] timed-out send failed late: {:#}", err),
            Err(join_err) => log::warn!("[Publisher] timed-out send task failed: {}", join_err),
        }
    }

    async fn send(&mut self, pending: PendingPublish) {
        let update = StoreUpdate::from_state(&pending.state, &self.store_config);
        let store = Arc::clone(&self.store);
        let mut call = tokio::task::spawn_blocking(move || store.publish(&update));

        let outcome = tokio::time::timeout(self.send_timeout, &mut call).await;
        let failure = match outcome {
            Ok(Ok(Ok(()))) => None,
            Ok(Ok(Err(err))) => Some(format!("{err:#}")),
            Ok(Err(join_err)) => Some(format!("send task failed: {join_err}")),
            Err(_) => {
                self.stalled = Some(call);
                Some(format!("timed out after {:?}", self.send_timeout))
            }
        };

        let mut record = lock_record(&self.record);
        match failure {
            None => {
                record.mark_sent(pending.state, pending.requested_at);
                self.stats.sent.fetch_add(1, Ordering::Relaxed);
                log::debug!(
                    "[Publisher] sent {:?}/{:?} to {}",
                    pending.state.main_light,
                    pending.state.lane_light,
                    self.store.name()
                );
            }
            Some(reason) => {
                record.mark_failed(pending.state, pending.requested_at);
                let failed = self.stats.failed.fetch_add(1, Ordering::Relaxed) + 1;
                log::warn!(
                    "[Publisher] send to {} failed ({} so far): {}",
                    self.store.name(),
                    failed,
                    reason
                );
            }
        }
    }
}
