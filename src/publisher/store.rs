use crate::config::{StoreBackend, StoreConfig};
use crate::shared_data::StoreUpdate;
use anyhow::{anyhow, bail, Result};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::amqp_store::AmqpStore;
use super::csv_store::CsvStore;

/// External key/value store that receives light states.
///
/// Calls are blocking and are always made from a blocking worker thread.
/// No transactional guarantee across keys is assumed.
pub trait StateStore: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn publish(&self, update: &StoreUpdate) -> Result<()>;

    /// Current values as last written, for backends that can be read back.
    fn snapshot(&self) -> Result<Option<StoreUpdate>> {
        bail!("{} store cannot be read back", self.name())
    }
}

pub fn open_store(config: &StoreConfig) -> Arc<dyn StateStore> {
    match config.backend {
        StoreBackend::Amqp => Arc::new(AmqpStore::new(&config.amqp_url, &config.queue)),
        StoreBackend::Csv => Arc::new(CsvStore::new(&config.csv_path)),
        StoreBackend::Log => Arc::new(LogStore),
    }
}

/// Writes every update to the log and nowhere else.
pub struct LogStore;

impl StateStore for LogStore {
    fn name(&self) -> &str {
        "log"
    }

    fn publish(&self, update: &StoreUpdate) -> Result<()> {
        let payload = serde_json::to_string(&update.entries)?;
        log::info!("[Store] {}", payload);
        Ok(())
    }
}

/// In-process store that keeps every accepted update. Can be told to fail or
/// to stall each send, which makes it usable as a stand-in actuator.
#[derive(Default)]
pub struct MemoryStore {
    updates: Mutex<Vec<StoreUpdate>>,
    failing: AtomicBool,
    delay: Mutex<Duration>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap_or_else(|e| e.into_inner()) = delay;
    }

    pub fn updates(&self) -> Vec<StoreUpdate> {
        self.updates
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn len(&self) -> usize {
        self.updates.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Calls to `publish` currently running.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of `publish` calls that ever overlapped.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    fn apply(&self, update: &StoreUpdate) -> Result<()> {
        let delay = *self.delay.lock().unwrap_or_else(|e| e.into_inner());
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(anyhow!("memory store is unreachable"));
        }
        self.updates
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(update.clone());
        Ok(())
    }
}

impl StateStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn publish(&self, update: &StoreUpdate) -> Result<()> {
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(running, Ordering::SeqCst);
        let result = self.apply(update);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    fn snapshot(&self) -> Result<Option<StoreUpdate>> {
        let updates = self.updates.lock().unwrap_or_else(|e| e.into_inner());
        if updates.is_empty() {
            return Ok(None);
        }
        // Later writes win per key, like a key/value store.
        let mut merged: BTreeMap<String, Value> = BTreeMap::new();
        for update in updates.iter() {
            merged.extend(update.entries.clone());
        }
        Ok(Some(StoreUpdate { entries: merged }))
    }
}
