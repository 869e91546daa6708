//! In-memory persistence collaborator
//!
//! Assigns ids, stamps every write with a strictly increasing version,
//! rejects stale writes with a version conflict, and pushes every write to
//! the change feed of the record.

use crate::model::Storable;
use chrono::{DateTime, Duration, Utc};
use fsr_editor::{
    DeleteOptions, EntityService, FetchPolicy, LoadOptions, SaveOptions, ServiceError,
};
use futures::stream::BoxStream;
use futures::StreamExt;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{broadcast, watch, Notify};

/// Calls observed by the store
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreCalls {
    /// Read policy of every load, in order
    pub loads: Vec<FetchPolicy>,
    /// Number of save calls
    pub saves: usize,
    /// Number of delete calls
    pub deletes: usize,
    /// Number of change feed subscriptions
    pub listens: usize,
}

/// In-memory [`EntityService`]
pub struct MemoryStore<T: Storable> {
    records: Mutex<BTreeMap<String, T>>,
    seq: AtomicU64,
    clock: Mutex<DateTime<Utc>>,
    calls: Mutex<StoreCalls>,
    fail_next_save: Mutex<Option<ServiceError>>,
    fail_next_delete: Mutex<Option<ServiceError>>,
    fail_loads: Mutex<Option<ServiceError>>,
    save_gate: watch::Sender<bool>,
    load_gate: watch::Sender<bool>,
    changes: broadcast::Sender<T>,
    loaded: Notify,
}

impl<T: Storable> std::fmt::Debug for MemoryStore<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("records", &self.records.lock().len())
            .field("calls", &*self.calls.lock())
            .finish_non_exhaustive()
    }
}

impl<T: Storable> Default for MemoryStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Storable> MemoryStore<T> {
    /// Create empty store
    #[must_use]
    pub fn new() -> Self {
        let (save_gate, _) = watch::channel(true);
        let (load_gate, _) = watch::channel(true);
        let (changes, _) = broadcast::channel(64);
        Self {
            records: Mutex::new(BTreeMap::new()),
            seq: AtomicU64::new(0),
            clock: Mutex::new(Utc::now()),
            calls: Mutex::new(StoreCalls::default()),
            fail_next_save: Mutex::new(None),
            fail_next_delete: Mutex::new(None),
            fail_loads: Mutex::new(None),
            save_gate,
            load_gate,
            changes,
            loaded: Notify::new(),
        }
    }

    fn next_stamp(&self) -> DateTime<Utc> {
        let mut clock = self.clock.lock();
        *clock += Duration::milliseconds(1);
        *clock
    }

    /// Store `record` as if written by another client, assigning an id when
    /// missing; returns the stored copy
    pub fn insert(&self, mut record: T) -> T {
        if record.id().is_none() {
            let seq = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
            record.set_id(T::id_from_seq(seq));
        }
        record.set_update_date(self.next_stamp());
        if let Some(id) = record.id() {
            self.records.lock().insert(id.to_string(), record.clone());
        }
        let _ = self.changes.send(record.clone());
        record
    }

    /// Modify a stored record as another client would, pushing the change
    pub fn remote_update(&self, id: &T::Id, edit: impl FnOnce(&mut T)) -> Option<T> {
        let mut record = self.get(id)?;
        edit(&mut record);
        Some(self.insert(record))
    }

    /// Stored copy of `id`
    #[must_use]
    pub fn get(&self, id: &T::Id) -> Option<T> {
        self.records.lock().get(&id.to_string()).cloned()
    }

    /// Calls observed so far
    #[must_use]
    pub fn calls(&self) -> StoreCalls {
        self.calls.lock().clone()
    }

    /// Make the next save fail with `error`
    pub fn fail_next_save(&self, error: ServiceError) {
        *self.fail_next_save.lock() = Some(error);
    }

    /// Make the next delete fail with `error`
    pub fn fail_next_delete(&self, error: ServiceError) {
        *self.fail_next_delete.lock() = Some(error);
    }

    /// Make every load fail with `error` (`None` restores loads)
    pub fn fail_loads(&self, error: Option<ServiceError>) {
        *self.fail_loads.lock() = error;
    }

    /// Hold saves in flight until [`Self::release_saves`]
    pub fn hold_saves(&self) {
        self.save_gate.send_replace(false);
    }

    /// Let held saves complete
    pub fn release_saves(&self) {
        self.save_gate.send_replace(true);
    }

    /// Hold loads in flight until [`Self::release_loads`]
    pub fn hold_loads(&self) {
        self.load_gate.send_replace(false);
    }

    /// Let held loads complete
    pub fn release_loads(&self) {
        self.load_gate.send_replace(true);
    }

    /// Wait for the next load call
    pub async fn next_load(&self) {
        self.loaded.notified().await;
    }
}

#[async_trait::async_trait]
impl<T: Storable> EntityService<T> for MemoryStore<T> {
    async fn load(&self, id: &T::Id, options: &LoadOptions) -> Result<T, ServiceError> {
        self.calls.lock().loads.push(options.fetch_policy);
        self.loaded.notify_one();
        pass_gate(&self.load_gate).await;
        if let Some(err) = self.fail_loads.lock().clone() {
            return Err(err);
        }
        self.get(id)
            .ok_or_else(|| ServiceError::NotFound(id.to_string()))
    }

    async fn save(&self, record: &T, _options: &SaveOptions) -> Result<T, ServiceError> {
        self.calls.lock().saves += 1;
        pass_gate(&self.save_gate).await;

        if let Some(err) = self.fail_next_save.lock().take() {
            return Err(err);
        }
        if let Some(id) = record.id() {
            let stored = self
                .get(&id)
                .ok_or_else(|| ServiceError::NotFound(id.to_string()))?;
            if stored.update_date() != record.update_date() {
                return Err(ServiceError::VersionConflict {
                    remote: stored.update_date(),
                    local: record.update_date(),
                });
            }
        }
        Ok(self.insert(record.clone()))
    }

    async fn delete(&self, record: &T, _options: &DeleteOptions) -> Result<(), ServiceError> {
        self.calls.lock().deletes += 1;
        if let Some(err) = self.fail_next_delete.lock().take() {
            return Err(err);
        }
        let id = record
            .id()
            .ok_or_else(|| ServiceError::Validation("record was never saved".into()))?;
        self.records
            .lock()
            .remove(&id.to_string())
            .map(|_| ())
            .ok_or_else(|| ServiceError::NotFound(id.to_string()))
    }

    fn listen_changes(&self, id: &T::Id) -> BoxStream<'static, Option<T>> {
        self.calls.lock().listens += 1;
        let key = id.to_string();
        let rx = self.changes.subscribe();
        futures::stream::unfold(rx, |mut rx| async move {
            loop {
                match rx.recv().await {
                    Ok(record) => return Some((Some(record), rx)),
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        })
        .filter(move |change| {
            let matches = change
                .as_ref()
                .and_then(|r| r.id())
                .is_some_and(|id| id.to_string() == key);
            futures::future::ready(matches)
        })
        .boxed()
    }
}

/// Wait until `gate` is open
async fn pass_gate(gate: &watch::Sender<bool>) {
    let mut rx = gate.subscribe();
    while !*rx.borrow_and_update() {
        if rx.changed().await.is_err() {
            break;
        }
    }
}
