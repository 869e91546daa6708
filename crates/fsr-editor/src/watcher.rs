//! Remote change watcher
//!
//! Follows the change feed of one persisted record and decides, for each
//! pushed copy, whether it may replace the local one. Local edits win: a
//! newer copy arriving while the session is dirty is dropped.

use crate::types::Entity;
use futures::stream::BoxStream;
use futures::StreamExt;
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use tokio::task::AbortHandle;

/// What to do with a pushed copy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteDecision {
    /// Newer and the session is clean
    Apply,
    /// Not newer than the local copy
    Stale,
    /// Newer, but local edits are pending
    LocalEditsWin,
    /// Empty notification, no persisted local record, or another record's id
    Ignored,
}

/// Decide whether `incoming` may replace `local`
#[must_use]
pub fn reconcile<T: Entity>(local: Option<&T>, incoming: Option<&T>, dirty: bool) -> RemoteDecision {
    let (Some(local), Some(incoming)) = (local, incoming) else {
        return RemoteDecision::Ignored;
    };
    match (local.id(), incoming.id()) {
        (Some(a), Some(b)) if a == b => {}
        _ => return RemoteDecision::Ignored,
    }
    let newer = match (local.update_date(), incoming.update_date()) {
        (_, None) => false,
        (None, Some(_)) => true,
        (Some(local), Some(remote)) => remote > local,
    };
    match (newer, dirty) {
        (false, _) => RemoteDecision::Stale,
        (true, true) => RemoteDecision::LocalEditsWin,
        (true, false) => RemoteDecision::Apply,
    }
}

#[derive(Debug)]
struct Listener {
    record_id: String,
    generation: u64,
    task: AbortHandle,
}

#[derive(Debug, Default)]
struct Slot {
    listener: Option<Listener>,
    generation: u64,
}

/// At-most-one change feed subscription per session
#[derive(Debug, Default)]
pub struct RemoteChangeWatcher {
    slot: Arc<Mutex<Slot>>,
}

impl RemoteChangeWatcher {
    /// Create an unarmed watcher
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A subscription is live
    #[must_use]
    pub fn is_listening(&self) -> bool {
        self.slot.lock().listener.is_some()
    }

    /// Id of the record being followed
    #[must_use]
    pub fn record_id(&self) -> Option<String> {
        self.slot.lock().listener.as_ref().map(|l| l.record_id.clone())
    }

    /// Start following `changes`, calling `on_change` for each copy
    ///
    /// Idempotent: returns `false` without subscribing when already armed.
    /// The slot clears itself when the feed ends.
    pub fn start<T, F, Fut>(
        &self,
        record_id: &T::Id,
        mut changes: BoxStream<'static, Option<T>>,
        on_change: F,
    ) -> bool
    where
        T: Entity,
        F: Fn(Option<T>) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send,
    {
        let mut slot = self.slot.lock();
        if slot.listener.is_some() {
            tracing::trace!(%record_id, "remote listener already armed");
            return false;
        }
        slot.generation += 1;
        let generation = slot.generation;
        let shared = Arc::clone(&self.slot);
        let id = record_id.to_string();
        let task = tokio::spawn(async move {
            while let Some(change) = changes.next().await {
                on_change(change).await;
            }
            tracing::debug!(record_id = %id, "remote change feed ended");
            let mut slot = shared.lock();
            if slot.listener.as_ref().map(|l| l.generation) == Some(generation) {
                slot.listener = None;
            }
        });
        tracing::debug!(%record_id, "listening for remote changes");
        slot.listener = Some(Listener {
            record_id: record_id.to_string(),
            generation,
            task: task.abort_handle(),
        });
        true
    }

    /// Cancel the subscription; safe to call repeatedly
    pub fn stop(&self) {
        if let Some(listener) = self.slot.lock().listener.take() {
            tracing::debug!(record_id = %listener.record_id, "stop listening for remote changes");
            listener.task.abort();
        }
    }
}

impl Drop for RemoteChangeWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}
