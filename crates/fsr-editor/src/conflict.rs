//! Version conflict recovery
//!
//! A save rejected for a stale version stamp leaves the user's edits in
//! place. The handler only refreshes the shared read cache in the
//! background, so a later manual reload sees the server's copy.

use crate::collaborators::EntityService;
use crate::error::ServiceError;
use crate::types::{Entity, LoadOptions};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Fire-and-forget cache refresh after a version conflict
#[derive(Debug, Default)]
pub struct SaveConflictHandler {
    triggered: AtomicU64,
}

impl SaveConflictHandler {
    /// Create handler
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a save failure on `record` calls for a cache refresh
    #[inline]
    #[must_use]
    pub fn applies_to<T: Entity>(error: &ServiceError, record: &T) -> bool {
        error.is_version_conflict() && !record.is_new()
    }

    /// Spawn a bypass-cache reload of `record_id`
    ///
    /// The loaded copy is discarded and failures are only logged. The
    /// returned handle may be ignored.
    pub fn handle<T: Entity>(
        &self,
        service: Arc<dyn EntityService<T>>,
        record_id: T::Id,
    ) -> JoinHandle<()> {
        self.triggered.fetch_add(1, Ordering::Relaxed);
        tracing::warn!(%record_id, "version conflict on save, refreshing cache");
        tokio::spawn(async move {
            match service.load(&record_id, &LoadOptions::network_only()).await {
                Ok(_) => tracing::debug!(%record_id, "cache refreshed after version conflict"),
                Err(e) => {
                    tracing::warn!(%record_id, error = %e, "cache refresh after version conflict failed");
                }
            }
        })
    }

    /// Number of refreshes triggered so far
    #[inline]
    #[must_use]
    pub fn triggered(&self) -> u64 {
        self.triggered.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DeleteOptions, FetchPolicy, SaveOptions};
    use chrono::{DateTime, Utc};
    use futures::stream::BoxStream;
    use futures::StreamExt;
    use parking_lot::Mutex;

    #[derive(Debug, Clone)]
    struct Rec(Option<u32>);

    impl Entity for Rec {
        type Id = u32;
        fn id(&self) -> Option<u32> {
            self.0
        }
        fn update_date(&self) -> Option<DateTime<Utc>> {
            None
        }
    }

    #[derive(Default)]
    struct FailingLoads {
        policies: Mutex<Vec<FetchPolicy>>,
    }

    #[async_trait::async_trait]
    impl EntityService<Rec> for FailingLoads {
        async fn load(&self, _id: &u32, options: &LoadOptions) -> Result<Rec, ServiceError> {
            self.policies.lock().push(options.fetch_policy);
            Err(ServiceError::Transport("offline".into()))
        }
        async fn save(&self, record: &Rec, _: &SaveOptions) -> Result<Rec, ServiceError> {
            Ok(record.clone())
        }
        async fn delete(&self, _: &Rec, _: &DeleteOptions) -> Result<(), ServiceError> {
            Ok(())
        }
        fn listen_changes(&self, _: &u32) -> BoxStream<'static, Option<Rec>> {
            futures::stream::empty().boxed()
        }
    }

    #[test]
    fn applies_only_to_conflicts_on_persisted_records() {
        let conflict = ServiceError::VersionConflict {
            remote: None,
            local: None,
        };
        assert!(SaveConflictHandler::applies_to(&conflict, &Rec(Some(1))));
        assert!(!SaveConflictHandler::applies_to(&conflict, &Rec(None)));
        assert!(!SaveConflictHandler::applies_to(
            &ServiceError::Transport("x".into()),
            &Rec(Some(1))
        ));
    }

    #[tokio::test]
    async fn reload_bypasses_cache_and_swallows_failure() {
        let service = Arc::new(FailingLoads::default());
        let handler = SaveConflictHandler::new();

        handler
            .handle::<Rec>(service.clone(), 1)
            .await
            .expect("refresh task must not panic");

        assert_eq!(handler.triggered(), 1);
        assert_eq!(*service.policies.lock(), vec![FetchPolicy::NetworkOnly]);
    }
}
