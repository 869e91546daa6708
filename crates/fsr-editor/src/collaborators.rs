//! External collaborators consumed by the editor
//!
//! The controller never talks to storage, navigation, dialogs, or user
//! settings directly. Hosts plug implementations of these traits in.

use crate::error::ServiceError;
use crate::types::{
    DeleteOptions, Entity, HistoryOptions, LoadOptions, NavigationExtras, PageHistoryEntry, Params,
    SaveOptions, UsageMode,
};
use futures::stream::BoxStream;

/// Persistence collaborator for one entity type
#[async_trait::async_trait]
pub trait EntityService<T: Entity>: Send + Sync {
    /// Fetch a record by id
    ///
    /// # Errors
    /// `ServiceError::NotFound` or `ServiceError::Transport`.
    async fn load(&self, id: &T::Id, options: &LoadOptions) -> Result<T, ServiceError>;

    /// Persist a record and return the server's canonical copy
    ///
    /// The returned copy carries the assigned id and the new version stamp.
    ///
    /// # Errors
    /// `ServiceError::Validation`, `ServiceError::VersionConflict`, or
    /// `ServiceError::Transport`.
    async fn save(&self, record: &T, options: &SaveOptions) -> Result<T, ServiceError>;

    /// Delete a persisted record
    async fn delete(&self, record: &T, options: &DeleteOptions) -> Result<(), ServiceError>;

    /// Live change feed for one record
    ///
    /// `None` items carry no payload and are ignored. Services without push
    /// support may return an empty stream.
    fn listen_changes(&self, id: &T::Id) -> BoxStream<'static, Option<T>>;
}

/// Navigation collaborator
#[async_trait::async_trait]
pub trait Router: Send + Sync {
    /// Navigate to `path`; returns whether navigation happened
    async fn navigate(&self, path: &str, extras: NavigationExtras) -> bool;

    /// Path of the current route
    fn current_path(&self) -> String;

    /// Route parameter of the current route
    fn route_param(&self, key: &str) -> Option<String>;

    /// Query parameters of the current route
    fn query_params(&self) -> Params;

    /// Whether a previous screen exists in history
    fn can_go_back(&self) -> bool;

    /// Navigate back; returns whether navigation happened
    async fn go_back(&self) -> bool;
}

/// Answer to "save before leaving?"
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveChoice {
    /// Save, then leave
    Save,
    /// Leave without saving
    Discard,
    /// Stay on the page
    Cancel,
}

/// Confirmation and alert collaborator
#[async_trait::async_trait]
pub trait Confirm: Send + Sync {
    /// Ask the user to confirm a delete
    async fn ask_delete_confirmation(&self) -> bool;

    /// Ask the user what to do with unsaved changes
    async fn ask_save_before_leave(&self) -> LeaveChoice;
}

/// User settings collaborator
#[async_trait::async_trait]
pub trait Settings: Send + Sync {
    /// Whether the global usage mode is `mode`
    fn is_usage_mode(&self, mode: UsageMode) -> bool;

    /// Record a visited page
    async fn add_to_page_history(&self, entry: PageHistoryEntry, options: HistoryOptions);
}
