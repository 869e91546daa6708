//! FSR Editor - entity editing sessions for field-sampling records
//!
//! The session controller behind every record editor (programs,
//! strategies, trips, landings, batches…):
//! - Loads or builds the record and binds it to the child forms
//! - Saves through a persistence collaborator, gated by form validation
//! - Deletes with confirmation, then navigates back
//! - Applies server-pushed changes unless local edits are pending
//! - Rewrites the route and advances the tab when a record is first saved
//! - Refreshes the read cache in the background after a version conflict
//!
//! # Example
//!
//! ```rust,ignore
//! use fsr_editor::prelude::*;
//!
//! # async fn example(hooks: LandingHooks, collab: Collaborators<Landing>) {
//! let editor = EditorController::builder(hooks, collab)
//!     .options(EditorOptions::new().with_auto_open_next_tab(true))
//!     .route_synchronizer(RouteSynchronizer::default())
//!     .tab_count(2)
//!     .build();
//!
//! editor.load_from_route().await.ok();
//! editor.mark_as_dirty();
//! if editor.save().await {
//!     println!("saved {:?}", editor.record_id());
//! }
//! # }
//! ```

pub mod collaborators;
pub mod conflict;
pub mod controller;
pub mod error;
pub mod forms;
pub mod hooks;
pub mod route;
pub mod state;
pub mod types;
pub mod view;
pub mod watcher;

// Re-exports for convenience
pub use collaborators::{Confirm, EntityService, LeaveChoice, Router, Settings};
pub use conflict::SaveConflictHandler;
pub use controller::{Collaborators, EditSession, EditorBuilder, EditorController};
pub use error::{EditorError, ServiceError, StateError, UserFacingError};
pub use forms::{ChildForm, ChildFormRegistry, FormHandle};
pub use hooks::EditorHooks;
pub use route::{RouteContext, RouteSynchronizer, RouteUpdate};
pub use state::{SessionEvent, SessionState};
pub use types::{
    DeleteOptions, EditorOptions, Entity, FetchPolicy, HistoryOptions, LoadOptions,
    NavigationExtras, PageHistoryEntry, Params, PreviousId, SaveOptions, UsageMode,
};
pub use view::{ViewOptions, ViewUpdateOutcome, ViewUpdatePlan};
pub use watcher::{RemoteChangeWatcher, RemoteDecision};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for building an editor
    pub use crate::{
        ChildForm, ChildFormRegistry, Collaborators, Confirm, EditorController, EditorError,
        EditorHooks, EditorOptions, Entity, EntityService, Params, RouteSynchronizer, Router,
        ServiceError, Settings, UsageMode,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
