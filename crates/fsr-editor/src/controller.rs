//! Entity editor controller
//!
//! Owns one edit session: the record, its lifecycle state, the tab
//! selection, and the user-facing error. It orchestrates:
//! - Load of an existing record or construction of a new one
//! - Save through the persistence collaborator, gated by form validation
//! - Delete with confirmation and delayed back-navigation
//! - Remote change reconciliation with local edits
//! - Route and title synchronisation on identity changes
//!
//! The controller is a cheap cloneable handle. Session state sits behind
//! short-lived locks that are never held across an await; re-entrancy is
//! refused by the session state machine instead.

use crate::collaborators::{Confirm, EntityService, LeaveChoice, Router, Settings};
use crate::conflict::SaveConflictHandler;
use crate::error::{EditorError, ServiceError, UserFacingError};
use crate::forms::{tab_to_open, ChildFormRegistry};
use crate::hooks::EditorHooks;
use crate::route::{RouteContext, RouteSynchronizer};
use crate::state::{transition, SessionEvent, SessionState};
use crate::types::{
    DeleteOptions, EditorOptions, Entity, HistoryOptions, LoadOptions, NavigationExtras,
    PageHistoryEntry, Params, PreviousId, SaveOptions, UsageMode,
};
use crate::view::{ViewInputs, ViewOptions, ViewUpdateOutcome, ViewUpdatePlan};
use crate::watcher::{reconcile, RemoteChangeWatcher, RemoteDecision};
use parking_lot::{Mutex, RwLock};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::{broadcast, watch};
use tokio::task::AbortHandle;

/// Capacity of the record update channel
const UPDATE_CHANNEL_CAPACITY: usize = 16;

/// Collaborators every editor needs
pub struct Collaborators<T: Entity> {
    /// Persistence
    pub service: Arc<dyn EntityService<T>>,
    /// Navigation
    pub router: Arc<dyn Router>,
    /// Dialogs
    pub confirm: Arc<dyn Confirm>,
    /// User settings
    pub settings: Arc<dyn Settings>,
}

impl<T: Entity> Clone for Collaborators<T> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            router: Arc::clone(&self.router),
            confirm: Arc::clone(&self.confirm),
            settings: Arc::clone(&self.settings),
        }
    }
}

/// Mutable state of one edit session
#[derive(Debug)]
pub struct EditSession<T: Entity> {
    /// Record shown, `None` before the first load
    pub record: Option<T>,
    /// Identity seen by the previous view update
    pub previous_id: PreviousId<T::Id>,
    /// Lifecycle state
    pub state: SessionState,
    /// A save was attempted and failed or was rejected
    pub submitted: bool,
    /// Error shown to the user
    pub error: Option<UserFacingError>,
    /// Selected tab
    pub selected_tab: usize,
    /// Number of tabs
    pub tab_count: usize,
    /// Usage mode in effect
    pub usage_mode: UsageMode,
    /// Usage mode forced by the host
    usage_mode_override: Option<UsageMode>,
    /// Forms accept edits
    pub enabled: bool,
    /// Route parameters of the last load
    pub params: Params,
}

impl<T: Entity> EditSession<T> {
    fn new(tab_count: usize) -> Self {
        Self {
            record: None,
            previous_id: PreviousId::Unset,
            state: SessionState::Idle,
            submitted: false,
            error: None,
            selected_tab: 0,
            tab_count: tab_count.max(1),
            usage_mode: UsageMode::Desk,
            usage_mode_override: None,
            enabled: false,
            params: Params::new(),
        }
    }

    /// Apply `event`, logging instead of failing when it is not accepted
    fn apply(&mut self, event: SessionEvent) -> bool {
        match transition(self.state, event) {
            Ok(next) => {
                self.state = next;
                true
            }
            Err(e) => {
                tracing::debug!(error = %e, "session event ignored");
                false
            }
        }
    }

    fn record_id(&self) -> Option<T::Id> {
        self.record.as_ref().and_then(Entity::id)
    }
}

/// Restores the session when a busy operation exits without settling it
///
/// Covers early returns, panics in hooks, and the operation's future being
/// dropped mid-flight.
struct BusyGuard<'a, T: Entity> {
    session: &'a Mutex<EditSession<T>>,
    busy: SessionState,
    on_abort: SessionEvent,
    armed: bool,
}

impl<'a, T: Entity> BusyGuard<'a, T> {
    fn new(session: &'a Mutex<EditSession<T>>, busy: SessionState, on_abort: SessionEvent) -> Self {
        Self {
            session,
            busy,
            on_abort,
            armed: true,
        }
    }

    fn finish(mut self, event: SessionEvent) {
        self.armed = false;
        self.session.lock().apply(event);
    }
}

impl<T: Entity> Drop for BusyGuard<'_, T> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut session = self.session.lock();
        if session.state == self.busy {
            tracing::warn!(state = ?self.busy, "busy operation aborted, restoring session");
            session.apply(self.on_abort);
        }
    }
}

struct Inner<T: Entity, H: EditorHooks<T>> {
    hooks: H,
    collab: Collaborators<T>,
    options: EditorOptions,
    route_sync: Option<RouteSynchronizer>,
    session: Mutex<EditSession<T>>,
    forms: RwLock<ChildFormRegistry>,
    watcher: RemoteChangeWatcher,
    conflicts: SaveConflictHandler,
    updates: broadcast::Sender<T>,
    title: watch::Sender<String>,
    destroyed: AtomicBool,
    post_delete: Mutex<Option<AbortHandle>>,
}

/// Builder for [`EditorController`]
pub struct EditorBuilder<T: Entity, H: EditorHooks<T>> {
    hooks: H,
    collab: Collaborators<T>,
    options: EditorOptions,
    route_sync: Option<RouteSynchronizer>,
    tab_count: usize,
}

impl<T: Entity, H: EditorHooks<T>> EditorBuilder<T, H> {
    /// With configuration
    #[must_use]
    pub fn options(mut self, options: EditorOptions) -> Self {
        self.options = options;
        self
    }

    /// With route synchronisation; without it no navigation is performed
    #[must_use]
    pub fn route_synchronizer(mut self, sync: RouteSynchronizer) -> Self {
        self.route_sync = Some(sync);
        self
    }

    /// With number of tabs
    #[must_use]
    pub fn tab_count(mut self, count: usize) -> Self {
        self.tab_count = count;
        self
    }

    /// Build the controller and register the domain forms
    #[must_use]
    pub fn build(self) -> EditorController<T, H> {
        let mut forms = ChildFormRegistry::new();
        self.hooks.register_forms(&mut forms);
        tracing::debug!(forms = forms.len(), tabs = self.tab_count, "editor built");

        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        let (title, _) = watch::channel(String::new());
        EditorController {
            inner: Arc::new(Inner {
                hooks: self.hooks,
                collab: self.collab,
                options: self.options,
                route_sync: self.route_sync,
                session: Mutex::new(EditSession::new(self.tab_count)),
                forms: RwLock::new(forms),
                watcher: RemoteChangeWatcher::new(),
                conflicts: SaveConflictHandler::new(),
                updates,
                title,
                destroyed: AtomicBool::new(false),
                post_delete: Mutex::new(None),
            }),
        }
    }
}

/// Entity editing session controller
pub struct EditorController<T: Entity, H: EditorHooks<T>> {
    inner: Arc<Inner<T, H>>,
}

impl<T: Entity, H: EditorHooks<T>> Clone for EditorController<T, H> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Entity, H: EditorHooks<T>> std::fmt::Debug for EditorController<T, H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let session = self.inner.session.lock();
        f.debug_struct("EditorController")
            .field("state", &session.state)
            .field("record_id", &session.record_id())
            .field("selected_tab", &session.selected_tab)
            .finish_non_exhaustive()
    }
}

impl<T: Entity, H: EditorHooks<T>> EditorController<T, H> {
    /// Start building an editor
    #[must_use]
    pub fn builder(hooks: H, collab: Collaborators<T>) -> EditorBuilder<T, H> {
        EditorBuilder {
            hooks,
            collab,
            options: EditorOptions::default(),
            route_sync: None,
            tab_count: 1,
        }
    }

    // ------------------------------------------------------------------
    // Load
    // ------------------------------------------------------------------

    /// Load record `id`, or build a new one when `id` is `None`
    ///
    /// The error is also stored as the session's user-facing error.
    ///
    /// # Errors
    /// - `EditorError::State` when a load, save, or delete is in flight
    /// - `EditorError::Load` when the persistence collaborator fails
    pub async fn load(&self, id: Option<T::Id>, params: Params) -> Result<(), EditorError> {
        let inner = &self.inner;
        {
            let mut session = inner.session.lock();
            session.state = transition(session.state, SessionEvent::Load)?;
            session.params = params.clone();
        }
        let guard = BusyGuard::new(&inner.session, SessionState::Loading, SessionEvent::LoadFailed);
        if inner.watcher.record_id() != id.as_ref().map(ToString::to_string) {
            inner.watcher.stop();
        }

        let Some(id) = id else {
            tracing::debug!("building new record");
            let mut record = inner.hooks.new_entity(&params);
            self.update_usage_mode(&record);
            inner.hooks.on_new_entity(&mut record, &params).await;
            self.update_view(record, ViewOptions::default()).await;
            guard.finish(SessionEvent::Loaded);
            return Ok(());
        };

        tracing::debug!(%id, "loading record");
        let options = LoadOptions {
            params: params.clone(),
            ..LoadOptions::default()
        };
        match inner.collab.service.load(&id, &options).await {
            Ok(mut record) => {
                self.update_usage_mode(&record);
                inner.hooks.on_entity_loaded(&mut record, &params).await;
                self.update_view(record, ViewOptions::default()).await;
                guard.finish(SessionEvent::Loaded);
                tracing::info!(%id, "record loaded");
                self.start_listening_remote_changes();
                Ok(())
            }
            Err(e) => {
                let err = EditorError::Load(e);
                tracing::error!(%id, error = %err, "load failed");
                {
                    let mut session = inner.session.lock();
                    session.error = Some(err.to_user_facing());
                    session.selected_tab = 0;
                }
                guard.finish(SessionEvent::LoadFailed);
                Err(err)
            }
        }
    }

    /// Load the record designated by the current route
    ///
    /// Reads the id route parameter (the new token, or no parameter, means
    /// a new record) and selects the tab found in the query string.
    ///
    /// # Errors
    /// As [`Self::load`]; an id that does not parse is `NotFound`.
    pub async fn load_from_route(&self) -> Result<(), EditorError> {
        let router = &self.inner.collab.router;
        let options = &self.inner.options;
        let params = router.query_params();

        if let Some(tab) = params
            .get(&options.tab_param)
            .and_then(|t| t.parse::<usize>().ok())
        {
            self.select_tab(tab);
        }

        match router.route_param(&options.id_param) {
            Some(raw) if raw != options.new_token => match T::Id::from_str(&raw) {
                Ok(id) => self.load(Some(id), params).await,
                Err(_) => {
                    let err = EditorError::Load(ServiceError::NotFound(raw));
                    self.inner.session.lock().error = Some(err.to_user_facing());
                    Err(err)
                }
            },
            _ => self.load(None, params).await,
        }
    }

    /// Reload the current record from the persistence collaborator
    ///
    /// # Errors
    /// As [`Self::load`].
    pub async fn reload(&self) -> Result<(), EditorError> {
        let (id, params) = {
            let session = self.inner.session.lock();
            (session.record_id(), session.params.clone())
        };
        tracing::debug!(id = ?id, "reloading");
        self.load(id, params).await
    }

    fn update_usage_mode(&self, record: &T) {
        let forced = self.inner.session.lock().usage_mode_override;
        let mode = forced.unwrap_or_else(|| {
            self.inner
                .hooks
                .compute_usage_mode(record, self.inner.collab.settings.as_ref())
        });
        self.inner.session.lock().usage_mode = mode;
    }

    // ------------------------------------------------------------------
    // View update pipeline
    // ------------------------------------------------------------------

    /// Show `record`: push it into the forms, then tab, route, and title
    ///
    /// Called after every successful load, save, and applied remote change.
    pub async fn update_view(&self, record: T, overrides: ViewOptions) -> ViewUpdateOutcome {
        let inner = &self.inner;
        let (plan, previous_segment) = {
            let mut session = inner.session.lock();
            let inputs = ViewInputs {
                auto_update_route: inner.options.auto_update_route,
                auto_open_next_tab: inner.options.auto_open_next_tab_for(session.usage_mode),
                loading: session.state.is_loading(),
                selected_tab: session.selected_tab,
                tab_count: session.tab_count,
            };
            let next_id = record.id();
            let plan = ViewUpdatePlan::compute(&session.previous_id, next_id.as_ref(), inputs, overrides);
            let previous_segment = match &session.previous_id {
                PreviousId::Some(id) => Some(id.to_string()),
                _ => None,
            };
            session.previous_id = PreviousId::from_option(next_id);
            session.record = Some(record.clone());
            (plan, previous_segment)
        };
        tracing::debug!(?plan, "updating view");

        inner.hooks.set_value(&record).await;
        {
            let forms = inner.forms.read();
            forms.mark_as_pristine();
            forms.mark_as_untouched();
        }
        self.update_enabled(&record);

        if let Some(tab) = plan.open_tab_index {
            self.select_tab(tab);
        }
        let navigated = if plan.update_route {
            self.sync_route(previous_segment.as_deref()).await
        } else {
            false
        };
        self.recompute_title(&record).await;

        let _ = inner.updates.send(record);
        ViewUpdateOutcome { plan, navigated }
    }

    fn update_enabled(&self, record: &T) {
        let writable =
            !self.inner.destroyed.load(Ordering::Acquire) && self.inner.hooks.can_user_write(record);
        {
            let forms = self.inner.forms.read();
            if writable {
                forms.enable();
            } else {
                forms.disable();
            }
        }
        self.inner.session.lock().enabled = writable;
    }

    /// Rewrite the route for the record shown
    ///
    /// Returns `false` when no route synchroniser is configured or the
    /// router refused the navigation.
    pub async fn update_route(&self) -> bool {
        let current = self.inner.session.lock().record_id().map(|id| id.to_string());
        self.sync_route(current.as_deref()).await
    }

    async fn sync_route(&self, previous_segment: Option<&str>) -> bool {
        let Some(sync) = &self.inner.route_sync else {
            return false;
        };
        let router = self.inner.collab.router.as_ref();
        let (record_id, selected_tab) = {
            let session = self.inner.session.lock();
            (session.record_id().map(|id| id.to_string()), session.selected_tab)
        };
        let current_path = router.current_path();
        let current_query = router.query_params();
        let update = sync.compute(RouteContext {
            current_path: &current_path,
            current_query: &current_query,
            previous_segment,
            record_id: record_id.as_deref(),
            selected_tab,
        });
        sync.apply(router, update).await
    }

    async fn recompute_title(&self, record: &T) {
        let title = self.inner.hooks.compute_title(record).await;
        tracing::trace!(%title, "title recomputed");
        self.inner.title.send_replace(title.clone());
        if !record.is_new() {
            let entry = PageHistoryEntry {
                title,
                path: self.inner.collab.router.current_path(),
            };
            let options = HistoryOptions {
                remove_path_duplicates: true,
            };
            self.inner
                .collab
                .settings
                .add_to_page_history(entry, options)
                .await;
        }
    }

    // ------------------------------------------------------------------
    // Save
    // ------------------------------------------------------------------

    /// Validate and persist the record
    ///
    /// Returns `true` when saved or when there was nothing to save, `false`
    /// when refused (busy), rejected by validation, or failed. Failures are
    /// stored as the session's user-facing error.
    pub async fn save(&self) -> bool {
        let inner = &self.inner;
        {
            let mut session = inner.session.lock();
            if session.state.is_loading() || session.state.is_saving() {
                tracing::debug!(state = ?session.state, "save refused: busy");
                return false;
            }
            let dirty = session.state.is_dirty() || inner.forms.read().is_dirty();
            if !dirty {
                tracing::trace!("save skipped: nothing to persist");
                return true;
            }
            match transition(session.state, SessionEvent::Save) {
                Ok(next) => session.state = next,
                Err(e) => {
                    tracing::debug!(error = %e, "save refused");
                    return false;
                }
            }
        }
        let guard = BusyGuard::new(&inner.session, SessionState::Saving, SessionEvent::SaveFailed);

        let forms = inner.forms.read().clone();
        if let Err(e) = forms
            .wait_while_pending(
                inner.options.pending_poll_interval(),
                inner.options.pending_timeout(),
            )
            .await
        {
            tracing::warn!(error = %e, "save rejected: validation still pending");
            forms.mark_as_touched();
            {
                let mut session = inner.session.lock();
                session.submitted = true;
                session.error = Some(e.to_user_facing());
            }
            guard.finish(SessionEvent::Invalid);
            return false;
        }

        if let Err(e) = self.validate() {
            forms.mark_as_touched();
            let opened = self.open_first_invalid_tab();
            tracing::info!(error = %e, tab = ?opened, "save rejected");
            inner.session.lock().submitted = true;
            guard.finish(SessionEvent::Invalid);
            return false;
        }

        inner.session.lock().error = None;
        let record = match inner.hooks.value().await {
            Ok(record) => record,
            Err(e) => {
                tracing::error!(error = %e, "save failed: cannot read form value");
                self.fail_session(&e);
                guard.finish(SessionEvent::SaveFailed);
                return false;
            }
        };
        self.disable();

        let options = SaveOptions {
            params: inner.session.lock().params.clone(),
        };
        match inner.collab.service.save(&record, &options).await {
            Ok(mut saved) => {
                inner.hooks.on_entity_saved(&mut saved).await;
                self.update_view(saved, ViewOptions::default()).await;
                guard.finish(SessionEvent::Saved);
                inner.session.lock().submitted = false;
                tracing::info!(id = ?self.record_id(), "record saved");
                self.start_listening_remote_changes();
                true
            }
            Err(e) => {
                let conflict = SaveConflictHandler::applies_to(&e, &record);
                let err = EditorError::Save(e);
                tracing::error!(error = %err, "save failed");
                self.fail_session(&err);
                guard.finish(SessionEvent::SaveFailed);
                self.update_enabled(&record);
                if conflict {
                    if let Some(id) = record.id() {
                        inner.conflicts.handle(Arc::clone(&inner.collab.service), id);
                    }
                }
                false
            }
        }
    }

    /// Check the aggregate form without saving
    ///
    /// # Errors
    /// `EditorError::Validation` naming the tab of the first invalid form.
    pub fn validate(&self) -> Result<(), EditorError> {
        let forms = self.inner.forms.read();
        if forms.is_valid() {
            return Ok(());
        }
        Err(EditorError::Validation {
            first_invalid_tab: self.inner.hooks.first_invalid_tab_index(&forms),
        })
    }

    /// Save, then navigate back on success
    pub async fn save_and_close(&self) -> bool {
        let saved = self.save().await;
        if saved {
            self.close().await;
        }
        saved
    }

    /// Ask what to do with unsaved changes before leaving
    ///
    /// Returns `true` when the caller may leave.
    pub async fn save_if_dirty_and_confirm(&self) -> bool {
        if !self.is_dirty() {
            return true;
        }
        if self.state().is_busy() {
            return false;
        }
        match self.inner.collab.confirm.ask_save_before_leave().await {
            LeaveChoice::Save => self.save().await,
            LeaveChoice::Discard => {
                self.mark_as_pristine();
                true
            }
            LeaveChoice::Cancel => false,
        }
    }

    fn fail_session(&self, err: &EditorError) {
        let mut session = self.inner.session.lock();
        session.submitted = true;
        session.error = Some(err.to_user_facing());
        session.selected_tab = 0;
    }

    // ------------------------------------------------------------------
    // Delete
    // ------------------------------------------------------------------

    /// Delete the record after confirmation, then navigate back
    ///
    /// Navigation is scheduled after a short delay and is not awaited.
    pub async fn delete(&self) -> bool {
        let inner = &self.inner;
        if self.state().is_busy() {
            tracing::debug!("delete refused: busy");
            return false;
        }
        if !inner.collab.confirm.ask_delete_confirmation().await {
            tracing::debug!("delete cancelled by user");
            return false;
        }
        {
            let mut session = inner.session.lock();
            match transition(session.state, SessionEvent::Delete) {
                Ok(next) => session.state = next,
                Err(e) => {
                    tracing::debug!(error = %e, "delete refused");
                    return false;
                }
            }
        }
        let guard =
            BusyGuard::new(&inner.session, SessionState::Deleting, SessionEvent::DeleteFailed);

        let record = match inner.hooks.value().await {
            Ok(record) => record,
            Err(e) => {
                self.fail_session(&e);
                guard.finish(SessionEvent::DeleteFailed);
                return false;
            }
        };
        self.disable();

        if !record.is_new() {
            let options = DeleteOptions {
                params: inner.session.lock().params.clone(),
            };
            if let Err(e) = inner.collab.service.delete(&record, &options).await {
                let err = EditorError::Delete(e);
                tracing::error!(error = %err, "delete failed");
                self.fail_session(&err);
                guard.finish(SessionEvent::DeleteFailed);
                self.update_enabled(&record);
                return false;
            }
        }
        inner.hooks.on_entity_deleted(&record).await;
        guard.finish(SessionEvent::DeleteDone);
        inner.watcher.stop();
        tracing::info!(id = ?record.id(), "record deleted");

        let controller = self.clone();
        let delay = inner.options.post_delete_delay();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if !controller.inner.destroyed.load(Ordering::Acquire) {
                controller.close().await;
            }
        });
        *inner.post_delete.lock() = Some(task.abort_handle());
        true
    }

    /// Navigate back, or to the default location
    ///
    /// Returns whether navigation happened.
    pub async fn close(&self) -> bool {
        let router = &self.inner.collab.router;
        if router.can_go_back() {
            return router.go_back().await;
        }
        match &self.inner.options.default_back_href {
            Some(href) => {
                let extras = NavigationExtras {
                    query_params: Params::new(),
                    replace: true,
                };
                router.navigate(href, extras).await
            }
            None => false,
        }
    }

    // ------------------------------------------------------------------
    // Remote changes
    // ------------------------------------------------------------------

    /// Follow the change feed of the record shown
    ///
    /// No-op when disabled by configuration, after teardown, or when already
    /// following this record. A feed of another record is dropped, and so
    /// is any feed while a new record is shown. Returns whether a
    /// subscription was started.
    pub fn start_listening_remote_changes(&self) -> bool {
        let inner = &self.inner;
        if !inner.options.listen_remote_changes || inner.destroyed.load(Ordering::Acquire) {
            return false;
        }
        let Some(id) = self.record_id() else {
            inner.watcher.stop();
            return false;
        };
        if inner.watcher.record_id() == Some(id.to_string()) {
            return false;
        }
        inner.watcher.stop();
        let changes = inner.collab.service.listen_changes(&id);
        let weak: Weak<Inner<T, H>> = Arc::downgrade(inner);
        inner.watcher.start(&id, changes, move |change| {
            let weak = weak.clone();
            async move {
                if let Some(inner) = weak.upgrade() {
                    EditorController { inner }.on_remote_change(change).await;
                }
            }
        })
    }

    /// Reconcile a pushed copy with the session
    async fn on_remote_change(&self, change: Option<T>) {
        if self.inner.destroyed.load(Ordering::Acquire) {
            return;
        }
        let decision = {
            let mut session = self.inner.session.lock();
            let dirty = session.state.is_dirty() || self.inner.forms.read().is_dirty();
            let decision = reconcile(session.record.as_ref(), change.as_ref(), dirty);
            if decision == RemoteDecision::Apply && !session.apply(SessionEvent::RemoteUpdate) {
                tracing::debug!(state = ?session.state, "remote update skipped: session busy");
                return;
            }
            decision
        };
        match (decision, change) {
            (RemoteDecision::Apply, Some(record)) => {
                tracing::info!(id = ?record.id(), "applying remote update");
                self.update_view(record, ViewOptions::default()).await;
            }
            (RemoteDecision::LocalEditsWin, _) => {
                tracing::warn!("remote update ignored: local edits pending");
            }
            (decision, _) => tracing::trace!(?decision, "remote update ignored"),
        }
    }

    /// Tear the session down; safe to call more than once
    ///
    /// Cancels the remote change feed and a pending post-delete navigation.
    pub fn destroy(&self) {
        if !self.inner.destroyed.swap(true, Ordering::AcqRel) {
            tracing::debug!("editor destroyed");
        }
        self.inner.watcher.stop();
        if let Some(task) = self.inner.post_delete.lock().take() {
            task.abort();
        }
    }

    // ------------------------------------------------------------------
    // Tabs
    // ------------------------------------------------------------------

    /// Select tab `index`; returns `false` when out of range
    pub fn select_tab(&self, index: usize) -> bool {
        let mut session = self.inner.session.lock();
        if index >= session.tab_count {
            tracing::debug!(index, tab_count = session.tab_count, "tab out of range");
            return false;
        }
        session.selected_tab = index;
        true
    }

    /// Set the number of tabs, clamping the selection
    pub fn set_tab_count(&self, count: usize) {
        let mut session = self.inner.session.lock();
        session.tab_count = count.max(1);
        if session.selected_tab >= session.tab_count {
            session.selected_tab = session.tab_count - 1;
        }
    }

    /// Select the tab of the first invalid form
    ///
    /// Returns the tab selected, `None` when nothing changed.
    pub fn open_first_invalid_tab(&self) -> Option<usize> {
        let first_invalid = {
            let forms = self.inner.forms.read();
            self.inner.hooks.first_invalid_tab_index(&forms)
        };
        let selected = self.selected_tab_index();
        let tab = tab_to_open(selected, first_invalid)?;
        self.select_tab(tab).then_some(tab)
    }

    // ------------------------------------------------------------------
    // Manual state
    // ------------------------------------------------------------------

    /// Record a user edit
    pub fn mark_as_dirty(&self) {
        self.inner.session.lock().apply(SessionEvent::Edit);
    }

    /// Forget local edits
    pub fn mark_as_pristine(&self) {
        self.inner.forms.read().mark_as_pristine();
        self.inner.session.lock().apply(SessionEvent::MarkPristine);
    }

    /// Reveal validation messages on every form
    pub fn mark_as_touched(&self) {
        self.inner.forms.read().mark_as_touched();
    }

    /// Allow edits
    pub fn enable(&self) {
        self.inner.forms.read().enable();
        self.inner.session.lock().enabled = true;
    }

    /// Forbid edits
    pub fn disable(&self) {
        self.inner.forms.read().disable();
        self.inner.session.lock().enabled = false;
    }

    /// Show an error
    pub fn set_error(&self, error: impl Into<UserFacingError>) {
        self.inner.session.lock().error = Some(error.into());
    }

    /// Clear the error
    pub fn reset_error(&self) {
        self.inner.session.lock().error = None;
    }

    /// Force the usage mode; `None` derives it from the record again
    pub fn set_usage_mode(&self, mode: Option<UsageMode>) {
        let mut session = self.inner.session.lock();
        session.usage_mode_override = mode;
        if let Some(mode) = mode {
            session.usage_mode = mode;
        }
    }

    /// Mutate the child form registry
    pub fn with_forms_mut<R>(&self, f: impl FnOnce(&mut ChildFormRegistry) -> R) -> R {
        f(&mut self.inner.forms.write())
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// Record shown
    #[must_use]
    pub fn record(&self) -> Option<T> {
        self.inner.session.lock().record.clone()
    }

    /// Id of the record shown
    #[must_use]
    pub fn record_id(&self) -> Option<T::Id> {
        self.inner.session.lock().record_id()
    }

    /// Record shown was never persisted
    #[must_use]
    pub fn is_new(&self) -> bool {
        self.inner.session.lock().record.as_ref().map_or(true, Entity::is_new)
    }

    /// Lifecycle state
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.inner.session.lock().state
    }

    /// A load is in flight
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.state().is_loading()
    }

    /// A save is in flight
    #[must_use]
    pub fn is_saving(&self) -> bool {
        self.state().is_saving()
    }

    /// Unsaved edits exist in the session or in a child form
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.state().is_dirty() || self.inner.forms.read().is_dirty()
    }

    /// Forms accept edits
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.inner.session.lock().enabled
    }

    /// Last save was rejected or failed
    #[must_use]
    pub fn submitted(&self) -> bool {
        self.inner.session.lock().submitted
    }

    /// Error shown to the user
    #[must_use]
    pub fn error(&self) -> Option<UserFacingError> {
        self.inner.session.lock().error.clone()
    }

    /// Selected tab
    #[must_use]
    pub fn selected_tab_index(&self) -> usize {
        self.inner.session.lock().selected_tab
    }

    /// Number of tabs
    #[must_use]
    pub fn tab_count(&self) -> usize {
        self.inner.session.lock().tab_count
    }

    /// Usage mode in effect
    #[must_use]
    pub fn usage_mode(&self) -> UsageMode {
        self.inner.session.lock().usage_mode
    }

    /// A remote change subscription is live
    #[must_use]
    pub fn has_remote_listener(&self) -> bool {
        self.inner.watcher.is_listening()
    }

    /// Number of cache refreshes triggered by version conflicts
    #[must_use]
    pub fn conflict_refreshes(&self) -> u64 {
        self.inner.conflicts.triggered()
    }

    /// Current title
    #[must_use]
    pub fn title(&self) -> String {
        self.inner.title.borrow().clone()
    }

    /// Title changes
    #[must_use]
    pub fn subscribe_title(&self) -> watch::Receiver<String> {
        self.inner.title.subscribe()
    }

    /// Record emitted after every view update
    #[must_use]
    pub fn subscribe_updates(&self) -> broadcast::Receiver<T> {
        self.inner.updates.subscribe()
    }

    /// Configuration
    #[must_use]
    pub fn options(&self) -> &EditorOptions {
        &self.inner.options
    }

    /// Domain hooks
    #[must_use]
    pub fn hooks(&self) -> &H {
        &self.inner.hooks
    }
}
