//! Edit Session Tests
//!
//! Load, save, delete, and leave flows of the editor controller against
//! the in-memory collaborators.
//!
use fsr_editor::prelude::*;
use fsr_editor::{FetchPolicy, LeaveChoice, SessionState};
use fsr_harness::{Landing, LandingController, LandingFixture, MemoryRouter, MEASUREMENTS_TAB};
use pretty_assertions::assert_eq;
use std::time::Duration;

fn vessel_params(vessel: &str) -> Params {
    let mut params = Params::new();
    params.insert("vessel".into(), vessel.into());
    params
}

async fn eventually(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !condition() {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("condition not reached in time");
}

/// Fixture with one stored landing, editor loaded on it
async fn loaded_editor(options: EditorOptions) -> (LandingFixture, LandingController, i64) {
    let fixture = LandingFixture::with_router(
        MemoryRouter::at("/landings/1").with_previous_page("/landings"),
        UsageMode::Desk,
    );
    let stored = fixture.store.insert(Landing::new("FRA000851751", "Brest"));
    let id = stored.id.unwrap();
    let editor = fixture.controller(options);
    editor.load(Some(id), Params::new()).await.unwrap();
    (fixture, editor, id)
}

// ------------------------------------------------------------------
// Load
// ------------------------------------------------------------------

#[tokio::test]
async fn test_load_new_record() {
    let fixture = LandingFixture::at("/landings/new");
    let editor = fixture.controller(EditorOptions::default());

    editor.load(None, vessel_params("BEL1")).await.unwrap();

    let record = editor.record().unwrap();
    assert_eq!(record.vessel, "BEL1");
    assert_eq!(record.location, "Unknown port");
    assert!(editor.is_new());
    assert_eq!(editor.state(), SessionState::Ready { dirty: false });
    assert_eq!(editor.title(), "New landing");
    assert!(editor.is_enabled());
    assert!(!editor.has_remote_listener());
    assert_eq!(HookCallsView::of(&editor).new_entity, 1);
    assert!(fixture.store.calls().loads.is_empty());
    assert!(fixture.settings.page_history().is_empty());
}

#[tokio::test]
async fn test_load_existing_record() {
    let (fixture, editor, id) = loaded_editor(EditorOptions::default()).await;

    assert_eq!(editor.record_id(), Some(id));
    assert!(!editor.is_new());
    assert!(!editor.is_loading());
    assert_eq!(fixture.store.calls().loads, vec![FetchPolicy::CacheFirst]);
    assert!(editor.has_remote_listener());
    assert_eq!(editor.title(), format!("Landing FRA000851751 #{id}"));
    assert_eq!(HookCallsView::of(&editor).loaded, 1);

    let history = fixture.settings.page_history();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].path, "/landings/1");
}

#[tokio::test]
async fn test_load_failure_sets_error_and_first_tab() {
    let fixture = LandingFixture::at("/landings/3");
    fixture
        .store
        .fail_loads(Some(ServiceError::Transport("connection reset".into())));
    let editor = fixture.controller(EditorOptions::default());
    editor.select_tab(MEASUREMENTS_TAB);

    let err = editor.load(Some(3), Params::new()).await.unwrap_err();

    assert!(matches!(err, EditorError::Load(ServiceError::Transport(_))));
    assert!(err.is_retryable());
    assert_eq!(editor.state(), SessionState::Failed);
    assert_eq!(editor.selected_tab_index(), 0);
    let shown = editor.error().unwrap();
    assert!(shown.details.unwrap().contains("connection reset"));
}

#[tokio::test]
async fn test_reload_after_failure() {
    let fixture = LandingFixture::at("/landings/1");
    let stored = fixture.store.insert(Landing::new("FRA1", "Brest"));
    fixture
        .store
        .fail_loads(Some(ServiceError::Transport("offline".into())));
    let editor = fixture.controller(EditorOptions::default());
    assert!(editor.load(stored.id, Params::new()).await.is_err());

    fixture.store.fail_loads(None);
    // the failed load never showed a record, so reload needs the id again
    editor.load(stored.id, Params::new()).await.unwrap();
    assert_eq!(editor.record(), Some(stored));
    editor.reload().await.unwrap();
    assert_eq!(fixture.store.calls().loads.len(), 3);
}

#[tokio::test]
async fn test_load_from_route_reads_id_and_tab() {
    let fixture = LandingFixture::with_router(
        MemoryRouter::at("/landings/1")
            .with_route_param("id", "1")
            .with_query_param("tab", "1"),
        UsageMode::Desk,
    );
    fixture.store.insert(Landing::new("FRA1", "Brest"));
    let editor = fixture.controller(EditorOptions::default());

    editor.load_from_route().await.unwrap();

    assert_eq!(editor.record_id(), Some(1));
    assert_eq!(editor.selected_tab_index(), MEASUREMENTS_TAB);
    assert!(fixture.router.navigations().is_empty());
}

#[tokio::test]
async fn test_load_from_route_new_token() {
    let fixture = LandingFixture::with_router(
        MemoryRouter::at("/landings/new")
            .with_route_param("id", "new")
            .with_query_param("vessel", "NLD7"),
        UsageMode::Desk,
    );
    let editor = fixture.controller(EditorOptions::default());

    editor.load_from_route().await.unwrap();

    assert!(editor.is_new());
    assert_eq!(editor.record().unwrap().vessel, "NLD7");
}

#[tokio::test]
async fn test_load_from_route_unparsable_id() {
    let fixture = LandingFixture::with_router(
        MemoryRouter::at("/landings/abc").with_route_param("id", "abc"),
        UsageMode::Desk,
    );
    let editor = fixture.controller(EditorOptions::default());

    let err = editor.load_from_route().await.unwrap_err();

    assert!(matches!(err, EditorError::Load(ServiceError::NotFound(ref raw)) if raw == "abc"));
    assert!(editor.error().is_some());
    assert!(fixture.store.calls().loads.is_empty());
}

#[tokio::test]
async fn test_read_only_record_disables_forms() {
    let fixture = LandingFixture::at("/landings/1");
    fixture.store.insert(Landing::new("FRA1", "Brest"));
    let editor = fixture.controller(EditorOptions::default());
    editor.hooks().set_writable(false);

    editor.load(Some(1), Params::new()).await.unwrap();

    assert!(!editor.is_enabled());
    assert!(!editor.hooks().header.is_enabled());
}

// ------------------------------------------------------------------
// Save
// ------------------------------------------------------------------

#[tokio::test]
async fn test_save_clean_is_noop() {
    let (fixture, editor, _) = loaded_editor(EditorOptions::default()).await;

    assert!(editor.save().await);
    assert_eq!(fixture.store.calls().saves, 0);
    assert_eq!(HookCallsView::of(&editor).saved, 0);
}

#[tokio::test]
async fn test_save_persists_edits() {
    let (fixture, editor, id) = loaded_editor(EditorOptions::default()).await;
    editor.hooks().edit(|l| l.comments = Some("sorted on board".into()));
    assert!(editor.is_dirty());

    assert!(editor.save().await);

    assert!(!editor.is_dirty());
    assert!(!editor.submitted());
    assert_eq!(editor.state(), SessionState::Ready { dirty: false });
    assert_eq!(fixture.store.calls().saves, 1);
    let stored = fixture.store.get(&id).unwrap();
    assert_eq!(stored.comments.as_deref(), Some("sorted on board"));
    assert_eq!(editor.record(), Some(stored));
    assert_eq!(HookCallsView::of(&editor).saved, 1);
    assert!(editor.hooks().header.is_enabled());
}

#[tokio::test]
async fn test_save_marked_dirty_without_form_changes() {
    let (fixture, editor, _) = loaded_editor(EditorOptions::default()).await;
    editor.mark_as_dirty();

    assert!(editor.save().await);
    assert_eq!(fixture.store.calls().saves, 1);
}

#[tokio::test]
async fn test_save_reentrancy_refused() {
    let (fixture, editor, _) = loaded_editor(EditorOptions::default()).await;
    editor.hooks().edit(|l| l.location = "Lorient".into());
    fixture.store.hold_saves();

    let first = tokio::spawn({
        let editor = editor.clone();
        async move { editor.save().await }
    });
    eventually(|| fixture.store.calls().saves == 1).await;

    assert!(editor.is_saving());
    assert!(!editor.is_enabled());
    assert!(!editor.hooks().header.is_enabled());
    assert!(!editor.save().await);
    assert!(matches!(
        editor.load(Some(1), Params::new()).await,
        Err(EditorError::State(_))
    ));
    assert!(!editor.delete().await);

    fixture.store.release_saves();
    assert!(first.await.unwrap());
    assert_eq!(fixture.store.calls().saves, 1);
    assert_eq!(fixture.store.calls().deletes, 0);
    assert!(editor.is_enabled());
}

#[tokio::test]
async fn test_save_refused_while_loading() {
    let (fixture, editor, id) = loaded_editor(EditorOptions::default()).await;
    editor.hooks().edit(|l| l.location = "Lorient".into());
    fixture.store.hold_loads();

    let reload = tokio::spawn({
        let editor = editor.clone();
        async move { editor.load(Some(id), Params::new()).await }
    });
    eventually(|| fixture.store.calls().loads.len() == 2).await;

    assert!(editor.is_loading());
    assert!(!editor.save().await);
    assert_eq!(fixture.store.calls().saves, 0);

    fixture.store.release_loads();
    reload.await.unwrap().unwrap();
    assert_eq!(editor.state(), SessionState::Ready { dirty: false });
}

#[tokio::test]
async fn test_save_invalid_opens_first_invalid_tab() {
    let (fixture, editor, _) = loaded_editor(EditorOptions::default()).await;
    let hooks = editor.hooks();
    hooks.edit(|l| l.location = String::new());
    hooks.measurements.set_valid(false);
    assert_eq!(
        editor.validate(),
        Err(EditorError::Validation {
            first_invalid_tab: Some(MEASUREMENTS_TAB)
        })
    );

    assert!(!editor.save().await);

    assert_eq!(fixture.store.calls().saves, 0);
    assert_eq!(editor.selected_tab_index(), MEASUREMENTS_TAB);
    assert!(editor.submitted());
    assert!(hooks.header.is_touched());
    assert!(hooks.measurements.is_touched());
    assert_eq!(editor.state(), SessionState::Ready { dirty: true });

    hooks.measurements.set_valid(true);
    assert_eq!(editor.validate(), Ok(()));
    assert!(editor.save().await);
    assert!(!editor.submitted());
}

#[tokio::test(start_paused = true)]
async fn test_save_waits_for_pending_validation() {
    let (fixture, editor, _) = loaded_editor(EditorOptions::default()).await;
    let header = editor.hooks().header.clone();
    editor.hooks().edit(|l| l.location = "Concarneau".into());
    header.set_pending(true);

    tokio::spawn({
        let header = header.clone();
        async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            header.set_pending(false);
        }
    });

    assert!(editor.save().await);
    assert_eq!(fixture.store.calls().saves, 1);
}

#[tokio::test(start_paused = true)]
async fn test_save_pending_timeout() {
    let options = EditorOptions::default().with_pending_timeout(Duration::from_millis(300));
    let (fixture, editor, _) = loaded_editor(options).await;
    editor.hooks().edit(|l| l.location = "Concarneau".into());
    editor.hooks().header.set_pending(true);

    assert!(!editor.save().await);

    assert_eq!(fixture.store.calls().saves, 0);
    assert!(editor.submitted());
    assert!(editor.error().is_some());
    assert_eq!(editor.state(), SessionState::Ready { dirty: true });
}

#[tokio::test]
async fn test_save_failure_keeps_edits() {
    let (fixture, editor, id) = loaded_editor(EditorOptions::default()).await;
    editor.select_tab(MEASUREMENTS_TAB);
    editor.hooks().edit(|l| l.location = "Lorient".into());
    fixture
        .store
        .fail_next_save(ServiceError::Validation("location unknown".into()));

    assert!(!editor.save().await);

    assert!(editor.is_dirty());
    assert!(editor.submitted());
    assert!(editor.is_enabled());
    assert!(editor.hooks().header.is_enabled());
    assert_eq!(editor.selected_tab_index(), 0);
    assert!(editor.error().unwrap().details.unwrap().ends_with("location unknown"));
    assert_eq!(fixture.store.get(&id).unwrap().location, "Brest");
    assert_eq!(editor.conflict_refreshes(), 0);

    assert!(editor.save().await);
    assert!(editor.error().is_none());
}

#[tokio::test]
async fn test_save_version_conflict_refreshes_cache() {
    let (fixture, editor, id) = loaded_editor(EditorOptions::default()).await;
    editor.hooks().edit(|l| l.comments = Some("mine".into()));
    fixture.store.remote_update(&id, |l| l.comments = Some("theirs".into()));

    assert!(!editor.save().await);

    assert_eq!(editor.state(), SessionState::Ready { dirty: true });
    assert!(editor.is_enabled());
    assert!(editor.hooks().header.is_enabled());
    assert_eq!(editor.conflict_refreshes(), 1);
    eventually(|| fixture.store.calls().loads.len() == 2).await;
    assert_eq!(
        fixture.store.calls().loads,
        vec![FetchPolicy::CacheFirst, FetchPolicy::NetworkOnly]
    );
    // local edits survive the refresh
    assert_eq!(editor.hooks().current().unwrap().comments.as_deref(), Some("mine"));
}

#[tokio::test]
async fn test_save_new_record_failure_no_refresh() {
    let fixture = LandingFixture::at("/landings/new");
    let editor = fixture.controller(EditorOptions::default());
    editor.load(None, vessel_params("FRA9")).await.unwrap();
    editor.mark_as_dirty();
    fixture.store.fail_next_save(ServiceError::VersionConflict {
        remote: None,
        local: None,
    });

    assert!(!editor.save().await);
    assert_eq!(editor.conflict_refreshes(), 0);
}

#[tokio::test]
async fn test_save_and_close() {
    let (fixture, editor, _) = loaded_editor(EditorOptions::default()).await;
    editor.hooks().edit(|l| l.location = "Lorient".into());

    assert!(editor.save_and_close().await);
    assert_eq!(fixture.router.history(), vec!["/landings".to_string()]);
}

#[tokio::test]
async fn test_save_and_close_stays_on_failure() {
    let (fixture, editor, _) = loaded_editor(EditorOptions::default()).await;
    editor.hooks().edit(|l| l.location = "Lorient".into());
    fixture
        .store
        .fail_next_save(ServiceError::Transport("timeout".into()));

    assert!(!editor.save_and_close().await);
    assert_eq!(fixture.router.history().len(), 2);
}

#[tokio::test]
async fn test_leave_clean_does_not_ask() {
    let (fixture, editor, _) = loaded_editor(EditorOptions::default()).await;

    assert!(editor.save_if_dirty_and_confirm().await);
    assert_eq!(fixture.confirm.leave_asked(), 0);
}

#[tokio::test]
async fn test_leave_choices() {
    let (fixture, editor, _) = loaded_editor(EditorOptions::default()).await;

    editor.hooks().edit(|l| l.location = "Lorient".into());
    fixture.confirm.answer_leave(LeaveChoice::Cancel);
    assert!(!editor.save_if_dirty_and_confirm().await);
    assert!(editor.is_dirty());

    fixture.confirm.answer_leave(LeaveChoice::Discard);
    assert!(editor.save_if_dirty_and_confirm().await);
    assert!(!editor.is_dirty());
    assert_eq!(fixture.store.calls().saves, 0);

    editor.hooks().edit(|l| l.location = "Lorient".into());
    fixture.confirm.answer_leave(LeaveChoice::Save);
    assert!(editor.save_if_dirty_and_confirm().await);
    assert_eq!(fixture.store.calls().saves, 1);
    assert_eq!(fixture.confirm.leave_asked(), 3);
}

// ------------------------------------------------------------------
// Delete
// ------------------------------------------------------------------

#[tokio::test]
async fn test_delete_declined() {
    let (fixture, editor, id) = loaded_editor(EditorOptions::default()).await;
    fixture.confirm.answer_delete(false);

    assert!(!editor.delete().await);

    assert_eq!(fixture.confirm.delete_asked(), 1);
    assert_eq!(fixture.store.calls().deletes, 0);
    assert!(fixture.store.get(&id).is_some());
    assert_eq!(editor.state(), SessionState::Ready { dirty: false });
}

#[tokio::test(start_paused = true)]
async fn test_delete_navigates_back_after_delay() {
    let (fixture, editor, id) = loaded_editor(EditorOptions::default()).await;

    assert!(editor.delete().await);

    assert!(fixture.store.get(&id).is_none());
    assert_eq!(editor.state(), SessionState::Deleted);
    assert!(!editor.has_remote_listener());
    assert_eq!(HookCallsView::of(&editor).deleted, 1);
    assert_eq!(fixture.router.history().len(), 2);

    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(fixture.router.history(), vec!["/landings".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_delete_falls_back_to_default_href() {
    let fixture = LandingFixture::at("/landings/1");
    fixture.store.insert(Landing::new("FRA1", "Brest"));
    let editor =
        fixture.controller(EditorOptions::default().with_default_back_href("/landings"));
    editor.load(Some(1), Params::new()).await.unwrap();

    assert!(editor.delete().await);
    tokio::time::sleep(Duration::from_millis(600)).await;

    let navigations = fixture.router.navigations();
    let (path, extras) = navigations.last().unwrap();
    assert_eq!(path, "/landings");
    assert!(extras.replace);
}

#[tokio::test]
async fn test_delete_new_record_skips_service() {
    let fixture = LandingFixture::at("/landings/new");
    let editor = fixture.controller(EditorOptions::default());
    editor.load(None, vessel_params("FRA2")).await.unwrap();

    assert!(editor.delete().await);

    assert_eq!(fixture.store.calls().deletes, 0);
    assert_eq!(HookCallsView::of(&editor).deleted, 1);
    assert_eq!(editor.state(), SessionState::Deleted);
}

#[tokio::test]
async fn test_delete_failure_restores_session() {
    let (fixture, editor, id) = loaded_editor(EditorOptions::default()).await;
    fixture
        .store
        .fail_next_delete(ServiceError::Validation("landing has sales".into()));

    assert!(!editor.delete().await);

    assert!(fixture.store.get(&id).is_some());
    assert_eq!(editor.state(), SessionState::Ready { dirty: true });
    assert!(editor.is_enabled());
    assert!(editor.submitted());
    assert!(editor.error().unwrap().details.unwrap().ends_with("landing has sales"));
    assert_eq!(HookCallsView::of(&editor).deleted, 0);
}

// ------------------------------------------------------------------
// Teardown
// ------------------------------------------------------------------

#[tokio::test]
async fn test_destroy_is_idempotent() {
    let (fixture, editor, id) = loaded_editor(EditorOptions::default()).await;
    let before = editor.record();

    editor.destroy();
    editor.destroy();

    assert!(!editor.has_remote_listener());
    assert!(!editor.start_listening_remote_changes());
    fixture.store.remote_update(&id, |l| l.measurements = 99);
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(editor.record(), before);
}

#[tokio::test(start_paused = true)]
async fn test_destroy_cancels_post_delete_navigation() {
    let (fixture, editor, _) = loaded_editor(EditorOptions::default()).await;

    assert!(editor.delete().await);
    editor.destroy();
    tokio::time::sleep(Duration::from_millis(600)).await;

    assert_eq!(
        fixture.router.history(),
        vec!["/landings".to_string(), "/landings/1".to_string()]
    );
}

#[tokio::test]
async fn test_listening_disabled_by_options() {
    let (fixture, editor, _) =
        loaded_editor(EditorOptions::default().with_listen_remote_changes(false)).await;

    assert!(!editor.has_remote_listener());
    assert_eq!(fixture.store.calls().listens, 0);
}

/// Snapshot of the landing hook counters
struct HookCallsView {
    new_entity: usize,
    loaded: usize,
    saved: usize,
    deleted: usize,
}

impl HookCallsView {
    fn of(editor: &LandingController) -> Self {
        use fsr_harness::HookCalls;
        let calls = &editor.hooks().calls;
        Self {
            new_entity: HookCalls::get(&calls.new_entity),
            loaded: HookCalls::get(&calls.loaded),
            saved: HookCalls::get(&calls.saved),
            deleted: HookCalls::get(&calls.deleted),
        }
    }
}
