//! Scripted editing sessions
//!
//! Drives a landing editor through create, edits, remote updates, a
//! version conflict, and delete, against the in-memory collaborators, and
//! reports what the session observed.

use crate::model::Landing;
use crate::LandingFixture;
use fsr_editor::{EditorError, EditorOptions, Entity, Params, UsageMode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How long to wait for a pushed change to reach the session
const SETTLE_TIMEOUT: Duration = Duration::from_secs(1);
const SETTLE_POLL: Duration = Duration::from_millis(5);

/// Simulator configuration, read from TOML
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Editor options
    pub editor: EditorOptions,
    /// Session script
    pub scenario: Scenario,
}

impl SimulatorConfig {
    /// Parse a TOML document
    ///
    /// # Errors
    /// Returns the TOML error on malformed input.
    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }
}

/// Session script
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Scenario {
    /// Path the router starts at
    pub start_path: String,
    /// Vessel of the created landing
    pub vessel: String,
    /// Location typed in before the first save
    pub location: String,
    /// Global usage mode
    pub usage_mode: UsageMode,
    /// Edit-and-save rounds after creation
    pub edits: u32,
    /// Remote updates pushed; odd ones arrive over local edits
    pub remote_updates: u32,
    /// Force a stale save after the remote updates
    pub inject_conflict: bool,
    /// Delete the landing at the end
    pub delete_at_end: bool,
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            start_path: "/landings/new".to_string(),
            vessel: "FRA000851751".to_string(),
            location: "Brest".to_string(),
            usage_mode: UsageMode::Desk,
            edits: 2,
            remote_updates: 2,
            inject_conflict: true,
            delete_at_end: true,
        }
    }
}

/// What a simulated session observed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationReport {
    /// Saves that returned `true`
    pub saves_ok: u32,
    /// Saves that returned `false`
    pub saves_failed: u32,
    /// Remote updates shown to the user
    pub remote_applied: u32,
    /// Remote updates dropped over local edits
    pub remote_discarded: u32,
    /// Cache refreshes triggered by version conflicts
    pub conflict_refreshes: u64,
    /// Id assigned to the landing
    pub record_id: Option<i64>,
    /// Selected tab at the end
    pub selected_tab: usize,
    /// Last title
    pub title: String,
    /// Router path at the end
    pub final_path: String,
    /// Navigations requested
    pub navigations: usize,
    /// Landing deleted
    pub deleted: bool,
}

/// Run the scripted session described by `config`
///
/// # Errors
/// Load failures of the session.
pub async fn run_simulation(config: &SimulatorConfig) -> Result<SimulationReport, EditorError> {
    let scenario = &config.scenario;
    let fixture = LandingFixture::with_router(
        crate::MemoryRouter::at(scenario.start_path.clone()).with_previous_page("/landings"),
        scenario.usage_mode,
    );
    let editor = fixture.controller(config.editor.clone());
    let mut report = SimulationReport::default();

    let mut params = Params::new();
    params.insert("vessel".into(), scenario.vessel.clone());
    editor.load(None, params).await?;
    if let Some(landing) = editor.record() {
        tracing::info!(landing = %describe(&landing), "simulating landing session");
    }

    let location = scenario.location.clone();
    editor.hooks().edit(|l| l.location = location);
    count_save(editor.save().await, &mut report);
    let created = editor.record().ok_or(EditorError::NotLoaded)?;
    let id = created.id().ok_or(EditorError::NotLoaded)?;
    tracing::info!(landing = %describe(&created), "landing created");

    for round in 0..scenario.edits {
        editor
            .hooks()
            .edit(|l| l.comments = Some(format!("round {round}")));
        count_save(editor.save().await, &mut report);
    }

    for i in 0..scenario.remote_updates {
        let over_local_edits = i % 2 == 1;
        if over_local_edits {
            editor.hooks().edit(|l| l.comments = Some("local".into()));
        }
        let pushed = fixture.store.remote_update(&id, |l| l.measurements += 1);
        let pushed_stamp = pushed.and_then(|l| l.update_date);
        let applied = wait_for(|| editor.record().and_then(|l| l.update_date) == pushed_stamp).await;
        if applied {
            report.remote_applied += 1;
        } else {
            report.remote_discarded += 1;
            editor.mark_as_pristine();
            editor.reload().await?;
        }
    }

    if scenario.inject_conflict {
        editor.hooks().edit(|l| l.comments = Some("stale".into()));
        fixture.store.remote_update(&id, |l| l.measurements += 10);
        count_save(editor.save().await, &mut report);
        editor.mark_as_pristine();
        editor.reload().await?;
    }

    if scenario.delete_at_end {
        report.deleted = editor.delete().await;
        let delay = Duration::from_millis(config.editor.post_delete_delay_ms) + SETTLE_POLL;
        tokio::time::sleep(delay).await;
    }
    editor.destroy();

    report.conflict_refreshes = editor.conflict_refreshes();
    report.record_id = Some(id);
    report.selected_tab = editor.selected_tab_index();
    report.title = editor.title();
    report.final_path = fsr_editor::Router::current_path(fixture.router.as_ref());
    report.navigations = fixture.router.navigations().len();
    Ok(report)
}

fn count_save(saved: bool, report: &mut SimulationReport) {
    if saved {
        report.saves_ok += 1;
    } else {
        report.saves_failed += 1;
    }
}

async fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + SETTLE_TIMEOUT;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(SETTLE_POLL).await;
    }
    condition()
}

/// Identity of a landing for log lines
#[must_use]
pub fn describe(landing: &Landing) -> String {
    match landing.id() {
        Some(id) => format!("{}#{id}", landing.vessel),
        None => format!("{} (new)", landing.vessel),
    }
}
