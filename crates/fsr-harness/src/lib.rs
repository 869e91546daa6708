//! FSR Harness - in-memory collaborators and scenario simulation
//!
//! Shared fixtures for exercising the editor controller without a server:
//! - [`MemoryStore`]: versioned in-memory persistence with a change feed
//! - [`MemoryRouter`], [`ScriptedConfirm`], [`StaticSettings`]
//! - [`LandingEditor`]: domain hooks for the sample [`Landing`] record
//! - [`simulator`]: scripted editing sessions driven by a TOML config

pub mod collab;
pub mod editor;
pub mod forms;
pub mod model;
pub mod simulator;
pub mod store;

pub use collab::{MemoryRouter, ScriptedConfirm, StaticSettings};
pub use editor::{HookCalls, LandingEditor, HEADER_TAB, MEASUREMENTS_TAB};
pub use forms::TestForm;
pub use model::{Landing, Storable};
pub use simulator::{run_simulation, Scenario, SimulationReport, SimulatorConfig};
pub use store::{MemoryStore, StoreCalls};

use fsr_editor::{Collaborators, EditorController, EditorOptions, RouteSynchronizer, UsageMode};
use std::sync::Arc;

/// Controller editing landings
pub type LandingController = EditorController<Landing, LandingEditor>;

/// Number of tabs of the landing editor
pub const LANDING_TABS: usize = 2;

/// Collaborators wired for a landing editor
#[derive(Debug, Clone)]
pub struct LandingFixture {
    /// Persistence
    pub store: Arc<MemoryStore<Landing>>,
    /// Navigation
    pub router: Arc<MemoryRouter>,
    /// Dialogs
    pub confirm: Arc<ScriptedConfirm>,
    /// Settings
    pub settings: Arc<StaticSettings>,
}

impl LandingFixture {
    /// Fixture with the router at `path`, in desk mode
    #[must_use]
    pub fn at(path: &str) -> Self {
        Self::with_router(MemoryRouter::at(path), UsageMode::Desk)
    }

    /// Fixture with a prepared router and usage mode
    #[must_use]
    pub fn with_router(router: MemoryRouter, mode: UsageMode) -> Self {
        Self {
            store: Arc::new(MemoryStore::new()),
            router: Arc::new(router),
            confirm: Arc::new(ScriptedConfirm::default()),
            settings: Arc::new(StaticSettings::new(mode)),
        }
    }

    /// Collaborators for a controller
    #[must_use]
    pub fn collaborators(&self) -> Collaborators<Landing> {
        Collaborators {
            service: self.store.clone(),
            router: self.router.clone(),
            confirm: self.confirm.clone(),
            settings: self.settings.clone(),
        }
    }

    /// Two-tab landing controller with route synchronisation
    #[must_use]
    pub fn controller(&self, options: EditorOptions) -> LandingController {
        let sync = RouteSynchronizer::from_options(&options);
        EditorController::builder(LandingEditor::default(), self.collaborators())
            .options(options)
            .route_synchronizer(sync)
            .tab_count(LANDING_TABS)
            .build()
    }
}
