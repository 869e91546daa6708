//! Landing editor
//!
//! Domain hooks for [`Landing`]: a header form on tab 0 and a measurement
//! table on tab 1. The "form value" is a plain copy of the record that
//! edits go through.

use crate::forms::TestForm;
use crate::model::Landing;
use fsr_editor::{ChildFormRegistry, EditorError, EditorHooks, Entity, Params};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Tab of the header form
pub const HEADER_TAB: usize = 0;
/// Tab of the measurement table
pub const MEASUREMENTS_TAB: usize = 1;

/// Hook invocation counters
#[derive(Debug, Default)]
pub struct HookCalls {
    /// `on_new_entity`
    pub new_entity: AtomicUsize,
    /// `on_entity_loaded`
    pub loaded: AtomicUsize,
    /// `on_entity_saved`
    pub saved: AtomicUsize,
    /// `on_entity_deleted`
    pub deleted: AtomicUsize,
}

impl HookCalls {
    /// Read a counter
    #[must_use]
    pub fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

/// Editor hooks for landings
#[derive(Debug)]
pub struct LandingEditor {
    /// Header form (tab 0)
    pub header: Arc<TestForm>,
    /// Measurement table (tab 1)
    pub measurements: Arc<TestForm>,
    /// Hook counters
    pub calls: Arc<HookCalls>,
    value: Mutex<Option<Landing>>,
    writable: AtomicBool,
    default_location: String,
}

impl Default for LandingEditor {
    fn default() -> Self {
        Self::new("Unknown port")
    }
}

impl LandingEditor {
    /// Editor whose new landings default to `location`
    #[must_use]
    pub fn new(default_location: impl Into<String>) -> Self {
        Self {
            header: Arc::new(TestForm::new("header")),
            measurements: Arc::new(TestForm::new("measurements")),
            calls: Arc::new(HookCalls::default()),
            value: Mutex::new(None),
            writable: AtomicBool::new(true),
            default_location: default_location.into(),
        }
    }

    /// Edit the form value as the user would, marking the header dirty
    pub fn edit(&self, change: impl FnOnce(&mut Landing)) {
        if let Some(value) = self.value.lock().as_mut() {
            change(value);
            self.header.set_dirty(true);
        }
    }

    /// Current form value
    #[must_use]
    pub fn current(&self) -> Option<Landing> {
        self.value.lock().clone()
    }

    /// Grant or revoke write access
    pub fn set_writable(&self, writable: bool) {
        self.writable.store(writable, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl EditorHooks<Landing> for LandingEditor {
    fn new_entity(&self, params: &Params) -> Landing {
        let vessel = params.get("vessel").cloned().unwrap_or_default();
        Landing::new(vessel, self.default_location.clone())
    }

    async fn on_new_entity(&self, _record: &mut Landing, _params: &Params) {
        self.calls.new_entity.fetch_add(1, Ordering::SeqCst);
    }

    async fn on_entity_loaded(&self, _record: &mut Landing, _params: &Params) {
        self.calls.loaded.fetch_add(1, Ordering::SeqCst);
    }

    async fn on_entity_saved(&self, _record: &mut Landing) {
        self.calls.saved.fetch_add(1, Ordering::SeqCst);
    }

    async fn on_entity_deleted(&self, _record: &Landing) {
        self.calls.deleted.fetch_add(1, Ordering::SeqCst);
    }

    async fn compute_title(&self, record: &Landing) -> String {
        match record.id() {
            Some(id) => format!("Landing {} #{id}", record.vessel),
            None => "New landing".to_string(),
        }
    }

    fn can_user_write(&self, _record: &Landing) -> bool {
        self.writable.load(Ordering::SeqCst)
    }

    fn register_forms(&self, forms: &mut ChildFormRegistry) {
        forms.register(&self.header, HEADER_TAB);
        forms.register(&self.measurements, MEASUREMENTS_TAB);
    }

    async fn set_value(&self, record: &Landing) {
        *self.value.lock() = Some(record.clone());
    }

    async fn value(&self) -> Result<Landing, EditorError> {
        self.value
            .lock()
            .clone()
            .ok_or_else(|| EditorError::InvalidValue("no landing bound to the form".into()))
    }
}
