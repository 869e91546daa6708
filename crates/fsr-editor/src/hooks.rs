//! Domain editor capabilities
//!
//! A concrete editor (program, strategy, landing, batch tree…) plugs its
//! record-specific behaviour into the controller through [`EditorHooks`].

use crate::collaborators::Settings;
use crate::error::EditorError;
use crate::forms::ChildFormRegistry;
use crate::types::{Entity, Params, UsageMode};

/// Record-specific behaviour of one editor
///
/// Lifecycle callbacks default to no-ops. Title, write permission, form
/// registration, and the form/record binding have no sensible default.
#[async_trait::async_trait]
pub trait EditorHooks<T: Entity>: Send + Sync + 'static {
    /// Fresh default record for the "new" route
    fn new_entity(&self, params: &Params) -> T;

    /// Called once a fresh record is built, before it is shown
    async fn on_new_entity(&self, _record: &mut T, _params: &Params) {}

    /// Called once a record is fetched, before it is shown
    async fn on_entity_loaded(&self, _record: &mut T, _params: &Params) {}

    /// Called with the server copy after a successful save
    async fn on_entity_saved(&self, _record: &mut T) {}

    /// Called after a delete
    async fn on_entity_deleted(&self, _record: &T) {}

    /// Page title for `record`
    async fn compute_title(&self, record: &T) -> String;

    /// Usage mode for `record`; defaults to the global setting
    fn compute_usage_mode(&self, _record: &T, settings: &dyn Settings) -> UsageMode {
        if settings.is_usage_mode(UsageMode::Field) {
            UsageMode::Field
        } else {
            UsageMode::Desk
        }
    }

    /// Whether the current user may modify `record`
    fn can_user_write(&self, record: &T) -> bool;

    /// Tab holding the first invalid form, `None` when all are valid
    fn first_invalid_tab_index(&self, forms: &ChildFormRegistry) -> Option<usize> {
        forms.first_invalid_tab()
    }

    /// Register the child forms composing the record
    fn register_forms(&self, forms: &mut ChildFormRegistry);

    /// Push `record` into the forms
    async fn set_value(&self, record: &T);

    /// Record built from the current form values
    ///
    /// # Errors
    /// `EditorError::InvalidValue` when the forms cannot produce a record.
    async fn value(&self) -> Result<T, EditorError>;
}
