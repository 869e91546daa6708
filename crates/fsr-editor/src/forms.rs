//! Child form registry
//!
//! One edited record is spread across several sub-forms and sub-tables,
//! each shown on a tab. Forms are owned by the domain editor that built
//! them; the registry only keeps weak handles and aggregates state and
//! commands over whatever is still alive.

use crate::error::EditorError;
use std::sync::{Arc, Weak};
use std::time::Duration;

/// Capability set of a child form
///
/// Implementations use interior mutability; every method takes `&self`
/// so forms can be shared between the domain editor and the registry.
pub trait ChildForm: Send + Sync {
    /// All controls pass validation
    fn is_valid(&self) -> bool;

    /// Validation settled and failed
    fn is_invalid(&self) -> bool {
        !self.is_valid() && !self.is_pending()
    }

    /// User changed a value since the last pristine mark
    fn is_dirty(&self) -> bool;

    /// Asynchronous validation still running
    fn is_pending(&self) -> bool;

    /// User focused a control since the last untouched mark
    fn is_touched(&self) -> bool;

    /// Allow edits
    fn enable(&self);

    /// Forbid edits
    fn disable(&self);

    /// Forget dirtiness
    fn mark_as_pristine(&self);

    /// Mark every control touched, revealing validation messages
    fn mark_as_touched(&self);

    /// Forget touches
    fn mark_as_untouched(&self);

    /// Clear values and state
    fn reset(&self);
}

/// Arena index of a registered form
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FormHandle(usize);

impl FormHandle {
    /// Arena slot
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Clone)]
struct Slot {
    form: Weak<dyn ChildForm>,
    tab: usize,
}

/// Registry of the child forms composing one record
#[derive(Clone, Default)]
pub struct ChildFormRegistry {
    slots: Vec<Option<Slot>>,
}

impl std::fmt::Debug for ChildFormRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChildFormRegistry")
            .field("registered", &self.slots.iter().flatten().count())
            .field("live", &self.len())
            .finish()
    }
}

impl ChildFormRegistry {
    /// Create empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a form shown on `tab`
    pub fn register<F: ChildForm + 'static>(&mut self, form: &Arc<F>, tab: usize) -> FormHandle {
        let weak: Weak<F> = Arc::downgrade(form);
        self.push(weak, tab)
    }

    /// Register an already type-erased form shown on `tab`
    pub fn register_dyn(&mut self, form: &Arc<dyn ChildForm>, tab: usize) -> FormHandle {
        self.push(Arc::downgrade(form), tab)
    }

    fn push(&mut self, form: Weak<dyn ChildForm>, tab: usize) -> FormHandle {
        self.slots.push(Some(Slot { form, tab }));
        FormHandle(self.slots.len() - 1)
    }

    /// Remove a form; returns whether it was registered
    pub fn unregister(&mut self, handle: FormHandle) -> bool {
        self.slots
            .get_mut(handle.0)
            .and_then(Option::take)
            .is_some()
    }

    /// Drop every registration
    pub fn clear(&mut self) {
        self.slots.clear();
    }

    /// Tab a form was registered on
    #[must_use]
    pub fn tab_of(&self, handle: FormHandle) -> Option<usize> {
        self.slots.get(handle.0)?.as_ref().map(|s| s.tab)
    }

    /// Number of forms still alive
    #[must_use]
    pub fn len(&self) -> usize {
        self.live().count()
    }

    /// No live form registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Live forms with their tab, in registration order
    fn live(&self) -> impl Iterator<Item = (usize, Arc<dyn ChildForm>)> + '_ {
        self.slots
            .iter()
            .flatten()
            .filter_map(|s| s.form.upgrade().map(|f| (s.tab, f)))
    }

    /// Every live form is valid
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.live().all(|(_, f)| f.is_valid())
    }

    /// Some live form settled invalid
    #[must_use]
    pub fn is_invalid(&self) -> bool {
        self.live().any(|(_, f)| f.is_invalid())
    }

    /// Some live form is dirty
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.live().any(|(_, f)| f.is_dirty())
    }

    /// Some live form has validation in flight
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.live().any(|(_, f)| f.is_pending())
    }

    /// Some live form was touched
    #[must_use]
    pub fn is_touched(&self) -> bool {
        self.live().any(|(_, f)| f.is_touched())
    }

    /// Enable every form
    pub fn enable(&self) {
        self.live().for_each(|(_, f)| f.enable());
    }

    /// Disable every form
    pub fn disable(&self) {
        self.live().for_each(|(_, f)| f.disable());
    }

    /// Mark every form pristine
    pub fn mark_as_pristine(&self) {
        self.live().for_each(|(_, f)| f.mark_as_pristine());
    }

    /// Mark every form touched
    pub fn mark_as_touched(&self) {
        self.live().for_each(|(_, f)| f.mark_as_touched());
    }

    /// Mark every form untouched
    pub fn mark_as_untouched(&self) {
        self.live().for_each(|(_, f)| f.mark_as_untouched());
    }

    /// Reset every form
    pub fn reset(&self) {
        self.live().for_each(|(_, f)| f.reset());
    }

    /// Lowest tab holding an invalid form
    #[must_use]
    pub fn first_invalid_tab(&self) -> Option<usize> {
        self.live()
            .filter(|(_, f)| !f.is_valid())
            .map(|(tab, _)| tab)
            .min()
    }

    /// Suspend until no form reports pending validation
    ///
    /// # Errors
    /// `EditorError::PendingTimeout` when `timeout` elapses first.
    pub async fn wait_while_pending(
        &self,
        poll_interval: Duration,
        timeout: Option<Duration>,
    ) -> Result<(), EditorError> {
        let started = tokio::time::Instant::now();
        while self.is_pending() {
            if let Some(limit) = timeout {
                if started.elapsed() >= limit {
                    return Err(EditorError::PendingTimeout {
                        waited_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
                    });
                }
            }
            tokio::time::sleep(poll_interval).await;
        }
        Ok(())
    }
}

/// Tab to select so the first invalid form becomes visible
///
/// `None` when nothing is invalid or that tab is already selected.
#[inline]
#[must_use]
pub fn tab_to_open(selected: usize, first_invalid: Option<usize>) -> Option<usize> {
    first_invalid.filter(|tab| *tab != selected)
}
