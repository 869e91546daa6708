//! Toggleable child form

use fsr_editor::ChildForm;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Child form whose state tests flip directly
#[derive(Debug)]
pub struct TestForm {
    name: &'static str,
    valid: AtomicBool,
    dirty: AtomicBool,
    pending: AtomicBool,
    touched: AtomicBool,
    enabled: AtomicBool,
    resets: AtomicUsize,
}

impl TestForm {
    /// Valid, pristine, disabled form
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            valid: AtomicBool::new(true),
            dirty: AtomicBool::new(false),
            pending: AtomicBool::new(false),
            touched: AtomicBool::new(false),
            enabled: AtomicBool::new(false),
            resets: AtomicUsize::new(0),
        }
    }

    /// Form name
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Set validity
    pub fn set_valid(&self, valid: bool) {
        self.valid.store(valid, Ordering::SeqCst);
    }

    /// Set dirtiness, as a user edit would
    pub fn set_dirty(&self, dirty: bool) {
        self.dirty.store(dirty, Ordering::SeqCst);
    }

    /// Set pending asynchronous validation
    pub fn set_pending(&self, pending: bool) {
        self.pending.store(pending, Ordering::SeqCst);
    }

    /// Form accepts edits
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Number of resets
    #[must_use]
    pub fn resets(&self) -> usize {
        self.resets.load(Ordering::SeqCst)
    }
}

impl ChildForm for TestForm {
    fn is_valid(&self) -> bool {
        self.valid.load(Ordering::SeqCst) && !self.pending.load(Ordering::SeqCst)
    }

    fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }

    fn is_pending(&self) -> bool {
        self.pending.load(Ordering::SeqCst)
    }

    fn is_touched(&self) -> bool {
        self.touched.load(Ordering::SeqCst)
    }

    fn enable(&self) {
        self.enabled.store(true, Ordering::SeqCst);
    }

    fn disable(&self) {
        self.enabled.store(false, Ordering::SeqCst);
    }

    fn mark_as_pristine(&self) {
        self.dirty.store(false, Ordering::SeqCst);
    }

    fn mark_as_touched(&self) {
        self.touched.store(true, Ordering::SeqCst);
    }

    fn mark_as_untouched(&self) {
        self.touched.store(false, Ordering::SeqCst);
    }

    fn reset(&self) {
        self.resets.fetch_add(1, Ordering::SeqCst);
        self.dirty.store(false, Ordering::SeqCst);
        self.touched.store(false, Ordering::SeqCst);
    }
}
