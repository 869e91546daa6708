//! Recording router, scripted dialogs, and static settings

use fsr_editor::{
    Confirm, HistoryOptions, LeaveChoice, NavigationExtras, PageHistoryEntry, Params, Router,
    Settings, UsageMode,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Router keeping a history stack and every navigation it was asked for
#[derive(Debug)]
pub struct MemoryRouter {
    history: Mutex<Vec<String>>,
    query: Mutex<Params>,
    route_params: Mutex<Params>,
    navigations: Mutex<Vec<(String, NavigationExtras)>>,
    accept: AtomicBool,
}

impl MemoryRouter {
    /// Router positioned at `path`
    #[must_use]
    pub fn at(path: impl Into<String>) -> Self {
        Self {
            history: Mutex::new(vec![path.into()]),
            query: Mutex::new(Params::new()),
            route_params: Mutex::new(Params::new()),
            navigations: Mutex::new(Vec::new()),
            accept: AtomicBool::new(true),
        }
    }

    /// With a route parameter
    #[must_use]
    pub fn with_route_param(self, key: &str, value: &str) -> Self {
        self.route_params.lock().insert(key.into(), value.into());
        self
    }

    /// With a query parameter
    #[must_use]
    pub fn with_query_param(self, key: &str, value: &str) -> Self {
        self.query.lock().insert(key.into(), value.into());
        self
    }

    /// Push `path` as an earlier page, so going back is possible
    #[must_use]
    pub fn with_previous_page(self, path: impl Into<String>) -> Self {
        self.history.lock().insert(0, path.into());
        self
    }

    /// Refuse (or accept again) navigations
    pub fn set_accept(&self, accept: bool) {
        self.accept.store(accept, Ordering::SeqCst);
    }

    /// Navigations requested so far
    #[must_use]
    pub fn navigations(&self) -> Vec<(String, NavigationExtras)> {
        self.navigations.lock().clone()
    }

    /// Paths visited, oldest first
    #[must_use]
    pub fn history(&self) -> Vec<String> {
        self.history.lock().clone()
    }
}

#[async_trait::async_trait]
impl Router for MemoryRouter {
    async fn navigate(&self, path: &str, extras: NavigationExtras) -> bool {
        self.navigations
            .lock()
            .push((path.to_string(), extras.clone()));
        if !self.accept.load(Ordering::SeqCst) {
            return false;
        }
        let mut history = self.history.lock();
        if extras.replace {
            history.pop();
        }
        history.push(path.to_string());
        *self.query.lock() = extras.query_params;
        true
    }

    fn current_path(&self) -> String {
        self.history.lock().last().cloned().unwrap_or_default()
    }

    fn route_param(&self, key: &str) -> Option<String> {
        self.route_params.lock().get(key).cloned()
    }

    fn query_params(&self) -> Params {
        self.query.lock().clone()
    }

    fn can_go_back(&self) -> bool {
        self.history.lock().len() > 1
    }

    async fn go_back(&self) -> bool {
        let mut history = self.history.lock();
        if history.len() < 2 {
            return false;
        }
        history.pop();
        true
    }
}

/// Dialogs answering from a script
#[derive(Debug)]
pub struct ScriptedConfirm {
    delete: AtomicBool,
    leave: Mutex<LeaveChoice>,
    delete_asked: AtomicUsize,
    leave_asked: AtomicUsize,
}

impl Default for ScriptedConfirm {
    fn default() -> Self {
        Self {
            delete: AtomicBool::new(true),
            leave: Mutex::new(LeaveChoice::Save),
            delete_asked: AtomicUsize::new(0),
            leave_asked: AtomicUsize::new(0),
        }
    }
}

impl ScriptedConfirm {
    /// Answer to delete confirmations
    pub fn answer_delete(&self, confirm: bool) {
        self.delete.store(confirm, Ordering::SeqCst);
    }

    /// Answer to "save before leaving?"
    pub fn answer_leave(&self, choice: LeaveChoice) {
        *self.leave.lock() = choice;
    }

    /// Number of delete confirmations asked
    #[must_use]
    pub fn delete_asked(&self) -> usize {
        self.delete_asked.load(Ordering::SeqCst)
    }

    /// Number of leave prompts asked
    #[must_use]
    pub fn leave_asked(&self) -> usize {
        self.leave_asked.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Confirm for ScriptedConfirm {
    async fn ask_delete_confirmation(&self) -> bool {
        self.delete_asked.fetch_add(1, Ordering::SeqCst);
        self.delete.load(Ordering::SeqCst)
    }

    async fn ask_save_before_leave(&self) -> LeaveChoice {
        self.leave_asked.fetch_add(1, Ordering::SeqCst);
        *self.leave.lock()
    }
}

/// Fixed usage mode and an in-memory page history
#[derive(Debug, Default)]
pub struct StaticSettings {
    mode: UsageMode,
    history: Mutex<Vec<PageHistoryEntry>>,
}

impl StaticSettings {
    /// Settings in `mode`
    #[must_use]
    pub fn new(mode: UsageMode) -> Self {
        Self {
            mode,
            history: Mutex::new(Vec::new()),
        }
    }

    /// Page history, oldest first
    #[must_use]
    pub fn page_history(&self) -> Vec<PageHistoryEntry> {
        self.history.lock().clone()
    }
}

#[async_trait::async_trait]
impl Settings for StaticSettings {
    fn is_usage_mode(&self, mode: UsageMode) -> bool {
        self.mode == mode
    }

    async fn add_to_page_history(&self, entry: PageHistoryEntry, options: HistoryOptions) {
        let mut history = self.history.lock();
        if options.remove_path_duplicates {
            history.retain(|e| e.path != entry.path);
        }
        history.push(entry);
    }
}
