//! Core types for the editor session
//!
//! Defines:
//! - The entity contract every edited record satisfies
//! - Usage mode and the three-valued previous id
//! - Editor options (deserializable configuration)
//! - Option structs passed to the persistence and routing collaborators

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{Debug, Display};
use std::str::FromStr;
use std::time::Duration;

/// Query or route parameters, ordered for stable paths
pub type Params = BTreeMap<String, String>;

/// A record edited by one session
///
/// Records without an id have never been persisted.
pub trait Entity: Clone + Debug + Send + Sync + 'static {
    /// Identifier assigned by the persistence layer
    type Id: Clone + Eq + Debug + Display + FromStr + Send + Sync + 'static;

    /// Persisted identity, if any
    fn id(&self) -> Option<Self::Id>;

    /// Server version stamp of this copy
    fn update_date(&self) -> Option<DateTime<Utc>>;

    /// Whether the record was never persisted
    #[inline]
    fn is_new(&self) -> bool {
        self.id().is_none()
    }
}

/// UI/behaviour mode of the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum UsageMode {
    /// Office use, full keyboard
    #[default]
    Desk,
    /// On-board or field use
    Field,
}

impl UsageMode {
    /// Whether the editor should advance to the next tab after the first save
    #[inline]
    #[must_use]
    pub fn auto_opens_next_tab(self) -> bool {
        matches!(self, UsageMode::Field)
    }
}

impl Display for UsageMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UsageMode::Desk => f.write_str("DESK"),
            UsageMode::Field => f.write_str("FIELD"),
        }
    }
}

/// Identity seen by the previous view update
///
/// `Unset` holds until the first update, which is what keeps the first
/// population of an id from counting as an identity change.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PreviousId<Id> {
    /// No view update yet
    #[default]
    Unset,
    /// Last update showed a record without id
    None,
    /// Last update showed this id
    Some(Id),
}

impl<Id: PartialEq> PreviousId<Id> {
    /// Build from the id of the record just shown
    #[inline]
    pub fn from_option(id: Option<Id>) -> Self {
        match id {
            Some(id) => PreviousId::Some(id),
            None => PreviousId::None,
        }
    }

    /// True before the first view update
    #[inline]
    #[must_use]
    pub fn is_unset(&self) -> bool {
        matches!(self, PreviousId::Unset)
    }

    /// True when unset or without id
    #[inline]
    #[must_use]
    pub fn is_nil(&self) -> bool {
        !matches!(self, PreviousId::Some(_))
    }

    /// Whether showing `id` now counts as an identity change
    pub fn changed_to(&self, id: Option<&Id>) -> bool {
        match (self, id) {
            (_, None) | (PreviousId::Unset, _) => false,
            (PreviousId::None, Some(_)) => true,
            (PreviousId::Some(prev), Some(id)) => prev != id,
        }
    }
}

/// Read policy for a load
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FetchPolicy {
    /// Serve from the shared read cache when possible
    #[default]
    CacheFirst,
    /// Always hit the remote store, refreshing the cache
    NetworkOnly,
}

/// Options for `EntityService::load`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadOptions {
    /// Read policy
    pub fetch_policy: FetchPolicy,
    /// Route parameters the load was issued with
    pub params: Params,
}

impl LoadOptions {
    /// Bypass-cache load, used to refresh the shared cache
    #[inline]
    #[must_use]
    pub fn network_only() -> Self {
        Self {
            fetch_policy: FetchPolicy::NetworkOnly,
            params: Params::new(),
        }
    }
}

/// Options for `EntityService::save`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SaveOptions {
    /// Route parameters of the session
    pub params: Params,
}

/// Options for `EntityService::delete`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteOptions {
    /// Route parameters of the session
    pub params: Params,
}

/// Extras for a router navigation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NavigationExtras {
    /// Query parameters of the target
    pub query_params: Params,
    /// Replace the current history entry instead of pushing
    pub replace: bool,
}

/// Page history entry pushed to the settings collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageHistoryEntry {
    /// Page title
    pub title: String,
    /// Page path
    pub path: String,
}

/// Options for page history updates
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HistoryOptions {
    /// Drop older entries pointing at the same path
    pub remove_path_duplicates: bool,
}

/// Editor configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorOptions {
    /// Rewrite the route when the record identity changes
    pub auto_update_route: bool,
    /// Advance to the next tab after the first save; derived from usage mode when unset
    pub auto_open_next_tab: Option<bool>,
    /// Subscribe to remote change notifications for persisted records
    pub listen_remote_changes: bool,
    /// Route parameter holding the record id
    pub id_param: String,
    /// Query parameter holding the selected tab
    pub tab_param: String,
    /// Route token standing for a record not yet persisted
    pub new_token: String,
    /// Fallback location after delete or close
    pub default_back_href: Option<String>,
    /// Delay before navigating away after a delete
    pub post_delete_delay_ms: u64,
    /// Poll interval while waiting for pending validation
    pub pending_poll_interval_ms: u64,
    /// Give up waiting for pending validation after this long
    pub pending_timeout_ms: Option<u64>,
}

impl EditorOptions {
    /// Create default options
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With route rewriting on identity change
    #[inline]
    #[must_use]
    pub fn with_auto_update_route(mut self, enabled: bool) -> Self {
        self.auto_update_route = enabled;
        self
    }

    /// With explicit tab advance policy
    #[inline]
    #[must_use]
    pub fn with_auto_open_next_tab(mut self, enabled: bool) -> Self {
        self.auto_open_next_tab = Some(enabled);
        self
    }

    /// With remote change listening
    #[inline]
    #[must_use]
    pub fn with_listen_remote_changes(mut self, enabled: bool) -> Self {
        self.listen_remote_changes = enabled;
        self
    }

    /// With fallback back location
    #[inline]
    #[must_use]
    pub fn with_default_back_href(mut self, href: impl Into<String>) -> Self {
        self.default_back_href = Some(href.into());
        self
    }

    /// With post-delete navigation delay
    #[inline]
    #[must_use]
    pub fn with_post_delete_delay(mut self, delay: Duration) -> Self {
        self.post_delete_delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// With pending validation timeout
    #[inline]
    #[must_use]
    pub fn with_pending_timeout(mut self, timeout: Duration) -> Self {
        self.pending_timeout_ms = Some(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));
        self
    }

    /// Tab advance policy for the given usage mode
    #[inline]
    #[must_use]
    pub fn auto_open_next_tab_for(&self, mode: UsageMode) -> bool {
        self.auto_open_next_tab
            .unwrap_or_else(|| mode.auto_opens_next_tab())
    }

    #[inline]
    pub(crate) fn post_delete_delay(&self) -> Duration {
        Duration::from_millis(self.post_delete_delay_ms)
    }

    #[inline]
    pub(crate) fn pending_poll_interval(&self) -> Duration {
        Duration::from_millis(self.pending_poll_interval_ms.max(1))
    }

    #[inline]
    pub(crate) fn pending_timeout(&self) -> Option<Duration> {
        self.pending_timeout_ms.map(Duration::from_millis)
    }
}

impl Default for EditorOptions {
    fn default() -> Self {
        Self {
            auto_update_route: true,
            auto_open_next_tab: None,
            listen_remote_changes: true,
            id_param: "id".to_string(),
            tab_param: "tab".to_string(),
            new_token: "new".to_string(),
            default_back_href: None,
            post_delete_delay_ms: 500,
            pending_poll_interval_ms: 50,
            pending_timeout_ms: None,
        }
    }
}
