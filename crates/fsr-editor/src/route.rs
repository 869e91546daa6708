//! Route synchronisation
//!
//! Keeps the browser-style path of the editor in line with the record it
//! shows: `/…/new` while the record is unsaved, `/…/<id>` once persisted,
//! with the selected tab mirrored in the query string.

use crate::collaborators::Router;
use crate::types::{EditorOptions, NavigationExtras, Params};

/// Where the editor currently is and what it shows
#[derive(Debug, Clone, Copy)]
pub struct RouteContext<'a> {
    /// Current path
    pub current_path: &'a str,
    /// Current query parameters
    pub current_query: &'a Params,
    /// Path segment of the previously shown record (`None` when it was new)
    pub previous_segment: Option<&'a str>,
    /// Id of the record now shown (`None` when new)
    pub record_id: Option<&'a str>,
    /// Selected tab
    pub selected_tab: usize,
}

/// Navigation to perform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteUpdate {
    /// Target path
    pub path: String,
    /// Query parameters and history mode
    pub extras: NavigationExtras,
}

/// Computes and applies the canonical route of a record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteSynchronizer {
    new_token: String,
    tab_param: String,
    base_path: Option<String>,
}

impl Default for RouteSynchronizer {
    fn default() -> Self {
        Self::from_options(&EditorOptions::default())
    }
}

impl RouteSynchronizer {
    /// Synchroniser using the tokens of `options`
    #[must_use]
    pub fn from_options(options: &EditorOptions) -> Self {
        Self {
            new_token: options.new_token.clone(),
            tab_param: options.tab_param.clone(),
            base_path: None,
        }
    }

    /// Always build paths under `base`, ignoring the current path
    #[must_use]
    pub fn with_base_path(mut self, base: impl Into<String>) -> Self {
        let base = base.into();
        self.base_path = Some(base.trim_end_matches('/').to_string());
        self
    }

    /// Canonical route for `ctx`
    #[must_use]
    pub fn compute(&self, ctx: RouteContext<'_>) -> RouteUpdate {
        let target = ctx.record_id.unwrap_or(&self.new_token);
        let path = match &self.base_path {
            Some(base) => format!("{base}/{target}"),
            None => self.rewrite(ctx.current_path, ctx.previous_segment, target),
        };

        let mut query_params = ctx.current_query.clone();
        query_params.insert(self.tab_param.clone(), ctx.selected_tab.to_string());

        RouteUpdate {
            path,
            extras: NavigationExtras {
                query_params,
                replace: true,
            },
        }
    }

    /// Replace the id segment of `current`, or append the target segment
    fn rewrite(&self, current: &str, previous: Option<&str>, target: &str) -> String {
        let trimmed = current.trim_end_matches('/');
        let (parent, last) = match trimmed.rsplit_once('/') {
            Some((parent, last)) => (parent, last),
            None => ("", trimmed),
        };
        let replaceable = last == self.new_token || previous.is_some_and(|p| p == last);
        if replaceable {
            format!("{parent}/{target}")
        } else {
            format!("{trimmed}/{target}")
        }
    }

    /// Navigate to `update`; returns whether navigation happened
    pub async fn apply(&self, router: &dyn Router, update: RouteUpdate) -> bool {
        tracing::debug!(path = %update.path, "updating route");
        let navigated = router.navigate(&update.path, update.extras).await;
        if !navigated {
            tracing::warn!(path = %update.path, "route update refused by router");
        }
        navigated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn ctx<'a>(
        current_path: &'a str,
        current_query: &'a Params,
        previous_segment: Option<&'a str>,
        record_id: Option<&'a str>,
    ) -> RouteContext<'a> {
        RouteContext {
            current_path,
            current_query,
            previous_segment,
            record_id,
            selected_tab: 1,
        }
    }

    #[test]
    fn new_segment_replaced_by_assigned_id() {
        let query = Params::new();
        let sync = RouteSynchronizer::default();
        let update = sync.compute(ctx("/landings/new", &query, None, Some("5")));
        assert_eq!(update.path, "/landings/5");
        assert!(update.extras.replace);
        assert_eq!(update.extras.query_params.get("tab").map(String::as_str), Some("1"));
    }

    #[test]
    fn previous_id_segment_replaced() {
        let query = Params::new();
        let sync = RouteSynchronizer::default();
        let update = sync.compute(ctx("/landings/5/", &query, Some("5"), Some("6")));
        assert_eq!(update.path, "/landings/6");
    }

    #[test]
    fn new_record_appends_new_token() {
        let query = Params::new();
        let sync = RouteSynchronizer::default();
        let update = sync.compute(ctx("/landings", &query, None, None));
        assert_eq!(update.path, "/landings/new");
    }

    #[test]
    fn base_path_wins_over_current_path() {
        let query = Params::new();
        let sync = RouteSynchronizer::default().with_base_path("/referential/program/");
        let update = sync.compute(ctx("/somewhere/else", &query, None, Some("12")));
        assert_eq!(update.path, "/referential/program/12");
    }

    #[test]
    fn other_query_params_are_preserved() {
        let mut query = Params::new();
        query.insert("parent".into(), "trip-3".into());
        query.insert("tab".into(), "0".into());
        let sync = RouteSynchronizer::default();
        let update = sync.compute(ctx("/landings/new", &query, None, Some("5")));

        let mut expected = Params::new();
        expected.insert("parent".into(), "trip-3".into());
        expected.insert("tab".into(), "1".into());
        assert_eq!(update.extras.query_params, expected);
    }

    proptest! {
        #[test]
        fn prop_path_ends_with_record_segment(id in 1u32..100_000, prefix in "[a-z]{1,8}") {
            let query = Params::new();
            let sync = RouteSynchronizer::default();
            let current = format!("/{prefix}/new");
            let id = id.to_string();
            let update = sync.compute(ctx(&current, &query, None, Some(&id)));
            prop_assert_eq!(update.path, format!("/{prefix}/{id}"));
        }
    }
}
