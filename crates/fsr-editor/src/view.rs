//! View update planning
//!
//! A view update runs as an ordered pipeline: compute the plan (pure),
//! select the tab, apply navigation, then recompute the title. The title
//! comes last because it may depend on the path reached by navigation.

use crate::types::PreviousId;

/// Caller overrides for one view update
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ViewOptions {
    /// Force or forbid the route update
    pub update_route: Option<bool>,
    /// Force the tab to open
    pub open_tab_index: Option<usize>,
}

/// Session facts the plan is computed from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewInputs {
    /// Route rewriting enabled
    pub auto_update_route: bool,
    /// Tab advance enabled
    pub auto_open_next_tab: bool,
    /// A load is in flight
    pub loading: bool,
    /// Selected tab
    pub selected_tab: usize,
    /// Number of tabs
    pub tab_count: usize,
}

/// Side effects a view update must perform
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ViewUpdatePlan {
    /// Identity changed since the previous update
    pub id_changed: bool,
    /// Rewrite the route
    pub update_route: bool,
    /// Tab to select
    pub open_tab_index: Option<usize>,
}

impl ViewUpdatePlan {
    /// Plan the update showing a record with id `next` after `previous`
    #[must_use]
    pub fn compute<Id: PartialEq>(
        previous: &PreviousId<Id>,
        next: Option<&Id>,
        inputs: ViewInputs,
        overrides: ViewOptions,
    ) -> Self {
        let id_changed = previous.changed_to(next);
        let update_route = overrides
            .update_route
            .unwrap_or(inputs.auto_update_route && id_changed && !inputs.loading);
        let advance = inputs.auto_open_next_tab
            && id_changed
            && previous.is_nil()
            && inputs.selected_tab + 1 < inputs.tab_count;
        let open_tab_index = overrides
            .open_tab_index
            .or_else(|| advance.then_some(inputs.selected_tab + 1));
        Self {
            id_changed,
            update_route,
            open_tab_index,
        }
    }
}

/// What a view update did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ViewUpdateOutcome {
    /// The plan that was executed
    pub plan: ViewUpdatePlan,
    /// Router accepted the navigation
    pub navigated: bool,
}
