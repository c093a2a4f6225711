//! Filtered navigation: the one piece of presentation logic precisely
//! specified and shared by every navigation surface.
//!
//! Three independent rules compose, in order:
//! 1. permission/context filtering (restricted items are hidden
//!    entirely, preserving sibling order),
//! 2. middle truncation of long flat lists (first item, one ellipsis
//!    placeholder, last `max - 2` items — the root and the current
//!    location stay visible),
//! 3. badge capping at "99+", with zero/absent badges rendering nothing.
//!
//! Expand/collapse state is tracked separately, keyed by item id, and
//! applies only to nodes that survive filtering.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Reserved id of the non-interactive truncation placeholder.
pub const ELLIPSIS_ID: &str = "ellipsis";

/// Counts above this render as "99+".
const BADGE_CAP: u64 = 99;

/// Fewest entries a collapsed list can hold: first + ellipsis + last.
const MIN_TRUNCATED: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavItem {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub badge: Option<u64>,
    /// Item is dropped unless the viewer holds this permission.
    #[serde(default)]
    pub required_permission: Option<String>,
    /// Item is dropped unless this matches the active workspace context.
    #[serde(default)]
    pub workspace_context: Option<String>,
    #[serde(default)]
    pub children: Vec<NavItem>,
}

impl NavItem {
    pub fn new(id: &str, label: &str) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            badge: None,
            required_permission: None,
            workspace_context: None,
            children: Vec::new(),
        }
    }

    pub fn with_permission(mut self, permission: &str) -> Self {
        self.required_permission = Some(permission.to_string());
        self
    }

    pub fn with_context(mut self, context: &str) -> Self {
        self.workspace_context = Some(context.to_string());
        self
    }

    pub fn with_badge(mut self, count: u64) -> Self {
        self.badge = Some(count);
        self
    }

    pub fn with_children(mut self, children: Vec<NavItem>) -> Self {
        self.children = children;
        self
    }

    fn visible_to(&self, permissions: &HashSet<String>, active_context: &str) -> bool {
        if let Some(required) = &self.required_permission
            && !permissions.contains(required)
        {
            return false;
        }
        if let Some(context) = &self.workspace_context
            && context != active_context
        {
            return false;
        }
        true
    }
}

/// Drop items (recursively) failing the permission check or declaring a
/// different workspace context. Restricted items are hidden entirely —
/// no locked/disabled affordance. Sibling order is preserved.
pub fn filter_items(
    items: &[NavItem],
    permissions: &HashSet<String>,
    active_context: &str,
) -> Vec<NavItem> {
    items
        .iter()
        .filter(|item| item.visible_to(permissions, active_context))
        .map(|item| {
            let mut kept = item.clone();
            kept.children = filter_items(&item.children, permissions, active_context);
            kept
        })
        .collect()
}

/// Collapse the middle of a long flat list: keep the first item, insert
/// one ellipsis placeholder, keep the last `max_items - 2`. Lists at or
/// under the limit pass through unchanged. `max_items` below 3 is
/// clamped to 3.
pub fn truncate_middle(items: &[NavItem], max_items: usize) -> Vec<NavItem> {
    let max_items = max_items.max(MIN_TRUNCATED);
    if items.len() <= max_items {
        return items.to_vec();
    }
    let tail_len = max_items - 2;
    let mut out = Vec::with_capacity(max_items);
    out.push(items[0].clone());
    out.push(NavItem::new(ELLIPSIS_ID, "…"));
    out.extend(items[items.len() - tail_len..].iter().cloned());
    out
}

/// Badge display label: nothing for zero/absent, the count up to 99,
/// "99+" beyond.
pub fn badge_label(count: Option<u64>) -> Option<String> {
    match count {
        None | Some(0) => None,
        Some(c) if c <= BADGE_CAP => Some(c.to_string()),
        Some(_) => Some("99+".to_string()),
    }
}

/// Expand/collapse state for hierarchical items, keyed by id and
/// independent of filtering.
#[derive(Debug, Default, Clone)]
pub struct ExpandState {
    expanded: HashSet<String>,
}

impl ExpandState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every listed id starts expanded.
    pub fn expanded_by_default(ids: impl IntoIterator<Item = String>) -> Self {
        Self {
            expanded: ids.into_iter().collect(),
        }
    }

    pub fn is_expanded(&self, id: &str) -> bool {
        self.expanded.contains(id)
    }

    pub fn toggle(&mut self, id: &str) {
        if !self.expanded.remove(id) {
            self.expanded.insert(id.to_string());
        }
    }

    pub fn collapse_all(&mut self) {
        self.expanded.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn perms(list: &[&str]) -> HashSet<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn flat(n: usize) -> Vec<NavItem> {
        (0..n)
            .map(|i| NavItem::new(&format!("item{}", i), &format!("Item {}", i)))
            .collect()
    }

    #[test]
    fn filter_drops_missing_permissions_and_keeps_order() {
        let items = vec![
            NavItem::new("home", "Home"),
            NavItem::new("admin", "Admin").with_permission("admin"),
            NavItem::new("tasks", "Tasks").with_permission("tasks:read"),
            NavItem::new("about", "About"),
        ];
        let kept = filter_items(&items, &perms(&["tasks:read"]), "default");
        let ids: Vec<_> = kept.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["home", "tasks", "about"]);
    }

    #[test]
    fn filter_soundness_no_survivor_lacks_permission() {
        let items = vec![
            NavItem::new("a", "A").with_permission("p1").with_children(vec![
                NavItem::new("a1", "A1").with_permission("p2"),
                NavItem::new("a2", "A2"),
            ]),
            NavItem::new("b", "B").with_permission("p3"),
        ];
        let granted = perms(&["p1"]);
        let kept = filter_items(&items, &granted, "default");

        fn check(items: &[NavItem], granted: &HashSet<String>) {
            for item in items {
                if let Some(p) = &item.required_permission {
                    assert!(granted.contains(p), "item '{}' survived without '{}'", item.id, p);
                }
                check(&item.children, granted);
            }
        }
        check(&kept, &granted);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].children.len(), 1);
        assert_eq!(kept[0].children[0].id, "a2");
    }

    #[test]
    fn filter_applies_workspace_context_independently() {
        let items = vec![
            NavItem::new("everywhere", "Everywhere"),
            NavItem::new("acme-only", "Acme").with_context("acme"),
            NavItem::new("globex-only", "Globex").with_context("globex"),
        ];
        let kept = filter_items(&items, &HashSet::new(), "acme");
        let ids: Vec<_> = kept.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["everywhere", "acme-only"]);
    }

    #[test]
    fn truncate_under_limit_is_identity() {
        let items = flat(4);
        assert_eq!(truncate_middle(&items, 4), items);
        assert_eq!(truncate_middle(&flat(2), 4), flat(2));
    }

    #[test]
    fn truncate_seven_items_to_four() {
        let out = truncate_middle(&flat(7), 4);
        let ids: Vec<_> = out.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["item0", ELLIPSIS_ID, "item5", "item6"]);
    }

    #[test]
    fn truncate_always_yields_exactly_max_entries() {
        for len in 5..20 {
            for max in 3..=4 {
                let out = truncate_middle(&flat(len), max);
                assert_eq!(out.len(), max, "len={} max={}", len, max);
                assert_eq!(out[0].id, "item0");
                assert_eq!(out[1].id, ELLIPSIS_ID);
                assert_eq!(out.last().unwrap().id, format!("item{}", len - 1));
            }
        }
    }

    #[test]
    fn truncate_clamps_tiny_max() {
        let out = truncate_middle(&flat(10), 1);
        let ids: Vec<_> = out.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["item0", ELLIPSIS_ID, "item9"]);
    }

    #[test]
    fn badge_labels() {
        assert_eq!(badge_label(None), None);
        assert_eq!(badge_label(Some(0)), None);
        assert_eq!(badge_label(Some(1)), Some("1".to_string()));
        assert_eq!(badge_label(Some(99)), Some("99".to_string()));
        assert_eq!(badge_label(Some(100)), Some("99+".to_string()));
        assert_eq!(badge_label(Some(4321)), Some("99+".to_string()));
    }

    #[test]
    fn expand_state_toggles_independently_of_filtering() {
        let mut state = ExpandState::new();
        assert!(!state.is_expanded("a"));
        state.toggle("a");
        assert!(state.is_expanded("a"));
        state.toggle("a");
        assert!(!state.is_expanded("a"));

        let mut seeded =
            ExpandState::expanded_by_default(["a".to_string(), "b".to_string()]);
        assert!(seeded.is_expanded("b"));
        seeded.collapse_all();
        assert!(!seeded.is_expanded("a"));
    }
}
