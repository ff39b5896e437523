//! Scenario modules, grouped the way the rubric groups them.
//!
//! All scenarios are registered via the `scenario!` macro and collected
//! through inventory; this module runs and lists them.

pub mod channel;
pub mod connection;
pub mod fixtures;
pub mod messaging;
pub mod network;
pub mod robustness;

use crate::{Scenario, ScenarioCtx, TestResult};

/// Run a scenario by name (e.g. "connection.welcome_basic").
pub async fn run(name: &str, ctx: &ScenarioCtx) -> TestResult {
    for scenario in inventory::iter::<Scenario> {
        if scenario.name == name {
            return match (scenario.func)(ctx).await {
                Ok(()) => TestResult::pass(name),
                Err(e) => TestResult::fail(name, e.to_string()),
            };
        }
    }

    TestResult::fail(name, format!("unknown scenario: {name}"))
}

/// All scenarios as `(name, category)`, sorted by name.
pub fn list_all() -> Vec<(&'static str, &'static str)> {
    let mut all: Vec<_> = inventory::iter::<Scenario>
        .into_iter()
        .map(|s| (s.name, s.category))
        .collect();
    all.sort_unstable();
    all
}

/// Scenarios in one rubric category, sorted by name.
pub fn list_category(category: &str) -> Vec<(&'static str, &'static str)> {
    let mut filtered: Vec<_> = inventory::iter::<Scenario>
        .into_iter()
        .filter(|s| s.category == category)
        .map(|s| (s.name, s.category))
        .collect();
    filtered.sort_unstable();
    filtered
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn registry_is_populated() {
        assert!(list_all().len() >= 40);
    }

    #[test]
    fn scenario_names_are_unique_and_dotted() {
        let all = list_all();
        let names: HashSet<_> = all.iter().map(|(name, _)| *name).collect();
        assert_eq!(names.len(), all.len());
        for (name, category) in &all {
            assert!(name.contains('.'), "scenario {name} has no module prefix");
            assert!(!category.is_empty());
        }
    }

    #[test]
    fn category_listing_filters() {
        let robust = list_category("ROBUST");
        assert!(!robust.is_empty());
        assert!(robust.iter().all(|(name, _)| name.starts_with("robust.")));
    }
}
