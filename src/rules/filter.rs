//! Catch-all suppression.

use crate::rules::model::Rule;

/// Return the effective rule set.
///
/// With `suppress_catch_all` every catch-all rule is dropped and the rest
/// pass through in their original order. Without it the input is returned
/// unchanged.
pub fn filter(rules: Vec<Rule>, suppress_catch_all: bool) -> Vec<Rule> {
    if !suppress_catch_all {
        return rules;
    }

    rules
        .into_iter()
        .filter(|rule| {
            if rule.is_catch_all() {
                tracing::debug!(rule = %rule.id(), "Ignoring catch-all rule");
                false
            } else {
                true
            }
        })
        .collect()
}
