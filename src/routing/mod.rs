//! Destination enablement: the tracking plan and the three-layer merge of
//! initialization settings, plan directives, and per-call overrides.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;

use crate::constants::{DEFAULT_PLAN_EVENT, PRIMARY_DESTINATION, WILDCARD_INTEGRATION};
use crate::message::JsonMap;

/// Per-event destination rules, keyed by event name. The reserved
/// `__default` entry applies to events with no entry of their own.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TrackingPlan {
    #[serde(default)]
    pub track: HashMap<String, PlanEvent>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlanEvent {
    #[serde(default = "enabled_default")]
    pub enabled: bool,
    #[serde(default)]
    pub integrations: JsonMap,
}

fn enabled_default() -> bool {
    true
}

/// What the tracking plan says about one specific track event.
#[derive(Debug, Clone, PartialEq)]
pub enum PlanDirective {
    /// No plan entry applies; the plan layer contributes nothing.
    Open,
    /// The event is enabled; these per-destination rules apply.
    Allow(JsonMap),
    /// The event is disabled; only the primary collection pipe receives it.
    Suppress,
}

impl TrackingPlan {
    /// Looks up the directive for an event name, falling back to the
    /// `__default` entry when no specific entry exists.
    pub fn directive_for(&self, event: &str) -> PlanDirective {
        if let Some(entry) = self.track.get(event) {
            if entry.enabled {
                return PlanDirective::Allow(entry.integrations.clone());
            }
            return PlanDirective::Suppress;
        }
        if let Some(default) = self.track.get(DEFAULT_PLAN_EVENT) {
            if !default.enabled {
                return PlanDirective::Suppress;
            }
        }
        PlanDirective::Open
    }
}

/// The enablement map forced onto suppressed track events: everything off
/// except the primary collection pipe, so the event is never silently lost.
pub fn suppressed_map() -> JsonMap {
    let mut map = JsonMap::new();
    map.insert(WILDCARD_INTEGRATION.to_string(), Value::Bool(false));
    map.insert(PRIMARY_DESTINATION.to_string(), Value::Bool(true));
    map
}

/// Merges the three enablement layers into one effective map.
///
/// A destination explicitly disabled at initialization stays disabled no
/// matter what the plan or the per-call override says. Within that
/// constraint, per-call overrides take precedence over the plan, and the
/// plan over initialization defaults. A `Suppress` directive short-circuits
/// the merge entirely and yields the forced suppression map.
pub fn resolve_enablement(
    init: Option<&JsonMap>,
    directive: &PlanDirective,
    overrides: Option<&JsonMap>,
) -> JsonMap {
    let plan = match directive {
        PlanDirective::Suppress => return suppressed_map(),
        PlanDirective::Allow(map) => Some(map),
        PlanDirective::Open => None,
    };

    let mut merged = match (init, plan) {
        (None, Some(plan)) => plan.clone(),
        (None, None) => JsonMap::new(),
        (Some(init), plan) => {
            let mut base = init.clone();
            if let Some(plan) = plan {
                let all_disabled = matches!(
                    plan.get(WILDCARD_INTEGRATION),
                    Some(Value::Bool(false))
                );
                if all_disabled {
                    // The plan turning off the wildcard collapses the base
                    // before its remaining entries apply.
                    base = JsonMap::new();
                    base.insert(WILDCARD_INTEGRATION.to_string(), Value::Bool(false));
                }
                for (key, value) in plan {
                    if all_disabled && key == WILDCARD_INTEGRATION {
                        continue;
                    }
                    if disabled_at_init(init, key) {
                        continue;
                    }
                    base.insert(key.clone(), value.clone());
                }
            }
            base
        }
    };

    if let Some(overrides) = overrides {
        for (key, value) in overrides {
            if let Some(init) = init {
                if disabled_at_init(init, key) {
                    continue;
                }
            }
            merged.insert(key.clone(), value.clone());
        }
    }

    merged
}

fn disabled_at_init(init: &JsonMap, key: &str) -> bool {
    matches!(init.get(key), Some(Value::Bool(false)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> JsonMap {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_plan_becomes_effective_map_without_init() {
        let plan = map(json!({ "Amplitude": false }));
        let merged = resolve_enablement(None, &PlanDirective::Allow(plan.clone()), None);
        assert_eq!(merged, plan);
    }

    #[test]
    fn test_init_disable_wins_over_plan() {
        let init = map(json!({ "Amplitude": false }));
        let plan = map(json!({ "Amplitude": true, "Mixpanel": true }));
        let merged = resolve_enablement(Some(&init), &PlanDirective::Allow(plan), None);
        assert_eq!(merged.get("Amplitude"), Some(&json!(false)));
        assert_eq!(merged.get("Mixpanel"), Some(&json!(true)));
    }

    #[test]
    fn test_init_disable_wins_over_per_call_override() {
        let init = map(json!({ "Amplitude": false }));
        let overrides = map(json!({ "Amplitude": true, "Mixpanel": false }));
        let merged = resolve_enablement(Some(&init), &PlanDirective::Open, Some(&overrides));
        assert_eq!(merged.get("Amplitude"), Some(&json!(false)));
        assert_eq!(merged.get("Mixpanel"), Some(&json!(false)));
    }

    #[test]
    fn test_override_wins_over_plan() {
        let init = map(json!({ "Amplitude": true }));
        let plan = map(json!({ "Mixpanel": false }));
        let overrides = map(json!({ "Mixpanel": true }));
        let merged =
            resolve_enablement(Some(&init), &PlanDirective::Allow(plan), Some(&overrides));
        assert_eq!(merged.get("Mixpanel"), Some(&json!(true)));
    }

    #[test]
    fn test_plan_wildcard_disable_collapses_base() {
        let init = map(json!({ "Amplitude": true, "Mixpanel": true }));
        let plan = map(json!({ "All": false, "Mixpanel": true }));
        let merged = resolve_enablement(Some(&init), &PlanDirective::Allow(plan), None);
        // Amplitude's init entry is gone; only the wildcard-disable plus the
        // surviving plan entry remain
        assert_eq!(merged.get("All"), Some(&json!(false)));
        assert_eq!(merged.get("Mixpanel"), Some(&json!(true)));
        assert!(merged.get("Amplitude").is_none());
    }

    #[test]
    fn test_suppress_yields_exact_forced_map() {
        let init = map(json!({ "Amplitude": true }));
        let overrides = map(json!({ "Mixpanel": true }));
        let merged =
            resolve_enablement(Some(&init), &PlanDirective::Suppress, Some(&overrides));
        assert_eq!(merged, map(json!({ "All": false, "Collector": true })));
    }

    #[test]
    fn test_directive_lookup_with_default_entry() {
        let plan: TrackingPlan = serde_json::from_value(json!({
            "track": {
                "__default": { "enabled": false },
                "Order Completed": { "enabled": true, "integrations": { "Amplitude": true } },
            }
        }))
        .unwrap();

        assert_eq!(
            plan.directive_for("Order Completed"),
            PlanDirective::Allow(map(json!({ "Amplitude": true })))
        );
        assert_eq!(plan.directive_for("Unplanned Event"), PlanDirective::Suppress);
    }

    #[test]
    fn test_directive_open_without_plan_entries() {
        let plan = TrackingPlan::default();
        assert_eq!(plan.directive_for("Anything"), PlanDirective::Open);
    }

    #[test]
    fn test_disabled_specific_entry_suppresses() {
        let plan: TrackingPlan = serde_json::from_value(json!({
            "track": { "Noisy Event": { "enabled": false } }
        }))
        .unwrap();
        assert_eq!(plan.directive_for("Noisy Event"), PlanDirective::Suppress);
    }
}
