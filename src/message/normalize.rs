use std::collections::HashSet;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::constants::MESSAGE_ID_PREFIX;
use crate::page::PageDefaults;

use super::{JsonMap, Message, MessageKind};

/// Option keys preserved at the top level of the envelope; everything else
/// collapses into context.
static TOP_LEVEL_OPTION_KEYS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    ["integrations", "anonymousId", "timestamp", "context"]
        .into_iter()
        .collect()
});

/// A facade call whose overloaded arguments have already been disambiguated,
/// but whose options have not yet been routed into the canonical envelope.
#[derive(Debug, Clone, Serialize)]
pub struct MessageDraft {
    pub kind: MessageKind,
    pub event: Option<String>,
    pub name: Option<String>,
    pub category: Option<String>,
    pub user_id: Option<String>,
    pub previous_id: Option<String>,
    pub group_id: Option<String>,
    pub traits: JsonMap,
    pub properties: JsonMap,
    /// Raw per-call options: may carry `integrations`, `providers`, `context`,
    /// destination-named keys, and arbitrary free-form keys
    pub options: JsonMap,
}

impl MessageDraft {
    pub fn new(kind: MessageKind) -> Self {
        Self {
            kind,
            event: None,
            name: None,
            category: None,
            user_id: None,
            previous_id: None,
            group_id: None,
            traits: JsonMap::new(),
            properties: JsonMap::new(),
            options: JsonMap::new(),
        }
    }
}

/// Converts a draft into the canonical envelope.
///
/// Option keys are routed in three passes: destination-named keys are hoisted
/// into `integrations` (first occurrence wins), the legacy `providers` map is
/// merged under its backward-compatibility rules, and whatever remains is
/// either a recognized top-level field (`anonymousId`, `timestamp`) or
/// collapses into `context`. Page defaults are merged into `context.page`
/// exactly once, with caller-provided values taking precedence.
///
/// Never fails: malformed input degrades to empty maps. Each call mints a
/// fresh `message_id`, so callers must not normalize the same logical event
/// twice.
pub fn normalize(
    draft: MessageDraft,
    known_destinations: &[String],
    anonymous_id: String,
    page: &PageDefaults,
) -> Message {
    // Hash the draft before consuming it; the id also carries a random
    // component so identical drafts still get distinct ids.
    let seed = serde_json::to_string(&draft).unwrap_or_default();
    let message_id = compute_message_id(&seed);

    let MessageDraft {
        kind,
        event,
        name,
        category,
        user_id,
        previous_id,
        group_id,
        traits,
        properties,
        mut options,
    } = draft;

    let mut integrations = take_object(&mut options, "integrations");
    let mut context = take_object(&mut options, "context");
    let providers = take_object(&mut options, "providers");

    let known: HashSet<String> = known_destinations
        .iter()
        .map(|n| n.to_lowercase())
        .collect();
    let is_destination = |key: &str| {
        let lowered = key.to_lowercase();
        lowered == "all" || known.contains(&lowered)
    };

    // Hoist destination-named option keys into integrations; an entry already
    // present in the integrations map is never overwritten.
    let hoisted: Vec<String> = options
        .keys()
        .filter(|key| is_destination(key))
        .cloned()
        .collect();
    for key in hoisted {
        if let Some(value) = options.remove(&key) {
            integrations.entry(key).or_insert(value);
        }
    }

    // Legacy providers merge. The rules differ from the hoisting pass above
    // and are pinned by tests: a provider entry is skipped when the
    // integration is already set to an options object, or when the provider
    // value is boolean and the integration is already present at all.
    for (key, value) in providers {
        if !is_destination(&key) {
            continue;
        }
        match integrations.get(&key) {
            Some(Value::Object(_)) => continue,
            Some(_) if value.is_boolean() => continue,
            _ => {}
        }
        integrations.insert(key, value);
    }

    // Remaining option keys: fixed top-level allow-list, everything else
    // lands in context.
    let mut anonymous_id = anonymous_id;
    let mut timestamp = None;
    for (key, value) in options {
        if !TOP_LEVEL_OPTION_KEYS.contains(key.as_str()) {
            context.insert(key, value);
            continue;
        }
        match key.as_str() {
            "anonymousId" => {
                if let Value::String(id) = value {
                    anonymous_id = id;
                }
            }
            "timestamp" => {
                timestamp = parse_timestamp(&value);
            }
            _ => {}
        }
    }

    // Merge page defaults under context.page, caller values winning.
    let mut page_map = page.to_map();
    if let Some(Value::Object(existing)) = context.remove("page") {
        for (key, value) in existing {
            page_map.insert(key, value);
        }
    }
    context.insert("page".to_string(), Value::Object(page_map));

    Message {
        message_id,
        kind,
        anonymous_id,
        user_id,
        previous_id,
        group_id,
        event,
        name,
        category,
        traits,
        properties,
        integrations,
        context,
        timestamp: timestamp.unwrap_or_else(Utc::now),
    }
}

fn compute_message_id(seed: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(seed.as_bytes());
    hasher.update(Uuid::new_v4().as_bytes());
    format!("{}{}", MESSAGE_ID_PREFIX, hex::encode(hasher.finalize()))
}

fn take_object(options: &mut JsonMap, key: &str) -> JsonMap {
    match options.remove(key) {
        Some(Value::Object(map)) => map,
        _ => JsonMap::new(),
    }
}

fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    let raw = value.as_str()?;
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn known() -> Vec<String> {
        vec!["Amplitude".to_string(), "Mixpanel".to_string()]
    }

    fn draft_with_options(options: JsonMap) -> MessageDraft {
        let mut draft = MessageDraft::new(MessageKind::Track);
        draft.event = Some("Signed Up".to_string());
        draft.options = options;
        draft
    }

    fn object(value: Value) -> JsonMap {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_message_id_unique_for_identical_drafts() {
        let page = PageDefaults::default();
        let a = normalize(
            draft_with_options(JsonMap::new()),
            &known(),
            "anon".to_string(),
            &page,
        );
        let b = normalize(
            draft_with_options(JsonMap::new()),
            &known(),
            "anon".to_string(),
            &page,
        );
        assert!(!a.message_id.is_empty());
        assert!(a.message_id.starts_with("relay-"));
        assert_ne!(a.message_id, b.message_id);
    }

    #[test]
    fn test_destination_keys_hoisted_case_insensitively() {
        let options = object(json!({
            "amplitude": false,
            "All": true,
        }));
        let message = normalize(
            draft_with_options(options),
            &known(),
            "anon".to_string(),
            &PageDefaults::default(),
        );
        assert_eq!(message.integrations.get("amplitude"), Some(&json!(false)));
        assert_eq!(message.integrations.get("All"), Some(&json!(true)));
    }

    #[test]
    fn test_hoisted_key_never_overwrites_existing_integration() {
        let options = object(json!({
            "integrations": { "Amplitude": true },
            "Amplitude": false,
        }));
        let message = normalize(
            draft_with_options(options),
            &known(),
            "anon".to_string(),
            &PageDefaults::default(),
        );
        // First occurrence (the integrations map) wins
        assert_eq!(message.integrations.get("Amplitude"), Some(&json!(true)));
    }

    #[test]
    fn test_provider_cannot_replace_options_object() {
        let options = object(json!({
            "integrations": { "Amplitude": { "batch": true } },
            "providers": { "Amplitude": true },
        }));
        let message = normalize(
            draft_with_options(options),
            &known(),
            "anon".to_string(),
            &PageDefaults::default(),
        );
        assert_eq!(
            message.integrations.get("Amplitude"),
            Some(&json!({ "batch": true }))
        );
    }

    #[test]
    fn test_boolean_provider_skipped_when_integration_present() {
        let options = object(json!({
            "integrations": { "Mixpanel": true },
            "providers": { "Mixpanel": false },
        }));
        let message = normalize(
            draft_with_options(options),
            &known(),
            "anon".to_string(),
            &PageDefaults::default(),
        );
        assert_eq!(message.integrations.get("Mixpanel"), Some(&json!(true)));
    }

    #[test]
    fn test_object_provider_replaces_boolean_integration() {
        let options = object(json!({
            "integrations": { "Mixpanel": true },
            "providers": { "Mixpanel": { "people": true } },
        }));
        let message = normalize(
            draft_with_options(options),
            &known(),
            "anon".to_string(),
            &PageDefaults::default(),
        );
        assert_eq!(
            message.integrations.get("Mixpanel"),
            Some(&json!({ "people": true }))
        );
    }

    #[test]
    fn test_unknown_provider_names_ignored() {
        let options = object(json!({
            "providers": { "NotADestination": true },
        }));
        let message = normalize(
            draft_with_options(options),
            &known(),
            "anon".to_string(),
            &PageDefaults::default(),
        );
        assert!(message.integrations.is_empty());
    }

    #[test]
    fn test_free_form_option_keys_collapse_into_context() {
        let options = object(json!({
            "anonymousId": "override-anon",
            "timestamp": "2026-01-15T10:00:00Z",
            "campaign": { "source": "newsletter" },
        }));
        let message = normalize(
            draft_with_options(options),
            &known(),
            "anon".to_string(),
            &PageDefaults::default(),
        );
        assert_eq!(message.anonymous_id, "override-anon");
        assert_eq!(
            message.timestamp,
            DateTime::parse_from_rfc3339("2026-01-15T10:00:00Z")
                .unwrap()
                .with_timezone(&Utc)
        );
        assert_eq!(
            message.context.get("campaign"),
            Some(&json!({ "source": "newsletter" }))
        );
        // The allow-listed keys never leak into context
        assert!(message.context.get("anonymousId").is_none());
        assert!(message.context.get("timestamp").is_none());
    }

    #[test]
    fn test_page_defaults_merged_with_caller_precedence() {
        let page = PageDefaults {
            path: "/pricing".to_string(),
            url: "https://example.com/pricing".to_string(),
            title: "Pricing".to_string(),
            ..Default::default()
        };
        let options = object(json!({
            "context": { "page": { "title": "Custom Title" } },
        }));
        let message = normalize(
            draft_with_options(options),
            &known(),
            "anon".to_string(),
            &page,
        );
        let page_ctx = message
            .context
            .get("page")
            .and_then(|v| v.as_object())
            .unwrap();
        assert_eq!(page_ctx.get("title"), Some(&json!("Custom Title")));
        assert_eq!(page_ctx.get("path"), Some(&json!("/pricing")));
        assert_eq!(
            page_ctx.get("url"),
            Some(&json!("https://example.com/pricing"))
        );
    }

    #[test]
    fn test_missing_options_degrade_to_empty_maps() {
        let message = normalize(
            draft_with_options(JsonMap::new()),
            &known(),
            "anon".to_string(),
            &PageDefaults::default(),
        );
        assert!(message.integrations.is_empty());
        assert_eq!(message.context.len(), 1); // only the page defaults
        assert_eq!(message.event.as_deref(), Some("Signed Up"));
    }
}
