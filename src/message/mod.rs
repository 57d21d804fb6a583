use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::WILDCARD_INTEGRATION;

pub mod normalize;

pub use normalize::{normalize, MessageDraft};

/// JSON object shape used for traits, properties, integrations and context.
pub type JsonMap = serde_json::Map<String, Value>;

/// The five canonical call types the facade exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Identify,
    Track,
    Page,
    Group,
    Alias,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Identify => "identify",
            MessageKind::Track => "track",
            MessageKind::Page => "page",
            MessageKind::Group => "group",
            MessageKind::Alias => "alias",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The canonical event envelope produced by normalization.
///
/// Every message that reaches the dispatch engine has a non-empty
/// `message_id`, populated `integrations` and `context` maps, and page
/// defaults already merged into `context.page` exactly once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub message_id: String,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub anonymous_id: String,
    pub user_id: Option<String>,
    pub previous_id: Option<String>,
    pub group_id: Option<String>,
    /// Event name, for track calls
    pub event: Option<String>,
    /// Page name, for page calls
    pub name: Option<String>,
    /// Page category, for page calls
    pub category: Option<String>,
    pub traits: JsonMap,
    pub properties: JsonMap,
    /// Per-destination enablement: name (or "All") to bool or options object
    pub integrations: JsonMap,
    pub context: JsonMap,
    pub timestamp: DateTime<Utc>,
}

/// Checks whether a destination is enabled for a message's integrations map.
/// An exact name entry wins over the wildcard; an absent entry means enabled.
/// A destination-specific options object counts as enabled.
pub fn integration_enabled(integrations: &JsonMap, name: &str) -> bool {
    if let Some(value) = integrations.get(name) {
        return enabled_value(value);
    }
    if let Some(value) = integrations.get(WILDCARD_INTEGRATION) {
        return enabled_value(value);
    }
    true
}

fn enabled_value(value: &Value) -> bool {
    !matches!(value, Value::Bool(false))
}
