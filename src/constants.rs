/// Wildcard integration key applying to every destination not explicitly listed.
pub const WILDCARD_INTEGRATION: &str = "All";

/// The always-on primary collection destination. It must receive every event,
/// even when the tracking plan suppresses all other destinations.
pub const PRIMARY_DESTINATION: &str = "Collector";

/// Tracking-plan entry consulted when an event has no plan entry of its own.
pub const DEFAULT_PLAN_EVENT: &str = "__default";

/// Prefix stamped onto every generated message id.
pub const MESSAGE_ID_PREFIX: &str = "relay-";
