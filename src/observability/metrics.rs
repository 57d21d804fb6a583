//! Metrics for the relay pipeline, following Prometheus naming conventions.
//!
//! Counters are fire-and-forget: they are incremented around dispatch and
//! initialization and never consulted for control flow.

use std::fmt;

/// Enum representing all metric names used in the system
/// This eliminates magic strings and provides compile-time safety
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    // Facade metrics
    FacadeCalls,

    // Dispatch metrics
    DispatchInvocations,
    DispatchDeliveries,
    DispatchErrors,
    DispatchSkippedDisabled,
    DispatchSkippedFailed,
    DispatchDrops,

    // Destination lifecycle metrics
    DestinationsReady,
    DestinationsFailed,
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::FacadeCalls => "relay_facade_calls_total",

            MetricName::DispatchInvocations => "relay_dispatch_invocations_total",
            MetricName::DispatchDeliveries => "relay_dispatch_deliveries_total",
            MetricName::DispatchErrors => "relay_dispatch_errors_total",
            MetricName::DispatchSkippedDisabled => "relay_dispatch_skipped_disabled_total",
            MetricName::DispatchSkippedFailed => "relay_dispatch_skipped_failed_total",
            MetricName::DispatchDrops => "relay_dispatch_drops_total",

            MetricName::DestinationsReady => "relay_destinations_ready_total",
            MetricName::DestinationsFailed => "relay_destinations_failed_total",
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Facade Metrics
// ============================================================================

pub mod facade {
    use super::MetricName;

    /// Record a facade method call
    pub fn method_called(method: &str) {
        ::metrics::counter!(MetricName::FacadeCalls.as_str(), "method" => method.to_string())
            .increment(1);
    }
}

// ============================================================================
// Dispatch Metrics
// ============================================================================

pub mod dispatch {
    use super::MetricName;

    /// Record a dispatched envelope that passed the source chain
    pub fn invoked(method: &str) {
        ::metrics::counter!(MetricName::DispatchInvocations.as_str(), "method" => method.to_string())
            .increment(1);
    }

    /// Record a successful delivery to a destination
    pub fn delivered(method: &str, destination: &str) {
        ::metrics::counter!(
            MetricName::DispatchDeliveries.as_str(),
            "method" => method.to_string(),
            "destination" => destination.to_string()
        )
        .increment(1);
    }

    /// Record a destination handler or chain failure
    pub fn delivery_error(method: &str, destination: &str) {
        ::metrics::counter!(
            MetricName::DispatchErrors.as_str(),
            "method" => method.to_string(),
            "destination" => destination.to_string()
        )
        .increment(1);
    }

    /// Record a destination skipped because it is not enabled for the message
    pub fn skipped_disabled(destination: &str) {
        ::metrics::counter!(
            MetricName::DispatchSkippedDisabled.as_str(),
            "destination" => destination.to_string()
        )
        .increment(1);
    }

    /// Record a destination skipped because its initialization failed
    pub fn skipped_failed(destination: &str) {
        ::metrics::counter!(
            MetricName::DispatchSkippedFailed.as_str(),
            "destination" => destination.to_string()
        )
        .increment(1);
    }

    /// Record a middleware drop
    pub fn dropped(method: &str, scope: &str) {
        ::metrics::counter!(
            MetricName::DispatchDrops.as_str(),
            "method" => method.to_string(),
            "scope" => scope.to_string()
        )
        .increment(1);
    }
}

// ============================================================================
// Destination Lifecycle Metrics
// ============================================================================

pub mod destinations {
    use super::MetricName;

    pub fn ready(destination: &str) {
        ::metrics::counter!(
            MetricName::DestinationsReady.as_str(),
            "destination" => destination.to_string()
        )
        .increment(1);
    }

    pub fn failed(destination: &str) {
        ::metrics::counter!(
            MetricName::DestinationsFailed.as_str(),
            "destination" => destination.to_string()
        )
        .increment(1);
    }
}
