//! The dispatch engine: fans a normalized message out to every enabled,
//! healthy destination, applying the source-, integration-, and
//! destination-level middleware chains along the way. Each destination works
//! on its own copy of the message, so a drop, error, or stall in one
//! destination's path never affects delivery to its siblings.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::{RelayError, Result};
use crate::message::{integration_enabled, Message, MessageKind};
use crate::middleware::{Middleware, MiddlewareChain, MiddlewareContext};
use crate::observability::metrics;

pub mod destination;

pub use destination::{Destination, DestinationHealth};

use destination::DestinationEntry;

type InvokeListener = Box<dyn Fn(&Message) + Send + Sync>;

/// Owns the destination table and the three middleware chains. Registration
/// happens through `&mut self` before dispatch begins; dispatch itself only
/// needs `&self`.
#[derive(Default)]
pub struct DispatchEngine {
    destinations: Vec<DestinationEntry>,
    source_chain: MiddlewareChain,
    integration_chain: MiddlewareChain,
    destination_chains: HashMap<String, MiddlewareChain>,
    invoke_listeners: Vec<InvokeListener>,
}

impl DispatchEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a destination. Registration-time problems are programmer
    /// errors and fail fast.
    pub fn register(&mut self, handler: Arc<dyn Destination>) -> Result<()> {
        let name = handler.name().to_string();
        if name.is_empty() {
            return Err(RelayError::InvalidDestination(
                "destination name must not be empty".to_string(),
            ));
        }
        if self
            .destinations
            .iter()
            .any(|entry| entry.name.eq_ignore_ascii_case(&name))
        {
            return Err(RelayError::DuplicateDestination(name));
        }
        self.destinations.push(DestinationEntry {
            name,
            handler,
            health: DestinationHealth::Registered,
        });
        Ok(())
    }

    /// Names of all registered destinations, in registration order.
    pub fn destination_names(&self) -> Vec<String> {
        self.destinations
            .iter()
            .map(|entry| entry.name.clone())
            .collect()
    }

    pub fn destination_health(&self, name: &str) -> Option<DestinationHealth> {
        self.destinations
            .iter()
            .find(|entry| entry.name == name)
            .map(|entry| entry.health)
    }

    pub fn add_source_middleware(&mut self, middleware: Arc<dyn Middleware>) {
        self.source_chain.add(middleware);
    }

    pub fn add_integration_middleware(&mut self, middleware: Arc<dyn Middleware>) {
        self.integration_chain.add(middleware);
    }

    /// Adds a middleware scoped to a single destination, applied after the
    /// integration-level chain for that destination.
    pub fn add_destination_middleware(&mut self, destination: &str, middleware: Arc<dyn Middleware>) {
        self.destination_chains
            .entry(destination.to_string())
            .or_default()
            .add(middleware);
    }

    /// Registers a listener notified once per envelope that passes the
    /// source chain (not once per destination).
    pub fn on_invoke(&mut self, listener: InvokeListener) {
        self.invoke_listeners.push(listener);
    }

    /// Initializes every registered destination. A failure marks that
    /// destination failed for the session and never aborts the others.
    pub async fn initialize_all(&mut self) {
        for entry in &mut self.destinations {
            entry.health = DestinationHealth::Initializing;
            match entry.handler.initialize().await {
                Ok(()) => {
                    entry.health = DestinationHealth::Ready;
                    metrics::destinations::ready(&entry.name);
                    info!(destination = %entry.name, "destination ready");
                }
                Err(err) => {
                    entry.health = DestinationHealth::Failed;
                    metrics::destinations::failed(&entry.name);
                    warn!(destination = %entry.name, error = %err, "destination initialization failed");
                }
            }
        }
    }

    /// Dispatches one message to every enabled destination.
    ///
    /// Destinations are visited sequentially in registration order, each on
    /// a fresh copy of the source-chain output. Failures are logged and
    /// swallowed; they never propagate to the facade caller and never block
    /// the remaining destinations.
    pub async fn dispatch(&self, kind: MessageKind, message: &Message) {
        let source_ctx = MiddlewareContext::source(kind);
        let message = match self.source_chain.apply(message.clone(), &source_ctx).await {
            Ok(Some(message)) => message,
            Ok(None) => {
                metrics::dispatch::dropped(kind.as_str(), "source");
                return;
            }
            Err(err) => {
                warn!(method = %kind, error = %err, "source middleware chain failed");
                return;
            }
        };

        metrics::dispatch::invoked(kind.as_str());
        for listener in &self.invoke_listeners {
            listener(&message);
        }

        for entry in &self.destinations {
            if !integration_enabled(&message.integrations, &entry.name) {
                metrics::dispatch::skipped_disabled(&entry.name);
                continue;
            }
            if entry.health == DestinationHealth::Failed {
                metrics::dispatch::skipped_failed(&entry.name);
                warn!(
                    destination = %entry.name,
                    method = %kind,
                    "skipping destination whose initialization failed"
                );
                continue;
            }

            let ctx = MiddlewareContext::for_integration(kind, &entry.name);
            let routed = match self.integration_chain.apply(message.clone(), &ctx).await {
                Ok(Some(routed)) => routed,
                Ok(None) => {
                    metrics::dispatch::dropped(kind.as_str(), "integration");
                    continue;
                }
                Err(err) => {
                    metrics::dispatch::delivery_error(kind.as_str(), &entry.name);
                    warn!(
                        destination = %entry.name,
                        method = %kind,
                        error = %err,
                        "integration middleware chain failed"
                    );
                    continue;
                }
            };

            let routed = match self.destination_chains.get(&entry.name) {
                Some(chain) => match chain.apply(routed, &ctx).await {
                    Ok(Some(routed)) => routed,
                    Ok(None) => {
                        metrics::dispatch::dropped(kind.as_str(), "destination");
                        continue;
                    }
                    Err(err) => {
                        metrics::dispatch::delivery_error(kind.as_str(), &entry.name);
                        warn!(
                            destination = %entry.name,
                            method = %kind,
                            error = %err,
                            "destination middleware chain failed"
                        );
                        continue;
                    }
                },
                None => routed,
            };

            match entry.handler.invoke(kind, &routed).await {
                Ok(()) => {
                    metrics::dispatch::delivered(kind.as_str(), &entry.name);
                    debug!(destination = %entry.name, method = %kind, "message delivered");
                }
                Err(err) => {
                    metrics::dispatch::delivery_error(kind.as_str(), &entry.name);
                    warn!(
                        destination = %entry.name,
                        method = %kind,
                        error = %err,
                        "destination invocation failed"
                    );
                }
            }
        }
    }
}
