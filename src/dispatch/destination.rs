use std::sync::Arc;

use async_trait::async_trait;

use crate::message::{Message, MessageKind};

/// A pluggable consumer of messages. The engine treats every destination
/// uniformly through this capability set; how a destination renders or
/// transmits an event is its own concern.
#[async_trait]
pub trait Destination: Send + Sync {
    /// Unique registration name, matched against the integrations map.
    fn name(&self) -> &str;

    /// One-time startup. An error here marks the destination failed for the
    /// lifetime of the session.
    async fn initialize(&self) -> anyhow::Result<()> {
        Ok(())
    }

    /// Deliver one message for one facade method.
    async fn invoke(&self, kind: MessageKind, message: &Message) -> anyhow::Result<()>;
}

/// Initialization health, set once during startup. There is no transition
/// out of `Failed`: a failed destination is skipped for the whole session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestinationHealth {
    Registered,
    Initializing,
    Ready,
    Failed,
}

pub(crate) struct DestinationEntry {
    pub name: String,
    pub handler: Arc<dyn Destination>,
    pub health: DestinationHealth,
}
