//! Ordered mutate-or-drop pipelines applied to message copies before they
//! reach destinations. Three chains exist at runtime: one source-level chain
//! applied once per dispatched event, one integration-level chain applied per
//! destination, and optional destination-level chains keyed by destination
//! name.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::message::{Message, MessageKind};

/// Context handed to every middleware stage.
#[derive(Debug, Clone)]
pub struct MiddlewareContext {
    pub kind: MessageKind,
    /// The destination this chain run is scoped to, when integration- or
    /// destination-level
    pub integration: Option<String>,
}

impl MiddlewareContext {
    pub fn source(kind: MessageKind) -> Self {
        Self {
            kind,
            integration: None,
        }
    }

    pub fn for_integration(kind: MessageKind, name: &str) -> Self {
        Self {
            kind,
            integration: Some(name.to_string()),
        }
    }
}

/// A single pipeline stage. Returning `Ok(Some(message))` passes a (possibly
/// modified) message to the next stage; `Ok(None)` drops the message for this
/// chain's consumer only.
#[async_trait]
pub trait Middleware: Send + Sync {
    async fn apply(
        &self,
        message: Message,
        ctx: &MiddlewareContext,
    ) -> anyhow::Result<Option<Message>>;
}

/// Adapter for plain closures, mainly used by embedders and tests.
pub struct FnMiddleware<F> {
    func: F,
}

impl<F> FnMiddleware<F>
where
    F: Fn(Message, &MiddlewareContext) -> Option<Message> + Send + Sync,
{
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

#[async_trait]
impl<F> Middleware for FnMiddleware<F>
where
    F: Fn(Message, &MiddlewareContext) -> Option<Message> + Send + Sync,
{
    async fn apply(
        &self,
        message: Message,
        ctx: &MiddlewareContext,
    ) -> anyhow::Result<Option<Message>> {
        Ok((self.func)(message, ctx))
    }
}

/// An append-only sequence of middlewares applied strictly in registration
/// order. Stages run serialized: stage N+1 does not begin until stage N
/// completes.
#[derive(Default)]
pub struct MiddlewareChain {
    stages: Vec<Arc<dyn Middleware>>,
}

impl MiddlewareChain {
    pub fn new() -> Self {
        Self { stages: Vec::new() }
    }

    pub fn add(&mut self, middleware: Arc<dyn Middleware>) {
        self.stages.push(middleware);
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Runs the message through every stage. A drop halts the chain and is
    /// reported as `Ok(None)`; it is a suppression signal, not an error.
    pub async fn apply(
        &self,
        mut message: Message,
        ctx: &MiddlewareContext,
    ) -> anyhow::Result<Option<Message>> {
        for (index, stage) in self.stages.iter().enumerate() {
            match stage.apply(message, ctx).await? {
                Some(next) => message = next,
                None => {
                    debug!(
                        method = %ctx.kind,
                        integration = ctx.integration.as_deref().unwrap_or("source"),
                        stage = index,
                        "message dropped by middleware"
                    );
                    return Ok(None);
                }
            }
        }
        Ok(Some(message))
    }
}
