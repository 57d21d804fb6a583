pub mod config;
pub mod constants;
pub mod dispatch;
pub mod error;
pub mod facade;
pub mod identity;
pub mod logging;
pub mod message;
pub mod middleware;
pub mod observability;
pub mod page;
pub mod routing;

pub use config::RelayConfig;
pub use dispatch::{Destination, DestinationHealth, DispatchEngine};
pub use error::{RelayError, Result};
pub use facade::{AliasCall, Analytics, GroupCall, IdentifyCall, PageCall, TrackCall};
pub use identity::{IdentityStore, MemoryIdentityStore};
pub use message::{integration_enabled, normalize, JsonMap, Message, MessageDraft, MessageKind};
pub use middleware::{FnMiddleware, Middleware, MiddlewareChain, MiddlewareContext};
pub use page::{PageContext, PageDefaults, StaticPageContext};
pub use routing::{resolve_enablement, PlanDirective, PlanEvent, TrackingPlan};
