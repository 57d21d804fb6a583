//! The public entry points: identify/track/page/group/alias. Each method
//! takes one canonical call struct, builds a draft message, normalizes it,
//! resolves destination enablement, and hands the result to the dispatch
//! engine. Facade methods never fail: dispatch problems surface only through
//! logs and metrics.

use std::sync::Arc;

use serde_json::{json, Value};

use crate::config::RelayConfig;
use crate::dispatch::{Destination, DispatchEngine};
use crate::error::Result;
use crate::identity::{IdentityStore, MemoryIdentityStore};
use crate::message::{normalize, JsonMap, Message, MessageDraft, MessageKind};
use crate::middleware::Middleware;
use crate::observability::metrics;
use crate::page::{PageContext, StaticPageContext};
use crate::routing::{resolve_enablement, PlanDirective, TrackingPlan};

fn as_map(value: Option<Value>) -> JsonMap {
    match value {
        Some(Value::Object(map)) => map,
        _ => JsonMap::new(),
    }
}

fn as_string(value: Option<Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) => Some(s),
        _ => None,
    }
}

/// Canonical arguments for an identify call.
#[derive(Debug, Clone, Default)]
pub struct IdentifyCall {
    pub user_id: Option<String>,
    pub traits: JsonMap,
    pub options: JsonMap,
}

impl IdentifyCall {
    pub fn user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            ..Default::default()
        }
    }

    pub fn with_traits(mut self, traits: JsonMap) -> Self {
        self.traits = traits;
        self
    }

    pub fn with_options(mut self, options: JsonMap) -> Self {
        self.options = options;
        self
    }

    /// Disambiguates the overloaded wire signature `identify(id?, traits?,
    /// options?)`: a leading object means the id was omitted and the
    /// remaining arguments shift left.
    pub fn resolve(id: Option<Value>, traits: Option<Value>, options: Option<Value>) -> Self {
        let (id, traits, options) = match id {
            Some(Value::Object(map)) => (None, Some(Value::Object(map)), traits),
            other => (other, traits, options),
        };
        Self {
            user_id: as_string(id),
            traits: as_map(traits),
            options: as_map(options),
        }
    }
}

/// Canonical arguments for a track call.
#[derive(Debug, Clone, Default)]
pub struct TrackCall {
    pub event: String,
    pub properties: JsonMap,
    pub options: JsonMap,
}

impl TrackCall {
    pub fn event(event: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            ..Default::default()
        }
    }

    pub fn with_properties(mut self, properties: JsonMap) -> Self {
        self.properties = properties;
        self
    }

    pub fn with_options(mut self, options: JsonMap) -> Self {
        self.options = options;
        self
    }

    /// Disambiguates `track(event, properties?, options?)`; non-object
    /// positions degrade to empty maps.
    pub fn resolve(event: impl Into<String>, properties: Option<Value>, options: Option<Value>) -> Self {
        Self {
            event: event.into(),
            properties: as_map(properties),
            options: as_map(options),
        }
    }
}

/// Canonical arguments for a page call.
#[derive(Debug, Clone, Default)]
pub struct PageCall {
    pub category: Option<String>,
    pub name: Option<String>,
    pub properties: JsonMap,
    pub options: JsonMap,
}

impl PageCall {
    pub fn name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_properties(mut self, properties: JsonMap) -> Self {
        self.properties = properties;
        self
    }

    pub fn with_options(mut self, options: JsonMap) -> Self {
        self.options = options;
        self
    }

    /// Disambiguates `page(category?, name?, properties?, options?)`: an
    /// object in a string position shifts the remaining arguments left, and
    /// a single string is the page name, not the category.
    pub fn resolve(
        category: Option<Value>,
        name: Option<Value>,
        properties: Option<Value>,
        options: Option<Value>,
    ) -> Self {
        let (category, name, properties, options) = match category {
            Some(Value::Object(map)) => (None, None, Some(Value::Object(map)), name),
            other => (other, name, properties, options),
        };
        let (name, properties, options) = match name {
            Some(Value::Object(map)) => (None, Some(Value::Object(map)), properties),
            other => (other, properties, options),
        };
        let mut category = as_string(category);
        let mut name = as_string(name);
        if name.is_none() {
            name = category.take();
        }
        Self {
            category,
            name,
            properties: as_map(properties),
            options: as_map(options),
        }
    }
}

/// Canonical arguments for a group call.
#[derive(Debug, Clone, Default)]
pub struct GroupCall {
    pub group_id: String,
    pub traits: JsonMap,
    pub options: JsonMap,
}

impl GroupCall {
    pub fn group(group_id: impl Into<String>) -> Self {
        Self {
            group_id: group_id.into(),
            ..Default::default()
        }
    }

    pub fn with_traits(mut self, traits: JsonMap) -> Self {
        self.traits = traits;
        self
    }

    pub fn with_options(mut self, options: JsonMap) -> Self {
        self.options = options;
        self
    }

    pub fn resolve(group_id: impl Into<String>, traits: Option<Value>, options: Option<Value>) -> Self {
        Self {
            group_id: group_id.into(),
            traits: as_map(traits),
            options: as_map(options),
        }
    }
}

/// Canonical arguments for an alias call.
#[derive(Debug, Clone, Default)]
pub struct AliasCall {
    pub to: String,
    /// Previous identity; defaults to the stored user id when omitted
    pub from: Option<String>,
    pub options: JsonMap,
}

impl AliasCall {
    pub fn to(to: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            ..Default::default()
        }
    }

    pub fn with_from(mut self, from: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self
    }

    pub fn with_options(mut self, options: JsonMap) -> Self {
        self.options = options;
        self
    }

    /// Disambiguates `alias(to, from?, options?)`: an object in the `from`
    /// position is the options map.
    pub fn resolve(to: impl Into<String>, from: Option<Value>, options: Option<Value>) -> Self {
        let (from, options) = match from {
            Some(Value::Object(map)) => (None, Some(Value::Object(map))),
            other => (other, options),
        };
        Self {
            to: to.into(),
            from: as_string(from),
            options: as_map(options),
        }
    }
}

/// The event-tracking facade. Owns the dispatch engine, the identity and
/// page-context collaborators, and the initialization-time routing settings.
/// All state is instance state: tests can run any number of independent
/// facades side by side.
pub struct Analytics {
    engine: DispatchEngine,
    identity: Box<dyn IdentityStore>,
    page: Box<dyn PageContext>,
    write_key: Option<String>,
    init_integrations: Option<JsonMap>,
    plan: TrackingPlan,
}

impl Analytics {
    pub fn new(config: RelayConfig) -> Self {
        Self {
            engine: DispatchEngine::new(),
            identity: Box::new(MemoryIdentityStore::new()),
            page: Box::new(StaticPageContext::default()),
            write_key: config.write_key,
            init_integrations: config.integrations,
            plan: config.plan,
        }
    }

    pub fn with_identity_store(mut self, store: Box<dyn IdentityStore>) -> Self {
        self.identity = store;
        self
    }

    pub fn with_page_context(mut self, page: Box<dyn PageContext>) -> Self {
        self.page = page;
        self
    }

    pub fn write_key(&self) -> Option<&str> {
        self.write_key.as_deref()
    }

    pub fn identity(&self) -> &dyn IdentityStore {
        self.identity.as_ref()
    }

    /// Registers a destination. Fails fast on empty or duplicate names.
    pub fn register_destination(&mut self, destination: Arc<dyn Destination>) -> Result<()> {
        self.engine.register(destination)
    }

    pub fn add_source_middleware(&mut self, middleware: Arc<dyn Middleware>) {
        self.engine.add_source_middleware(middleware);
    }

    pub fn add_integration_middleware(&mut self, middleware: Arc<dyn Middleware>) {
        self.engine.add_integration_middleware(middleware);
    }

    pub fn add_destination_middleware(&mut self, destination: &str, middleware: Arc<dyn Middleware>) {
        self.engine.add_destination_middleware(destination, middleware);
    }

    /// Registers a listener notified once per dispatched envelope.
    pub fn on_invoke(&mut self, listener: Box<dyn Fn(&Message) + Send + Sync>) {
        self.engine.on_invoke(listener);
    }

    /// Initializes every registered destination. Must run after registration
    /// and before the first facade call; failures mark individual
    /// destinations failed without aborting the rest.
    pub async fn initialize(&mut self) {
        self.engine.initialize_all().await;
    }

    /// Associates the current client with a user and persists the traits.
    pub async fn identify(&self, call: IdentifyCall) {
        metrics::facade::method_called("identify");

        if call.user_id.is_some() {
            self.identity.set_user_id(call.user_id.clone());
        }
        let mut traits = self.identity.traits();
        for (key, value) in call.traits {
            traits.insert(key, value);
        }
        self.identity.set_traits(traits.clone());

        let mut draft = MessageDraft::new(MessageKind::Identify);
        draft.user_id = call.user_id.or_else(|| self.identity.user_id());
        draft.traits = traits;
        draft.options = call.options;
        self.send(draft, PlanDirective::Open).await;
    }

    /// Records an event. The tracking plan is consulted for this event name;
    /// a plan-disabled event still reaches the primary collection pipe.
    pub async fn track(&self, call: TrackCall) {
        metrics::facade::method_called("track");

        let directive = self.plan.directive_for(&call.event);
        let mut draft = MessageDraft::new(MessageKind::Track);
        draft.event = Some(call.event);
        draft.properties = call.properties;
        draft.options = call.options;
        self.send(draft, directive).await;
    }

    /// Records a page view, folding the page defaults into the properties.
    pub async fn page(&self, call: PageCall) {
        metrics::facade::method_called("page");

        let mut properties = call.properties;
        for (key, value) in self.page.page_defaults().to_map() {
            properties.entry(key).or_insert(value);
        }
        if let Some(name) = &call.name {
            properties.insert("name".to_string(), json!(name));
        }
        if let Some(category) = &call.category {
            properties.insert("category".to_string(), json!(category));
        }

        let mut draft = MessageDraft::new(MessageKind::Page);
        draft.name = call.name;
        draft.category = call.category;
        draft.properties = properties;
        draft.options = call.options;
        self.send(draft, PlanDirective::Open).await;
    }

    /// Associates the current user with a group.
    pub async fn group(&self, call: GroupCall) {
        metrics::facade::method_called("group");

        let mut draft = MessageDraft::new(MessageKind::Group);
        draft.group_id = Some(call.group_id);
        draft.traits = call.traits;
        draft.options = call.options;
        self.send(draft, PlanDirective::Open).await;
    }

    /// Merges two user identities. `from` defaults to the stored user id.
    pub async fn alias(&self, call: AliasCall) {
        metrics::facade::method_called("alias");

        let mut draft = MessageDraft::new(MessageKind::Alias);
        draft.previous_id = call.from.or_else(|| self.identity.user_id());
        draft.user_id = Some(call.to);
        draft.options = call.options;
        self.send(draft, PlanDirective::Open).await;
    }

    /// Clears identity state. Registered destinations and middlewares live
    /// for the lifetime of the facade instance.
    pub fn reset(&self) {
        self.identity.reset();
    }

    async fn send(&self, draft: MessageDraft, directive: PlanDirective) {
        let kind = draft.kind;
        let mut message = normalize(
            draft,
            &self.engine.destination_names(),
            self.identity.anonymous_id(),
            &self.page.page_defaults(),
        );
        let call_overrides = std::mem::take(&mut message.integrations);
        message.integrations = resolve_enablement(
            self.init_integrations.as_ref(),
            &directive,
            Some(&call_overrides),
        );
        self.engine.dispatch(kind, &message).await;
    }
}
