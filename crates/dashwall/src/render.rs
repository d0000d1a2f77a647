//! Renderer interface and the type-keyed render registry.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures_util::future::BoxFuture;
use serde_json::Value;

use crate::dom::{self, Scope, VNode};
use crate::quotes::QuoteSource;
use crate::schema::WidgetOptions;
use crate::timers::{Clock, TimerHost};
use crate::widget::{Widget, WidgetId};
use crate::widgets::{CalendarRenderer, ClockRenderer, CurrencyRenderer, HabitsRenderer};

pub type RenderFuture = BoxFuture<'static, Rendered>;

/// Persists a widget's new state document.
pub type SaveStateFn = Arc<dyn Fn(&WidgetId, Value) + Send + Sync>;

pub type Handler = Arc<dyn Fn(&EventPayload) + Send + Sync>;

pub trait WidgetRenderer: Send + Sync {
    /// Called before every render; must be idempotent.
    fn init(&self, _widget: &Widget, _options: &WidgetOptions) {}

    /// Produces exactly one fragment. Never fails: lookup misses and fetch
    /// errors degrade to placeholders inside the fragment.
    fn render(&self, widget: &Widget, ctx: &RenderContext) -> RenderFuture;

    /// Stops everything the widget scheduled. Safe when nothing was rendered.
    fn destroy(&self, widget_id: &WidgetId, ctx: &RenderContext) {
        if let Some(timers) = ctx.timers() {
            timers.clear_owner(widget_id.as_str());
        }
    }
}

/// Event delivered from a device to a handler.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventPayload {
    pub event: String,
    pub value: Option<String>,
}

impl EventPayload {
    pub fn click() -> Self {
        Self {
            event: "click".to_string(),
            value: None,
        }
    }
}

/// Handlers of one rendered fragment, keyed by the handler keys its
/// elements bind.
#[derive(Clone, Default)]
pub struct HandlerTable {
    handlers: HashMap<String, Handler>,
}

impl HandlerTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, handler: impl Fn(&EventPayload) + Send + Sync + 'static) {
        self.handlers.insert(key.into(), Arc::new(handler));
    }

    pub fn get(&self, key: &str) -> Option<Handler> {
        self.handlers.get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.handlers.contains_key(key)
    }

    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for HandlerTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.keys()).finish()
    }
}

/// Handler tables of every mounted widget, replacing a global namespace.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    tables: Arc<Mutex<HashMap<WidgetId, HandlerTable>>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<WidgetId, HandlerTable>> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn register(&self, widget_id: WidgetId, table: HandlerTable) {
        self.lock().insert(widget_id, table);
    }

    pub fn unregister(&self, widget_id: &WidgetId) -> bool {
        self.lock().remove(widget_id).is_some()
    }

    pub fn contains(&self, widget_id: &WidgetId) -> bool {
        self.lock().contains_key(widget_id)
    }

    /// Runs the handler bound to `key`. Returns `false` when the widget or
    /// key is unknown.
    pub fn dispatch(&self, widget_id: &WidgetId, key: &str, payload: &EventPayload) -> bool {
        let handler = self.lock().get(widget_id).and_then(|table| table.get(key));
        match handler {
            Some(handler) => {
                handler(payload);
                true
            }
            None => false,
        }
    }
}

/// Shared flag that stays set until the owning instance is disposed.
///
/// Work that outlives a render (fetches, spawned refreshes) checks it before
/// writing, since a re-render mounts a new fragment under the same root id.
#[derive(Debug, Clone)]
pub struct Liveness(Arc<AtomicBool>);

impl Liveness {
    fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    pub fn is_alive(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    fn revoke(&self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Handle to one live renderer instance. Disposing it clears the widget's
/// timers and unregisters its handlers; dropping it disposes too.
pub struct WidgetInstance {
    widget_id: WidgetId,
    timers: Option<Arc<dyn TimerHost>>,
    handlers: Option<HandlerRegistry>,
    alive: Liveness,
    disposed: bool,
}

impl WidgetInstance {
    /// Instance of a static render; owns nothing.
    pub fn inert(widget_id: WidgetId) -> Self {
        Self {
            widget_id,
            timers: None,
            handlers: None,
            alive: Liveness::new(),
            disposed: false,
        }
    }

    pub fn live(widget_id: WidgetId, timers: Arc<dyn TimerHost>) -> Self {
        Self {
            widget_id,
            timers: Some(timers),
            handlers: None,
            alive: Liveness::new(),
            disposed: false,
        }
    }

    pub fn widget_id(&self) -> &WidgetId {
        &self.widget_id
    }

    /// Ties the handler table registered for this widget to the instance.
    pub fn attach_handlers(&mut self, registry: HandlerRegistry) {
        self.handlers = Some(registry);
    }

    pub fn liveness(&self) -> Liveness {
        self.alive.clone()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.alive.revoke();
        if let Some(timers) = self.timers.take() {
            let cleared = timers.clear_owner(self.widget_id.as_str());
            tracing::trace!(widget = %self.widget_id, cleared, "widget instance disposed");
        }
        if let Some(handlers) = self.handlers.take() {
            handlers.unregister(&self.widget_id);
        }
    }
}

impl Drop for WidgetInstance {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for WidgetInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WidgetInstance")
            .field("widget_id", &self.widget_id)
            .field("live", &self.timers.is_some())
            .field("disposed", &self.disposed)
            .finish()
    }
}

#[derive(Debug)]
pub struct Rendered {
    pub view: VNode,
    pub handlers: HandlerTable,
    pub instance: WidgetInstance,
}

impl Rendered {
    pub fn new(view: VNode, instance: WidgetInstance) -> Self {
        Self {
            view,
            handlers: HandlerTable::new(),
            instance,
        }
    }

    pub fn with_handlers(mut self, handlers: HandlerTable) -> Self {
        self.handlers = handlers;
        self
    }

    pub fn html(&self) -> String {
        dom::render(&self.view)
    }
}

/// Periods and delays used by live renderers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderSettings {
    pub frame: Duration,
    pub clock_tick: Duration,
    pub calendar_refresh: Duration,
    pub currency_refresh: Duration,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            frame: Duration::from_millis(16),
            clock_tick: Duration::from_secs(1),
            calendar_refresh: Duration::from_secs(24 * 60 * 60),
            currency_refresh: Duration::from_secs(300),
        }
    }
}

/// Live-only collaborators.
#[derive(Clone)]
struct LiveServices {
    scope: Scope,
    timers: Arc<dyn TimerHost>,
    save_state: SaveStateFn,
}

/// Everything a renderer may use during one render.
#[derive(Clone)]
pub struct RenderContext {
    clock: Arc<dyn Clock>,
    quotes: Arc<dyn QuoteSource>,
    settings: RenderSettings,
    live: Option<LiveServices>,
}

impl RenderContext {
    /// Markup only: no timers, handlers or persistence.
    pub fn for_static(clock: Arc<dyn Clock>, quotes: Arc<dyn QuoteSource>, settings: RenderSettings) -> Self {
        Self {
            clock,
            quotes,
            settings,
            live: None,
        }
    }

    pub fn for_live(
        clock: Arc<dyn Clock>,
        quotes: Arc<dyn QuoteSource>,
        settings: RenderSettings,
        scope: Scope,
        timers: Arc<dyn TimerHost>,
        save_state: SaveStateFn,
    ) -> Self {
        Self {
            clock,
            quotes,
            settings,
            live: Some(LiveServices {
                scope,
                timers,
                save_state,
            }),
        }
    }

    pub fn is_static(&self) -> bool {
        self.live.is_none()
    }

    /// Forwards to the persistence bridge; a no-op in static mode.
    pub fn save_state(&self, new_state: Value, widget: &Widget) {
        if let Some(live) = &self.live {
            (live.save_state)(&widget.id, new_state);
        }
    }

    pub fn save_state_fn(&self) -> Option<SaveStateFn> {
        self.live.as_ref().map(|live| live.save_state.clone())
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        self.clock.clone()
    }

    pub fn quotes(&self) -> Arc<dyn QuoteSource> {
        self.quotes.clone()
    }

    pub fn settings(&self) -> RenderSettings {
        self.settings
    }

    pub fn scope(&self) -> Option<&Scope> {
        self.live.as_ref().map(|live| &live.scope)
    }

    pub fn timers(&self) -> Option<&Arc<dyn TimerHost>> {
        self.live.as_ref().map(|live| &live.timers)
    }

    /// Instance handle matching the render mode.
    pub fn instance(&self, widget: &Widget) -> WidgetInstance {
        match &self.live {
            Some(live) => WidgetInstance::live(widget.id.clone(), live.timers.clone()),
            None => WidgetInstance::inert(widget.id.clone()),
        }
    }
}

#[derive(Clone, Default)]
pub struct RenderRegistry {
    renderers: BTreeMap<String, Arc<dyn WidgetRenderer>>,
}

impl RenderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register("clock", Arc::new(ClockRenderer));
        registry.register("calendar", Arc::new(CalendarRenderer));
        registry.register("habits", Arc::new(HabitsRenderer));
        registry.register("currency", Arc::new(CurrencyRenderer));
        registry
    }

    pub fn register(
        &mut self,
        widget_type: impl Into<String>,
        renderer: Arc<dyn WidgetRenderer>,
    ) -> Option<Arc<dyn WidgetRenderer>> {
        self.renderers.insert(widget_type.into(), renderer)
    }

    pub fn get(&self, widget_type: &str) -> Option<Arc<dyn WidgetRenderer>> {
        self.renderers.get(widget_type).cloned()
    }

    pub fn types(&self) -> Vec<&str> {
        self.renderers.keys().map(String::as_str).collect()
    }
}
