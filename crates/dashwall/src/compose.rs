//! Dashboard composition: fetch, render concurrently, mount.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures_util::future::{self, join_all, BoxFuture};
use tokio::runtime::Handle;

use crate::dom::{PatchOp, Scope, VNode};
use crate::error::ComposeError;
use crate::quotes::QuoteSource;
use crate::render::{EventPayload, HandlerRegistry, HandlerTable, RenderContext, RenderRegistry, RenderSettings, Rendered, WidgetInstance};
use crate::schema::WidgetOptions;
use crate::state::StateBridge;
use crate::store::DashboardStore;
use crate::timers::{Clock, SystemClock, TimerHost, TokioTimers};
use crate::widget::{Dashboard, DashboardId, Widget, WidgetId};

/// Timer owner of the post-mount icon pass.
pub const ICON_OWNER: &str = "dashwall:icons";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ComposeOptions {
    pub is_static: bool,
}

impl ComposeOptions {
    pub fn live() -> Self {
        Self { is_static: false }
    }

    pub fn static_markup() -> Self {
        Self { is_static: true }
    }
}

/// Result of one composition. `htmls[i]` belongs to `widgets[i]`; unknown
/// widget types yield an empty string in their slot.
#[derive(Debug, Clone, PartialEq)]
pub struct ComposedView {
    pub dashboard: Dashboard,
    pub widgets: Vec<Widget>,
    pub htmls: Vec<String>,
}

/// Runtime collaborators shared by every render of a composer.
#[derive(Clone)]
pub struct Services {
    pub clock: Arc<dyn Clock>,
    pub quotes: Arc<dyn QuoteSource>,
    pub settings: RenderSettings,
    pub timers: Arc<dyn TimerHost>,
    pub scope: Scope,
}

impl Services {
    /// Wall clock, tokio timers and an empty document.
    pub fn system(handle: Handle, quotes: Arc<dyn QuoteSource>, settings: RenderSettings) -> Self {
        Self {
            clock: Arc::new(SystemClock),
            quotes,
            settings,
            timers: Arc::new(TokioTimers::new(handle)),
            scope: Scope::new(),
        }
    }
}

/// Owns the live state of one device view: its document mirror, its handler
/// tables and the instances of the widgets currently mounted.
pub struct Composer {
    renderers: RenderRegistry,
    store: Arc<dyn DashboardStore>,
    bridge: StateBridge,
    services: Services,
    handlers: HandlerRegistry,
    instances: HashMap<WidgetId, WidgetInstance>,
}

impl Composer {
    pub fn new(
        renderers: RenderRegistry,
        store: Arc<dyn DashboardStore>,
        bridge: StateBridge,
        services: Services,
    ) -> Self {
        Self {
            renderers,
            store,
            bridge,
            services,
            handlers: HandlerRegistry::new(),
            instances: HashMap::new(),
        }
    }

    pub fn scope(&self) -> &Scope {
        &self.services.scope
    }

    pub fn timers(&self) -> &Arc<dyn TimerHost> {
        &self.services.timers
    }

    pub fn handlers(&self) -> &HandlerRegistry {
        &self.handlers
    }

    pub fn is_tracked(&self, widget_id: &WidgetId) -> bool {
        self.instances.contains_key(widget_id)
    }

    pub fn tracked(&self) -> usize {
        self.instances.len()
    }

    fn context(&self, options: ComposeOptions) -> RenderContext {
        let services = &self.services;
        if options.is_static {
            return RenderContext::for_static(services.clock.clone(), services.quotes.clone(), services.settings);
        }
        RenderContext::for_live(
            services.clock.clone(),
            services.quotes.clone(),
            services.settings,
            services.scope.clone(),
            services.timers.clone(),
            self.bridge.as_save_fn(),
        )
    }

    /// Disposes the tracked instance of `widget_id` and lets its renderer
    /// release anything else it scheduled. Harmless for unknown ids.
    pub fn destroy(&mut self, widget_id: &WidgetId, widget_type: &str) {
        if let Some(mut instance) = self.instances.remove(widget_id) {
            instance.dispose();
        }
        if let Some(renderer) = self.renderers.get(widget_type) {
            renderer.destroy(widget_id, &self.context(ComposeOptions::live()));
        }
    }

    fn start(&self, widget: &Widget, ctx: &RenderContext) -> BoxFuture<'static, Option<Rendered>> {
        let Some(renderer) = self.renderers.get(&widget.widget_type) else {
            tracing::debug!(widget = %widget.id, widget_type = %widget.widget_type, "no renderer registered");
            return Box::pin(future::ready(None));
        };
        match WidgetOptions::from_widget(widget) {
            Ok(options) => renderer.init(widget, &options),
            Err(err) => tracing::debug!(widget = %widget.id, error = %err, "skipping init"),
        }
        let render = renderer.render(widget, ctx);
        Box::pin(async move { Some(render.await) })
    }

    pub async fn compose_view(
        &mut self,
        dashboard_id: &DashboardId,
        options: ComposeOptions,
    ) -> Result<ComposedView, ComposeError> {
        let (dashboard, widgets) =
            future::try_join(self.store.dashboard(dashboard_id), self.store.widgets(dashboard_id)).await?;
        let widgets: Vec<Widget> = widgets
            .into_iter()
            .map(|mut widget| {
                if widget.theme.is_black_theme.is_none() {
                    widget.theme.is_black_theme = Some(dashboard.is_black_theme);
                }
                widget
            })
            .collect();

        for widget in &widgets {
            if self.instances.contains_key(&widget.id) {
                self.destroy(&widget.id, &widget.widget_type);
            }
        }

        let ctx = self.context(options);
        let renders: Vec<_> = widgets.iter().map(|widget| self.start(widget, &ctx)).collect();
        let results = join_all(renders).await;

        let mut htmls = Vec::with_capacity(results.len());
        for (widget, rendered) in widgets.iter().zip(results) {
            let Some(rendered) = rendered else {
                htmls.push(String::new());
                continue;
            };
            htmls.push(rendered.html());
            if !options.is_static {
                self.mount(widget, rendered);
            }
        }

        if !options.is_static {
            self.drop_missing(&widgets);
            self.schedule_icon_refresh();
        }
        tracing::debug!(
            dashboard = %dashboard.id,
            widgets = widgets.len(),
            live = !options.is_static,
            "dashboard composed"
        );
        Ok(ComposedView {
            dashboard,
            widgets,
            htmls,
        })
    }

    fn mount(&mut self, widget: &Widget, rendered: Rendered) {
        let Rendered {
            view,
            handlers,
            mut instance,
        } = rendered;
        let unbound = unbound_keys(&view, &handlers);
        if !unbound.is_empty() {
            tracing::warn!(widget = %widget.id, keys = ?unbound, "fragment binds handlers it never registered");
        }
        self.services.scope.mount(&widget.root_id(), view);
        if !handlers.is_empty() {
            self.handlers.register(widget.id.clone(), handlers);
            instance.attach_handlers(self.handlers.clone());
        }
        self.instances.insert(widget.id.clone(), instance);
    }

    /// Unmounts widgets left over from an earlier composition that are no
    /// longer on the dashboard.
    fn drop_missing(&mut self, widgets: &[Widget]) {
        let current: HashSet<&WidgetId> = widgets.iter().map(|widget| &widget.id).collect();
        let stale: Vec<WidgetId> = self
            .instances
            .keys()
            .filter(|id| !current.contains(id))
            .cloned()
            .collect();
        for id in stale {
            if let Some(mut instance) = self.instances.remove(&id) {
                instance.dispose();
            }
            self.services.scope.unmount(&crate::widget::root_id(&id));
        }
    }

    fn schedule_icon_refresh(&self) {
        let services = &self.services;
        services.timers.clear_owner(ICON_OWNER);
        let scope = services.scope.clone();
        services.timers.set_timeout(
            ICON_OWNER,
            services.settings.frame * 2,
            Arc::new(move || scope.push(PatchOp::RefreshIcons)),
        );
    }

    /// Routes a device event to the handler registered under `handler_key`.
    pub fn dispatch(&self, widget_id: &WidgetId, handler_key: &str, payload: &EventPayload) -> bool {
        let handled = self.handlers.dispatch(widget_id, handler_key, payload);
        if !handled {
            tracing::debug!(widget = %widget_id, handler = handler_key, "event without handler ignored");
        }
        handled
    }

    /// Disposes every tracked instance and unmounts its fragment.
    pub fn teardown(&mut self) {
        let count = self.instances.len();
        for (id, mut instance) in self.instances.drain() {
            instance.dispose();
            self.services.scope.unmount(&crate::widget::root_id(&id));
        }
        self.services.timers.clear_owner(ICON_OWNER);
        tracing::debug!(instances = count, "composer torn down");
    }
}

impl Drop for Composer {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Handler keys bound in `view` that `handlers` cannot serve.
fn unbound_keys(view: &VNode, handlers: &HandlerTable) -> Vec<String> {
    view.handler_keys()
        .into_iter()
        .filter(|key| !handlers.contains(key))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::el;
    use crate::quotes::StaticQuotes;
    use crate::state;
    use crate::store::{MemoryStore, StoreData};
    use crate::timers::ManualTimers;
    use chrono::DateTime;
    use serde_json::json;
    use std::time::Duration;

    fn fixture(widgets: Vec<Widget>) -> (Composer, Arc<ManualTimers>, state::StateWriter) {
        let store = MemoryStore::new(StoreData {
            dashboards: vec![Dashboard {
                id: DashboardId::new("d1"),
                name: "Desk".to_string(),
                is_black_theme: true,
                device_id: None,
            }],
            widgets,
        });
        let store: Arc<dyn DashboardStore> = Arc::new(store);
        let (bridge, writer) = state::channel(store.clone());
        let timers = Arc::new(ManualTimers::new(
            DateTime::from_timestamp(1_714_000_000, 0).expect("timestamp"),
        ));
        let services = Services {
            clock: timers.clone(),
            quotes: Arc::new(StaticQuotes::new()),
            settings: RenderSettings::default(),
            timers: timers.clone(),
            scope: Scope::new(),
        };
        (Composer::new(RenderRegistry::builtin(), store, bridge, services), timers, writer)
    }

    #[tokio::test]
    async fn widgets_inherit_dashboard_theme() {
        let mut light = Widget::new("w2", "clock", "d1", json!({}));
        light.layout.row_index = 1;
        light.theme.is_black_theme = Some(false);
        let (mut composer, _, _) = fixture(vec![Widget::new("w1", "clock", "d1", json!({})), light]);
        let view = composer
            .compose_view(&DashboardId::new("d1"), ComposeOptions::static_markup())
            .await
            .expect("compose");
        assert_eq!(view.widgets[0].theme.is_black_theme, Some(true));
        assert_eq!(view.widgets[1].theme.is_black_theme, Some(false));
        assert!(view.htmls[0].contains("dw-black"));
        assert!(!view.htmls[1].contains("dw-black"));
    }

    #[tokio::test]
    async fn missing_dashboard_is_a_store_error() {
        let (mut composer, _, _) = fixture(Vec::new());
        let result = composer
            .compose_view(&DashboardId::new("nope"), ComposeOptions::static_markup())
            .await;
        assert!(matches!(result, Err(ComposeError::Store(_))));
    }

    #[tokio::test]
    async fn live_compose_mounts_and_refreshes_icons_after_two_frames() {
        let (mut composer, timers, _) = fixture(vec![Widget::new("w1", "clock", "d1", json!({}))]);
        composer
            .compose_view(&DashboardId::new("d1"), ComposeOptions::live())
            .await
            .expect("compose");
        assert!(composer.scope().contains("widget-w1"));
        assert!(composer.is_tracked(&WidgetId::new("w1")));

        timers.advance(Duration::from_millis(31));
        assert!(!composer.scope().take_pending().contains(&PatchOp::RefreshIcons));
        timers.advance(Duration::from_millis(1));
        assert!(composer.scope().take_pending().contains(&PatchOp::RefreshIcons));
    }

    #[tokio::test]
    async fn teardown_clears_every_timer() {
        let (mut composer, timers, _) = fixture(vec![
            Widget::new("w1", "clock", "d1", json!({})),
            Widget::new("w2", "calendar", "d1", json!({})),
        ]);
        composer
            .compose_view(&DashboardId::new("d1"), ComposeOptions::live())
            .await
            .expect("compose");
        assert_eq!(timers.pending(), 3);
        composer.teardown();
        assert_eq!(timers.pending(), 0);
        assert_eq!(composer.tracked(), 0);
        assert!(!composer.scope().contains("widget-w1"));
    }

    #[test]
    fn bindings_without_handlers_are_reported() {
        let view: VNode = el("div")
            .child(el("button").on("click", "increment:water"))
            .child(el("button").on("click", "decrement:water"))
            .into();
        let mut handlers = HandlerTable::new();
        handlers.insert("increment:water", |_| {});
        assert_eq!(unbound_keys(&view, &handlers), vec!["decrement:water".to_string()]);
        handlers.insert("decrement:water", |_| {});
        assert!(unbound_keys(&view, &handlers).is_empty());
    }

    #[tokio::test]
    async fn builtin_fragments_bind_only_registered_handlers() {
        let widgets = vec![Widget::new(
            "h1",
            "habits",
            "d1",
            json!({"items": [{"id": "water"}, {"id": "tea"}]}),
        )];
        let (composer, _timers, _writer) = fixture(widgets.clone());
        let ctx = composer.context(ComposeOptions::live());
        let rendered = RenderRegistry::builtin()
            .get("habits")
            .expect("habits renderer")
            .render(&widgets[0], &ctx)
            .await;
        assert!(!rendered.view.handler_keys().is_empty());
        assert!(unbound_keys(&rendered.view, &rendered.handlers).is_empty());
    }
}
