use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::DateTime;
use dashwall::compose::{ComposeOptions, Composer, Services};
use dashwall::dom::{el, Scope, VNode};
use dashwall::quotes::{QuotePoint, StaticQuotes};
use dashwall::render::{RenderContext, RenderFuture, RenderRegistry, RenderSettings, Rendered, WidgetRenderer};
use dashwall::store::{MemoryStore, StoreData};
use dashwall::{state, Dashboard, DashboardId, DashboardStore, ManualTimers, TimerHost, Widget, WidgetId};
use pretty_assertions::assert_eq;
use rust_decimal::Decimal;
use serde_json::json;

type Log = Arc<Mutex<Vec<String>>>;

/// Renders `<p id="widget-{id}">{id}</p>` after `options.delayMs`.
struct DelayedRenderer {
    log: Log,
}

impl WidgetRenderer for DelayedRenderer {
    fn render(&self, widget: &Widget, ctx: &RenderContext) -> RenderFuture {
        let delay = widget.options["delayMs"].as_u64().unwrap_or(0);
        let log = self.log.clone();
        let id = widget.id.clone();
        let view: VNode = el("p").id(widget.root_id()).text(widget.id.as_str()).into();
        let instance = ctx.instance(widget);
        log.lock().expect("log").push(format!("render {id}"));
        Box::pin(async move {
            tokio::time::sleep(Duration::from_millis(delay)).await;
            log.lock().expect("log").push(format!("done {id}"));
            Rendered::new(view, instance)
        })
    }

    fn destroy(&self, widget_id: &WidgetId, ctx: &RenderContext) {
        self.log.lock().expect("log").push(format!("destroy {widget_id}"));
        if let Some(timers) = ctx.timers() {
            timers.clear_owner(widget_id.as_str());
        }
    }
}

fn dashboard(id: &str, black: bool) -> Dashboard {
    Dashboard {
        id: DashboardId::new(id),
        name: format!("Board {id}"),
        is_black_theme: black,
        device_id: None,
    }
}

fn positioned(mut widget: Widget, row: u32) -> Widget {
    widget.layout.row_index = row;
    widget
}

struct Fixture {
    composer: Composer,
    timers: Arc<ManualTimers>,
}

fn fixture(widgets: Vec<Widget>, renderers: RenderRegistry, quotes: Arc<StaticQuotes>) -> Fixture {
    let store: Arc<dyn DashboardStore> = Arc::new(MemoryStore::new(StoreData {
        dashboards: vec![dashboard("d1", false)],
        widgets,
    }));
    let (bridge, _writer) = state::channel(store.clone());
    let timers = Arc::new(ManualTimers::new(
        DateTime::parse_from_rfc3339("2024-05-15T09:41:00Z")
            .expect("timestamp")
            .to_utc(),
    ));
    let services = Services {
        clock: timers.clone(),
        quotes,
        settings: RenderSettings::default(),
        timers: timers.clone(),
        scope: Scope::new(),
    };
    Fixture {
        composer: Composer::new(renderers, store, bridge, services),
        timers,
    }
}

fn delayed_registry(log: &Log) -> RenderRegistry {
    let mut renderers = RenderRegistry::new();
    renderers.register("delayed", Arc::new(DelayedRenderer { log: log.clone() }));
    renderers
}

#[tokio::test(start_paused = true)]
async fn output_order_follows_input_when_second_render_finishes_last() {
    let log: Log = Arc::default();
    let widgets = vec![
        positioned(Widget::new("a", "delayed", "d1", json!({"delayMs": 10})), 0),
        positioned(Widget::new("b", "delayed", "d1", json!({"delayMs": 50})), 1),
        positioned(Widget::new("c", "delayed", "d1", json!({"delayMs": 0})), 2),
    ];
    let mut fx = fixture(widgets, delayed_registry(&log), Arc::new(StaticQuotes::new()));

    let view = fx
        .composer
        .compose_view(&DashboardId::new("d1"), ComposeOptions::static_markup())
        .await
        .expect("compose");

    let finished: Vec<String> = log
        .lock()
        .expect("log")
        .iter()
        .filter(|entry| entry.starts_with("done"))
        .cloned()
        .collect();
    assert_eq!(finished, vec!["done c", "done a", "done b"]);
    assert_eq!(
        view.htmls,
        vec![
            "<p id=\"widget-a\">a</p>",
            "<p id=\"widget-b\">b</p>",
            "<p id=\"widget-c\">c</p>"
        ]
    );
}

#[tokio::test]
async fn unknown_type_yields_empty_fragment_in_place() {
    let log: Log = Arc::default();
    let widgets = vec![
        positioned(Widget::new("a", "delayed", "d1", json!({})), 0),
        positioned(Widget::new("b", "weather", "d1", json!({})), 1),
        positioned(Widget::new("c", "delayed", "d1", json!({})), 2),
    ];
    let mut fx = fixture(widgets, delayed_registry(&log), Arc::new(StaticQuotes::new()));
    let view = fx
        .composer
        .compose_view(&DashboardId::new("d1"), ComposeOptions::live())
        .await
        .expect("compose");
    assert_eq!(view.htmls.len(), 3);
    assert_eq!(view.htmls[0], "<p id=\"widget-a\">a</p>");
    assert_eq!(view.htmls[1], "");
    assert_eq!(view.htmls[2], "<p id=\"widget-c\">c</p>");
    assert!(!fx.composer.is_tracked(&WidgetId::new("b")));
}

#[tokio::test]
async fn recomposing_destroys_before_rendering_again() {
    let log: Log = Arc::default();
    let mut fx = fixture(
        vec![Widget::new("a", "delayed", "d1", json!({}))],
        delayed_registry(&log),
        Arc::new(StaticQuotes::new()),
    );
    for _ in 0..2 {
        fx.composer
            .compose_view(&DashboardId::new("d1"), ComposeOptions::live())
            .await
            .expect("compose");
    }
    let entries = log.lock().expect("log").clone();
    assert_eq!(
        entries,
        vec!["render a", "done a", "destroy a", "render a", "done a"]
    );
}

#[tokio::test]
async fn static_dashboard_renders_every_widget_without_timers() {
    let quotes = StaticQuotes::new().shared();
    quotes.insert(
        "USD",
        "EUR",
        (0..3)
            .map(|step| QuotePoint {
                time: DateTime::from_timestamp(1_715_000_000 + step * 3600, 0).expect("timestamp"),
                rate: Decimal::new(9200 + step, 4),
            })
            .collect(),
    );
    let widgets = vec![
        positioned(
            Widget::new("clock-1", "clock", "d1", json!({"timezones": [{"timezone": "0", "label": "UTC"}]})),
            0,
        ),
        positioned(Widget::new("fx-1", "currency", "d1", json!({"items": [{"base": "USD", "quote": "EUR"}]})), 1),
    ];
    let mut fx = fixture(widgets, RenderRegistry::builtin(), quotes);

    let view = fx
        .composer
        .compose_view(&DashboardId::new("d1"), ComposeOptions::static_markup())
        .await
        .expect("compose");

    assert_eq!(view.htmls.len(), 2);
    assert!(view.htmls.iter().all(|html| !html.is_empty()));
    assert!(view.htmls[0].contains("09:41"));
    assert!(view.htmls[1].contains("0.9202"));
    assert!(view.htmls.iter().all(|html| !html.contains("data-dw-on-")));
    assert_eq!(fx.timers.pending(), 0);
    assert_eq!(fx.composer.tracked(), 0);
    assert!(!fx.composer.scope().contains("widget-clock-1"));
}

#[tokio::test]
async fn static_clock_and_habits_render_without_timers() {
    let widgets = vec![
        positioned(Widget::new("clock-1", "clock", "d1", json!({})), 0),
        positioned(
            Widget::new(
                "habits-1",
                "habits",
                "d1",
                json!({"items": [{"id": "water", "maxValue": 8, "currentValue": 2, "minValue": 0}]}),
            ),
            1,
        ),
    ];
    let mut fx = fixture(widgets, RenderRegistry::builtin(), Arc::new(StaticQuotes::new()));

    let view = fx
        .composer
        .compose_view(&DashboardId::new("d1"), ComposeOptions::static_markup())
        .await
        .expect("compose");

    assert_eq!(view.htmls.len(), 2);
    assert!(view.htmls.iter().all(|html| !html.is_empty()));
    assert!(view.htmls[0].contains("09:41"));
    assert!(view.htmls[1].contains("2/8"));
    assert!(view.htmls.iter().all(|html| !html.contains("data-dw-on-")));
    assert_eq!(fx.timers.pending(), 0);
    assert_eq!(fx.composer.tracked(), 0);
}
