use std::sync::Arc;
use std::time::Duration;

use chrono::DateTime;
use dashwall::compose::{ComposeOptions, Composer, Services};
use dashwall::dom::{PatchOp, Scope};
use dashwall::quotes::StaticQuotes;
use dashwall::render::{EventPayload, RenderContext, RenderRegistry, RenderSettings, WidgetRenderer};
use dashwall::state::{self, StateWriter};
use dashwall::store::{MemoryStore, StoreData};
use dashwall::widgets::ClockRenderer;
use dashwall::{Dashboard, DashboardId, ManualTimers, TimerHost, Widget, WidgetId};
use pretty_assertions::assert_eq;
use serde_json::json;

struct Fixture {
    composer: Composer,
    timers: Arc<ManualTimers>,
    store: MemoryStore,
    writer: StateWriter,
}

fn fixture(widgets: Vec<Widget>) -> Fixture {
    let store = MemoryStore::new(StoreData {
        dashboards: vec![Dashboard {
            id: DashboardId::new("d1"),
            name: "Kitchen".to_string(),
            is_black_theme: false,
            device_id: Some("tablet-1".to_string()),
        }],
        widgets,
    });
    let (bridge, writer) = state::channel(Arc::new(store.clone()));
    let timers = Arc::new(ManualTimers::new(
        DateTime::parse_from_rfc3339("2024-05-15T07:59:58Z")
            .expect("timestamp")
            .to_utc(),
    ));
    let services = Services {
        clock: timers.clone(),
        quotes: Arc::new(StaticQuotes::new()),
        settings: RenderSettings::default(),
        timers: timers.clone(),
        scope: Scope::new(),
    };
    Fixture {
        composer: Composer::new(RenderRegistry::builtin(), Arc::new(store.clone()), bridge, services),
        timers,
        store,
        writer,
    }
}

#[test]
fn destroying_unknown_widget_is_harmless_and_repeatable() {
    let timers = Arc::new(ManualTimers::new(DateTime::from_timestamp(0, 0).expect("epoch")));
    let ctx = RenderContext::for_live(
        timers.clone(),
        Arc::new(StaticQuotes::new()),
        RenderSettings::default(),
        Scope::new(),
        timers.clone(),
        Arc::new(|_: &WidgetId, _: serde_json::Value| {}),
    );
    let ghost = WidgetId::new("never-rendered");
    ClockRenderer.destroy(&ghost, &ctx);
    ClockRenderer.destroy(&ghost, &ctx);
    assert_eq!(timers.pending(), 0);
}

#[tokio::test]
async fn composer_destroy_is_idempotent() {
    let mut fx = fixture(vec![Widget::new("c1", "clock", "d1", json!({}))]);
    fx.composer
        .compose_view(&DashboardId::new("d1"), ComposeOptions::live())
        .await
        .expect("compose");
    assert_eq!(fx.timers.pending_for("c1"), 1);

    fx.composer.destroy(&WidgetId::new("c1"), "clock");
    fx.composer.destroy(&WidgetId::new("c1"), "clock");
    fx.composer.destroy(&WidgetId::new("ghost"), "weather");
    assert_eq!(fx.timers.pending_for("c1"), 0);
    assert!(!fx.composer.is_tracked(&WidgetId::new("c1")));
}

#[tokio::test]
async fn no_writes_reach_the_document_after_destroy() {
    let mut fx = fixture(vec![Widget::new("c1", "clock", "d1", json!({"showSeconds": true}))]);
    fx.composer
        .compose_view(&DashboardId::new("d1"), ComposeOptions::live())
        .await
        .expect("compose");

    fx.timers.advance(Duration::from_secs(3));
    let scope = fx.composer.scope().clone();
    let before = scope.writes();
    assert!(before > 0);
    assert!(scope.take_pending().contains(&PatchOp::SetText {
        id: "main-clock-time-c1".to_string(),
        text: "08:00".to_string()
    }));

    fx.composer.destroy(&WidgetId::new("c1"), "clock");
    fx.timers.advance(Duration::from_secs(60));
    assert_eq!(scope.writes(), before);
    assert!(!scope.take_pending().iter().any(|op| matches!(op, PatchOp::SetText { .. })));
}

#[tokio::test]
async fn habit_click_is_persisted_through_the_bridge() {
    let mut fx = fixture(vec![Widget::new(
        "h1",
        "habits",
        "d1",
        json!({"items": [{"id": "water", "name": "Water", "maxValue": 8, "currentValue": 2}]}),
    )]);
    let view = fx
        .composer
        .compose_view(&DashboardId::new("d1"), ComposeOptions::live())
        .await
        .expect("compose");
    assert!(view.htmls[0].contains("data-dw-on-click=\"increment:water\""));

    let handled = fx
        .composer
        .dispatch(&WidgetId::new("h1"), "increment:water", &EventPayload::click());
    assert!(handled);
    assert!(!fx
        .composer
        .dispatch(&WidgetId::new("h1"), "increment:coffee", &EventPayload::click()));
    assert!(!fx
        .composer
        .dispatch(&WidgetId::new("nobody"), "increment:water", &EventPayload::click()));

    assert_eq!(fx.writer.flush().await, 1);
    let stored = fx.store.snapshot().await.widgets[0].state.clone().expect("state");
    assert_eq!(stored["items"]["water"]["currentValue"], json!(3));
    assert_eq!(stored["items"]["water"]["history"][0]["time"], json!("07:59"));

    assert!(fx.composer.scope().take_pending().contains(&PatchOp::SetText {
        id: "habit-value-water-h1".to_string(),
        text: "3/8".to_string()
    }));

    fx.composer.teardown();
    assert!(!fx
        .composer
        .dispatch(&WidgetId::new("h1"), "increment:water", &EventPayload::click()));
}
