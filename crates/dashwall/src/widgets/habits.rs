use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use futures_util::future;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{format_percent, root, title};
use crate::dom::{el, icon, Element, VNode};
use crate::render::{HandlerTable, RenderContext, RenderFuture, Rendered, WidgetRenderer};
use crate::schema::{HabitItem, HabitsOptions, WidgetOptions};
use crate::theme::{self, Theme};
use crate::timers::Clock;
use crate::widget::Widget;

pub const LOW_COLOR: &str = "#EF4444";
pub const MID_COLOR: &str = "#3B82F6";
pub const HIGH_COLOR: &str = "#10B981";

pub struct HabitsRenderer;

/// Share of the `[min, max]` range reached, in percent.
pub fn progress_percent(current: i64, min: i64, max: i64) -> f64 {
    if max <= min {
        return 0.0;
    }
    let span = i128::from(max) - i128::from(min);
    (i128::from(current) - i128::from(min)) as f64 / span as f64 * 100.0
}

pub fn progress_color(percent: f64) -> &'static str {
    if percent <= 33.0 {
        LOW_COLOR
    } else if percent <= 66.0 {
        MID_COLOR
    } else {
        HIGH_COLOR
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Epoch milliseconds of the increment.
    pub id: i64,
    pub time: String,
}

/// Runtime counter of one habit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HabitCounter {
    pub current_value: i64,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}

impl HabitCounter {
    pub fn seeded(item: &HabitItem) -> Self {
        Self {
            current_value: item.clamp(item.current_value),
            history: Vec::new(),
        }
    }

    /// No-op at `max_value`; otherwise bumps the value and records when.
    pub fn increment(&mut self, item: &HabitItem, now: DateTime<Utc>) -> bool {
        if self.current_value >= item.max_value {
            return false;
        }
        self.current_value += 1;
        self.history.push(HistoryEntry {
            id: now.timestamp_millis(),
            time: now.format("%H:%M").to_string(),
        });
        true
    }

    /// No-op at `min_value`; otherwise drops the latest history entry.
    pub fn decrement(&mut self, item: &HabitItem) -> bool {
        if self.current_value <= item.min_value {
            return false;
        }
        self.current_value -= 1;
        self.history.pop();
        true
    }
}

/// Widget state document: `{"items": {"<habitId>": {currentValue, history}}}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HabitsState {
    #[serde(default)]
    pub items: BTreeMap<String, HabitCounter>,
}

impl HabitsState {
    /// Loads the widget's state, seeding habits that have none yet and
    /// clamping every counter into its item's bounds.
    pub fn load(widget: &Widget, options: &HabitsOptions) -> Self {
        let mut state = match &widget.state {
            None | Some(Value::Null) => Self::default(),
            Some(value) => serde_json::from_value(value.clone()).unwrap_or_else(|err| {
                tracing::warn!(widget = %widget.id, error = %err, "habit state is malformed, starting fresh");
                Self::default()
            }),
        };
        for item in &options.items {
            let counter = state
                .items
                .entry(item.id.clone())
                .or_insert_with(|| HabitCounter::seeded(item));
            counter.current_value = item.clamp(counter.current_value);
        }
        state
    }

    pub fn counter(&self, item: &HabitItem) -> HabitCounter {
        self.items
            .get(&item.id)
            .cloned()
            .unwrap_or_else(|| HabitCounter::seeded(item))
    }

    pub fn increment(&mut self, item: &HabitItem, now: DateTime<Utc>) -> bool {
        self.items
            .entry(item.id.clone())
            .or_insert_with(|| HabitCounter::seeded(item))
            .increment(item, now)
    }

    pub fn decrement(&mut self, item: &HabitItem) -> bool {
        self.items
            .entry(item.id.clone())
            .or_insert_with(|| HabitCounter::seeded(item))
            .decrement(item)
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

fn options_of(widget: &Widget) -> HabitsOptions {
    WidgetOptions::from_widget(widget)
        .ok()
        .and_then(WidgetOptions::into_habits)
        .unwrap_or_default()
}

/// Everything one habits view is drawn from.
struct Model {
    widget: Widget,
    options: HabitsOptions,
    theme: Theme,
    state: HabitsState,
    open: Option<String>,
    interactive: bool,
}

impl Model {
    fn item(&self, id: &str) -> Option<HabitItem> {
        self.options.items.iter().find(|item| item.id == id).cloned()
    }

    fn bind(&self, element: Element, handler: String) -> Element {
        if self.interactive {
            element.on("click", handler)
        } else {
            element
        }
    }

    fn habit_row(&self, item: &HabitItem) -> VNode {
        let widget = &self.widget;
        let counter = self.state.counter(item);
        let percent = progress_percent(counter.current_value, item.min_value, item.max_value);
        let accent = theme::resolve_color(item.color.as_deref(), &self.theme.primary);
        let scoped = |name: &str| format!("habit-{name}-{}-{}", item.id, widget.id);

        let open = self.bind(
            el("button")
                .class("dw-habit-open")
                .child(el("span").class("dw-habit-icon").style(format!("color: {accent}")).child(icon(&item.icon)))
                .child(el("span").class("dw-habit-name").text(item.name.as_str())),
            format!("open:{}", item.id),
        );
        let decrement = self.bind(
            el("button").id(scoped("dec")).class("dw-btn").text("-"),
            format!("decrement:{}", item.id),
        );
        let increment = self.bind(
            el("button").id(scoped("inc")).class("dw-btn").text("+"),
            format!("increment:{}", item.id),
        );

        el("div")
            .id(scoped("row"))
            .class("dw-habit")
            .child(open)
            .child(
                el("div")
                    .class("dw-habit-controls")
                    .child(decrement)
                    .child(
                        el("span")
                            .id(scoped("value"))
                            .class("dw-habit-value")
                            .text(format!("{}/{}", counter.current_value, item.max_value)),
                    )
                    .child(increment),
            )
            .child(
                el("div")
                    .class("dw-progress-track")
                    .style(format!("background-color: {}", self.theme.track()))
                    .child(
                        el("div")
                            .id(scoped("bar"))
                            .class("dw-progress-bar")
                            .attr("title", format_percent(percent))
                            .style(format!("width: {percent}%; background-color: {}", progress_color(percent))),
                    ),
            )
            .into()
    }

    fn modal(&self) -> Element {
        let widget = &self.widget;
        let open_item = self
            .open
            .as_deref()
            .and_then(|id| self.options.items.iter().find(|item| item.id == id));
        let mut modal = el("div").id(widget.scoped("habit-modal")).class("dw-modal");
        let Some(item) = open_item else {
            return modal
                .attr("hidden", "hidden")
                .child(el("div").id(widget.scoped("habit-modal-body")).class("dw-modal-body"));
        };

        let counter = self.state.counter(item);
        let entries: Vec<VNode> = if counter.history.is_empty() {
            vec![el("li").class("dw-history-empty").text("No entries yet").into()]
        } else {
            counter
                .history
                .iter()
                .rev()
                .map(|entry| el("li").class("dw-history-entry").text(entry.time.as_str()).into())
                .collect()
        };
        let close = self.bind(el("button").class("dw-modal-close").child(icon("x")), "close".to_string());
        modal = modal.child(
            el("div")
                .id(widget.scoped("habit-modal-body"))
                .class("dw-modal-body")
                .child(
                    el("div")
                        .class("dw-modal-header")
                        .child(el("span").text(item.name.as_str()))
                        .child(close),
                )
                .child(el("ul").class("dw-history").children(entries)),
        );
        modal
    }

    fn view(&self) -> VNode {
        let rows = self.options.items.iter().map(|item| self.habit_row(item));
        root(&self.widget, &self.theme)
            .child(title("Habits", "list-checks"))
            .child(el("div").class("dw-habits-list").children(rows))
            .child(self.modal())
            .into()
    }
}

enum Action {
    Increment(String),
    Decrement(String),
    Open(String),
    Close,
}

/// Shared by the handlers of one live habits instance.
#[derive(Clone)]
struct Session {
    model: Arc<Mutex<Model>>,
    ctx: RenderContext,
    clock: Arc<dyn Clock>,
}

impl Session {
    fn apply(&self, action: Action) {
        let mut guard = self.model.lock().unwrap_or_else(PoisonError::into_inner);
        let model = &mut *guard;
        let changed = match action {
            Action::Increment(id) => match model.item(&id) {
                Some(item) => model.state.increment(&item, self.clock.now()),
                None => false,
            },
            Action::Decrement(id) => match model.item(&id) {
                Some(item) => model.state.decrement(&item),
                None => false,
            },
            Action::Open(id) => {
                model.open = Some(id);
                false
            }
            Action::Close => {
                model.open = None;
                false
            }
        };
        if changed {
            self.ctx.save_state(model.state.to_value(), &model.widget);
        }
        if let Some(scope) = self.ctx.scope() {
            if !scope.patch(&model.widget.root_id(), model.view()) {
                tracing::debug!(widget = %model.widget.id, "habit update dropped, widget unmounted");
            }
        }
    }

    fn handlers(&self, items: &[HabitItem]) -> HandlerTable {
        let mut table = HandlerTable::new();
        for item in items {
            let session = self.clone();
            let id = item.id.clone();
            table.insert(format!("increment:{}", item.id), move |_| session.apply(Action::Increment(id.clone())));
            let session = self.clone();
            let id = item.id.clone();
            table.insert(format!("decrement:{}", item.id), move |_| session.apply(Action::Decrement(id.clone())));
            let session = self.clone();
            let id = item.id.clone();
            table.insert(format!("open:{}", item.id), move |_| session.apply(Action::Open(id.clone())));
        }
        let session = self.clone();
        table.insert("close", move |_| session.apply(Action::Close));
        table
    }
}

impl WidgetRenderer for HabitsRenderer {
    fn render(&self, widget: &Widget, ctx: &RenderContext) -> RenderFuture {
        let options = options_of(widget);
        let model = Model {
            widget: widget.clone(),
            state: HabitsState::load(widget, &options),
            options,
            theme: Theme::for_widget(widget),
            open: None,
            interactive: !ctx.is_static(),
        };
        let view = model.view();
        let instance = ctx.instance(widget);
        if ctx.is_static() {
            return Box::pin(future::ready(Rendered::new(view, instance)));
        }

        let items = model.options.items.clone();
        let session = Session {
            model: Arc::new(Mutex::new(model)),
            ctx: ctx.clone(),
            clock: ctx.clock(),
        };
        let handlers = session.handlers(&items);
        Box::pin(future::ready(Rendered::new(view, instance).with_handlers(handlers)))
    }
}
