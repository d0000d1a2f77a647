use std::sync::Arc;

use chrono::{DateTime, Timelike, Utc};
use futures_util::future;

use super::root;
use crate::dom::{el, Element, Scope, VNode};
use crate::render::{RenderContext, RenderFuture, Rendered, WidgetRenderer};
use crate::schema::{ClockDisplay, ClockOptions, WidgetOptions};
use crate::theme::Theme;
use crate::timers::Clock;
use crate::timezone;
use crate::widget::Widget;

pub struct ClockRenderer;

/// Hand rotations in degrees, clockwise from twelve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HandAngles {
    pub hour: f64,
    pub minute: f64,
    pub second: f64,
}

pub fn hand_angles(hours: u32, minutes: u32, seconds: u32) -> HandAngles {
    HandAngles {
        hour: f64::from(hours % 12) * 30.0 + f64::from(minutes) * 0.5,
        minute: f64::from(minutes) * 6.0,
        second: f64::from(seconds) * 6.0,
    }
}

struct Reading {
    time: String,
    seconds: String,
    angles: HandAngles,
}

fn read(now: DateTime<Utc>, code: &str) -> Reading {
    let local = now.with_timezone(&timezone::resolve(code));
    Reading {
        time: local.format("%H:%M").to_string(),
        seconds: local.format("%S").to_string(),
        angles: hand_angles(local.hour(), local.minute(), local.second()),
    }
}

fn rotate(angle: f64) -> String {
    format!("rotate({angle} 50 50)")
}

fn options_of(widget: &Widget) -> ClockOptions {
    WidgetOptions::from_widget(widget)
        .ok()
        .and_then(WidgetOptions::into_clock)
        .unwrap_or_default()
}

/// Element ids of one clock instance.
#[derive(Clone)]
struct ClockIds {
    time: String,
    seconds: String,
    hour: String,
    minute: String,
    second: String,
    widget: String,
}

impl ClockIds {
    fn new(widget: &Widget) -> Self {
        Self {
            time: widget.scoped("main-clock-time"),
            seconds: widget.scoped("main-clock-seconds"),
            hour: widget.scoped("main-clock-hour-hand"),
            minute: widget.scoped("main-clock-minute-hand"),
            second: widget.scoped("main-clock-second-hand"),
            widget: widget.id.to_string(),
        }
    }

    fn secondary(&self, index: usize) -> String {
        format!("clock-time-{}-{index}", self.widget)
    }
}

fn hand(id: &str, length: u32, width: &str, angle: f64, color: &str) -> Element {
    el("line")
        .id(id)
        .class("dw-clock-hand")
        .attr("x1", "50")
        .attr("y1", "50")
        .attr("x2", "50")
        .attr("y2", (50 - length).to_string())
        .attr("stroke", color)
        .attr("stroke-width", width)
        .attr("stroke-linecap", "round")
        .attr("transform", rotate(angle))
}

fn dial(ids: &ClockIds, reading: &Reading, show_seconds: bool, theme: &Theme) -> Element {
    let ticks = (0..12).map(|index| {
        let radians = f64::from(index * 30).to_radians();
        let (sin, cos) = radians.sin_cos();
        el("line")
            .class("dw-clock-tick")
            .attr("x1", format!("{:.2}", 50.0 + 40.0 * sin))
            .attr("y1", format!("{:.2}", 50.0 - 40.0 * cos))
            .attr("x2", format!("{:.2}", 50.0 + 45.0 * sin))
            .attr("y2", format!("{:.2}", 50.0 - 45.0 * cos))
            .attr("stroke", theme.text.as_str())
            .attr("stroke-width", if index % 3 == 0 { "2" } else { "1" })
            .into()
    });
    let mut svg = el("svg")
        .class("dw-clock-dial")
        .attr("viewBox", "0 0 100 100")
        .child(
            el("circle")
                .attr("cx", "50")
                .attr("cy", "50")
                .attr("r", "48")
                .attr("fill", "none")
                .attr("stroke", theme.text.as_str())
                .attr("stroke-width", "2"),
        )
        .children(ticks)
        .child(hand(&ids.hour, 25, "4", reading.angles.hour, &theme.text))
        .child(hand(&ids.minute, 36, "3", reading.angles.minute, &theme.text));
    if show_seconds {
        svg = svg.child(hand(&ids.second, 40, "1", reading.angles.second, &theme.primary));
    }
    svg.child(
        el("circle")
            .attr("cx", "50")
            .attr("cy", "50")
            .attr("r", "2")
            .attr("fill", theme.primary.as_str()),
    )
}

fn view(widget: &Widget, options: &ClockOptions, theme: &Theme, now: DateTime<Utc>) -> VNode {
    let ids = ClockIds::new(widget);
    let mut zones = options.timezones.iter();
    let mut main = el("div").class("dw-clock-main");
    if let Some(zone) = zones.next() {
        let reading = read(now, &zone.timezone);
        if options.display == ClockDisplay::Analog {
            main = main.child(dial(&ids, &reading, options.show_seconds, theme));
        }
        let mut readout = el("div")
            .class("dw-clock-readout")
            .child(el("span").id(&ids.time).class("dw-clock-time").text(reading.time));
        if options.show_seconds && options.display == ClockDisplay::Digital {
            readout = readout.child(
                el("span")
                    .id(&ids.seconds)
                    .class("dw-clock-seconds")
                    .text(reading.seconds),
            );
        }
        main = main
            .child(readout)
            .child(el("div").class("dw-clock-label").text(zone.label.as_str()));
    }

    let rows: Vec<VNode> = zones
        .enumerate()
        .map(|(offset, zone)| {
            let index = offset + 1;
            el("li")
                .class("dw-clock-zone")
                .child(el("span").class("dw-clock-zone-label").text(zone.label.as_str()))
                .child(
                    el("span")
                        .id(ids.secondary(index))
                        .class("dw-clock-zone-time")
                        .text(read(now, &zone.timezone).time),
                )
                .into()
        })
        .collect();

    let mut container = root(widget, theme).child(main);
    if !rows.is_empty() {
        container = container.child(el("ul").class("dw-clock-zones").children(rows));
    }
    container.into()
}

/// Interval body repainting one clock through the document scope.
struct Ticker {
    ids: ClockIds,
    options: ClockOptions,
    scope: Scope,
    clock: Arc<dyn Clock>,
}

impl Ticker {
    fn repaint(&self) {
        let now = self.clock.now();
        for (index, zone) in self.options.timezones.iter().enumerate() {
            let reading = read(now, &zone.timezone);
            if index > 0 {
                self.scope.set_text(&self.ids.secondary(index), &reading.time);
                continue;
            }
            if !self.scope.set_text(&self.ids.time, &reading.time) {
                // Widget is no longer mounted.
                return;
            }
            match self.options.display {
                ClockDisplay::Digital if self.options.show_seconds => {
                    self.scope.set_text(&self.ids.seconds, &reading.seconds);
                }
                ClockDisplay::Digital => {}
                ClockDisplay::Analog => {
                    self.scope.set_attr(&self.ids.hour, "transform", &rotate(reading.angles.hour));
                    self.scope.set_attr(&self.ids.minute, "transform", &rotate(reading.angles.minute));
                    if self.options.show_seconds {
                        self.scope.set_attr(&self.ids.second, "transform", &rotate(reading.angles.second));
                    }
                }
            }
        }
    }
}

impl WidgetRenderer for ClockRenderer {
    fn render(&self, widget: &Widget, ctx: &RenderContext) -> RenderFuture {
        let options = options_of(widget);
        let theme = Theme::for_widget(widget);
        let clock = ctx.clock();
        let view = view(widget, &options, &theme, clock.now());
        let instance = ctx.instance(widget);

        if let (Some(scope), Some(timers)) = (ctx.scope(), ctx.timers()) {
            let ticker = Ticker {
                ids: ClockIds::new(widget),
                options,
                scope: scope.clone(),
                clock,
            };
            timers.set_interval(
                widget.id.as_str(),
                ctx.settings().clock_tick,
                Arc::new(move || ticker.repaint()),
            );
        }
        Box::pin(future::ready(Rendered::new(view, instance)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::PatchOp;
    use crate::quotes::StaticQuotes;
    use crate::render::RenderSettings;
    use crate::timers::{ManualTimers, TimerHost};
    use crate::widget::WidgetId;
    use serde_json::json;
    use std::time::Duration;

    fn at(rfc3339: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(rfc3339)
            .expect("timestamp")
            .with_timezone(&Utc)
    }

    #[test]
    fn hand_angles_follow_dial_math() {
        assert_eq!(
            hand_angles(22, 30, 15),
            HandAngles {
                hour: 315.0,
                minute: 180.0,
                second: 90.0
            }
        );
        assert_eq!(hand_angles(12, 0, 0).hour, 0.0);
        assert_eq!(hand_angles(3, 59, 59).hour, 119.5);
    }

    #[test]
    fn digital_view_renders_each_zone() {
        let widget = Widget::new(
            "w1",
            "clock",
            "d1",
            json!({"timezones": [
                {"timezone": "0", "label": "UTC"},
                {"timezone": "3.5", "label": "Tehran"},
                {"timezone": "5.75", "label": "Kathmandu"}
            ]}),
        );
        let node = view(
            &widget,
            &options_of(&widget),
            &Theme::for_widget(&widget),
            at("2024-03-01T10:30:15Z"),
        );
        assert_eq!(node.find("main-clock-time-w1").map(|e| e.children.clone()), Some(vec![VNode::Text("10:30".into())]));
        assert_eq!(node.find("clock-time-w1-1").map(|e| e.children.clone()), Some(vec![VNode::Text("14:00".into())]));
        assert_eq!(node.find("clock-time-w1-2").map(|e| e.children.clone()), Some(vec![VNode::Text("16:15".into())]));
        assert!(node.find("main-clock-hour-hand-w1").is_none());
    }

    #[test]
    fn analog_view_rotates_hands() {
        let widget = Widget::new(
            "w1",
            "clock",
            "d1",
            json!({"display": "analog", "showSeconds": true}),
        );
        let node = view(
            &widget,
            &options_of(&widget),
            &Theme::for_widget(&widget),
            at("2024-03-01T22:30:15Z"),
        );
        let transform = |id: &str| node.find(id).and_then(|e| e.get_attr("transform")).map(str::to_string);
        assert_eq!(transform("main-clock-hour-hand-w1").as_deref(), Some("rotate(315 50 50)"));
        assert_eq!(transform("main-clock-minute-hand-w1").as_deref(), Some("rotate(180 50 50)"));
        assert_eq!(transform("main-clock-second-hand-w1").as_deref(), Some("rotate(90 50 50)"));
    }

    #[tokio::test]
    async fn live_tick_repaints_through_scope() {
        let timers = Arc::new(ManualTimers::new(at("2024-03-01T10:30:59Z")));
        let scope = Scope::new();
        let ctx = RenderContext::for_live(
            timers.clone(),
            Arc::new(StaticQuotes::new()),
            RenderSettings::default(),
            scope.clone(),
            timers.clone(),
            Arc::new(|_: &WidgetId, _: serde_json::Value| {}),
        );
        let widget = Widget::new("w1", "clock", "d1", json!({}));
        let rendered = ClockRenderer.render(&widget, &ctx).await;
        scope.mount(&widget.root_id(), rendered.view.clone());
        assert_eq!(timers.pending_for("w1"), 1);

        timers.advance(Duration::from_secs(1));
        assert_eq!(
            scope.take_pending(),
            vec![PatchOp::SetText {
                id: "main-clock-time-w1".to_string(),
                text: "10:31".to_string()
            }]
        );
    }
}
