use std::sync::Arc;

use futures_util::future::join_all;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use super::{root, title};
use crate::dom::{el, Element, Scope, VNode};
use crate::quotes::{QuotePoint, QuoteSource};
use crate::render::{Liveness, RenderContext, RenderFuture, Rendered, WidgetRenderer};
use crate::schema::{CurrencyOptions, CurrencyPair, WidgetOptions};
use crate::theme::Theme;
use crate::widget::Widget;

pub const PLACEHOLDER: &str = "--";
const PREVIEW_POINTS: usize = 10;
const CHART_WIDTH: f64 = 100.0;
const CHART_HEIGHT: f64 = 40.0;

pub struct CurrencyRenderer;

/// Positive colour for a non-negative change, negative colour otherwise.
pub fn change_color(change: Decimal, theme: &Theme) -> &str {
    if change >= Decimal::ZERO {
        &theme.positive
    } else {
        &theme.negative
    }
}

fn options_of(widget: &Widget) -> CurrencyOptions {
    WidgetOptions::from_widget(widget)
        .ok()
        .and_then(WidgetOptions::into_currency)
        .unwrap_or_default()
}

fn format_change(change: Decimal) -> String {
    let change = change.round_dp(4);
    if change >= Decimal::ZERO {
        format!("+{change}")
    } else {
        change.to_string()
    }
}

/// Scales points into the chart viewBox as an SVG `points` list.
fn polyline_points(points: &[QuotePoint]) -> String {
    let rates: Vec<f64> = points
        .iter()
        .filter_map(|point| point.rate.to_f64())
        .collect();
    let (min, max) = rates
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), rate| (lo.min(*rate), hi.max(*rate)));
    let step = if rates.len() > 1 {
        CHART_WIDTH / (rates.len() - 1) as f64
    } else {
        0.0
    };
    rates
        .iter()
        .enumerate()
        .map(|(index, rate)| {
            let y = if max > min {
                CHART_HEIGHT - (rate - min) / (max - min) * CHART_HEIGHT
            } else {
                CHART_HEIGHT / 2.0
            };
            format!("{:.2},{:.2}", index as f64 * step, y)
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn chart(id: String, class: &str, points: &[QuotePoint], color: &str) -> Element {
    let svg = el("svg")
        .id(id)
        .class(class)
        .attr("viewBox", format!("0 0 {CHART_WIDTH} {CHART_HEIGHT}"))
        .attr("preserveAspectRatio", "none");
    if points.is_empty() {
        return svg.class("dw-chart-empty");
    }
    svg.child(
        el("polyline")
            .attr("points", polyline_points(points))
            .attr("fill", "none")
            .attr("stroke", color)
            .attr("stroke-width", "1.5"),
    )
}

fn pair_view(widget: &Widget, theme: &Theme, pair: &CurrencyPair, history: &[QuotePoint]) -> VNode {
    let key = format!("{}{}", pair.base, pair.quote).to_ascii_lowercase();
    let scoped = |name: &str| format!("currency-{name}-{key}-{}", widget.id);

    let (rate, change, color) = match (history.first(), history.last()) {
        (Some(first), Some(last)) => {
            let change = last.rate - first.rate;
            let color = change_color(change, theme).to_string();
            (last.rate.round_dp(4).to_string(), format_change(change), color)
        }
        _ => (PLACEHOLDER.to_string(), PLACEHOLDER.to_string(), theme.text.clone()),
    };
    let preview = &history[history.len().saturating_sub(PREVIEW_POINTS)..];

    el("div")
        .id(scoped("pair"))
        .class("dw-currency-pair")
        .child(
            el("div")
                .class("dw-currency-header")
                .child(el("span").class("dw-currency-symbol").text(pair.symbol()))
                .child(el("span").id(scoped("rate")).class("dw-currency-rate").text(rate))
                .child(
                    el("span")
                        .id(scoped("change"))
                        .class("dw-currency-change")
                        .style(format!("color: {color}"))
                        .text(change),
                ),
        )
        .child(chart(scoped("chart"), "dw-chart", history, &color))
        .child(chart(scoped("preview"), "dw-chart-preview", preview, &color))
        .into()
}

/// Fetches every configured pair concurrently. A failed pair renders as a
/// placeholder without affecting the others.
async fn build_view(widget: Widget, options: CurrencyOptions, theme: Theme, quotes: Arc<dyn QuoteSource>) -> VNode {
    let fetches = options
        .items
        .iter()
        .map(|pair| quotes.history(&pair.base, &pair.quote, options.period));
    let results = join_all(fetches).await;

    let pairs = options.items.iter().zip(results).map(|(pair, result)| {
        let history = result.unwrap_or_else(|err| {
            tracing::warn!(
                widget = %widget.id,
                pair = %pair.symbol(),
                error = %err,
                "quote fetch failed, rendering placeholder"
            );
            Vec::new()
        });
        pair_view(&widget, &theme, pair, &history)
    });

    root(&widget, &theme)
        .child(title("Currency", "chart-line"))
        .child(
            el("div")
                .class("dw-currency-period")
                .text(options.period.label()),
        )
        .child(el("div").class("dw-currency-list").children(pairs))
        .into()
}

/// Periodic re-fetch of a mounted currency widget.
#[derive(Clone)]
struct Refresher {
    widget: Widget,
    options: CurrencyOptions,
    theme: Theme,
    quotes: Arc<dyn QuoteSource>,
    scope: Scope,
    liveness: Liveness,
}

impl Refresher {
    fn is_current(&self, root_id: &str) -> bool {
        self.liveness.is_alive() && self.scope.contains(root_id)
    }

    /// Returns `false` when the instance was disposed or unmounted before or
    /// during the fetch, in which case nothing is written.
    async fn run(self) -> bool {
        let root_id = self.widget.root_id();
        if !self.is_current(&root_id) {
            return false;
        }
        let view = build_view(self.widget.clone(), self.options.clone(), self.theme.clone(), self.quotes.clone()).await;
        if !self.is_current(&root_id) {
            tracing::debug!(widget = %self.widget.id, "stale currency refresh dropped");
            return false;
        }
        self.scope.patch(&root_id, view)
    }
}

impl WidgetRenderer for CurrencyRenderer {
    fn render(&self, widget: &Widget, ctx: &RenderContext) -> RenderFuture {
        let options = options_of(widget);
        let theme = Theme::for_widget(widget);
        let quotes = ctx.quotes();
        let instance = ctx.instance(widget);

        if let (Some(scope), Some(timers)) = (ctx.scope(), ctx.timers()) {
            let refresher = Refresher {
                widget: widget.clone(),
                options: options.clone(),
                theme: theme.clone(),
                quotes: quotes.clone(),
                scope: scope.clone(),
                liveness: instance.liveness(),
            };
            timers.set_interval(
                widget.id.as_str(),
                ctx.settings().currency_refresh,
                Arc::new(move || match tokio::runtime::Handle::try_current() {
                    Ok(handle) => {
                        handle.spawn(refresher.clone().run());
                    }
                    Err(_) => {
                        tracing::warn!(widget = %refresher.widget.id, "no runtime for currency refresh");
                    }
                }),
            );
        }

        let widget = widget.clone();
        Box::pin(async move {
            let view = build_view(widget, options, theme, quotes).await;
            Rendered::new(view, instance)
        })
    }
}
