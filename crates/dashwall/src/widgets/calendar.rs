use std::sync::Arc;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use futures_util::future;

use super::{format_percent, root, title};
use crate::dom::{el, VNode};
use crate::render::{RenderContext, RenderFuture, Rendered, WidgetRenderer};
use crate::schema::{CalendarOptions, WidgetOptions};
use crate::theme::Theme;
use crate::timezone;
use crate::widget::Widget;

const WEEKDAY_NAMES: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

pub struct CalendarRenderer;

/// Empty cells before the 1st, for a week starting on `first_day_of_week`
/// (both 0 = Sunday).
pub fn leading_cells(first_weekday: u32, first_day_of_week: u32) -> u32 {
    (first_weekday % 7 + 7 - first_day_of_week % 7) % 7
}

/// Share of the month elapsed, in percent with one decimal.
pub fn month_progress(day: u32, days_in_month: u32) -> f64 {
    if days_in_month == 0 {
        return 0.0;
    }
    let percent = f64::from(day) / f64::from(days_in_month) * 100.0;
    (percent * 10.0).round() / 10.0
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|first_next| first_next.pred_opt())
        .map(|last| last.day())
        .unwrap_or(31)
}

fn options_of(widget: &Widget) -> CalendarOptions {
    WidgetOptions::from_widget(widget)
        .ok()
        .and_then(WidgetOptions::into_calendar)
        .unwrap_or_default()
}

fn view(widget: &Widget, options: &CalendarOptions, theme: &Theme, now: DateTime<Utc>) -> VNode {
    let today = now.with_timezone(&timezone::resolve(&options.timezone)).date_naive();
    let first_day = options.first_day();
    let month_days = days_in_month(today.year(), today.month());
    let first_of_month = today.with_day(1).unwrap_or(today);
    let leading = leading_cells(first_of_month.weekday().num_days_from_sunday(), first_day);

    let headers = (0..7).map(|offset| {
        el("div")
            .class("dw-weekday")
            .text(WEEKDAY_NAMES[((first_day + offset) % 7) as usize])
            .into()
    });
    let blanks = (0..leading).map(|_| el("div").class("dw-day dw-day-empty").into());
    let days = (1..=month_days).map(|day| {
        let class = match day.cmp(&today.day()) {
            std::cmp::Ordering::Less => "dw-day-past",
            std::cmp::Ordering::Equal => "dw-day-today",
            std::cmp::Ordering::Greater => "dw-day-future",
        };
        el("div").class("dw-day").class(class).text(day.to_string()).into()
    });

    let mut container = root(widget, theme)
        .child(
            title(&today.format("%B %Y").to_string(), "calendar-days")
                .id(widget.scoped("calendar-title")),
        )
        .child(el("div").class("dw-calendar-weekdays").children(headers))
        .child(
            el("div")
                .id(widget.scoped("calendar-grid"))
                .class("dw-calendar-grid")
                .children(blanks)
                .children(days),
        );

    if options.show_progress {
        let progress = month_progress(today.day(), month_days);
        container = container.child(
            el("div")
                .class("dw-calendar-progress")
                .child(
                    el("div")
                        .class("dw-progress-track")
                        .style(format!("background-color: {}", theme.track()))
                        .child(
                            el("div")
                                .id(widget.scoped("calendar-progress-bar"))
                                .class("dw-progress-bar")
                                .style(format!("width: {progress}%; background-color: {}", theme.primary)),
                        ),
                )
                .child(
                    el("span")
                        .id(widget.scoped("calendar-progress-label"))
                        .class("dw-progress-label")
                        .text(format_percent(progress)),
                ),
        );
    }
    container.into()
}

impl WidgetRenderer for CalendarRenderer {
    fn render(&self, widget: &Widget, ctx: &RenderContext) -> RenderFuture {
        let options = options_of(widget);
        let theme = Theme::for_widget(widget);
        let clock = ctx.clock();
        let markup = view(widget, &options, &theme, clock.now());
        let instance = ctx.instance(widget);

        if let (Some(scope), Some(timers)) = (ctx.scope(), ctx.timers()) {
            let scope = scope.clone();
            let owner = widget.id.to_string();
            let widget = widget.clone();
            timers.set_interval(
                &owner,
                ctx.settings().calendar_refresh,
                Arc::new(move || {
                    let next = view(&widget, &options, &theme, clock.now());
                    if !scope.patch(&widget.root_id(), next) {
                        tracing::trace!(widget = %widget.id, "calendar refresh dropped, widget unmounted");
                    }
                }),
            );
        }
        Box::pin(future::ready(Rendered::new(markup, instance)))
    }
}
