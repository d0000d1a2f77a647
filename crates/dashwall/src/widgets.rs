//! Built-in widget renderers.

use crate::dom::{el, icon, Element};
use crate::theme::Theme;
use crate::widget::Widget;

mod calendar;
mod clock;
mod currency;
mod habits;

pub use calendar::{leading_cells, month_progress, CalendarRenderer};
pub use clock::{hand_angles, ClockRenderer, HandAngles};
pub use currency::{change_color, CurrencyRenderer};
pub use habits::{progress_color, progress_percent, HabitCounter, HabitsRenderer, HabitsState};

/// Root container shared by every renderer.
pub(crate) fn root(widget: &Widget, theme: &Theme) -> Element {
    let mut root = el("div")
        .id(widget.root_id())
        .attr("data-dw-widget", widget.id.as_str())
        .attr("data-dw-type", widget.widget_type.as_str())
        .class("dw-widget")
        .class(format!("dw-widget-{}", widget.widget_type));
    if theme.is_black {
        root = root.class("dw-black");
    }
    root.style(theme.root_style())
}

pub(crate) fn title(label: &str, icon_name: &str) -> Element {
    el("div")
        .class("dw-widget-title")
        .child(icon(icon_name))
        .child(el("span").text(label))
}

/// Formats a percentage with at most one decimal, dropping a trailing `.0`.
pub(crate) fn format_percent(value: f64) -> String {
    let rounded = (value * 10.0).round() / 10.0;
    if rounded.fract() == 0.0 {
        format!("{rounded:.0}%")
    } else {
        format!("{rounded:.1}%")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{render, VNode};
    use serde_json::json;

    #[test]
    fn root_carries_identity_attributes() {
        let mut widget = Widget::new("w1", "clock", "d1", json!({}));
        widget.theme.is_black_theme = Some(true);
        let theme = Theme::for_widget(&widget);
        let html = render(&VNode::from(root(&widget, &theme)));
        assert!(html.starts_with(
            "<div id=\"widget-w1\" data-dw-widget=\"w1\" data-dw-type=\"clock\" class=\"dw-widget dw-widget-clock dw-black\""
        ));
    }

    #[test]
    fn percent_formatting() {
        assert_eq!(format_percent(25.0), "25%");
        assert_eq!(format_percent(37.5), "37.5%");
        assert_eq!(format_percent(33.333), "33.3%");
    }
}
