use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WidgetId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DashboardId(pub String);

impl WidgetId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl DashboardId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WidgetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for DashboardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub id: DashboardId,
    pub name: String,
    #[serde(default)]
    pub is_black_theme: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetLayout {
    #[serde(default)]
    pub column_index: u32,
    #[serde(default)]
    pub row_index: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_count: Option<u32>,
}

/// Per-widget overrides of the dashboard theme. Colour fields are raw
/// strings; they are resolved (and defaulted) by [`crate::theme`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetTheme {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_black_theme: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub positive_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub negative_color: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Widget {
    pub id: WidgetId,
    #[serde(rename = "type")]
    pub widget_type: String,
    #[serde(default)]
    pub options: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<Value>,
    pub dashboard_id: DashboardId,
    #[serde(flatten)]
    pub layout: WidgetLayout,
    #[serde(flatten)]
    pub theme: WidgetTheme,
}

impl Widget {
    pub fn new(
        id: impl Into<String>,
        widget_type: impl Into<String>,
        dashboard_id: impl Into<String>,
        options: Value,
    ) -> Self {
        Self {
            id: WidgetId::new(id),
            widget_type: widget_type.into(),
            options,
            state: None,
            dashboard_id: DashboardId::new(dashboard_id),
            layout: WidgetLayout::default(),
            theme: WidgetTheme::default(),
        }
    }

    pub fn with_state(mut self, state: Value) -> Self {
        self.state = Some(state);
        self
    }

    /// Id of the root element every renderer emits for this widget.
    pub fn root_id(&self) -> String {
        root_id(&self.id)
    }

    /// Scopes an element id to this widget instance, e.g.
    /// `main-clock-time` becomes `main-clock-time-{widgetId}`.
    pub fn scoped(&self, name: &str) -> String {
        format!("{name}-{}", self.id)
    }
}

pub fn root_id(id: &WidgetId) -> String {
    format!("widget-{id}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn widget_deserializes_camel_case_with_flattened_layout_and_theme() {
        let widget: Widget = serde_json::from_value(json!({
            "id": "w1",
            "type": "clock",
            "dashboardId": "d1",
            "options": {"timezones": []},
            "columnIndex": 2,
            "rowIndex": 1,
            "columnCount": 3,
            "rowCount": null,
            "primaryColor": "#ff0000"
        }))
        .expect("widget");
        assert_eq!(widget.widget_type, "clock");
        assert_eq!(widget.layout.column_index, 2);
        assert_eq!(widget.layout.column_count, Some(3));
        assert_eq!(widget.layout.row_count, None);
        assert_eq!(widget.theme.primary_color.as_deref(), Some("#ff0000"));
        assert!(widget.state.is_none());
        assert_eq!(widget.root_id(), "widget-w1");
        assert_eq!(widget.scoped("main-clock-time"), "main-clock-time-w1");
    }
}
