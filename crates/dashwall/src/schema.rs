//! Typed options per widget type.
//!
//! Every type has an options struct with serde defaults and a `validate`
//! step. [`WidgetOptions::from_widget`] is the only way renderers read
//! options: malformed documents degrade to the type's defaults instead of
//! failing the render.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::error::SchemaError;
use crate::widget::Widget;

mod calendar;
mod clock;
mod currency;
mod habits;

pub use calendar::CalendarOptions;
pub use clock::{ClockDisplay, ClockOptions, ClockZone};
pub use currency::{CurrencyOptions, CurrencyPair, Period};
pub use habits::{HabitItem, HabitsOptions};

#[derive(Debug, Clone, PartialEq)]
pub enum WidgetOptions {
    Clock(ClockOptions),
    Calendar(CalendarOptions),
    Habits(HabitsOptions),
    Currency(CurrencyOptions),
}

/// Schema entry for one widget type.
#[derive(Clone, Copy)]
pub struct SchemaEntry {
    pub widget_type: &'static str,
    pub defaults: fn() -> WidgetOptions,
    pub parse: fn(&Value) -> Result<WidgetOptions, SchemaError>,
}

pub fn registry() -> BTreeMap<&'static str, SchemaEntry> {
    let entries = [
        SchemaEntry {
            widget_type: "clock",
            defaults: || WidgetOptions::Clock(ClockOptions::default()),
            parse: |value| parse_as::<ClockOptions>("clock", value).map(WidgetOptions::Clock),
        },
        SchemaEntry {
            widget_type: "calendar",
            defaults: || WidgetOptions::Calendar(CalendarOptions::default()),
            parse: |value| parse_as::<CalendarOptions>("calendar", value).map(WidgetOptions::Calendar),
        },
        SchemaEntry {
            widget_type: "habits",
            defaults: || WidgetOptions::Habits(HabitsOptions::default()),
            parse: |value| parse_as::<HabitsOptions>("habits", value).map(WidgetOptions::Habits),
        },
        SchemaEntry {
            widget_type: "currency",
            defaults: || WidgetOptions::Currency(CurrencyOptions::default()),
            parse: |value| parse_as::<CurrencyOptions>("currency", value).map(WidgetOptions::Currency),
        },
    ];
    entries
        .into_iter()
        .map(|entry| (entry.widget_type, entry))
        .collect()
}

/// Implemented by every options struct.
trait Validate {
    fn validate(&mut self) -> Result<(), String>;
}

fn parse_as<T>(widget_type: &str, value: &Value) -> Result<T, SchemaError>
where
    T: for<'de> Deserialize<'de> + Validate + Default,
{
    let mut options: T = if value.is_null() {
        T::default()
    } else {
        serde_json::from_value(value.clone()).map_err(|err| SchemaError::Invalid {
            widget_type: widget_type.to_string(),
            message: err.to_string(),
        })?
    };
    options.validate().map_err(|message| SchemaError::Invalid {
        widget_type: widget_type.to_string(),
        message,
    })?;
    Ok(options)
}

impl WidgetOptions {
    /// Validates `options` against the schema for `widget_type`.
    pub fn parse(widget_type: &str, options: &Value) -> Result<Self, SchemaError> {
        let entry = registry()
            .get(widget_type)
            .copied()
            .ok_or_else(|| SchemaError::UnknownType(widget_type.to_string()))?;
        (entry.parse)(options)
    }

    pub fn defaults(widget_type: &str) -> Result<Self, SchemaError> {
        registry()
            .get(widget_type)
            .map(|entry| (entry.defaults)())
            .ok_or_else(|| SchemaError::UnknownType(widget_type.to_string()))
    }

    /// Typed options for `widget`, falling back to the type's defaults when
    /// the stored document does not validate.
    pub fn from_widget(widget: &Widget) -> Result<Self, SchemaError> {
        match Self::parse(&widget.widget_type, &widget.options) {
            Ok(options) => Ok(options),
            Err(SchemaError::Invalid { message, .. }) => {
                tracing::warn!(
                    widget = %widget.id,
                    widget_type = %widget.widget_type,
                    %message,
                    "widget options are malformed, using defaults"
                );
                Self::defaults(&widget.widget_type)
            }
            Err(err) => Err(err),
        }
    }

    pub fn widget_type(&self) -> &'static str {
        match self {
            WidgetOptions::Clock(_) => "clock",
            WidgetOptions::Calendar(_) => "calendar",
            WidgetOptions::Habits(_) => "habits",
            WidgetOptions::Currency(_) => "currency",
        }
    }

    pub fn to_value(&self) -> Value {
        let value = match self {
            WidgetOptions::Clock(options) => serde_json::to_value(options),
            WidgetOptions::Calendar(options) => serde_json::to_value(options),
            WidgetOptions::Habits(options) => serde_json::to_value(options),
            WidgetOptions::Currency(options) => serde_json::to_value(options),
        };
        value.unwrap_or(Value::Null)
    }

    pub fn into_clock(self) -> Option<ClockOptions> {
        match self {
            WidgetOptions::Clock(options) => Some(options),
            _ => None,
        }
    }

    pub fn into_calendar(self) -> Option<CalendarOptions> {
        match self {
            WidgetOptions::Calendar(options) => Some(options),
            _ => None,
        }
    }

    pub fn into_habits(self) -> Option<HabitsOptions> {
        match self {
            WidgetOptions::Habits(options) => Some(options),
            _ => None,
        }
    }

    pub fn into_currency(self) -> Option<CurrencyOptions> {
        match self {
            WidgetOptions::Currency(options) => Some(options),
            _ => None,
        }
    }
}

/// Offset codes arrive both as strings (`"3.5"`) and as bare numbers.
pub(crate) fn offset_code<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Code {
        Text(String),
        Number(serde_json::Number),
    }
    Ok(match Code::deserialize(deserializer)? {
        Code::Text(text) => text,
        Code::Number(number) => number.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn registry_lists_all_builtin_types() {
        let keys: Vec<_> = registry().keys().copied().collect();
        assert_eq!(keys, vec!["calendar", "clock", "currency", "habits"]);
    }

    #[test]
    fn unknown_type_is_an_error() {
        assert_eq!(
            WidgetOptions::parse("nonexistent", &json!({})),
            Err(SchemaError::UnknownType("nonexistent".to_string()))
        );
    }

    #[test]
    fn malformed_options_fall_back_to_defaults() {
        let widget = Widget::new("w1", "clock", "d1", json!({"timezones": "not a list"}));
        let options = WidgetOptions::from_widget(&widget).expect("clock schema");
        assert_eq!(options, WidgetOptions::Clock(ClockOptions::default()));
    }

    #[test]
    fn null_options_use_defaults() {
        let widget = Widget::new("w1", "calendar", "d1", Value::Null);
        let options = WidgetOptions::from_widget(&widget).expect("calendar schema");
        assert_eq!(options.widget_type(), "calendar");
        assert_eq!(options.into_calendar(), Some(CalendarOptions::default()));
    }

    #[test]
    fn defaults_serialize_to_camel_case() {
        let value = WidgetOptions::defaults("calendar").expect("calendar").to_value();
        assert_eq!(value["firstDayOfWeek"], json!(1));
        assert_eq!(value["showProgress"], json!(true));
    }
}
