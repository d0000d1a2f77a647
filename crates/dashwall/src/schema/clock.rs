use serde::{Deserialize, Serialize};

use super::{offset_code, Validate};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClockOptions {
    #[serde(default = "default_timezones")]
    pub timezones: Vec<ClockZone>,
    #[serde(default)]
    pub display: ClockDisplay,
    #[serde(default)]
    pub show_seconds: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockZone {
    /// UTC offset code in hours, e.g. `"5.75"`.
    #[serde(alias = "timezoneOffset", deserialize_with = "offset_code")]
    pub timezone: String,
    #[serde(default)]
    pub label: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClockDisplay {
    #[default]
    Digital,
    Analog,
}

fn default_timezones() -> Vec<ClockZone> {
    vec![ClockZone {
        timezone: "0".to_string(),
        label: "UTC".to_string(),
    }]
}

impl Default for ClockOptions {
    fn default() -> Self {
        Self {
            timezones: default_timezones(),
            display: ClockDisplay::default(),
            show_seconds: false,
        }
    }
}

impl Validate for ClockOptions {
    fn validate(&mut self) -> Result<(), String> {
        if self.timezones.is_empty() {
            self.timezones = default_timezones();
        }
        for zone in &mut self.timezones {
            zone.timezone = zone.timezone.trim().to_string();
            if zone.timezone.is_empty() {
                return Err("timezone offset must not be empty".to_string());
            }
            if zone.label.trim().is_empty() {
                zone.label = format!("UTC{}", signed(&zone.timezone));
            }
        }
        Ok(())
    }
}

fn signed(code: &str) -> String {
    match code {
        "0" => String::new(),
        _ if code.starts_with(['+', '-']) => code.to_string(),
        _ => format!("+{code}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::WidgetOptions;
    use serde_json::json;

    #[test]
    fn accepts_legacy_offset_key_and_numeric_codes() {
        let options = WidgetOptions::parse(
            "clock",
            &json!({"timezones": [{"timezoneOffset": 5.75, "label": "Kathmandu"}], "display": "analog"}),
        )
        .expect("valid")
        .into_clock()
        .expect("clock");
        assert_eq!(options.timezones[0].timezone, "5.75");
        assert_eq!(options.display, ClockDisplay::Analog);
        assert!(!options.show_seconds);
    }

    #[test]
    fn empty_list_and_missing_labels_are_filled() {
        let options = WidgetOptions::parse("clock", &json!({"timezones": []}))
            .expect("valid")
            .into_clock()
            .expect("clock");
        assert_eq!(options, ClockOptions::default());

        let options = WidgetOptions::parse("clock", &json!({"timezones": [{"timezone": "-5"}, {"timezone": "3.5"}]}))
            .expect("valid")
            .into_clock()
            .expect("clock");
        assert_eq!(options.timezones[0].label, "UTC-5");
        assert_eq!(options.timezones[1].label, "UTC+3.5");
    }

    #[test]
    fn blank_offset_is_invalid() {
        assert!(WidgetOptions::parse("clock", &json!({"timezones": [{"timezone": " "}]})).is_err());
    }
}
