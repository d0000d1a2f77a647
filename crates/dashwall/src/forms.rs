//! Declarative edit-form descriptors, consumed by an external form renderer.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::schema::Period;
use crate::timezone;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormField {
    pub key: String,
    pub label: String,
    pub kind: FieldKind,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<Choice>>,
    /// Sub-fields of each entry of a `list` field.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<FormField>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Text,
    Number,
    Select,
    Checkbox,
    Color,
    Icon,
    List,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Choice {
    pub value: String,
    pub label: String,
}

impl FormField {
    fn new(key: &str, label: &str, kind: FieldKind) -> Self {
        Self {
            key: key.to_string(),
            label: label.to_string(),
            kind,
            required: false,
            options: None,
            fields: None,
        }
    }

    fn required(mut self) -> Self {
        self.required = true;
        self
    }

    fn choices<I, V, L>(mut self, choices: I) -> Self
    where
        I: IntoIterator<Item = (V, L)>,
        V: Into<String>,
        L: Into<String>,
    {
        self.options = Some(
            choices
                .into_iter()
                .map(|(value, label)| Choice {
                    value: value.into(),
                    label: label.into(),
                })
                .collect(),
        );
        self
    }

    fn fields(mut self, fields: Vec<FormField>) -> Self {
        self.fields = Some(fields);
        self
    }
}

pub type DescriptorFn = fn() -> Vec<FormField>;

pub fn registry() -> BTreeMap<&'static str, DescriptorFn> {
    let entries: [(&'static str, DescriptorFn); 4] = [
        ("clock", clock_fields),
        ("calendar", calendar_fields),
        ("habits", habits_fields),
        ("currency", currency_fields),
    ];
    entries.into_iter().collect()
}

pub fn descriptor(widget_type: &str) -> Option<Vec<FormField>> {
    registry().get(widget_type).map(|build| build())
}

fn timezone_choices() -> Vec<(String, String)> {
    timezone::known_offsets()
        .into_iter()
        .map(|(code, zone)| {
            let sign = match code.as_str() {
                "0" => String::new(),
                _ if code.starts_with('-') => code.clone(),
                _ => format!("+{code}"),
            };
            (code, format!("UTC{sign} ({zone})"))
        })
        .collect()
}

const WEEKDAYS: [&str; 7] = [
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];

fn clock_fields() -> Vec<FormField> {
    vec![
        FormField::new("timezones", "Timezones", FieldKind::List)
            .required()
            .fields(vec![
                FormField::new("timezone", "Offset", FieldKind::Select)
                    .required()
                    .choices(timezone_choices()),
                FormField::new("label", "Label", FieldKind::Text),
            ]),
        FormField::new("display", "Display", FieldKind::Select)
            .choices([("digital", "Digital"), ("analog", "Analog")]),
        FormField::new("showSeconds", "Show seconds", FieldKind::Checkbox),
    ]
}

fn calendar_fields() -> Vec<FormField> {
    vec![
        FormField::new("firstDayOfWeek", "First day of week", FieldKind::Select)
            .choices(WEEKDAYS.iter().enumerate().map(|(idx, day)| (idx.to_string(), *day))),
        FormField::new("timezone", "Timezone", FieldKind::Select).choices(timezone_choices()),
        FormField::new("showProgress", "Show month progress", FieldKind::Checkbox),
    ]
}

fn habits_fields() -> Vec<FormField> {
    vec![FormField::new("items", "Habits", FieldKind::List)
        .required()
        .fields(vec![
            FormField::new("id", "Id", FieldKind::Text).required(),
            FormField::new("name", "Name", FieldKind::Text).required(),
            FormField::new("icon", "Icon", FieldKind::Icon),
            FormField::new("color", "Color", FieldKind::Color),
            FormField::new("minValue", "Minimum", FieldKind::Number).required(),
            FormField::new("maxValue", "Maximum", FieldKind::Number).required(),
            FormField::new("currentValue", "Starting value", FieldKind::Number),
        ])]
}

fn currency_fields() -> Vec<FormField> {
    vec![
        FormField::new("items", "Currency pairs", FieldKind::List)
            .required()
            .fields(vec![
                FormField::new("base", "Base", FieldKind::Text).required(),
                FormField::new("quote", "Quote", FieldKind::Text).required(),
            ]),
        FormField::new("period", "Period", FieldKind::Select)
            .choices(Period::ALL.iter().map(|period| (period.as_str(), period.label()))),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn descriptor_serializes_nested_fields() {
        let fields = descriptor("habits").expect("habits form");
        let value = serde_json::to_value(&fields).expect("json");
        assert_eq!(value[0]["key"], json!("items"));
        assert_eq!(value[0]["kind"], json!("list"));
        assert_eq!(value[0]["fields"][4]["key"], json!("minValue"));
        assert!(value[0]["fields"][0].get("options").is_none());
    }

    #[test]
    fn clock_offsets_cover_quarter_hours() {
        let fields = descriptor("clock").expect("clock form");
        let offsets = fields[0].fields.as_ref().expect("sub-fields")[0]
            .options
            .as_ref()
            .expect("choices");
        assert!(offsets.iter().any(|choice| choice.value == "5.75"));
        assert!(offsets.iter().any(|choice| choice.label == "UTC+3.5 (Asia/Tehran)"));
    }

    #[test]
    fn unknown_type_has_no_descriptor() {
        assert!(descriptor("nonexistent").is_none());
    }
}
