use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::Validate;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HabitsOptions {
    #[serde(default = "default_items")]
    pub items: Vec<HabitItem>,
}

/// Static configuration of one tracked habit. Runtime counters live in the
/// widget state; `current_value` only seeds a habit that has no state yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HabitItem {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_icon")]
    pub icon: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default)]
    pub min_value: i64,
    #[serde(default = "default_max_value")]
    pub max_value: i64,
    #[serde(default)]
    pub current_value: i64,
}

fn default_icon() -> String {
    "circle-check".to_string()
}

fn default_max_value() -> i64 {
    8
}

fn default_items() -> Vec<HabitItem> {
    vec![HabitItem {
        id: "water".to_string(),
        name: "Water".to_string(),
        icon: "glass-water".to_string(),
        color: None,
        min_value: 0,
        max_value: default_max_value(),
        current_value: 0,
    }]
}

impl Default for HabitsOptions {
    fn default() -> Self {
        Self {
            items: default_items(),
        }
    }
}

impl HabitItem {
    pub fn clamp(&self, value: i64) -> i64 {
        value.clamp(self.min_value, self.max_value)
    }
}

impl Validate for HabitsOptions {
    fn validate(&mut self) -> Result<(), String> {
        let mut seen = HashSet::new();
        for item in &mut self.items {
            item.id = item.id.trim().to_string();
            if item.id.is_empty() {
                return Err("habit id must not be empty".to_string());
            }
            if !seen.insert(item.id.clone()) {
                return Err(format!("duplicate habit id `{}`", item.id));
            }
            if item.max_value < item.min_value {
                return Err(format!(
                    "habit `{}` has maxValue {} below minValue {}",
                    item.id, item.max_value, item.min_value
                ));
            }
            if item.name.trim().is_empty() {
                item.name = item.id.clone();
            }
            item.current_value = item.clamp(item.current_value);
        }
        Ok(())
    }
}
