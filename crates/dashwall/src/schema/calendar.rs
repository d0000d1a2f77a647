use serde::{Deserialize, Serialize};

use super::{offset_code, Validate};

pub const DEFAULT_FIRST_DAY_OF_WEEK: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarOptions {
    /// 0 = Sunday .. 6 = Saturday.
    #[serde(default = "default_first_day_of_week")]
    pub first_day_of_week: i64,
    #[serde(default = "default_timezone", deserialize_with = "offset_code")]
    pub timezone: String,
    #[serde(default = "default_show_progress")]
    pub show_progress: bool,
}

fn default_first_day_of_week() -> i64 {
    DEFAULT_FIRST_DAY_OF_WEEK as i64
}

fn default_timezone() -> String {
    "0".to_string()
}

fn default_show_progress() -> bool {
    true
}

impl Default for CalendarOptions {
    fn default() -> Self {
        Self {
            first_day_of_week: default_first_day_of_week(),
            timezone: default_timezone(),
            show_progress: default_show_progress(),
        }
    }
}

impl CalendarOptions {
    pub fn first_day(&self) -> u32 {
        u32::try_from(self.first_day_of_week)
            .ok()
            .filter(|day| *day <= 6)
            .unwrap_or(DEFAULT_FIRST_DAY_OF_WEEK)
    }
}

impl Validate for CalendarOptions {
    fn validate(&mut self) -> Result<(), String> {
        if !(0..=6).contains(&self.first_day_of_week) {
            tracing::debug!(
                first_day_of_week = self.first_day_of_week,
                "first day of week out of range, using Monday"
            );
            self.first_day_of_week = default_first_day_of_week();
        }
        self.timezone = self.timezone.trim().to_string();
        if self.timezone.is_empty() {
            self.timezone = default_timezone();
        }
        Ok(())
    }
}
