use std::fmt;

use serde::{Deserialize, Serialize};

use super::Validate;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrencyOptions {
    #[serde(default = "default_items")]
    pub items: Vec<CurrencyPair>,
    #[serde(default)]
    pub period: Period,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencyPair {
    pub base: String,
    pub quote: String,
}

/// History window requested from the quote source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Period {
    #[default]
    #[serde(rename = "1d")]
    Day,
    #[serde(rename = "1w")]
    Week,
    #[serde(rename = "1m")]
    Month,
    #[serde(rename = "1y")]
    Year,
}

impl Period {
    pub const ALL: [Period; 4] = [Period::Day, Period::Week, Period::Month, Period::Year];

    pub fn as_str(self) -> &'static str {
        match self {
            Period::Day => "1d",
            Period::Week => "1w",
            Period::Month => "1m",
            Period::Year => "1y",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Period::Day => "Day",
            Period::Week => "Week",
            Period::Month => "Month",
            Period::Year => "Year",
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl CurrencyPair {
    pub fn new(base: &str, quote: &str) -> Self {
        Self {
            base: base.to_string(),
            quote: quote.to_string(),
        }
    }

    pub fn symbol(&self) -> String {
        format!("{}/{}", self.base, self.quote)
    }
}

fn default_items() -> Vec<CurrencyPair> {
    vec![CurrencyPair::new("USD", "EUR")]
}

impl Default for CurrencyOptions {
    fn default() -> Self {
        Self {
            items: default_items(),
            period: Period::default(),
        }
    }
}

impl Validate for CurrencyOptions {
    fn validate(&mut self) -> Result<(), String> {
        if self.items.is_empty() {
            self.items = default_items();
        }
        for pair in &mut self.items {
            pair.base = normalize_code(&pair.base)?;
            pair.quote = normalize_code(&pair.quote)?;
        }
        Ok(())
    }
}

fn normalize_code(code: &str) -> Result<String, String> {
    let code = code.trim().to_ascii_uppercase();
    if code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic()) {
        Ok(code)
    } else {
        Err(format!("`{code}` is not a three-letter currency code"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::WidgetOptions;
    use serde_json::json;

    #[test]
    fn codes_are_uppercased_and_period_parsed() {
        let options = WidgetOptions::parse(
            "currency",
            &json!({"items": [{"base": "gbp", "quote": " jpy "}], "period": "1w"}),
        )
        .expect("valid")
        .into_currency()
        .expect("currency");
        assert_eq!(options.items, vec![CurrencyPair::new("GBP", "JPY")]);
        assert_eq!(options.period, Period::Week);
        assert_eq!(options.items[0].symbol(), "GBP/JPY");
    }

    #[test]
    fn bad_codes_and_periods_are_rejected() {
        assert!(WidgetOptions::parse("currency", &json!({"items": [{"base": "US", "quote": "EUR"}]})).is_err());
        assert!(WidgetOptions::parse("currency", &json!({"period": "5y"})).is_err());
    }

    #[test]
    fn defaults_to_usd_eur_daily() {
        let options = CurrencyOptions::default();
        assert_eq!(options.items, vec![CurrencyPair::new("USD", "EUR")]);
        assert_eq!(options.period.as_str(), "1d");
    }
}
