//! Currency quote history sources.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::future::BoxFuture;
use rust_decimal::Decimal;
use serde_json::Value;
use ureq::Error as UreqError;
use url::Url;

use crate::error::QuoteError;
use crate::schema::Period;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotePoint {
    pub time: DateTime<Utc>,
    pub rate: Decimal,
}

pub type QuoteFuture = BoxFuture<'static, Result<Vec<QuotePoint>, QuoteError>>;

pub trait QuoteSource: Send + Sync {
    /// Rate history of `base` priced in `quote`, oldest first.
    fn history(&self, base: &str, quote: &str, period: Period) -> QuoteFuture;
}

/// Fetches history from an HTTP endpoint answering
/// `GET {endpoint}?base=USD&quote=EUR&period=1d`.
pub struct HttpQuoteSource {
    endpoint: Url,
    agent: ureq::Agent,
    timeout: Duration,
}

impl HttpQuoteSource {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, QuoteError> {
        let endpoint = Url::parse(endpoint)
            .map_err(|err| QuoteError::Request(format!("invalid quote endpoint `{endpoint}`: {err}")))?;
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Ok(Self {
            endpoint,
            agent,
            timeout,
        })
    }

    pub fn request_url(&self, base: &str, quote: &str, period: Period) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("base", base)
            .append_pair("quote", quote)
            .append_pair("period", period.as_str());
        url
    }
}

impl QuoteSource for HttpQuoteSource {
    fn history(&self, base: &str, quote: &str, period: Period) -> QuoteFuture {
        let url = self.request_url(base, quote, period);
        let agent = self.agent.clone();
        let deadline = self.timeout;
        Box::pin(async move {
            let task = tokio::task::spawn_blocking(move || fetch(&agent, &url));
            match tokio::time::timeout(deadline, task).await {
                Ok(Ok(result)) => result,
                Ok(Err(err)) => Err(QuoteError::Request(err.to_string())),
                Err(_) => Err(QuoteError::Timeout),
            }
        })
    }
}

fn fetch(agent: &ureq::Agent, url: &Url) -> Result<Vec<QuotePoint>, QuoteError> {
    tracing::debug!(%url, "fetching quote history");
    let response = agent.get(url.as_str()).call().map_err(|err| match err {
        UreqError::Status(code, _) => QuoteError::Request(format!("http status {code}")),
        UreqError::Transport(err) => QuoteError::Request(err.to_string()),
    })?;
    let body = response
        .into_string()
        .map_err(|err| QuoteError::Request(err.to_string()))?;
    parse_history(&body)
}

/// Accepts `[{"time", "rate"}]` or `{"points": [...]}`; `time` is epoch
/// seconds or RFC 3339. Points are returned sorted by time.
pub fn parse_history(body: &str) -> Result<Vec<QuotePoint>, QuoteError> {
    let value: Value = serde_json::from_str(body).map_err(|err| QuoteError::Malformed(err.to_string()))?;
    let items = match &value {
        Value::Array(items) => items,
        Value::Object(fields) => match fields.get("points") {
            Some(Value::Array(items)) => items,
            _ => return Err(QuoteError::Malformed("expected a `points` array".to_string())),
        },
        _ => return Err(QuoteError::Malformed("expected an array of points".to_string())),
    };
    let mut points = items.iter().map(parse_point).collect::<Result<Vec<_>, _>>()?;
    points.sort_by_key(|point| point.time);
    Ok(points)
}

fn parse_point(item: &Value) -> Result<QuotePoint, QuoteError> {
    let time = match item.get("time") {
        Some(Value::Number(secs)) => secs
            .as_i64()
            .and_then(|secs| DateTime::from_timestamp(secs, 0)),
        Some(Value::String(text)) => DateTime::parse_from_rfc3339(text)
            .ok()
            .map(|time| time.with_timezone(&Utc)),
        _ => None,
    }
    .ok_or_else(|| QuoteError::Malformed(format!("bad point time in {item}")))?;
    let rate = match item.get("rate") {
        Some(Value::Number(number)) => Decimal::from_str(&number.to_string()).ok(),
        Some(Value::String(text)) => Decimal::from_str(text.trim()).ok(),
        _ => None,
    }
    .ok_or_else(|| QuoteError::Malformed(format!("bad point rate in {item}")))?;
    Ok(QuotePoint { time, rate })
}

/// In-memory source for previews and tests. Pairs without data fail like an
/// unreachable endpoint.
#[derive(Default)]
pub struct StaticQuotes {
    series: Mutex<HashMap<(String, String), Vec<QuotePoint>>>,
    requests: Mutex<Vec<(String, String, Period)>>,
}

impl StaticQuotes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, base: &str, quote: &str, points: Vec<QuotePoint>) {
        self.series
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((base.to_string(), quote.to_string()), points);
    }

    /// Every `(base, quote, period)` requested so far.
    pub fn requests(&self) -> Vec<(String, String, Period)> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}

impl QuoteSource for StaticQuotes {
    fn history(&self, base: &str, quote: &str, period: Period) -> QuoteFuture {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((base.to_string(), quote.to_string(), period));
        let result = self
            .series
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(base.to_string(), quote.to_string()))
            .cloned()
            .ok_or_else(|| QuoteError::Request(format!("no quotes for {base}/{quote}")));
        Box::pin(async move { result })
    }
}
