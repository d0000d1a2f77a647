use crate::widget::{DashboardId, WidgetId};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SchemaError {
    #[error("no schema registered for widget type `{0}`")]
    UnknownType(String),
    #[error("invalid `{widget_type}` options: {message}")]
    Invalid {
        widget_type: String,
        message: String,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("dashboard `{0}` not found")]
    DashboardNotFound(DashboardId),
    #[error("widget `{0}` not found")]
    WidgetNotFound(WidgetId),
    #[error("store IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("store data is malformed: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum QuoteError {
    #[error("quote request failed: {0}")]
    Request(String),
    #[error("quote response malformed: {0}")]
    Malformed(String),
    #[error("quote request timed out")]
    Timeout,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config `{path}`: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse config `{path}`: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
    #[error("invalid config value: {0}")]
    Invalid(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ComposeError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, thiserror::Error)]
pub enum LiveError {
    #[error("invalid listen address `{0}`")]
    Address(String),
    #[error(transparent)]
    Http(#[from] dashwall_http_server::HttpError),
}

#[derive(Debug, thiserror::Error)]
pub enum DashwallError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Compose(#[from] ComposeError),
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    Live(#[from] LiveError),
    #[error(transparent)]
    Quote(#[from] QuoteError),
    #[error("{0}")]
    Usage(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
