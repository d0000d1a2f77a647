//! Widget rendering and composition for wall-mounted dashboards.

pub mod compose;
pub mod config;
pub mod dom;
pub mod error;
pub mod forms;
pub mod live;
pub mod logging;
pub mod quotes;
pub mod render;
pub mod schema;
pub mod state;
pub mod store;
pub mod theme;
pub mod timers;
pub mod timezone;
pub mod widget;
pub mod widgets;

pub use compose::{ComposeOptions, ComposedView, Composer, Services};
pub use config::DashwallConfig;
pub use error::{ComposeError, ConfigError, DashwallError, LiveError, QuoteError, SchemaError, StoreError};
pub use render::{EventPayload, Liveness, RenderContext, RenderRegistry, RenderSettings, Rendered, WidgetInstance, WidgetRenderer};
pub use schema::WidgetOptions;
pub use state::{StateBridge, StateWriter};
pub use store::{DashboardStore, JsonFileStore, MemoryStore, StoreData};
pub use timers::{Clock, ManualTimers, SystemClock, TimerHost, TokioTimers};
pub use timezone::offset_to_timezone;
pub use widget::{Dashboard, DashboardId, Widget, WidgetId};
