//! Device host: serves composed dashboards over HTTP and keeps live views
//! in sync over a WebSocket.
//!
//! `GET /` lists dashboards, `GET /d/{id}` composes a live view and parks it
//! under a view id, `GET /d/{id}/preview` serves static markup and
//! `GET /d/{id}/ws` is the socket a live page uses to claim its view, send
//! events and receive patch ops.

mod page;
mod session;
mod views;

use std::sync::Arc;
use std::time::Duration;

use dashwall_http_server::{
    start_server, Handler, HandlerFuture, HttpRequest, HttpResponse, ServerReply, WsHandler, WsHandlerFuture,
};
use tokio::runtime::Handle;

pub use page::{index_page, live_page, static_page};
pub use session::{decode, encode_patch, ClientMessage, ServerMessage};
pub use views::ViewRegistry;

use crate::compose::{ComposeOptions, ComposedView, Composer, Services};
use crate::config::DashwallConfig;
use crate::error::{ComposeError, LiveError, StoreError};
use crate::quotes::QuoteSource;
use crate::render::{RenderRegistry, RenderSettings};
use crate::state::StateBridge;
use crate::store::DashboardStore;
use crate::widget::DashboardId;

const WRITER_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Index,
    Live(DashboardId),
    Preview(DashboardId),
    Socket(DashboardId),
}

pub fn route(path: &str) -> Option<Route> {
    let segments: Vec<&str> = path.trim_matches('/').split('/').filter(|s| !s.is_empty()).collect();
    match segments.as_slice() {
        [] => Some(Route::Index),
        ["d", id] => Some(Route::Live(DashboardId::new(*id))),
        ["d", id, "preview"] => Some(Route::Preview(DashboardId::new(*id))),
        ["d", id, "ws"] => Some(Route::Socket(DashboardId::new(*id))),
        _ => None,
    }
}

/// Shared state behind every request.
pub struct LiveHost {
    store: Arc<dyn DashboardStore>,
    quotes: Arc<dyn QuoteSource>,
    bridge: StateBridge,
    renderers: RenderRegistry,
    settings: RenderSettings,
    views: ViewRegistry,
    config: DashwallConfig,
}

impl LiveHost {
    pub fn new(
        config: DashwallConfig,
        store: Arc<dyn DashboardStore>,
        quotes: Arc<dyn QuoteSource>,
        bridge: StateBridge,
    ) -> Self {
        Self {
            settings: config.render_settings(),
            views: ViewRegistry::new(config.view_ttl()),
            renderers: RenderRegistry::builtin(),
            store,
            quotes,
            bridge,
            config,
        }
    }

    pub fn views(&self) -> &ViewRegistry {
        &self.views
    }

    fn composer(&self) -> Composer {
        let services = Services::system(Handle::current(), self.quotes.clone(), self.settings);
        Composer::new(self.renderers.clone(), self.store.clone(), self.bridge.clone(), services)
    }

    pub async fn compose(&self, dashboard_id: &DashboardId, options: ComposeOptions) -> Result<(ComposedView, Composer), ComposeError> {
        let mut composer = self.composer();
        let view = composer.compose_view(dashboard_id, options).await?;
        Ok((view, composer))
    }

    pub async fn handle(&self, request: HttpRequest) -> ServerReply {
        if request.method != "GET" {
            return ServerReply::Http(HttpResponse::text(405, "method not allowed"));
        }
        let Some(route) = route(&request.path) else {
            return ServerReply::Http(HttpResponse::html(404, page::not_found_page("Page")));
        };
        tracing::debug!(path = %request.path, ?route, "request");
        match route {
            Route::Index => match self.store.dashboards().await {
                Ok(dashboards) => ServerReply::Http(HttpResponse::html(200, index_page(&dashboards))),
                Err(err) => ServerReply::Http(store_failure(&err)),
            },
            Route::Preview(id) => match self.compose(&id, ComposeOptions::static_markup()).await {
                Ok((view, _)) => ServerReply::Http(HttpResponse::html(200, static_page(&view))),
                Err(err) => ServerReply::Http(compose_failure(&err)),
            },
            Route::Live(id) => match self.compose(&id, ComposeOptions::live()).await {
                Ok((view, composer)) => {
                    let view_id = self.views.park(id.clone(), composer);
                    tracing::info!(dashboard = %id, view = %view_id, "live view composed");
                    let html = live_page(&view, &format!("/d/{id}/ws"), &view_id);
                    ServerReply::Http(HttpResponse::html(200, html))
                }
                Err(err) => ServerReply::Http(compose_failure(&err)),
            },
            Route::Socket(id) => {
                let views = self.views.clone();
                let flush_every = self.config.flush_interval();
                let ws: WsHandler = Box::new(move |socket| {
                    let session: WsHandlerFuture = Box::pin(session::run(socket, views, id, flush_every));
                    session
                });
                ServerReply::Ws(ws)
            }
        }
    }
}

fn store_failure(err: &StoreError) -> HttpResponse {
    match err {
        StoreError::DashboardNotFound(_) => HttpResponse::html(404, page::not_found_page("Dashboard")),
        other => {
            tracing::warn!(error = %other, "store failure while serving request");
            HttpResponse::text(500, "dashboard store unavailable")
        }
    }
}

fn compose_failure(err: &ComposeError) -> HttpResponse {
    match err {
        ComposeError::Store(err) => store_failure(err),
    }
}

/// Runs the device host until ctrl-c.
pub async fn serve(
    config: DashwallConfig,
    store: Arc<dyn DashboardStore>,
    quotes: Arc<dyn QuoteSource>,
) -> Result<(), LiveError> {
    let addr = config
        .listen_address()
        .map_err(|_| LiveError::Address(config.server.address.clone()))?;

    let (bridge, writer) = crate::state::channel(store.clone());
    let writer_task = tokio::spawn(writer.run());

    let host = Arc::new(LiveHost::new(config, store, quotes, bridge));
    let sweeper = tokio::spawn(host.views().clone().run_sweeper());

    let handler_host = host.clone();
    let handler: Handler = Arc::new(move |request| {
        let host = handler_host.clone();
        let reply: HandlerFuture = Box::pin(async move { Ok(host.handle(request).await) });
        reply
    });
    let server = start_server(addr, handler).await?;
    tracing::info!(addr = %server.local_addr(), "dashwall serving");

    tokio::select! {
        _ = server.wait() => {}
        signal = tokio::signal::ctrl_c() => {
            if let Err(err) = signal {
                tracing::warn!(error = %err, "failed to listen for ctrl-c");
            }
            tracing::info!("shutting down");
            server.stop().await?;
        }
    }

    sweeper.abort();
    drop(host);
    // Pending state writes finish once every bridge is gone; sessions still
    // closing may hold one, so the wait is bounded.
    match tokio::time::timeout(WRITER_GRACE, writer_task).await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => tracing::warn!(error = %err, "state writer task failed"),
        Err(_) => tracing::warn!("state writer still busy at shutdown"),
    }
    Ok(())
}
