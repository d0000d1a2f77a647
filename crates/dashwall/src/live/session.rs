use std::time::Duration;

use dashwall_http_server::{HttpError, WebSocketHandle, WsMessage};
use serde::{Deserialize, Serialize};

use super::views::ViewRegistry;
use crate::compose::Composer;
use crate::dom::PatchOp;
use crate::render::EventPayload;
use crate::widget::{DashboardId, WidgetId};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "t", rename_all = "camelCase")]
pub enum ClientMessage {
    Hello {
        view: String,
    },
    Event {
        widget: WidgetId,
        event: String,
        handler: String,
        #[serde(default)]
        value: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "t", rename_all = "camelCase")]
pub enum ServerMessage {
    Patch { ops: Vec<PatchOp> },
}

pub fn decode(text: &str) -> Option<ClientMessage> {
    match serde_json::from_str(text) {
        Ok(message) => Some(message),
        Err(err) => {
            tracing::debug!(error = %err, "unreadable client message");
            None
        }
    }
}

/// Encodes pending ops, or `None` when there is nothing to send.
pub fn encode_patch(ops: Vec<PatchOp>) -> Option<String> {
    if ops.is_empty() {
        return None;
    }
    serde_json::to_string(&ServerMessage::Patch { ops })
        .map_err(|err| tracing::warn!(error = %err, "failed to encode patch"))
        .ok()
}

/// Waits for `hello` and claims the named view.
async fn claim(socket: &WebSocketHandle, views: &ViewRegistry, dashboard_id: &DashboardId) -> Result<Option<Composer>, HttpError> {
    loop {
        match socket.recv().await? {
            WsMessage::Text(text) => match decode(&text) {
                Some(ClientMessage::Hello { view }) => return Ok(views.claim(&view, dashboard_id)),
                Some(ClientMessage::Event { .. }) | None => continue,
            },
            WsMessage::Close => return Ok(None),
            _ => continue,
        }
    }
}

fn handle_text(composer: &Composer, text: &str) {
    match decode(text) {
        Some(ClientMessage::Event {
            widget,
            event,
            handler,
            value,
        }) => {
            composer.dispatch(&widget, &handler, &EventPayload { event, value });
        }
        Some(ClientMessage::Hello { .. }) => tracing::debug!("repeated hello ignored"),
        None => {}
    }
}

async fn flush(socket: &WebSocketHandle, composer: &Composer) -> Result<(), HttpError> {
    match encode_patch(composer.scope().take_pending()) {
        Some(payload) => socket.send_text(payload).await,
        None => Ok(()),
    }
}

/// Runs one device connection: claim the view, then interleave incoming
/// events with periodic flushes of pending patch ops.
pub async fn run(
    socket: WebSocketHandle,
    views: ViewRegistry,
    dashboard_id: DashboardId,
    flush_every: Duration,
) -> Result<(), HttpError> {
    let Some(mut composer) = claim(&socket, &views, &dashboard_id).await? else {
        tracing::info!(dashboard = %dashboard_id, "socket without a live view, closing");
        let _ = socket.close().await;
        return Ok(());
    };
    tracing::info!(dashboard = %dashboard_id, "device session started");

    let mut tick = tokio::time::interval(flush_every);
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let outcome = loop {
        tokio::select! {
            message = socket.recv() => match message {
                Ok(WsMessage::Text(text)) => handle_text(&composer, &text),
                Ok(WsMessage::Ping) => {
                    if let Err(err) = socket.send(WsMessage::Pong).await {
                        break Err(err);
                    }
                }
                Ok(WsMessage::Close) => break Ok(()),
                Ok(_) => {}
                Err(err) => break Err(err),
            },
            _ = tick.tick() => {
                if let Err(err) = flush(&socket, &composer).await {
                    break Err(err);
                }
            }
        }
    };

    composer.teardown();
    tracing::info!(dashboard = %dashboard_id, "device session ended");
    outcome
}
