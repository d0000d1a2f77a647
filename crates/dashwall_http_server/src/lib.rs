use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_tungstenite::tungstenite::Message;
use hyper_tungstenite::HyperWebsocketStream;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use tokio::net::TcpListener;
use tokio::sync::{oneshot, Mutex as TokioMutex};
use tokio::task::JoinHandle;

pub struct HttpRequest {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub remote_addr: Option<String>,
}

impl HttpRequest {
    /// Looks up a query parameter without percent-decoding it.
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query.as_deref()?.split('&').find_map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (key == name).then_some(value)
        })
    }
}

pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn html(status: u16, body: String) -> Self {
        Self::with_type(status, "text/html; charset=utf-8", body.into_bytes())
    }

    pub fn text(status: u16, body: impl Into<String>) -> Self {
        Self::with_type(status, "text/plain; charset=utf-8", body.into().into_bytes())
    }

    pub fn json(status: u16, body: String) -> Self {
        Self::with_type(status, "application/json", body.into_bytes())
    }

    pub fn not_found() -> Self {
        Self::text(404, "not found")
    }

    fn with_type(status: u16, content_type: &str, body: Vec<u8>) -> Self {
        Self {
            status,
            headers: vec![("content-type".to_string(), content_type.to_string())],
            body,
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct HttpError {
    pub message: String,
}

impl HttpError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WsMessage {
    Text(String),
    Binary(Vec<u8>),
    Ping,
    Pong,
    Close,
}

pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<ServerReply, HttpError>> + Send>>;
pub type Handler = Arc<dyn Fn(HttpRequest) -> HandlerFuture + Send + Sync>;
pub type WsHandlerFuture = Pin<Box<dyn Future<Output = Result<(), HttpError>> + Send>>;
pub type WsHandler = Box<dyn FnOnce(WebSocketHandle) -> WsHandlerFuture + Send>;

pub enum ServerReply {
    Http(HttpResponse),
    Ws(WsHandler),
}

pub struct ServerHandle {
    local_addr: SocketAddr,
    shutdown_tx: Mutex<Option<oneshot::Sender<()>>>,
    join_handle: TokioMutex<Option<JoinHandle<()>>>,
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub async fn stop(&self) -> Result<(), HttpError> {
        if let Ok(mut guard) = self.shutdown_tx.lock() {
            if let Some(tx) = guard.take() {
                let _ = tx.send(());
            }
        }
        let handle = self.join_handle.lock().await.take();
        if let Some(handle) = handle {
            handle
                .await
                .map_err(|_| HttpError::new("server task panicked"))?;
        }
        Ok(())
    }

    /// Resolves once the accept loop has ended.
    pub async fn wait(&self) {
        let handle = self.join_handle.lock().await.take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}

/// Sink and stream halves are locked independently so a session can send
/// patches while another task is parked in `recv`.
#[derive(Clone)]
pub struct WebSocketHandle {
    sink: Arc<TokioMutex<SplitSink<HyperWebsocketStream, Message>>>,
    stream: Arc<TokioMutex<SplitStream<HyperWebsocketStream>>>,
}

impl WebSocketHandle {
    fn new(socket: HyperWebsocketStream) -> Self {
        let (sink, stream) = socket.split();
        Self {
            sink: Arc::new(TokioMutex::new(sink)),
            stream: Arc::new(TokioMutex::new(stream)),
        }
    }

    pub async fn recv(&self) -> Result<WsMessage, HttpError> {
        let mut stream = self.stream.lock().await;
        match stream.next().await {
            Some(Ok(msg)) => Ok(map_ws_message(msg)),
            Some(Err(err)) => Err(HttpError::new(err.to_string())),
            None => Ok(WsMessage::Close),
        }
    }

    pub async fn send(&self, msg: WsMessage) -> Result<(), HttpError> {
        let mut sink = self.sink.lock().await;
        sink.send(to_ws_message(msg))
            .await
            .map_err(|err| HttpError::new(err.to_string()))
    }

    pub async fn send_text(&self, text: String) -> Result<(), HttpError> {
        self.send(WsMessage::Text(text)).await
    }

    pub async fn close(&self) -> Result<(), HttpError> {
        self.send(WsMessage::Close).await
    }
}

/// Binds `addr` and serves `handler` on the current tokio runtime until
/// [`ServerHandle::stop`] is called.
pub async fn start_server(addr: SocketAddr, handler: Handler) -> Result<ServerHandle, HttpError> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|err| HttpError::new(format!("failed to bind {addr}: {err}")))?;
    let local_addr = listener
        .local_addr()
        .map_err(|err| HttpError::new(err.to_string()))?;
    let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

    let join_handle = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = &mut shutdown_rx => break,
                accept = listener.accept() => {
                    let (stream, remote_addr) = match accept {
                        Ok(value) => value,
                        Err(err) => {
                            tracing::debug!(error = %err, "accept failed");
                            continue;
                        }
                    };
                    let handler = handler.clone();
                    let service = service_fn(move |req| {
                        let handler = handler.clone();
                        async move { handle_request(req, remote_addr, handler).await }
                    });
                    tokio::spawn(async move {
                        let mut builder = auto::Builder::new(TokioExecutor::new());
                        builder.http1().keep_alive(true);
                        let conn = builder.serve_connection_with_upgrades(TokioIo::new(stream), service);
                        if let Err(err) = conn.await {
                            tracing::debug!(error = %err, "connection closed with error");
                        }
                    });
                }
            }
        }
        tracing::info!(%local_addr, "http server stopped");
    });

    tracing::info!(%local_addr, "http server listening");
    Ok(ServerHandle {
        local_addr,
        shutdown_tx: Mutex::new(Some(shutdown_tx)),
        join_handle: TokioMutex::new(Some(join_handle)),
    })
}

fn error_response(status: StatusCode, message: impl Into<Bytes>) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::from(message.into()));
    *response.status_mut() = status;
    response
}

async fn handle_request(
    req: Request<Incoming>,
    remote_addr: SocketAddr,
    handler: Handler,
) -> Result<Response<Full<Bytes>>, hyper::Error> {
    let is_upgrade = hyper_tungstenite::is_upgrade_request(&req);
    let (parts, body) = req.into_parts();

    let (body_bytes, upgrade_body) = if is_upgrade {
        (Bytes::new(), Some(body))
    } else {
        (body.collect().await?.to_bytes(), None)
    };

    let request = match build_request(&parts, body_bytes, Some(remote_addr.to_string())) {
        Ok(value) => value,
        Err(err) => return Ok(error_response(StatusCode::BAD_REQUEST, err.message)),
    };
    let reply = match handler(request).await {
        Ok(value) => value,
        Err(err) => {
            tracing::warn!(error = %err, path = %parts.uri.path(), "handler failed");
            return Ok(error_response(StatusCode::INTERNAL_SERVER_ERROR, err.message));
        }
    };

    match reply {
        ServerReply::Http(response) => match convert_response(response) {
            Ok(response) => Ok(response),
            Err(err) => Ok(error_response(StatusCode::INTERNAL_SERVER_ERROR, err.message)),
        },
        ServerReply::Ws(ws_handler) => {
            let Some(body) = upgrade_body else {
                return Ok(error_response(StatusCode::BAD_REQUEST, "upgrade required"));
            };
            let mut req = Request::from_parts(parts, body);
            match hyper_tungstenite::upgrade(&mut req, None) {
                Ok((response, websocket)) => {
                    tokio::spawn(async move {
                        match websocket.await {
                            Ok(ws_stream) => {
                                if let Err(err) = ws_handler(WebSocketHandle::new(ws_stream)).await {
                                    tracing::debug!(error = %err, "websocket session ended with error");
                                }
                            }
                            Err(err) => tracing::debug!(error = %err, "websocket handshake failed"),
                        }
                    });
                    Ok(response)
                }
                Err(_) => Ok(error_response(StatusCode::BAD_REQUEST, "upgrade failed")),
            }
        }
    }
}

fn build_request(
    parts: &hyper::http::request::Parts,
    body: Bytes,
    remote_addr: Option<String>,
) -> Result<HttpRequest, HttpError> {
    let headers = headers_to_vec(&parts.headers)?;
    Ok(HttpRequest {
        method: parts.method.as_str().to_string(),
        path: parts.uri.path().to_string(),
        query: parts.uri.query().map(str::to_string),
        headers,
        body: body.to_vec(),
        remote_addr,
    })
}

fn headers_to_vec(
    headers: &hyper::HeaderMap<hyper::header::HeaderValue>,
) -> Result<Vec<(String, String)>, HttpError> {
    let mut out = Vec::new();
    for (name, value) in headers.iter() {
        let value = value
            .to_str()
            .map_err(|_| HttpError::new("invalid header value"))?;
        out.push((name.as_str().to_string(), value.to_string()));
    }
    Ok(out)
}

fn convert_response(response: HttpResponse) -> Result<Response<Full<Bytes>>, HttpError> {
    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut builder = Response::builder().status(status);
    {
        let headers = builder
            .headers_mut()
            .ok_or_else(|| HttpError::new("failed to access headers"))?;
        for (name, value) in response.headers {
            let name = hyper::header::HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| HttpError::new("invalid header name"))?;
            let value = hyper::header::HeaderValue::from_str(&value)
                .map_err(|_| HttpError::new("invalid header value"))?;
            headers.append(name, value);
        }
    }
    builder
        .body(Full::from(Bytes::from(response.body)))
        .map_err(|_| HttpError::new("invalid response body"))
}

fn map_ws_message(msg: Message) -> WsMessage {
    match msg {
        Message::Text(text) => WsMessage::Text(text),
        Message::Binary(data) => WsMessage::Binary(data),
        Message::Ping(_) => WsMessage::Ping,
        Message::Pong(_) => WsMessage::Pong,
        Message::Close(_) => WsMessage::Close,
        Message::Frame(_) => WsMessage::Close,
    }
}

fn to_ws_message(msg: WsMessage) -> Message {
    match msg {
        WsMessage::Text(text) => Message::Text(text),
        WsMessage::Binary(data) => Message::Binary(data),
        WsMessage::Ping => Message::Ping(Vec::new()),
        WsMessage::Pong => Message::Pong(Vec::new()),
        WsMessage::Close => Message::Close(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(query: Option<&str>) -> HttpRequest {
        HttpRequest {
            method: "GET".to_string(),
            path: "/d/1/ws".to_string(),
            query: query.map(str::to_string),
            headers: Vec::new(),
            body: Vec::new(),
            remote_addr: None,
        }
    }

    #[test]
    fn query_param_finds_named_pair() {
        let req = request(Some("view=abc&x=1"));
        assert_eq!(req.query_param("view"), Some("abc"));
        assert_eq!(req.query_param("x"), Some("1"));
        assert_eq!(req.query_param("missing"), None);
        assert_eq!(request(None).query_param("view"), None);
    }

    #[test]
    fn html_response_sets_content_type() {
        let resp = HttpResponse::html(200, "<p>hi</p>".to_string());
        assert_eq!(resp.status, 200);
        assert_eq!(resp.headers[0].1, "text/html; charset=utf-8");
        assert_eq!(resp.body, b"<p>hi</p>".to_vec());
    }

    #[tokio::test]
    async fn server_binds_and_stops() {
        let handler: Handler = Arc::new(|_req| {
            Box::pin(async { Ok(ServerReply::Http(HttpResponse::not_found())) })
        });
        let server = start_server("127.0.0.1:0".parse().unwrap(), handler)
            .await
            .expect("bind");
        assert_ne!(server.local_addr().port(), 0);
        server.stop().await.expect("stop");
    }
}
