//! [`CockpitServer`] – HTTP + WebSocket server for operators.
//!
//! * HTTP on `0.0.0.0:5000` (see [`CockpitServer::with_port`]): an actix-web
//!   server on its own thread serving [`routes::configure`].
//! * WebSocket on `0.0.0.0:5001` (see [`CockpitServer::with_ws_port`]):
//!   `/ws` bridges the [`EventBus`][proxisafe_middleware::EventBus] topics to
//!   the browser and accepts stress controls back.

use std::net::SocketAddr;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use actix_web::{App, HttpServer, web};
use futures_util::{SinkExt, StreamExt};
use proxisafe_middleware::Topic;
use proxisafe_types::{Event, SafetyError};
use serde_json::Value;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tracing::{debug, error, info, warn};

use crate::routes::{self, AppState, DashboardPage, StressParams};

/// Default TCP port for HTTP.
pub const DEFAULT_PORT: u16 = 5000;

/// Default TCP port for the WebSocket bridge.
pub const DEFAULT_WS_PORT: u16 = 5001;

const WS_PATH: &str = "/ws";

/// An HTTP client must deliver its request head within this bound.
const CLIENT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
const WS_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);
const HTTP_WORKERS: usize = 2;

// ---------------------------------------------------------------------------
// CockpitServer
// ---------------------------------------------------------------------------

/// HTTP + WebSocket front end over the shared [`AppState`].
pub struct CockpitServer {
    state: Arc<AppState>,
    port: u16,
    ws_port: u16,
}

impl CockpitServer {
    /// Create a server on the [`DEFAULT_PORT`] and [`DEFAULT_WS_PORT`].
    pub fn new(state: Arc<AppState>) -> Self {
        Self {
            state,
            port: DEFAULT_PORT,
            ws_port: DEFAULT_WS_PORT,
        }
    }

    /// Override the HTTP port (builder-style).
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Override the WebSocket port (builder-style).
    pub fn with_ws_port(mut self, port: u16) -> Self {
        self.ws_port = port;
        self
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn ws_port(&self) -> u16 {
        self.ws_port
    }

    /// Bind both listeners and serve until the future is dropped, which also
    /// stops the HTTP thread.
    ///
    /// # Errors
    ///
    /// Returns [`SafetyError::Transport`] if either listener cannot bind or
    /// the HTTP thread cannot start.
    pub async fn run(self) -> Result<(), SafetyError> {
        let http_addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let http_listener = std::net::TcpListener::bind(http_addr)
            .map_err(|e| SafetyError::Transport(format!("bind error on {http_addr}: {e}")))?;
        let ws_addr = SocketAddr::from(([0, 0, 0, 0], self.ws_port));
        let ws_listener = TcpListener::bind(ws_addr)
            .await
            .map_err(|e| SafetyError::Transport(format!("bind error on {ws_addr}: {e}")))?;

        let _http = HttpThread::spawn(
            http_listener,
            Arc::clone(&self.state),
            DashboardPage::new(self.ws_port),
        )?;
        info!(
            port = self.port,
            ws_port = self.ws_port,
            "cockpit listening on http://localhost:{}",
            self.port
        );
        serve_ws(ws_listener, self.state).await;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// HTTP thread
// ---------------------------------------------------------------------------

/// The actix-web server, running on a dedicated thread with its own runtime.
/// Dropping the handle asks the server to stop.
pub struct HttpThread {
    local_addr: Option<SocketAddr>,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl HttpThread {
    /// Serve [`routes::configure`] on an already bound listener.
    ///
    /// # Errors
    ///
    /// Returns [`SafetyError::Transport`] if the listener cannot be switched
    /// to non-blocking mode or the thread cannot be spawned.
    pub fn spawn(
        listener: std::net::TcpListener,
        state: Arc<AppState>,
        page: DashboardPage,
    ) -> Result<Self, SafetyError> {
        listener
            .set_nonblocking(true)
            .map_err(|e| SafetyError::Transport(format!("HTTP listener: {e}")))?;
        let local_addr = listener.local_addr().ok();
        let state = web::Data::from(state);
        let page = web::Data::new(page);
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let handle = thread::Builder::new()
            .name("cockpit-http".into())
            .spawn(move || {
                let served = actix_web::rt::System::new().block_on(async move {
                    let server = HttpServer::new(move || {
                        App::new()
                            .app_data(state.clone())
                            .app_data(page.clone())
                            .configure(routes::configure)
                    })
                    .workers(HTTP_WORKERS)
                    .client_request_timeout(CLIENT_REQUEST_TIMEOUT)
                    .disable_signals()
                    .listen(listener)?
                    .run();

                    let server_handle = server.handle();
                    actix_web::rt::spawn(async move {
                        let _ = shutdown_rx.await;
                        server_handle.stop(false).await;
                    });
                    server.await
                });
                if let Err(e) = served {
                    error!(error = %e, "HTTP server error");
                }
            })
            .map_err(|e| SafetyError::Transport(format!("spawning HTTP thread: {e}")))?;

        Ok(Self {
            local_addr,
            shutdown: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Stop the server and wait for its thread to exit.
    pub fn stop(mut self) {
        self.signal();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }

    fn signal(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for HttpThread {
    fn drop(&mut self) {
        self.signal();
    }
}

// ---------------------------------------------------------------------------
// WebSocket: EventBus bridge
// ---------------------------------------------------------------------------

/// Accept WebSocket clients on an already bound listener forever.
pub async fn serve_ws(listener: TcpListener, state: Arc<AppState>) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    if let Err(e) = handle_ws(stream, peer, state).await {
                        debug!(%peer, error = %e, "ws client error");
                    }
                });
            }
            Err(e) => {
                warn!(error = %e, "accept error");
            }
        }
    }
}

fn only_ws_path(request: &Request, response: Response) -> Result<Response, ErrorResponse> {
    if request.uri().path() == WS_PATH {
        return Ok(response);
    }
    let mut rejection = ErrorResponse::new(Some(format!("no WebSocket at {}", request.uri().path())));
    *rejection.status_mut() = StatusCode::NOT_FOUND;
    Err(rejection)
}

async fn handle_ws(
    stream: TcpStream,
    peer: SocketAddr,
    state: Arc<AppState>,
) -> Result<(), SafetyError> {
    let ws_stream = tokio::time::timeout(WS_HANDSHAKE_TIMEOUT, accept_hdr_async(stream, only_ws_path))
        .await
        .map_err(|_| SafetyError::Transport(format!("WS handshake from {peer} timed out")))?
        .map_err(|e| SafetyError::Transport(format!("WS handshake from {peer}: {e}")))?;
    info!(%peer, "ws client connected");

    let (mut ws_tx, mut ws_rx) = ws_stream.split();
    let mut alerts = state.bus.subscribe_to(Topic::SafetyAlerts);
    let mut telemetry = state.bus.subscribe_to(Topic::Telemetry);

    loop {
        let outgoing: Option<Event> = tokio::select! {
            // ── Downstream: EventBus → browser ─────────────────────────────
            event = alerts.next_event() => match event {
                Some(event) => Some(event),
                None => break,
            },
            event = telemetry.next_event() => match event {
                Some(event) => Some(event),
                None => break,
            },
            // ── Upstream: browser → controls ───────────────────────────────
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(reply) = handle_upstream_message(text.as_str(), &state)
                            && ws_tx.send(Message::Text(reply.to_string().into())).await.is_err()
                        {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                    _ => {}
                }
                None
            }
        };

        if let Some(event) = outgoing {
            match serde_json::to_string(&event) {
                Ok(json) => {
                    if ws_tx.send(Message::Text(json.into())).await.is_err() {
                        break;
                    }
                }
                Err(e) => warn!(error = %e, "event serialization error"),
            }
        }
    }

    info!(%peer, "ws client disconnected");
    Ok(())
}

/// Apply a control message sent by a WebSocket client.
///
/// | `topic` | Effect |
/// |---|---|
/// | `/stress/start` | Opens a stress window from `seconds` / `intensity` |
/// | `/stress/stop` | Cancels the stress window |
///
/// Returns the same JSON the HTTP route would answer with; unknown or
/// malformed messages are ignored.
pub(crate) fn handle_upstream_message(text: &str, state: &AppState) -> Option<Value> {
    let json = serde_json::from_str::<Value>(text).ok()?;
    match json.get("topic").and_then(Value::as_str)? {
        "/stress/start" => Some(routes::apply_stress(state, StressParams::from_json(&json))),
        "/stress/stop" => Some(routes::stop_stress(state)),
        other => {
            debug!(topic = other, "ignoring ws message");
            None
        }
    }
}
