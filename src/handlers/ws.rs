//! Socket.IO-compatible WebSocket endpoint: handshake gate, heartbeats, event relay.

use axum::{
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::HeaderMap,
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant};
use tracing::{debug, info, warn};

use crate::error::AppError;
use crate::handlers::http::AppState;
use crate::models::presence::generate_socket_id;
use crate::models::Identity;
use crate::protocol::{self, Inbound, OpenPacket, DEFAULT_NAMESPACE, ENGINE_IO_VERSION};

/// Socket.IO event that only refreshes presence.
const HEARTBEAT_EVENT: &str = "heartbeat";
/// How long queued frames may take to flush once the read loop ends.
const WRITER_FLUSH_TIMEOUT: Duration = Duration::from_secs(1);

/// Upgrade HTTP to WebSocket. The session cookie is verified before the upgrade
/// is looked at; a refused handshake never becomes a socket.
pub async fn ws_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Result<Response, AppError> {
    check_transport(&params)?;
    let identity = state.gateway().authenticate(&headers).await?;
    match ws {
        Ok(ws) => Ok(ws.on_upgrade(move |socket| handle_socket(state, socket, identity))),
        Err(rejection) => Ok(rejection.into_response()),
    }
}

pub(crate) fn check_transport(params: &HashMap<String, String>) -> Result<(), AppError> {
    if let Some(version) = params.get("EIO") {
        if version != ENGINE_IO_VERSION {
            return Err(AppError::BadRequest(format!(
                "unsupported Engine.IO version {}",
                version
            )));
        }
    }
    if let Some(transport) = params.get("transport") {
        if transport != "websocket" {
            return Err(AppError::BadRequest(format!(
                "unsupported transport {}",
                transport
            )));
        }
    }
    Ok(())
}

/// Per-socket state. The socket is in the relay only while `joined`.
struct Connection {
    state: AppState,
    socket_id: String,
    identity: Identity,
    tx: mpsc::UnboundedSender<String>,
    joined: bool,
    pong_deadline: Option<Instant>,
}

enum Flow {
    Continue,
    Close,
}

impl Connection {
    fn send(&self, frame: impl Into<String>) {
        let _ = self.tx.send(frame.into());
    }

    async fn on_frame(&mut self, text: &str) -> Flow {
        let inbound = match protocol::decode(text) {
            Ok(inbound) => inbound,
            Err(e) => {
                if self.state.socket.debug {
                    debug!(socket_id = %self.socket_id, error = %e, "ignoring frame");
                }
                return Flow::Continue;
            }
        };

        match inbound {
            Inbound::Close => return Flow::Close,
            Inbound::Ping => self.send(protocol::encode_pong()),
            Inbound::Pong => {
                self.pong_deadline = None;
                self.refresh_presence().await;
            }
            Inbound::Connect { namespace } => self.on_connect(&namespace).await,
            Inbound::Disconnect { namespace } if namespace == DEFAULT_NAMESPACE => {
                return Flow::Close
            }
            Inbound::Event {
                namespace,
                name,
                payload,
            } if self.joined && namespace == DEFAULT_NAMESPACE => {
                if self.state.socket.debug {
                    debug!(socket_id = %self.socket_id, event = %name, "event received");
                }
                if name == HEARTBEAT_EVENT {
                    self.refresh_presence().await;
                } else {
                    self.state.relay().relay(&self.socket_id, &name, &payload).await;
                }
            }
            _ => {}
        }
        Flow::Continue
    }

    async fn on_connect(&mut self, namespace: &str) {
        if namespace != DEFAULT_NAMESPACE {
            self.send(protocol::encode_connect_error(namespace, "Invalid namespace"));
            return;
        }
        if !self.joined {
            if let Err(e) = self
                .state
                .presence_service()
                .connect(&self.identity, &self.socket_id)
                .await
            {
                warn!(socket_id = %self.socket_id, error = %e, "presence registration failed");
            }
            self.state
                .relay()
                .join_with(&self.socket_id, self.tx.clone())
                .await;
            self.joined = true;
        }
        self.send(protocol::encode_connect(&self.socket_id));
    }

    /// A live socket keeps its user online even when the entry is gone: lapsed
    /// during a store outage, or removed by another socket of the same user.
    async fn refresh_presence(&self) {
        if !self.joined {
            return;
        }
        let presence = self.state.presence_service();
        match presence.heartbeat(&self.identity.user_id).await {
            Ok(true) => {}
            Ok(false) => {
                debug!(socket_id = %self.socket_id, "presence entry missing, registering again");
                if let Err(e) = presence.connect(&self.identity, &self.socket_id).await {
                    warn!(socket_id = %self.socket_id, error = %e, "presence registration failed");
                }
            }
            Err(e) => warn!(socket_id = %self.socket_id, error = %e, "presence refresh failed"),
        }
    }

    fn on_ping_timeout(&self) {
        warn!(socket_id = %self.socket_id, "ping timeout");
        self.send(protocol::encode_disconnect());
    }

    async fn close(self) {
        if !self.joined {
            return;
        }
        self.state.relay().leave(&self.socket_id).await;
        if let Err(e) = self.state.presence_service().disconnect(&self.identity).await {
            warn!(socket_id = %self.socket_id, error = %e, "presence removal failed");
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn handle_socket(state: AppState, socket: WebSocket, identity: Identity) {
    let socket_id = generate_socket_id();
    let guard = state.gateway().admit();
    info!(
        socket_id = %socket_id,
        user_id = %identity.user_id,
        connected = guard.count_at_admit(),
        "ws connected"
    );

    let (mut sender, mut receiver) = socket.split();
    let settings = state.socket.clone();

    let open = protocol::encode_open(&OpenPacket {
        sid: socket_id.clone(),
        upgrades: Vec::new(),
        ping_interval: settings.ping_interval.as_millis() as u64,
        ping_timeout: settings.ping_timeout.as_millis() as u64,
        max_payload: settings.max_payload,
    });
    if sender.send(Message::Text(open)).await.is_err() {
        return;
    }

    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sender.send(Message::Text(msg)).await.is_err() {
                break;
            }
        }
    });

    let mut conn = Connection {
        state,
        socket_id,
        identity,
        tx,
        joined: false,
        pong_deadline: None,
    };
    let mut ping_timer = interval_at(
        Instant::now() + settings.ping_interval,
        settings.ping_interval,
    );

    loop {
        tokio::select! {
            frame = receiver.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    if matches!(conn.on_frame(&text).await, Flow::Close) {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
            _ = ping_timer.tick() => {
                conn.send(protocol::encode_ping());
                if conn.pong_deadline.is_none() {
                    conn.pong_deadline = Some(Instant::now() + settings.ping_timeout);
                }
            }
            _ = sleep_until(conn.pong_deadline) => {
                conn.on_ping_timeout();
                break;
            }
        }
    }

    let socket_id = conn.socket_id.clone();
    let gateway = conn.state.gateway().clone();
    // close() drops the last queue senders, so the writer drains and exits
    conn.close().await;
    if tokio::time::timeout(WRITER_FLUSH_TIMEOUT, &mut send_task)
        .await
        .is_err()
    {
        send_task.abort();
    }
    drop(guard);
    info!(
        socket_id = %socket_id,
        connected = gateway.connected_count(),
        "ws disconnected"
    );
}
