//! Engine.IO v4 / Socket.IO v5 text framing over a WebSocket.
//!
//! Only the default namespace and text packets are served. Binary packets and
//! acknowledgements are recognized so they can be skipped.

use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

/// Namespace every client joins.
pub const DEFAULT_NAMESPACE: &str = "/";
/// Engine.IO protocol revision spoken here.
pub const ENGINE_IO_VERSION: &str = "4";

/// Inbound frame after decoding both protocol layers.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Engine.IO close.
    Close,
    /// Engine.IO ping from the client (answered with a pong).
    Ping,
    /// Engine.IO pong answering a server ping.
    Pong,
    /// Socket.IO namespace connect.
    Connect { namespace: String },
    /// Socket.IO namespace disconnect.
    Disconnect { namespace: String },
    /// Socket.IO event with its first argument (`null` when absent).
    Event {
        namespace: String,
        name: String,
        payload: Value,
    },
    /// Recognized but unsupported (acks, binary, noop, upgrade).
    Ignored,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PacketError {
    #[error("empty frame")]
    Empty,
    #[error("unknown packet type {0:?}")]
    UnknownType(char),
    #[error("malformed event data")]
    MalformedEvent,
}

/// Decode one WebSocket text frame.
pub fn decode(frame: &str) -> Result<Inbound, PacketError> {
    let mut chars = frame.chars();
    let kind = chars.next().ok_or(PacketError::Empty)?;
    let rest = chars.as_str();
    match kind {
        '1' => Ok(Inbound::Close),
        '2' => Ok(Inbound::Ping),
        '3' => Ok(Inbound::Pong),
        '4' => decode_socket(rest),
        '5' | '6' => Ok(Inbound::Ignored),
        other => Err(PacketError::UnknownType(other)),
    }
}

fn decode_socket(packet: &str) -> Result<Inbound, PacketError> {
    let mut chars = packet.chars();
    let kind = chars.next().ok_or(PacketError::Empty)?;
    let (namespace, body) = split_namespace(chars.as_str());
    match kind {
        '0' => Ok(Inbound::Connect { namespace }),
        '1' => Ok(Inbound::Disconnect { namespace }),
        '2' => decode_event(namespace, skip_ack_id(body)),
        '3' | '5' | '6' => Ok(Inbound::Ignored),
        other => Err(PacketError::UnknownType(other)),
    }
}

fn split_namespace(body: &str) -> (String, &str) {
    if body.starts_with('/') {
        match body.split_once(',') {
            Some((ns, rest)) => (ns.to_string(), rest),
            None => (body.to_string(), ""),
        }
    } else {
        (DEFAULT_NAMESPACE.to_string(), body)
    }
}

fn skip_ack_id(body: &str) -> &str {
    body.trim_start_matches(|c: char| c.is_ascii_digit())
}

fn decode_event(namespace: String, data: &str) -> Result<Inbound, PacketError> {
    let args: Vec<Value> = serde_json::from_str(data).map_err(|_| PacketError::MalformedEvent)?;
    let mut args = args.into_iter();
    let name = match args.next() {
        Some(Value::String(name)) => name,
        _ => return Err(PacketError::MalformedEvent),
    };
    let payload = args.next().unwrap_or(Value::Null);
    Ok(Inbound::Event {
        namespace,
        name,
        payload,
    })
}

/// Engine.IO handshake parameters sent in the open packet.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenPacket {
    pub sid: String,
    pub upgrades: Vec<String>,
    pub ping_interval: u64,
    pub ping_timeout: u64,
    pub max_payload: u64,
}

pub fn encode_open(open: &OpenPacket) -> String {
    format!("0{}", json!(open))
}

pub fn encode_ping() -> &'static str {
    "2"
}

pub fn encode_pong() -> &'static str {
    "3"
}

pub fn encode_connect(sid: &str) -> String {
    format!("40{}", json!({ "sid": sid }))
}

pub fn encode_connect_error(namespace: &str, message: &str) -> String {
    let data = json!({ "message": message });
    if namespace == DEFAULT_NAMESPACE {
        format!("44{}", data)
    } else {
        format!("44{},{}", namespace, data)
    }
}

pub fn encode_disconnect() -> &'static str {
    "41"
}

pub fn encode_event(name: &str, payload: &Value) -> String {
    format!("42{}", json!([name, payload]))
}
