//! Engine.IO v4 / Socket.IO v5 text framing used by the websocket transport.
//!
//! Only the client side of the text protocol is covered: open, ping/pong,
//! close, and the socket packets `CONNECT`, `DISCONNECT`, `EVENT`,
//! `CONNECT_ERROR` on any namespace. Binary attachments are rejected.

#![allow(missing_docs)]

use serde_json::Value;

use crate::error::ConsoleError;

/// Query appended to the server url when it has no explicit Socket.IO path.
pub const SOCKET_IO_PATH: &str = "/socket.io/?EIO=4&transport=websocket";

#[derive(Debug, Clone, PartialEq)]
pub enum EnginePacket {
    Open(Value),
    Close,
    Ping(String),
    Pong(String),
    Message(String),
    Upgrade,
    Noop,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SocketPacket {
    Connect(Option<Value>),
    Disconnect,
    Event {
        name: String,
        payload: Option<Value>,
        ack: Option<u64>,
    },
    Ack {
        id: u64,
        payload: Option<Value>,
    },
    ConnectError(Option<Value>),
}

pub fn decode_engine(text: &str) -> Result<EnginePacket, ConsoleError> {
    let mut chars = text.chars();
    let kind = chars
        .next()
        .ok_or_else(|| ConsoleError::Protocol("empty engine packet".into()))?;
    let body = chars.as_str();
    Ok(match kind {
        '0' => EnginePacket::Open(serde_json::from_str(body)?),
        '1' => EnginePacket::Close,
        '2' => EnginePacket::Ping(body.to_string()),
        '3' => EnginePacket::Pong(body.to_string()),
        '4' => EnginePacket::Message(body.to_string()),
        '5' => EnginePacket::Upgrade,
        '6' => EnginePacket::Noop,
        other => {
            return Err(ConsoleError::Protocol(
                format!("unknown engine packet type '{other}'").into(),
            ))
        }
    })
}

#[must_use]
pub fn encode_engine(packet: &EnginePacket) -> String {
    match packet {
        EnginePacket::Open(value) => format!("0{value}"),
        EnginePacket::Close => "1".to_string(),
        EnginePacket::Ping(body) => format!("2{body}"),
        EnginePacket::Pong(body) => format!("3{body}"),
        EnginePacket::Message(body) => format!("4{body}"),
        EnginePacket::Upgrade => "5".to_string(),
        EnginePacket::Noop => "6".to_string(),
    }
}

/// Decodes the body of an engine `Message` packet.
pub fn decode_socket(text: &str) -> Result<SocketPacket, ConsoleError> {
    let mut rest = text;
    let kind = rest
        .chars()
        .next()
        .ok_or_else(|| ConsoleError::Protocol("empty socket packet".into()))?;
    rest = &rest[kind.len_utf8()..];

    if matches!(kind, '5' | '6') {
        return Err(ConsoleError::Protocol(
            "binary socket packets are not supported".into(),
        ));
    }

    if rest.starts_with('/') {
        rest = match rest.find(',') {
            Some(idx) => &rest[idx + 1..],
            None => "",
        };
    }

    let digits = rest.chars().take_while(char::is_ascii_digit).count();
    let ack = if digits > 0 {
        Some(rest[..digits].parse::<u64>().map_err(|err| {
            ConsoleError::Protocol(format!("invalid ack id: {err}").into())
        })?)
    } else {
        None
    };
    rest = &rest[digits..];

    let data = if rest.trim().is_empty() {
        None
    } else {
        Some(serde_json::from_str::<Value>(rest)?)
    };

    match kind {
        '0' => Ok(SocketPacket::Connect(data)),
        '1' => Ok(SocketPacket::Disconnect),
        '2' => {
            let Some(Value::Array(mut items)) = data else {
                return Err(ConsoleError::Protocol("event packet without array".into()));
            };
            if items.is_empty() {
                return Err(ConsoleError::Protocol("event packet without name".into()));
            }
            let name = match items.remove(0) {
                Value::String(name) => name,
                other => {
                    return Err(ConsoleError::Protocol(
                        format!("event name must be a string, got {other}").into(),
                    ))
                }
            };
            let payload = if items.is_empty() {
                None
            } else {
                Some(items.remove(0))
            };
            Ok(SocketPacket::Event { name, payload, ack })
        }
        '3' => {
            let id = ack.ok_or_else(|| ConsoleError::Protocol("ack packet without id".into()))?;
            let payload = match data {
                Some(Value::Array(mut items)) if !items.is_empty() => Some(items.remove(0)),
                _ => None,
            };
            Ok(SocketPacket::Ack { id, payload })
        }
        '4' => Ok(SocketPacket::ConnectError(data)),
        other => Err(ConsoleError::Protocol(
            format!("unknown socket packet type '{other}'").into(),
        )),
    }
}

/// Full websocket text frame for an outgoing event on the default namespace.
#[must_use]
pub fn encode_event(name: &str, payload: Option<&Value>) -> String {
    let mut items = vec![Value::String(name.to_string())];
    if let Some(payload) = payload {
        items.push(payload.clone());
    }
    format!("42{}", Value::Array(items))
}

/// Frame requesting a connection to the default namespace.
#[must_use]
pub fn encode_connect() -> String {
    "40".to_string()
}

/// Maps an `http(s)`/`ws(s)` server url to the Socket.IO websocket endpoint.
#[must_use]
pub fn websocket_url(url: &str) -> String {
    let trimmed = url.trim();
    let mapped = if let Some(rest) = trimmed.strip_prefix("http://") {
        format!("ws://{rest}")
    } else if let Some(rest) = trimmed.strip_prefix("https://") {
        format!("wss://{rest}")
    } else {
        trimmed.to_string()
    };
    if mapped.contains("/socket.io") {
        return mapped;
    }
    format!("{}{SOCKET_IO_PATH}", mapped.trim_end_matches('/'))
}

/// Human-readable reason from a `CONNECT_ERROR` payload.
#[must_use]
pub fn connect_error_message(data: Option<&Value>) -> String {
    match data {
        Some(Value::Object(map)) => map
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("connection refused")
            .to_string(),
        Some(Value::String(text)) => text.clone(),
        _ => "connection refused".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn engine_packets_decode_by_leading_digit() {
        assert_eq!(
            decode_engine(r#"0{"sid":"abc","pingInterval":25000}"#).expect("open"),
            EnginePacket::Open(json!({"sid": "abc", "pingInterval": 25000}))
        );
        assert_eq!(decode_engine("2").expect("ping"), EnginePacket::Ping(String::new()));
        assert_eq!(
            decode_engine(r#"42["x"]"#).expect("message"),
            EnginePacket::Message(r#"2["x"]"#.to_string())
        );
        assert!(decode_engine("").is_err());
        assert!(decode_engine("9").is_err());
    }

    #[test]
    fn event_packets_carry_name_payload_and_ack() {
        assert_eq!(
            decode_socket(r#"2["terminal_output",{"output":"hi\n"}]"#).expect("event"),
            SocketPacket::Event {
                name: "terminal_output".to_string(),
                payload: Some(json!({"output": "hi\n"})),
                ack: None,
            }
        );
        assert_eq!(
            decode_socket(r#"2/admin,12["pong_response"]"#).expect("namespaced event"),
            SocketPacket::Event {
                name: "pong_response".to_string(),
                payload: None,
                ack: Some(12),
            }
        );
    }

    #[test]
    fn connect_and_errors_decode() {
        assert_eq!(
            decode_socket(r#"0{"sid":"x"}"#).expect("connect"),
            SocketPacket::Connect(Some(json!({"sid": "x"})))
        );
        assert_eq!(decode_socket("1").expect("disconnect"), SocketPacket::Disconnect);
        let err = decode_socket(r#"4{"message":"Not authorized"}"#).expect("connect error");
        let SocketPacket::ConnectError(data) = err else {
            panic!("expected connect error");
        };
        assert_eq!(connect_error_message(data.as_ref()), "Not authorized");
        assert!(decode_socket(r#"51-["x",{"_placeholder":true,"num":0}]"#).is_err());
        assert!(decode_socket("2{}").is_err());
    }

    #[test]
    fn outgoing_events_encode_as_message_frames() {
        assert_eq!(
            encode_event("login", Some(&json!({"uid": "1042"}))),
            r#"42["login",{"uid":"1042"}]"#
        );
        assert_eq!(encode_event("ping_check", None), r#"42["ping_check"]"#);
        assert_eq!(encode_engine(&EnginePacket::Pong(String::new())), "3");
    }

    #[test]
    fn websocket_url_maps_scheme_and_path() {
        assert_eq!(
            websocket_url("http://127.0.0.1:5000/"),
            "ws://127.0.0.1:5000/socket.io/?EIO=4&transport=websocket"
        );
        assert_eq!(
            websocket_url("https://term.example"),
            "wss://term.example/socket.io/?EIO=4&transport=websocket"
        );
        assert_eq!(
            websocket_url("ws://host/socket.io/?EIO=4&transport=websocket"),
            "ws://host/socket.io/?EIO=4&transport=websocket"
        );
    }
}
