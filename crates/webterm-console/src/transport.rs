//! Socket.IO client transport over a websocket.

#![allow(missing_docs)]

use std::io;
use std::net::TcpStream;
use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::{debug, info, warn};
use tungstenite::stream::MaybeTlsStream;
use tungstenite::{Message, WebSocket};

use crate::config::ServerConfig;
use crate::error::ConsoleError;
use crate::protocol::{
    connect_error_message, decode_engine, decode_socket, encode_connect, encode_engine,
    encode_event, websocket_url, EnginePacket, SocketPacket,
};

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);
const POLL_TIMEOUT: Duration = Duration::from_millis(5);
const MAX_FRAMES_PER_POLL: usize = 64;

/// Lifecycle notices and named events coming from the server.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    Connect,
    Disconnect(String),
    ConnectError(String),
    Named {
        name: String,
        payload: Option<Value>,
    },
}

impl InboundEvent {
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            InboundEvent::Connect => "connect",
            InboundEvent::Disconnect(_) => "disconnect",
            InboundEvent::ConnectError(_) => "connect_error",
            InboundEvent::Named { name, .. } => name,
        }
    }
}

/// The real-time channel to the server.
pub trait Transport {
    /// Sends a named event; delivery is fire-and-forget.
    fn emit(&mut self, event: &str, payload: Option<Value>) -> Result<(), ConsoleError>;
    /// Drains whatever arrived since the last call without blocking for long.
    fn poll(&mut self, now: Instant) -> Vec<InboundEvent>;
    fn is_connected(&self) -> bool;
}

type Socket = WebSocket<MaybeTlsStream<TcpStream>>;

pub struct SocketIoTransport {
    url: String,
    socket: Option<Socket>,
    reconnect_attempts: u32,
    reconnect_delay: Duration,
    attempts_left: u32,
    next_attempt: Option<Instant>,
    queued: Vec<InboundEvent>,
}

impl SocketIoTransport {
    /// Connects and completes the namespace handshake; a failure here is fatal.
    pub fn connect(config: &ServerConfig) -> Result<Self, ConsoleError> {
        let url = websocket_url(&config.url);
        let socket = open_socket(&url)?;
        info!(%url, "connected");
        Ok(Self {
            url,
            socket: Some(socket),
            reconnect_attempts: config.reconnect_attempts,
            reconnect_delay: config.reconnect_delay,
            attempts_left: config.reconnect_attempts,
            next_attempt: None,
            queued: vec![InboundEvent::Connect],
        })
    }

    fn drop_connection(&mut self, reason: &str, now: Instant) {
        if let Some(mut socket) = self.socket.take() {
            let _ = socket.close(None);
        }
        warn!(reason, "disconnected");
        self.queued.push(InboundEvent::Disconnect(reason.to_string()));
        self.attempts_left = self.reconnect_attempts;
        self.next_attempt = Some(now + self.reconnect_delay);
    }

    fn try_reconnect(&mut self, now: Instant) {
        let Some(due) = self.next_attempt else {
            return;
        };
        if now < due || self.attempts_left == 0 {
            return;
        }
        self.attempts_left -= 1;
        match open_socket(&self.url) {
            Ok(socket) => {
                info!(url = %self.url, "reconnected");
                self.socket = Some(socket);
                self.next_attempt = None;
                self.attempts_left = self.reconnect_attempts;
                self.queued.push(InboundEvent::Connect);
            }
            Err(err) => {
                debug!(attempts_left = self.attempts_left, "reconnect failed: {err}");
                self.queued.push(InboundEvent::ConnectError(err.to_string()));
                if self.attempts_left == 0 {
                    warn!("reconnection attempts exhausted");
                    self.next_attempt = None;
                } else {
                    self.next_attempt = Some(now + self.reconnect_delay);
                }
            }
        }
    }

    fn read_frames(&mut self, now: Instant) {
        for _ in 0..MAX_FRAMES_PER_POLL {
            let Some(socket) = self.socket.as_mut() else {
                return;
            };
            match socket.read() {
                Ok(Message::Text(text)) => {
                    if let Err(err) = self.handle_frame(&text, now) {
                        debug!("ignoring frame {text:?}: {err}");
                    }
                }
                Ok(Message::Close(_)) => {
                    self.drop_connection("transport close", now);
                    return;
                }
                Ok(_) => {}
                Err(tungstenite::Error::Io(err)) if is_timeout(&err) => return,
                Err(err) => {
                    self.drop_connection(&format!("transport error: {err}"), now);
                    return;
                }
            }
        }
    }

    fn handle_frame(&mut self, text: &str, now: Instant) -> Result<(), ConsoleError> {
        match decode_engine(text)? {
            EnginePacket::Ping(body) => {
                if let Some(socket) = self.socket.as_mut() {
                    socket.send(Message::Text(encode_engine(&EnginePacket::Pong(body))))?;
                }
            }
            EnginePacket::Close => self.drop_connection("server close", now),
            EnginePacket::Message(body) => match decode_socket(&body)? {
                SocketPacket::Event { name, payload, .. } => {
                    self.queued.push(InboundEvent::Named { name, payload });
                }
                SocketPacket::Disconnect => self.drop_connection("io server disconnect", now),
                SocketPacket::ConnectError(data) => {
                    self.queued
                        .push(InboundEvent::ConnectError(connect_error_message(data.as_ref())));
                }
                SocketPacket::Connect(_) | SocketPacket::Ack { .. } => {}
            },
            EnginePacket::Open(_)
            | EnginePacket::Pong(_)
            | EnginePacket::Upgrade
            | EnginePacket::Noop => {}
        }
        Ok(())
    }
}

impl Transport for SocketIoTransport {
    fn emit(&mut self, event: &str, payload: Option<Value>) -> Result<(), ConsoleError> {
        let Some(socket) = self.socket.as_mut() else {
            return Err(ConsoleError::Transport(
                format!("not connected, dropping '{event}'").into(),
            ));
        };
        socket.send(Message::Text(encode_event(event, payload.as_ref())))?;
        Ok(())
    }

    fn poll(&mut self, now: Instant) -> Vec<InboundEvent> {
        if self.socket.is_some() {
            self.read_frames(now);
        } else {
            self.try_reconnect(now);
        }
        std::mem::take(&mut self.queued)
    }

    fn is_connected(&self) -> bool {
        self.socket.is_some()
    }
}

impl std::fmt::Debug for SocketIoTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SocketIoTransport")
            .field("url", &self.url)
            .field("connected", &self.socket.is_some())
            .finish_non_exhaustive()
    }
}

fn open_socket(url: &str) -> Result<Socket, ConsoleError> {
    let (mut socket, _response) = tungstenite::connect(url)?;
    set_read_timeout(&mut socket, Some(HANDSHAKE_TIMEOUT))?;
    handshake(&mut socket)?;
    set_read_timeout(&mut socket, Some(POLL_TIMEOUT))?;
    Ok(socket)
}

/// Waits for the engine open packet, then joins the default namespace.
fn handshake(socket: &mut Socket) -> Result<(), ConsoleError> {
    let mut opened = false;
    loop {
        let text = match socket.read()? {
            Message::Text(text) => text,
            Message::Close(_) => {
                return Err(ConsoleError::Transport(
                    "server closed during handshake".into(),
                ))
            }
            _ => continue,
        };
        match decode_engine(&text)? {
            EnginePacket::Open(_) if !opened => {
                opened = true;
                socket.send(Message::Text(encode_connect()))?;
            }
            EnginePacket::Ping(body) => {
                socket.send(Message::Text(encode_engine(&EnginePacket::Pong(body))))?;
            }
            EnginePacket::Message(body) if opened => match decode_socket(&body)? {
                SocketPacket::Connect(_) => return Ok(()),
                SocketPacket::ConnectError(data) => {
                    return Err(ConsoleError::Transport(
                        connect_error_message(data.as_ref()).into(),
                    ))
                }
                _ => {}
            },
            EnginePacket::Close => {
                return Err(ConsoleError::Transport(
                    "server closed during handshake".into(),
                ))
            }
            _ => {}
        }
    }
}

fn set_read_timeout(socket: &mut Socket, timeout: Option<Duration>) -> io::Result<()> {
    match socket.get_mut() {
        MaybeTlsStream::Plain(stream) => stream.set_read_timeout(timeout),
        MaybeTlsStream::Rustls(stream) => stream.sock.set_read_timeout(timeout),
        _ => Ok(()),
    }
}

fn is_timeout(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::net::TcpListener;
    use std::sync::mpsc;
    use std::thread;

    /// Minimal Socket.IO server: handshake, one pushed event, then echoes frames back.
    fn spawn_server(frames_tx: mpsc::Sender<String>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind test socket");
        let addr = listener.local_addr().expect("read local addr");
        thread::spawn(move || {
            let Ok((stream, _)) = listener.accept() else {
                return;
            };
            let mut ws = tungstenite::accept(stream).expect("accept websocket");
            ws.send(Message::Text(
                r#"0{"sid":"s1","upgrades":[],"pingInterval":25000,"pingTimeout":20000}"#
                    .to_string(),
            ))
            .expect("send open");
            loop {
                let Ok(message) = ws.read() else {
                    break;
                };
                let Message::Text(text) = message else {
                    continue;
                };
                if text == "40" {
                    ws.send(Message::Text(r#"40{"sid":"n1"}"#.to_string()))
                        .expect("send connect");
                    ws.send(Message::Text("2".to_string())).expect("send ping");
                    ws.send(Message::Text(
                        r#"42["csrf_token",{"token":"T1"}]"#.to_string(),
                    ))
                    .expect("send token");
                    continue;
                }
                if frames_tx.send(text).is_err() {
                    break;
                }
            }
        });
        format!("http://{addr}")
    }

    fn server_config(url: String) -> ServerConfig {
        ServerConfig {
            url: url.into(),
            forward_event: crate::config::ForwardEvent::TerminalInput,
            reconnect_attempts: 1,
            reconnect_delay: Duration::from_millis(10),
            ping_interval: None,
        }
    }

    #[test]
    fn connects_answers_pings_and_emits_events() {
        let (tx, rx) = mpsc::channel();
        let url = spawn_server(tx);
        let mut transport = SocketIoTransport::connect(&server_config(url)).expect("connect");
        assert!(transport.is_connected());

        let mut events = Vec::new();
        let deadline = Instant::now() + Duration::from_secs(5);
        while events.len() < 2 && Instant::now() < deadline {
            events.extend(transport.poll(Instant::now()));
        }
        assert_eq!(events[0], InboundEvent::Connect);
        assert_eq!(
            events[1],
            InboundEvent::Named {
                name: "csrf_token".to_string(),
                payload: Some(json!({"token": "T1"})),
            }
        );

        let pong = rx
            .recv_timeout(Duration::from_secs(5))
            .expect("pong frame");
        assert_eq!(pong, "3");

        transport
            .emit("terminal_input", Some(json!({"command": "help"})))
            .expect("emit");
        let frame = rx
            .recv_timeout(Duration::from_secs(5))
            .expect("event frame");
        assert_eq!(frame, r#"42["terminal_input",{"command":"help"}]"#);
    }

    /// Accepts one client, sends the engine open packet and waits for the namespace join.
    fn accept_and_open(listener: &TcpListener) -> Option<WebSocket<TcpStream>> {
        let (stream, _) = listener.accept().ok()?;
        let mut ws = tungstenite::accept(stream).ok()?;
        ws.send(Message::Text(
            r#"0{"sid":"s1","upgrades":[],"pingInterval":25000,"pingTimeout":20000}"#.to_string(),
        ))
        .ok()?;
        loop {
            if let Message::Text(text) = ws.read().ok()? {
                if text == "40" {
                    return Some(ws);
                }
            }
        }
    }

    /// First session is kicked by the server, the next join is refused, the third one sticks.
    fn spawn_flaky_server() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind test socket");
        let addr = listener.local_addr().expect("read local addr");
        thread::spawn(move || {
            let Some(mut ws) = accept_and_open(&listener) else {
                return;
            };
            let _ = ws.send(Message::Text(r#"40{"sid":"n1"}"#.to_string()));
            let _ = ws.send(Message::Text("41".to_string()));
            drop(ws);

            let Some(mut ws) = accept_and_open(&listener) else {
                return;
            };
            let _ = ws.send(Message::Text(r#"44{"message":"busy"}"#.to_string()));
            drop(ws);

            let Some(mut ws) = accept_and_open(&listener) else {
                return;
            };
            let _ = ws.send(Message::Text(r#"40{"sid":"n3"}"#.to_string()));
            while ws.read().is_ok() {}
        });
        format!("http://{addr}")
    }

    #[test]
    fn reconnects_after_server_disconnect() {
        let mut config = server_config(spawn_flaky_server());
        config.reconnect_attempts = 3;
        let mut transport = SocketIoTransport::connect(&config).expect("connect");

        let mut events = Vec::new();
        let deadline = Instant::now() + Duration::from_secs(5);
        while events.len() < 4 && Instant::now() < deadline {
            events.extend(transport.poll(Instant::now()));
        }
        assert_eq!(events.len(), 4, "events: {events:?}");
        assert_eq!(events[0], InboundEvent::Connect);
        assert_eq!(
            events[1],
            InboundEvent::Disconnect("io server disconnect".to_string())
        );
        assert!(
            matches!(&events[2], InboundEvent::ConnectError(reason) if reason.contains("busy")),
            "events: {events:?}"
        );
        assert_eq!(events[3], InboundEvent::Connect);
        assert!(transport.is_connected());
        assert_eq!(transport.attempts_left, 3);
        assert!(transport.next_attempt.is_none());
    }

    #[test]
    fn reconnect_gives_up_after_configured_attempts() {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
        let addr = listener.local_addr().expect("read local addr");
        drop(listener);

        let start = Instant::now();
        let mut transport = SocketIoTransport {
            url: websocket_url(&format!("http://{addr}")),
            socket: None,
            reconnect_attempts: 3,
            reconnect_delay: Duration::from_millis(1),
            attempts_left: 3,
            next_attempt: Some(start),
            queued: Vec::new(),
        };

        let mut events = Vec::new();
        for step in 0..10 {
            events.extend(transport.poll(start + Duration::from_millis(5 * step)));
        }
        assert_eq!(events.len(), 3, "events: {events:?}");
        assert!(events
            .iter()
            .all(|event| matches!(event, InboundEvent::ConnectError(_))));
        assert!(!transport.is_connected());
        assert_eq!(transport.attempts_left, 0);
        assert!(transport.next_attempt.is_none());
    }

    #[test]
    fn connect_to_closed_port_fails() {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
        let addr = listener.local_addr().expect("read local addr");
        drop(listener);
        let err = SocketIoTransport::connect(&server_config(format!("http://{addr}")))
            .expect_err("closed port must fail");
        assert!(err.to_string().contains("transport error"));
    }
}
