//! Outbound interceptors and inbound observers wrapped around a [`Transport`].

#![allow(missing_docs)]

use std::sync::{Arc, Mutex};
use std::time::Instant;

use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::error::ConsoleError;
use crate::transport::{InboundEvent, Transport};

/// Rewrites an outgoing payload before it reaches the wire.
pub trait OutboundInterceptor {
    fn intercept(&self, event: &str, payload: Option<Value>) -> Option<Value>;
}

/// Sees every inbound event before the session does.
pub trait InboundObserver {
    fn observe(&self, event: &InboundEvent);
}

/// Last CSRF token received from the server, shared by its reader and writer.
#[derive(Debug, Clone, Default)]
pub struct CsrfToken {
    inner: Arc<Mutex<Option<String>>>,
}

impl CsrfToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self) -> Option<String> {
        self.inner
            .lock()
            .map(|token| token.clone())
            .unwrap_or_default()
    }

    pub fn set(&self, token: String) {
        if let Ok(mut slot) = self.inner.lock() {
            *slot = Some(token);
        }
    }
}

/// Adds a `csrf` field to object payloads and synthesizes one when the payload is absent.
/// Non-object payloads pass through untouched.
#[derive(Debug, Clone)]
pub struct CsrfInterceptor {
    token: CsrfToken,
}

impl CsrfInterceptor {
    #[must_use]
    pub fn new(token: CsrfToken) -> Self {
        Self { token }
    }
}

impl OutboundInterceptor for CsrfInterceptor {
    fn intercept(&self, event: &str, payload: Option<Value>) -> Option<Value> {
        let Some(token) = self.token.get() else {
            warn!(event, "csrf token not received yet, sending without it");
            return payload;
        };
        match payload {
            None => Some(json!({ "csrf": token })),
            Some(Value::Object(mut map)) => {
                map.insert("csrf".to_string(), Value::String(token));
                Some(Value::Object(map))
            }
            other => other,
        }
    }
}

/// Captures `csrf_token { token }` pushes.
#[derive(Debug, Clone)]
pub struct CsrfObserver {
    token: CsrfToken,
}

impl CsrfObserver {
    #[must_use]
    pub fn new(token: CsrfToken) -> Self {
        Self { token }
    }
}

impl InboundObserver for CsrfObserver {
    fn observe(&self, event: &InboundEvent) {
        let InboundEvent::Named { name, payload } = event else {
            return;
        };
        if name != "csrf_token" {
            return;
        }
        match payload
            .as_ref()
            .and_then(|value| value.get("token"))
            .and_then(Value::as_str)
        {
            Some(token) => {
                debug!("csrf token received");
                self.token.set(token.to_string());
            }
            None => warn!("csrf_token event without token"),
        }
    }
}

/// Logs every inbound event.
#[derive(Debug, Clone, Copy, Default)]
pub struct EventLogger;

impl InboundObserver for EventLogger {
    fn observe(&self, event: &InboundEvent) {
        match event {
            InboundEvent::Named { name, payload } => {
                debug!(event = %name, payload = ?payload, "socket event");
            }
            other => debug!(event = other.name(), detail = ?other, "socket lifecycle"),
        }
    }
}

/// Transport decorator: interceptors run in order on `emit`, observers on `poll`.
pub struct InterceptedTransport<T> {
    inner: T,
    outbound: Vec<Box<dyn OutboundInterceptor>>,
    inbound: Vec<Box<dyn InboundObserver>>,
}

impl<T: Transport> InterceptedTransport<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            outbound: Vec::new(),
            inbound: Vec::new(),
        }
    }

    /// Standard stack: CSRF capture and injection sharing one token, plus event logging.
    pub fn with_csrf(inner: T, token: CsrfToken) -> Self {
        Self::new(inner)
            .intercept(CsrfInterceptor::new(token.clone()))
            .observe(EventLogger)
            .observe(CsrfObserver::new(token))
    }

    #[must_use]
    pub fn intercept(mut self, interceptor: impl OutboundInterceptor + 'static) -> Self {
        self.outbound.push(Box::new(interceptor));
        self
    }

    #[must_use]
    pub fn observe(mut self, observer: impl InboundObserver + 'static) -> Self {
        self.inbound.push(Box::new(observer));
        self
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }
}

impl<T: Transport> Transport for InterceptedTransport<T> {
    fn emit(&mut self, event: &str, payload: Option<Value>) -> Result<(), ConsoleError> {
        let payload = self
            .outbound
            .iter()
            .fold(payload, |payload, interceptor| interceptor.intercept(event, payload));
        self.inner.emit(event, payload)
    }

    fn poll(&mut self, now: Instant) -> Vec<InboundEvent> {
        let events = self.inner.poll(now);
        for event in &events {
            for observer in &self.inbound {
                observer.observe(event);
            }
        }
        events
    }

    fn is_connected(&self) -> bool {
        self.inner.is_connected()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingTransport;

    fn token_event(token: &str) -> InboundEvent {
        InboundEvent::Named {
            name: "csrf_token".to_string(),
            payload: Some(json!({ "token": token })),
        }
    }

    #[test]
    fn missing_payload_gets_synthesized_token() {
        let token = CsrfToken::new();
        let mut recording = RecordingTransport::new();
        recording.push_inbound(token_event("T1"));
        let mut transport = InterceptedTransport::with_csrf(recording, token);

        transport.poll(Instant::now());
        transport.emit("ping_check", None).expect("emit");
        assert_eq!(
            transport.inner().sent(),
            [("ping_check".to_string(), Some(json!({ "csrf": "T1" })))]
        );
    }

    #[test]
    fn object_payloads_gain_csrf_and_others_pass_through() {
        let token = CsrfToken::new();
        token.set("T2".to_string());
        let interceptor = CsrfInterceptor::new(token);
        assert_eq!(
            interceptor.intercept("login", Some(json!({ "uid": "1042", "key": "k" }))),
            Some(json!({ "uid": "1042", "key": "k", "csrf": "T2" }))
        );
        assert_eq!(
            interceptor.intercept("raw", Some(json!("text"))),
            Some(json!("text"))
        );
        assert_eq!(
            interceptor.intercept("list", Some(json!([1, 2]))),
            Some(json!([1, 2]))
        );
    }

    #[test]
    fn without_token_events_are_sent_unchanged() {
        let mut transport = InterceptedTransport::with_csrf(RecordingTransport::new(), CsrfToken::new());
        transport
            .emit("terminal_input", Some(json!({ "command": "help" })))
            .expect("emit");
        transport.emit("ping_check", None).expect("emit");
        assert_eq!(
            transport.inner().sent(),
            [
                ("terminal_input".to_string(), Some(json!({ "command": "help" }))),
                ("ping_check".to_string(), None),
            ]
        );
    }

    #[test]
    fn latest_token_wins() {
        let token = CsrfToken::new();
        let observer = CsrfObserver::new(token.clone());
        observer.observe(&token_event("A"));
        observer.observe(&token_event("B"));
        observer.observe(&InboundEvent::Named {
            name: "csrf_token".to_string(),
            payload: Some(json!({})),
        });
        assert_eq!(token.get().as_deref(), Some("B"));
    }
}
