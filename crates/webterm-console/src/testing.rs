//! In-memory transport for exercising sessions without a server.

#![allow(missing_docs)]

use std::time::Instant;

use serde_json::Value;

use crate::error::ConsoleError;
use crate::transport::{InboundEvent, Transport};

/// Records every emitted event and replays queued inbound events on `poll`.
#[derive(Debug, Clone)]
pub struct RecordingTransport {
    sent: Vec<(String, Option<Value>)>,
    inbound: Vec<InboundEvent>,
    connected: bool,
}

impl Default for RecordingTransport {
    fn default() -> Self {
        Self {
            sent: Vec::new(),
            inbound: Vec::new(),
            connected: true,
        }
    }
}

impl RecordingTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_inbound(&mut self, event: InboundEvent) {
        self.inbound.push(event);
    }

    /// Queues `name` with `payload` as a server push.
    pub fn push_event(&mut self, name: &str, payload: Value) {
        self.inbound.push(InboundEvent::Named {
            name: name.to_string(),
            payload: Some(payload),
        });
    }

    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
    }

    #[must_use]
    pub fn sent(&self) -> &[(String, Option<Value>)] {
        &self.sent
    }

    pub fn clear_sent(&mut self) {
        self.sent.clear();
    }
}

impl Transport for RecordingTransport {
    fn emit(&mut self, event: &str, payload: Option<Value>) -> Result<(), ConsoleError> {
        if !self.connected {
            return Err(ConsoleError::Transport(
                format!("not connected, dropping '{event}'").into(),
            ));
        }
        self.sent.push((event.to_string(), payload));
        Ok(())
    }

    fn poll(&mut self, _now: Instant) -> Vec<InboundEvent> {
        std::mem::take(&mut self.inbound)
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}
