//! Console session: owns the renderer, dispatcher, presenter, persisted state and transport.

#![allow(missing_docs)]

use std::time::{Duration, Instant};

use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::config::{ConsoleConfig, ForwardEvent};
use crate::dispatcher::{CommandDispatcher, CommandRegistry, Dispatch};
use crate::history::{CommandHistory, HistoryDirection};
use crate::presenter::{PanelView, RolePresenter, UiStateUpdate};
use crate::renderer::{is_clear_sentinel, OutputRenderer};
use crate::storage::{PersistedState, Storage};
use crate::transport::{InboundEvent, Transport};

pub const BANNER: &str = "\
=== SECURE TERMINAL LINK ===
Type `login <UID> <KEY>` to request access.
Type `help` for the list of available commands.
";

/// Access credentials sent as a `login` event after every connect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub uid: String,
    pub key: String,
}

/// Periodic `ping_check` / `pong_response` round trip.
#[derive(Debug, Clone)]
struct LatencyProbe {
    interval: Option<Duration>,
    next_due: Instant,
    sent_at: Option<Instant>,
    last: Option<Duration>,
}

impl LatencyProbe {
    fn new(interval: Option<Duration>, now: Instant) -> Self {
        Self {
            interval,
            next_due: now,
            sent_at: None,
            last: None,
        }
    }

    fn due(&self, now: Instant) -> bool {
        self.interval.is_some() && now >= self.next_due
    }

    fn sent(&mut self, now: Instant) {
        self.sent_at = Some(now);
        if let Some(interval) = self.interval {
            self.next_due = now + interval;
        }
    }

    fn answered(&mut self, now: Instant) {
        if let Some(sent_at) = self.sent_at.take() {
            self.last = Some(now.saturating_duration_since(sent_at));
        }
    }
}

pub struct Session<T: Transport> {
    renderer: OutputRenderer,
    dispatcher: CommandDispatcher,
    presenter: RolePresenter,
    state: PersistedState,
    transport: T,
    forward_event: ForwardEvent,
    credentials: Option<Credentials>,
    sound_enabled: bool,
    bell_pending: bool,
    latency: LatencyProbe,
    started: Instant,
    banner_shown: bool,
}

impl<T: Transport> Session<T> {
    /// Restores persisted state or renders the banner, then returns the ready session.
    pub fn start(
        config: &ConsoleConfig,
        storage: Box<dyn Storage>,
        transport: T,
        registry: CommandRegistry,
        credentials: Option<Credentials>,
    ) -> Self {
        Self::start_at(config, storage, transport, registry, credentials, Instant::now())
    }

    pub fn start_at(
        config: &ConsoleConfig,
        storage: Box<dyn Storage>,
        transport: T,
        registry: CommandRegistry,
        credentials: Option<Credentials>,
        now: Instant,
    ) -> Self {
        let state = PersistedState::new(storage);
        let restored = state.restore();
        let mut renderer =
            OutputRenderer::new(config.terminal.prompt.clone(), config.terminal.typing_delay);

        let banner_shown = match restored.output.filter(|buffer| !buffer.is_empty()) {
            Some(buffer) => {
                renderer.restore(buffer);
                if !renderer.is_prompt_open() {
                    renderer.redraw_prompt();
                }
                false
            }
            None => {
                renderer.append(BANNER, true, true);
                renderer.redraw_prompt();
                true
            }
        };

        let history = restored.history.unwrap_or_else(CommandHistory::new);
        let mut session = Self {
            renderer,
            dispatcher: CommandDispatcher::new(registry, history),
            presenter: RolePresenter::new(
                config.panel.roles.clone(),
                config.panel.split_role.clone(),
            ),
            state,
            transport,
            forward_event: config.server.forward_event,
            credentials,
            sound_enabled: restored.sound_enabled.unwrap_or(config.terminal.sound),
            bell_pending: false,
            latency: LatencyProbe::new(config.server.ping_interval, now),
            started: now,
            banner_shown,
        };
        session.flush();
        session
    }

    #[must_use]
    pub fn renderer(&self) -> &OutputRenderer {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut OutputRenderer {
        &mut self.renderer
    }

    #[must_use]
    pub fn dispatcher(&self) -> &CommandDispatcher {
        &self.dispatcher
    }

    pub fn dispatcher_mut(&mut self) -> &mut CommandDispatcher {
        &mut self.dispatcher
    }

    #[must_use]
    pub fn history(&self) -> &CommandHistory {
        self.dispatcher.history()
    }

    #[must_use]
    pub fn panels(&self) -> &PanelView {
        self.presenter.view()
    }

    #[must_use]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    #[must_use]
    pub fn banner_shown(&self) -> bool {
        self.banner_shown
    }

    #[must_use]
    pub fn sound_enabled(&self) -> bool {
        self.sound_enabled
    }

    #[must_use]
    pub fn latency(&self) -> Option<Duration> {
        self.latency.last
    }

    #[must_use]
    pub fn uptime(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.started)
    }

    /// Returns `true` once per server output received while sound is on.
    pub fn take_bell(&mut self) -> bool {
        std::mem::take(&mut self.bell_pending)
    }

    pub fn toggle_sound(&mut self) -> bool {
        self.sound_enabled = !self.sound_enabled;
        self.state.save_sound(self.sound_enabled);
        self.sound_enabled
    }

    /// Releases state updates that arrived before the first frame was drawn.
    pub fn mark_ui_ready(&mut self) {
        self.presenter.mark_ready();
    }

    /// Submits the input field.
    pub fn submit_input(&mut self) -> Dispatch {
        let raw = self.dispatcher.input().text().to_string();
        self.submit(&raw)
    }

    pub fn submit(&mut self, raw: &str) -> Dispatch {
        let dispatch = self.dispatcher.submit(raw, &mut self.renderer);
        if let Dispatch::Forward(line) = &dispatch {
            let mut payload = Map::new();
            payload.insert(
                self.forward_event.payload_key().to_string(),
                Value::String(line.clone()),
            );
            let sent = self.emit(self.forward_event.event_name(), Some(Value::Object(payload)));
            if !sent && !self.renderer.is_typing() && !self.renderer.is_prompt_open() {
                self.renderer.redraw_prompt();
            }
        }
        self.flush();
        dispatch
    }

    pub fn navigate_history(&mut self, direction: HistoryDirection) {
        self.dispatcher.navigate_history(direction);
    }

    /// One loop iteration: inbound events, timers, reveal progress, persistence.
    pub fn poll(&mut self, now: Instant) {
        for event in self.transport.poll(now) {
            self.handle_event(event, now);
        }
        if self.latency.due(now) && self.transport.is_connected() {
            self.emit("ping_check", None);
            self.latency.sent(now);
        }
        self.renderer.tick(now);
        self.flush();
    }

    pub fn handle_event(&mut self, event: InboundEvent, now: Instant) {
        match event {
            InboundEvent::Connect => {
                info!("socket connected");
                if let Some(credentials) = self.credentials.clone() {
                    let mut payload = Map::new();
                    payload.insert("uid".to_string(), Value::String(credentials.uid));
                    payload.insert("key".to_string(), Value::String(credentials.key));
                    self.emit("login", Some(Value::Object(payload)));
                }
            }
            InboundEvent::Disconnect(reason) => info!(%reason, "socket disconnected"),
            InboundEvent::ConnectError(reason) => warn!(%reason, "socket connection error"),
            InboundEvent::Named { name, payload } => {
                self.handle_named(&name, payload.as_ref(), now);
            }
        }
        self.flush();
    }

    fn handle_named(&mut self, name: &str, payload: Option<&Value>, now: Instant) {
        match name {
            "terminal_output" => {
                let Some(output) = payload
                    .and_then(|value| value.get("output"))
                    .and_then(Value::as_str)
                    .filter(|output| !output.is_empty())
                else {
                    debug!("terminal_output without output");
                    return;
                };
                if is_clear_sentinel(output) {
                    self.renderer.clear_screen();
                    return;
                }
                if self.renderer.append_at(output, false, false, now) && self.sound_enabled {
                    self.bell_pending = true;
                }
            }
            "update_ui_state" => {
                let update = payload.map(UiStateUpdate::from_value).unwrap_or_default();
                self.presenter.receive(update);
            }
            "login_failure" => {
                let message = payload
                    .and_then(|value| value.get("message"))
                    .and_then(Value::as_str)
                    .unwrap_or("Access denied.");
                self.renderer.append_at(message, true, false, now);
            }
            "pong_response" => self.latency.answered(now),
            "csrf_token" => {}
            other => debug!(event = other, "unhandled server event"),
        }
    }

    fn emit(&mut self, event: &str, payload: Option<Value>) -> bool {
        match self.transport.emit(event, payload) {
            Ok(()) => true,
            Err(err) => {
                warn!(event, "emit failed: {err}");
                false
            }
        }
    }

    fn flush(&mut self) {
        if self.renderer.take_pending_save() {
            self.state.save_output(self.renderer.buffer());
        }
        if self.dispatcher.take_history_dirty() {
            self.state.save_history(self.dispatcher.history());
        }
    }
}

impl<T: Transport + std::fmt::Debug> std::fmt::Debug for Session<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("transport", &self.transport)
            .field("sound_enabled", &self.sound_enabled)
            .field("typing", &self.renderer.is_typing())
            .finish_non_exhaustive()
    }
}
