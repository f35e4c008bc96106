//! Role-driven panel visibility from `update_ui_state` pushes.

#![allow(missing_docs)]

use serde::Deserialize;
use smol_str::SmolStr;
use tracing::debug;

/// Payload of `update_ui_state`; every field is optional because the server
/// sends partial updates (for example only a new channel frequency).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct UiStateUpdate {
    #[serde(default)]
    pub show_ui_panel: Option<bool>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub callsign: Option<String>,
    #[serde(default)]
    pub squad: Option<String>,
    #[serde(default)]
    pub channel_frequency: Option<String>,
    #[serde(default)]
    pub squad_frequencies: Option<SquadFrequencies>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SquadFrequencies {
    #[serde(default)]
    pub alpha: Option<String>,
    #[serde(default)]
    pub beta: Option<String>,
}

impl UiStateUpdate {
    /// Lenient decode: anything that is not an object becomes an empty update.
    #[must_use]
    pub fn from_value(value: &serde_json::Value) -> Self {
        match serde_json::from_value(value.clone()) {
            Ok(update) => update,
            Err(err) => {
                debug!("ignoring malformed ui state: {err}");
                Self::default()
            }
        }
    }
}

/// The visible state of every panel the console draws.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelView {
    pub session_panel: bool,
    pub info_panel: bool,
    pub shared_frequency: bool,
    pub squad_frequencies: bool,
    pub role: Option<SmolStr>,
    pub callsign: Option<String>,
    pub squad: Option<String>,
    pub channel_frequency: String,
    pub alpha_frequency: String,
    pub beta_frequency: String,
}

impl Default for PanelView {
    fn default() -> Self {
        Self {
            session_panel: false,
            info_panel: false,
            shared_frequency: true,
            squad_frequencies: false,
            role: None,
            callsign: None,
            squad: None,
            channel_frequency: "--:--".to_string(),
            alpha_frequency: "--:--".to_string(),
            beta_frequency: "--:--".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RolePresenter {
    roles: Vec<SmolStr>,
    split_role: SmolStr,
    view: PanelView,
    ready: bool,
    pending: Option<UiStateUpdate>,
}

impl RolePresenter {
    #[must_use]
    pub fn new(roles: Vec<SmolStr>, split_role: impl Into<SmolStr>) -> Self {
        Self {
            roles,
            split_role: split_role.into(),
            view: PanelView::default(),
            ready: false,
            pending: None,
        }
    }

    #[must_use]
    pub fn view(&self) -> &PanelView {
        &self.view
    }

    #[must_use]
    pub fn pending(&self) -> Option<&UiStateUpdate> {
        self.pending.as_ref()
    }

    /// Applies `update` now, or parks it until [`mark_ready`](Self::mark_ready).
    pub fn receive(&mut self, update: UiStateUpdate) {
        if self.ready {
            self.apply(&update);
        } else {
            debug!("ui not ready, holding state update");
            self.pending = Some(update);
        }
    }

    /// Signals that the view exists; applies the parked update, if any.
    pub fn mark_ready(&mut self) {
        if self.ready {
            return;
        }
        self.ready = true;
        if let Some(update) = self.pending.take() {
            self.apply(&update);
        }
    }

    fn apply(&mut self, update: &UiStateUpdate) {
        let view = &mut self.view;
        if let Some(show) = update.show_ui_panel {
            view.session_panel = show;
        }
        if let Some(callsign) = update.callsign.as_ref() {
            view.callsign = Some(callsign.clone());
        }
        if let Some(squad) = update.squad.as_ref() {
            view.squad = Some(squad.clone());
        }
        if let Some(frequency) = update.channel_frequency.as_ref() {
            view.channel_frequency.clone_from(frequency);
        }
        if let Some(frequencies) = update.squad_frequencies.as_ref() {
            if let Some(alpha) = frequencies.alpha.as_ref() {
                view.alpha_frequency.clone_from(alpha);
            }
            if let Some(beta) = frequencies.beta.as_ref() {
                view.beta_frequency.clone_from(beta);
            }
        }
        if let Some(role) = update.role.as_deref() {
            let role = SmolStr::from(role.trim().to_ascii_lowercase());
            view.info_panel = self.roles.contains(&role);
            let split = role == self.split_role;
            view.squad_frequencies = split;
            view.shared_frequency = !split;
            view.role = Some(role);
        }
    }
}
