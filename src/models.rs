use crate::firewall::Rule;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InterfaceKind {
    Wireless,
    Wired,
}

impl InterfaceKind {
    pub fn label(self) -> &'static str {
        match self {
            InterfaceKind::Wireless => "wireless",
            InterfaceKind::Wired => "wired",
        }
    }
}

/// Interfaces the user picked plus the UPnP checkbox.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Selection {
    pub uplink: Option<String>,
    pub downlink: Option<String>,
    pub upnp: bool,
}

impl Selection {
    pub fn both(&self) -> Option<(&str, &str)> {
        match (self.uplink.as_deref(), self.downlink.as_deref()) {
            (Some(up), Some(down)) if !up.is_empty() && !down.is_empty() => Some((up, down)),
            _ => None,
        }
    }
}

/// What Start put in place, kept so Stop can undo exactly that.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActiveShare {
    pub uplink: String,
    pub downlink: String,
    pub upnp: bool,
    pub rules: Vec<Rule>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum SharingState {
    #[default]
    Idle,
    Sharing(ActiveShare),
}

impl SharingState {
    pub fn is_sharing(&self) -> bool {
        matches!(self, SharingState::Sharing(_))
    }
}

/// Per-window session handed to every action handler.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Session {
    pub selection: Selection,
    pub state: SharingState,
    pub status: String,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            selection: Selection::default(),
            state: SharingState::Idle,
            status: "Status: Idle".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StepOutcome {
    pub step: String,
    pub error: Option<String>,
}

impl StepOutcome {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Outcome of every step an action attempted, in order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ActionReport {
    pub steps: Vec<StepOutcome>,
}

impl ActionReport {
    pub fn record<E: std::fmt::Display>(&mut self, step: impl Into<String>, result: Result<(), E>) {
        let step = step.into();
        let error = result.err().map(|err| err.to_string());
        self.steps.push(StepOutcome { step, error });
    }

    pub fn failures(&self) -> impl Iterator<Item = &StepOutcome> {
        self.steps.iter().filter(|s| !s.is_ok())
    }

    pub fn failure_count(&self) -> usize {
        self.failures().count()
    }

    /// Appends a failure count to `message` when anything went wrong.
    pub fn annotate(&self, message: &str) -> String {
        match self.failure_count() {
            0 => message.to_string(),
            n => {
                let trimmed = message.trim_end_matches('.');
                format!("{trimmed} ({n} step(s) failed).")
            }
        }
    }
}
