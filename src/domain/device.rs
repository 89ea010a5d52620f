// Device control domain model - optimistic mirror of commanded state
use std::fmt;

/// The three switchable devices on the rig.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlKind {
    Led,
    Food,
    Hot,
}

impl ControlKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ControlKind::Led => "LED",
            ControlKind::Food => "FOOD",
            ControlKind::Hot => "HOT",
        }
    }

    /// Discrete command token as the firmware expects it, e.g. `LED_ON`.
    pub fn command_token(&self, on: bool) -> String {
        format!("{}_{}", self.as_str(), if on { "ON" } else { "OFF" })
    }
}

impl fmt::Display for ControlKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Commanded state of every device, as the client believes it.
///
/// The rig protocol carries no acknowledgments, so this mirror is
/// mutated only when a locally issued command was sent successfully
/// and is the sole source of truth for the UI. All devices start off.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceControl {
    led: bool,
    food: bool,
    hot: bool,
}

impl DeviceControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commanded_state(&self, kind: ControlKind) -> bool {
        match kind {
            ControlKind::Led => self.led,
            ControlKind::Food => self.food,
            ControlKind::Hot => self.hot,
        }
    }

    /// Record a successfully sent command.
    pub fn record(&mut self, kind: ControlKind, on: bool) {
        match kind {
            ControlKind::Led => self.led = on,
            ControlKind::Food => self.food = on,
            ControlKind::Hot => self.hot = on,
        }
    }
}
