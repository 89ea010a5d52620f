// Channel domain model - one logical feed/control pair per rig endpoint
use std::fmt;

/// The four logical feeds of the rig dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelName {
    FishCount,
    Temperature,
    Mode,
    VideoStatus,
}

impl ChannelName {
    /// Path suffix on the rig's WebSocket host. VideoStatus has no
    /// socket; it is served by the external media player.
    pub fn path_suffix(&self) -> Option<&'static str> {
        match self {
            ChannelName::FishCount => Some("/ws/fish/"),
            ChannelName::Temperature => Some("/ws/temp/"),
            ChannelName::Mode => Some("/ws/mode/"),
            ChannelName::VideoStatus => None,
        }
    }

    /// Whether samples on this channel are kept in a rolling history.
    pub fn retains_history(&self) -> bool {
        matches!(self, ChannelName::Temperature)
    }

    /// Whether the channel accepts outbound device commands.
    pub fn accepts_commands(&self) -> bool {
        matches!(self, ChannelName::Mode)
    }
}

impl fmt::Display for ChannelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChannelName::FishCount => "fish-count",
            ChannelName::Temperature => "temperature",
            ChannelName::Mode => "mode-control",
            ChannelName::VideoStatus => "video-status",
        };
        f.write_str(name)
    }
}

/// One logical real-time feed between the client and a rig endpoint.
/// Immutable after creation.
#[derive(Debug, Clone)]
pub struct Channel {
    pub name: ChannelName,
    pub endpoint: String,
    pub retains_history: bool,
}

impl Channel {
    pub fn new(name: ChannelName, endpoint: String) -> Self {
        Self {
            name,
            endpoint,
            retains_history: name.retains_history(),
        }
    }
}
