// Rig configuration loading
use crate::domain::channel::ChannelName;
use crate::infrastructure::connection::ConnectOptions;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct RigConfig {
    pub rig: RigSettings,
    #[serde(default)]
    pub connection: ConnectionSettings,
    #[serde(default)]
    pub history: HistorySettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RigSettings {
    pub base_url: String,
    pub video_playlist_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ConnectionSettings {
    #[serde(default = "default_send_timeout_secs")]
    pub send_timeout_secs: u64,
    #[serde(default = "default_backoff_base_secs")]
    pub backoff_base_secs: u64,
    #[serde(default = "default_backoff_cap_secs")]
    pub backoff_cap_secs: u64,
    /// Absent means reconnect forever.
    #[serde(default)]
    pub max_retries: Option<u32>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HistorySettings {
    #[serde(default = "default_temperature_capacity")]
    pub temperature_capacity: usize,
}

fn default_send_timeout_secs() -> u64 {
    5
}

fn default_backoff_base_secs() -> u64 {
    1
}

fn default_backoff_cap_secs() -> u64 {
    30
}

fn default_temperature_capacity() -> usize {
    60
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            send_timeout_secs: default_send_timeout_secs(),
            backoff_base_secs: default_backoff_base_secs(),
            backoff_cap_secs: default_backoff_cap_secs(),
            max_retries: None,
        }
    }
}

impl Default for HistorySettings {
    fn default() -> Self {
        Self {
            temperature_capacity: default_temperature_capacity(),
        }
    }
}

impl RigConfig {
    /// Full WebSocket URI for a channel, `None` for channels without a
    /// socket (video).
    pub fn endpoint(&self, name: ChannelName) -> Option<String> {
        let suffix = name.path_suffix()?;
        Some(format!(
            "{}{}",
            self.rig.base_url.trim_end_matches('/'),
            suffix
        ))
    }

    pub fn connect_options(&self) -> ConnectOptions {
        ConnectOptions {
            send_timeout: Duration::from_secs(self.connection.send_timeout_secs),
            backoff_base: Duration::from_secs(self.connection.backoff_base_secs),
            backoff_cap: Duration::from_secs(self.connection.backoff_cap_secs),
            max_retries: self.connection.max_retries,
        }
    }
}

pub fn load_rig_config() -> anyhow::Result<RigConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("config/rig"))
        .build()?;

    Ok(settings.try_deserialize()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml: &str) -> RigConfig {
        config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_endpoints_join_base_url() {
        let cfg = parse(
            r#"
            [rig]
            base_url = "wss://a1wss.iside.space/"
            video_playlist_url = "https://a1hls.iside.space/test.m3u8"
            "#,
        );

        assert_eq!(
            cfg.endpoint(ChannelName::FishCount).unwrap(),
            "wss://a1wss.iside.space/ws/fish/"
        );
        assert_eq!(
            cfg.endpoint(ChannelName::Temperature).unwrap(),
            "wss://a1wss.iside.space/ws/temp/"
        );
        assert_eq!(
            cfg.endpoint(ChannelName::Mode).unwrap(),
            "wss://a1wss.iside.space/ws/mode/"
        );
        assert!(cfg.endpoint(ChannelName::VideoStatus).is_none());
    }

    #[test]
    fn test_defaults_apply_when_sections_are_omitted() {
        let cfg = parse(
            r#"
            [rig]
            base_url = "wss://rig.example"
            video_playlist_url = "https://rig.example/live.m3u8"
            "#,
        );

        let options = cfg.connect_options();
        assert_eq!(options.send_timeout, Duration::from_secs(5));
        assert_eq!(options.backoff_base, Duration::from_secs(1));
        assert_eq!(options.backoff_cap, Duration::from_secs(30));
        assert_eq!(options.max_retries, None);
        assert_eq!(cfg.history.temperature_capacity, 60);
    }

    #[test]
    fn test_explicit_tuning_overrides_defaults() {
        let cfg = parse(
            r#"
            [rig]
            base_url = "wss://rig.example"
            video_playlist_url = "https://rig.example/live.m3u8"

            [connection]
            send_timeout_secs = 2
            backoff_base_secs = 3
            backoff_cap_secs = 10
            max_retries = 4

            [history]
            temperature_capacity = 120
            "#,
        );

        let options = cfg.connect_options();
        assert_eq!(options.send_timeout, Duration::from_secs(2));
        assert_eq!(options.backoff_base, Duration::from_secs(3));
        assert_eq!(options.backoff_cap, Duration::from_secs(10));
        assert_eq!(options.max_retries, Some(4));
        assert_eq!(cfg.history.temperature_capacity, 120);
    }
}
