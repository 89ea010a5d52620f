// Main entry point - one session per rig channel, events to the log
mod application;
mod domain;
mod infrastructure;

use crate::application::session::{SessionCore, SessionEvent};
use crate::domain::channel::{Channel, ChannelName};
use crate::domain::telemetry::TelemetryEvent;
use crate::infrastructure::config::load_rig_config;
use tokio::sync::broadcast;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    // Load configuration
    let config = load_rig_config()?;
    let options = config.connect_options();

    // The video stream never touches this process; the external player
    // consumes the playlist directly.
    tracing::info!(
        channel = %ChannelName::VideoStatus,
        url = %config.rig.video_playlist_url,
        "video stream delegated to external media player"
    );

    // One session per socket-backed channel
    let mut sessions = Vec::new();
    for name in [
        ChannelName::FishCount,
        ChannelName::Temperature,
        ChannelName::Mode,
    ] {
        let Some(endpoint) = config.endpoint(name) else {
            continue;
        };
        let session = SessionCore::new(
            Channel::new(name, endpoint),
            options.clone(),
            config.history.temperature_capacity,
        );
        spawn_log_observer(name, session.subscribe());
        sessions.push(session);
    }

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");
    for session in &sessions {
        session.dispose();
    }

    Ok(())
}

/// Logs every session event; stands in for the dashboard panels.
fn spawn_log_observer(name: ChannelName, mut rx: broadcast::Receiver<SessionEvent>) {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(SessionEvent::ConnectionChanged(state)) => {
                    tracing::info!(channel = %name, ?state, "connection state");
                }
                Ok(SessionEvent::Telemetry { event, .. }) => match event {
                    TelemetryEvent::IntegerSample { value } => {
                        tracing::info!(channel = %name, value, "reading");
                    }
                    TelemetryEvent::FloatSample { value } => {
                        tracing::info!(channel = %name, value, "reading");
                    }
                    // Malformed frames are already logged by the session
                    TelemetryEvent::Malformed { .. } => {}
                },
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(channel = %name, skipped, "log observer lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}
