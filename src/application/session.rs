// Session core - one resilient telemetry/control session per channel
use crate::application::dispatcher::CommandDispatcher;
use crate::domain::channel::{Channel, ChannelName};
use crate::domain::telemetry::{HistoryBuffer, Sample, TelemetryEvent};
use crate::infrastructure::connection::{
    self, ConnectOptions, ConnectionEvent, ConnectionHandle, ConnectionState,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::{Mutex, broadcast, mpsc};

/// Broadcast capacity for subscribers; a lagging subscriber observes
/// `Lagged` rather than ever blocking the receive loop.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Queue between the connection task and the relay.
const RELAY_QUEUE_CAPACITY: usize = 64;

/// What subscribers observe, in decode order.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    ConnectionChanged(ConnectionState),
    Telemetry {
        timestamp: DateTime<Utc>,
        event: TelemetryEvent,
    },
}

/// One logical channel's session: a connection manager plus, depending
/// on the channel, a rolling history (temperature) and a command
/// dispatcher (mode control). Subscribers get events fanned out in the
/// order frames arrived on the wire.
pub struct SessionCore {
    channel: Channel,
    handle: ConnectionHandle,
    history: Option<Arc<Mutex<HistoryBuffer>>>,
    dispatcher: Option<CommandDispatcher>,
    events_tx: broadcast::Sender<SessionEvent>,
}

impl SessionCore {
    /// Open the channel's connection and start relaying events.
    /// `history_capacity` only applies when the channel retains history.
    pub fn new(channel: Channel, options: ConnectOptions, history_capacity: usize) -> Self {
        let (relay_tx, relay_rx) = mpsc::channel(RELAY_QUEUE_CAPACITY);
        let handle = connection::open(channel.clone(), options, relay_tx);

        let history = channel
            .retains_history
            .then(|| Arc::new(Mutex::new(HistoryBuffer::new(history_capacity))));

        let dispatcher = channel
            .name
            .accepts_commands()
            .then(|| CommandDispatcher::new(Arc::new(handle.clone())));

        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        tokio::spawn(relay(
            channel.name,
            relay_rx,
            history.clone(),
            events_tx.clone(),
        ));

        Self {
            channel,
            handle,
            history,
            dispatcher,
            events_tx,
        }
    }

    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    /// Register an observer. Dropping the receiver unsubscribes.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events_tx.subscribe()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.handle.state()
    }

    /// Copy of the retained history, oldest first. Empty for channels
    /// without history.
    pub async fn history_snapshot(&self) -> Vec<Sample> {
        match &self.history {
            Some(history) => history.lock().await.snapshot(),
            None => Vec::new(),
        }
    }

    /// The command dispatcher, present only on channels that accept
    /// device commands.
    pub fn dispatcher(&self) -> Option<&CommandDispatcher> {
        self.dispatcher.as_ref()
    }

    /// Tear the session down: cancels any pending reconnect, closes the
    /// transport, and stops event delivery. Idempotent.
    pub fn dispose(&self) {
        self.handle.close();
    }
}

/// Forwards connection events to subscribers, appending numeric samples
/// to the history on the way. Malformed frames are logged and go no
/// further.
async fn relay(
    name: ChannelName,
    mut rx: mpsc::Receiver<ConnectionEvent>,
    history: Option<Arc<Mutex<HistoryBuffer>>>,
    events: broadcast::Sender<SessionEvent>,
) {
    while let Some(event) = rx.recv().await {
        match event {
            ConnectionEvent::State(state) => {
                tracing::debug!(channel = %name, ?state, "connection state changed");
                let _ = events.send(SessionEvent::ConnectionChanged(state));
            }
            ConnectionEvent::Telemetry { timestamp, event } => {
                if let TelemetryEvent::Malformed { raw } = &event {
                    tracing::warn!(channel = %name, raw = %raw, "malformed frame");
                    continue;
                }

                if let (Some(history), Some(value)) = (&history, event.numeric_value()) {
                    history.lock().await.append(Sample::new(timestamp, value));
                }

                let _ = events.send(SessionEvent::Telemetry { timestamp, event });
            }
        }
    }
}
