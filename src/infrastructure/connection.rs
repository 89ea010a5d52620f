// Connection manager - socket lifecycle, receive loop, reconnect with backoff
use crate::application::decoder;
use crate::application::frame_sink::{FrameSink, SendError};
use crate::domain::channel::Channel;
use crate::domain::telemetry::TelemetryEvent;
use crate::infrastructure::backoff::{BACKOFF_BASE, BACKOFF_CAP, Backoff};
use crate::infrastructure::ws::{self, FrameReader, FrameWriter, WsFrame};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;

/// Queued outbound frames per connection.
const OUTBOUND_CAPACITY: usize = 32;

const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(5);

/// Lifecycle of one socket. Owned exclusively by the connection task;
/// observers watch transitions through the handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed,
    /// Terminal: the retry budget was exhausted.
    Failed,
}

/// Tuning for one connection.
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    /// Upper bound on how long `send` may block on transport flush.
    pub send_timeout: Duration,
    pub backoff_base: Duration,
    pub backoff_cap: Duration,
    /// Consecutive reconnect attempts before giving up; `None` retries
    /// forever.
    pub max_retries: Option<u32>,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            send_timeout: DEFAULT_SEND_TIMEOUT,
            backoff_base: BACKOFF_BASE,
            backoff_cap: BACKOFF_CAP,
            max_retries: None,
        }
    }
}

/// What the connection task publishes to its session, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    State(ConnectionState),
    /// Decoded inbound frame, stamped at decode time.
    Telemetry {
        timestamp: DateTime<Utc>,
        event: TelemetryEvent,
    },
}

struct Outbound {
    text: String,
    done: oneshot::Sender<Result<(), SendError>>,
}

/// Cheaply cloneable handle to a running connection task.
#[derive(Clone)]
pub struct ConnectionHandle {
    state_rx: watch::Receiver<ConnectionState>,
    out_tx: mpsc::Sender<Outbound>,
    cancel: CancellationToken,
    send_timeout: Duration,
}

impl ConnectionHandle {
    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    /// Watch receiver over state transitions.
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    /// Send one text frame over the open connection.
    ///
    /// Fails with `NotConnected` unless the connection is open, and
    /// with `SendTimeout` if the frame is not on the wire within the
    /// configured deadline. The deadline covers queue admission too: a
    /// stalled transport with a full outbound queue must not block
    /// callers past the timeout.
    pub async fn send(&self, text: String) -> Result<(), SendError> {
        if self.state() != ConnectionState::Open {
            return Err(SendError::NotConnected);
        }

        let (done_tx, done_rx) = oneshot::channel();
        let deliver = async {
            self.out_tx
                .send(Outbound {
                    text,
                    done: done_tx,
                })
                .await
                .map_err(|_| SendError::NotConnected)?;

            match done_rx.await {
                // The task tore the connection down before writing the frame
                Err(_) => Err(SendError::NotConnected),
                Ok(result) => result,
            }
        };

        match timeout(self.send_timeout, deliver).await {
            Err(_) => Err(SendError::SendTimeout(self.send_timeout)),
            Ok(result) => result,
        }
    }

    /// Tear the connection down: cancels a pending backoff sleep,
    /// closes the transport, and ends the task. Idempotent; no
    /// reconnect happens afterwards.
    pub fn close(&self) {
        self.cancel.cancel();
    }
}

#[async_trait]
impl FrameSink for ConnectionHandle {
    fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    async fn send_frame(&self, text: String) -> Result<(), SendError> {
        self.send(text).await
    }
}

/// Spawn the connection task for `channel` and return its handle.
/// Decoded events and state transitions arrive on `events` in wire
/// order.
pub fn open(
    channel: Channel,
    options: ConnectOptions,
    events: mpsc::Sender<ConnectionEvent>,
) -> ConnectionHandle {
    let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);
    let (out_tx, out_rx) = mpsc::channel(OUTBOUND_CAPACITY);
    let cancel = CancellationToken::new();

    let handle = ConnectionHandle {
        state_rx,
        out_tx,
        cancel: cancel.clone(),
        send_timeout: options.send_timeout,
    };

    tokio::spawn(run(channel, options, events, state_tx, out_rx, cancel));

    handle
}

enum ServeExit {
    Cancelled,
    Disconnected,
}

async fn run(
    channel: Channel,
    options: ConnectOptions,
    events: mpsc::Sender<ConnectionEvent>,
    state_tx: watch::Sender<ConnectionState>,
    mut out_rx: mpsc::Receiver<Outbound>,
    cancel: CancellationToken,
) {
    let mut backoff = Backoff::new(options.backoff_base, options.backoff_cap);
    let mut attempts: u32 = 0;

    loop {
        if publish_state(&state_tx, &events, ConnectionState::Connecting)
            .await
            .is_err()
        {
            return;
        }

        let connected = tokio::select! {
            // Observers still get a terminal transition when the handle
            // is closed mid-connect
            _ = cancel.cancelled() => {
                let _ = publish_state(&state_tx, &events, ConnectionState::Closed).await;
                return;
            }
            result = ws::connect(&channel.endpoint) => result,
        };

        match connected {
            Ok((writer, reader)) => {
                attempts = 0;
                backoff.reset();
                tracing::info!(channel = %channel.name, endpoint = %channel.endpoint, "connection open");
                if publish_state(&state_tx, &events, ConnectionState::Open)
                    .await
                    .is_err()
                {
                    return;
                }

                let exit = serve(writer, reader, &channel, &events, &mut out_rx, &cancel).await;
                let _ = publish_state(&state_tx, &events, ConnectionState::Closed).await;

                // Frames queued in the race window around the disconnect
                // must not ride over to the next connection
                while let Ok(Outbound { done, .. }) = out_rx.try_recv() {
                    let _ = done.send(Err(SendError::NotConnected));
                }

                if matches!(exit, ServeExit::Cancelled) {
                    return;
                }
            }
            Err(e) => {
                tracing::warn!(channel = %channel.name, error = %e, "connect failed");
                if publish_state(&state_tx, &events, ConnectionState::Closed)
                    .await
                    .is_err()
                {
                    return;
                }
            }
        }

        attempts += 1;
        if let Some(max) = options.max_retries {
            if attempts > max {
                tracing::error!(channel = %channel.name, attempts, "retry budget exhausted, giving up");
                let _ = publish_state(&state_tx, &events, ConnectionState::Failed).await;
                return;
            }
        }

        let delay = backoff.next_delay();
        tracing::info!(channel = %channel.name, ?delay, "reconnecting after backoff");
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = sleep(delay) => {}
        }
    }
}

/// Pump one open connection until it drops or is cancelled. Inbound
/// frames are decoded and published; a failed decode never closes the
/// connection. Outbound frames are written here so the socket has a
/// single owner.
async fn serve(
    mut writer: FrameWriter,
    mut reader: FrameReader,
    channel: &Channel,
    events: &mpsc::Sender<ConnectionEvent>,
    out_rx: &mut mpsc::Receiver<Outbound>,
    cancel: &CancellationToken,
) -> ServeExit {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                let _ = writer.close().await;
                return ServeExit::Cancelled;
            }
            frame = reader.next() => match frame {
                Some(Ok(WsFrame::Text(text))) => {
                    let timestamp = Utc::now();
                    let event = decoder::decode(&text);
                    let published = events
                        .send(ConnectionEvent::Telemetry { timestamp, event })
                        .await;
                    if published.is_err() {
                        // Session is gone; nothing left to deliver to
                        let _ = writer.close().await;
                        return ServeExit::Cancelled;
                    }
                }
                Some(Ok(WsFrame::Ping(payload))) => {
                    if let Err(e) = writer.send_pong(payload).await {
                        tracing::warn!(channel = %channel.name, error = %e, "pong failed");
                        return ServeExit::Disconnected;
                    }
                }
                Some(Ok(WsFrame::Close)) | None => {
                    tracing::info!(channel = %channel.name, "peer closed connection");
                    return ServeExit::Disconnected;
                }
                Some(Err(e)) => {
                    tracing::warn!(channel = %channel.name, error = %e, "transport error");
                    return ServeExit::Disconnected;
                }
            },
            outbound = out_rx.recv() => match outbound {
                Some(Outbound { text, done }) => {
                    let result = writer
                        .send_text(&text)
                        .await
                        .map_err(|e| SendError::Transport(e.to_string()));
                    let failed = result.is_err();
                    let _ = done.send(result);
                    if failed {
                        return ServeExit::Disconnected;
                    }
                }
                // All handles dropped
                None => {
                    let _ = writer.close().await;
                    return ServeExit::Cancelled;
                }
            },
        }
    }
}

async fn publish_state(
    state_tx: &watch::Sender<ConnectionState>,
    events: &mpsc::Sender<ConnectionEvent>,
    state: ConnectionState,
) -> Result<(), ()> {
    state_tx.send_replace(state);
    events
        .send(ConnectionEvent::State(state))
        .await
        .map_err(|_| ())
}
