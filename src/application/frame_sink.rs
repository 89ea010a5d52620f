// Outbound frame port - seam between command dispatch and the transport
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Why an outbound frame could not be delivered.
///
/// Commands are not retried automatically: replaying a control of a
/// heating element without operator awareness is not safe, so every
/// failure is surfaced to the caller instead.
#[derive(Debug, Error)]
pub enum SendError {
    #[error("connection is not open")]
    NotConnected,
    #[error("send timed out after {0:?}")]
    SendTimeout(Duration),
    #[error("transport failure: {0}")]
    Transport(String),
}

/// Anything that can carry a text frame to the rig.
///
/// Implemented by the connection handle; a future acknowledgment
/// protocol would add its confirmation path behind this trait without
/// touching the dispatcher.
#[async_trait]
pub trait FrameSink: Send + Sync {
    /// Whether the underlying connection is currently open.
    fn is_open(&self) -> bool;

    /// Deliver one UTF-8 text frame.
    async fn send_frame(&self, text: String) -> Result<(), SendError>;
}
