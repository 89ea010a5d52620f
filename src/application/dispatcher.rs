// Command dispatcher - encodes control intents, mirrors commanded state
use crate::application::frame_sink::{FrameSink, SendError};
use crate::domain::device::{ControlKind, DeviceControl};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Encodes device commands onto the mode channel and keeps the
/// optimistic local mirror of what the devices were told to do.
pub struct CommandDispatcher {
    sink: Arc<dyn FrameSink>,
    controls: Mutex<DeviceControl>,
}

impl CommandDispatcher {
    pub fn new(sink: Arc<dyn FrameSink>) -> Self {
        Self {
            sink,
            controls: Mutex::new(DeviceControl::new()),
        }
    }

    /// Issue one device command.
    ///
    /// Rejected with `NotConnected` unless the connection is open. The
    /// mirror is updated only after the frame was sent; on failure the
    /// state is left unchanged and the error goes back to the caller
    /// (no automatic retry, see `SendError`).
    ///
    /// Issues are serialized: the mirror lock is held across the send
    /// so concurrent callers cannot record mirror updates in a
    /// different order than the frames went out on the wire.
    pub async fn issue(&self, kind: ControlKind, desired_on: bool) -> Result<(), SendError> {
        if !self.sink.is_open() {
            return Err(SendError::NotConnected);
        }

        let mut controls = self.controls.lock().await;

        let token = kind.command_token(desired_on);
        let frame = serde_json::json!({ "message": token }).to_string();

        self.sink.send_frame(frame).await?;

        controls.record(kind, desired_on);
        tracing::debug!(command = %token, "device command sent");
        Ok(())
    }

    /// Copy of the commanded device state.
    pub async fn commanded_state(&self) -> DeviceControl {
        *self.controls.lock().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[derive(Default)]
    struct RecordingSink {
        open: AtomicBool,
        fail_sends: AtomicBool,
        frames: std::sync::Mutex<Vec<String>>,
    }

    impl RecordingSink {
        fn open() -> Self {
            let sink = Self::default();
            sink.open.store(true, Ordering::SeqCst);
            sink
        }

        fn sent(&self) -> Vec<String> {
            self.frames.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl FrameSink for RecordingSink {
        fn is_open(&self) -> bool {
            self.open.load(Ordering::SeqCst)
        }

        async fn send_frame(&self, text: String) -> Result<(), SendError> {
            if self.fail_sends.load(Ordering::SeqCst) {
                return Err(SendError::Transport("boom".to_string()));
            }
            self.frames.lock().unwrap().push(text);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_issue_sends_frames_in_order_and_updates_mirror() {
        let sink = Arc::new(RecordingSink::open());
        let dispatcher = CommandDispatcher::new(sink.clone());

        dispatcher.issue(ControlKind::Food, true).await.unwrap();
        assert!(
            dispatcher
                .commanded_state()
                .await
                .commanded_state(ControlKind::Food)
        );

        dispatcher.issue(ControlKind::Food, false).await.unwrap();
        assert!(
            !dispatcher
                .commanded_state()
                .await
                .commanded_state(ControlKind::Food)
        );

        assert_eq!(
            sink.sent(),
            vec![
                r#"{"message":"FOOD_ON"}"#.to_string(),
                r#"{"message":"FOOD_OFF"}"#.to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_issue_rejected_when_not_open() {
        let sink = Arc::new(RecordingSink::default());
        let dispatcher = CommandDispatcher::new(sink.clone());

        let result = dispatcher.issue(ControlKind::Led, true).await;
        assert!(matches!(result, Err(SendError::NotConnected)));
        assert!(sink.sent().is_empty());
        assert!(
            !dispatcher
                .commanded_state()
                .await
                .commanded_state(ControlKind::Led)
        );
    }

    /// Sink whose sends park on a gate until the test releases them.
    struct GatedSink {
        frames: std::sync::Mutex<Vec<String>>,
        gate: tokio::sync::Semaphore,
    }

    impl GatedSink {
        fn new() -> Self {
            Self {
                frames: std::sync::Mutex::new(Vec::new()),
                gate: tokio::sync::Semaphore::new(0),
            }
        }
    }

    #[async_trait]
    impl FrameSink for GatedSink {
        fn is_open(&self) -> bool {
            true
        }

        async fn send_frame(&self, text: String) -> Result<(), SendError> {
            self.frames.lock().unwrap().push(text);
            let permit = self
                .gate
                .acquire()
                .await
                .map_err(|_| SendError::NotConnected)?;
            permit.forget();
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_concurrent_issues_keep_mirror_in_wire_order() {
        let sink = Arc::new(GatedSink::new());
        let dispatcher = Arc::new(CommandDispatcher::new(sink.clone()));

        let first = {
            let dispatcher = dispatcher.clone();
            tokio::spawn(async move { dispatcher.issue(ControlKind::Led, true).await })
        };
        tokio::task::yield_now().await;
        let second = {
            let dispatcher = dispatcher.clone();
            tokio::spawn(async move { dispatcher.issue(ControlKind::Led, false).await })
        };
        tokio::task::yield_now().await;

        // The second issue waits its turn; only one frame is in flight
        assert_eq!(
            sink.frames.lock().unwrap().clone(),
            vec![r#"{"message":"LED_ON"}"#.to_string()]
        );

        sink.gate.add_permits(2);
        first.await.unwrap().unwrap();
        second.await.unwrap().unwrap();

        assert_eq!(
            sink.frames.lock().unwrap().clone(),
            vec![
                r#"{"message":"LED_ON"}"#.to_string(),
                r#"{"message":"LED_OFF"}"#.to_string(),
            ]
        );
        // The mirror agrees with the last frame on the wire
        assert!(
            !dispatcher
                .commanded_state()
                .await
                .commanded_state(ControlKind::Led)
        );
    }

    #[tokio::test]
    async fn test_failed_send_leaves_mirror_untouched() {
        let sink = Arc::new(RecordingSink::open());
        sink.fail_sends.store(true, Ordering::SeqCst);
        let dispatcher = CommandDispatcher::new(sink.clone());

        let result = dispatcher.issue(ControlKind::Hot, true).await;
        assert!(matches!(result, Err(SendError::Transport(_))));
        assert!(
            !dispatcher
                .commanded_state()
                .await
                .commanded_state(ControlKind::Hot)
        );
    }
}
