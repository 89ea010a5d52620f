// WebSocket transport - thin wrapper around tokio-tungstenite
use anyhow::{Context, Result};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite;

/// Concrete stream type so the split halves don't repeat the generics.
type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Inbound frame as the connection manager cares about it. Binary and
/// pong frames are skipped at this layer.
#[derive(Debug)]
pub enum WsFrame {
    /// UTF-8 text frame.
    Text(String),
    /// Ping that must be answered with a pong carrying the same payload.
    Ping(Vec<u8>),
    /// Peer sent a close frame.
    Close,
}

/// Write half of a WebSocket connection.
#[derive(Debug)]
pub struct FrameWriter {
    sink: SplitSink<WsStream, tungstenite::Message>,
}

impl FrameWriter {
    /// Send a UTF-8 text frame.
    pub async fn send_text(&mut self, text: &str) -> Result<()> {
        self.sink
            .send(tungstenite::Message::Text(text.to_string()))
            .await
            .context("WebSocket text send failed")
    }

    /// Answer a ping.
    pub async fn send_pong(&mut self, payload: Vec<u8>) -> Result<()> {
        self.sink
            .send(tungstenite::Message::Pong(payload))
            .await
            .context("WebSocket pong send failed")
    }

    /// Flush pending writes and close the sink.
    pub async fn close(&mut self) -> Result<()> {
        self.sink.close().await.context("WebSocket close failed")
    }
}

/// Read half of a WebSocket connection.
#[derive(Debug)]
pub struct FrameReader {
    stream: SplitStream<WsStream>,
}

impl FrameReader {
    /// Receive the next frame, returning `None` when the stream ends.
    pub async fn next(&mut self) -> Option<Result<WsFrame>> {
        loop {
            match self.stream.next().await {
                Some(Ok(tungstenite::Message::Text(text))) => {
                    return Some(Ok(WsFrame::Text(text)));
                }
                Some(Ok(tungstenite::Message::Ping(payload))) => {
                    return Some(Ok(WsFrame::Ping(payload)));
                }
                Some(Ok(tungstenite::Message::Close(_))) => {
                    return Some(Ok(WsFrame::Close));
                }
                Some(Ok(_)) => {
                    // Binary, pong, raw frames - not part of this protocol
                    continue;
                }
                Some(Err(e)) => {
                    return Some(Err(anyhow::anyhow!("WebSocket read error: {e}")));
                }
                None => return None,
            }
        }
    }
}

/// Connect to a rig endpoint and split into writer/reader halves for
/// independent use in `tokio::select!` loops. TLS is negotiated for
/// `wss://` URLs.
pub async fn connect(url: &str) -> Result<(FrameWriter, FrameReader)> {
    let (ws_stream, _response) = tokio_tungstenite::connect_async(url)
        .await
        .with_context(|| format!("WebSocket connect to {url} failed"))?;

    let (sink, stream) = ws_stream.split();

    Ok((FrameWriter { sink }, FrameReader { stream }))
}
