//! Chat collaborator channel.
//!
//! The chat subsystem is a separate concern from the frame relay; this
//! module only consumes its interface contract: one text prompt per
//! request/response cycle over `/ws`, or the alternate `POST /chat` call
//! whose JSON bodies are [`ChatRequest`] / [`ChatResponse`].

use anyhow::Context;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_websockets::{ClientBuilder, MaybeTlsStream, Message, WebSocketStream};
use tracing::{debug, info, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

// ── Request/response wire types (alternate HTTP contract) ─────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub prompt: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
}

// ── ChatChannel ───────────────────────────────────────────────────────────────

/// Persistent chat connection. Prompts go out as text, replies come back
/// as text, strictly one reply per prompt.
pub struct ChatChannel {
    stream: WsStream,
}

impl ChatChannel {
    pub async fn open(url: &str) -> anyhow::Result<Self> {
        let uri: http::Uri = url
            .parse()
            .with_context(|| format!("invalid chat url {url}"))?;
        let (stream, _response) = ClientBuilder::from_uri(uri)
            .connect()
            .await
            .with_context(|| format!("WebSocket connect to {url}"))?;
        info!("Chat channel open: {url}");
        Ok(Self { stream })
    }

    /// Split into a send half and a stream of reply texts. The receive
    /// loop ends when the server closes the connection.
    pub fn start_recv_loop(self) -> (ChatSender, mpsc::Receiver<String>) {
        let (sink, stream) = self.stream.split();
        let (reply_tx, reply_rx) = mpsc::channel(8);
        tokio::spawn(recv_loop(stream, reply_tx));
        (ChatSender { sink }, reply_rx)
    }
}

async fn recv_loop(mut stream: SplitStream<WsStream>, reply_tx: mpsc::Sender<String>) {
    while let Some(item) = stream.next().await {
        match item {
            Ok(msg) => {
                if let Some(text) = msg.as_text() {
                    if reply_tx.send(text.to_owned()).await.is_err() {
                        debug!("chat consumer gone, stopping receive loop");
                        return;
                    }
                }
            }
            Err(e) => {
                warn!("chat transport error: {e}");
                return;
            }
        }
    }
    info!("chat channel closed by peer");
}

// ── ChatSender ────────────────────────────────────────────────────────────────

/// Send half of the chat channel.
pub struct ChatSender {
    sink: SplitSink<WsStream, Message>,
}

impl ChatSender {
    pub async fn send(&mut self, prompt: &str) -> anyhow::Result<()> {
        self.sink
            .send(Message::text(prompt.to_owned()))
            .await
            .context("sending chat prompt")
    }

    pub async fn close(&mut self) {
        if let Err(e) = self.sink.close().await {
            debug!("chat close: {e}");
        }
    }
}
