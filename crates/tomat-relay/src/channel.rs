//! Video frame relay channel.
//!
//! # Lifecycle
//!
//! ```text
//! 1. FeedChannel::open(url)                Idle → Connecting → Open
//! 2. let (sender, inbound) = channel.start_recv_loop()
//!       ├─ sender:  FeedSender for send / close
//!       └─ inbound: classified FeedMessages from the server
//! 3. sender.send(&still)  → Sent | Dropped   (best effort, no queue)
//! 4. sender.close()       Open → Closing → Closed   (exactly once)
//! ```
//!
//! A transport error marks the shared state `Failed`; a remote close marks
//! it `Closed`. Both are terminal — there is no automatic reconnect.

use std::sync::Arc;

use anyhow::Context;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_websockets::{ClientBuilder, MaybeTlsStream, Message, WebSocketStream};
use tomat_core::{ChannelState, EncodedStill, FeedMessage, SendOutcome};
use tracing::{debug, info, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;

/// Inbound messages buffered between the receive loop and the renderer.
/// Small on purpose: the renderer only ever wants the latest result.
const INBOUND_BUFFER: usize = 16;

// ── State transitions ─────────────────────────────────────────────────────────

/// Advance the shared channel state. Terminal states are never left, which
/// keeps transitions monotonic within one connection attempt.
fn transition(state: &watch::Sender<ChannelState>, to: ChannelState) {
    let current = *state.borrow();
    if current.is_terminal() || current == to {
        return;
    }
    debug!("channel state: {current} → {to}");
    state.send_replace(to);
}

// ── FrameSink ─────────────────────────────────────────────────────────────────

/// Send half of a frame relay channel. The capture scheduler drives this;
/// test doubles script outcomes through it.
#[allow(async_fn_in_trait)]
pub trait FrameSink {
    fn state(&self) -> ChannelState;

    /// Best-effort send. Returns [`SendOutcome::Dropped`] without error and
    /// without queuing when the channel is not `Open` or the write fails.
    async fn send(&mut self, frame: &EncodedStill) -> SendOutcome;

    /// Close the channel. Idempotent.
    async fn close(&mut self);
}

// ── FeedChannel ───────────────────────────────────────────────────────────────

/// A freshly opened video channel, not yet split into halves.
pub struct FeedChannel {
    stream: WsStream,
    state:  Arc<watch::Sender<ChannelState>>,
}

impl FeedChannel {
    /// Connect to the video processing endpoint.
    ///
    /// Drives `Idle → Connecting → Open`; a handshake failure leaves the
    /// state `Failed` and returns the error.
    pub async fn open(url: &str) -> anyhow::Result<Self> {
        let state = Arc::new(watch::channel(ChannelState::Idle).0);
        transition(&state, ChannelState::Connecting);

        let uri: http::Uri = url
            .parse()
            .with_context(|| format!("invalid video channel url {url}"))?;

        let (stream, _response) = match ClientBuilder::from_uri(uri).connect().await {
            Ok(ok) => ok,
            Err(e) => {
                transition(&state, ChannelState::Failed);
                return Err(e).with_context(|| format!("WebSocket connect to {url}"));
            }
        };

        transition(&state, ChannelState::Open);
        info!("Video channel open: {url}");
        Ok(Self { stream, state })
    }

    pub fn state(&self) -> ChannelState {
        *self.state.borrow()
    }

    /// Split into a send half and a stream of classified inbound messages.
    ///
    /// The receive loop runs until the server closes or the transport
    /// errors; either way it updates the shared state, so the scheduler
    /// stops producing the instant the channel leaves `Open`.
    pub fn start_recv_loop(self) -> (FeedSender, mpsc::Receiver<FeedMessage>) {
        let Self { stream, state } = self;
        let (sink, stream) = stream.split();
        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_BUFFER);
        tokio::spawn(recv_loop(stream, inbound_tx, Arc::clone(&state)));
        (FeedSender { sink, state }, inbound_rx)
    }
}

async fn recv_loop(
    mut stream: SplitStream<WsStream>,
    inbound_tx: mpsc::Sender<FeedMessage>,
    state: Arc<watch::Sender<ChannelState>>,
) {
    while let Some(item) = stream.next().await {
        match item {
            Ok(msg) => {
                // Messages arrive complete and atomic; classify and pass on.
                // Binary and control frames are not part of the contract.
                if let Some(text) = msg.as_text() {
                    if inbound_tx.send(FeedMessage::classify(text)).await.is_err() {
                        debug!("inbound consumer gone, stopping receive loop");
                        return;
                    }
                }
            }
            Err(e) => {
                warn!("video channel transport error: {e}");
                transition(&state, ChannelState::Failed);
                return;
            }
        }
    }
    // Remote close (or our own close finishing the handshake).
    info!("video channel closed by peer");
    transition(&state, ChannelState::Closed);
}

// ── FeedSender ────────────────────────────────────────────────────────────────

/// Send half of the video channel.
pub struct FeedSender {
    sink:  WsSink,
    state: Arc<watch::Sender<ChannelState>>,
}

impl FrameSink for FeedSender {
    fn state(&self) -> ChannelState {
        *self.state.borrow()
    }

    async fn send(&mut self, frame: &EncodedStill) -> SendOutcome {
        if !self.state().is_open() {
            return SendOutcome::Dropped;
        }
        match self.sink.send(Message::text(frame.data_url.clone())).await {
            Ok(()) => SendOutcome::Sent,
            Err(e) => {
                warn!("frame send failed: {e}");
                transition(&self.state, ChannelState::Failed);
                SendOutcome::Dropped
            }
        }
    }

    async fn close(&mut self) {
        match self.state() {
            ChannelState::Open | ChannelState::Connecting => {
                transition(&self.state, ChannelState::Closing);
                if let Err(e) = self.sink.close().await {
                    debug!("video channel close: {e}");
                }
                transition(&self.state, ChannelState::Closed);
                info!("video channel closed");
            }
            ChannelState::Closing => {
                transition(&self.state, ChannelState::Closed);
            }
            // Idle, Closed, Failed: nothing to do.
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states_are_sticky() {
        let state = watch::channel(ChannelState::Failed).0;
        transition(&state, ChannelState::Open);
        assert_eq!(*state.borrow(), ChannelState::Failed);

        let state = watch::channel(ChannelState::Closed).0;
        transition(&state, ChannelState::Open);
        assert_eq!(*state.borrow(), ChannelState::Closed);
    }

    #[test]
    fn non_terminal_states_advance() {
        let state = watch::channel(ChannelState::Idle).0;
        transition(&state, ChannelState::Connecting);
        transition(&state, ChannelState::Open);
        assert_eq!(*state.borrow(), ChannelState::Open);
    }
}
