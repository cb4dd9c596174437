//! Chat transcript as an explicit context object.
//!
//! The transcript and connection state live here, created by `init` and
//! torn down by `dispose` — no process-wide store, no ambient access.

use tokio::sync::mpsc;
use tomat_relay::{ChatChannel, ChatSender};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Bot,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatEntry {
    pub role:    Role,
    pub content: String,
}

/// One chat connection plus its sequential transcript.
pub struct ChatSession {
    sender:   Option<ChatSender>,
    entries:  Vec<ChatEntry>,
    thinking: bool,
}

impl ChatSession {
    /// Connect to the chat endpoint. Returns the session and the stream of
    /// reply texts, which the caller polls alongside its other events.
    pub async fn init(url: &str) -> anyhow::Result<(Self, mpsc::Receiver<String>)> {
        let (sender, replies) = ChatChannel::open(url).await?.start_recv_loop();
        Ok((
            Self {
                sender: Some(sender),
                entries: Vec::new(),
                thinking: false,
            },
            replies,
        ))
    }

    /// Send one prompt: append it to the transcript and mark the session
    /// as waiting for the reply.
    pub async fn send_message(&mut self, text: &str) -> anyhow::Result<()> {
        let Some(sender) = self.sender.as_mut() else {
            anyhow::bail!("chat session disposed");
        };
        self.entries.push(ChatEntry {
            role: Role::User,
            content: text.to_owned(),
        });
        self.thinking = true;
        if let Err(e) = sender.send(text).await {
            self.thinking = false;
            return Err(e);
        }
        Ok(())
    }

    /// Append a reply to the transcript; the session stops "thinking".
    pub fn record_reply(&mut self, reply: String) {
        self.thinking = false;
        self.entries.push(ChatEntry {
            role: Role::Bot,
            content: reply,
        });
    }

    /// True between sending a prompt and receiving its reply.
    pub fn is_thinking(&self) -> bool {
        self.thinking
    }

    pub fn entries(&self) -> &[ChatEntry] {
        &self.entries
    }

    /// Close the connection. Idempotent; the transcript stays readable.
    pub async fn dispose(&mut self) {
        if let Some(mut sender) = self.sender.take() {
            sender.close().await;
            debug!("chat session disposed");
        }
    }
}
