//! tomat-relay — client-side duplex channels to the robot server.
//!
//! # Architecture
//!
//! ```text
//! Tomat console                         Robot server
//! ─────────────────────────────         ──────────────────────────
//! FeedChannel ── ws /ws/process_video ► detector, annotated frames
//! ChatChannel ── ws /ws ─────────────►  assistant, text replies
//! ```
//!
//! Both channels carry plain text messages. The video channel sends one
//! JPEG data URL per message and receives either an annotated data URL or
//! a human-readable error string, distinguished by a prefix sniff — see
//! [`tomat_core::FeedMessage::classify`].
//!
//! Neither channel reconnects on its own: once `Closed` or `Failed`, the
//! lifecycle controller must open a fresh channel explicitly.

pub mod channel;
pub mod chat;

pub use channel::{FeedChannel, FeedSender, FrameSink};
pub use chat::{ChatChannel, ChatRequest, ChatResponse, ChatSender};
