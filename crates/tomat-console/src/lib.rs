//! tomat-console — control surface for the Tomat robot.
//!
//! The core of the crate is the frame relay pipeline:
//!
//! ```text
//! camera ──► sample ──► JPEG encode ──► FeedChannel.send   (≤ frame budget)
//!                                       FeedChannel.recv ──► FeedView
//! ```
//!
//! One tokio task drives the whole pipeline; see [`pipeline::FeedPipeline`].
//! The chat transcript lives in [`chat::ChatSession`], an explicit context
//! object with an init/dispose pair rather than a process-wide store.

pub mod chat;
pub mod pipeline;
pub mod view;
