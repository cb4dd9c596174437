//! Tomat console binary.
//!
//! Runs the live feed pipeline against the configured robot server and
//! relays chat prompts typed on stdin. The annotated feed itself is
//! consumed by a presentation layer through the view watch cell; headless
//! runs log the display state instead.

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tomat_console::chat::ChatSession;
use tomat_console::pipeline::{ConsoleConfig, FeedPipeline};
use tomat_console::view::Display;
use tomat_core::{BuildMode, Endpoints, FeedConfig};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    info!("Tomat console v{}", env!("CARGO_PKG_VERSION"));

    // Endpoint selection happens once here and is never revisited.
    let mode = BuildMode::detect();
    let host = std::env::var("TOMAT_HOST").unwrap_or_else(|_| Endpoints::DEV_HOST.to_owned());
    let endpoints = Endpoints::for_mode(mode, &host);
    let feed = load_feed_config()?;
    feed.validate()?;
    info!("video endpoint: {}", endpoints.video_url);

    let (status_tx, mut status_rx) = mpsc::channel(8);
    let config = ConsoleConfig { feed, endpoints: endpoints.clone() };
    let (pipeline, mut view_rx) = FeedPipeline::spawn(config, status_tx);

    // Chat is a separate collaborator; the feed runs fine without it.
    let (mut chat, mut chat_replies) = match ChatSession::init(&endpoints.chat_url).await {
        Ok((session, replies)) => (Some(session), Some(replies)),
        Err(e) => {
            warn!("chat unavailable: {e:#}");
            (None, None)
        }
    };

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                break;
            }

            Some(status) = status_rx.recv() => {
                info!(
                    phase = ?status.phase,
                    fps = status.fps,
                    sent = status.frames_sent,
                    dropped = status.frames_dropped,
                    "pipeline status"
                );
                if let Some(note) = status.note {
                    info!("{note}");
                }
            }

            changed = view_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                match view_rx.borrow_and_update().display() {
                    Display::Frame(_) => debug!("annotated frame updated"),
                    Display::Blocked(reason) => warn!("camera blocked: {reason}"),
                    Display::Status(text) => info!("feed: {text}"),
                    Display::Waiting => {}
                }
            }

            line = stdin.next_line(), if stdin_open => {
                match line {
                    Ok(Some(text)) if !text.trim().is_empty() => {
                        if let Some(session) = chat.as_mut() {
                            if let Err(e) = session.send_message(text.trim()).await {
                                warn!("chat send failed: {e:#}");
                            }
                        } else {
                            warn!("chat not connected");
                        }
                    }
                    Ok(Some(_)) => {}
                    Ok(None) => stdin_open = false,
                    Err(e) => {
                        warn!("stdin: {e}");
                        stdin_open = false;
                    }
                }
            }

            reply = next_reply(&mut chat_replies) => {
                match reply {
                    Some(reply) => {
                        if let Some(session) = chat.as_mut() {
                            session.record_reply(reply.clone());
                        }
                        println!("tomat> {reply}");
                    }
                    None => chat_replies = None,
                }
            }
        }
    }

    pipeline.stop();
    if let Some(mut session) = chat.take() {
        session.dispose().await;
    }
    pipeline.join().await;
    Ok(())
}

/// Feed configuration, from the JSON file named by `TOMAT_CONFIG` when
/// set, defaults otherwise. Both camelCase and snake_case keys parse.
fn load_feed_config() -> Result<FeedConfig> {
    match std::env::var("TOMAT_CONFIG") {
        Ok(path) => {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("reading config file {path}"))?;
            let feed = serde_json::from_str(&raw)
                .with_context(|| format!("parsing config file {path}"))?;
            info!("loaded config from {path}");
            Ok(feed)
        }
        Err(_) => Ok(FeedConfig::default()),
    }
}

async fn next_reply(replies: &mut Option<mpsc::Receiver<String>>) -> Option<String> {
    match replies {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
