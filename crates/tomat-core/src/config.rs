use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::TomatError;

// MARK: - CameraConfig

/// Configuration for the local camera device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// V4L2 device path.
    pub device: String,
    pub width:  u32,
    pub height: u32,
    /// Device-side capture rate. Independent of the outbound frame budget:
    /// the scheduler samples the latest frame at its own pace.
    pub fps: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device: "/dev/video0".to_owned(),
            width:  640,
            height: 480,
            fps:    30,
        }
    }
}

// MARK: - FeedConfig

/// Configuration for the frame relay pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Frame budget: maximum outbound frames per second.
    #[serde(alias = "targetFps")]
    pub target_fps: u32,
    /// JPEG quality, 1–100. The wire contract fixes this at 80
    /// (the original's canvas quality 0.8).
    #[serde(alias = "jpegQuality")]
    pub jpeg_quality: u8,
    pub camera: CameraConfig,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            target_fps:   15,
            jpeg_quality: 80,
            camera:       CameraConfig::default(),
        }
    }
}

impl FeedConfig {
    /// Interval between scheduler ticks.
    pub fn frame_interval(&self) -> Duration {
        Duration::from_micros(1_000_000 / self.target_fps.max(1) as u64)
    }

    pub fn validate(&self) -> Result<(), TomatError> {
        if self.target_fps == 0 || self.target_fps > 60 {
            return Err(TomatError::ConfigurationInvalid {
                reason: format!("target_fps must be 1–60, got {}", self.target_fps),
            });
        }
        if self.jpeg_quality == 0 || self.jpeg_quality > 100 {
            return Err(TomatError::ConfigurationInvalid {
                reason: format!("jpeg_quality must be 1–100, got {}", self.jpeg_quality),
            });
        }
        Ok(())
    }
}

// MARK: - BuildMode

/// Deployment target, resolved once at startup and never revisited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildMode {
    Development,
    Production,
}

impl BuildMode {
    /// Debug builds talk to the local development server, release builds to
    /// the configured same-origin host.
    pub fn detect() -> Self {
        if cfg!(debug_assertions) {
            Self::Development
        } else {
            Self::Production
        }
    }
}

// MARK: - Endpoints

/// Resolved server endpoints. The video channel and the chat channel are
/// separate WebSocket paths on the same host; `http_base` serves the
/// alternate request/response chat call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoints {
    pub video_url: String,
    pub chat_url:  String,
    pub http_base: String,
}

impl Endpoints {
    pub const VIDEO_PATH: &'static str = "/ws/process_video";
    pub const CHAT_PATH: &'static str = "/ws";
    pub const DEV_HOST: &'static str = "localhost:3000";

    /// Select endpoints for a build mode. `host` is only consulted in
    /// production; development always targets the local server.
    pub fn for_mode(mode: BuildMode, host: &str) -> Self {
        let base = match mode {
            BuildMode::Development => Self::DEV_HOST,
            BuildMode::Production => host,
        };
        Self {
            video_url: format!("ws://{base}{}", Self::VIDEO_PATH),
            chat_url:  format!("ws://{base}{}", Self::CHAT_PATH),
            http_base: format!("http://{base}"),
        }
    }
}
