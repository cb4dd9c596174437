pub mod config;
pub mod errors;
pub mod types;

pub use config::{BuildMode, CameraConfig, Endpoints, FeedConfig};
pub use errors::TomatError;
pub use types::*;
