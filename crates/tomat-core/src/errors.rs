use thiserror::Error;

#[derive(Error, Debug)]
pub enum TomatError {
    #[error("Camera unavailable: {reason}")]
    CameraUnavailable { reason: String },

    #[error("Connection failed: {reason}")]
    ConnectionFailed { reason: String },

    #[error("Frame encode failed: {reason}")]
    EncodeFailed { reason: String },

    #[error("Configuration invalid: {reason}")]
    ConfigurationInvalid { reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
