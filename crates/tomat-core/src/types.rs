// MARK: - PixelFormat

/// Pixel layout of a captured frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// 3 bytes per pixel: Red, Green, Blue.
    Rgb,
    /// 1 byte per pixel, luminance only.
    Gray,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Rgb => 3,
            Self::Gray => 1,
        }
    }
}

// MARK: - RawFrame

/// One captured video image. Transient: the capture layer keeps only the
/// latest frame, overwriting it as new ones arrive.
#[derive(Debug, Clone)]
pub struct RawFrame {
    /// Raw pixel data, tightly packed rows.
    pub data:   Vec<u8>,
    pub width:  u32,
    pub height: u32,
    pub format: PixelFormat,
    /// Presentation timestamp in milliseconds.
    pub pts_ms: u64,
}

impl RawFrame {
    /// Expected byte length for the declared dimensions and format.
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * self.format.bytes_per_pixel()
    }
}

// MARK: - EncodedStill

/// A compressed, transmittable frame: a JPEG serialized into a
/// `data:image/jpeg;base64,…` data URL. Not retained after send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedStill {
    pub data_url: String,
    pub width:    u32,
    pub height:   u32,
}

// MARK: - ChannelState

/// Status of the duplex video channel. Transitions are monotonic within a
/// single connection attempt; `Closed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Idle,
    Connecting,
    Open,
    Closing,
    Closed,
    Failed,
}

impl ChannelState {
    pub fn is_open(self) -> bool {
        matches!(self, Self::Open)
    }

    /// True once the channel can never carry traffic again.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Closed | Self::Failed)
    }
}

impl std::fmt::Display for ChannelState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closing => "closing",
            Self::Closed => "closed",
            Self::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

// MARK: - SendOutcome

/// Result of a best-effort frame send. There is no queue: a frame that
/// cannot be sent immediately is discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Sent,
    Dropped,
}

// MARK: - FeedMessage

/// Prefix that marks an inbound message as an image payload. The remote
/// service sends `data:image/jpeg;…` but the sniff accepts any image
/// subtype so the contract stays unambiguous.
pub const IMAGE_MARKER: &str = "data:image/";

/// A message received on the video channel, classified by content sniff:
/// an image-marker prefix means an annotated frame, anything else is a
/// human-readable status or error string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedMessage {
    /// Annotated frame as a data URL.
    Frame(String),
    /// Status or error text from the remote service.
    Status(String),
}

impl FeedMessage {
    /// Classify an inbound text message by its payload prefix.
    pub fn classify(text: impl Into<String>) -> Self {
        let text = text.into();
        if text.starts_with(IMAGE_MARKER) {
            Self::Frame(text)
        } else {
            Self::Status(text)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_marker_classifies_as_frame() {
        let msg = FeedMessage::classify("data:image/jpeg;base64,AAAA");
        assert_eq!(msg, FeedMessage::Frame("data:image/jpeg;base64,AAAA".into()));
    }

    #[test]
    fn plain_text_classifies_as_status() {
        let msg = FeedMessage::classify("error: detector unavailable");
        assert_eq!(msg, FeedMessage::Status("error: detector unavailable".into()));
    }

    #[test]
    fn marker_must_be_a_prefix() {
        // An error message that merely mentions a data URL is still text.
        let msg = FeedMessage::classify("rejected payload data:image/jpeg");
        assert!(matches!(msg, FeedMessage::Status(_)));
    }

    #[test]
    fn non_jpeg_image_subtypes_count_as_frames() {
        let msg = FeedMessage::classify("data:image/png;base64,AAAA");
        assert!(matches!(msg, FeedMessage::Frame(_)));
    }

    #[test]
    fn terminal_states() {
        assert!(ChannelState::Closed.is_terminal());
        assert!(ChannelState::Failed.is_terminal());
        assert!(!ChannelState::Open.is_terminal());
        assert!(ChannelState::Open.is_open());
        assert!(!ChannelState::Connecting.is_open());
    }

    #[test]
    fn raw_frame_expected_len() {
        let frame = RawFrame {
            data: vec![0; 12],
            width: 2,
            height: 2,
            format: PixelFormat::Rgb,
            pts_ms: 0,
        };
        assert_eq!(frame.expected_len(), 12);
    }
}
