//! JPEG still encoder: `RawFrame` → `data:image/jpeg;base64,…` data URL.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::codecs::jpeg::JpegEncoder as ImageJpegEncoder;
use image::ExtendedColorType;
use tomat_core::{EncodedStill, PixelFormat, RawFrame, TomatError};

const DATA_URL_PREFIX: &str = "data:image/jpeg;base64,";

/// Deterministic JPEG compressor with a fixed quality and a reusable
/// output buffer. The buffer grows when the camera renegotiates to larger
/// dimensions and is reused as-is otherwise.
pub struct JpegEncoder {
    quality: u8,
    buf: Vec<u8>,
}

impl JpegEncoder {
    pub fn new(quality: u8) -> Self {
        Self { quality, buf: Vec::new() }
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    /// Compress one frame into a base64 data URL.
    pub fn encode(&mut self, frame: &RawFrame) -> Result<EncodedStill, TomatError> {
        if frame.data.len() != frame.expected_len() {
            return Err(TomatError::EncodeFailed {
                reason: format!(
                    "pixel buffer is {} bytes, expected {} for {}×{}",
                    frame.data.len(),
                    frame.expected_len(),
                    frame.width,
                    frame.height
                ),
            });
        }

        let color = match frame.format {
            PixelFormat::Rgb => ExtendedColorType::Rgb8,
            PixelFormat::Gray => ExtendedColorType::L8,
        };

        self.buf.clear();
        ImageJpegEncoder::new_with_quality(&mut self.buf, self.quality)
            .encode(&frame.data, frame.width, frame.height, color)
            .map_err(|e| TomatError::EncodeFailed { reason: e.to_string() })?;

        let mut data_url =
            String::with_capacity(DATA_URL_PREFIX.len() + self.buf.len() * 4 / 3 + 4);
        data_url.push_str(DATA_URL_PREFIX);
        BASE64.encode_string(&self.buf, &mut data_url);

        Ok(EncodedStill {
            data_url,
            width: frame.width,
            height: frame.height,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rgb_frame(width: u32, height: u32, fill: u8) -> RawFrame {
        RawFrame {
            data: vec![fill; (width * height * 3) as usize],
            width,
            height,
            format: PixelFormat::Rgb,
            pts_ms: 0,
        }
    }

    #[test]
    fn encodes_to_jpeg_data_url() {
        let mut enc = JpegEncoder::new(80);
        let still = enc.encode(&rgb_frame(8, 6, 200)).expect("encode");
        assert!(still.data_url.starts_with("data:image/jpeg;base64,"));
        assert_eq!(still.width, 8);
        assert_eq!(still.height, 6);
    }

    #[test]
    fn payload_round_trips_through_base64() {
        let mut enc = JpegEncoder::new(80);
        let still = enc.encode(&rgb_frame(16, 16, 127)).expect("encode");

        let b64 = still
            .data_url
            .strip_prefix("data:image/jpeg;base64,")
            .expect("prefix");
        let jpeg = BASE64.decode(b64).expect("valid base64");
        let img = image::load_from_memory(&jpeg).expect("valid jpeg");
        assert_eq!(img.width(), 16);
        assert_eq!(img.height(), 16);
    }

    #[test]
    fn encoding_is_deterministic() {
        let mut enc = JpegEncoder::new(80);
        let a = enc.encode(&rgb_frame(8, 8, 50)).expect("encode");
        let b = enc.encode(&rgb_frame(8, 8, 50)).expect("encode");
        assert_eq!(a, b);
    }

    #[test]
    fn tolerates_dimension_changes_between_frames() {
        // The camera may renegotiate resolution mid-stream.
        let mut enc = JpegEncoder::new(80);
        enc.encode(&rgb_frame(8, 8, 10)).expect("small frame");
        enc.encode(&rgb_frame(32, 24, 10)).expect("larger frame");
        enc.encode(&rgb_frame(4, 4, 10)).expect("smaller frame");
    }

    #[test]
    fn rejects_mismatched_pixel_buffer() {
        let mut enc = JpegEncoder::new(80);
        let mut frame = rgb_frame(8, 8, 0);
        frame.data.truncate(10);
        assert!(matches!(
            enc.encode(&frame),
            Err(TomatError::EncodeFailed { .. })
        ));
    }

    #[test]
    fn grayscale_frames_encode() {
        let mut enc = JpegEncoder::new(80);
        let frame = RawFrame {
            data: vec![90; 64],
            width: 8,
            height: 8,
            format: PixelFormat::Gray,
            pts_ms: 0,
        };
        let still = enc.encode(&frame).expect("encode");
        assert!(still.data_url.starts_with("data:image/jpeg;base64,"));
    }
}
