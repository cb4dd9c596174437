//! tomat-capture — camera acquisition and frame encoding.
//!
//! # Architecture
//!
//! ```text
//! v4l2src device=/dev/video0
//!         │
//!   videoconvert
//!         │
//! video/x-raw,format=RGB
//!         │
//!      appsink ──► watch cell (latest frame) ──► sample()
//! ```
//!
//! The capture layer holds exactly one frame: the most recent one decoded
//! by the device. [`FrameSource::sample`] clones it; there is no queue, so
//! a slow consumer sees fresh frames and a fast consumer sees repeats.
//!
//! # Backends
//!
//! | Backend | Feature | Notes |
//! |---------|---------|-------|
//! | GStreamer v4l2 | `camera-gstreamer` | Linux webcams |
//! | Stub | `stub-frame-source` | Synthetic frames for tests/demo |

pub mod jpeg;

#[cfg(feature = "camera-gstreamer")]
mod gst;
#[cfg(feature = "stub-frame-source")]
pub mod stub;

#[cfg(feature = "camera-gstreamer")]
pub use gst::Camera;
pub use jpeg::JpegEncoder;
#[cfg(feature = "stub-frame-source")]
pub use stub::StubSource;

use tomat_core::RawFrame;

/// A source of raster frames with an exclusive-ownership lifecycle: opened
/// once per pipeline instance, released exactly once during teardown.
pub trait FrameSource {
    /// The most recent decodable frame, or `None` while the device has not
    /// yet produced one. Not-ready is not an error; callers skip the tick.
    fn sample(&mut self) -> Option<RawFrame>;

    /// Stop the underlying device and free its tracks. Safe to call more
    /// than once.
    fn release(&mut self);
}

impl<T: FrameSource + ?Sized> FrameSource for Box<T> {
    fn sample(&mut self) -> Option<RawFrame> {
        (**self).sample()
    }

    fn release(&mut self) {
        (**self).release()
    }
}
