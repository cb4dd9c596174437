//! Synthetic frame source for tests and camera-less demo runs.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use tomat_core::{PixelFormat, RawFrame};

use crate::FrameSource;

/// A `FrameSource` that fabricates frames on demand. Each sampled frame is
/// filled with a new sequence value, so consecutive samples encode to
/// distinct payloads.
pub struct StubSource {
    width:  u32,
    height: u32,
    seq:    u32,
    ready:  bool,
    releases: Arc<AtomicU32>,
    samples:  Arc<AtomicU32>,
}

impl StubSource {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            seq: 0,
            ready: true,
            releases: Arc::new(AtomicU32::new(0)),
            samples: Arc::new(AtomicU32::new(0)),
        }
    }

    /// A source that has not yet produced a decodable frame.
    pub fn not_ready(width: u32, height: u32) -> Self {
        Self { ready: false, ..Self::new(width, height) }
    }

    pub fn set_ready(&mut self, ready: bool) {
        self.ready = ready;
    }

    /// Counter handle that survives the source being moved or dropped.
    pub fn release_counter(&self) -> Arc<AtomicU32> {
        Arc::clone(&self.releases)
    }

    /// Counter handle for the number of `sample` calls.
    pub fn sample_counter(&self) -> Arc<AtomicU32> {
        Arc::clone(&self.samples)
    }
}

impl FrameSource for StubSource {
    fn sample(&mut self) -> Option<RawFrame> {
        self.samples.fetch_add(1, Ordering::Relaxed);
        if !self.ready {
            return None;
        }
        self.seq = self.seq.wrapping_add(1);
        let fill = (self.seq % 251) as u8;
        Some(RawFrame {
            data: vec![fill; (self.width * self.height * 3) as usize],
            width: self.width,
            height: self.height,
            format: PixelFormat::Rgb,
            pts_ms: self.seq as u64,
        })
    }

    fn release(&mut self) {
        self.releases.fetch_add(1, Ordering::Relaxed);
        self.ready = false;
    }
}
