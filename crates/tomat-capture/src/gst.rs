//! GStreamer v4l2 camera backend.

use gstreamer::prelude::*;
use gstreamer_app::{AppSink, AppSinkCallbacks};
use gstreamer_video::VideoInfo;
use tokio::sync::watch;
use tomat_core::{CameraConfig, PixelFormat, RawFrame, TomatError};
use tracing::{debug, info, warn};

use crate::FrameSource;

/// An open local camera. Holds the GStreamer pipeline and a cell with the
/// latest decoded frame. Exactly one `Camera` exists per relay pipeline.
pub struct Camera {
    pipeline: gstreamer::Pipeline,
    latest:   watch::Receiver<Option<RawFrame>>,
    released: bool,
}

impl Camera {
    /// Request exclusive access to the configured camera device.
    ///
    /// Fails with [`TomatError::CameraUnavailable`] when the device is
    /// missing or access is denied. Callers must not retry automatically;
    /// the failure is surfaced as a persistent blocked state.
    pub fn open(config: &CameraConfig) -> Result<Self, TomatError> {
        gstreamer::init().map_err(|e| TomatError::CameraUnavailable {
            reason: format!("GStreamer init: {e}"),
        })?;

        let desc = format!(
            "v4l2src device={} \
             ! videoconvert \
             ! video/x-raw,format=RGB,width={},height={},framerate={}/1 \
             ! appsink name=sink max-buffers=1 drop=true sync=false emit-signals=false",
            config.device, config.width, config.height, config.fps
        );
        debug!("Camera pipeline: {}", desc);

        let pipeline = gstreamer::parse::launch(&desc)
            .map_err(|e| TomatError::CameraUnavailable {
                reason: format!("parsing capture pipeline: {e}"),
            })?
            .downcast::<gstreamer::Pipeline>()
            .map_err(|_| TomatError::CameraUnavailable {
                reason: "expected a Pipeline".to_owned(),
            })?;

        let appsink: AppSink = pipeline
            .by_name("sink")
            .and_then(|e| e.downcast::<AppSink>().ok())
            .ok_or_else(|| TomatError::CameraUnavailable {
                reason: "appsink 'sink' missing".to_owned(),
            })?;

        let (tx, latest) = watch::channel(None);

        appsink.set_callbacks(
            AppSinkCallbacks::builder()
                .new_sample(move |sink| {
                    let sample = sink.pull_sample().map_err(|_| gstreamer::FlowError::Eos)?;
                    let buffer = sample.buffer().ok_or(gstreamer::FlowError::Error)?;
                    let caps = sample.caps().ok_or(gstreamer::FlowError::Error)?;
                    let info =
                        VideoInfo::from_caps(caps).map_err(|_| gstreamer::FlowError::Error)?;

                    let map = buffer
                        .map_readable()
                        .map_err(|_| gstreamer::FlowError::Error)?;

                    let width = info.width();
                    let height = info.height();
                    let stride = info.stride()[0] as usize;
                    let row = width as usize * 3;

                    // Rows may be padded to the stride; pack them tight.
                    let data = if stride == row {
                        map.as_slice().to_vec()
                    } else {
                        let mut packed = Vec::with_capacity(row * height as usize);
                        for y in 0..height as usize {
                            let start = y * stride;
                            packed.extend_from_slice(&map.as_slice()[start..start + row]);
                        }
                        packed
                    };

                    let pts_ms = buffer.pts().map(|t| t.mseconds()).unwrap_or(0);
                    tx.send_replace(Some(RawFrame {
                        data,
                        width,
                        height,
                        format: PixelFormat::Rgb,
                        pts_ms,
                    }));
                    Ok(gstreamer::FlowSuccess::Ok)
                })
                .build(),
        );

        // Device-open failures (missing node, busy device, denied access)
        // surface here as a state-change error.
        pipeline
            .set_state(gstreamer::State::Playing)
            .map_err(|e| TomatError::CameraUnavailable {
                reason: format!("starting capture on {}: {e}", config.device),
            })?;

        info!(
            "Camera opened: {} {}×{}@{}",
            config.device, config.width, config.height, config.fps
        );

        Ok(Self { pipeline, latest, released: false })
    }
}

impl FrameSource for Camera {
    fn sample(&mut self) -> Option<RawFrame> {
        if self.released {
            return None;
        }
        self.latest.borrow().clone()
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if let Err(e) = self.pipeline.set_state(gstreamer::State::Null) {
            warn!("Camera release: {e}");
        } else {
            info!("Camera released");
        }
    }
}

impl Drop for Camera {
    fn drop(&mut self) {
        self.release();
    }
}
