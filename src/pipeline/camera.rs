use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use anyhow::{anyhow, Context, Result};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError};
use nokhwa::{
    pixel_format::RgbFormat,
    utils::{CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType},
    Camera,
};
use thiserror::Error;

use super::convert;
use crate::types::Frame;

// Prefer pixel formats that are widely supported (built-in cameras often
// reject YUYV even though the backend reports it).
const PREFERRED_PIXEL_FORMATS: &[FrameFormat] = &[
    FrameFormat::RAWRGB,
    FrameFormat::RAWBGR,
    FrameFormat::GRAY,
    FrameFormat::YUYV,
    FrameFormat::NV12,
    FrameFormat::MJPEG,
];

fn requested_formats() -> [RequestedFormat<'static>; 4] {
    [
        RequestedFormat::with_formats(
            RequestedFormatType::AbsoluteHighestFrameRate,
            PREFERRED_PIXEL_FORMATS,
        ),
        RequestedFormat::with_formats(
            RequestedFormatType::AbsoluteHighestResolution,
            PREFERRED_PIXEL_FORMATS,
        ),
        // Fall back to anything the backend can decode, preferring higher FPS
        // over very low default rates some drivers pick.
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestFrameRate),
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::None),
    ]
}

#[derive(Debug, Error)]
pub enum CaptureError {
    /// The device never opened; every call fails immediately. Retry policy
    /// belongs to the caller.
    #[error("capture device unavailable")]
    DeviceUnavailable,
    /// Transient: no frame arrived within the read timeout. The handle stays
    /// usable for the next call.
    #[error("no frame available within {0:?}")]
    NoFrame(Duration),
    #[error("capture thread stopped")]
    Stopped,
}

/// Frame acquisition seam between the capture device and the analysis loop.
pub trait FrameSource: Send {
    fn next_frame(&mut self) -> Result<Frame, CaptureError>;
}

enum SourceState {
    Live {
        frames: Receiver<Frame>,
        stop: Arc<AtomicBool>,
        handle: Option<thread::JoinHandle<()>>,
    },
    Dead,
}

/// FrameSource over one capture handle opened at startup.
///
/// A capture thread owns the device and forwards decoded frames through a
/// bounded(1) channel, dropping frames whenever the consumer is busy.
/// Dropping the source stops and joins that thread, which releases the
/// device exactly once on every exit path.
pub struct CameraSource {
    state: SourceState,
    read_timeout: Duration,
}

fn build_camera(index: CameraIndex) -> Result<Camera> {
    let mut last_err = None;

    for requested in requested_formats() {
        match Camera::new(index.clone(), requested) {
            Ok(mut camera) => match camera.open_stream() {
                Ok(()) => return Ok(camera),
                Err(err) => last_err = Some(err.into()),
            },
            Err(err) => last_err = Some(err.into()),
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow!("failed to open camera with any supported format")))
}

impl CameraSource {
    /// Opens the device behind a capture thread. A failed open probe yields a
    /// dead source whose `next_frame` fails immediately; the failure is
    /// logged here and the process keeps serving.
    pub fn open(index: CameraIndex, read_timeout: Duration) -> Self {
        // Fail fast before spawning the capture thread.
        if let Err(err) = build_camera(index.clone()) {
            log::error!("camera {index:?} unavailable: {err:?}");
            return Self {
                state: SourceState::Dead,
                read_timeout,
            };
        }

        let (frame_tx, frame_rx) = bounded(1);
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = stop.clone();

        let handle = thread::spawn(move || {
            let mut camera = match build_camera(index) {
                Ok(camera) => camera,
                Err(err) => {
                    log::error!("failed to reopen camera: {err:?}");
                    return;
                }
            };

            while !stop_flag.load(Ordering::Relaxed) {
                let buffer = match camera.frame() {
                    Ok(buffer) => buffer,
                    Err(err) => {
                        log::warn!("camera frame read failed: {err:?}");
                        continue;
                    }
                };

                let frame = match convert::to_rgb_frame(&buffer) {
                    Ok(frame) => frame,
                    Err(err) => {
                        log::warn!("failed to decode camera frame: {err:?}");
                        continue;
                    }
                };

                // Drop the frame if the analysis loop is busy.
                let _ = frame_tx.try_send(frame);
            }
            // Camera handle is released here, when the thread winds down.
        });

        Self {
            state: SourceState::Live {
                frames: frame_rx,
                stop,
                handle: Some(handle),
            },
            read_timeout,
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(self.state, SourceState::Live { .. })
    }
}

impl FrameSource for CameraSource {
    fn next_frame(&mut self) -> Result<Frame, CaptureError> {
        match &self.state {
            SourceState::Dead => Err(CaptureError::DeviceUnavailable),
            SourceState::Live { frames, .. } => {
                frames.recv_timeout(self.read_timeout).map_err(|err| match err {
                    RecvTimeoutError::Timeout => CaptureError::NoFrame(self.read_timeout),
                    RecvTimeoutError::Disconnected => CaptureError::Stopped,
                })
            }
        }
    }
}

impl Drop for CameraSource {
    fn drop(&mut self) {
        if let SourceState::Live { stop, handle, .. } = &mut self.state {
            stop.store(true, Ordering::SeqCst);
            if let Some(handle) = handle.take() {
                let _ = handle.join();
            }
        }
    }
}

/// Grabs a single frame on an independent capture handle, releasing it before
/// returning. Used by the on-demand age endpoint, fully decoupled from the
/// analysis loop's handle.
pub fn capture_single_frame(index: CameraIndex) -> Result<Frame> {
    let mut camera = build_camera(index)?;
    let buffer = camera.frame().context("frame grab failed")?;
    convert::to_rgb_frame(&buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dead_source_fails_immediately() {
        let mut source = CameraSource {
            state: SourceState::Dead,
            read_timeout: Duration::from_secs(5),
        };
        let start = std::time::Instant::now();
        assert!(matches!(
            source.next_frame(),
            Err(CaptureError::DeviceUnavailable)
        ));
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[test]
    fn disconnected_capture_thread_reports_stopped() {
        let (frame_tx, frame_rx) = bounded::<Frame>(1);
        drop(frame_tx);
        let mut source = CameraSource {
            state: SourceState::Live {
                frames: frame_rx,
                stop: Arc::new(AtomicBool::new(false)),
                handle: None,
            },
            read_timeout: Duration::from_millis(10),
        };
        assert!(matches!(source.next_frame(), Err(CaptureError::Stopped)));
    }
}
