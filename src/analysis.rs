//! The producer side of the pipeline: one dedicated thread that samples
//! frames, derives both signals and commits them to the store. Blocking
//! camera and model calls stay on this thread and never touch the async
//! runtime serving subscribers.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use anyhow::Result;

use crate::{
    color,
    config::AnalysisConfig,
    detect::LandmarkDetector,
    gesture,
    pipeline::FrameSource,
    signals::SignalStore,
    types::{ColorEstimate, GestureLabel},
};

pub struct AnalysisLoop<S, D> {
    source: S,
    detector: D,
    store: SignalStore,
    cadence: Duration,
    capture_backoff: Duration,
    fault_backoff: Duration,
    clusters: usize,
    stop: Arc<AtomicBool>,
}

/// Stops the loop thread and joins it. Dropping the handle has the same
/// effect, so shutdown never leaks the thread or the capture device it owns.
pub struct LoopHandle {
    stop: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl LoopHandle {
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for LoopHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl<S, D> AnalysisLoop<S, D>
where
    S: FrameSource + 'static,
    D: LandmarkDetector + 'static,
{
    pub fn new(source: S, detector: D, store: SignalStore, config: &AnalysisConfig) -> Self {
        Self {
            source,
            detector,
            store,
            cadence: config.tick(),
            capture_backoff: config.capture_backoff(),
            fault_backoff: config.fault_backoff(),
            clusters: config.color_clusters,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn spawn(self) -> LoopHandle {
        let stop = self.stop.clone();
        let handle = thread::spawn(move || self.run());
        LoopHandle {
            stop,
            handle: Some(handle),
        }
    }

    fn run(mut self) {
        log::info!("analysis loop started");
        while !self.stop.load(Ordering::Relaxed) {
            if let Err(err) = self.tick() {
                // The producer never dies: log, quarantine, resume.
                log::error!("analysis tick failed: {err:?}");
                thread::sleep(self.fault_backoff);
            }
        }
        log::info!("analysis loop stopped");
        // Dropping `self.source` here releases the capture device.
    }

    fn tick(&mut self) -> Result<()> {
        let frame = match self.source.next_frame() {
            Ok(frame) => frame,
            Err(err) => {
                log::warn!("frame read failed: {err}");
                self.store
                    .set(Some(GestureLabel::Waiting), Some(ColorEstimate::Unknown));
                thread::sleep(self.capture_backoff);
                return Ok(());
            }
        };

        // A detection error aborts the tick before any commit, leaving the
        // last committed gesture in place: gestures have no error sentinel.
        let hands = self.detector.detect(&frame)?;
        let gesture = gesture::classify(&hands);

        let color = match color::center_region(&frame) {
            Some(region) => match color::dominant_color(&region, self.clusters) {
                Ok(hex) => ColorEstimate::Hex(hex),
                Err(err) => {
                    log::error!("dominant color failed: {err}");
                    ColorEstimate::Error
                }
            },
            None => ColorEstimate::Unknown,
        };

        self.store.set(Some(gesture), Some(color));
        thread::sleep(self.cadence);
        Ok(())
    }
}
