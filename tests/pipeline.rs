//! End-to-end producer tests with stubbed capture and detection: the loop
//! must reset the store on device failure and commit both signals on a
//! healthy tick.

use std::time::{Duration, Instant};

use gesture_stream::{
    analysis::AnalysisLoop,
    config::AnalysisConfig,
    detect::LandmarkDetector,
    pipeline::{CaptureError, FrameSource},
    signals::SignalStore,
    types::{
        ColorEstimate, Frame, GestureLabel, Handedness, LandmarkSet, INDEX_TIP, NUM_LANDMARKS,
        THUMB_TIP,
    },
};

struct FailingSource;

impl FrameSource for FailingSource {
    fn next_frame(&mut self) -> Result<Frame, CaptureError> {
        Err(CaptureError::DeviceUnavailable)
    }
}

struct SolidSource {
    rgb: [u8; 3],
}

impl FrameSource for SolidSource {
    fn next_frame(&mut self) -> Result<Frame, CaptureError> {
        let (width, height) = (64u32, 48u32);
        let mut data = Vec::with_capacity((width * height * 3) as usize);
        for _ in 0..(width * height) {
            data.extend_from_slice(&self.rgb);
        }
        Ok(Frame::new(data, width, height))
    }
}

struct StubDetector {
    hands: Vec<LandmarkSet>,
}

impl LandmarkDetector for StubDetector {
    fn detect(&mut self, _frame: &Frame) -> anyhow::Result<Vec<LandmarkSet>> {
        Ok(self.hands.clone())
    }
}

fn fast_config() -> AnalysisConfig {
    AnalysisConfig {
        tick_ms: 1,
        capture_backoff_ms: 1,
        fault_backoff_ms: 1,
        color_clusters: 3,
    }
}

fn thumbs_up_hand() -> LandmarkSet {
    let mut points = vec![[0.5, 0.5, 0.0]; NUM_LANDMARKS];
    points[THUMB_TIP] = [0.5, 0.2, 0.0];
    points[INDEX_TIP] = [0.5, 0.8, 0.0];
    LandmarkSet {
        points,
        handedness: Handedness::Right,
    }
}

fn wait_until(deadline: Duration, mut done: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < deadline {
        if done() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    false
}

#[test]
fn device_failure_resets_the_store() {
    let store = SignalStore::new();
    // Stale values from an imagined earlier healthy tick.
    store.set(
        Some(GestureLabel::ThumbsUp),
        Some(ColorEstimate::Hex("#112233".into())),
    );

    let handle = AnalysisLoop::new(
        FailingSource,
        StubDetector { hands: Vec::new() },
        store.clone(),
        &fast_config(),
    )
    .spawn();

    let reset = wait_until(Duration::from_secs(2), || {
        store.gesture() == GestureLabel::Waiting && store.color() == ColorEstimate::Unknown
    });
    handle.stop();
    assert!(reset, "store was not reset to waiting/unknown");
}

#[test]
fn healthy_tick_commits_both_signals() {
    let store = SignalStore::new();
    let handle = AnalysisLoop::new(
        SolidSource {
            rgb: [0x20, 0x40, 0x60],
        },
        StubDetector {
            hands: vec![thumbs_up_hand()],
        },
        store.clone(),
        &fast_config(),
    )
    .spawn();

    let committed = wait_until(Duration::from_secs(2), || {
        store.gesture() == GestureLabel::ThumbsUp
            && store.color() == ColorEstimate::Hex("#204060".into())
    });
    handle.stop();
    assert!(committed, "signals never reached the store");
}

#[test]
fn no_hands_reads_as_waiting_while_color_flows() {
    let store = SignalStore::new();
    let handle = AnalysisLoop::new(
        SolidSource {
            rgb: [0xab, 0xcd, 0xef],
        },
        StubDetector { hands: Vec::new() },
        store.clone(),
        &fast_config(),
    )
    .spawn();

    let committed = wait_until(Duration::from_secs(2), || {
        store.gesture() == GestureLabel::Waiting
            && store.color() == ColorEstimate::Hex("#abcdef".into())
    });
    handle.stop();
    assert!(committed, "color signal never reached the store");
}
