//! ONNX-backed vision capabilities: hand landmark extraction and the 8-way
//! age classifier. Both are opaque frame-to-structured-output functions as
//! far as the rest of the pipeline is concerned.

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use fast_image_resize as fir;
use ndarray::Array4;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;
use rayon::prelude::*;

use crate::types::{Frame, Handedness, LandmarkSet, NUM_LANDMARKS};

pub const HAND_INPUT_SIZE: u32 = 224;
pub const AGE_INPUT_SIZE: u32 = 224;

const MIN_HAND_CONFIDENCE: f32 = 0.5;

/// Frame-to-landmarks seam injected into the analysis loop.
pub trait LandmarkDetector: Send {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<LandmarkSet>>;
}

fn build_session(model_path: &Path) -> Result<Session> {
    Session::builder()?
        .with_optimization_level(GraphOptimizationLevel::Level3)?
        .with_intra_threads(2)?
        .commit_from_file(model_path)
        .with_context(|| format!("failed to load ORT session from {}", model_path.display()))
}

/// Hand landmark model. A failed load leaves a detector that reports no
/// hands, so the pipeline keeps running on the color signal alone.
pub struct OrtHandDetector {
    session: Option<Session>,
}

impl OrtHandDetector {
    pub fn load(model_path: &Path) -> Self {
        let session = match build_session(model_path) {
            Ok(session) => {
                log::info!(
                    "loaded hand landmark model from {}",
                    model_path.display()
                );
                Some(session)
            }
            Err(err) => {
                log::error!("hand landmark model unavailable, gestures stay at waiting: {err:?}");
                None
            }
        };
        Self { session }
    }
}

impl LandmarkDetector for OrtHandDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<LandmarkSet>> {
        let Some(session) = self.session.as_mut() else {
            return Ok(Vec::new());
        };

        let input = prepare_input(frame, HAND_INPUT_SIZE)?;
        let tensor = Tensor::from_array(input)?;
        let outputs = session
            .run(ort::inputs![tensor])
            .context("hand landmark inference failed")?;

        if outputs.len() < 1 {
            return Err(anyhow!("hand landmark model returned no outputs"));
        }

        let coords = outputs[0].try_extract_array::<f32>()?;
        let flat: Vec<f32> = coords.iter().copied().collect();
        if flat.len() < NUM_LANDMARKS * 3 {
            return Err(anyhow!(
                "unexpected landmark output length: got {}, need {}",
                flat.len(),
                NUM_LANDMARKS * 3
            ));
        }

        let confidence = if outputs.len() > 1 {
            outputs[1]
                .try_extract_array::<f32>()
                .ok()
                .and_then(|arr| arr.iter().next().copied())
                .unwrap_or(0.0)
        } else {
            0.0
        };
        if confidence < MIN_HAND_CONFIDENCE {
            return Ok(Vec::new());
        }

        let handedness_score = if outputs.len() > 2 {
            outputs[2]
                .try_extract_array::<f32>()
                .ok()
                .and_then(|arr| arr.iter().next().copied())
        } else {
            None
        };

        let scale = HAND_INPUT_SIZE as f32;
        let points = flat
            .chunks_exact(3)
            .take(NUM_LANDMARKS)
            .map(|chunk| [chunk[0] / scale, chunk[1] / scale, chunk[2] / scale])
            .collect();

        Ok(vec![LandmarkSet {
            points,
            handedness: handedness_from_score(handedness_score),
        }])
    }
}

fn handedness_from_score(score: Option<f32>) -> Handedness {
    match score {
        Some(score) if score >= 0.5 => Handedness::Right,
        Some(score) if score > 0.0 => Handedness::Left,
        _ => Handedness::Unknown,
    }
}

/// 8-way age bracket classifier, invoked only by the on-demand endpoint.
pub struct OrtAgeClassifier {
    session: Session,
}

impl OrtAgeClassifier {
    pub fn load(model_path: &Path) -> Result<Self> {
        let session = build_session(model_path)?;
        log::info!("loaded age model from {}", model_path.display());
        Ok(Self { session })
    }

    /// Returns the index of the predicted age bracket.
    pub fn classify(&mut self, frame: &Frame) -> Result<usize> {
        let input = prepare_input(frame, AGE_INPUT_SIZE)?;
        let tensor = Tensor::from_array(input)?;
        let outputs = self
            .session
            .run(ort::inputs![tensor])
            .context("age inference failed")?;

        if outputs.len() < 1 {
            return Err(anyhow!("age model returned no outputs"));
        }

        let logits = outputs[0].try_extract_array::<f32>()?;
        logits
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(index, _)| index)
            .ok_or_else(|| anyhow!("age model produced empty logits"))
    }
}

/// Letterboxes the frame into a `target`×`target` square, normalizes to
/// [0, 1] and lays it out as NHWC.
fn prepare_input(frame: &Frame, target: u32) -> Result<Array4<f32>> {
    let expected_len = (frame.width as usize)
        .saturating_mul(frame.height as usize)
        .saturating_mul(3);
    if frame.rgb.len() != expected_len || frame.pixel_count() == 0 {
        return Err(anyhow!(
            "frame buffer size mismatch: got {}, expected {}",
            frame.rgb.len(),
            expected_len
        ));
    }

    let scale = target as f32 / (frame.width.max(frame.height) as f32);
    let new_w = (frame.width as f32 * scale).round().max(1.0) as u32;
    let new_h = (frame.height as f32 * scale).round().max(1.0) as u32;

    let src_image = fir::images::Image::from_vec_u8(
        frame.width,
        frame.height,
        frame.rgb.clone(),
        fir::PixelType::U8x3,
    )?;
    let mut dst_image = fir::images::Image::new(new_w, new_h, fir::PixelType::U8x3);
    let mut resizer = fir::Resizer::new();
    let resize_options = fir::ResizeOptions::new()
        .resize_alg(fir::ResizeAlg::Interpolation(fir::FilterType::Bilinear));
    resizer
        .resize(&src_image, &mut dst_image, Some(&resize_options))
        .context("fast resize failed")?;
    let resized = dst_image.into_vec();

    let pad_x = ((target as i64 - new_w as i64) / 2).max(0) as usize;
    let pad_y = ((target as i64 - new_h as i64) / 2).max(0) as usize;
    let mut canvas = vec![0u8; (target as usize) * (target as usize) * 3];
    let dst_stride = target as usize * 3;
    let src_stride = new_w as usize * 3;
    for row in 0..(new_h as usize) {
        let dst_offset = (pad_y + row) * dst_stride + pad_x * 3;
        let src_offset = row * src_stride;
        canvas[dst_offset..dst_offset + src_stride]
            .copy_from_slice(&resized[src_offset..src_offset + src_stride]);
    }

    let normalized: Vec<f32> = canvas
        .par_chunks_exact(3)
        .flat_map_iter(|px| {
            [
                px[0] as f32 / 255.0,
                px[1] as f32 / 255.0,
                px[2] as f32 / 255.0,
            ]
        })
        .collect();

    Array4::<f32>::from_shape_vec((1, target as usize, target as usize, 3), normalized)
        .map_err(|err| anyhow!("failed to build input tensor: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prepare_input_letterboxes_to_target_shape() {
        let frame = Frame::new(vec![128u8; 64 * 48 * 3], 64, 48);
        let input = prepare_input(&frame, HAND_INPUT_SIZE).unwrap();
        assert_eq!(input.shape(), &[1, 224, 224, 3]);
        // Padding rows stay zero, image rows are the normalized gray.
        assert_eq!(input[[0, 0, 0, 0]], 0.0);
        let mid = 224 / 2;
        let value = input[[0, mid, mid, 0]];
        assert!((value - 128.0 / 255.0).abs() < 1e-3);
    }

    #[test]
    fn prepare_input_rejects_mismatched_buffers() {
        let frame = Frame::new(vec![0u8; 10], 64, 48);
        assert!(prepare_input(&frame, HAND_INPUT_SIZE).is_err());
    }

    #[test]
    fn handedness_score_thresholds() {
        assert_eq!(handedness_from_score(Some(0.9)), Handedness::Right);
        assert_eq!(handedness_from_score(Some(0.5)), Handedness::Right);
        assert_eq!(handedness_from_score(Some(0.2)), Handedness::Left);
        assert_eq!(handedness_from_score(Some(0.0)), Handedness::Unknown);
        assert_eq!(handedness_from_score(None), Handedness::Unknown);
    }
}
