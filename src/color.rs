use rayon::prelude::*;
use thiserror::Error;

use crate::types::Frame;

/// Cluster count used by the analysis loop unless configured otherwise.
pub const DEFAULT_CLUSTERS: usize = 3;

const MAX_ITERATIONS: usize = 10;
const CONVERGENCE_EPSILON: f32 = 1.0;

/// Fraction of the frame covered by the sampling region in each dimension.
const REGION_FRACTION: f32 = 0.3;

#[derive(Debug, Error)]
pub enum ColorError {
    #[error("region contains no pixels")]
    EmptyRegion,
}

/// Centered rectangular crop covering 30% of the frame's width and height,
/// clamped to frame bounds. `None` when the frame is too small to yield a
/// non-degenerate region.
pub fn center_region(frame: &Frame) -> Option<Frame> {
    let width = frame.width;
    let height = frame.height;
    let region_w = (width as f32 * REGION_FRACTION) as u32;
    let region_h = (height as f32 * REGION_FRACTION) as u32;

    let center_x = width / 2;
    let center_y = height / 2;
    let x1 = center_x.saturating_sub(region_w / 2);
    let y1 = center_y.saturating_sub(region_h / 2);
    let x2 = (center_x + region_w / 2).min(width);
    let y2 = (center_y + region_h / 2).min(height);

    if x2 <= x1 || y2 <= y1 {
        return None;
    }

    let crop_w = x2 - x1;
    let mut rgb = Vec::with_capacity((crop_w * (y2 - y1) * 3) as usize);
    for y in y1..y2 {
        let start = ((y * width + x1) * 3) as usize;
        rgb.extend_from_slice(&frame.rgb[start..start + (crop_w * 3) as usize]);
    }

    Some(Frame::new(rgb, crop_w, y2 - y1))
}

/// Dominant color of a region via k-means over RGB space, as `#rrggbb`.
///
/// Runs at most 10 iterations with a convergence epsilon of 1.0 and emits the
/// centroid of the largest cluster. Initial centers are samples spread evenly
/// through the region; there is no determinism guarantee across runs and none
/// is needed, the consumers only see the value when it changes.
pub fn dominant_color(region: &Frame, k: usize) -> Result<String, ColorError> {
    let pixels: Vec<[f32; 3]> = region
        .rgb
        .chunks_exact(3)
        .map(|px| [px[0] as f32, px[1] as f32, px[2] as f32])
        .collect();
    if pixels.is_empty() {
        return Err(ColorError::EmptyRegion);
    }

    let k = k.clamp(1, pixels.len());
    let mut centers: Vec<[f32; 3]> = (0..k).map(|i| pixels[i * pixels.len() / k]).collect();
    let mut assignments = vec![0usize; pixels.len()];

    for _ in 0..MAX_ITERATIONS {
        assignments
            .par_iter_mut()
            .zip(pixels.par_iter())
            .for_each(|(slot, pixel)| {
                *slot = nearest_center(pixel, &centers);
            });

        let mut sums = vec![[0f64; 3]; k];
        let mut counts = vec![0usize; k];
        for (slot, pixel) in assignments.iter().zip(&pixels) {
            counts[*slot] += 1;
            for channel in 0..3 {
                sums[*slot][channel] += pixel[channel] as f64;
            }
        }

        let mut max_shift = 0.0f32;
        for cluster in 0..k {
            if counts[cluster] == 0 {
                // Empty cluster keeps its previous center.
                continue;
            }
            let next = [
                (sums[cluster][0] / counts[cluster] as f64) as f32,
                (sums[cluster][1] / counts[cluster] as f64) as f32,
                (sums[cluster][2] / counts[cluster] as f64) as f32,
            ];
            max_shift = max_shift.max(distance(&centers[cluster], &next));
            centers[cluster] = next;
        }

        if max_shift < CONVERGENCE_EPSILON {
            break;
        }
    }

    // Membership counts against the final centers pick the dominant cluster.
    let mut counts = vec![0usize; k];
    for pixel in &pixels {
        counts[nearest_center(pixel, &centers)] += 1;
    }
    let dominant = counts
        .iter()
        .enumerate()
        .max_by_key(|(_, count)| **count)
        .map(|(cluster, _)| cluster)
        .unwrap_or(0);

    let center = centers[dominant];
    Ok(format!(
        "#{:02x}{:02x}{:02x}",
        channel_to_u8(center[0]),
        channel_to_u8(center[1]),
        channel_to_u8(center[2])
    ))
}

fn channel_to_u8(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

fn nearest_center(pixel: &[f32; 3], centers: &[[f32; 3]]) -> usize {
    let mut best = 0;
    let mut best_dist = f32::MAX;
    for (cluster, center) in centers.iter().enumerate() {
        let dist = squared_distance(pixel, center);
        if dist < best_dist {
            best_dist = dist;
            best = cluster;
        }
    }
    best
}

fn squared_distance(a: &[f32; 3], b: &[f32; 3]) -> f32 {
    (a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2) + (a[2] - b[2]).powi(2)
}

fn distance(a: &[f32; 3], b: &[f32; 3]) -> f32 {
    squared_distance(a, b).sqrt()
}
