use anyhow::{anyhow, Result};
use nokhwa::{utils::FrameFormat, Buffer};
use rayon::prelude::*;
use yuv::{
    yuv_nv12_to_rgb, yuyv422_to_rgb, YuvBiPlanarImage, YuvConversionMode, YuvPackedImage,
    YuvRange, YuvStandardMatrix,
};
use zune_jpeg::{
    zune_core::{bytestream::ZCursor, colorspace::ColorSpace, options::DecoderOptions},
    JpegDecoder,
};

use crate::types::Frame;

/// Decodes one camera buffer into a tightly packed RGB frame, whatever the
/// device's native pixel format.
pub fn to_rgb_frame(buffer: &Buffer) -> Result<Frame> {
    let resolution = buffer.resolution();
    let width = resolution.width_x;
    let height = resolution.height_y;
    let data = buffer.buffer();

    let rgb = match buffer.source_frame_format() {
        FrameFormat::NV12 => nv12_to_rgb(data, width, height)?,
        FrameFormat::YUYV => yuyv_to_rgb(data, width, height)?,
        FrameFormat::MJPEG => mjpeg_to_rgb(data, width, height)?,
        FrameFormat::RAWRGB => raw_rgb(data, width, height)?,
        FrameFormat::RAWBGR => bgr_to_rgb(data, width, height)?,
        FrameFormat::GRAY => gray_to_rgb(data, width, height)?,
    };

    Ok(Frame::new(rgb, width, height))
}

fn nv12_to_rgb(data: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    let y_plane_len = width as usize * height as usize;
    let uv_plane_len = y_plane_len / 2;

    if data.len() < y_plane_len + uv_plane_len {
        return Err(anyhow!(
            "NV12 buffer too small: got {}, expected {}",
            data.len(),
            y_plane_len + uv_plane_len
        ));
    }

    let y_plane = &data[..y_plane_len];
    let uv_plane = &data[y_plane_len..y_plane_len + uv_plane_len];
    let mut rgb = vec![0u8; y_plane_len * 3];

    let image = YuvBiPlanarImage {
        y_plane,
        y_stride: width,
        uv_plane,
        uv_stride: width,
        width,
        height,
    };

    yuv_nv12_to_rgb(
        &image,
        &mut rgb,
        width * 3,
        YuvRange::Full,
        YuvStandardMatrix::Bt709,
        YuvConversionMode::Balanced,
    )
    .map_err(|err| anyhow!("NV12→RGB failed: {err:?}"))?;

    Ok(rgb)
}

fn yuyv_to_rgb(data: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    let expected_len = width as usize * height as usize * 2;
    if data.len() < expected_len {
        return Err(anyhow!(
            "YUYV buffer too small: got {}, expected {}",
            data.len(),
            expected_len
        ));
    }

    let mut rgb = vec![0u8; (width as usize * height as usize) * 3];
    let packed = YuvPackedImage {
        yuy: data,
        yuy_stride: width * 2,
        width,
        height,
    };

    yuyv422_to_rgb(
        &packed,
        &mut rgb,
        width * 3,
        YuvRange::Full,
        YuvStandardMatrix::Bt709,
    )
    .map_err(|err| anyhow!("YUYV422→RGB failed: {err:?}"))?;

    Ok(rgb)
}

fn mjpeg_to_rgb(data: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    let options = DecoderOptions::default().jpeg_set_out_colorspace(ColorSpace::RGB);
    let mut decoder = JpegDecoder::new_with_options(ZCursor::new(data), options);
    let rgb = decoder
        .decode()
        .map_err(|err| anyhow!("MJPEG decode failed: {err:?}"))?;

    let expected_len = width as usize * height as usize * 3;
    if rgb.len() < expected_len {
        return Err(anyhow!(
            "MJPEG decode produced too few bytes: got {}, expected {}",
            rgb.len(),
            expected_len
        ));
    }

    Ok(rgb)
}

fn raw_rgb(data: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    let expected_len = width as usize * height as usize * 3;
    if data.len() < expected_len {
        return Err(anyhow!(
            "RGB buffer too small: got {}, expected {}",
            data.len(),
            expected_len
        ));
    }
    Ok(data[..expected_len].to_vec())
}

fn bgr_to_rgb(data: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    let expected_len = width as usize * height as usize * 3;
    if data.len() < expected_len {
        return Err(anyhow!(
            "BGR buffer too small: got {}, expected {}",
            data.len(),
            expected_len
        ));
    }

    let mut rgb = vec![0u8; expected_len];
    rgb.par_chunks_mut(3)
        .zip(data[..expected_len].par_chunks_exact(3))
        .for_each(|(dst, src)| {
            dst[0] = src[2];
            dst[1] = src[1];
            dst[2] = src[0];
        });

    Ok(rgb)
}

fn gray_to_rgb(data: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    let expected_len = width as usize * height as usize;
    if data.len() < expected_len {
        return Err(anyhow!(
            "GRAY buffer too small: got {}, expected {}",
            data.len(),
            expected_len
        ));
    }

    let mut rgb = vec![0u8; expected_len * 3];
    rgb.par_chunks_mut(3)
        .zip(data[..expected_len].par_iter().copied())
        .for_each(|(dst, value)| {
            dst[0] = value;
            dst[1] = value;
            dst[2] = value;
        });

    Ok(rgb)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bgr_channels_are_swapped() {
        let bgr = vec![10, 20, 30, 40, 50, 60];
        let rgb = bgr_to_rgb(&bgr, 2, 1).unwrap();
        assert_eq!(rgb, vec![30, 20, 10, 60, 50, 40]);
    }

    #[test]
    fn gray_expands_to_three_channels() {
        let gray = vec![7, 9];
        let rgb = gray_to_rgb(&gray, 2, 1).unwrap();
        assert_eq!(rgb, vec![7, 7, 7, 9, 9, 9]);
    }

    #[test]
    fn raw_rgb_truncates_trailing_padding() {
        let data = vec![1, 2, 3, 4, 5, 6, 99, 99];
        let rgb = raw_rgb(&data, 2, 1).unwrap();
        assert_eq!(rgb, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn undersized_buffers_are_rejected() {
        assert!(raw_rgb(&[1, 2], 2, 2).is_err());
        assert!(bgr_to_rgb(&[1, 2], 2, 2).is_err());
        assert!(gray_to_rgb(&[1, 2], 2, 2).is_err());
        assert!(yuyv_to_rgb(&[1, 2], 2, 2).is_err());
        assert!(nv12_to_rgb(&[1, 2], 2, 2).is_err());
    }
}
