//! Model provisioning: the ONNX files are fetched on first start into the
//! configured models directory and reused afterwards.

use std::{
    fs,
    io::{Read, Write},
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::blocking::Client;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModelKind {
    HandLandmark,
    Age,
}

impl ModelKind {
    fn filename(self) -> &'static str {
        match self {
            ModelKind::HandLandmark => "handpose_estimation_mediapipe_2023feb.onnx",
            ModelKind::Age => "age_googlenet.onnx",
        }
    }

    fn url(self) -> &'static str {
        match self {
            ModelKind::HandLandmark => {
                "https://raw.githubusercontent.com/opencv/opencv_zoo/main/models/handpose_estimation_mediapipe/handpose_estimation_mediapipe_2023feb.onnx"
            }
            ModelKind::Age => {
                "https://github.com/onnx/models/raw/main/validated/vision/body_analysis/age_gender/models/age_googlenet.onnx"
            }
        }
    }

    fn label(self) -> &'static str {
        match self {
            ModelKind::HandLandmark => "hand landmark",
            ModelKind::Age => "age classifier",
        }
    }
}

pub fn model_path(kind: ModelKind, dir: &Path) -> PathBuf {
    dir.join(kind.filename())
}

/// Downloads the model if it is missing. Present files are trusted as-is.
pub fn ensure_model_ready(kind: ModelKind, dir: &Path) -> anyhow::Result<PathBuf> {
    let dest = model_path(kind, dir);
    if dest.exists() {
        return Ok(dest);
    }

    fs::create_dir_all(dir)
        .with_context(|| format!("failed to create model directory {}", dir.display()))?;

    log::info!(
        "downloading {} model from {} to {}",
        kind.label(),
        kind.url(),
        dest.display()
    );

    let client = Client::new();
    let mut response = client
        .get(kind.url())
        .send()
        .context("failed to start model download")?
        .error_for_status()
        .context("model download returned error status")?;

    let progress = create_progress_bar(response.content_length());

    let tmp_path = dest.with_extension("download");
    let mut file = fs::File::create(&tmp_path)
        .with_context(|| format!("failed to create {}", tmp_path.display()))?;

    let mut downloaded: u64 = 0;
    let mut buffer = [0u8; 16 * 1024];
    loop {
        let bytes_read = response
            .read(&mut buffer)
            .context("failed while reading model bytes")?;
        if bytes_read == 0 {
            break;
        }
        file.write_all(&buffer[..bytes_read])
            .context("failed while writing model to disk")?;
        downloaded += bytes_read as u64;
        progress.set_position(downloaded);
    }

    file.sync_all()
        .context("failed to flush downloaded model to disk")?;
    fs::rename(&tmp_path, &dest).with_context(|| {
        format!(
            "failed to move temp model {} into place at {}",
            tmp_path.display(),
            dest.display()
        )
    })?;

    progress.finish_with_message(format!("{} model ready", kind.label()));
    Ok(dest)
}

fn create_progress_bar(total_size: Option<u64>) -> ProgressBar {
    match total_size {
        Some(total) if total > 0 => {
            let pb = ProgressBar::new(total);
            let style = ProgressStyle::with_template(
                "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {bytes}/{total_bytes} ({eta})",
            )
            .unwrap()
            .progress_chars("=>-");
            pb.set_style(style);
            pb
        }
        _ => {
            let pb = ProgressBar::new_spinner();
            let style = ProgressStyle::with_template("{spinner:.green} downloading model").unwrap();
            pb.set_style(style);
            pb.enable_steady_tick(Duration::from_millis(100));
            pb
        }
    }
}
