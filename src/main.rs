use std::{
    path::PathBuf,
    sync::{Arc, Mutex},
};

use anyhow::{Context, Result};
use nokhwa::utils::CameraIndex;
use tokio::net::TcpListener;

use gesture_stream::{
    analysis::AnalysisLoop,
    config::Config,
    detect::{OrtAgeClassifier, OrtHandDetector},
    models::{self, ModelKind},
    pipeline::camera::CameraSource,
    server::{self, AppState},
    signals::SignalStore,
};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = Config::load(config_path.as_deref())?;

    let store = SignalStore::new();
    let camera_index = config.camera.index;

    // Model downloads, session builds and the camera probe all block; keep
    // them off the runtime workers.
    let (source, detector, age_model) = {
        let config = config.clone();
        tokio::task::spawn_blocking(move || {
            let source = CameraSource::open(
                CameraIndex::Index(config.camera.index),
                config.camera.read_timeout(),
            );
            if !source.is_live() {
                log::error!("starting without a live camera; signals stay at waiting/unknown");
            }

            let hand_path = models::ensure_model_ready(ModelKind::HandLandmark, &config.models.dir)
                .unwrap_or_else(|err| {
                    log::error!("hand landmark model download failed: {err:?}");
                    models::model_path(ModelKind::HandLandmark, &config.models.dir)
                });
            let detector = OrtHandDetector::load(&hand_path);

            let age_model = models::ensure_model_ready(ModelKind::Age, &config.models.dir)
                .and_then(|path| OrtAgeClassifier::load(&path));
            let age_model = match age_model {
                Ok(classifier) => Some(classifier),
                Err(err) => {
                    log::error!("age model unavailable: {err:?}");
                    None
                }
            };

            (source, detector, age_model)
        })
        .await
        .context("startup task panicked")?
    };

    let loop_handle = AnalysisLoop::new(source, detector, store.clone(), &config.analysis).spawn();

    let state = AppState {
        store,
        age_model: Arc::new(Mutex::new(age_model)),
        camera_index,
        gesture_poll: config.push.gesture_poll(),
        color_poll: config.push.color_poll(),
    };

    let listener = TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.server.bind))?;
    log::info!("serving on {}", config.server.bind);

    axum::serve(listener, server::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Stops the producer thread and joins it; the capture device is released
    // with the frame source it owns.
    loop_handle.stop();
    log::info!("resources released");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        log::error!("failed to listen for shutdown signal: {err}");
    }
}
