//! gesture-stream
//!
//! Live-video signal service: a background analysis loop derives a hand
//! gesture label and a dominant clothing color from the camera and pushes
//! changes to WebSocket subscribers; an independent on-demand endpoint
//! classifies a coarse age category.

pub mod age;
pub mod analysis;
pub mod color;
pub mod config;
pub mod detect;
pub mod gesture;
pub mod models;
pub mod pipeline;
pub mod server;
pub mod signals;
pub mod types;
