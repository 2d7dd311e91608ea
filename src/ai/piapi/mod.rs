//! PiAPI task-queue client for Flux image generation.
//!
//! Flux requests are asynchronous: a submission returns a task id and the
//! result is collected by polling the task until it completes or fails.

pub mod client;
pub mod image;
pub mod types;

pub use client::PiApiHttpClient;
pub use image::FluxImageGenerator;
