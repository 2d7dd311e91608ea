//! Vision board generation service
//!
//! Turns a list of personal goals into a generated collage image. Goals go
//! through an LLM for theme extraction, the resulting prompt through an image
//! backend, and the image is then copied into durable storage in the
//! background while the client already has its record.

pub mod ai;
pub mod app;
pub mod boards;
pub mod db;
pub mod error;
pub mod feedback;
pub mod image;
pub mod models;
pub mod prompts;
pub mod relocate;
pub mod server;
pub mod storage;

pub use error::{Error, Result};
