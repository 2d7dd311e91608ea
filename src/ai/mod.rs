//! AI service integration for theme extraction and image generation
//!
//! Defines the two provider capabilities the board pipeline depends on and
//! the factory that resolves configured provider ids to concrete clients.

pub mod factory;
pub mod mock;
pub mod openai;
pub mod piapi;

pub use factory::{ProviderRegistry, ServiceFactory};
pub use mock::{MockImageGenerator, MockTextProcessor};
pub use openai::{OpenAiImageGenerator, OpenAiTextProcessor};
pub use piapi::FluxImageGenerator;

use crate::models::{GenerationOptions, GenerationResult, ThemeExtractionResult};
use crate::{prompts, Result};
use async_trait::async_trait;
use std::fmt;

/// Turns a list of goals into an image prompt plus the visual elements it
/// was built from.
#[async_trait]
pub trait TextProcessingService: Send + Sync {
    async fn process_goals(&self, goals: &[String]) -> Result<ThemeExtractionResult>;
}

/// Renders a prompt into a provider-hosted image.
#[async_trait]
pub trait ImageGenerationService: Send + Sync {
    async fn generate_image(&self, options: &GenerationOptions) -> Result<GenerationResult>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapabilityKind {
    TextProcessing,
    ImageGeneration,
}

impl fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CapabilityKind::TextProcessing => f.write_str("text processing"),
            CapabilityKind::ImageGeneration => f.write_str("image generation"),
        }
    }
}

/// Split a model reply into visual elements: one per non-blank line, trimmed.
pub fn parse_visual_elements(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Compose the collage prompt sent to the image backend.
pub fn compose_board_prompt(goals: &[String], visual_elements: &[String]) -> String {
    prompts::render(
        prompts::BOARD_IMAGE,
        &[
            ("goals", &goals.join(", ")),
            ("elements", &prompts::bullet_list(visual_elements, "  ")),
        ],
    )
}
