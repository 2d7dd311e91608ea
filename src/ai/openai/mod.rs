pub mod client;
pub mod image;
pub mod text;
pub mod types;

pub use image::OpenAiImageGenerator;
pub use text::OpenAiTextProcessor;
