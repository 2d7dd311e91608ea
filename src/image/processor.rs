use super::ImageService;
use crate::{Error, Result};
use async_trait::async_trait;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};

#[derive(Debug, Default, Clone, Copy)]
pub struct PngNormalizer;

impl PngNormalizer {
    pub fn new() -> Self {
        Self
    }

    /// Decode and re-encode in one go. Both halves are CPU bound.
    fn normalize_sync(image_data: Vec<u8>) -> Result<Vec<u8>> {
        let image = image::load_from_memory(&image_data)?;
        drop(image_data);

        let mut bytes = Vec::new();
        let encoder =
            PngEncoder::new_with_quality(&mut bytes, CompressionType::Best, FilterType::Adaptive);
        image.write_with_encoder(encoder)?;
        Ok(bytes)
    }
}

#[async_trait]
impl ImageService for PngNormalizer {
    async fn normalize(&self, image_data: Vec<u8>) -> Result<Vec<u8>> {
        tokio::task::spawn_blocking(move || Self::normalize_sync(image_data))
            .await
            .map_err(|e| Error::Invariant(format!("Image normalize task join error: {}", e)))?
    }
}
