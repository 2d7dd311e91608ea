use super::client::{OpenAiHttpClient, IMAGE_GENERATIONS_PATH};
use super::types::{ImageGenerationRequest, ImageGenerationResponse};
use crate::ai::ImageGenerationService;
use crate::models::{GenerationOptions, GenerationResult};
use crate::{Error, Result};
use async_trait::async_trait;
use std::time::Duration;

pub struct OpenAiImageGenerator {
    http: OpenAiHttpClient,
    model: String,
}

impl OpenAiImageGenerator {
    pub fn new_with_client(api_key: String, model: String, client: reqwest::Client) -> Self {
        Self {
            http: OpenAiHttpClient::new_with_client(api_key, Duration::from_secs(120), client),
            model,
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.http = self.http.with_base_url(base_url);
        self
    }
}

#[async_trait]
impl ImageGenerationService for OpenAiImageGenerator {
    async fn generate_image(&self, options: &GenerationOptions) -> Result<GenerationResult> {
        let (width, height) = options.size.dimensions();

        let request = ImageGenerationRequest {
            model: self.model.clone(),
            prompt: options.prompt.clone(),
            n: 1,
            size: format!("{}x{}", width, height),
            quality: options.quality.as_str().to_string(),
            style: options.style.clone(),
        };

        let response: ImageGenerationResponse =
            self.http.post(IMAGE_GENERATIONS_PATH, &request).await?;

        let image_data = response.data.into_iter().next().ok_or_else(|| {
            Error::GenerationFailed("No image data in OpenAI response".to_string())
        })?;

        // Hosted URLs expire; relocation picks up either form.
        let url = match (image_data.url, image_data.b64_json) {
            (Some(url), _) if !url.is_empty() => url,
            (_, Some(b64_json)) if !b64_json.is_empty() => {
                format!("data:image/png;base64,{}", b64_json)
            }
            _ => {
                return Err(Error::GenerationFailed(
                    "No image data (neither URL nor base64) in response".to_string(),
                ))
            }
        };

        Ok(GenerationResult::for_size(url, options.size))
    }
}
