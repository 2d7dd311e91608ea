//! Relocation of provider-hosted images into durable storage
//!
//! Provider URLs expire. [`AssetRelocator`] copies an image (remote URL or
//! inline `data:` URL) into the bucket as PNG and returns a signed URL for
//! it. [`RelocationQueue`] runs relocations after the client has been
//! answered and patches the owning record when they succeed.

pub mod queue;

pub use queue::{RelocationJob, RelocationQueue, RelocationTarget, RelocationWorker};

use crate::image::{ImageService, PNG_CONTENT_TYPE};
use crate::storage::ObjectStorage;
use crate::{Error, Result};
use base64::Engine as _;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

pub struct AssetRelocator {
    http: reqwest::Client,
    images: Arc<dyn ImageService>,
    storage: Arc<dyn ObjectStorage>,
    signed_url_ttl: Duration,
}

impl AssetRelocator {
    pub fn new(
        http: reqwest::Client,
        images: Arc<dyn ImageService>,
        storage: Arc<dyn ObjectStorage>,
        signed_url_ttl: Duration,
    ) -> Self {
        Self {
            http,
            images,
            storage,
            signed_url_ttl,
        }
    }

    /// Copy the image at `source_url` to `destination_key` and return a
    /// signed GET URL for the stored object.
    pub async fn relocate(&self, source_url: &str, destination_key: &str) -> Result<String> {
        let source = self.fetch(source_url).await?;
        debug!("Fetched {} bytes for {}", source.len(), destination_key);

        let png = self.images.normalize(source).await?;
        self.storage
            .put_object(destination_key, png, PNG_CONTENT_TYPE)
            .await?;
        info!("Uploaded {}", destination_key);

        self.storage
            .presign_get(destination_key, self.signed_url_ttl)
            .await
    }

    async fn fetch(&self, source_url: &str) -> Result<Vec<u8>> {
        if let Some(data_url) = source_url.strip_prefix("data:") {
            return decode_data_url(data_url);
        }

        let response = self
            .http
            .get(source_url)
            .send()
            .await
            .map_err(|e| Error::FetchFailed(format!("{}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::FetchFailed(format!(
                "source responded with status {}",
                status
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::FetchFailed(format!("{}", e)))?;
        Ok(bytes.to_vec())
    }
}

/// Decode the part of a `data:` URL after the scheme.
fn decode_data_url(data_url: &str) -> Result<Vec<u8>> {
    let (header, payload) = data_url
        .split_once(',')
        .ok_or_else(|| Error::FetchFailed("malformed data URL".to_string()))?;

    if !header.ends_with(";base64") {
        return Err(Error::FetchFailed(
            "only base64 data URLs are supported".to_string(),
        ));
    }

    base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|e| Error::FetchFailed(format!("invalid base64 payload: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::PngNormalizer;
    use crate::storage::MockObjectStorage;
    use base64::Engine as _;
    use image::ImageFormat;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn jpeg_bytes() -> Vec<u8> {
        let img = image::RgbImage::from_pixel(6, 6, image::Rgb([200, 30, 30]));
        let mut bytes = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut bytes), ImageFormat::Jpeg)
            .unwrap();
        bytes
    }

    fn relocator(storage: &MockObjectStorage) -> AssetRelocator {
        AssetRelocator::new(
            reqwest::Client::new(),
            Arc::new(PngNormalizer::new()),
            Arc::new(storage.clone()),
            Duration::from_secs(604_800),
        )
    }

    #[tokio::test]
    async fn test_relocate_remote_image_uploads_png_and_signs() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tmp/board.jpg"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(jpeg_bytes()))
            .mount(&server)
            .await;

        let storage = MockObjectStorage::new();
        let url = relocator(&storage)
            .relocate(
                &format!("{}/tmp/board.jpg", server.uri()),
                "vision-boards/abc-1.png",
            )
            .await
            .unwrap();

        assert_eq!(
            url,
            "https://mock-bucket.example.com/vision-boards/abc-1.png?expires=604800"
        );
        let stored = storage.get_object("vision-boards/abc-1.png").unwrap();
        assert_eq!(image::guess_format(&stored).unwrap(), ImageFormat::Png);
    }

    #[tokio::test]
    async fn test_relocate_data_url() {
        let encoded = base64::engine::general_purpose::STANDARD.encode(jpeg_bytes());
        let storage = MockObjectStorage::new();

        relocator(&storage)
            .relocate(
                &format!("data:image/jpeg;base64,{}", encoded),
                "generated-images/x.png",
            )
            .await
            .unwrap();

        assert_eq!(storage.get_keys(), vec!["generated-images/x.png"]);
    }

    #[tokio::test]
    async fn test_relocate_non_success_source_is_fetch_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let storage = MockObjectStorage::new();
        let err = relocator(&storage)
            .relocate(&format!("{}/expired.png", server.uri()), "k.png")
            .await
            .unwrap_err();

        assert!(matches!(err, Error::FetchFailed(_)));
        assert_eq!(storage.get_upload_count(), 0);
    }

    #[tokio::test]
    async fn test_relocate_upload_failure() {
        let encoded = base64::engine::general_purpose::STANDARD.encode(jpeg_bytes());
        let storage = MockObjectStorage::new().with_failure(true);

        let err = relocator(&storage)
            .relocate(&format!("data:image/jpeg;base64,{}", encoded), "k.png")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UploadFailed(_)));
    }

    #[test]
    fn test_decode_data_url_rejects_plain_payload() {
        assert!(matches!(
            decode_data_url("text/plain,hello"),
            Err(Error::FetchFailed(_))
        ));
        assert!(matches!(
            decode_data_url("image/png;base64,@@@"),
            Err(Error::FetchFailed(_))
        ));
    }
}
