//! Data models and structures
//!
//! Defines the request/result value types passed between the generation
//! services, the persisted document shapes, and the environment-driven
//! service configuration.

use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

/// Target aspect of a generated image.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TargetSize {
    Phone,
    Laptop,
    Normal,
}

impl TargetSize {
    /// Fixed pixel dimensions `(width, height)` for each target.
    pub fn dimensions(self) -> (u32, u32) {
        match self {
            TargetSize::Phone => (1024, 1792),
            TargetSize::Laptop => (1792, 1024),
            TargetSize::Normal => (1024, 1024),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TargetSize::Phone => "phone",
            TargetSize::Laptop => "laptop",
            TargetSize::Normal => "normal",
        }
    }
}

impl fmt::Display for TargetSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetSize {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "phone" => Ok(TargetSize::Phone),
            "laptop" => Ok(TargetSize::Laptop),
            "normal" => Ok(TargetSize::Normal),
            other => Err(Error::Validation(format!(
                "Size must be one of phone, laptop, normal (got '{}')",
                other
            ))),
        }
    }
}

/// Raw, unvalidated body of a board creation request.
///
/// Fields are kept loosely typed so that shape errors surface as
/// [`Error::Validation`] instead of a deserializer rejection.
#[derive(Debug, Default, Deserialize)]
pub struct CreateBoardPayload {
    pub size: Option<serde_json::Value>,
    pub goals: Option<serde_json::Value>,
}

/// A validated board creation request.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub goals: Vec<String>,
    pub size: TargetSize,
}

impl TryFrom<CreateBoardPayload> for GenerationRequest {
    type Error = Error;

    fn try_from(payload: CreateBoardPayload) -> Result<Self> {
        let goals = match payload.goals {
            Some(serde_json::Value::Array(items)) if !items.is_empty() => items,
            _ => {
                return Err(Error::Validation(
                    "Goals must be a non-empty array".to_string(),
                ))
            }
        };

        let goals = goals
            .into_iter()
            .map(|goal| match goal {
                serde_json::Value::String(text) if !text.trim().is_empty() => Ok(text),
                _ => Err(Error::Validation(
                    "Each goal must be a non-empty string".to_string(),
                )),
            })
            .collect::<Result<Vec<_>>>()?;

        let size = match payload.size {
            Some(serde_json::Value::String(size)) => size.parse()?,
            _ => {
                return Err(Error::Validation(
                    "Size must be one of phone, laptop, normal".to_string(),
                ))
            }
        };

        Ok(Self { goals, size })
    }
}

/// Raw body of a single-prompt image request.
#[derive(Debug, Default, Deserialize)]
pub struct CreateImagePayload {
    pub prompt: Option<String>,
}

/// Raw body of a feedback submission.
#[derive(Debug, Default, Deserialize)]
pub struct FeedbackPayload {
    pub email: Option<String>,
    pub suggestion: Option<String>,
}

/// Output of theme extraction: the composed image prompt and the visual
/// elements it was built from.
#[derive(Debug, Clone, PartialEq)]
pub struct ThemeExtractionResult {
    pub prompt: String,
    pub visual_elements: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ImageQuality {
    Standard,
    #[default]
    Hd,
}

impl ImageQuality {
    pub fn as_str(self) -> &'static str {
        match self {
            ImageQuality::Standard => "standard",
            ImageQuality::Hd => "hd",
        }
    }
}

/// Everything an image backend needs to render one image.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationOptions {
    pub prompt: String,
    pub size: TargetSize,
    pub quality: ImageQuality,
    pub style: String,
}

impl GenerationOptions {
    pub fn new(prompt: impl Into<String>, size: TargetSize) -> Self {
        Self {
            prompt: prompt.into(),
            size,
            quality: ImageQuality::default(),
            style: "natural".to_string(),
        }
    }

    pub fn with_quality(mut self, quality: ImageQuality) -> Self {
        self.quality = quality;
        self
    }

    pub fn with_style(mut self, style: impl Into<String>) -> Self {
        self.style = style.into();
        self
    }
}

/// A provider-hosted image plus the dimensions the service asked for.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationResult {
    pub url: String,
    pub width: u32,
    pub height: u32,
}

impl GenerationResult {
    pub fn for_size(url: String, size: TargetSize) -> Self {
        let (width, height) = size.dimensions();
        Self { url, width, height }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BoardRecord {
    pub id: Uuid,
    pub size: TargetSize,
    pub goals: Vec<String>,
    pub image_url: String,
    pub is_relocated: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BoardRecord {
    pub fn new(request: GenerationRequest, image_url: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            size: request.size,
            goals: request.goals,
            image_url,
            is_relocated: false,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedImageRecord {
    pub id: Uuid,
    pub prompt: String,
    pub size: TargetSize,
    pub image_url: String,
    pub is_relocated: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl GeneratedImageRecord {
    pub fn new(prompt: String, size: TargetSize, image_url: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            prompt,
            size,
            image_url,
            is_relocated: false,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackRecord {
    pub id: Uuid,
    pub email: String,
    pub suggestion: String,
    pub created_at: DateTime<Utc>,
}

impl FeedbackRecord {
    pub fn new(email: &str, suggestion: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            email: email.trim().to_lowercase(),
            suggestion: suggestion.trim().to_string(),
            created_at: Utc::now(),
        }
    }
}

/// S3 refuses presigned URLs that live longer than seven days.
pub const MAX_SIGNED_URL_TTL_SECS: u64 = 7 * 24 * 60 * 60;

// Configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub allowed_origins: Vec<String>,
    pub development: bool,
    pub text_processor: String,
    pub image_generator: String,
    pub openai_api_key: Option<String>,
    pub openai_chat_model: String,
    pub openai_image_model: String,
    pub pi_api_key: Option<String>,
    pub flux_model: String,
    pub flux_max_polls: Option<usize>,
    pub aws_region: String,
    pub aws_access_key_id: Option<String>,
    pub aws_secret_access_key: Option<String>,
    pub aws_bucket: String,
    pub aws_endpoint_url: Option<String>,
    pub signed_url_ttl: Duration,
    pub rate_limit_window: Duration,
    pub rate_limit_max: u64,
    pub trust_proxy: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary variable source. Empty values count as
    /// unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let get_or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let signed_url_ttl_secs: u64 = parse_var(&get, "SIGNED_URL_TTL_SECS")?
            .unwrap_or(MAX_SIGNED_URL_TTL_SECS);
        if signed_url_ttl_secs == 0 || signed_url_ttl_secs > MAX_SIGNED_URL_TTL_SECS {
            return Err(Error::Config(format!(
                "SIGNED_URL_TTL_SECS must be between 1 and {}",
                MAX_SIGNED_URL_TTL_SECS
            )));
        }

        let rate_limit_window_secs: u64 =
            parse_var(&get, "RATE_LIMIT_WINDOW_SECS")?.unwrap_or(60);
        if rate_limit_window_secs == 0 {
            return Err(Error::Config(
                "RATE_LIMIT_WINDOW_SECS must be positive".to_string(),
            ));
        }

        Ok(Self {
            port: parse_var(&get, "PORT")?.unwrap_or(3001),
            database_url: get_or("DATABASE_URL", "sqlite:vision-board.db?mode=rwc"),
            allowed_origins: get_or("FRONTEND_URL", "http://localhost:3000")
                .split(',')
                .map(|origin| origin.trim().to_string())
                .filter(|origin| !origin.is_empty())
                .collect(),
            development: get("APP_ENV").is_some_and(|env| env == "development"),
            text_processor: get_or("TEXT_PROCESSOR", "openai"),
            image_generator: get_or("TEXT_TO_IMAGE_GENERATOR", "openai"),
            openai_api_key: get("OPENAI_API_KEY"),
            openai_chat_model: get_or("OPENAI_CHAT_MODEL", "gpt-4-0125-preview"),
            openai_image_model: get_or("OPENAI_IMAGE_MODEL", "dall-e-3"),
            pi_api_key: get("PI_API_KEY"),
            flux_model: get_or("FLUX_MODEL", "Qubico/flux1-dev"),
            flux_max_polls: parse_var(&get, "FLUX_MAX_POLLS")?,
            aws_region: get_or("AWS_REGION", "us-east-1"),
            aws_access_key_id: get("AWS_ACCESS_KEY_ID"),
            aws_secret_access_key: get("AWS_SECRET_ACCESS_KEY"),
            aws_bucket: get("AWS_S3_BUCKET")
                .ok_or_else(|| Error::Config("AWS_S3_BUCKET not set".to_string()))?,
            aws_endpoint_url: get("AWS_ENDPOINT_URL"),
            signed_url_ttl: Duration::from_secs(signed_url_ttl_secs),
            rate_limit_window: Duration::from_secs(rate_limit_window_secs),
            rate_limit_max: parse_var(&get, "RATE_LIMIT_MAX")?.unwrap_or(2),
            trust_proxy: parse_var(&get, "TRUST_PROXY")?.unwrap_or(false),
        })
    }
}

fn parse_var<T, G>(get: &G, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    get(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| Error::Config(format!("{} is invalid ('{}'): {}", key, raw, e)))
        })
        .transpose()
}
