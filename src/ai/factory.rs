//! Provider registry for the AI capabilities.
//!
//! Each capability kind owns a [`ProviderRegistry`]: a table of constructors
//! keyed by provider id plus a cache of instances built from them. The first
//! resolution of a provider constructs it; later resolutions return the same
//! `Arc`. The factory is an ordinary value built at startup and handed to the
//! services that need it.

use super::{
    CapabilityKind, FluxImageGenerator, ImageGenerationService, OpenAiImageGenerator,
    OpenAiTextProcessor, TextProcessingService,
};
use crate::models::Config;
use crate::{Error, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::info;

type Constructor<T> = Box<dyn Fn() -> Result<Arc<T>> + Send + Sync>;

pub struct ProviderRegistry<T: ?Sized> {
    kind: CapabilityKind,
    constructors: HashMap<String, Constructor<T>>,
    instances: Mutex<HashMap<String, Arc<T>>>,
}

impl<T: ?Sized> ProviderRegistry<T> {
    pub fn new(kind: CapabilityKind) -> Self {
        Self {
            kind,
            constructors: HashMap::new(),
            instances: Mutex::new(HashMap::new()),
        }
    }

    pub fn register<F>(&mut self, provider: impl Into<String>, constructor: F)
    where
        F: Fn() -> Result<Arc<T>> + Send + Sync + 'static,
    {
        self.constructors
            .insert(provider.into(), Box::new(constructor));
    }

    /// Return the cached instance for `provider`, constructing it on first use.
    ///
    /// The cache lock is held across construction so a provider is built at
    /// most once. Unknown providers and failed constructions leave the cache
    /// untouched.
    pub fn resolve(&self, provider: &str) -> Result<Arc<T>> {
        let mut instances = self
            .instances
            .lock()
            .map_err(|_| Error::Invariant(format!("{} provider cache poisoned", self.kind)))?;

        if let Some(instance) = instances.get(provider) {
            return Ok(Arc::clone(instance));
        }

        let constructor =
            self.constructors
                .get(provider)
                .ok_or_else(|| Error::UnsupportedProvider {
                    kind: self.kind,
                    provider: provider.to_string(),
                })?;

        let instance = constructor()?;
        info!("Initialized {} provider: {}", self.kind, provider);
        instances.insert(provider.to_string(), Arc::clone(&instance));
        Ok(instance)
    }

    /// Registered provider ids, sorted.
    pub fn providers(&self) -> Vec<&str> {
        let mut providers: Vec<&str> = self.constructors.keys().map(String::as_str).collect();
        providers.sort_unstable();
        providers
    }
}

pub struct ServiceFactory {
    text_processors: ProviderRegistry<dyn TextProcessingService>,
    image_generators: ProviderRegistry<dyn ImageGenerationService>,
}

impl Default for ServiceFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceFactory {
    /// An empty factory with no providers registered.
    pub fn new() -> Self {
        Self {
            text_processors: ProviderRegistry::new(CapabilityKind::TextProcessing),
            image_generators: ProviderRegistry::new(CapabilityKind::ImageGeneration),
        }
    }

    /// Register the built-in providers using credentials from `config`.
    ///
    /// Text: `openai`. Image: `openai`, `flux`. All clients share `http`.
    pub fn from_config(config: &Config, http: reqwest::Client) -> Self {
        let mut factory = Self::new();

        {
            let api_key = config.openai_api_key.clone();
            let model = config.openai_chat_model.clone();
            let http = http.clone();
            factory.register_text_processor("openai", move || {
                let api_key = require_key(&api_key, "OPENAI_API_KEY")?;
                Ok(Arc::new(OpenAiTextProcessor::new_with_client(
                    api_key,
                    model.clone(),
                    http.clone(),
                )) as Arc<dyn TextProcessingService>)
            });
        }

        {
            let api_key = config.openai_api_key.clone();
            let model = config.openai_image_model.clone();
            let http = http.clone();
            factory.register_image_generator("openai", move || {
                let api_key = require_key(&api_key, "OPENAI_API_KEY")?;
                Ok(Arc::new(OpenAiImageGenerator::new_with_client(
                    api_key,
                    model.clone(),
                    http.clone(),
                )) as Arc<dyn ImageGenerationService>)
            });
        }

        {
            let api_key = config.pi_api_key.clone();
            let model = config.flux_model.clone();
            let max_polls = config.flux_max_polls;
            factory.register_image_generator("flux", move || {
                let api_key = require_key(&api_key, "PI_API_KEY")?;
                Ok(Arc::new(
                    FluxImageGenerator::new_with_client(api_key, model.clone(), http.clone())
                        .with_max_polls(max_polls),
                ) as Arc<dyn ImageGenerationService>)
            });
        }

        factory
    }

    pub fn register_text_processor<F>(&mut self, provider: impl Into<String>, constructor: F)
    where
        F: Fn() -> Result<Arc<dyn TextProcessingService>> + Send + Sync + 'static,
    {
        self.text_processors.register(provider, constructor);
    }

    pub fn register_image_generator<F>(&mut self, provider: impl Into<String>, constructor: F)
    where
        F: Fn() -> Result<Arc<dyn ImageGenerationService>> + Send + Sync + 'static,
    {
        self.image_generators.register(provider, constructor);
    }

    pub fn text_processor(&self, provider: &str) -> Result<Arc<dyn TextProcessingService>> {
        self.text_processors.resolve(provider)
    }

    pub fn image_generator(&self, provider: &str) -> Result<Arc<dyn ImageGenerationService>> {
        self.image_generators.resolve(provider)
    }

    pub fn text_providers(&self) -> Vec<&str> {
        self.text_processors.providers()
    }

    pub fn image_providers(&self) -> Vec<&str> {
        self.image_generators.providers()
    }
}

fn require_key(key: &Option<String>, name: &str) -> Result<String> {
    key.clone()
        .ok_or_else(|| Error::Config(format!("{} not set", name)))
}
