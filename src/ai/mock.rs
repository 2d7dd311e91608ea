use super::{compose_board_prompt, ImageGenerationService, TextProcessingService};
use crate::models::{GenerationOptions, GenerationResult, ThemeExtractionResult};
use crate::{Error, Result};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

#[derive(Clone)]
pub struct MockTextProcessor {
    element_responses: Arc<Mutex<Vec<Vec<String>>>>,
    should_fail: Arc<Mutex<bool>>,
    call_count: Arc<Mutex<usize>>,
}

impl MockTextProcessor {
    pub fn new() -> Self {
        Self {
            element_responses: Arc::new(Mutex::new(Vec::new())),
            should_fail: Arc::new(Mutex::new(false)),
            call_count: Arc::new(Mutex::new(0)),
        }
    }

    pub fn with_elements(self, elements: Vec<String>) -> Self {
        self.element_responses.lock().unwrap().push(elements);
        self
    }

    pub fn with_failure(self, should_fail: bool) -> Self {
        *self.should_fail.lock().unwrap() = should_fail;
        self
    }

    pub fn get_call_count(&self) -> usize {
        *self.call_count.lock().unwrap()
    }
}

impl Default for MockTextProcessor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TextProcessingService for MockTextProcessor {
    async fn process_goals(&self, goals: &[String]) -> Result<ThemeExtractionResult> {
        let mut count = self.call_count.lock().unwrap();
        *count += 1;

        if *self.should_fail.lock().unwrap() {
            return Err(Error::ExtractionFailed("Mock failure".to_string()));
        }

        let responses = self.element_responses.lock().unwrap();
        let visual_elements = if responses.is_empty() {
            goals.iter().map(|goal| format!("picture of {}", goal)).collect()
        } else {
            let index = (*count - 1) % responses.len();
            responses[index].clone()
        };

        if visual_elements.is_empty() {
            return Err(Error::ExtractionFailed(
                "Model reply contained no visual elements".to_string(),
            ));
        }

        Ok(ThemeExtractionResult {
            prompt: compose_board_prompt(goals, &visual_elements),
            visual_elements,
        })
    }
}

#[derive(Clone)]
pub struct MockImageGenerator {
    url_responses: Arc<Mutex<Vec<String>>>,
    should_fail: Arc<Mutex<bool>>,
    call_count: Arc<Mutex<usize>>,
    last_options: Arc<Mutex<Option<GenerationOptions>>>,
}

impl MockImageGenerator {
    pub fn new() -> Self {
        Self {
            url_responses: Arc::new(Mutex::new(Vec::new())),
            should_fail: Arc::new(Mutex::new(false)),
            call_count: Arc::new(Mutex::new(0)),
            last_options: Arc::new(Mutex::new(None)),
        }
    }

    pub fn with_url_response(self, url: String) -> Self {
        self.url_responses.lock().unwrap().push(url);
        self
    }

    pub fn with_failure(self, should_fail: bool) -> Self {
        *self.should_fail.lock().unwrap() = should_fail;
        self
    }

    pub fn get_call_count(&self) -> usize {
        *self.call_count.lock().unwrap()
    }

    pub fn last_options(&self) -> Option<GenerationOptions> {
        self.last_options.lock().unwrap().clone()
    }
}

impl Default for MockImageGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ImageGenerationService for MockImageGenerator {
    async fn generate_image(&self, options: &GenerationOptions) -> Result<GenerationResult> {
        let mut count = self.call_count.lock().unwrap();
        *count += 1;
        *self.last_options.lock().unwrap() = Some(options.clone());

        if *self.should_fail.lock().unwrap() {
            return Err(Error::GenerationFailed("Mock failure".to_string()));
        }

        let responses = self.url_responses.lock().unwrap();
        let url = if responses.is_empty() {
            format!("https://mock-images.example.com/{}.png", *count)
        } else {
            let index = (*count - 1) % responses.len();
            responses[index].clone()
        };

        Ok(GenerationResult::for_size(url, options.size))
    }
}
