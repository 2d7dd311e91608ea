use super::client::{OpenAiHttpClient, CHAT_COMPLETIONS_PATH};
use super::types::{ChatCompletionRequest, ChatCompletionResponse, ChatMessage};
use crate::ai::{compose_board_prompt, parse_visual_elements, TextProcessingService};
use crate::models::ThemeExtractionResult;
use crate::{prompts, Error, Result};
use async_trait::async_trait;
use std::time::Duration;

const TEMPERATURE: f32 = 0.3;

pub struct OpenAiTextProcessor {
    http: OpenAiHttpClient,
    model: String,
}

impl OpenAiTextProcessor {
    pub fn new_with_client(api_key: String, model: String, client: reqwest::Client) -> Self {
        Self {
            http: OpenAiHttpClient::new_with_client(api_key, Duration::from_secs(60), client),
            model,
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.http = self.http.with_base_url(base_url);
        self
    }
}

#[async_trait]
impl TextProcessingService for OpenAiTextProcessor {
    async fn process_goals(&self, goals: &[String]) -> Result<ThemeExtractionResult> {
        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage::new("system", prompts::THEME_SYSTEM.trim_end()),
                ChatMessage::new(
                    "user",
                    prompts::render(
                        prompts::THEME_USER,
                        &[("goals", &prompts::bullet_list(goals, ""))],
                    ),
                ),
            ],
            temperature: TEMPERATURE,
        };

        let response: ChatCompletionResponse =
            self.http.post(CHAT_COMPLETIONS_PATH, &request).await?;

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| {
                Error::ExtractionFailed("No content in OpenAI chat response".to_string())
            })?;

        let visual_elements = parse_visual_elements(&content);
        if visual_elements.is_empty() {
            return Err(Error::ExtractionFailed(
                "Model reply contained no visual elements".to_string(),
            ));
        }

        tracing::debug!(
            "Extracted {} visual elements from {} goals",
            visual_elements.len(),
            goals.len()
        );

        Ok(ThemeExtractionResult {
            prompt: compose_board_prompt(goals, &visual_elements),
            visual_elements,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn processor(server: &MockServer) -> OpenAiTextProcessor {
        OpenAiTextProcessor::new_with_client(
            "test-key".to_string(),
            "gpt-4-0125-preview".to_string(),
            reqwest::Client::new(),
        )
        .with_base_url(server.uri())
    }

    fn goals() -> Vec<String> {
        vec!["run a marathon".to_string(), "learn guitar".to_string()]
    }

    #[tokio::test]
    async fn test_process_goals_parses_lines() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("Authorization", "Bearer test-key"))
            .and(body_partial_json(serde_json::json!({
                "model": "gpt-4-0125-preview",
                "temperature": 0.3
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{
                    "message": {
                        "role": "assistant",
                        "content": "runner at sunrise\n\n  acoustic guitar in practice room  \n"
                    },
                    "finish_reason": "stop"
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let result = processor(&server).process_goals(&goals()).await.unwrap();

        assert_eq!(
            result.visual_elements,
            vec!["runner at sunrise", "acoustic guitar in practice room"]
        );
        assert!(result.prompt.contains("run a marathon, learn guitar"));
        assert!(result.prompt.contains("- runner at sunrise"));
    }

    #[tokio::test]
    async fn test_process_goals_sends_goals_in_user_message() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{ "message": { "role": "assistant", "content": "a" } }]
            })))
            .mount(&server)
            .await;

        processor(&server).process_goals(&goals()).await.unwrap();

        let requests = server.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        let user = body["messages"][1]["content"].as_str().unwrap();
        assert_eq!(body["messages"][0]["role"], "system");
        assert!(user.contains("- run a marathon\n- learn guitar"));
    }

    #[tokio::test]
    async fn test_process_goals_blank_reply_is_extraction_failure() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{ "message": { "role": "assistant", "content": "  \n \n" } }]
            })))
            .mount(&server)
            .await;

        let err = processor(&server).process_goals(&goals()).await.unwrap_err();
        assert!(matches!(err, Error::ExtractionFailed(_)));
    }

    #[tokio::test]
    async fn test_process_goals_no_choices_is_extraction_failure() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "choices": [] })),
            )
            .mount(&server)
            .await;

        let err = processor(&server).process_goals(&goals()).await.unwrap_err();
        assert!(matches!(err, Error::ExtractionFailed(_)));
    }

    #[tokio::test]
    async fn test_process_goals_upstream_error_carries_message() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_json(serde_json::json!({
                "error": { "message": "Rate limit reached" }
            })))
            .mount(&server)
            .await;

        let err = processor(&server).process_goals(&goals()).await.unwrap_err();
        match err {
            Error::AiProvider(message) => assert_eq!(message, "Rate limit reached"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
