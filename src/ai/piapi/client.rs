use super::types::{TaskEnvelope, TaskRequest};
use crate::{Error, Result};
use reqwest::Client;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.piapi.ai";
const TASK_PATH: &str = "/api/v1/task";

pub struct PiApiHttpClient {
    client: Client,
    api_key: String,
    base_url: String,
    timeout: Duration,
}

impl PiApiHttpClient {
    pub fn new_with_client(api_key: String, timeout: Duration, client: Client) -> Self {
        Self {
            client,
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout,
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub async fn submit_task(&self, request: &TaskRequest) -> Result<TaskEnvelope> {
        let response = self
            .client
            .post(format!("{}{}", self.base_url, TASK_PATH))
            .timeout(self.timeout)
            .header("X-API-Key", &self.api_key)
            .json(request)
            .send()
            .await?;
        Self::read_envelope(response).await
    }

    pub async fn get_task(&self, task_id: &str) -> Result<TaskEnvelope> {
        let response = self
            .client
            .get(format!("{}{}/{}", self.base_url, TASK_PATH, task_id))
            .timeout(self.timeout)
            .header("X-API-Key", &self.api_key)
            .send()
            .await?;
        Self::read_envelope(response).await
    }

    async fn read_envelope(response: reqwest::Response) -> Result<TaskEnvelope> {
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            tracing::error!("PiAPI error (status {}): {}", status, body);
            return Err(Error::AiProvider(format!(
                "PiAPI error (status {}): {}",
                status, body
            )));
        }

        serde_json::from_str(&body).map_err(|e| {
            tracing::error!("Failed to parse PiAPI response: {}\nBody: {}", e, body);
            Error::AiProvider(format!("Failed to parse PiAPI response: {}", e))
        })
    }
}
