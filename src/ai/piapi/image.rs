use super::client::PiApiHttpClient;
use super::types::{TaskData, TaskEnvelope, TaskInput, TaskRequest, TaskStatus};
use crate::ai::ImageGenerationService;
use crate::models::{GenerationOptions, GenerationResult};
use crate::{Error, Result};
use async_trait::async_trait;
use std::time::Duration;
use tokio_retry::strategy::FixedInterval;
use tokio_retry::RetryIf;
use tracing::{debug, info, warn};

const TASK_TYPE: &str = "txt2img";
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

enum PollError {
    Pending(String),
    Terminal(Error),
}

pub struct FluxImageGenerator {
    http: PiApiHttpClient,
    model: String,
    poll_interval: Duration,
    max_polls: Option<usize>,
}

impl FluxImageGenerator {
    pub fn new_with_client(api_key: String, model: String, client: reqwest::Client) -> Self {
        Self {
            http: PiApiHttpClient::new_with_client(api_key, Duration::from_secs(30), client),
            model,
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_polls: None,
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.http = self.http.with_base_url(base_url);
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Cap the number of status lookups. `None` polls until the task
    /// reaches a terminal state.
    pub fn with_max_polls(mut self, max_polls: Option<usize>) -> Self {
        self.max_polls = max_polls;
        self
    }

    async fn poll_once(&self, task_id: &str) -> std::result::Result<String, PollError> {
        let envelope = self
            .http
            .get_task(task_id)
            .await
            .map_err(PollError::Terminal)?;
        let data = envelope.data.ok_or_else(|| {
            PollError::Terminal(Error::GenerationFailed(format!(
                "Task {} lookup returned no data",
                task_id
            )))
        })?;

        match data.status {
            TaskStatus::InProgress(ref status) => {
                debug!("Flux task {} still {}", task_id, status);
                Err(PollError::Pending(status.clone()))
            }
            _ => settle(data).map_err(PollError::Terminal),
        }
    }

    async fn wait_for_task(&self, task_id: &str) -> Result<String> {
        tokio::time::sleep(self.poll_interval).await;

        let strategy: Box<dyn Iterator<Item = Duration> + Send> = match self.max_polls {
            Some(max) => Box::new(
                FixedInterval::new(self.poll_interval).take(max.saturating_sub(1)),
            ),
            None => Box::new(FixedInterval::new(self.poll_interval)),
        };

        RetryIf::spawn(
            strategy,
            || self.poll_once(task_id),
            |e: &PollError| matches!(e, PollError::Pending(_)),
        )
        .await
        .map_err(|e| match e {
            PollError::Terminal(error) => error,
            PollError::Pending(status) => {
                warn!("Flux task {} gave up while {}", task_id, status);
                Error::GenerationFailed(format!(
                    "Task {} did not finish within {} polls",
                    task_id,
                    self.max_polls.unwrap_or_default()
                ))
            }
        })
    }
}

/// Resolve a terminal task into its image URL.
fn settle(data: TaskData) -> Result<String> {
    match data.status {
        TaskStatus::Completed => data
            .output
            .and_then(|output| output.image_url)
            .filter(|url| !url.is_empty())
            .ok_or_else(|| {
                Error::GenerationFailed(format!(
                    "Task {} completed without an image URL",
                    data.task_id
                ))
            }),
        TaskStatus::Failed => {
            let reason = data
                .error
                .map(|error| error.message)
                .filter(|message| !message.is_empty())
                .unwrap_or_else(|| "unknown error".to_string());
            Err(Error::GenerationFailed(format!(
                "Task {} failed: {}",
                data.task_id, reason
            )))
        }
        TaskStatus::InProgress(status) => Err(Error::Invariant(format!(
            "Task {} is not terminal ({})",
            data.task_id, status
        ))),
    }
}

fn accepted_task(envelope: TaskEnvelope) -> Result<TaskData> {
    if envelope.message != "success" {
        return Err(Error::GenerationFailed(format!(
            "Task submission rejected: {}",
            envelope.message
        )));
    }
    envelope
        .data
        .ok_or_else(|| Error::GenerationFailed("Task submission returned no data".to_string()))
}

#[async_trait]
impl ImageGenerationService for FluxImageGenerator {
    async fn generate_image(&self, options: &GenerationOptions) -> Result<GenerationResult> {
        let (width, height) = options.size.dimensions();
        let request = TaskRequest {
            model: self.model.clone(),
            task_type: TASK_TYPE.to_string(),
            input: TaskInput {
                prompt: options.prompt.clone(),
                width,
                height,
            },
        };

        let task = accepted_task(self.http.submit_task(&request).await?)?;
        info!("Submitted Flux task {} ({}x{})", task.task_id, width, height);

        let url = match task.status {
            TaskStatus::InProgress(_) => self.wait_for_task(&task.task_id).await?,
            _ => settle(task)?,
        };

        Ok(GenerationResult::for_size(url, options.size))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TargetSize;
    use std::time::Instant;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const INTERVAL: Duration = Duration::from_millis(50);

    fn generator(server: &MockServer) -> FluxImageGenerator {
        FluxImageGenerator::new_with_client(
            "pi-key".to_string(),
            "Qubico/flux1-dev".to_string(),
            reqwest::Client::new(),
        )
        .with_base_url(server.uri())
        .with_poll_interval(INTERVAL)
    }

    fn task_body(status: &str) -> serde_json::Value {
        serde_json::json!({
            "code": 200,
            "message": "success",
            "data": { "task_id": "task-1", "status": status }
        })
    }

    async fn mount_submission(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/api/v1/task"))
            .and(header("X-API-Key", "pi-key"))
            .and(body_partial_json(serde_json::json!({
                "model": "Qubico/flux1-dev",
                "task_type": "txt2img",
                "input": { "width": 1024, "height": 1792 }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(task_body("pending")))
            .expect(1)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_polls_until_completed() {
        let server = MockServer::start().await;
        mount_submission(&server).await;

        Mock::given(method("GET"))
            .and(path("/api/v1/task/task-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(task_body("processing")))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/task/task-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "message": "success",
                "data": {
                    "task_id": "task-1",
                    "status": "completed",
                    "output": { "image_url": "https://img.piapi.example/task-1.png" }
                }
            })))
            .mount(&server)
            .await;

        let started = Instant::now();
        let options = GenerationOptions::new("a vision board", TargetSize::Phone);
        let result = generator(&server).generate_image(&options).await.unwrap();

        assert_eq!(result.url, "https://img.piapi.example/task-1.png");
        assert_eq!((result.width, result.height), (1024, 1792));
        assert!(started.elapsed() >= INTERVAL * 3);

        let polls = server
            .received_requests()
            .await
            .unwrap()
            .into_iter()
            .filter(|request| request.method.as_str() == "GET")
            .count();
        assert_eq!(polls, 3);
    }

    #[tokio::test]
    async fn test_failed_task_stops_polling() {
        let server = MockServer::start().await;
        mount_submission(&server).await;

        Mock::given(method("GET"))
            .and(path("/api/v1/task/task-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "message": "success",
                "data": {
                    "task_id": "task-1",
                    "status": "failed",
                    "error": { "message": "nsfw content" }
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let options = GenerationOptions::new("a vision board", TargetSize::Phone);
        let err = generator(&server).generate_image(&options).await.unwrap_err();

        match err {
            Error::GenerationFailed(message) => assert!(message.contains("nsfw content")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_rejected_submission_never_polls() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/v1/task"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "message": "insufficient credits",
                "data": null
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(task_body("completed")))
            .expect(0)
            .mount(&server)
            .await;

        let options = GenerationOptions::new("a vision board", TargetSize::Normal);
        let err = generator(&server).generate_image(&options).await.unwrap_err();
        assert!(matches!(err, Error::GenerationFailed(_)));
    }

    #[tokio::test]
    async fn test_max_polls_bounds_waiting() {
        let server = MockServer::start().await;
        mount_submission(&server).await;

        Mock::given(method("GET"))
            .and(path("/api/v1/task/task-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(task_body("processing")))
            .expect(2)
            .mount(&server)
            .await;

        let options = GenerationOptions::new("a vision board", TargetSize::Phone);
        let err = generator(&server)
            .with_max_polls(Some(2))
            .generate_image(&options)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::GenerationFailed(_)));
    }
}
