use crate::db::Repository;
use crate::models::{FeedbackPayload, FeedbackRecord};
use crate::{Error, Result};
use regex_lite::Regex;
use std::sync::LazyLock;
use tracing::info;

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid regex"));

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

#[derive(Clone)]
pub struct FeedbackService {
    feedback: Repository<FeedbackRecord>,
}

impl FeedbackService {
    pub fn new(feedback: Repository<FeedbackRecord>) -> Self {
        Self { feedback }
    }

    pub async fn submit(&self, payload: FeedbackPayload) -> Result<FeedbackRecord> {
        let (Some(email), Some(suggestion)) = (payload.email, payload.suggestion) else {
            return Err(Error::Validation(
                "Email and suggestion are required".to_string(),
            ));
        };
        if suggestion.trim().is_empty() {
            return Err(Error::Validation(
                "Email and suggestion are required".to_string(),
            ));
        }
        if !is_valid_email(email.trim()) {
            return Err(Error::Validation("Invalid email format".to_string()));
        }

        let record = FeedbackRecord::new(&email, &suggestion);
        self.feedback.insert(&record).await?;
        info!("Stored feedback {}", record.id);
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{DocumentStore, MemoryDocumentStore};
    use std::sync::Arc;

    fn service() -> (FeedbackService, Repository<FeedbackRecord>) {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryDocumentStore::new());
        let repository = Repository::new(store);
        (FeedbackService::new(repository.clone()), repository)
    }

    #[test]
    fn test_is_valid_email() {
        assert!(is_valid_email("someone@example.com"));
        assert!(is_valid_email("first.last+boards@mail.example.co"));
        assert!(!is_valid_email("someone@example"));
        assert!(!is_valid_email("some one@example.com"));
        assert!(!is_valid_email(""));
    }

    #[tokio::test]
    async fn test_submit_normalizes_email() {
        let (service, repository) = service();

        let record = service
            .submit(FeedbackPayload {
                email: Some("  Someone@Example.COM ".to_string()),
                suggestion: Some(" more sizes please ".to_string()),
            })
            .await
            .unwrap();

        assert_eq!(record.email, "someone@example.com");
        assert_eq!(record.suggestion, "more sizes please");
        assert_eq!(repository.find_all().await.unwrap(), vec![record]);
    }

    #[tokio::test]
    async fn test_submit_rejects_missing_fields_and_bad_email() {
        let (service, repository) = service();

        for (email, suggestion) in [
            (None, Some("idea")),
            (Some("a@b.co"), None),
            (Some("a@b.co"), Some("  ")),
            (Some("not-an-email"), Some("idea")),
        ] {
            let err = service
                .submit(FeedbackPayload {
                    email: email.map(str::to_string),
                    suggestion: suggestion.map(str::to_string),
                })
                .await
                .unwrap_err();
            assert!(matches!(err, Error::Validation(_)));
        }
        assert!(repository.find_all().await.unwrap().is_empty());
    }
}
