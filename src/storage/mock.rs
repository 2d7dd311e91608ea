use super::ObjectStorage;
use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Clone)]
pub struct MockObjectStorage {
    objects: Arc<Mutex<HashMap<String, (Vec<u8>, String)>>>,
    base_url: String,
    should_fail: Arc<Mutex<bool>>,
    upload_count: Arc<Mutex<usize>>,
}

impl MockObjectStorage {
    pub fn new() -> Self {
        Self {
            objects: Arc::new(Mutex::new(HashMap::new())),
            base_url: "https://mock-bucket.example.com".to_string(),
            should_fail: Arc::new(Mutex::new(false)),
            upload_count: Arc::new(Mutex::new(0)),
        }
    }

    pub fn with_failure(self, should_fail: bool) -> Self {
        *self.should_fail.lock().unwrap() = should_fail;
        self
    }

    pub fn get_upload_count(&self) -> usize {
        *self.upload_count.lock().unwrap()
    }

    pub fn get_object(&self, key: &str) -> Option<Vec<u8>> {
        self.objects
            .lock()
            .unwrap()
            .get(key)
            .map(|(data, _)| data.clone())
    }

    pub fn get_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.lock().unwrap().keys().cloned().collect();
        keys.sort();
        keys
    }
}

impl Default for MockObjectStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectStorage for MockObjectStorage {
    async fn put_object(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<()> {
        *self.upload_count.lock().unwrap() += 1;

        if *self.should_fail.lock().unwrap() {
            return Err(Error::UploadFailed("Mock failure".to_string()));
        }

        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), (data, content_type.to_string()));
        Ok(())
    }

    async fn presign_get(&self, key: &str, expires_in: Duration) -> Result<String> {
        Ok(format!(
            "{}/{}?expires={}",
            self.base_url,
            key,
            expires_in.as_secs()
        ))
    }
}
