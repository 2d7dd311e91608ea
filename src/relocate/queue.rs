use super::AssetRelocator;
use crate::boards::BoardStage;
use crate::db::Repository;
use crate::models::{BoardRecord, GeneratedImageRecord};
use crate::{Error, Result};
use chrono::Utc;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelocationTarget {
    Board(Uuid),
    Image(Uuid),
}

impl RelocationTarget {
    fn key_prefix(self) -> &'static str {
        match self {
            RelocationTarget::Board(_) => "vision-boards",
            RelocationTarget::Image(_) => "generated-images",
        }
    }

    pub fn id(self) -> Uuid {
        match self {
            RelocationTarget::Board(id) | RelocationTarget::Image(id) => id,
        }
    }

    /// `{prefix}/{id}-{unix_millis}.png`
    pub fn destination_key(self) -> String {
        format!(
            "{}/{}-{}.png",
            self.key_prefix(),
            self.id(),
            Utc::now().timestamp_millis()
        )
    }
}

impl fmt::Display for RelocationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelocationTarget::Board(id) => write!(f, "board {}", id),
            RelocationTarget::Image(id) => write!(f, "image {}", id),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RelocationJob {
    pub target: RelocationTarget,
    pub source_url: String,
}

impl RelocationJob {
    pub fn board(record: &BoardRecord) -> Self {
        Self {
            target: RelocationTarget::Board(record.id),
            source_url: record.image_url.clone(),
        }
    }

    pub fn image(record: &GeneratedImageRecord) -> Self {
        Self {
            target: RelocationTarget::Image(record.id),
            source_url: record.image_url.clone(),
        }
    }
}

/// Sending half of the relocation pipeline. Cheap to clone.
#[derive(Clone)]
pub struct RelocationQueue {
    sender: mpsc::UnboundedSender<RelocationJob>,
}

/// Handle to the supervisor task that owns in-flight relocations.
pub struct RelocationWorker {
    handle: JoinHandle<()>,
}

#[derive(Clone)]
struct JobContext {
    relocator: Arc<AssetRelocator>,
    boards: Repository<BoardRecord>,
    images: Repository<GeneratedImageRecord>,
}

impl RelocationQueue {
    /// Start the supervisor. Jobs run concurrently; each failure or panic is
    /// logged and leaves its record untouched.
    pub fn spawn(
        relocator: Arc<AssetRelocator>,
        boards: Repository<BoardRecord>,
        images: Repository<GeneratedImageRecord>,
    ) -> (Self, RelocationWorker) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let context = JobContext {
            relocator,
            boards,
            images,
        };
        let handle = tokio::spawn(supervise(receiver, context));
        (Self { sender }, RelocationWorker { handle })
    }

    pub fn enqueue(&self, job: RelocationJob) -> Result<()> {
        let target = job.target;
        self.sender
            .send(job)
            .map_err(|_| Error::Invariant(format!("relocation queue closed, dropped {}", target)))?;
        info!("Queued relocation for {}", target);
        Ok(())
    }

    /// Queue every stored record that still points at a provider URL.
    pub async fn enqueue_pending(
        &self,
        boards: &Repository<BoardRecord>,
        images: &Repository<GeneratedImageRecord>,
    ) -> Result<usize> {
        let mut queued = 0;

        for record in boards.find_all().await? {
            if !record.is_relocated {
                self.enqueue(RelocationJob::board(&record))?;
                queued += 1;
            }
        }
        for record in images.find_all().await? {
            if !record.is_relocated {
                self.enqueue(RelocationJob::image(&record))?;
                queued += 1;
            }
        }

        Ok(queued)
    }
}

impl RelocationWorker {
    /// Wait for the supervisor to finish. Returns once every
    /// [`RelocationQueue`] clone has been dropped and in-flight jobs settle.
    pub async fn drain(self) -> Result<()> {
        self.handle
            .await
            .map_err(|e| Error::Invariant(format!("relocation supervisor failed: {}", e)))
    }
}

async fn supervise(mut receiver: mpsc::UnboundedReceiver<RelocationJob>, context: JobContext) {
    let mut jobs = JoinSet::new();

    loop {
        tokio::select! {
            job = receiver.recv() => match job {
                Some(job) => {
                    jobs.spawn(run_job(context.clone(), job));
                }
                None => break,
            },
            Some(joined) = jobs.join_next(), if !jobs.is_empty() => report(joined),
        }
    }

    while let Some(joined) = jobs.join_next().await {
        report(joined);
    }
}

async fn run_job(context: JobContext, job: RelocationJob) -> (RelocationTarget, Result<bool>) {
    let target = job.target;
    info!("{} {}", target, BoardStage::Relocating);
    let outcome = async {
        let key = target.destination_key();
        let signed_url = context.relocator.relocate(&job.source_url, &key).await?;
        match target {
            RelocationTarget::Board(id) => context.boards.mark_relocated(id, &signed_url).await,
            RelocationTarget::Image(id) => context.images.mark_relocated(id, &signed_url).await,
        }
    }
    .await;
    (target, outcome)
}

/// Where a record ends up once its relocation settles. Anything short of a
/// successful patch leaves it as it was when the client got its response.
fn settled_stage(outcome: &Result<bool>) -> BoardStage {
    match outcome {
        Ok(true) => BoardStage::Finalized,
        Ok(false) | Err(_) => BoardStage::Responded,
    }
}

fn report(joined: std::result::Result<(RelocationTarget, Result<bool>), JoinError>) {
    match joined {
        Ok((target, outcome)) => {
            let stage = settled_stage(&outcome);
            match outcome {
                Ok(true) => info!("{} {}", target, stage),
                Ok(false) => warn!("Relocated {} but the record no longer exists", target),
                Err(e) => error!("Relocation failed for {}, left {}: {}", target, stage, e),
            }
        }
        Err(e) if e.is_panic() => error!("Relocation task panicked: {}", e),
        Err(e) => error!("Relocation task aborted: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{DocumentStore, MemoryDocumentStore};
    use crate::image::PngNormalizer;
    use crate::models::{GenerationRequest, TargetSize};
    use crate::storage::MockObjectStorage;
    use base64::Engine as _;
    use std::time::Duration;

    fn png_data_url() -> String {
        let img = image::RgbImage::from_pixel(4, 4, image::Rgb([10, 200, 90]));
        let mut bytes = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        format!(
            "data:image/png;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(bytes)
        )
    }

    struct Fixture {
        storage: MockObjectStorage,
        boards: Repository<BoardRecord>,
        images: Repository<GeneratedImageRecord>,
    }

    impl Fixture {
        fn new(storage: MockObjectStorage) -> Self {
            let store: Arc<dyn DocumentStore> = Arc::new(MemoryDocumentStore::new());
            Self {
                storage,
                boards: Repository::new(Arc::clone(&store)),
                images: Repository::new(store),
            }
        }

        fn spawn(&self) -> (RelocationQueue, RelocationWorker) {
            let relocator = AssetRelocator::new(
                reqwest::Client::new(),
                Arc::new(PngNormalizer::new()),
                Arc::new(self.storage.clone()),
                Duration::from_secs(3600),
            );
            RelocationQueue::spawn(
                Arc::new(relocator),
                self.boards.clone(),
                self.images.clone(),
            )
        }
    }

    fn board(url: String) -> BoardRecord {
        BoardRecord::new(
            GenerationRequest {
                goals: vec!["learn guitar".to_string()],
                size: TargetSize::Laptop,
            },
            url,
        )
    }

    #[test]
    fn test_destination_key_layout() {
        let id = Uuid::new_v4();
        let key = RelocationTarget::Image(id).destination_key();
        let prefix = format!("generated-images/{}-", id);

        assert!(key.starts_with(&prefix));
        assert!(key.ends_with(".png"));
        let millis = &key[prefix.len()..key.len() - 4];
        assert!(millis.parse::<i64>().is_ok());
    }

    #[test]
    fn test_settled_stage_only_finalizes_patched_records() {
        assert_eq!(settled_stage(&Ok(true)), BoardStage::Finalized);
        assert_eq!(settled_stage(&Ok(false)), BoardStage::Responded);
        assert_eq!(
            settled_stage(&Err(Error::FetchFailed("HTTP 403".to_string()))),
            BoardStage::Responded
        );
    }

    #[tokio::test]
    async fn test_successful_job_patches_only_its_record() {
        let fixture = Fixture::new(MockObjectStorage::new());
        let target = board(png_data_url());
        let other = board("https://provider.example/other.png".to_string());
        fixture.boards.insert(&other).await.unwrap();
        fixture.boards.insert(&target).await.unwrap();

        let (queue, worker) = fixture.spawn();
        queue.enqueue(RelocationJob::board(&target)).unwrap();
        drop(queue);
        worker.drain().await.unwrap();

        let stored = fixture.boards.find_all().await.unwrap();
        let relocated = stored.iter().find(|b| b.id == target.id).unwrap();
        let untouched = stored.iter().find(|b| b.id == other.id).unwrap();

        assert!(relocated.is_relocated);
        assert!(relocated
            .image_url
            .starts_with(&format!("https://mock-bucket.example.com/vision-boards/{}-", target.id)));
        assert_eq!(untouched, &other);
        assert_eq!(fixture.storage.get_upload_count(), 1);
    }

    #[tokio::test]
    async fn test_failed_job_leaves_record_untouched() {
        let fixture = Fixture::new(MockObjectStorage::new().with_failure(true));
        let record = board(png_data_url());
        fixture.boards.insert(&record).await.unwrap();

        let (queue, worker) = fixture.spawn();
        queue.enqueue(RelocationJob::board(&record)).unwrap();
        drop(queue);
        worker.drain().await.unwrap();

        assert_eq!(fixture.boards.find_all().await.unwrap(), vec![record]);
    }

    #[tokio::test]
    async fn test_enqueue_pending_skips_relocated_records() {
        let fixture = Fixture::new(MockObjectStorage::new());
        let pending_board = board(png_data_url());
        let done_board = board("https://bucket.example/done.png".to_string());
        let pending_image = GeneratedImageRecord::new(
            "a lighthouse".to_string(),
            TargetSize::Normal,
            png_data_url(),
        );
        fixture.boards.insert(&pending_board).await.unwrap();
        fixture.boards.insert(&done_board).await.unwrap();
        fixture
            .boards
            .mark_relocated(done_board.id, "https://bucket.example/done.png")
            .await
            .unwrap();
        fixture.images.insert(&pending_image).await.unwrap();

        let (queue, worker) = fixture.spawn();
        let queued = queue
            .enqueue_pending(&fixture.boards, &fixture.images)
            .await
            .unwrap();
        drop(queue);
        worker.drain().await.unwrap();

        assert_eq!(queued, 2);
        assert_eq!(fixture.storage.get_upload_count(), 2);
        let images = fixture.images.find_all().await.unwrap();
        assert!(images[0].is_relocated);
        assert!(fixture
            .boards
            .find_all()
            .await
            .unwrap()
            .iter()
            .all(|b| b.is_relocated));
    }
}
