//! Wiring: builds the services from configuration and runs the CLI commands.

use crate::ai::ServiceFactory;
use crate::boards::BoardService;
use crate::db::{DocumentStore, Repository, SqliteDocumentStore};
use crate::feedback::FeedbackService;
use crate::image::{ImageService, PngNormalizer};
use crate::models::{BoardRecord, Config, GeneratedImageRecord, MAX_SIGNED_URL_TTL_SECS};
use crate::relocate::{AssetRelocator, RelocationQueue, RelocationWorker};
use crate::server::{self, AppState, RateLimiter, SharedState};
use crate::storage::{ObjectStorage, S3ObjectStorage};
use crate::{Error, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub struct App {
    config: Config,
    factory: Arc<ServiceFactory>,
    state: SharedState,
    storage: Arc<dyn ObjectStorage>,
    relocations: RelocationQueue,
    worker: RelocationWorker,
    boards: Repository<BoardRecord>,
    images: Repository<GeneratedImageRecord>,
}

/// Injectable service bundle used to construct [`App`] in tests/harnesses.
pub struct AppServices {
    pub factory: ServiceFactory,
    pub store: Arc<dyn DocumentStore>,
    pub image: Arc<dyn ImageService>,
    pub storage: Arc<dyn ObjectStorage>,
    pub http: reqwest::Client,
}

impl App {
    /// Build an app from concrete service dependencies. Spawns the
    /// relocation worker, so it must run inside a tokio runtime.
    pub fn with_services(config: Config, services: AppServices) -> Self {
        let factory = Arc::new(services.factory);
        let boards: Repository<BoardRecord> = Repository::new(Arc::clone(&services.store));
        let images: Repository<GeneratedImageRecord> =
            Repository::new(Arc::clone(&services.store));

        let relocator = AssetRelocator::new(
            services.http,
            services.image,
            Arc::clone(&services.storage),
            config.signed_url_ttl,
        );
        let (relocations, worker) =
            RelocationQueue::spawn(Arc::new(relocator), boards.clone(), images.clone());

        let state = Arc::new(AppState {
            boards: BoardService::new(
                Arc::clone(&factory),
                config.text_processor.clone(),
                config.image_generator.clone(),
                boards.clone(),
                images.clone(),
                relocations.clone(),
            ),
            feedback: FeedbackService::new(Repository::new(services.store)),
            rate_limiter: RateLimiter::new(config.rate_limit_max, config.rate_limit_window)
                .with_trust_proxy(config.trust_proxy),
        });

        Self {
            config,
            factory,
            state,
            storage: services.storage,
            relocations,
            worker,
            boards,
            images,
        }
    }

    /// Construct an app from environment configuration (`Config::from_env`).
    pub async fn new() -> Result<Self> {
        let config = Config::from_env()?;

        // Reuse one HTTP connection pool across provider clients and downloads.
        let http = reqwest::Client::new();

        let store = SqliteDocumentStore::connect(&config.database_url).await?;
        info!("Document store ready");
        let storage = S3ObjectStorage::from_config(&config).await?;
        info!("Object storage bucket: {}", storage.bucket());

        let services = AppServices {
            factory: ServiceFactory::from_config(&config, http.clone()),
            store: Arc::new(store),
            image: Arc::new(PngNormalizer::new()),
            storage: Arc::new(storage),
            http,
        };
        Ok(Self::with_services(config, services))
    }

    pub fn state(&self) -> SharedState {
        Arc::clone(&self.state)
    }

    /// Run the HTTP server until shutdown, then let queued relocations finish.
    pub async fn serve(self) -> Result<()> {
        // Fail at startup rather than on the first request.
        self.factory.text_processor(&self.config.text_processor)?;
        self.factory.image_generator(&self.config.image_generator)?;
        info!(
            "Providers: text={}, image={}",
            self.config.text_processor, self.config.image_generator
        );

        let Self {
            config,
            state,
            relocations,
            worker,
            ..
        } = self;

        let app = server::router(state, server::cors_layer(&config));
        server::serve(app, config.port).await?;

        drop(relocations);
        info!("Waiting for in-flight relocations");
        worker.drain().await
    }

    /// Mint a signed GET URL for an object already in the bucket.
    pub async fn presign(&self, key: &str, ttl_secs: Option<u64>) -> Result<String> {
        let ttl = match ttl_secs {
            None => self.config.signed_url_ttl,
            Some(secs) if (1..=MAX_SIGNED_URL_TTL_SECS).contains(&secs) => {
                Duration::from_secs(secs)
            }
            Some(secs) => {
                return Err(Error::Validation(format!(
                    "TTL must be between 1 and {} seconds, got {}",
                    MAX_SIGNED_URL_TTL_SECS, secs
                )))
            }
        };
        self.storage.presign_get(key, ttl).await
    }

    /// Relocate every record still pointing at a provider URL or inline
    /// image. Returns the number of records queued.
    pub async fn relocate_pending(self) -> Result<usize> {
        let queued = self
            .relocations
            .enqueue_pending(&self.boards, &self.images)
            .await?;
        info!("Queued {} pending relocations", queued);

        let Self {
            state,
            relocations,
            worker,
            ..
        } = self;
        drop(state);
        drop(relocations);
        worker.drain().await?;
        Ok(queued)
    }
}
