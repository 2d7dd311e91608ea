//! Board and image creation
//!
//! [`BoardService`] runs the synchronous half of a request: validate, extract
//! themes, generate, persist. The record is returned with the provider URL
//! and relocation to durable storage is handed to the [`RelocationQueue`].

use crate::ai::ServiceFactory;
use crate::db::Repository;
use crate::models::{
    BoardRecord, CreateBoardPayload, CreateImagePayload, GeneratedImageRecord, GenerationOptions,
    GenerationRequest, TargetSize,
};
use crate::relocate::{RelocationJob, RelocationQueue};
use crate::{Error, Result};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Lifecycle of one creation request. `Errored` is only reachable before
/// `Responded`; later failures belong to the relocation worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardStage {
    Validating,
    ExtractingThemes,
    GeneratingImage,
    Persisting,
    Responded,
    Relocating,
    Finalized,
    Errored,
}

impl fmt::Display for BoardStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BoardStage::Validating => "validating",
            BoardStage::ExtractingThemes => "extracting themes",
            BoardStage::GeneratingImage => "generating image",
            BoardStage::Persisting => "persisting",
            BoardStage::Responded => "responded",
            BoardStage::Relocating => "relocating",
            BoardStage::Finalized => "finalized",
            BoardStage::Errored => "errored",
        };
        f.write_str(name)
    }
}

pub struct BoardService {
    factory: Arc<ServiceFactory>,
    text_provider: String,
    image_provider: String,
    boards: Repository<BoardRecord>,
    images: Repository<GeneratedImageRecord>,
    relocations: RelocationQueue,
}

impl BoardService {
    pub fn new(
        factory: Arc<ServiceFactory>,
        text_provider: String,
        image_provider: String,
        boards: Repository<BoardRecord>,
        images: Repository<GeneratedImageRecord>,
        relocations: RelocationQueue,
    ) -> Self {
        Self {
            factory,
            text_provider,
            image_provider,
            boards,
            images,
            relocations,
        }
    }

    pub async fn create_board(&self, payload: CreateBoardPayload) -> Result<BoardRecord> {
        let mut stage = BoardStage::Validating;
        match self.create_board_stages(payload, &mut stage).await {
            Ok(record) => {
                info!("Board {} {}", record.id, BoardStage::Responded);
                self.schedule(RelocationJob::board(&record));
                Ok(record)
            }
            Err(e) => {
                log_failure("Board", stage, &e);
                Err(e)
            }
        }
    }

    async fn create_board_stages(
        &self,
        payload: CreateBoardPayload,
        stage: &mut BoardStage,
    ) -> Result<BoardRecord> {
        let request = GenerationRequest::try_from(payload)?;

        *stage = BoardStage::ExtractingThemes;
        let text = self.factory.text_processor(&self.text_provider)?;
        let themes = text.process_goals(&request.goals).await?;
        debug!("Visual elements: {:?}", themes.visual_elements);

        *stage = BoardStage::GeneratingImage;
        let generator = self.factory.image_generator(&self.image_provider)?;
        let generated = generator
            .generate_image(&GenerationOptions::new(themes.prompt, request.size))
            .await?;

        *stage = BoardStage::Persisting;
        let record = BoardRecord::new(request, generated.url);
        self.boards.insert(&record).await?;
        Ok(record)
    }

    pub async fn list_boards(&self) -> Result<Vec<BoardRecord>> {
        self.boards.find_all().await
    }

    /// Generate a single image straight from a caller-supplied prompt.
    pub async fn create_image(&self, payload: CreateImagePayload) -> Result<GeneratedImageRecord> {
        let mut stage = BoardStage::Validating;
        match self.create_image_stages(payload, &mut stage).await {
            Ok(record) => {
                info!("Image {} {}", record.id, BoardStage::Responded);
                self.schedule(RelocationJob::image(&record));
                Ok(record)
            }
            Err(e) => {
                log_failure("Image", stage, &e);
                Err(e)
            }
        }
    }

    async fn create_image_stages(
        &self,
        payload: CreateImagePayload,
        stage: &mut BoardStage,
    ) -> Result<GeneratedImageRecord> {
        let prompt = payload
            .prompt
            .map(|prompt| prompt.trim().to_string())
            .filter(|prompt| !prompt.is_empty())
            .ok_or_else(|| Error::Validation("Prompt is required".to_string()))?;

        *stage = BoardStage::GeneratingImage;
        let generator = self.factory.image_generator(&self.image_provider)?;
        let generated = generator
            .generate_image(&GenerationOptions::new(prompt.clone(), TargetSize::Normal))
            .await?;

        *stage = BoardStage::Persisting;
        let record = GeneratedImageRecord::new(prompt, TargetSize::Normal, generated.url);
        self.images.insert(&record).await?;
        Ok(record)
    }

    pub async fn list_images(&self) -> Result<Vec<GeneratedImageRecord>> {
        self.images.find_all().await
    }

    /// The response is already committed; a closed queue only costs the
    /// durable copy.
    fn schedule(&self, job: RelocationJob) {
        if let Err(e) = self.relocations.enqueue(job) {
            warn!("{}", e);
        }
    }
}

fn log_failure(what: &str, stage: BoardStage, e: &Error) {
    if e.is_client_error() {
        info!("{} request rejected while {}: {}", what, stage, e);
    } else {
        error!("{} creation {} while {}: {}", what, BoardStage::Errored, stage, e);
    }
}
