use async_trait::async_trait;

use crate::quiz::difficulty::Difficulty;
use crate::quiz::language::Language;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    /// English display name of the deity; prompts are always written in English.
    pub deity_name: String,
    /// Decides the visual style and the quality of the first attempt.
    pub difficulty: Difficulty,
    /// Language of the description sentence.
    pub language: Language,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedImage {
    /// Data URI or a URL the presentation layer can fetch.
    pub image_url: String,
    pub description: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("image request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("image service answered without an image")]
    EmptyResponse,
    #[error("all {attempts} image attempts failed")]
    Exhausted { attempts: usize },
    #[error("generation task stopped before producing a result")]
    Interrupted,
}

/// Produces the picture (and a short description) of a deity.
///
/// One call is one complete attempt from the caller's point of view: implementations do their
/// own fallbacks, and an `Err` means there is nothing left to try short of calling again.
#[async_trait]
pub trait GenerationService: Send + Sync {
    async fn generate(&self, request: GenerationRequest)
        -> Result<GeneratedImage, GenerationError>;
}
