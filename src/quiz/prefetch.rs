use log::{debug, warn};
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::quiz::difficulty::{Difficulty, TierSettings};
use crate::quiz::generation::{
    GeneratedImage, GenerationError, GenerationRequest, GenerationService,
};
use crate::quiz::language::Language;
use crate::quiz::options::{pick_options, OptionsError};
use crate::quiz::pantheon::{Deity, Pantheon};

/// A generation call that is already running in the background.
///
/// Whoever holds it owns the result. Dropping it detaches the call: it runs to completion and
/// the result goes nowhere.
pub struct PendingGeneration {
    handle: JoinHandle<Result<GeneratedImage, GenerationError>>,
}

impl PendingGeneration {
    pub fn spawn(generator: Arc<dyn GenerationService>, request: GenerationRequest) -> Self {
        let handle = tokio::spawn(async move {
            let deity_name = request.deity_name.clone();
            let result = generator.generate(request).await;
            if let Err(e) = &result {
                warn!("Generation for {} failed: {}", deity_name, e);
            }
            result
        });
        Self { handle }
    }

    pub async fn resolve(self) -> Result<GeneratedImage, GenerationError> {
        match self.handle.await {
            Ok(result) => result,
            Err(e) => {
                warn!("Generation task did not complete: {}", e);
                Err(GenerationError::Interrupted)
            }
        }
    }
}

/// Everything a round needs, with its image already on the way.
pub struct RoundPackage {
    pub deity: Deity,
    pub options: Vec<Deity>,
    pub generation: PendingGeneration,
}

/// Builds round packages for one game: which pantheon, which tier, which language.
#[derive(Clone)]
pub struct RoundSource {
    pantheon: Arc<Pantheon>,
    generator: Arc<dyn GenerationService>,
    difficulty: Difficulty,
    settings: TierSettings,
    language: Language,
}

impl RoundSource {
    pub fn new(
        pantheon: Arc<Pantheon>,
        generator: Arc<dyn GenerationService>,
        difficulty: Difficulty,
        settings: TierSettings,
        language: Language,
    ) -> Result<Self, OptionsError> {
        if settings.options == 0 {
            return Err(OptionsError::NoOptions);
        }
        if settings.options > pantheon.len() {
            return Err(OptionsError::NotEnoughDistractors {
                required: settings.options - 1,
                available: pantheon.len().saturating_sub(1),
            });
        }
        Ok(Self {
            pantheon,
            generator,
            difficulty,
            settings,
            language,
        })
    }

    pub fn settings(&self) -> &TierSettings {
        &self.settings
    }

    /// Starts generating the picture of `deity` right away.
    pub fn generate_for(&self, deity: &Deity) -> PendingGeneration {
        PendingGeneration::spawn(
            self.generator.clone(),
            GenerationRequest {
                deity_name: deity.names.default_name().to_string(),
                difficulty: self.difficulty,
                language: self.language,
            },
        )
    }

    /// Random deity, its options, and a freshly started generation call.
    pub fn fresh_package(&self) -> Result<RoundPackage, OptionsError> {
        let deity = self.pantheon.pick_random().clone();
        let options = pick_options(
            &mut rand::thread_rng(),
            &self.pantheon,
            &deity,
            self.settings.options,
        )?;
        let generation = self.generate_for(&deity);

        Ok(RoundPackage {
            deity,
            options,
            generation,
        })
    }
}

/// Holds at most one round package prepared ahead of time.
#[derive(Default)]
pub struct Prefetcher {
    slot: Option<RoundPackage>,
}

impl Prefetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepares the next round in the background. Does nothing if one is already waiting.
    pub fn preload(&mut self, source: &RoundSource) {
        if self.slot.is_some() {
            debug!("Preload skipped, a round is already waiting");
            return;
        }

        match source.fresh_package() {
            Ok(package) => {
                debug!("Preloading {}", package.deity.id);
                self.slot = Some(package);
            }
            Err(e) => warn!("Could not preload a round: {}", e),
        }
    }

    /// Hands the waiting package over, leaving the slot empty.
    pub fn take(&mut self) -> Option<RoundPackage> {
        self.slot.take()
    }

    pub fn is_pending(&self) -> bool {
        self.slot.is_some()
    }

    pub fn pending_deity(&self) -> Option<&Deity> {
        self.slot.as_ref().map(|p| &p.deity)
    }

    pub fn clear(&mut self) {
        if let Some(package) = self.slot.take() {
            debug!("Dropping preloaded round {}", package.deity.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quiz::testing::{sample_pantheon, ScriptedArtist};

    fn source(artist: &Arc<ScriptedArtist>) -> RoundSource {
        RoundSource::new(
            Arc::new(sample_pantheon()),
            artist.clone(),
            Difficulty::Easy,
            Difficulty::Easy.settings(),
            Language::Tamil,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn second_preload_is_a_no_op() {
        let artist = Arc::new(ScriptedArtist::new());
        let source = source(&artist);
        let mut prefetcher = Prefetcher::new();

        prefetcher.preload(&source);
        let first = prefetcher.pending_deity().unwrap().id.clone();
        prefetcher.preload(&source);

        artist.wait_for_calls(1).await;
        tokio::task::yield_now().await;
        assert_eq!(artist.call_count(), 1);
        assert_eq!(prefetcher.pending_deity().unwrap().id, first);
    }

    #[tokio::test]
    async fn take_hands_over_and_clears() {
        let artist = Arc::new(ScriptedArtist::new());
        let source = source(&artist);
        let mut prefetcher = Prefetcher::new();

        assert!(prefetcher.take().is_none());

        prefetcher.preload(&source);
        let package = prefetcher.take().unwrap();
        assert!(!prefetcher.is_pending());
        assert_eq!(package.options.len(), 4);
        assert!(package.options.iter().any(|d| d.id == package.deity.id));

        artist.wait_for_calls(1).await;
        let request = artist.request(0);
        assert_eq!(request.deity_name, package.deity.names.default_name());
        assert_eq!(request.language, Language::Tamil);
        assert_eq!(request.difficulty, Difficulty::Easy);

        artist.succeed(0);
        let image = package.generation.resolve().await.unwrap();
        assert_eq!(image.image_url, artist.image_url(0));
    }

    #[tokio::test]
    async fn failed_prefetch_surfaces_only_when_consumed() {
        let artist = Arc::new(ScriptedArtist::new());
        let source = source(&artist);
        let mut prefetcher = Prefetcher::new();

        prefetcher.preload(&source);
        artist.wait_for_calls(1).await;
        artist.fail(0);

        let package = prefetcher.take().unwrap();
        assert!(matches!(
            package.generation.resolve().await,
            Err(GenerationError::EmptyResponse)
        ));
    }

    #[tokio::test]
    async fn package_without_enough_distractors_is_an_error() {
        let artist = Arc::new(ScriptedArtist::new());
        let mut settings = Difficulty::Easy.settings();
        settings.options = sample_pantheon().len() + 2;
        // Built by hand to get past the check in `new`
        let source = RoundSource {
            pantheon: Arc::new(sample_pantheon()),
            generator: artist.clone(),
            difficulty: Difficulty::Easy,
            settings,
            language: Language::English,
        };

        assert!(matches!(
            source.fresh_package(),
            Err(OptionsError::NotEnoughDistractors { .. })
        ));

        let mut prefetcher = Prefetcher::new();
        prefetcher.preload(&source);
        assert!(!prefetcher.is_pending());
        tokio::task::yield_now().await;
        assert_eq!(artist.call_count(), 0);
    }

    #[test]
    fn source_rejects_tier_larger_than_pantheon() {
        let artist: Arc<dyn GenerationService> = Arc::new(ScriptedArtist::new());
        let mut settings = Difficulty::Hard.settings();
        settings.options = sample_pantheon().len() + 1;

        assert!(RoundSource::new(
            Arc::new(sample_pantheon()),
            artist,
            Difficulty::Hard,
            settings,
            Language::English,
        )
        .is_err());
    }
}
