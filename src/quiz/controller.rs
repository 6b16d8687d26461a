//! The quiz round state machine.
//!
//! `RoundController` owns the current round and the prefetch slot. Every state change goes
//! through it: player actions (`start`, `answer`, `skip`, `retry`, `next_round`, `restart`,
//! `exit`) and the arrival of generated images (`apply`).
//!
//! Images are generated by background tasks. Each call is tagged with a [`RoundTicket`] when it
//! is started, and its result comes back as a [`GenerationEvent`] on the channel returned by
//! [`RoundController::new`]. The owner feeds those events back through `apply`, which only
//! accepts the one the controller is currently waiting for: a late image for a round the player
//! already skipped past is dropped there. Nothing is ever cancelled.

use log::{debug, info, warn};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::quiz::difficulty::{Difficulty, TierSettings};
use crate::quiz::generation::{GeneratedImage, GenerationError, GenerationService};
use crate::quiz::language::Language;
use crate::quiz::options::OptionsError;
use crate::quiz::pantheon::Pantheon;
use crate::quiz::prefetch::{PendingGeneration, Prefetcher, RoundPackage, RoundSource};
use crate::quiz::scores::{FinishedGame, GameHistoryEntry, ScoreStore};
use crate::quiz::{GameSession, Round, RoundStatus};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum QuizError {
    #[error("cannot {action} while the game is {status:?}")]
    InvalidTransition {
        action: &'static str,
        status: RoundStatus,
    },
    #[error("the image for this round has not arrived yet")]
    ImageNotReady,
    #[error("{0:?} is not one of this round's options")]
    UnknownOption(String),
    #[error(transparent)]
    Setup(#[from] OptionsError),
}

/// Identifies one generation call issued by a controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RoundTicket(u64);

/// A finished generation call, on its way back to the controller.
#[derive(Debug)]
pub struct GenerationEvent {
    pub ticket: RoundTicket,
    pub deity_id: String,
    pub result: Result<GeneratedImage, GenerationError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Applied,
    /// The event belonged to a call the controller no longer waits for.
    Discarded,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerOutcome {
    pub correct: bool,
    pub points: u32,
    pub feedback: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameSetup {
    pub difficulty: Difficulty,
    pub settings: TierSettings,
    pub language: Language,
}

impl GameSetup {
    pub fn new(difficulty: Difficulty, language: Language) -> Self {
        Self {
            difficulty,
            settings: difficulty.settings(),
            language,
        }
    }

    pub fn with_settings(mut self, settings: TierSettings) -> Self {
        self.settings = settings;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoadOrigin {
    NewRound,
    Skip,
    Retry,
}

#[derive(Debug, Clone, Copy)]
struct Awaiting {
    ticket: RoundTicket,
    origin: LoadOrigin,
}

pub struct RoundController {
    source: RoundSource,
    scores: Arc<dyn ScoreStore>,
    prefetcher: Prefetcher,
    session: GameSession,
    status: RoundStatus,
    round: Option<Round>,
    /// The only generation call whose result may still change the visible round.
    awaiting: Option<Awaiting>,
    next_ticket: u64,
    reported: bool,
    events: mpsc::UnboundedSender<GenerationEvent>,
}

impl RoundController {
    pub fn new(
        setup: GameSetup,
        pantheon: Arc<Pantheon>,
        generator: Arc<dyn GenerationService>,
        scores: Arc<dyn ScoreStore>,
    ) -> Result<(Self, mpsc::UnboundedReceiver<GenerationEvent>), QuizError> {
        let source = RoundSource::new(
            pantheon,
            generator,
            setup.difficulty,
            setup.settings,
            setup.language,
        )?;
        let high_score = stored_high_score(scores.as_ref(), setup.difficulty);
        let (events, receiver) = mpsc::unbounded_channel();

        let controller = Self {
            source,
            scores,
            prefetcher: Prefetcher::new(),
            session: GameSession::new(setup.difficulty, setup.language, high_score),
            status: RoundStatus::Idle,
            round: None,
            awaiting: None,
            next_ticket: 0,
            reported: false,
            events,
        };
        Ok((controller, receiver))
    }

    pub fn status(&self) -> RoundStatus {
        self.status
    }

    pub fn round(&self) -> Option<&Round> {
        self.round.as_ref()
    }

    pub fn session(&self) -> &GameSession {
        &self.session
    }

    pub fn settings(&self) -> &TierSettings {
        self.source.settings()
    }

    /// True while the current round's picture is still being generated.
    pub fn is_loading_image(&self) -> bool {
        self.awaiting.is_some()
    }

    /// Answers are only taken once the player can see the picture.
    pub fn can_answer(&self) -> bool {
        self.status == RoundStatus::Playing
            && self.round.as_ref().is_some_and(|r| r.image_url.is_some())
    }

    pub fn has_preloaded_round(&self) -> bool {
        self.prefetcher.is_pending()
    }

    /// Starts the first round of the game.
    pub fn start(&mut self) -> Result<RoundStatus, QuizError> {
        self.advance("start")
    }

    /// Moves on from a revealed round, or ends the game after the last one.
    pub fn next_round(&mut self) -> Result<RoundStatus, QuizError> {
        self.advance("move to the next round")
    }

    pub fn answer(&mut self, option_id: &str) -> Result<AnswerOutcome, QuizError> {
        if self.status != RoundStatus::Playing {
            return Err(QuizError::InvalidTransition {
                action: "answer",
                status: self.status,
            });
        }

        let language = self.session.language;
        let value = self.source.settings().points;
        let Some(round) = self.round.as_mut() else {
            return Err(QuizError::ImageNotReady);
        };
        if round.image_url.is_none() {
            return Err(QuizError::ImageNotReady);
        }
        if !round.options.iter().any(|d| d.id == option_id) {
            return Err(QuizError::UnknownOption(option_id.to_string()));
        }

        let correct = round.deity.id == option_id;
        let name = round.deity.name(language);
        let feedback = if correct {
            format!("Correct! It is {}.", name)
        } else {
            format!("Incorrect. This is {}.", name)
        };
        let points = if correct { value } else { 0 };

        round.selected_option_id = Some(option_id.to_string());
        round.feedback = Some(feedback.clone());
        self.session.score += points;
        self.session.rounds_played += 1;
        self.status = RoundStatus::Revealed;

        info!(
            "Round {} answered {}, score {}",
            self.session.rounds_played,
            if correct { "correctly" } else { "incorrectly" },
            self.session.score
        );

        self.update_high_score();

        if !self.rounds_exhausted() {
            self.prefetcher.preload(&self.source);
        }

        Ok(AnswerOutcome {
            correct,
            points,
            feedback,
        })
    }

    /// Gives up on the current round without scoring it.
    pub fn skip(&mut self) -> Result<RoundStatus, QuizError> {
        if self.status != RoundStatus::Playing {
            return Err(QuizError::InvalidTransition {
                action: "skip",
                status: self.status,
            });
        }

        self.session.rounds_played += 1;
        info!("Round {} skipped", self.session.rounds_played);

        if self.rounds_exhausted() {
            self.finish();
            return Ok(RoundStatus::Finished);
        }

        let package = self.next_package()?;
        self.begin_round(package, LoadOrigin::Skip);
        Ok(RoundStatus::Playing)
    }

    /// Asks for the current deity's picture again. Without a round, starts one.
    pub fn retry(&mut self) -> Result<RoundStatus, QuizError> {
        match self.status {
            RoundStatus::Idle => return self.start(),
            RoundStatus::Playing => {}
            status => {
                return Err(QuizError::InvalidTransition {
                    action: "retry",
                    status,
                })
            }
        }

        let deity = match self.round.as_mut() {
            Some(round) => {
                round.image_url = None;
                round.image_error = false;
                round.feedback = None;
                round.deity.description = None;
                round.deity.clone()
            }
            None => {
                self.status = RoundStatus::Idle;
                return self.start();
            }
        };

        info!("Retrying image for {}", deity.id);
        let ticket = self.issue_ticket();
        self.forward(ticket, deity.id.clone(), self.source.generate_for(&deity));
        self.awaiting = Some(Awaiting {
            ticket,
            origin: LoadOrigin::Retry,
        });
        Ok(RoundStatus::Playing)
    }

    /// Takes in a finished generation call. Only the call the current round waits for is applied.
    pub fn apply(&mut self, event: GenerationEvent) -> Completion {
        let Some(awaiting) = self.awaiting else {
            debug!("Discarding image for {}, nothing is loading", event.deity_id);
            return Completion::Discarded;
        };
        if awaiting.ticket != event.ticket {
            debug!(
                "Discarding stale image for {} ({:?})",
                event.deity_id, event.ticket
            );
            return Completion::Discarded;
        }
        let Some(round) = self.round.as_mut() else {
            return Completion::Discarded;
        };
        if round.deity.id != event.deity_id {
            debug!(
                "Discarding image for {}, the round shows {}",
                event.deity_id, round.deity.id
            );
            return Completion::Discarded;
        }

        self.awaiting = None;
        match event.result {
            Ok(image) => {
                round.image_url = Some(image.image_url);
                round.deity.description = image.description;
                round.image_error = false;

                // A skipped-to round starts the next preload only once its own image is in
                let rounds = self.source.settings().rounds;
                if awaiting.origin == LoadOrigin::Skip && self.session.rounds_played + 1 < rounds
                {
                    self.prefetcher.preload(&self.source);
                }
            }
            Err(e) => {
                warn!("No image for {}: {}", round.deity.id, e);
                round.image_error = true;
            }
        }

        Completion::Applied
    }

    /// Throws the game away and starts a new one with the same setup.
    pub fn restart(&mut self) -> Result<RoundStatus, QuizError> {
        info!("Restarting game");
        self.prefetcher.clear();
        self.awaiting = None;
        self.round = None;
        self.reported = false;

        let high_score = stored_high_score(self.scores.as_ref(), self.session.difficulty)
            .max(self.session.high_score);
        self.session = GameSession::new(self.session.difficulty, self.session.language, high_score);
        self.status = RoundStatus::Idle;

        self.start()
    }

    /// Leaves the game. Reports it to the score store unless that already happened or nothing
    /// was played.
    pub fn exit(&mut self) -> Option<GameHistoryEntry> {
        let entry = if self.reported || self.session.rounds_played == 0 {
            None
        } else {
            self.report()
        };
        self.reported = true;

        self.prefetcher.clear();
        self.awaiting = None;
        self.round = None;
        self.status = RoundStatus::Finished;
        entry
    }

    fn advance(&mut self, action: &'static str) -> Result<RoundStatus, QuizError> {
        match self.status {
            RoundStatus::Idle | RoundStatus::Revealed => {}
            status => return Err(QuizError::InvalidTransition { action, status }),
        }

        if self.rounds_exhausted() {
            self.finish();
            return Ok(RoundStatus::Finished);
        }

        let package = self.next_package()?;
        self.begin_round(package, LoadOrigin::NewRound);
        Ok(RoundStatus::Playing)
    }

    fn rounds_exhausted(&self) -> bool {
        self.session.rounds_played >= self.source.settings().rounds
    }

    fn next_package(&mut self) -> Result<RoundPackage, QuizError> {
        match self.prefetcher.take() {
            Some(package) => {
                debug!("Using preloaded round {}", package.deity.id);
                Ok(package)
            }
            None => Ok(self.source.fresh_package()?),
        }
    }

    fn begin_round(&mut self, package: RoundPackage, origin: LoadOrigin) {
        let RoundPackage {
            deity,
            options,
            generation,
        } = package;

        info!(
            "Round {} of {}: {}",
            self.session.rounds_played + 1,
            self.source.settings().rounds,
            deity.id
        );

        let ticket = self.issue_ticket();
        self.forward(ticket, deity.id.clone(), generation);
        self.round = Some(Round::new(deity, options, self.session.rounds_played));
        self.status = RoundStatus::Playing;
        self.awaiting = Some(Awaiting { ticket, origin });
    }

    fn issue_ticket(&mut self) -> RoundTicket {
        self.next_ticket += 1;
        RoundTicket(self.next_ticket)
    }

    /// Sends the outcome of `generation` back through the event channel once it resolves.
    fn forward(&self, ticket: RoundTicket, deity_id: String, generation: PendingGeneration) {
        let events = self.events.clone();
        tokio::spawn(async move {
            let result = generation.resolve().await;
            // Nobody listens any more once the game is gone
            let _ = events.send(GenerationEvent {
                ticket,
                deity_id,
                result,
            });
        });
    }

    fn update_high_score(&mut self) {
        if self.session.score <= self.session.high_score {
            return;
        }
        self.session.high_score = self.session.score;
        if let Err(e) = self
            .scores
            .set_high_score(self.session.difficulty, self.session.score)
        {
            warn!("Could not save high score: {}", e);
        }
    }

    fn finish(&mut self) -> Option<GameHistoryEntry> {
        self.status = RoundStatus::Finished;
        self.awaiting = None;
        self.prefetcher.clear();
        info!(
            "Game finished with {} points after {} rounds",
            self.session.score, self.session.rounds_played
        );

        if self.reported {
            return None;
        }
        self.reported = true;
        self.report()
    }

    fn report(&self) -> Option<GameHistoryEntry> {
        let game = FinishedGame {
            score: self.session.score,
            total_rounds: self.session.rounds_played,
            difficulty: self.session.difficulty,
            language: self.session.language,
        };
        match self.scores.record_game(game) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Could not record game: {}", e);
                None
            }
        }
    }
}

fn stored_high_score(scores: &dyn ScoreStore, difficulty: Difficulty) -> u32 {
    scores.high_score(difficulty).unwrap_or_else(|e| {
        warn!("Could not read high score: {}", e);
        0
    })
}
