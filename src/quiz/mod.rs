pub mod artist;
pub mod controller;
pub mod difficulty;
pub mod generation;
pub mod language;
pub mod options;
pub mod pantheon;
pub mod prefetch;
pub mod scores;

#[cfg(test)]
pub(crate) mod testing;

pub use controller::{AnswerOutcome, Completion, GameSetup, GenerationEvent, QuizError, RoundController};
pub use difficulty::{Difficulty, TierSettings};
pub use language::Language;
pub use pantheon::{Deity, Pantheon};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RoundStatus {
    #[default]
    Idle,
    Playing,
    Revealed,
    Finished,
}

/// One question: the deity to recognise, its picture, and the options offered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Round {
    /// The round's own copy of the deity; the description lands here, never in the pantheon.
    pub deity: Deity,
    pub options: Vec<Deity>,
    pub image_url: Option<String>,
    /// Set when the image could not be generated; cleared by a retry.
    pub image_error: bool,
    pub selected_option_id: Option<String>,
    pub feedback: Option<String>,
    /// Rounds already played in the game when this one began; 0 for the first.
    pub round_index: u32,
}

impl Round {
    pub fn new(deity: Deity, options: Vec<Deity>, round_index: u32) -> Self {
        Self {
            deity,
            options,
            image_url: None,
            image_error: false,
            selected_option_id: None,
            feedback: None,
            round_index,
        }
    }

    pub fn was_answered_correctly(&self) -> Option<bool> {
        self.selected_option_id
            .as_ref()
            .map(|id| *id == self.deity.id)
    }

    /// Finds an option by the name a player would see, in `language` or in English.
    pub fn option_named(&self, language: Language, name: &str) -> Option<&Deity> {
        let name = name.trim();
        self.options
            .iter()
            .find(|d| d.name(language) == name || d.names.default_name() == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameSession {
    pub difficulty: Difficulty,
    pub language: Language,
    pub score: u32,
    /// Rounds answered or skipped so far.
    pub rounds_played: u32,
    pub high_score: u32,
}

impl GameSession {
    pub fn new(difficulty: Difficulty, language: Language, high_score: u32) -> Self {
        Self {
            difficulty,
            language,
            score: 0,
            rounds_played: 0,
            high_score,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quiz::testing::sample_pantheon;

    #[test]
    fn option_lookup_accepts_localized_and_english_names() {
        let pantheon = sample_pantheon();
        let options = ["shiva", "agni", "hayagriva"]
            .iter()
            .map(|id| pantheon.get(id).unwrap().clone())
            .collect();
        let round = Round::new(pantheon.get("agni").unwrap().clone(), options, 0);

        assert_eq!(
            round.option_named(Language::Tamil, "சிவன்").map(|d| d.id.as_str()),
            Some("shiva")
        );
        assert_eq!(
            round.option_named(Language::Tamil, "Hayagriva").map(|d| d.id.as_str()),
            Some("hayagriva")
        );
        assert_eq!(
            round.option_named(Language::Tamil, " Agni ").map(|d| d.id.as_str()),
            Some("agni")
        );
        assert!(round.option_named(Language::Tamil, "Vishnu").is_none());
        assert_eq!(round.was_answered_correctly(), None);
    }
}
