use std::fmt;
use std::str::FromStr;

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

/// Everything a difficulty tier decides about a game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierSettings {
    pub label: &'static str,
    /// Rounds in one game.
    pub rounds: u32,
    /// Options offered per round, the correct one included.
    pub options: usize,
    /// Points for a correct answer.
    pub points: u32,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard];

    pub fn settings(&self) -> TierSettings {
        match self {
            Difficulty::Easy => TierSettings {
                label: "Seeker",
                rounds: 5,
                options: 4,
                points: 10,
            },
            Difficulty::Medium => TierSettings {
                label: "Devotee",
                rounds: 10,
                options: 4,
                points: 20,
            },
            Difficulty::Hard => TierSettings {
                label: "Sage",
                rounds: 15,
                options: 6,
                points: 30,
            },
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("unknown difficulty: {0}")]
pub struct UnknownDifficulty(pub String);

impl FromStr for Difficulty {
    type Err = UnknownDifficulty;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Difficulty::ALL
            .into_iter()
            .find(|d| d.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownDifficulty(s.to_string()))
    }
}
