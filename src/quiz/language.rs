use std::fmt;
use std::str::FromStr;

/// Languages the quiz can be played in.
///
/// English is the default language: every deity in the pantheon must carry an English name,
/// and it is what every other language falls back to.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub enum Language {
    #[default]
    English,
    Hindi,
    Telugu,
    Kannada,
    Tamil,
    Malayalam,
}

impl Language {
    pub const DEFAULT: Language = Language::English;

    pub const ALL: [Language; 6] = [
        Language::English,
        Language::Hindi,
        Language::Telugu,
        Language::Kannada,
        Language::Tamil,
        Language::Malayalam,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Language::English => "English",
            Language::Hindi => "Hindi",
            Language::Telugu => "Telugu",
            Language::Kannada => "Kannada",
            Language::Tamil => "Tamil",
            Language::Malayalam => "Malayalam",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("unsupported language: {0}")]
pub struct UnknownLanguage(pub String);

impl FromStr for Language {
    type Err = UnknownLanguage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Language::ALL
            .into_iter()
            .find(|l| l.label().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownLanguage(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_labels_case_insensitively() {
        assert_eq!("telugu".parse::<Language>(), Ok(Language::Telugu));
        assert_eq!(" Malayalam ".parse::<Language>(), Ok(Language::Malayalam));
        assert!("Klingon".parse::<Language>().is_err());
    }

    #[test]
    fn serializes_as_label() {
        let json = serde_json::to_string(&Language::Kannada).unwrap();
        assert_eq!(json, "\"Kannada\"");
    }
}
