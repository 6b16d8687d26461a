use std::env;
use std::path::PathBuf;

const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
const DEFAULT_DEITIES_PATH: &str = "deities.json";
const DEFAULT_SCORES_DIR: &str = "scores";
const DEFAULT_DIALOGUE_DB: &str = "db.sqlite";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),
}

/// Settings read from the environment (and `.env`, loaded by `main`).
///
/// The Telegram token is not here: teloxide reads `TELOXIDE_TOKEN` itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub chatgpt_api_key: String,
    pub openai_api_base: String,
    pub deities_path: PathBuf,
    pub scores_dir: PathBuf,
    pub dialogue_db: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Ok(Self {
            chatgpt_api_key: var("CHATGPT_API_KEY").ok_or(ConfigError::Missing("CHATGPT_API_KEY"))?,
            openai_api_base: var("OPENAI_API_BASE").unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            deities_path: var("DEITIES_PATH")
                .unwrap_or_else(|| DEFAULT_DEITIES_PATH.to_string())
                .into(),
            scores_dir: var("SCORES_DIR")
                .unwrap_or_else(|| DEFAULT_SCORES_DIR.to_string())
                .into(),
            dialogue_db: var("DIALOGUE_DB").unwrap_or_else(|| DEFAULT_DIALOGUE_DB.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn api_key_is_required() {
        assert_eq!(
            Config::from_lookup(lookup(&[])),
            Err(ConfigError::Missing("CHATGPT_API_KEY"))
        );
        assert_eq!(
            Config::from_lookup(lookup(&[("CHATGPT_API_KEY", "  ")])),
            Err(ConfigError::Missing("CHATGPT_API_KEY"))
        );
    }

    #[test]
    fn defaults_fill_the_rest() {
        let config = Config::from_lookup(lookup(&[("CHATGPT_API_KEY", "sk-test")])).unwrap();
        assert_eq!(config.openai_api_base, DEFAULT_API_BASE);
        assert_eq!(config.deities_path, PathBuf::from("deities.json"));
        assert_eq!(config.scores_dir, PathBuf::from("scores"));
        assert_eq!(config.dialogue_db, "db.sqlite");
    }

    #[test]
    fn overrides_are_taken() {
        let config = Config::from_lookup(lookup(&[
            ("CHATGPT_API_KEY", "sk-test"),
            ("SCORES_DIR", "/var/lib/quiz"),
            ("OPENAI_API_BASE", "http://localhost:8080/v1"),
        ]))
        .unwrap();
        assert_eq!(config.scores_dir, PathBuf::from("/var/lib/quiz"));
        assert_eq!(config.openai_api_base, "http://localhost:8080/v1");
    }
}
