use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt::Display;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::quiz::difficulty::Difficulty;
use crate::quiz::language::Language;

#[derive(Debug, thiserror::Error)]
pub enum ScoreError {
    #[error("score file: {0}")]
    Io(#[from] std::io::Error),
    #[error("score file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("score store lock was poisoned")]
    Poisoned,
}

/// A game as it is handed to the recorder when it ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinishedGame {
    pub score: u32,
    pub total_rounds: u32,
    pub difficulty: Difficulty,
    pub language: Language,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct GameHistoryEntry {
    pub id: String,
    pub date: DateTime<Utc>,
    pub score: u32,
    pub total_rounds: u32,
    pub difficulty: Difficulty,
    pub language: Language,
}

impl GameHistoryEntry {
    fn stamp(game: FinishedGame) -> Self {
        let date = Utc::now();
        Self {
            id: date.timestamp_millis().to_string(),
            date,
            score: game.score,
            total_rounds: game.total_rounds,
            difficulty: game.difficulty,
            language: game.language,
        }
    }
}

/// Game history and per-difficulty high scores of one player.
pub trait ScoreStore: Send + Sync {
    fn record_game(&self, game: FinishedGame) -> Result<GameHistoryEntry, ScoreError>;
    fn high_score(&self, difficulty: Difficulty) -> Result<u32, ScoreError>;
    fn set_high_score(&self, difficulty: Difficulty, value: u32) -> Result<(), ScoreError>;
    /// Oldest first.
    fn history(&self) -> Result<Vec<GameHistoryEntry>, ScoreError>;
}

#[derive(Debug, Default, serde::Serialize, serde::Deserialize)]
struct ScoreBook {
    #[serde(default)]
    high_scores: BTreeMap<Difficulty, u32>,
    #[serde(default)]
    history: Vec<GameHistoryEntry>,
}

impl ScoreBook {
    fn record(&mut self, game: FinishedGame) -> GameHistoryEntry {
        let entry = GameHistoryEntry::stamp(game);
        self.history.push(entry.clone());
        entry
    }

    fn high_score(&self, difficulty: Difficulty) -> u32 {
        self.high_scores.get(&difficulty).copied().unwrap_or(0)
    }
}

/// Keeps one JSON file per player. A missing file reads as an empty score book.
pub struct FileScoreStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileScoreStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn for_player(dir: impl AsRef<Path>, player: impl Display) -> Self {
        Self::new(dir.as_ref().join(format!("{}.json", player)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<ScoreBook, ScoreError> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(ScoreBook::default()),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, book: &ScoreBook) -> Result<(), ScoreError> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(book)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn update<T>(&self, change: impl FnOnce(&mut ScoreBook) -> T) -> Result<T, ScoreError> {
        let _guard = self.lock.lock().map_err(|_| ScoreError::Poisoned)?;
        let mut book = self.load()?;
        let out = change(&mut book);
        self.save(&book)?;
        Ok(out)
    }
}

impl ScoreStore for FileScoreStore {
    fn record_game(&self, game: FinishedGame) -> Result<GameHistoryEntry, ScoreError> {
        self.update(|book| book.record(game))
    }

    fn high_score(&self, difficulty: Difficulty) -> Result<u32, ScoreError> {
        let _guard = self.lock.lock().map_err(|_| ScoreError::Poisoned)?;
        Ok(self.load()?.high_score(difficulty))
    }

    fn set_high_score(&self, difficulty: Difficulty, value: u32) -> Result<(), ScoreError> {
        self.update(|book| {
            book.high_scores.insert(difficulty, value);
        })
    }

    fn history(&self) -> Result<Vec<GameHistoryEntry>, ScoreError> {
        let _guard = self.lock.lock().map_err(|_| ScoreError::Poisoned)?;
        Ok(self.load()?.history)
    }
}

#[derive(Default)]
pub struct MemoryScoreStore {
    book: Mutex<ScoreBook>,
}

impl MemoryScoreStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ScoreStore for MemoryScoreStore {
    fn record_game(&self, game: FinishedGame) -> Result<GameHistoryEntry, ScoreError> {
        let mut book = self.book.lock().map_err(|_| ScoreError::Poisoned)?;
        Ok(book.record(game))
    }

    fn high_score(&self, difficulty: Difficulty) -> Result<u32, ScoreError> {
        let book = self.book.lock().map_err(|_| ScoreError::Poisoned)?;
        Ok(book.high_score(difficulty))
    }

    fn set_high_score(&self, difficulty: Difficulty, value: u32) -> Result<(), ScoreError> {
        let mut book = self.book.lock().map_err(|_| ScoreError::Poisoned)?;
        book.high_scores.insert(difficulty, value);
        Ok(())
    }

    fn history(&self) -> Result<Vec<GameHistoryEntry>, ScoreError> {
        let book = self.book.lock().map_err(|_| ScoreError::Poisoned)?;
        Ok(book.history.clone())
    }
}
