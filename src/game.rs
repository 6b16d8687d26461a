use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Weak};

use divine_quiz_bot::quiz::generation::GenerationService;
use divine_quiz_bot::quiz::scores::{FileScoreStore, GameHistoryEntry, ScoreStore};
use divine_quiz_bot::quiz::{
    Completion, GameSetup, GenerationEvent, Language, Pantheon, QuizError, Round,
    RoundController, RoundStatus,
};
use log::{debug, error, warn};
use teloxide::prelude::*;
use teloxide::types::{InputFile, KeyboardButton, KeyboardMarkup};
use tokio::sync::{mpsc, Mutex};

use crate::{HandlerResult, Profile};

pub const SKIP: &str = "Skip";
pub const RETRY: &str = "Retry";
pub const NEXT_QUESTION: &str = "Next question";
pub const FINISH_GAME: &str = "Finish game";
pub const PLAY_AGAIN: &str = "Play again";
pub const EXIT_TO_MENU: &str = "Exit to menu";

const HISTORY_LIMIT: usize = 10;

/// What the dialogue should do after an in-game message.
pub enum Flow {
    Stay,
    BackToMenu,
}

type SharedController = Arc<Mutex<RoundController>>;

/// Live games, one per chat.
pub struct Games {
    pantheon: Arc<Pantheon>,
    generator: Arc<dyn GenerationService>,
    scores_dir: PathBuf,
    sessions: Mutex<HashMap<ChatId, SharedController>>,
}

impl Games {
    pub fn new(
        pantheon: Arc<Pantheon>,
        generator: Arc<dyn GenerationService>,
        scores_dir: PathBuf,
    ) -> Self {
        Self {
            pantheon,
            generator,
            scores_dir,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn scores_for(&self, chat: ChatId) -> Arc<dyn ScoreStore> {
        Arc::new(FileScoreStore::for_player(&self.scores_dir, chat.0))
    }

    pub async fn start(&self, bot: &Bot, chat: ChatId, profile: &Profile) -> HandlerResult {
        let (controller, events) = RoundController::new(
            GameSetup::new(profile.difficulty, profile.language),
            self.pantheon.clone(),
            self.generator.clone(),
            self.scores_for(chat),
        )?;
        let controller = Arc::new(Mutex::new(controller));

        let previous = self.sessions.lock().await.insert(chat, controller.clone());
        if let Some(previous) = previous {
            previous.lock().await.exit();
        }
        spawn_pump(bot.clone(), chat, Arc::downgrade(&controller), events);

        let mut game = controller.lock().await;
        game.start()?;
        bot.send_message(
            chat,
            format!(
                "Your journey begins, {}! {} rounds on {} ({}).",
                profile.name,
                game.settings().rounds,
                profile.difficulty,
                game.settings().label
            ),
        )
        .await?;
        render(bot, chat, &game).await
    }

    pub async fn handle(&self, bot: &Bot, chat: ChatId, text: &str) -> Result<Flow, crate::Error> {
        let Some(controller) = self.sessions.lock().await.get(&chat).cloned() else {
            bot.send_message(chat, "There is no game in progress.").await?;
            return Ok(Flow::BackToMenu);
        };
        let mut game = controller.lock().await;

        let result = match text {
            SKIP => game.skip().map(|_| ()),
            RETRY => game.retry().map(|_| ()),
            NEXT_QUESTION | FINISH_GAME => game.next_round().map(|_| ()),
            PLAY_AGAIN => game.restart().map(|_| ()),
            EXIT_TO_MENU => {
                if let Some(entry) = game.exit() {
                    debug!("Recorded game {} for chat {}", entry.id, chat);
                }
                drop(game);
                self.sessions.lock().await.remove(&chat);
                return Ok(Flow::BackToMenu);
            }
            name => {
                let language = game.session().language;
                let option = game
                    .round()
                    .filter(|_| game.status() == RoundStatus::Playing)
                    .and_then(|round| round.option_named(language, name))
                    .map(|deity| deity.id.clone());
                match option {
                    Some(id) => game.answer(&id).map(|_| ()),
                    None => {
                        bot.send_message(chat, "Please choose one of the options").await?;
                        return Ok(Flow::Stay);
                    }
                }
            }
        };

        match result {
            Ok(()) => render(bot, chat, &game).await?,
            Err(QuizError::ImageNotReady) => {
                bot.send_message(chat, "Wait for the picture to appear first.")
                    .await?;
            }
            Err(QuizError::InvalidTransition { .. }) => {
                bot.send_message(chat, "That button does nothing right now.")
                    .await?;
            }
            Err(e) => return Err(e.into()),
        }
        Ok(Flow::Stay)
    }

    pub async fn history(&self, bot: &Bot, chat: ChatId) -> HandlerResult {
        let text = match self.scores_for(chat).history() {
            Ok(entries) => history_text(&entries),
            Err(e) => {
                warn!("Could not read the history of chat {}: {}", chat, e);
                "Past games are unavailable right now.".to_string()
            }
        };
        bot.send_message(chat, text).await?;
        Ok(())
    }
}

/// Feeds finished generation calls back into the controller while the game is alive.
fn spawn_pump(
    bot: Bot,
    chat: ChatId,
    controller: Weak<Mutex<RoundController>>,
    mut events: mpsc::UnboundedReceiver<GenerationEvent>,
) {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let Some(controller) = controller.upgrade() else {
                break;
            };
            let mut game = controller.lock().await;
            if game.apply(event) == Completion::Applied {
                if let Err(e) = render(&bot, chat, &game).await {
                    error!("Could not show the image in chat {}: {}", chat, e);
                }
            }
        }
        debug!("Event pump for chat {} stopped", chat);
    });
}

async fn render(bot: &Bot, chat: ChatId, game: &RoundController) -> HandlerResult {
    let session = game.session();
    let rounds = game.settings().rounds;

    match game.status() {
        RoundStatus::Idle => {}
        RoundStatus::Playing => {
            let Some(round) = game.round() else {
                return Ok(());
            };
            match &round.image_url {
                Some(url) => {
                    let caption = format!("{}\nWho is this deity?", question_line(round, rounds));
                    let names = option_names(round, session.language);
                    send_picture(bot, chat, url, caption, &names).await?;
                }
                None => {
                    let (text, markup) = waiting_message(round, session.language, rounds);
                    bot.send_message(chat, text).reply_markup(markup).await?;
                }
            }
        }
        RoundStatus::Revealed => {
            let Some(round) = game.round() else {
                return Ok(());
            };
            let mut text = round.feedback.clone().unwrap_or_default();
            if let Some(description) = &round.deity.description {
                text.push_str("\n\n");
                text.push_str(description);
            }
            text.push_str(&format!("\n\nScore: {}", session.score));

            let next = if session.rounds_played >= rounds {
                FINISH_GAME
            } else {
                NEXT_QUESTION
            };
            bot.send_message(chat, text)
                .reply_markup(keyboard(vec![vec![next.to_string()]]))
                .await?;
        }
        RoundStatus::Finished => {
            bot.send_message(
                chat,
                format!(
                    "Journey complete! You scored {} points.\nHigh score ({}): {}",
                    session.score, session.difficulty, session.high_score
                ),
            )
            .reply_markup(keyboard(vec![vec![
                PLAY_AGAIN.to_string(),
                EXIT_TO_MENU.to_string(),
            ]]))
            .await?;
        }
    }
    Ok(())
}

fn question_line(round: &Round, rounds: u32) -> String {
    format!("Question {} of {}", round.round_index + 1, rounds)
}

fn option_names(round: &Round, language: Language) -> Vec<String> {
    round
        .options
        .iter()
        .map(|d| d.name(language).to_string())
        .collect()
}

/// Text and keyboard for a round whose picture is not there yet. The options stay on screen;
/// the controller refuses answers until the picture arrives.
fn waiting_message(round: &Round, language: Language, rounds: u32) -> (String, KeyboardMarkup) {
    let status = if round.image_error {
        "The divine vision is clouded. Retry the picture or skip the round."
    } else {
        "Manifesting the divine form..."
    };
    (
        format!("{}\n{}", question_line(round, rounds), status),
        options_keyboard(&option_names(round, language)),
    )
}

async fn send_picture(
    bot: &Bot,
    chat: ChatId,
    url: &str,
    caption: String,
    names: &[String],
) -> HandlerResult {
    match reqwest::Url::parse(url) {
        Ok(parsed) if parsed.scheme().starts_with("http") => {
            bot.send_photo(chat, InputFile::url(parsed))
                .caption(caption)
                .reply_markup(options_keyboard(names))
                .await?;
        }
        _ => {
            warn!("Image for chat {} is not a fetchable URL", chat);
            bot.send_message(chat, format!("{}\n(The picture could not be shown.)", caption))
                .reply_markup(options_keyboard(names))
                .await?;
        }
    }
    Ok(())
}

fn keyboard(rows: Vec<Vec<String>>) -> KeyboardMarkup {
    KeyboardMarkup::new(
        rows.into_iter()
            .map(|row| row.into_iter().map(KeyboardButton::new).collect::<Vec<_>>()),
    )
    .resize_keyboard(true)
}

/// Option names two per row, then Skip and Retry.
fn options_keyboard(names: &[String]) -> KeyboardMarkup {
    let mut rows: Vec<Vec<String>> = names.chunks(2).map(|pair| pair.to_vec()).collect();
    rows.push(vec![SKIP.to_string(), RETRY.to_string()]);
    keyboard(rows)
}

/// Latest games first.
fn history_text(entries: &[GameHistoryEntry]) -> String {
    if entries.is_empty() {
        return "No past games yet. Start a journey!".to_string();
    }

    let lines: Vec<String> = entries
        .iter()
        .rev()
        .take(HISTORY_LIMIT)
        .map(|entry| {
            format!(
                "{} · {} · {} · {} points in {} rounds",
                entry.date.format("%d %b %Y %H:%M"),
                entry.difficulty,
                entry.language,
                entry.score,
                entry.total_rounds
            )
        })
        .collect();
    format!("Past games:\n{}", lines.join("\n"))
}
