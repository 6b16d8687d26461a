mod game;

use std::{fs::File, sync::Arc};

use chatgpt::{client::ChatGPT, config::ChatGPTEngine};
use divine_quiz_bot::config::Config;
use divine_quiz_bot::quiz::artist::DeityArtist;
use divine_quiz_bot::quiz::{Difficulty, Language, Pantheon};
use dotenv::dotenv;
use game::{Flow, Games};
use teloxide::{
    dispatching::dialogue::{serializer::Json, ErasedStorage, SqliteStorage, Storage},
    prelude::*,
    types::{KeyboardButton, KeyboardMarkup},
};

type QuizDialogue = Dialogue<State, ErasedStorage<State>>;
type Error = Box<dyn std::error::Error + Send + Sync>;
type HandlerResult = Result<(), Error>;

#[derive(Clone, serde::Serialize, serde::Deserialize)]
pub struct Profile {
    pub name: String,
    pub language: Language,
    pub difficulty: Difficulty,
}

#[derive(Clone, Default, serde::Serialize, serde::Deserialize)]
pub enum State {
    #[default]
    Start,
    ReceiveFullName,
    ReceiveLanguage {
        name: String,
    },
    ReceiveDifficulty {
        name: String,
        language: Language,
    },
    Menu {
        profile: Profile,
    },
    InGame {
        profile: Profile,
    },
}

type UserInfoStorage = std::sync::Arc<ErasedStorage<State>>;

#[tokio::main]
async fn main() {
    dotenv().ok();
    pretty_env_logger::init();
    log::info!("Starting divine quiz bot...");

    let config = Config::from_env().expect("Invalid configuration");
    let bot = Bot::from_env();

    log::info!("Opening the dialogue database at {}", config.dialogue_db);
    let storage: UserInfoStorage = SqliteStorage::open(&config.dialogue_db, Json)
        .await
        .expect("Failed to open the dialogue database")
        .erase();

    let pantheon = Pantheon::new(
        File::open(&config.deities_path).expect("Failed to open the pantheon file"),
    )
    .expect("Failed to load the pantheon");
    for difficulty in Difficulty::ALL {
        pantheon
            .ensure_supports(&difficulty.settings())
            .expect("The pantheon is too small for every difficulty");
    }
    log::info!("Loaded {} deities", pantheon.len());

    let gpt = {
        let mut gpt =
            ChatGPT::new(config.chatgpt_api_key.clone()).expect("Unable to connect with ChatGPT");

        gpt.config.engine = ChatGPTEngine::Gpt35Turbo;
        gpt.config.timeout = std::time::Duration::from_secs(15);

        gpt
    };
    let artist = DeityArtist::new(gpt, &config.chatgpt_api_key, &config.openai_api_base)
        .expect("Failed to build the image client");

    let games = Arc::new(Games::new(
        Arc::new(pantheon),
        Arc::new(artist),
        config.scores_dir.clone(),
    ));

    Dispatcher::builder(
        bot,
        Update::filter_message()
            .enter_dialogue::<Message, ErasedStorage<State>, State>()
            .branch(dptree::case![State::Start].endpoint(start))
            .branch(dptree::case![State::ReceiveFullName].endpoint(receive_full_name))
            .branch(dptree::case![State::ReceiveLanguage { name }].endpoint(receive_language))
            .branch(
                dptree::case![State::ReceiveDifficulty { name, language }]
                    .endpoint(receive_difficulty),
            )
            .branch(dptree::case![State::Menu { profile }].endpoint(menu))
            .branch(dptree::case![State::InGame { profile }].endpoint(in_game)),
    )
    .dependencies(dptree::deps![storage, games])
    .enable_ctrlc_handler()
    .build()
    .dispatch()
    .await;
}

const GREETING_TEXT: &str =
    "Namaste! I show you sacred art and you name the deity in it. What is your name?";
async fn start(bot: Bot, dialogue: QuizDialogue, msg: Message) -> HandlerResult {
    bot.send_message(msg.chat.id, GREETING_TEXT).await?;

    dialogue.update(State::ReceiveFullName).await?;
    Ok(())
}

async fn receive_full_name(bot: Bot, dialogue: QuizDialogue, msg: Message) -> HandlerResult {
    let Some(name) = msg.text().map(str::trim).filter(|n| !n.is_empty()) else {
        bot.send_message(msg.chat.id, "Please send your name as text")
            .await?;
        return Ok(());
    };

    bot.send_message(msg.chat.id, format!("Nice to meet you, {}!", name))
        .await?;
    ask_language(&bot, &msg).await?;

    dialogue
        .update(State::ReceiveLanguage {
            name: name.to_string(),
        })
        .await?;
    Ok(())
}

async fn ask_language(bot: &Bot, msg: &Message) -> HandlerResult {
    let keyboard = KeyboardMarkup::new(
        Language::ALL
            .chunks(3)
            .map(|row| row.iter().map(|l| KeyboardButton::new(l.label())).collect::<Vec<_>>()),
    );
    bot.send_message(msg.chat.id, "Which language should the deity names be in?")
        .reply_markup(keyboard)
        .await?;
    Ok(())
}

async fn receive_language(
    bot: Bot,
    dialogue: QuizDialogue,
    name: String,
    msg: Message,
) -> HandlerResult {
    let Some(Ok(language)) = msg.text().map(str::parse::<Language>) else {
        bot.send_message(msg.chat.id, "Please choose one of the languages")
            .await?;
        return Ok(());
    };

    let keyboard = KeyboardMarkup::new(vec![Difficulty::ALL
        .iter()
        .map(|d| KeyboardButton::new(d.as_str()))
        .collect::<Vec<_>>()]);
    let tiers = Difficulty::ALL
        .iter()
        .map(|d| {
            let tier = d.settings();
            format!(
                "{} ({}): {} rounds, {} options, {} points each",
                d, tier.label, tier.rounds, tier.options, tier.points
            )
        })
        .collect::<Vec<_>>()
        .join("\n");
    bot.send_message(msg.chat.id, format!("Choose your difficulty:\n{}", tiers))
        .reply_markup(keyboard)
        .await?;

    dialogue
        .update(State::ReceiveDifficulty { name, language })
        .await?;
    Ok(())
}

async fn receive_difficulty(
    bot: Bot,
    dialogue: QuizDialogue,
    (name, language): (String, Language),
    msg: Message,
) -> HandlerResult {
    let Some(Ok(difficulty)) = msg.text().map(str::parse::<Difficulty>) else {
        bot.send_message(msg.chat.id, "Please choose one of the difficulties")
            .await?;
        return Ok(());
    };

    let profile = Profile {
        name,
        language,
        difficulty,
    };
    show_menu(&bot, &msg, &profile).await?;

    dialogue.update(State::Menu { profile }).await?;
    Ok(())
}

const START_JOURNEY: &str = "Start journey";
const VIEW_HISTORY: &str = "View past games";
const CHANGE_SETTINGS: &str = "Change settings";
async fn show_menu(bot: &Bot, msg: &Message, profile: &Profile) -> HandlerResult {
    let keyboard = KeyboardMarkup::new(vec![
        vec![KeyboardButton::new(START_JOURNEY)],
        vec![
            KeyboardButton::new(VIEW_HISTORY),
            KeyboardButton::new(CHANGE_SETTINGS),
        ],
    ]);
    bot.send_message(
        msg.chat.id,
        format!(
            "{}, you play in {} on {}. What would you like to do?",
            profile.name, profile.language, profile.difficulty
        ),
    )
    .reply_markup(keyboard)
    .await?;
    Ok(())
}

async fn menu(
    games: Arc<Games>,
    bot: Bot,
    dialogue: QuizDialogue,
    profile: Profile,
    msg: Message,
) -> HandlerResult {
    match msg.text() {
        Some(START_JOURNEY) => {
            games.start(&bot, msg.chat.id, &profile).await?;
            dialogue.update(State::InGame { profile }).await?;
        }
        Some(VIEW_HISTORY) => {
            games.history(&bot, msg.chat.id).await?;
            show_menu(&bot, &msg, &profile).await?;
        }
        Some(CHANGE_SETTINGS) => {
            ask_language(&bot, &msg).await?;
            dialogue
                .update(State::ReceiveLanguage { name: profile.name })
                .await?;
        }
        _ => {
            bot.send_message(msg.chat.id, "Please choose one of the options")
                .await?;
        }
    }
    Ok(())
}

async fn in_game(
    games: Arc<Games>,
    bot: Bot,
    dialogue: QuizDialogue,
    profile: Profile,
    msg: Message,
) -> HandlerResult {
    let Some(text) = msg.text() else {
        bot.send_message(msg.chat.id, "Please use the buttons")
            .await?;
        return Ok(());
    };

    if let Flow::BackToMenu = games.handle(&bot, msg.chat.id, text).await? {
        show_menu(&bot, &msg, &profile).await?;
        dialogue.update(State::Menu { profile }).await?;
    }
    Ok(())
}
