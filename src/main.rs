use std::sync::Arc;

use dotenvy::dotenv;
use dptree::case;
use envconfig::Envconfig;
use teloxide::{
    dispatching::{
        dialogue::{self, InMemStorage},
        Dispatcher, UpdateFilterExt,
    },
    prelude::*,
    types::{KeyboardButton, KeyboardMarkup, ReplyMarkup},
    utils::command::BotCommands,
};

pub mod api;
pub mod handlers;
pub mod services;
pub mod sync;
pub mod utils;

use api::ApiClient;
use sync::{RxList, SharedRxList};

pub type Error = Box<dyn std::error::Error + Send + Sync>;

#[derive(Envconfig)]
pub struct Config {
    #[envconfig(from = "TELEGRAM_BOT_TOKEN")]
    telegram_bot_token: String,

    /// Origin of the prescription backend. Must end with a slash; resource
    /// paths are concatenated onto it unchanged.
    #[envconfig(from = "MEDMINDER_BACKEND_URL", default = "http://localhost:8080/")]
    backend_url: String,

    /// Chat that receives the daily refill reminders. Unset disables the
    /// reminder service.
    #[envconfig(from = "MEDMINDER_REMINDER_CHAT_ID")]
    reminder_chat_id: Option<i64>,
}

#[derive(BotCommands, Debug, Clone)]
#[command(
    rename_rule = "lowercase",
    description = "Available commands:",
    parse_with = "split"
)]
enum Command {
    #[command(description = "Start interacting with the MedMinder bot.")]
    Start,
    #[command(description = "Show the prescription list.")]
    List,
    #[command(description = "Fetch the prescription list from the backend again.")]
    Refresh,
    #[command(description = "Add a new prescription.")]
    New,
    #[command(description = "Edit a prescription's quantity or rate.")]
    Edit(String),
    #[command(description = "Delete a prescription.")]
    Delete(String),
    #[command(description = "Display the main menu.")]
    Menu,
    #[command(description = "Display help information about available commands.")]
    Help,
}

#[derive(Clone, PartialEq, Debug, Default)]
pub enum State {
    #[default]
    Start,
    /// The create form is open, waiting for "<name> <quantity> <rate>".
    NewRx,
    /// The edit form is open for one prescription, waiting for
    /// "<quantity> <rate>".
    EditRx {
        name: String,
    },
}

pub type MyDialogue = Dialogue<State, InMemStorage<State>>;

static EN: phf::Map<&'static str, &'static str> = phf::phf_map! {
    "welcome" => "Welcome to the MedMinder bot!",
    "list_header" => "Your prescriptions:",
    "no_prescriptions" => "No prescriptions found",
    "unknown_command" => "I don't understand that command. Please use the menu or type /help for available commands.",
};

static ES: phf::Map<&'static str, &'static str> = phf::phf_map! {
    "welcome" => "¡Bienvenido al bot MedMinder!",
    "list_header" => "Tus recetas:",
    "no_prescriptions" => "No se encontraron recetas",
    "unknown_command" => "No entiendo ese comando. Usa el menú o escribe /help para ver los comandos disponibles.",
};

/// Translations for the fixed UI strings. The tables are static `phf` maps;
/// unknown languages fall back to English.
#[derive(Clone)]
pub struct I18n;

impl I18n {
    pub fn new() -> Self {
        I18n
    }

    pub fn get(&self, lang: &str, key: &str) -> String {
        let table = match lang {
            "es" => &ES,
            _ => &EN,
        };
        table
            .get(key)
            .map(|s| s.to_string())
            .unwrap_or_else(|| format!("Missing translation: {}", key))
    }
}

impl Default for I18n {
    fn default() -> Self {
        I18n::new()
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Initialize the logger with default settings or "info" level if not specified
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    log::info!("Starting the MedMinder bot...");

    // Load environment variables from a .env file if present
    dotenv().ok();

    // Initialize configuration from environment variables
    let config = Config::init_from_env().unwrap();

    // The in-memory prescription list, backed by the configured backend
    let rx: SharedRxList = Arc::new(RxList::new(ApiClient::new(config.backend_url)));

    // Populate the list once before taking any user input. An unreachable
    // backend is not fatal; the bot starts with an empty list.
    match rx.refresh().await {
        Ok(records) => log::info!("Loaded {} prescriptions", records.len()),
        Err(e) => log::warn!("Initial refresh failed, starting with an empty list: {}", e),
    }

    // Create a new Telegram bot instance with the token from config
    let bot = Bot::new(config.telegram_bot_token);

    let i18n = I18n::new();

    // Start the daily refill reminder sweep when a target chat is configured
    if let Some(chat_id) = config.reminder_chat_id {
        services::schedule_refill_reminders(Arc::clone(&rx), bot.clone(), ChatId(chat_id))
            .await?;
    }

    // Set up the message handler for the bot
    let handler = dialogue::enter::<Update, InMemStorage<State>, State, _>()
        // Handle command messages
        .branch(
            Update::filter_message()
                .branch(dptree::entry().filter_command::<Command>().endpoint(answer)),
        )
        // Handle the open create form
        .branch(
            Update::filter_message()
                .branch(case![State::NewRx].endpoint(handlers::rx::create_prescription)),
        )
        // Handle the open edit form
        .branch(
            Update::filter_message()
                .branch(case![State::EditRx { name }].endpoint(handlers::rx::edit_prescription)),
        )
        // Handle all other messages
        .branch(Update::filter_message().endpoint(handle_message));

    // Build and run the dispatcher
    Dispatcher::builder(bot, handler)
        // Add dependencies: the shared list, dialogue storage, and translations
        .dependencies(dptree::deps![rx, InMemStorage::<State>::new(), i18n])
        // Enable handling of Ctrl+C for graceful shutdown
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    // Log shutdown message
    log::info!("Shutting down gracefully");
    Ok(())
}

/// Handles bot commands and responds accordingly.
///
/// This function is responsible for processing the bot commands and invoking
/// the matching prescription operation or opening the matching form.
///
/// # Arguments
///
/// * `bot` - The Telegram Bot instance used to send messages.
/// * `msg` - The received message containing the command.
/// * `cmd` - The parsed command enum.
/// * `rx` - The shared prescription list.
/// * `dialogue` - The dialogue state for managing the open form.
/// * `i18n` - The internationalization (i18n) instance for translations.
///
/// # Returns
///
/// Returns a Result indicating success or failure of the command handling.
async fn answer(
    bot: Bot,
    msg: Message,
    cmd: Command,
    rx: SharedRxList,
    dialogue: MyDialogue,
    i18n: I18n,
) -> Result<(), Error> {
    // Determine the user's language from their Telegram client
    let lang = msg
        .from
        .as_ref()
        .and_then(|user| user.language_code.clone())
        .unwrap_or_else(|| "en".to_string());

    match cmd {
        Command::Start => {
            log::info!("Received start command");
            bot.send_message(
                msg.chat.id,
                format!(
                    "{}\nType /menu to see what I can do.",
                    i18n.get(&lang, "welcome")
                ),
            )
            .await?;
        }
        Command::List => {
            log::info!("Received list command");
            handlers::rx::list_prescriptions(bot, msg, rx, i18n).await?;
        }
        Command::Refresh => {
            log::info!("Received refresh command");
            handlers::rx::refresh_prescriptions(bot, msg, rx, i18n).await?;
        }
        Command::New => {
            // Open the create form; the next message is the form input
            log::info!("Received new command");
            bot.send_message(
                msg.chat.id,
                "Send the new prescription as: <name> <quantity> <rate>",
            )
            .await?;
            dialogue.update(State::NewRx).await?;
        }
        Command::Edit(name) => {
            // Open the edit form for one prescription
            log::info!("Received edit command for {}", name);
            bot.send_message(
                msg.chat.id,
                format!(
                    "Editing {}. Send the changes as: <quantity> <rate>, with - for a field to keep",
                    name
                ),
            )
            .await?;
            dialogue.update(State::EditRx { name }).await?;
        }
        Command::Delete(name) => {
            log::info!("Received delete command for {}", name);
            handlers::rx::delete_prescription(bot, msg, rx, name).await?;
        }
        Command::Menu => {
            // Log the received menu command
            log::info!("Received menu command");

            // Create a custom keyboard with the common actions
            let keyboard = KeyboardMarkup::new(vec![
                vec![KeyboardButton::new("📋 List")],
                vec![KeyboardButton::new("➕ New")],
                vec![KeyboardButton::new("🔄 Refresh")],
                vec![KeyboardButton::new("❓ Help")],
            ])
            .resize_keyboard() // Allow the keyboard to be resized
            .one_time_keyboard(); // Make the keyboard disappear after one use

            // Define the welcome message
            let menu_text = "Welcome to the MedMinder bot! Please choose an option:";

            // Send the message with the custom keyboard
            bot.send_message(msg.chat.id, menu_text)
                .reply_markup(ReplyMarkup::Keyboard(keyboard))
                .await?;
        }
        Command::Help => {
            // Display help information
            log::info!("Received help command");
            bot.send_message(msg.chat.id, Command::descriptions().to_string())
                .await?;
        }
    };

    Ok(())
}

/// Handles incoming messages from users.
///
/// This function processes text messages and executes corresponding actions
/// based on the content, mapping the menu keyboard buttons to their commands.
///
/// # Arguments
///
/// * `bot` - The Bot instance used to send responses.
/// * `msg` - The incoming Message to be processed.
/// * `rx` - The shared prescription list.
/// * `dialogue` - The dialogue state for managing the open form.
/// * `i18n` - The internationalization (i18n) instance for translations.
///
/// # Returns
///
/// Returns a Result indicating success or failure of the operation.
async fn handle_message(
    bot: Bot,
    msg: Message,
    rx: SharedRxList,
    dialogue: MyDialogue,
    i18n: I18n,
) -> Result<(), Error> {
    let lang = msg
        .from
        .as_ref()
        .and_then(|user| user.language_code.clone())
        .unwrap_or_else(|| "en".to_string());

    if let Some(text) = msg.text() {
        match text {
            "📋 List" => handlers::rx::list_prescriptions(bot, msg, rx, i18n).await?,
            "🔄 Refresh" => handlers::rx::refresh_prescriptions(bot, msg, rx, i18n).await?,
            "➕ New" => {
                bot.send_message(
                    msg.chat.id,
                    "Send the new prescription as: <name> <quantity> <rate>",
                )
                .await?;
                dialogue.update(State::NewRx).await?;
            }
            "❓ Help" => {
                bot.send_message(msg.chat.id, Command::descriptions().to_string())
                    .await?;
            }
            _ => {
                bot.send_message(msg.chat.id, i18n.get(&lang, "unknown_command"))
                    .await?;
            }
        }
    }
    Ok(())
}
