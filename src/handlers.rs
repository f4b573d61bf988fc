//! Command and message handlers.
//!
//! Every update is handled on its own: extract the payload, ask the
//! estimator, send the answer back. Estimator failures never leave a
//! handler, the user gets a fixed apology line instead.

use std::sync::Arc;

use teloxide::net::Download;
use teloxide::prelude::*;
use teloxide::types::{FileId, KeyboardButton, KeyboardMarkup, PhotoSize};
use teloxide::utils::command::BotCommands;
use tracing::{info, warn};

use crate::BotState;
use crate::openai;

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase")]
pub enum Command {
    Start,
    Help,
}

// Reply keyboard labels. Button presses arrive as plain text messages.
pub const BUTTON_START: &str = "🏠 Старт";
pub const BUTTON_ANALYZE_PHOTO: &str = "📸 Анализ блюда";
pub const BUTTON_SEARCH_CALORIES: &str = "🔍 Поиск калорий";
pub const BUTTON_HELP: &str = "❓ Помощь";

pub const WELCOME: &str = "\
🍎 Добро пожаловать в бот подсчета калорий! 🍎

Я помогу вам определить калории в еде:
📸 Фото еды - просто отправьте мне фотографию
📝 Описание - расскажите что вы ели (например, \"2 яблока и 200г риса\")

Используйте кнопки внизу для навигации!";

pub const HELP: &str = "\
❓ Помощь - Бот подсчета калорий

Как пользоваться:
📸 \"Анализ блюда\" → отправьте фото еды
🔍 \"Поиск калорий\" → опишите еду текстом

Примеры описаний:
• \"2 яблока\"
• \"200г вареного риса\"
• \"1 кусок пиццы\"
• \"2 яйца и хлеб\"

💡 Калории указаны приблизительно, используйте как ориентир.";

const ANALYZE_PHOTO_HINT: &str = "\
📸 Анализ блюда

Отправьте мне фотографию еды, и я определю:
• Что изображено на фото
• Приблизительный размер порции
• Количество калорий

Просто отправьте фото! 📷";

const SEARCH_CALORIES_HINT: &str = "\
🔍 Поиск калорий

Опишите что вы ели, и я подсчитаю калории.

Примеры:
• \"2 яблока\"
• \"200г вареного риса\"
• \"1 кусок пиццы\"
• \"2 яйца и хлеб\"

Напишите что вы ели! ✍️";

const ANALYZING_PHOTO: &str = "🔍 Анализирую ваше фото...";
const ANALYZING_TEXT: &str = "🔍 Анализирую описание еды...";

pub const APOLOGY_PHOTO: &str =
    "❌ Извините, не смог обработать фото. Попробуйте отправить более четкое изображение еды.";
pub const APOLOGY_TEXT: &str =
    "❌ Извините, не смог обработать сообщение. Попробуйте описать еду более четко.";
const NO_FOOD_PHOTO: &str = "❌ На фото не удалось найти еду.";
const NO_FOOD_TEXT: &str = "❌ В описании не удалось найти еду.";
const PHOTO_TOO_SMALL: &str =
    "⚠️ Фото слишком маленькое для качественного анализа. Попробуйте отправить фото в лучшем качестве.";

/// Photos below this size carry too little detail to analyze.
const MIN_PHOTO_BYTES: usize = 1000;

/// The main reply keyboard, attached to every outgoing message.
pub fn main_keyboard() -> KeyboardMarkup {
    KeyboardMarkup::new(vec![
        vec![
            KeyboardButton::new(BUTTON_ANALYZE_PHOTO),
            KeyboardButton::new(BUTTON_SEARCH_CALORIES),
        ],
        vec![
            KeyboardButton::new(BUTTON_HELP),
            KeyboardButton::new(BUTTON_START),
        ],
    ])
    .resize_keyboard()
}

/// One food question extracted from an update.
pub enum FoodQuery {
    Text(String),
    Photo(Vec<u8>),
}

fn command_reply(cmd: &Command) -> &'static str {
    match cmd {
        Command::Start => WELCOME,
        Command::Help => HELP,
    }
}

pub async fn handle_command(bot: Bot, msg: Message, cmd: Command) -> ResponseResult<()> {
    bot.send_message(msg.chat.id, command_reply(&cmd))
        .reply_markup(main_keyboard())
        .await?;
    Ok(())
}

pub async fn handle_message(bot: Bot, msg: Message, state: Arc<BotState>) -> ResponseResult<()> {
    if let Some(sizes) = msg.photo() {
        return handle_photo(&bot, &msg, sizes, &state).await;
    }
    if let Some(text) = msg.text() {
        return handle_text(&bot, &msg, text, &state).await;
    }
    Ok(())
}

async fn handle_text(bot: &Bot, msg: &Message, text: &str, state: &BotState) -> ResponseResult<()> {
    let hint = match text {
        BUTTON_START => Some(WELCOME),
        BUTTON_HELP => Some(HELP),
        BUTTON_ANALYZE_PHOTO => Some(ANALYZE_PHOTO_HINT),
        BUTTON_SEARCH_CALORIES => Some(SEARCH_CALORIES_HINT),
        _ => None,
    };
    if let Some(hint) = hint {
        bot.send_message(msg.chat.id, hint)
            .reply_markup(main_keyboard())
            .await?;
        return Ok(());
    }

    let preview: String = text.chars().take(100).collect();
    info!("Food description from chat {}: \"{preview}\"", msg.chat.id);

    bot.send_message(msg.chat.id, ANALYZING_TEXT)
        .reply_markup(main_keyboard())
        .await?;

    let reply = food_reply(&state.openai, FoodQuery::Text(text.to_string())).await;
    bot.send_message(msg.chat.id, reply)
        .reply_markup(main_keyboard())
        .await?;
    Ok(())
}

async fn handle_photo(
    bot: &Bot,
    msg: &Message,
    sizes: &[PhotoSize],
    state: &BotState,
) -> ResponseResult<()> {
    // Telegram orders sizes ascending, the last one is the best quality.
    let Some(photo) = sizes.last() else {
        return Ok(());
    };

    info!("Photo from chat {}", msg.chat.id);
    bot.send_message(msg.chat.id, ANALYZING_PHOTO)
        .reply_markup(main_keyboard())
        .await?;

    let bytes = match download_photo(bot, &photo.file.id).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("Failed to download photo: {e}");
            bot.send_message(msg.chat.id, APOLOGY_PHOTO)
                .reply_markup(main_keyboard())
                .await?;
            return Ok(());
        }
    };
    info!("📥 Downloaded photo ({} bytes)", bytes.len());

    if bytes.len() < MIN_PHOTO_BYTES {
        bot.send_message(msg.chat.id, PHOTO_TOO_SMALL)
            .reply_markup(main_keyboard())
            .await?;
        return Ok(());
    }

    let reply = food_reply(&state.openai, FoodQuery::Photo(bytes)).await;
    bot.send_message(msg.chat.id, reply)
        .reply_markup(main_keyboard())
        .await?;
    Ok(())
}

/// Ask the estimator and turn the outcome into the reply text.
pub async fn food_reply(client: &openai::Client, query: FoodQuery) -> String {
    let (result, no_food, apology) = match &query {
        FoodQuery::Text(description) => (
            client.estimate_text(description).await,
            NO_FOOD_TEXT,
            APOLOGY_TEXT,
        ),
        FoodQuery::Photo(bytes) => (
            client.estimate_photo(bytes).await,
            NO_FOOD_PHOTO,
            APOLOGY_PHOTO,
        ),
    };

    match result {
        Ok(answer) if is_no_food(&answer) => no_food.to_string(),
        Ok(answer) => answer,
        Err(e) => {
            warn!("Calorie estimation failed: {e}");
            apology.to_string()
        }
    }
}

fn is_no_food(answer: &str) -> bool {
    let upper = answer.to_uppercase();
    upper.contains(openai::NO_FOOD_MARKER) || upper.contains("НЕТ ЕДЫ")
}

async fn download_photo(bot: &Bot, file_id: &FileId) -> Result<Vec<u8>, String> {
    let file = bot
        .get_file(file_id.clone())
        .await
        .map_err(|e| format!("Failed to get file info: {e}"))?;

    let mut data = Vec::new();
    bot.download_file(&file.path, &mut data)
        .await
        .map_err(|e| format!("Failed to download file: {e}"))?;

    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn client(server: &MockServer) -> openai::Client {
        let mut client = openai::Client::new("test_key".to_string());
        client.base_url = server.base_url();
        client
    }

    #[test]
    fn start_and_help_replies_are_fixed() {
        assert_eq!(command_reply(&Command::Start), WELCOME);
        assert_eq!(command_reply(&Command::Help), HELP);
        // Repeated calls see no state.
        assert_eq!(command_reply(&Command::Start), WELCOME);
    }

    #[test]
    fn keyboard_has_all_four_buttons() {
        let keyboard = main_keyboard();
        assert!(keyboard.resize_keyboard);

        let labels: Vec<&str> = keyboard
            .keyboard
            .iter()
            .flatten()
            .map(|b| b.text.as_str())
            .collect();
        assert_eq!(
            labels,
            [
                BUTTON_ANALYZE_PHOTO,
                BUTTON_SEARCH_CALORIES,
                BUTTON_HELP,
                BUTTON_START
            ]
        );
    }

    #[test]
    fn no_food_marker_is_recognized() {
        assert!(is_no_food("НЕТ_ЕДЫ"));
        assert!(is_no_food("нет_еды"));
        assert!(is_no_food("Кажется, НЕТ ЕДЫ на этом фото"));
        assert!(!is_no_food("Яблоко (~180г) — ~95 ккал"));
    }

    #[tokio::test]
    async fn text_answer_is_relayed_verbatim() {
        let server = MockServer::start_async().await;

        let completion_mock = server.mock(|when, then| {
            when.method(POST).path("/chat/completions").is_true(|req| {
                let body = String::from_utf8_lossy(req.body().as_ref());
                body.contains("1 medium apple")
            });
            then.status(200).json_body(json!({
                "choices": [
                    { "message": { "role": "assistant", "content": "~95 calories" } }
                ]
            }));
        });

        let reply = food_reply(
            &client(&server),
            FoodQuery::Text("1 medium apple".to_string()),
        )
        .await;

        assert_eq!(reply, "~95 calories");
        completion_mock.assert_calls(1);
    }

    #[tokio::test]
    async fn photo_query_calls_image_path_once() {
        let server = MockServer::start_async().await;

        let completion_mock = server.mock(|when, then| {
            when.method(POST).path("/chat/completions").is_true(|req| {
                let body = String::from_utf8_lossy(req.body().as_ref());
                body.contains("data:image/jpeg;base64,")
            });
            then.status(200).json_body(json!({
                "choices": [
                    { "message": { "role": "assistant", "content": "Борщ (~300г) — ~150 ккал" } }
                ]
            }));
        });

        let reply = food_reply(
            &client(&server),
            FoodQuery::Photo(b"fake-jpeg-bytes".to_vec()),
        )
        .await;

        assert_eq!(reply, "Борщ (~300г) — ~150 ккал");
        completion_mock.assert_calls(1);
    }

    #[tokio::test]
    async fn estimator_failure_becomes_text_apology() {
        let server = MockServer::start_async().await;

        let completion_mock = server.mock(|when, then| {
            when.method(POST).path("/chat/completions");
            then.status(500).body("boom");
        });

        let reply = food_reply(&client(&server), FoodQuery::Text("борщ".to_string())).await;

        assert_eq!(reply, APOLOGY_TEXT);
        completion_mock.assert_calls(1);
    }

    #[tokio::test]
    async fn estimator_failure_becomes_photo_apology() {
        let server = MockServer::start_async().await;

        server.mock(|when, then| {
            when.method(POST).path("/chat/completions");
            then.status(500).body("boom");
        });

        let reply = food_reply(&client(&server), FoodQuery::Photo(b"bytes".to_vec())).await;

        assert_eq!(reply, APOLOGY_PHOTO);
    }

    #[tokio::test]
    async fn no_food_answer_becomes_static_reply() {
        let server = MockServer::start_async().await;

        server.mock(|when, then| {
            when.method(POST).path("/chat/completions");
            then.status(200).json_body(json!({
                "choices": [
                    { "message": { "role": "assistant", "content": "НЕТ_ЕДЫ" } }
                ]
            }));
        });

        let text_reply = food_reply(&client(&server), FoodQuery::Text("кирпич".to_string())).await;
        assert_eq!(text_reply, NO_FOOD_TEXT);

        let photo_reply = food_reply(&client(&server), FoodQuery::Photo(b"bytes".to_vec())).await;
        assert_eq!(photo_reply, NO_FOOD_PHOTO);
    }
}
