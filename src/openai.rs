//! OpenAI Chat Completions client for calorie estimation.
//!
//! One request per question, text or photo. Answers come back as free-form
//! text and are returned to the caller untouched.

use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::debug;

const OPENAI_API_URL: &str = "https://api.openai.com/v1";
const MODEL: &str = "gpt-4o";
const TEMPERATURE: f32 = 0.1;

/// The model is instructed to answer with this marker when it sees no food.
pub const NO_FOOD_MARKER: &str = "НЕТ_ЕДЫ";

const PHOTO_PROMPT: &str = "Есть ли еда на фото? Еда включает: готовые блюда, сырые продукты, орехи, семечки, сухофрукты, крупы, фрукты, овощи. Если есть - оцени размер порции в граммах и рассчитай калории для этой порции. НЕ давай калории на 100г. ВАЖНО: 1 сосиска = ~150 ккал, 2 сосиски = ~300 ккал. Если нет еды - ответь 'НЕТ_ЕДЫ'. Формат: 'Продукт (~XXг) — ~XXX ккал'";

fn text_prompt(description: &str) -> String {
    format!(
        "Это еда: '{description}'? Еда включает: готовые блюда, сырые продукты, орехи, семечки, сухофрукты, крупы, фрукты, овощи. Если да - оцени размер порции в граммах и рассчитай калории для этой порции. НЕ давай калории на 100г. ВАЖНО: 1 сосиска = ~150 ккал, 2 сосиски = ~300 ккал. Если нет еды - ответь 'НЕТ_ЕДЫ'. Формат: 'Продукт (~XXг) — ~XXX ккал'"
    )
}

pub struct Client {
    api_key: String,
    http: reqwest::Client,
    pub(crate) base_url: String,
}

#[derive(Serialize)]
struct ApiRequest {
    model: &'static str,
    messages: Vec<ApiMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ApiMessage {
    role: &'static str,
    content: Content,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Content {
    Text(String),
    Parts(Vec<Part>),
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Part {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize)]
struct ImageUrl {
    url: String,
    detail: &'static str,
}

#[derive(Deserialize)]
struct ApiResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

impl Client {
    pub fn new(api_key: String) -> Self {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            api_key,
            http,
            base_url: OPENAI_API_URL.to_string(),
        }
    }

    /// Estimate calories for a text description of a meal.
    pub async fn estimate_text(&self, description: &str) -> Result<String, Error> {
        self.complete(Content::Text(text_prompt(description)), 60)
            .await
    }

    /// Estimate calories for a photo of a meal (JPEG bytes from Telegram).
    pub async fn estimate_photo(&self, image: &[u8]) -> Result<String, Error> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(image);
        let parts = vec![
            Part::Text {
                text: PHOTO_PROMPT.to_string(),
            },
            Part::ImageUrl {
                image_url: ImageUrl {
                    url: format!("data:image/jpeg;base64,{encoded}"),
                    detail: "low",
                },
            },
        ];
        self.complete(Content::Parts(parts), 80).await
    }

    async fn complete(&self, content: Content, max_tokens: u32) -> Result<String, Error> {
        let request = ApiRequest {
            model: MODEL,
            messages: vec![ApiMessage {
                role: "user",
                content,
            }],
            max_tokens,
            temperature: TEMPERATURE,
        };

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        let status = response.status();
        debug!("OpenAI response status: {status}");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Api(format!("{status}: {body}")));
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| Error::Parse(e.to_string()))?;

        api_response
            .choices
            .first()
            .and_then(|c| c.message.content.as_deref())
            .map(|text| text.trim().to_string())
            .ok_or(Error::Empty)
    }
}

#[derive(Debug)]
pub enum Error {
    Http(String),
    Api(String),
    Parse(String),
    Empty,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Http(e) => write!(f, "HTTP error: {e}"),
            Error::Api(e) => write!(f, "API error: {e}"),
            Error::Parse(e) => write!(f, "Parse error: {e}"),
            Error::Empty => write!(f, "Empty response"),
        }
    }
}

impl std::error::Error for Error {}
