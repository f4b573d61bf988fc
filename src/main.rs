mod config;
mod handlers;
mod openai;

use std::sync::Arc;

use teloxide::prelude::*;
use tracing::{error, info};

use config::Config;
use handlers::Command;

/// Shared read-only state for all handlers.
pub struct BotState {
    pub openai: openai::Client,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("{e}");
            std::process::exit(1);
        }
    };

    info!("🤖 Starting calorie bot...");

    let bot = Bot::new(&config.telegram_bot_token);
    let state = Arc::new(BotState {
        openai: openai::Client::new(config.openai_api_key),
    });

    let handler = dptree::entry()
        .branch(
            Update::filter_message()
                .filter_command::<Command>()
                .endpoint(handlers::handle_command),
        )
        .branch(Update::filter_message().endpoint(handlers::handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}
