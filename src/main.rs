use std::sync::Arc;

use teloxide::prelude::*;
use tracing::{error, info};
use tracing_subscriber::prelude::*;

use gatecall::bot::{self, BotState};
use gatecall::config::Config;
use gatecall::operator_log::OperatorLogLayer;
use gatecall::router::Router;
use gatecall::zadarma::ZadarmaClient;

#[tokio::main]
async fn main() {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("gatecall: {e}");
            std::process::exit(1);
        }
    };

    let bot = Bot::new(&config.telegram_token);

    // Setup logging
    let log_dir = config.data_dir.join("logs");
    std::fs::create_dir_all(&log_dir).ok();
    let file_appender = tracing_appender::rolling::never(&log_dir, "gatecall.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    let registry = tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stdout)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        );

    if let Some(log_chat_id) = config.log_chat_id {
        registry.with(OperatorLogLayer::new(bot.clone(), log_chat_id)).init();
    } else {
        registry.init();
    }

    let client = match &config.zadarma_base_url {
        Some(url) => ZadarmaClient::with_base_url(
            config.zadarma_api_key.clone(),
            config.zadarma_api_secret.clone(),
            url.clone(),
        ),
        None => ZadarmaClient::new(
            config.zadarma_api_key.clone(),
            config.zadarma_api_secret.clone(),
            config.sandbox,
        ),
    };

    info!("🚀 Starting gatecall...");
    info!("Zadarma endpoint: {}", client.base_url());

    let router = Router::new(client, config.destinations.clone());
    let numbers = router.destinations();
    info!(
        "Numbers: internal {}, entry {}, exit {}",
        numbers.internal, numbers.entry, numbers.exit
    );
    if config.allowed_users.is_empty() {
        info!("No ALLOWED_USERS set, bot is open to everyone");
    } else {
        info!("Allowed users: {:?}", config.allowed_users);
    }

    match bot.get_me().await {
        Ok(me) => info!("Bot user ID: {}, username: @{}", me.id, me.username()),
        Err(e) => {
            error!("Failed to reach Telegram: {e}");
            std::process::exit(1);
        }
    }

    let state = Arc::new(BotState::new(router, config.allowed_users.clone()));

    Dispatcher::builder(bot, bot::schema())
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}
