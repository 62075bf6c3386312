//! Telegram handlers: `/start` shows the menu, a button press places the call.

use std::collections::HashSet;
use std::sync::Arc;

use teloxide::dispatching::{HandlerExt, UpdateHandler};
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};
use teloxide::utils::command::BotCommands;
use tracing::{info, warn};

use crate::router::{MenuItem, Router};
use crate::zadarma::ZadarmaClient;

const ACCESS_DENIED: &str = "⛔ Доступ запрещён.";

#[derive(BotCommands, Clone, Debug, PartialEq)]
#[command(rename_rule = "lowercase", description = "Commands:")]
pub enum Command {
    #[command(description = "show the call menu")]
    Start,
}

pub struct BotState {
    pub router: Router<ZadarmaClient>,
    /// Empty means everyone may use the bot.
    pub allowed_users: HashSet<UserId>,
}

impl BotState {
    pub fn new(router: Router<ZadarmaClient>, allowed_users: HashSet<UserId>) -> Self {
        Self { router, allowed_users }
    }

    pub fn is_allowed(&self, user_id: UserId) -> bool {
        self.allowed_users.is_empty() || self.allowed_users.contains(&user_id)
    }
}

/// One button per row, in menu order.
pub fn keyboard(items: &[MenuItem]) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(
        items
            .iter()
            .map(|item| vec![InlineKeyboardButton::callback(item.label, item.data)]),
    )
}

pub fn schema() -> UpdateHandler<teloxide::RequestError> {
    dptree::entry()
        .branch(
            Update::filter_message()
                .filter_command::<Command>()
                .endpoint(handle_command),
        )
        .branch(Update::filter_callback_query().endpoint(handle_callback))
}

async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    state: Arc<BotState>,
) -> ResponseResult<()> {
    let Some(user) = msg.from.as_ref() else {
        return Ok(());
    };

    match cmd {
        Command::Start => {
            if !state.is_allowed(user.id) {
                info!("/start from non-allowed user {} ({})", user.first_name, user.id);
                bot.send_message(msg.chat.id, ACCESS_DENIED).await?;
                return Ok(());
            }

            info!("/start from {} ({})", user.first_name, user.id);
            bot.send_message(msg.chat.id, state.router.greeting())
                .reply_markup(keyboard(&state.router.menu()))
                .await?;
        }
    }

    Ok(())
}

async fn handle_callback(bot: Bot, q: CallbackQuery, state: Arc<BotState>) -> ResponseResult<()> {
    if !state.is_allowed(q.from.id) {
        info!("Button press from non-allowed user {} ({})", q.from.first_name, q.from.id);
        bot.answer_callback_query(q.id.clone())
            .text(ACCESS_DENIED)
            .show_alert(true)
            .await?;
        return Ok(());
    }

    // Stop the button spinner before the provider call, which can take a while.
    if let Err(e) = bot.answer_callback_query(q.id.clone()).await {
        warn!("Failed to answer callback query: {e}");
    }

    let data = q.data.as_deref().unwrap_or_default();
    info!("🔘 {} ({}) pressed {:?}", q.from.first_name, q.from.id, data);

    let outcome = state.router.select(data).await;

    // Fall back to a fresh message if the edit is rejected.
    if let Some(message) = q.message.as_ref() {
        match bot
            .edit_message_text(message.chat().id, message.id(), outcome.text.as_str())
            .await
        {
            Ok(_) => return Ok(()),
            Err(e) => warn!("Failed to edit callback message: {e}"),
        }
    }

    if let Err(e) = bot.send_message(q.from.id, outcome.text).await {
        warn!("Failed to deliver outcome to {}: {e}", q.from.id);
    }

    Ok(())
}
