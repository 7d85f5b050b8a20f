//! Message Handler module for processing incoming Telegram messages

use anyhow::Result;
use std::sync::Arc;
use teloxide::prelude::*;
use tracing::{debug, info};

// Import dialogue types
use crate::dialogue::{is_cancel_command, ChatState, CurrencyDialogue};

// Import dialogue manager types
use super::dialogue_manager::{ConversationController, Delivery, Reply, Transition};

// Import UI builder functions
use super::ui_builder::{create_keyboard, render_reply};

/// Slash commands understood in any state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    SaveCurrency,
    Convert,
    List,
    Help,
}

impl Command {
    /// Parse `/name` or `/name@botname`, ignoring any arguments
    pub fn parse(text: &str) -> Option<Self> {
        let word = text.split_whitespace().next()?;
        let name = word.strip_prefix('/')?.split('@').next()?;
        match name {
            "start" => Some(Command::Start),
            "save_currency" => Some(Command::SaveCurrency),
            "convert" => Some(Command::Convert),
            "list" => Some(Command::List),
            "help" => Some(Command::Help),
            _ => None,
        }
    }
}

/// Route a text message: cancel words first, then the admin secret, then
/// commands, then the input expected by the current state
pub async fn route_text(
    controller: &ConversationController,
    chat_id: &str,
    state: &ChatState,
    text: &str,
) -> Transition {
    if is_cancel_command(text) {
        return controller.cancel(chat_id, state).await;
    }
    if controller.is_admin_command(text) {
        return controller.become_admin(chat_id, state).await;
    }

    match Command::parse(text) {
        Some(Command::Start) => controller.start(chat_id).await,
        Some(Command::SaveCurrency) => controller.begin_add_currency(chat_id, state).await,
        Some(Command::Convert) => controller.begin_convert(chat_id, state).await,
        Some(Command::List) => controller.list_currencies(chat_id, state, Delivery::Send).await,
        Some(Command::Help) => controller.help(chat_id, state).await,
        None => controller.submit_text(chat_id, state, text).await,
    }
}

/// Send every message of a reply; the keyboard goes on the last one
pub async fn send_reply(
    bot: &Bot,
    chat_id: ChatId,
    reply: &Reply,
    language_code: Option<&str>,
) -> Result<()> {
    let texts = render_reply(reply, language_code);
    let last = texts.len().saturating_sub(1);

    for (i, text) in texts.into_iter().enumerate() {
        let request = bot.send_message(chat_id, text);
        match create_keyboard(&reply.menu, language_code).filter(|_| i == last) {
            Some(markup) => request.reply_markup(markup).await?,
            None => request.await?,
        };
    }

    Ok(())
}

/// Store the next state; idle chats drop their dialogue entry
pub async fn persist_state(dialogue: &CurrencyDialogue, state: ChatState) -> Result<()> {
    if state.is_idle() {
        // Removing a missing entry is an error for the in-memory storage
        if dialogue.get().await?.is_some() {
            dialogue.exit().await?;
        }
    } else {
        dialogue.update(state).await?;
    }
    Ok(())
}

/// Handle incoming messages
pub async fn message_handler(
    bot: Bot,
    msg: Message,
    controller: Arc<ConversationController>,
    dialogue: CurrencyDialogue,
) -> Result<()> {
    let chat_id = msg.chat.id;
    let chat_key = chat_id.to_string();
    let language_code = msg.from.as_ref().and_then(|user| user.language_code.clone());
    let state = dialogue.get().await?.unwrap_or_default();

    debug!(user_id = %chat_id, state = ?state, "Received message");

    let transition = match msg.text() {
        Some(text) => route_text(&controller, &chat_key, &state, text).await,
        None => {
            info!(user_id = %chat_id, "Non-text message, sending help");
            controller.help(&chat_key, &state).await
        }
    };

    if transition.state != state {
        debug!(user_id = %chat_id, from = ?state, to = ?transition.state, "Dialogue state changed");
    }
    // The state is stored before delivery so a failed send cannot roll it back
    persist_state(&dialogue, transition.state).await?;

    send_reply(&bot, chat_id, &transition.reply, language_code.as_deref()).await
}
