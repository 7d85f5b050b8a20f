//! Callback Handler module for processing inline keyboard callback queries

use anyhow::Result;
use std::sync::Arc;
use teloxide::prelude::*;
use tracing::{debug, warn};

// Import dialogue types
use crate::dialogue::{ChatState, CurrencyDialogue};

// Import dialogue manager types
use super::dialogue_manager::{ConversationController, Delivery, Transition};

// Import UI builder functions
use super::ui_builder::{callback_data, create_keyboard, render_message, render_reply};

use super::message_handler::{persist_state, send_reply};

/// Decoded inline button press
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackAction {
    GetCurrencies,
    Convert,
    Manage,
    AddCurrency,
    DeleteCurrency,
    ChangeRate,
    BackToMain,
    Delete(String),
    Change(String),
}

impl CallbackAction {
    pub fn parse(data: &str) -> Option<Self> {
        let action = match data {
            callback_data::GET_CURRENCIES => CallbackAction::GetCurrencies,
            callback_data::CONVERT => CallbackAction::Convert,
            callback_data::MANAGE => CallbackAction::Manage,
            callback_data::ADD_CURRENCY => CallbackAction::AddCurrency,
            callback_data::DELETE_CURRENCY => CallbackAction::DeleteCurrency,
            callback_data::CHANGE_RATE => CallbackAction::ChangeRate,
            callback_data::BACK_TO_MAIN => CallbackAction::BackToMain,
            _ => {
                if let Some(code) = data.strip_prefix(callback_data::DELETE_PREFIX) {
                    CallbackAction::Delete(code.to_string())
                } else if let Some(code) = data.strip_prefix(callback_data::CHANGE_PREFIX) {
                    CallbackAction::Change(code.to_string())
                } else {
                    return None;
                }
            }
        };
        Some(action)
    }
}

/// Run a button press through the controller
pub async fn dispatch_action(
    controller: &ConversationController,
    chat_id: &str,
    state: &ChatState,
    action: &CallbackAction,
) -> Transition {
    match action {
        CallbackAction::GetCurrencies => {
            controller.list_currencies(chat_id, state, Delivery::Send).await
        }
        CallbackAction::Convert => controller.begin_convert(chat_id, state).await,
        CallbackAction::Manage => controller.manage(chat_id, state).await,
        CallbackAction::AddCurrency => controller.begin_add_currency(chat_id, state).await,
        CallbackAction::DeleteCurrency => controller.begin_delete_currency(chat_id, state).await,
        CallbackAction::ChangeRate => controller.begin_change_rate(chat_id, state).await,
        CallbackAction::BackToMain => controller.exit_admin(chat_id, state).await,
        CallbackAction::Delete(code) => controller.delete_currency(chat_id, state, code).await,
        CallbackAction::Change(code) => {
            controller.select_currency_to_change(chat_id, state, code).await
        }
    }
}

/// Handle callback queries from inline keyboards
pub async fn callback_handler(
    bot: Bot,
    q: CallbackQuery,
    controller: Arc<ConversationController>,
    dialogue: CurrencyDialogue,
) -> Result<()> {
    let chat_id = dialogue.chat_id();
    let chat_key = chat_id.to_string();
    let language_code = q.from.language_code.clone();
    let data = q.data.as_deref().unwrap_or("");

    debug!(user_id = %q.from.id, data = %data, "Received callback query from user");

    let action = match CallbackAction::parse(data) {
        Some(action) => action,
        None => {
            // Stale keyboards from older deployments
            warn!(user_id = %q.from.id, data = %data, "Unknown callback data");
            bot.answer_callback_query(q.id).await?;
            return Ok(());
        }
    };

    let state = dialogue.get().await?.unwrap_or_default();
    let Transition { reply, state: next } =
        dispatch_action(&controller, &chat_key, &state, &action).await;

    // The state is stored before delivery so a failed send cannot roll it back
    persist_state(&dialogue, next).await?;

    let reply = &reply;
    let lang = language_code.as_deref();

    match reply.delivery {
        Delivery::Alert => {
            let text = reply
                .last_message()
                .map(|message| render_message(message, lang))
                .unwrap_or_default();
            bot.answer_callback_query(q.id.clone())
                .text(text)
                .show_alert(true)
                .await?;
        }
        Delivery::Edit if reply.messages.len() == 1 => {
            let edited = match &q.message {
                Some(msg) => {
                    let text = render_reply(reply, lang).concat();
                    let request = bot.edit_message_text(msg.chat().id, msg.id(), text);
                    let result = match create_keyboard(&reply.menu, lang) {
                        Some(markup) => request.reply_markup(markup).await,
                        None => request.await,
                    };
                    match result {
                        Ok(_) => true,
                        Err(e) => {
                            warn!(
                                user_id = %q.from.id,
                                error = %e,
                                "Failed to edit message, sending a new one"
                            );
                            false
                        }
                    }
                }
                None => false,
            };
            if !edited {
                send_reply(&bot, chat_id, reply, lang).await?;
            }
            bot.answer_callback_query(q.id.clone()).await?;
        }
        _ => {
            send_reply(&bot, chat_id, reply, lang).await?;
            bot.answer_callback_query(q.id.clone()).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_callback_data_parsing() {
        assert_eq!(
            CallbackAction::parse("get_currencies"),
            Some(CallbackAction::GetCurrencies)
        );
        assert_eq!(
            CallbackAction::parse("delete_currency"),
            Some(CallbackAction::DeleteCurrency)
        );
        assert_eq!(
            CallbackAction::parse("delete_USD"),
            Some(CallbackAction::Delete("USD".to_string()))
        );
        assert_eq!(
            CallbackAction::parse("change_rate"),
            Some(CallbackAction::ChangeRate)
        );
        assert_eq!(
            CallbackAction::parse("change_EUR"),
            Some(CallbackAction::Change("EUR".to_string()))
        );
        assert_eq!(
            CallbackAction::parse("back_to_main"),
            Some(CallbackAction::BackToMain)
        );
        assert_eq!(CallbackAction::parse("confirm"), None);
        assert_eq!(CallbackAction::parse(""), None);
    }
}
