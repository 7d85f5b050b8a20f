//! UI Builder module for creating keyboards and formatting messages

use rust_decimal::Decimal;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

// Import localization
use crate::localization::{t_args_lang, t_lang};

use crate::currency_model::Currency;

use super::dialogue_manager::{BotMessage, Menu, PickerAction, Reply};

/// Callback data carried by the inline buttons
pub mod callback_data {
    pub const GET_CURRENCIES: &str = "get_currencies";
    pub const CONVERT: &str = "convert";
    pub const MANAGE: &str = "manage_currency";
    pub const ADD_CURRENCY: &str = "add_currency";
    pub const DELETE_CURRENCY: &str = "delete_currency";
    pub const CHANGE_RATE: &str = "change_rate";
    pub const BACK_TO_MAIN: &str = "back_to_main";
    pub const DELETE_PREFIX: &str = "delete_";
    pub const CHANGE_PREFIX: &str = "change_";
}

/// Decimal places shown for conversion results
const RESULT_DECIMAL_PLACES: u32 = 2;

fn format_decimal(value: Decimal) -> String {
    value.normalize().to_string()
}

/// Format the rates table, one line per currency
pub fn format_rates(currencies: &[Currency], language_code: Option<&str>) -> String {
    let mut result = t_lang("rates-header", language_code);

    for currency in currencies {
        let rate = format_decimal(currency.rate);
        result.push('\n');
        result.push_str(&t_args_lang(
            "rates-line",
            &[("code", currency.code.as_str()), ("rate", &rate)],
            language_code,
        ));
    }

    result
}

/// Render a single message in the user's language
pub fn render_message(message: &BotMessage, language_code: Option<&str>) -> String {
    match message {
        BotMessage::Welcome { is_admin: false } => t_lang("welcome", language_code),
        BotMessage::Welcome { is_admin: true } => t_lang("welcome-admin", language_code),
        BotMessage::Help => t_lang("help", language_code),
        BotMessage::Rates(currencies) => format_rates(currencies, language_code),
        BotMessage::NoCurrencies => t_lang("rates-empty", language_code),
        BotMessage::NothingToConvert => t_lang("convert-empty", language_code),
        BotMessage::AskConvertCode => t_lang("convert-ask-code", language_code),
        BotMessage::AskConvertAmount { code } => {
            t_args_lang("convert-ask-amount", &[("code", code.as_str())], language_code)
        }
        BotMessage::Converted(conversion) => {
            let amount = format_decimal(conversion.amount);
            let result = conversion
                .converted_amount
                .round_dp(RESULT_DECIMAL_PLACES)
                .to_string();
            let rate = format_decimal(conversion.rate);
            t_args_lang(
                "convert-result",
                &[
                    ("amount", &amount),
                    ("code", conversion.code.as_str()),
                    ("result", &result),
                    ("rate", &rate),
                ],
                language_code,
            )
        }
        BotMessage::AdminGranted => t_lang("admin-granted", language_code),
        BotMessage::AlreadyAdmin => t_lang("admin-already", language_code),
        BotMessage::AdminExited => t_lang("admin-exited", language_code),
        BotMessage::ManageTitle => t_lang("manage-title", language_code),
        BotMessage::AskNewCode => t_lang("add-ask-code", language_code),
        BotMessage::AskNewRate { code } => {
            t_args_lang("add-ask-rate", &[("code", code.as_str())], language_code)
        }
        BotMessage::CurrencyAdded { code, rate } => t_args_lang(
            "add-done",
            &[("code", code.as_str()), ("rate", &format_decimal(rate.get()))],
            language_code,
        ),
        BotMessage::NothingToDelete => t_lang("delete-empty", language_code),
        BotMessage::PickCurrencyToDelete => t_lang("delete-pick", language_code),
        BotMessage::CurrencyDeleted { code } => {
            t_args_lang("delete-done", &[("code", code.as_str())], language_code)
        }
        BotMessage::NothingToChange => t_lang("change-empty", language_code),
        BotMessage::PickCurrencyToChange => t_lang("change-pick", language_code),
        BotMessage::AskUpdatedRate { code } => {
            t_args_lang("change-ask-rate", &[("code", code.as_str())], language_code)
        }
        BotMessage::RateUpdated { code, rate } => t_args_lang(
            "change-done",
            &[("code", code.as_str()), ("rate", &format_decimal(rate.get()))],
            language_code,
        ),
        BotMessage::InvalidCode => t_lang("error-invalid-code", language_code),
        BotMessage::CurrencyExists { code } => {
            t_args_lang("error-currency-exists", &[("code", code.as_str())], language_code)
        }
        BotMessage::CurrencyNotFound { code } => t_args_lang(
            "error-currency-not-found",
            &[("code", code.as_str())],
            language_code,
        ),
        BotMessage::CurrencyGone { code } => t_args_lang(
            "error-currency-gone",
            &[("code", code.as_str())],
            language_code,
        ),
        BotMessage::InvalidNumber => t_lang("error-invalid-number", language_code),
        BotMessage::NumberTooLarge => t_lang("error-number-too-large", language_code),
        BotMessage::AdminOnly => t_lang("error-admin-only", language_code),
        BotMessage::ServiceError => t_lang("error-service", language_code),
    }
}

/// Root menu; the management entry only shows for admins
pub fn create_main_keyboard(is_admin: bool, language_code: Option<&str>) -> InlineKeyboardMarkup {
    let mut buttons = Vec::new();

    if is_admin {
        buttons.push(vec![InlineKeyboardButton::callback(
            t_lang("button-manage", language_code),
            callback_data::MANAGE,
        )]);
    }
    buttons.push(vec![InlineKeyboardButton::callback(
        t_lang("button-get-rates", language_code),
        callback_data::GET_CURRENCIES,
    )]);
    buttons.push(vec![InlineKeyboardButton::callback(
        t_lang("button-convert", language_code),
        callback_data::CONVERT,
    )]);

    InlineKeyboardMarkup::new(buttons)
}

/// Management submenu
pub fn create_management_keyboard(language_code: Option<&str>) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![InlineKeyboardButton::callback(
            t_lang("button-add", language_code),
            callback_data::ADD_CURRENCY,
        )],
        vec![InlineKeyboardButton::callback(
            t_lang("button-delete", language_code),
            callback_data::DELETE_CURRENCY,
        )],
        vec![InlineKeyboardButton::callback(
            t_lang("button-change", language_code),
            callback_data::CHANGE_RATE,
        )],
        vec![InlineKeyboardButton::callback(
            t_lang("button-exit-admin", language_code),
            callback_data::BACK_TO_MAIN,
        )],
    ])
}

/// One button per currency plus a way back to the management menu
pub fn create_currency_picker_keyboard(
    action: PickerAction,
    currencies: &[Currency],
    language_code: Option<&str>,
) -> InlineKeyboardMarkup {
    let prefix = match action {
        PickerAction::Delete => callback_data::DELETE_PREFIX,
        PickerAction::Change => callback_data::CHANGE_PREFIX,
    };

    let mut buttons: Vec<Vec<InlineKeyboardButton>> = currencies
        .iter()
        .map(|currency| {
            let label = match action {
                PickerAction::Delete => currency.code.to_string(),
                PickerAction::Change => {
                    format!("{} ({})", currency.code, format_decimal(currency.rate))
                }
            };
            vec![InlineKeyboardButton::callback(
                label,
                format!("{}{}", prefix, currency.code),
            )]
        })
        .collect();

    buttons.push(vec![InlineKeyboardButton::callback(
        t_lang("button-back", language_code),
        callback_data::MANAGE,
    )]);

    InlineKeyboardMarkup::new(buttons)
}

/// Keyboard for a reply menu, `None` when the reply has no buttons
pub fn create_keyboard(menu: &Menu, language_code: Option<&str>) -> Option<InlineKeyboardMarkup> {
    match menu {
        Menu::None => None,
        Menu::Main { is_admin } => Some(create_main_keyboard(*is_admin, language_code)),
        Menu::Management => Some(create_management_keyboard(language_code)),
        Menu::Picker { action, currencies } => Some(create_currency_picker_keyboard(
            *action,
            currencies,
            language_code,
        )),
    }
}

/// Render every message of a reply
pub fn render_reply(reply: &Reply, language_code: Option<&str>) -> Vec<String> {
    reply
        .messages
        .iter()
        .map(|message| render_message(message, language_code))
        .collect()
}
