//! Dialogue Manager module for handling dialogue state transitions
//!
//! [`ConversationController`] maps a chat event plus the chat's current
//! [`ChatState`] to a [`Transition`]: the reply to render and the state to
//! persist. It never talks to Telegram itself, which keeps every flow
//! testable against the in-memory store and admin gate.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::currency_model::{Conversion, Currency, CurrencyCode, PositiveDecimal};
use crate::dialogue::ChatState;
use crate::errors::{InputError, StoreError};
use crate::store::{AdminGate, CurrencyStore, Grant};

/// Everything the bot can say, rendered to text by the UI builder
#[derive(Debug, Clone, PartialEq)]
pub enum BotMessage {
    Welcome { is_admin: bool },
    Help,
    Rates(Vec<Currency>),
    NoCurrencies,
    NothingToConvert,
    AskConvertCode,
    AskConvertAmount { code: CurrencyCode },
    Converted(Conversion),
    AdminGranted,
    AlreadyAdmin,
    AdminExited,
    ManageTitle,
    AskNewCode,
    AskNewRate { code: CurrencyCode },
    CurrencyAdded { code: CurrencyCode, rate: PositiveDecimal },
    NothingToDelete,
    PickCurrencyToDelete,
    CurrencyDeleted { code: CurrencyCode },
    NothingToChange,
    PickCurrencyToChange,
    AskUpdatedRate { code: CurrencyCode },
    RateUpdated { code: CurrencyCode, rate: PositiveDecimal },
    InvalidCode,
    CurrencyExists { code: CurrencyCode },
    CurrencyNotFound { code: CurrencyCode },
    /// Not-found at the end of a flow, with nothing left to retry
    CurrencyGone { code: CurrencyCode },
    InvalidNumber,
    NumberTooLarge,
    AdminOnly,
    ServiceError,
}

/// Which action a currency picker button triggers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickerAction {
    Delete,
    Change,
}

/// Inline keyboard attached to the last message of a reply
#[derive(Debug, Clone, PartialEq)]
pub enum Menu {
    None,
    Main { is_admin: bool },
    Management,
    Picker {
        action: PickerAction,
        currencies: Vec<Currency>,
    },
}

/// How a reply reaches the chat
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// New message
    Send,
    /// Replace the message carrying the pressed button
    Edit,
    /// Popup on the pressed button
    Alert,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub messages: Vec<BotMessage>,
    pub menu: Menu,
    pub delivery: Delivery,
}

impl Reply {
    pub fn send(message: BotMessage) -> Self {
        Self {
            messages: vec![message],
            menu: Menu::None,
            delivery: Delivery::Send,
        }
    }

    pub fn edit(message: BotMessage) -> Self {
        Self {
            delivery: Delivery::Edit,
            ..Self::send(message)
        }
    }

    pub fn alert(message: BotMessage) -> Self {
        Self {
            delivery: Delivery::Alert,
            ..Self::send(message)
        }
    }

    pub fn with_menu(mut self, menu: Menu) -> Self {
        self.menu = menu;
        self
    }

    /// The primary message, i.e. the one carrying the menu
    pub fn last_message(&self) -> Option<&BotMessage> {
        self.messages.last()
    }
}

/// Reply to render plus the state to persist for the chat
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub reply: Reply,
    pub state: ChatState,
}

impl Transition {
    pub fn to(state: ChatState, reply: Reply) -> Self {
        Self { reply, state }
    }

    /// Keep the current state, typically after a rejected input
    pub fn stay(state: &ChatState, reply: Reply) -> Self {
        Self {
            reply,
            state: state.clone(),
        }
    }

    pub fn idle(reply: Reply) -> Self {
        Self::to(ChatState::Idle, reply)
    }
}

/// Conversation controller for the currency flows
#[derive(Clone)]
pub struct ConversationController {
    currencies: Arc<dyn CurrencyStore>,
    admins: Arc<dyn AdminGate>,
    admin_command: Option<String>,
}

impl ConversationController {
    pub fn new(
        currencies: Arc<dyn CurrencyStore>,
        admins: Arc<dyn AdminGate>,
        admin_command: Option<String>,
    ) -> Self {
        Self {
            currencies,
            admins,
            admin_command: admin_command.filter(|c| !c.trim().is_empty()),
        }
    }

    /// Whether the text is the configured admin-activation secret
    pub fn is_admin_command(&self, text: &str) -> bool {
        self.admin_command
            .as_deref()
            .is_some_and(|command| command == text.trim())
    }

    /// Root menu for the chat; admin lookup failures fall back to the public menu
    async fn main_menu(&self, chat_id: &str) -> Menu {
        let is_admin = match self.admins.is_admin(chat_id).await {
            Ok(is_admin) => is_admin,
            Err(e) => {
                warn!(chat_id = %chat_id, error = %e, "Admin lookup failed, showing public menu");
                false
            }
        };
        Menu::Main { is_admin }
    }

    fn service_failure(&self, chat_id: &str, state: &ChatState, err: StoreError) -> Transition {
        warn!(chat_id = %chat_id, error = %err, state = ?state, "Store call failed");
        Transition::stay(state, Reply::send(BotMessage::ServiceError))
    }

    /// Admin check for the start of a management action; `Err` carries the denial
    async fn guard_admin(&self, chat_id: &str, state: &ChatState) -> Result<(), Transition> {
        match self.admins.is_admin(chat_id).await {
            Ok(true) => Ok(()),
            Ok(false) => {
                info!(chat_id = %chat_id, "Management action denied to non-admin");
                Err(Transition::stay(state, Reply::alert(BotMessage::AdminOnly)))
            }
            Err(e) => Err(self.service_failure(chat_id, state, e)),
        }
    }

    /// Admin check before the terminal mutation of a flow; a revoked admin is sent back to idle
    async fn guard_admin_mutation(
        &self,
        chat_id: &str,
        state: &ChatState,
    ) -> Result<(), Transition> {
        match self.admins.is_admin(chat_id).await {
            Ok(true) => Ok(()),
            Ok(false) => {
                info!(chat_id = %chat_id, "Mutation denied to non-admin");
                Err(Transition::idle(
                    Reply::send(BotMessage::AdminOnly).with_menu(Menu::Main { is_admin: false }),
                ))
            }
            Err(e) => Err(self.service_failure(chat_id, state, e)),
        }
    }

    /// Reset to idle and show the root menu
    pub async fn start(&self, chat_id: &str) -> Transition {
        let menu = self.main_menu(chat_id).await;
        let is_admin = matches!(menu, Menu::Main { is_admin: true });
        debug!(chat_id = %chat_id, is_admin, "Showing root menu");
        Transition::idle(Reply::send(BotMessage::Welcome { is_admin }).with_menu(menu))
    }

    /// Wildcard abort from any state
    pub async fn cancel(&self, chat_id: &str, state: &ChatState) -> Transition {
        if !state.is_idle() {
            info!(chat_id = %chat_id, state = ?state, "Flow cancelled");
        }
        self.start(chat_id).await
    }

    pub async fn help(&self, chat_id: &str, state: &ChatState) -> Transition {
        let menu = self.main_menu(chat_id).await;
        Transition::stay(state, Reply::send(BotMessage::Help).with_menu(menu))
    }

    /// Rates table with the root menu
    pub async fn list_currencies(
        &self,
        chat_id: &str,
        state: &ChatState,
        delivery: Delivery,
    ) -> Transition {
        let currencies = match self.currencies.list().await {
            Ok(currencies) => currencies,
            Err(e) => return self.service_failure(chat_id, state, e),
        };
        let message = if currencies.is_empty() {
            BotMessage::NoCurrencies
        } else {
            BotMessage::Rates(currencies)
        };
        let menu = self.main_menu(chat_id).await;
        let reply = Reply {
            messages: vec![message],
            menu,
            delivery,
        };
        Transition::stay(state, reply)
    }

    pub async fn begin_convert(&self, chat_id: &str, state: &ChatState) -> Transition {
        match self.currencies.list().await {
            Ok(currencies) if currencies.is_empty() => {
                Transition::idle(Reply::send(BotMessage::NothingToConvert))
            }
            Ok(_) => {
                info!(chat_id = %chat_id, "Convert flow started");
                Transition::to(
                    ChatState::AwaitingConvertCode,
                    Reply::send(BotMessage::AskConvertCode),
                )
            }
            Err(e) => self.service_failure(chat_id, state, e),
        }
    }

    /// Management submenu, admins only
    pub async fn manage(&self, chat_id: &str, state: &ChatState) -> Transition {
        if let Err(denied) = self.guard_admin(chat_id, state).await {
            return denied;
        }
        Transition::stay(
            state,
            Reply::edit(BotMessage::ManageTitle).with_menu(Menu::Management),
        )
    }

    pub async fn begin_add_currency(&self, chat_id: &str, state: &ChatState) -> Transition {
        if let Err(denied) = self.guard_admin(chat_id, state).await {
            return denied;
        }
        info!(chat_id = %chat_id, "Add currency flow started");
        Transition::to(
            ChatState::AwaitingNewCurrencyCode,
            Reply::send(BotMessage::AskNewCode),
        )
    }

    pub async fn begin_delete_currency(&self, chat_id: &str, state: &ChatState) -> Transition {
        self.begin_pick(chat_id, state, PickerAction::Delete).await
    }

    pub async fn begin_change_rate(&self, chat_id: &str, state: &ChatState) -> Transition {
        self.begin_pick(chat_id, state, PickerAction::Change).await
    }

    async fn begin_pick(
        &self,
        chat_id: &str,
        state: &ChatState,
        action: PickerAction,
    ) -> Transition {
        if let Err(denied) = self.guard_admin(chat_id, state).await {
            return denied;
        }
        let currencies = match self.currencies.list().await {
            Ok(currencies) => currencies,
            Err(e) => return self.service_failure(chat_id, state, e),
        };

        let (empty, title) = match action {
            PickerAction::Delete => (BotMessage::NothingToDelete, BotMessage::PickCurrencyToDelete),
            PickerAction::Change => (BotMessage::NothingToChange, BotMessage::PickCurrencyToChange),
        };
        if currencies.is_empty() {
            return Transition::idle(Reply::send(empty));
        }
        Transition::stay(
            state,
            Reply::edit(title).with_menu(Menu::Picker { action, currencies }),
        )
    }

    /// `delete_<code>` button
    pub async fn delete_currency(
        &self,
        chat_id: &str,
        state: &ChatState,
        code: &str,
    ) -> Transition {
        if let Err(denied) = self.guard_admin(chat_id, state).await {
            return denied;
        }
        let code = match CurrencyCode::parse(code) {
            Ok(code) => code,
            Err(_) => return Transition::stay(state, Reply::send(BotMessage::InvalidCode)),
        };

        match self.currencies.remove(&code).await {
            Ok(()) => {
                info!(chat_id = %chat_id, currency = %code, "Currency deleted");
                let menu = self.main_menu(chat_id).await;
                Transition::stay(
                    state,
                    Reply::edit(BotMessage::CurrencyDeleted { code }).with_menu(menu),
                )
            }
            Err(StoreError::NotFound(code)) => {
                Transition::stay(state, Reply::send(BotMessage::CurrencyGone { code }))
            }
            Err(e) => self.service_failure(chat_id, state, e),
        }
    }

    /// `change_<code>` button
    pub async fn select_currency_to_change(
        &self,
        chat_id: &str,
        state: &ChatState,
        code: &str,
    ) -> Transition {
        if let Err(denied) = self.guard_admin(chat_id, state).await {
            return denied;
        }
        let code = match CurrencyCode::parse(code) {
            Ok(code) => code,
            Err(_) => return Transition::stay(state, Reply::send(BotMessage::InvalidCode)),
        };

        match self.currencies.contains(&code).await {
            Ok(true) => {
                info!(chat_id = %chat_id, currency = %code, "Change rate flow started");
                Transition::to(
                    ChatState::AwaitingUpdatedRate { code: code.clone() },
                    Reply::send(BotMessage::AskUpdatedRate { code }),
                )
            }
            Ok(false) => {
                Transition::stay(state, Reply::send(BotMessage::CurrencyGone { code }))
            }
            Err(e) => self.service_failure(chat_id, state, e),
        }
    }

    /// Secret admin-activation text
    pub async fn become_admin(&self, chat_id: &str, state: &ChatState) -> Transition {
        let notice = match self.admins.grant(chat_id).await {
            Ok(Grant::Granted) => {
                info!(chat_id = %chat_id, "Admin rights granted");
                BotMessage::AdminGranted
            }
            Ok(Grant::AlreadyAdmin) => BotMessage::AlreadyAdmin,
            Err(e) => return self.service_failure(chat_id, state, e),
        };

        let mut transition = self.start(chat_id).await;
        transition.reply.messages.insert(0, notice);
        transition
    }

    /// `back_to_main` button: leave admin mode
    pub async fn exit_admin(&self, chat_id: &str, state: &ChatState) -> Transition {
        if let Err(e) = self.admins.revoke(chat_id).await {
            return self.service_failure(chat_id, state, e);
        }
        info!(chat_id = %chat_id, "Admin rights revoked");
        Transition::idle(
            Reply::edit(BotMessage::AdminExited).with_menu(Menu::Main { is_admin: false }),
        )
    }

    /// Free text, routed by the current state
    pub async fn submit_text(&self, chat_id: &str, state: &ChatState, text: &str) -> Transition {
        match state {
            ChatState::Idle => self.help(chat_id, state).await,
            ChatState::AwaitingNewCurrencyCode | ChatState::AwaitingConvertCode => {
                self.submit_currency_code(chat_id, state, text).await
            }
            ChatState::AwaitingNewCurrencyRate { .. }
            | ChatState::AwaitingConvertAmount { .. }
            | ChatState::AwaitingUpdatedRate { .. } => {
                self.submit_amount_or_rate(chat_id, state, text).await
            }
        }
    }

    /// Code step of the add and convert flows
    pub async fn submit_currency_code(
        &self,
        chat_id: &str,
        state: &ChatState,
        text: &str,
    ) -> Transition {
        let code = match CurrencyCode::parse(text) {
            Ok(code) => code,
            Err(_) => {
                debug!(chat_id = %chat_id, "Rejected currency code");
                return Transition::stay(state, Reply::send(BotMessage::InvalidCode));
            }
        };

        match state {
            ChatState::AwaitingNewCurrencyCode => match self.currencies.contains(&code).await {
                Ok(true) => {
                    Transition::stay(state, Reply::send(BotMessage::CurrencyExists { code }))
                }
                Ok(false) => Transition::to(
                    ChatState::AwaitingNewCurrencyRate { code: code.clone() },
                    Reply::send(BotMessage::AskNewRate { code }),
                ),
                Err(e) => self.service_failure(chat_id, state, e),
            },
            ChatState::AwaitingConvertCode => match self.currencies.contains(&code).await {
                Ok(true) => Transition::to(
                    ChatState::AwaitingConvertAmount { code: code.clone() },
                    Reply::send(BotMessage::AskConvertAmount { code }),
                ),
                Ok(false) => {
                    Transition::stay(state, Reply::send(BotMessage::CurrencyNotFound { code }))
                }
                Err(e) => self.service_failure(chat_id, state, e),
            },
            _ => self.help(chat_id, state).await,
        }
    }

    /// Numeric step of the add, convert and change-rate flows
    pub async fn submit_amount_or_rate(
        &self,
        chat_id: &str,
        state: &ChatState,
        text: &str,
    ) -> Transition {
        let value = match PositiveDecimal::parse(text) {
            Ok(value) => value,
            Err(e) => {
                debug!(chat_id = %chat_id, error = %e, "Rejected number");
                return Transition::stay(state, Reply::send(Self::number_error(e)));
            }
        };

        match state {
            ChatState::AwaitingNewCurrencyRate { code } => {
                self.finish_add(chat_id, state, code, value).await
            }
            ChatState::AwaitingUpdatedRate { code } => {
                self.finish_update(chat_id, state, code, value).await
            }
            ChatState::AwaitingConvertAmount { code } => {
                self.finish_convert(chat_id, state, code, value).await
            }
            _ => self.help(chat_id, state).await,
        }
    }

    fn number_error(err: InputError) -> BotMessage {
        match err {
            InputError::TooLarge => BotMessage::NumberTooLarge,
            _ => BotMessage::InvalidNumber,
        }
    }

    async fn finish_add(
        &self,
        chat_id: &str,
        state: &ChatState,
        code: &CurrencyCode,
        rate: PositiveDecimal,
    ) -> Transition {
        if let Err(denied) = self.guard_admin_mutation(chat_id, state).await {
            return denied;
        }
        match self.currencies.add(code, rate).await {
            Ok(()) => {
                info!(chat_id = %chat_id, currency = %code, rate = %rate, "Currency added");
                let menu = self.main_menu(chat_id).await;
                Transition::idle(
                    Reply::send(BotMessage::CurrencyAdded {
                        code: code.clone(),
                        rate,
                    })
                    .with_menu(menu),
                )
            }
            // Lost a race with another chat adding the same code
            Err(StoreError::AlreadyExists(code)) => Transition::to(
                ChatState::AwaitingNewCurrencyCode,
                Reply::send(BotMessage::CurrencyExists { code }),
            ),
            Err(e) => self.service_failure(chat_id, state, e),
        }
    }

    async fn finish_update(
        &self,
        chat_id: &str,
        state: &ChatState,
        code: &CurrencyCode,
        rate: PositiveDecimal,
    ) -> Transition {
        if let Err(denied) = self.guard_admin_mutation(chat_id, state).await {
            return denied;
        }
        match self.currencies.update_rate(code, rate).await {
            Ok(()) => {
                info!(chat_id = %chat_id, currency = %code, rate = %rate, "Currency rate updated");
                let menu = self.main_menu(chat_id).await;
                Transition::idle(
                    Reply::send(BotMessage::RateUpdated {
                        code: code.clone(),
                        rate,
                    })
                    .with_menu(menu),
                )
            }
            Err(StoreError::NotFound(code)) => {
                let menu = self.main_menu(chat_id).await;
                Transition::idle(Reply::send(BotMessage::CurrencyGone { code }).with_menu(menu))
            }
            Err(e) => self.service_failure(chat_id, state, e),
        }
    }

    async fn finish_convert(
        &self,
        chat_id: &str,
        state: &ChatState,
        code: &CurrencyCode,
        amount: PositiveDecimal,
    ) -> Transition {
        match self.currencies.convert(code, amount).await {
            Ok(conversion) => {
                debug!(chat_id = %chat_id, currency = %code, "Conversion completed");
                let menu = self.main_menu(chat_id).await;
                Transition::idle(Reply::send(BotMessage::Converted(conversion)).with_menu(menu))
            }
            // Deleted while the user was typing the amount
            Err(StoreError::NotFound(code)) => Transition::to(
                ChatState::AwaitingConvertCode,
                Reply::send(BotMessage::CurrencyNotFound { code }),
            ),
            Err(StoreError::Invalid(e)) => {
                Transition::stay(state, Reply::send(Self::number_error(e)))
            }
            Err(e) => self.service_failure(chat_id, state, e),
        }
    }
}
