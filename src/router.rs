//! Maps a button press to a destination number and the text shown back.

use tracing::{info, warn};

use crate::operator_log::truncate;
use crate::zadarma::{ApiResponse, CallbackApi, ZadarmaError};

pub const DEFAULT_INTERNAL_NUMBER: &str = "+380635154798";
pub const DEFAULT_ENTRY_NUMBER: &str = "101";
pub const DEFAULT_EXIT_NUMBER: &str = "102";

/// Telegram rejects message text longer than this.
pub const MAX_MESSAGE_CHARS: usize = 4096;
/// Room left for the provider's body inside a failure message.
const MAX_BODY_CHARS: usize = 3500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Entry,
    Exit,
}

impl Action {
    /// Only the literal `entry` is an entry. Every other identifier,
    /// including unknown ones, routes to exit.
    pub fn from_callback_data(data: &str) -> Self {
        if data == "entry" { Action::Entry } else { Action::Exit }
    }

    pub fn callback_data(&self) -> &'static str {
        match self {
            Action::Entry => "entry",
            Action::Exit => "exit",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Action::Entry => "📥 Въезд",
            Action::Exit => "📤 Выезд",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destinations {
    /// Number the provider rings first.
    pub internal: String,
    pub entry: String,
    pub exit: String,
}

impl Default for Destinations {
    fn default() -> Self {
        Self {
            internal: DEFAULT_INTERNAL_NUMBER.to_string(),
            entry: DEFAULT_ENTRY_NUMBER.to_string(),
            exit: DEFAULT_EXIT_NUMBER.to_string(),
        }
    }
}

impl Destinations {
    pub fn number_for(&self, action: Action) -> &str {
        match action {
            Action::Entry => &self.entry,
            Action::Exit => &self.exit,
        }
    }
}

/// One selectable button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuItem {
    pub label: &'static str,
    pub data: &'static str,
}

/// Result of handling a selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub action: Action,
    pub destination: String,
    pub success: bool,
    pub text: String,
}

pub struct Router<C> {
    api: C,
    destinations: Destinations,
}

impl<C: CallbackApi> Router<C> {
    pub fn new(api: C, destinations: Destinations) -> Self {
        Self { api, destinations }
    }

    pub fn destinations(&self) -> &Destinations {
        &self.destinations
    }

    pub fn greeting(&self) -> &'static str {
        "👋 Выберите действие:"
    }

    pub fn menu(&self) -> Vec<MenuItem> {
        [Action::Entry, Action::Exit]
            .into_iter()
            .map(|action| MenuItem {
                label: action.label(),
                data: action.callback_data(),
            })
            .collect()
    }

    /// Place the callback for the button identified by `data`. Never retries.
    pub async fn select(&self, data: &str) -> Outcome {
        let action = Action::from_callback_data(data);
        let destination = self.destinations.number_for(action).to_string();

        info!("📞 {:?} requested ({} -> {})", action, self.destinations.internal, destination);

        let result = self
            .api
            .request_callback(&self.destinations.internal, &destination)
            .await;

        let (success, text) = outcome_text(&destination, &result);
        if !success {
            match &result {
                Ok(response) => warn!(
                    "Callback to {destination} rejected: {} {}",
                    response.status, response.body
                ),
                Err(e) => warn!("Callback to {destination} failed: {e}"),
            }
        }

        Outcome {
            action,
            destination,
            success,
            text,
        }
    }
}

fn outcome_text(destination: &str, result: &Result<ApiResponse, ZadarmaError>) -> (bool, String) {
    match result {
        Ok(response) if response.is_ok() => {
            (true, format!("✅ Звонок на {destination} инициирован."))
        }
        Ok(response) => (
            false,
            format!(
                "❌ Ошибка при инициировании звонка.\nКод: {}\nОтвет: {}",
                response.status,
                truncate(&response.body, MAX_BODY_CHARS)
            ),
        ),
        Err(_) => (
            false,
            "❌ Ошибка при инициировании звонка.\nНет связи с сервером телефонии.".to_string(),
        ),
    }
}
