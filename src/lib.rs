//! Telegram bot that places Zadarma callbacks to a gate's entry and exit numbers.

pub mod bot;
pub mod config;
pub mod operator_log;
pub mod router;
pub mod zadarma;
