//! Telegram gateway: turns chat messages into conversation turns and
//! delivers the replies.

mod bot;
mod command;
mod error;
mod handler;

pub use bot::TelegramBot;
pub use command::Command;
pub use error::{Error, Result};
pub use handler::{MAX_MESSAGE_LEN, format_reply, split_message};
