use crate::{Command, Result, TelegramBot};
use parley_conversation::InboundEvent;
use teloxide::{
    requests::Requester,
    types::{ChatAction, ChatId, Message},
};
use tracing::{info, warn};

/// Telegram rejects messages longer than this many characters.
pub const MAX_MESSAGE_LEN: usize = 4096;

/// Optionally prefix `reply` with the question it answers.
#[must_use]
pub fn format_reply(display_name: &str, query: &str, reply: &str, echo_query: bool) -> String {
    if echo_query {
        format!("{display_name} asked: {query}\n\n{reply}")
    } else {
        reply.to_string()
    }
}

/// Split `text` into chunks of at most `limit` characters, preferring to
/// break after a newline.
#[must_use]
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    let limit = limit.max(1);
    let mut chunks = Vec::new();
    let mut rest = text;

    while rest.chars().count() > limit {
        let hard_end = rest
            .char_indices()
            .nth(limit)
            .map_or(rest.len(), |(idx, _)| idx);
        let end = rest[..hard_end]
            .rfind('\n')
            .filter(|&idx| idx > 0)
            .map_or(hard_end, |idx| idx + 1);

        chunks.push(rest[..end].to_string());
        rest = &rest[end..];
    }

    if !rest.is_empty() || chunks.is_empty() {
        chunks.push(rest.to_string());
    }
    chunks
}

/// Send `text` to `chat_id`. Failures are logged and dropped.
async fn deliver(bot: &TelegramBot, chat_id: ChatId, text: &str) {
    for chunk in split_message(text, MAX_MESSAGE_LEN) {
        if let Err(e) = bot.bot.send_message(chat_id, chunk).await {
            warn!("Failed to deliver reply to chat {}: {e}", chat_id.0);
            return;
        }
    }
}

/// What to do with one incoming text message.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Action {
    /// Sender is not on the allow list.
    Ignore,
    /// Answer with fixed text without touching the conversation.
    Reply(&'static str),
    /// Run a conversation turn for this query.
    Ask(String),
}

/// Decide how to answer `text`. Senders outside the allow list get nothing,
/// not even command replies.
fn route(text: &str, allowed: bool) -> Action {
    if !allowed {
        return Action::Ignore;
    }

    let query = match Command::parse_from_text(text) {
        Some(Command::Start) => return Action::Reply(Command::welcome_text()),
        Some(Command::Help) => return Action::Reply(Command::help_text()),
        Some(Command::Ask(question)) => question,
        None if text.trim_start().starts_with('/') => {
            return Action::Reply(Command::help_text());
        }
        None => text.to_string(),
    };

    if query.trim().is_empty() {
        Action::Reply(Command::usage_text())
    } else {
        Action::Ask(query)
    }
}

/// Handle any message (commands or regular text)
pub async fn handle_message(bot: TelegramBot, msg: Message) -> Result<()> {
    let (Some(text), Some(user)) = (msg.text(), msg.from.as_ref()) else {
        return Ok(());
    };
    let chat_id = msg.chat.id;
    let user_id = user.id.0;
    let display_name = user
        .username
        .clone()
        .unwrap_or_else(|| user.first_name.clone());

    let query = match route(text, bot.is_allowed(user_id)) {
        Action::Ignore => {
            warn!("[@{display_name}] Ignoring message from unauthorized user {user_id}");
            return Ok(());
        }
        Action::Reply(reply) => {
            info!("[@{display_name}] Command: {}", text.trim());
            deliver(&bot, chat_id, reply).await;
            return Ok(());
        }
        Action::Ask(query) => query,
    };

    info!("[@{display_name}] Query: {query}");

    if let Err(e) = bot.bot.send_chat_action(chat_id, ChatAction::Typing).await {
        warn!("Failed to send typing indicator to chat {}: {e}", chat_id.0);
    }

    let event = InboundEvent::new(user_id.to_string(), display_name.clone(), query);
    let reply = bot.answer(&event).await;

    info!("[@{display_name}] Reply: {reply}");
    deliver(&bot, chat_id, &reply).await;

    Ok(())
}
