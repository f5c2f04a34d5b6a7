use crate::{Command, Error, Result, handler::format_reply};
use parley_conversation::{ConversationService, InboundEvent};
use parley_session::spawn_sweeper;
use std::{sync::Arc, time::Duration};
use teloxide::prelude::*;
use tokio::time::sleep;
use tracing::{info, warn};

/// Telegram bot answering through a shared `ConversationService`.
#[derive(Clone)]
pub struct TelegramBot {
    /// Teloxide bot instance
    pub bot: Bot,
    service: Arc<ConversationService>,
    /// Allowed user IDs; empty allows everyone
    allowed_users: Vec<u64>,
    echo_query: bool,
}

impl TelegramBot {
    pub fn new(
        token: String,
        service: Arc<ConversationService>,
        allow_from: &[String],
        echo_query: bool,
    ) -> Result<Self> {
        if token.trim().is_empty() {
            return Err(Error::Config("Telegram bot token is empty".to_string()));
        }

        let allowed_users = allow_from
            .iter()
            .filter_map(|s| match s.trim().parse::<u64>() {
                Ok(id) => Some(id),
                Err(_) => {
                    warn!("Ignoring invalid Telegram user id in allow list: {s}");
                    None
                }
            })
            .collect();

        Ok(Self {
            bot: Bot::new(token),
            service,
            allowed_users,
            echo_query,
        })
    }

    #[must_use]
    pub fn is_allowed(&self, user_id: u64) -> bool {
        self.allowed_users.is_empty() || self.allowed_users.contains(&user_id)
    }

    /// Run one conversation turn and format the text to send back.
    pub async fn answer(&self, event: &InboundEvent) -> String {
        let reply = self.service.respond(event).await;
        format_reply(&event.display_name, &event.query, &reply, self.echo_query)
    }

    /// Test connection to Telegram API with linear backoff retry.
    /// Starts at 2s, increases by 2s each attempt, max 10s delay.
    /// Retries indefinitely until connection succeeds.
    async fn test_connection(&self) {
        const INITIAL_DELAY_SECS: u64 = 2;
        const MAX_DELAY_SECS: u64 = 10;

        let mut attempt = 1u64;
        loop {
            match self.bot.get_me().await {
                Ok(me) => {
                    info!(
                        "Connected to Telegram API: @{} (id: {})",
                        me.user
                            .username
                            .clone()
                            .unwrap_or_else(|| "no username".to_string()),
                        me.user.id
                    );
                    return;
                }
                Err(e) => {
                    let delay_secs = (INITIAL_DELAY_SECS * attempt).min(MAX_DELAY_SECS);

                    warn!("Connection attempt {attempt} failed: {e}. Retrying in {delay_secs}s...");
                    if attempt == 1 {
                        warn!("This may be due to network issues or an invalid bot token");
                    }

                    sleep(Duration::from_secs(delay_secs)).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Publish the command list shown in Telegram clients.
    async fn register_commands(&self) -> Result<()> {
        self.bot.set_my_commands(Command::bot_commands()).await?;
        info!("Registered {} bot commands", Command::bot_commands().len());
        Ok(())
    }

    /// Run the bot until Ctrl+C.
    pub async fn run(self) -> Result<()> {
        use teloxide::dispatching::{Dispatcher, UpdateFilterExt};
        use teloxide::dptree;
        use teloxide::types::Update;

        self.test_connection().await;

        if let Err(e) = self.register_commands().await {
            warn!("Failed to register bot commands: {e}");
        }

        let sweeper = spawn_sweeper(Arc::clone(self.service.store()));
        let bot = self.bot.clone();

        let schema = dptree::entry().branch(Update::filter_message().endpoint({
            let bot_clone = self.clone();
            move |_bot: Bot, msg: teloxide::types::Message| {
                let bot_clone = bot_clone.clone();
                async move { crate::handler::handle_message(bot_clone, msg).await }
            }
        }));

        Dispatcher::builder(bot, schema)
            .enable_ctrlc_handler()
            .build()
            .dispatch()
            .await;

        if let Some(sweeper) = sweeper {
            sweeper.abort();
        }
        info!(
            "Telegram bot stopped with {} live session(s)",
            self.service.store().len().await
        );

        Ok(())
    }
}
