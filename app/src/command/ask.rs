//! Local conversation against the configured backend, without a gateway.
//!
//! Turns are kept in the same in-memory session store the bot uses, so an
//! interactive run behaves like one Telegram user talking to the bot.

use parley_config::Config;
use parley_conversation::{ConversationService, InboundEvent};
use std::io::Write;
use tracing::info;

use super::build_service;

/// Input parameters for the Ask command strategy.
#[derive(Debug, Clone)]
pub struct AskInput {
    /// Optional single message to send (non-interactive mode)
    pub message: Option<String>,
    /// User id the conversation is recorded under
    pub user: String,
}

/// Strategy for executing the Ask command.
#[derive(Debug, Clone, Copy)]
pub struct AskStrategy;

impl super::CommandStrategy for AskStrategy {
    type Input = AskInput;

    async fn execute(&self, input: Self::Input) -> anyhow::Result<()> {
        let config = Config::load()?;
        let service = build_service(&config);

        if let Some(msg) = input.message {
            let event = InboundEvent::new(input.user.clone(), input.user, msg);
            let outcome = service.handle(&event).await?;
            println!("{}", outcome.reply);
            return Ok(());
        }

        run_interactive(&service, &input.user).await?;

        let turns = match service.store().get(&input.user).await {
            Some(conversation) => conversation.len().await,
            None => 0,
        };
        info!("Conversation ended: {turns} total turns");
        Ok(())
    }
}

async fn run_interactive(service: &ConversationService, user: &str) -> anyhow::Result<()> {
    println!("=== parley: talking as {user} ===");
    println!("Type 'exit', 'quit', or Ctrl+C to end the session.\n");

    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let mut input = String::new();
        if std::io::stdin().read_line(&mut input)? == 0 {
            break;
        }
        let input = input.trim();

        if matches!(input, "exit" | "quit" | "q") {
            break;
        }

        if input.is_empty() {
            continue;
        }

        let event = InboundEvent::new(user, user, input);
        println!("\n{}\n", service.respond(&event).await);
    }

    Ok(())
}
