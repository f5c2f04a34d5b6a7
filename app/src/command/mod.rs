//! Static strategy pattern for CLI commands.
//!
//! Each command is a separate strategy type with its own input, dispatched
//! statically from `main`.

use parley_config::{Config, ProviderKind};
use parley_conversation::ConversationService;
use parley_core::CompletionBackend;
use parley_providers::{CannedBackend, GeminiBackend};
use parley_session::SessionStore;
use std::sync::Arc;
use tracing::info;

mod ask;
mod init;
mod serve;
mod version;

pub use ask::{AskInput, AskStrategy};
pub use init::InitStrategy;
pub use serve::{ServeInput, ServeStrategy};
pub use version::VersionStrategy;

/// Core trait defining the contract for all command strategies.
pub trait CommandStrategy: Send + Sync + 'static {
    /// The input type this strategy accepts.
    type Input;

    /// Execute the command with the given input.
    async fn execute(&self, input: Self::Input) -> anyhow::Result<()>;
}

/// Construct the backend selected in config.
fn build_backend(config: &Config) -> Arc<dyn CompletionBackend> {
    match config.backend.provider {
        ProviderKind::Gemini => {
            let gemini = &config.backend.gemini;
            let backend = GeminiBackend::new(gemini.api_key.clone(), gemini.model.clone());
            match &gemini.base_url {
                Some(url) => Arc::new(backend.with_base_url(url.clone())),
                None => Arc::new(backend),
            }
        }
        ProviderKind::Canned => Arc::new(CannedBackend::new(config.backend.canned.reply.clone())),
    }
}

/// Wire backend, session store and generation settings into one service.
fn build_service(config: &Config) -> Arc<ConversationService> {
    let backend = build_backend(config);
    let store = Arc::new(SessionStore::with_policy(config.sessions.eviction_policy()));

    info!(
        "Using {} backend, request timeout {}s",
        backend.name(),
        config.request_timeout_secs
    );

    Arc::new(
        ConversationService::new(backend, store, config.generation.clone())
            .with_timeout(config.request_timeout()),
    )
}
