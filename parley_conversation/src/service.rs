use parley_core::{
    BackendError, CompletionBackend, ConversationTurn, FALLBACK_REPLY, GenerationConfig,
};
use parley_session::SessionStore;
use std::sync::Arc;
use std::time::Duration;
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

use crate::{ConversationError, Result};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// One user action delivered by a gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    /// Stable identity of the sender; the session key.
    pub user_id: String,
    pub display_name: String,
    pub query: String,
}

impl InboundEvent {
    #[must_use]
    pub fn new(
        user_id: impl Into<String>,
        display_name: impl Into<String>,
        query: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            display_name: display_name.into(),
            query: query.into(),
        }
    }
}

/// Result of a successful turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnOutcome {
    pub reply: String,
    /// Length of the user's conversation after this turn was recorded.
    pub turn_count: usize,
}

/// Drives one completion per inbound event against the shared session store.
pub struct ConversationService<B = Arc<dyn CompletionBackend>>
where
    B: CompletionBackend,
{
    backend: B,
    store: Arc<SessionStore>,
    generation: GenerationConfig,
    timeout: Duration,
}

impl<B> ConversationService<B>
where
    B: CompletionBackend,
{
    pub fn new(backend: B, store: Arc<SessionStore>, generation: GenerationConfig) -> Self {
        info!("Creating conversation service with backend {}", backend.name());
        Self {
            backend,
            store,
            generation,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Set the deadline used by [`Self::handle`].
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub const fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Process `event` with the service's default deadline.
    pub async fn handle(&self, event: &InboundEvent) -> Result<TurnOutcome> {
        self.handle_with_deadline(event, self.timeout).await
    }

    /// Process `event`, giving the backend at most `deadline` to answer.
    ///
    /// The store's locks are never held while waiting on the backend. If
    /// this future is dropped before it completes, nothing is recorded.
    pub async fn handle_with_deadline(
        &self,
        event: &InboundEvent,
        deadline: Duration,
    ) -> Result<TurnOutcome> {
        let span = info_span!(
            "turn",
            request_id = %Uuid::now_v7(),
            user = %event.user_id,
        );
        self.process(event, deadline).instrument(span).await
    }

    /// Process `event` and always produce text for the user, substituting the
    /// fallback reply on failure.
    pub async fn respond(&self, event: &InboundEvent) -> String {
        match self.handle(event).await {
            Ok(outcome) => outcome.reply,
            Err(ConversationError::Session(e)) => {
                error!("Session invariant violated for {}: {e}", event.user_id);
                FALLBACK_REPLY.to_string()
            }
            Err(e) => {
                warn!("No reply for {}: {e}", event.user_id);
                FALLBACK_REPLY.to_string()
            }
        }
    }

    async fn process(&self, event: &InboundEvent, deadline: Duration) -> Result<TurnOutcome> {
        let query = event.query.trim();
        if query.is_empty() {
            return Err(ConversationError::EmptyQuery);
        }

        let conversation = self.store.get_or_create(&event.user_id).await;
        let prior_turns = conversation.turns().await;
        debug!(
            "Sending query from {} with {} prior turn(s)",
            event.display_name,
            prior_turns.len()
        );

        let generated = tokio::time::timeout(
            deadline,
            self.backend
                .generate(&prior_turns, query, &self.generation),
        )
        .await;

        let completion = match generated {
            Ok(Ok(completion)) => completion,
            Ok(Err(e)) => {
                error!("Completion backend {} failed: {e}", self.backend.name());
                return Err(e.into());
            }
            Err(_) => {
                error!(
                    "Completion backend {} timed out after {deadline:?}",
                    self.backend.name()
                );
                return Err(BackendError::Timeout(deadline).into());
            }
        };

        let reply = completion.into_text()?;

        let turn_count = self
            .store
            .append_to(
                &conversation,
                [
                    ConversationTurn::user(query),
                    ConversationTurn::model(reply.clone()),
                ],
            )
            .await?;

        info!("Recorded turn, conversation now has {turn_count} turn(s)");
        Ok(TurnOutcome { reply, turn_count })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parley_core::Completion;

    struct Echo;

    #[async_trait]
    impl CompletionBackend for Echo {
        async fn generate(
            &self,
            _prior_turns: &[ConversationTurn],
            query: &str,
            _config: &GenerationConfig,
        ) -> std::result::Result<Completion, BackendError> {
            Ok(Completion::Text(format!("echo: {query}")))
        }

        fn name(&self) -> &str {
            "echo"
        }
    }

    #[tokio::test]
    async fn blank_query_is_rejected_before_store() {
        let store = Arc::new(SessionStore::new());
        let service =
            ConversationService::new(Echo, Arc::clone(&store), GenerationConfig::default());

        let err = service
            .handle(&InboundEvent::new("u1", "Ann", "   "))
            .await
            .unwrap_err();

        assert_eq!(err, ConversationError::EmptyQuery);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn query_is_trimmed_before_recording() {
        let store = Arc::new(SessionStore::new());
        let service =
            ConversationService::new(Echo, Arc::clone(&store), GenerationConfig::default());

        let outcome = service
            .handle(&InboundEvent::new("u1", "Ann", "  hi \n"))
            .await
            .unwrap();

        assert_eq!(outcome.reply, "echo: hi");
        assert_eq!(outcome.turn_count, 2);
        let turns = store.get("u1").await.unwrap().turns().await;
        assert_eq!(turns[0], ConversationTurn::user("hi"));
    }

    #[tokio::test]
    async fn boxed_backend_is_accepted() {
        let backend: Arc<dyn CompletionBackend> = Arc::new(Echo);
        let store = Arc::new(SessionStore::new());
        let service: ConversationService =
            ConversationService::new(backend, store, GenerationConfig::default())
                .with_timeout(Duration::from_secs(5));

        assert_eq!(service.timeout(), Duration::from_secs(5));
        assert_eq!(
            service.respond(&InboundEvent::new("u1", "Ann", "ping")).await,
            "echo: ping"
        );
    }
}
