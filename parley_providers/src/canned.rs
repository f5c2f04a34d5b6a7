use async_trait::async_trait;
use parley_core::{BackendError, Completion, CompletionBackend, ConversationTurn, GenerationConfig};

/// Answers every query with the same templated string.
///
/// `{query}` is replaced with the user's query and `{turn}` with the
/// 1-based number of the exchange within the conversation.
#[derive(Debug, Clone)]
pub struct CannedBackend {
    template: String,
}

impl CannedBackend {
    #[must_use]
    pub const fn new(template: String) -> Self {
        Self { template }
    }

    fn render(&self, prior_turns: &[ConversationTurn], query: &str) -> String {
        let turn = prior_turns.len() / 2 + 1;
        self.template
            .replace("{turn}", &turn.to_string())
            .replace("{query}", query)
    }
}

#[async_trait]
impl CompletionBackend for CannedBackend {
    async fn generate(
        &self,
        prior_turns: &[ConversationTurn],
        query: &str,
        _config: &GenerationConfig,
    ) -> Result<Completion, BackendError> {
        Ok(Completion::Text(self.render(prior_turns, query)))
    }

    fn name(&self) -> &str {
        "canned"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fixed_reply_without_placeholders() {
        let backend = CannedBackend::new("Pong!".to_string());
        let completion = backend
            .generate(&[], "ping", &GenerationConfig::default())
            .await
            .unwrap();
        assert_eq!(completion, Completion::Text("Pong!".into()));
    }

    #[tokio::test]
    async fn placeholders_are_filled() {
        let backend = CannedBackend::new("#{turn}: you said {query}".to_string());
        let prior = [ConversationTurn::user("a"), ConversationTurn::model("b")];
        let completion = backend
            .generate(&prior, "hello", &GenerationConfig::default())
            .await
            .unwrap();
        assert_eq!(completion, Completion::Text("#2: you said hello".into()));
    }

    #[test]
    fn query_containing_placeholder_is_not_expanded_twice() {
        let backend = CannedBackend::new("{query}".to_string());
        assert_eq!(backend.render(&[], "{turn}"), "{turn}");
    }
}
