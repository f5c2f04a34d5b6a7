use parley_core::{ConversationState, ConversationTurn};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::{EvictionPolicy, Result, SessionError};

#[derive(Debug)]
struct Shared {
    user_id: String,
    state: Mutex<ConversationState>,
}

/// Shared reference to one user's conversation.
///
/// Cloning is cheap and every clone refers to the same conversation. Reading
/// is allowed through the handle; appending goes through
/// [`SessionStore::append_turns`] or [`SessionStore::append_to`].
#[derive(Debug, Clone)]
pub struct ConversationHandle(Arc<Shared>);

impl ConversationHandle {
    fn new(user_id: &str) -> Self {
        Self(Arc::new(Shared {
            user_id: user_id.to_string(),
            state: Mutex::new(ConversationState::new(user_id)),
        }))
    }

    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.0.user_id
    }

    /// Copy of the turns recorded so far.
    pub async fn turns(&self) -> Vec<ConversationTurn> {
        self.0.state.lock().await.turns().to_vec()
    }

    pub async fn len(&self) -> usize {
        self.0.state.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.0.state.lock().await.is_empty()
    }

    /// Copy of the full conversation state, including timestamps.
    pub async fn snapshot(&self) -> ConversationState {
        self.0.state.lock().await.clone()
    }

    /// Whether both handles refer to the same conversation instance.
    #[must_use]
    pub fn same_as(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

#[derive(Debug)]
struct Entry {
    handle: ConversationHandle,
    last_access: Instant,
}

/// Owns every user's conversation for the lifetime of the process.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: Mutex<HashMap<String, Entry>>,
    policy: EvictionPolicy,
}

impl SessionStore {
    /// Create a store that never evicts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_policy(policy: EvictionPolicy) -> Self {
        info!("Creating session store with policy {:?}", policy);
        Self {
            sessions: Mutex::new(HashMap::new()),
            policy,
        }
    }

    #[must_use]
    pub const fn policy(&self) -> &EvictionPolicy {
        &self.policy
    }

    /// Return the conversation for `user_id`, creating an empty one if the
    /// user has none.
    ///
    /// Lookup and insert happen under one lock, so concurrent first calls
    /// for the same user all receive the same conversation.
    pub async fn get_or_create(&self, user_id: &str) -> ConversationHandle {
        let now = Instant::now();
        let mut sessions = self.sessions.lock().await;

        if let Some(entry) = sessions.get_mut(user_id) {
            if !self.policy.is_expired(entry.last_access, now) {
                entry.last_access = now;
                return entry.handle.clone();
            }
            debug!("Session for {user_id} expired, replacing it");
            sessions.remove(user_id);
        }

        if let Some(max) = self.policy.max_sessions {
            while sessions.len() >= max.get() {
                let Some(oldest) = sessions
                    .iter()
                    .min_by_key(|(_, entry)| entry.last_access)
                    .map(|(key, _)| key.clone())
                else {
                    break;
                };
                debug!("Session cap {} reached, evicting {oldest}", max.get());
                sessions.remove(&oldest);
            }
        }

        let handle = ConversationHandle::new(user_id);
        sessions.insert(
            user_id.to_string(),
            Entry {
                handle: handle.clone(),
                last_access: now,
            },
        );
        debug!("Created session for {user_id} ({} live)", sessions.len());
        handle
    }

    /// Look up an existing conversation without creating one.
    pub async fn get(&self, user_id: &str) -> Option<ConversationHandle> {
        self.sessions
            .lock()
            .await
            .get(user_id)
            .map(|entry| entry.handle.clone())
    }

    /// Append `turns`, in order, to the end of `user_id`'s conversation.
    ///
    /// All turns of one call land contiguously. Returns the conversation
    /// length afterwards.
    pub async fn append_turns<I>(&self, user_id: &str, turns: I) -> Result<usize>
    where
        I: IntoIterator<Item = ConversationTurn>,
    {
        self.append_checked(user_id, None, turns.into_iter().collect())
            .await
    }

    /// Append `turns` to `conversation`, provided it is still the entry the
    /// store holds for its user.
    ///
    /// Fails with `UnknownUser` when the conversation was evicted after the
    /// handle was obtained, including when a newer conversation has since
    /// replaced it.
    pub async fn append_to<I>(&self, conversation: &ConversationHandle, turns: I) -> Result<usize>
    where
        I: IntoIterator<Item = ConversationTurn>,
    {
        self.append_checked(
            conversation.user_id(),
            Some(conversation),
            turns.into_iter().collect(),
        )
        .await
    }

    async fn append_checked(
        &self,
        user_id: &str,
        expected: Option<&ConversationHandle>,
        turns: Vec<ConversationTurn>,
    ) -> Result<usize> {
        let mut sessions = self.sessions.lock().await;
        let entry = sessions
            .get_mut(user_id)
            .filter(|entry| expected.is_none_or(|handle| entry.handle.same_as(handle)))
            .ok_or_else(|| SessionError::UnknownUser(user_id.to_string()))?;
        entry.last_access = Instant::now();
        let handle = entry.handle.clone();

        // Lock order is map, then conversation. The conversation lock is taken
        // before the map is released so eviction cannot slip in between.
        let mut state = handle.0.state.lock().await;
        drop(sessions);

        state.append(turns);
        Ok(state.len())
    }

    /// Drop every session idle for longer than the policy's TTL.
    ///
    /// Returns how many were dropped.
    pub async fn evict_expired(&self) -> usize {
        if self.policy.ttl.is_none() {
            return 0;
        }

        let now = Instant::now();
        let mut sessions = self.sessions.lock().await;
        let before = sessions.len();
        sessions.retain(|_, entry| !self.policy.is_expired(entry.last_access, now));
        before - sessions.len()
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }

    pub async fn user_ids(&self) -> Vec<String> {
        self.sessions.lock().await.keys().cloned().collect()
    }
}
