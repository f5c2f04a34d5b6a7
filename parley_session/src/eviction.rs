//! Session eviction policy and the background sweeper that applies it.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::SessionStore;

/// When whole sessions may be dropped from the store.
///
/// The default never evicts: sessions live until the process exits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvictionPolicy {
    /// Drop a session once it has not been accessed for this long.
    pub ttl: Option<Duration>,
    /// Upper bound on live sessions; the least recently accessed one is
    /// dropped to make room for a new user.
    pub max_sessions: Option<NonZeroUsize>,
}

impl EvictionPolicy {
    #[must_use]
    pub const fn never() -> Self {
        Self {
            ttl: None,
            max_sessions: None,
        }
    }

    #[must_use]
    pub const fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    #[must_use]
    pub const fn with_max_sessions(mut self, max: NonZeroUsize) -> Self {
        self.max_sessions = Some(max);
        self
    }

    #[must_use]
    pub fn is_expired(&self, last_access: Instant, now: Instant) -> bool {
        self.ttl
            .is_some_and(|ttl| now.saturating_duration_since(last_access) >= ttl)
    }

    /// How often a sweeper should run for this policy, if at all.
    ///
    /// Half the TTL, but never more often than once a second.
    #[must_use]
    pub fn sweep_period(&self) -> Option<Duration> {
        self.ttl
            .map(|ttl| (ttl / 2).max(Duration::from_secs(1)))
    }
}

/// Periodically drop expired sessions from `store`.
///
/// Returns `None` when the store's policy has no TTL, since there is then
/// nothing to sweep.
pub fn spawn_sweeper(store: Arc<SessionStore>) -> Option<JoinHandle<()>> {
    let period = store.policy().sweep_period()?;
    info!("Starting session sweeper, period {}s", period.as_secs());

    Some(tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        interval.tick().await;

        loop {
            interval.tick().await;
            let evicted = store.evict_expired().await;
            if evicted > 0 {
                debug!("Sweeper evicted {evicted} idle session(s)");
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn never_policy_never_expires() {
        let policy = EvictionPolicy::never();
        let now = Instant::now();
        assert!(!policy.is_expired(now, now + Duration::from_secs(86_400)));
        assert_eq!(policy.sweep_period(), None);
    }

    #[test]
    fn ttl_boundary_is_inclusive() {
        let policy = EvictionPolicy::never().with_ttl(Duration::from_secs(10));
        let start = Instant::now();
        assert!(!policy.is_expired(start, start + Duration::from_secs(9)));
        assert!(policy.is_expired(start, start + Duration::from_secs(10)));
    }

    #[test]
    fn sweep_period_has_floor() {
        let policy = EvictionPolicy::never().with_ttl(Duration::from_millis(500));
        assert_eq!(policy.sweep_period(), Some(Duration::from_secs(1)));

        let policy = EvictionPolicy::never().with_ttl(Duration::from_secs(600));
        assert_eq!(policy.sweep_period(), Some(Duration::from_secs(300)));
    }
}
