//! Login state store
//!
//! Maps an opaque state token to the destination validated at login time.
//! Entries are single use: `take_if_valid` removes the entry before checking
//! its age, so a replayed callback never finds it again.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::error::GatewayError;

/// A pending login, bound to the destination it will return to
#[derive(Debug, Clone)]
pub struct LoginState {
    pub destination: String,
    pub created_at: Instant,
    pub ttl: Duration,
}

impl LoginState {
    pub fn new(destination: impl Into<String>, ttl: Duration) -> Self {
        Self {
            destination: destination.into(),
            created_at: Instant::now(),
            ttl,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.created_at.elapsed() >= self.ttl
    }
}

/// Storage for pending logins.
///
/// Implementations backed by a shared service must keep `take_if_valid` a
/// single atomic read-and-delete.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn put(&self, token: &str, destination: &str, ttl: Duration) -> Result<(), GatewayError>;

    /// Remove the entry for `token` and return its destination if it had not expired
    async fn take_if_valid(&self, token: &str) -> Result<Option<String>, GatewayError>;
}

/// Default cap on pending logins held by [`InMemoryStateStore`]
pub const DEFAULT_MAX_PENDING_LOGINS: usize = 10_000;

/// Process-local store. Sufficient for a single gateway instance.
///
/// Holds at most `max_entries` pending logins. When full, expired entries
/// are swept first; if none can be dropped, new logins are refused.
#[derive(Debug)]
pub struct InMemoryStateStore {
    entries: DashMap<String, LoginState>,
    max_entries: usize,
}

impl Default for InMemoryStateStore {
    fn default() -> Self {
        Self::with_max_entries(DEFAULT_MAX_PENDING_LOGINS)
    }
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_entries(max_entries: usize) -> Self {
        Self {
            entries: DashMap::new(),
            max_entries,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, token: &str) -> bool {
        self.entries.contains_key(token)
    }

    /// Drop every expired entry, returning how many were removed
    pub fn sweep_expired(&self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, state| !state.is_expired());
        before.saturating_sub(self.entries.len())
    }

    /// Periodically sweep expired entries to bound memory
    pub fn spawn_sweeper(self: Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let removed = self.sweep_expired();
                if removed > 0 {
                    tracing::debug!(
                        removed = removed,
                        pending = self.len(),
                        "Swept expired login states"
                    );
                }
            }
        })
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn put(&self, token: &str, destination: &str, ttl: Duration) -> Result<(), GatewayError> {
        // The cap is approximate under concurrent logins
        if self.entries.len() >= self.max_entries && self.sweep_expired() == 0 {
            tracing::warn!(
                event = "login_state_store_full",
                pending = self.entries.len(),
                max = self.max_entries,
                "Refusing login: too many pending logins"
            );
            return Err(GatewayError::StateStore(format!(
                "pending login limit of {} reached",
                self.max_entries
            )));
        }

        self.entries
            .insert(token.to_string(), LoginState::new(destination, ttl));
        Ok(())
    }

    async fn take_if_valid(&self, token: &str) -> Result<Option<String>, GatewayError> {
        Ok(self
            .entries
            .remove(token)
            .and_then(|(_, state)| (!state.is_expired()).then_some(state.destination)))
    }
}
