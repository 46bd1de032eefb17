//! Access Token Cache
//!
//! Holds the provider bearer token with expiry tracking so one token is
//! shared by every request until it is about to expire.

use chrono::{Duration, Utc};
use std::future::Future;
use tokio::sync::RwLock;

use shop_core::provider::AccessToken;
use shop_core::Result;

/// Seconds before the real expiry at which a token is considered stale
const DEFAULT_SKEW_SECS: i64 = 60;

/// Shared token slot
pub struct TokenCache {
    slot: RwLock<Option<AccessToken>>,
    skew: Duration,
}

impl Default for TokenCache {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenCache {
    pub fn new() -> Self {
        Self::with_skew(Duration::seconds(DEFAULT_SKEW_SECS))
    }

    pub fn with_skew(skew: Duration) -> Self {
        Self {
            slot: RwLock::new(None),
            skew,
        }
    }

    fn is_fresh(&self, token: &AccessToken) -> bool {
        Utc::now() + self.skew < token.expires_at
    }

    /// Cached token, if still fresh
    pub async fn current(&self) -> Option<AccessToken> {
        self.slot
            .read()
            .await
            .as_ref()
            .filter(|token| self.is_fresh(token))
            .cloned()
    }

    pub async fn store(&self, token: AccessToken) {
        *self.slot.write().await = Some(token);
    }

    /// Drop the cached token (e.g. after the provider answered 401)
    pub async fn invalidate(&self) {
        *self.slot.write().await = None;
    }

    /// Return the cached token or run `refresh` to obtain a new one.
    ///
    /// Refreshes are serialized behind the write lock, so concurrent
    /// callers wait for a single token request.
    pub async fn get_or_refresh<F, Fut>(&self, refresh: F) -> Result<AccessToken>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<AccessToken>>,
    {
        if let Some(token) = self.current().await {
            return Ok(token);
        }

        let mut slot = self.slot.write().await;
        if let Some(token) = slot.as_ref().filter(|token| self.is_fresh(token)) {
            return Ok(token.clone());
        }

        let token = refresh().await?;
        tracing::debug!(expires_at = %token.expires_at, "Refreshed provider access token");
        *slot = Some(token.clone());

        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn token(valid_for: Duration) -> AccessToken {
        AccessToken {
            token: "abc".into(),
            expires_at: Utc::now() + valid_for,
        }
    }

    #[tokio::test]
    async fn test_refresh_once_while_fresh() {
        let cache = TokenCache::new();
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let result = cache
                .get_or_refresh(|| async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(token(Duration::hours(1)))
                })
                .await
                .unwrap();
            assert_eq!(result.token, "abc");
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_token_inside_skew_is_stale() {
        let cache = TokenCache::new();
        cache.store(token(Duration::seconds(30))).await;
        assert!(cache.current().await.is_none());

        cache.store(token(Duration::minutes(10))).await;
        assert!(cache.current().await.is_some());

        cache.invalidate().await;
        assert!(cache.current().await.is_none());
    }
}
