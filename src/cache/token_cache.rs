use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::future::{BoxFuture, FutureExt, Shared};
use tracing::{debug, info};

use crate::cache::token::{Token, TokenKey};
use crate::credentials::error::AuthError;
use crate::credentials::ProviderChain;
use crate::helpers::time::now_i64;
use crate::observability::metrics::get_metrics;

type Acquisition = Shared<BoxFuture<'static, Result<Token, AuthError>>>;

#[derive(Default)]
struct CacheEntry {
    token: Option<Token>,
    in_flight: Option<Acquisition>,
}

type Entries = Arc<Mutex<HashMap<TokenKey, CacheEntry>>>;

enum Lookup {
    Cached(Token),
    Pending(Acquisition),
}

/// Access tokens keyed by (scope, audience).
///
/// A token is served from memory while it is further than the refresh skew
/// from expiry. Otherwise one acquisition is started per key and every
/// concurrent caller for that key awaits the same outcome. The acquisition
/// runs as its own task, so a caller giving up (deadline, disconnect) does not
/// cancel it for the others.
#[derive(Clone)]
pub struct TokenCache {
    chain: Arc<ProviderChain>,
    refresh_skew_seconds: i64,
    entries: Entries,
}

impl TokenCache {
    pub fn new(chain: Arc<ProviderChain>, refresh_skew_seconds: u64) -> Self {
        Self {
            chain,
            refresh_skew_seconds: refresh_skew_seconds.min(i64::MAX as u64) as i64,
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn chain(&self) -> &ProviderChain {
        &self.chain
    }

    /// Returns a token with `expires_at > now`, or the acquisition error of
    /// this key. An expired token is never handed out.
    pub async fn get_token(&self, scope: &str, audience: &str) -> Result<Token, AuthError> {
        let key = TokenKey::new(scope, audience);

        let lookup = {
            let mut entries = lock(&self.entries);
            let entry = entries.entry(key.clone()).or_default();

            let now = now_i64();
            if let Some(token) = entry
                .token
                .as_ref()
                .filter(|token| !token.needs_refresh(now, self.refresh_skew_seconds))
            {
                Lookup::Cached(token.clone())
            } else if let Some(in_flight) = entry.in_flight.clone() {
                debug!(scope = %key.scope, audience = %key.audience, "joining in-flight token acquisition");
                Lookup::Pending(in_flight)
            } else {
                let acquisition = self.spawn_acquisition(key.clone());
                entry.in_flight = Some(acquisition.clone());
                Lookup::Pending(acquisition)
            }
        };

        let acquisition = match lookup {
            Lookup::Cached(token) => {
                get_metrics().await.token_cache_hits.inc();
                return Ok(token);
            }
            Lookup::Pending(acquisition) => acquisition,
        };

        let token = acquisition.await?;
        if !token.is_valid_at(now_i64()) {
            return Err(AuthError::InvalidResponse(format!(
                "token for scope '{}' expired before it could be used",
                scope
            )));
        }
        Ok(token)
    }

    /// Drop the cached token for a key, e.g. after the backend answered 401.
    /// The next `get_token` for the key goes to the provider.
    pub fn invalidate(&self, scope: &str, audience: &str) {
        let key = TokenKey::new(scope, audience);
        if let Some(entry) = lock(&self.entries).get_mut(&key) {
            if entry.token.take().is_some() {
                info!(scope = %scope, audience = %audience, "cached token invalidated");
            }
        }
    }

    /// The spawned task swaps the new token in and clears the in-flight marker
    /// under the lock, so readers see either the old or the new token. On
    /// failure the previous token stays in place; it is still refreshed (or
    /// refused once expired) on the next call.
    fn spawn_acquisition(&self, key: TokenKey) -> Acquisition {
        let chain = self.chain.clone();
        let guard = InFlightGuard {
            entries: self.entries.clone(),
            key: Some(key.clone()),
        };

        let handle = tokio::spawn(async move {
            let result = chain.acquire_token(&key.scope, &key.audience).await;
            guard.finish(&result);
            result
        });

        async move {
            handle
                .await
                .map_err(|e| AuthError::Transport(format!("token acquisition task failed: {}", e)))?
        }
        .boxed()
        .shared()
    }
}

/// Clears the in-flight marker of its key when the acquisition task ends,
/// including by panic or runtime shutdown, so the next caller starts over.
struct InFlightGuard {
    entries: Entries,
    key: Option<TokenKey>,
}

impl InFlightGuard {
    fn finish(mut self, result: &Result<Token, AuthError>) {
        if let Some(key) = self.key.take() {
            let mut entries = lock(&self.entries);
            let entry = entries.entry(key).or_default();
            entry.in_flight = None;
            if let Ok(token) = result {
                entry.token = Some(token.clone());
            }
        }
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            if let Some(entry) = lock(&self.entries).get_mut(&key) {
                entry.in_flight = None;
            }
        }
    }
}

fn lock(entries: &Entries) -> MutexGuard<'_, HashMap<TokenKey, CacheEntry>> {
    entries.lock().unwrap_or_else(PoisonError::into_inner)
}
