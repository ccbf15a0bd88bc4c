use std::fmt;

use crate::utils::constants::DEFAULT_SCOPE_SUFFIX;

/// Cache key: one current token per (scope, audience).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TokenKey {
    pub scope: String,
    pub audience: String,
}

impl TokenKey {
    pub fn new(scope: &str, audience: &str) -> Self {
        Self {
            scope: scope.to_owned(),
            audience: audience.to_owned(),
        }
    }
}

/// Audience implied by a `<resource>/.default` scope.
pub fn audience_for_scope(scope: &str) -> String {
    scope
        .strip_suffix(DEFAULT_SCOPE_SUFFIX)
        .unwrap_or(scope)
        .to_owned()
}

/// Access token. Never mutated, only replaced. Timestamps are UNIX seconds.
#[derive(Clone, PartialEq, Eq)]
pub struct Token {
    value: String,
    pub scope: String,
    pub audience: String,
    pub issued_at: i64,
    pub expires_at: i64,
}

impl Token {
    pub fn new(value: String, scope: String, audience: String, issued_at: i64, expires_at: i64) -> Self {
        Self {
            value,
            scope,
            audience,
            issued_at,
            expires_at,
        }
    }

    /// The secret itself; keep it out of logs and error messages.
    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn is_valid_at(&self, now: i64) -> bool {
        self.expires_at > now
    }

    pub fn remaining_seconds(&self, now: i64) -> i64 {
        (self.expires_at - now).max(0)
    }

    /// True once the token is inside the refresh window (or already expired).
    pub fn needs_refresh(&self, now: i64, refresh_skew_seconds: i64) -> bool {
        self.expires_at - now <= refresh_skew_seconds
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("value", &"***")
            .field("scope", &self.scope)
            .field("audience", &self.audience)
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}
