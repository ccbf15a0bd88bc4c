//! Unverified JWT claim decoding. Signatures are the identity provider's
//! concern; claims are only read to pick up `exp` and `aud`.

use anyhow::{anyhow, Result};
use base64::Engine;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum Audience {
    Single(String),
    Many(Vec<String>),
}

impl Audience {
    pub fn contains(&self, audience: &str) -> bool {
        match self {
            Audience::Single(aud) => aud == audience,
            Audience::Many(auds) => auds.iter().any(|aud| aud == audience),
        }
    }

    pub fn first(&self) -> Option<&str> {
        match self {
            Audience::Single(aud) => Some(aud.as_str()),
            Audience::Many(auds) => auds.first().map(String::as_str),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct JwtClaims {
    pub exp: Option<i64>,
    pub aud: Option<Audience>,
    pub sub: Option<String>,
}

/// Returns true if the value has the three dot-separated segments of a compact JWS.
pub fn looks_like_jwt(token: &str) -> bool {
    token.split('.').count() == 3
}

pub fn decode_claims(token: &str) -> Result<JwtClaims> {
    let mut parts = token.split('.');
    let payload = match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(_), Some(payload), Some(_), None) => payload,
        _ => return Err(anyhow!("invalid JWT format")),
    };

    let decoded = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| anyhow!("base64 decode error: {}", e))?;

    serde_json::from_slice::<JwtClaims>(&decoded).map_err(|e| anyhow!("invalid JWT payload: {}", e))
}
