use serde::Deserialize;
use tracing::debug;

use crate::cache::token::Token;
use crate::credentials::error::AuthError;
use crate::helpers::time::now_i64;
use crate::parser::jwt::{decode_claims, looks_like_jwt};
use crate::utils::constants::DEFAULT_TOKEN_TTL_SECS;

/// Successful body of an OAuth2 token endpoint or an instance-metadata identity endpoint.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<NumberOrString>,
    token_type: Option<String>,
    resource: Option<String>,
}

/// Error body defined by RFC 6749 section 5.2.
#[derive(Debug, Deserialize, Default)]
pub struct TokenErrorResponse {
    pub error: Option<String>,
    pub error_description: Option<String>,
}

// metadata endpoints report numbers as strings
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(i64),
    Text(String),
}

impl NumberOrString {
    fn as_i64(&self) -> Option<i64> {
        match self {
            NumberOrString::Number(n) => Some(*n),
            NumberOrString::Text(s) => s.trim().parse().ok(),
        }
    }
}

const DESCRIPTION_LIMIT: usize = 200;

/// Build a [`Token`] from a token endpoint body. A missing `expires_in` is
/// read as the provider default of one hour.
pub fn parse_token_response(body: &str, scope: &str, requested_audience: &str) -> Result<Token, AuthError> {
    let response: TokenResponse = serde_json::from_str(body)
        .map_err(|e| AuthError::InvalidResponse(format!("token response is not valid JSON: {}", e)))?;

    if response.access_token.trim().is_empty() {
        return Err(AuthError::InvalidResponse("access_token is empty".to_owned()));
    }
    if let Some(token_type) = &response.token_type {
        if !token_type.eq_ignore_ascii_case("bearer") {
            debug!(token_type = %token_type, "unexpected token type");
        }
    }

    let expires_in = match &response.expires_in {
        Some(raw) => raw
            .as_i64()
            .ok_or_else(|| AuthError::InvalidResponse("expires_in is not a number".to_owned()))?,
        None => DEFAULT_TOKEN_TTL_SECS,
    };
    if expires_in <= 0 {
        return Err(AuthError::InvalidResponse(format!(
            "token already expired (expires_in {})",
            expires_in
        )));
    }

    let audience = response
        .resource
        .clone()
        .or_else(|| audience_from_claims(&response.access_token))
        .unwrap_or_else(|| requested_audience.to_owned());

    let issued_at = now_i64();
    let expires_at = issued_at
        .checked_add(expires_in)
        .ok_or_else(|| AuthError::InvalidResponse(format!("expires_in {} is out of range", expires_in)))?;
    Ok(Token::new(
        response.access_token,
        scope.to_owned(),
        audience,
        issued_at,
        expires_at,
    ))
}

/// Parse an error body into `(code, description)`, falling back to a short
/// excerpt of the raw body.
pub fn parse_error_response(body: &str) -> (String, String) {
    let parsed: TokenErrorResponse = serde_json::from_str(body).unwrap_or_default();
    let code = parsed.error.unwrap_or_else(|| "unknown_error".to_owned());
    let description = parsed
        .error_description
        .unwrap_or_else(|| body.trim().to_owned());
    (code, truncate(&description, DESCRIPTION_LIMIT))
}

fn audience_from_claims(access_token: &str) -> Option<String> {
    if !looks_like_jwt(access_token) {
        return None;
    }
    decode_claims(access_token)
        .ok()
        .and_then(|claims| claims.aud)
        .and_then(|aud| aud.first().map(str::to_owned))
}

pub fn truncate(value: &str, limit: usize) -> String {
    match value.char_indices().nth(limit) {
        Some((idx, _)) => format!("{}...", &value[..idx]),
        None => value.to_owned(),
    }
}
