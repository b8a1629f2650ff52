//! Bearer authentication
//!
//! A bearer is either the shared cron secret (the scheduler or another
//! trusted service) or a user's API token. The resolved [`Caller`] is put in
//! the request extensions for handlers to check.

use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use secrecy::ExposeSecret;
use sha2::{Digest, Sha256};
use std::sync::Arc;

use crate::error::ApiError;
use crate::AppState;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Caller {
    /// Presented the cron secret
    Service,
    /// Presented an API token belonging to this user
    User(String),
}

impl Caller {
    pub fn user_id(&self) -> Option<&str> {
        match self {
            Caller::User(id) => Some(id),
            Caller::Service => None,
        }
    }
}

fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Compare digests so the comparison time does not depend on the secret
fn secrets_match(presented: &str, expected: &str) -> bool {
    Sha256::digest(presented.as_bytes()) == Sha256::digest(expected.as_bytes())
}

async fn identify(state: &AppState, token: &str) -> Result<Option<Caller>, ApiError> {
    if let Some(secret) = &state.cron_secret {
        if secrets_match(token, secret.expose_secret()) {
            return Ok(Some(Caller::Service));
        }
    }

    let user = state.publisher.db().user_for_token(token).await?;
    Ok(user.map(Caller::User))
}

/// Reject requests without a recognised bearer with 401
pub async fn authenticate(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Response {
    // Body is not Sync: no borrow of the request may live across the await
    let Some(token) = bearer(req.headers()).map(str::to_owned) else {
        return ApiError::unauthorized().into_response();
    };

    match identify(&state, &token).await {
        Ok(Some(caller)) => {
            req.extensions_mut().insert(caller);
            next.run(req).await
        }
        Ok(None) => ApiError::unauthorized().into_response(),
        Err(e) => e.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_bearer_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        assert_eq!(bearer(&headers), Some("abc"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer   "));
        assert_eq!(bearer(&headers), None);
    }

    #[test]
    fn test_secrets_match() {
        assert!(secrets_match("s3cret", "s3cret"));
        assert!(!secrets_match("s3cret", "s3cret2"));
    }
}
