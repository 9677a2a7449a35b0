use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use uuid::Uuid;

/// The authenticated caller of a gated endpoint, inserted into request
/// extensions by `require_session` and read by the handlers.
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub struct SessionIdentity {
    pub account_id: Uuid,
}

// Hash a session token using SHA256 with a "storyforge-" prefix so that
// raw tokens never appear in config files or memory dumps of the registry.
fn hash_session_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"storyforge-");
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

// Common error response helper
fn auth_error_response(status: StatusCode, message: &str) -> Response {
    let body = serde_json::json!({
        "error": "Unauthorized",
        "message": message,
    });
    (status, axum::Json(body)).into_response()
}

/// Registry of valid session credentials, keyed by hashed token.
#[derive(Clone)]
pub struct Auth {
    sessions: Arc<RwLock<HashMap<String, SessionIdentity>>>,
}

impl Auth {
    pub fn new(sessions: HashMap<String, SessionIdentity>) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(sessions)),
        }
    }

    pub fn update_session(&self, token: &str, identity: SessionIdentity) {
        // In practice, a poisoned RwLock indicates a panic in another thread while holding the lock.
        // This is a catastrophic failure that should not be recovered from.
        #[expect(clippy::expect_used)]
        let mut sessions = self.sessions.write().expect("RwLock poisoned");
        sessions.insert(hash_session_token(token), identity);
    }

    pub fn revoke_session(&self, token: &str) {
        #[expect(clippy::expect_used)]
        let mut sessions = self.sessions.write().expect("RwLock poisoned");
        sessions.remove(&hash_session_token(token));
    }

    pub fn validate_session(&self, token: &str) -> Result<SessionIdentity, StatusCode> {
        // Hash the token before lookup (consistent with storage)
        let hashed_token = hash_session_token(token);

        #[expect(clippy::expect_used)]
        let sessions = self.sessions.read().expect("RwLock poisoned");
        if let Some(identity) = sessions.get(&hashed_token) {
            return Ok(*identity);
        }
        Err(StatusCode::UNAUTHORIZED)
    }
}

/// Middleware that rejects requests without a valid bearer session
/// credential before they reach any gated handler. On success the resolved
/// `SessionIdentity` is attached to the request extensions.
pub async fn require_session(
    State(auth): State<Auth>,
    mut request: Request,
    next: Next,
) -> Result<Response, Response> {
    let token = request
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim())
        .map(|s| s.strip_prefix("Bearer ").unwrap_or(s).to_string());

    let token = match token {
        Some(token) => token,
        None => {
            return Err(auth_error_response(
                StatusCode::UNAUTHORIZED,
                "Missing authorization header",
            ))
        }
    };

    let identity = match auth.validate_session(&token) {
        Ok(identity) => identity,
        Err(_) => {
            return Err(auth_error_response(
                StatusCode::UNAUTHORIZED,
                "Invalid session credential",
            ))
        }
    };

    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_session_accepts_registered_token() {
        let auth = Auth::new(HashMap::new());
        let account_id = Uuid::now_v7();
        auth.update_session("sf_session_abc", SessionIdentity { account_id });

        let identity = match auth.validate_session("sf_session_abc") {
            Ok(identity) => identity,
            Err(status) => {
                assert_eq!(status, StatusCode::OK, "expected the session to validate");
                return;
            }
        };
        assert_eq!(identity.account_id, account_id);
    }

    #[test]
    fn test_validate_session_rejects_unknown_token() {
        let auth = Auth::new(HashMap::new());
        assert!(auth.validate_session("sf_session_missing").is_err());
    }

    #[test]
    fn test_revoked_session_no_longer_validates() {
        let auth = Auth::new(HashMap::new());
        let account_id = Uuid::now_v7();
        auth.update_session("sf_session_abc", SessionIdentity { account_id });
        auth.revoke_session("sf_session_abc");

        assert!(auth.validate_session("sf_session_abc").is_err());
    }

    #[test]
    fn test_registry_stores_hashed_tokens_only() {
        let hashed = hash_session_token("sf_session_abc");
        assert_ne!(hashed, "sf_session_abc");
        // Hashing is deterministic, so lookups keep working
        assert_eq!(hashed, hash_session_token("sf_session_abc"));
    }
}
