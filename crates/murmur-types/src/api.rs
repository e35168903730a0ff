use serde::{Deserialize, Serialize};

use crate::models::UserId;

// -- Auth --

#[derive(Debug, Serialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterResponse {
    pub id: UserId,
    pub username: String,
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    pub user_id: UserId,
}

/// Error body returned by the REST API on non-2xx responses.
#[derive(Debug, Deserialize)]
pub struct ErrorDetail {
    pub detail: String,
}

// -- Session --

/// Who is logged in, as handed over by the auth collaborator.
///
/// `access_token` is opaque to the client and only ever embedded in the live
/// connection target.
#[derive(Clone)]
pub struct Identity {
    pub user_id: UserId,
    pub username: String,
    pub access_token: String,
}

impl Identity {
    pub fn new(user_id: UserId, username: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            user_id,
            username: username.into(),
            access_token: access_token.into(),
        }
    }
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity")
            .field("user_id", &self.user_id)
            .field("username", &self.username)
            .field("access_token", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_response_accepts_integer_user_id() {
        let body = r#"{"access_token":"abc","token_type":"bearer","user_id":7}"#;
        let resp: LoginResponse = serde_json::from_str(body).unwrap();
        assert_eq!(resp.user_id, UserId::from("7"));
        assert_eq!(resp.token_type.as_deref(), Some("bearer"));
    }

    #[test]
    fn identity_debug_hides_token() {
        let identity = Identity::new(UserId::from("1"), "alice", "super-secret-token");
        let rendered = format!("{:?}", identity);
        assert!(!rendered.contains("super-secret-token"));
        assert!(rendered.contains("alice"));
    }
}
