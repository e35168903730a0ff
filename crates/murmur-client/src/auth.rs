use murmur_types::api::{ErrorDetail, Identity, LoginRequest, LoginResponse, RegisterRequest, RegisterResponse};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::info;
use url::Url;

use crate::config::endpoint;
use crate::error::AuthError;

/// Client for the credential endpoints. The session engine only ever sees
/// the [`Identity`] this produces.
#[derive(Debug, Clone)]
pub struct AuthClient {
    client: reqwest::Client,
    api_base: Url,
}

impl AuthClient {
    pub fn new(api_base: Url) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base,
        }
    }

    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<RegisterResponse, AuthError> {
        let req = RegisterRequest {
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        };
        let resp: RegisterResponse = self.post(&["api", "register"], &req).await?;
        info!("Registered {} ({})", resp.username, resp.id);
        Ok(resp)
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<Identity, AuthError> {
        let req = LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        };
        let resp: LoginResponse = self.post(&["api", "login"], &req).await?;
        info!("Logged in as {} ({})", username, resp.user_id);
        Ok(Identity::new(resp.user_id, username, resp.access_token))
    }

    async fn post<B, R>(&self, segments: &[&str], body: &B) -> Result<R, AuthError>
    where
        B: Serialize,
        R: DeserializeOwned,
    {
        let url = endpoint(&self.api_base, segments)?;
        let response = self.client.post(url).json(body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorDetail>(&text)
                .map(|e| e.detail)
                .unwrap_or_else(|_| {
                    status
                        .canonical_reason()
                        .unwrap_or("request failed")
                        .to_string()
                });
            return Err(AuthError::Rejected {
                status: status.as_u16(),
                detail,
            });
        }

        Ok(response.json().await?)
    }
}
