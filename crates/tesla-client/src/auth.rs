//! Owner API credentials and access tokens

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Tokens this close to expiry are refreshed before the next request
fn refresh_window() -> Duration {
    Duration::minutes(30)
}

/// Account credentials used for the password grant
#[derive(Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            email: email.into(),
            password: password.into(),
        }
    }

    pub(crate) fn password_grant(&self) -> TokenRequest<'_> {
        TokenRequest {
            grant_type: "password",
            client_id: &self.client_id,
            client_secret: &self.client_secret,
            email: &self.email,
            password: &self.password,
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

/// Body of `POST /oauth/token`
#[derive(Serialize)]
pub(crate) struct TokenRequest<'a> {
    pub grant_type: &'a str,
    pub client_id: &'a str,
    pub client_secret: &'a str,
    pub email: &'a str,
    pub password: &'a str,
}

/// Token response from `POST /oauth/token`
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: i64,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Bearer token for the REST API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub access_token: String,
    pub token_type: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
}

impl Token {
    pub(crate) fn issued(response: TokenResponse, now: DateTime<Utc>) -> Self {
        Self {
            access_token: response.access_token,
            token_type: response.token_type,
            refresh_token: response.refresh_token,
            expires_at: now + Duration::seconds(response.expires_in),
        }
    }

    /// Whether the token expires within the refresh window
    pub fn expires_soon(&self) -> bool {
        self.expires_soon_at(Utc::now())
    }

    fn expires_soon_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at - now < refresh_window()
    }
}
