//! Session and auth flow
//!
//! The authorization service is reached by redirect; on return a one-time
//! exchange token appears in the navigation fragment. The token is
//! exchanged for a durable session credential, which is the only piece
//! persisted — the profile is re-fetched on load. Logout best-effort
//! notifies the server and then clears local state unconditionally.

use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::result::UserProfile;
use crate::store::StateStore;
use crate::SESSION_HEADER;

/// Persisted-state key for the durable credential.
pub const SESSION_KEY: &str = "phool-session";

/// Token exchange endpoint path.
pub const AUTH_EXCHANGE_PATH: &str = "/api/auth/profile";

/// Profile fetch endpoint path.
pub const PROFILE_PATH: &str = "/api/user/profile";

/// Logout endpoint path.
pub const LOGOUT_PATH: &str = "/api/logout";

/// How often the login popup is polled for closure.
pub const POPUP_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Fallback timeout after which an abandoned login popup is given up on.
pub const POPUP_WATCH_TIMEOUT: Duration = Duration::from_secs(120);

/// Auth failures.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("token exchange failed: {0}")]
    ExchangeFailed(String),
    #[error("auth network error: {0}")]
    NetworkError(String),
}

/// An authenticated session. The profile may be absent while a re-fetch
/// is outstanding or has failed; the credential alone keeps the user
/// signed in.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub credential: String,
    pub profile: Option<UserProfile>,
}

/// HTTP client for the auth endpoints.
pub struct AuthClient {
    base_url: String,
    http: reqwest::Client,
}

#[derive(Deserialize)]
struct ExchangeResponse {
    user: UserProfile,
    session_token: String,
}

impl AuthClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            http: reqwest::Client::builder()
                .connect_timeout(Duration::from_secs(10))
                .timeout(Duration::from_secs(30))
                .build()
                .expect("failed to build HTTP client"),
        }
    }

    /// Exchange the one-time redirect token for a profile and a durable
    /// credential.
    pub async fn exchange_token(&self, token: &str) -> Result<(UserProfile, String), AuthError> {
        let url = format!("{}{}", self.base_url, AUTH_EXCHANGE_PATH);
        let response = self
            .http
            .post(&url)
            .json(&serde_json::json!({ "session_id": token }))
            .send()
            .await
            .map_err(|e| AuthError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::ExchangeFailed(format!(
                "exchange returned {status}"
            )));
        }

        let body: ExchangeResponse = response
            .json()
            .await
            .map_err(|e| AuthError::ExchangeFailed(e.to_string()))?;
        Ok((body.user, body.session_token))
    }

    /// Fetch the profile for a persisted credential.
    pub async fn fetch_profile(&self, credential: &str) -> Result<UserProfile, AuthError> {
        let url = format!("{}{}", self.base_url, PROFILE_PATH);
        let response = self
            .http
            .get(&url)
            .header(SESSION_HEADER, credential)
            .send()
            .await
            .map_err(|e| AuthError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::NetworkError(format!(
                "profile fetch returned {status}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AuthError::NetworkError(e.to_string()))
    }

    /// Notify the server of a logout. The response is ignored.
    pub async fn logout(&self, credential: &str) -> Result<(), AuthError> {
        let url = format!("{}{}", self.base_url, LOGOUT_PATH);
        self.http
            .post(&url)
            .header(SESSION_HEADER, credential)
            .send()
            .await
            .map_err(|e| AuthError::NetworkError(e.to_string()))?;
        Ok(())
    }
}

/// Holds the live session and its persisted credential.
pub struct SessionManager {
    client: AuthClient,
    store: Arc<dyn StateStore>,
    session: RwLock<Option<Session>>,
}

impl SessionManager {
    pub fn new(client: AuthClient, store: Arc<dyn StateStore>) -> Self {
        Self {
            client,
            store,
            session: RwLock::new(None),
        }
    }

    /// Current session snapshot.
    pub async fn current(&self) -> Option<Session> {
        self.session.read().await.clone()
    }

    /// Current credential, if signed in.
    pub async fn credential(&self) -> Option<String> {
        self.session
            .read()
            .await
            .as_ref()
            .map(|s| s.credential.clone())
    }

    /// Restore a persisted credential and re-fetch the profile. A failed
    /// re-fetch keeps the credential — only logout clears it.
    pub async fn restore(&self) -> Result<Option<Session>, AuthError> {
        let credential = match self.store.get(SESSION_KEY).await {
            Ok(Some(c)) if !c.is_empty() => c,
            Ok(_) => return Ok(None),
            Err(e) => {
                warn!(error = %e, "failed to read persisted credential");
                return Ok(None);
            }
        };

        *self.session.write().await = Some(Session {
            credential: credential.clone(),
            profile: None,
        });

        match self.client.fetch_profile(&credential).await {
            Ok(profile) => {
                info!(user = %profile.name, "session restored");
                let session = Session {
                    credential,
                    profile: Some(profile),
                };
                *self.session.write().await = Some(session.clone());
                Ok(Some(session))
            }
            Err(e) => {
                warn!(error = %e, "profile re-fetch failed, keeping credential");
                Err(e)
            }
        }
    }

    /// Complete a login with the one-time exchange token from the
    /// redirect fragment. Persists the credential only.
    pub async fn complete_login(&self, token: &str) -> Result<Session, AuthError> {
        let (profile, credential) = self.client.exchange_token(token).await?;
        if let Err(e) = self.store.put(SESSION_KEY, &credential).await {
            warn!(error = %e, "failed to persist credential");
        }
        info!(user = %profile.name, "login complete");
        let session = Session {
            credential,
            profile: Some(profile),
        };
        *self.session.write().await = Some(session.clone());
        Ok(session)
    }

    /// Best-effort server notification, then unconditional local clear.
    /// This must never fail to clear local state.
    pub async fn logout(&self) {
        if let Some(credential) = self.credential().await {
            if let Err(e) = self.client.logout(&credential).await {
                warn!(error = %e, "logout notification failed, clearing local session anyway");
            }
        }
        if let Err(e) = self.store.remove(SESSION_KEY).await {
            warn!(error = %e, "failed to remove persisted credential");
        }
        *self.session.write().await = None;
        info!("session cleared");
    }
}

/// Find a `session_id=` token in a navigation fragment. Returns the token
/// and the fragment with the token pair stripped, or `None` when the
/// fragment carries no token.
pub fn extract_session_token(fragment: &str) -> Option<(String, String)> {
    let hashed = fragment.starts_with('#');
    let inner = fragment.strip_prefix('#').unwrap_or(fragment);

    let mut token = None;
    let mut remainder = Vec::new();
    for pair in inner.split('&').filter(|p| !p.is_empty()) {
        match pair.strip_prefix("session_id=") {
            Some(value) if !value.is_empty() && token.is_none() => {
                token = Some(value.to_string());
            }
            _ => remainder.push(pair),
        }
    }

    let token = token?;
    let stripped = if remainder.is_empty() {
        String::new()
    } else if hashed {
        format!("#{}", remainder.join("&"))
    } else {
        remainder.join("&")
    };
    Some((token, stripped))
}

/// Outcome of watching the login popup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PopupOutcome {
    Closed,
    TimedOut,
}

/// Poll `is_closed` at a fixed interval until it reports true or the
/// fallback timeout elapses. Dropping the future releases the timers on
/// either path — there is nothing to clean up.
pub async fn watch_popup<F>(mut is_closed: F, poll: Duration, limit: Duration) -> PopupOutcome
where
    F: FnMut() -> bool + Send,
{
    let deadline = tokio::time::Instant::now() + limit;
    loop {
        if is_closed() {
            debug!("login popup closed");
            return PopupOutcome::Closed;
        }
        if tokio::time::Instant::now() >= deadline {
            warn!("login popup watch timed out");
            return PopupOutcome::TimedOut;
        }
        tokio::time::sleep(poll).await;
    }
}
