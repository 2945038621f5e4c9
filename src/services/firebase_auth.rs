// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firebase Authentication identity provider (Identity Toolkit REST API).
//!
//! Handles:
//! - Email/password sign-in and sign-up (with display name)
//! - Google sign-in via an ID token obtained from an interactive prompt
//! - Session persistence: the refresh token is saved locally and exchanged
//!   for a fresh ID token on the next start
//! - Profile lookup (photo URL, account creation time)

use crate::config::Config;
use crate::error::{AuthError, AuthResult};
use crate::models::Identity;
use crate::persistence::{keys, LocalPersistence};
use crate::services::identity::{IdentityBroadcaster, IdentityProvider, IdentitySubscription};
use crate::time_utils::format_millis_rfc3339;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use validator::Validate;

const IDENTITY_TOOLKIT_URL: &str = "https://identitytoolkit.googleapis.com/v1";
const SECURE_TOKEN_URL: &str = "https://securetoken.googleapis.com/v1";
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);
/// Redirect URI reported to signInWithIdp; unused for ID-token exchange.
const IDP_REQUEST_URI: &str = "http://localhost";

/// Source of Google credentials for the interactive sign-in flow.
///
/// Called on a blocking thread, so implementations may read from a terminal.
pub trait InteractivePrompt: Send + Sync + 'static {
    /// Ask the user for a Google ID token. `None` means the user cancelled.
    fn google_id_token(&self) -> Option<String>;
}

/// New-account form.
#[derive(Debug, Clone, Validate)]
pub struct SignUpRequest {
    pub name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 6))]
    pub password: String,
    pub confirm_password: String,
}

impl SignUpRequest {
    /// Validate the form the way the sign-up page does.
    pub fn check(&self) -> AuthResult<()> {
        if self.password != self.confirm_password {
            return Err(AuthError::PasswordMismatch);
        }

        self.validate().map_err(|errors| {
            if errors.field_errors().contains_key("password") {
                AuthError::WeakPassword
            } else {
                AuthError::InvalidRequest(errors.to_string())
            }
        })
    }
}

/// Saved session, stored under [`keys::AUTH_SESSION`].
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SavedSession {
    refresh_token: String,
    /// Last known profile, used when the provider cannot be reached
    identity: Identity,
}

/// Tokens and profile fields returned by a successful sign-in.
#[derive(Debug, Clone)]
struct TokenGrant {
    id_token: String,
    refresh_token: String,
    identity: Identity,
}

/// Firebase Authentication client acting as the identity provider.
pub struct FirebaseAuth<L> {
    http: reqwest::Client,
    api_key: String,
    identity_url: String,
    token_url: String,
    persistence: L,
    prompt: Option<Arc<dyn InteractivePrompt>>,
    events: IdentityBroadcaster,
}

impl<L: LocalPersistence> FirebaseAuth<L> {
    /// Create a provider. No identity is published until
    /// [`restore_session`](Self::restore_session) runs.
    ///
    /// Set FIREBASE_AUTH_EMULATOR_HOST to talk to the local emulator.
    pub fn new(config: &Config, persistence: L) -> AuthResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| AuthError::Unavailable(format!("failed building HTTP client: {e}")))?;

        let (identity_url, token_url) = match &config.auth_emulator_host {
            Some(host) => {
                tracing::info!(host = %host, "Using Firebase Auth emulator");
                (
                    format!("http://{host}/identitytoolkit.googleapis.com/v1"),
                    format!("http://{host}/securetoken.googleapis.com/v1"),
                )
            }
            None => (
                IDENTITY_TOOLKIT_URL.to_string(),
                SECURE_TOKEN_URL.to_string(),
            ),
        };

        Ok(Self {
            http,
            api_key: config.firebase_api_key.clone(),
            identity_url,
            token_url,
            persistence,
            prompt: None,
            events: IdentityBroadcaster::unresolved(),
        })
    }

    /// Create a provider and restore any saved session.
    pub async fn connect(config: &Config, persistence: L) -> AuthResult<Self> {
        let auth = Self::new(config, persistence)?;
        auth.restore_session().await;
        Ok(auth)
    }

    /// Attach the prompt used by [`IdentityProvider::sign_in_interactive`].
    pub fn with_prompt(mut self, prompt: Arc<dyn InteractivePrompt>) -> Self {
        self.prompt = Some(prompt);
        self
    }

    /// Currently signed-in user, if any.
    pub fn current_identity(&self) -> Option<Identity> {
        self.events.current()
    }

    /// Resolve the startup identity from the saved session and publish it.
    ///
    /// A rejected refresh token clears the saved session. If the provider is
    /// unreachable the last known profile is used, so cached data stays
    /// available offline.
    pub async fn restore_session(&self) {
        let Some(saved) = self.load_saved_session() else {
            self.events.publish(None);
            return;
        };

        match self.refresh(&saved.refresh_token).await {
            Ok(grant) => {
                let identity = self.complete_sign_in(grant).await;
                tracing::info!(uid = %identity.uid, "Restored saved session");
            }
            Err(e) if e.is_session_rejected() => {
                tracing::info!(error = %e, "Saved session rejected, signing out");
                if let Err(e) = self.persistence.remove(keys::AUTH_SESSION) {
                    tracing::warn!(error = %e, "Failed to clear saved session");
                }
                self.events.publish(None);
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    uid = %saved.identity.uid,
                    "Could not refresh saved session, continuing with cached profile"
                );
                self.events.publish(Some(saved.identity));
            }
        }
    }

    /// Create an account and sign it in.
    pub async fn sign_up(&self, request: &SignUpRequest) -> AuthResult<()> {
        request.check()?;

        let body = serde_json::json!({
            "email": request.email,
            "password": request.password,
            "returnSecureToken": true,
        });
        let created: SignInResponse = self.post(&self.endpoint("accounts:signUp"), &body).await?;
        let mut grant = TokenGrant::from(created);

        let name = request.name.trim();
        if !name.is_empty() {
            let body = serde_json::json!({
                "idToken": grant.id_token,
                "displayName": name,
                "returnSecureToken": true,
            });
            let updated: UpdateResponse =
                self.post(&self.endpoint("accounts:update"), &body).await?;

            grant.identity.display_name = updated.display_name.or(Some(name.to_string()));
            if let Some(id_token) = updated.id_token {
                grant.id_token = id_token;
            }
            if let Some(refresh_token) = updated.refresh_token {
                grant.refresh_token = refresh_token;
            }
        }

        let identity = self.complete_sign_in(grant).await;
        tracing::info!(uid = %identity.uid, "Account created");
        Ok(())
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/{}", self.identity_url, method)
    }

    fn load_saved_session(&self) -> Option<SavedSession> {
        let raw = self.persistence.get(keys::AUTH_SESSION)?;
        match serde_json::from_str(&raw) {
            Ok(saved) => Some(saved),
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring unreadable saved session");
                None
            }
        }
    }

    /// Exchange a refresh token for a fresh ID token.
    async fn refresh(&self, refresh_token: &str) -> AuthResult<TokenGrant> {
        let response = self
            .http
            .post(format!("{}/token", self.token_url))
            .query(&[("key", self.api_key.as_str())])
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ])
            .send()
            .await
            .map_err(|e| AuthError::Unavailable(format!("token refresh failed: {e}")))?;

        let refreshed: RefreshResponse = check_response(response).await?;
        Ok(TokenGrant {
            id_token: refreshed.id_token,
            refresh_token: refreshed.refresh_token,
            identity: Identity::new(refreshed.user_id),
        })
    }

    /// Fetch the full profile for an ID token.
    async fn lookup(&self, id_token: &str) -> AuthResult<Identity> {
        let body = serde_json::json!({ "idToken": id_token });
        let response: LookupResponse = self.post(&self.endpoint("accounts:lookup"), &body).await?;

        response
            .users
            .into_iter()
            .next()
            .map(LookupUser::into_identity)
            .ok_or(AuthError::SessionExpired)
    }

    /// Fill in the profile, save the session, and publish the identity.
    async fn complete_sign_in(&self, grant: TokenGrant) -> Identity {
        let identity = match self.lookup(&grant.id_token).await {
            Ok(profile) => merge_profile(profile, grant.identity),
            Err(e) => {
                tracing::warn!(error = %e, uid = %grant.identity.uid, "Profile lookup failed");
                grant.identity
            }
        };

        let saved = SavedSession {
            refresh_token: grant.refresh_token,
            identity: identity.clone(),
        };
        let stored = serde_json::to_string(&saved)
            .map_err(crate::error::PersistenceError::from)
            .and_then(|json| self.persistence.set(keys::AUTH_SESSION, &json));
        if let Err(e) = stored {
            tracing::warn!(error = %e, "Failed to save session; next start will be signed out");
        }

        self.events.publish(Some(identity.clone()));
        identity
    }

    async fn post<B: Serialize, T: DeserializeOwned>(&self, url: &str, body: &B) -> AuthResult<T> {
        let response = self
            .http
            .post(url)
            .query(&[("key", self.api_key.as_str())])
            .json(body)
            .send()
            .await
            .map_err(|e| AuthError::Unavailable(e.to_string()))?;

        check_response(response).await
    }
}

impl<L: LocalPersistence> IdentityProvider for FirebaseAuth<L> {
    fn subscribe(&self) -> IdentitySubscription {
        self.events.subscribe()
    }

    async fn sign_in_interactive(&self) -> AuthResult<()> {
        let prompt = self.prompt.clone().ok_or_else(|| {
            AuthError::Unavailable("no interactive sign-in flow configured".to_string())
        })?;

        let id_token = tokio::task::spawn_blocking(move || prompt.google_id_token())
            .await
            .map_err(|e| AuthError::Provider(format!("interactive prompt failed: {e}")))?
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty())
            .ok_or(AuthError::Cancelled)?;

        let body = serde_json::json!({
            "postBody": format!("id_token={}&providerId=google.com", urlencoding::encode(&id_token)),
            "requestUri": IDP_REQUEST_URI,
            "returnIdpCredential": true,
            "returnSecureToken": true,
        });
        let response: SignInResponse = self
            .post(&self.endpoint("accounts:signInWithIdp"), &body)
            .await?;

        let identity = self.complete_sign_in(response.into()).await;
        tracing::info!(uid = %identity.uid, "Signed in with Google");
        Ok(())
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> AuthResult<()> {
        let body = serde_json::json!({
            "email": email,
            "password": password,
            "returnSecureToken": true,
        });
        let response: SignInResponse = self
            .post(&self.endpoint("accounts:signInWithPassword"), &body)
            .await?;

        let identity = self.complete_sign_in(response.into()).await;
        tracing::info!(uid = %identity.uid, "Signed in with email");
        Ok(())
    }

    async fn sign_out(&self) -> AuthResult<()> {
        self.persistence
            .remove(keys::AUTH_SESSION)
            .map_err(|e| AuthError::Provider(format!("failed to clear saved session: {e}")))?;

        self.events.publish(None);
        tracing::info!("Signed out");
        Ok(())
    }
}

/// Prefer looked-up profile fields, falling back to the sign-in response.
fn merge_profile(profile: Identity, fallback: Identity) -> Identity {
    Identity {
        uid: profile.uid,
        display_name: profile.display_name.or(fallback.display_name),
        email: profile.email.or(fallback.email),
        photo_url: profile.photo_url.or(fallback.photo_url),
        created_at: profile.created_at.or(fallback.created_at),
    }
}

/// Check response status and parse JSON body, mapping provider error codes.
async fn check_response<T: DeserializeOwned>(response: reqwest::Response) -> AuthResult<T> {
    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        return Err(match serde_json::from_str::<ErrorResponse>(&body) {
            Ok(parsed) => map_provider_error(&parsed.error.message),
            Err(_) if status.is_server_error() => {
                AuthError::Unavailable(format!("HTTP {}", status))
            }
            Err(_) => AuthError::Provider(format!("HTTP {}: {}", status, body)),
        });
    }

    response
        .json()
        .await
        .map_err(|e| AuthError::Provider(format!("JSON parse error: {}", e)))
}

/// Map an Identity Toolkit error message (e.g. `"WEAK_PASSWORD : ..."`).
fn map_provider_error(message: &str) -> AuthError {
    let code = message
        .split([' ', ':'])
        .next()
        .unwrap_or_default();

    match code {
        "EMAIL_EXISTS" => AuthError::EmailInUse,
        "WEAK_PASSWORD" => AuthError::WeakPassword,
        "INVALID_LOGIN_CREDENTIALS" | "INVALID_PASSWORD" | "EMAIL_NOT_FOUND" => {
            AuthError::InvalidCredentials
        }
        "INVALID_EMAIL" | "MISSING_PASSWORD" | "MISSING_EMAIL" => {
            AuthError::InvalidRequest(code.to_string())
        }
        "TOKEN_EXPIRED" | "INVALID_REFRESH_TOKEN" | "INVALID_ID_TOKEN" | "USER_DISABLED"
        | "USER_NOT_FOUND" => AuthError::SessionExpired,
        _ => AuthError::Provider(message.to_string()),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignInResponse {
    local_id: String,
    id_token: String,
    refresh_token: String,
    email: Option<String>,
    display_name: Option<String>,
    photo_url: Option<String>,
}

impl From<SignInResponse> for TokenGrant {
    fn from(response: SignInResponse) -> Self {
        Self {
            id_token: response.id_token,
            refresh_token: response.refresh_token,
            identity: Identity {
                uid: response.local_id,
                display_name: response.display_name.filter(|n| !n.is_empty()),
                email: response.email,
                photo_url: response.photo_url,
                created_at: None,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateResponse {
    display_name: Option<String>,
    id_token: Option<String>,
    refresh_token: Option<String>,
}

/// Secure-token endpoint response (snake_case, unlike the rest).
#[derive(Debug, Deserialize)]
struct RefreshResponse {
    id_token: String,
    refresh_token: String,
    user_id: String,
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<LookupUser>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupUser {
    local_id: String,
    email: Option<String>,
    display_name: Option<String>,
    photo_url: Option<String>,
    /// Epoch millis as a decimal string
    created_at: Option<String>,
}

impl LookupUser {
    fn into_identity(self) -> Identity {
        Identity {
            uid: self.local_id,
            display_name: self.display_name.filter(|n| !n.is_empty()),
            email: self.email,
            photo_url: self.photo_url,
            created_at: self
                .created_at
                .and_then(|ms| ms.parse::<i64>().ok())
                .and_then(format_millis_rfc3339),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryPersistence;

    fn sign_up(password: &str, confirm: &str, email: &str) -> SignUpRequest {
        SignUpRequest {
            name: "Asha".to_string(),
            email: email.to_string(),
            password: password.to_string(),
            confirm_password: confirm.to_string(),
        }
    }

    #[test]
    fn test_sign_up_validation() {
        assert!(sign_up("secret1", "secret1", "asha@example.com").check().is_ok());
        assert!(matches!(
            sign_up("secret1", "secret2", "asha@example.com").check(),
            Err(AuthError::PasswordMismatch)
        ));
        assert!(matches!(
            sign_up("abc", "abc", "asha@example.com").check(),
            Err(AuthError::WeakPassword)
        ));
        assert!(matches!(
            sign_up("secret1", "secret1", "not-an-email").check(),
            Err(AuthError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_map_provider_error() {
        assert!(matches!(map_provider_error("EMAIL_EXISTS"), AuthError::EmailInUse));
        assert!(matches!(
            map_provider_error("WEAK_PASSWORD : Password should be at least 6 characters"),
            AuthError::WeakPassword
        ));
        assert!(matches!(
            map_provider_error("INVALID_LOGIN_CREDENTIALS"),
            AuthError::InvalidCredentials
        ));
        assert!(matches!(
            map_provider_error("TOKEN_EXPIRED"),
            AuthError::SessionExpired
        ));
        assert!(matches!(
            map_provider_error("QUOTA_EXCEEDED"),
            AuthError::Provider(_)
        ));
    }

    #[test]
    fn test_lookup_user_into_identity() {
        let user: LookupUser = serde_json::from_value(serde_json::json!({
            "localId": "uid-7",
            "email": "asha@example.com",
            "displayName": "",
            "photoUrl": "https://example.com/p.png",
            "createdAt": "1700000000000"
        }))
        .unwrap();

        let identity = user.into_identity();
        assert_eq!(identity.uid, "uid-7");
        assert_eq!(identity.display_name, None);
        assert_eq!(identity.created_at.as_deref(), Some("2023-11-14T22:13:20Z"));
    }

    #[test]
    fn test_emulator_endpoints() {
        let mut config = Config::test_default();
        config.auth_emulator_host = Some("localhost:9099".to_string());

        let auth = FirebaseAuth::new(&config, MemoryPersistence::new()).unwrap();
        assert_eq!(
            auth.endpoint("accounts:lookup"),
            "http://localhost:9099/identitytoolkit.googleapis.com/v1/accounts:lookup"
        );
        assert_eq!(
            auth.token_url,
            "http://localhost:9099/securetoken.googleapis.com/v1"
        );
    }

    #[tokio::test]
    async fn test_restore_without_saved_session_publishes_signed_out() {
        let auth = FirebaseAuth::new(&Config::test_default(), MemoryPersistence::new()).unwrap();
        let mut sub = auth.subscribe();

        auth.restore_session().await;

        assert_eq!(sub.recv().await, Some(None));
        assert!(auth.current_identity().is_none());
    }

    #[tokio::test]
    async fn test_sign_out_clears_saved_session() {
        let persistence = Arc::new(MemoryPersistence::new());
        persistence.set(keys::AUTH_SESSION, "{}").unwrap();

        let auth = FirebaseAuth::new(&Config::test_default(), persistence.clone()).unwrap();
        auth.sign_out().await.unwrap();

        assert!(persistence.get(keys::AUTH_SESSION).is_none());
    }

    #[tokio::test]
    async fn test_interactive_sign_in_cancelled() {
        struct Cancel;
        impl InteractivePrompt for Cancel {
            fn google_id_token(&self) -> Option<String> {
                Some("   ".to_string())
            }
        }

        let auth = FirebaseAuth::new(&Config::test_default(), MemoryPersistence::new())
            .unwrap()
            .with_prompt(Arc::new(Cancel));

        assert!(matches!(
            auth.sign_in_interactive().await,
            Err(AuthError::Cancelled)
        ));
    }
}
