// SPDX-License-Identifier: MIT
// Copyright 2026 Kyros Praxis

//! OAuth 2.0 federation: provider registry, authorization-code exchange,
//! profile normalisation, and the single-use state store.

use crate::cache::{keys, KvCache};
use crate::config::Config;
use crate::error::{AppError, Result};
use dashmap::DashMap;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// How long an authorization-code flow may stay in flight.
const STATE_TTL: Duration = Duration::from_secs(10 * 60);

/// Normalised profile returned from a provider after code exchange.
#[derive(Debug, Clone)]
pub struct OAuthProfile {
    pub provider_id: String,
    pub provider: String,
    pub email: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub access_token: String,
    pub refresh_token: Option<String>,
}

/// The providers the gateway understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Google,
    GitHub,
}

/// A configured OAuth provider.
#[derive(Debug, Clone)]
pub struct OAuthProvider {
    pub kind: ProviderKind,
    pub client_id: String,
    client_secret: String,
    pub redirect_url: String,
    pub scopes: String,
    pub auth_url: String,
    token_url: String,
    api_base: String,
}

impl OAuthProvider {
    fn google(client_id: String, client_secret: String, redirect_url: String) -> Self {
        Self {
            kind: ProviderKind::Google,
            client_id,
            client_secret,
            redirect_url,
            scopes: "openid email profile".to_string(),
            auth_url: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            api_base: "https://www.googleapis.com".to_string(),
        }
    }

    fn github(client_id: String, client_secret: String, redirect_url: String) -> Self {
        Self {
            kind: ProviderKind::GitHub,
            client_id,
            client_secret,
            redirect_url,
            scopes: "user:email read:user".to_string(),
            auth_url: "https://github.com/login/oauth/authorize".to_string(),
            token_url: "https://github.com/login/oauth/access_token".to_string(),
            api_base: "https://api.github.com".to_string(),
        }
    }
}

/// Registry of configured providers plus the HTTP client used against them.
pub struct OAuthManager {
    providers: HashMap<String, OAuthProvider>,
    http: reqwest::Client,
}

impl OAuthManager {
    /// Register the providers whose credentials are configured.
    pub fn from_config(config: &Config) -> Self {
        let mut providers = HashMap::new();

        if !config.google_client_id.is_empty() && !config.google_client_secret.is_empty() {
            providers.insert(
                "google".to_string(),
                OAuthProvider::google(
                    config.google_client_id.clone(),
                    config.google_client_secret.clone(),
                    config.google_redirect_url.clone(),
                ),
            );
        }

        if !config.github_client_id.is_empty() && !config.github_client_secret.is_empty() {
            providers.insert(
                "github".to_string(),
                OAuthProvider::github(
                    config.github_client_id.clone(),
                    config.github_client_secret.clone(),
                    config.github_redirect_url.clone(),
                ),
            );
        }

        Self {
            providers,
            http: reqwest::Client::new(),
        }
    }

    /// Names of all configured providers.
    pub fn list_providers(&self) -> Vec<String> {
        let mut names: Vec<String> = self.providers.keys().cloned().collect();
        names.sort();
        names
    }

    /// Secret-free snapshot of each provider's configuration.
    pub fn provider_snapshot(&self) -> Vec<serde_json::Value> {
        self.list_providers()
            .into_iter()
            .filter_map(|name| {
                self.providers.get(&name).map(|p| {
                    serde_json::json!({
                        "name": name,
                        "client_id": p.client_id,
                        "redirect_url": p.redirect_url,
                        "scopes": p.scopes,
                    })
                })
            })
            .collect()
    }

    fn get(&self, name: &str) -> Result<&OAuthProvider> {
        self.providers
            .get(name)
            .ok_or_else(|| AppError::InvalidProvider(name.to_string()))
    }

    /// Build the provider's authorization-code URL with the state echoed.
    pub fn authorization_url(&self, name: &str, state: &str) -> Result<String> {
        let p = self.get(name)?;
        let mut url = format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&state={}",
            p.auth_url,
            urlencoding::encode(&p.client_id),
            urlencoding::encode(&p.redirect_url),
            urlencoding::encode(&p.scopes),
            urlencoding::encode(state),
        );
        if p.kind == ProviderKind::Google {
            url.push_str("&access_type=offline");
        }
        Ok(url)
    }

    /// Exchange an authorization code for tokens and fetch the normalised
    /// profile.
    pub async fn exchange(&self, name: &str, code: &str) -> Result<OAuthProfile> {
        let p = self.get(name)?;

        let token: TokenExchangeResponse = self
            .http
            .post(&p.token_url)
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&[
                ("client_id", p.client_id.as_str()),
                ("client_secret", p.client_secret.as_str()),
                ("code", code),
                ("redirect_uri", p.redirect_url.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .map_err(|e| AppError::OAuthFailed(format!("token exchange request failed: {e}")))?
            .json()
            .await
            .map_err(|e| AppError::OAuthFailed(format!("token exchange response invalid: {e}")))?;

        let access_token = token
            .access_token
            .ok_or_else(|| AppError::OAuthFailed("provider returned no access token".into()))?;

        match p.kind {
            ProviderKind::Google => {
                self.fetch_google_profile(p, &access_token, token.refresh_token)
                    .await
            }
            ProviderKind::GitHub => {
                self.fetch_github_profile(p, &access_token, token.refresh_token)
                    .await
            }
        }
    }

    async fn fetch_google_profile(
        &self,
        p: &OAuthProvider,
        access_token: &str,
        refresh_token: Option<String>,
    ) -> Result<OAuthProfile> {
        let info: GoogleUserInfo = self
            .get_json(&format!("{}/oauth2/v2/userinfo", p.api_base), access_token)
            .await?;

        Ok(OAuthProfile {
            provider_id: info.id,
            provider: "google".to_string(),
            email: info.email,
            display_name: info.name,
            avatar_url: info.picture,
            access_token: access_token.to_string(),
            refresh_token,
        })
    }

    async fn fetch_github_profile(
        &self,
        p: &OAuthProvider,
        access_token: &str,
        refresh_token: Option<String>,
    ) -> Result<OAuthProfile> {
        let info: GitHubUser = self
            .get_json(&format!("{}/user", p.api_base), access_token)
            .await?;

        // The email on /user is often absent; resolve via /user/emails and
        // require a primary, verified address.
        let emails: Vec<GitHubEmail> = self
            .get_json(&format!("{}/user/emails", p.api_base), access_token)
            .await?;
        let email = emails
            .into_iter()
            .find(|e| e.primary && e.verified)
            .map(|e| e.email)
            .ok_or_else(|| AppError::OAuthFailed("no_verified_email".to_string()))?;

        let display_name = match info.name {
            Some(name) if !name.is_empty() => name,
            _ => info.login,
        };

        Ok(OAuthProfile {
            provider_id: info.id.to_string(),
            provider: "github".to_string(),
            email,
            display_name,
            avatar_url: info.avatar_url,
            access_token: access_token.to_string(),
            refresh_token,
        })
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        url: &str,
        access_token: &str,
    ) -> Result<T> {
        let response = self
            .http
            .get(url)
            .bearer_auth(access_token)
            .header(reqwest::header::USER_AGENT, "kyros-gateway")
            .send()
            .await
            .map_err(|e| AppError::OAuthFailed(format!("profile request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(AppError::OAuthFailed(format!(
                "profile request returned HTTP {status}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::OAuthFailed(format!("profile response invalid: {e}")))
    }
}

#[derive(Debug, Deserialize)]
struct TokenExchangeResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleUserInfo {
    id: String,
    email: String,
    name: String,
    picture: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GitHubUser {
    id: i64,
    login: String,
    name: Option<String>,
    avatar_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GitHubEmail {
    email: String,
    primary: bool,
    verified: bool,
}

// ---- State store ----

/// Single-use correlation tokens tying an OAuth start to its callback.
///
/// Redis-backed when available so multi-instance deployments correlate
/// across processes; the in-process fallback is single-instance only.
pub struct OAuthStateStore {
    cache: Option<KvCache>,
    fallback: DashMap<String, Instant>,
}

impl OAuthStateStore {
    pub fn new(cache: Option<KvCache>) -> Self {
        if cache.is_none() {
            tracing::warn!(
                "Redis absent: OAuth state held in process memory (single-instance only)"
            );
        }
        Self {
            cache,
            fallback: DashMap::new(),
        }
    }

    /// Park a state value for up to ten minutes.
    pub async fn store(&self, state: &str) -> Result<()> {
        if let Some(cache) = &self.cache {
            cache
                .set_ex(&state_key(state), "1", STATE_TTL.as_secs())
                .await?;
        } else {
            self.fallback
                .retain(|_, stored| stored.elapsed() < STATE_TTL);
            self.fallback.insert(state.to_string(), Instant::now());
        }
        Ok(())
    }

    /// Consume a state value. Succeeds exactly once per stored state; the
    /// cache path rides on DEL's atomicity, the fallback on the map remove.
    pub async fn consume(&self, state: &str) -> Result<bool> {
        if state.is_empty() {
            return Ok(false);
        }
        if let Some(cache) = &self.cache {
            Ok(cache.del(&state_key(state)).await?)
        } else {
            match self.fallback.remove(state) {
                Some((_, stored)) => Ok(stored.elapsed() < STATE_TTL),
                None => Ok(false),
            }
        }
    }
}

fn state_key(state: &str) -> String {
    format!("{}{}", keys::OAUTH_STATE, state)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager_with_both() -> OAuthManager {
        let mut config = Config::test_default();
        config.google_client_id = "gid".to_string();
        config.google_client_secret = "gsecret".to_string();
        config.github_client_id = "hid".to_string();
        config.github_client_secret = "hsecret".to_string();
        OAuthManager::from_config(&config)
    }

    #[test]
    fn test_unconfigured_providers_absent() {
        let manager = OAuthManager::from_config(&Config::test_default());
        assert!(manager.list_providers().is_empty());
        assert!(matches!(
            manager.authorization_url("google", "s"),
            Err(AppError::InvalidProvider(_))
        ));
    }

    #[test]
    fn test_configured_providers_listed_sorted() {
        let manager = manager_with_both();
        assert_eq!(manager.list_providers(), vec!["github", "google"]);
    }

    #[test]
    fn test_authorization_url_echoes_state() {
        let manager = manager_with_both();
        let url = manager.authorization_url("github", "st4te").unwrap();
        assert!(url.starts_with("https://github.com/login/oauth/authorize?"));
        assert!(url.contains("state=st4te"));
        assert!(url.contains("client_id=hid"));

        let url = manager.authorization_url("google", "st4te").unwrap();
        assert!(url.contains("access_type=offline"));
    }

    #[test]
    fn test_snapshot_has_no_secrets() {
        let manager = manager_with_both();
        let snapshot = serde_json::to_string(&manager.provider_snapshot()).unwrap();
        assert!(snapshot.contains("gid"));
        assert!(!snapshot.contains("gsecret"));
        assert!(!snapshot.contains("hsecret"));
    }

    #[tokio::test]
    async fn test_state_consumed_exactly_once() {
        let store = OAuthStateStore::new(None);
        store.store("state-1").await.unwrap();

        assert!(store.consume("state-1").await.unwrap());
        assert!(!store.consume("state-1").await.unwrap());
        assert!(!store.consume("never-stored").await.unwrap());
        assert!(!store.consume("").await.unwrap());
    }
}
