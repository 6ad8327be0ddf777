use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use http::StatusCode;
use serde::de::DeserializeOwned;
use thiserror::Error;
use url::Url;

use crate::auth::SessionStore;
use crate::models::{CurrentUser, Event, LoginRequest, Notice, Notification, TokenResponse};

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("No active session, log in first")]
    NoSession,
    #[error("Backend rejected the session token")]
    Unauthorized,
    #[error("Backend returned {0}")]
    Upstream(StatusCode),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Bounded retry with a fixed delay. Only the current-user bootstrap uses
/// it; a definitive auth rejection is never retried.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub async fn run<T, E, F, Fut>(
        &self,
        mut op: F,
        retryable: impl Fn(&E) -> bool,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if attempt < self.max_attempts && retryable(&err) => {
                    tokio::time::sleep(self.delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

pub(crate) fn is_transient(err: &BackendError) -> bool {
    match err {
        BackendError::Http(_) => true,
        BackendError::Upstream(status) => status.is_server_error(),
        BackendError::NoSession | BackendError::Unauthorized => false,
    }
}

/// JSON client for the college management backend. Every data request
/// carries the session token as a Bearer header; 401/403 answers surface as
/// [`BackendError::Unauthorized`].
#[derive(Clone)]
pub struct BackendClient {
    client: reqwest::Client,
    base_url: Arc<Url>,
    retry: RetryPolicy,
}

impl BackendClient {
    pub fn new(base_url: Url) -> Self {
        Self::with_retry(base_url, RetryPolicy::default())
    }

    pub fn with_retry(base_url: Url, retry: RetryPolicy) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: Arc::new(base_url),
            retry,
        }
    }

    fn endpoint(&self, path: &str) -> Url {
        self.base_url
            .join(path)
            .unwrap_or_else(|_| self.base_url.as_ref().clone())
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        token: &str,
    ) -> Result<T, BackendError> {
        let url = self.endpoint(path);
        let response = self
            .client
            .get(url.as_str())
            .bearer_auth(token)
            .send()
            .await?;
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(BackendError::Unauthorized);
        }
        if !status.is_success() {
            return Err(BackendError::Upstream(status));
        }
        Ok(response.json::<T>().await?)
    }

    pub async fn login(&self, credentials: &LoginRequest) -> Result<TokenResponse, BackendError> {
        let url = self.endpoint("/api/auth/login");
        let response = self
            .client
            .post(url.as_str())
            .json(credentials)
            .send()
            .await?;
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(BackendError::Unauthorized);
        }
        if !status.is_success() {
            return Err(BackendError::Upstream(status));
        }
        Ok(response.json::<TokenResponse>().await?)
    }

    pub async fn fetch_current_user(&self, token: &str) -> Result<CurrentUser, BackendError> {
        self.get_json("/api/auth/me", token).await
    }

    /// Page-load bootstrap: resolve the current user for the stored session
    /// token, retrying transient failures per the policy. A 401/403 verdict
    /// clears the stored token so the caller is forced back to login.
    pub async fn bootstrap_current_user(
        &self,
        session: &SessionStore,
    ) -> Result<CurrentUser, BackendError> {
        let Some(token) = session.token() else {
            return Err(BackendError::NoSession);
        };
        let result = self
            .retry
            .run(|| self.fetch_current_user(&token), is_transient)
            .await;
        if matches!(result, Err(BackendError::Unauthorized)) {
            tracing::info!("backend rejected session token, clearing stored session");
            session.clear();
        }
        result
    }

    pub async fn fetch_events(&self, token: &str) -> Result<Vec<Event>, BackendError> {
        let events: Vec<Event> = self.get_json("/api/calendar/events", token).await?;
        let mut kept = Vec::with_capacity(events.len());
        for event in events {
            if event.is_well_formed() {
                kept.push(event);
            } else {
                tracing::warn!(id = %event.id, "dropping event with start after end");
            }
        }
        Ok(kept)
    }

    pub async fn fetch_notices(&self, token: &str) -> Result<Vec<Notice>, BackendError> {
        self.get_json("/api/notices", token).await
    }

    pub async fn fetch_notifications(&self, token: &str) -> Result<Vec<Notification>, BackendError> {
        self.get_json("/api/notifications", token).await
    }
}
