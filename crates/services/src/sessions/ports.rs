use ad_platforms::{AdSession, Platform};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
#[cfg(any(test, feature = "test-mocks"))]
use mockall::automock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// Domain ID types
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct UserId(pub Uuid);

impl From<Uuid> for UserId {
    fn from(uuid: Uuid) -> Self {
        UserId(uuid)
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One OAuth credential row per (user, platform)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformSession {
    pub user_id: UserId,
    pub platform: Platform,
    pub access_token: String,
    /// For Facebook this holds the current long-lived token, since the
    /// Graph API issues no separate refresh token
    pub refresh_token: Option<String>,
    /// Selected external ad account id
    pub account_id: Option<String>,
    pub account_name: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub refresh_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PlatformSession {
    /// A session with a past expiry is not valid for use until refreshed
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|at| at <= now).unwrap_or(false)
    }

    /// Credentials handed to a platform adapter
    pub fn as_ad_session(&self) -> AdSession {
        AdSession::new(self.access_token.clone(), self.account_id.clone())
    }
}

/// Upsert request; `None` fields preserve whatever is already stored
#[derive(Debug, Clone)]
pub struct SaveSession {
    pub user_id: UserId,
    pub platform: Platform,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub account_id: Option<String>,
    pub account_name: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub refresh_expires_at: Option<DateTime<Utc>>,
}

/// Persistence port for session rows.
///
/// At most one row exists per (user, platform); `upsert` updates in place
/// and preserves columns the request leaves unset.
#[cfg_attr(any(test, feature = "test-mocks"), automock)]
#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn upsert(&self, session: SaveSession) -> anyhow::Result<PlatformSession>;

    async fn find(
        &self,
        user_id: &UserId,
        platform: Platform,
    ) -> anyhow::Result<Option<PlatformSession>>;

    async fn delete(&self, user_id: &UserId, platform: Platform) -> anyhow::Result<bool>;
}

// Error types
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// No stored session, or the stored one was unrecoverable and purged
    #[error("Platform not connected")]
    NotConnected,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Session lifecycle service.
///
/// `get` never hands out an expired token: expired sessions are refreshed
/// transparently, and an unrefreshable session is deleted so the caller is
/// forced to re-authenticate.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn save(&self, session: SaveSession) -> Result<PlatformSession, SessionError>;

    async fn get(
        &self,
        user_id: &UserId,
        platform: Platform,
    ) -> Result<PlatformSession, SessionError>;

    async fn refresh(
        &self,
        user_id: &UserId,
        platform: Platform,
    ) -> Result<PlatformSession, SessionError>;

    async fn delete(&self, user_id: &UserId, platform: Platform) -> Result<bool, SessionError>;
}
