mod single_flight;
pub mod ports;

pub use ports::*;

use chrono::{Duration, Utc};
use single_flight::RefreshLocks;
use std::collections::HashMap;
use std::sync::Arc;

use ad_platforms::{Platform, TokenRefresher};
use async_trait::async_trait;

/// Session store with transparent, single-flight token refresh
pub struct SessionStoreImpl {
    repository: Arc<dyn SessionRepository>,
    refreshers: HashMap<Platform, Arc<dyn TokenRefresher>>,
    locks: RefreshLocks,
}

impl SessionStoreImpl {
    pub fn new(
        repository: Arc<dyn SessionRepository>,
        refreshers: HashMap<Platform, Arc<dyn TokenRefresher>>,
    ) -> Self {
        Self {
            repository,
            refreshers,
            locks: RefreshLocks::new(),
        }
    }

    /// Refresh the stored session and persist the rotated tokens.
    ///
    /// Any failure (missing refresh token, invalid_grant, network error)
    /// makes the session unrecoverable: the row is deleted and the caller
    /// gets `NotConnected`, forcing a re-authentication.
    async fn refresh_locked(
        &self,
        session: PlatformSession,
    ) -> Result<PlatformSession, SessionError> {
        let user_id = session.user_id.clone();
        let platform = session.platform;

        let refresher = self.refreshers.get(&platform).ok_or_else(|| {
            SessionError::Internal(anyhow::anyhow!("no token refresher for {platform}"))
        })?;

        let Some(refresh_token) = session.refresh_token.clone() else {
            tracing::warn!(user_id = %user_id, %platform, "Session has no refresh token, purging");
            self.repository.delete(&user_id, platform).await?;
            return Err(SessionError::NotConnected);
        };

        match refresher.refresh(&refresh_token).await {
            Ok(rotated) => {
                let now = Utc::now();
                let saved = self
                    .repository
                    .upsert(SaveSession {
                        user_id: user_id.clone(),
                        platform,
                        access_token: rotated.access_token,
                        refresh_token: rotated.refresh_token.or(Some(refresh_token)),
                        account_id: None,
                        account_name: None,
                        expires_at: rotated.expires_in.map(|s| now + Duration::seconds(s)),
                        refresh_expires_at: rotated
                            .refresh_expires_in
                            .map(|s| now + Duration::seconds(s)),
                    })
                    .await?;
                tracing::debug!(user_id = %user_id, %platform, "Refreshed platform session");
                Ok(saved)
            }
            Err(err) => {
                tracing::warn!(
                    user_id = %user_id,
                    %platform,
                    error = %err,
                    "Token refresh failed, purging session"
                );
                self.repository.delete(&user_id, platform).await?;
                Err(SessionError::NotConnected)
            }
        }
    }
}

#[async_trait]
impl SessionStore for SessionStoreImpl {
    async fn save(&self, session: SaveSession) -> Result<PlatformSession, SessionError> {
        let saved = self.repository.upsert(session).await?;
        tracing::debug!(
            user_id = %saved.user_id,
            platform = %saved.platform,
            "Saved platform session"
        );
        Ok(saved)
    }

    async fn get(
        &self,
        user_id: &UserId,
        platform: Platform,
    ) -> Result<PlatformSession, SessionError> {
        let session = self
            .repository
            .find(user_id, platform)
            .await?
            .ok_or(SessionError::NotConnected)?;

        if !session.is_expired(Utc::now()) {
            return Ok(session);
        }

        let _guard = self.locks.acquire(user_id.0, platform).await;

        // Re-read under the lock: a concurrent caller may have refreshed
        // while we waited, in which case the stored row is already fresh.
        let session = self
            .repository
            .find(user_id, platform)
            .await?
            .ok_or(SessionError::NotConnected)?;
        if !session.is_expired(Utc::now()) {
            return Ok(session);
        }

        self.refresh_locked(session).await
    }

    async fn refresh(
        &self,
        user_id: &UserId,
        platform: Platform,
    ) -> Result<PlatformSession, SessionError> {
        let _guard = self.locks.acquire(user_id.0, platform).await;
        let session = self
            .repository
            .find(user_id, platform)
            .await?
            .ok_or(SessionError::NotConnected)?;
        self.refresh_locked(session).await
    }

    async fn delete(&self, user_id: &UserId, platform: Platform) -> Result<bool, SessionError> {
        let deleted = self.repository.delete(user_id, platform).await?;
        if deleted {
            tracing::info!(user_id = %user_id, %platform, "Disconnected platform session");
        }
        Ok(deleted)
    }
}
