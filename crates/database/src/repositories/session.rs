use crate::models::PlatformSessionRow;
use crate::pool::DbPool;
use ad_platforms::Platform;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

pub struct PgSessionRepository {
    pool: DbPool,
}

impl PgSessionRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Insert or update the (user, platform) row.
    ///
    /// NULL parameters keep the stored value via COALESCE, so a refresh that
    /// only rotates tokens never clears the selected account.
    #[allow(clippy::too_many_arguments)]
    pub async fn upsert(
        &self,
        user_id: Uuid,
        platform: &str,
        access_token: &str,
        refresh_token: Option<&str>,
        account_id: Option<&str>,
        account_name: Option<&str>,
        expires_at: Option<DateTime<Utc>>,
        refresh_expires_at: Option<DateTime<Utc>>,
    ) -> Result<PlatformSessionRow> {
        let client = self
            .pool
            .get()
            .await
            .context("Failed to get database connection")?;

        let now = Utc::now();

        let row = client
            .query_one(
                r#"
            INSERT INTO platform_sessions (
                user_id, platform, access_token, refresh_token,
                account_id, account_name, expires_at, refresh_expires_at,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9)
            ON CONFLICT (user_id, platform) DO UPDATE SET
                access_token = EXCLUDED.access_token,
                refresh_token = COALESCE(EXCLUDED.refresh_token, platform_sessions.refresh_token),
                account_id = COALESCE(EXCLUDED.account_id, platform_sessions.account_id),
                account_name = COALESCE(EXCLUDED.account_name, platform_sessions.account_name),
                expires_at = COALESCE(EXCLUDED.expires_at, platform_sessions.expires_at),
                refresh_expires_at = COALESCE(EXCLUDED.refresh_expires_at, platform_sessions.refresh_expires_at),
                updated_at = EXCLUDED.updated_at
            RETURNING *
            "#,
                &[
                    &user_id,
                    &platform,
                    &access_token,
                    &refresh_token,
                    &account_id,
                    &account_name,
                    &expires_at,
                    &refresh_expires_at,
                    &now,
                ],
            )
            .await
            .context("Failed to upsert platform session")?;

        debug!("Upserted platform session: {} / {}", user_id, platform);

        self.row_to_session(row)
    }

    pub async fn find(&self, user_id: Uuid, platform: &str) -> Result<Option<PlatformSessionRow>> {
        let client = self
            .pool
            .get()
            .await
            .context("Failed to get database connection")?;

        let row = client
            .query_opt(
                "SELECT * FROM platform_sessions WHERE user_id = $1 AND platform = $2",
                &[&user_id, &platform],
            )
            .await
            .context("Failed to query platform session")?;

        match row {
            Some(row) => Ok(Some(self.row_to_session(row)?)),
            None => Ok(None),
        }
    }

    pub async fn delete(&self, user_id: Uuid, platform: &str) -> Result<bool> {
        let client = self
            .pool
            .get()
            .await
            .context("Failed to get database connection")?;

        let result = client
            .execute(
                "DELETE FROM platform_sessions WHERE user_id = $1 AND platform = $2",
                &[&user_id, &platform],
            )
            .await
            .context("Failed to delete platform session")?;

        Ok(result > 0)
    }

    // Helper function to convert database row to PlatformSessionRow
    fn row_to_session(&self, row: tokio_postgres::Row) -> Result<PlatformSessionRow> {
        Ok(PlatformSessionRow {
            user_id: row.get("user_id"),
            platform: row.get("platform"),
            access_token: row.get("access_token"),
            refresh_token: row.get("refresh_token"),
            account_id: row.get("account_id"),
            account_name: row.get("account_name"),
            expires_at: row.get("expires_at"),
            refresh_expires_at: row.get("refresh_expires_at"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }
}

fn to_service_session(row: PlatformSessionRow) -> Result<services::sessions::PlatformSession> {
    let platform = Platform::parse(&row.platform)
        .ok_or_else(|| anyhow::anyhow!("Unknown platform in database: {}", row.platform))?;
    Ok(services::sessions::PlatformSession {
        user_id: services::sessions::UserId(row.user_id),
        platform,
        access_token: row.access_token,
        refresh_token: row.refresh_token,
        account_id: row.account_id,
        account_name: row.account_name,
        expires_at: row.expires_at,
        refresh_expires_at: row.refresh_expires_at,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

// Implement the service trait
#[async_trait::async_trait]
impl services::sessions::SessionRepository for PgSessionRepository {
    async fn upsert(
        &self,
        session: services::sessions::SaveSession,
    ) -> anyhow::Result<services::sessions::PlatformSession> {
        let row = self
            .upsert(
                session.user_id.0,
                session.platform.as_str(),
                &session.access_token,
                session.refresh_token.as_deref(),
                session.account_id.as_deref(),
                session.account_name.as_deref(),
                session.expires_at,
                session.refresh_expires_at,
            )
            .await?;
        to_service_session(row)
    }

    async fn find(
        &self,
        user_id: &services::sessions::UserId,
        platform: Platform,
    ) -> anyhow::Result<Option<services::sessions::PlatformSession>> {
        let maybe_row = self.find(user_id.0, platform.as_str()).await?;
        maybe_row.map(to_service_session).transpose()
    }

    async fn delete(
        &self,
        user_id: &services::sessions::UserId,
        platform: Platform,
    ) -> anyhow::Result<bool> {
        self.delete(user_id.0, platform.as_str()).await
    }
}
