use crate::models::SeatRow;
use crate::pool::DbPool;
use ad_platforms::Platform;
use anyhow::{Context, Result};
use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

pub struct PgSeatRepository {
    pool: DbPool,
}

impl PgSeatRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn active_seats_for_user(&self, user_id: Uuid) -> Result<Vec<SeatRow>> {
        let client = self
            .pool
            .get()
            .await
            .context("Failed to get database connection")?;

        let rows = client
            .query(
                r#"
            SELECT * FROM subscription_seats
            WHERE user_id = $1 AND status = 'active'
            ORDER BY added_at
            "#,
                &[&user_id],
            )
            .await
            .context("Failed to list active seats")?;

        rows.into_iter().map(|row| self.row_to_seat(row)).collect()
    }

    pub async fn count_active_for_subscription(&self, subscription_id: &str) -> Result<i64> {
        let client = self
            .pool
            .get()
            .await
            .context("Failed to get database connection")?;

        let row = client
            .query_one(
                r#"
            SELECT COUNT(*) FROM subscription_seats
            WHERE subscription_id = $1 AND status = 'active'
            "#,
                &[&subscription_id],
            )
            .await
            .context("Failed to count active seats")?;

        Ok(row.get(0))
    }

    pub async fn insert(&self, seat: &SeatRow) -> Result<SeatRow> {
        let client = self
            .pool
            .get()
            .await
            .context("Failed to get database connection")?;

        let row = client
            .query_one(
                r#"
            INSERT INTO subscription_seats (
                id, subscription_id, user_id, platform,
                ad_account_id, status, added_at, removed_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
                &[
                    &seat.id,
                    &seat.subscription_id,
                    &seat.user_id,
                    &seat.platform,
                    &seat.ad_account_id,
                    &seat.status,
                    &seat.added_at,
                    &seat.removed_at,
                ],
            )
            .await
            .context("Failed to insert seat")?;

        debug!("Inserted seat: {} for user: {}", seat.id, seat.user_id);

        self.row_to_seat(row)
    }

    pub async fn deactivate(&self, seat_id: Uuid) -> Result<bool> {
        let client = self
            .pool
            .get()
            .await
            .context("Failed to get database connection")?;

        let result = client
            .execute(
                r#"
            UPDATE subscription_seats
            SET status = 'inactive', removed_at = $1
            WHERE id = $2 AND status = 'active'
            "#,
                &[&Utc::now(), &seat_id],
            )
            .await
            .context("Failed to deactivate seat")?;

        Ok(result > 0)
    }

    fn row_to_seat(&self, row: tokio_postgres::Row) -> Result<SeatRow> {
        Ok(SeatRow {
            id: row.get("id"),
            subscription_id: row.get("subscription_id"),
            user_id: row.get("user_id"),
            platform: row.get("platform"),
            ad_account_id: row.get("ad_account_id"),
            status: row.get("status"),
            added_at: row.get("added_at"),
            removed_at: row.get("removed_at"),
        })
    }
}

fn to_service_seat(row: SeatRow) -> Result<services::access::Seat> {
    let platform = Platform::parse(&row.platform)
        .ok_or_else(|| anyhow::anyhow!("Unknown platform in database: {}", row.platform))?;
    let status = match row.status.as_str() {
        "active" => services::access::SeatStatus::Active,
        "inactive" => services::access::SeatStatus::Inactive,
        other => anyhow::bail!("Unknown seat status in database: {other}"),
    };
    Ok(services::access::Seat {
        id: row.id,
        subscription_id: services::access::SubscriptionId(row.subscription_id),
        user_id: services::sessions::UserId(row.user_id),
        platform,
        ad_account_id: row.ad_account_id,
        status,
        added_at: row.added_at,
        removed_at: row.removed_at,
    })
}

// Implement the service trait
#[async_trait::async_trait]
impl services::access::SeatRepository for PgSeatRepository {
    async fn active_seats_for_user(
        &self,
        user_id: &services::sessions::UserId,
    ) -> anyhow::Result<Vec<services::access::Seat>> {
        let rows = self.active_seats_for_user(user_id.0).await?;
        rows.into_iter().map(to_service_seat).collect()
    }

    async fn count_active_for_subscription(
        &self,
        subscription_id: &services::access::SubscriptionId,
    ) -> anyhow::Result<i64> {
        self.count_active_for_subscription(&subscription_id.0).await
    }

    async fn insert(&self, seat: services::access::Seat) -> anyhow::Result<services::access::Seat> {
        let status = match seat.status {
            services::access::SeatStatus::Active => "active",
            services::access::SeatStatus::Inactive => "inactive",
        };
        let row = self
            .insert(&SeatRow {
                id: seat.id,
                subscription_id: seat.subscription_id.0.clone(),
                user_id: seat.user_id.0,
                platform: seat.platform.as_str().to_string(),
                ad_account_id: seat.ad_account_id.clone(),
                status: status.to_string(),
                added_at: seat.added_at,
                removed_at: seat.removed_at,
            })
            .await?;
        to_service_seat(row)
    }

    async fn deactivate(&self, seat_id: Uuid) -> anyhow::Result<bool> {
        self.deactivate(seat_id).await
    }
}
