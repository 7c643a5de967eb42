use crate::models::SubscriptionRow;
use crate::pool::DbPool;
use ad_platforms::Platform;
use anyhow::{Context, Result};
use uuid::Uuid;

pub struct PgSubscriptionRepository {
    pool: DbPool,
}

impl PgSubscriptionRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, id: &str) -> Result<Option<SubscriptionRow>> {
        let client = self
            .pool
            .get()
            .await
            .context("Failed to get database connection")?;

        let row = client
            .query_opt("SELECT * FROM subscriptions WHERE id = $1", &[&id])
            .await
            .context("Failed to query subscription")?;

        match row {
            Some(row) => Ok(Some(self.row_to_subscription(row)?)),
            None => Ok(None),
        }
    }

    pub async fn for_user(&self, user_id: Uuid) -> Result<Vec<SubscriptionRow>> {
        let client = self
            .pool
            .get()
            .await
            .context("Failed to get database connection")?;

        let rows = client
            .query(
                r#"
            SELECT * FROM subscriptions
            WHERE user_id = $1
            ORDER BY current_period_end DESC
            "#,
                &[&user_id],
            )
            .await
            .context("Failed to list user subscriptions")?;

        rows.into_iter()
            .map(|row| self.row_to_subscription(row))
            .collect()
    }

    fn row_to_subscription(&self, row: tokio_postgres::Row) -> Result<SubscriptionRow> {
        Ok(SubscriptionRow {
            id: row.get("id"),
            user_id: row.get("user_id"),
            platform: row.get("platform"),
            plan_id: row.get("plan_id"),
            plan_name: row.get("plan_name"),
            billing_cycle: row.get("billing_cycle"),
            status: row.get("status"),
            quantity: row.get("quantity"),
            current_period_start: row.get("current_period_start"),
            current_period_end: row.get("current_period_end"),
        })
    }
}

fn to_service_subscription(row: SubscriptionRow) -> Result<services::access::Subscription> {
    let platform = row
        .platform
        .as_deref()
        .map(|p| {
            Platform::parse(p)
                .ok_or_else(|| anyhow::anyhow!("Unknown platform in database: {p}"))
        })
        .transpose()?;
    let status = services::access::SubscriptionStatus::parse(&row.status)
        .ok_or_else(|| anyhow::anyhow!("Unknown subscription status in database: {}", row.status))?;
    Ok(services::access::Subscription {
        id: services::access::SubscriptionId(row.id),
        user_id: services::sessions::UserId(row.user_id),
        platform,
        plan_id: row.plan_id,
        plan_name: row.plan_name,
        billing_cycle: row.billing_cycle,
        status,
        quantity: row.quantity,
        current_period_start: row.current_period_start,
        current_period_end: row.current_period_end,
    })
}

// Implement the service trait
#[async_trait::async_trait]
impl services::access::SubscriptionRepository for PgSubscriptionRepository {
    async fn get(
        &self,
        id: &services::access::SubscriptionId,
    ) -> anyhow::Result<Option<services::access::Subscription>> {
        let maybe_row = self.get(&id.0).await?;
        maybe_row.map(to_service_subscription).transpose()
    }

    async fn for_user(
        &self,
        user_id: &services::sessions::UserId,
    ) -> anyhow::Result<Vec<services::access::Subscription>> {
        let rows = self.for_user(user_id.0).await?;
        rows.into_iter().map(to_service_subscription).collect()
    }
}
