pub mod migrations;
pub mod models;
pub mod pool;
pub mod repositories;

pub use models::*;
pub use pool::{create_pool, DbPool};
pub use repositories::{PgSeatRepository, PgSessionRepository, PgSubscriptionRepository};

use anyhow::Result;

/// Database service combining all repositories
pub struct Database {
    pub sessions: PgSessionRepository,
    pub seats: PgSeatRepository,
    pub subscriptions: PgSubscriptionRepository,
    pool: DbPool,
}

impl Database {
    /// Create a new database service from a connection pool
    pub fn new(pool: DbPool) -> Self {
        Self {
            sessions: PgSessionRepository::new(pool.clone()),
            seats: PgSeatRepository::new(pool.clone()),
            subscriptions: PgSubscriptionRepository::new(pool.clone()),
            pool,
        }
    }

    /// Create a new database service from configuration
    pub async fn from_config(config: &config::DatabaseConfig) -> Result<Self> {
        let pool = create_pool(config).await?;
        Ok(Self::new(pool))
    }

    /// Run database migrations
    pub async fn run_migrations(&self) -> Result<()> {
        migrations::run(&self.pool).await
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}
