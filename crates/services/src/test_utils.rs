//! In-memory repository implementations shared by service tests

use ad_platforms::Platform;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use crate::access::{
    Seat, SeatRepository, SeatStatus, Subscription, SubscriptionId, SubscriptionRepository,
};
use crate::sessions::{PlatformSession, SaveSession, SessionRepository, UserId};

#[derive(Default)]
pub struct InMemorySessionRepository {
    rows: Mutex<HashMap<(Uuid, Platform), PlatformSession>>,
}

impl InMemorySessionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.lock().expect("lock").len()
    }
}

#[async_trait]
impl SessionRepository for InMemorySessionRepository {
    async fn upsert(&self, session: SaveSession) -> anyhow::Result<PlatformSession> {
        let mut rows = self.rows.lock().expect("lock");
        let key = (session.user_id.0, session.platform);
        let now = Utc::now();

        // Mirrors the COALESCE behavior of the SQL upsert: unset fields
        // keep their stored values
        let row = match rows.get(&key) {
            Some(existing) => PlatformSession {
                user_id: session.user_id,
                platform: session.platform,
                access_token: session.access_token,
                refresh_token: session.refresh_token.or_else(|| existing.refresh_token.clone()),
                account_id: session.account_id.or_else(|| existing.account_id.clone()),
                account_name: session.account_name.or_else(|| existing.account_name.clone()),
                expires_at: session.expires_at.or(existing.expires_at),
                refresh_expires_at: session.refresh_expires_at.or(existing.refresh_expires_at),
                created_at: existing.created_at,
                updated_at: now,
            },
            None => PlatformSession {
                user_id: session.user_id,
                platform: session.platform,
                access_token: session.access_token,
                refresh_token: session.refresh_token,
                account_id: session.account_id,
                account_name: session.account_name,
                expires_at: session.expires_at,
                refresh_expires_at: session.refresh_expires_at,
                created_at: now,
                updated_at: now,
            },
        };
        rows.insert(key, row.clone());
        Ok(row)
    }

    async fn find(
        &self,
        user_id: &UserId,
        platform: Platform,
    ) -> anyhow::Result<Option<PlatformSession>> {
        let rows = self.rows.lock().expect("lock");
        Ok(rows.get(&(user_id.0, platform)).cloned())
    }

    async fn delete(&self, user_id: &UserId, platform: Platform) -> anyhow::Result<bool> {
        let mut rows = self.rows.lock().expect("lock");
        Ok(rows.remove(&(user_id.0, platform)).is_some())
    }
}

#[derive(Default)]
pub struct InMemorySeatRepository {
    rows: Mutex<Vec<Seat>>,
}

impl InMemorySeatRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SeatRepository for InMemorySeatRepository {
    async fn active_seats_for_user(&self, user_id: &UserId) -> anyhow::Result<Vec<Seat>> {
        let rows = self.rows.lock().expect("lock");
        Ok(rows
            .iter()
            .filter(|seat| seat.user_id == *user_id && seat.status == SeatStatus::Active)
            .cloned()
            .collect())
    }

    async fn count_active_for_subscription(
        &self,
        subscription_id: &SubscriptionId,
    ) -> anyhow::Result<i64> {
        let rows = self.rows.lock().expect("lock");
        Ok(rows
            .iter()
            .filter(|seat| {
                seat.subscription_id == *subscription_id && seat.status == SeatStatus::Active
            })
            .count() as i64)
    }

    async fn insert(&self, seat: Seat) -> anyhow::Result<Seat> {
        let mut rows = self.rows.lock().expect("lock");
        rows.push(seat.clone());
        Ok(seat)
    }

    async fn deactivate(&self, seat_id: Uuid) -> anyhow::Result<bool> {
        let mut rows = self.rows.lock().expect("lock");
        for seat in rows.iter_mut() {
            if seat.id == seat_id && seat.status == SeatStatus::Active {
                seat.status = SeatStatus::Inactive;
                seat.removed_at = Some(Utc::now());
                return Ok(true);
            }
        }
        Ok(false)
    }
}

#[derive(Default)]
pub struct InMemorySubscriptionRepository {
    rows: Mutex<HashMap<SubscriptionId, Subscription>>,
}

impl InMemorySubscriptionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, subscription: Subscription) {
        let mut rows = self.rows.lock().expect("lock");
        rows.insert(subscription.id.clone(), subscription);
    }
}

#[async_trait]
impl SubscriptionRepository for InMemorySubscriptionRepository {
    async fn get(&self, id: &SubscriptionId) -> anyhow::Result<Option<Subscription>> {
        let rows = self.rows.lock().expect("lock");
        Ok(rows.get(id).cloned())
    }

    async fn for_user(&self, user_id: &UserId) -> anyhow::Result<Vec<Subscription>> {
        let rows = self.rows.lock().expect("lock");
        Ok(rows
            .values()
            .filter(|sub| sub.user_id == *user_id)
            .cloned()
            .collect())
    }
}
