//! Row-level models for the core tables
//!
//! These mirror the table shapes exactly; conversion into the service-layer
//! types happens in the repository trait impls.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Row of `platform_sessions`, one per (user, platform)
#[derive(Debug, Clone)]
pub struct PlatformSessionRow {
    pub user_id: Uuid,
    pub platform: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub account_id: Option<String>,
    pub account_name: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub refresh_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Row of `subscriptions`
#[derive(Debug, Clone)]
pub struct SubscriptionRow {
    pub id: String,
    pub user_id: Uuid,
    pub platform: Option<String>,
    pub plan_id: String,
    pub plan_name: String,
    pub billing_cycle: String,
    pub status: String,
    pub quantity: i32,
    pub current_period_start: DateTime<Utc>,
    pub current_period_end: DateTime<Utc>,
}

/// Row of `subscription_seats`
#[derive(Debug, Clone)]
pub struct SeatRow {
    pub id: Uuid,
    pub subscription_id: String,
    pub user_id: Uuid,
    pub platform: String,
    pub ad_account_id: String,
    pub status: String,
    pub added_at: DateTime<Utc>,
    pub removed_at: Option<DateTime<Utc>>,
}
