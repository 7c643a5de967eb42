use ad_platforms::Platform;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
#[cfg(any(test, feature = "test-mocks"))]
use mockall::automock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::sessions::UserId;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub String);

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Trialing,
    PastDue,
    Canceled,
}

impl SubscriptionStatus {
    /// Billing states that still grant access to platform data.
    ///
    /// PastDue keeps access during the payment grace period; only Canceled
    /// cuts it off.
    pub fn authorizes_access(&self) -> bool {
        !matches!(self, SubscriptionStatus::Canceled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Trialing => "trialing",
            SubscriptionStatus::PastDue => "past_due",
            SubscriptionStatus::Canceled => "canceled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(SubscriptionStatus::Active),
            "trialing" => Some(SubscriptionStatus::Trialing),
            "past_due" => Some(SubscriptionStatus::PastDue),
            "canceled" => Some(SubscriptionStatus::Canceled),
            _ => None,
        }
    }
}

/// Billing subscription owned by a user.
///
/// `quantity` is the number of seats the plan paid for; seats in excess of
/// it are a billing-reconciliation concern, not an access one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub user_id: UserId,
    /// Some plans are scoped to one platform; `None` covers all of them
    pub platform: Option<Platform>,
    pub plan_id: String,
    pub plan_name: String,
    pub billing_cycle: String,
    pub status: SubscriptionStatus,
    pub quantity: i32,
    pub current_period_start: DateTime<Utc>,
    pub current_period_end: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeatStatus {
    Active,
    Inactive,
}

/// One seat binds a (user, platform, ad account) triple to a subscription
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Seat {
    pub id: Uuid,
    pub subscription_id: SubscriptionId,
    pub user_id: UserId,
    pub platform: Platform,
    pub ad_account_id: String,
    pub status: SeatStatus,
    pub added_at: DateTime<Utc>,
    pub removed_at: Option<DateTime<Utc>>,
}

#[cfg_attr(any(test, feature = "test-mocks"), automock)]
#[async_trait]
pub trait SeatRepository: Send + Sync {
    async fn active_seats_for_user(&self, user_id: &UserId) -> anyhow::Result<Vec<Seat>>;

    async fn count_active_for_subscription(
        &self,
        subscription_id: &SubscriptionId,
    ) -> anyhow::Result<i64>;

    async fn insert(&self, seat: Seat) -> anyhow::Result<Seat>;

    /// Marks the seat inactive and records the removal time
    async fn deactivate(&self, seat_id: Uuid) -> anyhow::Result<bool>;
}

#[cfg_attr(any(test, feature = "test-mocks"), automock)]
#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    async fn get(&self, id: &SubscriptionId) -> anyhow::Result<Option<Subscription>>;

    async fn for_user(&self, user_id: &UserId) -> anyhow::Result<Vec<Subscription>>;
}

#[derive(Debug, thiserror::Error)]
pub enum AccessError {
    #[error("{0}")]
    Forbidden(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Subscription and seat checks performed before any platform call.
///
/// All checks are pure reads; seat mutation happens through `add_seat` /
/// `remove_seat`, driven by the billing collaborator.
#[async_trait]
pub trait AccessGate: Send + Sync {
    /// At least one active seat exists for (user, platform) under a
    /// subscription in an access-granting state
    async fn validate_subscription(
        &self,
        user_id: &UserId,
        platform: Platform,
    ) -> Result<Subscription, AccessError>;

    /// The authorizing subscription covering `platform`, with no seat
    /// requirement. This is the check used before any seat exists, e.g.
    /// when listing ad accounts for selection.
    async fn active_subscription(
        &self,
        user_id: &UserId,
        platform: Platform,
    ) -> Result<Subscription, AccessError>;

    /// The user has an active seat for this exact (platform, ad account)
    async fn validate_account_access(
        &self,
        user_id: &UserId,
        platform: Platform,
        ad_account_id: &str,
    ) -> Result<Seat, AccessError>;

    /// Account ids the user may list or select on this platform
    async fn authorized_account_ids(
        &self,
        user_id: &UserId,
        platform: Platform,
    ) -> Result<Vec<String>, AccessError>;

    /// Whether the subscription's plan still has seat capacity left
    async fn can_add_seat(&self, subscription_id: &SubscriptionId) -> Result<bool, AccessError>;

    async fn add_seat(
        &self,
        subscription_id: &SubscriptionId,
        user_id: &UserId,
        platform: Platform,
        ad_account_id: &str,
    ) -> Result<Seat, AccessError>;

    async fn remove_seat(&self, seat_id: Uuid) -> Result<bool, AccessError>;
}
