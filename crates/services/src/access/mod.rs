pub mod ports;

pub use ports::*;

use ad_platforms::Platform;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use crate::sessions::UserId;

pub struct AccessGateImpl {
    subscriptions: Arc<dyn SubscriptionRepository>,
    seats: Arc<dyn SeatRepository>,
}

impl AccessGateImpl {
    pub fn new(
        subscriptions: Arc<dyn SubscriptionRepository>,
        seats: Arc<dyn SeatRepository>,
    ) -> Self {
        Self {
            subscriptions,
            seats,
        }
    }

    fn covers(subscription: &Subscription, platform: Platform) -> bool {
        subscription.status.authorizes_access()
            && subscription.platform.map(|p| p == platform).unwrap_or(true)
    }

    async fn platform_seats(
        &self,
        user_id: &UserId,
        platform: Platform,
    ) -> Result<Vec<Seat>, AccessError> {
        let seats = self.seats.active_seats_for_user(user_id).await?;
        Ok(seats
            .into_iter()
            .filter(|seat| seat.platform == platform)
            .collect())
    }
}

#[async_trait]
impl AccessGate for AccessGateImpl {
    async fn validate_subscription(
        &self,
        user_id: &UserId,
        platform: Platform,
    ) -> Result<Subscription, AccessError> {
        let seats = self.platform_seats(user_id, platform).await?;
        if seats.is_empty() {
            return Err(AccessError::Forbidden(format!(
                "no active seat for {platform}"
            )));
        }
        for seat in &seats {
            if let Some(subscription) = self.subscriptions.get(&seat.subscription_id).await? {
                if Self::covers(&subscription, platform) {
                    return Ok(subscription);
                }
            }
        }
        Err(AccessError::Forbidden(format!(
            "no authorizing subscription behind the {platform} seats"
        )))
    }

    async fn active_subscription(
        &self,
        user_id: &UserId,
        platform: Platform,
    ) -> Result<Subscription, AccessError> {
        let subscriptions = self.subscriptions.for_user(user_id).await?;
        subscriptions
            .into_iter()
            .find(|sub| Self::covers(sub, platform))
            .ok_or_else(|| {
                AccessError::Forbidden(format!("no active subscription covering {platform}"))
            })
    }

    async fn validate_account_access(
        &self,
        user_id: &UserId,
        platform: Platform,
        ad_account_id: &str,
    ) -> Result<Seat, AccessError> {
        let seats = self.platform_seats(user_id, platform).await?;
        seats
            .into_iter()
            .find(|seat| seat.ad_account_id == ad_account_id)
            .ok_or_else(|| {
                AccessError::Forbidden(format!(
                    "no active seat for {platform} account {ad_account_id}"
                ))
            })
    }

    async fn authorized_account_ids(
        &self,
        user_id: &UserId,
        platform: Platform,
    ) -> Result<Vec<String>, AccessError> {
        let seats = self.platform_seats(user_id, platform).await?;
        let mut ids: Vec<String> = seats.into_iter().map(|seat| seat.ad_account_id).collect();
        ids.sort();
        ids.dedup();
        Ok(ids)
    }

    async fn can_add_seat(&self, subscription_id: &SubscriptionId) -> Result<bool, AccessError> {
        let subscription = self
            .subscriptions
            .get(subscription_id)
            .await?
            .ok_or_else(|| AccessError::Forbidden(format!("unknown subscription {subscription_id}")))?;
        let active = self.seats.count_active_for_subscription(subscription_id).await?;
        Ok(active < subscription.quantity as i64)
    }

    async fn add_seat(
        &self,
        subscription_id: &SubscriptionId,
        user_id: &UserId,
        platform: Platform,
        ad_account_id: &str,
    ) -> Result<Seat, AccessError> {
        let subscription = self
            .subscriptions
            .get(subscription_id)
            .await?
            .ok_or_else(|| AccessError::Forbidden(format!("unknown subscription {subscription_id}")))?;

        if !subscription.status.authorizes_access() {
            return Err(AccessError::Forbidden(format!(
                "subscription {subscription_id} is {}",
                subscription.status.as_str()
            )));
        }
        if let Some(scoped) = subscription.platform {
            if scoped != platform {
                return Err(AccessError::Forbidden(format!(
                    "subscription {subscription_id} only covers {scoped}"
                )));
            }
        }

        // Seat counts above quantity are reconciled by billing, not blocked
        let active = self.seats.count_active_for_subscription(subscription_id).await?;
        if active >= subscription.quantity as i64 {
            tracing::warn!(
                subscription_id = %subscription_id,
                active,
                quantity = subscription.quantity,
                "Adding seat above plan quantity"
            );
        }

        let seat = self
            .seats
            .insert(Seat {
                id: Uuid::new_v4(),
                subscription_id: subscription_id.clone(),
                user_id: user_id.clone(),
                platform,
                ad_account_id: ad_account_id.to_string(),
                status: SeatStatus::Active,
                added_at: Utc::now(),
                removed_at: None,
            })
            .await?;
        tracing::info!(
            user_id = %user_id,
            %platform,
            ad_account_id,
            "Added subscription seat"
        );
        Ok(seat)
    }

    async fn remove_seat(&self, seat_id: Uuid) -> Result<bool, AccessError> {
        Ok(self.seats.deactivate(seat_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{InMemorySeatRepository, InMemorySubscriptionRepository};
    use chrono::Duration;

    fn subscription(user: &UserId, quantity: i32, status: SubscriptionStatus) -> Subscription {
        Subscription {
            id: SubscriptionId("sub-1".to_string()),
            user_id: user.clone(),
            platform: None,
            plan_id: "plan-growth".to_string(),
            plan_name: "Growth".to_string(),
            billing_cycle: "monthly".to_string(),
            status,
            quantity,
            current_period_start: Utc::now() - Duration::days(10),
            current_period_end: Utc::now() + Duration::days(20),
        }
    }

    fn gate(
        subscriptions: Arc<InMemorySubscriptionRepository>,
        seats: Arc<InMemorySeatRepository>,
    ) -> AccessGateImpl {
        AccessGateImpl::new(subscriptions, seats)
    }

    #[tokio::test]
    async fn account_access_requires_a_seat() {
        let subscriptions = Arc::new(InMemorySubscriptionRepository::new());
        let seats = Arc::new(InMemorySeatRepository::new());
        let user = UserId(Uuid::new_v4());
        subscriptions.put(subscription(&user, 2, SubscriptionStatus::Active));
        let gate = gate(subscriptions, seats);

        let err = gate
            .validate_account_access(&user, Platform::TikTok, "abc")
            .await
            .unwrap_err();
        assert!(matches!(err, AccessError::Forbidden(_)));

        gate.add_seat(&SubscriptionId("sub-1".to_string()), &user, Platform::TikTok, "abc")
            .await
            .expect("add seat");

        let seat = gate
            .validate_account_access(&user, Platform::TikTok, "abc")
            .await
            .expect("seat");
        assert_eq!(seat.ad_account_id, "abc");

        // A different account on the same platform still has no seat
        let err = gate
            .validate_account_access(&user, Platform::TikTok, "xyz")
            .await
            .unwrap_err();
        assert!(matches!(err, AccessError::Forbidden(_)));
    }

    #[tokio::test]
    async fn subscription_check_needs_a_seat_on_the_platform() {
        let subscriptions = Arc::new(InMemorySubscriptionRepository::new());
        let seats = Arc::new(InMemorySeatRepository::new());
        let user = UserId(Uuid::new_v4());
        subscriptions.put(subscription(&user, 2, SubscriptionStatus::Active));
        let gate = gate(subscriptions, seats);

        // An authorizing plan without a seat passes the plan check but not
        // the seat-backed one
        gate.active_subscription(&user, Platform::TikTok)
            .await
            .expect("plan");
        let err = gate
            .validate_subscription(&user, Platform::TikTok)
            .await
            .unwrap_err();
        assert!(matches!(err, AccessError::Forbidden(_)));

        gate.add_seat(&SubscriptionId("sub-1".to_string()), &user, Platform::TikTok, "abc")
            .await
            .expect("add seat");
        let sub = gate
            .validate_subscription(&user, Platform::TikTok)
            .await
            .expect("subscription");
        assert_eq!(sub.id.0, "sub-1");

        // The seat does not cover other platforms
        let err = gate
            .validate_subscription(&user, Platform::Facebook)
            .await
            .unwrap_err();
        assert!(matches!(err, AccessError::Forbidden(_)));
    }

    #[tokio::test]
    async fn authorized_ids_list_the_seated_accounts() {
        let subscriptions = Arc::new(InMemorySubscriptionRepository::new());
        let seats = Arc::new(InMemorySeatRepository::new());
        let user = UserId(Uuid::new_v4());
        subscriptions.put(subscription(&user, 5, SubscriptionStatus::Active));
        let gate = gate(subscriptions, seats);
        let sub_id = SubscriptionId("sub-1".to_string());

        assert!(gate
            .authorized_account_ids(&user, Platform::Facebook)
            .await
            .expect("ids")
            .is_empty());

        gate.add_seat(&sub_id, &user, Platform::Facebook, "act_2")
            .await
            .expect("seat");
        gate.add_seat(&sub_id, &user, Platform::Facebook, "act_1")
            .await
            .expect("seat");
        gate.add_seat(&sub_id, &user, Platform::TikTok, "adv-9")
            .await
            .expect("seat");

        let ids = gate
            .authorized_account_ids(&user, Platform::Facebook)
            .await
            .expect("ids");
        assert_eq!(ids, vec!["act_1".to_string(), "act_2".to_string()]);
    }

    #[tokio::test]
    async fn seat_capacity_is_reported() {
        let subscriptions = Arc::new(InMemorySubscriptionRepository::new());
        let seats = Arc::new(InMemorySeatRepository::new());
        let user = UserId(Uuid::new_v4());
        subscriptions.put(subscription(&user, 2, SubscriptionStatus::Active));
        let gate = gate(subscriptions, seats);
        let sub_id = SubscriptionId("sub-1".to_string());

        assert!(gate.can_add_seat(&sub_id).await.expect("capacity"));
        gate.add_seat(&sub_id, &user, Platform::TikTok, "adv-1")
            .await
            .expect("first seat");
        assert!(gate.can_add_seat(&sub_id).await.expect("capacity"));
        gate.add_seat(&sub_id, &user, Platform::TikTok, "adv-2")
            .await
            .expect("second seat");
        assert!(!gate.can_add_seat(&sub_id).await.expect("capacity"));
    }

    #[tokio::test]
    async fn removed_seat_no_longer_grants_access() {
        let subscriptions = Arc::new(InMemorySubscriptionRepository::new());
        let seats = Arc::new(InMemorySeatRepository::new());
        let user = UserId(Uuid::new_v4());
        subscriptions.put(subscription(&user, 5, SubscriptionStatus::Trialing));
        let gate = gate(subscriptions, seats);
        let sub_id = SubscriptionId("sub-1".to_string());

        let seat = gate
            .add_seat(&sub_id, &user, Platform::Google, "123-456")
            .await
            .expect("add");
        assert!(gate.remove_seat(seat.id).await.expect("remove"));

        let err = gate
            .validate_account_access(&user, Platform::Google, "123-456")
            .await
            .unwrap_err();
        assert!(matches!(err, AccessError::Forbidden(_)));
        assert!(gate.can_add_seat(&sub_id).await.expect("capacity"));
    }

    #[tokio::test]
    async fn canceled_subscription_denies_everything() {
        let subscriptions = Arc::new(InMemorySubscriptionRepository::new());
        let seats = Arc::new(InMemorySeatRepository::new());
        let user = UserId(Uuid::new_v4());
        subscriptions.put(subscription(&user, 2, SubscriptionStatus::Canceled));
        let gate = gate(subscriptions, seats);

        let err = gate
            .active_subscription(&user, Platform::TikTok)
            .await
            .unwrap_err();
        assert!(matches!(err, AccessError::Forbidden(_)));

        let err = gate
            .add_seat(&SubscriptionId("sub-1".to_string()), &user, Platform::TikTok, "abc")
            .await
            .unwrap_err();
        assert!(matches!(err, AccessError::Forbidden(_)));
    }

    #[tokio::test]
    async fn past_due_still_authorizes() {
        let subscriptions = Arc::new(InMemorySubscriptionRepository::new());
        let seats = Arc::new(InMemorySeatRepository::new());
        let user = UserId(Uuid::new_v4());
        subscriptions.put(subscription(&user, 2, SubscriptionStatus::PastDue));
        let gate = gate(subscriptions, seats);

        gate.add_seat(&SubscriptionId("sub-1".to_string()), &user, Platform::TikTok, "abc")
            .await
            .expect("seat during grace period");
        gate.validate_subscription(&user, Platform::TikTok)
            .await
            .expect("grace period access");
    }

    #[tokio::test]
    async fn repository_failure_surfaces_as_internal() {
        let mut subscriptions = ports::MockSubscriptionRepository::new();
        subscriptions
            .expect_for_user()
            .returning(|_| Err(anyhow::anyhow!("connection refused")));
        let gate = AccessGateImpl::new(
            Arc::new(subscriptions),
            Arc::new(InMemorySeatRepository::new()),
        );

        let err = gate
            .active_subscription(&UserId(Uuid::new_v4()), Platform::TikTok)
            .await
            .unwrap_err();
        assert!(matches!(err, AccessError::Internal(_)));
    }

    #[tokio::test]
    async fn platform_scoped_subscription_only_covers_its_platform() {
        let subscriptions = Arc::new(InMemorySubscriptionRepository::new());
        let seats = Arc::new(InMemorySeatRepository::new());
        let user = UserId(Uuid::new_v4());
        let mut sub = subscription(&user, 2, SubscriptionStatus::Active);
        sub.platform = Some(Platform::Facebook);
        subscriptions.put(sub);
        let gate = gate(subscriptions, seats);

        gate.active_subscription(&user, Platform::Facebook)
            .await
            .expect("covered");
        let err = gate
            .active_subscription(&user, Platform::TikTok)
            .await
            .unwrap_err();
        assert!(matches!(err, AccessError::Forbidden(_)));
    }
}
