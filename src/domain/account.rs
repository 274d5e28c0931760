//! Account records: users, packages, subscriptions, invoices, notifications.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{InvoiceId, NotificationId, SubscriptionId, UserId};

/// Platform role of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    /// Platform operator: manages every event, subscription and invoice.
    Admin,
    /// Event organizer: manages their own events.
    Organizer,
}

/// A platform user account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique user identifier.
    pub id: UserId,
    /// Login email, lower-cased.
    pub email: String,
    /// Display name.
    pub display_name: String,
    /// Platform role.
    pub role: UserRole,
    /// bcrypt password hash.
    pub password_hash: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Returns `true` for platform admins.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

/// A purchasable service tier.
#[derive(Debug, Clone, Copy, Serialize, ToSchema)]
pub struct Package {
    /// Stable package code.
    pub code: &'static str,
    /// Display name.
    pub name: &'static str,
    /// Price in VND (0 for the free tier).
    pub price_vnd: u64,
    /// Events the subscriber may create (`None` = unlimited).
    pub events_limit: Option<u32>,
    /// Voters per event (`None` = unlimited).
    pub participants_limit: Option<u32>,
    /// Subscription length in days (`None` = no expiry).
    pub duration_days: Option<u32>,
}

impl Package {
    /// Returns `true` if the package costs nothing.
    #[must_use]
    pub const fn is_free(&self) -> bool {
        self.price_vnd == 0
    }

    /// Returns the expiry of a subscription starting at `start`.
    #[must_use]
    pub fn expiry_from(&self, start: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.duration_days
            .map(|days| start + Duration::days(i64::from(days)))
    }
}

/// The package catalog.
pub const PACKAGES: [Package; 3] = [
    Package {
        code: "free",
        name: "Free",
        price_vnd: 0,
        events_limit: Some(1),
        participants_limit: Some(50),
        duration_days: None,
    },
    Package {
        code: "standard",
        name: "Standard",
        price_vnd: 1_990_000,
        events_limit: Some(5),
        participants_limit: Some(500),
        duration_days: Some(30),
    },
    Package {
        code: "premium",
        name: "Premium",
        price_vnd: 4_990_000,
        events_limit: None,
        participants_limit: Some(2_000),
        duration_days: Some(365),
    },
];

/// Looks up a package by code.
#[must_use]
pub fn find_package(code: &str) -> Option<&'static Package> {
    PACKAGES.iter().find(|p| p.code == code)
}

/// Lifecycle state of a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    /// Awaiting payment of its invoice.
    Pending,
    /// In force.
    Active,
    /// Superseded or past its expiry.
    Expired,
    /// Cancelled by an admin.
    Cancelled,
}

/// A user's subscription to a package.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Subscription {
    /// Unique subscription identifier.
    pub id: SubscriptionId,
    /// Subscriber.
    pub user_id: UserId,
    /// Package code.
    pub package: String,
    /// Lifecycle state.
    pub status: SubscriptionStatus,
    /// Events the subscriber may create (`None` = unlimited).
    pub events_limit: Option<u32>,
    /// Events created under this subscription.
    pub events_used: u32,
    /// Voters per event (`None` = unlimited).
    pub participants_limit: Option<u32>,
    /// Start of validity.
    pub starts_at: DateTime<Utc>,
    /// End of validity (`None` = no expiry).
    pub expires_at: Option<DateTime<Utc>>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl Subscription {
    /// Returns `true` if the subscription is active and not expired at `now`.
    #[must_use]
    pub fn is_in_force(&self, now: DateTime<Utc>) -> bool {
        self.status == SubscriptionStatus::Active && self.expires_at.is_none_or(|end| now < end)
    }

    /// Returns `true` if another event may be created.
    #[must_use]
    pub fn has_event_slot(&self) -> bool {
        self.events_limit.is_none_or(|limit| self.events_used < limit)
    }
}

/// Payment state of an invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    /// Awaiting payment.
    Pending,
    /// Paid.
    Paid,
    /// Voided together with its subscription.
    Cancelled,
}

/// An invoice for a paid package.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Invoice {
    /// Unique invoice identifier.
    pub id: InvoiceId,
    /// Billed user.
    pub user_id: UserId,
    /// Subscription being paid for.
    pub subscription_id: SubscriptionId,
    /// Package code.
    pub package: String,
    /// Amount in VND.
    pub amount_vnd: u64,
    /// Payment state.
    pub status: InvoiceStatus,
    /// Issue timestamp.
    pub issued_at: DateTime<Utc>,
    /// Payment timestamp.
    pub paid_at: Option<DateTime<Utc>>,
}

/// Category of an admin notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// Account lifecycle.
    Account,
    /// Event lifecycle.
    Event,
    /// Billing and subscriptions.
    Billing,
    /// Quota warnings.
    Limit,
}

/// A notification shown in the admin console.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Notification {
    /// Unique notification identifier.
    pub id: NotificationId,
    /// Recipient.
    pub user_id: UserId,
    /// Category.
    pub kind: NotificationKind,
    /// Short title.
    pub title: String,
    /// Message body.
    pub body: String,
    /// Whether the recipient has read it.
    pub read: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_subscription(limit: Option<u32>, used: u32) -> Subscription {
        let now = Utc::now();
        Subscription {
            id: SubscriptionId::new(),
            user_id: UserId::new(),
            package: "standard".to_string(),
            status: SubscriptionStatus::Active,
            events_limit: limit,
            events_used: used,
            participants_limit: None,
            starts_at: now,
            expires_at: None,
            created_at: now,
        }
    }

    #[test]
    fn catalog_lookup() {
        assert!(find_package("free").is_some_and(Package::is_free));
        assert!(find_package("premium").is_some_and(|p| p.events_limit.is_none()));
        assert!(find_package("gold").is_none());
    }

    #[test]
    fn slot_available_below_limit() {
        assert!(make_subscription(Some(2), 1).has_event_slot());
        assert!(!make_subscription(Some(2), 2).has_event_slot());
        assert!(make_subscription(None, 1_000).has_event_slot());
    }

    #[test]
    fn expired_subscription_is_not_in_force() {
        let mut sub = make_subscription(None, 0);
        sub.expires_at = Some(Utc::now() - Duration::days(1));
        assert!(!sub.is_in_force(Utc::now()));
        sub.expires_at = None;
        sub.status = SubscriptionStatus::Pending;
        assert!(!sub.is_in_force(Utc::now()));
    }
}
