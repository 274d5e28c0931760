//! In-memory account store: users, subscriptions, invoices, notifications.
//!
//! Account data is small and mutations often touch several records at
//! once (paying an invoice activates one subscription and expires
//! another), so the whole state sits behind a single [`RwLock`].

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::account::{
    Invoice, InvoiceStatus, Notification, NotificationKind, Package, Subscription,
    SubscriptionStatus, User, find_package,
};
use super::{InvoiceId, NotificationId, SubscriptionId, UserId};
use crate::error::AppError;

/// Notifications kept per user; older ones are dropped first.
pub const MAX_NOTIFICATIONS_PER_USER: usize = 200;

/// Result of reserving an event slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventSlot {
    /// Platform admins are not metered.
    Unmetered,
    /// A slot was taken from the given subscription.
    Reserved {
        /// Subscription charged for the event.
        subscription_id: SubscriptionId,
        /// Voters allowed per event under that subscription.
        participants_limit: Option<u32>,
    },
}

/// Partial update of a subscription. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct SubscriptionPatch {
    /// New status.
    pub status: Option<SubscriptionStatus>,
    /// New events limit (`Some(None)` = unlimited).
    pub events_limit: Option<Option<u32>>,
    /// New participants limit (`Some(None)` = unlimited).
    pub participants_limit: Option<Option<u32>>,
    /// New expiry (`Some(None)` = never).
    pub expires_at: Option<Option<DateTime<Utc>>>,
}

/// Serializable account state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountState {
    /// Users keyed by ID.
    pub users: BTreeMap<UserId, User>,
    /// Subscriptions keyed by ID.
    pub subscriptions: BTreeMap<SubscriptionId, Subscription>,
    /// Invoices keyed by ID.
    pub invoices: BTreeMap<InvoiceId, Invoice>,
    /// Notifications, oldest first.
    pub notifications: Vec<Notification>,
}

impl AccountState {
    // ── Users ───────────────────────────────────────────────────────────

    /// Inserts a user.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Conflict`] if the email is already registered.
    pub fn insert_user(&mut self, user: User) -> Result<(), AppError> {
        if self.user_by_email(&user.email).is_some() {
            return Err(AppError::Conflict(format!(
                "email {} is already registered",
                user.email
            )));
        }
        self.users.insert(user.id, user);
        Ok(())
    }

    /// Returns a user.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] if the user does not exist.
    pub fn user(&self, user_id: UserId) -> Result<&User, AppError> {
        self.users
            .get(&user_id)
            .ok_or_else(|| AppError::NotFound(format!("user {user_id}")))
    }

    /// Finds a user by (lower-cased) email.
    #[must_use]
    pub fn user_by_email(&self, email: &str) -> Option<&User> {
        self.users.values().find(|u| u.email == email)
    }

    /// Replaces a user's password hash.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] if the user does not exist.
    pub fn set_password_hash(&mut self, user_id: UserId, hash: String) -> Result<(), AppError> {
        let user = self
            .users
            .get_mut(&user_id)
            .ok_or_else(|| AppError::NotFound(format!("user {user_id}")))?;
        user.password_hash = hash;
        Ok(())
    }

    // ── Subscriptions ───────────────────────────────────────────────────

    /// Returns the subscription in force for a user at `now`.
    #[must_use]
    pub fn subscription_in_force(&self, user_id: UserId, now: DateTime<Utc>) -> Option<&Subscription> {
        self.subscriptions
            .values()
            .filter(|s| s.user_id == user_id && s.is_in_force(now))
            .max_by_key(|s| s.starts_at)
    }

    /// Returns a subscription.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] if the subscription does not exist.
    pub fn subscription(&self, id: SubscriptionId) -> Result<&Subscription, AppError> {
        self.subscriptions
            .get(&id)
            .ok_or_else(|| AppError::NotFound(format!("subscription {id}")))
    }

    /// Lists subscriptions, newest first, optionally for one user.
    #[must_use]
    pub fn list_subscriptions(&self, user_filter: Option<UserId>) -> Vec<Subscription> {
        let mut subs: Vec<Subscription> = self
            .subscriptions
            .values()
            .filter(|s| user_filter.is_none_or(|u| s.user_id == u))
            .cloned()
            .collect();
        subs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        subs
    }

    /// Creates a subscription to `package`. Free packages are activated
    /// immediately; paid ones stay pending and get an invoice.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Conflict`] when a free package cannot hold the
    /// events the user already created.
    pub fn open_subscription(
        &mut self,
        user_id: UserId,
        package: &Package,
        now: DateTime<Utc>,
    ) -> Result<(Subscription, Option<Invoice>), AppError> {
        let mut subscription = Subscription {
            id: SubscriptionId::new(),
            user_id,
            package: package.code.to_string(),
            status: SubscriptionStatus::Pending,
            events_limit: package.events_limit,
            events_used: 0,
            participants_limit: package.participants_limit,
            starts_at: now,
            expires_at: None,
            created_at: now,
        };

        if package.is_free() {
            let used = self.usage_in_force(user_id, subscription.id, now);
            check_capacity(package.events_limit, used)?;
            self.expire_in_force(user_id, subscription.id, now);
            subscription.events_used = used;
            subscription.status = SubscriptionStatus::Active;
            subscription.expires_at = package.expiry_from(now);
            self.subscriptions
                .insert(subscription.id, subscription.clone());
            return Ok((subscription, None));
        }

        self.subscriptions
            .insert(subscription.id, subscription.clone());
        let invoice = Invoice {
            id: InvoiceId::new(),
            user_id,
            subscription_id: subscription.id,
            package: package.code.to_string(),
            amount_vnd: package.price_vnd,
            status: InvoiceStatus::Pending,
            issued_at: now,
            paid_at: None,
        };
        self.invoices.insert(invoice.id, invoice.clone());
        Ok((subscription, Some(invoice)))
    }

    /// Highest `events_used` among the user's subscriptions in force,
    /// ignoring `keep`.
    fn usage_in_force(&self, user_id: UserId, keep: SubscriptionId, now: DateTime<Utc>) -> u32 {
        self.subscriptions
            .values()
            .filter(|s| s.user_id == user_id && s.id != keep && s.is_in_force(now))
            .map(|s| s.events_used)
            .max()
            .unwrap_or(0)
    }

    fn expire_in_force(&mut self, user_id: UserId, keep: SubscriptionId, now: DateTime<Utc>) {
        for sub in self.subscriptions.values_mut() {
            if sub.user_id == user_id && sub.id != keep && sub.is_in_force(now) {
                sub.status = SubscriptionStatus::Expired;
            }
        }
    }

    /// Activates a subscription, expiring the one previously in force and
    /// carrying its `events_used` over.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`], or [`AppError::Conflict`] when the
    /// subscription was cancelled or its limit cannot hold the carried
    /// usage.
    pub fn activate(
        &mut self,
        id: SubscriptionId,
        now: DateTime<Utc>,
    ) -> Result<&Subscription, AppError> {
        let target = self.subscription(id)?;
        if target.status == SubscriptionStatus::Cancelled {
            return Err(AppError::Conflict(format!("subscription {id} is cancelled")));
        }
        let user_id = target.user_id;
        let limit = target.events_limit;
        let package = find_package(&target.package).copied();

        let carried = self.usage_in_force(user_id, id, now).max(target.events_used);
        check_capacity(limit, carried)?;
        self.expire_in_force(user_id, id, now);
        let sub = self
            .subscriptions
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("subscription {id}")))?;
        sub.status = SubscriptionStatus::Active;
        sub.starts_at = now;
        sub.expires_at = package.and_then(|p| p.expiry_from(now));
        sub.events_used = carried;
        Ok(sub)
    }

    /// Applies an admin patch to a subscription.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`], or [`AppError::Conflict`] when the
    /// subscription to activate was cancelled or the resulting events limit
    /// is below the events used once activation carries usage over. Nothing
    /// is changed on error.
    pub fn update_subscription(
        &mut self,
        id: SubscriptionId,
        patch: SubscriptionPatch,
        now: DateTime<Utc>,
    ) -> Result<Subscription, AppError> {
        let current = self.subscription(id)?;
        let activating = patch.status == Some(SubscriptionStatus::Active);
        if activating && current.status == SubscriptionStatus::Cancelled {
            return Err(AppError::Conflict(format!("subscription {id} is cancelled")));
        }
        let used = if activating {
            self.usage_in_force(current.user_id, id, now)
                .max(current.events_used)
        } else {
            current.events_used
        };
        let limit = patch.events_limit.unwrap_or(current.events_limit);
        check_capacity(limit, used)?;

        let sub = self
            .subscriptions
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("subscription {id}")))?;
        sub.events_limit = limit;
        if let Some(limit) = patch.participants_limit {
            sub.participants_limit = limit;
        }
        if activating {
            self.activate(id, now)?;
        }
        let sub = self
            .subscriptions
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("subscription {id}")))?;
        if let Some(status) = patch.status
            && !activating
        {
            sub.status = status;
        }
        if let Some(expires_at) = patch.expires_at {
            sub.expires_at = expires_at;
        }
        Ok(sub.clone())
    }

    /// Cancels a subscription and voids its pending invoices.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] if the subscription does not exist.
    pub fn cancel_subscription(&mut self, id: SubscriptionId) -> Result<Subscription, AppError> {
        let sub = self
            .subscriptions
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("subscription {id}")))?;
        sub.status = SubscriptionStatus::Cancelled;
        let cancelled = sub.clone();
        for invoice in self.invoices.values_mut() {
            if invoice.subscription_id == id && invoice.status == InvoiceStatus::Pending {
                invoice.status = InvoiceStatus::Cancelled;
            }
        }
        Ok(cancelled)
    }

    /// Takes one event slot from the user's subscription in force.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Forbidden`] when the user has no subscription in
    /// force and [`AppError::LimitExceeded`] when its events limit is used
    /// up. `events_used` never exceeds a non-null `events_limit`.
    pub fn reserve_event_slot(
        &mut self,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<EventSlot, AppError> {
        if self.user(user_id)?.is_admin() {
            return Ok(EventSlot::Unmetered);
        }
        let sub_id = self
            .subscription_in_force(user_id, now)
            .map(|s| s.id)
            .ok_or_else(|| AppError::Forbidden("no active subscription".to_string()))?;
        let sub = self
            .subscriptions
            .get_mut(&sub_id)
            .ok_or_else(|| AppError::NotFound(format!("subscription {sub_id}")))?;
        if !sub.has_event_slot() {
            return Err(AppError::LimitExceeded(format!(
                "package '{}' allows {} event(s)",
                sub.package,
                sub.events_limit.unwrap_or_default()
            )));
        }
        sub.events_used = sub.events_used.saturating_add(1);
        Ok(EventSlot::Reserved {
            subscription_id: sub.id,
            participants_limit: sub.participants_limit,
        })
    }

    /// Returns an event slot to the user's subscription in force.
    pub fn release_event_slot(&mut self, user_id: UserId, now: DateTime<Utc>) {
        let Some(sub_id) = self.subscription_in_force(user_id, now).map(|s| s.id) else {
            return;
        };
        if let Some(sub) = self.subscriptions.get_mut(&sub_id) {
            sub.events_used = sub.events_used.saturating_sub(1);
        }
    }

    // ── Invoices ────────────────────────────────────────────────────────

    /// Returns an invoice.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] if the invoice does not exist.
    pub fn invoice(&self, id: InvoiceId) -> Result<&Invoice, AppError> {
        self.invoices
            .get(&id)
            .ok_or_else(|| AppError::NotFound(format!("invoice {id}")))
    }

    /// Lists invoices, newest first, optionally for one user.
    #[must_use]
    pub fn list_invoices(&self, user_filter: Option<UserId>) -> Vec<Invoice> {
        let mut invoices: Vec<Invoice> = self
            .invoices
            .values()
            .filter(|i| user_filter.is_none_or(|u| i.user_id == u))
            .cloned()
            .collect();
        invoices.sort_by(|a, b| b.issued_at.cmp(&a.issued_at));
        invoices
    }

    /// Marks an invoice paid and activates its subscription.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] or [`AppError::Conflict`] when the
    /// invoice is not pending.
    pub fn pay_invoice(
        &mut self,
        id: InvoiceId,
        now: DateTime<Utc>,
    ) -> Result<(Invoice, Subscription), AppError> {
        let invoice = self.invoice(id)?;
        if invoice.status != InvoiceStatus::Pending {
            return Err(AppError::Conflict(format!("invoice {id} is not pending")));
        }
        let subscription_id = invoice.subscription_id;
        let subscription = self.activate(subscription_id, now)?.clone();
        let invoice = self
            .invoices
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("invoice {id}")))?;
        invoice.status = InvoiceStatus::Paid;
        invoice.paid_at = Some(now);
        Ok((invoice.clone(), subscription))
    }

    // ── Notifications ───────────────────────────────────────────────────

    /// Appends a notification for a user, dropping their oldest ones
    /// beyond [`MAX_NOTIFICATIONS_PER_USER`].
    pub fn notify(
        &mut self,
        user_id: UserId,
        kind: NotificationKind,
        title: impl Into<String>,
        body: impl Into<String>,
        now: DateTime<Utc>,
    ) -> NotificationId {
        let notification = Notification {
            id: NotificationId::new(),
            user_id,
            kind,
            title: title.into(),
            body: body.into(),
            read: false,
            created_at: now,
        };
        let id = notification.id;
        self.notifications.push(notification);

        let held = self
            .notifications
            .iter()
            .filter(|n| n.user_id == user_id)
            .count();
        if held > MAX_NOTIFICATIONS_PER_USER {
            let mut excess = held - MAX_NOTIFICATIONS_PER_USER;
            self.notifications.retain(|n| {
                if excess > 0 && n.user_id == user_id {
                    excess -= 1;
                    false
                } else {
                    true
                }
            });
        }
        id
    }

    /// Returns a page of a user's notifications, newest first, and the
    /// total number matching the filter.
    #[must_use]
    pub fn notifications_for(
        &self,
        user_id: UserId,
        unread_only: bool,
        limit: usize,
        offset: usize,
    ) -> (Vec<Notification>, usize) {
        let matching: Vec<&Notification> = self
            .notifications
            .iter()
            .rev()
            .filter(|n| n.user_id == user_id && (!unread_only || !n.read))
            .collect();
        let total = matching.len();
        let page = matching
            .into_iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect();
        (page, total)
    }

    /// Marks one of a user's notifications as read.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] if the user has no such notification.
    pub fn mark_read(&mut self, user_id: UserId, id: NotificationId) -> Result<(), AppError> {
        let notification = self
            .notifications
            .iter_mut()
            .find(|n| n.id == id && n.user_id == user_id)
            .ok_or_else(|| AppError::NotFound(format!("notification {id}")))?;
        notification.read = true;
        Ok(())
    }
}

fn check_capacity(limit: Option<u32>, used: u32) -> Result<(), AppError> {
    match limit {
        Some(limit) if used > limit => Err(AppError::Conflict(format!(
            "{used} event(s) already created; package allows {limit}"
        ))),
        _ => Ok(()),
    }
}

/// Shared account store.
#[derive(Debug, Default)]
pub struct AccountRegistry {
    state: RwLock<AccountState>,
}

impl AccountRegistry {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires shared read access.
    pub async fn read(&self) -> RwLockReadGuard<'_, AccountState> {
        self.state.read().await
    }

    /// Acquires exclusive write access.
    pub async fn write(&self) -> RwLockWriteGuard<'_, AccountState> {
        self.state.write().await
    }

    /// Returns a copy of the whole state, for snapshots.
    pub async fn snapshot(&self) -> AccountState {
        self.state.read().await.clone()
    }

    /// Replaces the whole state with a restored snapshot.
    pub async fn restore(&self, state: AccountState) {
        *self.state.write().await = state;
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::account::UserRole;

    fn make_user(state: &mut AccountState, role: UserRole) -> UserId {
        let user = User {
            id: UserId::new(),
            email: format!("{}@example.vn", UserId::new()),
            display_name: "Host".to_string(),
            role,
            password_hash: String::new(),
            created_at: Utc::now(),
        };
        let id = user.id;
        if state.insert_user(user).is_err() {
            panic!("insert failed");
        }
        id
    }

    fn package(code: &str) -> &'static Package {
        let Some(p) = find_package(code) else {
            panic!("unknown package {code}");
        };
        p
    }

    #[test]
    fn free_package_activates_immediately() {
        let mut state = AccountState::default();
        let user = make_user(&mut state, UserRole::Organizer);
        let Ok((sub, invoice)) = state.open_subscription(user, package("free"), Utc::now()) else {
            panic!("open failed");
        };
        assert_eq!(sub.status, SubscriptionStatus::Active);
        assert!(invoice.is_none());
    }

    #[test]
    fn events_used_never_exceeds_limit() {
        let mut state = AccountState::default();
        let user = make_user(&mut state, UserRole::Organizer);
        let now = Utc::now();
        assert!(state.open_subscription(user, package("free"), now).is_ok());

        assert!(state.reserve_event_slot(user, now).is_ok());
        assert!(matches!(
            state.reserve_event_slot(user, now),
            Err(AppError::LimitExceeded(_))
        ));
        let Some(sub) = state.subscription_in_force(user, now) else {
            panic!("subscription missing");
        };
        assert_eq!(sub.events_used, 1);
        assert_eq!(sub.events_limit, Some(1));
    }

    #[test]
    fn released_slot_can_be_reused() {
        let mut state = AccountState::default();
        let user = make_user(&mut state, UserRole::Organizer);
        let now = Utc::now();
        assert!(state.open_subscription(user, package("free"), now).is_ok());
        assert!(state.reserve_event_slot(user, now).is_ok());
        state.release_event_slot(user, now);
        assert!(state.reserve_event_slot(user, now).is_ok());
    }

    #[test]
    fn admins_are_unmetered() {
        let mut state = AccountState::default();
        let admin = make_user(&mut state, UserRole::Admin);
        assert!(matches!(
            state.reserve_event_slot(admin, Utc::now()),
            Ok(EventSlot::Unmetered)
        ));
    }

    #[test]
    fn no_subscription_is_forbidden() {
        let mut state = AccountState::default();
        let user = make_user(&mut state, UserRole::Organizer);
        assert!(matches!(
            state.reserve_event_slot(user, Utc::now()),
            Err(AppError::Forbidden(_))
        ));
    }

    #[test]
    fn paying_invoice_upgrades_and_carries_usage() {
        let mut state = AccountState::default();
        let user = make_user(&mut state, UserRole::Organizer);
        let now = Utc::now();
        let Ok((free, _)) = state.open_subscription(user, package("free"), now) else {
            panic!("open failed");
        };
        assert!(state.reserve_event_slot(user, now).is_ok());

        let Ok((pending, invoice)) = state.open_subscription(user, package("standard"), now) else {
            panic!("open failed");
        };
        assert_eq!(pending.status, SubscriptionStatus::Pending);
        let Some(invoice) = invoice else {
            panic!("paid package should issue an invoice");
        };
        assert_eq!(invoice.amount_vnd, package("standard").price_vnd);

        let Ok((paid, active)) = state.pay_invoice(invoice.id, now) else {
            panic!("payment failed");
        };
        assert_eq!(paid.status, InvoiceStatus::Paid);
        assert_eq!(active.status, SubscriptionStatus::Active);
        assert_eq!(active.events_used, 1);
        assert!(active.expires_at.is_some());
        assert!(matches!(
            state.subscription(free.id).map(|s| s.status),
            Ok(SubscriptionStatus::Expired)
        ));
        assert!(matches!(
            state.pay_invoice(invoice.id, now),
            Err(AppError::Conflict(_))
        ));
    }

    #[test]
    fn limit_cannot_drop_below_usage() {
        let mut state = AccountState::default();
        let user = make_user(&mut state, UserRole::Organizer);
        let now = Utc::now();
        let Ok((sub, _)) = state.open_subscription(user, package("free"), now) else {
            panic!("open failed");
        };
        assert!(state.reserve_event_slot(user, now).is_ok());

        let patch = SubscriptionPatch {
            events_limit: Some(Some(0)),
            ..SubscriptionPatch::default()
        };
        assert!(matches!(
            state.update_subscription(sub.id, patch, now),
            Err(AppError::Conflict(_))
        ));
    }

    #[test]
    fn activation_cannot_set_limit_below_carried_usage() {
        let mut state = AccountState::default();
        let user = make_user(&mut state, UserRole::Organizer);
        let now = Utc::now();
        assert!(state.open_subscription(user, package("free"), now).is_ok());
        assert!(state.reserve_event_slot(user, now).is_ok());
        let Ok((pending, _)) = state.open_subscription(user, package("standard"), now) else {
            panic!("open failed");
        };
        assert_eq!(pending.status, SubscriptionStatus::Pending);

        let patch = SubscriptionPatch {
            status: Some(SubscriptionStatus::Active),
            events_limit: Some(Some(0)),
            ..SubscriptionPatch::default()
        };
        assert!(matches!(
            state.update_subscription(pending.id, patch, now),
            Err(AppError::Conflict(_))
        ));
        let Ok(untouched) = state.subscription(pending.id) else {
            panic!("subscription missing");
        };
        assert_eq!(untouched.status, SubscriptionStatus::Pending);
        assert_eq!(untouched.events_limit, pending.events_limit);

        let patch = SubscriptionPatch {
            status: Some(SubscriptionStatus::Active),
            events_limit: Some(Some(1)),
            ..SubscriptionPatch::default()
        };
        let Ok(active) = state.update_subscription(pending.id, patch, now) else {
            panic!("activation failed");
        };
        assert_eq!(active.status, SubscriptionStatus::Active);
        assert_eq!(active.events_used, 1);
        assert_eq!(active.events_limit, Some(1));
        for sub in state.subscriptions.values().filter(|s| s.user_id == user) {
            assert!(sub.events_limit.is_none_or(|limit| sub.events_used <= limit));
        }
    }

    #[test]
    fn notifications_are_capped_per_user() {
        let mut state = AccountState::default();
        let user = make_user(&mut state, UserRole::Organizer);
        let other = make_user(&mut state, UserRole::Organizer);
        let now = Utc::now();
        let first = state.notify(other, NotificationKind::Account, "kept", "", now);
        for i in 0..MAX_NOTIFICATIONS_PER_USER + 5 {
            let _ = state.notify(user, NotificationKind::Account, format!("n{i}"), "", now);
        }
        let (page, total) = state.notifications_for(user, false, 1, 0);
        assert_eq!(total, MAX_NOTIFICATIONS_PER_USER);
        assert!(page.first().is_some_and(|n| n.title == format!("n{}", MAX_NOTIFICATIONS_PER_USER + 4)));
        assert!(state.notifications.iter().any(|n| n.id == first));
        assert!(!state.notifications.iter().any(|n| n.title == "n0"));
    }

    #[test]
    fn cancelling_voids_pending_invoice() {
        let mut state = AccountState::default();
        let user = make_user(&mut state, UserRole::Organizer);
        let Ok((sub, invoice)) = state.open_subscription(user, package("premium"), Utc::now()) else {
            panic!("open failed");
        };
        let Some(invoice) = invoice else {
            panic!("invoice expected");
        };
        assert!(state.cancel_subscription(sub.id).is_ok());
        assert!(matches!(
            state.invoice(invoice.id).map(|i| i.status),
            Ok(InvoiceStatus::Cancelled)
        ));
    }

    #[test]
    fn notifications_page_newest_first() {
        let mut state = AccountState::default();
        let user = make_user(&mut state, UserRole::Organizer);
        let now = Utc::now();
        state.notify(user, NotificationKind::Account, "first", "", now);
        let second = state.notify(user, NotificationKind::Event, "second", "", now);

        let (page, total) = state.notifications_for(user, false, 1, 0);
        assert_eq!(total, 2);
        assert_eq!(page.first().map(|n| n.id), Some(second));

        assert!(state.mark_read(user, second).is_ok());
        let (unread, unread_total) = state.notifications_for(user, true, 10, 0);
        assert_eq!(unread_total, 1);
        assert_eq!(unread.first().map(|n| n.title.as_str()), Some("first"));
    }
}
