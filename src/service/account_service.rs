//! Account service: sign-up, login, subscriptions, invoices, notifications.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use super::event_service::{EventService, NewEvent};
use crate::auth::password::{
    DEFAULT_HASH_COST, hash_password, validate_password, verify_password,
};
use crate::auth::{IssuedSession, Principal, SessionStore};
use crate::domain::account::{
    Invoice, Notification, NotificationKind, Subscription, SubscriptionStatus, User, UserRole,
    find_package,
};
use crate::domain::account_registry::SubscriptionPatch;
use crate::domain::event::Event;
use crate::domain::event_entry::required_text;
use crate::domain::{
    AccountRegistry, DomainEvent, EventBus, InvoiceId, NotificationId, SubscriptionId, UserId,
};
use crate::error::AppError;

/// Public view of a user (no credentials).
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UserProfile {
    /// User identifier.
    pub id: UserId,
    /// Login email.
    pub email: String,
    /// Display name.
    pub display_name: String,
    /// Platform role.
    pub role: UserRole,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            display_name: user.display_name.clone(),
            role: user.role,
            created_at: user.created_at,
        }
    }
}

/// A signed-in user.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UserSession {
    /// Bearer session.
    pub session: IssuedSession,
    /// The user.
    pub user: UserProfile,
    /// Event provisioned at sign-up.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_event: Option<Event>,
}

/// A new subscription and its invoice, if the package is paid.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SubscriptionOrder {
    /// The subscription (active for free packages, pending otherwise).
    pub subscription: Subscription,
    /// Invoice to pay before a paid subscription activates.
    pub invoice: Option<Invoice>,
}

/// Sign-up form.
#[derive(Debug, Clone, Default)]
pub struct Signup {
    /// Login email.
    pub email: String,
    /// Password.
    pub password: String,
    /// Display name; derived from the email when absent.
    pub display_name: Option<String>,
    /// Name of the auto-provisioned first event.
    pub event_name: Option<String>,
}

/// Orchestration layer for accounts and billing.
#[derive(Debug, Clone)]
pub struct AccountService {
    accounts: Arc<AccountRegistry>,
    events: Arc<EventService>,
    sessions: Arc<SessionStore>,
    event_bus: EventBus,
    hash_cost: u32,
}

impl AccountService {
    /// Creates a new `AccountService`.
    #[must_use]
    pub fn new(
        accounts: Arc<AccountRegistry>,
        events: Arc<EventService>,
        sessions: Arc<SessionStore>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            accounts,
            events,
            sessions,
            event_bus,
            hash_cost: DEFAULT_HASH_COST,
        }
    }

    /// Sets the bcrypt cost used for new password hashes.
    #[must_use]
    pub fn with_hash_cost(mut self, cost: u32) -> Self {
        self.hash_cost = cost;
        self
    }

    /// Returns a reference to the inner [`AccountRegistry`].
    #[must_use]
    pub fn registry(&self) -> &Arc<AccountRegistry> {
        &self.accounts
    }

    // ── Identity ────────────────────────────────────────────────────────

    /// Registers an organizer with an active free subscription and a first
    /// event, and signs them in.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::InvalidRequest`] for a malformed email, weak
    /// password or bad name, and [`AppError::Conflict`] when the email is
    /// taken.
    pub async fn signup(&self, form: Signup) -> Result<UserSession, AppError> {
        let email = normalize_email(&form.email)?;
        validate_password(&form.password)?;
        let display_name = match form.display_name.as_deref() {
            Some(name) => required_text(name, "display name")?,
            None => email.split('@').next().unwrap_or_default().to_string(),
        };
        let Some(free) = find_package("free") else {
            return Err(AppError::Internal("free package missing".to_string()));
        };

        let password_hash = hash_password(&form.password, self.hash_cost).await?;
        let now = Utc::now();
        let user = User {
            id: UserId::new(),
            email,
            display_name,
            role: UserRole::Organizer,
            password_hash,
            created_at: now,
        };
        let subscription = {
            let mut accounts = self.accounts.write().await;
            accounts.insert_user(user.clone())?;
            let (subscription, _) = accounts.open_subscription(user.id, free, now)?;
            accounts.notify(
                user.id,
                NotificationKind::Account,
                "Welcome to Bright4Event",
                format!(
                    "Your free plan includes {} event(s) with up to {} guests.",
                    free.events_limit.unwrap_or_default(),
                    free.participants_limit.unwrap_or_default()
                ),
                now,
            );
            subscription
        };

        let _ = self.event_bus.publish(DomainEvent::UserRegistered {
            user_id: user.id,
            email: user.email.clone(),
            timestamp: now,
        });
        let _ = self.event_bus.publish(DomainEvent::SubscriptionActivated {
            subscription_id: subscription.id,
            user_id: user.id,
            package: subscription.package,
            timestamp: now,
        });
        tracing::info!(user_id = %user.id, "organizer registered");

        let event_name = form
            .event_name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| format!("{}'s event", user.display_name));
        let first_event = match self
            .events
            .create_event(
                &user,
                NewEvent {
                    name: event_name,
                    ..NewEvent::default()
                },
            )
            .await
        {
            Ok(event) => Some(event),
            Err(err) => {
                tracing::warn!(user_id = %user.id, error = %err, "first event not provisioned");
                None
            }
        };

        let session = self.sessions.issue(Principal::user(user.id), now)?;
        Ok(UserSession {
            session,
            user: UserProfile::from(&user),
            first_event,
        })
    }

    /// Signs a user in.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Unauthorized`] for an unknown email or a wrong
    /// password.
    pub async fn login(&self, email: &str, password: &str) -> Result<UserSession, AppError> {
        let email = email.trim().to_lowercase();
        let user = self.accounts.read().await.user_by_email(&email).cloned();
        let verified = match &user {
            Some(u) => verify_password(password, &u.password_hash).await,
            None => false,
        };
        let (Some(user), true) = (user, verified) else {
            tracing::warn!("rejected login");
            return Err(AppError::Unauthorized("invalid email or password".to_string()));
        };
        let session = self
            .sessions
            .issue(Principal::user(user.id), Utc::now())?;
        tracing::debug!(user_id = %user.id, "user signed in");
        Ok(UserSession {
            session,
            user: UserProfile::from(&user),
            first_event: None,
        })
    }

    /// Revokes a session token.
    pub async fn logout(&self, token: &str) {
        self.sessions.revoke(token).await;
    }

    /// Changes a password and signs out the user's other sessions.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Unauthorized`] when `current` is wrong and
    /// [`AppError::InvalidRequest`] when `new` is too weak.
    pub async fn change_password(
        &self,
        user: &User,
        token: &str,
        current: &str,
        new: &str,
    ) -> Result<(), AppError> {
        if !verify_password(current, &user.password_hash).await {
            return Err(AppError::Unauthorized(
                "current password is incorrect".to_string(),
            ));
        }
        validate_password(new)?;
        let password_hash = hash_password(new, self.hash_cost).await?;
        {
            let mut accounts = self.accounts.write().await;
            accounts.set_password_hash(user.id, password_hash)?;
            accounts.notify(
                user.id,
                NotificationKind::Account,
                "Password changed",
                "Other sessions were signed out.",
                Utc::now(),
            );
        }
        self.sessions
            .revoke_user(user.id, Some(token), Utc::now())
            .await;
        tracing::info!(user_id = %user.id, "password changed");
        Ok(())
    }

    /// Creates the platform admin account if it does not exist yet.
    /// Returns `true` when an account was created.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::InvalidRequest`] for a malformed email or weak
    /// password.
    pub async fn bootstrap_admin(&self, email: &str, password: &str) -> Result<bool, AppError> {
        let email = normalize_email(email)?;
        validate_password(password)?;
        if let Some(existing) = self.accounts.read().await.user_by_email(&email) {
            if !existing.is_admin() {
                tracing::warn!(%email, "bootstrap admin email belongs to an organizer");
            }
            return Ok(false);
        }
        let password_hash = hash_password(password, self.hash_cost).await?;
        let mut accounts = self.accounts.write().await;
        if accounts.user_by_email(&email).is_some() {
            return Ok(false);
        }
        let user = User {
            id: UserId::new(),
            email,
            display_name: "Administrator".to_string(),
            role: UserRole::Admin,
            password_hash,
            created_at: Utc::now(),
        };
        let user_id = user.id;
        accounts.insert_user(user)?;
        tracing::info!(%user_id, "bootstrap admin created");
        Ok(true)
    }

    /// Returns a user.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] if the user does not exist.
    pub async fn user(&self, user_id: UserId) -> Result<User, AppError> {
        self.accounts.read().await.user(user_id).cloned()
    }

    // ── Subscriptions ───────────────────────────────────────────────────

    /// Lists subscriptions: the caller's own, or all for admins.
    pub async fn list_subscriptions(&self, user: &User) -> Vec<Subscription> {
        let filter = (!user.is_admin()).then_some(user.id);
        self.accounts.read().await.list_subscriptions(filter)
    }

    /// Subscribes the caller to a package.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::InvalidRequest`] for an unknown package and
    /// [`AppError::Conflict`] when a free package cannot hold the events
    /// already created.
    pub async fn open_subscription(
        &self,
        user: &User,
        package_code: &str,
    ) -> Result<SubscriptionOrder, AppError> {
        let package = find_package(package_code.trim())
            .ok_or_else(|| AppError::InvalidRequest(format!("unknown package '{package_code}'")))?;
        let now = Utc::now();
        let (subscription, invoice) = {
            let mut accounts = self.accounts.write().await;
            let (subscription, invoice) = accounts.open_subscription(user.id, package, now)?;
            if let Some(invoice) = &invoice {
                accounts.notify(
                    user.id,
                    NotificationKind::Billing,
                    "Invoice issued",
                    format!(
                        "Pay {} VND to activate the '{}' package.",
                        invoice.amount_vnd, package.name
                    ),
                    now,
                );
            }
            (subscription, invoice)
        };
        if subscription.status == SubscriptionStatus::Active {
            let _ = self.event_bus.publish(DomainEvent::SubscriptionActivated {
                subscription_id: subscription.id,
                user_id: user.id,
                package: subscription.package.clone(),
                timestamp: now,
            });
        }
        tracing::info!(
            user_id = %user.id,
            subscription_id = %subscription.id,
            package = package.code,
            "subscription opened"
        );
        Ok(SubscriptionOrder {
            subscription,
            invoice,
        })
    }

    /// Returns a subscription visible to the caller.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] or [`AppError::Forbidden`] for other
    /// users' subscriptions.
    pub async fn get_subscription(
        &self,
        user: &User,
        id: SubscriptionId,
    ) -> Result<Subscription, AppError> {
        let accounts = self.accounts.read().await;
        let subscription = accounts.subscription(id)?;
        owner_or_admin(user, subscription.user_id)?;
        Ok(subscription.clone())
    }

    /// Applies an admin change to a subscription.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Forbidden`] for non-admins, [`AppError::NotFound`],
    /// and [`AppError::Conflict`] when `events_limit` would drop below
    /// `events_used`.
    pub async fn update_subscription(
        &self,
        user: &User,
        id: SubscriptionId,
        patch: SubscriptionPatch,
    ) -> Result<Subscription, AppError> {
        require_admin(user)?;
        let now = Utc::now();
        let (before, after) = {
            let mut accounts = self.accounts.write().await;
            let before = accounts.subscription(id)?.status;
            let after = accounts.update_subscription(id, patch, now)?;
            (before, after)
        };
        if before != SubscriptionStatus::Active && after.status == SubscriptionStatus::Active {
            let _ = self.event_bus.publish(DomainEvent::SubscriptionActivated {
                subscription_id: after.id,
                user_id: after.user_id,
                package: after.package.clone(),
                timestamp: now,
            });
        }
        tracing::info!(subscription_id = %id, admin_id = %user.id, "subscription updated");
        Ok(after)
    }

    /// Cancels a subscription and voids its pending invoices.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] or [`AppError::Forbidden`] for other
    /// users' subscriptions.
    pub async fn cancel_subscription(
        &self,
        user: &User,
        id: SubscriptionId,
    ) -> Result<Subscription, AppError> {
        let mut accounts = self.accounts.write().await;
        owner_or_admin(user, accounts.subscription(id)?.user_id)?;
        let cancelled = accounts.cancel_subscription(id)?;
        accounts.notify(
            cancelled.user_id,
            NotificationKind::Billing,
            "Subscription cancelled",
            format!("Your '{}' subscription was cancelled.", cancelled.package),
            Utc::now(),
        );
        tracing::info!(subscription_id = %id, "subscription cancelled");
        Ok(cancelled)
    }

    // ── Invoices ────────────────────────────────────────────────────────

    /// Lists invoices: the caller's own, or all for admins.
    pub async fn list_invoices(&self, user: &User) -> Vec<Invoice> {
        let filter = (!user.is_admin()).then_some(user.id);
        self.accounts.read().await.list_invoices(filter)
    }

    /// Records payment of an invoice and activates its subscription.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Forbidden`] for non-admins, [`AppError::NotFound`]
    /// and [`AppError::Conflict`] when the invoice is not pending.
    pub async fn pay_invoice(&self, user: &User, id: InvoiceId) -> Result<Invoice, AppError> {
        require_admin(user)?;
        let now = Utc::now();
        let (invoice, subscription) = {
            let mut accounts = self.accounts.write().await;
            let (invoice, subscription) = accounts.pay_invoice(id, now)?;
            accounts.notify(
                invoice.user_id,
                NotificationKind::Billing,
                "Payment received",
                format!("Your '{}' package is now active.", subscription.package),
                now,
            );
            (invoice, subscription)
        };
        let _ = self.event_bus.publish(DomainEvent::InvoicePaid {
            invoice_id: invoice.id,
            user_id: invoice.user_id,
            amount_vnd: invoice.amount_vnd,
            timestamp: now,
        });
        let _ = self.event_bus.publish(DomainEvent::SubscriptionActivated {
            subscription_id: subscription.id,
            user_id: subscription.user_id,
            package: subscription.package,
            timestamp: now,
        });
        tracing::info!(invoice_id = %id, "invoice paid");
        Ok(invoice)
    }

    // ── Notifications ───────────────────────────────────────────────────

    /// Returns a page of the caller's notifications, newest first, and the
    /// total matching the filter.
    pub async fn notifications(
        &self,
        user: &User,
        unread_only: bool,
        limit: usize,
        offset: usize,
    ) -> (Vec<Notification>, usize) {
        self.accounts
            .read()
            .await
            .notifications_for(user.id, unread_only, limit, offset)
    }

    /// Marks one of the caller's notifications as read.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] if the caller has no such
    /// notification.
    pub async fn mark_notification_read(
        &self,
        user: &User,
        id: NotificationId,
    ) -> Result<(), AppError> {
        self.accounts.write().await.mark_read(user.id, id)
    }
}

fn require_admin(user: &User) -> Result<(), AppError> {
    if user.is_admin() {
        Ok(())
    } else {
        Err(AppError::Forbidden("platform admin required".to_string()))
    }
}

fn owner_or_admin(user: &User, owner: UserId) -> Result<(), AppError> {
    if user.is_admin() || user.id == owner {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "resource belongs to another user".to_string(),
        ))
    }
}

fn normalize_email(raw: &str) -> Result<String, AppError> {
    let email = raw.trim().to_lowercase();
    let valid = email.len() <= 254
        && email.split_once('@').is_some_and(|(local, domain)| {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !domain.contains('@')
        })
        && !email.chars().any(char::is_whitespace);
    if valid {
        Ok(email)
    } else {
        Err(AppError::InvalidRequest(format!("invalid email '{raw}'")))
    }
}
