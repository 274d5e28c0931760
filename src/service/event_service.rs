//! Event service: admin-console operations on events, catalogs and guests.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use super::{checked_in_event, tally_updated};
use crate::auth::SessionStore;
use crate::domain::account::{NotificationKind, User};
use crate::domain::account_registry::EventSlot;
use crate::domain::domain_event::CatalogChange;
use crate::domain::event::{
    Candidate, Category, CheckinRules, Event, EventSettings, KNOWN_MODULES, Voter,
};
use crate::domain::event_entry::{
    CandidatePatch, CategoryPatch, EventEntry, NewCandidate, NewCategory, required_text,
};
use crate::domain::event_registry::EventSummary;
use crate::domain::identity::{generate_code, normalize_code, normalize_phone};
use crate::domain::tally::{EventResults, compute_results};
use crate::domain::{
    AccountRegistry, CandidateId, CategoryId, DomainEvent, EventBus, EventId, EventRegistry,
    VoterId,
};
use crate::error::AppError;

/// Largest guest batch accepted by a single import.
pub const MAX_IMPORT_BATCH: usize = 5_000;

/// Fields for a new event.
#[derive(Debug, Clone, Default)]
pub struct NewEvent {
    /// Display name.
    pub name: String,
    /// Requested public code; generated when `None`.
    pub code: Option<String>,
    /// Voting opens at this instant.
    pub voting_starts_at: Option<DateTime<Utc>>,
    /// Voting closes at this instant.
    pub voting_ends_at: Option<DateTime<Utc>>,
    /// Initial settings.
    pub settings: Option<EventSettings>,
}

/// Partial update of an event. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct EventPatch {
    /// New display name.
    pub name: Option<String>,
    /// New voting start (`Some(None)` clears it).
    pub voting_starts_at: Option<Option<DateTime<Utc>>>,
    /// New voting end (`Some(None)` clears it).
    pub voting_ends_at: Option<Option<DateTime<Utc>>>,
    /// Activate or deactivate the event.
    pub is_active: Option<bool>,
    /// New theme (`Some(None)` clears it).
    pub theme: Option<Option<String>>,
    /// Toggle live results for guests.
    pub show_live_results: Option<bool>,
    /// Replace the check-in rules.
    pub checkin: Option<CheckinRules>,
}

/// One row of a guest-list import.
#[derive(Debug, Clone, Default)]
pub struct GuestImport {
    /// Phone number in any accepted format.
    pub phone: Option<String>,
    /// Guest name.
    pub name: Option<String>,
}

/// A rejected import row.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ImportSkip {
    /// Zero-based row index in the request.
    pub row: usize,
    /// Why the row was skipped.
    pub reason: String,
}

/// Outcome of a guest-list import.
#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct ImportReport {
    /// Voters created, with their generated access codes.
    pub imported: Vec<Voter>,
    /// Rows that were not imported.
    pub skipped: Vec<ImportSkip>,
}

/// Orchestration layer for admin-console operations.
///
/// Every mutation follows the same pattern: resolve the event, check the
/// caller owns it (or is a platform admin), mutate under the per-event
/// write lock, release the lock, then publish domain events.
#[derive(Debug, Clone)]
pub struct EventService {
    registry: Arc<EventRegistry>,
    accounts: Arc<AccountRegistry>,
    sessions: Arc<SessionStore>,
    event_bus: EventBus,
}

impl EventService {
    /// Creates a new `EventService`.
    #[must_use]
    pub fn new(
        registry: Arc<EventRegistry>,
        accounts: Arc<AccountRegistry>,
        sessions: Arc<SessionStore>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            registry,
            accounts,
            sessions,
            event_bus,
        }
    }

    /// Returns a reference to the inner [`EventRegistry`].
    #[must_use]
    pub fn registry(&self) -> &Arc<EventRegistry> {
        &self.registry
    }

    /// Returns a reference to the inner [`EventBus`].
    #[must_use]
    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    // ── Events ──────────────────────────────────────────────────────────

    /// Creates an event owned by `owner`, charging one slot of the owner's
    /// subscription. The participant limit is copied from that
    /// subscription.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::InvalidRequest`] for a bad name, code or voting
    /// window, [`AppError::Conflict`] for a taken code, and
    /// [`AppError::Forbidden`] or [`AppError::LimitExceeded`] when the
    /// subscription does not allow another event.
    pub async fn create_event(&self, owner: &User, new: NewEvent) -> Result<Event, AppError> {
        let name = required_text(&new.name, "event name")?;
        validate_window(new.voting_starts_at, new.voting_ends_at)?;
        let code = match new.code.as_deref() {
            Some(raw) => {
                let code = validate_code(raw)?;
                if self.registry.code_in_use(&code).await {
                    return Err(AppError::Conflict(format!("event code {code} already in use")));
                }
                code
            }
            None => self.unused_code().await,
        };
        let mut settings = new.settings.unwrap_or_default();
        validate_modules(&settings)?;
        settings.theme = clean_optional(settings.theme);

        let now = Utc::now();
        let slot = self.accounts.write().await.reserve_event_slot(owner.id, now)?;
        let participant_limit = match slot {
            EventSlot::Unmetered => None,
            EventSlot::Reserved {
                participants_limit, ..
            } => participants_limit,
        };

        let event = Event {
            id: EventId::new(),
            name,
            code,
            owner_id: owner.id,
            voting_starts_at: new.voting_starts_at,
            voting_ends_at: new.voting_ends_at,
            is_active: true,
            participant_limit,
            settings,
            created_at: now,
            updated_at: now,
        };
        if let Err(err) = self.registry.insert(EventEntry::new(event.clone())).await {
            self.accounts.write().await.release_event_slot(owner.id, now);
            return Err(err);
        }

        {
            let mut accounts = self.accounts.write().await;
            accounts.notify(
                owner.id,
                NotificationKind::Event,
                "Event created",
                format!("\"{}\" is ready. Guests join with code {}.", event.name, event.code),
                now,
            );
            if let EventSlot::Reserved {
                subscription_id, ..
            } = slot
                && let Ok(sub) = accounts.subscription(subscription_id)
                && !sub.has_event_slot()
            {
                let body = format!(
                    "All {} event(s) of your '{}' package are in use.",
                    sub.events_used, sub.package
                );
                accounts.notify(owner.id, NotificationKind::Limit, "Event quota reached", body, now);
            }
        }

        let _ = self.event_bus.publish(DomainEvent::EventCreated {
            event_id: event.id,
            owner_id: owner.id,
            name: event.name.clone(),
            code: event.code.clone(),
            timestamp: now,
        });

        tracing::info!(event_id = %event.id, owner_id = %owner.id, code = %event.code, "event created");
        Ok(event)
    }

    async fn unused_code(&self) -> String {
        let mut code = generate_code();
        while self.registry.code_in_use(&code).await {
            code = generate_code();
        }
        code
    }

    /// Lists events visible to `user`: their own, or all for admins.
    pub async fn list_events(&self, user: &User) -> Vec<EventSummary> {
        let filter = (!user.is_admin()).then_some(user.id);
        self.registry.list(filter).await
    }

    /// Returns an event.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::EventNotFound`] or [`AppError::Forbidden`].
    pub async fn get_event(&self, user: &User, event_id: EventId) -> Result<Event, AppError> {
        let entry_lock = self.registry.get(event_id).await?;
        let entry = entry_lock.read().await;
        authorize(&entry, user)?;
        Ok(entry.event.clone())
    }

    /// Applies a partial update to an event.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::EventNotFound`], [`AppError::Forbidden`] or
    /// [`AppError::InvalidRequest`] for a bad name or voting window.
    pub async fn update_event(
        &self,
        user: &User,
        event_id: EventId,
        patch: EventPatch,
    ) -> Result<Event, AppError> {
        let name = patch
            .name
            .as_deref()
            .map(|n| required_text(n, "event name"))
            .transpose()?;

        let entry_lock = self.registry.get(event_id).await?;
        let mut entry = entry_lock.write().await;
        authorize(&entry, user)?;

        let starts = patch
            .voting_starts_at
            .unwrap_or(entry.event.voting_starts_at);
        let ends = patch.voting_ends_at.unwrap_or(entry.event.voting_ends_at);
        validate_window(starts, ends)?;

        let now = Utc::now();
        let event = &mut entry.event;
        if let Some(name) = name {
            event.name = name;
        }
        event.voting_starts_at = starts;
        event.voting_ends_at = ends;
        if let Some(active) = patch.is_active {
            event.is_active = active;
        }
        if let Some(theme) = patch.theme {
            event.settings.theme = clean_optional(theme);
        }
        if let Some(show) = patch.show_live_results {
            event.settings.show_live_results = show;
        }
        if let Some(checkin) = patch.checkin {
            event.settings.checkin = checkin;
        }
        event.updated_at = now;
        entry.last_modified_at = now;
        let updated = entry.event.clone();
        drop(entry);

        self.catalog_changed(event_id, CatalogChange::Event, now);
        tracing::info!(%event_id, "event updated");
        Ok(updated)
    }

    /// Deletes an event, returning its slot to the owner's subscription
    /// and revoking its guest sessions.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::EventNotFound`] or [`AppError::Forbidden`].
    pub async fn delete_event(&self, user: &User, event_id: EventId) -> Result<(), AppError> {
        {
            let entry_lock = self.registry.get(event_id).await?;
            let entry = entry_lock.read().await;
            authorize(&entry, user)?;
        }
        let removed = self.registry.remove(event_id).await?;
        let owner_id = removed.event.owner_id;
        let now = Utc::now();
        {
            let mut accounts = self.accounts.write().await;
            let owner_is_admin = accounts.user(owner_id).is_ok_and(User::is_admin);
            if !owner_is_admin {
                accounts.release_event_slot(owner_id, now);
            }
        }
        self.sessions.revoke_event(event_id, now).await;

        let _ = self.event_bus.publish(DomainEvent::EventRemoved {
            event_id,
            name: removed.event.name,
            timestamp: now,
        });

        tracing::info!(%event_id, "event deleted");
        Ok(())
    }

    /// Stores a module configuration document, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::InvalidRequest`] for an unknown module or a
    /// non-object document, plus the access errors of
    /// [`Self::get_event`].
    pub async fn upsert_module(
        &self,
        user: &User,
        event_id: EventId,
        module: &str,
        config: serde_json::Value,
    ) -> Result<EventSettings, AppError> {
        if !KNOWN_MODULES.contains(&module) {
            return Err(AppError::InvalidRequest(format!(
                "unknown module '{module}'; expected one of {}",
                KNOWN_MODULES.join(", ")
            )));
        }
        if !config.is_object() {
            return Err(AppError::InvalidRequest(
                "module configuration must be a JSON object".to_string(),
            ));
        }
        let now = Utc::now();
        let settings = self
            .mutate(user, event_id, |entry| {
                entry.event.settings.modules.insert(module.to_string(), config);
                entry.event.updated_at = now;
                entry.last_modified_at = now;
                Ok(entry.event.settings.clone())
            })
            .await?;
        self.catalog_changed(event_id, CatalogChange::Event, now);
        Ok(settings)
    }

    /// Removes a module configuration document.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] if the module is not configured, plus
    /// the access errors of [`Self::get_event`].
    pub async fn remove_module(
        &self,
        user: &User,
        event_id: EventId,
        module: &str,
    ) -> Result<(), AppError> {
        let now = Utc::now();
        self.mutate(user, event_id, |entry| {
            entry
                .event
                .settings
                .modules
                .remove(module)
                .ok_or_else(|| AppError::NotFound(format!("module {module}")))?;
            entry.event.updated_at = now;
            entry.last_modified_at = now;
            Ok(())
        })
        .await?;
        self.catalog_changed(event_id, CatalogChange::Event, now);
        Ok(())
    }

    // ── Categories ──────────────────────────────────────────────────────

    /// Lists the categories of an event in display order.
    ///
    /// # Errors
    ///
    /// Returns the access errors of [`Self::get_event`].
    pub async fn list_categories(
        &self,
        user: &User,
        event_id: EventId,
    ) -> Result<Vec<Category>, AppError> {
        let entry_lock = self.registry.get(event_id).await?;
        let entry = entry_lock.read().await;
        authorize(&entry, user)?;
        Ok(entry.ordered_categories().into_iter().cloned().collect())
    }

    /// Adds a category.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::InvalidRequest`] for a bad name or allowance,
    /// plus the access errors of [`Self::get_event`].
    pub async fn create_category(
        &self,
        user: &User,
        event_id: EventId,
        new: NewCategory,
    ) -> Result<Category, AppError> {
        let now = Utc::now();
        let category = self
            .mutate(user, event_id, |entry| entry.add_category(new, now))
            .await?;
        self.catalog_changed(event_id, CatalogChange::Category, now);
        tracing::info!(%event_id, category_id = %category.id, "category created");
        Ok(category)
    }

    /// Updates a category.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::CategoryNotFound`] or
    /// [`AppError::InvalidRequest`], plus the access errors of
    /// [`Self::get_event`].
    pub async fn update_category(
        &self,
        user: &User,
        event_id: EventId,
        category_id: CategoryId,
        patch: CategoryPatch,
    ) -> Result<Category, AppError> {
        let now = Utc::now();
        let category = self
            .mutate(user, event_id, |entry| {
                entry.update_category(category_id, patch, now)
            })
            .await?;
        self.catalog_changed(event_id, CatalogChange::Category, now);
        Ok(category)
    }

    /// Deletes a category with its candidates and votes.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::CategoryNotFound`], plus the access errors of
    /// [`Self::get_event`].
    pub async fn delete_category(
        &self,
        user: &User,
        event_id: EventId,
        category_id: CategoryId,
    ) -> Result<(), AppError> {
        let now = Utc::now();
        self.mutate(user, event_id, |entry| entry.remove_category(category_id, now))
            .await?;
        self.catalog_changed(event_id, CatalogChange::Category, now);
        tracing::info!(%event_id, %category_id, "category deleted");
        Ok(())
    }

    // ── Candidates ──────────────────────────────────────────────────────

    /// Lists the candidates of a category in display order.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::CategoryNotFound`], plus the access errors of
    /// [`Self::get_event`].
    pub async fn list_candidates(
        &self,
        user: &User,
        event_id: EventId,
        category_id: CategoryId,
    ) -> Result<Vec<Candidate>, AppError> {
        let entry_lock = self.registry.get(event_id).await?;
        let entry = entry_lock.read().await;
        authorize(&entry, user)?;
        entry.category(category_id)?;
        Ok(entry.candidates_in(category_id).into_iter().cloned().collect())
    }

    /// Nominates a candidate in a category.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::CategoryNotFound`] or
    /// [`AppError::InvalidRequest`], plus the access errors of
    /// [`Self::get_event`].
    pub async fn create_candidate(
        &self,
        user: &User,
        event_id: EventId,
        category_id: CategoryId,
        new: NewCandidate,
    ) -> Result<Candidate, AppError> {
        let now = Utc::now();
        let candidate = self
            .mutate(user, event_id, |entry| {
                entry.add_candidate(category_id, new, now)
            })
            .await?;
        self.catalog_changed(event_id, CatalogChange::Candidate, now);
        Ok(candidate)
    }

    /// Updates a candidate.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::CandidateNotFound`] or
    /// [`AppError::InvalidRequest`], plus the access errors of
    /// [`Self::get_event`].
    pub async fn update_candidate(
        &self,
        user: &User,
        event_id: EventId,
        candidate_id: CandidateId,
        patch: CandidatePatch,
    ) -> Result<Candidate, AppError> {
        let now = Utc::now();
        let candidate = self
            .mutate(user, event_id, |entry| {
                entry.update_candidate(candidate_id, patch, now)
            })
            .await?;
        self.catalog_changed(event_id, CatalogChange::Candidate, now);
        Ok(candidate)
    }

    /// Deletes a candidate and the votes cast for it.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::CandidateNotFound`], plus the access errors of
    /// [`Self::get_event`].
    pub async fn delete_candidate(
        &self,
        user: &User,
        event_id: EventId,
        candidate_id: CandidateId,
    ) -> Result<(), AppError> {
        let now = Utc::now();
        let tally = self
            .mutate(user, event_id, |entry| {
                let removed = entry.remove_candidate(candidate_id, now)?;
                Ok(tally_updated(entry, removed.category_id, now))
            })
            .await?;
        self.catalog_changed(event_id, CatalogChange::Candidate, now);
        let _ = self.event_bus.publish(tally);
        Ok(())
    }

    // ── Guests ──────────────────────────────────────────────────────────

    /// Returns a page of the guest list in registration order, and the
    /// total number of guests.
    ///
    /// # Errors
    ///
    /// Returns the access errors of [`Self::get_event`].
    pub async fn list_voters(
        &self,
        user: &User,
        event_id: EventId,
        limit: usize,
        offset: usize,
    ) -> Result<(Vec<Voter>, usize), AppError> {
        let entry_lock = self.registry.get(event_id).await?;
        let entry = entry_lock.read().await;
        authorize(&entry, user)?;
        let voters = entry.ordered_voters();
        let total = voters.len();
        let page = voters
            .into_iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect();
        Ok((page, total))
    }

    /// Imports a batch of guests. Invalid or duplicate rows and rows past
    /// the participant limit are skipped and reported; the rest are
    /// registered as invited guests with generated access codes.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::InvalidRequest`] for an empty or oversized
    /// batch, plus the access errors of [`Self::get_event`].
    pub async fn import_guests(
        &self,
        user: &User,
        event_id: EventId,
        guests: Vec<GuestImport>,
    ) -> Result<ImportReport, AppError> {
        if guests.is_empty() {
            return Err(AppError::InvalidRequest("guest list is empty".to_string()));
        }
        if guests.len() > MAX_IMPORT_BATCH {
            return Err(AppError::InvalidRequest(format!(
                "at most {MAX_IMPORT_BATCH} guests per import"
            )));
        }
        let now = Utc::now();
        let report = self
            .mutate(user, event_id, |entry| {
                let mut report = ImportReport::default();
                for (row, guest) in guests.into_iter().enumerate() {
                    match import_row(entry, guest, now) {
                        Ok(voter) => report.imported.push(voter),
                        Err(err) => report.skipped.push(ImportSkip {
                            row,
                            reason: err.to_string(),
                        }),
                    }
                }
                Ok(report)
            })
            .await?;
        if !report.imported.is_empty() {
            self.catalog_changed(event_id, CatalogChange::Guests, now);
        }
        tracing::info!(
            %event_id,
            imported = report.imported.len(),
            skipped = report.skipped.len(),
            "guest list imported"
        );
        Ok(report)
    }

    /// Checks a guest in on their behalf (manual check-in at the door).
    ///
    /// # Errors
    ///
    /// Returns [`AppError::VoterNotFound`], [`AppError::Forbidden`] for an
    /// inactive event, plus the access errors of [`Self::get_event`].
    pub async fn check_in_voter(
        &self,
        user: &User,
        event_id: EventId,
        voter_id: VoterId,
    ) -> Result<Voter, AppError> {
        let now = Utc::now();
        let (voter, event) = self
            .mutate(user, event_id, |entry| {
                let first = entry.check_in(voter_id, now)?;
                let voter = entry.voter(voter_id)?.clone();
                let event = first.then(|| checked_in_event(entry, &voter, now));
                Ok((voter, event))
            })
            .await?;
        if let Some(event) = event {
            let _ = self.event_bus.publish(event);
            tracing::info!(%event_id, %voter_id, "guest checked in manually");
        }
        Ok(voter)
    }

    // ── Results ─────────────────────────────────────────────────────────

    /// Computes ranked results for every category of an event.
    ///
    /// # Errors
    ///
    /// Returns the access errors of [`Self::get_event`].
    pub async fn results(&self, user: &User, event_id: EventId) -> Result<EventResults, AppError> {
        let entry_lock = self.registry.get(event_id).await?;
        let entry = entry_lock.read().await;
        authorize(&entry, user)?;
        Ok(compute_results(&entry, Utc::now()))
    }

    // ── Helpers ─────────────────────────────────────────────────────────

    /// Runs `f` under the event's write lock after the ownership check.
    async fn mutate<T>(
        &self,
        user: &User,
        event_id: EventId,
        f: impl FnOnce(&mut EventEntry) -> Result<T, AppError>,
    ) -> Result<T, AppError> {
        let entry_lock = self.registry.get(event_id).await?;
        let mut entry = entry_lock.write().await;
        authorize(&entry, user)?;
        f(&mut entry)
    }

    fn catalog_changed(&self, event_id: EventId, change: CatalogChange, now: DateTime<Utc>) {
        let _ = self.event_bus.publish(DomainEvent::CatalogChanged {
            event_id,
            change,
            timestamp: now,
        });
    }
}

/// Allows the event owner and platform admins.
///
/// # Errors
///
/// Returns [`AppError::Forbidden`] for anybody else.
pub fn authorize(entry: &EventEntry, user: &User) -> Result<(), AppError> {
    if user.is_admin() || entry.event.owner_id == user.id {
        return Ok(());
    }
    Err(AppError::Forbidden(format!(
        "event {} belongs to another organizer",
        entry.event.id
    )))
}

fn import_row(entry: &mut EventEntry, guest: GuestImport, now: DateTime<Utc>) -> Result<Voter, AppError> {
    let phone = match guest.phone.as_deref().map(str::trim) {
        Some(raw) if !raw.is_empty() => Some(normalize_phone(raw)?),
        _ => None,
    };
    let name = clean_optional(guest.name);
    if phone.is_none() && name.is_none() {
        return Err(AppError::InvalidRequest(
            "a guest needs a phone number or a name".to_string(),
        ));
    }
    entry.register_voter(phone, name, true, false, now)
}

fn validate_window(
    starts: Option<DateTime<Utc>>,
    ends: Option<DateTime<Utc>>,
) -> Result<(), AppError> {
    if let (Some(start), Some(end)) = (starts, ends)
        && start >= end
    {
        return Err(AppError::InvalidRequest(
            "voting_starts_at must be before voting_ends_at".to_string(),
        ));
    }
    Ok(())
}

fn validate_code(raw: &str) -> Result<String, AppError> {
    let code = normalize_code(raw);
    let len = code.chars().count();
    if !(4..=12).contains(&len) || !code.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(AppError::InvalidRequest(
            "event code must be 4 to 12 letters or digits".to_string(),
        ));
    }
    Ok(code)
}

fn validate_modules(settings: &EventSettings) -> Result<(), AppError> {
    for (name, config) in &settings.modules {
        if !KNOWN_MODULES.contains(&name.as_str()) {
            return Err(AppError::InvalidRequest(format!("unknown module '{name}'")));
        }
        if !config.is_object() {
            return Err(AppError::InvalidRequest(format!(
                "configuration of module '{name}' must be a JSON object"
            )));
        }
    }
    Ok(())
}

fn clean_optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Test fixtures shared by the service tests.
#[cfg(test)]
#[allow(clippy::panic)]
pub(crate) mod tests {
    use super::*;
    use crate::domain::UserId;
    use crate::domain::account::{UserRole, find_package};

    pub(crate) struct Fixture {
        pub(crate) service: EventService,
        pub(crate) accounts: Arc<AccountRegistry>,
        pub(crate) sessions: Arc<SessionStore>,
        pub(crate) bus: EventBus,
    }

    pub(crate) fn fixture() -> Fixture {
        let registry = Arc::new(EventRegistry::new());
        let accounts = Arc::new(AccountRegistry::new());
        let sessions = Arc::new(SessionStore::new(3_600));
        let bus = EventBus::new(1_000);
        let service = EventService::new(
            registry,
            Arc::clone(&accounts),
            Arc::clone(&sessions),
            bus.clone(),
        );
        Fixture {
            service,
            accounts,
            sessions,
            bus,
        }
    }

    pub(crate) async fn organizer(accounts: &AccountRegistry, package: &str) -> User {
        let user = User {
            id: UserId::new(),
            email: format!("{}@example.vn", UserId::new()),
            display_name: "Host".to_string(),
            role: UserRole::Organizer,
            password_hash: String::new(),
            created_at: Utc::now(),
        };
        let mut state = accounts.write().await;
        let Ok(()) = state.insert_user(user.clone()) else {
            panic!("insert user failed");
        };
        let Some(package) = find_package(package) else {
            panic!("unknown package");
        };
        let Ok((sub, _)) = state.open_subscription(user.id, package, Utc::now()) else {
            panic!("open subscription failed");
        };
        if !package.is_free() {
            let Ok(_) = state.activate(sub.id, Utc::now()) else {
                panic!("activate failed");
            };
        }
        user
    }

    pub(crate) async fn admin(accounts: &AccountRegistry) -> User {
        let user = User {
            id: UserId::new(),
            email: "root@example.vn".to_string(),
            display_name: "Root".to_string(),
            role: UserRole::Admin,
            password_hash: String::new(),
            created_at: Utc::now(),
        };
        let Ok(()) = accounts.write().await.insert_user(user.clone()) else {
            panic!("insert admin failed");
        };
        user
    }

    pub(crate) fn new_event(name: &str) -> NewEvent {
        NewEvent {
            name: name.to_string(),
            ..NewEvent::default()
        }
    }

    #[tokio::test]
    async fn create_event_charges_a_slot_and_emits() {
        let fx = fixture();
        let mut rx = fx.bus.subscribe();
        let host = organizer(&fx.accounts, "free").await;

        let Ok(event) = fx.service.create_event(&host, new_event("Gala")).await else {
            panic!("create failed");
        };
        assert_eq!(event.participant_limit, Some(50));
        assert_eq!(event.code.len(), 6);

        let Ok(DomainEvent::EventCreated { event_id, .. }) = rx.recv().await else {
            panic!("expected EventCreated");
        };
        assert_eq!(event_id, event.id);

        let state = fx.accounts.read().await;
        let Some(sub) = state.subscription_in_force(host.id, Utc::now()) else {
            panic!("subscription missing");
        };
        assert_eq!(sub.events_used, 1);
    }

    #[tokio::test]
    async fn event_quota_is_enforced() {
        let fx = fixture();
        let host = organizer(&fx.accounts, "free").await;
        assert!(fx.service.create_event(&host, new_event("One")).await.is_ok());
        assert!(matches!(
            fx.service.create_event(&host, new_event("Two")).await,
            Err(AppError::LimitExceeded(_))
        ));

        let state = fx.accounts.read().await;
        let Some(sub) = state.subscription_in_force(host.id, Utc::now()) else {
            panic!("subscription missing");
        };
        assert!(sub.events_limit.is_none_or(|limit| sub.events_used <= limit));
    }

    #[tokio::test]
    async fn deleting_an_event_releases_its_slot() {
        let fx = fixture();
        let host = organizer(&fx.accounts, "free").await;
        let Ok(event) = fx.service.create_event(&host, new_event("One")).await else {
            panic!("create failed");
        };
        assert!(fx.service.delete_event(&host, event.id).await.is_ok());
        assert!(fx.service.create_event(&host, new_event("Two")).await.is_ok());
    }

    #[tokio::test]
    async fn admins_are_unmetered_and_see_everything() {
        let fx = fixture();
        let root = admin(&fx.accounts).await;
        let host = organizer(&fx.accounts, "free").await;
        for name in ["A", "B", "C"] {
            assert!(fx.service.create_event(&root, new_event(name)).await.is_ok());
        }
        assert!(fx.service.create_event(&host, new_event("Mine")).await.is_ok());

        assert_eq!(fx.service.list_events(&root).await.len(), 4);
        assert_eq!(fx.service.list_events(&host).await.len(), 1);
    }

    #[tokio::test]
    async fn other_organizers_are_forbidden() {
        let fx = fixture();
        let host = organizer(&fx.accounts, "free").await;
        let other = organizer(&fx.accounts, "free").await;
        let Ok(event) = fx.service.create_event(&host, new_event("Gala")).await else {
            panic!("create failed");
        };
        assert!(matches!(
            fx.service.get_event(&other, event.id).await,
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            fx.service.delete_event(&other, event.id).await,
            Err(AppError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn custom_code_is_normalized_and_unique() {
        let fx = fixture();
        let root = admin(&fx.accounts).await;
        let mut new = new_event("Gala");
        new.code = Some(" gala26 ".to_string());
        let Ok(event) = fx.service.create_event(&root, new.clone()).await else {
            panic!("create failed");
        };
        assert_eq!(event.code, "GALA26");
        assert!(matches!(
            fx.service.create_event(&root, new).await,
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn inverted_voting_window_is_rejected() {
        let fx = fixture();
        let root = admin(&fx.accounts).await;
        let now = Utc::now();
        let mut new = new_event("Gala");
        new.voting_starts_at = Some(now);
        new.voting_ends_at = Some(now - chrono::Duration::hours(1));
        assert!(matches!(
            fx.service.create_event(&root, new).await,
            Err(AppError::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn modules_must_be_known_objects() {
        let fx = fixture();
        let root = admin(&fx.accounts).await;
        let Ok(event) = fx.service.create_event(&root, new_event("Gala")).await else {
            panic!("create failed");
        };
        let config = serde_json::json!({ "background": "#000" });
        let Ok(settings) = fx
            .service
            .upsert_module(&root, event.id, "welcome_led", config)
            .await
        else {
            panic!("upsert failed");
        };
        assert!(settings.modules.contains_key("welcome_led"));
        assert!(
            fx.service
                .upsert_module(&root, event.id, "fireworks", serde_json::json!({}))
                .await
                .is_err()
        );
        assert!(
            fx.service
                .upsert_module(&root, event.id, "mini_games", serde_json::json!(3))
                .await
                .is_err()
        );
        assert!(fx.service.remove_module(&root, event.id, "welcome_led").await.is_ok());
        assert!(matches!(
            fx.service.remove_module(&root, event.id, "welcome_led").await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn import_skips_bad_rows_and_respects_limit() {
        let fx = fixture();
        let host = organizer(&fx.accounts, "free").await;
        let Ok(event) = fx.service.create_event(&host, new_event("Gala")).await else {
            panic!("create failed");
        };
        let guests = vec![
            GuestImport {
                phone: Some("+84 912 345 678".to_string()),
                name: Some("An".to_string()),
            },
            GuestImport {
                phone: Some("0912345678".to_string()),
                name: Some("An again".to_string()),
            },
            GuestImport {
                phone: Some("12345".to_string()),
                name: None,
            },
            GuestImport {
                phone: None,
                name: Some("Binh".to_string()),
            },
            GuestImport::default(),
        ];
        let Ok(report) = fx.service.import_guests(&host, event.id, guests).await else {
            panic!("import failed");
        };
        assert_eq!(report.imported.len(), 2);
        let skipped: Vec<usize> = report.skipped.iter().map(|s| s.row).collect();
        assert_eq!(skipped, vec![1, 2, 4]);

        let Ok((page, total)) = fx.service.list_voters(&host, event.id, 1, 1).await else {
            panic!("list failed");
        };
        assert_eq!(total, 2);
        assert_eq!(page.len(), 1);
    }

    #[tokio::test]
    async fn manual_check_in_emits_once() {
        let fx = fixture();
        let root = admin(&fx.accounts).await;
        let Ok(event) = fx.service.create_event(&root, new_event("Gala")).await else {
            panic!("create failed");
        };
        let guests = vec![GuestImport {
            phone: None,
            name: Some("Chi".to_string()),
        }];
        let Ok(report) = fx.service.import_guests(&root, event.id, guests).await else {
            panic!("import failed");
        };
        let Some(voter) = report.imported.first() else {
            panic!("no voter imported");
        };
        let mut rx = fx.bus.subscribe();

        let Ok(checked) = fx.service.check_in_voter(&root, event.id, voter.id).await else {
            panic!("check-in failed");
        };
        assert!(checked.checked_in_at.is_some());
        let Ok(DomainEvent::GuestCheckedIn {
            checked_in_count, ..
        }) = rx.recv().await
        else {
            panic!("expected GuestCheckedIn");
        };
        assert_eq!(checked_in_count, 1);

        assert!(fx.service.check_in_voter(&root, event.id, voter.id).await.is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn deleting_an_event_revokes_guest_sessions() {
        let fx = fixture();
        let root = admin(&fx.accounts).await;
        let Ok(event) = fx.service.create_event(&root, new_event("Gala")).await else {
            panic!("create failed");
        };
        let principal = crate::auth::Principal::Voter {
            event_id: event.id,
            voter_id: VoterId::new(),
        };
        let Ok(issued) = fx.sessions.issue(principal, Utc::now()) else {
            panic!("issue failed");
        };
        assert!(fx.service.delete_event(&root, event.id).await.is_ok());
        assert!(fx.sessions.resolve(&issued.token).await.is_err());
    }
}
