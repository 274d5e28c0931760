//! Guest service: event landing info, guest authentication, OTP and check-in.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use utoipa::ToSchema;

use super::checked_in_event;
use crate::auth::{IssuedSession, Principal, SessionStore};
use crate::config::AppConfig;
use crate::domain::event::{CheckinRules, IdentityMode, Voter};
use crate::domain::event_entry::EventEntry;
use crate::domain::identity::{generate_otp, normalize_code, normalize_phone};
use crate::domain::{EventBus, EventId, EventRegistry, VoterId};
use crate::error::AppError;

/// One-time password rules.
#[derive(Debug, Clone, Copy)]
pub struct OtpPolicy {
    /// Validity of an issued code.
    pub ttl: Duration,
    /// Failed verifications before the code is discarded.
    pub max_attempts: u32,
    /// Minimum delay between two codes for the same phone.
    pub resend_cooldown: Duration,
    /// Return the code in the API response instead of only logging its
    /// issuance.
    pub debug_echo: bool,
}

impl OtpPolicy {
    /// Builds the policy from the service configuration.
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            ttl: seconds(config.otp_ttl_secs),
            max_attempts: config.otp_max_attempts.max(1),
            resend_cooldown: seconds(config.otp_resend_cooldown_secs),
            debug_echo: config.otp_debug_echo,
        }
    }
}

fn seconds(secs: u64) -> Duration {
    Duration::seconds(i64::try_from(secs).unwrap_or(i64::MAX / 1_000))
}

/// Public information about an event, shown on the guest landing page and
/// the display screens.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PublicEvent {
    /// Event identifier.
    pub event_id: EventId,
    /// Event name.
    pub name: String,
    /// Public code.
    pub code: String,
    /// Whether the event accepts check-in and votes.
    pub is_active: bool,
    /// Whether ballots are accepted right now.
    pub voting_open: bool,
    /// Voting start, if scheduled.
    pub voting_starts_at: Option<DateTime<Utc>>,
    /// Voting end, if scheduled.
    pub voting_ends_at: Option<DateTime<Utc>>,
    /// Accepted guest identity.
    pub identity: IdentityMode,
    /// Phone authentication requires a one-time password.
    pub require_otp: bool,
    /// Live counts are published.
    pub show_live_results: bool,
    /// Theme name.
    pub theme: Option<String>,
    /// Module configuration documents for the display screens.
    #[schema(value_type = Object)]
    pub modules: BTreeMap<String, serde_json::Value>,
}

/// Identity a guest presents.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct GuestCredentials {
    /// Phone number in any accepted format.
    #[serde(default)]
    pub phone: Option<String>,
    /// Access code from the invitation or QR.
    #[serde(default)]
    pub access_code: Option<String>,
    /// Name to register when the guest is new.
    #[serde(default)]
    pub name: Option<String>,
}

/// Result of a guest authentication attempt.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum GuestAuthOutcome {
    /// The guest is signed in.
    Authenticated {
        /// Voter session.
        session: IssuedSession,
        /// The voter record.
        voter: Voter,
        /// Whether this request checked the guest in.
        checked_in_now: bool,
    },
    /// A one-time password was issued and must be verified.
    OtpRequired {
        /// Normalized phone the code was issued for.
        phone: String,
        /// Expiry of the code.
        expires_at: DateTime<Utc>,
        /// Code echo for local development.
        #[serde(skip_serializing_if = "Option::is_none")]
        debug_code: Option<String>,
    },
}

#[derive(Debug, Clone)]
struct OtpChallenge {
    code: String,
    name: Option<String>,
    check_in: bool,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    attempts_left: u32,
}

enum Identity {
    Code(String),
    Phone(String),
}

/// Orchestration layer for guest-facing flows.
#[derive(Debug)]
pub struct GuestService {
    registry: Arc<EventRegistry>,
    sessions: Arc<SessionStore>,
    event_bus: EventBus,
    policy: OtpPolicy,
    challenges: Mutex<HashMap<(EventId, String), OtpChallenge>>,
}

impl GuestService {
    /// Creates a new `GuestService`.
    #[must_use]
    pub fn new(
        registry: Arc<EventRegistry>,
        sessions: Arc<SessionStore>,
        event_bus: EventBus,
        policy: OtpPolicy,
    ) -> Self {
        Self {
            registry,
            sessions,
            event_bus,
            policy,
            challenges: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the public view of the event behind a code.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::EventNotFound`] for an unknown code.
    pub async fn event_info(&self, code: &str) -> Result<PublicEvent, AppError> {
        let entry_lock = self.registry.get_by_code(&normalize_code(code)).await?;
        let entry = entry_lock.read().await;
        let event = &entry.event;
        Ok(PublicEvent {
            event_id: event.id,
            name: event.name.clone(),
            code: event.code.clone(),
            is_active: event.is_active,
            voting_open: event.is_voting_open(Utc::now()),
            voting_starts_at: event.voting_starts_at,
            voting_ends_at: event.voting_ends_at,
            identity: event.settings.checkin.identity,
            require_otp: event.settings.checkin.require_otp,
            show_live_results: event.settings.show_live_results,
            theme: event.settings.theme.clone(),
            modules: event.settings.modules.clone(),
        })
    }

    /// Authenticates a guest, optionally checking them in.
    ///
    /// Access codes sign the guest in directly. Phone numbers are matched
    /// against the guest list; unknown numbers register a new voter unless
    /// the event is restricted to its guest list. When the event requires
    /// an OTP, phone authentication stops at [`GuestAuthOutcome::OtpRequired`].
    ///
    /// # Errors
    ///
    /// Returns [`AppError::EventNotFound`], [`AppError::InvalidRequest`] or
    /// [`AppError::InvalidPhone`] for unusable credentials,
    /// [`AppError::Unauthorized`] for an unknown access code,
    /// [`AppError::Forbidden`] for inactive events and guests outside a
    /// restricted list, [`AppError::LimitExceeded`] when the event is full
    /// and [`AppError::RateLimited`] when an OTP was sent too recently.
    pub async fn authenticate(
        &self,
        code: &str,
        credentials: GuestCredentials,
        check_in: bool,
    ) -> Result<GuestAuthOutcome, AppError> {
        let entry_lock = self.registry.get_by_code(&normalize_code(code)).await?;
        let now = Utc::now();

        let (event_id, rules, identity) = {
            let entry = entry_lock.read().await;
            ensure_active(&entry)?;
            let rules = entry.event.settings.checkin.clone();
            let identity = resolve_identity(&rules, &credentials)?;
            if let Identity::Phone(phone) = &identity
                && entry.voter_by_phone(phone).is_none()
            {
                ensure_can_register(&entry, &rules)?;
            }
            (entry.event.id, rules, identity)
        };

        match identity {
            Identity::Code(access_code) => {
                let mut entry = entry_lock.write().await;
                let Some(voter_id) = entry.voter_by_code(&access_code).map(|v| v.id) else {
                    tracing::warn!(%event_id, "unknown access code");
                    return Err(AppError::Unauthorized("unknown access code".to_string()));
                };
                let (voter, checked_in_now) =
                    self.finish(&mut entry, voter_id, check_in, now)?;
                drop(entry);
                self.signed_in(event_id, voter, checked_in_now, now).await
            }
            Identity::Phone(phone) if rules.require_otp => {
                self.issue_otp(event_id, phone, credentials.name, check_in, now)
                    .await
            }
            Identity::Phone(phone) => {
                let mut entry = entry_lock.write().await;
                ensure_active(&entry)?;
                let voter_id = find_or_register(&mut entry, &phone, credentials.name, false, now)?;
                let (voter, checked_in_now) =
                    self.finish(&mut entry, voter_id, check_in, now)?;
                drop(entry);
                self.signed_in(event_id, voter, checked_in_now, now).await
            }
        }
    }

    /// Completes phone authentication with the one-time password.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Unauthorized`] when no code is pending, the code
    /// expired, is wrong, or was discarded after too many failures, plus
    /// the lookup errors of [`Self::authenticate`].
    pub async fn verify_otp(
        &self,
        code: &str,
        phone: &str,
        otp: &str,
    ) -> Result<GuestAuthOutcome, AppError> {
        let entry_lock = self.registry.get_by_code(&normalize_code(code)).await?;
        let event_id = entry_lock.read().await.event.id;
        let phone = normalize_phone(phone)?;
        let now = Utc::now();
        let key = (event_id, phone);

        let challenge = {
            let mut challenges = self.challenges.lock().await;
            let Some(challenge) = challenges.get_mut(&key) else {
                return Err(AppError::Unauthorized(
                    "no verification code pending for this phone".to_string(),
                ));
            };
            if challenge.attempts_left == 0 {
                return Err(AppError::Unauthorized(
                    "too many failed attempts; request a new code".to_string(),
                ));
            }
            if now >= challenge.expires_at {
                challenges.remove(&key);
                return Err(AppError::Unauthorized("verification code expired".to_string()));
            }
            if !codes_match(&challenge.code, otp.trim()) {
                challenge.attempts_left -= 1;
                tracing::warn!(%event_id, attempts_left = challenge.attempts_left, "wrong verification code");
                return Err(AppError::Unauthorized(
                    "incorrect verification code".to_string(),
                ));
            }
            challenges.remove(&key)
        };
        let Some(challenge) = challenge else {
            return Err(AppError::Unauthorized(
                "no verification code pending for this phone".to_string(),
            ));
        };

        let mut entry = entry_lock.write().await;
        ensure_active(&entry)?;
        let voter_id = find_or_register(&mut entry, &key.1, challenge.name, true, now)?;
        entry.verify_voter(voter_id, now)?;
        let (voter, checked_in_now) = self.finish(&mut entry, voter_id, challenge.check_in, now)?;
        drop(entry);
        self.signed_in(event_id, voter, checked_in_now, now).await
    }

    /// Drops OTP challenges whose code and cooldown have both lapsed.
    pub async fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let cooldown = self.policy.resend_cooldown;
        let mut challenges = self.challenges.lock().await;
        let before = challenges.len();
        challenges.retain(|_, c| now < c.expires_at || now < c.issued_at + cooldown);
        before - challenges.len()
    }

    async fn issue_otp(
        &self,
        event_id: EventId,
        phone: String,
        name: Option<String>,
        check_in: bool,
        now: DateTime<Utc>,
    ) -> Result<GuestAuthOutcome, AppError> {
        let mut challenges = self.challenges.lock().await;
        let key = (event_id, phone);
        if let Some(previous) = challenges.get(&key) {
            let ready_at = previous.issued_at + self.policy.resend_cooldown;
            if now < ready_at {
                let retry_after_ms = u64::try_from((ready_at - now).num_milliseconds()).unwrap_or(0);
                return Err(AppError::RateLimited { retry_after_ms });
            }
        }
        let challenge = OtpChallenge {
            code: generate_otp(),
            name,
            check_in,
            issued_at: now,
            expires_at: now + self.policy.ttl,
            attempts_left: self.policy.max_attempts,
        };
        let outcome = GuestAuthOutcome::OtpRequired {
            phone: key.1.clone(),
            expires_at: challenge.expires_at,
            debug_code: self.policy.debug_echo.then(|| challenge.code.clone()),
        };
        challenges.insert(key, challenge);
        tracing::info!(%event_id, "verification code issued");
        Ok(outcome)
    }

    /// Optionally checks the voter in and returns their record.
    fn finish(
        &self,
        entry: &mut EventEntry,
        voter_id: VoterId,
        check_in: bool,
        now: DateTime<Utc>,
    ) -> Result<(Voter, bool), AppError> {
        let checked_in_now = if check_in {
            entry.check_in(voter_id, now)?
        } else {
            false
        };
        let voter = entry.voter(voter_id)?.clone();
        if checked_in_now {
            let _ = self.event_bus.publish(checked_in_event(entry, &voter, now));
            tracing::info!(event_id = %entry.event.id, voter_id = %voter.id, "guest checked in");
        }
        Ok((voter, checked_in_now))
    }

    async fn signed_in(
        &self,
        event_id: EventId,
        voter: Voter,
        checked_in_now: bool,
        now: DateTime<Utc>,
    ) -> Result<GuestAuthOutcome, AppError> {
        let session = self
            .sessions
            .issue(
                Principal::Voter {
                    event_id,
                    voter_id: voter.id,
                },
                now,
            )?;
        tracing::debug!(%event_id, voter_id = %voter.id, "guest signed in");
        Ok(GuestAuthOutcome::Authenticated {
            session,
            voter,
            checked_in_now,
        })
    }
}

fn ensure_active(entry: &EventEntry) -> Result<(), AppError> {
    if entry.event.is_active {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!(
            "event {} is not active",
            entry.event.id
        )))
    }
}

fn ensure_can_register(entry: &EventEntry, rules: &CheckinRules) -> Result<(), AppError> {
    if rules.restrict_to_guest_list {
        return Err(AppError::Forbidden(
            "this phone number is not on the guest list".to_string(),
        ));
    }
    if let Some(limit) = entry.event.participant_limit
        && entry.voters.len() >= limit as usize
    {
        return Err(AppError::LimitExceeded(format!(
            "event {} allows at most {limit} participants",
            entry.event.id
        )));
    }
    Ok(())
}

fn resolve_identity(rules: &CheckinRules, credentials: &GuestCredentials) -> Result<Identity, AppError> {
    let code = credentials
        .access_code
        .as_deref()
        .map(normalize_code)
        .filter(|c| !c.is_empty());
    let phone = credentials
        .phone
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty());

    match (rules.identity, code, phone) {
        (IdentityMode::Code | IdentityMode::Either, Some(code), _) => Ok(Identity::Code(code)),
        (IdentityMode::Phone | IdentityMode::Either, _, Some(phone)) => {
            Ok(Identity::Phone(normalize_phone(phone)?))
        }
        (IdentityMode::Phone, _, None) => Err(AppError::InvalidRequest(
            "this event requires a phone number".to_string(),
        )),
        (IdentityMode::Code, None, _) => Err(AppError::InvalidRequest(
            "this event requires an access code".to_string(),
        )),
        (IdentityMode::Either, None, None) => Err(AppError::InvalidRequest(
            "provide a phone number or an access code".to_string(),
        )),
    }
}

/// Returns the voter holding `phone`, registering one when the current
/// rules allow it. Must run under the event's write lock.
fn find_or_register(
    entry: &mut EventEntry,
    phone: &str,
    name: Option<String>,
    verified: bool,
    now: DateTime<Utc>,
) -> Result<VoterId, AppError> {
    if let Some(voter) = entry.voter_by_phone(phone) {
        return Ok(voter.id);
    }
    let rules = entry.event.settings.checkin.clone();
    ensure_can_register(entry, &rules)?;
    let voter = entry.register_voter(Some(phone.to_string()), name, false, verified, now)?;
    tracing::info!(event_id = %entry.event.id, voter_id = %voter.id, "guest registered");
    Ok(voter.id)
}

fn codes_match(expected: &str, given: &str) -> bool {
    expected.len() == given.len()
        && expected
            .bytes()
            .zip(given.bytes())
            .fold(0_u8, |acc, (a, b)| acc | (a ^ b))
            == 0
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::event_entry::tests::make_entry;

    fn policy() -> OtpPolicy {
        OtpPolicy {
            ttl: Duration::seconds(300),
            max_attempts: 2,
            resend_cooldown: Duration::seconds(30),
            debug_echo: true,
        }
    }

    async fn service_with(rules: CheckinRules) -> (GuestService, Arc<EventRegistry>) {
        let registry = Arc::new(EventRegistry::new());
        let mut entry = make_entry();
        entry.event.settings.checkin = rules;
        let Ok(_) = registry.insert(entry).await else {
            panic!("insert failed");
        };
        let service = GuestService::new(
            Arc::clone(&registry),
            Arc::new(SessionStore::new(3_600)),
            EventBus::new(100),
            policy(),
        );
        (service, registry)
    }

    fn phone(number: &str) -> GuestCredentials {
        GuestCredentials {
            phone: Some(number.to_string()),
            ..GuestCredentials::default()
        }
    }

    #[tokio::test]
    async fn phone_sign_in_registers_once() {
        let (service, registry) = service_with(CheckinRules::default()).await;
        let Ok(GuestAuthOutcome::Authenticated { voter: first, .. }) =
            service.authenticate("gala26", phone("+84912345678"), false).await
        else {
            panic!("expected sign-in");
        };
        let Ok(GuestAuthOutcome::Authenticated { voter: second, .. }) =
            service.authenticate("GALA26", phone("0912 345 678"), false).await
        else {
            panic!("expected sign-in");
        };
        assert_eq!(first.id, second.id);
        let Ok(lock) = registry.get_by_code("GALA26").await else {
            panic!("event missing");
        };
        assert_eq!(lock.read().await.voters.len(), 1);
    }

    #[test]
    fn registration_rechecks_rules_under_the_write_lock() {
        let mut entry = make_entry();
        let now = Utc::now();
        let Ok(listed) = find_or_register(&mut entry, "0912345678", None, false, now) else {
            panic!("open list should register");
        };
        entry.event.settings.checkin.restrict_to_guest_list = true;

        assert!(matches!(
            find_or_register(&mut entry, "0987654321", None, false, now),
            Err(AppError::Forbidden(_))
        ));
        assert!(entry.voter_by_phone("0987654321").is_none());
        let Ok(again) = find_or_register(&mut entry, "0912345678", None, false, now) else {
            panic!("listed guest should resolve");
        };
        assert_eq!(again, listed);
    }

    #[tokio::test]
    async fn access_code_must_exist() {
        let (service, _) = service_with(CheckinRules::default()).await;
        let creds = GuestCredentials {
            access_code: Some("ZZZZZZ".to_string()),
            ..GuestCredentials::default()
        };
        assert!(matches!(
            service.authenticate("GALA26", creds, false).await,
            Err(AppError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn identity_mode_is_enforced() {
        let rules = CheckinRules {
            identity: IdentityMode::Code,
            ..CheckinRules::default()
        };
        let (service, _) = service_with(rules).await;
        assert!(matches!(
            service.authenticate("GALA26", phone("0912345678"), false).await,
            Err(AppError::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn restricted_list_rejects_strangers() {
        let rules = CheckinRules {
            restrict_to_guest_list: true,
            ..CheckinRules::default()
        };
        let (service, _) = service_with(rules).await;
        assert!(matches!(
            service.authenticate("GALA26", phone("0912345678"), false).await,
            Err(AppError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn otp_flow_signs_in_and_checks_in() {
        let rules = CheckinRules {
            require_otp: true,
            ..CheckinRules::default()
        };
        let (service, _) = service_with(rules).await;
        let Ok(GuestAuthOutcome::OtpRequired {
            debug_code: Some(otp),
            phone: normalized,
            ..
        }) = service.authenticate("GALA26", phone("+84 912 345 678"), true).await
        else {
            panic!("expected an OTP challenge");
        };
        assert_eq!(normalized, "0912345678");

        let Ok(GuestAuthOutcome::Authenticated {
            voter,
            checked_in_now,
            ..
        }) = service.verify_otp("GALA26", "0912345678", &otp).await
        else {
            panic!("expected sign-in");
        };
        assert!(voter.verified);
        assert!(checked_in_now);
        assert!(voter.checked_in_at.is_some());

        assert!(matches!(
            service.verify_otp("GALA26", "0912345678", &otp).await,
            Err(AppError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn otp_resend_is_rate_limited() {
        let rules = CheckinRules {
            require_otp: true,
            ..CheckinRules::default()
        };
        let (service, _) = service_with(rules).await;
        assert!(
            service
                .authenticate("GALA26", phone("0912345678"), false)
                .await
                .is_ok()
        );
        let Err(AppError::RateLimited { retry_after_ms }) =
            service.authenticate("GALA26", phone("0912345678"), false).await
        else {
            panic!("expected rate limiting");
        };
        assert!(retry_after_ms > 0 && retry_after_ms <= 30_000);
    }

    #[tokio::test]
    async fn otp_is_discarded_after_too_many_failures() {
        let rules = CheckinRules {
            require_otp: true,
            ..CheckinRules::default()
        };
        let (service, _) = service_with(rules).await;
        let Ok(GuestAuthOutcome::OtpRequired {
            debug_code: Some(otp),
            ..
        }) = service.authenticate("GALA26", phone("0912345678"), false).await
        else {
            panic!("expected an OTP challenge");
        };
        let wrong = if otp == "000000" { "111111" } else { "000000" };
        for _ in 0..2 {
            assert!(service.verify_otp("GALA26", "0912345678", wrong).await.is_err());
        }
        assert!(matches!(
            service.verify_otp("GALA26", "0912345678", &otp).await,
            Err(AppError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn check_in_requires_active_event() {
        let (service, registry) = service_with(CheckinRules::default()).await;
        let Ok(lock) = registry.get_by_code("GALA26").await else {
            panic!("event missing");
        };
        lock.write().await.event.is_active = false;
        assert!(matches!(
            service.authenticate("GALA26", phone("0912345678"), true).await,
            Err(AppError::Forbidden(_))
        ));
    }

    #[test]
    fn code_comparison() {
        assert!(codes_match("123456", "123456"));
        assert!(!codes_match("123456", "123457"));
        assert!(!codes_match("123456", "12345"));
    }
}
