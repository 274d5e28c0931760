//! Signed bearer sessions for users and voters.
//!
//! Tokens are HS256 JSON Web Tokens carrying the principal, an expiry and
//! a process-monotonic issue stamp. Signature and expiry are checked by
//! `jsonwebtoken`; the store only remembers revocations: single tokens
//! (logout) and per-user or per-event cutoffs (password change, event
//! deletion). Revocations live in memory and are pruned once every token
//! they could match has expired.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use utoipa::ToSchema;

use crate::domain::identity::generate_token;
use crate::domain::{EventId, UserId, VoterId};
use crate::error::AppError;

/// Who a session belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Principal {
    /// An organizer or platform admin.
    User {
        /// The user.
        user_id: UserId,
    },
    /// A guest authenticated for one event.
    Voter {
        /// Event the voter belongs to.
        event_id: EventId,
        /// The voter.
        voter_id: VoterId,
    },
}

impl Principal {
    /// Shorthand for a user principal.
    #[must_use]
    pub const fn user(user_id: UserId) -> Self {
        Self::User { user_id }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    #[serde(flatten)]
    principal: Principal,
    jti: String,
    stamp: i64,
    iat: i64,
    exp: i64,
}

/// A freshly issued token.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct IssuedSession {
    /// Bearer token for the `Authorization` header.
    pub token: String,
    /// Expiry of the token.
    pub expires_at: DateTime<Utc>,
}

/// Tokens stamped at or below `stamp` are revoked, except `keep`.
#[derive(Debug, Clone)]
struct Cutoff {
    stamp: i64,
    keep: Option<String>,
    at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Revocations {
    tokens: HashMap<String, i64>,
    users: HashMap<UserId, Cutoff>,
    events: HashMap<EventId, Cutoff>,
}

impl Revocations {
    fn is_revoked(&self, claims: &Claims) -> bool {
        if self.tokens.contains_key(&claims.jti) {
            return true;
        }
        let cutoff = match claims.principal {
            Principal::User { user_id } => self.users.get(&user_id),
            Principal::Voter { event_id, .. } => self.events.get(&event_id),
        };
        cutoff.is_some_and(|c| {
            claims.stamp <= c.stamp && c.keep.as_deref() != Some(claims.jti.as_str())
        })
    }
}

/// Issues and verifies signed session tokens.
pub struct SessionStore {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
    last_stamp: AtomicI64,
    revocations: RwLock<Revocations>,
}

impl fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionStore")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl SessionStore {
    /// Creates a store with a random signing key. Tokens do not survive a
    /// restart.
    #[must_use]
    pub fn new(ttl_secs: u64) -> Self {
        Self::with_secret(ttl_secs, generate_token().as_bytes())
    }

    /// Creates a store signing with `secret`, so tokens stay valid across
    /// restarts.
    #[must_use]
    pub fn with_secret(ttl_secs: u64, secret: &[u8]) -> Self {
        let ttl_secs = i64::try_from(ttl_secs).unwrap_or(i64::MAX / 1_000).max(1);
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            ttl: Duration::seconds(ttl_secs),
            last_stamp: AtomicI64::new(Utc::now().timestamp_micros()),
            revocations: RwLock::new(Revocations::default()),
        }
    }

    /// Issues a new token for `principal`, valid from `now`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] if the token cannot be signed.
    pub fn issue(&self, principal: Principal, now: DateTime<Utc>) -> Result<IssuedSession, AppError> {
        let expires_at = now + self.ttl;
        let claims = Claims {
            principal,
            jti: generate_token(),
            stamp: self.last_stamp.fetch_add(1, Ordering::SeqCst) + 1,
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };
        let token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AppError::Internal(format!("signing session: {e}")))?;
        Ok(IssuedSession { token, expires_at })
    }

    fn decode(&self, token: &str) -> Result<Claims, AppError> {
        jsonwebtoken::decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => {
                    AppError::Unauthorized("session expired".to_string())
                }
                _ => AppError::Unauthorized("invalid session token".to_string()),
            })
    }

    /// Resolves a token to its principal.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Unauthorized`] for forged, expired or revoked
    /// tokens.
    pub async fn resolve(&self, token: &str) -> Result<Principal, AppError> {
        let claims = self.decode(token)?;
        if self.revocations.read().await.is_revoked(&claims) {
            return Err(AppError::Unauthorized("session revoked".to_string()));
        }
        Ok(claims.principal)
    }

    /// Revokes a token. Returns `true` if it was valid until now.
    pub async fn revoke(&self, token: &str) -> bool {
        let Ok(claims) = self.decode(token) else {
            return false;
        };
        let mut revocations = self.revocations.write().await;
        if revocations.is_revoked(&claims) {
            return false;
        }
        revocations.tokens.insert(claims.jti, claims.exp);
        true
    }

    /// Revokes every session of a user issued so far, except `keep`.
    pub async fn revoke_user(&self, user_id: UserId, keep: Option<&str>, now: DateTime<Utc>) {
        let cutoff = self.cutoff(keep, now);
        self.revocations.write().await.users.insert(user_id, cutoff);
    }

    /// Revokes every voter session of an event issued so far.
    pub async fn revoke_event(&self, event_id: EventId, now: DateTime<Utc>) {
        let cutoff = self.cutoff(None, now);
        self.revocations.write().await.events.insert(event_id, cutoff);
    }

    fn cutoff(&self, keep: Option<&str>, now: DateTime<Utc>) -> Cutoff {
        Cutoff {
            stamp: self.last_stamp.load(Ordering::SeqCst),
            keep: keep
                .and_then(|token| self.decode(token).ok())
                .map(|claims| claims.jti),
            at: now,
        }
    }

    /// Forgets revocations that can no longer match an unexpired token,
    /// returning how many were dropped.
    pub async fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let ttl = self.ttl;
        let now_secs = now.timestamp();
        let mut revocations = self.revocations.write().await;
        let before = revocations.tokens.len() + revocations.users.len() + revocations.events.len();
        revocations.tokens.retain(|_, exp| now_secs < *exp);
        revocations.users.retain(|_, c| now < c.at + ttl);
        revocations.events.retain(|_, c| now < c.at + ttl);
        let after = revocations.tokens.len() + revocations.users.len() + revocations.events.len();
        before - after
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use tokio_test::{assert_err, assert_ok};

    use super::*;

    #[tokio::test]
    async fn issued_token_resolves() {
        let store = SessionStore::new(60);
        let user_id = UserId::new();
        let issued = assert_ok!(store.issue(Principal::user(user_id), Utc::now()));
        let principal = assert_ok!(store.resolve(&issued.token).await);
        assert_eq!(principal, Principal::user(user_id));
    }

    #[tokio::test]
    async fn expired_token_is_rejected() {
        let store = SessionStore::new(60);
        let issued = assert_ok!(store.issue(
            Principal::user(UserId::new()),
            Utc::now() - Duration::seconds(120)
        ));
        assert!(matches!(
            store.resolve(&issued.token).await,
            Err(AppError::Unauthorized(_))
        ));
        assert!(!store.revoke(&issued.token).await);
    }

    #[tokio::test]
    async fn tokens_from_another_key_are_rejected() {
        let ours = SessionStore::with_secret(60, b"our secret");
        let theirs = SessionStore::with_secret(60, b"their secret");
        let forged = assert_ok!(theirs.issue(Principal::user(UserId::new()), Utc::now()));
        assert_err!(ours.resolve(&forged.token).await);
        assert_err!(ours.resolve("not-a-jwt").await);
    }

    #[tokio::test]
    async fn shared_secret_survives_a_new_store() {
        let first = SessionStore::with_secret(60, b"stable");
        let issued = assert_ok!(first.issue(Principal::user(UserId::new()), Utc::now()));
        let second = SessionStore::with_secret(60, b"stable");
        assert_ok!(second.resolve(&issued.token).await);
    }

    #[tokio::test]
    async fn logout_revokes_a_single_token() {
        let store = SessionStore::new(60);
        let user_id = UserId::new();
        let a = assert_ok!(store.issue(Principal::user(user_id), Utc::now()));
        let b = assert_ok!(store.issue(Principal::user(user_id), Utc::now()));
        assert!(store.revoke(&a.token).await);
        assert!(!store.revoke(&a.token).await);
        assert_err!(store.resolve(&a.token).await);
        assert_ok!(store.resolve(&b.token).await);
    }

    #[tokio::test]
    async fn revoke_user_keeps_current_token() {
        let store = SessionStore::new(60);
        let user_id = UserId::new();
        let now = Utc::now();
        let a = assert_ok!(store.issue(Principal::user(user_id), now));
        let b = assert_ok!(store.issue(Principal::user(user_id), now));
        store.revoke_user(user_id, Some(&a.token), now).await;
        assert_ok!(store.resolve(&a.token).await);
        assert_err!(store.resolve(&b.token).await);

        let fresh = assert_ok!(store.issue(Principal::user(user_id), now));
        assert_ok!(store.resolve(&fresh.token).await);
    }

    #[tokio::test]
    async fn revoke_event_drops_only_its_voters() {
        let store = SessionStore::new(60);
        let now = Utc::now();
        let event_id = EventId::new();
        let voter = Principal::Voter {
            event_id,
            voter_id: VoterId::new(),
        };
        let other = Principal::Voter {
            event_id: EventId::new(),
            voter_id: VoterId::new(),
        };
        let revoked = assert_ok!(store.issue(voter, now));
        let kept = assert_ok!(store.issue(other, now));
        store.revoke_event(event_id, now).await;
        assert_err!(store.resolve(&revoked.token).await);
        assert_ok!(store.resolve(&kept.token).await);
    }

    #[tokio::test]
    async fn purge_forgets_stale_revocations() {
        let store = SessionStore::new(60);
        let now = Utc::now();
        let issued = assert_ok!(store.issue(Principal::user(UserId::new()), now));
        assert!(store.revoke(&issued.token).await);
        store.revoke_event(EventId::new(), now).await;
        assert_eq!(store.purge_expired(now).await, 0);
        assert_eq!(store.purge_expired(now + Duration::seconds(120)).await, 2);
        assert_eq!(store.purge_expired(now + Duration::seconds(240)).await, 0);
    }
}
