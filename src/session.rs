//! Operator sessions
//!
//! Opaque bearer tokens mapped to the identity of the signed-in operator.
//! The in-memory store is a placeholder for a real identity provider: it
//! does no credential checking and forgets everything on restart.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::audit;

/// Session lifetime
pub const SESSION_TTL_HOURS: i64 = 24;

pub type SessionResult<T> = Result<T, SessionError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Token unknown or revoked
    InvalidToken,
    Expired,
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::InvalidToken => write!(f, "Invalid session token"),
            SessionError::Expired => write!(f, "Session expired"),
        }
    }
}

impl std::error::Error for SessionError {}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserRole {
    #[default]
    Investigator,
    Adjuster,
    Attorney,
}

/// Identity carried by a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionClaims {
    pub user_id: String,
    pub email: String,
    pub name: String,
    pub role: UserRole,
    pub agency_id: String,
}

#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub token: String,
    pub claims: SessionClaims,
    pub expires_at: DateTime<Utc>,
}

/// Token issuing and checking
pub trait SessionStore: Send + Sync {
    fn issue(&self, claims: SessionClaims) -> IssuedSession;

    fn validate(&self, token: &str) -> SessionResult<SessionClaims>;

    /// Revoking an unknown token is not an error
    fn revoke(&self, token: &str);
}

/// First characters of a token, safe to log
fn token_hint(token: &str) -> &str {
    token.get(..12).unwrap_or(token)
}

struct SessionRecord {
    claims: SessionClaims,
    expires_at: DateTime<Utc>,
}

pub struct InMemorySessionStore {
    sessions: Mutex<HashMap<String, SessionRecord>>,
    ttl: Duration,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::with_ttl(Duration::hours(SESSION_TTL_HOURS))
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<String, SessionRecord>> {
        self.sessions.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Drop expired sessions; returns how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let mut sessions = self.sessions();
        let before = sessions.len();
        sessions.retain(|_, record| record.expires_at > now);
        before - sessions.len()
    }

    pub fn len(&self) -> usize {
        self.sessions().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions().is_empty()
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore for InMemorySessionStore {
    fn issue(&self, claims: SessionClaims) -> IssuedSession {
        let token = format!("sess_{}", uuid::Uuid::new_v4().simple());
        let expires_at = Utc::now() + self.ttl;

        self.sessions().insert(
            token.clone(),
            SessionRecord { claims: claims.clone(), expires_at },
        );
        tracing::info!(user_id = %claims.user_id, agency_id = %claims.agency_id, "Session issued");

        IssuedSession { token, claims, expires_at }
    }

    fn validate(&self, token: &str) -> SessionResult<SessionClaims> {
        let mut sessions = self.sessions();
        let Some(record) = sessions.get(token) else {
            audit::log_security_event("invalid_session", &format!("Unknown token {}...", token_hint(token)));
            return Err(SessionError::InvalidToken);
        };

        if Utc::now() >= record.expires_at {
            sessions.remove(token);
            return Err(SessionError::Expired);
        }
        Ok(record.claims.clone())
    }

    fn revoke(&self, token: &str) {
        if let Some(record) = self.sessions().remove(token) {
            tracing::info!(user_id = %record.claims.user_id, "Session revoked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims() -> SessionClaims {
        SessionClaims {
            user_id: "usr-k3j9x2".into(),
            email: "investigator@agency.gov".into(),
            name: "Dana Ortiz".into(),
            role: UserRole::Investigator,
            agency_id: "AGENCY-GENERIC".into(),
        }
    }

    #[test]
    fn test_issue_validate_revoke() {
        let store = InMemorySessionStore::new();
        let session = store.issue(claims());
        assert!(session.token.starts_with("sess_"));
        assert!(session.expires_at > Utc::now() + Duration::hours(23));

        assert_eq!(store.validate(&session.token).unwrap(), claims());

        store.revoke(&session.token);
        assert_eq!(store.validate(&session.token), Err(SessionError::InvalidToken));
        store.revoke(&session.token);
    }

    #[test]
    fn test_unknown_token() {
        let store = InMemorySessionStore::new();
        assert_eq!(store.validate("nope"), Err(SessionError::InvalidToken));
    }

    #[test]
    fn test_expiry() {
        let store = InMemorySessionStore::with_ttl(Duration::zero());
        let session = store.issue(claims());
        assert_eq!(store.validate(&session.token), Err(SessionError::Expired));
        assert!(store.is_empty());

        store.issue(claims());
        assert_eq!(store.purge_expired(), 1);
    }

    #[test]
    fn test_claims_wire_names() {
        let value = serde_json::to_value(claims()).unwrap();
        assert_eq!(value["agencyId"], "AGENCY-GENERIC");
        assert_eq!(value["role"], "Investigator");
    }
}
