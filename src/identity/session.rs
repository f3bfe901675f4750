use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use base64::Engine;
use parking_lot::RwLock;

use super::authorizer;
use super::principal::Identity;
use super::role::Domain;
use crate::error::{AuthError, AuthResult};
use crate::tprintln;

pub type SessionToken = String;

/// One user interaction context. Starts unauthenticated; only `AuthService`
/// moves it in or out of the authenticated state.
#[derive(Debug, Clone, Default)]
pub struct Session {
    identity: Option<Identity>,
}

impl Session {
    pub fn new() -> Self { Self::default() }

    pub fn is_authenticated(&self) -> bool { self.identity.is_some() }

    pub fn current_identity(&self) -> Option<&Identity> { self.identity.as_ref() }

    /// Access guard against the session's identity.
    pub fn authorize(&self, domain: Domain) -> AuthResult<&Identity> {
        let identity = self.identity.as_ref().ok_or(AuthError::Unauthenticated)?;
        authorizer::authorize(identity, domain)?;
        Ok(identity)
    }

    pub(crate) fn set_identity(&mut self, identity: Identity) { self.identity = Some(identity); }

    pub(crate) fn clear(&mut self) -> Option<Identity> { self.identity.take() }
}

#[derive(Debug)]
struct SessionEntry {
    session: Session,
    session_id: String,
    expires_at: Instant,
}

/// Result of parking an authenticated session with the manager.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub token: SessionToken,
    pub session_id: String,
    pub expires_in: Duration,
}

fn gen_id() -> AuthResult<String> {
    let mut buf = [0u8; 32];
    getrandom::getrandom(&mut buf).map_err(|e| AuthError::Internal(e.to_string()))?;
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(buf))
}

#[derive(Default)]
struct SessionTable {
    sessions: HashMap<SessionToken, SessionEntry>,
    user_index: HashMap<String, HashSet<SessionToken>>,
    /// Bumped by every `revoke_user`; a login that started under an older
    /// value must not be parked.
    generations: HashMap<String, u64>,
}

impl SessionTable {
    fn generation(&self, username: &str) -> u64 { self.generations.get(username).copied().unwrap_or(0) }

    fn remove(&mut self, token: &str) -> Option<SessionEntry> {
        let ent = self.sessions.remove(token)?;
        if let Some(username) = ent.session.current_identity().map(|i| i.username()) {
            if let Some(set) = self.user_index.get_mut(username) {
                set.remove(token);
                if set.is_empty() { self.user_index.remove(username); }
            }
        }
        Some(ent)
    }
}

/// Owns the sessions of the HTTP boundary, keyed by bearer token. Each token
/// maps to exactly one `Session`; nothing is shared between tokens.
pub struct SessionManager {
    ttl: Duration,
    table: RwLock<SessionTable>,
}

impl Default for SessionManager {
    fn default() -> Self { Self::new(Duration::from_secs(60 * 60)) }
}

impl SessionManager {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, table: RwLock::new(SessionTable::default()) }
    }

    pub fn ttl(&self) -> Duration { self.ttl }

    /// Revocation generation of `username`. Read it before checking
    /// credentials and hand it to `issue_at`.
    pub fn generation(&self, username: &str) -> u64 { self.table.read().generation(username) }

    /// Store an authenticated session and hand back its token.
    pub fn issue(&self, session: Session) -> AuthResult<IssuedSession> {
        self.park(session, None)
    }

    /// Like `issue`, but refuses with `Unauthenticated` when the user's
    /// sessions were revoked after `observed` was read.
    pub fn issue_at(&self, session: Session, observed: u64) -> AuthResult<IssuedSession> {
        self.park(session, Some(observed))
    }

    fn park(&self, session: Session, observed: Option<u64>) -> AuthResult<IssuedSession> {
        let username = session
            .current_identity()
            .map(|i| i.username().to_string())
            .ok_or(AuthError::Unauthenticated)?;
        let token = gen_id()?;
        // Loggable handle; the token itself never reaches the logs.
        let session_id = uuid::Uuid::new_v4().to_string();
        let entry = SessionEntry { session, session_id: session_id.clone(), expires_at: Instant::now() + self.ttl };
        {
            let mut table = self.table.write();
            if let Some(seen) = observed {
                if table.generation(&username) != seen {
                    tprintln!("session.issue refused user={} stale generation", username);
                    return Err(AuthError::Unauthenticated);
                }
            }
            table.sessions.insert(token.clone(), entry);
            table.user_index.entry(username.clone()).or_default().insert(token.clone());
        }
        tprintln!("session.issue user={} sid={} ttl_secs={}", username, session_id, self.ttl.as_secs());
        Ok(IssuedSession { token, session_id, expires_in: self.ttl })
    }

    /// Snapshot of the session behind `token`, if it exists and has not expired.
    pub fn session(&self, token: &str) -> Option<Session> {
        let now = Instant::now();
        let expired = {
            let table = self.table.read();
            match table.sessions.get(token) {
                Some(ent) if ent.expires_at > now => return Some(ent.session.clone()),
                Some(_) => true,
                None => false,
            }
        };
        if expired { self.remove(token); }
        None
    }

    pub fn identity(&self, token: &str) -> Option<Identity> {
        self.session(token).and_then(|s| s.current_identity().cloned())
    }

    /// Remove the session for `token` and return it so the caller can log it out.
    pub fn remove(&self, token: &str) -> Option<Session> {
        let ent = self.table.write().remove(token)?;
        tprintln!("session.remove sid={}", ent.session_id);
        Some(ent.session)
    }

    /// Drop every session of `username` and bump its generation so logins
    /// already in flight cannot park a session afterwards. Used after a role
    /// change so stale capability sets cannot outlive the reassignment.
    pub fn revoke_user(&self, username: &str) -> usize {
        let mut table = self.table.write();
        *table.generations.entry(username.to_string()).or_insert(0) += 1;
        let tokens = table.user_index.remove(username).unwrap_or_default();
        let count = tokens.iter().filter(|t| table.sessions.remove(t.as_str()).is_some()).count();
        tprintln!("session.revoke user={} count={}", username, count);
        count
    }

    /// Drop expired sessions; returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut table = self.table.write();
        let expired: Vec<SessionToken> = table
            .sessions
            .iter()
            .filter(|(_, e)| e.expires_at <= now)
            .map(|(t, _)| t.clone())
            .collect();
        expired.iter().filter(|t| table.remove(t).is_some()).count()
    }

    pub fn active(&self) -> usize { self.table.read().sessions.len() }
}
