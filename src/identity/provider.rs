use std::sync::Arc;

use tracing::debug;

use super::audit::{AuditSink, AuthEvent, TracingAuditSink};
use super::authorizer::require_admin;
use super::principal::Identity;
use super::role::Role;
use super::session::Session;
use crate::error::{AuthError, AuthResult};
use crate::security::{self, PasswordPolicy};
use crate::storage::{CredentialRecord, CredentialStore, StoreError, UserStore};

/// Authentication service: composes the credential store, password hasher,
/// role registry and identity factory. The only writer of `Session` state.
pub struct AuthService {
    credentials: CredentialStore,
    policy: PasswordPolicy,
    audit: Arc<dyn AuditSink>,
}

impl AuthService {
    pub fn new(store: Arc<dyn UserStore>, policy: PasswordPolicy, audit: Arc<dyn AuditSink>) -> Self {
        Self { credentials: CredentialStore::new(store), policy, audit }
    }

    /// Default policy, events go to tracing.
    pub fn with_store(store: Arc<dyn UserStore>) -> Self {
        Self::new(store, PasswordPolicy::default(), Arc::new(TracingAuditSink))
    }

    pub fn credentials(&self) -> &CredentialStore { &self.credentials }

    pub fn policy(&self) -> &PasswordPolicy { &self.policy }

    /// Validate and persist a new account.
    pub fn register(&self, username: &str, password: &str, role: &str) -> AuthResult<()> {
        // Role first: an unknown role is a caller bug, report it as such even
        // when the password is also weak.
        let _: Role = role.parse()?;
        if username.trim().is_empty() {
            return Err(AuthError::InvalidUsername("username cannot be empty".into()));
        }
        self.policy.validate(password)?;
        let rec = self.credentials.register(username, password, role)?;
        self.audit.record(AuthEvent::Registered { user_id: rec.id, username: rec.username, role: rec.role });
        Ok(())
    }

    /// Look up `username` and check `password` against the stored hash. Emits
    /// no audit events. Unknown users, wrong passwords and unreadable rows all
    /// come back as `InvalidCredentials`; only an unreachable store is a fault.
    fn verify_credentials(&self, username: &str, password: &str) -> AuthResult<CredentialRecord> {
        if username.is_empty() || password.is_empty() {
            return Err(AuthError::InvalidCredentials);
        }
        let rec = match self.credentials.find_by_username(username) {
            Ok(Some(rec)) => rec,
            Ok(None) => {
                security::dummy_verify(password);
                return Err(AuthError::InvalidCredentials);
            }
            // A bad row is already logged by the store layer; answering with a
            // fault here would tell the caller the name exists.
            Err(AuthError::StorageFault(StoreError::Corrupt(_))) => {
                security::dummy_verify(password);
                return Err(AuthError::InvalidCredentials);
            }
            Err(e) => return Err(e),
        };
        if !security::verify_password(password, &rec.password_hash) {
            return Err(AuthError::InvalidCredentials);
        }
        Ok(rec)
    }

    /// Verify credentials and build an identity. Unknown user and wrong
    /// password both fail with `InvalidCredentials`.
    pub fn login(&self, username: &str, password: &str) -> AuthResult<Identity> {
        match self.verify_credentials(username, password) {
            Ok(rec) => {
                let identity = Identity::from_record(&rec);
                self.audit.record(AuthEvent::LoginSucceeded { user_id: rec.id, username: rec.username, role: rec.role });
                Ok(identity)
            }
            Err(AuthError::InvalidCredentials) => {
                self.audit.record(AuthEvent::LoginFailed { username: username.to_string() });
                Err(AuthError::InvalidCredentials)
            }
            Err(e) => Err(e),
        }
    }

    /// Log in and bind the identity to `session`. A failed attempt leaves the
    /// session exactly as it was.
    pub fn login_session(&self, session: &mut Session, username: &str, password: &str) -> AuthResult<Identity> {
        let identity = self.login(username, password)?;
        if let Some(prev) = session.current_identity() {
            debug!(target: "auth", previous = %prev.username(), next = %identity.username(), "session re-login replaces identity");
        }
        session.set_identity(identity.clone());
        Ok(identity)
    }

    /// Reset `session` to unauthenticated. Returns false if it already was.
    pub fn logout(&self, session: &mut Session) -> bool {
        match session.clear() {
            Some(identity) => {
                self.audit.record(AuthEvent::LoggedOut { username: identity.username().to_string() });
                true
            }
            None => false,
        }
    }

    /// Rotate a password after re-verifying the current one.
    pub fn change_password(&self, username: &str, old_password: &str, new_password: &str) -> AuthResult<()> {
        self.verify_credentials(username, old_password)?;
        self.policy.validate(new_password)?;
        self.credentials.rotate_password(username, new_password)?;
        self.audit.record(AuthEvent::PasswordChanged { username: username.to_string() });
        Ok(())
    }

    /// Administrative role change. Existing sessions of `username` keep their
    /// old identity until they are revoked by the caller.
    pub fn reassign_role(&self, actor: &Identity, username: &str, role: &str) -> AuthResult<Role> {
        require_admin(actor, "role administration")?;
        let role: Role = role.parse()?;
        self.credentials.reassign_role(username, role)?;
        self.audit.record(AuthEvent::RoleReassigned {
            username: username.to_string(),
            role,
            by: actor.username().to_string(),
        });
        Ok(role)
    }

    pub fn list_users(&self, actor: &Identity) -> AuthResult<Vec<(i64, String, Role)>> {
        require_admin(actor, "user administration")?;
        Ok(self.credentials.list()?.into_iter().map(|r| (r.id, r.username, r.role)).collect())
    }
}
