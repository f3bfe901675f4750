//! Access guard. The single enforcement point in front of domain data: every
//! incident, dataset, ticket and assistant operation calls `authorize` first.

use super::principal::Identity;
use super::role::Domain;
use crate::error::{AuthError, AuthResult};

/// Succeeds iff `domain` is in the identity's capability set. Pure.
pub fn authorize(identity: &Identity, domain: Domain) -> AuthResult<()> {
    if identity.capabilities().contains(domain) {
        Ok(())
    } else {
        Err(AuthError::access_denied(domain.as_str()))
    }
}

/// Gate for administrative actions (role reassignment, user listing).
pub fn require_admin(identity: &Identity, action: &str) -> AuthResult<()> {
    if identity.is_admin() { Ok(()) } else { Err(AuthError::access_denied(action)) }
}
