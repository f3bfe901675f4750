use serde::Serialize;

use super::role::{capabilities_of, display_name_of, landing_page_of, CapabilitySet, Destination, Domain, Role};
use crate::storage::CredentialRecord;

/// Runtime representation of an authenticated actor.
///
/// Tagged by `Role`; capabilities and landing destination come only from the
/// role registry, and the fields are private, so two identities with the same
/// role always behave the same.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    id: i64,
    username: String,
    role: Role,
    capabilities: CapabilitySet,
    landing: Destination,
}

impl Identity {
    /// Identity factory. Total over the closed role enumeration.
    pub fn create<S: Into<String>>(id: i64, username: S, role: Role) -> Self {
        Self {
            id,
            username: username.into(),
            role,
            capabilities: capabilities_of(role),
            landing: landing_page_of(role),
        }
    }

    pub fn from_record(rec: &CredentialRecord) -> Self {
        Self::create(rec.id, rec.username.clone(), rec.role)
    }

    pub fn id(&self) -> i64 { self.id }
    pub fn username(&self) -> &str { &self.username }
    pub fn role(&self) -> Role { self.role }
    pub fn capabilities(&self) -> CapabilitySet { self.capabilities }
    pub fn landing(&self) -> Destination { self.landing }
    pub fn role_display_name(&self) -> &'static str { display_name_of(self.role) }
    pub fn can_access(&self, domain: Domain) -> bool { self.capabilities.contains(domain) }
    pub fn is_admin(&self) -> bool { self.role == Role::Administrator }
}
