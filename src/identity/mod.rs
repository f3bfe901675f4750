//! Identity, sessions and access control for intelhub.
//! Keep the public surface thin and split implementation across sub-modules.
//!
//! Flow: `AuthService::login` verifies credentials against the credential store,
//! `Identity::create` derives capabilities from the role registry, a `Session`
//! holds the identity, and `authorize` gates every domain-scoped operation.

mod role;
mod principal;
mod session;
mod provider;
mod authorizer;
mod audit;

pub use role::{Role, Domain, CapabilitySet, Destination, capabilities_of, landing_page_of, display_name_of};
pub use principal::Identity;
pub use session::{Session, SessionToken, SessionManager, IssuedSession};
pub use provider::AuthService;
pub use authorizer::{authorize, require_admin};
pub use audit::{AuthEvent, AuditSink, TracingAuditSink, MemoryAuditSink};
