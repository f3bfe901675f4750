//! Security-relevant events. The core only emits them; formatting and
//! retention belong to the sink.

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{info, warn};

use super::role::Role;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuthEvent {
    Registered { user_id: i64, username: String, role: Role },
    LoginSucceeded { user_id: i64, username: String, role: Role },
    LoginFailed { username: String },
    LoggedOut { username: String },
    PasswordChanged { username: String },
    RoleReassigned { username: String, role: Role, by: String },
}

pub trait AuditSink: Send + Sync {
    fn record(&self, event: AuthEvent);
}

/// Default sink: one structured line per event on the `audit` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: AuthEvent) {
        match &event {
            AuthEvent::LoginFailed { username } => warn!(target: "audit", username = %username, "auth.login_failed"),
            other => info!(target: "audit", event = ?other, "auth.event"),
        }
    }
}

/// Keeps events in memory; used by tests and by callers that forward events
/// elsewhere in batches.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    events: Mutex<Vec<AuthEvent>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self { Self::default() }
    pub fn events(&self) -> Vec<AuthEvent> { self.events.lock().clone() }
    pub fn drain(&self) -> Vec<AuthEvent> { std::mem::take(&mut *self.events.lock()) }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, event: AuthEvent) { self.events.lock().push(event); }
}
