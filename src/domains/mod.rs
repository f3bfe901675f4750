//!
//! intelhub domain records
//! -----------------------
//! Incidents (cybersecurity), dataset metadata (datascience) and support tickets
//! (itoperations). Every repository method takes the caller's `Identity` and runs
//! the access guard before touching a table; there is no unguarded path to the
//! records.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{AuthError, AuthResult};
use crate::storage::{self, StoreError};

pub mod incidents;
pub mod datasets;
pub mod tickets;

pub use incidents::{IncidentRepository, IncidentStatus, NewIncident, SecurityIncident};
pub use datasets::{Dataset, DatasetRepository, NewDataset};
pub use tickets::{ItTicket, NewTicket, TicketRepository, TicketStatus};

/// Shared Low..Critical scale used for incident severity and ticket priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Level {
    Low,
    Medium,
    High,
    Critical,
}

impl Level {
    /// 1 (Low) to 4 (Critical).
    pub fn rank(&self) -> u8 {
        match self {
            Level::Low => 1,
            Level::Medium => 2,
            Level::High => 3,
            Level::Critical => 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Low => "Low",
            Level::Medium => "Medium",
            Level::High => "High",
            Level::Critical => "Critical",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for Level {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Level::Low),
            "medium" => Ok(Level::Medium),
            "high" => Ok(Level::High),
            "critical" => Ok(Level::Critical),
            _ => Err(AuthError::InvalidInput(format!("unknown level '{}'", s))),
        }
    }
}

/// Map a table failure. Unique collisions become `AlreadyExists`, the rest are
/// storage faults.
pub(crate) fn table_error(err: StoreError) -> AuthError {
    match err {
        StoreError::UniqueViolation(key) => AuthError::AlreadyExists(key),
        other => storage::storage_fault(other),
    }
}

pub(crate) fn require_text(field: &str, value: &str) -> AuthResult<()> {
    if value.trim().is_empty() {
        return Err(AuthError::InvalidInput(format!("{} cannot be empty", field)));
    }
    Ok(())
}

pub(crate) fn round2(v: f64) -> f64 { (v * 100.0).round() / 100.0 }

/// The three repositories, opened together.
pub struct Workspace {
    pub incidents: IncidentRepository,
    pub datasets: DatasetRepository,
    pub tickets: TicketRepository,
}

impl Workspace {
    pub fn in_memory() -> Self {
        Self {
            incidents: IncidentRepository::in_memory(),
            datasets: DatasetRepository::in_memory(),
            tickets: TicketRepository::in_memory(),
        }
    }

    /// Open JSON-snapshot backed tables under `root`.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self, StoreError> {
        let root = root.as_ref();
        Ok(Self {
            incidents: IncidentRepository::open(root.join("cyber_incidents.json"))?,
            datasets: DatasetRepository::open(root.join("datasets_metadata.json"))?,
            tickets: TicketRepository::open(root.join("it_tickets.json"))?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_rank_and_parse() {
        assert_eq!("critical".parse::<Level>().unwrap().rank(), 4);
        assert_eq!(" Low ".parse::<Level>().unwrap(), Level::Low);
        assert!(Level::High > Level::Medium);
        assert!(matches!("urgent".parse::<Level>(), Err(AuthError::InvalidInput(_))));
    }

    #[test]
    fn round2_rounds_half_away() {
        assert_eq!(round2(1.234), 1.23);
        assert_eq!(round2(0.125), 0.13);
    }
}
