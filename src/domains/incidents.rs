use std::fmt;
use std::path::Path;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{require_text, table_error, Level};
use crate::error::{AuthError, AuthResult};
use crate::identity::{authorize, Domain, Identity};
use crate::storage::{Keyed, RecordTable, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IncidentStatus {
    Open,
    Investigating,
    Resolved,
    Closed,
}

impl IncidentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IncidentStatus::Open => "Open",
            IncidentStatus::Investigating => "Investigating",
            IncidentStatus::Resolved => "Resolved",
            IncidentStatus::Closed => "Closed",
        }
    }
}

impl fmt::Display for IncidentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for IncidentStatus {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "open" => Ok(IncidentStatus::Open),
            "investigating" => Ok(IncidentStatus::Investigating),
            "resolved" => Ok(IncidentStatus::Resolved),
            "closed" => Ok(IncidentStatus::Closed),
            _ => Err(AuthError::InvalidInput(format!("unknown incident status '{}'", s))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityIncident {
    pub id: i64,
    pub date: NaiveDate,
    pub incident_type: String,
    pub severity: Level,
    pub status: IncidentStatus,
    pub description: String,
    pub reported_by: Option<String>,
}

impl Keyed for SecurityIncident {
    fn id(&self) -> i64 { self.id }
    fn set_id(&mut self, id: i64) { self.id = id; }
}

impl SecurityIncident {
    pub fn severity_level(&self) -> u8 { self.severity.rank() }
    pub fn is_critical(&self) -> bool { self.severity == Level::Critical }
    pub fn is_open(&self) -> bool { matches!(self.status, IncidentStatus::Open | IncidentStatus::Investigating) }

    /// Plain-text summary handed to the assistant as conversation context.
    pub fn ai_context(&self) -> String {
        format!(
            "Incident Type: {}\nSeverity: {}\nStatus: {}\nDate: {}\nDescription: {}\nReported By: {}",
            self.incident_type,
            self.severity,
            self.status,
            self.date,
            self.description,
            self.reported_by.as_deref().unwrap_or("Unknown"),
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewIncident {
    pub date: NaiveDate,
    pub incident_type: String,
    pub severity: Level,
    #[serde(default)]
    pub status: Option<IncidentStatus>,
    #[serde(default)]
    pub description: String,
}

pub struct IncidentRepository {
    table: RecordTable<SecurityIncident>,
}

impl IncidentRepository {
    pub fn in_memory() -> Self { Self { table: RecordTable::in_memory() } }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        Ok(Self { table: RecordTable::open(path)? })
    }

    /// Newest first.
    pub fn list(&self, who: &Identity) -> AuthResult<Vec<SecurityIncident>> {
        authorize(who, Domain::Cybersecurity)?;
        let mut rows = self.table.all();
        rows.sort_by(|a, b| b.date.cmp(&a.date).then(b.id.cmp(&a.id)));
        Ok(rows)
    }

    pub fn get(&self, who: &Identity, id: i64) -> AuthResult<SecurityIncident> {
        authorize(who, Domain::Cybersecurity)?;
        self.table.get(id).ok_or_else(|| AuthError::NotFound(format!("incident {}", id)))
    }

    /// Record a new incident reported by `who`.
    pub fn report(&self, who: &Identity, new: NewIncident) -> AuthResult<SecurityIncident> {
        authorize(who, Domain::Cybersecurity)?;
        require_text("incident_type", &new.incident_type)?;
        let row = SecurityIncident {
            id: 0,
            date: new.date,
            incident_type: new.incident_type,
            severity: new.severity,
            status: new.status.unwrap_or(IncidentStatus::Open),
            description: new.description,
            reported_by: Some(who.username().to_string()),
        };
        let saved = self.table.insert(row).map_err(table_error)?;
        info!(target: "records", id = saved.id, by = %who.username(), severity = %saved.severity, "incident.reported");
        Ok(saved)
    }

    pub fn update_status(&self, who: &Identity, id: i64, status: IncidentStatus) -> AuthResult<SecurityIncident> {
        authorize(who, Domain::Cybersecurity)?;
        self.table
            .update(id, |r| r.status = status)
            .map_err(table_error)?
            .ok_or_else(|| AuthError::NotFound(format!("incident {}", id)))
    }

    /// Open incidents at Critical severity.
    pub fn open_critical(&self, who: &Identity) -> AuthResult<Vec<SecurityIncident>> {
        Ok(self.list(who)?.into_iter().filter(|i| i.is_open() && i.is_critical()).collect())
    }
}
