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
pub enum TicketStatus {
    Open,
    #[serde(rename = "In Progress")]
    InProgress,
    Resolved,
    Closed,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Open => "Open",
            TicketStatus::InProgress => "In Progress",
            TicketStatus::Resolved => "Resolved",
            TicketStatus::Closed => "Closed",
        }
    }

    /// Resolved and Closed carry a resolution date.
    pub fn is_terminal(&self) -> bool { matches!(self, TicketStatus::Resolved | TicketStatus::Closed) }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for TicketStatus {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['_', '-'], " ").as_str() {
            "open" => Ok(TicketStatus::Open),
            "in progress" => Ok(TicketStatus::InProgress),
            "resolved" => Ok(TicketStatus::Resolved),
            "closed" => Ok(TicketStatus::Closed),
            _ => Err(AuthError::InvalidInput(format!("unknown ticket status '{}'", s))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItTicket {
    pub id: i64,
    pub ticket_number: String,
    pub priority: Level,
    pub status: TicketStatus,
    pub category: String,
    pub subject: String,
    pub description: String,
    pub created_date: NaiveDate,
    pub resolved_date: Option<NaiveDate>,
    pub assigned_to: Option<String>,
}

impl Keyed for ItTicket {
    fn id(&self) -> i64 { self.id }
    fn set_id(&mut self, id: i64) { self.id = id; }
}

impl ItTicket {
    pub fn priority_level(&self) -> u8 { self.priority.rank() }
    pub fn is_critical(&self) -> bool { self.priority == Level::Critical }
    pub fn is_open(&self) -> bool { matches!(self.status, TicketStatus::Open | TicketStatus::InProgress) }
    pub fn is_assigned(&self) -> bool { self.assigned_to.is_some() }

    /// Assigning an open ticket moves it to In Progress.
    pub fn assign_to(&mut self, staff: &str) {
        self.assigned_to = Some(staff.to_string());
        if self.status == TicketStatus::Open {
            self.status = TicketStatus::InProgress;
        }
    }

    /// Terminal statuses stamp `today` as the resolution date; reopening clears it.
    pub fn set_status(&mut self, status: TicketStatus, today: NaiveDate) {
        self.status = status;
        self.resolved_date = if status.is_terminal() { Some(today) } else { None };
    }

    pub fn close(&mut self, today: NaiveDate) { self.set_status(TicketStatus::Closed, today); }

    pub fn ai_context(&self) -> String {
        format!(
            "Ticket Number: {}\nCategory: {}\nPriority: {}\nStatus: {}\nSubject: {}\nDescription: {}\nCreated: {}\nAssigned To: {}\nResolved: {}",
            self.ticket_number,
            self.category,
            self.priority,
            self.status,
            self.subject,
            self.description,
            self.created_date,
            self.assigned_to.as_deref().unwrap_or("Unassigned"),
            self.resolved_date.map(|d| d.to_string()).unwrap_or_else(|| "Not resolved".into()),
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewTicket {
    pub ticket_number: String,
    pub priority: Level,
    #[serde(default)]
    pub category: String,
    pub subject: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub created_date: Option<NaiveDate>,
    #[serde(default)]
    pub assigned_to: Option<String>,
    /// Imported tickets may arrive already progressed.
    #[serde(default)]
    pub status: Option<TicketStatus>,
    #[serde(default)]
    pub resolved_date: Option<NaiveDate>,
}

fn today() -> NaiveDate { chrono::Utc::now().date_naive() }

pub struct TicketRepository {
    table: RecordTable<ItTicket>,
}

impl TicketRepository {
    pub fn in_memory() -> Self { Self { table: RecordTable::in_memory() } }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        Ok(Self { table: RecordTable::open(path)? })
    }

    /// Newest first.
    pub fn list(&self, who: &Identity) -> AuthResult<Vec<ItTicket>> {
        authorize(who, Domain::ItOperations)?;
        let mut rows = self.table.all();
        rows.sort_by(|a, b| b.created_date.cmp(&a.created_date).then(b.id.cmp(&a.id)));
        Ok(rows)
    }

    pub fn get(&self, who: &Identity, id: i64) -> AuthResult<ItTicket> {
        authorize(who, Domain::ItOperations)?;
        self.table.get(id).ok_or_else(|| AuthError::NotFound(format!("ticket {}", id)))
    }

    /// Ticket numbers are unique; a duplicate fails with `AlreadyExists`.
    pub fn create(&self, who: &Identity, new: NewTicket) -> AuthResult<ItTicket> {
        authorize(who, Domain::ItOperations)?;
        require_text("ticket_number", &new.ticket_number)?;
        require_text("subject", &new.subject)?;
        let mut row = ItTicket {
            id: 0,
            ticket_number: new.ticket_number.trim().to_string(),
            priority: new.priority,
            status: TicketStatus::Open,
            category: new.category,
            subject: new.subject,
            description: new.description,
            created_date: new.created_date.unwrap_or_else(today),
            resolved_date: None,
            assigned_to: None,
        };
        if let Some(staff) = new.assigned_to.as_deref().filter(|s| !s.trim().is_empty()) {
            row.assign_to(staff);
        }
        if let Some(status) = new.status {
            row.set_status(status, new.resolved_date.unwrap_or_else(today));
        }
        let saved = self
            .table
            .insert_unique(row, |t| Some(t.ticket_number.clone()))
            .map_err(table_error)?;
        info!(target: "records", id = saved.id, number = %saved.ticket_number, by = %who.username(), "ticket.created");
        Ok(saved)
    }

    pub fn assign(&self, who: &Identity, id: i64, staff: &str) -> AuthResult<ItTicket> {
        authorize(who, Domain::ItOperations)?;
        require_text("assignee", staff)?;
        self.modify(id, |t| t.assign_to(staff))
    }

    pub fn update_status(&self, who: &Identity, id: i64, status: TicketStatus) -> AuthResult<ItTicket> {
        authorize(who, Domain::ItOperations)?;
        let day = today();
        self.modify(id, |t| t.set_status(status, day))
    }

    pub fn close(&self, who: &Identity, id: i64) -> AuthResult<ItTicket> {
        authorize(who, Domain::ItOperations)?;
        let day = today();
        self.modify(id, |t| t.close(day))
    }

    fn modify<F: FnOnce(&mut ItTicket)>(&self, id: i64, f: F) -> AuthResult<ItTicket> {
        self.table
            .update(id, f)
            .map_err(table_error)?
            .ok_or_else(|| AuthError::NotFound(format!("ticket {}", id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Role;

    fn ticket(number: &str) -> NewTicket {
        NewTicket {
            ticket_number: number.into(),
            priority: Level::High,
            category: "Network".into(),
            subject: "VPN drops every hour".into(),
            description: String::new(),
            created_date: NaiveDate::from_ymd_opt(2024, 11, 2),
            assigned_to: None,
            status: None,
            resolved_date: None,
        }
    }

    fn engineer() -> Identity { Identity::create(3, "it_engineer", Role::ItEngineer) }

    #[test]
    fn lifecycle_open_assign_resolve_reopen_close() {
        let repo = TicketRepository::in_memory();
        let who = engineer();
        let t = repo.create(&who, ticket("TICK-001")).unwrap();
        assert_eq!(t.status, TicketStatus::Open);
        assert!(!t.is_assigned());

        let t = repo.assign(&who, t.id, "bob").unwrap();
        assert_eq!(t.status, TicketStatus::InProgress);
        assert_eq!(t.assigned_to.as_deref(), Some("bob"));

        let t = repo.update_status(&who, t.id, TicketStatus::Resolved).unwrap();
        assert!(t.resolved_date.is_some());
        assert!(!t.is_open());

        let t = repo.update_status(&who, t.id, TicketStatus::Open).unwrap();
        assert!(t.resolved_date.is_none());

        let t = repo.close(&who, t.id).unwrap();
        assert_eq!(t.status, TicketStatus::Closed);
        assert!(t.resolved_date.is_some());
    }

    #[test]
    fn assigning_in_progress_ticket_keeps_status() {
        let mut t = ItTicket {
            id: 1,
            ticket_number: "T".into(),
            priority: Level::Low,
            status: TicketStatus::Resolved,
            category: String::new(),
            subject: "s".into(),
            description: String::new(),
            created_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            resolved_date: None,
            assigned_to: None,
        };
        t.assign_to("alice");
        assert_eq!(t.status, TicketStatus::Resolved);
        assert!(t.ai_context().contains("Assigned To: alice"));
    }

    #[test]
    fn duplicate_ticket_number_already_exists() {
        let repo = TicketRepository::in_memory();
        let who = engineer();
        repo.create(&who, ticket("TICK-001")).unwrap();
        assert!(matches!(repo.create(&who, ticket("TICK-001")), Err(AuthError::AlreadyExists(_))));
        assert_eq!(repo.list(&who).unwrap().len(), 1);
    }

    #[test]
    fn created_with_assignee_starts_in_progress() {
        let repo = TicketRepository::in_memory();
        let mut new = ticket("TICK-002");
        new.assigned_to = Some("carol".into());
        let t = repo.create(&engineer(), new).unwrap();
        assert_eq!(t.status, TicketStatus::InProgress);
    }

    #[test]
    fn imported_resolved_ticket_keeps_its_date() {
        let repo = TicketRepository::in_memory();
        let mut new = ticket("TICK-003");
        new.status = Some(TicketStatus::Resolved);
        new.resolved_date = NaiveDate::from_ymd_opt(2024, 11, 10);
        let t = repo.create(&engineer(), new).unwrap();
        assert_eq!(t.resolved_date, NaiveDate::from_ymd_opt(2024, 11, 10));
        assert!(!t.is_open());
    }

    #[test]
    fn data_scientist_is_denied() {
        let repo = TicketRepository::in_memory();
        let ds = Identity::create(2, "data_scientist", Role::DataScientist);
        assert!(matches!(repo.list(&ds), Err(AuthError::AccessDenied { .. })));
        assert!(matches!(repo.close(&ds, 1), Err(AuthError::AccessDenied { .. })));
    }

    #[test]
    fn unknown_ticket_is_not_found() {
        let repo = TicketRepository::in_memory();
        assert!(matches!(repo.assign(&engineer(), 5, "bob"), Err(AuthError::NotFound(_))));
    }

    #[test]
    fn status_parse_accepts_variants() {
        assert_eq!("in_progress".parse::<TicketStatus>().unwrap(), TicketStatus::InProgress);
        assert_eq!("In Progress".parse::<TicketStatus>().unwrap(), TicketStatus::InProgress);
        assert!("done".parse::<TicketStatus>().is_err());
    }
}
