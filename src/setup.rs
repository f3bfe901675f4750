use chrono::NaiveDate;
use tracing::{info, warn};

use crate::domains::{IncidentStatus, Level, NewDataset, NewIncident, NewTicket, TicketStatus, Workspace};
use crate::error::{AuthError, AuthResult};
use crate::identity::{AuthService, Identity};

/// Demo accounts, one per role.
pub const DEMO_ACCOUNTS: &[(&str, &str, &str)] = &[
    ("cyber_analyst", "CyberPass123!", "cybersecurity-analyst"),
    ("data_scientist", "DataPass123!", "data-scientist"),
    ("it_engineer", "ITPass123!", "it-engineer"),
    ("admin", "AdminPass123!", "administrator"),
];

/// Register any demo account that does not exist yet. Returns how many were created.
pub fn seed_demo_accounts(auth: &AuthService) -> AuthResult<usize> {
    let mut created = 0;
    for (username, password, role) in DEMO_ACCOUNTS {
        match auth.register(username, password, role) {
            Ok(()) => created += 1,
            Err(AuthError::AlreadyExists(_)) => {}
            Err(e) => return Err(e),
        }
    }
    info!(target: "intelhub", created, "demo accounts ensured");
    Ok(created)
}

fn day(y: i32, m: u32, d: u32) -> AuthResult<NaiveDate> {
    NaiveDate::from_ymd_opt(y, m, d).ok_or_else(|| AuthError::Internal(format!("bad sample date {}-{}-{}", y, m, d)))
}

/// Fill empty record tables with sample rows. `actor` must hold every domain.
pub fn seed_sample_records(ws: &Workspace, actor: &Identity) -> AuthResult<()> {
    if ws.incidents.list(actor)?.is_empty() {
        let rows = [
            (day(2024, 11, 1)?, "Phishing", Level::High, IncidentStatus::Resolved, "Suspicious email with urgent payment request"),
            (day(2024, 11, 3)?, "Malware", Level::Critical, IncidentStatus::Investigating, "Ransomware detected on finance server"),
            (day(2024, 11, 5)?, "DDoS", Level::High, IncidentStatus::Open, "Distributed denial of service attack on web portal"),
            (day(2024, 11, 7)?, "Data Breach", Level::Critical, IncidentStatus::Investigating, "Unauthorised access to customer database"),
            (day(2024, 11, 12)?, "Insider Threat", Level::High, IncidentStatus::Open, "Unusual data export activity detected"),
            (day(2024, 11, 15)?, "Malware", Level::Low, IncidentStatus::Closed, "Adware detected on marketing laptop"),
        ];
        for (date, kind, severity, status, description) in rows {
            ws.incidents.report(
                actor,
                NewIncident { date, incident_type: kind.into(), severity, status: Some(status), description: description.into() },
            )?;
        }
    }

    if ws.datasets.list(actor)?.is_empty() {
        let rows = [
            ("Network Traffic Logs Q4 2024", "Network Logs", "Internal SIEM", day(2024, 11, 20)?, 2_500_000, 450.5),
            ("Threat Intelligence Feed", "Threat Intelligence", "External API", day(2024, 11, 22)?, 150_000, 25.8),
            ("User Login Patterns", "User Behaviour", "Internal Database", day(2024, 11, 18)?, 500_000, 120.3),
            ("Security Alerts Archive", "Security Alerts", "Internal SIEM", day(2024, 11, 15)?, 750_000, 95.7),
            ("Firewall Logs", "Network Logs", "Perimeter Security", day(2024, 11, 21)?, 3_200_000, 620.4),
        ];
        for (name, category, source, last_updated, record_count, file_size_mb) in rows {
            ws.datasets.add(
                actor,
                NewDataset { name: name.into(), category: category.into(), source: source.into(), last_updated, record_count, file_size_mb },
            )?;
        }
    }

    if ws.tickets.list(actor)?.is_empty() {
        let rows = [
            ("TICK-0001", Level::Critical, TicketStatus::Open, "Hardware", "Server overheating alert", day(2024, 11, 1)?, None, None),
            ("TICK-0002", Level::High, TicketStatus::InProgress, "Network", "Slow network connectivity", day(2024, 11, 3)?, None, Some("alice")),
            ("TICK-0003", Level::Medium, TicketStatus::Resolved, "Software", "Application crashes frequently", day(2024, 11, 5)?, Some(day(2024, 11, 10)?), Some("bob")),
            ("TICK-0004", Level::Low, TicketStatus::Closed, "Access", "Password reset request", day(2024, 11, 7)?, Some(day(2024, 11, 8)?), None),
            ("TICK-0005", Level::Critical, TicketStatus::Open, "Network", "Internet outage in data centre", day(2024, 11, 20)?, None, None),
        ];
        for (number, priority, status, category, subject, created, resolved, assignee) in rows {
            ws.tickets.create(
                actor,
                NewTicket {
                    ticket_number: number.into(),
                    priority,
                    category: category.into(),
                    subject: subject.into(),
                    description: String::new(),
                    created_date: Some(created),
                    assigned_to: assignee.map(String::from),
                    status: Some(status),
                    resolved_date: resolved,
                },
            )?;
        }
    }
    info!(target: "intelhub", by = %actor.username(), "sample records ensured");
    Ok(())
}

/// Demo accounts plus sample records, signed in as the demo administrator.
/// If that password was rotated the records are skipped.
pub fn seed_demo(auth: &AuthService, ws: &Workspace) -> AuthResult<usize> {
    let created = seed_demo_accounts(auth)?;
    let password = DEMO_ACCOUNTS
        .iter()
        .find(|(name, _, _)| *name == "admin")
        .map(|(_, password, _)| *password)
        .ok_or_else(|| AuthError::Internal("demo admin account missing".into()))?;
    match auth.login("admin", password) {
        Ok(admin) => seed_sample_records(ws, &admin)?,
        Err(AuthError::InvalidCredentials) => warn!(target: "intelhub", "demo admin password changed, skipping sample records"),
        Err(e) => return Err(e),
    }
    Ok(created)
}
