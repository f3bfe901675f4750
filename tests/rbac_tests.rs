//! RBAC integration tests: every domain repository refuses identities whose
//! role does not grant its domain, and role changes take effect on next login.

use std::sync::Arc;

use anyhow::Result;
use chrono::NaiveDate;
use tempfile::tempdir;

use intelhub::domains::{Level, NewDataset, NewIncident, NewTicket, Workspace};
use intelhub::error::AuthError;
use intelhub::identity::{AuthService, Identity, Role, Session, SessionManager};
use intelhub::setup;
use intelhub::storage::MemoryUserStore;

fn seeded() -> (AuthService, Workspace) {
    let auth = AuthService::with_store(Arc::new(MemoryUserStore::new()));
    setup::seed_demo_accounts(&auth).expect("seed accounts");
    let ws = Workspace::in_memory();
    (auth, ws)
}

fn login(auth: &AuthService, user: &str) -> Identity {
    let (_, password, _) = setup::DEMO_ACCOUNTS.iter().find(|(u, _, _)| *u == user).expect("demo account");
    auth.login(user, password).expect("demo login")
}

fn denied<T: std::fmt::Debug>(r: Result<T, AuthError>) -> bool { matches!(r, Err(AuthError::AccessDenied { .. })) }

fn incident() -> NewIncident {
    NewIncident {
        date: NaiveDate::from_ymd_opt(2024, 11, 5).unwrap(),
        incident_type: "DDoS".into(),
        severity: Level::High,
        status: None,
        description: "web portal flooded".into(),
    }
}

fn dataset() -> NewDataset {
    NewDataset {
        name: "Firewall Logs".into(),
        category: "Network Logs".into(),
        source: "Perimeter".into(),
        last_updated: NaiveDate::from_ymd_opt(2024, 11, 21).unwrap(),
        record_count: 3_200_000,
        file_size_mb: 620.4,
    }
}

fn ticket(n: &str) -> NewTicket {
    NewTicket {
        ticket_number: n.into(),
        priority: Level::Critical,
        category: "Network".into(),
        subject: "Data centre outage".into(),
        description: String::new(),
        created_date: None,
        assigned_to: None,
        status: None,
        resolved_date: None,
    }
}

#[test]
fn each_role_reaches_only_its_repository() {
    let (auth, ws) = seeded();
    let cyber = login(&auth, "cyber_analyst");
    let data = login(&auth, "data_scientist");
    let it = login(&auth, "it_engineer");

    assert!(ws.incidents.report(&cyber, incident()).is_ok());
    assert!(denied(ws.incidents.report(&data, incident())));
    assert!(denied(ws.incidents.list(&it)));

    assert!(ws.datasets.add(&data, dataset()).is_ok());
    assert!(denied(ws.datasets.add(&cyber, dataset())));
    assert!(denied(ws.datasets.list(&it)));

    assert!(ws.tickets.create(&it, ticket("TICK-1")).is_ok());
    assert!(denied(ws.tickets.create(&data, ticket("TICK-2"))));
    assert!(denied(ws.tickets.list(&cyber)));
}

#[test]
fn administrator_reaches_every_repository() {
    let (auth, ws) = seeded();
    let admin = login(&auth, "admin");
    setup::seed_sample_records(&ws, &admin).unwrap();
    assert!(!ws.incidents.list(&admin).unwrap().is_empty());
    assert!(!ws.datasets.list(&admin).unwrap().is_empty());
    assert!(!ws.tickets.list(&admin).unwrap().is_empty());
    assert!(!ws.incidents.open_critical(&admin).unwrap().is_empty());
}

#[test]
fn denied_write_leaves_table_untouched() {
    let (auth, ws) = seeded();
    let admin = login(&auth, "admin");
    let data = login(&auth, "data_scientist");
    assert!(denied(ws.incidents.report(&data, incident())));
    assert!(ws.incidents.list(&admin).unwrap().is_empty());
}

#[test]
fn role_change_applies_on_next_login_and_revokes_sessions() {
    let (auth, _ws) = seeded();
    let sessions = SessionManager::default();
    let admin = login(&auth, "admin");

    let mut s = Session::new();
    auth.login_session(&mut s, "it_engineer", "ITPass123!").unwrap();
    let issued = sessions.issue(s).unwrap();
    assert_eq!(sessions.identity(&issued.token).unwrap().role(), Role::ItEngineer);

    auth.reassign_role(&admin, "it_engineer", "data-scientist").unwrap();
    assert_eq!(sessions.revoke_user("it_engineer"), 1);
    assert!(sessions.identity(&issued.token).is_none());
    assert_eq!(login(&auth, "it_engineer").role(), Role::DataScientist);
}

#[test]
fn workspace_records_persist_across_reopen() -> Result<()> {
    let tmp = tempdir()?;
    let admin = Identity::create(1, "admin", Role::Administrator);
    {
        let ws = Workspace::open(tmp.path())?;
        ws.tickets.create(&admin, ticket("TICK-9"))?;
        ws.datasets.add(&admin, dataset())?;
    }
    let ws = Workspace::open(tmp.path())?;
    let tickets = ws.tickets.list(&admin)?;
    assert_eq!(tickets.len(), 1);
    assert_eq!(tickets[0].ticket_number, "TICK-9");
    assert_eq!(ws.datasets.list(&admin)?.len(), 1);
    assert!(matches!(ws.tickets.create(&admin, ticket("TICK-9")), Err(AuthError::AlreadyExists(_))));
    Ok(())
}
