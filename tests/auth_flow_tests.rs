//! End-to-end authentication tests against the on-disk Parquet user table.
//! Each test gets its own temporary data folder.

use std::sync::Arc;

use anyhow::Result;
use tempfile::tempdir;

use intelhub::error::AuthError;
use intelhub::identity::{authorize, AuthService, Domain, MemoryAuditSink, Role, Session};
use intelhub::security::{self, PasswordPolicy};
use intelhub::storage::{MemoryUserStore, ParquetUserStore, UserStore};

fn parquet_service(root: &std::path::Path) -> Result<AuthService> {
    let store = ParquetUserStore::open(root)?;
    Ok(AuthService::new(Arc::new(store), PasswordPolicy::default(), Arc::new(MemoryAuditSink::new())))
}

#[test]
fn register_then_login_keeps_role_for_every_role() -> Result<()> {
    let tmp = tempdir()?;
    let svc = parquet_service(tmp.path())?;
    let cases = [
        ("u_cyber", "cybersecurity-analyst", Role::CybersecurityAnalyst),
        ("u_data", "data-scientist", Role::DataScientist),
        ("u_it", "it-engineer", Role::ItEngineer),
        ("u_admin", "administrator", Role::Administrator),
    ];
    for (username, role_id, role) in cases {
        svc.register(username, "LongEnough1!", role_id)?;
        let id = svc.login(username, "LongEnough1!")?;
        assert_eq!(id.role(), role, "role for {}", username);
        assert_eq!(id.username(), username);
    }
    Ok(())
}

#[test]
fn duplicate_register_fails_and_keeps_first_record() -> Result<()> {
    let tmp = tempdir()?;
    let svc = parquet_service(tmp.path())?;
    svc.register("alice", "AlicePass123!", "data-scientist")?;
    let err = svc.register("alice", "OtherPass123!", "administrator").unwrap_err();
    assert!(matches!(err, AuthError::AlreadyExists(_)));

    let id = svc.login("alice", "AlicePass123!")?;
    assert_eq!(id.role(), Role::DataScientist);
    assert!(matches!(svc.login("alice", "OtherPass123!"), Err(AuthError::InvalidCredentials)));
    Ok(())
}

#[test]
fn altered_password_and_unknown_user_fail_the_same_way() -> Result<()> {
    let tmp = tempdir()?;
    let svc = parquet_service(tmp.path())?;
    svc.register("bob", "BobPass123!", "it-engineer")?;
    let altered = svc.login("bob", "BobPass124!").unwrap_err();
    let unknown = svc.login("never_registered", "BobPass123!").unwrap_err();
    assert!(matches!(altered, AuthError::InvalidCredentials));
    assert!(matches!(unknown, AuthError::InvalidCredentials));
    assert_eq!(altered.code(), unknown.code());
    assert_eq!(altered.to_string(), unknown.to_string());
    Ok(())
}

#[test]
fn capability_matrix() {
    let svc = AuthService::with_store(Arc::new(MemoryUserStore::new()));
    let single = [
        ("c", "cybersecurity-analyst", Domain::Cybersecurity),
        ("d", "data-scientist", Domain::DataScience),
        ("i", "it-engineer", Domain::ItOperations),
    ];
    for (username, role, allowed) in single {
        svc.register(username, "Password123", role).unwrap();
        let id = svc.login(username, "Password123").unwrap();
        for domain in Domain::ALL {
            let res = authorize(&id, domain);
            if domain == allowed {
                assert!(res.is_ok(), "{} should reach {}", role, domain);
            } else {
                assert!(matches!(res, Err(AuthError::AccessDenied { .. })), "{} must not reach {}", role, domain);
            }
        }
    }
    svc.register("a", "Password123", "administrator").unwrap();
    let admin = svc.login("a", "Password123").unwrap();
    for domain in Domain::ALL {
        assert!(authorize(&admin, domain).is_ok());
    }
}

#[test]
fn hashing_is_salted_but_both_verify() -> Result<()> {
    let a = security::hash_password("CyberPass123!")?;
    let b = security::hash_password("CyberPass123!")?;
    assert_ne!(a, b);
    assert!(security::verify_password("CyberPass123!", a.as_str()));
    assert!(security::verify_password("CyberPass123!", b.as_str()));
    Ok(())
}

#[test]
fn cyber_analyst_scenario() -> Result<()> {
    let tmp = tempdir()?;
    let svc = parquet_service(tmp.path())?;
    svc.register("cyber_analyst", "CyberPass123!", "cybersecurity-analyst")?;
    let mut session = Session::new();
    let id = svc.login_session(&mut session, "cyber_analyst", "CyberPass123!")?;
    assert_eq!(id.landing().path(), "/dashboard/cybersecurity");
    assert!(session.authorize(Domain::Cybersecurity).is_ok());
    assert!(matches!(session.authorize(Domain::ItOperations), Err(AuthError::AccessDenied { .. })));
    Ok(())
}

#[test]
fn admin_scenario() -> Result<()> {
    let tmp = tempdir()?;
    let svc = parquet_service(tmp.path())?;
    svc.register("admin", "AdminPass123!", "administrator")?;
    let id = svc.login("admin", "AdminPass123!")?;
    for name in ["cybersecurity", "datascience", "itoperations"] {
        let domain: Domain = name.parse()?;
        authorize(&id, domain)?;
    }
    Ok(())
}

#[test]
fn accounts_survive_reopen() -> Result<()> {
    let tmp = tempdir()?;
    {
        let svc = parquet_service(tmp.path())?;
        svc.register("persisted", "Persist123!", "it-engineer")?;
    }
    let svc = parquet_service(tmp.path())?;
    assert_eq!(svc.login("persisted", "Persist123!")?.role(), Role::ItEngineer);
    Ok(())
}

#[test]
fn stored_hash_is_never_the_password() -> Result<()> {
    let tmp = tempdir()?;
    let store = Arc::new(ParquetUserStore::open(tmp.path())?);
    let svc = AuthService::with_store(store.clone());
    svc.register("carol", "CarolPass123!", "data-scientist")?;
    let rec = store.find_user_by_username("carol")?.expect("row");
    assert_ne!(rec.password_hash, "CarolPass123!");
    assert!(rec.password_hash.starts_with("$argon2"));
    Ok(())
}

#[test]
fn unauthenticated_session_is_rejected_before_capabilities() {
    let session = Session::new();
    assert!(matches!(session.authorize(Domain::Cybersecurity), Err(AuthError::Unauthenticated)));
}
