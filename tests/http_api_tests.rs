//! HTTP API tests: a real listener on an ephemeral port, driven with reqwest and
//! bearer tokens.

use std::sync::Arc;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::{json, Value};

use intelhub::domains::Workspace;
use intelhub::identity::{AuthService, SessionManager};
use intelhub::server::{router, AppState};
use intelhub::setup;
use intelhub::storage::MemoryUserStore;

async fn spawn_app() -> Result<String> {
    let auth = AuthService::with_store(Arc::new(MemoryUserStore::new()));
    let ws = Workspace::in_memory();
    setup::seed_demo(&auth, &ws)?;
    let state = AppState::new(auth, SessionManager::default(), ws);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, router(state)).await;
    });
    Ok(format!("http://{}", addr))
}

async fn login(client: &reqwest::Client, base: &str, user: &str, password: &str) -> Result<String> {
    let resp = client
        .post(format!("{}/login", base))
        .json(&json!({"username": user, "password": password}))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let v: Value = resp.json().await?;
    Ok(v["token"].as_str().expect("token").to_string())
}

#[tokio::test]
async fn login_returns_token_identity_and_landing() -> Result<()> {
    let base = spawn_app().await?;
    let client = reqwest::Client::new();
    let resp = client
        .post(format!("{}/login", base))
        .json(&json!({"username": "cyber_analyst", "password": "CyberPass123!"}))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers().get(reqwest::header::SET_COOKIE).is_some());
    let v: Value = resp.json().await?;
    assert_eq!(v["status"], "ok");
    assert_eq!(v["landing"], "/dashboard/cybersecurity");
    assert_eq!(v["identity"]["role"], "cybersecurity-analyst");
    assert_eq!(v["identity"]["capabilities"], json!(["cybersecurity"]));
    Ok(())
}

#[tokio::test]
async fn bad_credentials_are_401_either_way() -> Result<()> {
    let base = spawn_app().await?;
    let client = reqwest::Client::new();
    let mut bodies = Vec::new();
    for (user, pass) in [("cyber_analyst", "CyberPass123?"), ("ghost", "CyberPass123!")] {
        let resp = client
            .post(format!("{}/login", base))
            .json(&json!({"username": user, "password": pass}))
            .send()
            .await?;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        bodies.push(resp.json::<Value>().await?);
    }
    assert_eq!(bodies[0], bodies[1]);
    assert_eq!(bodies[0]["code"], "invalid_credentials");
    Ok(())
}

#[tokio::test]
async fn domain_routes_follow_capabilities() -> Result<()> {
    let base = spawn_app().await?;
    let client = reqwest::Client::new();
    let token = login(&client, &base, "data_scientist", "DataPass123!").await?;

    let ok = client.get(format!("{}/datasets", base)).bearer_auth(&token).send().await?;
    assert_eq!(ok.status(), StatusCode::OK);
    let v: Value = ok.json().await?;
    assert!(v["datasets"].as_array().map(|a| !a.is_empty()).unwrap_or(false));

    let denied = client.get(format!("{}/incidents", base)).bearer_auth(&token).send().await?;
    assert_eq!(denied.status(), StatusCode::FORBIDDEN);
    let v: Value = denied.json().await?;
    assert_eq!(v["code"], "access_denied");

    let domains: Value = client.get(format!("{}/domains", base)).bearer_auth(&token).send().await?.json().await?;
    let allowed: Vec<&str> = domains["domains"]
        .as_array()
        .expect("domains")
        .iter()
        .filter(|d| d["allowed"] == true)
        .filter_map(|d| d["domain"].as_str())
        .collect();
    assert_eq!(allowed, vec!["datascience"]);
    Ok(())
}

#[tokio::test]
async fn missing_or_revoked_token_is_401() -> Result<()> {
    let base = spawn_app().await?;
    let client = reqwest::Client::new();
    let resp = client.get(format!("{}/me", base)).send().await?;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let token = login(&client, &base, "it_engineer", "ITPass123!").await?;
    let me: Value = client.get(format!("{}/me", base)).bearer_auth(&token).send().await?.json().await?;
    assert_eq!(me["identity"]["username"], "it_engineer");

    let out: Value = client.post(format!("{}/logout", base)).bearer_auth(&token).send().await?.json().await?;
    assert_eq!(out["logged_out"], true);
    let resp = client.get(format!("{}/me", base)).bearer_auth(&token).send().await?;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn ticket_workflow_over_http() -> Result<()> {
    let base = spawn_app().await?;
    let client = reqwest::Client::new();
    let token = login(&client, &base, "it_engineer", "ITPass123!").await?;

    let created = client
        .post(format!("{}/tickets", base))
        .bearer_auth(&token)
        .json(&json!({"ticket_number": "TICK-9001", "priority": "High", "subject": "Laptop will not boot"}))
        .send()
        .await?;
    assert_eq!(created.status(), StatusCode::CREATED);
    let v: Value = created.json().await?;
    let id = v["ticket"]["id"].as_i64().expect("id");
    assert_eq!(v["ticket"]["status"], "Open");

    let assigned: Value = client
        .post(format!("{}/tickets/{}/assign", base, id))
        .bearer_auth(&token)
        .json(&json!({"assignee": "bob"}))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(assigned["ticket"]["status"], "In Progress");

    let closed: Value = client.post(format!("{}/tickets/{}/close", base, id)).bearer_auth(&token).send().await?.json().await?;
    assert_eq!(closed["ticket"]["status"], "Closed");
    assert!(closed["ticket"]["resolved_date"].is_string());

    let dup = client
        .post(format!("{}/tickets", base))
        .bearer_auth(&token)
        .json(&json!({"ticket_number": "TICK-9001", "priority": "Low", "subject": "again"}))
        .send()
        .await?;
    assert_eq!(dup.status(), StatusCode::CONFLICT);

    let bad = client
        .post(format!("{}/tickets/{}/status", base, id))
        .bearer_auth(&token)
        .json(&json!({"status": "Done"}))
        .send()
        .await?;
    assert_eq!(bad.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn register_validation_statuses() -> Result<()> {
    let base = spawn_app().await?;
    let client = reqwest::Client::new();
    let post = |body: Value| client.post(format!("{}/register", base)).json(&body).send();

    let resp = post(json!({"username": "newbie", "password": "NewbiePass1", "role": "data-scientist"})).await?;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let resp = post(json!({"username": "newbie", "password": "NewbiePass1", "role": "data-scientist"})).await?;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    let resp = post(json!({"username": "other", "password": "NewbiePass1", "role": "wizard"})).await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let resp = post(json!({"username": "other", "password": "short", "role": "it-engineer"})).await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn admin_role_change_revokes_target_sessions() -> Result<()> {
    let base = spawn_app().await?;
    let client = reqwest::Client::new();
    let admin = login(&client, &base, "admin", "AdminPass123!").await?;
    let target = login(&client, &base, "cyber_analyst", "CyberPass123!").await?;

    let forbidden = client
        .post(format!("{}/admin/users/it_engineer/role", base))
        .bearer_auth(&target)
        .json(&json!({"role": "administrator"}))
        .send()
        .await?;
    assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);

    let v: Value = client
        .post(format!("{}/admin/users/cyber_analyst/role", base))
        .bearer_auth(&admin)
        .json(&json!({"role": "it-engineer"}))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(v["role"], "it-engineer");
    assert_eq!(v["revoked_sessions"], 1);

    let resp = client.get(format!("{}/me", base)).bearer_auth(&target).send().await?;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let fresh = login(&client, &base, "cyber_analyst", "CyberPass123!").await?;
    let tickets = client.get(format!("{}/tickets", base)).bearer_auth(&fresh).send().await?;
    assert_eq!(tickets.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn only_an_admin_can_register_an_admin() -> Result<()> {
    let base = spawn_app().await?;
    let client = reqwest::Client::new();
    let body = |name: &str, role: &str| json!({"username": name, "password": "Escalate123!", "role": role});

    for role in ["administrator", "admin"] {
        let resp = client.post(format!("{}/register", base)).json(&body("mallory", role)).send().await?;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN, "anonymous {}", role);
        let v: Value = resp.json().await?;
        assert_eq!(v["code"], "access_denied");
    }
    let resp = client
        .post(format!("{}/login", base))
        .json(&json!({"username": "mallory", "password": "Escalate123!"}))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let analyst = login(&client, &base, "cyber_analyst", "CyberPass123!").await?;
    let resp = client
        .post(format!("{}/register", base))
        .bearer_auth(&analyst)
        .json(&body("mallory", "administrator"))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let admin = login(&client, &base, "admin", "AdminPass123!").await?;
    let resp = client
        .post(format!("{}/register", base))
        .bearer_auth(&admin)
        .json(&body("second_admin", "administrator"))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let token = login(&client, &base, "second_admin", "Escalate123!").await?;
    let users = client.get(format!("{}/admin/users", base)).bearer_auth(&token).send().await?;
    assert_eq!(users.status(), StatusCode::OK);
    Ok(())
}
