//!
//! intelhub admin binary
//! ---------------------
//! Offline account maintenance against the Parquet user table. Whoever can run
//! this tool can already write the data folder, so it works on the credential
//! store directly instead of going through an administrator login.

use std::env;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use tracing_subscriber::{fmt, EnvFilter};

use intelhub::config::Config;
use intelhub::domains::Workspace;
use intelhub::identity::{AuthService, Role, TracingAuditSink};
use intelhub::setup;
use intelhub::storage::ParquetUserStore;

fn print_usage(program: &str) {
    eprintln!(
        "Usage:\n  {program} [--root <data_folder>] add-user <username> <password> <role>\n  {program} [--root <data_folder>] set-role <username> <role>\n  {program} [--root <data_folder>] list-users\n  {program} [--root <data_folder>] seed\n\nRoles:\n  cybersecurity-analyst | data-scientist | it-engineer | administrator\n\nFlags:\n  --root <path>   Data folder (default: INTELHUB_DB_FOLDER or ./data)\n  -h, --help      Show this help"
    );
}

fn open_service(config: &Config, root: &str) -> Result<AuthService> {
    std::fs::create_dir_all(root).with_context(|| format!("Failed to create or access data folder: {}", root))?;
    let store = ParquetUserStore::open(root).with_context(|| format!("While opening user store under {}", root))?;
    Ok(AuthService::new(Arc::new(store), config.password_policy(), Arc::new(TracingAuditSink)))
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("warn"))?;
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let mut args: Vec<String> = env::args().collect();
    let program = if args.is_empty() { "intelhub_admin".to_string() } else { args.remove(0) };
    let config = Config::from_env();
    let mut root = config.db_folder.to_string_lossy().to_string();
    let mut rest: Vec<String> = Vec::new();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => { print_usage(&program); return Ok(()); }
            "--root" => {
                i += 1;
                root = args.get(i).cloned().ok_or_else(|| anyhow!("--root needs a value"))?;
            }
            other => rest.push(other.to_string()),
        }
        i += 1;
    }

    let Some(cmd) = rest.first().map(|s| s.as_str()) else {
        print_usage(&program);
        return Err(anyhow!("missing command"));
    };
    let svc = open_service(&config, &root)?;
    match (cmd, &rest[1..]) {
        ("add-user", [username, password, role]) => {
            svc.register(username, password, role)?;
            println!("created {} ({})", username, role);
        }
        ("set-role", [username, role]) => {
            let role: Role = role.parse()?;
            svc.credentials().reassign_role(username, role)?;
            println!("{} is now {}", username, role);
        }
        ("list-users", []) => {
            for rec in svc.credentials().list()? {
                println!("{:>4}  {:<24} {}", rec.id, rec.username, rec.role);
            }
        }
        ("seed", []) => {
            let ws = Workspace::open(&root).with_context(|| format!("While opening record tables under {}", root))?;
            let created = setup::seed_demo(&svc, &ws)?;
            println!("seeded {} demo account(s) and sample records under {}", created, root);
        }
        _ => {
            print_usage(&program);
            return Err(anyhow!("unknown command or wrong arguments: {}", rest.join(" ")));
        }
    }
    Ok(())
}
