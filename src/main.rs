use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use intelhub::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Init logging
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?;
    fmt().with_env_filter(filter).init();

    let config = Config::from_env();
    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    info!(
        target: "startup",
        "intelhub starting: RUST_LOG='{}', http_port={}, data_folder='{}', session_ttl={}s, seed_demo={}",
        rust_log,
        config.http_port,
        config.db_folder.display(),
        config.session_ttl.as_secs(),
        config.seed_demo
    );

    intelhub::server::run(config).await
}
