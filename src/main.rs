use anyhow::Result;
use certvault::ledger::SqliteLedger;
use certvault::ops::Orchestrator;
use certvault::{config, db, http};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load(Some(&args.config))?;
    cfg.ensure_dirs()?;

    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| format!("sqlite://{}/certvault.db", cfg.app.data_dir));

    let pool = db::init_pool(&database_url).await?;
    db::run_migrations(&pool).await?;

    let ledger = Arc::new(SqliteLedger::new(pool.clone()));
    let ops = Arc::new(Orchestrator::new(
        pool.clone(),
        ledger,
        cfg.issuer.name.clone(),
        cfg.app.max_batch_count,
    ));
    let state = http::AppState {
        pool,
        ops,
        admin_token: Arc::new(cfg.auth.admin_token.clone()),
    };

    let listener = tokio::net::TcpListener::bind(&cfg.app.listen_addr).await?;
    info!(addr = %cfg.app.listen_addr, "serving certificate vault API");
    axum::serve(listener, http::app(state)).await?;

    Ok(())
}
