//! tq-worker: startup wiring around the queue processor.
//!
//! Startup is fail-closed. Config, URL resolution, connect, ping and the
//! schema check all happen before the first cycle; any failure ends the
//! process with an error instead of entering the loop.

pub mod cli;

use anyhow::{bail, Context, Result};
use sqlx::PgPool;
use tq_config::{LoadedConfig, UnusedKeyPolicy, WorkerConfig};
use tq_db::PgTradeStore;
use tq_processor::{run_loop, QueueProcessor, SleepTicker};
use tracing::{info, warn};

use crate::cli::{ConnArgs, RunArgs};

pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

/// Load and merge `paths` (defaults only when empty), apply the CLI poll
/// override and validate. Unused keys are logged, not fatal.
pub fn load_worker_config(paths: &[String], poll_ms: Option<u64>) -> Result<(LoadedConfig, WorkerConfig)> {
    let loaded = if paths.is_empty() {
        tq_config::empty_config()?
    } else {
        let refs: Vec<&str> = paths.iter().map(String::as_str).collect();
        tq_config::load_layered_yaml(&refs)?
    };

    let report = tq_config::report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Warn)?;
    for pointer in &report.unused_leaf_pointers {
        warn!(key = %pointer, "config key is not read by the worker");
    }

    let mut cfg = WorkerConfig::from_loaded(&loaded)?;
    if let Some(ms) = poll_ms {
        cfg.worker.poll_interval_ms = ms;
    }
    cfg.validate().context("invalid worker settings")?;

    Ok((loaded, cfg))
}

/// Resolve the URL and open a pool that has answered a ping.
pub async fn connect(conn: &ConnArgs, cfg: &WorkerConfig) -> Result<PgPool> {
    let url = tq_config::resolve_database_url(cfg, conn.db.as_deref(), |var| std::env::var(var).ok())?;

    let pool = tq_db::connect(url.expose(), cfg.db.max_connections, cfg.acquire_timeout())
        .await
        .with_context(|| format!("startup: cannot connect to database (url from {})", url.source))?;
    tq_db::ping(&pool).await.context("startup: database ping failed")?;

    info!(source = %url.source, max_connections = cfg.db.max_connections, "database connected");
    Ok(pool)
}

/// Run the worker until Ctrl-C.
///
/// Ctrl-C drops an in-flight cycle; its transaction is rolled back with the
/// dropped connection, so a cycle is never half applied.
pub async fn run(args: RunArgs) -> Result<()> {
    let (loaded, cfg) = load_worker_config(&args.conn.config_paths, args.poll_ms)?;
    info!(
        config_hash = %loaded.config_hash,
        poll_interval_ms = cfg.worker.poll_interval_ms,
        "worker config loaded"
    );

    let pool = connect(&args.conn, &cfg).await?;

    if args.migrate {
        tq_db::migrate(&pool).await?;
        info!("migrations applied");
    }

    let st = tq_db::status(&pool).await?;
    if !st.schema_ready() {
        bail!("startup: queue schema missing; run `tq-worker db migrate` or pass --migrate");
    }

    let backlog = tq_db::count_unprocessed(&pool).await?;
    info!(backlog, "processor starting");

    let processor = QueueProcessor::new(PgTradeStore::new(pool.clone()));
    let mut ticker = SleepTicker::new(cfg.poll_interval());

    tokio::select! {
        summary = run_loop(&processor, &mut ticker) => {
            warn!(?summary, "processor loop ended on its own");
        }
        res = tokio::signal::ctrl_c() => {
            res.context("failed to listen for ctrl-c")?;
            info!("ctrl-c received; stopping worker");
        }
    }

    pool.close().await;
    Ok(())
}
