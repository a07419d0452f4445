use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "tq-worker")]
#[command(about = "Trade queue worker: folds queued trades into per-account stats", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Poll the queue and apply trades until Ctrl-C
    Run(RunArgs),

    /// Database commands
    Db {
        #[command(flatten)]
        conn: ConnArgs,

        #[command(subcommand)]
        cmd: DbCmd,
    },

    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> env -> local...)
        #[arg(required = true)]
        paths: Vec<String>,
    },
}

#[derive(Debug, Subcommand)]
pub enum DbCmd {
    /// Connectivity, schema presence and queue depth
    Status,

    /// Apply SQL migrations
    Migrate,
}

/// Where the worker finds its database and config.
#[derive(Debug, Clone, Default, Args)]
pub struct ConnArgs {
    /// Postgres URL. Overrides the env var named by `db.url_env`.
    #[arg(long)]
    pub db: Option<String>,

    /// Layered config paths in merge order (repeatable)
    #[arg(long = "config")]
    pub config_paths: Vec<String>,
}

#[derive(Debug, Clone, Default, Args)]
pub struct RunArgs {
    #[command(flatten)]
    pub conn: ConnArgs,

    /// Poll interval in milliseconds. Overrides `worker.poll_interval_ms`.
    #[arg(long = "poll-ms")]
    pub poll_ms: Option<u64>,

    /// Apply migrations before the first cycle
    #[arg(long, default_value_t = false)]
    pub migrate: bool,
}
