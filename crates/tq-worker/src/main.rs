use anyhow::Result;
use clap::Parser;
use tq_worker::cli::{Cli, Commands, DbCmd};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env.local if present (dev convenience).
    let _ = dotenvy::from_filename(".env.local");

    tq_worker::init_tracing();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::Run(args) => tq_worker::run(args).await?,

        Commands::Db { conn, cmd } => {
            let (_, cfg) = tq_worker::load_worker_config(&conn.config_paths, None)?;
            let pool = tq_worker::connect(&conn, &cfg).await?;
            match cmd {
                DbCmd::Status => {
                    let s = tq_db::status(&pool).await?;
                    let backlog = tq_db::count_unprocessed(&pool).await?;
                    println!(
                        "db_ok={} has_trades_table={} has_account_stats_table={} unprocessed={}",
                        s.ok, s.has_trades_table, s.has_account_stats_table, backlog
                    );
                }
                DbCmd::Migrate => {
                    tq_db::migrate(&pool).await?;
                    println!("migrations_applied=true");
                }
            }
        }

        Commands::ConfigHash { paths } => {
            let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
            let loaded = tq_config::load_layered_yaml(&path_refs)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }
    }

    Ok(())
}
