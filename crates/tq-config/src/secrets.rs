//! Database URL resolution.
//!
//! Config names the env var; the URL (which usually carries a password) is
//! read from the environment once at startup and passed into constructors.
//! `Debug` output is redacted and errors name the variable, never the value.

use anyhow::{bail, Result};

use crate::WorkerConfig;

/// A resolved connection URL. Only `expose()` reveals the value.
#[derive(Clone)]
pub struct DatabaseUrl {
    url: String,
    /// Where the value came from, for logs: `--db` or the env var name.
    pub source: String,
}

impl DatabaseUrl {
    pub fn expose(&self) -> &str {
        &self.url
    }
}

impl std::fmt::Debug for DatabaseUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseUrl")
            .field("url", &"<REDACTED>")
            .field("source", &self.source)
            .finish()
    }
}

/// An explicit `--db` override wins; otherwise read the env var named by
/// `db.url_env`. `lookup` is injected so tests do not touch process env.
pub fn resolve_database_url<F>(
    cfg: &WorkerConfig,
    cli_override: Option<&str>,
    lookup: F,
) -> Result<DatabaseUrl>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = cli_override.map(str::trim).filter(|u| !u.is_empty()) {
        return Ok(DatabaseUrl {
            url: url.to_string(),
            source: "--db".to_string(),
        });
    }

    let var = cfg.db.url_env.as_str();
    match lookup(var).filter(|v| !v.trim().is_empty()) {
        Some(url) => Ok(DatabaseUrl {
            url,
            source: var.to_string(),
        }),
        None => bail!("missing database url: pass --db or set env var {var}"),
    }
}
