//! Postgres side of the trade queue: pool setup, embedded migrations, the
//! ingestion boundary and the transactional [`PgTradeStore`].

mod store;

use std::time::Duration;

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use tq_schemas::{AccountAggregate, NewTrade, TradeRecord};

pub use store::{PgTradeStore, PgUnitOfWork};

/// Env var the gated DB tests read; the same one the worker defaults to.
pub use tq_config::DEFAULT_DB_URL_ENV as ENV_DB_URL;

/// Columns of `trades_q` in [`decode_trade`] order.
pub(crate) const TRADE_COLUMNS: &str = "id, account, symbol, volume, open, close, side, processed";

/// Connect to Postgres with explicit pool limits.
pub async fn connect(url: &str, max_connections: u32, acquire_timeout: Duration) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(acquire_timeout)
        .connect(url)
        .await
        .context("failed to connect to Postgres")?;

    Ok(pool)
}

/// Run embedded SQLx migrations.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("db migrate failed")?;
    tracing::debug!("migrations applied");
    Ok(())
}

/// Round-trip a trivial query. Used as the startup liveness check.
pub async fn ping(pool: &PgPool) -> Result<()> {
    let (one,): (i32,) = sqlx::query_as::<_, (i32,)>("select 1")
        .fetch_one(pool)
        .await
        .context("ping query failed")?;
    anyhow::ensure!(one == 1, "ping returned {one}");
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbStatus {
    pub ok: bool,
    pub has_trades_table: bool,
    pub has_account_stats_table: bool,
}

impl DbStatus {
    pub fn schema_ready(&self) -> bool {
        self.ok && self.has_trades_table && self.has_account_stats_table
    }
}

/// Connectivity + schema presence.
pub async fn status(pool: &PgPool) -> Result<DbStatus> {
    let ok = ping(pool).await.is_ok();
    let has_trades_table = table_exists(pool, "trades_q").await?;
    let has_account_stats_table = table_exists(pool, "account_stats").await?;

    Ok(DbStatus {
        ok,
        has_trades_table,
        has_account_stats_table,
    })
}

async fn table_exists(pool: &PgPool, table: &str) -> Result<bool> {
    let (exists,): (bool,) = sqlx::query_as::<_, (bool,)>(
        r#"
        select exists (
            select 1
            from information_schema.tables
            where table_schema = 'public' and table_name = $1
        )
        "#,
    )
    .bind(table)
    .fetch_one(pool)
    .await
    .with_context(|| format!("status table-exists query failed for {table}"))?;

    Ok(exists)
}

/// Unprocessed queue depth. Zero when the schema is not there yet.
pub async fn count_unprocessed(pool: &PgPool) -> Result<i64> {
    if !table_exists(pool, "trades_q").await? {
        return Ok(0);
    }

    let (n,): (i64,) = sqlx::query_as::<_, (i64,)>(
        "select count(*)::bigint from trades_q where processed = false",
    )
    .fetch_one(pool)
    .await
    .context("count_unprocessed failed")?;

    Ok(n)
}

/// Ingestion boundary: append one unprocessed record and return its id.
///
/// No validation happens here; malformed trades are stored as given and
/// skipped by the processor.
pub async fn enqueue_trade(pool: &PgPool, trade: &NewTrade) -> Result<i64> {
    let (id,): (i64,) = sqlx::query_as::<_, (i64,)>(
        r#"
        insert into trades_q (account, symbol, volume, open, close, side)
        values ($1, $2, $3, $4, $5, $6)
        returning id
        "#,
    )
    .bind(&trade.account)
    .bind(&trade.symbol)
    .bind(trade.volume)
    .bind(trade.open)
    .bind(trade.close)
    .bind(&trade.side)
    .fetch_one(pool)
    .await
    .context("enqueue_trade failed")?;

    Ok(id)
}

pub async fn fetch_trade(pool: &PgPool, id: i64) -> Result<Option<TradeRecord>> {
    let row = sqlx::query(&format!("select {TRADE_COLUMNS} from trades_q where id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("fetch_trade failed")?;

    row.as_ref()
        .map(decode_trade)
        .transpose()
        .with_context(|| format!("trade {id} could not be decoded"))
}

pub async fn fetch_account_aggregate(pool: &PgPool, account: &str) -> Result<Option<AccountAggregate>> {
    let row = sqlx::query("select account, trades, profit from account_stats where account = $1")
        .bind(account)
        .fetch_optional(pool)
        .await
        .context("fetch_account_aggregate failed")?;

    let Some(row) = row else {
        return Ok(None);
    };

    Ok(Some(AccountAggregate {
        account: row.try_get("account")?,
        trades: row.try_get("trades")?,
        profit: row.try_get::<Decimal, _>("profit")?,
    }))
}

/// Map one `trades_q` row selected with [`TRADE_COLUMNS`].
pub(crate) fn decode_trade(row: &PgRow) -> Result<TradeRecord, sqlx::Error> {
    Ok(TradeRecord {
        id: row.try_get("id")?,
        account: row.try_get("account")?,
        symbol: row.try_get("symbol")?,
        volume: row.try_get("volume")?,
        open: row.try_get("open")?,
        close: row.try_get("close")?,
        side: row.try_get("side")?,
        processed: row.try_get("processed")?,
    })
}
