use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tq_processor::{FetchedBatch, StoreError, TradeStore, UndecodableRow, UnitOfWork};

use crate::{decode_trade, TRADE_COLUMNS};

/// [`TradeStore`] over a Postgres pool. One cycle is one transaction.
#[derive(Debug, Clone)]
pub struct PgTradeStore {
    pool: PgPool,
}

impl PgTradeStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl TradeStore for PgTradeStore {
    type Unit = PgUnitOfWork;

    async fn begin(&self) -> Result<PgUnitOfWork, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::new("begin", e))?;

        // Pin the level the cycle relies on regardless of server defaults.
        sqlx::query("set transaction isolation level read committed")
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::new("begin", e))?;

        Ok(PgUnitOfWork { tx })
    }
}

/// An open Postgres transaction. Dropping it without `commit` rolls back.
pub struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

impl UnitOfWork for PgUnitOfWork {
    async fn fetch_unprocessed(&mut self) -> Result<FetchedBatch, StoreError> {
        let rows = sqlx::query(&format!(
            "select {TRADE_COLUMNS} from trades_q where processed = false order by id"
        ))
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| StoreError::new("fetch_unprocessed", e))?;

        let mut batch = FetchedBatch::default();
        for row in &rows {
            match decode_trade(row) {
                Ok(record) => batch.records.push(record),
                Err(e) => batch.undecodable.push(UndecodableRow {
                    id: row.try_get("id").ok(),
                    reason: e.to_string(),
                }),
            }
        }

        tracing::debug!(
            records = batch.records.len(),
            undecodable = batch.undecodable.len(),
            "fetched unprocessed trades"
        );
        Ok(batch)
    }

    async fn upsert_aggregate(&mut self, account: &str, profit: Decimal) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            insert into account_stats (account, trades, profit)
            values ($1, 1, $2)
            on conflict (account) do update
               set trades = account_stats.trades + 1,
                   profit = account_stats.profit + excluded.profit
            "#,
        )
        .bind(account)
        .bind(profit)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| StoreError::new("upsert_aggregate", e))?;

        Ok(())
    }

    async fn mark_processed(&mut self, trade_id: i64) -> Result<(), StoreError> {
        let res = sqlx::query("update trades_q set processed = true where id = $1 and processed = false")
            .bind(trade_id)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| StoreError::new("mark_processed", e))?;

        // Zero rows: another writer flipped it first.
        let affected = res.rows_affected();
        if affected != 1 {
            return Err(StoreError::new(
                "mark_processed",
                format!("trade {trade_id}: expected 1 unprocessed row, found {affected}"),
            ));
        }
        Ok(())
    }

    async fn commit(self) -> Result<(), StoreError> {
        self.tx.commit().await.map_err(|e| StoreError::new("commit", e))
    }

    async fn rollback(self) -> Result<(), StoreError> {
        self.tx.rollback().await.map_err(|e| StoreError::new("rollback", e))
    }
}
