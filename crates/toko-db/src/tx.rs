//! # Write Transactions
//!
//! SQLite's default `BEGIN` is DEFERRED: two transactions that both read a
//! stock row and then try to write it race to upgrade their lock, and under
//! WAL the loser fails with `SQLITE_BUSY_SNAPSHOT` instead of waiting.
//! `BEGIN IMMEDIATE` takes the write lock up front, so the read-check-write
//! of a sale runs while no other writer can touch any aggregate.
//!
//! ```text
//!   sale A: BEGIN IMMEDIATE ── read qty=5 ── write qty=2 ── COMMIT
//!   sale B:        BEGIN IMMEDIATE (waits busy_timeout) ─────────── read qty=2 ── InsufficientStock
//! ```

use sqlx::pool::PoolConnection;
use sqlx::{Sqlite, SqliteConnection, SqlitePool};
use tracing::{debug, warn};

use crate::error::{DbError, DbResult};

/// A connection holding an open `BEGIN IMMEDIATE` transaction.
///
/// Dropping it without [`commit`](WriteTx::commit) or
/// [`rollback`](WriteTx::rollback) closes the connection instead of
/// returning it to the pool, which makes SQLite discard the transaction.
pub struct WriteTx {
    conn: PoolConnection<Sqlite>,
    open: bool,
}

impl WriteTx {
    pub async fn begin(pool: &SqlitePool) -> DbResult<Self> {
        let mut conn = pool.acquire().await?;

        sqlx::query("BEGIN IMMEDIATE")
            .execute(&mut *conn)
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        debug!("Write transaction started");
        Ok(WriteTx { conn, open: true })
    }

    /// The connection to run statements on.
    pub fn conn(&mut self) -> &mut SqliteConnection {
        &mut self.conn
    }

    pub async fn commit(mut self) -> DbResult<()> {
        sqlx::query("COMMIT")
            .execute(&mut *self.conn)
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;
        self.open = false;
        Ok(())
    }

    pub async fn rollback(mut self) -> DbResult<()> {
        sqlx::query("ROLLBACK")
            .execute(&mut *self.conn)
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;
        self.open = false;
        debug!("Write transaction rolled back");
        Ok(())
    }

    /// Commits on `Ok`, rolls back on `Err`, and hands the result through.
    pub async fn finish<T, E>(self, result: Result<T, E>) -> Result<T, E>
    where
        E: From<DbError>,
    {
        match result {
            Ok(value) => {
                self.commit().await?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = self.rollback().await {
                    warn!(error = %rollback_err, "Rollback failed; connection will be discarded");
                }
                Err(err)
            }
        }
    }
}

impl Drop for WriteTx {
    fn drop(&mut self) {
        if self.open {
            self.conn.close_on_drop();
        }
    }
}
