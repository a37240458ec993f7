//! # Connection Handles
//!
//! Where a repository sends its statements: any free pool connection, or one
//! connection pinned for the length of a transaction.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  DbHandle::Pool     each call acquires its own connection (autocommit) │
//! │                                                                         │
//! │  DbHandle::Pinned   every call shares one connection that is inside    │
//! │                     BEGIN IMMEDIATE ... COMMIT / ROLLBACK              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use sqlx::pool::PoolConnection;
use sqlx::{Sqlite, SqliteConnection, SqlitePool};
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

use crate::error::DbResult;

/// Connection source shared by the `Sqlite*Repository` types.
#[derive(Clone)]
pub(crate) enum DbHandle {
    Pool(SqlitePool),
    Pinned(Arc<Mutex<PoolConnection<Sqlite>>>),
}

impl DbHandle {
    /// Borrows a connection for one repository call.
    ///
    /// A pinned connection is locked until the returned guard is dropped.
    pub(crate) async fn acquire(&self) -> DbResult<DbConn<'_>> {
        match self {
            DbHandle::Pool(pool) => Ok(DbConn::Pooled(pool.acquire().await?)),
            DbHandle::Pinned(conn) => Ok(DbConn::Pinned(conn.lock().await)),
        }
    }
}

impl fmt::Debug for DbHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DbHandle::Pool(pool) => f.debug_tuple("Pool").field(pool).finish(),
            DbHandle::Pinned(_) => f.write_str("Pinned"),
        }
    }
}

/// A connection borrowed from a [`DbHandle`].
pub(crate) enum DbConn<'a> {
    Pooled(PoolConnection<Sqlite>),
    Pinned(MutexGuard<'a, PoolConnection<Sqlite>>),
}

impl Deref for DbConn<'_> {
    type Target = SqliteConnection;

    fn deref(&self) -> &SqliteConnection {
        match self {
            DbConn::Pooled(conn) => conn,
            DbConn::Pinned(conn) => conn,
        }
    }
}

impl DerefMut for DbConn<'_> {
    fn deref_mut(&mut self) -> &mut SqliteConnection {
        match self {
            DbConn::Pooled(conn) => conn,
            DbConn::Pinned(conn) => conn,
        }
    }
}

/// One pool connection held in a `BEGIN IMMEDIATE` transaction.
///
/// The write lock is taken up front, so concurrent transactions queue on
/// SQLite's busy timeout instead of interleaving their read-then-write
/// counter updates. Dropped without `commit`/`rollback`, the connection is
/// closed rather than returned to the pool, discarding the transaction.
pub(crate) struct ImmediateTransaction {
    conn: Arc<Mutex<PoolConnection<Sqlite>>>,
    open: bool,
}

impl ImmediateTransaction {
    pub(crate) async fn begin(pool: &SqlitePool) -> DbResult<Self> {
        let mut conn = pool.acquire().await?;
        sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;
        debug!("Transaction started");

        Ok(ImmediateTransaction {
            conn: Arc::new(Mutex::new(conn)),
            open: true,
        })
    }

    /// Handle for repositories that must run inside this transaction.
    pub(crate) fn handle(&self) -> DbHandle {
        DbHandle::Pinned(Arc::clone(&self.conn))
    }

    pub(crate) async fn commit(mut self) -> DbResult<()> {
        self.finish("COMMIT").await
    }

    pub(crate) async fn rollback(mut self) -> DbResult<()> {
        self.finish("ROLLBACK").await
    }

    async fn finish(&mut self, statement: &'static str) -> DbResult<()> {
        let mut conn = self.conn.lock().await;
        sqlx::query(statement).execute(&mut **conn).await?;
        self.open = false;
        debug!(statement, "Transaction finished");
        Ok(())
    }
}

impl Drop for ImmediateTransaction {
    fn drop(&mut self) {
        if !self.open {
            return;
        }
        match self.conn.try_lock() {
            Ok(mut conn) => {
                warn!("Transaction dropped while open, closing its connection");
                conn.close_on_drop();
            }
            Err(_) => warn!("Transaction dropped while its connection was in use"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    #[tokio::test]
    async fn test_pool_handle_runs_queries() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let handle = DbHandle::Pool(db.pool().clone());

        let mut conn = handle.acquire().await.unwrap();
        let one: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&mut *conn)
            .await
            .unwrap();

        assert_eq!(one, 1);
    }

    #[tokio::test]
    async fn test_rollback_discards_writes() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let tx = ImmediateTransaction::begin(db.pool()).await.unwrap();
        {
            let handle = tx.handle();
            let mut conn = handle.acquire().await.unwrap();
            sqlx::query("INSERT INTO salesrule (name) VALUES ('temporary')")
                .execute(&mut *conn)
                .await
                .unwrap();
        }
        tx.rollback().await.unwrap();

        assert_eq!(db.rules().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_commit_keeps_writes() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let tx = ImmediateTransaction::begin(db.pool()).await.unwrap();
        {
            let handle = tx.handle();
            let mut conn = handle.acquire().await.unwrap();
            sqlx::query("INSERT INTO salesrule (name) VALUES ('kept')")
                .execute(&mut *conn)
                .await
                .unwrap();
        }
        tx.commit().await.unwrap();

        assert_eq!(db.rules().count().await.unwrap(), 1);
    }
}
