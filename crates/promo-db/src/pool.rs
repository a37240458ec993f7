//! # Database Pool Management
//!
//! Connection pool creation and configuration for SQLite.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Database Connection Pool                           │
//! │                                                                         │
//! │  LedgerConfig::load() / DbConfig::new(path)                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Database::new(config).await ← Create pool + run migrations            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────┐                           │
//! │  │            SqlitePool                    │                           │
//! │  │  ┌─────┐ ┌─────┐ ┌─────┐ ┌─────┐       │                           │
//! │  │  │Conn1│ │Conn2│ │Conn3│ │Conn4│ ...   │  (max_connections)        │
//! │  │  └─────┘ └─────┘ └─────┘ └─────┘       │                           │
//! │  └─────────────────────────────────────────┘                           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  db.usage_updater() ── four Sqlite*Repository handles on the pool      │
//! │  db.execute_usage() ── the same, pinned to one BEGIN IMMEDIATE conn    │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## WAL Mode
//! WAL is enabled so order workflows reading counters don't block the one
//! writing them.

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use promo_core::{CoreResult, CouponUsageStore, UsageDirection, UsageSubject, UsageUpdater};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use tracing::{debug, info, warn};

use crate::connection::{DbHandle, ImmediateTransaction};
use crate::error::{DbError, DbResult};
use crate::migrations;
use crate::repository::coupon::SqliteCouponRepository;
use crate::repository::coupon_usage::SqliteCouponUsageRepository;
use crate::repository::rule::SqliteRuleRepository;
use crate::repository::rule_customer::SqliteRuleCustomerRepository;

// =============================================================================
// Configuration
// =============================================================================

/// Database configuration.
///
/// ## Example
/// ```rust,ignore
/// let config = DbConfig::new("/var/lib/promo/promo.db")
///     .max_connections(5)
///     .min_connections(1);
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Path to the SQLite database file.
    pub database_path: PathBuf,

    /// Maximum number of connections in the pool.
    /// Default: 5
    pub max_connections: u32,

    /// Minimum number of connections to keep alive.
    /// Default: 1
    pub min_connections: u32,

    /// Connection timeout duration. Also how long a writer waits for
    /// SQLite's write lock.
    /// Default: 30 seconds
    pub connect_timeout: Duration,

    /// Idle timeout before closing a connection.
    /// Default: 10 minutes
    pub idle_timeout: Duration,

    /// Whether to run migrations on connect.
    /// Default: true
    pub run_migrations: bool,
}

impl DbConfig {
    /// Creates a new database configuration with the given path.
    ///
    /// The file is created if it doesn't exist.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            max_connections: 5,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            run_migrations: true,
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    /// Creates an in-memory database configuration (for testing).
    ///
    /// Every call yields a separate, empty database.
    pub fn in_memory() -> Self {
        DbConfig {
            database_path: PathBuf::from(":memory:"),
            max_connections: 1, // In-memory requires single connection
            min_connections: 1,
            connect_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(60),
            run_migrations: true,
        }
    }
}

// =============================================================================
// Database
// =============================================================================

/// Main database handle providing repository access.
///
/// ## Usage
/// ```rust,ignore
/// let db = Database::new(LedgerConfig::load(None)?.db_config()).await?;
///
/// let order = Order::from_raw(Some("3,7"), Some(42), Some("SAVE10"))?;
/// db.usage_updater()
///     .execute(order, UsageDirection::Increment)
///     .await?;
/// ```
#[derive(Debug, Clone)]
pub struct Database {
    /// The SQLite connection pool.
    pool: SqlitePool,
}

impl Database {
    /// Creates a new database connection pool.
    ///
    /// ## What This Does
    /// 1. Creates the database file if it doesn't exist
    /// 2. Configures SQLite:
    ///    - WAL mode for concurrent reads
    ///    - NORMAL synchronous
    ///    - Foreign keys enabled
    /// 3. Creates the connection pool
    /// 4. Runs migrations (if enabled)
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(
            path = %config.database_path.display(),
            "Initializing database connection"
        );

        let connect_url = format!("sqlite://{}?mode=rwc", config.database_path.display());

        let connect_options = SqliteConnectOptions::from_str(&connect_url)
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            // SQLite has them disabled by default
            .foreign_keys(true)
            .busy_timeout(config.connect_timeout)
            .create_if_missing(true);

        debug!("Connection options configured");

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout)
            .idle_timeout(Some(config.idle_timeout))
            .connect_with(connect_options)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        info!(
            max_connections = config.max_connections,
            "Database pool created"
        );

        let db = Database { pool };

        if config.run_migrations {
            db.run_migrations().await?;
        }

        Ok(db)
    }

    /// Runs database migrations.
    ///
    /// Called by `new()` when `run_migrations` is set. Idempotent.
    pub async fn run_migrations(&self) -> DbResult<()> {
        migrations::run_migrations(&self.pool).await
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn rules(&self) -> SqliteRuleRepository {
        SqliteRuleRepository::new(self.pool.clone())
    }

    pub fn rule_customers(&self) -> SqliteRuleCustomerRepository {
        SqliteRuleCustomerRepository::new(self.pool.clone())
    }

    pub fn coupons(&self) -> SqliteCouponRepository {
        SqliteCouponRepository::new(self.pool.clone())
    }

    pub fn coupon_usage(&self) -> SqliteCouponUsageRepository {
        SqliteCouponUsageRepository::new(self.pool.clone())
    }

    /// Per-customer coupon usage store backed by this database.
    pub fn coupon_usage_store(&self) -> CouponUsageStore {
        CouponUsageStore::new(Arc::new(self.coupon_usage()))
    }

    /// Usage updater wired to the SQLite repositories.
    ///
    /// Every repository call commits on its own. Concurrent orders can
    /// interleave their read-then-write updates; use
    /// [`execute_usage`](Self::execute_usage) when that matters.
    ///
    /// ## Example
    /// ```rust,ignore
    /// db.usage_updater()
    ///     .execute(order, UsageDirection::Decrement)
    ///     .await?;
    /// ```
    pub fn usage_updater(&self) -> UsageUpdater {
        updater_on(DbHandle::Pool(self.pool.clone()))
    }

    /// Applies an order to the usage counters in one transaction.
    ///
    /// ## What This Does
    /// 1. Takes one connection and issues `BEGIN IMMEDIATE`, which waits for
    ///    any other writer to finish
    /// 2. Runs [`UsageUpdater::execute`] with every repository on that
    ///    connection
    /// 3. Commits on success, rolls back on any error
    ///
    /// A `UsageExceeded` therefore leaves no counter changed, and limits hold
    /// under concurrent orders.
    ///
    /// ## Example
    /// ```rust,ignore
    /// let order = Order::from_raw(Some("3,7"), Some(42), Some("SAVE10"))?;
    /// db.execute_usage(order, UsageDirection::Increment).await?;
    /// ```
    pub async fn execute_usage<O: UsageSubject>(
        &self,
        order: O,
        direction: UsageDirection,
    ) -> CoreResult<O> {
        let tx = ImmediateTransaction::begin(&self.pool).await?;
        let result = updater_on(tx.handle()).execute(order, direction).await;

        match result {
            Ok(order) => {
                tx.commit().await?;
                Ok(order)
            }
            Err(err) => {
                if let Err(rollback) = tx.rollback().await {
                    warn!(error = %rollback, "Rollback of usage update failed");
                }
                Err(err)
            }
        }
    }

    /// Closes the database connection pool.
    ///
    /// After calling close, all repository operations will fail.
    pub async fn close(&self) {
        info!("Closing database connection pool");
        self.pool.close().await;
    }

    /// Checks if the database can execute queries.
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .is_ok()
    }
}

fn updater_on(handle: DbHandle) -> UsageUpdater {
    UsageUpdater::new(
        Arc::new(SqliteRuleRepository::on(handle.clone())),
        Arc::new(SqliteRuleCustomerRepository::on(handle.clone())),
        Arc::new(SqliteCouponRepository::on(handle.clone())),
        CouponUsageStore::new(Arc::new(SqliteCouponUsageRepository::on(handle))),
    )
}

// =============================================================================
// Unit Tests
// =============================================================================
