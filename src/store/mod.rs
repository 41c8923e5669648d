mod profiles;

pub use profiles::Profile;

use std::path::{Path, PathBuf};
use std::time::Duration;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use time::OffsetDateTime;
use time::macros::format_description;
use tracing::{debug, info};

use crate::config::StoreConfig;
use crate::error::{CoreError, CoreResult};

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS profiles (
        actor_id   INTEGER PRIMARY KEY,
        name       TEXT NOT NULL,
        age        INTEGER NOT NULL,
        department TEXT NOT NULL,
        bio        TEXT NOT NULL,
        photo_ref  TEXT NOT NULL,
        disabled   INTEGER NOT NULL DEFAULT 0,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS interests (
        from_actor INTEGER NOT NULL,
        to_actor   INTEGER NOT NULL,
        created_at INTEGER NOT NULL,
        PRIMARY KEY (from_actor, to_actor)
    )",
    // actor_a < actor_b: the canonical key is what makes a second,
    // symmetric insert a no-op instead of a duplicate pair.
    "CREATE TABLE IF NOT EXISTS matches (
        actor_a    INTEGER NOT NULL,
        actor_b    INTEGER NOT NULL,
        created_at INTEGER NOT NULL,
        PRIMARY KEY (actor_a, actor_b),
        CHECK (actor_a < actor_b)
    )",
    "CREATE TABLE IF NOT EXISTS passes (
        from_actor INTEGER NOT NULL,
        to_actor   INTEGER NOT NULL,
        created_at INTEGER NOT NULL,
        PRIMARY KEY (from_actor, to_actor)
    )",
    "CREATE TABLE IF NOT EXISTS blocks (
        blocker    INTEGER NOT NULL,
        blocked    INTEGER NOT NULL,
        created_at INTEGER NOT NULL,
        PRIMARY KEY (blocker, blocked)
    )",
    "CREATE TABLE IF NOT EXISTS reports (
        reporter   INTEGER NOT NULL,
        reported   INTEGER NOT NULL,
        reason     TEXT,
        created_at INTEGER NOT NULL,
        PRIMARY KEY (reporter, reported)
    )",
    "CREATE INDEX IF NOT EXISTS idx_interests_to ON interests(to_actor)",
    "CREATE INDEX IF NOT EXISTS idx_passes_to ON passes(to_actor)",
];

/// Handle to the durable single-node store. Cheap to clone; all components
/// receive a clone at startup instead of reaching for a global.
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
    path: PathBuf,
}

#[derive(Debug, Clone, Copy)]
pub struct StoreHealth {
    pub profiles: i64,
    pub interests: i64,
    pub matches: i64,
    pub size_bytes: u64,
}

impl Store {
    pub async fn open(cfg: &StoreConfig) -> CoreResult<Self> {
        if let Some(parent) = cfg.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| CoreError::StoreUnavailable(sqlx::Error::Io(e)))?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(&cfg.path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(cfg.busy_timeout_secs))
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(cfg.max_connections)
            .connect_with(options)
            .await?;

        for stmt in SCHEMA {
            sqlx::query(stmt).execute(&pool).await?;
        }

        info!(path = %cfg.path.display(), "store opened");
        Ok(Self {
            pool,
            path: cfg.path.clone(),
        })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn close(&self) {
        self.pool.close().await;
        info!("store closed");
    }

    /// Writes an online snapshot of the database into `dir` and returns its
    /// path. `VACUUM INTO` reads a consistent snapshot without taking the
    /// write lock, so foreground transactions keep flowing.
    pub async fn backup_to(&self, dir: &Path) -> anyhow::Result<PathBuf> {
        std::fs::create_dir_all(dir)?;

        let stamp = OffsetDateTime::now_utc()
            .format(format_description!("[year][month][day]_[hour][minute][second]"))?;
        let dest = dir.join(format!("uniconnect_{stamp}.db"));

        let quoted = dest.display().to_string().replace('\'', "''");
        sqlx::query(&format!("VACUUM INTO '{quoted}'"))
            .execute(&self.pool)
            .await?;

        debug!(path = %dest.display(), "snapshot written");
        Ok(dest)
    }

    /// Query-planner statistics refresh. Bounded, table-at-a-time work.
    pub async fn optimize(&self) -> anyhow::Result<()> {
        sqlx::query("ANALYZE").execute(&self.pool).await?;
        sqlx::query("PRAGMA optimize").execute(&self.pool).await?;
        Ok(())
    }

    pub async fn health(&self) -> CoreResult<StoreHealth> {
        let profiles: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM profiles")
            .fetch_one(&self.pool)
            .await?;
        let interests: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM interests")
            .fetch_one(&self.pool)
            .await?;
        let matches: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM matches")
            .fetch_one(&self.pool)
            .await?;
        let size_bytes = std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0);

        Ok(StoreHealth {
            profiles,
            interests,
            matches,
            size_bytes,
        })
    }
}

pub(crate) fn now_ts() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}
