use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;

use tokio::task::JoinHandle;
use tokio::time::{self, Duration, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::config::MaintenanceConfig;
use crate::governor::RateGovernor;
use crate::store::Store;

/// Handle to the background maintenance loop. One task, independent of the
/// foreground pool; `stop` cancels it.
pub struct Maintenance {
    handle: JoinHandle<()>,
}

impl Maintenance {
    pub fn start(store: Store, governor: Arc<RateGovernor>, cfg: MaintenanceConfig) -> Self {
        let tick = Duration::from_secs(cfg.tick_secs.max(1));
        let mut task = MaintenanceTask::new(store, governor, cfg);
        let handle = tokio::spawn(async move {
            let mut ticker = time::interval(tick);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!("maintenance scheduler started");
            loop {
                ticker.tick().await;
                task.run_once().await;
            }
        });
        Self { handle }
    }

    pub fn stop(self) {
        self.handle.abort();
        info!("maintenance scheduler stopped");
    }
}

/// One pass over the maintenance steps. Steps are individually fallible
/// and idempotent: a failed step is logged and comes due again at the next
/// tick, while the remaining steps still run.
pub struct MaintenanceTask {
    store: Store,
    governor: Arc<RateGovernor>,
    cfg: MaintenanceConfig,
    last_backup: Option<Instant>,
    last_optimize: Option<Instant>,
    last_metrics: Option<Instant>,
}

impl MaintenanceTask {
    pub fn new(store: Store, governor: Arc<RateGovernor>, cfg: MaintenanceConfig) -> Self {
        Self {
            store,
            governor,
            cfg,
            last_backup: None,
            last_optimize: None,
            last_metrics: None,
        }
    }

    pub async fn run_once(&mut self) {
        let now = Instant::now();

        if self.cfg.backup_enabled && due(self.last_backup, hours(self.cfg.backup_interval_hours), now)
        {
            match self.store.backup_to(&self.cfg.backup_dir).await {
                Ok(path) => {
                    self.last_backup = Some(now);
                    info!(path = %path.display(), "backup snapshot written");
                    match cleanup_old_backups(&self.cfg.backup_dir, self.cfg.retention_days) {
                        Ok(0) => {}
                        Ok(removed) => info!(removed, "old backups pruned"),
                        Err(e) => warn!(error = %e, "backup pruning failed"),
                    }
                }
                Err(e) => error!(error = %e, "backup failed"),
            }
        }

        if due(self.last_optimize, hours(self.cfg.optimize_interval_hours), now) {
            match self.store.optimize().await {
                Ok(()) => {
                    self.last_optimize = Some(now);
                    info!("store optimized");
                }
                Err(e) => error!(error = %e, "store optimization failed"),
            }
        }

        let pruned = self.governor.prune_expired();
        if pruned > 0 {
            debug!(pruned, "stale rate entries pruned");
        }

        if due(self.last_metrics, hours(self.cfg.metrics_interval_hours), now) {
            match self.store.health().await {
                Ok(health) => {
                    self.last_metrics = Some(now);
                    info!(
                        profiles = health.profiles,
                        interests = health.interests,
                        matches = health.matches,
                        size_bytes = health.size_bytes,
                        "store health"
                    );
                }
                Err(e) => warn!(error = %e, "health check failed"),
            }
        }
    }
}

/// Deletes `*.db` snapshots older than the retention horizon. Returns how
/// many files were removed.
pub fn cleanup_old_backups(dir: &Path, keep_days: u64) -> anyhow::Result<usize> {
    if !dir.exists() {
        return Ok(0);
    }

    let cutoff = SystemTime::now() - Duration::from_secs(keep_days * 24 * 60 * 60);
    let mut removed = 0;
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("db") {
            continue;
        }
        if entry.metadata()?.modified()? < cutoff {
            std::fs::remove_file(&path)?;
            removed += 1;
            debug!(path = %path.display(), "old backup deleted");
        }
    }
    Ok(removed)
}

fn due(last: Option<Instant>, every: Duration, now: Instant) -> bool {
    last.is_none_or(|t| now.duration_since(t) >= every)
}

fn hours(h: u64) -> Duration {
    Duration::from_secs(h * 3600)
}
