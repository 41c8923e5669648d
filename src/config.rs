use std::path::PathBuf;
use std::str::FromStr;

use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub store: StoreConfig,
    pub rate: RateLimitConfig,
    pub maintenance: MaintenanceConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub path: PathBuf,
    pub max_connections: u32,
    pub busy_timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("uniconnect.db"),
            max_connections: 16,
            busy_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Actions admitted per window before violations start.
    pub max_actions: u32,
    pub window_secs: u64,
    pub ban_secs: u64,
    /// Violations within the strike period before a ban is applied.
    pub strike_threshold: u32,
    pub strike_period_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_actions: 10,
            window_secs: 60,
            ban_secs: 300,
            strike_threshold: 3,
            strike_period_secs: 600,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MaintenanceConfig {
    pub backup_enabled: bool,
    pub backup_dir: PathBuf,
    pub backup_interval_hours: u64,
    pub retention_days: u64,
    pub optimize_interval_hours: u64,
    pub metrics_interval_hours: u64,
    /// Granularity of the scheduler loop; each tick re-checks which steps
    /// are due.
    pub tick_secs: u64,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            backup_enabled: true,
            backup_dir: PathBuf::from("backups"),
            backup_interval_hours: 24,
            retention_days: 7,
            optimize_interval_hours: 24,
            metrics_interval_hours: 1,
            tick_secs: 60,
        }
    }
}

impl Config {
    /// Reads `UNICONNECT_*` environment variables (via `.env` when present),
    /// falling back to defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        let _ = dotenv::dotenv();
        let store = StoreConfig::default();
        let rate = RateLimitConfig::default();
        let maintenance = MaintenanceConfig::default();
        Self {
            store: StoreConfig {
                path: var("UNICONNECT_DB_PATH", store.path),
                max_connections: var("UNICONNECT_DB_MAX_CONNECTIONS", store.max_connections),
                busy_timeout_secs: var("UNICONNECT_DB_BUSY_TIMEOUT_SECS", store.busy_timeout_secs),
            },
            rate: RateLimitConfig {
                max_actions: var("UNICONNECT_RATE_MAX_ACTIONS", rate.max_actions),
                window_secs: var("UNICONNECT_RATE_WINDOW_SECS", rate.window_secs),
                ban_secs: var("UNICONNECT_RATE_BAN_SECS", rate.ban_secs),
                strike_threshold: var("UNICONNECT_RATE_STRIKE_THRESHOLD", rate.strike_threshold),
                strike_period_secs: var(
                    "UNICONNECT_RATE_STRIKE_PERIOD_SECS",
                    rate.strike_period_secs,
                ),
            },
            maintenance: MaintenanceConfig {
                backup_enabled: var("UNICONNECT_BACKUP_ENABLED", maintenance.backup_enabled),
                backup_dir: var("UNICONNECT_BACKUP_DIR", maintenance.backup_dir),
                backup_interval_hours: var(
                    "UNICONNECT_BACKUP_INTERVAL_HOURS",
                    maintenance.backup_interval_hours,
                ),
                retention_days: var("UNICONNECT_BACKUP_RETENTION_DAYS", maintenance.retention_days),
                optimize_interval_hours: var(
                    "UNICONNECT_OPTIMIZE_INTERVAL_HOURS",
                    maintenance.optimize_interval_hours,
                ),
                metrics_interval_hours: var(
                    "UNICONNECT_METRICS_INTERVAL_HOURS",
                    maintenance.metrics_interval_hours,
                ),
                tick_secs: var("UNICONNECT_MAINTENANCE_TICK_SECS", maintenance.tick_secs),
            },
        }
    }
}

fn var<T: FromStr>(key: &str, default: T) -> T {
    dotenv::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
