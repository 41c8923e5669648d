#![allow(dead_code)]

use tempfile::TempDir;
use uniconnect::{ActorId, Config, Core};

pub async fn open_core(dir: &TempDir) -> Core {
    let mut cfg = Config::default();
    cfg.store.path = dir.path().join("uniconnect.db");
    cfg.maintenance.backup_dir = dir.path().join("backups");
    Core::open(&cfg).await.expect("open core")
}

pub async fn seed_profile(core: &Core, actor: ActorId, name: &str, age: i64, department: &str) {
    core.store()
        .save_profile(actor, name, age, department, "says hi", "photo-ref")
        .await
        .expect("seed profile");
}
