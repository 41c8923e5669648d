use serde::Serialize;
use sqlx::FromRow;
use tracing::debug;

use super::{Store, now_ts};
use crate::ActorId;
use crate::error::CoreResult;

/// A finalized profile record. Owned by its actor; the front-end's
/// registration flow produces one complete write, never partial fields.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct Profile {
    pub actor_id: ActorId,
    pub name: String,
    pub age: i64,
    pub department: String,
    pub bio: String,
    pub photo_ref: String,
    pub disabled: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Store {
    /// Insert-or-update; `created_at` survives updates.
    pub async fn save_profile(
        &self,
        actor: ActorId,
        name: &str,
        age: i64,
        department: &str,
        bio: &str,
        photo_ref: &str,
    ) -> CoreResult<()> {
        let now = now_ts();
        sqlx::query(
            "INSERT INTO profiles (actor_id,name,age,department,bio,photo_ref,disabled,created_at,updated_at)
             VALUES (?,?,?,?,?,?,0,?,?)
             ON CONFLICT(actor_id) DO UPDATE SET
                name=excluded.name, age=excluded.age, department=excluded.department,
                bio=excluded.bio, photo_ref=excluded.photo_ref, updated_at=excluded.updated_at",
        )
        .bind(actor)
        .bind(name)
        .bind(age)
        .bind(department)
        .bind(bio)
        .bind(photo_ref)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        debug!(actor, "profile saved");
        Ok(())
    }

    pub async fn profile(&self, actor: ActorId) -> CoreResult<Option<Profile>> {
        let profile = sqlx::query_as::<_, Profile>(
            "SELECT actor_id,name,age,department,bio,photo_ref,disabled,created_at,updated_at
             FROM profiles WHERE actor_id=?",
        )
        .bind(actor)
        .fetch_optional(&self.pool)
        .await?;
        Ok(profile)
    }

    pub async fn profile_exists(&self, actor: ActorId) -> CoreResult<bool> {
        let row = sqlx::query_as::<_, ()>("SELECT 1 FROM profiles WHERE actor_id=?")
            .bind(actor)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    /// Soft-disable: the profile stays on record but leaves the browse pool.
    pub async fn set_disabled(&self, actor: ActorId, disabled: bool) -> CoreResult<()> {
        sqlx::query("UPDATE profiles SET disabled=?, updated_at=? WHERE actor_id=?")
            .bind(disabled)
            .bind(now_ts())
            .bind(actor)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
