use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use register::RegisterKey;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use shared::domain::{
    Presentation, PresentationId, RotationGroup, RotationGroupDraft, RotationGroupId,
    RotationMode, Slide, SlideId, SlideRemoval,
};

mod content;
mod memory;
mod sqlite_register;

pub use content::ContentStore;
pub use memory::MemoryContentStore;
pub use sqlite_register::SqliteRegister;

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

#[derive(Debug, Clone)]
pub struct SlideDraft {
    pub background: String,
    pub elements: Vec<serde_json::Value>,
    pub notes: String,
}

#[derive(Debug, Clone)]
pub struct StoredRegisterEntry {
    pub presentation_id: PresentationId,
    pub key: String,
    pub payload: String,
    pub origin: String,
    pub revision: i64,
    pub updated_at: DateTime<Utc>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    pub async fn create_presentation(&self, name: &str) -> Result<PresentationId> {
        let rec = sqlx::query("INSERT INTO presentations (name) VALUES (?) RETURNING id")
            .bind(name)
            .fetch_one(&self.pool)
            .await?;
        Ok(PresentationId(rec.get::<i64, _>(0)))
    }

    pub async fn list_presentations(&self) -> Result<Vec<(PresentationId, String)>> {
        let rows = sqlx::query("SELECT id, name FROM presentations ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(|r| (PresentationId(r.get::<i64, _>(0)), r.get::<String, _>(1)))
            .collect())
    }

    pub async fn add_slide(&self, presentation_id: PresentationId, draft: &SlideDraft) -> Result<SlideId> {
        let elements = serde_json::to_string(&draft.elements).context("failed to encode slide elements")?;
        let rec = sqlx::query(
            "INSERT INTO slides (presentation_id, position, background, elements, notes)
             VALUES (?1, (SELECT COALESCE(MAX(position) + 1, 0) FROM slides WHERE presentation_id = ?1), ?2, ?3, ?4)
             RETURNING id",
        )
        .bind(presentation_id.0)
        .bind(&draft.background)
        .bind(elements)
        .bind(&draft.notes)
        .fetch_one(&self.pool)
        .await
        .with_context(|| format!("failed to add slide to presentation {presentation_id}"))?;
        Ok(SlideId(rec.get::<i64, _>(0)))
    }

    async fn load_slides(&self, presentation_id: PresentationId) -> Result<Vec<Slide>> {
        let rows = sqlx::query(
            "SELECT id, background, elements, notes
             FROM slides
             WHERE presentation_id = ?
             ORDER BY position ASC, id ASC",
        )
        .bind(presentation_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(slide_from_row).collect()
    }

    async fn load_rotation_groups(&self, presentation_id: PresentationId) -> Result<Vec<RotationGroup>> {
        let rows = sqlx::query(
            "SELECT id, name, slide_ids, interval_seconds, mode, repeat, stop_on_interaction, transition
             FROM rotation_groups
             WHERE presentation_id = ?
             ORDER BY id ASC",
        )
        .bind(presentation_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(group_from_row).collect()
    }

    pub async fn write_register_entry(
        &self,
        presentation_id: PresentationId,
        key: RegisterKey,
        payload: &str,
        origin: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<i64> {
        let rec = sqlx::query(
            "INSERT INTO register_entries (presentation_id, slot_key, payload, origin, revision, updated_at)
             VALUES (?, ?, ?, ?, (SELECT COALESCE(MAX(revision), 0) + 1 FROM register_entries), ?)
             ON CONFLICT(presentation_id, slot_key) DO UPDATE SET
                payload = excluded.payload,
                origin = excluded.origin,
                revision = excluded.revision,
                updated_at = excluded.updated_at
             RETURNING revision",
        )
        .bind(presentation_id.0)
        .bind(key.as_str())
        .bind(payload)
        .bind(origin)
        .bind(updated_at)
        .fetch_one(&self.pool)
        .await
        .with_context(|| format!("failed to write {key} register for presentation {presentation_id}"))?;
        Ok(rec.get::<i64, _>(0))
    }

    pub async fn read_register_entry(
        &self,
        presentation_id: PresentationId,
        key: RegisterKey,
    ) -> Result<Option<String>> {
        let row = sqlx::query("SELECT payload FROM register_entries WHERE presentation_id = ? AND slot_key = ?")
            .bind(presentation_id.0)
            .bind(key.as_str())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.get::<String, _>(0)))
    }

    pub async fn latest_register_revision(&self) -> Result<i64> {
        let revision: i64 = sqlx::query_scalar("SELECT COALESCE(MAX(revision), 0) FROM register_entries")
            .fetch_one(&self.pool)
            .await?;
        Ok(revision)
    }

    pub async fn register_entries_since(&self, revision: i64) -> Result<Vec<StoredRegisterEntry>> {
        let rows = sqlx::query(
            "SELECT presentation_id, slot_key, payload, origin, revision, updated_at
             FROM register_entries
             WHERE revision > ?
             ORDER BY revision ASC",
        )
        .bind(revision)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| StoredRegisterEntry {
                presentation_id: PresentationId(r.get::<i64, _>(0)),
                key: r.get::<String, _>(1),
                payload: r.get::<String, _>(2),
                origin: r.get::<String, _>(3),
                revision: r.get::<i64, _>(4),
                updated_at: r.get::<DateTime<Utc>, _>(5),
            })
            .collect())
    }

    pub async fn list_register_entries(
        &self,
        presentation_id: PresentationId,
    ) -> Result<Vec<StoredRegisterEntry>> {
        let entries = self.register_entries_since(0).await?;
        Ok(entries
            .into_iter()
            .filter(|entry| entry.presentation_id == presentation_id)
            .collect())
    }

    pub async fn clear_register(&self, presentation_id: PresentationId) -> Result<u64> {
        let result = sqlx::query("DELETE FROM register_entries WHERE presentation_id = ?")
            .bind(presentation_id.0)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl ContentStore for Storage {
    async fn load_presentation(&self, presentation_id: PresentationId) -> Result<Option<Presentation>> {
        let row = sqlx::query("SELECT name FROM presentations WHERE id = ?")
            .bind(presentation_id.0)
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some(Presentation {
            id: presentation_id,
            name: row.get::<String, _>(0),
            slides: self.load_slides(presentation_id).await?,
            rotation_groups: self.load_rotation_groups(presentation_id).await?,
        }))
    }

    async fn create_rotation_group(
        &self,
        presentation_id: PresentationId,
        draft: RotationGroupDraft,
    ) -> Result<RotationGroupId> {
        draft.validate()?;
        let slide_ids = encode_slide_ids(&draft.slide_ids)?;
        let rec = sqlx::query(
            "INSERT INTO rotation_groups
                (presentation_id, name, slide_ids, interval_seconds, mode, repeat, stop_on_interaction, transition)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             RETURNING id",
        )
        .bind(presentation_id.0)
        .bind(&draft.name)
        .bind(slide_ids)
        .bind(i64::from(draft.interval_seconds))
        .bind(draft.mode.as_str())
        .bind(draft.repeat)
        .bind(draft.stop_on_interaction)
        .bind(&draft.transition)
        .fetch_one(&self.pool)
        .await
        .with_context(|| format!("failed to create rotation group in presentation {presentation_id}"))?;
        Ok(RotationGroupId(rec.get::<i64, _>(0)))
    }

    async fn update_rotation_group(
        &self,
        presentation_id: PresentationId,
        group: &RotationGroup,
    ) -> Result<bool> {
        group.validate()?;
        let result = sqlx::query(
            "UPDATE rotation_groups
             SET name = ?, slide_ids = ?, interval_seconds = ?, mode = ?, repeat = ?,
                 stop_on_interaction = ?, transition = ?
             WHERE id = ? AND presentation_id = ?",
        )
        .bind(&group.name)
        .bind(encode_slide_ids(&group.slide_ids)?)
        .bind(i64::from(group.interval_seconds))
        .bind(group.mode.as_str())
        .bind(group.repeat)
        .bind(group.stop_on_interaction)
        .bind(&group.transition)
        .bind(group.id.0)
        .bind(presentation_id.0)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_rotation_group(
        &self,
        presentation_id: PresentationId,
        group_id: RotationGroupId,
    ) -> Result<bool> {
        let result = sqlx::query("DELETE FROM rotation_groups WHERE id = ? AND presentation_id = ?")
            .bind(group_id.0)
            .bind(presentation_id.0)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_slide(
        &self,
        presentation_id: PresentationId,
        slide_id: SlideId,
    ) -> Result<Option<SlideRemoval>> {
        let Some(mut presentation) = self.load_presentation(presentation_id).await? else {
            return Ok(None);
        };
        let Some(removal) = presentation.remove_slide(slide_id) else {
            return Ok(None);
        };

        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM slides WHERE id = ? AND presentation_id = ?")
            .bind(slide_id.0)
            .bind(presentation_id.0)
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE slides SET position = position - 1 WHERE presentation_id = ? AND position > ?")
            .bind(presentation_id.0)
            .bind(i64::try_from(removal.removed_index).unwrap_or(i64::MAX))
            .execute(&mut *tx)
            .await?;

        for group_id in &removal.pruned_groups {
            let Some(group) = presentation.group(*group_id) else {
                continue;
            };
            sqlx::query("UPDATE rotation_groups SET slide_ids = ? WHERE id = ?")
                .bind(encode_slide_ids(&group.slide_ids)?)
                .bind(group_id.0)
                .execute(&mut *tx)
                .await?;
        }
        for group_id in &removal.deleted_groups {
            sqlx::query("DELETE FROM rotation_groups WHERE id = ?")
                .bind(group_id.0)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit()
            .await
            .with_context(|| format!("failed to delete slide {slide_id} from presentation {presentation_id}"))?;

        Ok(Some(removal))
    }
}

fn slide_from_row(row: &SqliteRow) -> Result<Slide> {
    let slide_id = SlideId(row.get::<i64, _>(0));
    let elements = serde_json::from_str(&row.get::<String, _>(2))
        .with_context(|| format!("slide {slide_id} has malformed elements"))?;
    Ok(Slide {
        id: slide_id,
        background: row.get::<String, _>(1),
        elements,
        notes: row.get::<String, _>(3),
    })
}

fn group_from_row(row: &SqliteRow) -> Result<RotationGroup> {
    let group_id = RotationGroupId(row.get::<i64, _>(0));
    let slide_ids: Vec<i64> = serde_json::from_str(&row.get::<String, _>(2))
        .with_context(|| format!("rotation group {group_id} has malformed membership"))?;
    let interval_seconds = u32::try_from(row.get::<i64, _>(3))
        .with_context(|| format!("rotation group {group_id} has an out-of-range interval"))?;
    let mode_raw = row.get::<String, _>(4);
    let mode = RotationMode::parse(&mode_raw)
        .ok_or_else(|| anyhow!("rotation group {group_id} has unknown mode '{mode_raw}'"))?;

    Ok(RotationGroup {
        id: group_id,
        name: row.get::<String, _>(1),
        slide_ids: slide_ids.into_iter().map(SlideId).collect(),
        interval_seconds,
        mode,
        repeat: row.get::<bool, _>(5),
        stop_on_interaction: row.get::<bool, _>(6),
        transition: row.get::<String, _>(7),
    })
}

fn encode_slide_ids(slide_ids: &[SlideId]) -> Result<String> {
    let raw: Vec<i64> = slide_ids.iter().map(|id| id.0).collect();
    serde_json::to_string(&raw).context("failed to encode rotation group membership")
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url == "sqlite::memory:" || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
