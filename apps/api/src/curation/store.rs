//! Durable storage seam for lessons and resolutions.
//!
//! `AppState` holds an `Arc<dyn CurationStore>`; production uses
//! [`PgCurationStore`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::curation::merge::{merge_metadata, MergePolicy};
use crate::models::lesson::{LessonId, LessonRecord, LessonRow};
use crate::models::resolution::{GroupType, ResolutionRecord, ResolutionRow};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("group {0} is already resolved")]
    AlreadyResolved(String),

    #[error("canonical lesson {0} is missing or archived")]
    CanonicalUnavailable(LessonId),

    #[error("lessons {0:?} are missing or already archived")]
    MemberUnavailable(Vec<LessonId>),

    #[error("record store unreachable: {0}")]
    Unavailable(#[source] sqlx::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("corrupt row: {0}")]
    Corrupt(String),
}

/// Everything a store needs to commit one resolution.
#[derive(Debug, Clone)]
pub struct ResolutionPlan {
    pub group_key: String,
    pub canonical_id: LessonId,
    pub archived_ids: Vec<LessonId>,
    pub group_type: GroupType,
    pub similarity_score: f64,
    pub merge: MergePolicy,
    pub resolved_by: String,
    pub resolved_at: DateTime<Utc>,
    pub notes: String,
}

impl StoreError {
    /// Connection-class failures while opening a transaction mean nothing was
    /// attempted, so the caller may retry.
    pub fn from_connect(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                StoreError::Unavailable(e)
            }
            other => StoreError::Database(other),
        }
    }
}

impl ResolutionPlan {
    pub fn member_ids(&self) -> Vec<LessonId> {
        let mut ids = self.archived_ids.clone();
        ids.push(self.canonical_id.clone());
        ids
    }
}

#[async_trait]
pub trait CurationStore: Send + Sync {
    /// Fetches the given lessons, archived or not. Unknown ids are omitted.
    async fn fetch_lessons(&self, ids: &[LessonId]) -> Result<Vec<LessonRecord>, StoreError>;

    async fn find_resolution(&self, group_key: &str)
        -> Result<Option<ResolutionRecord>, StoreError>;

    async fn list_resolutions(&self) -> Result<Vec<ResolutionRecord>, StoreError>;

    /// Applies merge, archives and the resolution record together or not at all.
    /// Only the first commit for a group key succeeds; later ones get
    /// [`StoreError::AlreadyResolved`].
    async fn commit_resolution(&self, plan: &ResolutionPlan)
        -> Result<ResolutionRecord, StoreError>;
}

const LOCK_MEMBERS_SQL: &str =
    "SELECT * FROM lessons WHERE lesson_id = ANY($1) ORDER BY lesson_id FOR UPDATE";

/// Duplicates in the plan that are unknown or no longer live.
pub(crate) fn unavailable_members(plan: &ResolutionPlan, lessons: &[LessonRecord]) -> Vec<LessonId> {
    plan.archived_ids
        .iter()
        .filter(|id| !lessons.iter().any(|l| &l.lesson_id == *id && l.is_live()))
        .cloned()
        .collect()
}

pub struct PgCurationStore {
    pool: PgPool,
}

impl PgCurationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CurationStore for PgCurationStore {
    async fn fetch_lessons(&self, ids: &[LessonId]) -> Result<Vec<LessonRecord>, StoreError> {
        let rows: Vec<LessonRow> =
            sqlx::query_as("SELECT * FROM lessons WHERE lesson_id = ANY($1)")
                .bind(ids)
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(LessonRecord::from).collect())
    }

    async fn find_resolution(
        &self,
        group_key: &str,
    ) -> Result<Option<ResolutionRecord>, StoreError> {
        let row: Option<ResolutionRow> =
            sqlx::query_as("SELECT * FROM duplicate_resolutions WHERE group_key = $1")
                .bind(group_key)
                .fetch_optional(&self.pool)
                .await?;
        row.map(ResolutionRecord::try_from)
            .transpose()
            .map_err(StoreError::Corrupt)
    }

    async fn list_resolutions(&self) -> Result<Vec<ResolutionRecord>, StoreError> {
        let rows: Vec<ResolutionRow> =
            sqlx::query_as("SELECT * FROM duplicate_resolutions ORDER BY resolved_at ASC")
                .fetch_all(&self.pool)
                .await?;
        rows.into_iter()
            .map(ResolutionRecord::try_from)
            .collect::<Result<_, _>>()
            .map_err(StoreError::Corrupt)
    }

    async fn commit_resolution(
        &self,
        plan: &ResolutionPlan,
    ) -> Result<ResolutionRecord, StoreError> {
        // Dropping `tx` on any early return rolls everything back.
        let mut tx = self.pool.begin().await.map_err(StoreError::from_connect)?;

        // 1. Claim the group key. A concurrent commit for the same key blocks on
        //    the unique index until this transaction ends, then hits the conflict.
        let resolution_id: Option<Uuid> = sqlx::query_scalar(
            r#"
            INSERT INTO duplicate_resolutions
                (id, group_key, canonical_id, archived_ids, group_type, similarity_score,
                 merge_applied, merged_fields, resolved_by, resolved_at, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7, '{}', $8, $9, $10)
            ON CONFLICT (group_key) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&plan.group_key)
        .bind(&plan.canonical_id)
        .bind(&plan.archived_ids)
        .bind(plan.group_type.as_str())
        .bind(plan.similarity_score)
        .bind(plan.merge.merge_metadata)
        .bind(&plan.resolved_by)
        .bind(plan.resolved_at)
        .bind(&plan.notes)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(resolution_id) = resolution_id else {
            return Err(StoreError::AlreadyResolved(plan.group_key.clone()));
        };

        // 2. Lock every member row for the rest of the transaction, in id order
        //    so overlapping resolutions cannot deadlock.
        let rows: Vec<LessonRow> = sqlx::query_as(LOCK_MEMBERS_SQL)
            .bind(plan.member_ids())
            .fetch_all(&mut *tx)
            .await?;
        let lessons: Vec<LessonRecord> = rows.into_iter().map(LessonRecord::from).collect();

        let canonical = lessons
            .iter()
            .find(|l| l.lesson_id == plan.canonical_id && l.is_live())
            .ok_or_else(|| StoreError::CanonicalUnavailable(plan.canonical_id.clone()))?;
        let unavailable = unavailable_members(plan, &lessons);
        if !unavailable.is_empty() {
            return Err(StoreError::MemberUnavailable(unavailable));
        }

        // 3. Fill-if-empty metadata merge into the canonical record.
        let mut merged_fields = Vec::new();
        if plan.merge.merge_metadata {
            let donors = plan
                .archived_ids
                .iter()
                .filter_map(|id| lessons.iter().find(|l| &l.lesson_id == id))
                .map(|l| &l.metadata);
            let (merged, filled) = merge_metadata(&canonical.metadata, donors);
            if !filled.is_empty() {
                sqlx::query(
                    "UPDATE lessons SET metadata = $1, last_modified = $2 WHERE lesson_id = $3",
                )
                .bind(Json(merged))
                .bind(plan.resolved_at)
                .bind(&plan.canonical_id)
                .execute(&mut *tx)
                .await?;
            }
            merged_fields = filled;
        }

        // 4. Soft-archive the duplicates with a back-reference.
        let archived = sqlx::query(
            r#"
            UPDATE lessons
            SET archived_at = $1, archived_canonical_id = $2, archived_group_key = $3
            WHERE lesson_id = ANY($4) AND archived_at IS NULL
            "#,
        )
        .bind(plan.resolved_at)
        .bind(&plan.canonical_id)
        .bind(&plan.group_key)
        .bind(&plan.archived_ids)
        .execute(&mut *tx)
        .await?
        .rows_affected();
        if archived != plan.archived_ids.len() as u64 {
            return Err(StoreError::Corrupt(format!(
                "archived {archived} of {} locked lessons for {}",
                plan.archived_ids.len(),
                plan.group_key
            )));
        }

        let row: ResolutionRow = sqlx::query_as(
            "UPDATE duplicate_resolutions SET merged_fields = $1 WHERE id = $2 RETURNING *",
        )
        .bind(&merged_fields)
        .bind(resolution_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        debug!(group_key = %plan.group_key, archived, "Resolution transaction committed");
        info!(
            "Resolved group {} -> {} ({} archived, {} fields merged)",
            plan.group_key,
            plan.canonical_id,
            archived,
            merged_fields.len()
        );

        ResolutionRecord::try_from(row).map_err(StoreError::Corrupt)
    }
}
