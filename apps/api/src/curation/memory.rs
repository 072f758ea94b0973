//! In-memory `CurationStore` for tests. Commits build a working copy and swap
//! it in only on success, so a failed commit leaves no trace.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::curation::merge::merge_metadata;
use crate::curation::store::{unavailable_members, CurationStore, ResolutionPlan, StoreError};
use crate::models::lesson::{ArchiveMark, LessonId, LessonRecord};
use crate::models::resolution::ResolutionRecord;

#[derive(Default)]
struct MemoryState {
    lessons: HashMap<LessonId, LessonRecord>,
    resolutions: Vec<ResolutionRecord>,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    fail_reads: AtomicBool,
    fail_archive: AtomicBool,
    fail_connect: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn with_lessons(lessons: impl IntoIterator<Item = LessonRecord>) -> Self {
        let store = Self::new();
        for lesson in lessons {
            store.insert_lesson(lesson).await;
        }
        store
    }

    pub async fn insert_lesson(&self, lesson: LessonRecord) {
        self.state
            .lock()
            .await
            .lessons
            .insert(lesson.lesson_id.clone(), lesson);
    }

    pub async fn insert_resolution(&self, resolution: ResolutionRecord) {
        self.state.lock().await.resolutions.push(resolution);
    }

    pub async fn lesson(&self, id: &str) -> Option<LessonRecord> {
        self.state.lock().await.lessons.get(id).cloned()
    }

    pub async fn resolution_count(&self) -> usize {
        self.state.lock().await.resolutions.len()
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Makes commits fail after the merge step, before archiving.
    pub fn fail_archive(&self, fail: bool) {
        self.fail_archive.store(fail, Ordering::SeqCst);
    }

    /// Makes commits fail before any transaction is opened.
    pub fn fail_connect(&self, fail: bool) {
        self.fail_connect.store(fail, Ordering::SeqCst);
    }

    fn check_reads(&self) -> Result<(), StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }
}

#[async_trait]
impl CurationStore for MemoryStore {
    async fn fetch_lessons(&self, ids: &[LessonId]) -> Result<Vec<LessonRecord>, StoreError> {
        self.check_reads()?;
        let state = self.state.lock().await;
        Ok(ids
            .iter()
            .filter_map(|id| state.lessons.get(id).cloned())
            .collect())
    }

    async fn find_resolution(
        &self,
        group_key: &str,
    ) -> Result<Option<ResolutionRecord>, StoreError> {
        self.check_reads()?;
        let state = self.state.lock().await;
        Ok(state
            .resolutions
            .iter()
            .find(|r| r.group_key == group_key)
            .cloned())
    }

    async fn list_resolutions(&self) -> Result<Vec<ResolutionRecord>, StoreError> {
        self.check_reads()?;
        Ok(self.state.lock().await.resolutions.clone())
    }

    async fn commit_resolution(
        &self,
        plan: &ResolutionPlan,
    ) -> Result<ResolutionRecord, StoreError> {
        if self.fail_connect.load(Ordering::SeqCst) {
            return Err(StoreError::from_connect(sqlx::Error::PoolTimedOut));
        }
        let mut state = self.state.lock().await;
        if state.resolutions.iter().any(|r| r.group_key == plan.group_key) {
            return Err(StoreError::AlreadyResolved(plan.group_key.clone()));
        }
        tokio::task::yield_now().await;

        let mut lessons = state.lessons.clone();
        let canonical = lessons
            .get(&plan.canonical_id)
            .filter(|l| l.is_live())
            .cloned()
            .ok_or_else(|| StoreError::CanonicalUnavailable(plan.canonical_id.clone()))?;
        let locked: Vec<LessonRecord> = plan
            .member_ids()
            .iter()
            .filter_map(|id| lessons.get(id).cloned())
            .collect();
        let unavailable = unavailable_members(plan, &locked);
        if !unavailable.is_empty() {
            return Err(StoreError::MemberUnavailable(unavailable));
        }

        let mut merged_fields = Vec::new();
        if plan.merge.merge_metadata {
            let donors: Vec<_> = plan
                .archived_ids
                .iter()
                .filter_map(|id| lessons.get(id))
                .map(|l| l.metadata.clone())
                .collect();
            let (merged, filled) = merge_metadata(&canonical.metadata, donors.iter());
            if let Some(target) = lessons.get_mut(&plan.canonical_id) {
                if !filled.is_empty() {
                    target.metadata = merged;
                    target.last_modified = Some(plan.resolved_at);
                }
            }
            merged_fields = filled;
        }

        if self.fail_archive.load(Ordering::SeqCst) {
            return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
        }

        for id in &plan.archived_ids {
            if let Some(lesson) = lessons.get_mut(id) {
                lesson.archived = Some(ArchiveMark {
                    archived_at: plan.resolved_at,
                    canonical_id: plan.canonical_id.clone(),
                    group_key: plan.group_key.clone(),
                });
            }
        }

        let record = ResolutionRecord {
            id: Uuid::new_v4(),
            group_key: plan.group_key.clone(),
            canonical_id: plan.canonical_id.clone(),
            archived_ids: plan.archived_ids.clone(),
            group_type: plan.group_type,
            similarity_score: plan.similarity_score,
            merge_applied: plan.merge.merge_metadata,
            merged_fields,
            resolved_by: plan.resolved_by.clone(),
            resolved_at: plan.resolved_at,
            notes: plan.notes.clone(),
        };
        state.lessons = lessons;
        state.resolutions.push(record.clone());
        Ok(record)
    }
}
