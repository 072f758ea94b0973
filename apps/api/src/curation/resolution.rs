//! Resolving a duplicate group: keep one canonical lesson, soft-archive the
//! rest, optionally fill the canonical's empty metadata from the duplicates,
//! and write one audit record per group key.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::curation::group_key::{group_key, GROUP_KEY_SEPARATOR};
use crate::curation::groups::DuplicateGroup;
use crate::curation::merge::MergePolicy;
use crate::curation::store::{CurationStore, ResolutionPlan, StoreError};
use crate::curation::tracker::ResolvedSet;
use crate::models::lesson::LessonId;
use crate::models::resolution::{GroupType, ResolutionRecord};

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("lesson {canonical_id} is not a member of group {group_key}")]
    InvalidCanonical {
        group_key: String,
        canonical_id: LessonId,
    },

    #[error("invalid group: {0}")]
    InvalidGroup(String),

    #[error("group {0} is already resolved")]
    AlreadyResolved(String),

    #[error("canonical lesson {0} is missing or archived")]
    CanonicalUnavailable(LessonId),

    #[error("lessons {0:?} are missing or already archived")]
    MemberUnavailable(Vec<LessonId>),

    #[error("record store unavailable: {0}")]
    UpstreamUnavailable(#[source] StoreError),

    #[error("resolution could not be persisted: {0}")]
    Persistence(#[source] StoreError),
}

/// Wire shape of a resolve call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveRequest {
    pub group_key: String,
    pub canonical_id: LessonId,
    pub archived_ids: Vec<LessonId>,
    #[serde(rename = "type")]
    pub group_type: GroupType,
    pub similarity_score: f64,
    #[serde(default)]
    pub merge_metadata: bool,
    #[serde(default)]
    pub notes: Option<String>,
}

impl ResolveRequest {
    /// Rebuilds the group the caller saw. The supplied key must match the
    /// key derived from `canonicalId` plus `archivedIds`.
    pub fn to_group(&self) -> Result<DuplicateGroup, ResolveError> {
        if self.archived_ids.contains(&self.canonical_id) {
            return Err(ResolveError::InvalidCanonical {
                group_key: self.group_key.clone(),
                canonical_id: self.canonical_id.clone(),
            });
        }
        if !self.similarity_score.is_finite() || !(0.0..=1.0).contains(&self.similarity_score) {
            return Err(ResolveError::InvalidGroup(format!(
                "similarity score {} is outside [0, 1]",
                self.similarity_score
            )));
        }
        let mut members = vec![self.canonical_id.clone()];
        members.extend(self.archived_ids.iter().cloned());
        let derived = group_key(&members);
        if derived != self.group_key {
            return Err(ResolveError::InvalidGroup(format!(
                "group key '{}' does not match members (expected '{derived}')",
                self.group_key
            )));
        }
        Ok(DuplicateGroup {
            group_key: derived,
            transient_group_id: None,
            group_type: self.group_type,
            similarity_score: self.similarity_score,
            recommended_canonical_id: self.canonical_id.clone(),
            members,
        })
    }

    pub fn merge_policy(&self) -> MergePolicy {
        MergePolicy {
            merge_metadata: self.merge_metadata,
        }
    }
}

pub struct ResolveParams<'a> {
    pub group: &'a DuplicateGroup,
    pub canonical_id: &'a str,
    pub policy: MergePolicy,
    pub resolved_by: &'a str,
    pub caller_notes: Option<&'a str>,
    pub now: DateTime<Utc>,
}

/// Resolves one group. Validation happens before any side effect; the store
/// commit is all-or-nothing and only the first commit per group key wins.
pub async fn resolve(
    store: &dyn CurationStore,
    tracker: &ResolvedSet,
    params: ResolveParams<'_>,
) -> Result<ResolutionRecord, ResolveError> {
    let ResolveParams {
        group,
        canonical_id,
        policy,
        resolved_by,
        caller_notes,
        now,
    } = params;

    // 1. Shape checks.
    let members = validate_members(group)?;
    if !members.iter().any(|id| id == canonical_id) {
        return Err(ResolveError::InvalidCanonical {
            group_key: group.group_key.clone(),
            canonical_id: canonical_id.to_string(),
        });
    }
    let archived_ids: Vec<LessonId> = members
        .into_iter()
        .filter(|id| id != canonical_id)
        .collect();

    // 2. Fast path: this session already saw the group resolved.
    if tracker.has(&group.group_key).await {
        info!(group_key = %group.group_key, "Resolve rejected: already resolved in session");
        return Err(ResolveError::AlreadyResolved(group.group_key.clone()));
    }

    let plan = ResolutionPlan {
        group_key: group.group_key.clone(),
        canonical_id: canonical_id.to_string(),
        notes: build_note(group, canonical_id, archived_ids.len(), policy, caller_notes),
        archived_ids,
        group_type: group.group_type,
        similarity_score: group.similarity_score,
        merge: policy,
        resolved_by: resolved_by.to_string(),
        resolved_at: now,
    };

    // 3. Durable commit: the real correctness boundary.
    match store.commit_resolution(&plan).await {
        Ok(record) => {
            tracker.record(record.clone()).await;
            info!(
                group_key = %record.group_key,
                canonical_id = %record.canonical_id,
                archived = record.archived_ids.len(),
                resolved_by = %record.resolved_by,
                "Duplicate group resolved"
            );
            Ok(record)
        }
        Err(StoreError::AlreadyResolved(key)) => {
            info!(group_key = %key, "Resolve rejected: already resolved in durable store");
            match store.find_resolution(&key).await {
                Ok(Some(existing)) => tracker.record(existing).await,
                Ok(None) => {}
                Err(e) => warn!(group_key = %key, "Could not read back existing resolution: {e}"),
            }
            Err(ResolveError::AlreadyResolved(key))
        }
        Err(StoreError::CanonicalUnavailable(id)) => Err(ResolveError::CanonicalUnavailable(id)),
        Err(StoreError::MemberUnavailable(ids)) => {
            info!(group_key = %plan.group_key, unavailable = ?ids, "Resolve rejected: members no longer live");
            Err(ResolveError::MemberUnavailable(ids))
        }
        Err(e @ StoreError::Unavailable(_)) => {
            warn!(group_key = %plan.group_key, "Record store unavailable: {e}");
            Err(ResolveError::UpstreamUnavailable(e))
        }
        Err(e) => {
            error!(group_key = %plan.group_key, "Resolution transaction failed: {e}");
            Err(ResolveError::Persistence(e))
        }
    }
}

/// Distinct members in key order. Rejects groups whose stated key does not
/// match their member set.
fn validate_members(group: &DuplicateGroup) -> Result<Vec<LessonId>, ResolveError> {
    let mut seen = HashSet::new();
    if group
        .members
        .iter()
        .any(|id| {
            id.trim().is_empty() || id.contains(GROUP_KEY_SEPARATOR) || !seen.insert(id.as_str())
        })
    {
        return Err(ResolveError::InvalidGroup(
            "member ids must be distinct, non-empty and free of the key separator".to_string(),
        ));
    }
    if group.members.len() < 2 {
        return Err(ResolveError::InvalidGroup(
            "a duplicate group needs at least two members".to_string(),
        ));
    }
    if group_key(&group.members) != group.group_key {
        return Err(ResolveError::InvalidGroup(format!(
            "group key '{}' does not match its members",
            group.group_key
        )));
    }
    let mut members = group.members.clone();
    members.sort();
    Ok(members)
}

fn build_note(
    group: &DuplicateGroup,
    canonical_id: &str,
    archived: usize,
    policy: MergePolicy,
    caller_notes: Option<&str>,
) -> String {
    let mut note = format!(
        "Resolved {} duplicate group of {} lessons: kept {}, archived {}",
        group.group_type,
        group.members.len(),
        canonical_id,
        archived
    );
    if policy.merge_metadata {
        note.push_str(", empty metadata filled from duplicates");
    }
    note.push('.');
    if let Some(extra) = caller_notes.map(str::trim).filter(|n| !n.is_empty()) {
        note.push(' ');
        note.push_str(extra);
    }
    note
}
