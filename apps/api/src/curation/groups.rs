//! Pending duplicate groups: the current similarity report joined with live
//! lesson data and canonical scores.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::curation::group_key::{group_key, GROUP_KEY_SEPARATOR};
use crate::curation::report::{ReportError, ReportGroup, ReportSource};
use crate::curation::scoring::{CanonicalScore, ContentAnalysis, ScoreModel};
use crate::curation::store::{CurationStore, StoreError};
use crate::models::lesson::{LessonId, LessonRecord};
use crate::models::resolution::{GroupType, ResolutionRecord};

#[derive(Debug, Error)]
pub enum ListError {
    #[error("similarity report unavailable: {0}")]
    Report(#[from] ReportError),

    #[error("lesson store unavailable: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateGroup {
    pub group_key: String,
    /// Id assigned by the analysis run that reported this group. Not stable.
    pub transient_group_id: Option<String>,
    #[serde(rename = "type")]
    pub group_type: GroupType,
    pub similarity_score: f64,
    pub recommended_canonical_id: LessonId,
    /// Member ids in report order.
    pub members: Vec<LessonId>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredMember {
    pub lesson: LessonRecord,
    #[serde(flatten)]
    pub score: CanonicalScore,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateGroup {
    #[serde(flatten)]
    pub group: DuplicateGroup,
    pub lessons: Vec<ScoredMember>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<ResolutionRecord>,
}

/// Lists candidate groups from the current report, skipping any whose key is
/// in `excluded`. Groups that reference a lesson that is unknown or archived
/// are dropped with a warning. Result order follows the report.
pub async fn list_pending(
    reports: &dyn ReportSource,
    store: &dyn CurationStore,
    model: &ScoreModel,
    excluded: &HashSet<String>,
    now: DateTime<Utc>,
) -> Result<Vec<CandidateGroup>, ListError> {
    collect_groups(reports, store, model, now, |key| {
        if excluded.contains(key) {
            Disposition::Skip
        } else {
            Disposition::Pending
        }
    })
    .await
}

/// Lists every reported group, attaching the known resolution to groups that
/// were already resolved. Resolved groups keep their archived members.
pub async fn list_with_resolved(
    reports: &dyn ReportSource,
    store: &dyn CurationStore,
    model: &ScoreModel,
    resolved: &[ResolutionRecord],
    now: DateTime<Utc>,
) -> Result<Vec<CandidateGroup>, ListError> {
    let by_key: HashMap<&str, &ResolutionRecord> =
        resolved.iter().map(|r| (r.group_key.as_str(), r)).collect();
    collect_groups(reports, store, model, now, |key| match by_key.get(key) {
        Some(resolution) => Disposition::Resolved((*resolution).clone()),
        None => Disposition::Pending,
    })
    .await
}

enum Disposition {
    Skip,
    Pending,
    Resolved(ResolutionRecord),
}

struct Candidate<'r> {
    key: String,
    source: &'r ReportGroup,
    members: Vec<LessonId>,
    resolution: Option<ResolutionRecord>,
}

async fn collect_groups(
    reports: &dyn ReportSource,
    store: &dyn CurationStore,
    model: &ScoreModel,
    now: DateTime<Utc>,
    disposition: impl Fn(&str) -> Disposition,
) -> Result<Vec<CandidateGroup>, ListError> {
    let report = reports.load().await?;

    let mut seen_keys = HashSet::new();
    let mut candidates = Vec::new();
    for report_group in &report.groups {
        let members = distinct_members(report_group);
        if members.len() < 2 {
            warn!(
                group_id = ?report_group.group_id,
                "Skipping report group with fewer than two distinct lessons"
            );
            continue;
        }
        if members.iter().any(|id| id.contains(GROUP_KEY_SEPARATOR)) {
            warn!(
                group_id = ?report_group.group_id,
                "Skipping report group with a lesson id containing '{GROUP_KEY_SEPARATOR}'"
            );
            continue;
        }
        let key = group_key(&members);
        let resolution = match disposition(&key) {
            Disposition::Skip => continue,
            Disposition::Pending => None,
            Disposition::Resolved(resolution) => Some(resolution),
        };
        if !seen_keys.insert(key.clone()) {
            debug!(group_key = %key, "Report lists the same member set twice; keeping the first");
            continue;
        }
        candidates.push(Candidate {
            key,
            source: report_group,
            members,
            resolution,
        });
    }

    let wanted: Vec<LessonId> = candidates
        .iter()
        .flat_map(|c| c.members.iter().cloned())
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    let found: HashMap<LessonId, LessonRecord> = store
        .fetch_lessons(&wanted)
        .await?
        .into_iter()
        .map(|l| (l.lesson_id.clone(), l))
        .collect();

    let mut groups = Vec::with_capacity(candidates.len());
    for Candidate {
        key,
        source,
        members,
        resolution,
    } in candidates
    {
        if resolution.is_none() {
            let unresolved: Vec<&LessonId> = members
                .iter()
                .filter(|id| !found.get(*id).is_some_and(LessonRecord::is_live))
                .collect();
            if !unresolved.is_empty() {
                warn!(
                    group_key = %key,
                    missing = ?unresolved,
                    "Dropping duplicate group with lessons that are missing or archived"
                );
                continue;
            }
        }

        let lessons: Vec<ScoredMember> = members
            .iter()
            .filter_map(|id| found.get(id))
            .map(|lesson| ScoredMember {
                score: model.score(
                    lesson,
                    &ContentAnalysis::of(lesson, quality_signal(source, &lesson.lesson_id)),
                    now,
                ),
                lesson: lesson.clone(),
            })
            .collect();

        let recommended_canonical_id = match &source.recommended_canonical {
            Some(id) if members.contains(id) => id.clone(),
            _ => best_scored(&lessons).unwrap_or_else(|| members[0].clone()),
        };

        groups.push(CandidateGroup {
            group: DuplicateGroup {
                group_key: key,
                transient_group_id: source.group_id.as_ref().map(|id| id.to_string()),
                group_type: source.group_type,
                similarity_score: clamp_similarity(source.similarity_score),
                recommended_canonical_id,
                members,
            },
            lessons,
            resolution,
        });
    }

    info!(
        listed = groups.len(),
        reported = report.groups.len(),
        "Listed duplicate groups from {}",
        reports.describe()
    );
    Ok(groups)
}

fn distinct_members(group: &ReportGroup) -> Vec<LessonId> {
    let mut seen = HashSet::new();
    group
        .lessons
        .iter()
        .map(|l| l.lesson_id.trim())
        .filter(|id| !id.is_empty() && seen.insert(*id))
        .map(String::from)
        .collect()
}

fn quality_signal(group: &ReportGroup, lesson_id: &str) -> Option<f64> {
    group
        .lessons
        .iter()
        .find(|l| l.lesson_id.trim() == lesson_id)
        .and_then(|l| l.quality_score)
}

/// Highest canonical score; ties go to the smallest lesson id.
fn best_scored(members: &[ScoredMember]) -> Option<LessonId> {
    members
        .iter()
        .max_by(|a, b| {
            a.score
                .canonical_score
                .total_cmp(&b.score.canonical_score)
                .then_with(|| b.lesson.lesson_id.cmp(&a.lesson.lesson_id))
        })
        .map(|m| m.lesson.lesson_id.clone())
}

fn clamp_similarity(score: f64) -> f64 {
    if score.is_finite() {
        score.clamp(0.0, 1.0)
    } else {
        0.0
    }
}
