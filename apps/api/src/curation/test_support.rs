//! Shared fixtures for curation tests.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use uuid::Uuid;

use crate::curation::report::{
    ReportError, ReportGroup, ReportLesson, ReportSource, SimilarityReport, TransientGroupId,
};
use crate::models::lesson::{LessonContent, LessonMetadata, LessonRecord};
use crate::models::resolution::{GroupType, ResolutionRecord};

pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

pub fn lesson(id: &str, title: &str) -> LessonRecord {
    LessonRecord {
        lesson_id: id.to_string(),
        title: title.to_string(),
        summary: None,
        content: LessonContent::default(),
        metadata: LessonMetadata::default(),
        processing_notes: None,
        created_at: Some(fixed_now() - chrono::Duration::days(90)),
        last_modified: None,
        archived: None,
    }
}

pub fn resolution_for(group_key: &str, canonical_id: &str) -> ResolutionRecord {
    ResolutionRecord {
        id: Uuid::new_v4(),
        group_key: group_key.to_string(),
        canonical_id: canonical_id.to_string(),
        archived_ids: group_key
            .split('|')
            .filter(|id| *id != canonical_id)
            .map(String::from)
            .collect(),
        group_type: GroupType::Near,
        similarity_score: 0.9,
        merge_applied: false,
        merged_fields: vec![],
        resolved_by: "curator-1".to_string(),
        resolved_at: fixed_now(),
        notes: String::new(),
    }
}

pub fn report_group(
    group_id: u64,
    group_type: GroupType,
    similarity_score: f64,
    members: &[&str],
) -> ReportGroup {
    ReportGroup {
        group_id: Some(TransientGroupId::Number(group_id)),
        group_type,
        similarity_score,
        recommended_canonical: None,
        lessons: members
            .iter()
            .map(|id| ReportLesson {
                lesson_id: id.to_string(),
                title: None,
                quality_score: None,
            })
            .collect(),
    }
}

/// Serves a fixed report, or fails on demand.
#[derive(Default)]
pub struct StaticReportSource {
    report: SimilarityReport,
    unavailable: AtomicBool,
}

impl StaticReportSource {
    pub fn new(groups: Vec<ReportGroup>) -> Self {
        Self {
            report: SimilarityReport {
                version: Some("test".to_string()),
                generated_at: None,
                groups,
            },
            unavailable: AtomicBool::new(false),
        }
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }
}

#[async_trait]
impl ReportSource for StaticReportSource {
    async fn load(&self) -> Result<SimilarityReport, ReportError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(ReportError::S3("report bucket unreachable".to_string()));
        }
        Ok(self.report.clone())
    }

    fn describe(&self) -> String {
        "static".to_string()
    }
}
