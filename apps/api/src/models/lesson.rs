use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;

pub type LessonId = String;

/// Structural components of a lesson body. Every field is optional so that
/// partially ingested lessons deserialize without error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LessonContent {
    pub objectives: Vec<String>,
    pub materials: Vec<String>,
    pub steps: Vec<String>,
    pub assessment: Option<String>,
    pub background: Option<String>,
    /// Free-text body as submitted.
    pub body: Option<String>,
}

/// Curated, structured lesson metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LessonMetadata {
    pub grade_levels: Vec<String>,
    pub themes: Vec<String>,
    pub cultural_heritage: Vec<String>,
    pub activity_type: Vec<String>,
    pub lesson_format: Option<String>,
    pub location: Option<String>,
    pub season: Vec<String>,
    pub core_competencies: Vec<String>,
    pub academic_integration: Vec<String>,
    pub social_emotional_learning: Vec<String>,
    pub observances: Vec<String>,
}

impl LessonMetadata {
    /// Every expected metadata field with whether it currently holds a value.
    pub fn field_presence(&self) -> [(&'static str, bool); 11] {
        [
            ("gradeLevels", has_items(&self.grade_levels)),
            ("themes", has_items(&self.themes)),
            ("culturalHeritage", has_items(&self.cultural_heritage)),
            ("activityType", has_items(&self.activity_type)),
            ("lessonFormat", has_text(&self.lesson_format)),
            ("location", has_text(&self.location)),
            ("season", has_items(&self.season)),
            ("coreCompetencies", has_items(&self.core_competencies)),
            ("academicIntegration", has_items(&self.academic_integration)),
            ("socialEmotionalLearning", has_items(&self.social_emotional_learning)),
            ("observances", has_items(&self.observances)),
        ]
    }
}

pub(crate) fn has_items(values: &[String]) -> bool {
    values.iter().any(|v| !v.trim().is_empty())
}

pub(crate) fn has_text(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}

/// Soft-archive marker: the record stays in storage with a back-reference
/// to the canonical record that replaced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveMark {
    pub archived_at: DateTime<Utc>,
    pub canonical_id: LessonId,
    pub group_key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonRecord {
    pub lesson_id: LessonId,
    pub title: String,
    pub summary: Option<String>,
    pub content: LessonContent,
    pub metadata: LessonMetadata,
    pub processing_notes: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub last_modified: Option<DateTime<Utc>>,
    pub archived: Option<ArchiveMark>,
}

impl LessonRecord {
    pub fn is_live(&self) -> bool {
        self.archived.is_none()
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct LessonRow {
    pub lesson_id: String,
    pub title: String,
    pub summary: Option<String>,
    pub content: Json<LessonContent>,
    pub metadata: Json<LessonMetadata>,
    pub processing_notes: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub last_modified: Option<DateTime<Utc>>,
    pub archived_at: Option<DateTime<Utc>>,
    pub archived_canonical_id: Option<String>,
    pub archived_group_key: Option<String>,
}

impl From<LessonRow> for LessonRecord {
    fn from(row: LessonRow) -> Self {
        let archived = match (row.archived_at, row.archived_canonical_id) {
            (Some(archived_at), Some(canonical_id)) => Some(ArchiveMark {
                archived_at,
                canonical_id,
                group_key: row.archived_group_key.unwrap_or_default(),
            }),
            _ => None,
        };
        LessonRecord {
            lesson_id: row.lesson_id,
            title: row.title,
            summary: row.summary,
            content: row.content.0,
            metadata: row.metadata.0,
            processing_notes: row.processing_notes,
            created_at: row.created_at,
            last_modified: row.last_modified,
            archived,
        }
    }
}
