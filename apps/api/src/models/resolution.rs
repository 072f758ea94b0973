use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::lesson::LessonId;

/// How the upstream similarity analysis matched the group's members.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupType {
    Exact,
    Near,
    Title,
}

impl GroupType {
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupType::Exact => "exact",
            GroupType::Near => "near",
            GroupType::Title => "title",
        }
    }
}

impl fmt::Display for GroupType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GroupType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "exact" => Ok(GroupType::Exact),
            "near" => Ok(GroupType::Near),
            "title" => Ok(GroupType::Title),
            other => Err(format!("unknown group type '{other}'")),
        }
    }
}

/// Audit entry written exactly once per resolved group key. Immutable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionRecord {
    pub id: Uuid,
    pub group_key: String,
    pub canonical_id: LessonId,
    pub archived_ids: Vec<LessonId>,
    #[serde(rename = "type")]
    pub group_type: GroupType,
    pub similarity_score: f64,
    pub merge_applied: bool,
    pub merged_fields: Vec<String>,
    pub resolved_by: String,
    pub resolved_at: DateTime<Utc>,
    pub notes: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct ResolutionRow {
    pub id: Uuid,
    pub group_key: String,
    pub canonical_id: String,
    pub archived_ids: Vec<String>,
    pub group_type: String,
    pub similarity_score: f64,
    pub merge_applied: bool,
    pub merged_fields: Vec<String>,
    pub resolved_by: String,
    pub resolved_at: DateTime<Utc>,
    pub notes: String,
}

impl TryFrom<ResolutionRow> for ResolutionRecord {
    type Error = String;

    fn try_from(row: ResolutionRow) -> Result<Self, Self::Error> {
        Ok(ResolutionRecord {
            id: row.id,
            group_key: row.group_key,
            canonical_id: row.canonical_id,
            archived_ids: row.archived_ids,
            group_type: row.group_type.parse()?,
            similarity_score: row.similarity_score,
            merge_applied: row.merge_applied,
            merged_fields: row.merged_fields,
            resolved_by: row.resolved_by,
            resolved_at: row.resolved_at,
            notes: row.notes,
        })
    }
}
