//! The externally produced similarity report and where it is loaded from.

use std::fmt;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::models::resolution::GroupType;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to read report {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed report: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("S3 error: {0}")]
    S3(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimilarityReport {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub generated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub groups: Vec<ReportGroup>,
}

/// Group id as assigned by one analysis run. Display metadata only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TransientGroupId {
    Number(u64),
    Text(String),
}

impl fmt::Display for TransientGroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransientGroupId::Number(n) => write!(f, "{n}"),
            TransientGroupId::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportGroup {
    #[serde(default)]
    pub group_id: Option<TransientGroupId>,
    #[serde(rename = "type")]
    pub group_type: GroupType,
    pub similarity_score: f64,
    #[serde(default)]
    pub recommended_canonical: Option<String>,
    pub lessons: Vec<ReportLesson>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportLesson {
    pub lesson_id: String,
    #[serde(default)]
    pub title: Option<String>,
    /// Automated quality signal computed by the analysis.
    #[serde(default)]
    pub quality_score: Option<f64>,
}

#[async_trait]
pub trait ReportSource: Send + Sync {
    async fn load(&self) -> Result<SimilarityReport, ReportError>;

    /// Human-readable location, for logs.
    fn describe(&self) -> String;
}

pub struct FileReportSource {
    path: PathBuf,
}

impl FileReportSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ReportSource for FileReportSource {
    async fn load(&self) -> Result<SimilarityReport, ReportError> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|source| ReportError::Io {
                path: self.path.display().to_string(),
                source,
            })?;
        let report: SimilarityReport = serde_json::from_slice(&bytes)?;
        debug!(
            groups = report.groups.len(),
            "Loaded similarity report from {}",
            self.path.display()
        );
        Ok(report)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

pub struct S3ReportSource {
    client: aws_sdk_s3::Client,
    bucket: String,
    key: String,
}

impl S3ReportSource {
    pub fn new(client: aws_sdk_s3::Client, bucket: String, key: String) -> Self {
        Self {
            client,
            bucket,
            key,
        }
    }
}

#[async_trait]
impl ReportSource for S3ReportSource {
    async fn load(&self) -> Result<SimilarityReport, ReportError> {
        let object = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&self.key)
            .send()
            .await
            .map_err(|e| ReportError::S3(format!("get_object failed: {e}")))?;
        let bytes = object
            .body
            .collect()
            .await
            .map_err(|e| ReportError::S3(format!("body read failed: {e}")))?
            .into_bytes();
        let report: SimilarityReport = serde_json::from_slice(&bytes)?;
        debug!(
            groups = report.groups.len(),
            "Loaded similarity report from s3://{}/{}",
            self.bucket,
            self.key
        );
        Ok(report)
    }

    fn describe(&self) -> String {
        format!("s3://{}/{}", self.bucket, self.key)
    }
}
