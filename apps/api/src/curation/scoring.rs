//! Canonical scoring: how good a candidate is as the surviving record of a
//! duplicate group.
//!
//! Pure functions only. "Now" is always passed in so identical inputs give
//! bit-identical scores. Missing fields lower the score; they never error.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::lesson::{has_items, has_text, LessonRecord};

pub const DEFAULT_RECENCY_HALF_LIFE_DAYS: f64 = 365.0;

/// Notes at or beyond this length get the full length credit.
const NOTES_FULL_LENGTH: f64 = 200.0;

const NOTES_PROBLEM_MARKERS: &[&str] = &["error", "failed", "incomplete", "missing", "todo"];

const TITLE_COPY_MARKERS: &[&str] = &["copy", "duplicate", "draft", "untitled", "test", "temp"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringWeights {
    pub content: f64,
    pub completeness: f64,
    pub recency: f64,
    pub quality: f64,
    pub notes: f64,
    pub naming: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            content: 0.35,
            completeness: 0.20,
            recency: 0.15,
            quality: 0.15,
            notes: 0.10,
            naming: 0.05,
        }
    }
}

impl ScoringWeights {
    pub fn total(&self) -> f64 {
        self.content + self.completeness + self.recency + self.quality + self.notes + self.naming
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ContentComponent {
    Objectives,
    Materials,
    Steps,
    Assessment,
    Background,
}

/// Share of the content component each structural part contributes.
const COMPONENT_WEIGHTS: &[(ContentComponent, f64)] = &[
    (ContentComponent::Objectives, 0.25),
    (ContentComponent::Materials, 0.15),
    (ContentComponent::Steps, 0.30),
    (ContentComponent::Assessment, 0.20),
    (ContentComponent::Background, 0.10),
];

/// Scoring inputs that do not live on the lesson record itself.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContentAnalysis {
    pub present_components: Vec<ContentComponent>,
    /// Automated quality signal from the similarity report, expected in [0,1].
    pub quality_signal: Option<f64>,
}

impl ContentAnalysis {
    /// Derives component presence from the record's structured content.
    pub fn of(record: &LessonRecord, quality_signal: Option<f64>) -> Self {
        let content = &record.content;
        let present_components = COMPONENT_WEIGHTS
            .iter()
            .map(|(component, _)| *component)
            .filter(|component| match component {
                ContentComponent::Objectives => has_items(&content.objectives),
                ContentComponent::Materials => has_items(&content.materials),
                ContentComponent::Steps => has_items(&content.steps),
                ContentComponent::Assessment => has_text(&content.assessment),
                ContentComponent::Background => has_text(&content.background),
            })
            .collect();
        Self {
            present_components,
            quality_signal,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentBreakdown {
    pub present_components: Vec<ContentComponent>,
    pub missing_components: Vec<ContentComponent>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentDetails {
    pub breakdown: ComponentBreakdown,
}

/// Per-component scores, each in [0,1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreBreakdown {
    pub content: f64,
    pub completeness: f64,
    pub recency: f64,
    pub quality: f64,
    pub notes: f64,
    pub naming: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_details: Option<ContentDetails>,
}

impl ScoreBreakdown {
    /// Weighted sum of the six components.
    pub fn weighted(&self, weights: &ScoringWeights) -> f64 {
        weights.content * self.content
            + weights.completeness * self.completeness
            + weights.recency * self.recency
            + weights.quality * self.quality
            + weights.notes * self.notes
            + weights.naming * self.naming
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalScore {
    pub canonical_score: f64,
    pub breakdown: ScoreBreakdown,
}

#[derive(Debug, Clone)]
pub struct ScoreModel {
    pub weights: ScoringWeights,
    pub recency_half_life_days: f64,
}

impl Default for ScoreModel {
    fn default() -> Self {
        Self {
            weights: ScoringWeights::default(),
            recency_half_life_days: DEFAULT_RECENCY_HALF_LIFE_DAYS,
        }
    }
}

impl ScoreModel {
    pub fn new(recency_half_life_days: f64) -> Self {
        Self {
            recency_half_life_days,
            ..Default::default()
        }
    }

    pub fn score(
        &self,
        record: &LessonRecord,
        analysis: &ContentAnalysis,
        now: DateTime<Utc>,
    ) -> CanonicalScore {
        let (content, details) = compute_content_score(analysis);
        let breakdown = ScoreBreakdown {
            content,
            completeness: compute_completeness_score(record),
            recency: compute_recency_score(
                record.last_modified.or(record.created_at),
                now,
                self.recency_half_life_days,
            ),
            quality: normalize(analysis.quality_signal),
            notes: compute_notes_score(record.processing_notes.as_deref()),
            naming: compute_naming_score(&record.title),
            content_details: Some(details),
        };
        CanonicalScore {
            canonical_score: breakdown.weighted(&self.weights),
            breakdown,
        }
    }
}

fn compute_content_score(analysis: &ContentAnalysis) -> (f64, ContentDetails) {
    let mut score: f64 = 0.0;
    let mut present_components = Vec::new();
    let mut missing_components = Vec::new();
    for (component, weight) in COMPONENT_WEIGHTS {
        if analysis.present_components.contains(component) {
            score += weight;
            present_components.push(*component);
        } else {
            missing_components.push(*component);
        }
    }
    (
        score.clamp(0.0, 1.0),
        ContentDetails {
            breakdown: ComponentBreakdown {
                present_components,
                missing_components,
            },
        },
    )
}

/// Fraction of expected metadata fields that are non-empty.
pub fn compute_completeness_score(record: &LessonRecord) -> f64 {
    let presence = record.metadata.field_presence();
    let filled = presence.iter().filter(|(_, present)| *present).count();
    filled as f64 / presence.len() as f64
}

/// Half-life exponential decay on the age of the last touch.
/// A missing timestamp scores 0.0; a timestamp at or after `now` scores 1.0.
pub fn compute_recency_score(
    touched_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    half_life_days: f64,
) -> f64 {
    let Some(touched_at) = touched_at else {
        return 0.0;
    };
    let age_days = (now - touched_at).num_seconds() as f64 / 86_400.0;
    if age_days <= 0.0 {
        return 1.0;
    }
    if half_life_days <= 0.0 {
        return 0.0;
    }
    0.5_f64.powf(age_days / half_life_days).clamp(0.0, 1.0)
}

pub fn compute_notes_score(notes: Option<&str>) -> f64 {
    let Some(text) = notes.map(str::trim).filter(|t| !t.is_empty()) else {
        return 0.0;
    };
    let length_credit = (text.chars().count() as f64 / NOTES_FULL_LENGTH).min(1.0);
    let score = 0.5 + 0.5 * length_credit;
    let lower = text.to_lowercase();
    if NOTES_PROBLEM_MARKERS.iter().any(|m| lower.contains(m)) {
        score * 0.5
    } else {
        score
    }
}

/// Penalizes titles that look like copies, drafts or placeholders.
pub fn compute_naming_score(title: &str) -> f64 {
    let title = title.trim();
    if title.is_empty() {
        return 0.0;
    }
    let lower = title.to_lowercase();
    let mut score: f64 = 1.0;

    let has_copy_marker = lower
        .split(|c: char| !c.is_alphanumeric())
        .any(|token| TITLE_COPY_MARKERS.contains(&token));
    if has_copy_marker || has_numbered_suffix(title) {
        score -= 0.4;
    }

    let length = title.chars().count();
    if length < 5 {
        score -= 0.3;
    } else if length > 100 {
        score -= 0.2;
    }

    let has_letters = title.chars().any(char::is_alphabetic);
    if has_letters && !title.chars().any(char::is_lowercase) {
        score -= 0.2;
    }

    score.clamp(0.0, 1.0)
}

/// Matches a trailing "(2)" style counter added by file copies.
fn has_numbered_suffix(title: &str) -> bool {
    let Some(inner) = title
        .strip_suffix(')')
        .and_then(|rest| rest.rsplit_once('('))
        .map(|(_, inner)| inner)
    else {
        return false;
    };
    !inner.is_empty() && inner.chars().all(|c| c.is_ascii_digit())
}

fn normalize(value: Option<f64>) -> f64 {
    match value {
        Some(v) if v.is_finite() => v.clamp(0.0, 1.0),
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::lesson::{LessonContent, LessonMetadata};
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn bare_record() -> LessonRecord {
        LessonRecord {
            lesson_id: "L1".to_string(),
            title: String::new(),
            summary: None,
            content: LessonContent::default(),
            metadata: LessonMetadata::default(),
            processing_notes: None,
            created_at: None,
            last_modified: None,
            archived: None,
        }
    }

    fn rich_record() -> LessonRecord {
        LessonRecord {
            title: "Three Sisters Garden Planting".to_string(),
            content: LessonContent {
                objectives: vec!["Name the three sisters crops".to_string()],
                materials: vec!["Seeds".to_string(), "Trowels".to_string()],
                steps: vec!["Prepare mound".to_string(), "Plant corn".to_string()],
                assessment: Some("Exit ticket".to_string()),
                background: None,
                body: Some("Students plant corn, beans and squash.".to_string()),
            },
            metadata: LessonMetadata {
                grade_levels: vec!["3".to_string()],
                themes: vec!["Garden".to_string()],
                cultural_heritage: vec!["Haudenosaunee".to_string()],
                location: Some("Outdoor".to_string()),
                ..Default::default()
            },
            processing_notes: Some("Reviewed by curriculum team.".to_string()),
            last_modified: Some(now() - Duration::days(30)),
            ..bare_record()
        }
    }

    #[test]
    fn test_default_weights_sum_to_one() {
        let w = ScoringWeights::default();
        assert!((w.total() - 1.0).abs() < 1e-9, "Total was {}", w.total());
    }

    #[test]
    fn test_canonical_score_equals_weighted_breakdown() {
        let model = ScoreModel::default();
        for record in [bare_record(), rich_record()] {
            let analysis = ContentAnalysis::of(&record, Some(0.7));
            let scored = model.score(&record, &analysis, now());
            let b = &scored.breakdown;
            let expected = 0.35 * b.content
                + 0.20 * b.completeness
                + 0.15 * b.recency
                + 0.15 * b.quality
                + 0.10 * b.notes
                + 0.05 * b.naming;
            assert!((scored.canonical_score - expected).abs() < 1e-6);
        }
    }

    #[test]
    fn test_missing_timestamps_give_zero_recency() {
        let record = LessonRecord {
            last_modified: None,
            created_at: None,
            ..rich_record()
        };
        let analysis = ContentAnalysis::of(&record, Some(0.5));
        let scored = ScoreModel::default().score(&record, &analysis, now());
        let b = &scored.breakdown;
        assert_eq!(b.recency, 0.0);
        let without_recency = 0.35 * b.content
            + 0.20 * b.completeness
            + 0.15 * b.quality
            + 0.10 * b.notes
            + 0.05 * b.naming;
        assert!((scored.canonical_score - without_recency).abs() < 1e-6);
    }

    #[test]
    fn test_created_at_used_when_last_modified_missing() {
        let record = LessonRecord {
            last_modified: None,
            created_at: Some(now() - Duration::days(365)),
            ..bare_record()
        };
        let scored = ScoreModel::default().score(&record, &ContentAnalysis::default(), now());
        assert!((scored.breakdown.recency - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_recency_is_monotone_decreasing() {
        let mut previous = f64::INFINITY;
        for days in [0, 1, 30, 180, 365, 730, 3650] {
            let score = compute_recency_score(Some(now() - Duration::days(days)), now(), 365.0);
            assert!(score <= previous, "{days} days scored {score} > {previous}");
            assert!((0.0..=1.0).contains(&score));
            previous = score;
        }
    }

    #[test]
    fn test_future_timestamp_is_fully_recent() {
        let score = compute_recency_score(Some(now() + Duration::days(3)), now(), 365.0);
        assert_eq!(score, 1.0);
    }

    #[test]
    fn test_scoring_is_deterministic() {
        let model = ScoreModel::default();
        let record = rich_record();
        let analysis = ContentAnalysis::of(&record, Some(0.42));
        let a = model.score(&record, &analysis, now());
        let b = model.score(&record, &analysis, now());
        assert_eq!(a.canonical_score.to_bits(), b.canonical_score.to_bits());
        assert_eq!(a, b);
    }

    #[test]
    fn test_bare_record_scores_zero_without_panicking() {
        let record = bare_record();
        let scored = ScoreModel::default().score(&record, &ContentAnalysis::of(&record, None), now());
        assert_eq!(scored.canonical_score, 0.0);
    }

    #[test]
    fn test_missing_components_listed() {
        let record = rich_record();
        let scored = ScoreModel::default().score(&record, &ContentAnalysis::of(&record, None), now());
        let details = scored.breakdown.content_details.unwrap();
        assert_eq!(
            details.breakdown.missing_components,
            vec![ContentComponent::Background]
        );
        assert!((scored.breakdown.content - 0.90).abs() < 1e-9);
    }

    #[test]
    fn test_non_finite_quality_signal_is_zero() {
        let record = bare_record();
        let analysis = ContentAnalysis::of(&record, Some(f64::NAN));
        let scored = ScoreModel::default().score(&record, &analysis, now());
        assert_eq!(scored.breakdown.quality, 0.0);
        let analysis = ContentAnalysis::of(&record, Some(1.7));
        let scored = ScoreModel::default().score(&record, &analysis, now());
        assert_eq!(scored.breakdown.quality, 1.0);
    }

    #[test]
    fn test_completeness_fraction() {
        // 4 of 11 fields filled
        let score = compute_completeness_score(&rich_record());
        assert!((score - 4.0 / 11.0).abs() < 1e-9, "Score was {score}");
    }

    #[test]
    fn test_notes_presence_and_problems() {
        assert_eq!(compute_notes_score(None), 0.0);
        assert_eq!(compute_notes_score(Some("   ")), 0.0);
        let clean = compute_notes_score(Some("Reviewed"));
        let flagged = compute_notes_score(Some("Reviewed, extraction failed"));
        assert!(clean > 0.5);
        assert!(flagged < clean);
    }

    #[test]
    fn test_naming_penalizes_copies() {
        let clean = compute_naming_score("Three Sisters Garden Planting");
        assert_eq!(clean, 1.0);
        assert!(compute_naming_score("Copy of Three Sisters Garden") < clean);
        assert!(compute_naming_score("Three Sisters Garden (2)") < clean);
        assert!(compute_naming_score("THREE SISTERS GARDEN") < clean);
        assert!(compute_naming_score("Soil") < clean);
        assert_eq!(compute_naming_score(""), 0.0);
    }

    #[test]
    fn test_naming_penalties_stack() {
        // copy marker, short and all caps together
        assert!((compute_naming_score("COPY") - 0.1).abs() < 1e-9);
        assert!(compute_naming_score("COPY (3)") >= 0.0);
    }

    #[test]
    fn test_numbered_suffix_requires_digits() {
        assert!(has_numbered_suffix("Lesson (12)"));
        assert!(!has_numbered_suffix("Lesson (K-2)"));
        assert!(!has_numbered_suffix("Lesson ()"));
    }
}
