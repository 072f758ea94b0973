//! Fill-if-empty metadata merge. A canonical value that is already set is
//! never replaced; only empty fields adopt a duplicate's value.

use crate::models::lesson::{has_items, has_text, LessonMetadata};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergePolicy {
    pub merge_metadata: bool,
}

/// Merges each donor into `canonical` in order; the first donor with a value
/// fills an empty field. Returns the merged metadata and the names of the
/// fields that were filled.
pub fn merge_metadata<'a>(
    canonical: &LessonMetadata,
    donors: impl IntoIterator<Item = &'a LessonMetadata>,
) -> (LessonMetadata, Vec<String>) {
    let mut merged = canonical.clone();
    let mut filled = Vec::new();
    for donor in donors {
        fill_from(&mut merged, donor, &mut filled);
    }
    (merged, filled)
}

fn fill_from(target: &mut LessonMetadata, donor: &LessonMetadata, filled: &mut Vec<String>) {
    fill_list(&mut target.grade_levels, &donor.grade_levels, "gradeLevels", filled);
    fill_list(&mut target.themes, &donor.themes, "themes", filled);
    fill_list(
        &mut target.cultural_heritage,
        &donor.cultural_heritage,
        "culturalHeritage",
        filled,
    );
    fill_list(&mut target.activity_type, &donor.activity_type, "activityType", filled);
    fill_text(&mut target.lesson_format, &donor.lesson_format, "lessonFormat", filled);
    fill_text(&mut target.location, &donor.location, "location", filled);
    fill_list(&mut target.season, &donor.season, "season", filled);
    fill_list(
        &mut target.core_competencies,
        &donor.core_competencies,
        "coreCompetencies",
        filled,
    );
    fill_list(
        &mut target.academic_integration,
        &donor.academic_integration,
        "academicIntegration",
        filled,
    );
    fill_list(
        &mut target.social_emotional_learning,
        &donor.social_emotional_learning,
        "socialEmotionalLearning",
        filled,
    );
    fill_list(&mut target.observances, &donor.observances, "observances", filled);
}

fn fill_list(target: &mut Vec<String>, donor: &[String], name: &str, filled: &mut Vec<String>) {
    if has_items(target) || !has_items(donor) {
        return;
    }
    *target = donor
        .iter()
        .filter(|v| !v.trim().is_empty())
        .cloned()
        .collect();
    filled.push(name.to_string());
}

fn fill_text(
    target: &mut Option<String>,
    donor: &Option<String>,
    name: &str,
    filled: &mut Vec<String>,
) {
    if has_text(target) || !has_text(donor) {
        return;
    }
    *target = donor.clone();
    filled.push(name.to_string());
}
