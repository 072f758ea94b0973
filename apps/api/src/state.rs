use std::sync::Arc;

use crate::curation::report::ReportSource;
use crate::curation::scoring::ScoreModel;
use crate::curation::store::CurationStore;
use crate::curation::tracker::SessionTrackers;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Durable lessons and resolutions. Default: `PgCurationStore`.
    pub store: Arc<dyn CurationStore>,
    /// Source of the current similarity report (local file or S3).
    pub reports: Arc<dyn ReportSource>,
    /// Per-session resolved-group memory, in front of `store`.
    pub trackers: SessionTrackers,
    pub score_model: Arc<ScoreModel>,
}
