use axum::{
    async_trait,
    extract::{FromRequestParts, Path, Query, State},
    http::{request::Parts, HeaderMap, StatusCode},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::curation::groups::{list_pending, list_with_resolved, CandidateGroup};
use crate::curation::resolution::{resolve, ResolveParams, ResolveRequest};
use crate::curation::scoring::{CanonicalScore, ContentAnalysis};
use crate::errors::AppError;
use crate::models::resolution::ResolutionRecord;
use crate::state::AppState;

pub const CALLER_ID_HEADER: &str = "x-curator-id";
pub const CAN_RESOLVE_HEADER: &str = "x-curator-can-resolve";
pub const SESSION_HEADER: &str = "x-session-id";

/// Identity and role-check result forwarded by the authenticating gateway.
#[derive(Debug, Clone)]
pub struct Caller {
    pub id: String,
    pub can_resolve: bool,
    /// Defaults to the caller id when no session header is sent.
    pub session_id: String,
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Caller {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = header(&parts.headers, CALLER_ID_HEADER)
            .ok_or(AppError::Unauthorized)?
            .to_string();
        let can_resolve = header(&parts.headers, CAN_RESOLVE_HEADER)
            .is_some_and(|v| v.eq_ignore_ascii_case("true"));
        let session_id = header(&parts.headers, SESSION_HEADER)
            .map(str::to_string)
            .unwrap_or_else(|| id.clone());
        Ok(Caller {
            id,
            can_resolve,
            session_id,
        })
    }
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

#[derive(Debug, Deserialize)]
pub struct GroupsQuery {
    #[serde(default)]
    pub include_resolved: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupsResponse {
    pub groups: Vec<CandidateGroup>,
    pub total: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveResponse {
    pub success: bool,
    pub archived_count: usize,
    pub resolution: ResolutionRecord,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonScoreResponse {
    pub lesson_id: String,
    pub live: bool,
    #[serde(flatten)]
    pub score: CanonicalScore,
}

/// GET /api/v1/duplicates/groups
pub async fn handle_list_groups(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<GroupsQuery>,
) -> Result<Json<GroupsResponse>, AppError> {
    let tracker = state
        .trackers
        .session(&caller.session_id, state.store.as_ref())
        .await;
    let now = Utc::now();
    let groups = if query.include_resolved {
        list_with_resolved(
            state.reports.as_ref(),
            state.store.as_ref(),
            &state.score_model,
            &tracker.all().await,
            now,
        )
        .await?
    } else {
        list_pending(
            state.reports.as_ref(),
            state.store.as_ref(),
            &state.score_model,
            &tracker.keys().await,
            now,
        )
        .await?
    };
    Ok(Json(GroupsResponse {
        total: groups.len(),
        groups,
    }))
}

/// POST /api/v1/duplicates/resolve
pub async fn handle_resolve(
    State(state): State<AppState>,
    caller: Caller,
    Json(req): Json<ResolveRequest>,
) -> Result<Json<ResolveResponse>, AppError> {
    if !caller.can_resolve {
        return Err(AppError::Forbidden);
    }
    let group = req.to_group()?;
    let tracker = state
        .trackers
        .session(&caller.session_id, state.store.as_ref())
        .await;
    let resolution = resolve(
        state.store.as_ref(),
        &tracker,
        ResolveParams {
            group: &group,
            canonical_id: &req.canonical_id,
            policy: req.merge_policy(),
            resolved_by: &caller.id,
            caller_notes: req.notes.as_deref(),
            now: Utc::now(),
        },
    )
    .await?;
    Ok(Json(ResolveResponse {
        success: true,
        archived_count: resolution.archived_ids.len(),
        resolution,
    }))
}

/// GET /api/v1/duplicates/resolutions
pub async fn handle_list_resolutions(
    State(state): State<AppState>,
    _caller: Caller,
) -> Result<Json<Vec<ResolutionRecord>>, AppError> {
    Ok(Json(state.store.list_resolutions().await?))
}

/// GET /api/v1/duplicates/resolutions/:group_key
pub async fn handle_get_resolution(
    State(state): State<AppState>,
    _caller: Caller,
    Path(group_key): Path<String>,
) -> Result<Json<ResolutionRecord>, AppError> {
    state
        .store
        .find_resolution(&group_key)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("No resolution for group {group_key}")))
}

/// GET /api/v1/lessons/:lesson_id/score
pub async fn handle_lesson_score(
    State(state): State<AppState>,
    _caller: Caller,
    Path(lesson_id): Path<String>,
) -> Result<Json<LessonScoreResponse>, AppError> {
    let lesson = state
        .store
        .fetch_lessons(std::slice::from_ref(&lesson_id))
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| AppError::NotFound(format!("Lesson {lesson_id} not found")))?;
    let score = state
        .score_model
        .score(&lesson, &ContentAnalysis::of(&lesson, None), Utc::now());
    Ok(Json(LessonScoreResponse {
        live: lesson.is_live(),
        lesson_id: lesson.lesson_id,
        score,
    }))
}

/// DELETE /api/v1/sessions/:session_id
pub async fn handle_end_session(
    State(state): State<AppState>,
    caller: Caller,
    Path(session_id): Path<String>,
) -> Result<StatusCode, AppError> {
    if state.trackers.end(&session_id).await {
        info!(session_id = %session_id, caller = %caller.id, "Session ended");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("Session {session_id} not found")))
    }
}
