use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use cuppa_shared::errors::{AppError, AppResult, ErrorCode};
use cuppa_shared::types::api::{ApiResponse, Listing};
use cuppa_shared::types::auth::AuthUser;

use crate::matching::lifecycle::MatchStatus;
use crate::models::{Availability, Match, MatchAvailability, MatchFeedback};
use crate::services::FeedbackOutcome;
use crate::AppState;

// --- Request / Response types ---

/// A match as shown to clients, with the status it has at read time.
#[derive(Debug, Serialize)]
pub struct MatchView {
    #[serde(flatten)]
    pub record: Match,
    pub effective_status: MatchStatus,
}

impl MatchView {
    pub fn at(record: Match, now: DateTime<Utc>) -> Self {
        let effective_status = record.effective_status(now);
        Self {
            record,
            effective_status,
        }
    }
}

pub fn views(matches: Vec<Match>) -> Listing<MatchView> {
    let now = Utc::now();
    matches
        .into_iter()
        .map(|m| MatchView::at(m, now))
        .collect::<Vec<_>>()
        .into()
}

#[derive(Debug, Default, Deserialize)]
pub struct AcceptMatchRequest {
    #[serde(default)]
    pub availability: Option<Availability>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct FeedbackRequest {
    pub rating: i32,
    #[serde(default)]
    #[validate(length(max = 2000, message = "comment must be at most 2000 characters"))]
    pub comment: String,
}

// --- Handlers ---

/// GET /matches/current: 204 when the user has no live match
pub async fn current_match(State(state): State<Arc<AppState>>, user: AuthUser) -> AppResult<Response> {
    match state.matches.get_current_match(user.id) {
        Ok(m) => Ok(Json(ApiResponse::ok(MatchView::at(m, Utc::now()))).into_response()),
        Err(e) if e.is(ErrorCode::MatchNotFound) => Ok(StatusCode::NO_CONTENT.into_response()),
        Err(e) => Err(e),
    }
}

pub async fn match_history(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<Listing<MatchView>>>> {
    let history = state.matches.get_match_history(user.id)?;
    Ok(Json(ApiResponse::ok(views(history))))
}

pub async fn pending_feedback(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<Listing<MatchView>>>> {
    let pending = state.matches.get_matches_pending_feedback(user.id)?;
    Ok(Json(ApiResponse::ok(views(pending))))
}

/// POST /matches/:id/accept: body `{"availability": {...}}` is optional
pub async fn accept_match(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(match_id): Path<Uuid>,
    body: Option<Json<AcceptMatchRequest>>,
) -> AppResult<Json<ApiResponse<MatchView>>> {
    let Json(req) = body.unwrap_or_default();
    let m = state
        .matches
        .accept_match_with_availability(user.id, match_id, req.availability)
        .await?;
    Ok(Json(ApiResponse::ok_with_message(MatchView::at(m, Utc::now()), "match accepted")))
}

pub async fn reject_match(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(match_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<MatchView>>> {
    let m = state.matches.reject_match(user.id, match_id)?;
    Ok(Json(ApiResponse::ok_with_message(MatchView::at(m, Utc::now()), "match rejected")))
}

pub async fn match_availabilities(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(match_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Listing<MatchAvailability>>>> {
    let availabilities = state.matches.get_match_availabilities(user.id, match_id)?;
    Ok(Json(ApiResponse::ok(availabilities.into())))
}

pub async fn submit_feedback(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(match_id): Path<Uuid>,
    Json(req): Json<FeedbackRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<FeedbackOutcome>>)> {
    req.validate()
        .map_err(|e| AppError::new(ErrorCode::ValidationError, e.to_string()))?;

    let outcome = state
        .matches
        .submit_feedback(user.id, match_id, req.rating, req.comment.trim().to_string())?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(outcome))))
}

pub async fn match_feedbacks(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(match_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Listing<MatchFeedback>>>> {
    let feedbacks = state.matches.get_match_feedbacks(user.id, match_id)?;
    Ok(Json(ApiResponse::ok(feedbacks.into())))
}
