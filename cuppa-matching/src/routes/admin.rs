use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use cuppa_shared::errors::{AppError, AppResult};
use cuppa_shared::middleware::AdminUser;
use cuppa_shared::types::api::{ApiResponse, Listing};

use super::matches::{views, MatchView};
use crate::models::MatchFeedback;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub organisation_id: Uuid,
    pub matches_created: usize,
}

/// POST /admin/matches/generate: bulk run for the admin's own organisation
pub async fn generate_matches(
    State(state): State<Arc<AppState>>,
    admin: AdminUser,
) -> AppResult<Json<ApiResponse<GenerateResponse>>> {
    let organisation_id = admin.organisation_id;
    let service = Arc::clone(&state.matches);
    let matches_created = tokio::task::spawn_blocking(move || service.generate_matches_for_organisation(organisation_id))
        .await
        .map_err(|e| AppError::internal(format!("generation task failed: {e}")))??;

    tracing::info!(
        organisation_id = %organisation_id,
        admin_id = %admin.user.id,
        matches_created,
        "manual match generation"
    );
    Ok(Json(ApiResponse::ok(GenerateResponse {
        organisation_id,
        matches_created,
    })))
}

/// POST /admin/matches/trigger-scheduler: starts a full run and returns at once
pub async fn trigger_scheduler(
    State(state): State<Arc<AppState>>,
    admin: AdminUser,
) -> (StatusCode, Json<ApiResponse<()>>) {
    tracing::info!(admin_id = %admin.user.id, "scheduler run triggered");
    state.scheduler.run_now();
    (
        StatusCode::ACCEPTED,
        Json(ApiResponse::ok_with_message((), "match generation started")),
    )
}

pub async fn list_matches(
    State(state): State<Arc<AppState>>,
    admin: AdminUser,
) -> AppResult<Json<ApiResponse<Listing<MatchView>>>> {
    let matches = state.matches.get_organisation_matches(admin.organisation_id)?;
    Ok(Json(ApiResponse::ok(views(matches))))
}

pub async fn match_feedbacks(
    State(state): State<Arc<AppState>>,
    admin: AdminUser,
    Path(match_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Listing<MatchFeedback>>>> {
    let feedbacks = state.matches.admin_get_match_feedbacks(admin.organisation_id, match_id)?;
    Ok(Json(ApiResponse::ok(feedbacks.into())))
}
