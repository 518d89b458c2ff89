use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use cuppa_shared::errors::AppResult;
use cuppa_shared::types::api::ApiResponse;
use cuppa_shared::types::auth::AuthUser;

use crate::matching::availability::AvailabilityGrid;
use crate::services::SlotChange;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateAvailabilityRequest {
    pub slots: AvailabilityGrid,
}

#[derive(Debug, Deserialize)]
pub struct UpdateAvailabilityRequest {
    pub changes: Vec<SlotChange>,
}

#[derive(Debug, Serialize)]
pub struct AvailabilityView {
    pub user_id: Uuid,
    pub slots: AvailabilityGrid,
}

#[derive(Debug, Serialize)]
pub struct ConfigExistsView {
    pub user_id: Uuid,
    pub exists: bool,
}

pub async fn get_config(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<AvailabilityView>>> {
    let slots = state.availability.get(user.id)?;
    Ok(Json(ApiResponse::ok(AvailabilityView { user_id: user.id, slots })))
}

/// GET /availability-config/exists: lets clients decide between create and update
pub async fn config_exists(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<ConfigExistsView>>> {
    let exists = state.availability.has(user.id)?;
    Ok(Json(ApiResponse::ok(ConfigExistsView { user_id: user.id, exists })))
}

pub async fn create_config(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<CreateAvailabilityRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<AvailabilityView>>)> {
    let slots = state.availability.create(user.id, req.slots)?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(AvailabilityView { user_id: user.id, slots })),
    ))
}

/// PUT /availability-config: only the listed slots change
pub async fn update_config(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<UpdateAvailabilityRequest>,
) -> AppResult<Json<ApiResponse<AvailabilityView>>> {
    let slots = state.availability.update(user.id, &req.changes)?;
    Ok(Json(ApiResponse::ok(AvailabilityView { user_id: user.id, slots })))
}

pub async fn delete_config(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<()>>> {
    state.availability.delete(user.id)?;
    Ok(Json(ApiResponse::ok_with_message((), "availability configuration removed")))
}
