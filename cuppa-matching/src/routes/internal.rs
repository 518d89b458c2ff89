use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::services::RematchReason;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct EligibleResponse {
    pub queued: bool,
}

/// POST /internal/users/:id/eligible: the user may have become pairable
/// (account confirmed etc.); queue a reactive attempt (service-to-service, no auth)
pub async fn user_eligible(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
) -> Json<EligibleResponse> {
    let queued = state.rematch.enqueue(user_id, RematchReason::AccountConfirmed);
    Json(EligibleResponse { queued })
}
