pub mod admin;
pub mod availability;
pub mod health;
pub mod internal;
pub mod matches;

use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;

use crate::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/metrics", get(health::metrics))
        // Participant endpoints
        .route("/matches/current", get(matches::current_match))
        .route("/matches/history", get(matches::match_history))
        .route("/matches/pending-feedback", get(matches::pending_feedback))
        .route("/matches/:id/accept", post(matches::accept_match))
        .route("/matches/:id/reject", post(matches::reject_match))
        .route("/matches/:id/availabilities", get(matches::match_availabilities))
        .route("/matches/:id/feedback", post(matches::submit_feedback))
        .route("/matches/:id/feedbacks", get(matches::match_feedbacks))
        .route(
            "/availability-config",
            get(availability::get_config)
                .post(availability::create_config)
                .put(availability::update_config)
                .delete(availability::delete_config),
        )
        .route("/availability-config/exists", get(availability::config_exists))
        // Organisation admin endpoints
        .route("/admin/matches", get(admin::list_matches))
        .route("/admin/matches/generate", post(admin::generate_matches))
        .route("/admin/matches/trigger-scheduler", post(admin::trigger_scheduler))
        .route("/admin/matches/:id/feedbacks", get(admin::match_feedbacks))
        // Internal service-to-service endpoints (no auth)
        .route("/internal/users/:id/eligible", post(internal::user_eligible))
        .with_state(state)
}
