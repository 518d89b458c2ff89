//! Persistence seams of the match engine.
//!
//! Services only ever see these traits. `PgStore` backs them with diesel,
//! `InMemoryStore` with plain maps behind a mutex.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use cuppa_shared::errors::AppResult;

use crate::matching::availability::AvailabilityGrid;
use crate::matching::history::PairKey;
use crate::models::{
    Availability, Match, MatchAvailability, MatchFeedback, NewMatch, NewMatchFeedback, Organisation, User,
};

pub mod memory;
pub mod postgres;
mod rows;

pub trait UserDirectory: Send + Sync {
    /// Members of `org`, in a stable load order.
    fn users_in_organisation(&self, org: Uuid) -> AppResult<Vec<User>>;
    fn user_by_id(&self, id: Uuid) -> AppResult<Option<User>>;
    /// Persists the engine-owned fields of a user (the rolling rating).
    fn update_user(&self, user: &User) -> AppResult<()>;
}

pub trait OrganisationStore: Send + Sync {
    fn list_organisations(&self) -> AppResult<Vec<Organisation>>;
    fn organisation_by_id(&self, id: Uuid) -> AppResult<Option<Organisation>>;
}

pub trait AvailabilityStore: Send + Sync {
    fn grid_for_user(&self, user_id: Uuid) -> AppResult<Option<AvailabilityGrid>>;
    fn grids_for_users(&self, user_ids: &[Uuid]) -> AppResult<HashMap<Uuid, AvailabilityGrid>>;
    /// Fails with `ConfigAlreadyExists` when the user already has a grid.
    fn create_grid(&self, user_id: Uuid, grid: AvailabilityGrid) -> AppResult<()>;
    /// Fails with `ConfigNotFound` when the user has no grid.
    fn update_grid(&self, user_id: Uuid, grid: AvailabilityGrid) -> AppResult<()>;
    fn delete_grid(&self, user_id: Uuid) -> AppResult<bool>;
    fn grid_exists(&self, user_id: Uuid) -> AppResult<bool>;
}

pub trait MatchHistoryStore: Send + Sync {
    fn was_ever_matched(&self, a: Uuid, b: Uuid) -> AppResult<bool>;
    /// Every ledger pair with both members in `user_ids`.
    fn matched_pairs_among(&self, user_ids: &[Uuid]) -> AppResult<HashSet<PairKey>>;
}

pub trait MatchStore: Send + Sync {
    /// Inserts a pending match and its ledger row as one unit.
    ///
    /// Re-checks inside that unit that neither participant holds a
    /// non-terminal match (`AlreadyInMatch`) and that the pair was never
    /// matched (`PairAlreadyMatched`).
    fn create_match(&self, new_match: NewMatch) -> AppResult<Match>;
    /// Applies `change` to the stored match while holding it exclusively and
    /// persists the result only when `change` succeeds.
    ///
    /// Fails with `MatchNotFound` when there is no such match.
    fn transition_match(&self, id: Uuid, change: &mut dyn FnMut(&mut Match) -> AppResult<()>) -> AppResult<Match>;
    fn match_by_id(&self, id: Uuid) -> AppResult<Option<Match>>;
    /// Most recent pending or waiting-for-feedback match of the user.
    fn current_match_for_user(&self, user_id: Uuid) -> AppResult<Option<Match>>;
    /// Newest first.
    fn matches_for_organisation(&self, org: Uuid) -> AppResult<Vec<Match>>;
    /// Newest first.
    fn matches_for_user(&self, user_id: Uuid) -> AppResult<Vec<Match>>;
    fn has_non_terminal_match(&self, user_id: Uuid) -> AppResult<bool>;

    fn availability_for(&self, match_id: Uuid, user_id: Uuid) -> AppResult<Option<MatchAvailability>>;
    fn upsert_availability(
        &self,
        match_id: Uuid,
        user_id: Uuid,
        availability: Availability,
    ) -> AppResult<MatchAvailability>;
    fn availabilities_for_match(&self, match_id: Uuid) -> AppResult<Vec<MatchAvailability>>;

    fn has_feedback(&self, match_id: Uuid, user_id: Uuid) -> AppResult<bool>;
    /// Stores a participant's feedback and, when it is the second one,
    /// completes the match in the same unit of work.
    ///
    /// The match is locked for the duration, so of two racing second
    /// feedbacks exactly one reports the completion. Fails with
    /// `MatchNotAccepted` unless the match is waiting for feedback and with
    /// `FeedbackAlreadyExists` on a second submission by the same user.
    fn record_feedback(&self, feedback: NewMatchFeedback, now: DateTime<Utc>) -> AppResult<RecordedFeedback>;
    fn feedbacks_for_match(&self, match_id: Uuid) -> AppResult<Vec<MatchFeedback>>;
    fn count_feedbacks(&self, match_id: Uuid) -> AppResult<usize>;
    /// Ratings left for `user_id` by their partners, across all matches.
    fn ratings_received_by(&self, user_id: Uuid) -> AppResult<Vec<i16>>;
}

/// What `MatchStore::record_feedback` wrote.
#[derive(Debug, Clone)]
pub struct RecordedFeedback {
    pub feedback: MatchFeedback,
    /// The match as completed by this feedback, if it was the second.
    pub completed: Option<Match>,
}

/// Liveness of the backing storage, reported by `/health`.
pub trait HealthProbe: Send + Sync {
    fn ping(&self) -> AppResult<()>;
}

/// The collaborators a service needs, as shared trait objects.
#[derive(Clone)]
pub struct Stores {
    pub users: Arc<dyn UserDirectory>,
    pub organisations: Arc<dyn OrganisationStore>,
    pub availability: Arc<dyn AvailabilityStore>,
    pub history: Arc<dyn MatchHistoryStore>,
    pub matches: Arc<dyn MatchStore>,
    pub health: Arc<dyn HealthProbe>,
}

impl Stores {
    /// Uses one backend for every seam.
    pub fn backed_by<S>(backend: Arc<S>) -> Self
    where
        S: UserDirectory
            + OrganisationStore
            + AvailabilityStore
            + MatchHistoryStore
            + MatchStore
            + HealthProbe
            + 'static,
    {
        Self {
            users: backend.clone(),
            organisations: backend.clone(),
            availability: backend.clone(),
            history: backend.clone(),
            matches: backend.clone(),
            health: backend,
        }
    }
}
