use std::sync::Arc;

use chrono::{Local, Utc};
use serde::Serialize;
use uuid::Uuid;

use cuppa_shared::errors::{AppError, AppResult, ErrorCode};

use super::rematch::{RematchQueue, RematchReason};
use crate::matching::algorithm::{best_partner, score_pairs, select_greedy, Candidate, ScoredPair};
use crate::matching::availability::{format_slots, validate_match_availability, AvailabilitySlot};
use crate::matching::lifecycle::{validate_rating, Acceptance, MatchStatus};
use crate::matching::slot::assign_meeting_slot;
use crate::models::{Availability, Match, MatchAvailability, MatchFeedback, NewMatch, NewMatchFeedback, User};
use crate::notify::Notifier;
use crate::store::Stores;

fn no_users_to_match() -> AppError {
    AppError::new(ErrorCode::NoUsersToMatch, "not enough users to create matches")
}

fn match_not_found() -> AppError {
    AppError::new(ErrorCode::MatchNotFound, "match not found")
}

#[derive(Debug, Clone, Serialize)]
pub struct FeedbackOutcome {
    pub feedback: MatchFeedback,
    pub completed: bool,
}

/// Pairing entry points and the match lifecycle operations.
pub struct MatchService {
    stores: Stores,
    notifier: Arc<dyn Notifier>,
    rematch: RematchQueue,
}

impl MatchService {
    pub fn new(stores: Stores, notifier: Arc<dyn Notifier>, rematch: RematchQueue) -> Self {
        Self {
            stores,
            notifier,
            rematch,
        }
    }

    // --- Pairing ---

    /// Members of an organisation that may be paired right now, in load order.
    fn eligible<'a>(&self, members: &'a [User]) -> AppResult<Vec<Candidate<'a>>> {
        let ids: Vec<Uuid> = members
            .iter()
            .filter(|u| !u.is_admin() && u.is_confirmed)
            .map(|u| u.id)
            .collect();
        let grids = self.stores.availability.grids_for_users(&ids)?;

        let mut candidates = Vec::with_capacity(ids.len());
        for user in members {
            if user.is_admin() || !user.is_confirmed {
                continue;
            }
            let Some(grid) = grids.get(&user.id).copied() else {
                continue;
            };
            if grid.is_empty() || self.stores.matches.has_non_terminal_match(user.id)? {
                continue;
            }
            candidates.push(Candidate { user, grid });
        }
        Ok(candidates)
    }

    fn create_pair(&self, organisation_id: Uuid, pair: &ScoredPair) -> AppResult<Match> {
        let slot = assign_meeting_slot(Local::now().date_naive(), &mut rand::thread_rng());
        self.stores.matches.create_match(NewMatch {
            organisation_id,
            user1_id: pair.user1_id,
            user2_id: pair.user2_id,
            match_score: pair.score,
            slot,
        })
    }

    /// Bulk weekly pairing for one organisation. Returns how many matches
    /// were actually created.
    pub fn generate_matches_for_organisation(&self, organisation_id: Uuid) -> AppResult<usize> {
        self.stores
            .organisations
            .organisation_by_id(organisation_id)?
            .ok_or_else(|| AppError::new(ErrorCode::OrganisationNotFound, "organisation not found"))?;

        let members = self.stores.users.users_in_organisation(organisation_id)?;
        let candidates = self.eligible(&members)?;
        if candidates.len() < 2 {
            return Err(no_users_to_match());
        }

        let ids: Vec<Uuid> = candidates.iter().map(|c| c.user.id).collect();
        let ledger = self.stores.history.matched_pairs_among(&ids)?;
        let pairs = score_pairs(&candidates, |key| ledger.contains(&key));
        if pairs.is_empty() {
            return Err(no_users_to_match());
        }

        let selected = select_greedy(pairs);
        if selected.is_empty() {
            return Err(no_users_to_match());
        }

        let mut created = 0usize;
        for pair in &selected {
            match self.create_pair(organisation_id, pair) {
                Ok(m) => {
                    created += 1;
                    tracing::info!(
                        organisation_id = %organisation_id,
                        match_id = %m.id,
                        user1_id = %m.user1_id,
                        user2_id = %m.user2_id,
                        score = m.match_score,
                        "match created"
                    );
                }
                Err(e) => tracing::warn!(
                    organisation_id = %organisation_id,
                    user1_id = %pair.user1_id,
                    user2_id = %pair.user2_id,
                    error = %e,
                    "failed to create match, skipping pair"
                ),
            }
        }

        metrics::counter!("cuppa_matches_created_total", "trigger" => "bulk").increment(created as u64);
        tracing::info!(organisation_id = %organisation_id, created, candidates = ids.len(), "matches generated");
        Ok(created)
    }

    /// Reactive single-user pairing. Every failure is logged and reads as
    /// "no match created".
    pub fn try_generate_match_for_user(&self, user_id: Uuid) -> Option<Match> {
        match self.generate_for_user(user_id) {
            Ok(Some(m)) => {
                metrics::counter!("cuppa_matches_created_total", "trigger" => "reactive").increment(1);
                tracing::info!(user_id = %user_id, match_id = %m.id, score = m.match_score, "reactive match created");
                Some(m)
            }
            Ok(None) => {
                tracing::debug!(user_id = %user_id, "no reactive match available");
                None
            }
            Err(e) => {
                tracing::warn!(user_id = %user_id, error = %e, "reactive match attempt failed");
                None
            }
        }
    }

    fn generate_for_user(&self, user_id: Uuid) -> AppResult<Option<Match>> {
        let Some(user) = self.stores.users.user_by_id(user_id)? else {
            return Ok(None);
        };
        let Some(organisation_id) = user.organisation_id else {
            return Ok(None);
        };

        let members = self.stores.users.users_in_organisation(organisation_id)?;
        let candidates = self.eligible(&members)?;
        let Some(seed) = candidates.iter().find(|c| c.user.id == user_id) else {
            return Ok(None);
        };

        let ids: Vec<Uuid> = candidates.iter().map(|c| c.user.id).collect();
        let ledger = self.stores.history.matched_pairs_among(&ids)?;
        let Some(best) = best_partner(seed, &candidates, |key| ledger.contains(&key)) else {
            return Ok(None);
        };

        self.create_pair(organisation_id, &best).map(Some)
    }

    // --- Lifecycle ---

    fn load_match(&self, match_id: Uuid) -> AppResult<Match> {
        self.stores.matches.match_by_id(match_id)?.ok_or_else(match_not_found)
    }

    pub async fn accept_match(&self, user_id: Uuid, match_id: Uuid) -> AppResult<Match> {
        self.accept_match_with_availability(user_id, match_id, None).await
    }

    /// Records the acceptance, stores the per-match availability when given,
    /// then tells the partner when the accepting user is free.
    pub async fn accept_match_with_availability(
        &self,
        user_id: Uuid,
        match_id: Uuid,
        availability: Option<Availability>,
    ) -> AppResult<Match> {
        if let Some(availability) = &availability {
            validate_match_availability(availability)
                .map_err(|msg| AppError::new(ErrorCode::InvalidAvailability, msg))?;
        }

        let now = Utc::now();
        let mut outcome = Acceptance::Recorded;
        let m = self.stores.matches.transition_match(match_id, &mut |m| {
            outcome = m.accept(user_id, now)?;
            Ok(())
        })?;

        if let Some(availability) = availability {
            self.stores.matches.upsert_availability(match_id, user_id, availability)?;
        }

        tracing::info!(
            match_id = %match_id,
            user_id = %user_id,
            both_accepted = outcome == Acceptance::BothAccepted,
            "match accepted"
        );

        if let Err(e) = self.notify_partner(&m, user_id).await {
            tracing::warn!(match_id = %match_id, user_id = %user_id, error = %e, "failed to notify partner");
        }
        Ok(m)
    }

    /// Slots of the accepting user: their per-match availability if any,
    /// else their weekly grid.
    fn accepter_slots(&self, match_id: Uuid, user_id: Uuid) -> AppResult<Vec<AvailabilitySlot>> {
        if let Some(submitted) = self.stores.matches.availability_for(match_id, user_id)? {
            return Ok(format_slots(&submitted.availability));
        }
        let grid = self.stores.availability.grid_for_user(user_id)?.unwrap_or_default();
        Ok(grid.available_slots().into_iter().map(AvailabilitySlot::from).collect())
    }

    async fn notify_partner(&self, m: &Match, accepter_id: Uuid) -> anyhow::Result<()> {
        let partner_id = m
            .partner_of(accepter_id)
            .ok_or_else(|| anyhow::anyhow!("user {accepter_id} is not part of match {}", m.id))?;
        let accepter = self
            .stores
            .users
            .user_by_id(accepter_id)?
            .ok_or_else(|| anyhow::anyhow!("accepting user {accepter_id} not found"))?;
        let partner = self
            .stores
            .users
            .user_by_id(partner_id)?
            .ok_or_else(|| anyhow::anyhow!("partner {partner_id} not found"))?;

        let slots = self.accepter_slots(m.id, accepter_id)?;
        if slots.is_empty() {
            tracing::debug!(match_id = %m.id, user_id = %accepter_id, "no availability to share, skipping notification");
            return Ok(());
        }

        self.notifier
            .notify_match_accepted(&partner, &accepter.full_name(), &accepter.email, &slots)
            .await
    }

    pub fn reject_match(&self, user_id: Uuid, match_id: Uuid) -> AppResult<Match> {
        let now = Utc::now();
        let m = self
            .stores
            .matches
            .transition_match(match_id, &mut |m| m.reject(user_id, now))?;
        tracing::info!(match_id = %match_id, user_id = %user_id, "match rejected");
        Ok(m)
    }

    pub fn submit_feedback(
        &self,
        user_id: Uuid,
        match_id: Uuid,
        rating: i32,
        comment: String,
    ) -> AppResult<FeedbackOutcome> {
        let m = self.load_match(match_id)?;
        m.require_participant(user_id)?;
        let rating = validate_rating(rating)?;

        let recorded = self.stores.matches.record_feedback(
            NewMatchFeedback {
                match_id,
                user_id,
                rating,
                comment,
            },
            Utc::now(),
        )?;
        tracing::info!(match_id = %match_id, user_id = %user_id, rating, "feedback submitted");

        // the feedback is stored; a stale rating must not strand the match
        if let Some(partner_id) = m.partner_of(user_id) {
            if let Err(e) = self.refresh_average_rating(partner_id) {
                tracing::warn!(user_id = %partner_id, error = %e, "failed to refresh average rating");
            }
        }

        let completed = recorded.completed.is_some();
        if let Some(done) = &recorded.completed {
            tracing::info!(match_id = %done.id, "match completed");
            self.rematch.enqueue(done.user1_id, RematchReason::PartnerCompleted);
            self.rematch.enqueue(done.user2_id, RematchReason::PartnerCompleted);
        }

        Ok(FeedbackOutcome {
            feedback: recorded.feedback,
            completed,
        })
    }

    /// Mean of every rating `user_id` ever received from a partner.
    fn refresh_average_rating(&self, user_id: Uuid) -> AppResult<()> {
        let ratings = self.stores.matches.ratings_received_by(user_id)?;
        let Some(mut user) = self.stores.users.user_by_id(user_id)? else {
            return Ok(());
        };
        user.average_rating = if ratings.is_empty() {
            None
        } else {
            let total: f64 = ratings.iter().map(|r| f64::from(*r)).sum();
            Some(total / ratings.len() as f64)
        };
        self.stores.users.update_user(&user)
    }

    // --- Queries ---

    /// The user's live match. A match with both feedbacks in reads as none,
    /// whatever its stored status says.
    pub fn get_current_match(&self, user_id: Uuid) -> AppResult<Match> {
        let m = self
            .stores
            .matches
            .current_match_for_user(user_id)?
            .ok_or_else(|| AppError::new(ErrorCode::MatchNotFound, "no current match"))?;
        if self.stores.matches.count_feedbacks(m.id)? >= 2 {
            return Err(AppError::new(ErrorCode::MatchNotFound, "no current match"));
        }
        Ok(m)
    }

    pub fn get_match_history(&self, user_id: Uuid) -> AppResult<Vec<Match>> {
        self.stores.matches.matches_for_user(user_id)
    }

    pub fn get_organisation_matches(&self, organisation_id: Uuid) -> AppResult<Vec<Match>> {
        self.stores.matches.matches_for_organisation(organisation_id)
    }

    pub fn get_match_availabilities(&self, user_id: Uuid, match_id: Uuid) -> AppResult<Vec<MatchAvailability>> {
        let m = self.load_match(match_id)?;
        m.require_participant(user_id)?;
        self.stores.matches.availabilities_for_match(match_id)
    }

    pub fn get_match_feedbacks(&self, user_id: Uuid, match_id: Uuid) -> AppResult<Vec<MatchFeedback>> {
        let m = self.load_match(match_id)?;
        m.require_participant(user_id)?;
        self.stores.matches.feedbacks_for_match(match_id)
    }

    /// Admin view: any match of the admin's own organisation.
    pub fn admin_get_match_feedbacks(&self, organisation_id: Uuid, match_id: Uuid) -> AppResult<Vec<MatchFeedback>> {
        let m = self.load_match(match_id)?;
        if m.organisation_id != organisation_id {
            return Err(AppError::new(
                ErrorCode::UnauthorizedMatch,
                "match belongs to another organisation",
            ));
        }
        self.stores.matches.feedbacks_for_match(match_id)
    }

    /// Waiting-for-feedback matches this user still owes feedback on.
    pub fn get_matches_pending_feedback(&self, user_id: Uuid) -> AppResult<Vec<Match>> {
        let mut pending = Vec::new();
        for m in self.stores.matches.matches_for_user(user_id)? {
            if m.status == MatchStatus::WaitingForFeedback && !self.stores.matches.has_feedback(m.id, user_id)? {
                pending.push(m);
            }
        }
        Ok(pending)
    }
}
