use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use uuid::Uuid;

use cuppa_shared::errors::{AppError, AppResult, ErrorCode};

use super::{
    AvailabilityStore, HealthProbe, MatchHistoryStore, MatchStore, OrganisationStore, RecordedFeedback, UserDirectory,
};
use crate::matching::availability::AvailabilityGrid;
use crate::matching::history::{MatchHistory, PairKey};
use crate::models::{
    Availability, Match, MatchAvailability, MatchFeedback, NewMatch, NewMatchFeedback, Organisation, User,
};

#[derive(Default)]
struct Inner {
    organisations: Vec<Organisation>,
    users: Vec<User>,
    grids: HashMap<Uuid, AvailabilityGrid>,
    history: Vec<MatchHistory>,
    matches: Vec<Match>,
    availabilities: Vec<MatchAvailability>,
    feedbacks: Vec<MatchFeedback>,
}

impl Inner {
    fn occupied(&self, user_id: Uuid) -> bool {
        self.matches
            .iter()
            .any(|m| m.status.is_non_terminal() && (m.user1_id == user_id || m.user2_id == user_id))
    }

    fn ledger_has(&self, key: PairKey) -> bool {
        self.history.iter().any(|h| h.key() == key)
    }

    fn match_mut(&mut self, id: Uuid) -> AppResult<&mut Match> {
        self.matches
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or_else(|| AppError::new(ErrorCode::MatchNotFound, "match not found"))
    }

    fn newest_first<'a>(&self, matches: impl Iterator<Item = &'a Match>) -> Vec<Match> {
        let mut found: Vec<Match> = matches.cloned().collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        found
    }
}

/// Every store seam over process memory. One mutex guards all of it, which
/// also makes `create_match` and the match transitions atomic.
#[derive(Default)]
pub struct InMemoryStore {
    inner: Mutex<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_organisation(&self, org: Organisation) {
        self.inner.lock().organisations.push(org);
    }

    pub fn insert_user(&self, user: User) {
        let mut inner = self.inner.lock();
        inner.users.retain(|u| u.id != user.id);
        inner.users.push(user);
    }

    pub fn insert_grid(&self, user_id: Uuid, grid: AvailabilityGrid) {
        self.inner.lock().grids.insert(user_id, grid);
    }

    pub fn match_count(&self) -> usize {
        self.inner.lock().matches.len()
    }

    pub fn history_len(&self) -> usize {
        self.inner.lock().history.len()
    }
}

impl UserDirectory for InMemoryStore {
    fn users_in_organisation(&self, org: Uuid) -> AppResult<Vec<User>> {
        Ok(self
            .inner
            .lock()
            .users
            .iter()
            .filter(|u| u.organisation_id == Some(org))
            .cloned()
            .collect())
    }

    fn user_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        Ok(self.inner.lock().users.iter().find(|u| u.id == id).cloned())
    }

    fn update_user(&self, user: &User) -> AppResult<()> {
        let mut inner = self.inner.lock();
        let existing = inner
            .users
            .iter_mut()
            .find(|u| u.id == user.id)
            .ok_or_else(|| AppError::not_found("user not found"))?;
        *existing = user.clone();
        Ok(())
    }
}

impl OrganisationStore for InMemoryStore {
    fn list_organisations(&self) -> AppResult<Vec<Organisation>> {
        Ok(self.inner.lock().organisations.clone())
    }

    fn organisation_by_id(&self, id: Uuid) -> AppResult<Option<Organisation>> {
        Ok(self.inner.lock().organisations.iter().find(|o| o.id == id).cloned())
    }
}

impl AvailabilityStore for InMemoryStore {
    fn grid_for_user(&self, user_id: Uuid) -> AppResult<Option<AvailabilityGrid>> {
        Ok(self.inner.lock().grids.get(&user_id).copied())
    }

    fn grids_for_users(&self, user_ids: &[Uuid]) -> AppResult<HashMap<Uuid, AvailabilityGrid>> {
        let inner = self.inner.lock();
        Ok(user_ids
            .iter()
            .filter_map(|id| inner.grids.get(id).map(|g| (*id, *g)))
            .collect())
    }

    fn create_grid(&self, user_id: Uuid, grid: AvailabilityGrid) -> AppResult<()> {
        let mut inner = self.inner.lock();
        if inner.grids.contains_key(&user_id) {
            return Err(AppError::new(
                ErrorCode::ConfigAlreadyExists,
                "availability configuration already exists",
            ));
        }
        inner.grids.insert(user_id, grid);
        Ok(())
    }

    fn update_grid(&self, user_id: Uuid, grid: AvailabilityGrid) -> AppResult<()> {
        let mut inner = self.inner.lock();
        match inner.grids.get_mut(&user_id) {
            Some(existing) => {
                *existing = grid;
                Ok(())
            }
            None => Err(AppError::new(ErrorCode::ConfigNotFound, "availability configuration not found")),
        }
    }

    fn delete_grid(&self, user_id: Uuid) -> AppResult<bool> {
        Ok(self.inner.lock().grids.remove(&user_id).is_some())
    }

    fn grid_exists(&self, user_id: Uuid) -> AppResult<bool> {
        Ok(self.inner.lock().grids.contains_key(&user_id))
    }
}

impl MatchHistoryStore for InMemoryStore {
    fn was_ever_matched(&self, a: Uuid, b: Uuid) -> AppResult<bool> {
        Ok(self.inner.lock().ledger_has(PairKey::new(a, b)))
    }

    fn matched_pairs_among(&self, user_ids: &[Uuid]) -> AppResult<HashSet<PairKey>> {
        let wanted: HashSet<&Uuid> = user_ids.iter().collect();
        Ok(self
            .inner
            .lock()
            .history
            .iter()
            .filter(|h| wanted.contains(&h.user1_id) && wanted.contains(&h.user2_id))
            .map(MatchHistory::key)
            .collect())
    }
}

impl MatchStore for InMemoryStore {
    fn create_match(&self, new_match: NewMatch) -> AppResult<Match> {
        let mut inner = self.inner.lock();
        if inner.occupied(new_match.user1_id) || inner.occupied(new_match.user2_id) {
            return Err(AppError::new(ErrorCode::AlreadyInMatch, "user already has an active match"));
        }
        if inner.ledger_has(PairKey::new(new_match.user1_id, new_match.user2_id)) {
            return Err(AppError::new(ErrorCode::PairAlreadyMatched, "users were already matched"));
        }

        let now = Utc::now();
        let created = new_match.into_match(now);
        inner.history.push(MatchHistory {
            id: Uuid::now_v7(),
            user1_id: created.user1_id,
            user2_id: created.user2_id,
            matched_at: now,
        });
        inner.matches.push(created.clone());
        Ok(created)
    }

    fn transition_match(&self, id: Uuid, change: &mut dyn FnMut(&mut Match) -> AppResult<()>) -> AppResult<Match> {
        let mut inner = self.inner.lock();
        let stored = inner.match_mut(id)?;
        let mut next = stored.clone();
        change(&mut next)?;
        *stored = next.clone();
        Ok(next)
    }

    fn match_by_id(&self, id: Uuid) -> AppResult<Option<Match>> {
        Ok(self.inner.lock().matches.iter().find(|m| m.id == id).cloned())
    }

    fn current_match_for_user(&self, user_id: Uuid) -> AppResult<Option<Match>> {
        let inner = self.inner.lock();
        let current = inner.newest_first(
            inner
                .matches
                .iter()
                .filter(|m| m.status.is_non_terminal() && m.participant(user_id).is_some()),
        );
        Ok(current.into_iter().next())
    }

    fn matches_for_organisation(&self, org: Uuid) -> AppResult<Vec<Match>> {
        let inner = self.inner.lock();
        Ok(inner.newest_first(inner.matches.iter().filter(|m| m.organisation_id == org)))
    }

    fn matches_for_user(&self, user_id: Uuid) -> AppResult<Vec<Match>> {
        let inner = self.inner.lock();
        Ok(inner.newest_first(inner.matches.iter().filter(|m| m.participant(user_id).is_some())))
    }

    fn has_non_terminal_match(&self, user_id: Uuid) -> AppResult<bool> {
        Ok(self.inner.lock().occupied(user_id))
    }

    fn availability_for(&self, match_id: Uuid, user_id: Uuid) -> AppResult<Option<MatchAvailability>> {
        Ok(self
            .inner
            .lock()
            .availabilities
            .iter()
            .find(|a| a.match_id == match_id && a.user_id == user_id)
            .cloned())
    }

    fn upsert_availability(
        &self,
        match_id: Uuid,
        user_id: Uuid,
        availability: Availability,
    ) -> AppResult<MatchAvailability> {
        let mut inner = self.inner.lock();
        let now = Utc::now();
        if let Some(existing) = inner
            .availabilities
            .iter_mut()
            .find(|a| a.match_id == match_id && a.user_id == user_id)
        {
            existing.availability = availability;
            existing.updated_at = now;
            return Ok(existing.clone());
        }

        let created = MatchAvailability {
            id: Uuid::now_v7(),
            match_id,
            user_id,
            availability,
            created_at: now,
            updated_at: now,
        };
        inner.availabilities.push(created.clone());
        Ok(created)
    }

    fn availabilities_for_match(&self, match_id: Uuid) -> AppResult<Vec<MatchAvailability>> {
        Ok(self
            .inner
            .lock()
            .availabilities
            .iter()
            .filter(|a| a.match_id == match_id)
            .cloned()
            .collect())
    }

    fn has_feedback(&self, match_id: Uuid, user_id: Uuid) -> AppResult<bool> {
        Ok(self
            .inner
            .lock()
            .feedbacks
            .iter()
            .any(|f| f.match_id == match_id && f.user_id == user_id))
    }

    fn record_feedback(&self, feedback: NewMatchFeedback, now: DateTime<Utc>) -> AppResult<RecordedFeedback> {
        let mut inner = self.inner.lock();
        let m = inner.match_mut(feedback.match_id)?;
        m.require_participant(feedback.user_id)?;
        m.ensure_accepting_feedback()?;
        if inner
            .feedbacks
            .iter()
            .any(|f| f.match_id == feedback.match_id && f.user_id == feedback.user_id)
        {
            return Err(AppError::new(
                ErrorCode::FeedbackAlreadyExists,
                "feedback already submitted for this match",
            ));
        }

        let created = MatchFeedback {
            id: Uuid::now_v7(),
            match_id: feedback.match_id,
            user_id: feedback.user_id,
            rating: feedback.rating,
            comment: feedback.comment,
            created_at: now,
        };
        inner.feedbacks.push(created.clone());

        let count = inner.feedbacks.iter().filter(|f| f.match_id == created.match_id).count();
        let completed = if count >= 2 {
            let m = inner.match_mut(created.match_id)?;
            m.complete(now);
            Some(m.clone())
        } else {
            None
        };
        Ok(RecordedFeedback {
            feedback: created,
            completed,
        })
    }

    fn feedbacks_for_match(&self, match_id: Uuid) -> AppResult<Vec<MatchFeedback>> {
        Ok(self
            .inner
            .lock()
            .feedbacks
            .iter()
            .filter(|f| f.match_id == match_id)
            .cloned()
            .collect())
    }

    fn count_feedbacks(&self, match_id: Uuid) -> AppResult<usize> {
        Ok(self.inner.lock().feedbacks.iter().filter(|f| f.match_id == match_id).count())
    }

    fn ratings_received_by(&self, user_id: Uuid) -> AppResult<Vec<i16>> {
        let inner = self.inner.lock();
        let own_matches: HashSet<Uuid> = inner
            .matches
            .iter()
            .filter(|m| m.participant(user_id).is_some())
            .map(|m| m.id)
            .collect();
        Ok(inner
            .feedbacks
            .iter()
            .filter(|f| own_matches.contains(&f.match_id) && f.user_id != user_id)
            .map(|f| f.rating)
            .collect())
    }
}

impl HealthProbe for InMemoryStore {
    fn ping(&self) -> AppResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::lifecycle::MatchStatus;
    use crate::test_support::new_match;

    #[test]
    fn create_match_writes_ledger_row() {
        let store = InMemoryStore::new();
        let (org, a, b) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

        let created = store.create_match(new_match(org, a, b)).unwrap();

        assert_eq!(created.status, MatchStatus::Pending);
        assert!(store.was_ever_matched(b, a).unwrap());
        assert!(store.has_non_terminal_match(a).unwrap());
        assert_eq!(store.current_match_for_user(b).unwrap().map(|m| m.id), Some(created.id));
    }

    #[test]
    fn create_match_refuses_busy_participant() {
        let store = InMemoryStore::new();
        let (org, a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        store.create_match(new_match(org, a, b)).unwrap();

        let err = store.create_match(new_match(org, c, b)).unwrap_err();
        assert!(err.is(ErrorCode::AlreadyInMatch));
        assert_eq!(store.match_count(), 1);
        assert_eq!(store.history_len(), 1);
    }

    #[test]
    fn create_match_refuses_ledger_pair_after_termination() {
        let store = InMemoryStore::new();
        let (org, a, b) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let first = store.create_match(new_match(org, a, b)).unwrap();
        store.transition_match(first.id, &mut |m| m.reject(a, Utc::now())).unwrap();

        let err = store.create_match(new_match(org, b, a)).unwrap_err();
        assert!(err.is(ErrorCode::PairAlreadyMatched));
    }

    #[test]
    fn concurrent_creates_leave_one_active_match_per_user() {
        let store = std::sync::Arc::new(InMemoryStore::new());
        let org = Uuid::new_v4();
        let seed = Uuid::new_v4();
        let partners: Vec<Uuid> = (0..8).map(|_| Uuid::new_v4()).collect();

        let handles: Vec<_> = partners
            .iter()
            .map(|p| {
                let store = store.clone();
                let p = *p;
                std::thread::spawn(move || store.create_match(new_match(org, seed, p)).is_ok())
            })
            .collect();
        let created = handles.into_iter().filter_map(|h| h.join().ok()).filter(|ok| *ok).count();
        assert_eq!(created, 1);
        assert_eq!(store.match_count(), 1);
    }

    /// A pending match between two fresh users, accepted by both.
    fn waiting_match(store: &InMemoryStore) -> Match {
        let (org, a, b) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let created = store.create_match(new_match(org, a, b)).unwrap();
        store
            .transition_match(created.id, &mut |m| {
                m.accept(a, Utc::now())?;
                m.accept(b, Utc::now()).map(|_| ())
            })
            .unwrap()
    }

    fn feedback_from(m: &Match, user_id: Uuid) -> NewMatchFeedback {
        NewMatchFeedback {
            match_id: m.id,
            user_id,
            rating: 4,
            comment: "great chat".into(),
        }
    }

    #[test]
    fn failed_transition_leaves_match_untouched() {
        let store = InMemoryStore::new();
        let (org, a, b) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let created = store.create_match(new_match(org, a, b)).unwrap();
        store.transition_match(created.id, &mut |m| m.reject(b, Utc::now())).unwrap();

        let err = store
            .transition_match(created.id, &mut |m| m.accept(a, Utc::now()).map(|_| ()))
            .unwrap_err();
        assert!(err.is(ErrorCode::MatchClosed));
        let stored = store.match_by_id(created.id).unwrap().unwrap();
        assert_eq!(stored.status, MatchStatus::Rejected);
        assert!(!stored.user1_accepted);

        let missing = store.transition_match(Uuid::new_v4(), &mut |_| Ok(())).unwrap_err();
        assert!(missing.is(ErrorCode::MatchNotFound));
    }

    #[test]
    fn duplicate_feedback_is_rejected() {
        let store = InMemoryStore::new();
        let m = waiting_match(&store);

        let first = store.record_feedback(feedback_from(&m, m.user1_id), Utc::now()).unwrap();
        assert!(first.completed.is_none());
        let err = store.record_feedback(feedback_from(&m, m.user1_id), Utc::now()).unwrap_err();
        assert!(err.is(ErrorCode::FeedbackAlreadyExists));
        assert_eq!(store.count_feedbacks(m.id).unwrap(), 1);
    }

    #[test]
    fn second_feedback_completes_in_the_same_write() {
        let store = InMemoryStore::new();
        let m = waiting_match(&store);
        store.record_feedback(feedback_from(&m, m.user1_id), Utc::now()).unwrap();

        let second = store.record_feedback(feedback_from(&m, m.user2_id), Utc::now()).unwrap();

        let completed = second.completed.unwrap();
        assert_eq!(completed.status, MatchStatus::Completed);
        assert_eq!(store.match_by_id(m.id).unwrap().unwrap().status, MatchStatus::Completed);
        assert!(!store.has_non_terminal_match(m.user1_id).unwrap());
    }

    #[test]
    fn feedback_requires_a_waiting_match_and_a_participant() {
        let store = InMemoryStore::new();
        let (org, a, b) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let pending = store.create_match(new_match(org, a, b)).unwrap();

        let err = store.record_feedback(feedback_from(&pending, a), Utc::now()).unwrap_err();
        assert!(err.is(ErrorCode::MatchNotAccepted));

        let waiting = waiting_match(&store);
        let err = store.record_feedback(feedback_from(&waiting, a), Utc::now()).unwrap_err();
        assert!(err.is(ErrorCode::UnauthorizedMatch));
        assert_eq!(store.count_feedbacks(waiting.id).unwrap(), 0);
    }

    #[test]
    fn racing_second_feedbacks_complete_exactly_once() {
        for _ in 0..50 {
            let store = std::sync::Arc::new(InMemoryStore::new());
            let m = waiting_match(&store);
            let barrier = std::sync::Arc::new(std::sync::Barrier::new(2));

            let handles: Vec<_> = [m.user1_id, m.user2_id]
                .into_iter()
                .map(|user_id| {
                    let (store, barrier, m) = (store.clone(), barrier.clone(), m.clone());
                    std::thread::spawn(move || {
                        barrier.wait();
                        store.record_feedback(feedback_from(&m, user_id), Utc::now())
                    })
                })
                .collect();
            let results: Vec<RecordedFeedback> = handles
                .into_iter()
                .map(|h| h.join().unwrap().unwrap())
                .collect();

            assert_eq!(results.iter().filter(|r| r.completed.is_some()).count(), 1);
            assert_eq!(store.match_by_id(m.id).unwrap().unwrap().status, MatchStatus::Completed);
        }
    }

    #[test]
    fn racing_accept_and_reject_never_resurrects_the_match() {
        for _ in 0..50 {
            let store = std::sync::Arc::new(InMemoryStore::new());
            let (org, a, b) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
            let id = store.create_match(new_match(org, a, b)).unwrap().id;
            let barrier = std::sync::Arc::new(std::sync::Barrier::new(2));

            let accepter = {
                let (store, barrier) = (store.clone(), barrier.clone());
                std::thread::spawn(move || {
                    barrier.wait();
                    store.transition_match(id, &mut |m| m.accept(a, Utc::now()).map(|_| ()))
                })
            };
            let rejecter = {
                let (store, barrier) = (store.clone(), barrier.clone());
                std::thread::spawn(move || {
                    barrier.wait();
                    store.transition_match(id, &mut |m| m.reject(b, Utc::now()))
                })
            };
            let accepted = accepter.join().unwrap();
            assert!(rejecter.join().unwrap().is_ok());

            let stored = store.match_by_id(id).unwrap().unwrap();
            assert_eq!(stored.status, MatchStatus::Rejected);
            // an accept that lost the race is refused, one that won is kept
            match accepted {
                Ok(_) => assert!(stored.user1_accepted),
                Err(e) => {
                    assert!(e.is(ErrorCode::MatchClosed));
                    assert!(!stored.user1_accepted);
                }
            }
        }
    }

    #[test]
    fn upsert_availability_overwrites() {
        let store = InMemoryStore::new();
        let (match_id, user_id) = (Uuid::new_v4(), Uuid::new_v4());
        let mut first = Availability::new();
        first.insert("Monday".into(), vec!["morning".into()]);
        let mut second = Availability::new();
        second.insert("Friday".into(), vec!["afternoon".into()]);

        let a = store.upsert_availability(match_id, user_id, first).unwrap();
        let b = store.upsert_availability(match_id, user_id, second.clone()).unwrap();

        assert_eq!(a.id, b.id);
        assert_eq!(store.availabilities_for_match(match_id).unwrap().len(), 1);
        assert_eq!(store.availability_for(match_id, user_id).unwrap().unwrap().availability, second);
    }
}
