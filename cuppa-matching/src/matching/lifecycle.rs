use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use cuppa_shared::errors::{AppError, AppResult, ErrorCode};

use crate::models::Match;

/// How long both participants have to leave feedback once they both accepted.
pub const FEEDBACK_WINDOW_DAYS: i64 = 5;

pub const MIN_RATING: i32 = 1;
pub const MAX_RATING: i32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Pending,
    WaitingForFeedback,
    Rejected,
    Completed,
    Expired,
}

impl MatchStatus {
    pub const NON_TERMINAL: [MatchStatus; 2] = [MatchStatus::Pending, MatchStatus::WaitingForFeedback];

    pub fn as_str(self) -> &'static str {
        match self {
            MatchStatus::Pending => "pending",
            MatchStatus::WaitingForFeedback => "waiting_for_feedback",
            MatchStatus::Rejected => "rejected",
            MatchStatus::Completed => "completed",
            MatchStatus::Expired => "expired",
        }
    }

    /// Pending and waiting-for-feedback matches occupy both participants.
    pub fn is_non_terminal(self) -> bool {
        Self::NON_TERMINAL.contains(&self)
    }
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MatchStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(MatchStatus::Pending),
            "waiting_for_feedback" => Ok(MatchStatus::WaitingForFeedback),
            "rejected" => Ok(MatchStatus::Rejected),
            "completed" => Ok(MatchStatus::Completed),
            "expired" => Ok(MatchStatus::Expired),
            other => Err(format!("unknown match status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Participant {
    User1,
    User2,
}

/// What an acceptance did to the match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acceptance {
    /// Recorded; still waiting on the partner.
    Recorded,
    /// Both have now accepted; the feedback window opened.
    BothAccepted,
}

fn not_participant() -> AppError {
    AppError::new(ErrorCode::UnauthorizedMatch, "unauthorized to modify this match")
}

fn closed(status: MatchStatus) -> AppError {
    AppError::new(ErrorCode::MatchClosed, format!("match is already {status}"))
}

pub fn validate_rating(rating: i32) -> AppResult<i16> {
    if !(MIN_RATING..=MAX_RATING).contains(&rating) {
        return Err(AppError::new(ErrorCode::InvalidRating, "rating must be between 1 and 5"));
    }
    i16::try_from(rating).map_err(|_| AppError::new(ErrorCode::InvalidRating, "rating must be between 1 and 5"))
}

impl Match {
    pub fn participant(&self, user_id: Uuid) -> Option<Participant> {
        if self.user1_id == user_id {
            Some(Participant::User1)
        } else if self.user2_id == user_id {
            Some(Participant::User2)
        } else {
            None
        }
    }

    pub fn require_participant(&self, user_id: Uuid) -> AppResult<Participant> {
        self.participant(user_id).ok_or_else(not_participant)
    }

    pub fn partner_of(&self, user_id: Uuid) -> Option<Uuid> {
        match self.participant(user_id)? {
            Participant::User1 => Some(self.user2_id),
            Participant::User2 => Some(self.user1_id),
        }
    }

    pub fn both_accepted(&self) -> bool {
        self.user1_accepted && self.user2_accepted
    }

    /// Marks `user_id` as accepted at `now`.
    ///
    /// Re-accepting only refreshes the timestamp. The second distinct
    /// acceptance of a pending match moves it to waiting-for-feedback with a
    /// five day expiry.
    pub fn accept(&mut self, user_id: Uuid, now: DateTime<Utc>) -> AppResult<Acceptance> {
        let who = self.require_participant(user_id)?;
        if !self.status.is_non_terminal() {
            return Err(closed(self.status));
        }

        match who {
            Participant::User1 => {
                self.user1_accepted = true;
                self.user1_accepted_at = Some(now);
            }
            Participant::User2 => {
                self.user2_accepted = true;
                self.user2_accepted_at = Some(now);
            }
        }
        self.updated_at = now;

        if self.status == MatchStatus::Pending && self.both_accepted() {
            self.status = MatchStatus::WaitingForFeedback;
            self.expires_at = Some(now + Duration::days(FEEDBACK_WINDOW_DAYS));
            return Ok(Acceptance::BothAccepted);
        }
        Ok(Acceptance::Recorded)
    }

    /// A single rejection voids the match for both, whatever was accepted.
    pub fn reject(&mut self, user_id: Uuid, now: DateTime<Utc>) -> AppResult<()> {
        self.require_participant(user_id)?;
        if matches!(self.status, MatchStatus::Completed | MatchStatus::Expired) {
            return Err(closed(self.status));
        }
        self.status = MatchStatus::Rejected;
        self.updated_at = now;
        Ok(())
    }

    pub fn ensure_accepting_feedback(&self) -> AppResult<()> {
        if self.status != MatchStatus::WaitingForFeedback {
            return Err(AppError::new(
                ErrorCode::MatchNotAccepted,
                "can only provide feedback for accepted matches",
            ));
        }
        Ok(())
    }

    pub fn complete(&mut self, now: DateTime<Utc>) {
        self.status = MatchStatus::Completed;
        self.updated_at = now;
    }

    /// Status as callers should see it: a waiting-for-feedback match past its
    /// expiry reads as expired even though nothing rewrote the row.
    pub fn effective_status(&self, now: DateTime<Utc>) -> MatchStatus {
        match (self.status, self.expires_at) {
            (MatchStatus::WaitingForFeedback, Some(expires_at)) if expires_at <= now => MatchStatus::Expired,
            (status, _) => status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::pending_match;

    #[test]
    fn status_round_trips_through_strings() {
        for status in [
            MatchStatus::Pending,
            MatchStatus::WaitingForFeedback,
            MatchStatus::Rejected,
            MatchStatus::Completed,
            MatchStatus::Expired,
        ] {
            assert_eq!(status.as_str().parse::<MatchStatus>().unwrap(), status);
        }
        assert!("accepted".parse::<MatchStatus>().is_err());
    }

    #[test]
    fn outsider_cannot_accept_or_reject() {
        let mut m = pending_match(Uuid::new_v4(), Uuid::new_v4());
        let outsider = Uuid::new_v4();
        assert!(m.accept(outsider, Utc::now()).unwrap_err().is(ErrorCode::UnauthorizedMatch));
        assert!(m.reject(outsider, Utc::now()).unwrap_err().is(ErrorCode::UnauthorizedMatch));
        assert_eq!(m.status, MatchStatus::Pending);
    }

    #[test]
    fn both_acceptances_open_feedback_window() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let mut m = pending_match(a, b);
        let t0 = Utc::now();

        assert_eq!(m.accept(a, t0).unwrap(), Acceptance::Recorded);
        assert_eq!(m.status, MatchStatus::Pending);
        assert!(m.expires_at.is_none());

        let t1 = t0 + Duration::hours(2);
        assert_eq!(m.accept(b, t1).unwrap(), Acceptance::BothAccepted);
        assert_eq!(m.status, MatchStatus::WaitingForFeedback);
        assert_eq!(m.expires_at, Some(t1 + Duration::days(5)));
    }

    #[test]
    fn re_accept_refreshes_timestamp_only() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let mut m = pending_match(a, b);
        let t0 = Utc::now();
        m.accept(a, t0).unwrap();
        let t1 = t0 + Duration::minutes(10);
        assert_eq!(m.accept(a, t1).unwrap(), Acceptance::Recorded);

        assert_eq!(m.user1_accepted_at, Some(t1));
        assert!(!m.user2_accepted);
        assert_eq!(m.status, MatchStatus::Pending);

        m.accept(b, t1).unwrap();
        let expiry = m.expires_at;
        // a late re-accept must not push the feedback deadline
        assert_eq!(m.accept(a, t1 + Duration::days(1)).unwrap(), Acceptance::Recorded);
        assert_eq!(m.expires_at, expiry);
    }

    #[test]
    fn rejection_is_unconditional_and_final() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let mut m = pending_match(a, b);
        m.accept(a, Utc::now()).unwrap();
        m.reject(b, Utc::now()).unwrap();
        assert_eq!(m.status, MatchStatus::Rejected);

        assert!(m.accept(a, Utc::now()).unwrap_err().is(ErrorCode::MatchClosed));
        assert!(m.reject(a, Utc::now()).is_ok());
        assert_eq!(m.status, MatchStatus::Rejected);
    }

    #[test]
    fn completed_match_cannot_be_rejected() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let mut m = pending_match(a, b);
        m.complete(Utc::now());
        assert!(m.reject(a, Utc::now()).unwrap_err().is(ErrorCode::MatchClosed));
    }

    #[test]
    fn feedback_needs_waiting_status() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let mut m = pending_match(a, b);
        m.accept(a, Utc::now()).unwrap();
        assert!(m.ensure_accepting_feedback().unwrap_err().is(ErrorCode::MatchNotAccepted));
        m.accept(b, Utc::now()).unwrap();
        assert!(m.ensure_accepting_feedback().is_ok());
    }

    #[test]
    fn rating_bounds() {
        assert!(validate_rating(0).unwrap_err().is(ErrorCode::InvalidRating));
        assert!(validate_rating(6).unwrap_err().is(ErrorCode::InvalidRating));
        assert_eq!(validate_rating(1).unwrap(), 1);
        assert_eq!(validate_rating(5).unwrap(), 5);
    }

    #[test]
    fn overdue_waiting_match_reads_as_expired() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let mut m = pending_match(a, b);
        let t0 = Utc::now();
        m.accept(a, t0).unwrap();
        m.accept(b, t0).unwrap();

        assert_eq!(m.effective_status(t0 + Duration::days(4)), MatchStatus::WaitingForFeedback);
        assert_eq!(m.effective_status(t0 + Duration::days(6)), MatchStatus::Expired);
        assert_eq!(m.status, MatchStatus::WaitingForFeedback);
    }

    #[test]
    fn partner_lookup() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let m = pending_match(a, b);
        assert_eq!(m.partner_of(a), Some(b));
        assert_eq!(m.partner_of(b), Some(a));
        assert_eq!(m.partner_of(Uuid::new_v4()), None);
    }
}
