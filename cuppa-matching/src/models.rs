use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use cuppa_shared::types::auth::AccountType;

use crate::matching::lifecycle::MatchStatus;
use crate::matching::slot::MeetingSlot;

/// Free-form per-match availability, e.g. `{"Monday": ["morning"], "2025-02-18": ["09:30"]}`.
pub type Availability = BTreeMap<String, Vec<String>>;

// --- User (owned by the user directory, read-only here) ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: Uuid,
    pub organisation_id: Option<Uuid>,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub account_type: AccountType,
    pub is_confirmed: bool,
    pub tags: BTreeSet<String>,
    pub average_rating: Option<f64>,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }

    pub fn is_admin(&self) -> bool {
        self.account_type == AccountType::Admin
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Organisation {
    pub id: Uuid,
    pub name: String,
}

// --- Match ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Match {
    pub id: Uuid,
    pub organisation_id: Uuid,
    pub user1_id: Uuid,
    pub user2_id: Uuid,
    pub match_score: f64,
    pub status: MatchStatus,
    pub user1_accepted: bool,
    pub user2_accepted: bool,
    pub user1_accepted_at: Option<DateTime<Utc>>,
    pub user2_accepted_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub scheduled_date: NaiveDate,
    pub scheduled_time: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewMatch {
    pub organisation_id: Uuid,
    pub user1_id: Uuid,
    pub user2_id: Uuid,
    pub match_score: f64,
    pub slot: MeetingSlot,
}

impl NewMatch {
    /// Materialise a pending match row with a fresh id.
    pub fn into_match(self, now: DateTime<Utc>) -> Match {
        Match {
            id: Uuid::now_v7(),
            organisation_id: self.organisation_id,
            user1_id: self.user1_id,
            user2_id: self.user2_id,
            match_score: self.match_score,
            status: MatchStatus::Pending,
            user1_accepted: false,
            user2_accepted: false,
            user1_accepted_at: None,
            user2_accepted_at: None,
            expires_at: None,
            scheduled_date: self.slot.date,
            scheduled_time: self.slot.time.to_string(),
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MatchAvailability {
    pub id: Uuid,
    pub match_id: Uuid,
    pub user_id: Uuid,
    pub availability: Availability,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MatchFeedback {
    pub id: Uuid,
    pub match_id: Uuid,
    pub user_id: Uuid,
    pub rating: i16,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewMatchFeedback {
    pub match_id: Uuid,
    pub user_id: Uuid,
    pub rating: i16,
    pub comment: String,
}
