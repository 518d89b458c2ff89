//! Diesel row shapes and their conversion to domain types.

use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use cuppa_shared::errors::{AppError, AppResult};

use crate::matching::availability::AvailabilityGrid;
use crate::models::{Availability, Match, MatchAvailability, MatchFeedback, Organisation, User};
use crate::schema::{
    match_availabilities, match_feedbacks, match_histories, matches, organisations, user_availability_configs,
    users,
};

// --- Organisation / User ---

#[derive(Debug, Queryable, Selectable)]
#[diesel(table_name = organisations)]
pub struct OrganisationRow {
    pub id: Uuid,
    pub name: String,
}

impl From<OrganisationRow> for Organisation {
    fn from(row: OrganisationRow) -> Self {
        Self { id: row.id, name: row.name }
    }
}

#[derive(Debug, Queryable, Selectable)]
#[diesel(table_name = users)]
pub struct UserRow {
    pub id: Uuid,
    pub organisation_id: Option<Uuid>,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub account_type: String,
    pub is_confirmed: bool,
    pub average_rating: Option<f64>,
}

impl UserRow {
    pub fn into_user(self, tags: impl IntoIterator<Item = String>) -> AppResult<User> {
        let account_type = self
            .account_type
            .parse()
            .map_err(|e: String| AppError::internal(format!("user {}: {e}", self.id)))?;
        Ok(User {
            id: self.id,
            organisation_id: self.organisation_id,
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
            account_type,
            is_confirmed: self.is_confirmed,
            tags: tags.into_iter().collect(),
            average_rating: self.average_rating,
        })
    }
}

// --- Availability grid ---

#[derive(Debug, Queryable, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = user_availability_configs, primary_key(user_id))]
pub struct GridRow {
    pub user_id: Uuid,
    pub monday_morning: bool,
    pub monday_afternoon: bool,
    pub tuesday_morning: bool,
    pub tuesday_afternoon: bool,
    pub wednesday_morning: bool,
    pub wednesday_afternoon: bool,
    pub thursday_morning: bool,
    pub thursday_afternoon: bool,
    pub friday_morning: bool,
    pub friday_afternoon: bool,
    pub saturday_morning: bool,
    pub saturday_afternoon: bool,
    pub sunday_morning: bool,
    pub sunday_afternoon: bool,
}

impl GridRow {
    pub fn new(user_id: Uuid, grid: AvailabilityGrid) -> Self {
        let f = grid.flags();
        Self {
            user_id,
            monday_morning: f[0],
            monday_afternoon: f[1],
            tuesday_morning: f[2],
            tuesday_afternoon: f[3],
            wednesday_morning: f[4],
            wednesday_afternoon: f[5],
            thursday_morning: f[6],
            thursday_afternoon: f[7],
            friday_morning: f[8],
            friday_afternoon: f[9],
            saturday_morning: f[10],
            saturday_afternoon: f[11],
            sunday_morning: f[12],
            sunday_afternoon: f[13],
        }
    }

    pub fn grid(&self) -> AvailabilityGrid {
        AvailabilityGrid::from_flags([
            self.monday_morning,
            self.monday_afternoon,
            self.tuesday_morning,
            self.tuesday_afternoon,
            self.wednesday_morning,
            self.wednesday_afternoon,
            self.thursday_morning,
            self.thursday_afternoon,
            self.friday_morning,
            self.friday_afternoon,
            self.saturday_morning,
            self.saturday_afternoon,
            self.sunday_morning,
            self.sunday_afternoon,
        ])
    }
}

// --- Match ---

#[derive(Debug, Queryable, Selectable)]
#[diesel(table_name = matches)]
pub struct MatchRow {
    pub id: Uuid,
    pub organisation_id: Uuid,
    pub user1_id: Uuid,
    pub user2_id: Uuid,
    pub match_score: f64,
    pub status: String,
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

impl TryFrom<MatchRow> for Match {
    type Error = AppError;

    fn try_from(row: MatchRow) -> AppResult<Self> {
        let status = row
            .status
            .parse()
            .map_err(|e: String| AppError::internal(format!("match {}: {e}", row.id)))?;
        Ok(Match {
            id: row.id,
            organisation_id: row.organisation_id,
            user1_id: row.user1_id,
            user2_id: row.user2_id,
            match_score: row.match_score,
            status,
            user1_accepted: row.user1_accepted,
            user2_accepted: row.user2_accepted,
            user1_accepted_at: row.user1_accepted_at,
            user2_accepted_at: row.user2_accepted_at,
            expires_at: row.expires_at,
            scheduled_date: row.scheduled_date,
            scheduled_time: row.scheduled_time,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Insert shape; also used as the changeset for lifecycle updates.
#[derive(Debug, Insertable, AsChangeset)]
#[diesel(table_name = matches)]
#[diesel(treat_none_as_null = true)]
pub struct MatchWrite<'a> {
    pub id: Uuid,
    pub organisation_id: Uuid,
    pub user1_id: Uuid,
    pub user2_id: Uuid,
    pub match_score: f64,
    pub status: &'a str,
    pub user1_accepted: bool,
    pub user2_accepted: bool,
    pub user1_accepted_at: Option<DateTime<Utc>>,
    pub user2_accepted_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub scheduled_date: NaiveDate,
    pub scheduled_time: &'a str,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl<'a> From<&'a Match> for MatchWrite<'a> {
    fn from(m: &'a Match) -> Self {
        Self {
            id: m.id,
            organisation_id: m.organisation_id,
            user1_id: m.user1_id,
            user2_id: m.user2_id,
            match_score: m.match_score,
            status: m.status.as_str(),
            user1_accepted: m.user1_accepted,
            user2_accepted: m.user2_accepted,
            user1_accepted_at: m.user1_accepted_at,
            user2_accepted_at: m.user2_accepted_at,
            expires_at: m.expires_at,
            scheduled_date: m.scheduled_date,
            scheduled_time: &m.scheduled_time,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

// --- Ledger ---

#[derive(Debug, Queryable, Selectable, Insertable)]
#[diesel(table_name = match_histories)]
pub struct HistoryRow {
    pub id: Uuid,
    pub user1_id: Uuid,
    pub user2_id: Uuid,
    pub matched_at: DateTime<Utc>,
}

// --- Per-match availability / feedback ---

#[derive(Debug, Queryable, Selectable, Insertable)]
#[diesel(table_name = match_availabilities)]
pub struct AvailabilityRow {
    pub id: Uuid,
    pub match_id: Uuid,
    pub user_id: Uuid,
    pub availability: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<AvailabilityRow> for MatchAvailability {
    type Error = AppError;

    fn try_from(row: AvailabilityRow) -> AppResult<Self> {
        let availability: Availability = serde_json::from_value(row.availability)
            .map_err(|e| AppError::internal(format!("match availability {}: {e}", row.id)))?;
        Ok(MatchAvailability {
            id: row.id,
            match_id: row.match_id,
            user_id: row.user_id,
            availability,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, Queryable, Selectable, Insertable)]
#[diesel(table_name = match_feedbacks)]
pub struct FeedbackRow {
    pub id: Uuid,
    pub match_id: Uuid,
    pub user_id: Uuid,
    pub rating: i16,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

impl From<FeedbackRow> for MatchFeedback {
    fn from(row: FeedbackRow) -> Self {
        Self {
            id: row.id,
            match_id: row.match_id,
            user_id: row.user_id,
            rating: row.rating,
            comment: row.comment,
            created_at: row.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::availability::{Day, Period};

    #[test]
    fn grid_row_keeps_slot_positions() {
        let grid = AvailabilityGrid::default()
            .with(Day::Tuesday, Period::Afternoon)
            .with(Day::Sunday, Period::Morning);
        let row = GridRow::new(Uuid::new_v4(), grid);

        assert!(row.tuesday_afternoon);
        assert!(row.sunday_morning);
        assert!(!row.tuesday_morning);
        assert_eq!(row.grid(), grid);
    }

    #[test]
    fn unknown_status_is_an_internal_error() {
        let row = MatchRow {
            id: Uuid::new_v4(),
            organisation_id: Uuid::new_v4(),
            user1_id: Uuid::new_v4(),
            user2_id: Uuid::new_v4(),
            match_score: 10.0,
            status: "accepted".into(),
            user1_accepted: false,
            user2_accepted: false,
            user1_accepted_at: None,
            user2_accepted_at: None,
            expires_at: None,
            scheduled_date: NaiveDate::from_ymd_opt(2026, 10, 20).unwrap(),
            scheduled_time: "9 AM".into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(Match::try_from(row).is_err());
    }
}
