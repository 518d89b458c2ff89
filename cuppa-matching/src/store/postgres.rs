use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::upsert::excluded;
use uuid::Uuid;

use cuppa_shared::clients::db::{DbConnection, DbPool};
use cuppa_shared::errors::{AppError, AppResult, ErrorCode};

use super::rows::{
    AvailabilityRow, FeedbackRow, GridRow, HistoryRow, MatchRow, MatchWrite, OrganisationRow, UserRow,
};
use super::{
    AvailabilityStore, HealthProbe, MatchHistoryStore, MatchStore, OrganisationStore, RecordedFeedback, UserDirectory,
};
use crate::matching::availability::AvailabilityGrid;
use crate::matching::history::PairKey;
use crate::matching::lifecycle::MatchStatus;
use crate::models::{
    Availability, Match, MatchAvailability, MatchFeedback, NewMatch, NewMatchFeedback, Organisation, User,
};
use crate::schema::{
    match_availabilities, match_feedbacks, match_histories, matches, organisations, tags, user_availability_configs,
    user_tags, users,
};

fn non_terminal() -> [&'static str; 2] {
    MatchStatus::NON_TERMINAL.map(MatchStatus::as_str)
}

fn load_tags(conn: &mut PgConnection, user_ids: &[Uuid]) -> QueryResult<HashMap<Uuid, Vec<String>>> {
    let rows: Vec<(Uuid, String)> = user_tags::table
        .inner_join(tags::table)
        .filter(user_tags::user_id.eq_any(user_ids))
        .select((user_tags::user_id, tags::name))
        .load(conn)?;

    let mut by_user: HashMap<Uuid, Vec<String>> = HashMap::new();
    for (user_id, name) in rows {
        by_user.entry(user_id).or_default().push(name);
    }
    Ok(by_user)
}

fn ledger_has(conn: &mut PgConnection, a: Uuid, b: Uuid) -> QueryResult<bool> {
    let count: i64 = match_histories::table
        .filter(
            match_histories::user1_id
                .eq(a)
                .and(match_histories::user2_id.eq(b))
                .or(match_histories::user1_id.eq(b).and(match_histories::user2_id.eq(a))),
        )
        .count()
        .get_result(conn)?;
    Ok(count > 0)
}

/// Loads a live match and holds its row lock until the transaction ends.
fn lock_match(conn: &mut PgConnection, id: Uuid) -> AppResult<Match> {
    let row: Option<MatchRow> = matches::table
        .find(id)
        .filter(matches::deleted_at.is_null())
        .select(MatchRow::as_select())
        .for_update()
        .first(conn)
        .optional()?;
    row.map(Match::try_from)
        .transpose()?
        .ok_or_else(|| AppError::new(ErrorCode::MatchNotFound, "match not found"))
}

fn save_match(conn: &mut PgConnection, m: &Match) -> AppResult<()> {
    diesel::update(matches::table.find(m.id))
        .set(&MatchWrite::from(m))
        .execute(conn)?;
    Ok(())
}

fn into_matches(rows: Vec<MatchRow>) -> AppResult<Vec<Match>> {
    rows.into_iter().map(Match::try_from).collect()
}

/// Diesel-backed implementation of every store seam.
#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> AppResult<DbConnection> {
        self.pool.get().map_err(|e| AppError::internal(e.to_string()))
    }
}

impl HealthProbe for PgStore {
    fn ping(&self) -> AppResult<()> {
        let mut conn = self.conn()?;
        diesel::sql_query("SELECT 1").execute(&mut conn)?;
        Ok(())
    }
}

impl UserDirectory for PgStore {
    fn users_in_organisation(&self, org: Uuid) -> AppResult<Vec<User>> {
        let mut conn = self.conn()?;
        let rows: Vec<UserRow> = users::table
            .filter(users::organisation_id.eq(org))
            .order((users::created_at.asc(), users::id.asc()))
            .select(UserRow::as_select())
            .load(&mut conn)?;

        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let mut tags = load_tags(&mut conn, &ids)?;

        rows.into_iter()
            .map(|row| {
                let user_tags = tags.remove(&row.id).unwrap_or_default();
                row.into_user(user_tags)
            })
            .collect()
    }

    fn user_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        let mut conn = self.conn()?;
        let row: Option<UserRow> = users::table
            .find(id)
            .select(UserRow::as_select())
            .first(&mut conn)
            .optional()?;

        match row {
            Some(row) => {
                let mut tags = load_tags(&mut conn, &[id])?;
                row.into_user(tags.remove(&id).unwrap_or_default()).map(Some)
            }
            None => Ok(None),
        }
    }

    fn update_user(&self, user: &User) -> AppResult<()> {
        let mut conn = self.conn()?;
        let updated = diesel::update(users::table.find(user.id))
            .set(users::average_rating.eq(user.average_rating))
            .execute(&mut conn)?;
        if updated == 0 {
            return Err(AppError::not_found("user not found"));
        }
        Ok(())
    }
}

impl OrganisationStore for PgStore {
    fn list_organisations(&self) -> AppResult<Vec<Organisation>> {
        let mut conn = self.conn()?;
        let rows: Vec<OrganisationRow> = organisations::table
            .order(organisations::name.asc())
            .select(OrganisationRow::as_select())
            .load(&mut conn)?;
        Ok(rows.into_iter().map(Organisation::from).collect())
    }

    fn organisation_by_id(&self, id: Uuid) -> AppResult<Option<Organisation>> {
        let mut conn = self.conn()?;
        let row: Option<OrganisationRow> = organisations::table
            .find(id)
            .select(OrganisationRow::as_select())
            .first(&mut conn)
            .optional()?;
        Ok(row.map(Organisation::from))
    }
}

impl AvailabilityStore for PgStore {
    fn grid_for_user(&self, user_id: Uuid) -> AppResult<Option<AvailabilityGrid>> {
        let mut conn = self.conn()?;
        let row: Option<GridRow> = user_availability_configs::table
            .find(user_id)
            .select(GridRow::as_select())
            .first(&mut conn)
            .optional()?;
        Ok(row.map(|r| r.grid()))
    }

    fn grids_for_users(&self, user_ids: &[Uuid]) -> AppResult<HashMap<Uuid, AvailabilityGrid>> {
        let mut conn = self.conn()?;
        let rows: Vec<GridRow> = user_availability_configs::table
            .filter(user_availability_configs::user_id.eq_any(user_ids))
            .select(GridRow::as_select())
            .load(&mut conn)?;
        Ok(rows.into_iter().map(|r| (r.user_id, r.grid())).collect())
    }

    fn create_grid(&self, user_id: Uuid, grid: AvailabilityGrid) -> AppResult<()> {
        let mut conn = self.conn()?;
        let inserted = diesel::insert_into(user_availability_configs::table)
            .values(&GridRow::new(user_id, grid))
            .on_conflict_do_nothing()
            .execute(&mut conn)?;
        if inserted == 0 {
            return Err(AppError::new(
                ErrorCode::ConfigAlreadyExists,
                "availability configuration already exists",
            ));
        }
        Ok(())
    }

    fn update_grid(&self, user_id: Uuid, grid: AvailabilityGrid) -> AppResult<()> {
        let mut conn = self.conn()?;
        let updated = diesel::update(user_availability_configs::table.find(user_id))
            .set((
                &GridRow::new(user_id, grid),
                user_availability_configs::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)?;
        if updated == 0 {
            return Err(AppError::new(ErrorCode::ConfigNotFound, "availability configuration not found"));
        }
        Ok(())
    }

    fn delete_grid(&self, user_id: Uuid) -> AppResult<bool> {
        let mut conn = self.conn()?;
        let deleted = diesel::delete(user_availability_configs::table.find(user_id)).execute(&mut conn)?;
        Ok(deleted > 0)
    }

    fn grid_exists(&self, user_id: Uuid) -> AppResult<bool> {
        let mut conn = self.conn()?;
        let count: i64 = user_availability_configs::table
            .filter(user_availability_configs::user_id.eq(user_id))
            .count()
            .get_result(&mut conn)?;
        Ok(count > 0)
    }
}

impl MatchHistoryStore for PgStore {
    fn was_ever_matched(&self, a: Uuid, b: Uuid) -> AppResult<bool> {
        let mut conn = self.conn()?;
        Ok(ledger_has(&mut conn, a, b)?)
    }

    fn matched_pairs_among(&self, user_ids: &[Uuid]) -> AppResult<HashSet<PairKey>> {
        let mut conn = self.conn()?;
        let pairs: Vec<(Uuid, Uuid)> = match_histories::table
            .filter(match_histories::user1_id.eq_any(user_ids))
            .filter(match_histories::user2_id.eq_any(user_ids))
            .select((match_histories::user1_id, match_histories::user2_id))
            .load(&mut conn)?;
        Ok(pairs.into_iter().map(|(a, b)| PairKey::new(a, b)).collect())
    }
}

impl MatchStore for PgStore {
    fn create_match(&self, new_match: NewMatch) -> AppResult<Match> {
        let mut conn = self.conn()?;
        let created = new_match.into_match(Utc::now());

        // SERIALIZABLE so two writers that both read "free" cannot both commit.
        conn.build_transaction().serializable().run(|conn| {
            let participants = [created.user1_id, created.user2_id];
            let busy: i64 = matches::table
                .filter(matches::deleted_at.is_null())
                .filter(matches::status.eq_any(non_terminal()))
                .filter(
                    matches::user1_id
                        .eq_any(participants)
                        .or(matches::user2_id.eq_any(participants)),
                )
                .count()
                .get_result(conn)?;
            if busy > 0 {
                return Err(AppError::new(ErrorCode::AlreadyInMatch, "user already has an active match"));
            }
            if ledger_has(conn, created.user1_id, created.user2_id)? {
                return Err(AppError::new(ErrorCode::PairAlreadyMatched, "users were already matched"));
            }

            diesel::insert_into(matches::table)
                .values(MatchWrite::from(&created))
                .execute(conn)?;
            diesel::insert_into(match_histories::table)
                .values(HistoryRow {
                    id: Uuid::now_v7(),
                    user1_id: created.user1_id,
                    user2_id: created.user2_id,
                    matched_at: created.created_at,
                })
                .execute(conn)?;
            Ok::<_, AppError>(())
        })?;

        Ok(created)
    }

    fn transition_match(&self, id: Uuid, change: &mut dyn FnMut(&mut Match) -> AppResult<()>) -> AppResult<Match> {
        let mut conn = self.conn()?;
        conn.transaction(|conn| {
            let mut m = lock_match(conn, id)?;
            change(&mut m)?;
            save_match(conn, &m)?;
            Ok::<_, AppError>(m)
        })
    }

    fn match_by_id(&self, id: Uuid) -> AppResult<Option<Match>> {
        let mut conn = self.conn()?;
        let row: Option<MatchRow> = matches::table
            .find(id)
            .filter(matches::deleted_at.is_null())
            .select(MatchRow::as_select())
            .first(&mut conn)
            .optional()?;
        row.map(Match::try_from).transpose()
    }

    fn current_match_for_user(&self, user_id: Uuid) -> AppResult<Option<Match>> {
        let mut conn = self.conn()?;
        let row: Option<MatchRow> = matches::table
            .filter(matches::deleted_at.is_null())
            .filter(matches::status.eq_any(non_terminal()))
            .filter(matches::user1_id.eq(user_id).or(matches::user2_id.eq(user_id)))
            .order((matches::created_at.desc(), matches::id.desc()))
            .select(MatchRow::as_select())
            .first(&mut conn)
            .optional()?;
        row.map(Match::try_from).transpose()
    }

    fn matches_for_organisation(&self, org: Uuid) -> AppResult<Vec<Match>> {
        let mut conn = self.conn()?;
        let rows: Vec<MatchRow> = matches::table
            .filter(matches::deleted_at.is_null())
            .filter(matches::organisation_id.eq(org))
            .order((matches::created_at.desc(), matches::id.desc()))
            .select(MatchRow::as_select())
            .load(&mut conn)?;
        into_matches(rows)
    }

    fn matches_for_user(&self, user_id: Uuid) -> AppResult<Vec<Match>> {
        let mut conn = self.conn()?;
        let rows: Vec<MatchRow> = matches::table
            .filter(matches::deleted_at.is_null())
            .filter(matches::user1_id.eq(user_id).or(matches::user2_id.eq(user_id)))
            .order((matches::created_at.desc(), matches::id.desc()))
            .select(MatchRow::as_select())
            .load(&mut conn)?;
        into_matches(rows)
    }

    fn has_non_terminal_match(&self, user_id: Uuid) -> AppResult<bool> {
        let mut conn = self.conn()?;
        let count: i64 = matches::table
            .filter(matches::deleted_at.is_null())
            .filter(matches::status.eq_any(non_terminal()))
            .filter(matches::user1_id.eq(user_id).or(matches::user2_id.eq(user_id)))
            .count()
            .get_result(&mut conn)?;
        Ok(count > 0)
    }

    fn availability_for(&self, match_id: Uuid, user_id: Uuid) -> AppResult<Option<MatchAvailability>> {
        let mut conn = self.conn()?;
        let row: Option<AvailabilityRow> = match_availabilities::table
            .filter(match_availabilities::match_id.eq(match_id))
            .filter(match_availabilities::user_id.eq(user_id))
            .select(AvailabilityRow::as_select())
            .first(&mut conn)
            .optional()?;
        row.map(MatchAvailability::try_from).transpose()
    }

    fn upsert_availability(
        &self,
        match_id: Uuid,
        user_id: Uuid,
        availability: Availability,
    ) -> AppResult<MatchAvailability> {
        let mut conn = self.conn()?;
        let now = Utc::now();
        let value = serde_json::to_value(&availability).map_err(|e| AppError::internal(e.to_string()))?;

        let row: AvailabilityRow = diesel::insert_into(match_availabilities::table)
            .values(AvailabilityRow {
                id: Uuid::now_v7(),
                match_id,
                user_id,
                availability: value,
                created_at: now,
                updated_at: now,
            })
            .on_conflict((match_availabilities::match_id, match_availabilities::user_id))
            .do_update()
            .set((
                match_availabilities::availability.eq(excluded(match_availabilities::availability)),
                match_availabilities::updated_at.eq(excluded(match_availabilities::updated_at)),
            ))
            .get_result(&mut conn)?;
        row.try_into()
    }

    fn availabilities_for_match(&self, match_id: Uuid) -> AppResult<Vec<MatchAvailability>> {
        let mut conn = self.conn()?;
        let rows: Vec<AvailabilityRow> = match_availabilities::table
            .filter(match_availabilities::match_id.eq(match_id))
            .order(match_availabilities::created_at.asc())
            .select(AvailabilityRow::as_select())
            .load(&mut conn)?;
        rows.into_iter().map(MatchAvailability::try_from).collect()
    }

    fn has_feedback(&self, match_id: Uuid, user_id: Uuid) -> AppResult<bool> {
        let mut conn = self.conn()?;
        let count: i64 = match_feedbacks::table
            .filter(match_feedbacks::match_id.eq(match_id))
            .filter(match_feedbacks::user_id.eq(user_id))
            .count()
            .get_result(&mut conn)?;
        Ok(count > 0)
    }

    fn record_feedback(&self, feedback: NewMatchFeedback, now: DateTime<Utc>) -> AppResult<RecordedFeedback> {
        let mut conn = self.conn()?;
        conn.transaction(|conn| {
            let mut m = lock_match(conn, feedback.match_id)?;
            m.require_participant(feedback.user_id)?;
            m.ensure_accepting_feedback()?;

            let row: FeedbackRow = diesel::insert_into(match_feedbacks::table)
                .values(FeedbackRow {
                    id: Uuid::now_v7(),
                    match_id: feedback.match_id,
                    user_id: feedback.user_id,
                    rating: feedback.rating,
                    comment: feedback.comment,
                    created_at: now,
                })
                .get_result(conn)
                .map_err(|e| match e {
                    DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => AppError::new(
                        ErrorCode::FeedbackAlreadyExists,
                        "feedback already submitted for this match",
                    ),
                    other => AppError::from(other),
                })?;

            let count: i64 = match_feedbacks::table
                .filter(match_feedbacks::match_id.eq(m.id))
                .count()
                .get_result(conn)?;
            let completed = if count >= 2 {
                m.complete(now);
                save_match(conn, &m)?;
                Some(m)
            } else {
                None
            };

            Ok::<_, AppError>(RecordedFeedback {
                feedback: row.into(),
                completed,
            })
        })
    }

    fn feedbacks_for_match(&self, match_id: Uuid) -> AppResult<Vec<MatchFeedback>> {
        let mut conn = self.conn()?;
        let rows: Vec<FeedbackRow> = match_feedbacks::table
            .filter(match_feedbacks::match_id.eq(match_id))
            .order(match_feedbacks::created_at.asc())
            .select(FeedbackRow::as_select())
            .load(&mut conn)?;
        Ok(rows.into_iter().map(MatchFeedback::from).collect())
    }

    fn count_feedbacks(&self, match_id: Uuid) -> AppResult<usize> {
        let mut conn = self.conn()?;
        let count: i64 = match_feedbacks::table
            .filter(match_feedbacks::match_id.eq(match_id))
            .count()
            .get_result(&mut conn)?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    fn ratings_received_by(&self, user_id: Uuid) -> AppResult<Vec<i16>> {
        let mut conn = self.conn()?;
        let ratings: Vec<i16> = match_feedbacks::table
            .inner_join(matches::table)
            .filter(matches::deleted_at.is_null())
            .filter(matches::user1_id.eq(user_id).or(matches::user2_id.eq(user_id)))
            .filter(match_feedbacks::user_id.ne(user_id))
            .select(match_feedbacks::rating)
            .load(&mut conn)?;
        Ok(ratings)
    }
}
