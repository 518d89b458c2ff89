use serde::Deserialize;
use uuid::Uuid;

use cuppa_shared::errors::{AppError, AppResult, ErrorCode};

use super::rematch::{RematchQueue, RematchReason};
use crate::matching::availability::{AvailabilityGrid, Day, Period};
use crate::store::Stores;

/// One slot of a partial grid update.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct SlotChange {
    pub day: Day,
    pub period: Period,
    pub available: bool,
}

fn no_availability_set() -> AppError {
    AppError::new(ErrorCode::NoAvailabilitySet, "at least one availability slot must be set")
}

fn config_not_found() -> AppError {
    AppError::new(ErrorCode::ConfigNotFound, "availability configuration not found")
}

/// Weekly availability grid CRUD. Creating or changing a grid may make a
/// user pairable, so both queue a reactive match attempt.
pub struct AvailabilityConfigService {
    stores: Stores,
    rematch: RematchQueue,
}

impl AvailabilityConfigService {
    pub fn new(stores: Stores, rematch: RematchQueue) -> Self {
        Self { stores, rematch }
    }

    pub fn create(&self, user_id: Uuid, grid: AvailabilityGrid) -> AppResult<AvailabilityGrid> {
        if self.stores.users.user_by_id(user_id)?.is_none() {
            return Err(AppError::not_found("user not found"));
        }
        if grid.is_empty() {
            return Err(no_availability_set());
        }
        self.stores.availability.create_grid(user_id, grid)?;

        tracing::info!(user_id = %user_id, slots = grid.available_slots().len(), "availability configured");
        self.rematch.enqueue(user_id, RematchReason::AvailabilityConfigured);
        Ok(grid)
    }

    pub fn get(&self, user_id: Uuid) -> AppResult<AvailabilityGrid> {
        self.stores
            .availability
            .grid_for_user(user_id)?
            .ok_or_else(config_not_found)
    }

    /// Applies only the given slot changes; the result must keep at least
    /// one slot.
    pub fn update(&self, user_id: Uuid, changes: &[SlotChange]) -> AppResult<AvailabilityGrid> {
        let mut grid = self.get(user_id)?;
        for change in changes {
            grid.set(change.day, change.period, change.available);
        }
        if grid.is_empty() {
            return Err(no_availability_set());
        }
        self.stores.availability.update_grid(user_id, grid)?;

        tracing::info!(user_id = %user_id, changed = changes.len(), "availability updated");
        self.rematch.enqueue(user_id, RematchReason::AvailabilityConfigured);
        Ok(grid)
    }

    pub fn delete(&self, user_id: Uuid) -> AppResult<()> {
        if !self.stores.availability.delete_grid(user_id)? {
            return Err(config_not_found());
        }
        tracing::info!(user_id = %user_id, "availability removed");
        Ok(())
    }

    pub fn has(&self, user_id: Uuid) -> AppResult<bool> {
        self.stores.availability.grid_exists(user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::rematch::RematchJob;
    use crate::test_support::{member, monday_morning, Fixture};
    use tokio::sync::mpsc;

    fn service(fx: &Fixture) -> (AvailabilityConfigService, mpsc::Receiver<RematchJob>) {
        let (queue, rx) = RematchQueue::channel(16);
        (AvailabilityConfigService::new(Stores::backed_by(fx.store.clone()), queue), rx)
    }

    #[test]
    fn create_rejects_unknown_user_and_empty_grid() {
        let fx = Fixture::new();
        let (svc, _rx) = service(&fx);
        assert!(svc.create(Uuid::new_v4(), monday_morning()).unwrap_err().is(ErrorCode::NotFound));

        let user = member(fx.org.id, "Ada", &[]);
        fx.store.insert_user(user.clone());
        let err = svc.create(user.id, AvailabilityGrid::default()).unwrap_err();
        assert!(err.is(ErrorCode::NoAvailabilitySet));
        assert!(!svc.has(user.id).unwrap());
    }

    #[test]
    fn create_twice_conflicts_and_queues_rematch_once() {
        let fx = Fixture::new();
        let (svc, mut rx) = service(&fx);
        let user = member(fx.org.id, "Ada", &[]);
        fx.store.insert_user(user.clone());

        svc.create(user.id, monday_morning()).unwrap();
        assert!(svc.create(user.id, monday_morning()).unwrap_err().is(ErrorCode::ConfigAlreadyExists));

        let job = rx.try_recv().unwrap();
        assert_eq!(job.user_id, user.id);
        assert_eq!(job.reason, RematchReason::AvailabilityConfigured);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn partial_update_touches_only_given_slots() {
        let fx = Fixture::new();
        let (svc, _rx) = service(&fx);
        let user = fx.add_member("Ada", &[]);

        let grid = svc
            .update(
                user.id,
                &[SlotChange {
                    day: Day::Thursday,
                    period: Period::Afternoon,
                    available: true,
                }],
            )
            .unwrap();

        assert!(grid.is_available(Day::Monday, Period::Morning));
        assert!(grid.is_available(Day::Thursday, Period::Afternoon));
        assert_eq!(svc.get(user.id).unwrap(), grid);
    }

    #[test]
    fn update_cannot_clear_every_slot() {
        let fx = Fixture::new();
        let (svc, _rx) = service(&fx);
        let user = fx.add_member("Ada", &[]);

        let err = svc
            .update(
                user.id,
                &[SlotChange {
                    day: Day::Monday,
                    period: Period::Morning,
                    available: false,
                }],
            )
            .unwrap_err();
        assert!(err.is(ErrorCode::NoAvailabilitySet));
        assert_eq!(svc.get(user.id).unwrap(), monday_morning());
    }

    #[test]
    fn delete_and_missing_config() {
        let fx = Fixture::new();
        let (svc, _rx) = service(&fx);
        let user = fx.add_member("Ada", &[]);

        svc.delete(user.id).unwrap();
        assert!(svc.get(user.id).unwrap_err().is(ErrorCode::ConfigNotFound));
        assert!(svc.delete(user.id).unwrap_err().is(ErrorCode::ConfigNotFound));
        assert!(svc.update(user.id, &[]).unwrap_err().is(ErrorCode::ConfigNotFound));
    }
}
