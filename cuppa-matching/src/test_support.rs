//! Fixtures shared by the unit tests.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use uuid::Uuid;

use cuppa_shared::types::auth::AccountType;

use crate::matching::availability::{AvailabilityGrid, AvailabilitySlot, Day, Period};
use crate::matching::slot::MeetingSlot;
use crate::models::{Match, NewMatch, Organisation, User};
use crate::notify::Notifier;
use crate::services::{MatchService, RematchJob, RematchQueue};
use crate::store::memory::InMemoryStore;
use crate::store::Stores;

pub fn user_with_tags(tags: &[&str]) -> User {
    User {
        id: Uuid::new_v4(),
        organisation_id: None,
        first_name: "Test".into(),
        last_name: "User".into(),
        email: "test@example.com".into(),
        account_type: AccountType::User,
        is_confirmed: true,
        tags: tags.iter().map(|t| t.to_string()).collect::<BTreeSet<_>>(),
        average_rating: None,
    }
}

pub fn member(org: Uuid, first_name: &str, tags: &[&str]) -> User {
    User {
        organisation_id: Some(org),
        first_name: first_name.into(),
        email: format!("{}@example.com", first_name.to_lowercase()),
        ..user_with_tags(tags)
    }
}

pub fn monday_morning() -> AvailabilityGrid {
    AvailabilityGrid::default().with(Day::Monday, Period::Morning)
}

pub fn slot() -> MeetingSlot {
    MeetingSlot {
        date: NaiveDate::from_ymd_opt(2026, 10, 20).unwrap_or_default(),
        time: "10 AM",
    }
}

pub fn new_match(org: Uuid, user1_id: Uuid, user2_id: Uuid) -> NewMatch {
    NewMatch {
        organisation_id: org,
        user1_id,
        user2_id,
        match_score: 50.0,
        slot: slot(),
    }
}

pub fn pending_match(user1_id: Uuid, user2_id: Uuid) -> Match {
    new_match(Uuid::new_v4(), user1_id, user2_id).into_match(Utc::now())
}

/// An organisation seeded into a fresh in-memory store.
pub struct Fixture {
    pub store: Arc<InMemoryStore>,
    pub org: Organisation,
}

impl Fixture {
    pub fn new() -> Self {
        let store = Arc::new(InMemoryStore::new());
        let org = Organisation {
            id: Uuid::new_v4(),
            name: "Acme".into(),
        };
        store.insert_organisation(org.clone());
        Self { store, org }
    }

    /// Confirmed member with the given tags, available on Monday mornings.
    pub fn add_member(&self, name: &str, tags: &[&str]) -> User {
        self.add_member_with_grid(name, tags, Some(monday_morning()))
    }

    pub fn add_member_with_grid(&self, name: &str, tags: &[&str], grid: Option<AvailabilityGrid>) -> User {
        let user = member(self.org.id, name, tags);
        self.store.insert_user(user.clone());
        if let Some(grid) = grid {
            self.store.insert_grid(user.id, grid);
        }
        user
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SentNotification {
    pub to: Uuid,
    pub from_name: String,
    pub from_email: String,
    pub slots: Vec<String>,
}

/// Keeps every notification instead of sending it.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<SentNotification>>,
    fail_next: Mutex<bool>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<SentNotification> {
        self.sent.lock().clone()
    }

    pub fn fail_next(&self) {
        *self.fail_next.lock() = true;
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify_match_accepted(
        &self,
        to: &User,
        from_name: &str,
        from_email: &str,
        slots: &[AvailabilitySlot],
    ) -> anyhow::Result<()> {
        if std::mem::take(&mut *self.fail_next.lock()) {
            anyhow::bail!("mail relay unavailable");
        }
        self.sent.lock().push(SentNotification {
            to: to.id,
            from_name: from_name.to_string(),
            from_email: from_email.to_string(),
            slots: slots.iter().map(ToString::to_string).collect(),
        });
        Ok(())
    }
}

/// A match service over the fixture store, with the rematch receiver left
/// to the test.
pub fn service_for(
    fx: &Fixture,
) -> (Arc<MatchService>, RematchQueue, mpsc::Receiver<RematchJob>, Arc<RecordingNotifier>) {
    let (queue, rx) = RematchQueue::channel(64);
    let notifier = Arc::new(RecordingNotifier::default());
    let service = MatchService::new(Stores::backed_by(fx.store.clone()), notifier.clone(), queue.clone());
    (Arc::new(service), queue, rx, notifier)
}
