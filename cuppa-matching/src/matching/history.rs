use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Dedup ledger entry: an unordered pair that was matched once, ever.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MatchHistory {
    pub id: Uuid,
    pub user1_id: Uuid,
    pub user2_id: Uuid,
    pub matched_at: DateTime<Utc>,
}

impl MatchHistory {
    pub fn key(&self) -> PairKey {
        PairKey::new(self.user1_id, self.user2_id)
    }
}

/// Order-independent identity of a pair of users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PairKey {
    lo: Uuid,
    hi: Uuid,
}

impl PairKey {
    pub fn new(a: Uuid, b: Uuid) -> Self {
        let (lo, hi) = if a < b { (a, b) } else { (b, a) };
        Self { lo, hi }
    }

    pub fn members(&self) -> (Uuid, Uuid) {
        (self.lo, self.hi)
    }

    pub fn contains(&self, user_id: Uuid) -> bool {
        self.lo == user_id || self.hi == user_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_key_ignores_order() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        assert_eq!(PairKey::new(a, b), PairKey::new(b, a));
        assert!(PairKey::new(a, b).contains(a));
        assert!(!PairKey::new(a, b).contains(Uuid::new_v4()));
    }

    #[test]
    fn history_key_matches_reversed_lookup() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let entry = MatchHistory {
            id: Uuid::new_v4(),
            user1_id: a,
            user2_id: b,
            matched_at: Utc::now(),
        };
        assert_eq!(entry.key(), PairKey::new(b, a));
    }
}
