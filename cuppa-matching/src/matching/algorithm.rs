use std::collections::HashSet;

use uuid::Uuid;

use super::availability::AvailabilityGrid;
use super::history::PairKey;
use super::score::compatibility_score;
use crate::models::User;

/// An eligible user together with their weekly availability.
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    pub user: &'a User,
    pub grid: AvailabilityGrid,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredPair {
    pub user1_id: Uuid,
    pub user2_id: Uuid,
    pub score: f64,
}

impl ScoredPair {
    pub fn key(&self) -> PairKey {
        PairKey::new(self.user1_id, self.user2_id)
    }
}

/// Whether two candidates may be paired at all: never matched before and
/// sharing at least one weekly slot.
fn compatible(a: &Candidate<'_>, b: &Candidate<'_>, already_matched: &impl Fn(PairKey) -> bool) -> bool {
    !already_matched(PairKey::new(a.user.id, b.user.id)) && a.grid.overlaps(&b.grid)
}

/// Every admissible unordered pair (i < j in input order), scored.
pub fn score_pairs(
    candidates: &[Candidate<'_>],
    already_matched: impl Fn(PairKey) -> bool,
) -> Vec<ScoredPair> {
    let mut pairs = Vec::new();
    for (i, a) in candidates.iter().enumerate() {
        for b in &candidates[i + 1..] {
            if !compatible(a, b, &already_matched) {
                continue;
            }
            pairs.push(ScoredPair {
                user1_id: a.user.id,
                user2_id: b.user.id,
                score: compatibility_score(&a.user.tags, &b.user.tags),
            });
        }
    }
    pairs
}

/// Greedy approximation of a maximum-weight matching.
///
/// Pairs are visited by descending score; the sort is stable so equal scores
/// keep enumeration order. A pair is taken iff neither member was taken by an
/// earlier pair.
pub fn select_greedy(mut pairs: Vec<ScoredPair>) -> Vec<ScoredPair> {
    pairs.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut taken: HashSet<Uuid> = HashSet::new();
    pairs
        .into_iter()
        .filter(|pair| {
            if taken.contains(&pair.user1_id) || taken.contains(&pair.user2_id) {
                return false;
            }
            taken.insert(pair.user1_id);
            taken.insert(pair.user2_id);
            true
        })
        .collect()
}

/// Highest scoring admissible partner for `seed`; the first one seen wins ties.
pub fn best_partner(
    seed: &Candidate<'_>,
    others: &[Candidate<'_>],
    already_matched: impl Fn(PairKey) -> bool,
) -> Option<ScoredPair> {
    others
        .iter()
        .filter(|other| other.user.id != seed.user.id)
        .filter(|other| compatible(seed, other, &already_matched))
        .map(|other| ScoredPair {
            user1_id: seed.user.id,
            user2_id: other.user.id,
            score: compatibility_score(&seed.user.tags, &other.user.tags),
        })
        .fold(None, |best: Option<ScoredPair>, pair| match best {
            Some(b) if b.score >= pair.score => Some(b),
            _ => Some(pair),
        })
}
