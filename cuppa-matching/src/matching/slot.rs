use chrono::{Datelike, Days, NaiveDate, Weekday};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;

pub const MEETING_TIMES: [&str; 7] = ["9 AM", "10 AM", "11 AM", "2 PM", "3 PM", "4 PM", "5 PM"];

/// Suggested meeting date and time attached to a new match. Notification
/// content only; never checked against anyone's availability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MeetingSlot {
    pub date: NaiveDate,
    pub time: &'static str,
}

fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// A weekday 1-5 days after `today`, resampled until it is not a weekend,
/// and a uniformly chosen time label.
pub fn assign_meeting_slot<R: Rng + ?Sized>(today: NaiveDate, rng: &mut R) -> MeetingSlot {
    let date = loop {
        let candidate = today + Days::new(rng.gen_range(1..=5));
        if !is_weekend(candidate) {
            break candidate;
        }
    };
    let time = MEETING_TIMES.choose(rng).copied().unwrap_or(MEETING_TIMES[0]);
    MeetingSlot { date, time }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn slot_is_a_weekday_within_five_days() {
        let mut rng = StdRng::seed_from_u64(7);
        // 2026-10-16 is a Friday, so +1 and +2 land on the weekend
        let today = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();
        for _ in 0..500 {
            let slot = assign_meeting_slot(today, &mut rng);
            let ahead = (slot.date - today).num_days();
            assert!((1..=5).contains(&ahead), "{ahead} days ahead");
            assert!(!is_weekend(slot.date));
            assert!(MEETING_TIMES.contains(&slot.time));
        }
    }

    #[test]
    fn every_time_label_is_reachable() {
        let mut rng = StdRng::seed_from_u64(42);
        let today = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        let seen: std::collections::HashSet<&str> =
            (0..1000).map(|_| assign_meeting_slot(today, &mut rng).time).collect();
        assert_eq!(seen.len(), MEETING_TIMES.len());
    }
}
