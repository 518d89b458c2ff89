use std::fmt;

use serde::{Deserialize, Serialize};

use crate::models::Availability;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Day {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl Day {
    pub const ALL: [Day; 7] = [
        Day::Monday,
        Day::Tuesday,
        Day::Wednesday,
        Day::Thursday,
        Day::Friday,
        Day::Saturday,
        Day::Sunday,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Day::Monday => "Monday",
            Day::Tuesday => "Tuesday",
            Day::Wednesday => "Wednesday",
            Day::Thursday => "Thursday",
            Day::Friday => "Friday",
            Day::Saturday => "Saturday",
            Day::Sunday => "Sunday",
        }
    }

    fn parse(s: &str) -> Option<Day> {
        Day::ALL.into_iter().find(|d| d.name().eq_ignore_ascii_case(s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Morning,
    Afternoon,
}

impl Period {
    pub const ALL: [Period; 2] = [Period::Morning, Period::Afternoon];

    pub fn name(self) -> &'static str {
        match self {
            Period::Morning => "Morning",
            Period::Afternoon => "Afternoon",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridSlot {
    pub day: Day,
    pub period: Period,
}

impl GridSlot {
    fn index(self) -> usize {
        self.day as usize * 2 + self.period as usize
    }
}

/// Weekly recurring availability: 7 days x {morning, afternoon}.
///
/// Serialised as the list of available slots. A grid with no slot set is
/// "incomplete" and keeps its owner out of matching.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<GridSlot>", into = "Vec<GridSlot>")]
pub struct AvailabilityGrid {
    slots: [bool; 14],
}

impl AvailabilityGrid {
    pub fn from_flags(slots: [bool; 14]) -> Self {
        Self { slots }
    }

    pub fn flags(&self) -> [bool; 14] {
        self.slots
    }

    pub fn with(mut self, day: Day, period: Period) -> Self {
        self.set(day, period, true);
        self
    }

    pub fn set(&mut self, day: Day, period: Period, available: bool) {
        self.slots[GridSlot { day, period }.index()] = available;
    }

    pub fn is_available(&self, day: Day, period: Period) -> bool {
        self.slots[GridSlot { day, period }.index()]
    }

    pub fn is_empty(&self) -> bool {
        !self.slots.iter().any(|s| *s)
    }

    /// True iff some slot is set in both grids.
    pub fn overlaps(&self, other: &AvailabilityGrid) -> bool {
        self.slots.iter().zip(other.slots.iter()).any(|(a, b)| *a && *b)
    }

    /// Set slots in Monday-morning .. Sunday-afternoon order.
    pub fn available_slots(&self) -> Vec<GridSlot> {
        Day::ALL
            .into_iter()
            .flat_map(|day| Period::ALL.into_iter().map(move |period| GridSlot { day, period }))
            .filter(|s| self.slots[s.index()])
            .collect()
    }
}

impl From<Vec<GridSlot>> for AvailabilityGrid {
    fn from(slots: Vec<GridSlot>) -> Self {
        slots
            .into_iter()
            .fold(AvailabilityGrid::default(), |grid, s| grid.with(s.day, s.period))
    }
}

impl From<AvailabilityGrid> for Vec<GridSlot> {
    fn from(grid: AvailabilityGrid) -> Self {
        grid.available_slots()
    }
}

/// One line of availability in a notification, e.g. `Monday Morning`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AvailabilitySlot {
    pub day: String,
    pub period: String,
}

impl fmt::Display for AvailabilitySlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.day, self.period)
    }
}

impl From<GridSlot> for AvailabilitySlot {
    fn from(slot: GridSlot) -> Self {
        Self {
            day: slot.day.name().to_string(),
            period: slot.period.name().to_string(),
        }
    }
}

/// Flattens per-match availability into notification slots.
///
/// Weekday keys come first in calendar order, any other keys (dates, free
/// text) follow in key order. `morning`/`afternoon` are capitalised, other
/// period labels pass through untouched.
pub fn format_slots(availability: &Availability) -> Vec<AvailabilitySlot> {
    let (weekdays, others): (Vec<_>, Vec<_>) = availability
        .iter()
        .partition(|(key, _)| Day::parse(key).is_some());

    let mut weekdays: Vec<(Day, &Vec<String>)> = weekdays
        .into_iter()
        .filter_map(|(key, periods)| Day::parse(key).map(|d| (d, periods)))
        .collect();
    weekdays.sort_by_key(|(day, _)| *day);

    let weekday_slots = weekdays
        .into_iter()
        .flat_map(|(day, periods)| periods.iter().map(move |p| (day.name().to_string(), p)));
    let other_slots = others
        .into_iter()
        .flat_map(|(key, periods)| periods.iter().map(move |p| (key.clone(), p)));

    weekday_slots
        .chain(other_slots)
        .map(|(day, period)| AvailabilitySlot {
            day,
            period: period_label(period),
        })
        .collect()
}

fn period_label(period: &str) -> String {
    match period {
        "morning" => Period::Morning.name().to_string(),
        "afternoon" => Period::Afternoon.name().to_string(),
        other => other.to_string(),
    }
}

/// Per-match availability must name at least one key and every key needs
/// at least one non-blank entry.
pub fn validate_match_availability(availability: &Availability) -> Result<(), String> {
    if availability.is_empty() {
        return Err("availability must contain at least one day".into());
    }
    for (key, periods) in availability {
        if key.trim().is_empty() {
            return Err("availability day must not be blank".into());
        }
        if periods.is_empty() || periods.iter().any(|p| p.trim().is_empty()) {
            return Err(format!("availability for {key} must list non-blank times"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(slots: &[(Day, Period)]) -> AvailabilityGrid {
        slots
            .iter()
            .fold(AvailabilityGrid::default(), |g, (d, p)| g.with(*d, *p))
    }

    #[test]
    fn all_false_grid_is_empty() {
        assert!(AvailabilityGrid::default().is_empty());
        assert!(!grid(&[(Day::Sunday, Period::Afternoon)]).is_empty());
    }

    #[test]
    fn overlap_requires_a_shared_slot() {
        let a = grid(&[(Day::Monday, Period::Morning), (Day::Friday, Period::Afternoon)]);
        let b = grid(&[(Day::Monday, Period::Afternoon), (Day::Friday, Period::Afternoon)]);
        let c = grid(&[(Day::Tuesday, Period::Morning)]);

        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
        assert!(!a.overlaps(&c));
        assert!(!c.overlaps(&a));
    }

    #[test]
    fn overlap_is_symmetric_over_every_single_slot() {
        for i in 0..14 {
            for j in 0..14 {
                let mut fa = [false; 14];
                let mut fb = [false; 14];
                fa[i] = true;
                fb[j] = true;
                let (a, b) = (AvailabilityGrid::from_flags(fa), AvailabilityGrid::from_flags(fb));
                assert_eq!(a.overlaps(&b), i == j);
                assert_eq!(a.overlaps(&b), b.overlaps(&a));
            }
        }
    }

    #[test]
    fn empty_grids_never_overlap() {
        let full = AvailabilityGrid::from_flags([true; 14]);
        assert!(!AvailabilityGrid::default().overlaps(&full));
    }

    #[test]
    fn grid_serialises_as_slot_list() {
        let g = grid(&[(Day::Wednesday, Period::Afternoon), (Day::Monday, Period::Morning)]);
        let json = serde_json::to_value(g).unwrap();
        assert_eq!(
            json,
            serde_json::json!([
                {"day": "monday", "period": "morning"},
                {"day": "wednesday", "period": "afternoon"}
            ])
        );
        let back: AvailabilityGrid = serde_json::from_value(json).unwrap();
        assert_eq!(back, g);
    }

    #[test]
    fn format_slots_orders_weekdays_then_other_keys() {
        let mut availability = Availability::new();
        availability.insert("Wednesday".into(), vec!["afternoon".into()]);
        availability.insert("Monday".into(), vec!["morning".into(), "afternoon".into()]);
        availability.insert("2025-02-18".into(), vec!["09:30".into()]);

        let lines: Vec<String> = format_slots(&availability).iter().map(|s| s.to_string()).collect();
        assert_eq!(
            lines,
            vec![
                "Monday Morning",
                "Monday Afternoon",
                "Wednesday Afternoon",
                "2025-02-18 09:30",
            ]
        );
    }

    #[test]
    fn malformed_match_availability_is_rejected() {
        assert!(validate_match_availability(&Availability::new()).is_err());

        let mut blank = Availability::new();
        blank.insert("Monday".into(), vec![]);
        assert!(validate_match_availability(&blank).is_err());

        let mut ok = Availability::new();
        ok.insert("Monday".into(), vec!["morning".into()]);
        assert!(validate_match_availability(&ok).is_ok());
    }
}
