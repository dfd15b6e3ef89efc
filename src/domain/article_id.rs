//! Date-keyed article identifiers.
//!
//! An article id is the decimal concatenation `YYMMDDNN`: the last two digits
//! of the year, the zero-padded month and day, and a two-digit sequence that
//! separates articles created on the same day (2024-03-09, sequence 1 becomes
//! `24030901`). Ids sort by creation date, then by sequence.
//!
//! Allocation is pure: callers hand in the ids already taken for the day and
//! persist the returned candidate themselves, relying on the store's
//! uniqueness check to detect a lost race.

use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::{Date, Month};

/// First sequence number handed out for a day.
pub const MIN_SEQUENCE: u8 = 1;
/// Last sequence number that fits the two-digit suffix.
pub const MAX_SEQUENCE: u8 = 99;

const CENTURY_START: i32 = 2000;
const CENTURY_END: i32 = 2099;
const YEAR_FACTOR: i32 = 1_000_000;
const MONTH_FACTOR: i32 = 10_000;
const DAY_FACTOR: i32 = 100;

/// Errors produced while composing or allocating article ids.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AllocationError {
    #[error("allocation exhausted for date {date}")]
    Exhausted { date: Date },
    #[error("year {year} cannot be encoded in a two-digit article id")]
    UnsupportedYear { year: i32 },
    #[error("sequence {sequence} is outside 1..=99")]
    SequenceOutOfRange { sequence: u8 },
}

/// Numeric `YYMMDDNN` article identifier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct ArticleId(i32);

impl ArticleId {
    /// Build the id for `date` with the given same-day `sequence`.
    pub fn compose(date: Date, sequence: u8) -> Result<Self, AllocationError> {
        if !(MIN_SEQUENCE..=MAX_SEQUENCE).contains(&sequence) {
            return Err(AllocationError::SequenceOutOfRange { sequence });
        }

        let year = date.year();
        if !(CENTURY_START..=CENTURY_END).contains(&year) {
            return Err(AllocationError::UnsupportedYear { year });
        }

        let yy = year - CENTURY_START;
        let mm = i32::from(u8::from(date.month()));
        let dd = i32::from(date.day());

        Ok(Self(
            yy * YEAR_FACTOR + mm * MONTH_FACTOR + dd * DAY_FACTOR + i32::from(sequence),
        ))
    }

    /// First and last id that can exist for `date`, inclusive.
    pub fn day_bounds(date: Date) -> Result<(Self, Self), AllocationError> {
        Ok((
            Self::compose(date, MIN_SEQUENCE)?,
            Self::compose(date, MAX_SEQUENCE)?,
        ))
    }

    /// Accept a raw integer only when it decodes to a real date and a valid sequence.
    pub fn from_raw(value: i32) -> Option<Self> {
        let candidate = Self(value);
        let date = candidate.date()?;
        Self::compose(date, candidate.sequence())
            .ok()
            .filter(|composed| *composed == candidate)
    }

    pub fn get(self) -> i32 {
        self.0
    }

    /// Calendar date encoded in the id.
    pub fn date(self) -> Option<Date> {
        if self.0 < 0 {
            return None;
        }
        let yy = self.0 / YEAR_FACTOR;
        let mm = u8::try_from((self.0 / MONTH_FACTOR) % 100).ok()?;
        let dd = u8::try_from((self.0 / DAY_FACTOR) % 100).ok()?;
        let month = Month::try_from(mm).ok()?;
        Date::from_calendar_date(CENTURY_START + yy, month, dd).ok()
    }

    /// Same-day sequence suffix.
    pub fn sequence(self) -> u8 {
        u8::try_from(self.0.rem_euclid(100)).unwrap_or_default()
    }
}

impl Display for ArticleId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Parses an id used as a lookup key. Any positive integer is accepted:
/// articles published before ids were zero padded (`243901` for 2024-3-9)
/// keep their stored id. Use [`ArticleId::from_raw`] to require a
/// well-formed `YYMMDDNN` value.
impl FromStr for ArticleId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: i32 = s.trim().parse().map_err(|_| ())?;
        if value > 0 { Ok(Self(value)) } else { Err(()) }
    }
}

/// Return the smallest free id for `date`, given the ids already assigned.
pub fn allocate_id(
    date: Date,
    existing: &BTreeSet<ArticleId>,
) -> Result<ArticleId, AllocationError> {
    allocate_id_with(date, |candidate| existing.contains(&candidate))
}

/// Variant of [`allocate_id`] that asks `is_taken` about each candidate in
/// sequence order. The loop runs at most [`MAX_SEQUENCE`] times.
pub fn allocate_id_with<F>(date: Date, mut is_taken: F) -> Result<ArticleId, AllocationError>
where
    F: FnMut(ArticleId) -> bool,
{
    for sequence in MIN_SEQUENCE..=MAX_SEQUENCE {
        let candidate = ArticleId::compose(date, sequence)?;
        if !is_taken(candidate) {
            return Ok(candidate);
        }
    }

    Err(AllocationError::Exhausted { date })
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    fn ids(values: &[i32]) -> BTreeSet<ArticleId> {
        values
            .iter()
            .map(|value| ArticleId::from_raw(*value).expect("valid id"))
            .collect()
    }

    #[test]
    fn compose_concatenates_date_and_sequence() {
        let id = ArticleId::compose(date!(2024 - 03 - 09), 1).expect("id");
        assert_eq!(id.get(), 24030901);
        assert_eq!(id.to_string(), "24030901");
        assert_eq!(id.date(), Some(date!(2024 - 03 - 09)));
        assert_eq!(id.sequence(), 1);
    }

    #[test]
    fn empty_set_yields_first_sequence() {
        let id = allocate_id(date!(2024 - 03 - 09), &BTreeSet::new()).expect("id");
        assert_eq!(id.get(), 24030901);
    }

    #[test]
    fn taken_candidates_advance_the_sequence() {
        let day = date!(2024 - 03 - 09);
        assert_eq!(
            allocate_id(day, &ids(&[24030901])).expect("id").get(),
            24030902
        );
        assert_eq!(
            allocate_id(day, &ids(&[24030901, 24030902]))
                .expect("id")
                .get(),
            24030903
        );
    }

    #[test]
    fn returns_smallest_unused_suffix() {
        let day = date!(2024 - 03 - 09);
        let id = allocate_id(day, &ids(&[24030901, 24030902, 24030904])).expect("id");
        assert_eq!(id.get(), 24030903);
    }

    #[test]
    fn other_days_do_not_interfere() {
        let day = date!(2024 - 03 - 09);
        let id = allocate_id(day, &ids(&[24030801, 24031001, 23030901])).expect("id");
        assert_eq!(id.get(), 24030901);
    }

    #[test]
    fn full_day_is_exhausted() {
        let day = date!(2024 - 03 - 09);
        let existing: BTreeSet<ArticleId> = (MIN_SEQUENCE..=MAX_SEQUENCE)
            .map(|seq| ArticleId::compose(day, seq).expect("id"))
            .collect();

        let err = allocate_id(day, &existing).expect_err("exhausted");
        assert_eq!(err, AllocationError::Exhausted { date: day });
        assert_eq!(err.to_string(), "allocation exhausted for date 2024-03-09");
    }

    #[test]
    fn last_free_slot_is_found() {
        let day = date!(2024 - 12 - 31);
        let existing: BTreeSet<ArticleId> = (MIN_SEQUENCE..MAX_SEQUENCE)
            .map(|seq| ArticleId::compose(day, seq).expect("id"))
            .collect();

        let id = allocate_id(day, &existing).expect("id");
        assert_eq!(id.get(), 24123199);
    }

    #[test]
    fn never_returns_a_taken_id() {
        let day = date!(2025 - 07 - 14);
        for taken in 0..MAX_SEQUENCE {
            let existing: BTreeSet<ArticleId> = (1..=u16::from(taken))
                .map(|seq| {
                    let sequence = u8::try_from(seq * 7 % 99 + 1).expect("fits");
                    ArticleId::compose(day, sequence).expect("id")
                })
                .collect();
            let id = allocate_id(day, &existing).expect("free slot remains");
            assert!(!existing.contains(&id));
            assert_eq!(id.date(), Some(day));
        }
    }

    #[test]
    fn sequential_allocation_never_repeats() {
        let day = date!(2024 - 03 - 09);
        let mut existing = BTreeSet::new();
        let first = allocate_id(day, &existing).expect("first");
        existing.insert(first);
        let second = allocate_id(day, &existing).expect("second");

        assert_ne!(first, second);
        assert_eq!(second.get(), 24030902);
    }

    #[test]
    fn years_outside_the_century_are_rejected() {
        assert_eq!(
            allocate_id(date!(2100 - 01 - 01), &BTreeSet::new()),
            Err(AllocationError::UnsupportedYear { year: 2100 })
        );
        assert_eq!(
            ArticleId::compose(date!(1999 - 12 - 31), 1),
            Err(AllocationError::UnsupportedYear { year: 1999 })
        );
    }

    #[test]
    fn early_years_drop_leading_zeros() {
        let id = ArticleId::compose(date!(2000 - 01 - 02), 5).expect("id");
        assert_eq!(id.get(), 10205);
        assert_eq!(id.date(), Some(date!(2000 - 01 - 02)));
    }

    #[test]
    fn from_raw_rejects_impossible_dates() {
        assert!(ArticleId::from_raw(24023001).is_none());
        assert!(ArticleId::from_raw(24030900).is_none());
        assert!(ArticleId::from_raw(-1).is_none());
        assert!(ArticleId::from_raw(24130101).is_none());
        assert!(ArticleId::from_raw(243901).is_none());
    }

    #[test]
    fn lookup_keys_accept_unpadded_ids() {
        let legacy: ArticleId = "243901".parse().expect("legacy id");
        assert_eq!(legacy.get(), 243901);
        assert_eq!(legacy.date(), None);
        assert_eq!("24030901".parse::<ArticleId>().map(ArticleId::get), Ok(24030901));
        assert!("0".parse::<ArticleId>().is_err());
        assert!("-5".parse::<ArticleId>().is_err());
        assert!("hello".parse::<ArticleId>().is_err());
    }

    #[test]
    fn day_bounds_cover_the_sequence_range() {
        let (low, high) = ArticleId::day_bounds(date!(2024 - 03 - 09)).expect("bounds");
        assert_eq!(low.get(), 24030901);
        assert_eq!(high.get(), 24030999);
    }

    #[test]
    fn predicate_sees_candidates_in_order() {
        let mut seen = Vec::new();
        let id = allocate_id_with(date!(2024 - 03 - 09), |candidate| {
            seen.push(candidate.sequence());
            candidate.sequence() < 3
        })
        .expect("id");

        assert_eq!(seen, vec![1, 2, 3]);
        assert_eq!(id.sequence(), 3);
    }
}
