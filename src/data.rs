use chrono::{Days, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::convert::TryFrom;
use thiserror::Error;

/// First schedulable hour of a day (inclusive)
pub const FIRST_HOUR: u8 = 9;
/// Last schedulable hour of a day (exclusive)
pub const END_HOUR: u8 = 24;

/// The schedulable hours of every day, `[FIRST_HOUR, END_HOUR)`
pub fn hours() -> std::ops::Range<u8> {
    FIRST_HOUR..END_HOUR
}

#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum ValidationError {
    #[error("Hour {hour} on {date} is outside of the schedulable hours")]
    OutOfDomain { date: NaiveDate, hour: u8 },
    #[error("Invalid date range. {end} comes before {start}")]
    InvertedRange { start: NaiveDate, end: NaiveDate },
    #[error("Unsupported length of input. Expected {expected}, got {found}")]
    UnsupportedLength { expected: usize, found: usize },
    #[error("A participant needs a name")]
    MissingName,
    #[error("{0:?} cannot be used as a key")]
    InvalidKey(String),
}

/// Status of a single hour. A cell without a status is "unset", which every
/// consumer treats as available.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Available,
    Unavailable,
}

impl Status {
    pub fn toggled(self) -> Status {
        match self {
            Status::Available => Status::Unavailable,
            Status::Unavailable => Status::Available,
        }
    }
}

/// One schedulable hour on one day.
///
/// Ordering is chronological: by date, then by hour.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct TimeCell {
    pub date: NaiveDate,
    pub hour: u8,
}

impl TimeCell {
    /// Constructs a cell, refusing hours outside of `[FIRST_HOUR, END_HOUR)`
    ///
    /// # Examples
    /// ```
    /// use chrono::NaiveDate;
    /// use zeitraster_libs::data::TimeCell;
    ///
    /// let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    ///
    /// assert!(TimeCell::new(date, 9).is_ok());
    /// assert!(TimeCell::new(date, 23).is_ok());
    /// assert!(TimeCell::new(date, 8).is_err());
    /// assert!(TimeCell::new(date, 24).is_err());
    /// ```
    pub fn new(date: NaiveDate, hour: u8) -> Result<TimeCell, ValidationError> {
        if hours().contains(&hour) {
            Ok(TimeCell { date, hour })
        } else {
            Err(ValidationError::OutOfDomain { date, hour })
        }
    }
}

#[cfg(feature = "arbitrary")]
impl<'a> arbitrary::Arbitrary<'a> for TimeCell {
    fn arbitrary(u: &mut arbitrary::Unstructured<'a>) -> arbitrary::Result<Self> {
        let base = NaiveDate::from_ymd_opt(2024, 1, 1).ok_or(arbitrary::Error::IncorrectFormat)?;
        let offset = u.int_in_range(0..=30_i64)?;
        let hour = u.int_in_range(FIRST_HOUR..=END_HOUR - 1)?;
        Ok(TimeCell {
            date: base + chrono::Duration::days(offset),
            hour,
        })
    }
}

/// Inclusive range of calendar days `[start, end]`
#[derive(Serialize, Deserialize, Debug, Copy, Clone, Eq, PartialEq)]
#[serde(try_from = "RangeMillis", into = "RangeMillis")]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<DateRange, ValidationError> {
        if end < start {
            Err(ValidationError::InvertedRange { start, end })
        } else {
            Ok(DateRange { start, end })
        }
    }

    /// `[today, today + days]`, the range a fresh session starts with.
    /// `None` when the end falls outside of the supported calendar.
    pub fn starting_at(today: NaiveDate, days: u32) -> Option<DateRange> {
        today
            .checked_add_days(Days::new(u64::from(days)))
            .map(|end| DateRange { start: today, end })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Number of days in the range, both ends included
    pub fn len_days(&self) -> usize {
        (self.end - self.start).num_days() as usize + 1
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + Clone {
        let end = self.end;
        self.start.iter_days().take_while(move |day| *day <= end)
    }

    /// Every cell of the range in chronological order
    pub fn cells(&self) -> impl Iterator<Item = TimeCell> + Clone {
        self.days()
            .flat_map(|date| hours().map(move |hour| TimeCell { date, hour }))
    }

    /// Refuses ranges longer than `max_days`
    pub fn validate(&self, max_days: usize) -> Result<(), ValidationError> {
        if self.len_days() > max_days {
            Err(ValidationError::UnsupportedLength {
                expected: max_days,
                found: self.len_days(),
            })
        } else {
            Ok(())
        }
    }
}

/// Persisted shape of a `DateRange`: UTC midnight of each day in epoch millis
#[derive(Serialize, Deserialize, Debug, Copy, Clone)]
struct RangeMillis {
    start: i64,
    end: i64,
}

fn midnight_millis(date: NaiveDate) -> i64 {
    date.and_time(NaiveTime::MIN).and_utc().timestamp_millis()
}

fn date_from_millis(millis: i64) -> Result<NaiveDate, String> {
    chrono::DateTime::from_timestamp_millis(millis)
        .map(|time| time.date_naive())
        .ok_or_else(|| format!("{} is not a valid timestamp", millis))
}

impl From<DateRange> for RangeMillis {
    fn from(range: DateRange) -> Self {
        RangeMillis {
            start: midnight_millis(range.start),
            end: midnight_millis(range.end),
        }
    }
}

impl TryFrom<RangeMillis> for DateRange {
    type Error = String;

    fn try_from(millis: RangeMillis) -> Result<Self, Self::Error> {
        DateRange::new(date_from_millis(millis.start)?, date_from_millis(millis.end)?)
            .map_err(|e| e.to_string())
    }
}

type Hours = BTreeMap<u8, Status>;

/// A grid of hour statuses keyed by date, then by hour.
///
/// Hours are kept as integers; the persisted form writes them as string keys
/// and reads them back as integers.
#[derive(Serialize, Deserialize, Debug, Clone, Default, Eq, PartialEq)]
#[serde(transparent)]
pub struct Schedule(BTreeMap<NaiveDate, Hours>);

impl Schedule {
    pub fn new() -> Schedule {
        Schedule(BTreeMap::new())
    }

    pub fn get(&self, cell: TimeCell) -> Option<Status> {
        self.0
            .get(&cell.date)
            .and_then(|hours| hours.get(&cell.hour))
            .copied()
    }

    pub fn is_unavailable(&self, cell: TimeCell) -> bool {
        self.get(cell) == Some(Status::Unavailable)
    }

    pub fn set(&mut self, cell: TimeCell, status: Status) {
        self.0.entry(cell.date).or_default().insert(cell.hour, status);
    }

    /// Returns the cell to "unset"
    pub fn clear(&mut self, cell: TimeCell) {
        if let Some(hours) = self.0.get_mut(&cell.date) {
            hours.remove(&cell.hour);
            if hours.is_empty() {
                self.0.remove(&cell.date);
            }
        }
    }

    /// Flips a single cell between `Available` and `Unavailable`. Unset cells
    /// count as available and become unavailable.
    pub fn toggle(&mut self, cell: TimeCell) -> Status {
        let status = self.get(cell).unwrap_or(Status::Available).toggled();
        self.set(cell, status);
        status
    }

    pub fn is_empty(&self) -> bool {
        self.0.values().all(|hours| hours.is_empty())
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.0.keys().copied()
    }

    /// Every marked cell in chronological order, including cells that were
    /// written outside of the schedulable hours by other clients
    pub fn cells(&self) -> impl Iterator<Item = (TimeCell, Status)> + '_ {
        self.0.iter().flat_map(|(&date, hours)| {
            hours
                .iter()
                .map(move |(&hour, &status)| (TimeCell { date, hour }, status))
        })
    }

    pub fn len(&self) -> usize {
        self.0.values().map(|hours| hours.len()).sum()
    }

    /// Unavailable hours of `date` in ascending order
    pub fn unavailable_hours(&self, date: NaiveDate) -> Vec<u8> {
        self.0
            .get(&date)
            .map(|hours| {
                hours
                    .iter()
                    .filter(|(_, status)| **status == Status::Unavailable)
                    .map(|(&hour, _)| hour)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Drops every cell outside of `range` or the schedulable hours
    pub fn retain_within(&mut self, range: &DateRange) {
        self.0.retain(|date, day| {
            day.retain(|hour, _| hours().contains(hour));
            range.contains(*date) && !day.is_empty()
        });
    }
}

impl std::iter::FromIterator<(TimeCell, Status)> for Schedule {
    fn from_iter<T: IntoIterator<Item = (TimeCell, Status)>>(iter: T) -> Self {
        let mut schedule = Schedule::new();
        for (cell, status) in iter {
            schedule.set(cell, status);
        }
        schedule
    }
}

#[cfg(feature = "arbitrary")]
impl<'a> arbitrary::Arbitrary<'a> for Schedule {
    fn arbitrary(u: &mut arbitrary::Unstructured<'a>) -> arbitrary::Result<Self> {
        Ok(u.arbitrary_iter::<(TimeCell, Status)>()?
            .collect::<arbitrary::Result<Schedule>>()?)
    }
}
