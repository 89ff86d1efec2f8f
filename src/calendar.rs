use crate::data::{DateRange, Schedule, Status, TimeCell, END_HOUR, FIRST_HOUR};
use crate::time::{TimeMerge, TimeRange, Units, Windowed};
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum CalendarError {
    #[error("Calendar access was not granted")]
    Unauthorized,
    #[error("Calendar unavailable: {0}")]
    Unavailable(String),
    #[error("No date range to import events for")]
    MissingRange,
}

/// An event from an external calendar, in local wall-clock time
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CalendarEvent {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
}

impl CalendarEvent {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> CalendarEvent {
        CalendarEvent {
            start,
            end,
            title: None,
            location: None,
        }
    }

    /// An event lasting from midnight of `date` to midnight of the next day
    pub fn all_day(date: NaiveDate) -> CalendarEvent {
        let start = date.and_time(NaiveTime::MIN);
        CalendarEvent::new(start, start + Duration::days(1))
    }

    /// The schedulable hours this event blocks, per day.
    ///
    /// Each day the event touches is handled on its own, with the event cut
    /// to that day. An end exactly on the hour does not block that hour.
    ///
    /// # Examples
    /// ```
    /// use chrono::NaiveDate;
    /// use zeitraster_libs::calendar::CalendarEvent;
    /// use zeitraster_libs::time::TimeRange;
    ///
    /// let day = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    /// let event = CalendarEvent::new(
    ///     day.and_hms_opt(10, 0, 0).unwrap(),
    ///     day.and_hms_opt(12, 0, 0).unwrap(),
    /// );
    ///
    /// assert_eq!(event.busy_hours(), vec![(day, TimeRange::new(10, 11))]);
    /// ```
    pub fn busy_hours(&self) -> Vec<(NaiveDate, TimeRange<u8>)> {
        let last_instant = NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap_or(NaiveTime::MIN);

        self.start
            .date()
            .iter_days()
            .take_while(|day| *day <= self.end.date())
            .filter_map(|day| {
                let busy_start = self.start.max(day.and_time(NaiveTime::MIN));
                let busy_end = self.end.min(day.and_time(last_instant));
                if busy_end < busy_start {
                    return None;
                }

                let start_hour = busy_start.hour() as u8;
                let mut end_hour = busy_end.hour() as u8;
                let on_the_hour =
                    busy_end.minute() == 0 && busy_end.second() == 0 && busy_end.nanosecond() == 0;
                if on_the_hour && end_hour > start_hour {
                    end_hour -= 1;
                }

                TimeRange::new(start_hour, end_hour)
                    .clamp(FIRST_HOUR, END_HOUR - 1)
                    .map(|hours| (day, hours))
            })
            .collect()
    }
}

/// An external calendar the participant signed in to
pub trait CalendarSource {
    /// Events overlapping `range`, ordered by start time
    fn events(&mut self, range: &DateRange) -> Result<Vec<CalendarEvent>, CalendarError>;
}

/// Replaces `schedule` with the hours `events` block inside `range` and
/// returns how many cells were marked unavailable. Without events the
/// schedule is left as it is.
pub fn apply_events(schedule: &mut Schedule, events: &[CalendarEvent], range: &DateRange) -> usize {
    if events.is_empty() {
        return 0;
    }

    let mut busy: BTreeMap<NaiveDate, Vec<TimeRange<u8>>> = BTreeMap::new();
    for (day, hours) in events.iter().flat_map(CalendarEvent::busy_hours) {
        if range.contains(day) {
            busy.entry(day).or_default().push(hours);
        }
    }

    *schedule = Schedule::new();

    let mut marked = 0;
    for (date, runs) in busy {
        let runs = runs.iter().time_merge();
        marked += usize::from(runs.iter().count_units());
        for hour in runs.iter().windowed(1) {
            schedule.set(
                TimeCell {
                    date,
                    hour: hour.start(),
                },
                Status::Unavailable,
            );
        }
        debug!("Imported busy hours on {}: {:?}", date, runs);
    }

    marked
}

/// Fetches events for `range` from `source` and applies them to `schedule`.
/// A failing source leaves the schedule untouched.
pub fn import<C>(
    source: &mut C,
    range: Option<&DateRange>,
    schedule: &mut Schedule,
) -> Result<usize, CalendarError>
where
    C: CalendarSource + ?Sized,
{
    let range = range.ok_or(CalendarError::MissingRange)?;
    let events = source.events(range)?;
    let marked = apply_events(schedule, &events, range);

    info!("Imported {} events, {} busy hours", events.len(), marked);

    Ok(marked)
}
