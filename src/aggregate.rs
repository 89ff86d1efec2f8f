use crate::data::{hours, DateRange, Schedule, Status, TimeCell};
use crate::participant::ParticipantSubmission;
use chrono::NaiveDate;
use log::{debug, trace};
use num::Integer;
#[cfg(feature = "rayon")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;

/// Highest heatmap level, reached when everyone is available
pub const MAX_LEVEL: usize = 4;

/// A ranked (date, hour) recommendation
#[derive(Serialize, Deserialize, Debug, Copy, Clone, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CandidateSlot {
    pub date: NaiveDate,
    pub hour: u8,
    pub available_count: usize,
    pub total_count: usize,
}

impl CandidateSlot {
    pub fn cell(&self) -> TimeCell {
        TimeCell {
            date: self.date,
            hour: self.hour,
        }
    }
}

/// Merges every participant's schedule into one consensus grid.
///
/// A cell marked `Unavailable` by anyone is `Unavailable`; every other cell
/// that appears in at least one schedule is `Available`, whether the others
/// marked it available or left it unset. Hours outside of the schedulable
/// hours are dropped.
///
/// # Examples
/// ```
/// use chrono::{NaiveDate, Utc};
/// use zeitraster_libs::aggregate::merge_submissions;
/// use zeitraster_libs::data::{Schedule, Status, TimeCell};
/// use zeitraster_libs::participant::ParticipantSubmission;
///
/// let cell = TimeCell::new(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), 10).unwrap();
///
/// let mut free = Schedule::new();
/// free.set(cell, Status::Available);
/// let mut busy = Schedule::new();
/// busy.set(cell, Status::Unavailable);
///
/// let merged = merge_submissions(&[
///     ParticipantSubmission::new("a", free, Utc::now()),
///     ParticipantSubmission::new("b", busy, Utc::now()),
///     ParticipantSubmission::new("c", Schedule::new(), Utc::now()),
/// ]);
///
/// assert_eq!(merged.get(cell), Some(Status::Unavailable));
/// assert!(merge_submissions(&[]).is_empty());
/// ```
pub fn merge_submissions(submissions: &[ParticipantSubmission]) -> Schedule {
    let merged = submissions
        .iter()
        .flat_map(|submission| submission.schedule.cells())
        .filter(|(cell, _)| hours().contains(&cell.hour))
        .fold(Schedule::new(), |mut merged, (cell, status)| {
            if status == Status::Unavailable || merged.get(cell).is_none() {
                merged.set(cell, status);
            }
            merged
        });

    debug!(
        "Merged {} submissions into {} cells",
        submissions.len(),
        merged.len()
    );

    merged
}

fn available_count(participants: &[ParticipantSubmission], cell: TimeCell) -> usize {
    participants
        .iter()
        .filter(|p| p.schedule.get(cell) == Some(Status::Available))
        .count()
}

/// Ranks every schedulable hour on the dates of `grid` by how many
/// participants explicitly marked themselves available.
///
/// The counts come from each participant's own schedule, not from the merged
/// grid, so a vetoed cell can still rank. Cells nobody marked available are
/// left out. Ties keep chronological order.
pub fn rank_candidates(grid: &Schedule, participants: &[ParticipantSubmission]) -> Vec<CandidateSlot> {
    let total_count = participants.len();

    let mut candidates: Vec<CandidateSlot> = grid
        .dates()
        .flat_map(|date| hours().map(move |hour| TimeCell { date, hour }))
        .filter_map(|cell| match available_count(participants, cell) {
            0 => None,
            available_count => Some(CandidateSlot {
                date: cell.date,
                hour: cell.hour,
                available_count,
                total_count,
            }),
        })
        .collect();

    // Both sorts are stable, which keeps equal counts chronological
    #[cfg(feature = "rayon")]
    candidates.par_sort_by_key(|slot| Reverse(slot.available_count));
    #[cfg(not(feature = "rayon"))]
    candidates.sort_by_key(|slot| Reverse(slot.available_count));

    trace!("Ranked {} candidate slots", candidates.len());

    candidates
}

/// The `k` best candidates of `rank_candidates`
pub fn top_candidates(
    grid: &Schedule,
    participants: &[ParticipantSubmission],
    k: usize,
) -> Vec<CandidateSlot> {
    let mut ranked = rank_candidates(grid, participants);
    ranked.truncate(k);
    ranked
}

/// Availability of one cell for the heatmap
#[derive(Serialize, Deserialize, Debug, Copy, Clone, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HeatmapCell {
    pub cell: TimeCell,
    pub available_count: usize,
    /// `0..=MAX_LEVEL`
    pub level: usize,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Heatmap {
    pub total_count: usize,
    pub cells: Vec<HeatmapCell>,
}

impl Heatmap {
    pub fn get(&self, cell: TimeCell) -> Option<&HeatmapCell> {
        self.cells
            .binary_search_by_key(&cell, |entry| entry.cell)
            .ok()
            .map(|index| &self.cells[index])
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// `ceil(available / total * MAX_LEVEL)`, capped at `MAX_LEVEL`
pub fn level(available_count: usize, total_count: usize) -> usize {
    if total_count == 0 {
        0
    } else {
        Integer::div_ceil(&(available_count * MAX_LEVEL), &total_count).min(MAX_LEVEL)
    }
}

/// Availability counts for every cell of `range`, in chronological order.
/// Without a date range there is nothing to compute.
pub fn heatmap(range: Option<&DateRange>, participants: &[ParticipantSubmission]) -> Heatmap {
    let range = match range {
        Some(range) => range,
        None => return Heatmap::default(),
    };

    let total_count = participants.len();

    Heatmap {
        total_count,
        cells: range
            .cells()
            .map(|cell| {
                let available_count = available_count(participants, cell);
                HeatmapCell {
                    cell,
                    available_count,
                    level: level(available_count, total_count),
                }
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn cell(day: u32, hour: u8) -> TimeCell {
        TimeCell::new(NaiveDate::from_ymd_opt(2024, 1, day).unwrap(), hour).unwrap()
    }

    fn submission(name: &str, marks: &[(TimeCell, Status)]) -> ParticipantSubmission {
        ParticipantSubmission::new(
            name,
            marks.iter().copied().collect(),
            Utc.timestamp_opt(0, 0).unwrap(),
        )
    }

    #[test]
    fn unset_cells_merge_as_available() {
        let merged = merge_submissions(&[
            submission("a", &[(cell(1, 10), Status::Available)]),
            submission("b", &[]),
        ]);

        assert_eq!(merged.get(cell(1, 10)), Some(Status::Available));
        assert_eq!(merged.len(), 1);
    }

    #[test]
    fn merge_ignores_foreign_hours() {
        let early = TimeCell {
            date: cell(1, 9).date,
            hour: 6,
        };
        let merged = merge_submissions(&[submission("a", &[(early, Status::Unavailable)])]);

        assert!(merged.is_empty());
    }

    #[test]
    fn ties_rank_chronologically() {
        let participants = vec![
            submission(
                "a",
                &[
                    (cell(2, 9), Status::Available),
                    (cell(1, 15), Status::Available),
                    (cell(1, 11), Status::Available),
                ],
            ),
            submission("b", &[(cell(2, 9), Status::Available)]),
        ];
        let grid = merge_submissions(&participants);

        let ranked = rank_candidates(&grid, &participants);

        assert_eq!(
            ranked.iter().map(CandidateSlot::cell).collect::<Vec<_>>(),
            vec![cell(2, 9), cell(1, 11), cell(1, 15)]
        );
        assert_eq!(ranked[0].available_count, 2);
        assert!(ranked.iter().all(|slot| slot.total_count == 2));
    }

    #[test]
    fn top_candidates_truncates() {
        let marks = hours()
            .map(|hour| (cell(3, hour), Status::Available))
            .collect::<Vec<_>>();
        let participants = vec![submission("a", &marks)];
        let grid = merge_submissions(&participants);

        assert_eq!(rank_candidates(&grid, &participants).len(), 15);
        assert_eq!(top_candidates(&grid, &participants, 10).len(), 10);
    }

    #[test]
    fn heatmap_levels() {
        assert_eq!(level(0, 0), 0);
        assert_eq!(level(0, 3), 0);
        assert_eq!(level(1, 3), 2);
        assert_eq!(level(2, 3), 3);
        assert_eq!(level(3, 3), 4);
        assert_eq!(level(1, 8), 1);
    }

    #[test]
    fn heatmap_covers_the_range() {
        let participants = vec![
            submission("a", &[(cell(1, 10), Status::Available)]),
            submission("b", &[(cell(1, 10), Status::Unavailable)]),
        ];
        let range = DateRange::new(cell(1, 9).date, cell(2, 9).date).unwrap();

        let map = heatmap(Some(&range), &participants);

        assert_eq!(map.cells.len(), 30);
        assert_eq!(map.total_count, 2);
        assert_eq!(
            map.get(cell(1, 10)),
            Some(&HeatmapCell {
                cell: cell(1, 10),
                available_count: 1,
                level: 2
            })
        );
        assert_eq!(map.get(cell(2, 10)).map(|c| c.level), Some(0));
        assert!(heatmap(None, &participants).is_empty());
    }
}
