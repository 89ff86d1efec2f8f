pub mod aggregate;
pub mod calendar;
pub mod config;
pub mod data;
pub mod geometry;
pub mod participant;
pub mod selection;
pub mod session;
pub mod store;
pub mod time;
#[cfg(feature = "wasm")]
pub mod wasm;

pub use crate::aggregate::{merge_submissions, rank_candidates, top_candidates, CandidateSlot};
pub use crate::data::{DateRange, Schedule, Status, TimeCell, ValidationError};
pub use crate::participant::ParticipantSubmission;
pub use crate::selection::GridSelectionController;
pub use crate::session::{Session, SessionId};
pub use crate::store::{Persistence, SaveOutcome};

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc};
    use proptest::prelude::*;

    fn cell(day: u32, hour: u8) -> crate::data::TimeCell {
        crate::data::TimeCell::new(NaiveDate::from_ymd_opt(2024, 1, day).unwrap(), hour).unwrap()
    }

    #[test]
    fn ranking_and_merge_are_independent() {
        use crate::aggregate::{merge_submissions, rank_candidates};
        use crate::data::{Schedule, Status};
        use crate::participant::ParticipantSubmission;

        let mark = |status| {
            let mut schedule = Schedule::new();
            schedule.set(cell(1, 10), status);
            schedule
        };
        let now = Utc.timestamp_opt(0, 0).unwrap();

        let participants = vec![
            ParticipantSubmission::new("a", mark(Status::Available), now),
            ParticipantSubmission::new("b", mark(Status::Unavailable), now),
            ParticipantSubmission::new("c", mark(Status::Available), now),
        ];

        let merged = merge_submissions(&participants);
        let ranked = rank_candidates(&merged, &participants);

        assert_eq!(merged.get(cell(1, 10)), Some(Status::Unavailable));
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].cell(), cell(1, 10));
        assert_eq!((ranked[0].available_count, ranked[0].total_count), (2, 3));
    }

    #[test]
    fn aggregated_grid_round_trips() {
        use crate::data::{Schedule, Status};

        let grid: Schedule = vec![
            (cell(1, 9), Status::Available),
            (cell(1, 23), Status::Unavailable),
            (cell(4, 14), Status::Unavailable),
        ]
        .into_iter()
        .collect();

        let persisted = serde_json::to_value(&grid).unwrap();
        assert_eq!(persisted["2024-01-01"]["23"], "unavailable");

        let restored: Schedule = serde_json::from_value(persisted).unwrap();
        assert_eq!(restored, grid);
        assert_eq!(restored.unavailable_hours(cell(1, 9).date), vec![23]);
    }

    #[test]
    fn drag_then_submit() {
        use crate::config::Settings;
        use crate::data::{DateRange, Schedule, Status};
        use crate::geometry::{GridGeometry, Point, UniformGrid};
        use crate::participant::ParticipantSubmission;
        use crate::selection::{GridSelectionController, PointerSource, Release};
        use crate::session::{Session, SessionId};
        use crate::store::{Key, MemoryBackend, Persistence, SaveOutcome};

        let settings = Settings::default();
        let id = SessionId::new("k3x9q2m7a");
        let range = DateRange::new(cell(1, 9).date, cell(3, 9).date).unwrap();
        let grid = UniformGrid::new(range.days().collect(), Point::new(0.0, 0.0), 10.0, 10.0);

        let persistence = Persistence::new(id.clone(), MemoryBackend::new(), MemoryBackend::new());
        let mut controller = GridSelectionController::new(grid.clone(), persistence, Schedule::new(), &settings);

        let anchor = Point::new(5.0, 5.0);
        assert!(controller.pointer_down(PointerSource::Mouse, anchor, grid.cell_at(anchor), 0));
        controller.pointer_move(Point::new(15.0, 15.0));

        match controller.pointer_up() {
            Release::Batch { cells, status, saved } => {
                assert_eq!(cells, vec![cell(1, 9), cell(2, 9), cell(1, 10), cell(2, 10)]);
                assert_eq!(status, Some(Status::Unavailable));
                assert_eq!(saved, Some(SaveOutcome::Remote));
            }
            other => panic!("unexpected release {:?}", other),
        }

        let draft: Option<Schedule> = controller.sink().load(Key::Draft).unwrap();
        assert_eq!(draft.as_ref(), Some(controller.schedule()));

        let mut persistence = Persistence::new(id.clone(), MemoryBackend::new(), MemoryBackend::new());
        let mut session = Session::new(id, settings);
        session.set_date_range(range, &mut persistence).unwrap();

        let mut free = Schedule::new();
        free.set(cell(1, 9), Status::Available);
        free.set(cell(3, 12), Status::Available);

        let now = Utc.timestamp_opt(1_704_067_200, 0).unwrap();
        session
            .submit(ParticipantSubmission::new("ana", controller.into_schedule(), now), &mut persistence)
            .unwrap();
        session
            .submit(ParticipantSubmission::new("ben", free, now), &mut persistence)
            .unwrap();

        let aggregated = session.aggregated().as_loaded().unwrap();
        assert!(aggregated.is_unavailable(cell(1, 9)));
        assert_eq!(aggregated.get(cell(3, 12)), Some(Status::Available));

        let best = session.best_times();
        assert_eq!(
            best.iter().map(|slot| slot.cell()).collect::<Vec<_>>(),
            vec![cell(1, 9), cell(3, 12)]
        );
        assert_eq!(session.heatmap().get(cell(3, 12)).map(|c| c.level), Some(2));
    }

    fn marks() -> impl Strategy<Value = Vec<(u32, u8, bool)>> {
        prop::collection::vec((1..=3u32, 9..24u8, any::<bool>()), 0..20)
    }

    proptest! {
        #[test]
        fn prop_any_veto_makes_a_cell_unavailable(submissions in prop::collection::vec(marks(), 0..6)) {
            use crate::aggregate::merge_submissions;
            use crate::data::{Schedule, Status};
            use crate::participant::ParticipantSubmission;
            use std::collections::BTreeSet;

            let now = Utc.timestamp_opt(0, 0).unwrap();
            let participants: Vec<ParticipantSubmission> = submissions
                .iter()
                .enumerate()
                .map(|(i, marks)| {
                    let schedule: Schedule = marks
                        .iter()
                        .map(|&(day, hour, busy)| {
                            let status = if busy { Status::Unavailable } else { Status::Available };
                            (cell(day, hour), status)
                        })
                        .collect();
                    ParticipantSubmission::new(&i.to_string(), schedule, now)
                })
                .collect();

            let merged = merge_submissions(&participants);
            let marked: BTreeSet<_> = participants
                .iter()
                .flat_map(|p| p.schedule.cells().map(|(cell, _)| cell))
                .collect();

            prop_assert_eq!(merged.len(), marked.len());
            for cell in marked {
                let vetoed = participants.iter().any(|p| p.schedule.is_unavailable(cell));
                let expected = if vetoed { Status::Unavailable } else { Status::Available };
                prop_assert_eq!(merged.get(cell), Some(expected));
            }
        }
    }
}
