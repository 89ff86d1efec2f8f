#![no_main]
use libfuzzer_sys::fuzz_target;
use std::collections::BTreeSet;
use zeitraster_libs::{
    aggregate::{heatmap, rank_candidates, MAX_LEVEL},
    data::DateRange,
    merge_submissions, ParticipantSubmission, Status,
};

fuzz_target!(|data: Vec<ParticipantSubmission>| {
    #[cfg(feature = "log")]
    let _ = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{}][{}] {}",
                record.target(),
                record.level(),
                message
            ))
        })
        .level(log::LevelFilter::Debug)
        .chain(std::io::stdout())
        .apply();

    let merged = merge_submissions(&data);

    for (cell, status) in merged.cells() {
        let vetoed = data.iter().any(|p| p.schedule.is_unavailable(cell));
        assert_eq!(
            status == Status::Unavailable,
            vetoed,
            "Merged status of {:?} disagrees with the submissions",
            cell
        );
    }

    let ranked = rank_candidates(&merged, &data);
    assert!(
        ranked
            .windows(2)
            .all(|pair| pair[0].available_count > pair[1].available_count
                || (pair[0].available_count == pair[1].available_count
                    && pair[0].cell() < pair[1].cell())),
        "Candidates are not ordered by count, then chronologically"
    );

    let unique = ranked.iter().map(|slot| slot.cell()).collect::<BTreeSet<_>>();
    assert_eq!(unique.len(), ranked.len(), "A cell was ranked twice");

    if let (Some(first), Some(last)) = (merged.dates().next(), merged.dates().last()) {
        if let Ok(range) = DateRange::new(first, last) {
            let map = heatmap(Some(&range), &data);
            assert!(map.cells.iter().all(|c| c.level <= MAX_LEVEL));
            assert!(map.cells.iter().all(|c| c.available_count <= data.len()));
        }
    }
});
