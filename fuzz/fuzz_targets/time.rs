#![no_main]
use libfuzzer_sys::fuzz_target;
use std::collections::HashSet;
use zeitraster_libs::time::{TimeMerge, TimeRange, Windowed};

fuzz_target!(|data: (Vec<TimeRange<u8>>, u8)| {
    // Hour runs never come near the top of u8
    let runs: Vec<TimeRange<u8>> = data.0.into_iter().filter(|run| run.end() < 128).collect();
    let duration = data.1 % 128;

    let windows = runs.iter().windowed(duration);
    assert!(
        windows.iter().all(|w| w.end() - w.start() == duration - 1),
        "Duration should be the same for all windows"
    );

    let hours = runs.iter().windowed(1).into_iter().collect::<HashSet<_>>();
    let merged = runs.iter().time_merge();

    assert!(
        merged
            .iter()
            .zip(merged.iter().skip(1))
            .all(|(l, r)| l.end() + 1 < r.start()),
        "Merged runs overlap or touch"
    );
    assert_eq!(
        merged.iter().map(|run| usize::from(run.len())).sum::<usize>(),
        hours.len(),
        "Merged runs cover a different number of hours"
    );
    assert_eq!(
        merged.iter().windowed(1).into_iter().collect::<HashSet<_>>(),
        hours,
        "Merging changed the covered hours"
    );
});
