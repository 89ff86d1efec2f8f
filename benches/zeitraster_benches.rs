use chrono::{NaiveDate, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use zeitraster_libs::aggregate::heatmap;
use zeitraster_libs::{merge_submissions, rank_candidates, DateRange, ParticipantSubmission, Status};

/// `count` participants over a month, each blocking a different stripe of hours
fn participants(range: &DateRange, count: usize) -> Vec<ParticipantSubmission> {
    let now = Utc.timestamp_opt(1_704_067_200, 0).unwrap();

    (0..count)
        .map(|i| {
            let schedule = range
                .cells()
                .enumerate()
                .map(|(n, cell)| {
                    let status = if (n + i) % 3 == 0 {
                        Status::Unavailable
                    } else {
                        Status::Available
                    };
                    (cell, status)
                })
                .collect();
            ParticipantSubmission::new(&format!("participant-{}", i), schedule, now)
        })
        .collect()
}

fn aggregate_month(c: &mut Criterion) {
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    let range = DateRange::starting_at(start, 30).unwrap();
    let submissions = participants(&range, 25);
    let merged = merge_submissions(&submissions);

    c.bench_function("merge_submissions", |b| {
        b.iter(|| black_box(merge_submissions(black_box(&submissions))))
    });

    c.bench_function("rank_candidates", |b| {
        b.iter(|| black_box(rank_candidates(black_box(&merged), black_box(&submissions))))
    });

    c.bench_function("heatmap", |b| {
        b.iter(|| black_box(heatmap(Some(&range), black_box(&submissions))))
    });
}

criterion_group!(benches, aggregate_month);
criterion_main!(benches);
