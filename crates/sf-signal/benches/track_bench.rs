//! Track storage benchmarks

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use sf_core::Sample;
use sf_signal::{InsertMode, ReaderMode, Signal, Track};

const SECOND: u64 = 48_000;

fn bench_append(c: &mut Criterion) {
    let block: Vec<Sample> = (0..4096).collect();

    c.bench_function("track_append_10s", |b| {
        b.iter(|| {
            let track = Track::new();
            for _ in 0..(10 * SECOND / 4096) {
                track.append(black_box(&block)).unwrap();
            }
            track
        })
    });
}

fn bench_insert_delete_middle(c: &mut Criterion) {
    let track = Track::with_length(60 * SECOND).unwrap();
    let block: Vec<Sample> = vec![1; 1024];

    c.bench_function("track_insert_delete_middle", |b| {
        b.iter(|| {
            track.insert(black_box(30 * SECOND), &block).unwrap();
            track.delete_range(black_box(30 * SECOND), 1024).unwrap();
        })
    });
}

fn bench_read(c: &mut Criterion) {
    let signal = Signal::new();
    signal.append_track(0).unwrap();
    {
        let mut writer = signal.open_writer(InsertMode::Append, 0, 0, 0).unwrap();
        for i in 0..(10 * SECOND) {
            writer.write_sample(i as Sample).unwrap();
        }
    }

    c.bench_function("reader_10s", |b| {
        b.iter(|| {
            let reader = signal
                .open_reader(ReaderMode::SinglePassForward, 0, 0, 10 * SECOND - 1)
                .unwrap();
            reader.fold(0i64, |acc, s| acc + s as i64)
        })
    });
}

criterion_group!(benches, bench_append, bench_insert_delete_middle, bench_read);
criterion_main!(benches);
