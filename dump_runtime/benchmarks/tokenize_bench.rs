use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use dump_runtime::{extract_token, tokenize_str};

const MARKER_LINE: &str = "12:06:13.179169 {0x00002e80} [debug] python : dumper.py:30 : ##EmpireID:empire_id: 2, name: Binding_2_pid_2_AI_1_RIdx_4_Aggressive, turn: 1";
const PLAIN_LINE: &str = "12:06:13.179201 {0x00002e80} [debug] python : PlanetUtilsAI.py:112 : evaluating colony targets for system 431";

fn synthetic_log(lines: usize) -> String {
    let mut log = String::new();
    for index in 0..lines {
        if index % 50 == 0 {
            log.push_str(&format!(
                "12:06:13.179169 {{0x00002e80}} [debug] python : dumper.py:44 : ##Output:turn: {}, PP: 12.5, RP: 4.0\n",
                index / 50
            ));
        } else {
            log.push_str(PLAIN_LINE);
            log.push('\n');
        }
    }
    log
}

fn bench_extract(c: &mut Criterion) {
    let mut group = c.benchmark_group("extract_token");
    group.bench_function("marker", |b| b.iter(|| extract_token(black_box(MARKER_LINE))));
    group.bench_function("plain", |b| b.iter(|| extract_token(black_box(PLAIN_LINE))));
    group.finish();
}

fn bench_tokenize(c: &mut Criterion) {
    let mut group = c.benchmark_group("tokenize_str");

    for lines in [1_000usize, 10_000, 100_000] {
        let log = synthetic_log(lines);
        group.throughput(Throughput::Bytes(log.len() as u64));
        group.bench_with_input(BenchmarkId::new("lines", lines), &log, |b, log| {
            b.iter(|| tokenize_str(black_box(log)))
        });
    }

    group.finish();
}

criterion_group!(tokenize_benches, bench_extract, bench_tokenize);
criterion_main!(tokenize_benches);
