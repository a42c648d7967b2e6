use std::path::PathBuf;

use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use nba_winpct_terminal::config::ArtifactPaths;
use nba_winpct_terminal::dataset::ReferenceDataset;
use nba_winpct_terminal::pipeline::{LoadOptions, Pipeline};

fn fixture_paths() -> ArtifactPaths {
    let mut root = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    root.push("tests");
    root.push("fixtures");
    root.push("complete");
    ArtifactPaths::from_root(root)
}

fn synthetic_csv(rows: usize) -> String {
    let mut out = String::from("team,season,ortg,drtg,pace,efg_pct\n");
    for i in 0..rows {
        let marker = if i % 3 == 0 { "*" } else { "" };
        out.push_str(&format!(
            "Team {}{marker},{},{:.1},{:.1},{:.1},{:.3}\n",
            i % 30,
            1990 + i / 30,
            105.0 + (i % 17) as f64,
            104.0 + (i % 13) as f64,
            95.0 + (i % 9) as f64,
            0.49 + (i % 11) as f64 * 0.005
        ));
    }
    out
}

fn bench_pipeline(c: &mut Criterion) {
    let paths = fixture_paths();
    c.bench_function("load_fixture_artifacts", |b| {
        b.iter(|| Pipeline::load(black_box(&paths), LoadOptions::default()).unwrap())
    });

    let features: Vec<String> = ["ortg", "drtg", "pace", "efg_pct"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let csv = synthetic_csv(1_000);
    c.bench_function("parse_reference_dataset_1k_rows", |b| {
        b.iter(|| ReferenceDataset::from_reader(black_box(csv.as_bytes()), &features).unwrap())
    });

    let pipeline = Pipeline::load(&paths, LoadOptions::default()).unwrap();
    let input = pipeline
        .resolve_team_season("Boston Celtics", "2024")
        .unwrap();
    c.bench_function("predict_team_season", |b| {
        b.iter(|| pipeline.predict(black_box(&input)).unwrap())
    });
}

criterion_group!(benches, bench_pipeline);
criterion_main!(benches);
