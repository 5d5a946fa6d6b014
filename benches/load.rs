use std::io::Cursor;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use mprows::container::MprFile;
use mprows::load::{load_rows_to_writer, LoadOptions};
use mprows::source::VecSource;
use mprows::types::Value;

fn synthetic_source(rows: usize) -> VecSource {
    let mut data = vec![
        vec![Value::Utf8("Synthetic export".into())],
        vec![
            Value::Utf8("Id".into()),
            Value::Utf8("Amount".into()),
            Value::Utf8("Label".into()),
        ],
    ];
    for i in 0..rows {
        data.push(vec![
            Value::Utf8(format!("{i}")),
            Value::Utf8(format!("{}.25", i % 997)),
            Value::Utf8(format!("label-{}", i % 13)),
        ]);
    }
    VecSource::new(data)
}

fn bench_fused_load(c: &mut Criterion) {
    let source = synthetic_source(10_000);
    c.bench_function("fused_load_10k_rows", |b| {
        b.iter(|| {
            let mut source = source.clone();
            let (_, report) = load_rows_to_writer(
                &mut source,
                Cursor::new(Vec::new()),
                &LoadOptions::default(),
            )
            .unwrap();
            black_box(report.rows)
        })
    });
}

fn bench_metadata_read(c: &mut Criterion) {
    let mut source = synthetic_source(10_000);
    let (cursor, _) = load_rows_to_writer(
        &mut source,
        Cursor::new(Vec::new()),
        &LoadOptions::default(),
    )
    .unwrap();
    let bytes = cursor.into_inner();

    c.bench_function("read_metadata_10k_rows", |b| {
        b.iter(|| {
            let file = MprFile::from_reader(Cursor::new(bytes.clone())).unwrap();
            black_box(file.metadata().n_rows)
        })
    });
}

criterion_group!(benches, bench_fused_load, bench_metadata_read);
criterion_main!(benches);
