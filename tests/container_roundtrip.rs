use std::cell::RefCell;
use std::io::{Cursor, Read, Seek, SeekFrom};
use std::rc::Rc;

use chrono::NaiveDate;

use mprows::container::{
    read_metadata, write_to_path, Compression, Metadata, MprFile, MprWriter, WriteOptions,
};
use mprows::types::{Column, DataType, Schema, Value};
use mprows::MprError;

fn people_schema() -> Schema {
    Schema::new(vec![
        Column::new(0, "id", DataType::Int64),
        Column::new(1, "name", DataType::Utf8),
        Column::new(2, "score", DataType::Float64),
    ])
}

fn people_rows() -> Vec<Vec<Value>> {
    vec![
        vec![Value::Int64(1), Value::Utf8("Ada".into()), Value::Float64(98.5)],
        vec![Value::Int64(2), Value::Utf8("Grace".into()), Value::Null],
        vec![Value::Int64(3), Value::Utf8("Edsger".into()), Value::Float64(77.0)],
    ]
}

fn write_bytes(rows: Vec<Vec<Value>>, meta: Metadata, options: &WriteOptions) -> Vec<u8> {
    let mut writer = MprWriter::new(Cursor::new(Vec::new()), options);
    writer.write_rows(rows).unwrap();
    writer.finish(meta).unwrap().into_inner()
}

#[test]
fn round_trip_preserves_values_and_order() {
    let rows = people_rows();
    let bytes = write_bytes(
        rows.clone(),
        Metadata::new(people_schema()),
        &WriteOptions::default(),
    );

    let mut file = MprFile::from_reader(Cursor::new(bytes)).unwrap();
    assert_eq!(file.n_rows(), 3);
    let back: Vec<Vec<Value>> = file.raw_rows().unwrap().map(|r| r.unwrap()).collect();
    assert_eq!(back, rows);
}

#[test]
fn round_trip_covers_every_scalar_type() {
    let date = NaiveDate::from_ymd_opt(2015, 7, 1).unwrap();
    let rows = vec![vec![
        Value::Null,
        Value::Bool(false),
        Value::Int64(i64::MIN),
        Value::Float64(-0.25),
        Value::Date(date),
        Value::Time(chrono::NaiveTime::from_hms_opt(8, 5, 0).unwrap()),
        Value::DateTime(date.and_hms_opt(23, 0, 59).unwrap()),
        Value::Utf8("päck".into()),
    ]];
    let bytes = write_bytes(
        rows.clone(),
        Metadata::new(Schema::with_width(8)),
        &WriteOptions::default(),
    );
    let mut file = MprFile::from_reader(Cursor::new(bytes)).unwrap();
    let back: Vec<Vec<Value>> = file.raw_rows().unwrap().map(|r| r.unwrap()).collect();
    assert_eq!(back, rows);
}

#[test]
fn round_trip_under_every_compression() {
    for compression in [Compression::None, Compression::Gzip, Compression::Zlib] {
        let options = WriteOptions {
            compression,
            // Several small blocks instead of one.
            rows_per_block: 2,
        };
        let rows = people_rows();
        let bytes = write_bytes(rows.clone(), Metadata::new(people_schema()), &options);
        let mut file = MprFile::from_reader(Cursor::new(bytes)).unwrap();
        assert_eq!(file.trailer().compression, compression);
        let back: Vec<Vec<Value>> = file.raw_rows().unwrap().map(|r| r.unwrap()).collect();
        assert_eq!(back, rows, "compression {compression:?}");
    }
}

#[test]
fn writer_owns_the_row_count() {
    let mut meta = Metadata::new(people_schema());
    meta.n_rows = 999; // stale caller bookkeeping
    let bytes = write_bytes(people_rows(), meta, &WriteOptions::default());
    let file = MprFile::from_reader(Cursor::new(bytes)).unwrap();
    assert_eq!(file.metadata().n_rows, 3);
}

/// Read+Seek wrapper recording the byte range of every read call.
struct TrackingReader {
    inner: Cursor<Vec<u8>>,
    pos: u64,
    reads: Rc<RefCell<Vec<(u64, u64)>>>,
}

impl Read for TrackingReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        if n > 0 {
            self.reads.borrow_mut().push((self.pos, n as u64));
        }
        self.pos += n as u64;
        Ok(n)
    }
}

impl Seek for TrackingReader {
    fn seek(&mut self, from: SeekFrom) -> std::io::Result<u64> {
        self.pos = self.inner.seek(from)?;
        Ok(self.pos)
    }
}

#[test]
fn metadata_read_never_touches_the_row_block() {
    let bytes = write_bytes(
        people_rows(),
        Metadata::new(people_schema()),
        &WriteOptions::default(),
    );

    let reads = Rc::new(RefCell::new(Vec::new()));
    let tracker = TrackingReader {
        inner: Cursor::new(bytes),
        pos: 0,
        reads: Rc::clone(&reads),
    };

    let file = MprFile::from_reader(tracker).unwrap();
    let rows_end = file.trailer().rows_offset + file.trailer().rows_len;
    assert!(file.trailer().rows_len > 0);
    assert_eq!(file.metadata().schema, people_schema());

    for &(offset, len) in reads.borrow().iter() {
        assert!(
            offset >= rows_end,
            "read of {len} bytes at {offset} overlaps the row block (ends {rows_end})"
        );
    }
}

#[test]
fn corrupt_row_block_still_yields_metadata() {
    let mut bytes = write_bytes(
        people_rows(),
        Metadata::new(people_schema()),
        &WriteOptions::default(),
    );

    // Clobber the middle of the row block; trailer and metadata untouched.
    let probe = MprFile::from_reader(Cursor::new(bytes.clone())).unwrap();
    let mid = (probe.trailer().rows_len / 2) as usize;
    bytes[mid] ^= 0xff;

    let mut file = MprFile::from_reader(Cursor::new(bytes)).unwrap();
    assert_eq!(file.metadata().schema, people_schema());

    let results: Vec<_> = file.raw_rows().unwrap().collect();
    assert!(
        results
            .iter()
            .any(|r| matches!(r, Err(MprError::CorruptContainer { .. }))),
        "corrupted rows decoded silently: {results:?}"
    );
}

#[test]
fn any_truncation_is_detected() {
    let bytes = write_bytes(
        people_rows(),
        Metadata::new(people_schema()),
        &WriteOptions::default(),
    );

    for cut in [1usize, 7, 19] {
        // Remove bytes from inside the row block; the file shrinks and the
        // trailer is no longer intact at the end.
        let mut truncated = bytes.clone();
        truncated.drain(4..4 + cut);

        let outcome = MprFile::from_reader(Cursor::new(truncated)).and_then(|mut f| {
            f.raw_rows()?.collect::<Result<Vec<_>, _>>()?;
            Ok(())
        });
        assert!(
            matches!(outcome, Err(MprError::CorruptContainer { .. })),
            "truncation of {cut} bytes not detected: {outcome:?}"
        );
    }
}

#[test]
fn data_rows_skip_preamble_and_enforce_arity() {
    let rows = vec![
        vec![Value::Utf8("Quarterly report".into())],
        vec![Value::Utf8("name".into()), Value::Utf8("score".into())],
        vec![Value::Utf8("Ada".into()), Value::Int64(1)],
        vec![Value::Utf8("Grace".into()), Value::Int64(2)],
    ];
    let mut meta = Metadata::new(Schema::new(vec![
        Column::new(0, "name", DataType::Utf8),
        Column::new(1, "score", DataType::Int64),
    ]));
    meta.row_spec.header_rows = vec![1];
    meta.row_spec.comment_rows = vec![0];
    meta.row_spec.data_start_row = 2;

    let bytes = write_bytes(rows, meta, &WriteOptions::default());
    let mut file = MprFile::from_reader(Cursor::new(bytes)).unwrap();
    let data: Vec<Vec<Value>> = file.data_rows().unwrap().map(|r| r.unwrap()).collect();
    assert_eq!(data.len(), 2);
    assert_eq!(data[0][0], Value::Utf8("Ada".into()));
}

#[test]
fn ragged_data_row_is_a_schema_mismatch() {
    let rows = vec![
        vec![Value::Int64(1), Value::Utf8("ok".into())],
        vec![Value::Int64(2)],
    ];
    let bytes = write_bytes(
        rows,
        Metadata::new(Schema::new(vec![
            Column::new(0, "id", DataType::Int64),
            Column::new(1, "name", DataType::Utf8),
        ])),
        &WriteOptions::default(),
    );

    let mut file = MprFile::from_reader(Cursor::new(bytes)).unwrap();
    let results: Vec<_> = file.data_rows().unwrap().collect();
    assert!(results[0].is_ok());
    assert!(matches!(
        results[1],
        Err(MprError::SchemaMismatch { .. })
    ));
    assert_eq!(results.len(), 2, "iterator must fuse after the mismatch");
}

#[test]
fn empty_container_round_trips() {
    let bytes = write_bytes(
        Vec::new(),
        Metadata::new(Schema::default()),
        &WriteOptions::default(),
    );
    let mut file = MprFile::from_reader(Cursor::new(bytes)).unwrap();
    assert_eq!(file.n_rows(), 0);
    assert_eq!(file.raw_rows().unwrap().count(), 0);
}

#[test]
fn early_stop_reads_only_a_prefix() {
    let rows: Vec<Vec<Value>> = (0..5000)
        .map(|i| vec![Value::Int64(i), Value::Utf8(format!("row{i}"))])
        .collect();
    let options = WriteOptions {
        rows_per_block: 100,
        ..WriteOptions::default()
    };
    let bytes = write_bytes(rows, Metadata::new(Schema::with_width(2)), &options);

    let mut file = MprFile::from_reader(Cursor::new(bytes)).unwrap();
    let first_ten: Vec<Vec<Value>> = file
        .raw_rows()
        .unwrap()
        .take(10)
        .map(|r| r.unwrap())
        .collect();
    assert_eq!(first_ten.len(), 10);
    assert_eq!(first_ten[9][0], Value::Int64(9));
}

#[test]
fn path_level_write_is_atomic_and_readable() {
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("people.mpr");

    let n = write_to_path(
        &dest,
        people_rows(),
        Metadata::new(people_schema()),
        &WriteOptions::default(),
    )
    .unwrap();
    assert_eq!(n, 3);

    // No temp residue next to the container.
    let names: Vec<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["people.mpr".to_string()]);

    let meta = read_metadata(&dest).unwrap();
    assert_eq!(meta.n_rows, 3);
    assert_eq!(meta.schema, people_schema());
}
