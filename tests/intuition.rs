use mprows::intuit::{RowIntuiter, TypeIntuiter};
use mprows::types::{DataType, Value};

fn text_rows(rows: &[&[&str]]) -> Vec<Vec<Value>> {
    rows.iter()
        .map(|r| r.iter().map(|c| Value::Utf8((*c).to_owned())).collect())
        .collect()
}

#[test]
fn header_detection_on_banner_file() {
    let sample = text_rows(&[
        &["Report generated 2020"],
        &[""],
        &["Name", "Age", "City"],
        &["Alice", "30", "NYC"],
        &["Bob", "25", "LA"],
    ]);
    let rc = RowIntuiter::new().intuit(&sample).unwrap();
    assert_eq!(rc.header_rows, vec![2]);
    assert_eq!(rc.data_start_row, 3);
}

#[test]
fn sample_bound_is_respected() {
    // 200 rows, but the intuiter may only look at the first 100.
    let mut sample = text_rows(&[&["Id", "Amount"]]);
    for i in 0..199 {
        sample.push(vec![
            Value::Utf8(format!("{i}")),
            Value::Utf8(format!("{}.5", i * 3)),
        ]);
    }
    let rc = RowIntuiter::new().intuit(&sample).unwrap();
    assert_eq!(rc.header_rows, vec![0]);
    assert_eq!(rc.data_start_row, 1);

    let tiny = RowIntuiter::with_sample_rows(10);
    assert_eq!(tiny.sample_rows(), 10);
    let rc = tiny.intuit(&sample).unwrap();
    assert_eq!(rc.data_start_row, 1);
}

#[test]
fn type_resolution_is_pass_count_independent() {
    let rows = text_rows(&[
        &["1", "x", "2020-01-01"],
        &["2", "", "2020-02-01"],
        &["3.5", "y", "2020-03-01 08:00:00"],
    ]);

    let mut once = TypeIntuiter::new(3);
    for row in &rows {
        once.observe_row(row);
    }

    // Feeding the same evidence twice must not change the resolution.
    let mut twice = TypeIntuiter::new(3);
    for row in rows.iter().chain(rows.iter()) {
        twice.observe_row(row);
    }

    // Splitting the stream and merging must match either.
    let mut left = TypeIntuiter::new(3);
    let mut right = TypeIntuiter::new(3);
    left.observe_row(&rows[0]);
    right.observe_row(&rows[1]);
    right.observe_row(&rows[2]);
    let merged = left.merge(right);

    let expected = vec![
        (DataType::Float64, false),
        (DataType::Utf8, true),
        (DataType::DateTime, false),
    ];
    assert_eq!(once.resolve(), expected);
    assert_eq!(twice.resolve(), expected);
    assert_eq!(merged.resolve(), expected);
}

#[test]
fn short_rows_count_as_missing_values() {
    let mut ti = TypeIntuiter::new(2);
    ti.observe_row(&[Value::Utf8("7".into()), Value::Utf8("a".into())]);
    ti.observe_row(&[Value::Utf8("9".into())]);
    let resolved = ti.resolve();
    assert_eq!(resolved[0], (DataType::Int64, false));
    assert_eq!(resolved[1], (DataType::Utf8, true));
}
