use mprows::stats::Stats;
use mprows::types::{Column, DataType, Schema, Value};

fn schema() -> Schema {
    Schema::new(vec![
        Column::new(0, "amount", DataType::Float64),
        Column::new(1, "label", DataType::Utf8),
    ])
}

fn rows() -> Vec<Vec<Value>> {
    let mut rows = Vec::new();
    for i in 0..500i64 {
        let amount = if i % 11 == 0 {
            Value::Null
        } else {
            Value::Float64((i as f64) * 1.5 - 100.0)
        };
        rows.push(vec![amount, Value::Utf8(format!("label-{}", i % 7))]);
    }
    rows
}

fn run(rows: &[Vec<Value>]) -> Stats {
    let mut stats = Stats::new(2);
    for row in rows {
        stats.update_row(row);
    }
    stats
}

#[test]
fn permutations_agree() {
    let base = rows();

    let mut reversed = base.clone();
    reversed.reverse();

    // Deterministic interleave: evens then odds.
    let mut interleaved: Vec<Vec<Value>> = base.iter().step_by(2).cloned().collect();
    interleaved.extend(base.iter().skip(1).step_by(2).cloned());

    let a = run(&base).finalize(&schema());
    let b = run(&reversed).finalize(&schema());
    let c = run(&interleaved).finalize(&schema());

    for (x, y) in [(&a, &b), (&a, &c)] {
        assert_eq!(x[0].count, y[0].count);
        assert_eq!(x[0].nulls, y[0].nulls);
        assert_eq!(x[0].min, y[0].min);
        assert_eq!(x[0].max, y[0].max);
        assert!((x[0].mean.unwrap() - y[0].mean.unwrap()).abs() < 1e-9);
        assert!((x[0].std.unwrap() - y[0].std.unwrap()).abs() < 1e-9);
        assert_eq!(x[1], y[1]);
    }
}

#[test]
fn finalize_is_incremental() {
    let all = rows();
    let mut stats = Stats::new(2);

    for row in &all[..100] {
        stats.update_row(row);
    }
    let early = stats.finalize(&schema());
    assert_eq!(early[0].count, 100);

    for row in &all[100..] {
        stats.update_row(row);
    }
    let late = stats.finalize(&schema());
    assert_eq!(late[0].count, 500);
    assert!(late[0].max >= early[0].max);
}

#[test]
fn unique_tracking_saturates() {
    let mut stats = Stats::new(1);
    for i in 0..500 {
        stats.update(0, &Value::Utf8(format!("value-{i}")));
    }
    let schema = Schema::new(vec![Column::new(0, "v", DataType::Utf8)]);
    let out = &stats.finalize(&schema)[0];
    assert_eq!(out.nuniques, Some(100));
    assert!(out.unique_overflow);
}

#[test]
fn null_only_column_reports_no_aggregates() {
    let mut stats = Stats::new(1);
    for _ in 0..10 {
        stats.update(0, &Value::Null);
    }
    let schema = Schema::new(vec![Column::new(0, "v", DataType::Null)]);
    let out = &stats.finalize(&schema)[0];
    assert_eq!(out.count, 10);
    assert_eq!(out.nulls, 10);
    assert_eq!(out.min_len, None);
    assert_eq!(out.mean, None);
}
