//! MessagePack encoding of row arrays.
//!
//! Rows are written in blocks: each block is one MessagePack array of row
//! arrays, so the decompressed row block is a plain sequence of MessagePack
//! values and a reader can stop after any block. Scalars use the native
//! MessagePack types; date/time cells use a small tagged map
//! (`{"__date__": true, "value": [y, m, d]}` and friends) since MessagePack
//! has no temporal scalar.

use std::io::{self, Read, Write};

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use rmp::encode::ValueWriteError;

use crate::error::{MprError, MprResult};
use crate::types::Value;

fn wio(e: ValueWriteError) -> io::Error {
    match e {
        ValueWriteError::InvalidMarkerWrite(e) | ValueWriteError::InvalidDataWrite(e) => e,
    }
}

/// Encode one block of rows as a MessagePack array-of-arrays.
pub fn encode_block<W: Write>(rows: &[Vec<Value>], out: &mut W) -> io::Result<()> {
    rmp::encode::write_array_len(out, rows.len() as u32).map_err(wio)?;
    for row in rows {
        rmp::encode::write_array_len(out, row.len() as u32).map_err(wio)?;
        for cell in row {
            encode_cell(cell, out)?;
        }
    }
    Ok(())
}

fn encode_cell<W: Write>(cell: &Value, out: &mut W) -> io::Result<()> {
    match cell {
        Value::Null => rmp::encode::write_nil(out)?,
        Value::Bool(b) => rmp::encode::write_bool(out, *b)?,
        Value::Int64(v) => {
            rmp::encode::write_sint(out, *v).map_err(wio)?;
        }
        Value::Float64(v) => rmp::encode::write_f64(out, *v).map_err(wio)?,
        Value::Utf8(s) => rmp::encode::write_str(out, s).map_err(wio)?,
        Value::Date(d) => {
            write_tagged(out, "__date__", &[d.year() as i64, d.month() as i64, d.day() as i64])?
        }
        Value::Time(t) => write_tagged(
            out,
            "__time__",
            &[t.hour() as i64, t.minute() as i64, t.second() as i64],
        )?,
        Value::DateTime(dt) => write_tagged(
            out,
            "__datetime__",
            &[
                dt.year() as i64,
                dt.month() as i64,
                dt.day() as i64,
                dt.hour() as i64,
                dt.minute() as i64,
                dt.second() as i64,
            ],
        )?,
    }
    Ok(())
}

fn write_tagged<W: Write>(out: &mut W, tag: &str, parts: &[i64]) -> io::Result<()> {
    rmp::encode::write_map_len(out, 2).map_err(wio)?;
    rmp::encode::write_str(out, tag).map_err(wio)?;
    rmp::encode::write_bool(out, true)?;
    rmp::encode::write_str(out, "value").map_err(wio)?;
    rmp::encode::write_array_len(out, parts.len() as u32).map_err(wio)?;
    for p in parts {
        rmp::encode::write_sint(out, *p).map_err(wio)?;
    }
    Ok(())
}

/// Decode the next block (one MessagePack array of row arrays) from a
/// decompressed byte stream.
pub fn decode_block<R: Read>(input: &mut R) -> MprResult<Vec<Vec<Value>>> {
    let value = rmpv::decode::read_value(input)
        .map_err(|e| MprError::corrupt(format!("row block decode failed: {e}")))?;
    let rows = match value {
        rmpv::Value::Array(rows) => rows,
        other => {
            return Err(MprError::corrupt(format!(
                "expected a row-array block, found {other}"
            )))
        }
    };
    rows.into_iter()
        .map(|row| match row {
            rmpv::Value::Array(cells) => cells.into_iter().map(decode_cell).collect(),
            other => Err(MprError::corrupt(format!(
                "expected a row array, found {other}"
            ))),
        })
        .collect()
}

fn decode_cell(v: rmpv::Value) -> MprResult<Value> {
    match v {
        rmpv::Value::Nil => Ok(Value::Null),
        rmpv::Value::Boolean(b) => Ok(Value::Bool(b)),
        rmpv::Value::Integer(i) => match i.as_i64() {
            Some(v) => Ok(Value::Int64(v)),
            // u64 values beyond i64 range keep their magnitude as floats.
            None => Ok(Value::Float64(i.as_f64().unwrap_or(f64::MAX))),
        },
        rmpv::Value::F32(f) => Ok(Value::Float64(f as f64)),
        rmpv::Value::F64(f) => Ok(Value::Float64(f)),
        rmpv::Value::String(s) => match s.into_str() {
            Some(s) => Ok(Value::Utf8(s)),
            None => Err(MprError::corrupt("non-UTF-8 string cell")),
        },
        rmpv::Value::Map(entries) => decode_tagged(entries),
        other => Err(MprError::corrupt(format!(
            "unsupported cell encoding: {other}"
        ))),
    }
}

fn decode_tagged(entries: Vec<(rmpv::Value, rmpv::Value)>) -> MprResult<Value> {
    let mut tag: Option<String> = None;
    let mut parts: Vec<i64> = Vec::new();
    for (k, v) in entries {
        let key = match k {
            rmpv::Value::String(s) => s.into_str().unwrap_or_default(),
            _ => continue,
        };
        if key == "value" {
            if let rmpv::Value::Array(items) = v {
                parts = items
                    .into_iter()
                    .map(|i| {
                        i.as_i64()
                            .ok_or_else(|| MprError::corrupt("non-integer temporal part"))
                    })
                    .collect::<MprResult<_>>()?;
            }
        } else if matches!(key.as_str(), "__date__" | "__time__" | "__datetime__") {
            tag = Some(key);
        }
    }

    let bad = |what: &str| MprError::corrupt(format!("malformed {what} cell"));
    match tag.as_deref() {
        Some("__date__") => {
            let [y, m, d] = parts[..] else { return Err(bad("date")) };
            NaiveDate::from_ymd_opt(y as i32, m as u32, d as u32)
                .map(Value::Date)
                .ok_or_else(|| bad("date"))
        }
        Some("__time__") => {
            let [h, m, s] = parts[..] else { return Err(bad("time")) };
            NaiveTime::from_hms_opt(h as u32, m as u32, s as u32)
                .map(Value::Time)
                .ok_or_else(|| bad("time"))
        }
        Some("__datetime__") => {
            let [y, mo, d, h, mi, s] = parts[..] else {
                return Err(bad("datetime"));
            };
            NaiveDate::from_ymd_opt(y as i32, mo as u32, d as u32)
                .and_then(|date| date.and_hms_opt(h as u32, mi as u32, s as u32))
                .map(Value::DateTime)
                .ok_or_else(|| bad("datetime"))
        }
        _ => Err(MprError::corrupt("unrecognized map-encoded cell")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(rows: Vec<Vec<Value>>) -> Vec<Vec<Value>> {
        let mut buf = Vec::new();
        encode_block(&rows, &mut buf).unwrap();
        decode_block(&mut buf.as_slice()).unwrap()
    }

    #[test]
    fn scalars_round_trip() {
        let rows = vec![vec![
            Value::Null,
            Value::Bool(true),
            Value::Int64(-42),
            Value::Float64(2.5),
            Value::Utf8("héllo".into()),
        ]];
        assert_eq!(round_trip(rows.clone()), rows);
    }

    #[test]
    fn temporals_round_trip() {
        let date = NaiveDate::from_ymd_opt(2020, 2, 29).unwrap();
        let rows = vec![vec![
            Value::Date(date),
            Value::Time(NaiveTime::from_hms_opt(23, 59, 1).unwrap()),
            Value::DateTime(date.and_hms_opt(12, 30, 0).unwrap()),
        ]];
        assert_eq!(round_trip(rows.clone()), rows);
    }

    #[test]
    fn truncated_block_is_corrupt() {
        let mut buf = Vec::new();
        encode_block(&[vec![Value::Utf8("abcdef".into())]], &mut buf).unwrap();
        buf.truncate(buf.len() - 2);
        assert!(matches!(
            decode_block(&mut buf.as_slice()),
            Err(MprError::CorruptContainer { .. })
        ));
    }
}
