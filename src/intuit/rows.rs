//! Header and data-start detection for files with banner/title rows.
//!
//! The intuiter examines a bounded prefix of the raw row stream and computes
//! a shape signature for every row: cell count, numeric-looking cells, blank
//! cells and header-like cells (short alphabetic tokens). The signature that
//! repeats most often across the non-blank sample is taken to be the data
//! pattern; the first row matching it is the data start. The contiguous run
//! of header-like rows immediately above the data start becomes the header
//! block, and any other non-blank rows above the data start are classified
//! as comments (title/note noise).

use crate::error::{MprError, MprResult};
use crate::types::Value;

/// Default bounded-sample size consumed by [`RowIntuiter::intuit`].
pub const SAMPLE_ROWS: usize = 100;

/// Maximum cell text length still considered a header-like token.
const HEADER_TOKEN_MAX_LEN: usize = 32;

/// Resolved row-level classification of a source prefix.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RowClassification {
    /// Indices of header rows, in order. Empty when no header was
    /// distinguishable.
    pub header_rows: Vec<usize>,
    /// Indices of non-blank, non-header rows above the data start.
    pub comment_rows: Vec<usize>,
    /// First row index holding actual tabular data.
    pub data_start_row: usize,
    /// Per-column header text, coalesced across all header rows.
    ///
    /// Raw (unmangled); empty when `header_rows` is empty.
    pub headers: Vec<String>,
}

/// Detects header rows and the first data row in a bounded row sample.
#[derive(Debug, Clone)]
pub struct RowIntuiter {
    sample_rows: usize,
}

impl Default for RowIntuiter {
    fn default() -> Self {
        Self {
            sample_rows: SAMPLE_ROWS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RowSignature {
    len: usize,
    numeric: usize,
    blank: usize,
    headerish: usize,
}

impl RowSignature {
    fn of(row: &[Value]) -> Self {
        let mut numeric = 0;
        let mut blank = 0;
        let mut headerish = 0;
        for cell in row {
            if cell.is_null() {
                blank += 1;
            } else if is_numericish(cell) {
                numeric += 1;
            } else if is_headerish(cell) {
                headerish += 1;
            }
        }
        Self {
            len: row.len(),
            numeric,
            blank,
            headerish,
        }
    }

    fn is_blank(&self) -> bool {
        self.len == 0 || self.blank == self.len
    }

    /// Grouping key for the modal data pattern. Blank counts are left out so
    /// data rows with scattered missing cells still group together.
    fn key(&self) -> (usize, usize) {
        (self.len, self.numeric)
    }

    /// Whether this row reads as a header for a table of `data_len` columns.
    fn is_header_for(&self, data_len: usize) -> bool {
        let non_blank = self.len - self.blank;
        self.len == data_len
            && non_blank > 0
            && self.numeric == 0
            && self.headerish * 3 >= non_blank * 2
    }
}

fn is_numericish(cell: &Value) -> bool {
    match cell {
        Value::Int64(_) | Value::Float64(_) => true,
        Value::Utf8(s) => {
            let s = s.trim();
            s.parse::<i64>().is_ok()
                || s.parse::<f64>()
                    .map(|f| f.is_finite() && s.bytes().any(|b| b.is_ascii_digit()))
                    .unwrap_or(false)
        }
        _ => false,
    }
}

fn is_headerish(cell: &Value) -> bool {
    let Value::Utf8(s) = cell else { return false };
    let s = s.trim();
    if s.is_empty() || s.chars().count() > HEADER_TOKEN_MAX_LEN {
        return false;
    }
    let alpha = s.chars().filter(|c| c.is_alphabetic()).count();
    let digit = s.chars().filter(|c| c.is_ascii_digit()).count();
    alpha > 0 && digit * 2 < alpha
}

impl RowIntuiter {
    /// Intuiter with the default sample bound.
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the bounded-sample size.
    pub fn with_sample_rows(sample_rows: usize) -> Self {
        Self { sample_rows }
    }

    /// Rows this intuiter will examine at most.
    pub fn sample_rows(&self) -> usize {
        self.sample_rows
    }

    /// Classify a sample prefix of raw rows.
    ///
    /// Only the first [`Self::sample_rows`] rows are examined. An empty
    /// sample fails with [`MprError::InsufficientSample`]; a sample with no
    /// distinguishable header yields an empty header list and data start 0.
    pub fn intuit(&self, sample: &[Vec<Value>]) -> MprResult<RowClassification> {
        let sample = &sample[..sample.len().min(self.sample_rows)];
        if sample.is_empty() {
            return Err(MprError::InsufficientSample {
                message: "row intuition requires at least one sampled row".to_owned(),
            });
        }

        let sigs: Vec<RowSignature> = sample.iter().map(|r| RowSignature::of(r)).collect();

        let Some(data_key) = modal_key(&sigs) else {
            // Every sampled row is blank; treat the whole sample as data.
            return Ok(RowClassification {
                data_start_row: 0,
                ..RowClassification::default()
            });
        };

        let data_start_row = sigs
            .iter()
            .position(|s| !s.is_blank() && s.key() == data_key)
            .unwrap_or(0);

        // Contiguous header-like block immediately above the data start.
        let mut header_rows: Vec<usize> = Vec::new();
        for i in (0..data_start_row).rev() {
            if sigs[i].is_header_for(data_key.0) {
                header_rows.push(i);
            } else {
                break;
            }
        }
        header_rows.reverse();

        let comment_rows: Vec<usize> = (0..data_start_row)
            .filter(|i| !header_rows.contains(i) && !sigs[*i].is_blank())
            .collect();

        let headers = if header_rows.is_empty() {
            Vec::new()
        } else {
            coalesce_headers(header_rows.iter().map(|&i| sample[i].as_slice()), data_key.0)
        };

        Ok(RowClassification {
            header_rows,
            comment_rows,
            data_start_row,
            headers,
        })
    }
}

/// Most frequent non-blank signature key; ties prefer more numeric cells,
/// then wider rows, so data rows beat banner rows of equal frequency.
fn modal_key(sigs: &[RowSignature]) -> Option<(usize, usize)> {
    let mut counts: Vec<((usize, usize), usize)> = Vec::new();
    for sig in sigs.iter().filter(|s| !s.is_blank()) {
        let key = sig.key();
        match counts.iter_mut().find(|(k, _)| *k == key) {
            Some((_, n)) => *n += 1,
            None => counts.push((key, 1)),
        }
    }
    counts
        .into_iter()
        .max_by_key(|&((len, numeric), n)| (n, numeric, len))
        .map(|(key, _)| key)
}

/// Merge header rows into one composite name per column: non-blank cell
/// texts joined with a single space, in row order.
pub fn coalesce_headers<'a, I>(header_rows: I, width: usize) -> Vec<String>
where
    I: Iterator<Item = &'a [Value]>,
{
    let mut out = vec![String::new(); width];
    for row in header_rows {
        for (i, slot) in out.iter_mut().enumerate() {
            let text = match row.get(i) {
                Some(v) if !v.is_null() => v.to_string().trim().to_owned(),
                _ => String::new(),
            };
            if !text.is_empty() {
                if !slot.is_empty() {
                    slot.push(' ');
                }
                slot.push_str(&text);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_row(cells: &[&str]) -> Vec<Value> {
        cells.iter().map(|c| Value::Utf8((*c).to_owned())).collect()
    }

    #[test]
    fn banner_blank_header_data() {
        let sample = vec![
            text_row(&["Report generated 2020"]),
            text_row(&[""]),
            text_row(&["Name", "Age", "City"]),
            text_row(&["Alice", "30", "NYC"]),
            text_row(&["Bob", "25", "LA"]),
        ];
        let rc = RowIntuiter::new().intuit(&sample).unwrap();
        assert_eq!(rc.header_rows, vec![2]);
        assert_eq!(rc.data_start_row, 3);
        assert_eq!(rc.comment_rows, vec![0]);
        assert_eq!(rc.headers, vec!["Name", "Age", "City"]);
    }

    #[test]
    fn no_distinguishable_header_starts_at_zero() {
        let sample = vec![
            text_row(&["alpha", "beta"]),
            text_row(&["gamma", "delta"]),
            text_row(&["epsilon", "zeta"]),
        ];
        let rc = RowIntuiter::new().intuit(&sample).unwrap();
        assert!(rc.header_rows.is_empty());
        assert_eq!(rc.data_start_row, 0);
    }

    #[test]
    fn two_header_rows_coalesce() {
        let sample = vec![
            text_row(&["Population", "", ""]),
            text_row(&["Total", "Male", "Female"]),
            text_row(&["100", "48", "52"]),
            text_row(&["200", "99", "101"]),
            text_row(&["300", "150", "150"]),
        ];
        let rc = RowIntuiter::new().intuit(&sample).unwrap();
        assert_eq!(rc.header_rows, vec![0, 1]);
        assert_eq!(rc.data_start_row, 2);
        assert_eq!(rc.headers, vec!["Population Total", "Male", "Female"]);
    }

    #[test]
    fn empty_sample_is_insufficient() {
        let err = RowIntuiter::new().intuit(&[]).unwrap_err();
        assert!(matches!(err, MprError::InsufficientSample { .. }));
    }

    #[test]
    fn all_blank_sample_treated_as_data() {
        let sample = vec![text_row(&["", ""]), text_row(&["", ""])];
        let rc = RowIntuiter::new().intuit(&sample).unwrap();
        assert!(rc.header_rows.is_empty());
        assert_eq!(rc.data_start_row, 0);
    }
}
