//! Load orchestration: row source → intuition → statistics → container.
//!
//! [`load_rows`] drives one or more passes over a [`RowSource`] and commits
//! the stored rows plus the derived schema, row classification and column
//! statistics into a container:
//!
//! 1. resolve header/data-start rows from a bounded prefix sample
//! 2. resolve per-column types
//! 3. compute per-column statistics
//! 4. commit schema + statistics into the container metadata
//!
//! The default [`PassMode::Fused`] buffers only the prefix sample and fuses
//! steps 2 and 3 into the single writing pass; [`PassMode::MultiPass`] re-reads
//! the source from the start for every step, for sources where buffering a
//! prefix is unacceptable. Accumulator folding inside the fused pass is
//! chunk-parallel, which the commutative/associative `merge` operations on
//! both accumulator types make exact (up to floating-point rounding).
//!
//! ## Example
//!
//! ```no_run
//! use mprows::load::{load_rows, LoadOptions};
//! use mprows::source::CsvSource;
//!
//! # fn main() -> Result<(), mprows::MprError> {
//! let mut source = CsvSource::new("messy_report.csv");
//! let report = load_rows(&mut source, "report.mpr", &LoadOptions::default())?;
//! println!("{} rows, {} columns", report.rows, report.schema.width());
//! # Ok(())
//! # }
//! ```

mod observer;

use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use rayon::prelude::*;

use crate::container::{Metadata, MprWriter, RowSpec, WriteOptions};
use crate::error::{MprError, MprResult};
use crate::intuit::rows::{RowClassification, RowIntuiter};
use crate::intuit::types::TypeIntuiter;
use crate::source::RowSource;
use crate::stats::Stats;
use crate::types::{Schema, Value};

pub use observer::{
    CompositeObserver, FileObserver, LoadContext, LoadObserver, LoadSeverity, LoadStats,
    StdErrObserver,
};

/// Rows per parallel fold chunk inside the fused pass.
const PAR_CHUNK: usize = 256;

/// How the orchestrator traverses the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PassMode {
    /// Buffer a bounded prefix for row intuition, then fuse type intuition
    /// and statistics into the single writing pass.
    #[default]
    Fused,
    /// Fully separate passes, restarting the source for each step. For
    /// sources that cannot buffer a prefix sample cheaply or need the full
    /// file to resolve row boundaries.
    MultiPass,
}

/// Options controlling a load.
///
/// Use [`Default`] for common cases.
#[derive(Clone)]
pub struct LoadOptions {
    /// Pass strategy.
    pub mode: PassMode,
    /// Run row intuition (header/data-start detection).
    pub intuit_rows: bool,
    /// Run type intuition.
    pub intuit_types: bool,
    /// Compute per-column statistics.
    pub run_stats: bool,
    /// Bounded prefix size for row intuition.
    pub sample_rows: usize,
    /// Stop after storing this many rows.
    pub limit: Option<u64>,
    /// Explicit row classification; skips row intuition when set.
    pub row_spec: Option<RowClassification>,
    /// Explicit schema; skips type intuition when set.
    pub schema: Option<Schema>,
    /// Container write options.
    pub write: WriteOptions,
    /// Optional observer for progress/logging/alerts.
    pub observer: Option<Arc<dyn LoadObserver>>,
    /// Severity threshold at which `on_alert` is invoked.
    pub alert_at_or_above: LoadSeverity,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            mode: PassMode::default(),
            intuit_rows: true,
            intuit_types: true,
            run_stats: true,
            sample_rows: crate::intuit::SAMPLE_ROWS,
            limit: None,
            row_spec: None,
            schema: None,
            write: WriteOptions::default(),
            observer: None,
            alert_at_or_above: LoadSeverity::Critical,
        }
    }
}

impl fmt::Debug for LoadOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadOptions")
            .field("mode", &self.mode)
            .field("intuit_rows", &self.intuit_rows)
            .field("intuit_types", &self.intuit_types)
            .field("run_stats", &self.run_stats)
            .field("sample_rows", &self.sample_rows)
            .field("limit", &self.limit)
            .field("row_spec_set", &self.row_spec.is_some())
            .field("schema_set", &self.schema.is_some())
            .field("observer_set", &self.observer.is_some())
            .field("alert_at_or_above", &self.alert_at_or_above)
            .finish()
    }
}

/// Outcome of a completed load.
#[derive(Debug, Clone)]
pub struct LoadReport {
    /// Rows stored in the container (banner/header rows included).
    pub rows: u64,
    /// Committed schema.
    pub schema: Schema,
    /// Committed row classification.
    pub row_spec: RowSpec,
    /// Warnings accumulated during the load (also persisted in metadata).
    pub warnings: Vec<String>,
    /// Wall-clock seconds.
    pub load_secs: f64,
}

/// Load a source into a container file.
///
/// Writes to a sibling temp file and renames it into place after the
/// trailer is flushed, so readers never observe a partial container.
pub fn load_rows<S: RowSource>(
    source: &mut S,
    dest: impl AsRef<Path>,
    options: &LoadOptions,
) -> MprResult<LoadReport> {
    let dest = dest.as_ref();
    let ctx = LoadContext {
        dest: Some(dest.to_path_buf()),
    };

    let result = load_to_path(source, dest, options, &ctx);
    report_outcome(options, &ctx, result.as_ref());
    result
}

/// Load a source into an arbitrary writer.
///
/// The caller owns durability; no atomic-replace semantics apply.
pub fn load_rows_to_writer<S: RowSource, W: Write>(
    source: &mut S,
    out: W,
    options: &LoadOptions,
) -> MprResult<(W, LoadReport)> {
    let ctx = LoadContext { dest: None };
    let writer = MprWriter::new(out, &options.write);
    let result = drive(source, writer, options, &ctx);
    report_outcome(options, &ctx, result.as_ref().map(|(_, r)| r));
    result
}

fn load_to_path<S: RowSource>(
    source: &mut S,
    dest: &Path,
    options: &LoadOptions,
    ctx: &LoadContext,
) -> MprResult<LoadReport> {
    let mut tmp_name = dest
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    tmp_name.push(".tmp");
    let tmp = dest.with_file_name(tmp_name);

    let result = (|| {
        let file = File::create(&tmp)?;
        let writer = MprWriter::new(BufWriter::new(file), &options.write);
        let (out, report) = drive(source, writer, options, ctx)?;
        out.into_inner().map_err(|e| e.into_error())?.sync_all()?;
        std::fs::rename(&tmp, dest)?;
        Ok(report)
    })();

    if result.is_err() {
        let _ = std::fs::remove_file(&tmp);
    }
    result
}

fn report_outcome(
    options: &LoadOptions,
    ctx: &LoadContext,
    outcome: Result<&LoadReport, &MprError>,
) {
    let Some(obs) = options.observer.as_ref() else {
        return;
    };
    match outcome {
        Ok(report) => {
            obs.on_success(
                ctx,
                LoadStats {
                    rows: report.rows,
                    secs: report.load_secs,
                },
            );
        }
        Err(e) => {
            let severity = observer::severity_for_error(e);
            obs.on_failure(ctx, severity, e);
            if severity >= options.alert_at_or_above {
                obs.on_alert(ctx, severity, e);
            }
        }
    }
}

fn drive<S: RowSource, W: Write>(
    source: &mut S,
    writer: MprWriter<W>,
    options: &LoadOptions,
    ctx: &LoadContext,
) -> MprResult<(W, LoadReport)> {
    let started = Instant::now();
    match options.mode {
        PassMode::Fused => drive_fused(source, writer, options, ctx, started),
        PassMode::MultiPass => drive_multipass(source, writer, options, ctx, started),
    }
}

fn drive_fused<S: RowSource, W: Write>(
    source: &mut S,
    mut writer: MprWriter<W>,
    options: &LoadOptions,
    ctx: &LoadContext,
    started: Instant,
) -> MprResult<(W, LoadReport)> {
    let observer = options.observer.as_deref();
    let mut warnings = Vec::new();
    let provenance = source.provenance();

    if let Some(obs) = observer {
        obs.on_pass_started(ctx, "load");
    }

    let limit = options.limit.unwrap_or(u64::MAX);
    let mut rows_iter = source.rows()?;

    let mut prefix: Vec<Vec<Value>> = Vec::new();
    while (prefix.len() as u64) < limit.min(options.sample_rows as u64) {
        match rows_iter.next() {
            Some(row) => prefix.push(row?),
            None => break,
        }
    }

    if prefix.is_empty() {
        warnings.push("source produced no rows".to_owned());
        return finish_container(
            writer,
            &RowClassification::default(),
            None,
            None,
            options,
            provenance,
            warnings,
            0,
            started,
        );
    }

    let classification = resolve_classification(&prefix, options, &mut warnings)?;
    let width = resolve_width(&prefix, &classification, options);
    let data_start = classification.data_start_row as u64;

    let mut type_intuiter =
        (options.schema.is_none() && options.intuit_types).then(|| TypeIntuiter::new(width));
    let mut stats = options.run_stats.then(|| Stats::new(width));

    let block_size = options.write.rows_per_block.max(1);
    let mut pending: Vec<Vec<Value>> = Vec::with_capacity(block_size);
    let mut stream = prefix.into_iter().map(Ok).chain(&mut rows_iter);
    let mut consumed: u64 = 0;

    loop {
        while pending.len() < block_size && consumed < limit {
            match stream.next() {
                Some(row) => {
                    pending.push(row?);
                    consumed += 1;
                }
                None => break,
            }
        }
        if pending.is_empty() {
            break;
        }

        let block_start = writer.n_rows();
        fold_block(
            &pending,
            block_start,
            data_start,
            &mut type_intuiter,
            &mut stats,
        );
        for row in pending.drain(..) {
            writer.write_row(row)?;
        }
        if let Some(obs) = observer {
            obs.on_rows_loaded(ctx, writer.n_rows());
        }
        if consumed >= limit {
            break;
        }
    }

    finish_container(
        writer,
        &classification,
        type_intuiter,
        stats,
        options,
        provenance,
        warnings,
        width,
        started,
    )
}

fn drive_multipass<S: RowSource, W: Write>(
    source: &mut S,
    mut writer: MprWriter<W>,
    options: &LoadOptions,
    ctx: &LoadContext,
    started: Instant,
) -> MprResult<(W, LoadReport)> {
    let observer = options.observer.as_deref();
    let mut warnings = Vec::new();
    let provenance = source.provenance();
    let limit = options.limit.unwrap_or(u64::MAX);

    // Pass 1: bounded sample for row intuition.
    if let Some(obs) = observer {
        obs.on_pass_started(ctx, "intuit_rows");
    }
    let mut sample: Vec<Vec<Value>> = Vec::new();
    for row in source.rows()? {
        sample.push(row?);
        if sample.len() >= options.sample_rows || sample.len() as u64 >= limit {
            break;
        }
    }
    if sample.is_empty() {
        warnings.push("source produced no rows".to_owned());
        return finish_container(
            writer,
            &RowClassification::default(),
            None,
            None,
            options,
            provenance,
            warnings,
            0,
            started,
        );
    }
    let classification = resolve_classification(&sample, options, &mut warnings)?;
    let width = resolve_width(&sample, &classification, options);
    let data_start = classification.data_start_row as u64;
    drop(sample);

    // Pass 2: full-pass type intuition.
    let type_intuiter = if options.schema.is_none() && options.intuit_types {
        if let Some(obs) = observer {
            obs.on_pass_started(ctx, "intuit_types");
        }
        let mut ti = TypeIntuiter::new(width);
        for (i, row) in source.rows()?.enumerate() {
            if i as u64 >= limit {
                break;
            }
            let row = row?;
            if i as u64 >= data_start {
                ti.observe_row(&row);
            }
        }
        Some(ti)
    } else {
        None
    };

    // Pass 3: statistics.
    let stats = if options.run_stats {
        if let Some(obs) = observer {
            obs.on_pass_started(ctx, "run_stats");
        }
        let mut st = Stats::new(width);
        for (i, row) in source.rows()?.enumerate() {
            if i as u64 >= limit {
                break;
            }
            let row = row?;
            if i as u64 >= data_start {
                st.update_row(&row);
            }
        }
        Some(st)
    } else {
        None
    };

    // Pass 4: write the rows.
    if let Some(obs) = observer {
        obs.on_pass_started(ctx, "write");
    }
    let block = options.write.rows_per_block.max(1) as u64;
    for row in source.rows()? {
        if writer.n_rows() >= limit {
            break;
        }
        writer.write_row(row?)?;
        if writer.n_rows() % block == 0 {
            if let Some(obs) = observer {
                obs.on_rows_loaded(ctx, writer.n_rows());
            }
        }
    }

    finish_container(
        writer,
        &classification,
        type_intuiter,
        stats,
        options,
        provenance,
        warnings,
        width,
        started,
    )
}

fn resolve_classification(
    sample: &[Vec<Value>],
    options: &LoadOptions,
    warnings: &mut Vec<String>,
) -> MprResult<RowClassification> {
    if let Some(spec) = &options.row_spec {
        return Ok(spec.clone());
    }
    if !options.intuit_rows {
        return Ok(RowClassification::default());
    }
    match RowIntuiter::with_sample_rows(options.sample_rows).intuit(sample) {
        Ok(c) => Ok(c),
        Err(MprError::InsufficientSample { .. }) => {
            warnings
                .push("failed to intuit rows; treating row 0 as the data start".to_owned());
            Ok(RowClassification::default())
        }
        Err(e) => Err(e),
    }
}

/// Schema width: explicit schema, else header width, else the modal arity
/// of the sampled data rows.
fn resolve_width(
    sample: &[Vec<Value>],
    classification: &RowClassification,
    options: &LoadOptions,
) -> usize {
    if let Some(schema) = &options.schema {
        return schema.width();
    }
    if !classification.headers.is_empty() {
        return classification.headers.len();
    }
    let mut counts: Vec<(usize, usize)> = Vec::new();
    for row in sample.iter().skip(classification.data_start_row) {
        match counts.iter_mut().find(|(len, _)| *len == row.len()) {
            Some((_, n)) => *n += 1,
            None => counts.push((row.len(), 1)),
        }
    }
    counts
        .into_iter()
        .max_by_key(|&(len, n)| (n, len))
        .map(|(len, _)| len)
        .unwrap_or_else(|| sample.iter().map(|r| r.len()).max().unwrap_or(0))
}

/// Fold one block of rows into the accumulators, chunk-parallel when the
/// block is large enough to amortize the fan-out.
fn fold_block(
    rows: &[Vec<Value>],
    block_start: u64,
    data_start: u64,
    type_intuiter: &mut Option<TypeIntuiter>,
    stats: &mut Option<Stats>,
) {
    let skip = data_start.saturating_sub(block_start).min(rows.len() as u64) as usize;
    let data = &rows[skip..];
    if data.is_empty() {
        return;
    }

    if data.len() >= PAR_CHUNK * 2 {
        if let Some(ti) = type_intuiter.take() {
            let width = ti.width();
            let folded = data
                .par_chunks(PAR_CHUNK)
                .map(|chunk| {
                    let mut local = TypeIntuiter::new(width);
                    for row in chunk {
                        local.observe_row(row);
                    }
                    local
                })
                .reduce(|| TypeIntuiter::new(width), |a, b| a.merge(b));
            *type_intuiter = Some(ti.merge(folded));
        }
        if let Some(st) = stats.take() {
            let width = st.width();
            let folded = data
                .par_chunks(PAR_CHUNK)
                .map(|chunk| {
                    let mut local = Stats::new(width);
                    for row in chunk {
                        local.update_row(row);
                    }
                    local
                })
                .reduce(|| Stats::new(width), |a, b| a.merge(b));
            *stats = Some(st.merge(folded));
        }
    } else {
        if let Some(ti) = type_intuiter.as_mut() {
            for row in data {
                ti.observe_row(row);
            }
        }
        if let Some(st) = stats.as_mut() {
            for row in data {
                st.update_row(row);
            }
        }
    }
}

fn resolve_schema(
    width: usize,
    classification: &RowClassification,
    type_intuiter: &Option<TypeIntuiter>,
    options: &LoadOptions,
) -> Schema {
    if let Some(schema) = &options.schema {
        return schema.clone();
    }
    let mut schema = Schema::with_width(width);
    if !classification.headers.is_empty() {
        schema.set_names(&classification.headers);
        for (col, raw) in schema.columns.iter_mut().zip(&classification.headers) {
            if !raw.is_empty() {
                col.description = Some(raw.clone());
            }
        }
    }
    if let Some(ti) = type_intuiter {
        for (col, (data_type, nullable)) in schema.columns.iter_mut().zip(ti.resolve()) {
            col.data_type = data_type;
            col.nullable = nullable;
            col.lom = data_type.default_lom();
        }
    }
    schema
}

#[allow(clippy::too_many_arguments)]
fn finish_container<W: Write>(
    writer: MprWriter<W>,
    classification: &RowClassification,
    type_intuiter: Option<TypeIntuiter>,
    stats: Option<Stats>,
    options: &LoadOptions,
    provenance: BTreeMap<String, serde_json::Value>,
    warnings: Vec<String>,
    width: usize,
    started: Instant,
) -> MprResult<(W, LoadReport)> {
    let mut schema = resolve_schema(width, classification, &type_intuiter, options);
    if let Some(st) = &stats {
        let finalized = st.finalize(&schema);
        for (col, cs) in schema.columns.iter_mut().zip(finalized) {
            col.stats = Some(cs);
        }
    }

    let row_spec = RowSpec {
        header_rows: classification.header_rows.iter().map(|&i| i as u64).collect(),
        comment_rows: classification
            .comment_rows
            .iter()
            .map(|&i| i as u64)
            .collect(),
        data_start_row: classification.data_start_row as u64,
        data_end_row: None,
    };

    let rows = writer.n_rows();
    let mut meta = Metadata::new(schema.clone());
    meta.row_spec = row_spec.clone();
    meta.about.create_time = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .ok()
        .map(|d| d.as_secs());
    meta.about.load_secs = Some(started.elapsed().as_secs_f64());
    meta.source = provenance;
    meta.warnings = warnings.clone();

    let out = writer.finish(meta)?;
    Ok((
        out,
        LoadReport {
            rows,
            schema,
            row_spec,
            warnings,
            load_secs: started.elapsed().as_secs_f64(),
        },
    ))
}
