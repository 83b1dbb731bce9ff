//! Category scan over discovered targets, and the scan CSV artifact.
//!
//! Every target yields exactly one [`ScanRecord`]. A file whose reader fails
//! is recorded with status `error`, the failure message and empty category
//! columns; the run itself never aborts on a single file.

use std::{fmt, path::Path, sync::Mutex};

use kdam::{Bar, BarExt, tqdm};
use rayon::prelude::*;

use crate::{
    data_dir::write_atomic,
    error::{Error, Result},
    matcher::TermMatcher,
    readers::{ReadLimits, ReaderRegistry},
    walker::{ScanTarget, TargetType},
};

/// Fixed leading columns of the scan artifact; category columns follow.
pub const FIXED_COLUMNS: [&str; 5] =
    ["file_path", "file_name", "file_type", "status", "error"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanStatus {
    Success,
    Error,
}

impl ScanStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ScanStatus::Success => "success",
            ScanStatus::Error => "error",
        }
    }
}

impl fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the scan artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRecord {
    pub file_path: String,
    pub file_name: String,
    pub file_type: TargetType,
    pub status: ScanStatus,
    pub error: String,
    /// Comma-joined matched terms, aligned with [`ScanReport::categories`].
    pub categories: Vec<String>,
}

impl ScanRecord {
    pub fn has_match(&self) -> bool {
        self.categories.iter().any(|v| !v.is_empty())
    }
}

/// A full scan: the category columns it was produced with and its rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanReport {
    pub categories: Vec<String>,
    pub records: Vec<ScanRecord>,
}

impl ScanReport {
    pub fn errors(&self) -> usize {
        self.records
            .iter()
            .filter(|r| r.status == ScanStatus::Error)
            .count()
    }

    pub fn files_with_matches(&self) -> usize {
        self.records.iter().filter(|r| r.has_match()).count()
    }

    /// Number of files with a non-empty value, per category.
    pub fn category_counts(&self) -> Vec<(String, usize)> {
        self.categories
            .iter()
            .enumerate()
            .map(|(idx, name)| {
                let count = self
                    .records
                    .iter()
                    .filter(|r| r.categories.get(idx).is_some_and(|v| !v.is_empty()))
                    .count();
                (name.clone(), count)
            })
            .collect()
    }
}

/// Scan a single target: read its content (when a reader is registered),
/// match it and its path, and union the two.
pub fn scan_one(
    target: &ScanTarget,
    matcher: &TermMatcher,
    readers: &ReaderRegistry,
    limits: ReadLimits,
) -> ScanRecord {
    let file_path = target.path.to_string_lossy().into_owned();
    let width = matcher.categories().len();

    let content = match readers.get(target.target_type) {
        Some(reader) => match reader.read(&target.path, limits) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("cannot read {file_path}: {e}");
                return ScanRecord {
                    file_path,
                    file_name: target.name.clone(),
                    file_type: target.target_type,
                    status: ScanStatus::Error,
                    error: e.to_string(),
                    categories: vec![String::new(); width],
                };
            }
        },
        None => String::new(),
    };

    let mut matches = matcher.match_all(&content);
    matches.union_with(&matcher.match_all(&file_path));
    tracing::debug!("scanned {file_path}");

    ScanRecord {
        file_path,
        file_name: target.name.clone(),
        file_type: target.target_type,
        status: ScanStatus::Success,
        error: String::new(),
        categories: matches.joined(),
    }
}

/// Progress bar on stderr, or nothing at all when progress is hidden.
/// kdam's `refresh` draws even on a disabled bar, so a hidden bar is never
/// built.
pub(crate) fn progress_bar(total: usize, desc: &str, show: bool) -> Option<Bar> {
    show.then(|| tqdm!(total = total, desc = desc.to_string()))
}

/// Scan every target in parallel. Output order follows `targets`.
pub fn scan_all(
    targets: &[ScanTarget],
    matcher: &TermMatcher,
    readers: &ReaderRegistry,
    limits: ReadLimits,
    show_progress: bool,
) -> ScanReport {
    let bar = Mutex::new(progress_bar(targets.len(), "Scanning", show_progress));

    let records: Vec<ScanRecord> = targets
        .par_iter()
        .map(|target| {
            let record = scan_one(target, matcher, readers, limits);
            if let Ok(mut bar) = bar.lock()
                && let Some(bar) = bar.as_mut()
            {
                let _ = bar.update(1);
            }
            record
        })
        .collect();

    if let Ok(mut bar) = bar.lock()
        && let Some(bar) = bar.as_mut()
    {
        let _ = bar.refresh();
    }

    let report = ScanReport {
        categories: matcher.categories().to_vec(),
        records,
    };
    log_summary(&report);
    report
}

fn log_summary(report: &ScanReport) {
    tracing::info!(
        "scanned {} files: {} with matches, {} errors",
        report.records.len(),
        report.files_with_matches(),
        report.errors()
    );
    for (name, count) in report.category_counts() {
        tracing::info!("  {name}: {count} files");
    }
}

/// Write the scan artifact, replacing any previous one.
pub fn write_scan_csv(report: &ScanReport, path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    let header: Vec<&str> = FIXED_COLUMNS
        .iter()
        .copied()
        .chain(report.categories.iter().map(String::as_str))
        .collect();
    writer.write_record(&header)?;

    for record in &report.records {
        let row: Vec<&str> = [
            record.file_path.as_str(),
            record.file_name.as_str(),
            record.file_type.as_str(),
            record.status.as_str(),
            record.error.as_str(),
        ]
        .into_iter()
        .chain(record.categories.iter().map(String::as_str))
        .collect();
        writer.write_record(&row)?;
    }

    let data = writer
        .into_inner()
        .map_err(|e| Error::Io(e.into_error()))?;
    write_atomic(path, &data)
}

/// Read a scan artifact back. Every category in `expected` must have a
/// column; extra category columns are ignored.
pub fn read_scan_csv(path: &Path, expected: &[String]) -> Result<ScanReport> {
    if !path.is_file() {
        return Err(Error::MissingArtifact(path.to_path_buf()));
    }
    let mut reader = csv::Reader::from_path(path)?;
    let headers = reader.headers()?.clone();
    let column = |name: &str| headers.iter().position(|h| h == name);

    let mut fixed = [0usize; 5];
    for (slot, name) in fixed.iter_mut().zip(FIXED_COLUMNS) {
        *slot = column(name).ok_or_else(|| {
            Error::SchemaMismatch(format!(
                "{} has no '{name}' column",
                path.display()
            ))
        })?;
    }
    let category_columns = expected
        .iter()
        .map(|name| {
            column(name).ok_or_else(|| {
                Error::SchemaMismatch(format!(
                    "{} has no column for category '{name}'",
                    path.display()
                ))
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row?;
        let cell = |idx: usize| row.get(idx).unwrap_or("").to_string();

        let type_tag = cell(fixed[2]);
        let file_type = TargetType::parse(&type_tag).ok_or_else(|| {
            Error::SchemaMismatch(format!("unknown file type '{type_tag}'"))
        })?;
        let status = if cell(fixed[3]) == ScanStatus::Success.as_str() {
            ScanStatus::Success
        } else {
            ScanStatus::Error
        };

        records.push(ScanRecord {
            file_path: cell(fixed[0]),
            file_name: cell(fixed[1]),
            file_type,
            status,
            error: cell(fixed[4]),
            categories: category_columns.iter().map(|&idx| cell(idx)).collect(),
        });
    }

    Ok(ScanReport {
        categories: expected.to_vec(),
        records,
    })
}
