use std::{
    collections::BTreeMap,
    fmt,
    path::{Path, PathBuf},
};

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};

use crate::error::{Error, Result};

/// Directory suffix that marks a file geodatabase.
pub const GEODATABASE_SUFFIX: &str = ".gdb";

/// Reader family assigned to a scan target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TargetType {
    Shapefile,
    Geodatabase,
    Excel,
    Csv,
    Pdf,
    Gpx,
}

impl TargetType {
    pub const ALL: [TargetType; 6] = [
        TargetType::Shapefile,
        TargetType::Geodatabase,
        TargetType::Excel,
        TargetType::Csv,
        TargetType::Pdf,
        TargetType::Gpx,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TargetType::Shapefile => "shapefile",
            TargetType::Geodatabase => "geodatabase",
            TargetType::Excel => "excel",
            TargetType::Csv => "csv",
            TargetType::Pdf => "pdf",
            TargetType::Gpx => "gpx",
        }
    }

    pub fn parse(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == tag)
    }

    /// Map a lower-cased extension (without the dot) to a reader family.
    fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "shp" => Some(TargetType::Shapefile),
            "xlsx" | "xls" => Some(TargetType::Excel),
            "csv" => Some(TargetType::Csv),
            "pdf" => Some(TargetType::Pdf),
            "gpx" => Some(TargetType::Gpx),
            _ => None,
        }
    }
}

impl fmt::Display for TargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A file (or geodatabase directory) selected for scanning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanTarget {
    pub path: PathBuf,
    pub name: String,
    pub target_type: TargetType,
}

/// Selection rules for [`discover_targets`].
#[derive(Debug, Clone)]
pub struct WalkOptions {
    skip: GlobSet,
    max_file_size: u64,
}

impl WalkOptions {
    /// `skip_extensions` are suffixes such as `.jpg` or `.shp.xml`, compared
    /// case-insensitively against file names.
    pub fn new(skip_extensions: &[String], max_file_size: u64) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        for ext in skip_extensions {
            let suffix = ext.trim();
            if suffix.is_empty() {
                continue;
            }
            let pattern = if suffix.starts_with('.') {
                format!("*{suffix}")
            } else {
                format!("*.{suffix}")
            };
            let glob = GlobBuilder::new(&pattern)
                .case_insensitive(true)
                .build()
                .map_err(|e| {
                    Error::Config(format!("invalid skip extension '{ext}': {e}"))
                })?;
            builder.add(glob);
        }
        let skip = builder.build().map_err(|e| {
            Error::Config(format!("cannot build skip set: {e}"))
        })?;
        Ok(Self {
            skip,
            max_file_size,
        })
    }

    fn is_skipped(&self, file_name: &str) -> bool {
        self.skip.is_match(file_name)
    }
}

/// Recursively walk `root` and classify every eligible entry.
///
/// Geodatabase directories are returned as a single target and never
/// descended into. Files in the skip set, files above the size ceiling and
/// files with unrecognised extensions are left out silently.
pub fn discover_targets(
    root: &Path,
    options: &WalkOptions,
) -> Result<Vec<ScanTarget>> {
    let mut results = Vec::new();
    if is_geodatabase_dir(root) {
        results.push(make_target(root, TargetType::Geodatabase));
    } else {
        walk_dir(root, options, &mut results)?;
    }
    results.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(results)
}

fn walk_dir(
    current: &Path,
    options: &WalkOptions,
    results: &mut Vec<ScanTarget>,
) -> Result<()> {
    let entries = std::fs::read_dir(current)?;

    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        let file_type = entry.file_type()?;

        if file_type.is_dir() {
            if is_geodatabase_dir(&path) {
                results.push(make_target(&path, TargetType::Geodatabase));
            } else if let Err(e) = walk_dir(&path, options, results) {
                tracing::warn!("skipping unreadable directory {}: {e}", path.display());
            }
        } else if file_type.is_symlink() {
            // Follow links to files only; linked directories may form cycles.
            let Ok(resolved) = path.canonicalize() else {
                continue;
            };
            if resolved.is_file()
                && let Some(target) = classify_file(&path, options)
            {
                results.push(target);
            }
        } else if file_type.is_file()
            && let Some(target) = classify_file(&path, options)
        {
            results.push(target);
        }
    }

    Ok(())
}

fn classify_file(path: &Path, options: &WalkOptions) -> Option<ScanTarget> {
    let name = path.file_name()?.to_string_lossy();
    if options.is_skipped(&name) {
        return None;
    }

    // Unreadable metadata counts as a skip, not a failure.
    let size = std::fs::metadata(path).ok()?.len();
    if size > options.max_file_size {
        tracing::debug!("skipping oversized file {}", path.display());
        return None;
    }

    let ext = path.extension()?.to_string_lossy().to_lowercase();
    let target_type = TargetType::from_extension(&ext)?;
    Some(make_target(path, target_type))
}

fn is_geodatabase_dir(path: &Path) -> bool {
    path.is_dir()
        && path.file_name().is_some_and(|name| {
            name.to_string_lossy()
                .to_lowercase()
                .ends_with(GEODATABASE_SUFFIX)
        })
}

fn make_target(path: &Path, target_type: TargetType) -> ScanTarget {
    ScanTarget {
        path: path.to_path_buf(),
        name: path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        target_type,
    }
}

/// Count targets per type, for the pre-scan summary.
pub fn count_by_type(targets: &[ScanTarget]) -> BTreeMap<TargetType, usize> {
    let mut counts = BTreeMap::new();
    for target in targets {
        *counts.entry(target.target_type).or_insert(0) += 1;
    }
    counts
}
