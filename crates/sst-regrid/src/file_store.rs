//! File discovery over local input directories.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::error::{RegridError, Result};
use crate::sources::FileStore;

/// Index of dated input files below one or more root directories.
///
/// The date of a file is the first `YYYYMMDD` token of its name, e.g.
/// `20100101120000-ESACCI-L3U_GHRSST-SSTskin.nc` is filed under 2010-01-01.
#[derive(Debug, Clone, Default)]
pub struct DirectoryFileStore {
    files: BTreeMap<NaiveDate, Vec<PathBuf>>,
}

impl DirectoryFileStore {
    /// Walk `roots` and index every file whose name ends with `suffix`.
    pub fn scan(roots: &[PathBuf], suffix: &str) -> Result<Self> {
        let mut files: BTreeMap<NaiveDate, Vec<PathBuf>> = BTreeMap::new();
        let mut undated = 0usize;

        for root in roots {
            if !root.is_dir() {
                return Err(RegridError::configuration(
                    "input_dirs",
                    format!("'{}' is not a directory", root.display()),
                ));
            }

            for entry in walkdir::WalkDir::new(root).follow_links(true) {
                let entry = entry.map_err(|e| RegridError::Io(e.into()))?;
                if !entry.file_type().is_file() {
                    continue;
                }
                let date = {
                    let name = entry.file_name().to_string_lossy();
                    if !name.ends_with(suffix) {
                        continue;
                    }
                    date_from_file_name(&name)
                };
                match date {
                    Some(date) => files.entry(date).or_default().push(entry.into_path()),
                    None => {
                        undated += 1;
                        warn!(path = %entry.path().display(), "No date in file name, skipping");
                    }
                }
            }
        }

        for paths in files.values_mut() {
            paths.sort();
        }

        info!(
            roots = roots.len(),
            days = files.len(),
            files = files.values().map(Vec::len).sum::<usize>(),
            undated = undated,
            "Indexed input files"
        );

        Ok(Self { files })
    }

    /// Build an index from known paths, ignoring those without a date.
    pub fn from_paths(paths: impl IntoIterator<Item = PathBuf>) -> Self {
        let mut files: BTreeMap<NaiveDate, Vec<PathBuf>> = BTreeMap::new();
        for path in paths {
            let date = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(date_from_file_name);
            if let Some(date) = date {
                files.entry(date).or_default().push(path);
            }
        }
        for paths in files.values_mut() {
            paths.sort();
        }
        Self { files }
    }

    /// Number of indexed files.
    pub fn len(&self) -> usize {
        self.files.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Earliest and latest indexed day.
    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        let first = *self.files.keys().next()?;
        let last = *self.files.keys().next_back()?;
        Some((first, last))
    }
}

impl FileStore for DirectoryFileStore {
    fn files(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<PathBuf>> {
        if end <= start {
            return Ok(Vec::new());
        }
        let files: Vec<PathBuf> = self
            .files
            .range(start..end)
            .flat_map(|(_, paths)| paths.iter().cloned())
            .collect();
        debug!(start = %start, end = %end, files = files.len(), "Listed input files");
        Ok(files)
    }
}

/// First valid `YYYYMMDD` date at the start of a digit run in `name`.
pub fn date_from_file_name(name: &str) -> Option<NaiveDate> {
    let bytes = name.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if !bytes[i].is_ascii_digit() {
            i += 1;
            continue;
        }
        let run_start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        if i - run_start >= 8 {
            if let Ok(date) = NaiveDate::parse_from_str(&name[run_start..run_start + 8], "%Y%m%d") {
                return Some(date);
            }
        }
    }
    None
}
