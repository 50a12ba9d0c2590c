use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{PackagingError, Result};

/// Locates the single file in `directory` named `<prefix>*.<extension>`
///
/// Matching is case-sensitive on the file name, like a shell glob.
///
/// # Errors
///
/// * `PackagingError::MissingInput` - directory is absent or nothing matches
/// * `PackagingError::AmbiguousInput` - more than one file matches
pub fn find_single_file(directory: &Path, prefix: &str, extension: &str) -> Result<PathBuf> {
    let pattern = format!("{}*.{}", prefix, extension);

    if !directory.is_dir() {
        return Err(PackagingError::MissingInput(format!(
            "No {} file: directory {} does not exist",
            pattern,
            directory.display()
        )));
    }

    let suffix = format!(".{}", extension);
    let mut matches = Vec::new();
    for entry in fs::read_dir(directory)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let file_name = entry.file_name();
        let Some(file_name) = file_name.to_str() else {
            continue;
        };
        if file_name.starts_with(prefix)
            && file_name.ends_with(&suffix)
            && file_name.len() >= prefix.len() + suffix.len()
        {
            matches.push(entry.path());
        }
    }

    match matches.len() {
        0 => Err(PackagingError::MissingInput(format!(
            "No {} file. Check data at path {}",
            pattern,
            directory.display()
        ))),
        1 => Ok(matches.remove(0)),
        count => Err(PackagingError::AmbiguousInput {
            pattern,
            directory: directory.display().to_string(),
            count,
        }),
    }
}

/// Derives the per-column suffix used in a channel's output name
///
/// When `column` contains `alternate_infix`, the infix is stripped first;
/// the suffix is the last character of what remains. Returns `None` for a
/// column that is empty after stripping.
pub fn derive_channel_suffix(column: &str, alternate_infix: &str) -> Option<char> {
    if !alternate_infix.is_empty() && column.contains(alternate_infix) {
        column.replace(alternate_infix, "").chars().last()
    } else {
        column.chars().last()
    }
}

/// Parses one numeric CSV cell; blank cells are missing samples (NaN).
pub fn parse_sample(cell: &str) -> Option<f64> {
    let cell = cell.trim();
    if cell.is_empty() {
        return Some(f64::NAN);
    }
    cell.parse().ok()
}

/// Number of samples spanned by `seconds` at `rate` Hz, truncated toward zero.
pub fn samples_spanned(rate: f64, seconds: f64) -> usize {
    (rate * seconds) as usize
}
