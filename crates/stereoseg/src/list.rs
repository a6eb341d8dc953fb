//! Stereo pair list parsing.
//!
//! A list file names image paths one per line, alternating left and
//! right: lines 1 and 2 form the first pair, lines 3 and 4 the second, and
//! so on. Surrounding whitespace is trimmed and trailing blank lines are
//! ignored.

use std::path::{Path, PathBuf};

use crate::error::BatchError;

/// One rectified stereo pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePair {
    pub left: PathBuf,
    pub right: PathBuf,
}

/// Read and parse a list file.
///
/// # Errors
///
/// Returns [`BatchError::ListRead`] if the file cannot be read, otherwise
/// whatever [`parse_pair_list`] returns.
pub fn read_pair_list(path: &Path) -> Result<Vec<ImagePair>, BatchError> {
    let text = std::fs::read_to_string(path).map_err(|source| BatchError::ListRead {
        path: path.to_path_buf(),
        source,
    })?;
    parse_pair_list(&text)
}

/// Parse list text into pairs.
///
/// The whole list is validated before any pair is returned, so a
/// malformed list never gets partially processed.
///
/// # Errors
///
/// Returns [`BatchError::EmptyEntry`] for a blank line followed by more
/// entries, and [`BatchError::UnpairedEntry`] when the entry count is odd.
pub fn parse_pair_list(text: &str) -> Result<Vec<ImagePair>, BatchError> {
    let mut entries: Vec<(usize, &str)> = text
        .lines()
        .enumerate()
        .map(|(index, line)| (index + 1, line.trim()))
        .collect();
    while entries.last().is_some_and(|(_, entry)| entry.is_empty()) {
        entries.pop();
    }

    if let Some(&(line, _)) = entries.iter().find(|(_, entry)| entry.is_empty()) {
        return Err(BatchError::EmptyEntry { line });
    }
    if entries.len() % 2 == 1
        && let Some(&(line, _)) = entries.last()
    {
        return Err(BatchError::UnpairedEntry { line });
    }

    Ok(entries
        .chunks_exact(2)
        .map(|chunk| ImagePair {
            left: PathBuf::from(chunk[0].1),
            right: PathBuf::from(chunk[1].1),
        })
        .collect())
}
