//! Fetch-if-absent model downloads.
//!
//! A model counts as present as soon as its directory exists under the model
//! root; nothing is re-verified. Each entry is handled independently, so one
//! failed download does not stop the others.

use std::fmt;
use std::path::Path;

use crate::catalog::ModelCatalogEntry;

#[derive(thiserror::Error, Debug)]
pub enum FetchError {
    #[cfg(feature = "hub")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Hub rejected request: {0}")]
    Hub(String),
    #[error("Refusing to write outside the model directory: {0}")]
    UnsafePath(String),
}

/// Downloads one model repository into a local directory.
pub trait ModelFetcher {
    fn fetch(&self, remote_identifier: &str, local_directory: &Path) -> Result<(), FetchError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcquisitionStatus {
    AlreadyPresent,
    Downloaded,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquisitionOutcome {
    pub entry: ModelCatalogEntry,
    pub status: AcquisitionStatus,
}

impl fmt::Display for AcquisitionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = &self.entry.display_name;
        match &self.status {
            AcquisitionStatus::AlreadyPresent => write!(f, "✓ {name}: already present"),
            AcquisitionStatus::Downloaded => write!(f, "✓ {name}: downloaded"),
            AcquisitionStatus::Failed(reason) => write!(f, "✗ {name}: {reason}"),
        }
    }
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum SelectionError {
    #[error("Unknown model selection: {0:?}")]
    Unknown(String),
    #[error("Selection {index} is out of range (1-{len})")]
    OutOfRange { index: usize, len: usize },
}

/// Parse a comma-separated selection of 1-based numbers or display names
/// into catalog indices.
///
/// Empty input selects everything. Duplicates collapse and the result keeps
/// catalog order.
pub fn parse_selection(
    input: &str,
    catalog: &[ModelCatalogEntry],
) -> Result<Vec<usize>, SelectionError> {
    let input = input.trim();
    if input.is_empty() {
        return Ok((0..catalog.len()).collect());
    }

    let mut picked = vec![false; catalog.len()];
    for token in input.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        let index = match token.parse::<usize>() {
            Ok(n) if n >= 1 && n <= catalog.len() => n - 1,
            Ok(n) => {
                return Err(SelectionError::OutOfRange {
                    index: n,
                    len: catalog.len(),
                })
            }
            Err(_) => catalog
                .iter()
                .position(|e| e.display_name.eq_ignore_ascii_case(token))
                .ok_or_else(|| SelectionError::Unknown(token.to_string()))?,
        };
        picked[index] = true;
    }

    Ok(picked
        .iter()
        .enumerate()
        .filter_map(|(i, &p)| p.then_some(i))
        .collect())
}

/// Make sure every selected catalog entry exists under `model_root`.
///
/// Out-of-range indices are ignored.
pub fn acquire(
    selection: &[usize],
    catalog: &[ModelCatalogEntry],
    model_root: &Path,
    fetcher: &dyn ModelFetcher,
) -> Vec<AcquisitionOutcome> {
    let root_error = std::fs::create_dir_all(model_root).err().map(|e| {
        log::error!("Cannot create model root {}: {e}", model_root.display());
        e.to_string()
    });

    selection
        .iter()
        .filter_map(|&i| catalog.get(i))
        .map(|entry| {
            let status = match &root_error {
                Some(reason) => AcquisitionStatus::Failed(reason.clone()),
                None => acquire_one(entry, model_root, fetcher),
            };
            AcquisitionOutcome {
                entry: entry.clone(),
                status,
            }
        })
        .collect()
}

fn acquire_one(
    entry: &ModelCatalogEntry,
    model_root: &Path,
    fetcher: &dyn ModelFetcher,
) -> AcquisitionStatus {
    let local_dir = model_root.join(&entry.local_directory);
    if local_dir.exists() {
        log::info!(
            "{} already present at {}, skipping",
            entry.display_name,
            local_dir.display()
        );
        return AcquisitionStatus::AlreadyPresent;
    }

    log::info!(
        "Downloading {} ({}) to {}",
        entry.display_name,
        entry.remote_identifier,
        local_dir.display()
    );
    match fetcher.fetch(&entry.remote_identifier, &local_dir) {
        Ok(()) => AcquisitionStatus::Downloaded,
        Err(e) => {
            log::warn!("Download of {} failed: {e}", entry.display_name);
            AcquisitionStatus::Failed(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::default_catalog;

    #[test]
    fn empty_selection_means_everything() {
        let catalog = default_catalog();
        assert_eq!(parse_selection("  ", &catalog).unwrap(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn selection_accepts_numbers_and_names() {
        let catalog = default_catalog();
        assert_eq!(
            parse_selection("3, cosyvoice2-0.5b,3", &catalog).unwrap(),
            vec![0, 2]
        );
    }

    #[test]
    fn selection_rejects_garbage() {
        let catalog = default_catalog();
        assert_eq!(
            parse_selection("9", &catalog),
            Err(SelectionError::OutOfRange { index: 9, len: 4 })
        );
        assert_eq!(
            parse_selection("0", &catalog),
            Err(SelectionError::OutOfRange { index: 0, len: 4 })
        );
        assert_eq!(
            parse_selection("abc", &catalog),
            Err(SelectionError::Unknown("abc".into()))
        );
    }
}
