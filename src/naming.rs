//! Artifact file naming: `<mode>_<disambiguator>_<segment>.wav`.

use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::request::Mode;

pub const ARTIFACT_EXTENSION: &str = "wav";

/// How the per-call disambiguator is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NamingStrategy {
    /// Monotonic in-process counter, seeded once from the highest
    /// disambiguator already present in the output directory.
    #[default]
    Counter,
    /// Number of entries in the output directory, recounted for every
    /// segment. Not safe against concurrent writers.
    DirectoryCount,
}

pub fn artifact_file_name(mode: Mode, disambiguator: u64, segment_index: usize) -> String {
    format!("{mode}_{disambiguator}_{segment_index}.{ARTIFACT_EXTENSION}")
}

/// Parse `<mode>_<disambiguator>_<segment>.wav`, returning the disambiguator.
pub fn parse_disambiguator(file_name: &str) -> Option<u64> {
    let stem = file_name.strip_suffix(&format!(".{ARTIFACT_EXTENSION}"))?;
    let mut parts = stem.rsplitn(3, '_');
    let segment = parts.next()?;
    let disambiguator = parts.next()?;
    let mode = parts.next()?;
    if mode.is_empty() || segment.parse::<usize>().is_err() {
        return None;
    }
    disambiguator.parse().ok()
}

/// Computes artifact paths for successive synthesis calls in one directory.
#[derive(Debug, Clone)]
pub struct ArtifactNamer {
    strategy: NamingStrategy,
    next: Option<u64>,
}

impl ArtifactNamer {
    pub fn new(strategy: NamingStrategy) -> Self {
        Self {
            strategy,
            next: None,
        }
    }

    pub fn strategy(&self) -> NamingStrategy {
        self.strategy
    }

    /// Paths for the `count` segments of one call, in segment order.
    ///
    /// The directory must already exist.
    pub fn names_for_call(
        &mut self,
        dir: &Path,
        mode: Mode,
        count: usize,
    ) -> io::Result<Vec<PathBuf>> {
        let names = match self.strategy {
            NamingStrategy::Counter => {
                let disambiguator = match self.next {
                    Some(next) => next,
                    None => next_free_disambiguator(dir)?,
                };
                self.next = Some(disambiguator + 1);
                (0..count)
                    .map(|i| dir.join(artifact_file_name(mode, disambiguator, i)))
                    .collect()
            }
            NamingStrategy::DirectoryCount => {
                // Each written segment adds one entry, so segment i sees start + i.
                let start = std::fs::read_dir(dir)?.count() as u64;
                (0..count)
                    .map(|i| dir.join(artifact_file_name(mode, start + i as u64, i)))
                    .collect()
            }
        };
        Ok(names)
    }
}

fn next_free_disambiguator(dir: &Path) -> io::Result<u64> {
    let mut highest: Option<u64> = None;
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        if let Some(d) = name.to_str().and_then(parse_disambiguator) {
            highest = Some(highest.map_or(d, |h| h.max(d)));
        }
    }
    Ok(highest.map_or(0, |h| h + 1))
}
