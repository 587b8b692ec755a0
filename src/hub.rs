//! ModelScope hub client.
//!
//! Lists a model repository through the hub's HTTP API and downloads every
//! file into a hidden staging directory next to the target. The staging
//! directory is renamed into place only after the last file lands, so an
//! interrupted download never leaves a directory that looks complete.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use reqwest::blocking::Client;
use serde::Deserialize;

use crate::acquire::{FetchError, ModelFetcher};

const DEFAULT_REVISION: &str = "master";

pub struct ModelScopeFetcher {
    client: Client,
    endpoint: String,
    revision: String,
    attempts: u32,
}

impl ModelScopeFetcher {
    pub fn new(endpoint: impl Into<String>, attempts: u32) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(concat!("tts-harness/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(10))
            .timeout(None::<Duration>)
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            revision: DEFAULT_REVISION.to_string(),
            attempts: attempts.max(1),
        })
    }

    fn list_files(&self, model_id: &str) -> Result<Vec<RepoFile>, FetchError> {
        let url = format!("{}/api/v1/models/{model_id}/repo/files", self.endpoint);
        let listing: Listing = self
            .client
            .get(&url)
            .query(&[("Revision", self.revision.as_str()), ("Recursive", "true")])
            .send()?
            .error_for_status()?
            .json()?;
        listing.into_files()
    }

    fn download_file(&self, model_id: &str, file_path: &str, dest: &Path) -> Result<(), FetchError> {
        let url = format!("{}/api/v1/models/{model_id}/repo", self.endpoint);
        let mut response = self
            .client
            .get(&url)
            .query(&[("Revision", self.revision.as_str()), ("FilePath", file_path)])
            .send()?
            .error_for_status()?;

        let mut file = File::create(dest)?;
        io::copy(&mut response, &mut file)?;
        file.flush()?;
        Ok(())
    }

    fn with_retry<T>(
        &self,
        what: &str,
        mut op: impl FnMut() -> Result<T, FetchError>,
    ) -> Result<T, FetchError> {
        let mut attempt = 1;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.attempts => {
                    log::warn!("{what} failed (attempt {attempt}/{}): {e}", self.attempts);
                    std::thread::sleep(Duration::from_secs(attempt as u64));
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn fetch_into(&self, model_id: &str, staging: &Path) -> Result<(), FetchError> {
        let files = self.with_retry(&format!("listing {model_id}"), || {
            self.list_files(model_id)
        })?;
        log::info!("{model_id}: {} file(s) to download", files.len());

        for file in files.iter().filter(|f| f.is_blob()) {
            let relative = safe_relative_path(&file.path)?;
            let dest = staging.join(&relative);
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)?;
            }
            log::debug!("Downloading {model_id}/{} ({} bytes)", file.path, file.size);
            self.with_retry(&format!("downloading {}", file.path), || {
                self.download_file(model_id, &file.path, &dest)
            })?;
        }
        Ok(())
    }
}

impl ModelFetcher for ModelScopeFetcher {
    fn fetch(&self, remote_identifier: &str, local_directory: &Path) -> Result<(), FetchError> {
        let staging = staging_dir(local_directory);
        if staging.exists() {
            fs::remove_dir_all(&staging)?;
        }
        fs::create_dir_all(&staging)?;

        let result = self
            .fetch_into(remote_identifier, &staging)
            .and_then(|()| fs::rename(&staging, local_directory).map_err(FetchError::from));
        if result.is_err() {
            let _ = fs::remove_dir_all(&staging);
        }
        result
    }
}

fn staging_dir(local_directory: &Path) -> PathBuf {
    let name = local_directory
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "model".to_string());
    local_directory.with_file_name(format!(".{name}.partial"))
}

fn safe_relative_path(path: &str) -> Result<PathBuf, FetchError> {
    let candidate = Path::new(path);
    let safe = !path.is_empty()
        && candidate
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
    if safe {
        Ok(candidate.to_path_buf())
    } else {
        Err(FetchError::UnsafePath(path.to_string()))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Listing {
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Option<ListingData>,
}

impl Listing {
    fn into_files(self) -> Result<Vec<RepoFile>, FetchError> {
        match (self.code, self.data) {
            (Some(200) | None, Some(data)) => Ok(data.files),
            (code, _) => Err(FetchError::Hub(format!(
                "code {}: {}",
                code.map_or_else(|| "?".to_string(), |c| c.to_string()),
                self.message.unwrap_or_default()
            ))),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListingData {
    #[serde(default)]
    files: Vec<RepoFile>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RepoFile {
    path: String,
    #[serde(rename = "Type", default)]
    kind: String,
    #[serde(default)]
    size: u64,
}

impl RepoFile {
    fn is_blob(&self) -> bool {
        self.kind != "tree"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_paths_escaping_the_model_dir() {
        assert!(safe_relative_path("llm.pt").is_ok());
        assert!(safe_relative_path("CosyVoice-BlankEN/config.json").is_ok());
        assert!(matches!(
            safe_relative_path("../evil"),
            Err(FetchError::UnsafePath(_))
        ));
        assert!(safe_relative_path("/etc/passwd").is_err());
        assert!(safe_relative_path("").is_err());
    }

    #[test]
    fn staging_dir_is_hidden_sibling() {
        let staging = staging_dir(Path::new("pretrained_models/CosyVoice2-0.5B"));
        assert_eq!(
            staging,
            PathBuf::from("pretrained_models/.CosyVoice2-0.5B.partial")
        );
    }

    #[test]
    fn parses_listing_and_skips_trees() {
        let json = r#"{
            "Code": 200,
            "Data": {"Files": [
                {"Name": "asset", "Path": "asset", "Type": "tree", "Size": 0},
                {"Name": "llm.pt", "Path": "llm.pt", "Type": "blob", "Size": 2048}
            ]},
            "Message": "success",
            "Success": true
        }"#;
        let listing: Listing = serde_json::from_str(json).unwrap();
        let files = listing.into_files().unwrap();
        let blobs: Vec<_> = files.iter().filter(|f| f.is_blob()).collect();
        assert_eq!(blobs.len(), 1);
        assert_eq!(blobs[0].path, "llm.pt");
        assert_eq!(blobs[0].size, 2048);
    }

    #[test]
    fn hub_error_codes_surface() {
        let listing: Listing =
            serde_json::from_str(r#"{"Code": 10010205001, "Message": "not found"}"#).unwrap();
        let err = listing.into_files().unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
