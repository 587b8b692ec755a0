use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Public ModelScope site, used for the hub API and manual download pages.
pub const MODELSCOPE_ENDPOINT: &str = "https://modelscope.cn";

/// A downloadable model: where it lives on the hub and where it goes locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelCatalogEntry {
    pub display_name: String,
    pub remote_identifier: String,
    /// Directory relative to the model root.
    pub local_directory: PathBuf,
}

impl ModelCatalogEntry {
    pub fn new(display_name: &str, remote_identifier: &str) -> Self {
        Self {
            display_name: display_name.to_string(),
            remote_identifier: remote_identifier.to_string(),
            local_directory: PathBuf::from(display_name),
        }
    }

    /// Page to fetch the model by hand when automatic download fails.
    pub fn manual_download_url(&self) -> String {
        format!("{MODELSCOPE_ENDPOINT}/{}", self.remote_identifier)
    }
}

/// Model the synthesis commands load by default.
pub const DEFAULT_MODEL: &str = "CosyVoice2-0.5B";

/// The CosyVoice family published on ModelScope. The first entry is the
/// recommended one.
pub fn default_catalog() -> Vec<ModelCatalogEntry> {
    vec![
        ModelCatalogEntry::new("CosyVoice2-0.5B", "iic/CosyVoice2-0.5B"),
        ModelCatalogEntry::new("CosyVoice-300M", "iic/CosyVoice-300M"),
        ModelCatalogEntry::new("CosyVoice-300M-SFT", "iic/CosyVoice-300M-SFT"),
        ModelCatalogEntry::new("CosyVoice-ttsfrd", "iic/CosyVoice-ttsfrd"),
    ]
}
