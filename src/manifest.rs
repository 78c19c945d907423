//! Dataset manifest: which source serves which dataset, and how request
//! URLs are built.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// How a source's responses are encoded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceFormat {
    Json,
    GeoJson,
}

/// One group of datasets served from a common base path.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SourcePattern {
    /// Base path, e.g. `https://api.example.org/api/` or `data/`.
    pub path: String,
    /// Dataset names this source serves.
    pub members: Vec<String>,
    /// File extension appended to the dataset name, if any.
    #[serde(default)]
    pub extension: Option<String>,
    pub format: SourceFormat,
}

/// The full dataset manifest.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Manifest {
    pub patterns: Vec<SourcePattern>,
}

/// Resolved location info for one dataset.
#[derive(Clone, Debug)]
pub struct DataMeta {
    pub path: String,
    pub extension: Option<String>,
    pub format: SourceFormat,
}

impl Manifest {
    pub fn new(patterns: Vec<SourcePattern>) -> Self {
        Self { patterns }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Look up the source serving `name`. First matching pattern wins.
    pub fn meta(&self, name: &str) -> Result<DataMeta> {
        self.patterns
            .iter()
            .find(|p| p.members.iter().any(|m| m == name))
            .map(|p| DataMeta {
                path: p.path.clone(),
                extension: p.extension.clone(),
                format: p.format,
            })
            .ok_or_else(|| Error::DatasetNotInManifest(name.to_string()))
    }
}

impl DataMeta {
    /// Request URL for a dataset: base path, name, slash-joined params,
    /// then the extension if the source has one.
    pub fn url(&self, name: &str, params: &[String]) -> String {
        let mut url = format!("{}{}", self.path, name);
        for param in params {
            url.push('/');
            url.push_str(param);
        }
        if let Some(ext) = &self.extension {
            url.push_str(ext);
        }
        url
    }
}
