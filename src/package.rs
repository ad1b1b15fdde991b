//! `datapackage.json` metadata model.
//!
//! A presamples package directory holds one `datapackage.json` describing its
//! resources plus the `.npy`/`.json` files those resources reference.

use crate::error::{PresamplesError, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;

pub const DATAPACKAGE_FILENAME: &str = "datapackage.json";
pub const PACKAGE_PROFILE: &str = "data-package";
pub const RESOURCE_PROFILE: &str = "data-resource";
pub const NPY_MEDIATYPE: &str = "application/octet-stream";
pub const JSON_MEDIATYPE: &str = "application/json";

/// How a package picks the sample column for each iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Seed {
    /// Uniform random columns from an RNG seeded with this value
    Fixed(u64),
    /// Columns in order, wrapping around
    Sequential,
    /// Uniform random columns from an entropy-seeded RNG
    #[default]
    Unseeded,
}

const SEQUENTIAL: &str = "sequential";

impl Serialize for Seed {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Seed::Fixed(value) => serializer.serialize_u64(*value),
            Seed::Sequential => serializer.serialize_str(SEQUENTIAL),
            Seed::Unseeded => serializer.serialize_none(),
        }
    }
}

/// Accepts an integer, `"sequential"`, or `null`
impl<'de> Deserialize<'de> for Seed {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        use serde::de::Error;

        match Value::deserialize(deserializer)? {
            Value::Null => Ok(Seed::Unseeded),
            Value::Number(n) => n
                .as_u64()
                .map(Seed::Fixed)
                .ok_or_else(|| D::Error::custom("Seed must be a non-negative integer")),
            Value::String(s) if s == SEQUENTIAL => Ok(Seed::Sequential),
            other => Err(D::Error::custom(format!(
                "Seed must be an integer, \"{SEQUENTIAL}\" or null, got {other}"
            ))),
        }
    }
}

/// Reference from a resource to one file in the package directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRef {
    pub filepath: String,
    pub md5: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shape: Option<Vec<usize>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dtype: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mediatype: Option<String>,
}

/// Field names and mapping name used to turn database ids into matrix indices
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LabelTriple {
    /// Index field holding database ids
    pub from: String,
    /// Index field receiving matrix indices
    pub to: String,
    /// Name of the id-to-index mapping on the calculation
    pub dict: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Resource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub samples: Option<FileRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indices: Option<FileRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub names: Option<FileRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matrix: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
    #[serde(rename = "row from label", default, skip_serializing_if = "Option::is_none")]
    pub row_from_label: Option<String>,
    #[serde(rename = "row to label", default, skip_serializing_if = "Option::is_none")]
    pub row_to_label: Option<String>,
    #[serde(rename = "row dict", default, skip_serializing_if = "Option::is_none")]
    pub row_dict: Option<String>,
    #[serde(rename = "col from label", default, skip_serializing_if = "Option::is_none")]
    pub col_from_label: Option<String>,
    #[serde(rename = "col to label", default, skip_serializing_if = "Option::is_none")]
    pub col_to_label: Option<String>,
    #[serde(rename = "col dict", default, skip_serializing_if = "Option::is_none")]
    pub col_dict: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
    /// Keys this crate does not interpret, kept verbatim
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Resource {
    /// Resources naming a target matrix carry matrix presamples
    pub fn is_matrix_resource(&self) -> bool {
        self.matrix.as_deref().is_some_and(|m| !m.is_empty())
    }

    /// Resources with a names file carry named parameter presamples
    pub fn is_parameter_resource(&self) -> bool {
        self.names.is_some()
    }

    /// Grouping key for consolidation; resources without a type share the empty key
    pub fn kind(&self) -> &str {
        self.kind.as_deref().unwrap_or_default()
    }

    pub fn files(&self) -> impl Iterator<Item = &FileRef> {
        [&self.samples, &self.indices, &self.names]
            .into_iter()
            .filter_map(Option::as_ref)
    }

    pub fn row_labels(&self) -> Option<LabelTriple> {
        Some(LabelTriple {
            from: self.row_from_label.clone()?,
            to: self.row_to_label.clone()?,
            dict: self.row_dict.clone()?,
        })
    }

    pub fn has_col_dict(&self) -> bool {
        self.col_dict.is_some()
    }

    pub fn col_labels(&self) -> Option<LabelTriple> {
        Some(LabelTriple {
            from: self.col_from_label.clone()?,
            to: self.col_to_label.clone()?,
            dict: self.col_dict.clone()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Datapackage {
    pub name: String,
    pub id: String,
    #[serde(default = "default_profile")]
    pub profile: String,
    #[serde(default)]
    pub seed: Seed,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ncols: Option<usize>,
    #[serde(default)]
    pub resources: Vec<Resource>,
}

fn default_profile() -> String {
    PACKAGE_PROFILE.to_string()
}

impl Datapackage {
    /// Read `datapackage.json` from a package directory
    pub fn read(dirpath: &Path, max_bytes: u64) -> Result<Self> {
        let path = dirpath.join(DATAPACKAGE_FILENAME);
        let metadata = fs::metadata(&path).map_err(|_| {
            PresamplesError::invalid_package(dirpath, format!("missing {DATAPACKAGE_FILENAME}"))
        })?;
        if !metadata.is_file() {
            return Err(PresamplesError::invalid_package(
                dirpath,
                format!("{DATAPACKAGE_FILENAME} is not a regular file"),
            ));
        }
        if metadata.len() > max_bytes {
            return Err(PresamplesError::invalid_package(
                dirpath,
                format!(
                    "{DATAPACKAGE_FILENAME} is {} bytes, limit is {max_bytes}",
                    metadata.len()
                ),
            ));
        }

        let text = fs::read_to_string(&path).map_err(|e| PresamplesError::io(&path, e))?;
        serde_json::from_str(&text).map_err(|e| {
            PresamplesError::invalid_package(dirpath, format!("invalid {DATAPACKAGE_FILENAME}: {e}"))
        })
    }

    pub fn write(&self, dirpath: &Path) -> Result<()> {
        let path = dirpath.join(DATAPACKAGE_FILENAME);
        let text = serde_json::to_string_pretty(self)?;
        fs::write(&path, text).map_err(|e| PresamplesError::io(&path, e))
    }
}
