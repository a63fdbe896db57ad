//! Common data models for OpinionLens
//!
//! This module defines the model identifiers, references and bookkeeping
//! records shared by the lifecycle manager, the cache and the serving facade.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// URI scheme prefix used by the model registry
pub const MODELS_SCHEME: &str = "models:/";

/// Opaque identifier of one artifact version.
///
/// The identifier doubles as the on-disk directory name inside the local
/// artifact cache, so construction rejects anything that is not a single,
/// visible path component.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ModelId(String);

impl ModelId {
    /// Creates a model identifier, validating it as a directory name
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();

        if id.is_empty() {
            return Err(Error::InvalidArgument("Model id must not be empty".to_string()));
        }

        if id.starts_with('.') {
            return Err(Error::InvalidArgument(format!(
                "Model id {:?} must not start with '.'",
                id
            )));
        }

        if id.contains(['/', '\\', '\0']) {
            return Err(Error::InvalidArgument(format!(
                "Model id {:?} must not contain path separators",
                id
            )));
        }

        Ok(Self(id))
    }

    /// Returns the identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ModelId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for ModelId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<ModelId> for String {
    fn from(id: ModelId) -> Self {
        id.0
    }
}

impl AsRef<str> for ModelId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// User-supplied locator for a model in the registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelReference {
    /// A concrete artifact identifier
    Id(ModelId),

    /// A registered model name and version number
    Version { name: String, version: u32 },

    /// A registered model name and alias
    Alias { name: String, alias: String },
}

impl ModelReference {
    /// Builds a reference from a registered model name and version
    pub fn version(name: impl Into<String>, version: u32) -> Self {
        ModelReference::Version { name: name.into(), version }
    }

    /// Returns the canonical `models:/` URI for this reference
    pub fn uri(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ModelReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelReference::Id(id) => write!(f, "{}{}", MODELS_SCHEME, id),
            ModelReference::Version { name, version } => {
                write!(f, "{}{}/{}", MODELS_SCHEME, name, version)
            }
            ModelReference::Alias { name, alias } => {
                write!(f, "{}{}@{}", MODELS_SCHEME, name, alias)
            }
        }
    }
}

impl FromStr for ModelReference {
    type Err = Error;

    /// Parses `models:/<id>`, `models:/<name>/<version>` or `models:/<name>@<alias>`.
    /// The scheme prefix is optional.
    fn from_str(s: &str) -> Result<Self> {
        let body = s.trim();
        let body = body.strip_prefix(MODELS_SCHEME).unwrap_or(body);

        if body.is_empty() {
            return Err(Error::InvalidArgument(format!("Empty model reference {:?}", s)));
        }

        if let Some((name, alias)) = body.split_once('@') {
            if name.is_empty() || alias.is_empty() || alias.contains('/') {
                return Err(Error::InvalidArgument(format!("Malformed model alias reference {:?}", s)));
            }

            return Ok(ModelReference::Alias {
                name: name.to_string(),
                alias: alias.to_string(),
            });
        }

        if let Some((name, version)) = body.split_once('/') {
            let version = version.parse::<u32>().map_err(|_| {
                Error::InvalidArgument(format!("Model version in {:?} is not a number", s))
            })?;

            if name.is_empty() {
                return Err(Error::InvalidArgument(format!("Missing model name in {:?}", s)));
            }

            return Ok(ModelReference::Version {
                name: name.to_string(),
                version,
            });
        }

        Ok(ModelReference::Id(ModelId::new(body)?))
    }
}

/// Descriptive metadata the registry returns for a resolved reference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    /// Human name of the model
    pub name: String,

    /// Registry version, when the reference went through a registered model
    pub version: Option<u32>,

    /// Creation timestamp in the registry
    pub created_at: DateTime<Utc>,

    /// Flavor tags (e.g. `python_function`, `sklearn`)
    pub flavors: Vec<String>,

    /// Where the registry keeps the artifact files
    pub artifact_uri: String,

    /// Arbitrary registry tags
    pub tags: BTreeMap<String, String>,
}

/// Per-identifier bookkeeping kept by the lifecycle manager
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactRecord {
    pub model_id: ModelId,
    pub model_name: String,
    pub model_version: Option<u32>,
    pub model_creation: DateTime<Utc>,
    pub model_flavors: Vec<String>,
    pub registry_model_uri: String,
    pub artifact_uri: String,
    pub saved_model_path: PathBuf,
    pub model_tags: BTreeMap<String, String>,
    pub fetched_at: DateTime<Utc>,
}

impl ArtifactRecord {
    /// Creates a record for a freshly fetched artifact
    pub fn new(
        model_id: ModelId,
        reference: &ModelReference,
        metadata: ArtifactMetadata,
        saved_model_path: PathBuf,
    ) -> Self {
        Self {
            model_id,
            model_name: metadata.name,
            model_version: metadata.version,
            // The registry reports milliseconds; records keep whole seconds.
            model_creation: truncate_to_seconds(metadata.created_at),
            model_flavors: metadata.flavors,
            registry_model_uri: reference.uri(),
            artifact_uri: metadata.artifact_uri,
            saved_model_path,
            model_tags: metadata.tags,
            fetched_at: truncate_to_seconds(Utc::now()),
        }
    }
}

fn truncate_to_seconds(ts: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp(ts.timestamp(), 0).unwrap_or(ts)
}

/// Lifecycle state of one model identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelState {
    /// Never fetched, or deleted
    Absent,
    /// Files on disk, nothing loaded
    Cold,
    /// Files on disk and loaded in memory
    Hot,
}

impl fmt::Display for ModelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelState::Absent => write!(f, "absent"),
            ModelState::Cold => write!(f, "cold"),
            ModelState::Hot => write!(f, "hot"),
        }
    }
}

/// A record together with the live state flags at the time it was read
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordView {
    #[serde(flatten)]
    pub record: ArtifactRecord,
    pub is_hot: bool,
    pub is_default: bool,
}

impl RecordView {
    /// Returns the state this view was taken in
    pub fn state(&self) -> ModelState {
        if self.is_hot {
            ModelState::Hot
        } else {
            ModelState::Cold
        }
    }

    /// Condenses the view into the short listing shape
    pub fn brief(&self) -> BriefView {
        BriefView {
            model_id: self.record.model_id.clone(),
            name: self.record.model_name.clone(),
            version: self.record.model_version,
            creation: self.record.model_creation.format("%Y-%m-%d %H:%M:%S").to_string(),
            is_default: self.is_default,
            is_hot: self.is_hot,
        }
    }
}

/// Short listing entry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BriefView {
    pub model_id: ModelId,
    pub name: String,
    pub version: Option<u32>,
    pub creation: String,
    pub is_default: bool,
    pub is_hot: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_id_validation() {
        assert!(ModelId::new("m-0123abcd").is_ok());
        assert!(ModelId::new("").is_err());
        assert!(ModelId::new(".staging").is_err());
        assert!(ModelId::new("../etc").is_err());
        assert!(ModelId::new("a/b").is_err());
        assert!(ModelId::new("a\\b").is_err());
    }

    #[test]
    fn test_reference_parsing() {
        assert_eq!(
            "basic_model/1".parse::<ModelReference>().unwrap(),
            ModelReference::version("basic_model", 1)
        );
        assert_eq!(
            "models:/basic_model/7".parse::<ModelReference>().unwrap(),
            ModelReference::version("basic_model", 7)
        );
        assert_eq!(
            "models:/basic_model@champion".parse::<ModelReference>().unwrap(),
            ModelReference::Alias {
                name: "basic_model".to_string(),
                alias: "champion".to_string()
            }
        );
        assert_eq!(
            "models:/m-1".parse::<ModelReference>().unwrap(),
            ModelReference::Id(ModelId::new("m-1").unwrap())
        );

        assert!("basic_model/latest".parse::<ModelReference>().is_err());
        assert!("models:/".parse::<ModelReference>().is_err());
        assert!("/3".parse::<ModelReference>().is_err());
        assert!("name@".parse::<ModelReference>().is_err());
    }

    #[test]
    fn test_reference_uri() {
        let reference: ModelReference = "basic_model/1".parse().unwrap();
        assert_eq!(reference.uri(), "models:/basic_model/1");

        let reference: ModelReference = "m-42".parse().unwrap();
        assert_eq!(reference.uri(), "models:/m-42");
    }

    #[test]
    fn test_brief_view() {
        let metadata = ArtifactMetadata {
            name: "basic_model".to_string(),
            version: Some(1),
            created_at: DateTime::from_timestamp(1_700_000_000, 123_000_000).unwrap(),
            flavors: vec!["sklearn".to_string()],
            artifact_uri: "mlflow-artifacts:/1/models/m-1/artifacts".to_string(),
            tags: BTreeMap::new(),
        };
        let id = ModelId::new("m-1").unwrap();
        let record = ArtifactRecord::new(
            id.clone(),
            &ModelReference::version("basic_model", 1),
            metadata,
            PathBuf::from("/tmp/models/m-1"),
        );
        assert_eq!(record.model_creation.timestamp_subsec_nanos(), 0);

        let view = RecordView { record, is_hot: true, is_default: false };
        let brief = view.brief();
        assert_eq!(brief.model_id, id);
        assert_eq!(brief.version, Some(1));
        assert_eq!(brief.creation, "2023-11-14 22:13:20");
        assert_eq!(view.state(), ModelState::Hot);
    }

    #[test]
    fn test_record_view_serializes_flat() {
        let metadata = ArtifactMetadata {
            name: "basic_model".to_string(),
            version: None,
            created_at: Utc::now(),
            flavors: vec![],
            artifact_uri: String::new(),
            tags: BTreeMap::new(),
        };
        let record = ArtifactRecord::new(
            ModelId::new("m-1").unwrap(),
            &ModelReference::Id(ModelId::new("m-1").unwrap()),
            metadata,
            PathBuf::from("models/m-1"),
        );
        let view = RecordView { record, is_hot: false, is_default: false };
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["model_id"], "m-1");
        assert_eq!(json["registry_model_uri"], "models:/m-1");
        assert_eq!(json["is_hot"], false);
    }
}
