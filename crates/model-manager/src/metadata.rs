//! Model metadata
//!
//! Reads the `MLmodel` descriptor shipped with every MLflow artifact and
//! builds records for artifacts found on disk without one.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use tracing::debug;

use common::error::{Error, Result};
use common::models::{ArtifactMetadata, ArtifactRecord, ModelReference};
use storage_adapter::CachedArtifact;

/// MLflow model descriptor file name
pub const MLMODEL_FILE: &str = "MLmodel";

/// The parts of an `MLmodel` file the service uses
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MlModelDescriptor {
    /// Flavor name to flavor configuration
    #[serde(default)]
    pub flavors: BTreeMap<String, serde_yaml::Value>,

    /// Logged model identifier (MLflow 3)
    #[serde(default)]
    pub model_id: Option<String>,

    /// Creation time, `%Y-%m-%d %H:%M:%S%.f` in UTC
    #[serde(default)]
    pub utc_time_created: Option<String>,
}

impl MlModelDescriptor {
    /// Reads the descriptor in `dir`, `None` if the artifact has none
    pub fn read(dir: &Path) -> Result<Option<Self>> {
        let path = dir.join(MLMODEL_FILE);
        if !path.is_file() {
            return Ok(None);
        }

        let yaml = std::fs::read_to_string(&path)?;
        let descriptor = serde_yaml::from_str(&yaml)
            .map_err(|e| Error::InvalidArgument(format!("Malformed {:?}: {}", path, e)))?;

        Ok(Some(descriptor))
    }

    /// Flavor names in sorted order
    pub fn flavor_names(&self) -> Vec<String> {
        self.flavors.keys().cloned().collect()
    }

    /// Parsed creation time
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        let text = self.utc_time_created.as_deref()?;
        NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f")
            .ok()
            .map(|naive| naive.and_utc())
    }
}

/// Flavor names of the artifact in `dir`; empty when unknown
pub fn read_flavors(dir: &Path) -> Vec<String> {
    match MlModelDescriptor::read(dir) {
        Ok(Some(descriptor)) => descriptor.flavor_names(),
        Ok(None) => Vec::new(),
        Err(e) => {
            debug!("Ignoring flavors of {:?}: {}", dir, e);
            Vec::new()
        }
    }
}

/// Builds a record for a cached artifact that has no persisted one
///
/// The identifier doubles as the name and the reference is `models:/<id>`.
/// The creation time comes from the `MLmodel` file when present, else from
/// the directory's modification time.
pub fn synthesize_record(artifact: &CachedArtifact) -> ArtifactRecord {
    let descriptor = MlModelDescriptor::read(&artifact.path).ok().flatten().unwrap_or_default();

    let metadata = ArtifactMetadata {
        name: artifact.model_id.to_string(),
        version: None,
        created_at: descriptor.created_at().unwrap_or(artifact.modified_at),
        flavors: descriptor.flavor_names(),
        artifact_uri: format!("file://{}", artifact.path.display()),
        tags: BTreeMap::new(),
    };

    ArtifactRecord::new(
        artifact.model_id.clone(),
        &ModelReference::Id(artifact.model_id.clone()),
        metadata,
        artifact.path.clone(),
    )
}
