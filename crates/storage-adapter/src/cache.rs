//! Local artifact cache
//!
//! One directory per model identifier under a single root. Downloads land in
//! a `.staging-*` directory and are renamed into place; deletions rename the
//! directory to a `.trash-*` tombstone before removing it, so a crash never
//! leaves a half-written or half-deleted `<root>/<id>`.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;
use walkdir::WalkDir;

use common::error::{Error, Result};
use common::models::{ArtifactRecord, ModelId};

/// Sidecar file holding the serialized [`ArtifactRecord`]
pub const RECORD_FILE: &str = "_record.json";

const STAGING_PREFIX: &str = ".staging-";
const TRASH_PREFIX: &str = ".trash-";

/// An artifact directory found on disk
#[derive(Debug, Clone, PartialEq)]
pub struct CachedArtifact {
    /// Identifier, taken from the directory name
    pub model_id: ModelId,

    /// Directory path
    pub path: PathBuf,

    /// Total size of the files in bytes
    pub size_bytes: u64,

    /// Last modification time of the directory
    pub modified_at: DateTime<Utc>,
}

/// Directory-per-identifier artifact cache
#[derive(Debug, Clone)]
pub struct ArtifactCache {
    /// Cache root
    root: PathBuf,
}

impl ArtifactCache {
    /// Opens the cache, creating the root directory if needed
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();

        if !root.exists() {
            fs::create_dir_all(&root)?;
            info!("Created artifact cache at {:?}", root);
        }

        if !root.is_dir() {
            return Err(Error::Config(format!("Artifact cache root {:?} is not a directory", root)));
        }

        Ok(Self { root })
    }

    /// Returns the cache root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the directory of an identifier, whether or not it exists
    pub fn path_for(&self, model_id: &ModelId) -> PathBuf {
        self.root.join(model_id.as_str())
    }

    /// Returns true if the identifier has a directory
    pub fn contains(&self, model_id: &ModelId) -> bool {
        self.path_for(model_id).is_dir()
    }

    /// Lists artifact directories sorted by identifier
    ///
    /// Dot directories (staging, tombstones, hidden files) and entries whose
    /// name is not a valid identifier are skipped.
    pub fn scan(&self) -> Result<Vec<CachedArtifact>> {
        let mut artifacts = Vec::new();

        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let path = entry.path();

            if !entry.file_type()?.is_dir() {
                continue;
            }

            let name = match entry.file_name().into_string() {
                Ok(name) => name,
                Err(name) => {
                    warn!("Skipping cache entry with non UTF-8 name {:?}", name);
                    continue;
                }
            };

            if name.starts_with('.') {
                continue;
            }

            let model_id = match ModelId::new(name.as_str()) {
                Ok(id) => id,
                Err(e) => {
                    warn!("Skipping cache entry {:?}: {}", name, e);
                    continue;
                }
            };

            let modified_at = entry
                .metadata()?
                .modified()
                .map(DateTime::<Utc>::from)
                .unwrap_or_else(|_| Utc::now());

            artifacts.push(CachedArtifact {
                model_id,
                size_bytes: directory_size(&path),
                path,
                modified_at,
            });
        }

        artifacts.sort_by(|a, b| a.model_id.cmp(&b.model_id));

        debug!("Scanned {} artifacts in {:?}", artifacts.len(), self.root);

        Ok(artifacts)
    }

    /// Creates an empty staging directory for a download of `model_id`
    pub fn staging_dir(&self, model_id: &ModelId) -> Result<PathBuf> {
        let path = self
            .root
            .join(format!("{}{}-{}", STAGING_PREFIX, model_id, Uuid::new_v4().simple()));
        fs::create_dir(&path)?;
        Ok(path)
    }

    /// Moves a completed staging directory to its final location
    pub fn promote(&self, staging: &Path, model_id: &ModelId) -> Result<PathBuf> {
        let target = self.path_for(model_id);

        if target.exists() {
            return Err(Error::Operational(format!(
                "Cannot promote {:?}: {:?} already exists",
                staging, target
            )));
        }

        fs::rename(staging, &target)?;
        Ok(target)
    }

    /// Removes a staging directory; a missing directory is not an error
    pub fn discard(&self, staging: &Path) -> Result<()> {
        remove_dir_if_exists(staging)
    }

    /// Renames the directory of `model_id` to a tombstone
    ///
    /// Returns `None` when the directory does not exist.
    pub fn begin_removal(&self, model_id: &ModelId) -> Result<Option<PathBuf>> {
        let source = self.path_for(model_id);
        let tombstone = self
            .root
            .join(format!("{}{}-{}", TRASH_PREFIX, model_id, Uuid::new_v4().simple()));

        match fs::rename(&source, &tombstone) {
            Ok(()) => Ok(Some(tombstone)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Removes a tombstone for good
    pub fn purge(&self, tombstone: &Path) -> Result<()> {
        remove_dir_if_exists(tombstone)
    }

    /// Removes staging directories and tombstones left behind by a previous run
    pub fn sweep(&self) -> Result<usize> {
        let mut removed = 0;

        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_string_lossy();

            if !(name.starts_with(STAGING_PREFIX) || name.starts_with(TRASH_PREFIX)) {
                continue;
            }

            match remove_dir_if_exists(&entry.path()) {
                Ok(()) => removed += 1,
                Err(e) => warn!("Failed to sweep {:?}: {}", entry.path(), e),
            }
        }

        if removed > 0 {
            info!("Swept {} leftover directories from {:?}", removed, self.root);
        }

        Ok(removed)
    }

    /// Persists the record next to the artifact files
    pub fn write_record(&self, record: &ArtifactRecord) -> Result<()> {
        let dir = self.path_for(&record.model_id);
        let tmp = dir.join(format!("{}.tmp", RECORD_FILE));
        let json = serde_json::to_string_pretty(record)?;

        fs::write(&tmp, json)?;
        fs::rename(&tmp, dir.join(RECORD_FILE))?;

        Ok(())
    }

    /// Reads the persisted record, `None` if there is none
    pub fn read_record(&self, model_id: &ModelId) -> Result<Option<ArtifactRecord>> {
        let path = self.path_for(model_id).join(RECORD_FILE);

        let json = match fs::read_to_string(&path) {
            Ok(json) => json,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let record: ArtifactRecord = serde_json::from_str(&json)?;

        if &record.model_id != model_id {
            return Err(Error::InvalidArgument(format!(
                "Record in {:?} belongs to {}",
                path, record.model_id
            )));
        }

        Ok(Some(record))
    }
}

/// Total size of the regular files below `path`
pub fn directory_size(path: &Path) -> u64 {
    WalkDir::new(path)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| entry.metadata().ok())
        .map(|metadata| metadata.len())
        .sum()
}

fn remove_dir_if_exists(path: &Path) -> Result<()> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::models::{ArtifactMetadata, ModelReference};
    use std::collections::BTreeMap;

    fn id(s: &str) -> ModelId {
        ModelId::new(s).unwrap()
    }

    fn record(cache: &ArtifactCache, model_id: &str) -> ArtifactRecord {
        let model_id = id(model_id);
        let metadata = ArtifactMetadata {
            name: "basic_model".to_string(),
            version: Some(1),
            created_at: Utc::now(),
            flavors: vec!["sklearn".to_string()],
            artifact_uri: "mlflow-artifacts:/1/models/m-1/artifacts".to_string(),
            tags: BTreeMap::new(),
        };
        let path = cache.path_for(&model_id);
        ArtifactRecord::new(model_id, &ModelReference::version("basic_model", 1), metadata, path)
    }

    #[test]
    fn test_open_creates_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("a").join("models");
        let cache = ArtifactCache::open(&root).unwrap();
        assert!(root.is_dir());
        assert!(cache.scan().unwrap().is_empty());
    }

    #[test]
    fn test_scan_is_sorted_and_skips_dot_entries() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ArtifactCache::open(dir.path()).unwrap();

        for name in ["m-b", "m-a", ".hidden", ".staging-m-c-123"] {
            fs::create_dir(dir.path().join(name)).unwrap();
        }
        fs::write(dir.path().join("m-a").join("model.json"), b"{}").unwrap();
        fs::write(dir.path().join("loose-file"), b"x").unwrap();

        let scanned = cache.scan().unwrap();
        let ids: Vec<&str> = scanned.iter().map(|a| a.model_id.as_str()).collect();
        assert_eq!(ids, vec!["m-a", "m-b"]);
        assert_eq!(scanned[0].size_bytes, 2);
    }

    #[test]
    fn test_stage_and_promote() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ArtifactCache::open(dir.path()).unwrap();
        let model_id = id("m-1");

        let staging = cache.staging_dir(&model_id).unwrap();
        fs::write(staging.join("model.json"), b"{}").unwrap();
        assert!(!cache.contains(&model_id));

        let path = cache.promote(&staging, &model_id).unwrap();
        assert_eq!(path, cache.path_for(&model_id));
        assert!(path.join("model.json").is_file());
        assert!(!staging.exists());

        let again = cache.staging_dir(&model_id).unwrap();
        assert!(cache.promote(&again, &model_id).is_err());
        cache.discard(&again).unwrap();
        assert!(!again.exists());
    }

    #[test]
    fn test_removal_and_sweep() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ArtifactCache::open(dir.path()).unwrap();
        let model_id = id("m-1");

        assert_eq!(cache.begin_removal(&model_id).unwrap(), None);

        fs::create_dir(cache.path_for(&model_id)).unwrap();
        let tombstone = cache.begin_removal(&model_id).unwrap().unwrap();
        assert!(!cache.contains(&model_id));
        assert!(tombstone.is_dir());
        assert!(cache.scan().unwrap().is_empty());

        cache.staging_dir(&id("m-2")).unwrap();
        assert_eq!(cache.sweep().unwrap(), 2);
        assert!(!tombstone.exists());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_record_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ArtifactCache::open(dir.path()).unwrap();
        let record = record(&cache, "m-1");

        assert_eq!(cache.read_record(&record.model_id).unwrap(), None);

        fs::create_dir(cache.path_for(&record.model_id)).unwrap();
        cache.write_record(&record).unwrap();

        let read = cache.read_record(&record.model_id).unwrap().unwrap();
        assert_eq!(read, record);
    }

    #[test]
    fn test_record_for_other_id_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ArtifactCache::open(dir.path()).unwrap();
        let record = record(&cache, "m-1");

        fs::create_dir(cache.path_for(&record.model_id)).unwrap();
        cache.write_record(&record).unwrap();
        fs::rename(cache.path_for(&record.model_id), dir.path().join("m-2")).unwrap();

        assert!(cache.read_record(&id("m-2")).is_err());
    }
}
