//! Model lifecycle manager
//!
//! Owns the hot/cold state of every cached model and the default pointer.
//!
//! - `records` holds one entry per model on disk (Cold or Hot),
//! - `hot` holds the loaded models, always a subset of `records`,
//! - `default_model`, when set, always names a key of `hot`.
//!
//! All three live behind one lock so every transition checks and applies in
//! a single critical section and every query sees a consistent snapshot.
//! Downloads and loads happen outside that lock, serialized per identifier.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use common::error::{Error, Result};
use common::models::{ArtifactRecord, ModelId, ModelReference, ModelState, RecordView};
use config::ManagerSettings;
use inference_engine::SentimentModel;
use storage_adapter::ArtifactCache;

use crate::loader::ModelLoader;
use crate::metadata::{read_flavors, synthesize_record};
use crate::registry::{ArtifactStore, RegistryEntry, ResolvedModel};

/// What to do after a fetch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchOptions {
    /// Load the model into memory
    pub warm: bool,

    /// Make the model the default; implies `warm`
    pub set_default: bool,
}

/// Result of a fetch
#[derive(Debug, Clone, PartialEq)]
pub struct FetchOutcome {
    /// Identifier the reference resolved to
    pub model_id: ModelId,

    /// Local artifact directory
    pub path: PathBuf,

    /// Whether this call transferred the files
    pub downloaded: bool,

    /// State after the call
    pub state: ModelState,

    /// Whether the model is the default after the call
    pub is_default: bool,
}

#[derive(Default)]
struct ManagerState {
    records: BTreeMap<ModelId, ArtifactRecord>,
    hot: HashMap<ModelId, Arc<dyn SentimentModel>>,
    default_model: Option<ModelId>,
}

impl ManagerState {
    fn state_of(&self, model_id: &ModelId) -> ModelState {
        if self.hot.contains_key(model_id) {
            ModelState::Hot
        } else if self.records.contains_key(model_id) {
            ModelState::Cold
        } else {
            ModelState::Absent
        }
    }

    fn view(&self, record: &ArtifactRecord) -> RecordView {
        RecordView {
            record: record.clone(),
            is_hot: self.hot.contains_key(&record.model_id),
            is_default: self.default_model.as_ref() == Some(&record.model_id),
        }
    }
}

/// Hot/cold model lifecycle manager
pub struct ModelManager {
    /// Local artifact cache
    cache: ArtifactCache,

    /// Registry the artifacts come from
    store: Arc<dyn ArtifactStore>,

    /// Factory for loaded models
    loader: Arc<dyn ModelLoader>,

    /// Records, loaded models and the default pointer
    state: RwLock<ManagerState>,

    /// Per-identifier locks serializing fetch, warm, cool and delete
    locks: DashMap<ModelId, Arc<Mutex<()>>>,
}

impl ModelManager {
    /// Creates a manager over the cache, registering every cached artifact as Cold
    pub fn new(cache: ArtifactCache, store: Arc<dyn ArtifactStore>, loader: Arc<dyn ModelLoader>) -> Result<Self> {
        if let Err(e) = cache.sweep() {
            warn!("Failed to sweep leftovers in {:?}: {}", cache.root(), e);
        }

        let mut records = BTreeMap::new();

        for artifact in cache.scan()? {
            let mut record = match cache.read_record(&artifact.model_id) {
                Ok(Some(record)) => record,
                Ok(None) => {
                    debug!("No record for {}, synthesizing one", artifact.model_id);
                    synthesize_record(&artifact)
                }
                Err(e) => {
                    warn!("Unreadable record for {}: {}", artifact.model_id, e);
                    synthesize_record(&artifact)
                }
            };

            // The cache root may have moved since the record was written
            record.saved_model_path = artifact.path.clone();

            debug!("Discovered model {} at {:?}", artifact.model_id, artifact.path);
            records.insert(artifact.model_id, record);
        }

        info!("Model manager found {} cached models in {:?}", records.len(), cache.root());

        Ok(Self {
            cache,
            store,
            loader,
            state: RwLock::new(ManagerState {
                records,
                ..ManagerState::default()
            }),
            locks: DashMap::new(),
        })
    }

    /// Creates a manager and runs the boot reconciliation pass
    pub async fn open(
        cache: ArtifactCache,
        store: Arc<dyn ArtifactStore>,
        loader: Arc<dyn ModelLoader>,
        settings: &ManagerSettings,
    ) -> Result<Self> {
        let manager = Self::new(cache, store, loader)?;

        if settings.warm_on_boot {
            manager.reconcile(settings.default_model.as_deref()).await;
        }

        info!("Model manager initialized");

        Ok(manager)
    }

    /// Warms one cached model and makes it the default
    ///
    /// Picks `preferred` when it was discovered, else the smallest identifier.
    /// Returns the new default, or `None` when nothing could be warmed.
    pub async fn reconcile(&self, preferred: Option<&str>) -> Option<ModelId> {
        let candidate = {
            let state = self.state.read();

            let preferred = preferred.and_then(|name| match ModelId::new(name) {
                Ok(model_id) if state.records.contains_key(&model_id) => Some(model_id),
                _ => {
                    warn!("Configured default model {:?} is not cached", name);
                    None
                }
            });

            preferred.or_else(|| state.records.keys().next().cloned())
        };

        let model_id = match candidate {
            Some(model_id) => model_id,
            None => {
                info!("No cached models, starting without a default model");
                return None;
            }
        };

        match self.warm(&model_id).await.and_then(|_| self.set_default(&model_id)) {
            Ok(()) => Some(model_id),
            Err(e) => {
                error!("Failed to make {} the default model at startup: {}", model_id, e);
                None
            }
        }
    }

    fn lock_for(&self, model_id: &ModelId) -> Arc<Mutex<()>> {
        self.locks
            .entry(model_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drops the lock of an identifier nobody is waiting on
    fn release_lock(&self, model_id: &ModelId) {
        self.locks.remove_if(model_id, |_, lock| Arc::strong_count(lock) == 1);
    }

    /// Fails without touching the lock map when the identifier was never fetched
    fn ensure_recorded(&self, model_id: &ModelId) -> Result<()> {
        if self.state.read().records.contains_key(model_id) {
            Ok(())
        } else {
            Err(not_found(model_id))
        }
    }

    /// Makes the referenced model available on disk, leaving it Cold
    ///
    /// The reference is resolved on every call. An identifier already
    /// recorded is never transferred again.
    pub async fn fetch(&self, reference: &ModelReference) -> Result<FetchOutcome> {
        let resolved = self.store.resolve(reference).await.map_err(into_registry_error)?;
        let model_id = resolved.model_id.clone();

        let lock = self.lock_for(&model_id);
        let guard = lock.lock().await;

        let result = self.fetch_resolved(reference, resolved).await;

        drop(guard);
        drop(lock);
        if result.is_err() {
            self.release_lock(&model_id);
        }

        result
    }

    async fn fetch_resolved(&self, reference: &ModelReference, resolved: ResolvedModel) -> Result<FetchOutcome> {
        let model_id = resolved.model_id.clone();

        let existing = self
            .state
            .read()
            .records
            .get(&model_id)
            .map(|record| record.saved_model_path.clone());

        if let Some(path) = existing {
            info!("Model {}, requested as {}, is already cached", model_id, reference);
            return Ok(self.outcome(model_id, path, false));
        }

        let path = self.cache.path_for(&model_id);

        let downloaded = if self.cache.contains(&model_id) {
            warn!("Directory {:?} exists without a record, reusing its files", path);
            false
        } else {
            info!("Model {} was requested as {}, downloading", model_id, reference);

            let staging = self.cache.staging_dir(&model_id)?;

            let transfer = self
                .store
                .download(&resolved, &staging)
                .await
                .map_err(into_registry_error)
                .and_then(|_| self.cache.promote(&staging, &model_id));

            if let Err(e) = transfer {
                if let Err(cleanup) = self.cache.discard(&staging) {
                    warn!("Failed to remove staging directory {:?}: {}", staging, cleanup);
                }
                error!("Fetching {} failed: {}", model_id, e);
                return Err(e);
            }

            debug!("Model {} saved at {:?}", model_id, path);
            true
        };

        let mut metadata = resolved.metadata;
        if metadata.flavors.is_empty() {
            metadata.flavors = read_flavors(&path);
        }

        let record = ArtifactRecord::new(model_id.clone(), &resolved.reference, metadata, path.clone());

        if let Err(e) = self.cache.write_record(&record) {
            warn!("Failed to persist record for {}: {}", model_id, e);
        }

        self.state.write().records.insert(model_id.clone(), record);

        info!("Model {} fetched", model_id);

        Ok(self.outcome(model_id, path, downloaded))
    }

    /// Fetches, then optionally warms and sets the default
    pub async fn fetch_with(&self, reference: &ModelReference, options: FetchOptions) -> Result<FetchOutcome> {
        let outcome = self.fetch(reference).await?;

        if options.warm || options.set_default {
            self.warm(&outcome.model_id).await?;
        }

        if options.set_default {
            self.set_default(&outcome.model_id)?;
        }

        Ok(self.outcome(outcome.model_id, outcome.path, outcome.downloaded))
    }

    fn outcome(&self, model_id: ModelId, path: PathBuf, downloaded: bool) -> FetchOutcome {
        let state = self.state.read();
        FetchOutcome {
            state: state.state_of(&model_id),
            is_default: state.default_model.as_ref() == Some(&model_id),
            model_id,
            path,
            downloaded,
        }
    }

    /// Loads a Cold model into memory
    pub async fn warm(&self, model_id: &ModelId) -> Result<()> {
        self.ensure_recorded(model_id)?;

        let lock = self.lock_for(model_id);
        let _guard = lock.lock().await;

        let path = {
            let state = self.state.read();

            let record = state.records.get(model_id).ok_or_else(|| not_found(model_id))?;

            if state.hot.contains_key(model_id) {
                debug!("Model {} is already warm", model_id);
                return Ok(());
            }

            record.saved_model_path.clone()
        };

        let loader = self.loader.clone();
        let load_id = model_id.clone();

        let model = tokio::task::spawn_blocking(move || loader.load(&path, &load_id))
            .await
            .map_err(|e| Error::Operational(format!("Loading task for model {} failed: {}", model_id, e)))?
            .map_err(|e| {
                error!("Failed to load model {}: {}", model_id, e);
                Error::Operational(format!("Failed to load model {}: {}", model_id, e))
            })?;

        let mut state = self.state.write();

        if !state.records.contains_key(model_id) {
            error!("Model {} disappeared while loading", model_id);
            return Err(Error::Operational(format!("Model {} disappeared while loading", model_id)));
        }

        state.hot.insert(model_id.clone(), model);

        info!("Model {} is warm", model_id);

        Ok(())
    }

    /// Evicts a Hot model from memory, keeping its files
    ///
    /// Cooling the default model clears the default pointer.
    pub async fn cool(&self, model_id: &ModelId) -> Result<()> {
        self.ensure_recorded(model_id)?;

        let lock = self.lock_for(model_id);
        let _guard = lock.lock().await;

        let mut state = self.state.write();

        if !state.records.contains_key(model_id) {
            return Err(not_found(model_id));
        }

        if state.hot.remove(model_id).is_none() {
            debug!("Model {} is already cold", model_id);
            return Ok(());
        }

        if state.default_model.as_ref() == Some(model_id) {
            state.default_model = None;
            warn!("Default model {} was cooled, no default model is set", model_id);
        }

        info!("Model {} is cold", model_id);

        Ok(())
    }

    /// Points the default at a Hot model
    pub fn set_default(&self, model_id: &ModelId) -> Result<()> {
        let mut state = self.state.write();

        match state.state_of(model_id) {
            ModelState::Hot => {}
            ModelState::Cold => {
                return Err(Error::Operational(format!(
                    "Model {} is cold and can't be the default",
                    model_id
                )));
            }
            ModelState::Absent => {
                return Err(Error::Operational(format!(
                    "Model {} doesn't exist and can't be the default",
                    model_id
                )));
            }
        }

        if let Some(previous) = state.default_model.replace(model_id.clone()) {
            debug!("Model {} is no longer the default", previous);
        }

        info!("Model {} set as default", model_id);

        Ok(())
    }

    /// Unsets the default pointer
    pub fn clear_default(&self) {
        if let Some(previous) = self.state.write().default_model.take() {
            info!("Default model {} unset", previous);
        }
    }

    /// Returns the default model
    pub fn get_default_model(&self) -> Result<Arc<dyn SentimentModel>> {
        let state = self.state.read();

        let model_id = state
            .default_model
            .as_ref()
            .ok_or_else(|| Error::ModelNotAvailable("No default model set".to_string()))?;

        match state.hot.get(model_id) {
            Some(model) => {
                debug!("Model {} was requested", model_id);
                Ok(model.clone())
            }
            None => {
                error!("Default model {} is not loaded", model_id);
                Err(Error::Operational(format!(
                    "Model {} was requested but isn't loaded",
                    model_id
                )))
            }
        }
    }

    /// Returns the identifier of the default model
    pub fn default_model_id(&self) -> Option<ModelId> {
        self.state.read().default_model.clone()
    }

    /// Returns the state of a model
    pub fn state(&self, model_id: &ModelId) -> ModelState {
        self.state.read().state_of(model_id)
    }

    /// Returns the record of a model with its live flags
    pub fn get(&self, model_id: &ModelId) -> Result<RecordView> {
        let state = self.state.read();

        state
            .records
            .get(model_id)
            .map(|record| state.view(record))
            .ok_or_else(|| not_found(model_id))
    }

    /// Lists records sorted by identifier, only Hot ones if `hot_only`
    pub fn list(&self, hot_only: bool) -> Vec<RecordView> {
        let state = self.state.read();

        state
            .records
            .values()
            .filter(|record| !hot_only || state.hot.contains_key(&record.model_id))
            .map(|record| state.view(record))
            .collect()
    }

    /// Removes a model from memory and disk
    pub async fn delete(&self, model_id: &ModelId) -> Result<()> {
        self.ensure_recorded(model_id)?;

        let lock = self.lock_for(model_id);
        let guard = lock.lock().await;

        let result = self.delete_locked(model_id).await;

        drop(guard);
        drop(lock);
        self.release_lock(model_id);

        result
    }

    async fn delete_locked(&self, model_id: &ModelId) -> Result<()> {
        self.ensure_recorded(model_id)?;

        let tombstone = self.cache.begin_removal(model_id).map_err(|e| {
            error!("Failed to remove directory of model {}: {}", model_id, e);
            Error::Operational(format!("Failed to remove directory of model {}: {}", model_id, e))
        })?;

        {
            let mut state = self.state.write();
            state.hot.remove(model_id);
            state.records.remove(model_id);
            if state.default_model.as_ref() == Some(model_id) {
                state.default_model = None;
                warn!("Default model {} was deleted, no default model is set", model_id);
            }
        }

        match tombstone {
            Some(tombstone) => {
                let cache = self.cache.clone();
                let purge = tokio::task::spawn_blocking(move || cache.purge(&tombstone)).await;
                match purge {
                    Ok(Ok(())) => debug!("Deleted files of model {}", model_id),
                    Ok(Err(e)) => error!("Failed to purge files of model {}: {}", model_id, e),
                    Err(e) => error!("Purge task for model {} failed: {}", model_id, e),
                }
            }
            None => warn!("Directory of model {} was already gone", model_id),
        }

        info!("Model {} deleted", model_id);

        Ok(())
    }

    /// Lists registry models tagged with `experiment`
    pub async fn search_registry(&self, experiment: &str) -> Result<Vec<RegistryEntry>> {
        self.store.search(experiment).await.map_err(into_registry_error)
    }

    /// Returns the artifact cache
    pub fn cache(&self) -> &ArtifactCache {
        &self.cache
    }

    /// Unloads every model and clears the default; files stay on disk
    pub fn shutdown(&self) {
        let mut state = self.state.write();
        let unloaded = state.hot.len();

        state.default_model = None;
        state.hot.clear();

        info!("Model manager shut down, {} models unloaded", unloaded);
    }
}

fn not_found(model_id: &ModelId) -> Error {
    Error::ModelNotAvailable(format!("Model {} doesn't exist", model_id))
}

fn into_registry_error(err: Error) -> Error {
    match err {
        Error::Registry(_) => err,
        other => Error::Registry(other.to_string()),
    }
}
