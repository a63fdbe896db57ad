//! Artifact store client
//!
//! [`ArtifactStore`] resolves model references to concrete artifacts and
//! transfers their files. [`MlflowRegistry`] implements it against the MLflow
//! tracking server REST API.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::{Client, Response, Url};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use walkdir::WalkDir;

use common::error::{Error, Result};
use common::models::{ArtifactMetadata, ModelId, ModelReference, MODELS_SCHEME};
use config::RegistrySettings;

use crate::downloader::ArtifactDownloader;

/// A reference resolved to one artifact
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedModel {
    /// Identifier of the artifact
    pub model_id: ModelId,

    /// Reference the caller asked for
    pub reference: ModelReference,

    /// Registry metadata
    pub metadata: ArtifactMetadata,
}

/// A registered model listed by the registry search
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegistryEntry {
    pub name: String,
    pub latest_version: u32,
    pub latest_version_creation: String,
}

/// Source of model artifacts
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Resolves a reference; aliases are resolved again on every call
    async fn resolve(&self, reference: &ModelReference) -> Result<ResolvedModel>;

    /// Writes the artifact files into `destination`, which exists and is empty
    async fn download(&self, model: &ResolvedModel, destination: &Path) -> Result<PathBuf>;

    /// Lists registered models tagged with `experiment`
    async fn search(&self, experiment: &str) -> Result<Vec<RegistryEntry>>;
}

#[derive(Debug, Deserialize)]
struct RegistryErrorBody {
    #[serde(default)]
    error_code: String,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct Tag {
    key: String,
    #[serde(default)]
    value: String,
}

#[derive(Debug, Deserialize)]
struct LoggedModelResponse {
    model: LoggedModel,
}

#[derive(Debug, Deserialize)]
struct LoggedModel {
    info: LoggedModelInfo,
}

#[derive(Debug, Deserialize)]
struct LoggedModelInfo {
    model_id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    creation_timestamp_millis: Option<i64>,
    artifact_uri: String,
    #[serde(default)]
    tags: Vec<Tag>,
}

#[derive(Debug, Deserialize)]
struct ModelVersionResponse {
    model_version: ModelVersion,
}

#[derive(Debug, Deserialize)]
struct ModelVersion {
    name: String,
    version: String,
    #[serde(default)]
    creation_timestamp: Option<i64>,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    model_id: Option<String>,
    #[serde(default)]
    tags: Vec<Tag>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    registered_models: Vec<RegisteredModel>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RegisteredModel {
    name: String,
    #[serde(default)]
    last_updated_timestamp: Option<i64>,
    #[serde(default)]
    latest_versions: Vec<LatestVersion>,
}

#[derive(Debug, Deserialize)]
struct LatestVersion {
    version: String,
    #[serde(default)]
    tags: Vec<Tag>,
}

/// MLflow tracking server client
pub struct MlflowRegistry {
    /// HTTP client
    client: Client,

    /// Tracking server base URL
    base_url: Url,

    /// Artifact proxy downloader
    downloader: ArtifactDownloader,
}

impl MlflowRegistry {
    /// Creates a new registry client
    pub fn new(settings: &RegistrySettings) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("OpinionLens/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(settings.timeout_secs))
            .connect_timeout(Duration::from_secs(settings.connect_timeout_secs))
            .pool_max_idle_per_host(10)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;

        let base_url = Url::parse(&settings.tracking_uri)
            .map_err(|e| Error::Config(format!("Invalid tracking URI {:?}: {}", settings.tracking_uri, e)))?;

        let downloader = ArtifactDownloader::new(client.clone(), &settings.tracking_uri)?;

        Ok(Self {
            client,
            base_url,
            downloader,
        })
    }

    fn endpoint(&self, path: &str) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(["api", "2.0", "mlflow"])
                .extend(path.split('/'));
        }
        url
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
        let url = self.endpoint(path);
        debug!("GET {} {:?}", url, query);

        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| Error::Registry(format!("Request to the model registry failed: {}", e)))?;

        ensure_success(response)
            .await?
            .json()
            .await
            .map_err(|e| Error::Registry(format!("Malformed registry response: {}", e)))
    }

    async fn logged_model(&self, model_id: &ModelId) -> Result<LoggedModelInfo> {
        let response: LoggedModelResponse = self
            .get_json(&format!("logged-models/{}", model_id), &[])
            .await?;
        Ok(response.model.info)
    }

    async fn resolve_version(&self, reference: &ModelReference, version: ModelVersion) -> Result<ResolvedModel> {
        let number: u32 = version
            .version
            .parse()
            .map_err(|_| Error::Registry(format!("Registry returned a non-numeric version {:?}", version.version)))?;

        let logged_id = version
            .model_id
            .clone()
            .filter(|id| !id.is_empty())
            .or_else(|| {
                version
                    .source
                    .as_deref()
                    .and_then(|source| source.strip_prefix(MODELS_SCHEME))
                    .map(str::to_string)
            });

        let (model_id, artifact_uri) = match logged_id {
            Some(id) => {
                let model_id = ModelId::new(id).map_err(|e| Error::Registry(e.detail()))?;
                let info = self.logged_model(&model_id).await?;
                (model_id, info.artifact_uri)
            }
            None => {
                let source = version.source.clone().ok_or_else(|| {
                    Error::Registry(format!("{} version {} has no artifact source", version.name, number))
                })?;
                let model_id = ModelId::new(format!("{}-{}", version.name, number))
                    .map_err(|e| Error::Registry(e.detail()))?;
                (model_id, source)
            }
        };

        Ok(ResolvedModel {
            model_id,
            reference: reference.clone(),
            metadata: ArtifactMetadata {
                name: version.name,
                version: Some(number),
                created_at: from_millis(version.creation_timestamp),
                flavors: Vec::new(),
                artifact_uri,
                tags: into_tag_map(version.tags),
            },
        })
    }
}

#[async_trait]
impl ArtifactStore for MlflowRegistry {
    async fn resolve(&self, reference: &ModelReference) -> Result<ResolvedModel> {
        let resolved = match reference {
            ModelReference::Id(model_id) => {
                let info = self.logged_model(model_id).await?;
                let name = if info.name.is_empty() { info.model_id.clone() } else { info.name };
                ResolvedModel {
                    model_id: model_id.clone(),
                    reference: reference.clone(),
                    metadata: ArtifactMetadata {
                        name,
                        version: None,
                        created_at: from_millis(info.creation_timestamp_millis),
                        flavors: Vec::new(),
                        artifact_uri: info.artifact_uri,
                        tags: into_tag_map(info.tags),
                    },
                }
            }
            ModelReference::Version { name, version } => {
                let version_text = version.to_string();
                let response: ModelVersionResponse = self
                    .get_json(
                        "model-versions/get",
                        &[("name", name.as_str()), ("version", version_text.as_str())],
                    )
                    .await?;
                self.resolve_version(reference, response.model_version).await?
            }
            ModelReference::Alias { name, alias } => {
                let response: ModelVersionResponse = self
                    .get_json(
                        "registered-models/alias",
                        &[("name", name.as_str()), ("alias", alias.as_str())],
                    )
                    .await?;
                self.resolve_version(reference, response.model_version).await?
            }
        };

        info!("Resolved {} to model {}", reference, resolved.model_id);

        Ok(resolved)
    }

    async fn download(&self, model: &ResolvedModel, destination: &Path) -> Result<PathBuf> {
        match ArtifactLocation::parse(&model.metadata.artifact_uri)? {
            ArtifactLocation::Proxy(remote_root) => {
                self.downloader.download_tree(&remote_root, destination).await?;
            }
            ArtifactLocation::Local(source) => {
                let target = destination.to_path_buf();
                let copied = tokio::task::spawn_blocking(move || copy_tree(&source, &target))
                    .await
                    .map_err(|e| Error::Registry(format!("Copy task failed: {}", e)))??;
                debug!("Copied {} bytes for {}", copied, model.model_id);
            }
        }

        Ok(destination.to_path_buf())
    }

    async fn search(&self, experiment: &str) -> Result<Vec<RegistryEntry>> {
        let mut entries = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut query = vec![("max_results", "1000")];
            if let Some(token) = page_token.as_deref() {
                query.push(("page_token", token));
            }

            let page: SearchResponse = self.get_json("registered-models/search", &query).await?;

            for model in page.registered_models {
                let latest = match model.latest_versions.first() {
                    Some(latest) => latest,
                    None => continue,
                };

                let tagged = latest
                    .tags
                    .iter()
                    .any(|tag| tag.key == "experiment" && tag.value == experiment);
                if !tagged {
                    continue;
                }

                let latest_version = match latest.version.parse() {
                    Ok(version) => version,
                    Err(_) => continue,
                };

                entries.push(RegistryEntry {
                    name: model.name,
                    latest_version,
                    latest_version_creation: from_millis(model.last_updated_timestamp)
                        .format("%Y-%m-%d %H:%M:%S")
                        .to_string(),
                });
            }

            match page.next_page_token.filter(|token| !token.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(entries)
    }
}

/// Where an artifact's files live
#[derive(Debug, Clone, PartialEq)]
enum ArtifactLocation {
    /// Path relative to the tracking server's artifact proxy
    Proxy(String),
    /// Directory on the local filesystem
    Local(PathBuf),
}

impl ArtifactLocation {
    fn parse(uri: &str) -> Result<Self> {
        if let Some(rest) = uri.strip_prefix("mlflow-artifacts:") {
            // `mlflow-artifacts://host:port/path` or `mlflow-artifacts:/path`
            let path = match rest.strip_prefix("//") {
                Some(authority_and_path) => authority_and_path
                    .split_once('/')
                    .map(|(_, path)| path)
                    .unwrap_or(""),
                None => rest,
            };
            return Ok(ArtifactLocation::Proxy(path.trim_matches('/').to_string()));
        }

        if let Some(path) = uri.strip_prefix("file://") {
            return Ok(ArtifactLocation::Local(PathBuf::from(path)));
        }

        if uri.starts_with('/') {
            return Ok(ArtifactLocation::Local(PathBuf::from(uri)));
        }

        Err(Error::Registry(format!("Unsupported artifact location {:?}", uri)))
    }
}

/// Fails with a registry error carrying the server's message on non-2xx
pub(crate) async fn ensure_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<RegistryErrorBody>(&body) {
        Ok(err) if !err.message.is_empty() => format!("{} ({})", err.message, err.error_code),
        _ if body.is_empty() => status.to_string(),
        _ => body,
    };

    Err(Error::Registry(format!("HTTP {}: {}", status.as_u16(), message)))
}

fn from_millis(millis: Option<i64>) -> DateTime<Utc> {
    millis
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
        .unwrap_or_else(Utc::now)
}

fn into_tag_map(tags: Vec<Tag>) -> BTreeMap<String, String> {
    tags.into_iter().map(|tag| (tag.key, tag.value)).collect()
}

fn copy_tree(source: &Path, destination: &Path) -> Result<u64> {
    if !source.is_dir() {
        return Err(Error::Registry(format!("Artifact directory {:?} doesn't exist", source)));
    }

    let mut copied = 0;
    for entry in WalkDir::new(source).min_depth(1) {
        let entry = entry.map_err(|e| Error::Registry(format!("Failed to read {:?}: {}", source, e)))?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(|e| Error::Registry(e.to_string()))?;
        let target = destination.join(relative);

        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)?;
        } else {
            copied += std::fs::copy(entry.path(), &target)?;
        }
    }

    Ok(copied)
}
