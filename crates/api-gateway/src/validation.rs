//! Request payloads and their validation

use serde::Deserialize;

use common::error::{Error, Result};
use common::models::{ModelId, ModelReference};
use model_manager::FetchOptions;

/// Path segment taken by `GET /api/v1/models/registry`, never a model id
pub const RESERVED_MODEL_ID: &str = "registry";

/// Body of `POST /api/v1/models`
///
/// Either `model_uri` or `model_name` together with `model_version` must be
/// given.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FetchRequest {
    pub model_uri: Option<String>,
    pub model_name: Option<String>,
    pub model_version: Option<u32>,
    pub set_default: bool,
    pub warm: bool,
}

impl FetchRequest {
    /// Builds the registry reference the request points at
    pub fn reference(&self) -> Result<ModelReference> {
        match (&self.model_uri, &self.model_name, self.model_version) {
            (Some(uri), None, None) => match uri.parse::<ModelReference>()? {
                ModelReference::Id(model_id) if model_id.as_str() == RESERVED_MODEL_ID => Err(reserved()),
                reference => Ok(reference),
            },
            (None, Some(name), Some(version)) => {
                if name.trim().is_empty() {
                    return Err(Error::InvalidArgument("model_name must not be empty".to_string()));
                }
                Ok(ModelReference::version(name.trim(), version))
            }
            (None, Some(_), None) => Err(Error::InvalidArgument("model_version is required with model_name".to_string())),
            (None, None, Some(_)) => Err(Error::InvalidArgument("model_name is required with model_version".to_string())),
            (None, None, None) => Err(Error::InvalidArgument(
                "Either model_uri or model_name and model_version is required".to_string(),
            )),
            (Some(_), _, _) => Err(Error::InvalidArgument(
                "model_uri cannot be combined with model_name or model_version".to_string(),
            )),
        }
    }

    pub fn options(&self) -> FetchOptions {
        FetchOptions {
            warm: self.warm,
            set_default: self.set_default,
        }
    }
}

/// Text to classify, as query string or JSON body
#[derive(Debug, Clone, Deserialize)]
pub struct PredictRequest {
    pub text: String,
}

/// Query of `GET /api/v1/models`
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default)]
pub struct ListQuery {
    pub brief: bool,
    pub hot_only: bool,
}

/// Parses a model id taken from the URL path
///
/// An id that cannot name a cached model is reported as not available.
pub fn model_id_from_path(raw: &str) -> Result<ModelId> {
    if raw == RESERVED_MODEL_ID {
        return Err(reserved());
    }
    ModelId::new(raw).map_err(|_| Error::ModelNotAvailable(format!("Model '{}' is not available", raw)))
}

fn reserved() -> Error {
    Error::InvalidArgument(format!("'{}' is reserved and cannot be a model id", RESERVED_MODEL_ID))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(json: &str) -> FetchRequest {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_reference_from_uri() {
        let req = request(r#"{"model_uri": "basic_model/1", "set_default": true}"#);
        assert_eq!(req.reference().unwrap(), ModelReference::version("basic_model", 1));
        assert!(req.options().set_default);
        assert!(!req.options().warm);
    }

    #[test]
    fn test_reference_from_name_and_version() {
        let req = request(r#"{"model_name": "basic_model", "model_version": 3}"#);
        assert_eq!(req.reference().unwrap(), ModelReference::version("basic_model", 3));
    }

    #[test]
    fn test_incomplete_or_ambiguous_requests() {
        assert!(request(r#"{}"#).reference().is_err());
        assert!(request(r#"{"model_name": "basic_model"}"#).reference().is_err());
        assert!(request(r#"{"model_version": 2}"#).reference().is_err());
        assert!(request(r#"{"model_uri": "m-1", "model_name": "basic_model"}"#).reference().is_err());

        let err = request(r#"{"model_name": " ", "model_version": 1}"#).reference().unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn test_model_id_from_path() {
        assert_eq!(model_id_from_path("m-1").unwrap().as_str(), "m-1");
        assert!(model_id_from_path(".staging").unwrap_err().is_not_available());
    }

    #[test]
    fn test_registry_segment_is_not_a_model_id() {
        let err = model_id_from_path(RESERVED_MODEL_ID).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));

        let err = request(r#"{"model_uri": "registry"}"#).reference().unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));

        assert!(request(r#"{"model_uri": "registry-2"}"#).reference().is_ok());
    }
}
