//! Single-configuration artifact lookup.

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Serialize;
use serde_json::Value;
use sx_artifacts::{ArtifactGenerator, ArtifactKind, GENERIC_FAILURE_MESSAGE};
use sx_core::{ConfigId, ConfigurationRecord};
use sx_model::{ModelBuilder, NearAxisModel};
use sx_source::{ConfigSource, SourceError};
use sx_store::ArtifactStore;
use tracing::{debug, error, warn};

use crate::error::{PipelineError, PipelineResult};

/// Response for one artifact request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArtifactResponse {
    pub config_id: ConfigId,
    pub kind: ArtifactKind,
    /// Base64-encoded PNG.
    pub plot_data: Option<String>,
    /// Boundary: one Plotly figure. Diagnostics: figures keyed by curve name.
    pub interactive_data: Option<Value>,
    pub error: Option<String>,
    pub from_cache: bool,
}

impl ArtifactResponse {
    fn failed(config_id: ConfigId, kind: ArtifactKind) -> Self {
        Self {
            config_id,
            kind,
            plot_data: None,
            interactive_data: None,
            error: Some(GENERIC_FAILURE_MESSAGE.to_string()),
            from_cache: false,
        }
    }

    /// Decoded PNG bytes, if any.
    pub fn image_bytes(&self) -> Option<Vec<u8>> {
        self.plot_data
            .as_deref()
            .and_then(|data| STANDARD.decode(data).ok())
    }
}

fn encode_png(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Serves stored artifacts and generates missing ones on demand.
///
/// On-demand results are returned only; they are never written to the
/// store.
pub struct ArtifactService {
    source: Arc<dyn ConfigSource>,
    builder: Arc<dyn ModelBuilder>,
    store: ArtifactStore,
    generator: ArtifactGenerator,
}

impl ArtifactService {
    pub fn new(
        source: Arc<dyn ConfigSource>,
        builder: Arc<dyn ModelBuilder>,
        store: ArtifactStore,
        generator: ArtifactGenerator,
    ) -> Self {
        Self {
            source,
            builder,
            store,
            generator,
        }
    }

    pub fn fetch(&self, id: ConfigId, kind: ArtifactKind) -> PipelineResult<ArtifactResponse> {
        match kind {
            ArtifactKind::Boundary => self.fetch_boundary(id),
            ArtifactKind::Diagnostics => self.fetch_diagnostics(id),
        }
    }

    pub fn fetch_boundary(&self, id: ConfigId) -> PipelineResult<ArtifactResponse> {
        let Some(record) = self.record(id, ArtifactKind::Boundary)? else {
            return Ok(ArtifactResponse::failed(id, ArtifactKind::Boundary));
        };
        if self.store.exists(id, ArtifactKind::Boundary) {
            match self.store.load_boundary(id) {
                Ok(Some(stored)) => {
                    debug!(config = %id, "serving stored boundary");
                    return Ok(ArtifactResponse {
                        config_id: id,
                        kind: ArtifactKind::Boundary,
                        plot_data: stored.image.as_deref().map(encode_png),
                        interactive_data: stored.interactive,
                        error: stored.error,
                        from_cache: true,
                    });
                }
                Ok(None) => {}
                Err(e) => warn!(config = %id, error = %e, "stored boundary unreadable, regenerating"),
            }
        }

        let Some(model) = self.build(&record, ArtifactKind::Boundary) else {
            return Ok(ArtifactResponse::failed(id, ArtifactKind::Boundary));
        };
        let artifact = self.generator.generate_boundary(model.as_ref());
        Ok(ArtifactResponse {
            config_id: id,
            kind: ArtifactKind::Boundary,
            plot_data: artifact.image.as_deref().map(encode_png),
            interactive_data: artifact.interactive,
            error: artifact.error,
            from_cache: false,
        })
    }

    pub fn fetch_diagnostics(&self, id: ConfigId) -> PipelineResult<ArtifactResponse> {
        let Some(record) = self.record(id, ArtifactKind::Diagnostics)? else {
            return Ok(ArtifactResponse::failed(id, ArtifactKind::Diagnostics));
        };
        if self.store.exists(id, ArtifactKind::Diagnostics) {
            match self.store.load_diagnostics(id) {
                Ok(Some(stored)) => {
                    debug!(config = %id, curves = stored.curves.len(), "serving stored diagnostics");
                    return Ok(ArtifactResponse {
                        config_id: id,
                        kind: ArtifactKind::Diagnostics,
                        plot_data: stored.image.as_deref().map(encode_png),
                        interactive_data: curves_value(stored.curves),
                        error: None,
                        from_cache: true,
                    });
                }
                Ok(None) => {}
                Err(e) => warn!(config = %id, error = %e, "stored diagnostics unreadable, regenerating"),
            }
        }

        let Some(model) = self.build(&record, ArtifactKind::Diagnostics) else {
            return Ok(ArtifactResponse::failed(id, ArtifactKind::Diagnostics));
        };
        let artifact = self.generator.generate_diagnostics(model.as_ref());
        Ok(ArtifactResponse {
            config_id: id,
            kind: ArtifactKind::Diagnostics,
            plot_data: artifact.image.as_deref().map(encode_png),
            interactive_data: curves_value(artifact.curves),
            error: artifact.error,
            from_cache: false,
        })
    }

    /// The row for `id`. `None` when the row exists but is unusable; that is
    /// reported in the response rather than as an error.
    fn record(
        &self,
        id: ConfigId,
        kind: ArtifactKind,
    ) -> PipelineResult<Option<ConfigurationRecord>> {
        let record = match self.source.get(id) {
            Ok(Some(record)) => record,
            Ok(None) => return Err(PipelineError::ConfigNotFound { id }),
            Err(e @ SourceError::InvalidRow { .. }) => {
                error!(config = %id, %kind, error = %e, "unreadable configuration row");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        match record.validate() {
            Ok(()) => Ok(Some(record)),
            Err(e) => {
                error!(config = %id, %kind, error = %e, "invalid configuration");
                Ok(None)
            }
        }
    }

    fn build(
        &self,
        record: &ConfigurationRecord,
        kind: ArtifactKind,
    ) -> Option<Box<dyn NearAxisModel>> {
        match self.builder.build(record) {
            Ok(model) => Some(model),
            Err(e) => {
                error!(config = %record.id, %kind, error = %e, "model construction failed");
                None
            }
        }
    }
}

fn curves_value(curves: std::collections::BTreeMap<String, Value>) -> Option<Value> {
    if curves.is_empty() {
        None
    } else {
        Some(Value::Object(curves.into_iter().collect()))
    }
}
