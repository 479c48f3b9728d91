#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use sx_artifacts::ArtifactGenerator;
use sx_core::{ConfigId, ConfigurationRecord, ModelOrder};
use sx_model::{
    AxisCurve, BoundarySurface, DiagnosticCurve, Grid, ModelBuilder, ModelError, ModelResult,
    NearAxisModel, ReferenceModelBuilder, SurfaceMesh,
};
use sx_pipeline::{BatchScheduler, FixedMemoryGauge, PipelineConfig};
use sx_source::MemoryConfigSource;
use sx_store::{ArtifactStore, ProgressLedger};

/// Reference builder with scripted failures and delays.
#[derive(Default)]
pub struct TestBuilder {
    pub inner: ReferenceModelBuilder,
    pub fail_ids: Vec<i64>,
    pub slow_ids: Vec<i64>,
    pub delay: Duration,
    /// Models for these ids fail every diagnostic and the axis plot.
    pub no_diagnostics_ids: Vec<i64>,
    pub builds: AtomicUsize,
}

impl TestBuilder {
    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }
}

impl ModelBuilder for TestBuilder {
    fn name(&self) -> &str {
        "test"
    }

    fn build(&self, record: &ConfigurationRecord) -> ModelResult<Box<dyn NearAxisModel>> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        if self.slow_ids.contains(&record.id.get()) {
            std::thread::sleep(self.delay);
        }
        if self.fail_ids.contains(&record.id.get()) {
            return Err(ModelError::Backend {
                message: format!("scripted failure for {}", record.id),
            });
        }
        let model = self.inner.build(record)?;
        if self.no_diagnostics_ids.contains(&record.id.get()) {
            return Ok(Box::new(NoDiagnostics(model)));
        }
        Ok(model)
    }
}

/// Boundary works; diagnostics and the axis fallback do not.
struct NoDiagnostics(Box<dyn NearAxisModel>);

impl NoDiagnostics {
    fn broken(&self) -> ModelError {
        ModelError::Backend {
            message: format!("no diagnostics for {}", self.0.config_id()),
        }
    }
}

impl NearAxisModel for NoDiagnostics {
    fn config_id(&self) -> ConfigId {
        self.0.config_id()
    }

    fn order(&self) -> ModelOrder {
        self.0.order()
    }

    fn nfp(&self) -> u32 {
        self.0.nfp()
    }

    fn phi(&self) -> &[f64] {
        self.0.phi()
    }

    fn axis(&self) -> ModelResult<AxisCurve> {
        Err(self.broken())
    }

    fn boundary(&self, r: f64, mesh: &SurfaceMesh) -> ModelResult<BoundarySurface> {
        self.0.boundary(r, mesh)
    }

    fn field_magnitude(&self, r: f64, mesh: &SurfaceMesh) -> ModelResult<Grid> {
        self.0.field_magnitude(r, mesh)
    }

    fn series(&self, _curve: DiagnosticCurve) -> ModelResult<Option<Vec<f64>>> {
        Err(self.broken())
    }
}

pub fn record(id: i64) -> ConfigurationRecord {
    let mut rec = ConfigurationRecord::circular_axis(ConfigId::new(id), 3, 0.9);
    rec.rc = [0.045, 0.0, 0.0];
    rec.zs = [-0.045, 0.0, 0.0];
    if id % 3 == 0 {
        rec.b2c = Some(0.3);
    }
    rec
}

pub fn records(n: i64) -> Vec<ConfigurationRecord> {
    (1..=n).map(record).collect()
}

pub fn small_generator() -> ArtifactGenerator {
    generator_with_radii(sx_artifacts::DEFAULT_RADII.to_vec())
}

/// Coarse-mesh generator trying only `radii`.
pub fn generator_with_radii(radii: Vec<f64>) -> ArtifactGenerator {
    ArtifactGenerator::new(radii).with_mesh(SurfaceMesh {
        ntheta: 6,
        nphi: 12,
        ntheta_fourier: 6,
        mpol: 3,
        ntor: 3,
    })
}

pub fn test_config(dir: &Path) -> PipelineConfig {
    PipelineConfig {
        batch_size: 100,
        workers: Some(4),
        item_timeout_s: 60.0,
        memory_cooldown_s: 0.0,
        store_root: dir.join("precomputed"),
        ledger_path: dir.join("precomputation_progress.json"),
        ..PipelineConfig::default()
    }
}

pub fn store(config: &PipelineConfig) -> ArtifactStore {
    ArtifactStore::new(config.store_root.clone()).expect("store")
}

pub fn scheduler(
    config: PipelineConfig,
    records: Vec<ConfigurationRecord>,
    builder: Arc<TestBuilder>,
) -> BatchScheduler {
    let store = store(&config);
    let ledger = ProgressLedger::new(config.ledger_path.clone());
    BatchScheduler::new(
        config,
        Arc::new(MemoryConfigSource::new(records)),
        builder,
        store,
        ledger,
    )
    .with_memory_gauge(Box::new(FixedMemoryGauge(None)))
    .with_generator(small_generator())
}
