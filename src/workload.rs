//! Workload lifecycle protocol, configuration, and registry.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;
use std::time::{SystemTime, UNIX_EPOCH};

use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::adapter::{Capability, ConnectionConfig, DatabaseAdapter, TestEnvironmentConfig};
use crate::connection::InstrumentedConnection;
use crate::document::JsonDocument;
use crate::error::{BenchError, BenchResult};
use crate::generator::DocumentGenerator;
use crate::metrics::MetricsCollector;
use crate::operation::Operation;
use crate::random::SeededRng;

// ────────────────────────────────────────────────────────────────────────────
// Parameters
// ────────────────────────────────────────────────────────────────────────────

/// A workload parameter value. Typed accessors on [`WorkloadConfig`]
/// convert on access, so `"42"` reads fine as an integer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<ParamValue>),
}

impl ParamValue {
    fn as_i64(&self) -> Option<i64> {
        match self {
            ParamValue::Int(v) => Some(*v),
            ParamValue::Float(v) => Some(*v as i64),
            ParamValue::Str(s) => s.parse().ok(),
            _ => None,
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Int(v) => Some(*v as f64),
            ParamValue::Float(v) => Some(*v),
            ParamValue::Str(s) => s.parse().ok(),
            _ => None,
        }
    }

    fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(v) => Some(*v),
            ParamValue::Str(s) => s.parse().ok(),
            _ => None,
        }
    }

    fn as_string(&self) -> Option<String> {
        match self {
            ParamValue::Str(s) => Some(s.clone()),
            ParamValue::Int(v) => Some(v.to_string()),
            ParamValue::Float(v) => Some(v.to_string()),
            ParamValue::Bool(v) => Some(v.to_string()),
            ParamValue::List(_) => None,
        }
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<i32> for ParamValue {
    fn from(v: i32) -> Self {
        ParamValue::Int(v as i64)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Str(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        ParamValue::Str(v)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// WorkloadConfig
// ────────────────────────────────────────────────────────────────────────────

/// Immutable workload configuration with typed parameter access.
///
/// Unknown parameter keys are preserved and ignored by the engine; custom
/// workloads and reporters may consume them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkloadConfig {
    name: String,
    iterations: u32,
    warmup_iterations: u32,
    seed: Option<u64>,
    concurrency: u32,
    #[serde(default)]
    parameters: BTreeMap<String, ParamValue>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    required_parameters: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    parameter_ranges: BTreeMap<String, (i64, i64)>,
}

impl WorkloadConfig {
    pub fn builder(name: impl Into<String>) -> WorkloadConfigBuilder {
        WorkloadConfigBuilder {
            name: name.into(),
            iterations: 1000,
            warmup_iterations: 100,
            seed: None,
            concurrency: 1,
            parameters: BTreeMap::new(),
            required_parameters: BTreeSet::new(),
            parameter_ranges: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    pub fn warmup_iterations(&self) -> u32 {
        self.warmup_iterations
    }

    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    pub fn concurrency(&self) -> u32 {
        self.concurrency
    }

    pub fn parameters(&self) -> &BTreeMap<String, ParamValue> {
        &self.parameters
    }

    pub fn int_parameter(&self, name: &str) -> BenchResult<i64> {
        self.parameters
            .get(name)
            .and_then(ParamValue::as_i64)
            .ok_or_else(|| BenchError::config(format!("parameter not found: {name}")))
    }

    pub fn int_parameter_or(&self, name: &str, default: i64) -> i64 {
        self.parameters
            .get(name)
            .and_then(ParamValue::as_i64)
            .unwrap_or(default)
    }

    pub fn string_parameter(&self, name: &str) -> BenchResult<String> {
        self.parameters
            .get(name)
            .and_then(ParamValue::as_string)
            .ok_or_else(|| BenchError::config(format!("parameter not found: {name}")))
    }

    pub fn string_parameter_or(&self, name: &str, default: &str) -> String {
        self.parameters
            .get(name)
            .and_then(ParamValue::as_string)
            .unwrap_or_else(|| default.to_string())
    }

    pub fn double_parameter_or(&self, name: &str, default: f64) -> f64 {
        self.parameters
            .get(name)
            .and_then(ParamValue::as_f64)
            .unwrap_or(default)
    }

    pub fn bool_parameter_or(&self, name: &str, default: bool) -> bool {
        self.parameters
            .get(name)
            .and_then(ParamValue::as_bool)
            .unwrap_or(default)
    }

    pub fn list_parameter(&self, name: &str) -> Vec<ParamValue> {
        match self.parameters.get(name) {
            Some(ParamValue::List(items)) => items.clone(),
            _ => Vec::new(),
        }
    }

    /// Human-readable diagnostics; empty means valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        for required in &self.required_parameters {
            if !self.parameters.contains_key(required) {
                errors.push(format!("Missing required parameter: {required}"));
            }
        }

        for (name, (min, max)) in &self.parameter_ranges {
            if let Some(value) = self.parameters.get(name).and_then(ParamValue::as_i64) {
                if value < *min || value > *max {
                    errors.push(format!(
                        "Parameter {name} value {value} is outside valid range [{min}, {max}]"
                    ));
                }
            }
        }

        errors
    }
}

pub struct WorkloadConfigBuilder {
    name: String,
    iterations: u32,
    warmup_iterations: u32,
    seed: Option<u64>,
    concurrency: u32,
    parameters: BTreeMap<String, ParamValue>,
    required_parameters: BTreeSet<String>,
    parameter_ranges: BTreeMap<String, (i64, i64)>,
}

impl WorkloadConfigBuilder {
    pub fn iterations(mut self, iterations: u32) -> Self {
        self.iterations = iterations;
        self
    }

    pub fn warmup_iterations(mut self, warmup: u32) -> Self {
        self.warmup_iterations = warmup;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn concurrency(mut self, concurrency: u32) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn parameter(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    pub fn required_parameter(mut self, name: impl Into<String>) -> Self {
        self.required_parameters.insert(name.into());
        self
    }

    pub fn parameter_range(mut self, name: impl Into<String>, min: i64, max: i64) -> Self {
        self.parameter_ranges.insert(name.into(), (min, max));
        self
    }

    pub fn build(self) -> BenchResult<WorkloadConfig> {
        if self.name.trim().is_empty() {
            return Err(BenchError::config("workload name must not be blank"));
        }
        if self.iterations == 0 {
            return Err(BenchError::config("iterations must be positive"));
        }
        // Reserved surface: measurement is single-threaded in this release.
        if self.concurrency != 1 {
            return Err(BenchError::config(format!(
                "concurrency must be 1 in this release, got {}",
                self.concurrency
            )));
        }
        if self.warmup_iterations > self.iterations {
            warn!(
                workload = %self.name,
                warmup = self.warmup_iterations,
                iterations = self.iterations,
                "warmup iterations exceed measurement iterations"
            );
        }

        Ok(WorkloadConfig {
            name: self.name,
            iterations: self.iterations,
            warmup_iterations: self.warmup_iterations,
            seed: self.seed,
            concurrency: self.concurrency,
            parameters: self.parameters,
            required_parameters: self.required_parameters,
            parameter_ranges: self.parameter_ranges,
        })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Workload protocol
// ────────────────────────────────────────────────────────────────────────────

/// Five-phase workload lifecycle: initialize, setup, warmup/measure
/// iterations, cleanup. Cleanup must be safe to call more than once.
pub trait Workload {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// Capabilities the adapter must advertise before this workload runs.
    fn required_capabilities(&self) -> Vec<Capability> {
        Vec::new()
    }

    /// Binds configuration, seeds the RNG, and builds the generator.
    fn initialize(&mut self, config: WorkloadConfig) -> BenchResult<()>;

    /// Prepares the environment, connects, and inserts test documents.
    /// Setup metrics go to a dedicated throwaway collector.
    fn setup_data(&mut self, adapter: &mut dyn DatabaseAdapter) -> BenchResult<()>;

    /// Performs the workload-defining operation once, recording at least
    /// one named timing (conventionally, one metric named after the
    /// workload).
    fn run_iteration(
        &mut self,
        adapter: &mut dyn DatabaseAdapter,
        collector: &MetricsCollector,
    ) -> BenchResult<()>;

    fn cleanup(&mut self, adapter: &mut dyn DatabaseAdapter) -> BenchResult<()>;

    fn config(&self) -> Option<&WorkloadConfig>;
}

/// Shared state and plumbing for workload implementations: config, RNG,
/// the per-run collection name, the test document set, and the owned
/// connection.
pub struct WorkloadCore {
    name: &'static str,
    config: Option<WorkloadConfig>,
    rng: Option<SeededRng>,
    collection_name: String,
    documents: Vec<JsonDocument>,
    connection: Option<Box<dyn InstrumentedConnection>>,
    operation_counter: u64,
}

impl WorkloadCore {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            config: None,
            rng: None,
            collection_name: String::new(),
            documents: Vec::new(),
            connection: None,
            operation_counter: 0,
        }
    }

    pub fn initialize(&mut self, config: WorkloadConfig) {
        let rng = match config.seed() {
            Some(seed) => SeededRng::new(seed),
            None => SeededRng::from_entropy(),
        };
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0);
        self.collection_name = format!("bench_{}_{millis}", self.name);
        self.rng = Some(rng);
        self.config = Some(config);
        self.documents.clear();
        self.operation_counter = 0;
    }

    pub fn config(&self) -> Option<&WorkloadConfig> {
        self.config.as_ref()
    }

    pub fn require_config(&self) -> BenchResult<&WorkloadConfig> {
        self.config
            .as_ref()
            .ok_or_else(|| BenchError::config("workload not initialized"))
    }

    pub fn rng_mut(&mut self) -> BenchResult<&mut SeededRng> {
        self.rng
            .as_mut()
            .ok_or_else(|| BenchError::config("workload not initialized"))
    }

    /// Forks a sub-stream off the workload RNG for the generator, keeping
    /// document content and document selection independent.
    pub fn fork_rng(&mut self) -> BenchResult<SeededRng> {
        Ok(self.rng_mut()?.fork())
    }

    pub fn collection_name(&self) -> &str {
        &self.collection_name
    }

    pub fn documents(&self) -> &[JsonDocument] {
        &self.documents
    }

    /// Environment setup, connection, and test data load.
    pub fn setup(
        &mut self,
        adapter: &mut dyn DatabaseAdapter,
        mut generator: DocumentGenerator,
    ) -> BenchResult<()> {
        let config = self.require_config()?.clone();

        let env = TestEnvironmentConfig::builder()
            .collection_name(&self.collection_name)
            .drop_existing(true)
            .build();
        adapter.setup_test_environment(&env)?;

        let mut conn_builder = ConnectionConfig::builder()
            .host(config.string_parameter_or("host", "localhost"))
            .port(config.int_parameter_or("port", 0) as u16)
            .database(config.string_parameter_or("database", "docbench"));
        if let Ok(uri) = config.string_parameter("uri") {
            conn_builder = conn_builder.uri(uri);
        }
        let connection = adapter.connect(&conn_builder.build())?;
        self.connection = Some(connection);

        let document_count = config.int_parameter_or("documentCount", 1000).max(0) as usize;
        self.documents = generator.generate_batch("doc", document_count);
        debug!(
            workload = self.name,
            collection = %self.collection_name,
            documents = document_count,
            "inserting test documents"
        );

        let setup_collector = MetricsCollector::new();
        let Some(connection) = self.connection.as_mut() else {
            return Err(BenchError::setup("connection not open after connect"));
        };
        for (i, document) in self.documents.iter().enumerate() {
            let insert = Operation::insert(format!("setup-{i}"), document.clone());
            let result = adapter.execute(connection.as_mut(), &insert, &setup_collector)?;
            if result.is_failure() {
                return Err(BenchError::setup(format!(
                    "initial insert of `{}` failed",
                    document.id()
                )));
            }
        }
        Ok(())
    }

    /// Id of a uniformly random document from the setup set.
    pub fn random_document_id(&mut self) -> BenchResult<String> {
        if self.documents.is_empty() {
            return Err(BenchError::config("test documents not initialized"));
        }
        let len = self.documents.len();
        let index = self.rng_mut()?.next_bounded(len as i32)? as usize;
        Ok(self.documents[index].id().to_string())
    }

    pub fn next_operation_id(&mut self) -> String {
        self.operation_counter += 1;
        format!("{}-{}", self.name, self.operation_counter)
    }

    pub fn connection_mut(&mut self) -> BenchResult<&mut dyn InstrumentedConnection> {
        match self.connection.as_mut() {
            Some(conn) => Ok(conn.as_mut()),
            None => Err(BenchError::config("workload connection not open")),
        }
    }

    /// Tears down the environment and closes the connection. Safe to call
    /// repeatedly.
    pub fn cleanup(&mut self, adapter: &mut dyn DatabaseAdapter) -> BenchResult<()> {
        adapter.teardown_test_environment()?;
        if let Some(mut connection) = self.connection.take() {
            connection.close();
        }
        self.documents.clear();
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Registry
// ────────────────────────────────────────────────────────────────────────────

type WorkloadFactory = Box<dyn Fn() -> Box<dyn Workload> + Send>;

static WORKLOADS: LazyLock<Mutex<IndexMap<String, WorkloadFactory>>> = LazyLock::new(|| {
    let mut map: IndexMap<String, WorkloadFactory> = IndexMap::new();
    map.insert(
        "traverse".to_string(),
        Box::new(|| Box::new(crate::workloads::TraverseWorkload::new()) as Box<dyn Workload>),
    );
    map.insert(
        "deserialize".to_string(),
        Box::new(|| Box::new(crate::workloads::DeserializeWorkload::new()) as Box<dyn Workload>),
    );
    Mutex::new(map)
});

/// Process-wide workload registry, pre-seeded with `traverse` and
/// `deserialize`.
pub struct WorkloadRegistry;

impl WorkloadRegistry {
    pub fn register(
        id: impl Into<String>,
        factory: impl Fn() -> Box<dyn Workload> + Send + 'static,
    ) {
        WORKLOADS.lock().insert(id.into(), Box::new(factory));
    }

    pub fn create(id: &str) -> BenchResult<Box<dyn Workload>> {
        let registry = WORKLOADS.lock();
        match registry.get(id) {
            Some(factory) => Ok(factory()),
            None => Err(BenchError::config(format!(
                "unknown workload: {id} (available: {})",
                registry.keys().cloned().collect::<Vec<_>>().join(", ")
            ))),
        }
    }

    pub fn exists(id: &str) -> bool {
        WORKLOADS.lock().contains_key(id)
    }

    pub fn available() -> Vec<String> {
        WORKLOADS.lock().keys().cloned().collect()
    }

    /// Workload id to description, in registration order.
    pub fn describe_all() -> Vec<(String, String)> {
        let ids = Self::available();
        ids.into_iter()
            .filter_map(|id| {
                Self::create(&id)
                    .ok()
                    .map(|workload| (id, workload.description().to_string()))
            })
            .collect()
    }
}
