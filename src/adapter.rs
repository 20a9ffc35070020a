//! Database adapter SPI and the process-wide adapter registry.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::LazyLock;

use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::connection::InstrumentedConnection;
use crate::error::{BenchError, BenchResult};
use crate::metrics::{MetricsCollector, OverheadBreakdown};
use crate::operation::{BulkOperationResult, Operation, OperationResult};

// ────────────────────────────────────────────────────────────────────────────
// Capabilities
// ────────────────────────────────────────────────────────────────────────────

/// Capability tags advertised by adapters and required by workloads.
///
/// The framework gates a workload on its required capabilities before
/// measurement; the instrumentation tags are soft hints unless a workload
/// actually consumes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Capability {
    // Document access patterns
    /// Deep path queries (`a.b.c.d`).
    NestedDocumentAccess,
    /// Array element projection (`items[5]`).
    ArrayIndexAccess,
    /// Projection / field selection for partial retrieval.
    PartialDocumentRetrieval,
    /// Wildcard path patterns (`items[*].sku`).
    WildcardPathAccess,

    // Operations
    BulkInsert,
    BulkUpdate,
    BulkRead,

    // Topology
    Sharding,
    Replication,

    // Indexing
    SecondaryIndexes,
    CompoundIndexes,
    JsonPathIndexes,

    // Transactions
    SingleDocumentAtomicity,
    MultiDocumentTransactions,

    // Instrumentation
    /// Database-reported execution timing.
    ServerExecutionTime,
    /// Format-specific navigation timing; required for server-side
    /// traversal comparison.
    ServerTraversalTime,
    /// Query plan access via EXPLAIN.
    ExplainPlan,
    /// Operation-level profiling.
    Profiling,
    /// Driver-level instrumentation hooks.
    ClientTimingHooks,
    /// Client-side decode timing metrics.
    DeserializationMetrics,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Connection configuration
// ────────────────────────────────────────────────────────────────────────────

/// Connection parameters: either an opaque pass-through URI or a
/// host/port/database tuple with driver-specific options.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConnectionConfig {
    uri: Option<String>,
    host: Option<String>,
    port: u16,
    database: Option<String>,
    username: Option<String>,
    password: Option<String>,
    options: BTreeMap<String, String>,
}

impl ConnectionConfig {
    pub fn from_uri(uri: impl Into<String>) -> Self {
        Self::builder().uri(uri).build()
    }

    pub fn builder() -> ConnectionConfigBuilder {
        ConnectionConfigBuilder::default()
    }

    pub fn uri(&self) -> Option<&str> {
        self.uri.as_deref()
    }

    pub fn host(&self) -> &str {
        self.host.as_deref().unwrap_or("localhost")
    }

    /// Port 0 means "adapter-chosen".
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn database(&self) -> &str {
        self.database.as_deref().unwrap_or("docbench")
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    pub fn options(&self) -> &BTreeMap<String, String> {
        &self.options
    }

    pub fn option(&self, key: &str) -> Option<&str> {
        self.options.get(key).map(String::as_str)
    }

    pub fn int_option(&self, key: &str, default: i64) -> i64 {
        self.options
            .get(key)
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    pub fn bool_option(&self, key: &str, default: bool) -> bool {
        self.options
            .get(key)
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }
}

#[derive(Debug, Default)]
pub struct ConnectionConfigBuilder {
    inner: ConnectionConfig,
}

impl ConnectionConfigBuilder {
    pub fn uri(mut self, uri: impl Into<String>) -> Self {
        self.inner.uri = Some(uri.into());
        self
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.inner.host = Some(host.into());
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.inner.port = port;
        self
    }

    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.inner.database = Some(database.into());
        self
    }

    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.inner.username = Some(username.into());
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.inner.password = Some(password.into());
        self
    }

    pub fn option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.inner.options.insert(key.into(), value.into());
        self
    }

    pub fn build(self) -> ConnectionConfig {
        self.inner
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Test environment
// ────────────────────────────────────────────────────────────────────────────

/// Index to create during environment setup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDefinition {
    pub name: String,
    pub fields: Vec<String>,
    pub unique: bool,
    pub sparse: bool,
}

impl IndexDefinition {
    pub fn on(fields: &[&str]) -> Self {
        Self {
            name: format!("idx_{}", fields.join("_")),
            fields: fields.iter().map(|f| f.to_string()).collect(),
            unique: false,
            sparse: false,
        }
    }

    pub fn unique(fields: &[&str]) -> Self {
        Self {
            name: format!("uidx_{}", fields.join("_")),
            fields: fields.iter().map(|f| f.to_string()).collect(),
            unique: true,
            sparse: false,
        }
    }
}

/// Collection/table shape an adapter prepares before a workload runs.
#[derive(Debug, Clone)]
pub struct TestEnvironmentConfig {
    collection_name: String,
    indexes: Vec<IndexDefinition>,
    drop_existing: bool,
    initial_document_count: usize,
    platform_options: BTreeMap<String, String>,
}

impl TestEnvironmentConfig {
    pub fn builder() -> TestEnvironmentConfigBuilder {
        TestEnvironmentConfigBuilder::default()
    }

    pub fn collection_name(&self) -> &str {
        &self.collection_name
    }

    pub fn indexes(&self) -> &[IndexDefinition] {
        &self.indexes
    }

    pub fn drop_existing(&self) -> bool {
        self.drop_existing
    }

    pub fn initial_document_count(&self) -> usize {
        self.initial_document_count
    }

    pub fn platform_options(&self) -> &BTreeMap<String, String> {
        &self.platform_options
    }

    pub fn platform_option(&self, key: &str) -> Option<&str> {
        self.platform_options.get(key).map(String::as_str)
    }
}

impl Default for TestEnvironmentConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

#[derive(Debug)]
pub struct TestEnvironmentConfigBuilder {
    inner: TestEnvironmentConfig,
}

impl Default for TestEnvironmentConfigBuilder {
    fn default() -> Self {
        Self {
            inner: TestEnvironmentConfig {
                collection_name: "benchmark_docs".to_string(),
                indexes: Vec::new(),
                drop_existing: true,
                initial_document_count: 0,
                platform_options: BTreeMap::new(),
            },
        }
    }
}

impl TestEnvironmentConfigBuilder {
    pub fn collection_name(mut self, name: impl Into<String>) -> Self {
        self.inner.collection_name = name.into();
        self
    }

    pub fn add_index(mut self, index: IndexDefinition) -> Self {
        self.inner.indexes.push(index);
        self
    }

    pub fn drop_existing(mut self, drop: bool) -> Self {
        self.inner.drop_existing = drop;
        self
    }

    pub fn initial_document_count(mut self, count: usize) -> Self {
        self.inner.initial_document_count = count;
        self
    }

    pub fn platform_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.inner.platform_options.insert(key.into(), value.into());
        self
    }

    pub fn build(self) -> TestEnvironmentConfig {
        self.inner
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Validation
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

/// Outcome of a pre-flight configuration check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    errors: Vec<ValidationError>,
}

impl ValidationResult {
    pub fn success() -> Self {
        Self { errors: Vec::new() }
    }

    pub fn failure(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            errors: vec![ValidationError {
                field: field.into(),
                message: message.into(),
            }],
        }
    }

    pub fn failures(errors: Vec<ValidationError>) -> Self {
        Self { errors }
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    pub fn all_error_messages(&self) -> String {
        self.errors
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn into_result(self) -> BenchResult<()> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(BenchError::config(self.all_error_messages()))
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// DatabaseAdapter
// ────────────────────────────────────────────────────────────────────────────

/// The pluggable polymorphism point of the engine.
///
/// Construction must be pure; the first I/O happens in `connect`.
/// `execute` fails only for unrecoverable faults; transient failures are
/// reflected in the result's failure flag instead.
pub trait DatabaseAdapter {
    /// Stable registry id. Convention: lowercase, hyphenated.
    fn adapter_id(&self) -> &str;

    /// Human-readable name for reports.
    fn display_name(&self) -> &str;

    fn version(&self) -> &str {
        "1.0.0"
    }

    fn capabilities(&self) -> &BTreeSet<Capability>;

    fn has_capability(&self, capability: Capability) -> bool {
        self.capabilities().contains(&capability)
    }

    fn has_all_capabilities(&self, capabilities: &[Capability]) -> bool {
        capabilities.iter().all(|c| self.has_capability(*c))
    }

    /// Establishes an instrumented connection.
    fn connect(
        &mut self,
        config: &ConnectionConfig,
    ) -> BenchResult<Box<dyn InstrumentedConnection>>;

    /// Runs exactly one operation with overhead decomposition.
    fn execute(
        &mut self,
        conn: &mut dyn InstrumentedConnection,
        operation: &Operation,
        collector: &MetricsCollector,
    ) -> BenchResult<OperationResult>;

    /// Bulk execution; the default is sequential fan-out over `execute`.
    /// Adapters override this to measure batched wire paths.
    fn execute_bulk(
        &mut self,
        conn: &mut dyn InstrumentedConnection,
        operations: &[Operation],
        collector: &MetricsCollector,
    ) -> BenchResult<BulkOperationResult> {
        let mut results = Vec::with_capacity(operations.len());
        for operation in operations {
            results.push(self.execute(conn, operation, collector)?);
        }
        Ok(BulkOperationResult::new(results))
    }

    /// Extracts (or re-derives) the decomposed timings from a result.
    fn overhead_breakdown(&self, result: &OperationResult) -> OverheadBreakdown;

    fn setup_test_environment(&mut self, config: &TestEnvironmentConfig) -> BenchResult<()>;

    fn teardown_test_environment(&mut self) -> BenchResult<()>;

    fn validate_config(&self, _config: &ConnectionConfig) -> ValidationResult {
        ValidationResult::success()
    }

    /// Releases adapter-level resources; repeated calls are no-ops.
    fn close(&mut self);
}

// ────────────────────────────────────────────────────────────────────────────
// Registry
// ────────────────────────────────────────────────────────────────────────────

type AdapterFactory = Box<dyn Fn() -> Box<dyn DatabaseAdapter> + Send>;

static ADAPTERS: LazyLock<Mutex<IndexMap<String, AdapterFactory>>> = LazyLock::new(|| {
    let mut map: IndexMap<String, AdapterFactory> = IndexMap::new();
    map.insert(
        crate::adapters::SEQSCAN_ADAPTER_ID.to_string(),
        Box::new(|| Box::new(crate::adapters::SeqScanAdapter::new()) as Box<dyn DatabaseAdapter>),
    );
    map.insert(
        crate::adapters::HASHJUMP_ADAPTER_ID.to_string(),
        Box::new(|| Box::new(crate::adapters::HashJumpAdapter::new()) as Box<dyn DatabaseAdapter>),
    );
    Mutex::new(map)
});

/// Process-wide adapter registry, keyed by adapter id. The two built-in
/// adapters are pre-registered; out-of-tree adapters register at process
/// start.
pub struct AdapterRegistry;

impl AdapterRegistry {
    pub fn register(
        id: impl Into<String>,
        factory: impl Fn() -> Box<dyn DatabaseAdapter> + Send + 'static,
    ) {
        ADAPTERS.lock().insert(id.into(), Box::new(factory));
    }

    pub fn create(id: &str) -> BenchResult<Box<dyn DatabaseAdapter>> {
        let registry = ADAPTERS.lock();
        match registry.get(id) {
            Some(factory) => Ok(factory()),
            None => Err(BenchError::config(format!(
                "unknown adapter: {id} (available: {})",
                registry.keys().cloned().collect::<Vec<_>>().join(", ")
            ))),
        }
    }

    pub fn exists(id: &str) -> bool {
        ADAPTERS.lock().contains_key(id)
    }

    pub fn available() -> Vec<String> {
        ADAPTERS.lock().keys().cloned().collect()
    }

    /// Adapter id to display name, in registration order.
    pub fn describe_all() -> Vec<(String, String)> {
        let ids = Self::available();
        ids.into_iter()
            .filter_map(|id| {
                Self::create(&id)
                    .ok()
                    .map(|adapter| (id, adapter.display_name().to_string()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_config_defaults() {
        let config = ConnectionConfig::builder().build();
        assert_eq!(config.host(), "localhost");
        assert_eq!(config.port(), 0);
        assert_eq!(config.database(), "docbench");
        assert!(config.uri().is_none());
    }

    #[test]
    fn uri_form_is_pass_through() {
        let config = ConnectionConfig::from_uri("mem://local");
        assert_eq!(config.uri(), Some("mem://local"));
    }

    #[test]
    fn typed_options_parse_on_access() {
        let config = ConnectionConfig::builder()
            .option("poolSize", "8")
            .option("tls", "true")
            .build();
        assert_eq!(config.int_option("poolSize", 1), 8);
        assert!(config.bool_option("tls", false));
        assert_eq!(config.int_option("missing", 3), 3);
    }

    #[test]
    fn index_definition_names() {
        let idx = IndexDefinition::on(&["a", "b"]);
        assert_eq!(idx.name, "idx_a_b");
        assert!(!idx.unique);
        let uidx = IndexDefinition::unique(&["k"]);
        assert_eq!(uidx.name, "uidx_k");
        assert!(uidx.unique);
    }

    #[test]
    fn validation_result_messages() {
        let ok = ValidationResult::success();
        assert!(ok.is_valid());
        assert!(ok.into_result().is_ok());

        let bad = ValidationResult::failure("uri", "unsupported scheme");
        assert!(!bad.is_valid());
        assert!(bad.all_error_messages().contains("uri"));
        assert!(bad.into_result().is_err());
    }

    #[test]
    fn registry_has_builtin_adapters() {
        assert!(AdapterRegistry::exists("seqscan"));
        assert!(AdapterRegistry::exists("hashjump"));
        assert!(AdapterRegistry::create("no-such-adapter").is_err());
        let described = AdapterRegistry::describe_all();
        assert!(described.iter().any(|(id, _)| id == "seqscan"));
    }

    #[test]
    fn registry_accepts_runtime_registration() {
        AdapterRegistry::register("test-seqscan-clone", || {
            Box::new(crate::adapters::SeqScanAdapter::new())
        });
        assert!(AdapterRegistry::exists("test-seqscan-clone"));
        let adapter = AdapterRegistry::create("test-seqscan-clone").unwrap();
        assert_eq!(adapter.adapter_id(), "seqscan");
    }
}
