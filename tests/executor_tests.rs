//! Orchestrator lifecycle tests: a scripted mock adapter for failure
//! containment, and full runs against the two reference adapters.

use std::any::Any;
use std::collections::BTreeSet;
use std::time::Duration;

use docbench::adapter::{
    Capability, ConnectionConfig, DatabaseAdapter, TestEnvironmentConfig,
};
use docbench::connection::{ConnectionTimingMetrics, InstrumentedConnection, TimingListener};
use docbench::adapters::{HashJumpAdapter, SeqScanAdapter};
use docbench::error::{BenchError, BenchResult};
use docbench::executor::BenchmarkExecutor;
use docbench::metrics::{MetricsCollector, OverheadBreakdown};
use docbench::operation::{Operation, OperationKind, OperationResult};
use docbench::workload::{WorkloadConfig, WorkloadRegistry};

struct MockConnection {
    closed: bool,
}

impl InstrumentedConnection for MockConnection {
    fn connection_id(&self) -> &str {
        "mock-conn-1"
    }

    fn is_valid(&self) -> bool {
        !self.closed
    }

    fn add_timing_listener(&mut self, _listener: Box<dyn TimingListener>) {}

    fn timing_metrics(&self) -> ConnectionTimingMetrics {
        ConnectionTimingMetrics::default()
    }

    fn reset_timing_metrics(&mut self) {}

    fn close(&mut self) {
        self.closed = true;
    }

    fn as_any(&mut self) -> &mut dyn Any {
        self
    }
}

/// Adapter returning canned successes, with an optional scripted failure
/// on the nth read.
struct MockAdapter {
    capabilities: BTreeSet<Capability>,
    setup_calls: u32,
    teardown_calls: u32,
    read_calls: u32,
    fail_on_read: Option<u32>,
}

impl MockAdapter {
    fn new() -> Self {
        Self {
            capabilities: [
                Capability::PartialDocumentRetrieval,
                Capability::NestedDocumentAccess,
            ]
            .into_iter()
            .collect(),
            setup_calls: 0,
            teardown_calls: 0,
            read_calls: 0,
            fail_on_read: None,
        }
    }

    fn failing_on_read(n: u32) -> Self {
        let mut adapter = Self::new();
        adapter.fail_on_read = Some(n);
        adapter
    }

    fn no_capabilities() -> Self {
        let mut adapter = Self::new();
        adapter.capabilities.clear();
        adapter
    }
}

impl DatabaseAdapter for MockAdapter {
    fn adapter_id(&self) -> &str {
        "mock"
    }

    fn display_name(&self) -> &str {
        "Mock Adapter"
    }

    fn capabilities(&self) -> &BTreeSet<Capability> {
        &self.capabilities
    }

    fn connect(
        &mut self,
        _config: &ConnectionConfig,
    ) -> BenchResult<Box<dyn InstrumentedConnection>> {
        Ok(Box::new(MockConnection { closed: false }))
    }

    fn execute(
        &mut self,
        _conn: &mut dyn InstrumentedConnection,
        operation: &Operation,
        _collector: &MetricsCollector,
    ) -> BenchResult<OperationResult> {
        if operation.kind() == OperationKind::Read {
            self.read_calls += 1;
            if self.fail_on_read == Some(self.read_calls) {
                return Err(BenchError::operation(
                    operation.operation_id(),
                    operation.kind(),
                    "scripted failure",
                ));
            }
        }
        let breakdown = OverheadBreakdown::builder()
            .total_latency(Duration::from_micros(100))
            .server_traversal_time(Duration::from_micros(20))
            .server_fetch_time(Duration::from_micros(30))
            .build();
        Ok(OperationResult::success(
            operation.operation_id(),
            operation.kind(),
            Duration::from_micros(100),
            breakdown,
        ))
    }

    fn overhead_breakdown(&self, result: &OperationResult) -> OverheadBreakdown {
        result.overhead_breakdown().cloned().unwrap_or_default()
    }

    fn setup_test_environment(&mut self, _config: &TestEnvironmentConfig) -> BenchResult<()> {
        self.setup_calls += 1;
        Ok(())
    }

    fn teardown_test_environment(&mut self) -> BenchResult<()> {
        self.teardown_calls += 1;
        Ok(())
    }

    fn close(&mut self) {}
}

fn small_config(iterations: u32, warmup: u32) -> WorkloadConfig {
    WorkloadConfig::builder("traverse")
        .iterations(iterations)
        .warmup_iterations(warmup)
        .seed(12345)
        .parameter("documentCount", 4)
        .build()
        .unwrap()
}

#[test]
fn orchestrator_lifecycle_with_mock_adapter() {
    let mut adapter = MockAdapter::new();
    let mut workload = WorkloadRegistry::create("traverse").unwrap();
    let config = small_config(5, 0);

    let result = BenchmarkExecutor::new()
        .execute(workload.as_mut(), &mut adapter, &config)
        .unwrap();

    let traverse = result.metrics.histogram("traverse").unwrap();
    assert_eq!(traverse.count, 5);
    assert!(result.duration > Duration::ZERO);
    assert_eq!(result.success_count, 5);
    assert_eq!(result.error_count, 0);
    assert_eq!(adapter.setup_calls, 1);
    assert_eq!(adapter.teardown_calls, 1);
}

#[test]
fn adapter_failures_are_contained() {
    let mut adapter = MockAdapter::failing_on_read(3);
    let mut workload = WorkloadRegistry::create("traverse").unwrap();
    let config = small_config(5, 0);

    let result = BenchmarkExecutor::new()
        .execute(workload.as_mut(), &mut adapter, &config)
        .unwrap();

    // The failing iteration is counted, not fatal; all 5 ran.
    assert_eq!(result.success_count, 4);
    assert_eq!(result.error_count, 1);
    assert_eq!(result.metrics.histogram("traverse").unwrap().count, 4);
    assert_eq!(adapter.teardown_calls, 1, "cleanup must still run");
}

#[test]
fn warmup_metrics_are_discarded() {
    let mut adapter = MockAdapter::new();
    let mut workload = WorkloadRegistry::create("traverse").unwrap();
    let config = small_config(3, 7);

    let result = BenchmarkExecutor::new()
        .execute(workload.as_mut(), &mut adapter, &config)
        .unwrap();

    // 7 warmup + 3 measured reads hit the adapter, but only 3 samples land.
    assert_eq!(adapter.read_calls, 10);
    assert_eq!(result.metrics.histogram("traverse").unwrap().count, 3);
}

#[test]
fn missing_capability_fails_before_measurement() {
    let mut adapter = MockAdapter::no_capabilities();
    let mut workload = WorkloadRegistry::create("traverse").unwrap();
    let config = small_config(5, 0);

    let err = BenchmarkExecutor::new()
        .execute(workload.as_mut(), &mut adapter, &config)
        .unwrap_err();
    assert!(matches!(err, BenchError::Capability { .. }));
    assert_eq!(adapter.setup_calls, 0, "setup must not run");
    assert_eq!(adapter.read_calls, 0);
}

#[test]
fn traverse_runs_end_to_end_on_both_reference_adapters() {
    let config = WorkloadConfig::builder("traverse")
        .iterations(20)
        .warmup_iterations(2)
        .seed(777)
        .parameter("documentCount", 10)
        .parameter("nestingDepth", 4)
        .parameter("fieldsPerLevel", 5)
        .parameter("fieldCount", 15)
        .build()
        .unwrap();
    let executor = BenchmarkExecutor::new();

    let mut seqscan = SeqScanAdapter::new();
    let mut hashjump = HashJumpAdapter::new();
    for adapter in [
        &mut seqscan as &mut dyn DatabaseAdapter,
        &mut hashjump as &mut dyn DatabaseAdapter,
    ] {
        let mut workload = WorkloadRegistry::create("traverse").unwrap();
        let result = executor
            .execute(workload.as_mut(), adapter, &config)
            .unwrap();

        assert_eq!(result.success_count, 20);
        assert_eq!(result.error_count, 0);
        assert_eq!(result.metrics.histogram("traverse").unwrap().count, 20);
        assert!(
            result.metrics.histogram("traverse_error").is_none(),
            "no error samples expected"
        );
        // Breakdown components recorded per iteration.
        assert_eq!(result.metrics.histogram("total_latency").unwrap().count, 20);
        assert_eq!(
            result.metrics.histogram("server_traversal").unwrap().count,
            20
        );
        assert_eq!(
            result.metrics.histogram("total_traversal").unwrap().count,
            20
        );
    }
}

#[test]
fn deserialize_runs_end_to_end() {
    let config = WorkloadConfig::builder("deserialize")
        .iterations(10)
        .warmup_iterations(0)
        .seed(424242)
        .parameter("documentCount", 5)
        .parameter("documentSizeBytes", 2000)
        .build()
        .unwrap();

    let mut adapter = SeqScanAdapter::new();
    let mut workload = WorkloadRegistry::create("deserialize").unwrap();
    let result = BenchmarkExecutor::new()
        .execute(workload.as_mut(), &mut adapter, &config)
        .unwrap();

    assert_eq!(result.success_count, 10);
    assert_eq!(result.metrics.histogram("deserialize").unwrap().count, 10);
    assert_eq!(
        result
            .metrics
            .histogram("deserialize_serialization")
            .unwrap()
            .count,
        10
    );
    assert_eq!(result.metrics.histogram("deserialization").unwrap().count, 10);
}

#[test]
fn bulk_execution_fans_out_sequentially() {
    let mut adapter = SeqScanAdapter::new();
    let env = TestEnvironmentConfig::builder()
        .collection_name("bulk_test")
        .build();
    adapter.setup_test_environment(&env).unwrap();
    let mut conn = adapter.connect(&ConnectionConfig::builder().build()).unwrap();
    let collector = MetricsCollector::new();

    let mut generator = docbench::generator::DocumentGenerator::builder()
        .seed(31)
        .field_count(4)
        .build()
        .unwrap();
    let documents = generator.generate_batch("bulk", 5);

    let inserts: Vec<Operation> = documents
        .iter()
        .enumerate()
        .map(|(i, doc)| Operation::insert(format!("ins-{i}"), doc.clone()))
        .collect();
    let bulk = adapter
        .execute_bulk(conn.as_mut(), &inserts, &collector)
        .unwrap();
    assert_eq!(bulk.total_operations(), 5);
    assert!(bulk.all_successful());
    assert_eq!(bulk.overhead_breakdowns().len(), 5);

    // One read of a present document, one of a missing one.
    let reads = vec![
        Operation::full_read("r-0", documents[0].id()),
        Operation::full_read("r-1", "missing-doc"),
    ];
    let bulk = adapter
        .execute_bulk(conn.as_mut(), &reads, &collector)
        .unwrap();
    assert_eq!(bulk.success_count(), 1);
    assert_eq!(bulk.failure_count(), 1);
}
