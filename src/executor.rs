//! Benchmark orchestration: drives an (adapter, workload, config) triple
//! through setup, warmup, measurement, and cleanup.

use std::time::{Duration, Instant, SystemTime};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::adapter::DatabaseAdapter;
use crate::error::{BenchError, BenchResult};
use crate::metrics::{MetricsCollector, MetricsSummary};
use crate::workload::{Workload, WorkloadConfig};

/// Result of one adapter's run of a workload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdapterResult {
    pub adapter_id: String,
    pub adapter_name: String,
    pub metrics: MetricsSummary,
    pub iterations: u32,
    pub warmup_iterations: u32,
    pub success_count: u32,
    pub error_count: u32,
    #[serde(with = "serde_duration_nanos")]
    pub duration: Duration,
}

/// Per-workload benchmark output: the handoff boundary to reporters.
/// Built exclusively through [`BenchmarkResult::builder`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkResult {
    workload_name: String,
    config: Option<WorkloadConfig>,
    #[serde(with = "serde_system_time_millis")]
    start_time: SystemTime,
    #[serde(with = "serde_system_time_millis")]
    end_time: SystemTime,
    #[serde(with = "serde_duration_nanos")]
    total_duration: Duration,
    adapter_results: IndexMap<String, AdapterResult>,
}

impl BenchmarkResult {
    pub fn builder(workload_name: impl Into<String>) -> BenchmarkResultBuilder {
        BenchmarkResultBuilder {
            workload_name: workload_name.into(),
            config: None,
            start_time: SystemTime::now(),
            end_time: None,
            total_duration: None,
            adapter_results: IndexMap::new(),
        }
    }

    pub fn workload_name(&self) -> &str {
        &self.workload_name
    }

    pub fn config(&self) -> Option<&WorkloadConfig> {
        self.config.as_ref()
    }

    pub fn start_time(&self) -> SystemTime {
        self.start_time
    }

    pub fn end_time(&self) -> SystemTime {
        self.end_time
    }

    pub fn total_duration(&self) -> Duration {
        self.total_duration
    }

    /// Adapter id to result, in insertion order.
    pub fn adapter_results(&self) -> &IndexMap<String, AdapterResult> {
        &self.adapter_results
    }
}

pub struct BenchmarkResultBuilder {
    workload_name: String,
    config: Option<WorkloadConfig>,
    start_time: SystemTime,
    end_time: Option<SystemTime>,
    total_duration: Option<Duration>,
    adapter_results: IndexMap<String, AdapterResult>,
}

impl BenchmarkResultBuilder {
    pub fn config(mut self, config: WorkloadConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn start_time(mut self, t: SystemTime) -> Self {
        self.start_time = t;
        self
    }

    pub fn end_time(mut self, t: SystemTime) -> Self {
        self.end_time = Some(t);
        self
    }

    pub fn total_duration(mut self, d: Duration) -> Self {
        self.total_duration = Some(d);
        self
    }

    pub fn add_adapter_result(mut self, result: AdapterResult) -> Self {
        self.adapter_results.insert(result.adapter_id.clone(), result);
        self
    }

    /// Finalizes the result, deriving end time and duration when omitted.
    pub fn build(self) -> BenchmarkResult {
        let end_time = self.end_time.unwrap_or_else(SystemTime::now);
        let total_duration = self.total_duration.unwrap_or_else(|| {
            end_time
                .duration_since(self.start_time)
                .unwrap_or(Duration::ZERO)
        });
        BenchmarkResult {
            workload_name: self.workload_name,
            config: self.config,
            start_time: self.start_time,
            end_time,
            total_duration,
            adapter_results: self.adapter_results,
        }
    }
}

/// Executes benchmarks and collects results.
///
/// Single-threaded per (adapter, workload) pair; running several adapters
/// is a sequential outer loop, which keeps cross-adapter cache and
/// scheduling interference out of the measurements.
pub struct BenchmarkExecutor;

impl BenchmarkExecutor {
    pub fn new() -> Self {
        Self
    }

    pub fn execute(
        &self,
        workload: &mut dyn Workload,
        adapter: &mut dyn DatabaseAdapter,
        config: &WorkloadConfig,
    ) -> BenchResult<AdapterResult> {
        for capability in workload.required_capabilities() {
            if !adapter.has_capability(capability) {
                return Err(BenchError::capability(capability, adapter.adapter_id()));
            }
        }

        info!(workload = workload.name(), adapter = adapter.adapter_id(), "initializing");
        workload.initialize(config.clone())?;

        let setup_start = Instant::now();
        if let Err(err) = workload.setup_data(adapter) {
            warn!(workload = workload.name(), error = %err, "setup failed");
            return Err(err);
        }
        debug!(elapsed_ms = setup_start.elapsed().as_millis() as u64, "setup complete");

        // Warmup: same iterations, throwaway collector, errors swallowed.
        let warmup_collector = MetricsCollector::new();
        for i in 0..config.warmup_iterations() {
            if let Err(err) = workload.run_iteration(adapter, &warmup_collector) {
                warn!(iteration = i, error = %err, "warmup iteration failed");
            }
        }
        debug!(iterations = config.warmup_iterations(), "warmup complete");

        let collector = MetricsCollector::new();
        let bench_start = Instant::now();
        let mut success_count = 0u32;
        let mut error_count = 0u32;

        for i in 0..config.iterations() {
            match workload.run_iteration(adapter, &collector) {
                Ok(()) => success_count += 1,
                Err(err) => {
                    error_count += 1;
                    warn!(iteration = i, error = %err, "iteration failed");
                }
            }
        }
        let bench_duration = bench_start.elapsed();
        info!(
            workload = workload.name(),
            adapter = adapter.adapter_id(),
            success = success_count,
            errors = error_count,
            elapsed_ms = bench_duration.as_millis() as u64,
            "measurement complete"
        );

        if let Err(err) = workload.cleanup(adapter) {
            warn!(workload = workload.name(), error = %err, "cleanup failed");
        }

        Ok(AdapterResult {
            adapter_id: adapter.adapter_id().to_string(),
            adapter_name: adapter.display_name().to_string(),
            metrics: collector.summarize(),
            iterations: config.iterations(),
            warmup_iterations: config.warmup_iterations(),
            success_count,
            error_count,
            duration: bench_duration,
        })
    }
}

impl Default for BenchmarkExecutor {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) mod serde_duration_nanos {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_nanos() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_nanos)
    }
}

pub(crate) mod serde_system_time_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    pub fn serialize<S: Serializer>(t: &SystemTime, s: S) -> Result<S::Ok, S::Error> {
        let millis = t
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        s.serialize_u64(millis)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<SystemTime, D::Error> {
        u64::deserialize(d).map(|millis| UNIX_EPOCH + Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::MetricsSummary;

    fn adapter_result(id: &str) -> AdapterResult {
        AdapterResult {
            adapter_id: id.to_string(),
            adapter_name: id.to_uppercase(),
            metrics: MetricsSummary::default(),
            iterations: 10,
            warmup_iterations: 2,
            success_count: 10,
            error_count: 0,
            duration: Duration::from_millis(5),
        }
    }

    #[test]
    fn builder_derives_end_time_and_duration() {
        let start = SystemTime::UNIX_EPOCH + Duration::from_secs(100);
        let end = start + Duration::from_secs(3);
        let result = BenchmarkResult::builder("traverse")
            .start_time(start)
            .end_time(end)
            .add_adapter_result(adapter_result("seqscan"))
            .build();
        assert_eq!(result.total_duration(), Duration::from_secs(3));
        assert_eq!(result.adapter_results().len(), 1);
    }

    #[test]
    fn adapter_results_keep_insertion_order() {
        let result = BenchmarkResult::builder("traverse")
            .add_adapter_result(adapter_result("zeta"))
            .add_adapter_result(adapter_result("alpha"))
            .build();
        let ids: Vec<&String> = result.adapter_results().keys().collect();
        assert_eq!(ids, vec!["zeta", "alpha"]);
    }

    #[test]
    fn result_round_trips_through_json() {
        let result = BenchmarkResult::builder("traverse")
            .config(WorkloadConfig::builder("traverse").build().unwrap())
            .add_adapter_result(adapter_result("seqscan"))
            .build();
        let json = serde_json::to_string(&result).unwrap();
        let restored: BenchmarkResult = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.workload_name(), "traverse");
        assert_eq!(restored.adapter_results()["seqscan"].iterations, 10);
        assert_eq!(
            restored.config().unwrap().iterations(),
            result.config().unwrap().iterations()
        );
    }
}
