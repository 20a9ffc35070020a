//! Built-in workloads: deep-path traversal and full-document
//! deserialization.

use tracing::debug;

use crate::adapter::{Capability, DatabaseAdapter};
use crate::error::BenchResult;
use crate::generator::DocumentGenerator;
use crate::metrics::MetricsCollector;
use crate::operation::Operation;
use crate::workload::{Workload, WorkloadConfig, WorkloadCore};

fn derive_target_path(nesting_depth: usize) -> String {
    let mut path = String::new();
    for i in 0..nesting_depth.saturating_sub(1) {
        if i > 0 {
            path.push('.');
        }
        path.push_str("nested");
    }
    if !path.is_empty() {
        path.push('.');
    }
    path.push_str("target");
    path
}

// ────────────────────────────────────────────────────────────────────────────
// Traverse
// ────────────────────────────────────────────────────────────────────────────

/// Measures the cost of projecting a single deeply-nested field. This is
/// where sequential length-prefixed scanning and hash-indexed offset
/// jumps diverge.
pub struct TraverseWorkload {
    core: WorkloadCore,
    target_path: String,
}

impl TraverseWorkload {
    pub fn new() -> Self {
        Self {
            core: WorkloadCore::new("traverse"),
            target_path: String::new(),
        }
    }
}

impl Default for TraverseWorkload {
    fn default() -> Self {
        Self::new()
    }
}

impl Workload for TraverseWorkload {
    fn name(&self) -> &str {
        "traverse"
    }

    fn description(&self) -> &str {
        "Benchmarks deep path traversal, comparing sequential-scan with hash-indexed field access"
    }

    fn required_capabilities(&self) -> Vec<Capability> {
        vec![
            Capability::PartialDocumentRetrieval,
            Capability::NestedDocumentAccess,
        ]
    }

    fn initialize(&mut self, config: WorkloadConfig) -> BenchResult<()> {
        let nesting_depth = config.int_parameter_or("nestingDepth", 5).max(0) as usize;
        self.target_path = match config.string_parameter("targetPath") {
            Ok(path) => path,
            Err(_) => derive_target_path(nesting_depth),
        };
        debug!(target_path = %self.target_path, "traverse workload initialized");
        self.core.initialize(config);
        Ok(())
    }

    fn setup_data(&mut self, adapter: &mut dyn DatabaseAdapter) -> BenchResult<()> {
        let config = self.core.require_config()?;
        let nesting_depth = config.int_parameter_or("nestingDepth", 5).max(0) as usize;
        let fields_per_level = config.int_parameter_or("fieldsPerLevel", 10).max(0) as usize;
        let field_count = config.int_parameter_or("fieldCount", 20).max(0) as usize;

        let generator = DocumentGenerator::builder()
            .random_source(self.core.fork_rng()?)
            .field_count(field_count)
            .nesting_depth(nesting_depth)
            .fields_per_level(fields_per_level)
            .target_path(&self.target_path)
            .target_value("TARGET_VALUE")
            .build()?;

        self.core.setup(adapter, generator)
    }

    fn run_iteration(
        &mut self,
        adapter: &mut dyn DatabaseAdapter,
        collector: &MetricsCollector,
    ) -> BenchResult<()> {
        let document_id = self.core.random_document_id()?;
        let read = Operation::read_with_projection(
            self.core.next_operation_id(),
            document_id,
            vec![self.target_path.clone()],
        );

        let connection = self.core.connection_mut()?;
        let result = adapter.execute(connection, &read, collector)?;

        collector.record("traverse", result.total_duration());
        if result.is_failure() {
            collector.record("traverse_error", result.total_duration());
        }
        if let Some(breakdown) = result.overhead_breakdown() {
            collector.record_breakdown(breakdown);
        }
        Ok(())
    }

    fn cleanup(&mut self, adapter: &mut dyn DatabaseAdapter) -> BenchResult<()> {
        self.core.cleanup(adapter)
    }

    fn config(&self) -> Option<&WorkloadConfig> {
        self.core.config()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Deserialize
// ────────────────────────────────────────────────────────────────────────────

/// Measures full-document retrieval and decode cost for documents of a
/// targeted byte size.
pub struct DeserializeWorkload {
    core: WorkloadCore,
}

impl DeserializeWorkload {
    pub fn new() -> Self {
        Self {
            core: WorkloadCore::new("deserialize"),
        }
    }
}

impl Default for DeserializeWorkload {
    fn default() -> Self {
        Self::new()
    }
}

impl Workload for DeserializeWorkload {
    fn name(&self) -> &str {
        "deserialize"
    }

    fn description(&self) -> &str {
        "Benchmarks full document retrieval and deserialization overhead"
    }

    fn required_capabilities(&self) -> Vec<Capability> {
        vec![
            Capability::PartialDocumentRetrieval,
            Capability::NestedDocumentAccess,
        ]
    }

    fn initialize(&mut self, config: WorkloadConfig) -> BenchResult<()> {
        self.core.initialize(config);
        Ok(())
    }

    fn setup_data(&mut self, adapter: &mut dyn DatabaseAdapter) -> BenchResult<()> {
        let config = self.core.require_config()?;
        let target_size = config.int_parameter_or("documentSizeBytes", 5000).max(0) as usize;
        let tolerance = config.int_parameter_or("sizeTolerance", 20).max(0) as usize;
        let nesting_depth = config.int_parameter_or("nestingDepth", 3).max(0) as usize;
        let fields_per_level = config.int_parameter_or("fieldsPerLevel", 5).max(0) as usize;
        let array_field_count = config.int_parameter_or("arrayFieldCount", 2).max(0) as usize;

        let generator = DocumentGenerator::builder()
            .random_source(self.core.fork_rng()?)
            .target_size_bytes(target_size)
            .size_tolerance_percent(tolerance)
            .numeric_field_probability(0.3)
            .boolean_field_probability(0.1)
            .nesting_depth(nesting_depth)
            .fields_per_level(fields_per_level)
            .array_field_count(array_field_count)
            .array_size(5, 15)
            .build()?;

        self.core.setup(adapter, generator)
    }

    fn run_iteration(
        &mut self,
        adapter: &mut dyn DatabaseAdapter,
        collector: &MetricsCollector,
    ) -> BenchResult<()> {
        let document_id = self.core.random_document_id()?;
        let read = Operation::full_read(self.core.next_operation_id(), document_id);

        let connection = self.core.connection_mut()?;
        let result = adapter.execute(connection, &read, collector)?;

        collector.record("deserialize", result.total_duration());
        if result.is_failure() {
            collector.record("deserialize_error", result.total_duration());
        }
        if let Some(breakdown) = result.overhead_breakdown() {
            collector.record("deserialize_serialization", breakdown.deserialization_time());
            collector.record_breakdown(breakdown);
        }
        Ok(())
    }

    fn cleanup(&mut self, adapter: &mut dyn DatabaseAdapter) -> BenchResult<()> {
        self.core.cleanup(adapter)
    }

    fn config(&self) -> Option<&WorkloadConfig> {
        self.core.config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_path_derivation_matches_depth() {
        assert_eq!(derive_target_path(5), "nested.nested.nested.nested.target");
        assert_eq!(derive_target_path(2), "nested.target");
        assert_eq!(derive_target_path(1), "target");
        assert_eq!(derive_target_path(0), "target");
    }

    #[test]
    fn explicit_target_path_wins_over_derivation() {
        let mut workload = TraverseWorkload::new();
        let config = WorkloadConfig::builder("traverse")
            .seed(1)
            .parameter("targetPath", "custom.path")
            .build()
            .unwrap();
        workload.initialize(config).unwrap();
        assert_eq!(workload.target_path, "custom.path");
    }

    #[test]
    fn derived_target_path_uses_configured_depth() {
        let mut workload = TraverseWorkload::new();
        let config = WorkloadConfig::builder("traverse")
            .seed(1)
            .parameter("nestingDepth", 3)
            .build()
            .unwrap();
        workload.initialize(config).unwrap();
        assert_eq!(workload.target_path, "nested.nested.target");
    }

    #[test]
    fn workloads_require_projection_and_nesting() {
        let traverse = TraverseWorkload::new();
        assert!(traverse
            .required_capabilities()
            .contains(&Capability::PartialDocumentRetrieval));
        let deserialize = DeserializeWorkload::new();
        assert!(deserialize
            .required_capabilities()
            .contains(&Capability::NestedDocumentAccess));
    }
}
