//! Operation model: the five operation kinds and their outcomes.

use std::collections::BTreeMap;
use std::fmt;
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

use crate::document::{JsonDocument, JsonValue};
use crate::error::BenchError;
use crate::metrics::OverheadBreakdown;

/// Tag for the five operation kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    Insert,
    Read,
    Update,
    Delete,
    Aggregate,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OperationKind::Insert => "insert",
            OperationKind::Read => "read",
            OperationKind::Update => "update",
            OperationKind::Delete => "delete",
            OperationKind::Aggregate => "aggregate",
        };
        f.write_str(s)
    }
}

/// Read preference for replicated deployments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadPreference {
    #[default]
    Primary,
    PrimaryPreferred,
    Secondary,
    SecondaryPreferred,
    Nearest,
}

/// One benchmark operation. The id is unique within a run and correlates
/// timing events with results.
#[derive(Debug, Clone)]
pub enum Operation {
    Insert {
        operation_id: String,
        document: JsonDocument,
    },
    Read {
        operation_id: String,
        document_id: String,
        /// Empty means full-document retrieval.
        projection_paths: Vec<String>,
        read_preference: ReadPreference,
    },
    Update {
        operation_id: String,
        document_id: String,
        update_path: String,
        new_value: JsonValue,
        upsert: bool,
    },
    Delete {
        operation_id: String,
        document_id: String,
    },
    Aggregate {
        operation_id: String,
        /// Opaque pipeline stages, interpreted by the adapter.
        pipeline: Vec<String>,
        explain: bool,
    },
}

impl Operation {
    pub fn insert(operation_id: impl Into<String>, document: JsonDocument) -> Self {
        Operation::Insert {
            operation_id: operation_id.into(),
            document,
        }
    }

    /// Full-document read with primary preference.
    pub fn full_read(operation_id: impl Into<String>, document_id: impl Into<String>) -> Self {
        Operation::Read {
            operation_id: operation_id.into(),
            document_id: document_id.into(),
            projection_paths: Vec::new(),
            read_preference: ReadPreference::Primary,
        }
    }

    /// Projected read with primary preference.
    pub fn read_with_projection(
        operation_id: impl Into<String>,
        document_id: impl Into<String>,
        projection_paths: Vec<String>,
    ) -> Self {
        Operation::Read {
            operation_id: operation_id.into(),
            document_id: document_id.into(),
            projection_paths,
            read_preference: ReadPreference::Primary,
        }
    }

    pub fn update(
        operation_id: impl Into<String>,
        document_id: impl Into<String>,
        update_path: impl Into<String>,
        new_value: JsonValue,
        upsert: bool,
    ) -> Self {
        Operation::Update {
            operation_id: operation_id.into(),
            document_id: document_id.into(),
            update_path: update_path.into(),
            new_value,
            upsert,
        }
    }

    pub fn delete(operation_id: impl Into<String>, document_id: impl Into<String>) -> Self {
        Operation::Delete {
            operation_id: operation_id.into(),
            document_id: document_id.into(),
        }
    }

    pub fn aggregate(
        operation_id: impl Into<String>,
        pipeline: Vec<String>,
        explain: bool,
    ) -> Self {
        Operation::Aggregate {
            operation_id: operation_id.into(),
            pipeline,
            explain,
        }
    }

    pub fn operation_id(&self) -> &str {
        match self {
            Operation::Insert { operation_id, .. }
            | Operation::Read { operation_id, .. }
            | Operation::Update { operation_id, .. }
            | Operation::Delete { operation_id, .. }
            | Operation::Aggregate { operation_id, .. } => operation_id,
        }
    }

    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::Insert { .. } => OperationKind::Insert,
            Operation::Read { .. } => OperationKind::Read,
            Operation::Update { .. } => OperationKind::Update,
            Operation::Delete { .. } => OperationKind::Delete,
            Operation::Aggregate { .. } => OperationKind::Aggregate,
        }
    }

    /// True for reads that request a subset of fields.
    pub fn has_projection(&self) -> bool {
        matches!(self, Operation::Read { projection_paths, .. } if !projection_paths.is_empty())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// OperationResult
// ────────────────────────────────────────────────────────────────────────────

/// Outcome of a single operation.
///
/// Successful results should carry an [`OverheadBreakdown`]; its absence
/// is degraded telemetry, not a correctness bug. Failed results never
/// carry one.
#[derive(Debug)]
pub struct OperationResult {
    operation_id: String,
    kind: OperationKind,
    success: bool,
    start_time: Option<SystemTime>,
    end_time: Option<SystemTime>,
    total_duration: Duration,
    result_data: Option<JsonValue>,
    error: Option<BenchError>,
    overhead_breakdown: Option<OverheadBreakdown>,
    metadata: BTreeMap<String, String>,
}

impl OperationResult {
    pub fn success(
        operation_id: impl Into<String>,
        kind: OperationKind,
        duration: Duration,
        breakdown: OverheadBreakdown,
    ) -> Self {
        Self::builder(operation_id, kind)
            .total_duration(duration)
            .overhead_breakdown(breakdown)
            .build()
    }

    pub fn success_with_data(
        operation_id: impl Into<String>,
        kind: OperationKind,
        duration: Duration,
        breakdown: OverheadBreakdown,
        data: JsonValue,
    ) -> Self {
        Self::builder(operation_id, kind)
            .total_duration(duration)
            .overhead_breakdown(breakdown)
            .result_data(data)
            .build()
    }

    pub fn failure(
        operation_id: impl Into<String>,
        kind: OperationKind,
        duration: Duration,
        error: BenchError,
    ) -> Self {
        Self::builder(operation_id, kind)
            .success_flag(false)
            .total_duration(duration)
            .error(error)
            .build()
    }

    pub fn builder(operation_id: impl Into<String>, kind: OperationKind) -> OperationResultBuilder {
        OperationResultBuilder {
            operation_id: operation_id.into(),
            kind,
            success: true,
            start_time: None,
            end_time: None,
            total_duration: Duration::ZERO,
            result_data: None,
            error: None,
            overhead_breakdown: None,
            metadata: BTreeMap::new(),
        }
    }

    pub fn operation_id(&self) -> &str {
        &self.operation_id
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn is_failure(&self) -> bool {
        !self.success
    }

    pub fn start_time(&self) -> Option<SystemTime> {
        self.start_time
    }

    pub fn end_time(&self) -> Option<SystemTime> {
        self.end_time
    }

    pub fn total_duration(&self) -> Duration {
        self.total_duration
    }

    pub fn result_data(&self) -> Option<&JsonValue> {
        self.result_data.as_ref()
    }

    pub fn error(&self) -> Option<&BenchError> {
        self.error.as_ref()
    }

    pub fn overhead_breakdown(&self) -> Option<&OverheadBreakdown> {
        self.overhead_breakdown.as_ref()
    }

    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }
}

pub struct OperationResultBuilder {
    operation_id: String,
    kind: OperationKind,
    success: bool,
    start_time: Option<SystemTime>,
    end_time: Option<SystemTime>,
    total_duration: Duration,
    result_data: Option<JsonValue>,
    error: Option<BenchError>,
    overhead_breakdown: Option<OverheadBreakdown>,
    metadata: BTreeMap<String, String>,
}

impl OperationResultBuilder {
    pub fn success_flag(mut self, success: bool) -> Self {
        self.success = success;
        self
    }

    pub fn start_time(mut self, t: SystemTime) -> Self {
        self.start_time = Some(t);
        self
    }

    pub fn end_time(mut self, t: SystemTime) -> Self {
        self.end_time = Some(t);
        self
    }

    pub fn total_duration(mut self, d: Duration) -> Self {
        self.total_duration = d;
        self
    }

    pub fn result_data(mut self, data: JsonValue) -> Self {
        self.result_data = Some(data);
        self
    }

    pub fn error(mut self, error: BenchError) -> Self {
        self.error = Some(error);
        self
    }

    pub fn overhead_breakdown(mut self, breakdown: OverheadBreakdown) -> Self {
        self.overhead_breakdown = Some(breakdown);
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn build(self) -> OperationResult {
        OperationResult {
            operation_id: self.operation_id,
            kind: self.kind,
            success: self.success,
            start_time: self.start_time,
            end_time: self.end_time,
            total_duration: self.total_duration,
            result_data: self.result_data,
            error: self.error,
            overhead_breakdown: self.overhead_breakdown,
            metadata: self.metadata,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// BulkOperationResult
// ────────────────────────────────────────────────────────────────────────────

/// Aggregated outcome of a batch of operations.
#[derive(Debug)]
pub struct BulkOperationResult {
    results: Vec<OperationResult>,
}

impl BulkOperationResult {
    pub fn new(results: Vec<OperationResult>) -> Self {
        Self { results }
    }

    pub fn results(&self) -> &[OperationResult] {
        &self.results
    }

    pub fn total_operations(&self) -> usize {
        self.results.len()
    }

    pub fn success_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }

    pub fn failure_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_failure()).count()
    }

    pub fn all_successful(&self) -> bool {
        self.results.iter().all(OperationResult::is_success)
    }

    pub fn total_duration(&self) -> Duration {
        self.results.iter().map(OperationResult::total_duration).sum()
    }

    pub fn average_duration(&self) -> Duration {
        if self.results.is_empty() {
            return Duration::ZERO;
        }
        self.total_duration() / self.results.len() as u32
    }

    /// Breakdowns of the successful operations that carried one.
    pub fn overhead_breakdowns(&self) -> Vec<&OverheadBreakdown> {
        self.results
            .iter()
            .filter(|r| r.is_success())
            .filter_map(OperationResult::overhead_breakdown)
            .collect()
    }

    pub fn throughput_ops_per_second(&self) -> f64 {
        let total = self.total_duration();
        if total.is_zero() {
            return 0.0;
        }
        self.results.len() as f64 / total.as_secs_f64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn factories_set_the_success_flag() {
        let ok = OperationResult::success(
            "op-1",
            OperationKind::Read,
            Duration::from_micros(10),
            OverheadBreakdown::default(),
        );
        assert!(ok.is_success());
        assert!(ok.overhead_breakdown().is_some());

        let failed = OperationResult::failure(
            "op-2",
            OperationKind::Read,
            Duration::from_micros(10),
            BenchError::operation("op-2", OperationKind::Read, "gone"),
        );
        assert!(failed.is_failure());
        assert!(failed.overhead_breakdown().is_none());
        assert!(failed.error().is_some());
    }

    #[test]
    fn projection_detection() {
        let full = Operation::full_read("a", "doc-1");
        assert!(!full.has_projection());
        let projected =
            Operation::read_with_projection("b", "doc-1", vec!["nested.target".into()]);
        assert!(projected.has_projection());
        assert_eq!(projected.kind(), OperationKind::Read);
    }

    #[test]
    fn bulk_aggregation() {
        let results = vec![
            OperationResult::success(
                "a",
                OperationKind::Insert,
                Duration::from_micros(100),
                OverheadBreakdown::default(),
            ),
            OperationResult::success(
                "b",
                OperationKind::Insert,
                Duration::from_micros(300),
                OverheadBreakdown::default(),
            ),
            OperationResult::failure(
                "c",
                OperationKind::Insert,
                Duration::from_micros(200),
                BenchError::operation("c", OperationKind::Insert, "nope"),
            ),
        ];
        let bulk = BulkOperationResult::new(results);
        assert_eq!(bulk.total_operations(), 3);
        assert_eq!(bulk.success_count(), 2);
        assert_eq!(bulk.failure_count(), 1);
        assert!(!bulk.all_successful());
        assert_eq!(bulk.total_duration(), Duration::from_micros(600));
        assert_eq!(bulk.average_duration(), Duration::from_micros(200));
        assert_eq!(bulk.overhead_breakdowns().len(), 2);
        assert!(bulk.throughput_ops_per_second() > 0.0);
    }

    #[test]
    fn empty_bulk_has_zero_throughput() {
        let bulk = BulkOperationResult::new(Vec::new());
        assert_eq!(bulk.average_duration(), Duration::ZERO);
        assert_eq!(bulk.throughput_ops_per_second(), 0.0);
    }
}
