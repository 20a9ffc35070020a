//! DocBench: document-database request latency benchmarking with
//! overhead decomposition.
//!
//! The engine measures each request and splits it into its cost
//! components (connection, serialization, wire transit, server
//! execution, server traversal, client deserialization, client
//! traversal), so runs can show how much of a request is spent fetching
//! data versus doing everything else. Two reference adapters compare the
//! motivating binary-JSON designs: sequential length-prefixed scanning
//! (`seqscan`) and hash-indexed offset jumps (`hashjump`).

pub mod adapter;
pub mod adapters;
pub mod connection;
pub mod document;
pub mod error;
pub mod executor;
pub mod generator;
pub mod metrics;
pub mod operation;
pub mod random;
pub mod report;
pub mod time;
pub mod workload;
pub mod workloads;

pub use adapter::{AdapterRegistry, Capability, ConnectionConfig, DatabaseAdapter};
pub use connection::InstrumentedConnection;
pub use document::{JsonDocument, JsonMap, JsonValue};
pub use error::{BenchError, BenchResult};
pub use executor::{AdapterResult, BenchmarkExecutor, BenchmarkResult};
pub use generator::DocumentGenerator;
pub use metrics::{MetricsCollector, MetricsSummary, OverheadBreakdown};
pub use operation::{Operation, OperationKind, OperationResult};
pub use random::SeededRng;
pub use time::{Clock, MockClock, SystemClock};
pub use workload::{Workload, WorkloadConfig, WorkloadRegistry};
