//! Reference adapters for the two motivating binary-JSON designs.
//!
//! Both hold their data in process memory so the traversal strategies can
//! be compared without a database server: `seqscan` walks length-prefixed
//! entries in field order, `hashjump` jumps through a hash-sorted offset
//! index. They exercise the full adapter SPI including instrumented
//! connections and overhead decomposition.

pub mod indexed;
pub mod scan;

pub use indexed::{HashJumpAdapter, HASHJUMP_ADAPTER_ID};
pub use scan::{SeqScanAdapter, SEQSCAN_ADAPTER_ID};

use std::any::Any;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::debug;

use crate::adapter::{
    Capability, ConnectionConfig, DatabaseAdapter, TestEnvironmentConfig, ValidationResult,
};
use crate::connection::{ConnectionTimingMetrics, InstrumentedConnection, TimingListener};
use crate::document::{set_value_at_path, JsonMap, JsonValue};
use crate::error::{BenchError, BenchResult};
use crate::metrics::{MetricsCollector, OverheadBreakdown};
use crate::operation::{Operation, OperationKind, OperationResult};
use crate::time::{Clock, SystemClock, TimingContext};

// ────────────────────────────────────────────────────────────────────────────
// Wire format shared by both codecs
// ────────────────────────────────────────────────────────────────────────────

pub(crate) const TAG_NULL: u8 = 0;
pub(crate) const TAG_BOOL: u8 = 1;
pub(crate) const TAG_INT: u8 = 2;
pub(crate) const TAG_FLOAT: u8 = 3;
pub(crate) const TAG_STR: u8 = 4;
pub(crate) const TAG_ARRAY: u8 = 5;
pub(crate) const TAG_OBJECT: u8 = 6;

#[derive(Debug, Error)]
#[error("codec error: {0}")]
pub struct CodecError(pub String);

pub(crate) fn codec_err(message: impl Into<String>) -> CodecError {
    CodecError(message.into())
}

pub(crate) fn read_u16(bytes: &[u8], at: usize) -> Result<u16, CodecError> {
    bytes
        .get(at..at + 2)
        .and_then(|s| s.try_into().ok())
        .map(u16::from_le_bytes)
        .ok_or_else(|| codec_err("truncated document (u16)"))
}

pub(crate) fn read_u32(bytes: &[u8], at: usize) -> Result<u32, CodecError> {
    bytes
        .get(at..at + 4)
        .and_then(|s| s.try_into().ok())
        .map(u32::from_le_bytes)
        .ok_or_else(|| codec_err("truncated document (u32)"))
}

pub(crate) fn read_u64(bytes: &[u8], at: usize) -> Result<u64, CodecError> {
    bytes
        .get(at..at + 8)
        .and_then(|s| s.try_into().ok())
        .map(u64::from_le_bytes)
        .ok_or_else(|| codec_err("truncated document (u64)"))
}

pub(crate) fn read_slice(bytes: &[u8], at: usize, len: usize) -> Result<&[u8], CodecError> {
    bytes
        .get(at..at + len)
        .ok_or_else(|| codec_err("truncated document (slice)"))
}

pub(crate) fn tag_for(value: &JsonValue) -> u8 {
    match value {
        JsonValue::Null => TAG_NULL,
        JsonValue::Bool(_) => TAG_BOOL,
        JsonValue::Int(_) => TAG_INT,
        JsonValue::Float(_) => TAG_FLOAT,
        JsonValue::Str(_) => TAG_STR,
        JsonValue::Array(_) => TAG_ARRAY,
        JsonValue::Object(_) => TAG_OBJECT,
    }
}

/// Encodes a value payload. Scalars and strings are flat; arrays carry a
/// count followed by self-delimited `[tag][len][payload]` elements;
/// objects defer to the codec's own document layout.
pub(crate) fn encode_payload<F>(value: &JsonValue, encode_object: &F) -> Vec<u8>
where
    F: Fn(&JsonMap) -> Vec<u8>,
{
    match value {
        JsonValue::Null => Vec::new(),
        JsonValue::Bool(v) => vec![u8::from(*v)],
        JsonValue::Int(v) => v.to_le_bytes().to_vec(),
        JsonValue::Float(v) => v.to_le_bytes().to_vec(),
        JsonValue::Str(s) => s.as_bytes().to_vec(),
        JsonValue::Array(items) => {
            let mut out = Vec::new();
            out.extend_from_slice(&(items.len() as u32).to_le_bytes());
            for item in items {
                let payload = encode_payload(item, encode_object);
                out.push(tag_for(item));
                out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
                out.extend_from_slice(&payload);
            }
            out
        }
        JsonValue::Object(map) => encode_object(map),
    }
}

/// Decodes a value payload previously written by [`encode_payload`].
pub(crate) fn decode_payload<F>(
    tag: u8,
    payload: &[u8],
    decode_object: &F,
) -> Result<JsonValue, CodecError>
where
    F: Fn(&[u8]) -> Result<JsonMap, CodecError>,
{
    match tag {
        TAG_NULL => Ok(JsonValue::Null),
        TAG_BOOL => match payload.first() {
            Some(b) => Ok(JsonValue::Bool(*b != 0)),
            None => Err(codec_err("empty bool payload")),
        },
        TAG_INT => payload
            .try_into()
            .map(|b| JsonValue::Int(i64::from_le_bytes(b)))
            .map_err(|_| codec_err("bad int payload")),
        TAG_FLOAT => payload
            .try_into()
            .map(|b| JsonValue::Float(f64::from_le_bytes(b)))
            .map_err(|_| codec_err("bad float payload")),
        TAG_STR => String::from_utf8(payload.to_vec())
            .map(JsonValue::Str)
            .map_err(|_| codec_err("invalid utf8 in string payload")),
        TAG_ARRAY => {
            let count = read_u32(payload, 0)? as usize;
            let mut items = Vec::with_capacity(count);
            let mut at = 4;
            for _ in 0..count {
                let tag = *payload
                    .get(at)
                    .ok_or_else(|| codec_err("truncated array element"))?;
                let len = read_u32(payload, at + 1)? as usize;
                let element = read_slice(payload, at + 5, len)?;
                items.push(decode_payload(tag, element, decode_object)?);
                at += 5 + len;
            }
            Ok(JsonValue::Array(items))
        }
        TAG_OBJECT => Ok(JsonValue::Object(decode_object(payload)?)),
        other => Err(codec_err(format!("unknown value tag {other}"))),
    }
}

/// Selects element `index` from an encoded array payload, returning its
/// tag and payload slice.
pub(crate) fn array_element(
    payload: &[u8],
    index: usize,
) -> Result<Option<(u8, &[u8])>, CodecError> {
    let count = read_u32(payload, 0)? as usize;
    if index >= count {
        return Ok(None);
    }
    let mut at = 4;
    for i in 0..count {
        let tag = *payload
            .get(at)
            .ok_or_else(|| codec_err("truncated array element"))?;
        let len = read_u32(payload, at + 1)? as usize;
        if i == index {
            return Ok(Some((tag, read_slice(payload, at + 5, len)?)));
        }
        at += 5 + len;
    }
    Ok(None)
}

// ────────────────────────────────────────────────────────────────────────────
// Codec seam
// ────────────────────────────────────────────────────────────────────────────

/// The format-specific half of a reference adapter: how a document body
/// is laid out in bytes and how a named field is located within it.
pub trait DocumentCodec: Send {
    fn format_name(&self) -> &'static str;

    fn encode(&self, content: &JsonMap) -> Vec<u8>;

    fn decode(&self, bytes: &[u8]) -> Result<JsonMap, CodecError>;

    /// Locates a single field by name in an encoded document, returning
    /// its tag and an owned copy of its payload.
    fn lookup_field(&self, bytes: &[u8], name: &str)
        -> Result<Option<(u8, Vec<u8>)>, CodecError>;

    /// Decodes one value payload in this codec's format.
    fn decode_value(&self, tag: u8, payload: &[u8]) -> Result<JsonValue, CodecError>;

    /// Walks a dotted path (with optional `name[index]` segments) through
    /// the encoded document without decoding anything but the result.
    fn extract_path(&self, bytes: &[u8], path: &str) -> Result<Option<(u8, Vec<u8>)>, CodecError> {
        let mut current: Vec<u8> = bytes.to_vec();
        let mut located: Option<(u8, Vec<u8>)> = None;

        let segments: Vec<&str> = path.split('.').collect();
        for (i, segment) in segments.iter().enumerate() {
            let Some((name, index)) = crate::document::parse_segment(segment) else {
                return Ok(None);
            };
            let Some((mut tag, mut payload)) = self.lookup_field(&current, name)? else {
                return Ok(None);
            };
            if let Some(index) = index {
                if tag != TAG_ARRAY {
                    return Ok(None);
                }
                let Some((element_tag, element)) = array_element(&payload, index)? else {
                    return Ok(None);
                };
                tag = element_tag;
                payload = element.to_vec();
            }
            if i + 1 < segments.len() {
                if tag != TAG_OBJECT {
                    return Ok(None);
                }
                current = payload;
            } else {
                located = Some((tag, payload));
            }
        }
        Ok(located)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Instrumented in-memory connection
// ────────────────────────────────────────────────────────────────────────────

/// Connection handle for the in-memory adapters. Listener callbacks fire
/// synchronously on the executing thread.
pub struct MemoryConnection {
    id: String,
    valid: bool,
    listeners: Vec<Box<dyn TimingListener>>,
    metrics: ConnectionTimingMetrics,
}

impl MemoryConnection {
    fn new(id: String) -> Self {
        Self {
            id,
            valid: true,
            listeners: Vec::new(),
            metrics: ConnectionTimingMetrics::default(),
        }
    }

    fn record_serialization(&mut self, operation_id: &str, elapsed: Duration, bytes: usize) {
        for listener in &mut self.listeners {
            listener.on_serialization_start(operation_id);
            listener.on_serialization_complete(operation_id, bytes);
        }
        self.metrics.serialization_nanos += elapsed.as_nanos() as u64;
        self.metrics.total_bytes_sent += bytes as u64;
        self.metrics.operation_count += 1;
    }

    fn record_deserialization(&mut self, operation_id: &str, elapsed: Duration, fields: usize) {
        for listener in &mut self.listeners {
            listener.on_deserialization_start(operation_id);
            listener.on_deserialization_complete(operation_id, fields);
        }
        self.metrics.deserialization_nanos += elapsed.as_nanos() as u64;
        self.metrics.operation_count += 1;
    }

    fn record_bytes_received(&mut self, operation_id: &str, bytes: usize) {
        for listener in &mut self.listeners {
            listener.on_wire_receive_start(operation_id);
            listener.on_wire_receive_complete(operation_id, bytes);
        }
        self.metrics.total_bytes_received += bytes as u64;
    }
}

impl InstrumentedConnection for MemoryConnection {
    fn connection_id(&self) -> &str {
        &self.id
    }

    fn is_valid(&self) -> bool {
        self.valid
    }

    fn add_timing_listener(&mut self, listener: Box<dyn TimingListener>) {
        self.listeners.push(listener);
    }

    fn timing_metrics(&self) -> ConnectionTimingMetrics {
        self.metrics
    }

    fn reset_timing_metrics(&mut self) {
        self.metrics = ConnectionTimingMetrics::default();
    }

    fn close(&mut self) {
        self.valid = false;
    }

    fn as_any(&mut self) -> &mut dyn Any {
        self
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Generic in-memory adapter over a codec
// ────────────────────────────────────────────────────────────────────────────

/// In-memory [`DatabaseAdapter`] parameterized by the document codec.
/// The store plays the server role; fetch, traversal, and decode times
/// are measured with the injected clock.
pub struct MemoryAdapter<C: DocumentCodec> {
    codec: C,
    adapter_id: &'static str,
    display_name: &'static str,
    capabilities: BTreeSet<Capability>,
    clock: Arc<dyn Clock>,
    collections: HashMap<String, HashMap<String, Vec<u8>>>,
    active_collection: Option<String>,
    connection_counter: u64,
    closed: bool,
}

impl<C: DocumentCodec> MemoryAdapter<C> {
    pub(crate) fn with_parts(
        codec: C,
        adapter_id: &'static str,
        display_name: &'static str,
        capabilities: BTreeSet<Capability>,
    ) -> Self {
        Self {
            codec,
            adapter_id,
            display_name,
            capabilities,
            clock: Arc::new(SystemClock::new()),
            collections: HashMap::new(),
            active_collection: None,
            connection_counter: 0,
            closed: false,
        }
    }

    /// Replaces the clock, letting tests control measured durations.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    fn store(&self) -> BenchResult<&HashMap<String, Vec<u8>>> {
        let name = self
            .active_collection
            .as_deref()
            .ok_or_else(|| BenchError::setup("no active collection; call setup_test_environment"))?;
        self.collections
            .get(name)
            .ok_or_else(|| BenchError::setup(format!("collection `{name}` does not exist")))
    }

    fn store_mut(&mut self) -> BenchResult<&mut HashMap<String, Vec<u8>>> {
        let name = self
            .active_collection
            .clone()
            .ok_or_else(|| BenchError::setup("no active collection; call setup_test_environment"))?;
        self.collections
            .get_mut(&name)
            .ok_or_else(|| BenchError::setup(format!("collection `{name}` does not exist")))
    }

    fn in_band_failure(
        &self,
        operation_id: &str,
        kind: OperationKind,
        total: &TimingContext<'_>,
        message: impl Into<String>,
    ) -> OperationResult {
        OperationResult::failure(
            operation_id,
            kind,
            total.stop(),
            BenchError::operation(operation_id, kind, message),
        )
    }

    fn execute_insert(
        &mut self,
        conn: &mut MemoryConnection,
        operation_id: &str,
        document_id: &str,
        content: &JsonMap,
    ) -> BenchResult<OperationResult> {
        let clock = Arc::clone(&self.clock);
        let total = TimingContext::start(clock.as_ref());

        let serialize = TimingContext::start(clock.as_ref());
        let bytes = self.codec.encode(content);
        let serialization_time = serialize.stop();
        let encoded_len = bytes.len();
        conn.record_serialization(operation_id, serialization_time, encoded_len);

        let write = TimingContext::start(clock.as_ref());
        self.store_mut()?.insert(document_id.to_string(), bytes);
        let write_time = write.stop();

        let total_time = total.stop();
        let breakdown = OverheadBreakdown::builder()
            .total_latency(total_time)
            .serialization_time(serialization_time)
            .server_execution_time(write_time)
            .add_platform_specific(format!("{}.store_write", self.adapter_id), write_time)
            .build();

        Ok(OperationResult::builder(operation_id, OperationKind::Insert)
            .total_duration(total_time)
            .overhead_breakdown(breakdown)
            .metadata("encoded_bytes", encoded_len.to_string())
            .build())
    }

    fn execute_read(
        &mut self,
        conn: &mut MemoryConnection,
        operation_id: &str,
        document_id: &str,
        projection_paths: &[String],
    ) -> BenchResult<OperationResult> {
        let clock = Arc::clone(&self.clock);
        let total = TimingContext::start(clock.as_ref());

        let fetch = TimingContext::start(clock.as_ref());
        let encoded = self.store()?.get(document_id).cloned();
        let fetch_time = fetch.stop();
        let Some(encoded) = encoded else {
            return Ok(self.in_band_failure(
                operation_id,
                OperationKind::Read,
                &total,
                format!("document `{document_id}` not found"),
            ));
        };
        conn.record_bytes_received(operation_id, encoded.len());

        let mut traversal_time = Duration::ZERO;
        let located: Result<Vec<(String, Option<(u8, Vec<u8>)>)>, CodecError> =
            if projection_paths.is_empty() {
                Ok(Vec::new())
            } else {
                // Locate projected fields inside the encoded document.
                // This is where the two formats differ.
                let traversal = TimingContext::start(clock.as_ref());
                let located = projection_paths
                    .iter()
                    .map(|path| {
                        self.codec
                            .extract_path(&encoded, path)
                            .map(|found| (path.clone(), found))
                    })
                    .collect();
                traversal_time = traversal.stop();
                located
            };
        let located = match located {
            Ok(located) => located,
            Err(err) => {
                return Ok(self.in_band_failure(
                    operation_id,
                    OperationKind::Read,
                    &total,
                    err.to_string(),
                ));
            }
        };

        let deserialize = TimingContext::start(clock.as_ref());
        let decoded: Result<JsonMap, CodecError> = if projection_paths.is_empty() {
            self.codec.decode(&encoded)
        } else {
            let mut assembled = JsonMap::new();
            for (path, found) in &located {
                if let Some((tag, payload)) = found {
                    let value = match self.codec.decode_value(*tag, payload) {
                        Ok(value) => value,
                        Err(err) => {
                            return Ok(self.in_band_failure(
                                operation_id,
                                OperationKind::Read,
                                &total,
                                err.to_string(),
                            ));
                        }
                    };
                    assembled.insert(path.clone(), value);
                }
            }
            Ok(assembled)
        };
        let decoded = match decoded {
            Ok(decoded) => decoded,
            Err(err) => {
                return Ok(self.in_band_failure(
                    operation_id,
                    OperationKind::Read,
                    &total,
                    err.to_string(),
                ));
            }
        };
        let deserialization_time = deserialize.stop();
        conn.record_deserialization(operation_id, deserialization_time, decoded.len());

        // Client-side access of the first projected field in the decoded
        // structure.
        let mut client_traversal_time = Duration::ZERO;
        if let Some(first) = projection_paths.first() {
            let client = TimingContext::start(clock.as_ref());
            let _ = decoded.get(first);
            client_traversal_time = client.stop();
        }

        let total_time = total.stop();
        let breakdown = OverheadBreakdown::builder()
            .total_latency(total_time)
            .server_fetch_time(fetch_time)
            .server_traversal_time(traversal_time)
            .server_execution_time(fetch_time + traversal_time)
            .deserialization_time(deserialization_time)
            .client_traversal_time(client_traversal_time)
            .build();

        Ok(OperationResult::builder(operation_id, OperationKind::Read)
            .total_duration(total_time)
            .overhead_breakdown(breakdown)
            .result_data(JsonValue::Object(decoded))
            .metadata("bytes_fetched", encoded.len().to_string())
            .build())
    }

    fn execute_update(
        &mut self,
        conn: &mut MemoryConnection,
        operation_id: &str,
        document_id: &str,
        update_path: &str,
        new_value: &JsonValue,
        upsert: bool,
    ) -> BenchResult<OperationResult> {
        let clock = Arc::clone(&self.clock);
        let total = TimingContext::start(clock.as_ref());

        let execution = TimingContext::start(clock.as_ref());
        let existing = self.store()?.get(document_id).cloned();
        let mut content = match existing {
            Some(bytes) => match self.codec.decode(&bytes) {
                Ok(content) => content,
                Err(err) => {
                    return Ok(self.in_band_failure(
                        operation_id,
                        OperationKind::Update,
                        &total,
                        err.to_string(),
                    ));
                }
            },
            None if upsert => JsonMap::new(),
            None => {
                return Ok(self.in_band_failure(
                    operation_id,
                    OperationKind::Update,
                    &total,
                    format!("document `{document_id}` not found"),
                ));
            }
        };
        set_value_at_path(&mut content, update_path, new_value.clone());
        let execution_time = execution.stop();

        let serialize = TimingContext::start(clock.as_ref());
        let bytes = self.codec.encode(&content);
        let serialization_time = serialize.stop();
        conn.record_serialization(operation_id, serialization_time, bytes.len());
        self.store_mut()?.insert(document_id.to_string(), bytes);

        let total_time = total.stop();
        let breakdown = OverheadBreakdown::builder()
            .total_latency(total_time)
            .serialization_time(serialization_time)
            .server_execution_time(execution_time)
            .build();

        Ok(OperationResult::builder(operation_id, OperationKind::Update)
            .total_duration(total_time)
            .overhead_breakdown(breakdown)
            .build())
    }

    fn execute_delete(
        &mut self,
        operation_id: &str,
        document_id: &str,
    ) -> BenchResult<OperationResult> {
        let clock = Arc::clone(&self.clock);
        let total = TimingContext::start(clock.as_ref());

        let execution = TimingContext::start(clock.as_ref());
        let removed = self.store_mut()?.remove(document_id).is_some();
        let execution_time = execution.stop();

        let total_time = total.stop();
        let breakdown = OverheadBreakdown::builder()
            .total_latency(total_time)
            .server_execution_time(execution_time)
            .build();

        Ok(OperationResult::builder(operation_id, OperationKind::Delete)
            .total_duration(total_time)
            .overhead_breakdown(breakdown)
            .metadata("deleted", removed.to_string())
            .build())
    }

    fn execute_aggregate(
        &mut self,
        operation_id: &str,
        pipeline: &[String],
        explain: bool,
    ) -> BenchResult<OperationResult> {
        let clock = Arc::clone(&self.clock);
        let total = TimingContext::start(clock.as_ref());

        if explain {
            let mut plan = JsonMap::new();
            plan.insert(
                "plan".into(),
                JsonValue::Str(format!("{} full collection scan", self.codec.format_name())),
            );
            plan.insert("stages".into(), JsonValue::Int(pipeline.len() as i64));
            let total_time = total.stop();
            let breakdown = OverheadBreakdown::builder().total_latency(total_time).build();
            return Ok(
                OperationResult::builder(operation_id, OperationKind::Aggregate)
                    .total_duration(total_time)
                    .overhead_breakdown(breakdown)
                    .result_data(JsonValue::Object(plan))
                    .build(),
            );
        }

        match pipeline.first().map(String::as_str) {
            None | Some("count") => {
                let execution = TimingContext::start(clock.as_ref());
                let count = self.store()?.len() as i64;
                let execution_time = execution.stop();
                let total_time = total.stop();
                let breakdown = OverheadBreakdown::builder()
                    .total_latency(total_time)
                    .server_execution_time(execution_time)
                    .build();
                Ok(
                    OperationResult::builder(operation_id, OperationKind::Aggregate)
                        .total_duration(total_time)
                        .overhead_breakdown(breakdown)
                        .result_data(JsonValue::Int(count))
                        .build(),
                )
            }
            Some(stage) => Ok(self.in_band_failure(
                operation_id,
                OperationKind::Aggregate,
                &total,
                format!("unsupported pipeline stage `{stage}`"),
            )),
        }
    }
}

impl<C: DocumentCodec> DatabaseAdapter for MemoryAdapter<C> {
    fn adapter_id(&self) -> &str {
        self.adapter_id
    }

    fn display_name(&self) -> &str {
        self.display_name
    }

    fn capabilities(&self) -> &BTreeSet<Capability> {
        &self.capabilities
    }

    fn connect(
        &mut self,
        config: &ConnectionConfig,
    ) -> BenchResult<Box<dyn InstrumentedConnection>> {
        if self.closed {
            return Err(BenchError::connection(self.adapter_id, "adapter is closed"));
        }
        if let Some(uri) = config.uri() {
            if !uri.starts_with("mem://") {
                return Err(BenchError::connection(
                    self.adapter_id,
                    format!("unsupported connection URI `{uri}` (expected mem://...)"),
                ));
            }
        }
        self.connection_counter += 1;
        let id = format!("{}-conn-{}", self.adapter_id, self.connection_counter);
        debug!(adapter = self.adapter_id, connection = %id, "opened connection");
        Ok(Box::new(MemoryConnection::new(id)))
    }

    fn execute(
        &mut self,
        conn: &mut dyn InstrumentedConnection,
        operation: &Operation,
        _collector: &MetricsCollector,
    ) -> BenchResult<OperationResult> {
        if !conn.is_valid() {
            return Err(BenchError::operation(
                operation.operation_id(),
                operation.kind(),
                "connection is closed",
            ));
        }
        let conn = conn
            .as_any()
            .downcast_mut::<MemoryConnection>()
            .ok_or_else(|| {
                BenchError::operation(
                    operation.operation_id(),
                    operation.kind(),
                    "connection was not opened by this adapter",
                )
            })?;

        match operation {
            Operation::Insert {
                operation_id,
                document,
            } => self.execute_insert(conn, operation_id, document.id(), document.content()),
            Operation::Read {
                operation_id,
                document_id,
                projection_paths,
                ..
            } => self.execute_read(conn, operation_id, document_id, projection_paths),
            Operation::Update {
                operation_id,
                document_id,
                update_path,
                new_value,
                upsert,
            } => self.execute_update(
                conn,
                operation_id,
                document_id,
                update_path,
                new_value,
                *upsert,
            ),
            Operation::Delete {
                operation_id,
                document_id,
            } => self.execute_delete(operation_id, document_id),
            Operation::Aggregate {
                operation_id,
                pipeline,
                explain,
            } => self.execute_aggregate(operation_id, pipeline, *explain),
        }
    }

    fn overhead_breakdown(&self, result: &OperationResult) -> OverheadBreakdown {
        result
            .overhead_breakdown()
            .cloned()
            .unwrap_or_default()
    }

    fn setup_test_environment(&mut self, config: &TestEnvironmentConfig) -> BenchResult<()> {
        if self.closed {
            return Err(BenchError::setup("adapter is closed"));
        }
        let name = config.collection_name().to_string();
        if config.drop_existing() {
            self.collections.remove(&name);
        }
        self.collections.entry(name.clone()).or_default();
        self.active_collection = Some(name);
        Ok(())
    }

    fn teardown_test_environment(&mut self) -> BenchResult<()> {
        if let Some(name) = self.active_collection.take() {
            self.collections.remove(&name);
        }
        Ok(())
    }

    fn validate_config(&self, config: &ConnectionConfig) -> ValidationResult {
        match config.uri() {
            Some(uri) if !uri.starts_with("mem://") => {
                ValidationResult::failure("uri", format!("unsupported scheme in `{uri}`"))
            }
            _ => ValidationResult::success(),
        }
    }

    fn close(&mut self) {
        self.collections.clear();
        self.active_collection = None;
        self.closed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc as StdArc;

    struct CountingListener {
        serializations: StdArc<AtomicUsize>,
    }

    impl TimingListener for CountingListener {
        fn on_serialization_complete(&mut self, _operation_id: &str, _bytes: usize) {
            self.serializations.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn connection_close_is_idempotent() {
        let mut conn = MemoryConnection::new("c-1".into());
        assert!(conn.is_valid());
        conn.close();
        assert!(!conn.is_valid());
        conn.close();
        assert!(!conn.is_valid());
    }

    #[test]
    fn connection_accumulates_and_resets_timing() {
        let mut conn = MemoryConnection::new("c-1".into());
        conn.record_serialization("op-1", Duration::from_nanos(100), 64);
        conn.record_deserialization("op-1", Duration::from_nanos(40), 7);
        conn.record_bytes_received("op-1", 128);

        let metrics = conn.timing_metrics();
        assert_eq!(metrics.serialization_nanos, 100);
        assert_eq!(metrics.deserialization_nanos, 40);
        assert_eq!(metrics.total_bytes_sent, 64);
        assert_eq!(metrics.total_bytes_received, 128);
        assert_eq!(metrics.operation_count, 2);

        conn.reset_timing_metrics();
        assert_eq!(conn.timing_metrics(), ConnectionTimingMetrics::default());
    }

    #[test]
    fn listeners_fire_on_protocol_boundaries() {
        let serializations = StdArc::new(AtomicUsize::new(0));
        let mut conn = MemoryConnection::new("c-1".into());
        conn.add_timing_listener(Box::new(CountingListener {
            serializations: StdArc::clone(&serializations),
        }));
        conn.record_serialization("op-1", Duration::from_nanos(10), 16);
        conn.record_serialization("op-2", Duration::from_nanos(10), 16);
        assert_eq!(serializations.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn aggregate_count_and_explain() {
        let mut adapter = crate::adapters::SeqScanAdapter::new();
        let mut conn = testing::open(&mut adapter);
        let collector = MetricsCollector::new();

        let count = Operation::aggregate("agg-1", vec!["count".into()], false);
        let result = adapter.execute(conn.as_mut(), &count, &collector).unwrap();
        assert!(result.is_success());
        assert_eq!(result.result_data().unwrap().as_int(), Some(0));

        let explain = Operation::aggregate("agg-2", vec!["count".into()], true);
        let result = adapter.execute(conn.as_mut(), &explain, &collector).unwrap();
        assert!(result.is_success());
        assert!(result.result_data().unwrap().as_object().unwrap().contains_key("plan"));

        let unsupported = Operation::aggregate("agg-3", vec!["group".into()], false);
        let result = adapter
            .execute(conn.as_mut(), &unsupported, &collector)
            .unwrap();
        assert!(result.is_failure());
    }

    #[test]
    fn upsert_creates_missing_documents() {
        let mut adapter = crate::adapters::HashJumpAdapter::new();
        let mut conn = testing::open(&mut adapter);
        let collector = MetricsCollector::new();

        let update = Operation::update(
            "u-1",
            "fresh-doc",
            "profile.tier",
            JsonValue::Str("GOLD".into()),
            true,
        );
        let result = adapter.execute(conn.as_mut(), &update, &collector).unwrap();
        assert!(result.is_success());

        let read = Operation::read_with_projection(
            "r-1",
            "fresh-doc",
            vec!["profile.tier".to_string()],
        );
        let result = adapter.execute(conn.as_mut(), &read, &collector).unwrap();
        let JsonValue::Object(projected) = result.result_data().unwrap() else {
            panic!("expected object");
        };
        assert_eq!(
            projected.get("profile.tier"),
            Some(&JsonValue::Str("GOLD".into()))
        );
    }
}
