//! Instrumented connection SPI: timing hooks at protocol boundaries.

use std::any::Any;

/// Callback interface for fine-grained timing capture. Listeners fire on
/// the thread driving the protocol boundary, which may be a driver I/O
/// thread; recordings they make must complete before the operation result
/// is returned.
#[allow(unused_variables)]
pub trait TimingListener: Send {
    fn on_serialization_start(&mut self, operation_id: &str) {}
    fn on_serialization_complete(&mut self, operation_id: &str, bytes_serialized: usize) {}
    fn on_wire_transmit_start(&mut self, operation_id: &str) {}
    fn on_wire_transmit_complete(&mut self, operation_id: &str, bytes_sent: usize) {}
    fn on_wire_receive_start(&mut self, operation_id: &str) {}
    fn on_wire_receive_complete(&mut self, operation_id: &str, bytes_received: usize) {}
    fn on_deserialization_start(&mut self, operation_id: &str) {}
    fn on_deserialization_complete(&mut self, operation_id: &str, fields_deserialized: usize) {}
}

/// Timing totals accumulated by a connection since its last reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectionTimingMetrics {
    pub serialization_nanos: u64,
    pub wire_transmit_nanos: u64,
    pub wire_receive_nanos: u64,
    pub deserialization_nanos: u64,
    pub total_bytes_sent: u64,
    pub total_bytes_received: u64,
    pub operation_count: u64,
}

impl ConnectionTimingMetrics {
    pub fn merge(&self, other: &ConnectionTimingMetrics) -> ConnectionTimingMetrics {
        ConnectionTimingMetrics {
            serialization_nanos: self.serialization_nanos + other.serialization_nanos,
            wire_transmit_nanos: self.wire_transmit_nanos + other.wire_transmit_nanos,
            wire_receive_nanos: self.wire_receive_nanos + other.wire_receive_nanos,
            deserialization_nanos: self.deserialization_nanos + other.deserialization_nanos,
            total_bytes_sent: self.total_bytes_sent + other.total_bytes_sent,
            total_bytes_received: self.total_bytes_received + other.total_bytes_received,
            operation_count: self.operation_count + other.operation_count,
        }
    }
}

/// An owned, scoped connection handle with instrumentation hooks.
///
/// One connection per adapter per workload execution: acquired in setup,
/// closed in cleanup, never shared across workloads. `close` must be
/// idempotent.
pub trait InstrumentedConnection {
    /// Identifier for correlating timing events.
    fn connection_id(&self) -> &str;

    fn is_valid(&self) -> bool;

    fn add_timing_listener(&mut self, listener: Box<dyn TimingListener>);

    /// Timing totals accumulated since the last reset.
    fn timing_metrics(&self) -> ConnectionTimingMetrics;

    fn reset_timing_metrics(&mut self);

    /// Closes the connection; repeated calls are no-ops.
    fn close(&mut self);

    /// Adapter-private access to the concrete connection type.
    fn as_any(&mut self) -> &mut dyn Any;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timing_metrics_merge() {
        let a = ConnectionTimingMetrics {
            serialization_nanos: 10,
            wire_transmit_nanos: 20,
            total_bytes_sent: 128,
            operation_count: 1,
            ..Default::default()
        };
        let b = ConnectionTimingMetrics {
            serialization_nanos: 5,
            deserialization_nanos: 7,
            total_bytes_received: 256,
            operation_count: 2,
            ..Default::default()
        };
        let merged = a.merge(&b);
        assert_eq!(merged.serialization_nanos, 15);
        assert_eq!(merged.wire_transmit_nanos, 20);
        assert_eq!(merged.deserialization_nanos, 7);
        assert_eq!(merged.total_bytes_sent, 128);
        assert_eq!(merged.total_bytes_received, 256);
        assert_eq!(merged.operation_count, 3);
    }
}
