//! Sequential-scan reference adapter.
//!
//! Documents encode as a field count followed by length-prefixed entries
//! in insertion order. Field lookup walks entries front to back, so the
//! cost of reaching a field grows with its position. That position
//! sensitivity is the behavior the traverse workload quantifies.

use std::collections::BTreeSet;

use crate::adapter::Capability;
use crate::document::{JsonMap, JsonValue};

use super::{
    codec_err, decode_payload, encode_payload, read_slice, read_u16, read_u32, tag_for,
    CodecError, DocumentCodec, MemoryAdapter,
};

pub const SEQSCAN_ADAPTER_ID: &str = "seqscan";

/// Length-prefixed sequential codec.
///
/// Layout: `[u32 field_count]` then per field
/// `[u16 name_len][name][u8 tag][u32 value_len][payload]`. Nested objects
/// repeat the layout inside their payload.
#[derive(Debug, Default)]
pub struct ScanCodec;

impl ScanCodec {
    fn encode_object(content: &JsonMap) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&(content.len() as u32).to_le_bytes());
        for (name, value) in content {
            let payload = encode_payload(value, &Self::encode_object);
            out.extend_from_slice(&(name.len() as u16).to_le_bytes());
            out.extend_from_slice(name.as_bytes());
            out.push(tag_for(value));
            out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
            out.extend_from_slice(&payload);
        }
        out
    }

    fn decode_object(bytes: &[u8]) -> Result<JsonMap, CodecError> {
        let field_count = read_u32(bytes, 0)? as usize;
        let mut map = JsonMap::with_capacity(field_count);
        let mut at = 4;
        for _ in 0..field_count {
            let name_len = read_u16(bytes, at)? as usize;
            let name = std::str::from_utf8(read_slice(bytes, at + 2, name_len)?)
                .map_err(|_| codec_err("invalid utf8 in field name"))?
                .to_string();
            at += 2 + name_len;
            let tag = *bytes.get(at).ok_or_else(|| codec_err("truncated entry"))?;
            let value_len = read_u32(bytes, at + 1)? as usize;
            let payload = read_slice(bytes, at + 5, value_len)?;
            map.insert(name, decode_payload(tag, payload, &Self::decode_object)?);
            at += 5 + value_len;
        }
        Ok(map)
    }

    /// Walks entries in order until the name matches, skipping value
    /// payloads by their length prefix.
    fn scan_for(bytes: &[u8], name: &str) -> Result<Option<(u8, Vec<u8>)>, CodecError> {
        let field_count = read_u32(bytes, 0)? as usize;
        let mut at = 4;
        for _ in 0..field_count {
            let name_len = read_u16(bytes, at)? as usize;
            let entry_name = read_slice(bytes, at + 2, name_len)?;
            at += 2 + name_len;
            let tag = *bytes.get(at).ok_or_else(|| codec_err("truncated entry"))?;
            let value_len = read_u32(bytes, at + 1)? as usize;
            if entry_name == name.as_bytes() {
                return Ok(Some((tag, read_slice(bytes, at + 5, value_len)?.to_vec())));
            }
            at += 5 + value_len;
        }
        Ok(None)
    }
}

impl DocumentCodec for ScanCodec {
    fn format_name(&self) -> &'static str {
        "seqscan"
    }

    fn encode(&self, content: &JsonMap) -> Vec<u8> {
        Self::encode_object(content)
    }

    fn decode(&self, bytes: &[u8]) -> Result<JsonMap, CodecError> {
        Self::decode_object(bytes)
    }

    fn lookup_field(
        &self,
        bytes: &[u8],
        name: &str,
    ) -> Result<Option<(u8, Vec<u8>)>, CodecError> {
        Self::scan_for(bytes, name)
    }

    fn decode_value(&self, tag: u8, payload: &[u8]) -> Result<JsonValue, CodecError> {
        decode_payload(tag, payload, &Self::decode_object)
    }
}

/// In-memory adapter over the sequential-scan format.
pub type SeqScanAdapter = MemoryAdapter<ScanCodec>;

impl SeqScanAdapter {
    pub fn new() -> Self {
        let capabilities: BTreeSet<Capability> = [
            Capability::NestedDocumentAccess,
            Capability::ArrayIndexAccess,
            Capability::PartialDocumentRetrieval,
            Capability::BulkInsert,
            Capability::SingleDocumentAtomicity,
            Capability::ClientTimingHooks,
            Capability::DeserializationMetrics,
        ]
        .into_iter()
        .collect();
        MemoryAdapter::with_parts(
            ScanCodec,
            SEQSCAN_ADAPTER_ID,
            "Sequential Scan (length-prefixed)",
            capabilities,
        )
    }
}

impl Default for SeqScanAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing;
    use super::*;
    use crate::adapter::DatabaseAdapter;

    #[test]
    fn codec_round_trips_nested_content() {
        let doc = testing::nested_document();
        let codec = ScanCodec;
        let bytes = codec.encode(doc.content());
        let decoded = codec.decode(&bytes).unwrap();
        assert_eq!(&decoded, doc.content());
        // Insertion order survives the round trip.
        let original: Vec<&String> = doc.content().keys().collect();
        let restored: Vec<&String> = decoded.keys().collect();
        assert_eq!(original, restored);
    }

    #[test]
    fn scan_locates_fields_by_walking_entries() {
        let doc = testing::nested_document();
        let codec = ScanCodec;
        let bytes = codec.encode(doc.content());

        let (tag, payload) = codec
            .extract_path(&bytes, "nested.nested.nested.target")
            .unwrap()
            .unwrap();
        assert_eq!(
            codec.decode_value(tag, &payload).unwrap(),
            JsonValue::Str("TARGET_VALUE".into())
        );
        assert!(codec.extract_path(&bytes, "no.such.path").unwrap().is_none());
        assert!(codec.extract_path(&bytes, "items[99]").unwrap().is_none());
    }

    #[test]
    fn adapter_round_trip() {
        let mut adapter = SeqScanAdapter::new();
        testing::exercise_round_trip(&mut adapter);
    }

    #[test]
    fn adapter_projection() {
        let mut adapter = SeqScanAdapter::new();
        testing::exercise_projection(&mut adapter);
    }

    #[test]
    fn adapter_update_and_delete() {
        let mut adapter = SeqScanAdapter::new();
        testing::exercise_update_and_delete(&mut adapter);
    }

    #[test]
    fn adapter_reports_missing_documents_in_band() {
        let mut adapter = SeqScanAdapter::new();
        testing::exercise_missing_document(&mut adapter);
    }

    #[test]
    fn close_is_idempotent() {
        let mut adapter = SeqScanAdapter::new();
        adapter.close();
        adapter.close();
        assert!(adapter
            .connect(&crate::adapter::ConnectionConfig::builder().build())
            .is_err());
    }
}
