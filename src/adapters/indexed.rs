//! Hash-indexed reference adapter.
//!
//! Documents carry a hash-sorted offset index ahead of the field
//! directory, so a lookup binary-searches the index and jumps straight to
//! the value bytes instead of walking every preceding entry.

use std::collections::BTreeSet;

use crate::adapter::Capability;
use crate::document::{JsonMap, JsonValue};

use super::{
    codec_err, decode_payload, encode_payload, read_slice, read_u16, read_u32, read_u64, tag_for,
    CodecError, DocumentCodec, MemoryAdapter,
};

pub const HASHJUMP_ADAPTER_ID: &str = "hashjump";

const INDEX_ENTRY_LEN: usize = 12; // u64 hash + u32 directory offset
const HEADER_LEN: usize = 4;

/// FNV-1a; stable across platforms, which keeps encoded documents
/// byte-identical between runs.
fn fnv1a(name: &str) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in name.as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

/// Hash-indexed offset codec.
///
/// Layout: `[u32 field_count]`, a hash index of `field_count` entries
/// `[u64 name_hash][u32 directory_offset]` sorted by hash, a directory in
/// insertion order of `[u16 name_len][name][u8 tag][u32 value_offset]
/// [u32 value_len]`, then the value payloads. Value offsets are relative
/// to the start of the values region.
#[derive(Debug, Default)]
pub struct HashJumpCodec;

impl HashJumpCodec {
    fn encode_object(content: &JsonMap) -> Vec<u8> {
        let field_count = content.len();

        let mut payloads: Vec<Vec<u8>> = Vec::with_capacity(field_count);
        let mut directory = Vec::new();
        let mut directory_offsets = Vec::with_capacity(field_count);
        let mut value_offset = 0u32;
        for (name, value) in content {
            let payload = encode_payload(value, &Self::encode_object);
            directory_offsets.push(directory.len() as u32);
            directory.extend_from_slice(&(name.len() as u16).to_le_bytes());
            directory.extend_from_slice(name.as_bytes());
            directory.push(tag_for(value));
            directory.extend_from_slice(&value_offset.to_le_bytes());
            directory.extend_from_slice(&(payload.len() as u32).to_le_bytes());
            value_offset += payload.len() as u32;
            payloads.push(payload);
        }

        let mut index: Vec<(u64, u32)> = content
            .keys()
            .zip(directory_offsets)
            .map(|(name, offset)| (fnv1a(name), offset))
            .collect();
        index.sort_unstable();

        let mut out =
            Vec::with_capacity(HEADER_LEN + field_count * INDEX_ENTRY_LEN + directory.len());
        out.extend_from_slice(&(field_count as u32).to_le_bytes());
        for (hash, offset) in index {
            out.extend_from_slice(&hash.to_le_bytes());
            out.extend_from_slice(&offset.to_le_bytes());
        }
        out.extend_from_slice(&directory);
        for payload in payloads {
            out.extend_from_slice(&payload);
        }
        out
    }

    /// (directory start, values start) for an encoded document.
    fn regions(bytes: &[u8]) -> Result<(usize, usize), CodecError> {
        let field_count = read_u32(bytes, 0)? as usize;
        let directory_start = HEADER_LEN + field_count * INDEX_ENTRY_LEN;
        let mut at = directory_start;
        for _ in 0..field_count {
            let name_len = read_u16(bytes, at)? as usize;
            at += 2 + name_len + 1 + 8;
        }
        Ok((directory_start, at))
    }

    fn read_directory_entry<'a>(
        bytes: &'a [u8],
        entry_at: usize,
    ) -> Result<(&'a [u8], u8, u32, u32), CodecError> {
        let name_len = read_u16(bytes, entry_at)? as usize;
        let name = read_slice(bytes, entry_at + 2, name_len)?;
        let tag_at = entry_at + 2 + name_len;
        let tag = *bytes.get(tag_at).ok_or_else(|| codec_err("truncated directory"))?;
        let value_offset = read_u32(bytes, tag_at + 1)?;
        let value_len = read_u32(bytes, tag_at + 5)?;
        Ok((name, tag, value_offset, value_len))
    }

    fn decode_object(bytes: &[u8]) -> Result<JsonMap, CodecError> {
        let field_count = read_u32(bytes, 0)? as usize;
        let (directory_start, values_start) = Self::regions(bytes)?;
        let mut map = JsonMap::with_capacity(field_count);
        let mut at = directory_start;
        for _ in 0..field_count {
            let (name, tag, value_offset, value_len) = Self::read_directory_entry(bytes, at)?;
            let name = std::str::from_utf8(name)
                .map_err(|_| codec_err("invalid utf8 in field name"))?
                .to_string();
            let name_len = name.len();
            let payload =
                read_slice(bytes, values_start + value_offset as usize, value_len as usize)?;
            map.insert(name, decode_payload(tag, payload, &Self::decode_object)?);
            at += 2 + name_len + 1 + 8;
        }
        Ok(map)
    }

    /// Binary search on the hash index, then a single jump into the
    /// values region. Hash collisions fall through to neighbor probing.
    fn jump_to(bytes: &[u8], name: &str) -> Result<Option<(u8, Vec<u8>)>, CodecError> {
        let field_count = read_u32(bytes, 0)? as usize;
        if field_count == 0 {
            return Ok(None);
        }
        let (directory_start, values_start) = Self::regions(bytes)?;
        let target = fnv1a(name);

        let hash_at = |i: usize| read_u64(bytes, HEADER_LEN + i * INDEX_ENTRY_LEN);

        let mut lo = 0usize;
        let mut hi = field_count;
        while lo < hi {
            let mid = (lo + hi) / 2;
            if hash_at(mid)? < target {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }

        // Probe every index entry with a matching hash.
        let mut i = lo;
        while i < field_count && hash_at(i)? == target {
            let dir_offset = read_u32(bytes, HEADER_LEN + i * INDEX_ENTRY_LEN + 8)? as usize;
            let (entry_name, tag, value_offset, value_len) =
                Self::read_directory_entry(bytes, directory_start + dir_offset)?;
            if entry_name == name.as_bytes() {
                let payload =
                    read_slice(bytes, values_start + value_offset as usize, value_len as usize)?;
                return Ok(Some((tag, payload.to_vec())));
            }
            i += 1;
        }
        Ok(None)
    }
}

impl DocumentCodec for HashJumpCodec {
    fn format_name(&self) -> &'static str {
        "hashjump"
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
        Self::jump_to(bytes, name)
    }

    fn decode_value(&self, tag: u8, payload: &[u8]) -> Result<JsonValue, CodecError> {
        decode_payload(tag, payload, &Self::decode_object)
    }
}

/// In-memory adapter over the hash-indexed format.
pub type HashJumpAdapter = MemoryAdapter<HashJumpCodec>;

impl HashJumpAdapter {
    pub fn new() -> Self {
        let capabilities: BTreeSet<Capability> = [
            Capability::NestedDocumentAccess,
            Capability::ArrayIndexAccess,
            Capability::PartialDocumentRetrieval,
            Capability::BulkInsert,
            Capability::SingleDocumentAtomicity,
            Capability::ServerExecutionTime,
            Capability::ServerTraversalTime,
            Capability::ExplainPlan,
            Capability::Profiling,
            Capability::ClientTimingHooks,
            Capability::DeserializationMetrics,
        ]
        .into_iter()
        .collect();
        MemoryAdapter::with_parts(
            HashJumpCodec,
            HASHJUMP_ADAPTER_ID,
            "Hash-Indexed Jump (offset directory)",
            capabilities,
        )
    }
}

impl Default for HashJumpAdapter {
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
        let codec = HashJumpCodec;
        let bytes = codec.encode(doc.content());
        let decoded = codec.decode(&bytes).unwrap();
        assert_eq!(&decoded, doc.content());
        // The directory keeps insertion order even though the hash index
        // is sorted.
        let original: Vec<&String> = doc.content().keys().collect();
        let restored: Vec<&String> = decoded.keys().collect();
        assert_eq!(original, restored);
    }

    #[test]
    fn jump_finds_every_field() {
        let doc = testing::nested_document();
        let codec = HashJumpCodec;
        let bytes = codec.encode(doc.content());
        for name in doc.content().keys() {
            assert!(
                codec.lookup_field(&bytes, name).unwrap().is_some(),
                "field {name} not found via hash index"
            );
        }
        assert!(codec.lookup_field(&bytes, "absent_field").unwrap().is_none());
    }

    #[test]
    fn jump_resolves_deep_paths() {
        let doc = testing::nested_document();
        let codec = HashJumpCodec;
        let bytes = codec.encode(doc.content());
        let (tag, payload) = codec
            .extract_path(&bytes, "nested.nested.nested.target")
            .unwrap()
            .unwrap();
        assert_eq!(
            codec.decode_value(tag, &payload).unwrap(),
            JsonValue::Str("TARGET_VALUE".into())
        );
    }

    #[test]
    fn both_codecs_agree_on_extraction() {
        let doc = testing::nested_document();
        let scan = super::super::scan::ScanCodec;
        let jump = HashJumpCodec;
        let scan_bytes = scan.encode(doc.content());
        let jump_bytes = jump.encode(doc.content());
        for path in ["_id", "field_003", "nested.field_2", "items[1].sku"] {
            let a = scan
                .extract_path(&scan_bytes, path)
                .unwrap()
                .map(|(tag, payload)| scan.decode_value(tag, &payload).unwrap());
            let b = jump
                .extract_path(&jump_bytes, path)
                .unwrap()
                .map(|(tag, payload)| jump.decode_value(tag, &payload).unwrap());
            assert_eq!(a, b, "divergence at {path}");
        }
    }

    #[test]
    fn adapter_round_trip() {
        let mut adapter = HashJumpAdapter::new();
        testing::exercise_round_trip(&mut adapter);
    }

    #[test]
    fn adapter_projection() {
        let mut adapter = HashJumpAdapter::new();
        testing::exercise_projection(&mut adapter);
    }

    #[test]
    fn adapter_update_and_delete() {
        let mut adapter = HashJumpAdapter::new();
        testing::exercise_update_and_delete(&mut adapter);
    }

    #[test]
    fn adapter_reports_missing_documents_in_band() {
        let mut adapter = HashJumpAdapter::new();
        testing::exercise_missing_document(&mut adapter);
    }

    #[test]
    fn advertises_server_traversal_timing() {
        let adapter = HashJumpAdapter::new();
        assert!(adapter.has_capability(Capability::ServerTraversalTime));
        let scan_adapter = super::super::scan::SeqScanAdapter::new();
        assert!(!scan_adapter.has_capability(Capability::ServerTraversalTime));
    }
}
