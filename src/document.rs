//! In-memory JSON document representation.
//!
//! Field insertion order is preserved (`IndexMap`), because traversal cost
//! in length-prefixed formats depends on field position and the benchmark
//! has to be able to observe it.

use indexmap::IndexMap;
use serde::Serialize;

pub type JsonMap = IndexMap<String, JsonValue>;

/// A JSON value: scalars, ordered arrays, and order-preserving objects.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum JsonValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Array(Vec<JsonValue>),
    Object(JsonMap),
}

impl JsonValue {
    pub fn as_object(&self) -> Option<&JsonMap> {
        match self {
            JsonValue::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_object_mut(&mut self) -> Option<&mut JsonMap> {
        match self {
            JsonValue::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[JsonValue]> {
        match self {
            JsonValue::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            JsonValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            JsonValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Estimated wire size in bytes: 4 per value of overhead, strings as
    /// `2*len + 4` (UTF-16 approximation), numbers 8, booleans 1,
    /// containers 4 plus their recursive contents.
    pub fn estimated_size_bytes(&self) -> usize {
        match self {
            JsonValue::Null => 4,
            JsonValue::Bool(_) => 1,
            JsonValue::Int(_) | JsonValue::Float(_) => 8,
            JsonValue::Str(s) => s.len() * 2 + 4,
            JsonValue::Array(items) => {
                4 + items.iter().map(JsonValue::estimated_size_bytes).sum::<usize>()
            }
            JsonValue::Object(map) => {
                4 + map
                    .iter()
                    .map(|(k, v)| k.len() * 2 + 4 + v.estimated_size_bytes())
                    .sum::<usize>()
            }
        }
    }
}

impl From<bool> for JsonValue {
    fn from(v: bool) -> Self {
        JsonValue::Bool(v)
    }
}

impl From<i32> for JsonValue {
    fn from(v: i32) -> Self {
        JsonValue::Int(v as i64)
    }
}

impl From<i64> for JsonValue {
    fn from(v: i64) -> Self {
        JsonValue::Int(v)
    }
}

impl From<f64> for JsonValue {
    fn from(v: f64) -> Self {
        JsonValue::Float(v)
    }
}

impl From<&str> for JsonValue {
    fn from(v: &str) -> Self {
        JsonValue::Str(v.to_string())
    }
}

impl From<String> for JsonValue {
    fn from(v: String) -> Self {
        JsonValue::Str(v)
    }
}

impl From<Vec<JsonValue>> for JsonValue {
    fn from(v: Vec<JsonValue>) -> Self {
        JsonValue::Array(v)
    }
}

impl From<JsonMap> for JsonValue {
    fn from(v: JsonMap) -> Self {
        JsonValue::Object(v)
    }
}

/// One path segment: a field name with an optional `[index]` suffix.
/// Returns `None` for malformed segments.
pub(crate) fn parse_segment(segment: &str) -> Option<(&str, Option<usize>)> {
    match segment.find('[') {
        None => Some((segment, None)),
        Some(open) => {
            let close = segment.find(']')?;
            if close != segment.len() - 1 || close <= open + 1 {
                return None;
            }
            let index: usize = segment[open + 1..close].parse().ok()?;
            Some((&segment[..open], Some(index)))
        }
    }
}

/// A benchmark document: an external id plus order-preserving content.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JsonDocument {
    id: String,
    content: JsonMap,
}

impl JsonDocument {
    pub fn new(id: impl Into<String>, content: JsonMap) -> Self {
        Self {
            id: id.into(),
            content,
        }
    }

    pub fn builder(id: impl Into<String>) -> JsonDocumentBuilder {
        JsonDocumentBuilder {
            id: id.into(),
            content: JsonMap::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn content(&self) -> &JsonMap {
        &self.content
    }

    /// Value at a dotted path with optional `name[index]` array access,
    /// e.g. `customer.addresses[1].zip`. Any broken link yields `None`.
    pub fn get_path(&self, path: &str) -> Option<&JsonValue> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        let (name, index) = parse_segment(first)?;
        let mut current = step(self.content.get(name)?, index)?;
        for segment in segments {
            let (name, index) = parse_segment(segment)?;
            let next = current.as_object()?.get(name)?;
            current = step(next, index)?;
        }
        Some(current)
    }

    pub fn has_path(&self, path: &str) -> bool {
        self.get_path(path).is_some()
    }

    pub fn estimated_size_bytes(&self) -> usize {
        4 + self
            .content
            .iter()
            .map(|(k, v)| k.len() * 2 + 4 + v.estimated_size_bytes())
            .sum::<usize>()
    }
}

fn step(value: &JsonValue, index: Option<usize>) -> Option<&JsonValue> {
    match index {
        None => Some(value),
        Some(i) => value.as_array()?.get(i),
    }
}

/// Sets `value` at a dotted path, auto-creating objects and extending
/// arrays. Intermediate array slots fill with empty objects, trailing
/// array padding with null. Malformed segments leave the map untouched.
pub fn set_value_at_path(content: &mut JsonMap, path: &str, value: JsonValue) {
    let segments: Vec<&str> = path.split('.').collect();
    let mut current = content;

    for segment in &segments[..segments.len() - 1] {
        let Some((name, index)) = parse_segment(segment) else {
            return;
        };
        match index {
            Some(index) => {
                let entry = current
                    .entry(name.to_string())
                    .or_insert_with(|| JsonValue::Array(Vec::new()));
                if !matches!(entry, JsonValue::Array(_)) {
                    *entry = JsonValue::Array(Vec::new());
                }
                let JsonValue::Array(array) = entry else {
                    unreachable!()
                };
                while array.len() <= index {
                    array.push(JsonValue::Object(JsonMap::new()));
                }
                if !matches!(array[index], JsonValue::Object(_)) {
                    array[index] = JsonValue::Object(JsonMap::new());
                }
                let JsonValue::Object(map) = &mut array[index] else {
                    unreachable!()
                };
                current = map;
            }
            None => {
                let entry = current
                    .entry(name.to_string())
                    .or_insert_with(|| JsonValue::Object(JsonMap::new()));
                if !matches!(entry, JsonValue::Object(_)) {
                    *entry = JsonValue::Object(JsonMap::new());
                }
                let JsonValue::Object(map) = entry else {
                    unreachable!()
                };
                current = map;
            }
        }
    }

    let Some((name, index)) = parse_segment(segments[segments.len() - 1]) else {
        return;
    };
    match index {
        Some(index) => {
            let entry = current
                .entry(name.to_string())
                .or_insert_with(|| JsonValue::Array(Vec::new()));
            if !matches!(entry, JsonValue::Array(_)) {
                *entry = JsonValue::Array(Vec::new());
            }
            let JsonValue::Array(array) = entry else {
                unreachable!()
            };
            while array.len() <= index {
                array.push(JsonValue::Null);
            }
            array[index] = value;
        }
        None => {
            current.insert(name.to_string(), value);
        }
    }
}

/// Builds a [`JsonDocument`]; inserts the id under `_id` when no such
/// field was set explicitly.
pub struct JsonDocumentBuilder {
    id: String,
    content: JsonMap,
}

impl JsonDocumentBuilder {
    pub fn field(mut self, name: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.content.insert(name.into(), value.into());
        self
    }

    pub fn fields(mut self, fields: JsonMap) -> Self {
        self.content.extend(fields);
        self
    }

    pub fn build(mut self) -> JsonDocument {
        if !self.content.contains_key("_id") {
            self.content
                .insert("_id".to_string(), JsonValue::Str(self.id.clone()));
        }
        JsonDocument {
            id: self.id,
            content: self.content,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> JsonDocument {
        let mut addr0 = JsonMap::new();
        addr0.insert("zip".into(), JsonValue::Str("10001".into()));
        let mut addr1 = JsonMap::new();
        addr1.insert("zip".into(), JsonValue::Str("94105".into()));
        let mut customer = JsonMap::new();
        customer.insert("name".into(), JsonValue::Str("Ada".into()));
        customer.insert(
            "addresses".into(),
            JsonValue::Array(vec![JsonValue::Object(addr0), JsonValue::Object(addr1)]),
        );
        JsonDocument::builder("doc-1")
            .field("customer", JsonValue::Object(customer))
            .field("count", 3i64)
            .build()
    }

    #[test]
    fn builder_inserts_id_field() {
        let doc = JsonDocument::builder("doc-9").field("a", 1i64).build();
        assert_eq!(
            doc.content().get("_id"),
            Some(&JsonValue::Str("doc-9".into()))
        );
    }

    #[test]
    fn explicit_id_field_is_kept() {
        let doc = JsonDocument::builder("doc-9")
            .field("_id", "custom")
            .build();
        assert_eq!(
            doc.content().get("_id"),
            Some(&JsonValue::Str("custom".into()))
        );
    }

    #[test]
    fn dotted_path_access() {
        let doc = sample();
        assert_eq!(
            doc.get_path("customer.name"),
            Some(&JsonValue::Str("Ada".into()))
        );
        assert_eq!(
            doc.get_path("customer.addresses[1].zip"),
            Some(&JsonValue::Str("94105".into()))
        );
    }

    #[test]
    fn broken_links_are_absent() {
        let doc = sample();
        assert!(doc.get_path("customer.missing").is_none());
        assert!(doc.get_path("customer.addresses[7].zip").is_none());
        assert!(doc.get_path("count.inner").is_none());
        assert!(doc.get_path("customer.addresses[x].zip").is_none());
    }

    #[test]
    fn has_path_agrees_with_get_path() {
        let doc = sample();
        for path in [
            "customer.name",
            "customer.addresses[0].zip",
            "count",
            "nope",
            "customer.addresses[5]",
        ] {
            assert_eq!(doc.has_path(path), doc.get_path(path).is_some(), "{path}");
        }
    }

    #[test]
    fn field_order_is_preserved() {
        let doc = JsonDocument::builder("d")
            .field("z", 1i64)
            .field("a", 2i64)
            .field("m", 3i64)
            .build();
        let keys: Vec<&str> = doc.content().keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["z", "a", "m", "_id"]);
    }

    #[test]
    fn size_estimate_follows_model() {
        // 4 container overhead + key (1*2+4) + string (3*2+4)
        let doc = JsonDocument::new("d", {
            let mut m = JsonMap::new();
            m.insert("k".into(), JsonValue::Str("abc".into()));
            m
        });
        assert_eq!(doc.estimated_size_bytes(), 4 + 6 + 10);
        assert_eq!(JsonValue::Bool(true).estimated_size_bytes(), 1);
        assert_eq!(JsonValue::Int(9).estimated_size_bytes(), 8);
        assert_eq!(JsonValue::Null.estimated_size_bytes(), 4);
    }
}
