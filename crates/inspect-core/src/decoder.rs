//! Receiving side of the wire format: parse payloads and walk encoded trees.
//!
//! Decoding is plain serde; the numeric sentinels turn back into
//! [`EncodedNumber`](crate::EncodedNumber) variants and handles back into
//! [`Handle`]s, so `to_f64` recovers exactly the number that was sent.
//! Payloads of any nesting depth are accepted, since deep encodes have no
//! depth ceiling.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::error::Result;
use crate::registry::Handle;
use crate::wire::EncodedValue;

/// Parse a wire payload.
///
/// # Example
/// ```
/// use inspect_core::{decode, EncodedValue};
/// let node = decode(r#"{"type":"number","value":"__$sdt-NaN__"}"#).unwrap();
/// let EncodedValue::Number { value } = node else { unreachable!() };
/// assert!(value.to_f64().is_nan());
/// ```
pub fn decode(payload: &str) -> Result<EncodedValue> {
    let mut json = serde_json::Deserializer::from_str(payload);
    json.disable_recursion_limit();
    // Grows the stack on demand once the recursion limit is off.
    let value = EncodedValue::deserialize(serde_stacker::Deserializer::new(&mut json))?;
    json.end()?;
    Ok(value)
}

impl EncodedValue {
    /// Direct descendants: array children, object children in key order, or
    /// the contents of a store. Shallow composites have none.
    pub fn children(&self) -> Vec<&EncodedValue> {
        match self {
            Self::Array {
                children: Some(items),
                ..
            } => items.iter().collect(),
            Self::Object {
                children: Some(entries),
                ..
            } => entries.iter().map(|(_, v)| v).collect(),
            Self::Store { value } => vec![&value.value],
            _ => Vec::new(),
        }
    }

    /// Number of nodes in the tree, this one included.
    pub fn node_count(&self) -> usize {
        1 + self
            .children()
            .into_iter()
            .map(EncodedValue::node_count)
            .sum::<usize>()
    }

    /// Depth of the tree; a leaf has depth 1.
    pub fn max_depth(&self) -> usize {
        1 + self
            .children()
            .into_iter()
            .map(EncodedValue::max_depth)
            .max()
            .unwrap_or(0)
    }

    /// Every element and store handle in the tree, in document order.
    /// A handle reached twice is listed twice.
    pub fn handles(&self) -> Vec<Handle> {
        let mut out = Vec::new();
        collect_handles(self, &mut out);
        out
    }
}

fn collect_handles(node: &EncodedValue, out: &mut Vec<Handle>) {
    match node {
        EncodedValue::Element { value } => out.push(value.id),
        EncodedValue::Store { value } => out.push(value.id),
        _ => {}
    }
    for child in node.children() {
        collect_handles(child, out);
    }
}

/// Shape summary of an encoded tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotStats {
    pub nodes: usize,
    pub max_depth: usize,
    /// Distinct handles referenced.
    pub handles: usize,
    pub by_type: BTreeMap<&'static str, usize>,
}

impl SnapshotStats {
    pub fn of(root: &EncodedValue) -> Self {
        let mut by_type = BTreeMap::new();
        count_types(root, &mut by_type);
        let mut handles = root.handles();
        handles.sort_unstable();
        handles.dedup();
        Self {
            nodes: root.node_count(),
            max_depth: root.max_depth(),
            handles: handles.len(),
            by_type,
        }
    }
}

fn count_types(node: &EncodedValue, counts: &mut BTreeMap<&'static str, usize>) {
    *counts.entry(node.type_name()).or_insert(0) += 1;
    for child in node.children() {
        count_types(child, counts);
    }
}
