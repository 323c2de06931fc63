//! Value encoder: turns one live value into one [`EncodedValue`] tree.
//!
//! Classification is a closed, ordered match; the first rule that fits wins:
//!
//! 1. scalars (`number`, `boolean`, `string`, `null`, `undefined`)
//! 2. `symbol` (description) and `function` (name); bodies are never touched
//! 3. element-like objects → `element` with a registry handle, never expanded
//! 4. store objects, only in deep mode with a [`StoreObserver`] → `store`
//! 5. arrays → `array` (length, plus children when deep)
//! 6. plain objects → `object` (key count, plus children when deep);
//!    accessor properties become `getter` and are **never invoked**
//! 7. everything else → `instance` with its type tag
//!
//! Depth is all-or-nothing: a deep call deep-encodes every descendant. Cycles
//! are cut with a `circular` leaf, tracked per top-level call so that the same
//! object reached along two different paths is still encoded in full both times.
//!
//! # Example
//! ```
//! use inspect_core::{encode, EncodedValue, ObjectRef, Registry, Value};
//!
//! let mut registry = Registry::new();
//! let obj = ObjectRef::from_entries([("a", 1), ("b", 2)]);
//! let shallow = encode(&Value::from(obj), false, &mut registry, None).unwrap();
//! assert_eq!(shallow, EncodedValue::Object { value: 2, children: None });
//! ```

use std::collections::HashSet;

use crate::error::Result;
use crate::registry::{Handle, Registry};
use crate::types::{ObjectRef, Property, Shape, Value};
use crate::wire::{ElementRef, EncodedNumber, EncodedValue, ObjectChildren, StoreSnapshot};

/// Recognizes store objects and hears about the ones a deep encode finds.
pub trait StoreObserver {
    /// Whether `object` is a store. Must not have side effects.
    fn is_store(&self, object: &ObjectRef) -> bool;

    /// Called once per distinct store per [`encode`] call, before the call
    /// returns, with the handle that also appears in the `store` node.
    fn store_found(&mut self, handle: Handle, store: &ObjectRef);
}

/// [`StoreObserver`] built from a predicate and a callback.
pub struct StoreHook<P, F> {
    predicate: P,
    on_found: F,
}

impl<P, F> StoreHook<P, F>
where
    P: Fn(&ObjectRef) -> bool,
    F: FnMut(Handle, &ObjectRef),
{
    pub fn new(predicate: P, on_found: F) -> Self {
        Self {
            predicate,
            on_found,
        }
    }
}

impl<P, F> StoreObserver for StoreHook<P, F>
where
    P: Fn(&ObjectRef) -> bool,
    F: FnMut(Handle, &ObjectRef),
{
    fn is_store(&self, object: &ObjectRef) -> bool {
        (self.predicate)(object)
    }

    fn store_found(&mut self, handle: Handle, store: &ObjectRef) {
        (self.on_found)(handle, store)
    }
}

/// Encode `value` into its wire representation.
///
/// With `deep == false`, arrays and objects report only their size. Elements
/// and stores are registered in `registry`; `stores`, when given, decides which
/// objects are stores and is told about each one found.
///
/// The only error is handle exhaustion in the registry, which is fatal to the
/// session. Objects that refuse reflection encode as `instance` instead.
pub fn encode(
    value: &Value,
    deep: bool,
    registry: &mut Registry,
    stores: Option<&mut dyn StoreObserver>,
) -> Result<EncodedValue> {
    tracing::trace!(kind = value.type_name(), deep, "encoding value");
    let mut encoder = Encoder {
        registry,
        stores,
        ancestors: HashSet::new(),
        reported: HashSet::new(),
    };
    encoder.encode_value(value, deep)
}

struct Encoder<'r, 's> {
    registry: &'r mut Registry,
    /// Taken out while a store's own contents are encoded.
    stores: Option<&'s mut dyn StoreObserver>,
    /// Composites currently being expanded, by address.
    ancestors: HashSet<usize>,
    /// Stores already handed to the observer during this call.
    reported: HashSet<usize>,
}

impl Encoder<'_, '_> {
    fn encode_value(&mut self, value: &Value, deep: bool) -> Result<EncodedValue> {
        let encoded = match value {
            Value::Number(n) => EncodedValue::Number {
                value: EncodedNumber::from_f64(*n),
            },
            Value::Boolean(b) => EncodedValue::Boolean { value: *b },
            Value::String(s) => EncodedValue::string(s.as_str()),
            Value::Null => EncodedValue::Null,
            Value::Undefined => EncodedValue::Undefined,
            Value::Symbol(sym) => EncodedValue::Symbol {
                value: sym.description().unwrap_or_default().to_string(),
            },
            Value::Function(f) => EncodedValue::Function {
                value: f.name().to_string(),
            },
            Value::Object(obj) => return self.encode_object(obj, deep),
        };
        Ok(encoded)
    }

    fn encode_object(&mut self, obj: &ObjectRef, deep: bool) -> Result<EncodedValue> {
        if deep && self.ancestors.contains(&obj.addr()) {
            tracing::trace!(?obj, "cycle cut");
            return Ok(EncodedValue::Circular);
        }

        let shape = match obj.classify() {
            Ok(shape) => shape,
            Err(err) => {
                tracing::debug!(?obj, %err, "reflection failed, encoding as instance");
                return Ok(EncodedValue::Instance {
                    value: err.fallback_tag().to_string(),
                });
            }
        };

        if deep && !matches!(shape, Shape::Element { .. }) && self.is_store(obj) {
            return self.encode_store(obj, shape);
        }
        self.encode_shape(obj, shape, deep)
    }

    fn is_store(&self, obj: &ObjectRef) -> bool {
        self.stores
            .as_ref()
            .is_some_and(|observer| observer.is_store(obj))
    }

    fn encode_store(&mut self, obj: &ObjectRef, shape: Shape) -> Result<EncodedValue> {
        let id = self.registry.assign(obj)?;
        if self.reported.insert(obj.addr()) {
            tracing::debug!(handle = %id, "store discovered");
            if let Some(observer) = self.stores.as_mut() {
                observer.store_found(id, obj);
            }
        }

        // Store contents are a plain deep snapshot: nested stores are not intercepted.
        let observer = self.stores.take();
        let contents = self.encode_shape(obj, shape, true);
        self.stores = observer;

        Ok(EncodedValue::Store {
            value: Box::new(StoreSnapshot {
                id,
                value: contents?,
            }),
        })
    }

    fn encode_shape(&mut self, obj: &ObjectRef, shape: Shape, deep: bool) -> Result<EncodedValue> {
        match shape {
            Shape::Element { tag_name } => {
                let id = self.registry.assign(obj)?;
                Ok(EncodedValue::Element {
                    value: ElementRef { name: tag_name, id },
                })
            }
            Shape::Instance(tag) => Ok(EncodedValue::Instance { value: tag }),
            Shape::Array(items) => {
                let len = items.len();
                if !deep {
                    return Ok(EncodedValue::Array {
                        value: len,
                        children: None,
                    });
                }
                self.ancestors.insert(obj.addr());
                let children = items
                    .iter()
                    .map(|item| self.encode_value(item, true))
                    .collect::<Result<Vec<_>>>();
                self.ancestors.remove(&obj.addr());
                Ok(EncodedValue::Array {
                    value: len,
                    children: Some(children?),
                })
            }
            Shape::Plain { key_count, entries } => {
                if !deep {
                    return Ok(EncodedValue::Object {
                        value: key_count,
                        children: None,
                    });
                }
                self.ancestors.insert(obj.addr());
                let children = self.encode_entries(entries);
                self.ancestors.remove(&obj.addr());
                Ok(EncodedValue::Object {
                    value: key_count,
                    children: Some(children?),
                })
            }
        }
    }

    fn encode_entries(&mut self, entries: Vec<(String, Property)>) -> Result<ObjectChildren> {
        let mut children = Vec::with_capacity(entries.len());
        for (key, property) in entries {
            let encoded = match property {
                Property::Accessor { get: Some(_), .. } => EncodedValue::Getter { value: key.clone() },
                // Setter-only accessor: the descriptor has no value.
                Property::Accessor { get: None, .. } => EncodedValue::Undefined,
                Property::Data { value, .. } => self.encode_value(&value, true)?,
            };
            children.push((key, encoded));
        }
        Ok(ObjectChildren::new(children))
    }
}
