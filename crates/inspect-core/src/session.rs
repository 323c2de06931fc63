//! Inspection session: one registry, created and dropped as a unit.
//!
//! Handles handed out during a session stay resolvable until the session is
//! dropped; entries are never evicted individually.

use std::sync::Arc;

use crate::encoder::{encode, StoreObserver};
use crate::error::Result;
use crate::registry::{Handle, HandleCounter, Registry};
use crate::types::{ObjectRef, Shape, Value};
use crate::wire::EncodedValue;

#[derive(Debug, Default)]
pub struct InspectSession {
    registry: Registry,
}

impl InspectSession {
    /// Session drawing handles from the process-wide counter.
    pub fn new() -> Self {
        Self {
            registry: Registry::new(),
        }
    }

    pub fn with_counter(counter: Arc<HandleCounter>) -> Self {
        Self {
            registry: Registry::with_counter(counter),
        }
    }

    pub fn encode(&mut self, value: &Value, deep: bool) -> Result<EncodedValue> {
        encode(value, deep, &mut self.registry, None)
    }

    pub fn encode_with_stores(
        &mut self,
        value: &Value,
        deep: bool,
        stores: &mut dyn StoreObserver,
    ) -> Result<EncodedValue> {
        encode(value, deep, &mut self.registry, Some(stores))
    }

    pub fn resolve(&self, handle: &Handle) -> Option<ObjectRef> {
        self.registry.resolve(handle)
    }

    /// Resolve a handle only if it names an element, e.g. for a highlight
    /// request coming from the panel.
    pub fn resolve_element(&self, handle: &Handle) -> Option<ObjectRef> {
        self.resolve(handle)
            .filter(|obj| matches!(obj.classify(), Ok(Shape::Element { .. })))
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}
