//! Identity registry: stable opaque handles for objects that cannot travel.
//!
//! Elements and store objects are replaced on the wire by a [`Handle`]. The
//! registry remembers both directions so the receiving side can later ask for
//! the live object back, and so the same object always gets the same handle.
//!
//! Handles come from a [`HandleCounter`]. Production code shares the single
//! process-wide counter ([`HandleCounter::global`]) so handles from different
//! sessions never collide; tests inject their own counter for deterministic
//! sequences.
//!
//! The forward map holds strong references. A registry therefore keeps every
//! object it has seen alive until it is dropped, and handles are only
//! meaningful for the lifetime of the registry that issued them. The reverse
//! map is keyed by allocation address, which stays valid precisely because the
//! forward map keeps the allocation alive.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, LazyLock};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{InspectError, Result};
use crate::types::ObjectRef;

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Opaque identity handle. Renders as the base-36 form of its sequence number
/// (`0`, `1`, ..., `z`, `10`, ...). Orders by sequence, i.e. by allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Handle(u64);

impl Handle {
    pub fn sequence(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&to_base36(self.0))
    }
}

impl FromStr for Handle {
    type Err = InspectError;

    /// Only the exact text a registry issues is accepted: lowercase digits,
    /// no sign, no leading zeros.
    fn from_str(s: &str) -> Result<Self> {
        match u64::from_str_radix(s, 36) {
            Ok(n) if to_base36(n) == s => Ok(Handle(n)),
            _ => Err(InspectError::MalformedHandle(s.to_string())),
        }
    }
}

impl Serialize for Handle {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Handle {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut buf = Vec::with_capacity(13);
    while n > 0 {
        buf.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    buf.reverse();
    // DIGITS is ASCII
    String::from_utf8(buf).unwrap_or_default()
}

// ---------------------------------------------------------------------------
// HandleCounter
// ---------------------------------------------------------------------------

static GLOBAL_COUNTER: LazyLock<Arc<HandleCounter>> =
    LazyLock::new(|| Arc::new(HandleCounter::new()));

/// Monotonic source of handle sequence numbers. Never hands out a number twice.
#[derive(Debug, Default)]
pub struct HandleCounter {
    next: AtomicU64,
}

impl HandleCounter {
    /// Fresh counter starting at `0`.
    pub fn new() -> Self {
        Self::starting_at(0)
    }

    pub fn starting_at(next: u64) -> Self {
        Self {
            next: AtomicU64::new(next),
        }
    }

    /// The process-wide counter shared by every [`Registry::new`].
    pub fn global() -> Arc<HandleCounter> {
        Arc::clone(&GLOBAL_COUNTER)
    }

    /// Take the next handle. `u64::MAX` is never issued; reaching it means the
    /// counter is exhausted.
    pub fn allocate(&self) -> Result<Handle> {
        self.next
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_add(1))
            .map(Handle)
            .map_err(|_| InspectError::IdentityExhausted)
    }

    /// Sequence number the next allocation will use.
    pub fn peek(&self) -> u64 {
        self.next.load(Ordering::Relaxed)
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Two-way object/handle map for one inspection session.
pub struct Registry {
    counter: Arc<HandleCounter>,
    forward: HashMap<Handle, ObjectRef>,
    reverse: HashMap<usize, Handle>,
}

impl Registry {
    /// Registry drawing handles from the process-wide counter.
    pub fn new() -> Self {
        Self::with_counter(HandleCounter::global())
    }

    pub fn with_counter(counter: Arc<HandleCounter>) -> Self {
        Self {
            counter,
            forward: HashMap::new(),
            reverse: HashMap::new(),
        }
    }

    /// Handle for `object`, allocating one the first time it is seen.
    pub fn assign(&mut self, object: &ObjectRef) -> Result<Handle> {
        if let Some(handle) = self.reverse.get(&object.addr()) {
            return Ok(*handle);
        }
        let handle = self.counter.allocate()?;
        tracing::debug!(%handle, ?object, "assigned identity handle");
        self.forward.insert(handle, object.clone());
        self.reverse.insert(object.addr(), handle);
        Ok(handle)
    }

    /// The live object behind `handle`, if this registry issued it.
    pub fn resolve(&self, handle: &Handle) -> Option<ObjectRef> {
        self.forward.get(handle).cloned()
    }

    /// Existing handle for `object` without allocating.
    pub fn handle_of(&self, object: &ObjectRef) -> Option<Handle> {
        self.reverse.get(&object.addr()).copied()
    }

    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("entries", &self.forward.len())
            .field("next", &self.counter.peek())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn isolated() -> Registry {
        Registry::with_counter(Arc::new(HandleCounter::new()))
    }

    #[test]
    fn base36_rendering() {
        assert_eq!(Handle(0).to_string(), "0");
        assert_eq!(Handle(35).to_string(), "z");
        assert_eq!(Handle(36).to_string(), "10");
        assert_eq!(Handle(u64::MAX - 1).to_string(), "3w5e11264sgse");
    }

    #[test]
    fn parse_is_inverse_of_display() {
        for n in [0, 1, 35, 36, 1295, 46655, 1 << 40] {
            let h = Handle(n);
            assert_eq!(h.to_string().parse::<Handle>().unwrap(), h);
        }
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!("".parse::<Handle>().is_err());
        assert!("+1".parse::<Handle>().is_err());
        assert!("A".parse::<Handle>().is_err());
        assert!("00".parse::<Handle>().is_err());
        assert!("01".parse::<Handle>().is_err());
        assert!("a-b".parse::<Handle>().is_err());
        assert!("é".parse::<Handle>().is_err());
    }

    #[test]
    fn assign_is_idempotent() {
        let mut reg = isolated();
        let obj = ObjectRef::element("DIV");
        let first = reg.assign(&obj).unwrap();
        let second = reg.assign(&obj.clone()).unwrap();
        assert_eq!(first, second);
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.counter.peek(), 1);
    }

    #[test]
    fn handles_follow_encounter_order() {
        let mut reg = isolated();
        let a = ObjectRef::element("A");
        let b = ObjectRef::element("B");
        let ha = reg.assign(&a).unwrap();
        let hb = reg.assign(&b).unwrap();
        assert!(ha < hb);
        assert_eq!(hb.sequence(), ha.sequence() + 1);
        assert_eq!(ha.to_string(), "0");
        assert_eq!(hb.to_string(), "1");
    }

    #[test]
    fn resolve_only_knows_own_handles() {
        let counter = Arc::new(HandleCounter::new());
        let mut first = Registry::with_counter(Arc::clone(&counter));
        let mut second = Registry::with_counter(counter);

        let a = ObjectRef::element("A");
        let b = ObjectRef::element("B");
        let ha = first.assign(&a).unwrap();
        let hb = second.assign(&b).unwrap();

        assert_ne!(ha, hb);
        assert_eq!(first.resolve(&ha), Some(a));
        assert_eq!(first.resolve(&hb), None);
        assert_eq!(second.resolve(&hb), Some(b));
    }

    #[test]
    fn handle_of_does_not_allocate() {
        let mut reg = isolated();
        let obj = ObjectRef::plain();
        assert_eq!(reg.handle_of(&obj), None);
        assert!(reg.is_empty());
        let h = reg.assign(&obj).unwrap();
        assert_eq!(reg.handle_of(&obj), Some(h));
    }

    #[test]
    fn exhausted_counter_is_an_error() {
        let mut reg = Registry::with_counter(Arc::new(HandleCounter::starting_at(u64::MAX)));
        let err = reg.assign(&ObjectRef::plain()).unwrap_err();
        assert!(matches!(err, InspectError::IdentityExhausted));
        assert!(reg.is_empty());
    }

    #[test]
    fn handle_serializes_as_string() {
        let json = serde_json::to_string(&Handle(71)).unwrap();
        assert_eq!(json, r#""1z""#);
        let back: Handle = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Handle(71));
    }
}
