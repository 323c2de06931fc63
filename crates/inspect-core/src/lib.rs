//! # inspect-core
//!
//! Side-effect-free encoding of a live object graph into a JSON-safe,
//! type-tagged snapshot, plus the identity registry that lets the receiving
//! side refer back to objects that cannot cross the boundary themselves.
//!
//! ## Quick start
//!
//! ```rust
//! use inspect_core::{InspectSession, ObjectRef, Value};
//!
//! let mut session = InspectSession::new();
//! let button = ObjectRef::element("BUTTON");
//! let state = ObjectRef::from_entries([
//!     ("count", Value::from(3)),
//!     ("ratio", Value::from(f64::INFINITY)),
//!     ("target", Value::from(button.clone())),
//! ]);
//!
//! let encoded = session.encode(&Value::from(state), true).unwrap();
//! let json = serde_json::to_string(&encoded).unwrap();
//! assert!(json.contains(r#""count":{"type":"number","value":3}"#));
//! assert!(json.contains("__$sdt-Infinity__"));
//!
//! // The element travelled as a handle; the session can resolve it back.
//! let handle = encoded.handles()[0];
//! assert_eq!(session.resolve_element(&handle), Some(button));
//! ```
//!
//! ## Modules
//!
//! - [`types`]: the live value model (`Value`, `ObjectRef`, `Property`, ...)
//! - [`registry`]: identity handles and the object/handle registry
//! - [`encoder`]: value → `EncodedValue`, store interception
//! - [`wire`]: the `EncodedValue` wire format and numeric sentinels
//! - [`decoder`]: parsing payloads and walking encoded trees
//! - [`session`]: registry lifetime bound to an inspection session
//! - [`loader`]: building object graphs from JSON fixtures
//! - [`error`]: error types

pub mod decoder;
pub mod encoder;
pub mod error;
pub mod loader;
pub mod registry;
pub mod session;
pub mod types;
pub mod wire;

pub use decoder::{decode, SnapshotStats};
pub use encoder::{encode, StoreHook, StoreObserver};
pub use error::{InspectError, ReflectionError, Result};
pub use loader::{Fixture, StoreLog};
pub use registry::{Handle, HandleCounter, Registry};
pub use session::InspectSession;
pub use types::{Function, Object, ObjectKind, ObjectRef, Property, PropertyKey, Shape, Symbol, Thrown, Value};
pub use wire::{ElementRef, EncodedNumber, EncodedValue, ObjectChildren, StoreSnapshot};
