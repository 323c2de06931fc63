//! Live runtime values the encoder walks.
//!
//! This is a small dynamic object model: scalars are plain Rust values, while
//! symbols, functions and objects are reference types whose identity is their
//! allocation. Two `ObjectRef`s are "the same object" exactly when they point
//! at the same allocation, which is what the identity registry keys on.
//!
//! Objects keep their own properties as `Vec<(PropertyKey, Property)>` so the
//! declaration order is the enumeration order, without pulling in `IndexMap`.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::error::ReflectionError;

/// Any value a program can hold.
#[derive(Debug, Clone)]
pub enum Value {
    Number(f64),
    Boolean(bool),
    String(String),
    Null,
    Undefined,
    Symbol(Symbol),
    Function(Function),
    Object(ObjectRef),
}

impl Value {
    /// `typeof`-style category name, used in log output.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Number(_) => "number",
            Self::Boolean(_) => "boolean",
            Self::String(_) => "string",
            Self::Null => "null",
            Self::Undefined => "undefined",
            Self::Symbol(_) => "symbol",
            Self::Function(_) => "function",
            Self::Object(_) => "object",
        }
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Self::Object(obj) => Some(obj),
            _ => None,
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Number(f64::from(n))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<Symbol> for Value {
    fn from(sym: Symbol) -> Self {
        Self::Symbol(sym)
    }
}

impl From<Function> for Value {
    fn from(f: Function) -> Self {
        Self::Function(f)
    }
}

impl From<ObjectRef> for Value {
    fn from(obj: ObjectRef) -> Self {
        Self::Object(obj)
    }
}

// ---------------------------------------------------------------------------
// Symbol
// ---------------------------------------------------------------------------

/// A unique symbol. Every `Symbol::new` call yields a distinct symbol, even
/// with an equal description.
#[derive(Clone)]
pub struct Symbol(Rc<Option<String>>);

impl Symbol {
    pub fn new(description: Option<&str>) -> Self {
        Self(Rc::new(description.map(str::to_string)))
    }

    pub fn description(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Symbol {}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.description() {
            Some(desc) => write!(f, "Symbol({desc})"),
            None => write!(f, "Symbol()"),
        }
    }
}

// ---------------------------------------------------------------------------
// Function
// ---------------------------------------------------------------------------

/// An exception raised by a callable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Thrown(pub String);

type Body = dyn Fn(&Value) -> Result<Value, Thrown>;

struct FunctionInner {
    name: String,
    body: Box<Body>,
}

/// A callable value. The body receives the `this` value.
#[derive(Clone)]
pub struct Function(Rc<FunctionInner>);

impl Function {
    pub fn new<F>(name: &str, body: F) -> Self
    where
        F: Fn(&Value) -> Result<Value, Thrown> + 'static,
    {
        Self(Rc::new(FunctionInner {
            name: name.to_string(),
            body: Box::new(body),
        }))
    }

    /// A callable that does nothing and returns `undefined`.
    pub fn native(name: &str) -> Self {
        Self::new(name, |_| Ok(Value::Undefined))
    }

    /// Declared name; empty for anonymous functions.
    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn call(&self, this: &Value) -> Result<Value, Thrown> {
        (self.0.body)(this)
    }
}

impl PartialEq for Function {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[Function {}]", self.name())
    }
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

/// Own-property key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyKey {
    String(String),
    Symbol(Symbol),
}

impl From<&str> for PropertyKey {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for PropertyKey {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<Symbol> for PropertyKey {
    fn from(sym: Symbol) -> Self {
        Self::Symbol(sym)
    }
}

/// Own-property descriptor: either a stored value or an accessor pair.
#[derive(Debug, Clone)]
pub enum Property {
    Data {
        value: Value,
        enumerable: bool,
    },
    Accessor {
        get: Option<Function>,
        set: Option<Function>,
        enumerable: bool,
    },
}

impl Property {
    /// Enumerable data property.
    pub fn data(value: impl Into<Value>) -> Self {
        Self::Data {
            value: value.into(),
            enumerable: true,
        }
    }

    /// Non-enumerable data property.
    pub fn hidden(value: impl Into<Value>) -> Self {
        Self::Data {
            value: value.into(),
            enumerable: false,
        }
    }

    /// Enumerable accessor with only a getter.
    pub fn getter(get: Function) -> Self {
        Self::Accessor {
            get: Some(get),
            set: None,
            enumerable: true,
        }
    }

    pub fn is_enumerable(&self) -> bool {
        match self {
            Self::Data { enumerable, .. } | Self::Accessor { enumerable, .. } => *enumerable,
        }
    }
}

// ---------------------------------------------------------------------------
// Objects
// ---------------------------------------------------------------------------

/// Internal category of an object, the equivalent of its `[[Class]]` tag.
#[derive(Debug, Clone)]
pub enum ObjectKind {
    /// Ordinary object. `class: None` is a plain data object; anything else
    /// (`Date`, `Map`, a user class name) is an instance.
    Ordinary { class: Option<String> },
    /// Positional elements. Own properties on an array are not elements.
    Array(Vec<Value>),
    /// A DOM-like node. Never expanded by the encoder.
    Element { tag_name: String },
    /// Forwards every reflective query to `target`; `None` once revoked.
    Proxy { target: Option<ObjectRef> },
}

/// Heap object: a kind plus own properties in declaration order.
#[derive(Debug, Clone)]
pub struct Object {
    kind: ObjectKind,
    properties: Vec<(PropertyKey, Property)>,
}

impl Object {
    pub fn new(kind: ObjectKind) -> Self {
        Self {
            kind,
            properties: Vec::new(),
        }
    }
}

/// What reflection found out about an object.
#[derive(Debug, Clone)]
pub enum Shape {
    Element {
        tag_name: String,
    },
    Array(Vec<Value>),
    /// Plain data object. `key_count` counts enumerable string keys only;
    /// `entries` holds every own string-keyed property in order.
    Plain {
        key_count: usize,
        entries: Vec<(String, Property)>,
    },
    /// Anything else, carrying its type tag.
    Instance(String),
}

/// Shared reference to a heap object. Equality is identity.
#[derive(Clone)]
pub struct ObjectRef(Rc<RefCell<Object>>);

impl ObjectRef {
    pub fn new(object: Object) -> Self {
        Self(Rc::new(RefCell::new(object)))
    }

    /// Empty plain object.
    pub fn plain() -> Self {
        Self::new(Object::new(ObjectKind::Ordinary { class: None }))
    }

    /// Plain object with enumerable data properties, in the given order.
    pub fn from_entries<K, V, I>(entries: I) -> Self
    where
        K: Into<PropertyKey>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        let obj = Self::plain();
        for (key, value) in entries {
            obj.set(key, value);
        }
        obj
    }

    pub fn array<I>(items: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        Self::new(Object::new(ObjectKind::Array(
            items.into_iter().map(Into::into).collect(),
        )))
    }

    pub fn element(tag_name: &str) -> Self {
        Self::new(Object::new(ObjectKind::Element {
            tag_name: tag_name.to_string(),
        }))
    }

    /// Non-plain object with the given type tag (`"Date"`, `"Map"`, ...).
    pub fn instance(class: &str) -> Self {
        Self::new(Object::new(ObjectKind::Ordinary {
            class: Some(class.to_string()),
        }))
    }

    pub fn proxy(target: &ObjectRef) -> Self {
        Self::new(Object::new(ObjectKind::Proxy {
            target: Some(target.clone()),
        }))
    }

    /// Cut a proxy off from its target. No effect on other objects.
    pub fn revoke(&self) {
        if let ObjectKind::Proxy { target } = &mut self.0.borrow_mut().kind {
            *target = None;
        }
    }

    /// Append an element; ignored unless this is an array.
    pub fn push(&self, value: impl Into<Value>) {
        if let ObjectKind::Array(items) = &mut self.0.borrow_mut().kind {
            items.push(value.into());
        }
    }

    /// Set an enumerable data property. An existing key keeps its position.
    pub fn set(&self, key: impl Into<PropertyKey>, value: impl Into<Value>) {
        self.define(key, Property::data(value));
    }

    /// Define or replace an own property. An existing key keeps its position.
    pub fn define(&self, key: impl Into<PropertyKey>, property: Property) {
        let key = key.into();
        let mut obj = self.0.borrow_mut();
        match obj.properties.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => *slot = property,
            None => obj.properties.push((key, property)),
        }
    }

    /// `key in object` for own properties; follows proxies. Unreadable
    /// objects report `false`.
    pub fn has_own_property(&self, key: &PropertyKey) -> bool {
        let Ok(obj) = self.0.try_borrow() else {
            return false;
        };
        match &obj.kind {
            ObjectKind::Proxy { target: Some(target) } => target.has_own_property(key),
            ObjectKind::Proxy { target: None } => false,
            _ => obj.properties.iter().any(|(k, _)| k == key),
        }
    }

    /// Reflect on the object without running any user code.
    ///
    /// Proxies forward to their target. A revoked proxy, or an object that is
    /// mutably borrowed, fails with a [`ReflectionError`].
    pub fn classify(&self) -> Result<Shape, ReflectionError> {
        let obj = self.0.try_borrow().map_err(|_| ReflectionError::Busy)?;
        let shape = match &obj.kind {
            ObjectKind::Proxy { target: Some(target) } => return target.classify(),
            ObjectKind::Proxy { target: None } => return Err(ReflectionError::Revoked),
            ObjectKind::Element { tag_name } => Shape::Element {
                tag_name: tag_name.clone(),
            },
            ObjectKind::Array(items) => Shape::Array(items.clone()),
            ObjectKind::Ordinary { class: Some(class) } => Shape::Instance(class.clone()),
            ObjectKind::Ordinary { class: None } => {
                let mut key_count = 0;
                let mut entries = Vec::with_capacity(obj.properties.len());
                for (key, property) in &obj.properties {
                    if let PropertyKey::String(name) = key {
                        if property.is_enumerable() {
                            key_count += 1;
                        }
                        entries.push((name.clone(), property.clone()));
                    }
                }
                Shape::Plain { key_count, entries }
            }
        };
        Ok(shape)
    }

    /// Allocation address, the object's identity.
    pub fn addr(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }

    /// Live references to this object, registries included.
    pub fn strong_count(&self) -> usize {
        Rc::strong_count(&self.0)
    }

    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Borrow the object for mutation. Reflection on it fails while the
    /// guard is alive.
    pub fn lock(&self) -> std::cell::RefMut<'_, Object> {
        self.0.borrow_mut()
    }
}

impl PartialEq for ObjectRef {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for ObjectRef {}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.try_borrow() {
            Ok(obj) => write!(f, "ObjectRef({:#x}, {:?})", self.addr(), kind_label(&obj.kind)),
            Err(_) => write!(f, "ObjectRef({:#x}, <busy>)", self.addr()),
        }
    }
}

fn kind_label(kind: &ObjectKind) -> &str {
    match kind {
        ObjectKind::Ordinary { class: None } => "Object",
        ObjectKind::Ordinary { class: Some(class) } => class,
        ObjectKind::Array(_) => "Array",
        ObjectKind::Element { tag_name } => tag_name,
        ObjectKind::Proxy { .. } => "Proxy",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_object_counts_enumerable_string_keys_only() {
        let marker = Symbol::new(Some("marker"));
        let obj = ObjectRef::from_entries([("a", 1), ("b", 2)]);
        obj.define("hidden", Property::hidden(3));
        obj.set(marker, true);

        match obj.classify().unwrap() {
            Shape::Plain { key_count, entries } => {
                assert_eq!(key_count, 2);
                let keys: Vec<&str> = entries.iter().map(|(k, _)| k.as_str()).collect();
                assert_eq!(keys, ["a", "b", "hidden"]);
            }
            other => panic!("expected plain shape, got {other:?}"),
        }
    }

    #[test]
    fn redefining_a_key_keeps_its_position() {
        let obj = ObjectRef::from_entries([("a", 1), ("b", 2)]);
        obj.set("a", 10);
        let Shape::Plain { entries, .. } = obj.classify().unwrap() else {
            panic!("expected plain shape");
        };
        assert_eq!(entries[0].0, "a");
        assert!(matches!(
            entries[0].1,
            Property::Data { value: Value::Number(n), .. } if n == 10.0
        ));
    }

    #[test]
    fn proxy_forwards_until_revoked() {
        let target = ObjectRef::array([1, 2]);
        let proxy = ObjectRef::proxy(&target);
        assert!(matches!(proxy.classify(), Ok(Shape::Array(items)) if items.len() == 2));

        proxy.revoke();
        assert_eq!(proxy.classify().unwrap_err(), ReflectionError::Revoked);
        assert!(target.classify().is_ok());
    }

    #[test]
    fn busy_object_fails_reflection() {
        let obj = ObjectRef::plain();
        let _guard = obj.lock();
        assert_eq!(obj.classify().unwrap_err(), ReflectionError::Busy);
    }

    #[test]
    fn identity_is_allocation() {
        let a = ObjectRef::plain();
        let b = ObjectRef::plain();
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
        assert_ne!(Symbol::new(Some("x")), Symbol::new(Some("x")));
    }
}
