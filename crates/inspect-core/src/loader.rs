//! Fixture loading: build a live object graph from a JSON document.
//!
//! Plain JSON maps onto numbers, booleans, strings, `null`, arrays and plain
//! objects. Objects whose only key (besides `$id`) is a directive describe the
//! values JSON has no syntax for:
//!
//! | Directive | Builds |
//! |---|---|
//! | `{"$undefined": null}` | `undefined` |
//! | `{"$number": "Infinity"}` | `Infinity`, `-Infinity` or `NaN` |
//! | `{"$symbol": "desc"}` | a fresh symbol (`null` = no description) |
//! | `{"$function": "name"}` | a callable (`""` = anonymous) |
//! | `{"$element": "DIV"}` | an element-like object |
//! | `{"$instance": "Date"}` | a non-plain object with that type tag |
//! | `{"$proxy": <object>}` | a proxy forwarding to the built target |
//! | `{"$revoked": null}` | a revoked proxy |
//! | `{"$store": <object or array>}` | the inner value, marked as a store |
//! | `{"$getter": <any>}` | (property position only) an accessor property |
//! | `{"$ref": "name"}` | the object registered under `"$id": "name"` |
//!
//! `$id` registers an object before its properties are built, so a property
//! can `$ref` an enclosing object to form a cycle. On a `$store` or `$proxy`
//! wrapper, `$id` names the store or the proxy and is registered before the
//! wrapped contents are built. References must point to an
//! enclosing or earlier object.

use std::cell::Cell;
use std::collections::HashMap;
use std::rc::Rc;

use serde_json::{Map, Value as Json};

use crate::encoder::StoreObserver;
use crate::error::{InspectError, Result};
use crate::registry::Handle;
use crate::types::{Function, ObjectRef, Property, Symbol, Thrown, Value};

/// A loaded object graph plus what is needed to observe it.
#[derive(Debug)]
pub struct Fixture {
    root: Value,
    store_marker: Symbol,
    getter_calls: Rc<Cell<usize>>,
}

impl Fixture {
    /// Parse a fixture document.
    pub fn parse(json: &str) -> Result<Self> {
        let doc: Json = serde_json::from_str(json)?;
        Self::from_json(&doc)
    }

    pub fn from_json(doc: &Json) -> Result<Self> {
        let mut loader = Loader {
            anchors: HashMap::new(),
            store_marker: Symbol::new(Some("store")),
            getter_calls: Rc::new(Cell::new(0)),
        };
        let root = loader.build(doc, "$")?;
        Ok(Self {
            root,
            store_marker: loader.store_marker,
            getter_calls: loader.getter_calls,
        })
    }

    pub fn root(&self) -> &Value {
        &self.root
    }

    /// Symbol-keyed own property that marks store objects.
    pub fn store_marker(&self) -> &Symbol {
        &self.store_marker
    }

    /// How many times any `$getter` accessor has been invoked.
    pub fn getter_calls(&self) -> usize {
        self.getter_calls.get()
    }

    /// Fresh observer recognizing this fixture's stores.
    pub fn store_log(&self) -> StoreLog {
        StoreLog {
            marker: self.store_marker.clone(),
            found: Vec::new(),
        }
    }
}

/// Store observer that recognizes marked objects and records what it hears.
#[derive(Debug)]
pub struct StoreLog {
    marker: Symbol,
    found: Vec<(Handle, ObjectRef)>,
}

impl StoreLog {
    pub fn found(&self) -> &[(Handle, ObjectRef)] {
        &self.found
    }

    pub fn handles(&self) -> Vec<Handle> {
        self.found.iter().map(|(handle, _)| *handle).collect()
    }
}

impl StoreObserver for StoreLog {
    fn is_store(&self, object: &ObjectRef) -> bool {
        object.has_own_property(&self.marker.clone().into())
    }

    fn store_found(&mut self, handle: Handle, store: &ObjectRef) {
        self.found.push((handle, store.clone()));
    }
}

struct Loader {
    anchors: HashMap<String, ObjectRef>,
    store_marker: Symbol,
    getter_calls: Rc<Cell<usize>>,
}

impl Loader {
    fn build(&mut self, doc: &Json, path: &str) -> Result<Value> {
        match doc {
            Json::Null => Ok(Value::Null),
            Json::Bool(b) => Ok(Value::Boolean(*b)),
            Json::Number(n) => n
                .as_f64()
                .map(Value::Number)
                .ok_or_else(|| fixture_error(path, "number not representable as f64")),
            Json::String(s) => Ok(Value::String(s.clone())),
            Json::Array(items) => {
                let array = ObjectRef::array(Vec::<Value>::new());
                self.fill_array(&array, items, path)?;
                Ok(Value::Object(array))
            }
            Json::Object(map) => match directive(map, path)? {
                Some(("$store", arg)) => self.build_store(map, arg, path),
                Some(("$proxy", arg)) => self.build_proxy(map, arg, path),
                Some((name, arg)) => {
                    let value = self.build_directive(name, arg, path)?;
                    self.register_anchor(map, &value, path)?;
                    Ok(value)
                }
                None => self.build_plain(map, path),
            },
        }
    }

    fn build_plain(&mut self, map: &Map<String, Json>, path: &str) -> Result<Value> {
        let obj = ObjectRef::plain();
        let value = Value::Object(obj.clone());
        // Registered before the properties so they can refer back to it.
        self.register_anchor(map, &value, path)?;
        self.fill_plain(&obj, map, path)?;
        Ok(value)
    }

    fn fill_plain(&mut self, obj: &ObjectRef, map: &Map<String, Json>, path: &str) -> Result<()> {
        for (key, child) in map {
            if key == "$id" {
                continue;
            }
            let child_path = format!("{path}.{key}");
            if key.starts_with('$') {
                return Err(fixture_error(&child_path, "unexpected directive in plain object"));
            }
            match child {
                Json::Object(inner) if inner.len() == 1 && inner.contains_key("$getter") => {
                    obj.define(key.as_str(), Property::getter(self.counting_getter(key)));
                }
                _ => {
                    let built = self.build(child, &child_path)?;
                    obj.set(key.as_str(), built);
                }
            }
        }
        Ok(())
    }

    fn fill_array(&mut self, array: &ObjectRef, items: &[Json], path: &str) -> Result<()> {
        for (i, item) in items.iter().enumerate() {
            array.push(self.build(item, &format!("{path}[{i}]"))?);
        }
        Ok(())
    }

    /// Empty object that `doc` will be built into, when `doc` is a plain
    /// object or an array. Lets a wrapper's `$id` be registered first.
    fn shell(&self, doc: &Json, path: &str) -> Result<Option<ObjectRef>> {
        match doc {
            Json::Array(_) => Ok(Some(ObjectRef::array(Vec::<Value>::new()))),
            Json::Object(map) if directive(map, path)?.is_none() => Ok(Some(ObjectRef::plain())),
            _ => Ok(None),
        }
    }

    fn fill(&mut self, shell: &ObjectRef, doc: &Json, path: &str) -> Result<()> {
        match doc {
            Json::Array(items) => self.fill_array(shell, items, path),
            Json::Object(map) => {
                self.register_anchor(map, &Value::Object(shell.clone()), path)?;
                self.fill_plain(shell, map, path)
            }
            _ => Ok(()),
        }
    }

    /// `$store`: the wrapper's `$id` names the store itself.
    fn build_store(&mut self, wrapper: &Map<String, Json>, arg: &Json, path: &str) -> Result<Value> {
        let inner_path = format!("{path}.$store");
        let store = match self.shell(arg, &inner_path)? {
            Some(shell) => {
                self.register_anchor(wrapper, &Value::Object(shell.clone()), path)?;
                self.fill(&shell, arg, &inner_path)?;
                shell
            }
            None if arg.is_object() => {
                let built = self.build(arg, &inner_path)?;
                let obj = built
                    .as_object()
                    .cloned()
                    .ok_or_else(|| fixture_error(&inner_path, "store must wrap an object or array"))?;
                self.register_anchor(wrapper, &built, path)?;
                obj
            }
            None => return Err(fixture_error(&inner_path, "store must wrap an object or array")),
        };
        store.define(self.store_marker.clone(), Property::hidden(true));
        Ok(Value::Object(store))
    }

    /// `$proxy`: the wrapper's `$id` names the proxy, not its target.
    fn build_proxy(&mut self, wrapper: &Map<String, Json>, arg: &Json, path: &str) -> Result<Value> {
        let inner_path = format!("{path}.$proxy");
        if let Some(target) = self.shell(arg, &inner_path)? {
            let proxy = Value::Object(ObjectRef::proxy(&target));
            self.register_anchor(wrapper, &proxy, path)?;
            self.fill(&target, arg, &inner_path)?;
            return Ok(proxy);
        }
        let target = self.build(arg, &inner_path)?;
        let target = target
            .as_object()
            .ok_or_else(|| fixture_error(&inner_path, "proxy target must be an object"))?;
        let proxy = Value::Object(ObjectRef::proxy(target));
        self.register_anchor(wrapper, &proxy, path)?;
        Ok(proxy)
    }

    fn build_directive(&mut self, name: &str, arg: &Json, path: &str) -> Result<Value> {
        let inner_path = format!("{path}.{name}");
        match name {
            "$undefined" => Ok(Value::Undefined),
            "$number" => match arg.as_str() {
                Some("Infinity") => Ok(Value::Number(f64::INFINITY)),
                Some("-Infinity") => Ok(Value::Number(f64::NEG_INFINITY)),
                Some("NaN") => Ok(Value::Number(f64::NAN)),
                _ => Err(fixture_error(
                    &inner_path,
                    "expected \"Infinity\", \"-Infinity\" or \"NaN\"",
                )),
            },
            "$symbol" => match arg {
                Json::Null => Ok(Value::Symbol(Symbol::new(None))),
                Json::String(desc) => Ok(Value::Symbol(Symbol::new(Some(desc.as_str())))),
                _ => Err(fixture_error(&inner_path, "expected a string or null")),
            },
            "$function" => {
                let fname = expect_str(arg, &inner_path)?;
                Ok(Value::Function(Function::native(fname)))
            }
            "$element" => {
                let tag = expect_str(arg, &inner_path)?;
                Ok(Value::Object(ObjectRef::element(tag)))
            }
            "$instance" => {
                let tag = expect_str(arg, &inner_path)?;
                Ok(Value::Object(ObjectRef::instance(tag)))
            }
            "$revoked" => {
                let proxy = ObjectRef::proxy(&ObjectRef::plain());
                proxy.revoke();
                Ok(Value::Object(proxy))
            }
            "$ref" => {
                let anchor = expect_str(arg, &inner_path)?;
                self.anchors
                    .get(anchor)
                    .map(|obj| Value::Object(obj.clone()))
                    .ok_or_else(|| fixture_error(&inner_path, &format!("no object with $id {anchor:?} in scope")))
            }
            "$getter" => Err(fixture_error(path, "$getter is only allowed as a property value")),
            other => Err(fixture_error(path, &format!("unknown directive {other}"))),
        }
    }

    fn register_anchor(&mut self, map: &Map<String, Json>, value: &Value, path: &str) -> Result<()> {
        let Some(id) = map.get("$id") else {
            return Ok(());
        };
        let id_path = format!("{path}.$id");
        let name = expect_str(id, &id_path)?;
        let obj = value
            .as_object()
            .ok_or_else(|| fixture_error(&id_path, "only objects can carry an $id"))?;
        if self.anchors.insert(name.to_string(), obj.clone()).is_some() {
            return Err(fixture_error(&id_path, &format!("duplicate $id {name:?}")));
        }
        Ok(())
    }

    /// Accessor that counts its invocations and throws.
    fn counting_getter(&self, key: &str) -> Function {
        let calls = Rc::clone(&self.getter_calls);
        let message = format!("getter {key:?} ran during inspection");
        Function::new(&format!("get {key}"), move |_| {
            calls.set(calls.get() + 1);
            Err(Thrown(message.clone()))
        })
    }
}

/// The directive an object spells, if any: its single `$`-key besides `$id`.
fn directive<'a>(map: &'a Map<String, Json>, path: &str) -> Result<Option<(&'a str, &'a Json)>> {
    let mut keys = map.iter().filter(|(k, _)| k.as_str() != "$id");
    let Some((first, arg)) = keys.next() else {
        return Ok(None);
    };
    if !first.starts_with('$') {
        return Ok(None);
    }
    if keys.next().is_some() {
        return Err(fixture_error(path, &format!("directive {first} must be the only key")));
    }
    Ok(Some((first.as_str(), arg)))
}

fn expect_str<'a>(value: &'a Json, path: &str) -> Result<&'a str> {
    value
        .as_str()
        .ok_or_else(|| fixture_error(path, "expected a string"))
}

fn fixture_error(path: &str, message: &str) -> InspectError {
    InspectError::Fixture {
        path: path.to_string(),
        message: message.to_string(),
    }
}
