//! Session-scoped identity: resolution, element filtering, isolation.
use std::sync::Arc;

use inspect_core::{decode, HandleCounter, InspectSession, ObjectRef, Property, StoreHook, Symbol, Value};

fn session() -> InspectSession {
    InspectSession::with_counter(Arc::new(HandleCounter::new()))
}

#[test]
fn handles_resolve_back_to_the_live_element() {
    let mut session = session();
    let el = ObjectRef::element("INPUT");
    let encoded = session.encode(&Value::from(el.clone()), false).unwrap();

    let handle = encoded.handles()[0];
    assert_eq!(session.resolve(&handle), Some(el.clone()));
    assert_eq!(session.resolve_element(&handle), Some(el));
}

#[test]
fn resolve_element_refuses_store_handles() {
    let marker = Symbol::new(None);
    let store = ObjectRef::from_entries([("n", 1)]);
    store.define(marker.clone(), Property::hidden(true));

    let mut session = session();
    let mut hook = StoreHook::new(
        |obj: &ObjectRef| obj.has_own_property(&marker.clone().into()),
        |_, _: &ObjectRef| {},
    );
    let encoded = session
        .encode_with_stores(&Value::from(store.clone()), true, &mut hook)
        .unwrap();

    let handle = encoded.handles()[0];
    assert_eq!(session.resolve(&handle), Some(store));
    assert_eq!(session.resolve_element(&handle), None);
}

#[test]
fn handles_survive_the_wire() {
    let mut session = session();
    let el = ObjectRef::element("CANVAS");
    let list = ObjectRef::array([Value::from("x"), Value::from(el.clone())]);
    let payload = serde_json::to_string(&session.encode(&Value::from(list), true).unwrap()).unwrap();

    let received = decode(&payload).unwrap();
    let handle = received.handles()[0];
    assert_eq!(session.resolve_element(&handle), Some(el));
}

#[test]
fn sessions_sharing_a_counter_never_collide() {
    let counter = Arc::new(HandleCounter::new());
    let mut first = InspectSession::with_counter(Arc::clone(&counter));
    let mut second = InspectSession::with_counter(counter);

    let a = first.encode(&Value::from(ObjectRef::element("A")), false).unwrap();
    let b = second.encode(&Value::from(ObjectRef::element("B")), false).unwrap();
    let (ha, hb) = (a.handles()[0], b.handles()[0]);

    assert!(ha < hb);
    assert!(first.resolve(&hb).is_none());
    assert!(second.resolve(&ha).is_none());
}

#[test]
fn dropping_a_session_releases_its_objects() {
    let el = ObjectRef::element("DIV");
    {
        let mut session = session();
        session.encode(&Value::from(el.clone()), false).unwrap();
        assert_eq!(session.registry().len(), 1);
        assert_eq!(el.strong_count(), 2);
    }
    assert_eq!(el.strong_count(), 1);
}

#[test]
fn global_sessions_produce_distinct_handles() {
    let mut first = InspectSession::new();
    let mut second = InspectSession::new();
    let a = first.encode(&Value::from(ObjectRef::element("A")), false).unwrap();
    let b = second.encode(&Value::from(ObjectRef::element("B")), false).unwrap();
    assert_ne!(a.handles()[0], b.handles()[0]);
}
