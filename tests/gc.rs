//! Mark/sweep behavioural tests (spec §8 property 8: "after
//! `collect_garbage()` the live set equals the transitive closure of object
//! references reachable from the root set").

use impulse_core::gc::{GcHeap, Value};

fn heap() -> GcHeap {
    // A huge threshold so `should_collect` never fires on its own; tests
    // drive collection explicitly via `collect`.
    GcHeap::new(1024 * 1024 * 1024, 2)
}

#[test]
fn unreachable_object_is_collected() {
    let mut heap = heap();
    let _dangling = heap.allocate_array(4, Value::Nil);
    assert_eq!(heap.object_count(), 1);

    heap.collect(std::iter::empty());
    assert_eq!(heap.object_count(), 0);
}

#[test]
fn rooted_object_survives_collection() {
    let mut heap = heap();
    let root = heap.allocate_array(4, Value::Nil);
    assert_eq!(heap.object_count(), 1);

    heap.collect(std::iter::once(&root));
    assert_eq!(heap.object_count(), 1);
}

#[test]
fn transitively_reachable_object_survives() {
    let mut heap = heap();
    let inner = heap.allocate_array(2, Value::Number(1.0));
    let outer = heap.allocate_array(1, Value::Nil);
    if let Value::Object(id) = outer {
        heap.object_mut(id).unwrap().elements[0] = inner.clone();
    }
    assert_eq!(heap.object_count(), 2);

    heap.collect(std::iter::once(&outer));
    assert_eq!(heap.object_count(), 2);
}

#[test]
fn object_reachable_only_through_a_dropped_link_is_collected() {
    let mut heap = heap();
    let inner = heap.allocate_array(2, Value::Number(1.0));
    let outer = heap.allocate_array(1, Value::Nil);
    if let Value::Object(id) = outer {
        heap.object_mut(id).unwrap().elements[0] = inner;
    }
    assert_eq!(heap.object_count(), 2);

    // Root only `outer`, then sever the link and collect again; `inner`
    // should now be unreachable even though it survived the first pass.
    heap.collect(std::iter::once(&outer));
    assert_eq!(heap.object_count(), 2);

    if let Value::Object(id) = outer {
        heap.object_mut(id).unwrap().elements[0] = Value::Nil;
    }
    heap.collect(std::iter::once(&outer));
    assert_eq!(heap.object_count(), 1);
}

#[test]
fn cyclic_objects_without_a_root_are_both_collected() {
    let mut heap = heap();
    let a = heap.allocate_array(1, Value::Nil);
    let b = heap.allocate_array(1, Value::Nil);
    if let (Value::Object(a_id), Value::Object(b_id)) = (&a, &b) {
        heap.object_mut(*a_id).unwrap().elements[0] = b.clone();
        heap.object_mut(*b_id).unwrap().elements[0] = a.clone();
    }
    assert_eq!(heap.object_count(), 2);

    heap.collect(std::iter::empty());
    assert_eq!(heap.object_count(), 0);
}

#[test]
fn multiple_roots_each_keep_their_own_object_alive() {
    let mut heap = heap();
    let first = heap.allocate_array(1, Value::Nil);
    let second = heap.allocate_array(1, Value::Nil);
    let _orphan = heap.allocate_array(1, Value::Nil);
    assert_eq!(heap.object_count(), 3);

    heap.collect(vec![&first, &second].into_iter());
    assert_eq!(heap.object_count(), 2);
}

#[test]
fn maybe_collect_is_a_no_op_below_threshold() {
    let mut heap = GcHeap::new(1024 * 1024, 2);
    let _dangling = heap.allocate_array(4, Value::Nil);
    assert!(!heap.should_collect());

    heap.maybe_collect(std::iter::empty());
    assert_eq!(heap.object_count(), 1);
}

#[test]
fn maybe_collect_sweeps_once_over_threshold() {
    let mut heap = GcHeap::new(64, 2);
    for _ in 0..8 {
        let _ = heap.allocate_array(8, Value::Number(0.0));
    }
    assert!(heap.should_collect());

    heap.maybe_collect(std::iter::empty());
    assert_eq!(heap.object_count(), 0);
    assert_eq!(heap.bytes_allocated(), 0);
}

#[test]
fn resize_and_element_push_pop_track_bytes_allocated() {
    let mut heap = heap();
    let value = heap.allocate_array(2, Value::Nil);
    let id = match value {
        Value::Object(id) => id,
        _ => unreachable!(),
    };
    let before = heap.bytes_allocated();

    heap.resize_array(id, 5, Value::Number(0.0));
    assert_eq!(heap.object(id).unwrap().elements.len(), 5);
    assert!(heap.bytes_allocated() > before);

    let pushed_len = heap.push_element(id, Value::Str("x".to_string())).unwrap();
    assert_eq!(pushed_len, 6);

    let popped = heap.pop_element(id);
    assert_eq!(popped, Some(Value::Str("x".to_string())));
    assert_eq!(heap.object(id).unwrap().elements.len(), 5);
}
