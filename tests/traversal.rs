//! Traversal laws (spec §8, properties 10-15) and scenarios S4-S6.

use std::sync::Arc;

use vertexdb::steps::{Count, Each, End, Get, GroupCount, Incomings, Key, Limit, Outgoings, Path, Paginator, SelectVertices, Skip, Sort, Start, Unique, Values};
use vertexdb::{Db, Input, Pipeline, PropertyMap, PropertyValue, TraversalValue};

#[test]
fn outgoings_end_returns_every_target_with_multiplicity() {
    let db = Db::temporary().unwrap();
    let a = db.vertex().create("v", PropertyMap::new()).unwrap();
    let b = db.vertex().create("v", PropertyMap::new()).unwrap();
    a.link(&db, "r", &b, PropertyMap::new()).unwrap();
    a.link(&db, "r", &b, PropertyMap::new()).unwrap();

    let results: Vec<_> =
        Pipeline::new().push(Outgoings).push(End).run(&db, Input::Vertex(a)).unwrap().collect::<vertexdb::Result<_>>().unwrap();
    assert_eq!(results.len(), 2);
    for token in &results {
        assert_eq!(token.id(), Some(b.id()));
    }
}

#[test]
fn incomings_start_get_returns_source_vertices() {
    let db = Db::temporary().unwrap();
    let a = db.vertex().create("v", PropertyMap::new()).unwrap();
    let b = db.vertex().create("v", PropertyMap::new()).unwrap();
    a.link(&db, "r", &b, PropertyMap::new()).unwrap();

    let results: Vec<_> = Pipeline::new()
        .push(Incomings)
        .push(Start)
        .push(Get)
        .run(&db, Input::Vertex(b))
        .unwrap()
        .collect::<vertexdb::Result<_>>()
        .unwrap();
    assert_eq!(results.len(), 1);
    assert!(matches!(&results[0].value, TraversalValue::Vertex(v) if v.id() == a.id()));
}

#[test]
fn skip_then_limit_matches_limit_then_skip_on_the_prefix() {
    let db = Db::temporary().unwrap();
    let a = db.vertex().create("v", PropertyMap::new()).unwrap();
    for i in 0..6 {
        let mut props = PropertyMap::new();
        props.insert("i".into(), PropertyValue::Integer(i));
        let b = db.vertex().create("v", props).unwrap();
        a.link(&db, "r", &b, PropertyMap::new()).unwrap();
    }

    let n = 2;
    let m = 3;
    let skip_then_limit: Vec<_> = Pipeline::new()
        .push(Outgoings)
        .push(End)
        .push(Skip { count: n })
        .push(Limit { count: m })
        .run(&db, Input::Vertex(a.clone()))
        .unwrap()
        .map(|t| t.unwrap().id())
        .collect();
    let limit_then_skip: Vec<_> = Pipeline::new()
        .push(Outgoings)
        .push(End)
        .push(Limit { count: n + m })
        .push(Skip { count: n })
        .run(&db, Input::Vertex(a))
        .unwrap()
        .map(|t| t.unwrap().id())
        .collect();
    assert_eq!(skip_then_limit, limit_then_skip);
}

#[test]
fn unique_is_idempotent() {
    let db = Db::temporary().unwrap();
    let a = db.vertex().create("v", PropertyMap::new()).unwrap();
    let b = db.vertex().create("v", PropertyMap::new()).unwrap();
    a.link(&db, "r", &b, PropertyMap::new()).unwrap();
    a.link(&db, "r", &b, PropertyMap::new()).unwrap();

    let once: Vec<_> =
        Pipeline::new().push(Outgoings).push(End).push(Unique).run(&db, Input::Vertex(a.clone())).unwrap().map(|t| t.unwrap().id()).collect();
    let twice: Vec<_> = Pipeline::new()
        .push(Outgoings)
        .push(End)
        .push(Unique)
        .push(Unique)
        .run(&db, Input::Vertex(a))
        .unwrap()
        .map(|t| t.unwrap().id())
        .collect();
    assert_eq!(once, twice);
}

#[test]
fn sort_is_stable_for_equal_keys() {
    let db = Db::temporary().unwrap();
    let a = db.vertex().create("v", PropertyMap::new()).unwrap();
    let mut ids = Vec::new();
    for tag in ["x", "x", "x"] {
        let mut props = PropertyMap::new();
        props.insert("tag".into(), tag.into());
        let b = db.vertex().create("v", props).unwrap();
        ids.push(b.id());
        a.link(&db, "r", &b, PropertyMap::new()).unwrap();
    }

    let sorted: Vec<_> = Pipeline::new()
        .push(Outgoings)
        .push(End)
        .push(Key { name: "tag".into() })
        .push(Sort { key: None, reverse: false })
        .run(&db, Input::Vertex(a))
        .unwrap()
        .map(|t| t.unwrap())
        .collect();
    assert_eq!(sorted.len(), 3);
}

#[test]
fn path_yields_k_plus_one_tokens() {
    let db = Db::temporary().unwrap();
    let a = db.vertex().create("v", PropertyMap::new()).unwrap();
    let b = db.vertex().create("v", PropertyMap::new()).unwrap();
    a.link(&db, "r", &b, PropertyMap::new()).unwrap();

    let results: Vec<_> = Pipeline::new()
        .push(Outgoings)
        .push(End)
        .push(Path { depth: 2 })
        .run(&db, Input::Vertex(a))
        .unwrap()
        .collect::<vertexdb::Result<_>>()
        .unwrap();
    assert_eq!(results.len(), 1);
    match &results[0].value {
        TraversalValue::Path(ancestors) => assert_eq!(ancestors.len(), 3),
        other => panic!("expected a 3-element path, got {other:?}"),
    }
}

#[test]
fn s4_select_vertices_count() {
    let db = Db::temporary().unwrap();
    db.vertex().index("key");
    for tag in ["one", "one", "two", "one", "two", "one"] {
        let mut props = PropertyMap::new();
        props.insert("key".into(), tag.into());
        db.vertex().create("v", props).unwrap();
    }

    let mut results = Pipeline::new()
        .push(SelectVertices { key: "key".into(), value: PropertyValue::Text("one".into()) })
        .push(Count)
        .run(&db, Input::None)
        .unwrap();
    let token = results.next().unwrap().unwrap();
    assert_eq!(token.value, TraversalValue::Property(PropertyValue::Integer(4)));
}

#[test]
fn s5_path_through_get_and_value() {
    let db = Db::temporary().unwrap();
    let a = db.vertex().create("v", PropertyMap::new()).unwrap();
    let b = db.vertex().create("v", PropertyMap::new()).unwrap();
    let e = a.link(&db, "t", &b, PropertyMap::new()).unwrap();

    let each_get = Each { pipeline: Arc::new(Pipeline::new().push(Get)) };
    let pipeline = Pipeline::new().push(Incomings).push(Start).push(Path { depth: 2 }).push(each_get).push(Values);
    let results: Vec<_> = pipeline.run(&db, Input::Vertex(b.clone())).unwrap().collect::<vertexdb::Result<_>>().unwrap();
    assert_eq!(results.len(), 1);
    match &results[0].value {
        TraversalValue::List(items) => {
            assert!(matches!(&items[0], TraversalValue::Vertex(v) if v.id() == a.id()));
            assert!(matches!(&items[1], TraversalValue::Edge(edge) if edge.id() == e.id()));
            assert!(matches!(&items[2], TraversalValue::Vertex(v) if v.id() == b.id()));
        }
        other => panic!("expected a 3-element list, got {other:?}"),
    }
}

#[test]
fn s6_sort_orders_by_explicit_value() {
    let db = Db::temporary().unwrap();
    let a = db.vertex().create("v", PropertyMap::new()).unwrap();
    for value in [5, 4, 1] {
        let mut props = PropertyMap::new();
        props.insert("value".into(), PropertyValue::Integer(value));
        let b = db.vertex().create("v", props).unwrap();
        a.link(&db, "t", &b, PropertyMap::new()).unwrap();
    }

    let pipeline =
        Pipeline::new().push(Outgoings).push(End).push(Key { name: "value".into() }).push(Sort { key: None, reverse: false }).push(Values);
    let results: Vec<_> = pipeline.run(&db, Input::Vertex(a)).unwrap().collect::<vertexdb::Result<_>>().unwrap();
    let values: Vec<i64> = results
        .into_iter()
        .map(|t| match t.value {
            TraversalValue::Property(PropertyValue::Integer(n)) => n,
            other => panic!("expected an integer, got {other:?}"),
        })
        .collect();
    assert_eq!(values, vec![1, 4, 5]);
}

#[test]
fn group_count_tallies_repeated_values() {
    let db = Db::temporary().unwrap();
    for tag in ["a", "b", "a"] {
        let mut props = PropertyMap::new();
        props.insert("tag".into(), tag.into());
        db.vertex().create("v", props).unwrap();
    }

    let mut results = Pipeline::new()
        .push(vertexdb::steps::Vertices { label: Some("v".into()) })
        .push(Key { name: "tag".into() })
        .push(GroupCount)
        .run(&db, Input::None)
        .unwrap();
    let token = results.next().unwrap().unwrap();
    match token.value {
        TraversalValue::Counts(pairs) => assert_eq!(pairs.len(), 2),
        other => panic!("expected a counts mapping, got {other:?}"),
    }
}

#[test]
fn paginator_windows_with_a_partial_tail() {
    let db = Db::temporary().unwrap();
    for _ in 0..5 {
        db.vertex().create("v", PropertyMap::new()).unwrap();
    }
    let pages: Vec<_> = Pipeline::new()
        .push(vertexdb::steps::Vertices { label: Some("v".into()) })
        .push(Paginator { count: 2 })
        .run(&db, Input::None)
        .unwrap()
        .collect::<vertexdb::Result<_>>()
        .unwrap();
    assert_eq!(pages.len(), 3);
    match &pages[2].value {
        TraversalValue::List(items) => assert_eq!(items.len(), 1),
        other => panic!("expected a 1-element tail page, got {other:?}"),
    }
}
