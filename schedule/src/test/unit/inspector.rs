use std::sync::Arc;

use crate::Error;
use crate::inspector::{Inspector, InspectorCache};
use crate::test::helpers::{BrokenEngine, CountingEngine};
use crate::tiling::ChainDescriptor;

fn chain(name: &str) -> ChainDescriptor {
    ChainDescriptor {
        name: name.to_string(),
        tile_size: 16,
        sets: Vec::new(),
        maps: Vec::new(),
        loops: Vec::new(),
        coordinates: None,
        build_options: Default::default(),
    }
}

#[test]
fn test_inspect_compiles_once() {
    let engine = CountingEngine::default();
    let inspector = Inspector::new("x", 16);
    assert!(!inspector.is_initialized());

    let first = inspector.inspect(&engine, || chain("x")).unwrap();
    let second = inspector.inspect(&engine, || panic!("cached chain described again")).unwrap();

    assert_eq!(engine.calls(), 1);
    assert!(Arc::ptr_eq(&first, &second));
    assert!(inspector.is_initialized());
    assert!(inspector.plan().is_some_and(|plan| Arc::ptr_eq(plan, &first)));
}

#[test]
fn test_concurrent_callers_share_one_compilation() {
    let engine = CountingEngine::default();
    let cache = InspectorCache::new();

    let plans: Vec<_> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                scope.spawn(|| {
                    let inspector = cache.get_or_create("x", 16);
                    inspector.inspect(&engine, || chain("x")).unwrap()
                })
            })
            .collect();
        handles.into_iter().map(|handle| handle.join().unwrap()).collect()
    });

    assert_eq!(engine.calls(), 1);
    assert_eq!(cache.len(), 1);
    assert!(plans.iter().all(|plan| Arc::ptr_eq(plan, &plans[0])));
}

#[test]
fn test_failed_inspection_is_remembered() {
    let broken = BrokenEngine::default();
    let inspector = Inspector::new("x", 16);

    let err = inspector.inspect(&broken, || chain("x")).unwrap_err();
    assert!(matches!(err, Error::Engine { ref engine, ref chain, ref reason }
        if engine == "broken" && chain == "x" && reason == "inspector did not compile"));
    assert!(inspector.is_initialized());
    assert!(inspector.is_failed());
    assert!(inspector.plan().is_none());

    let again = inspector.inspect(&broken, || panic!("failed chain described again")).unwrap_err();
    assert_eq!(again.to_string(), err.to_string());
    assert_eq!(broken.calls(), 1);

    let engine = CountingEngine::default();
    assert!(matches!(inspector.inspect(&engine, || chain("x")), Err(Error::Engine { .. })));
    assert_eq!(engine.calls(), 0);
}

#[test]
fn test_cache_keeps_first_inspector() {
    let cache = InspectorCache::new();
    let first = cache.get_or_create("x", 16);
    let again = cache.get_or_create("x", 512);

    assert!(Arc::ptr_eq(&first, &again));
    assert_eq!(again.tile_size(), 16);
    assert!(cache.get("y").is_none());

    cache.get_or_create("y", 8);
    assert_eq!(cache.len(), 2);
    cache.clear();
    assert!(cache.is_empty());
}
