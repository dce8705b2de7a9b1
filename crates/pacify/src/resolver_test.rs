// Copyright (c) Contributors to the Pacify project.
// SPDX-License-Identifier: Apache-2.0

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use rstest::rstest;

use super::*;
use crate::source::MapResolver;
use crate::spec::PropertySpec;

fn manager(values: &[(&str, &str)]) -> PropertyResolveManager {
    let mut resolver = MapResolver::new("cmdline");
    for (id, value) in values {
        resolver.insert(*id, *value);
    }
    let mut manager = PropertyResolveManager::new();
    manager.register(resolver, 0);
    manager
}

#[rstest]
fn test_resolve_simple() {
    let manager = manager(&[("dbHost", "10.0.0.5")]);
    assert_eq!(manager.resolve("dbHost"), Resolution::Resolved("10.0.0.5".into()));
    assert_eq!(manager.resolve("other"), Resolution::Unresolved);
}

#[rstest]
fn test_priority_order() {
    let mut manager = PropertyResolveManager::new();
    manager.register(MapResolver::new("low").with("x", "from-low"), 10);
    manager.register(MapResolver::new("high").with("x", "from-high"), 1);

    assert_eq!(manager.resolver_names(), vec!["high", "low"]);
    assert_eq!(manager.resolve("x").value(), Some("from-high"));
}

#[rstest]
fn test_fallback_only_fills_gaps() {
    let mut manager = PropertyResolveManager::new();
    manager.register_fallback(MapResolver::new("fallback").with("x", "fb").with("y", "fb"), -100);
    manager.register(MapResolver::new("main").with("x", "main"), 0);

    assert_eq!(manager.resolve("x").value(), Some("main"));
    assert_eq!(manager.resolve("y").value(), Some("fb"));
}

#[rstest]
fn test_recursive_references() {
    let manager = manager(&[
        ("url", "jdbc:%{db.vendor}://%{db.host}:%{db.port}"),
        ("db.vendor", "postgresql"),
        ("db.host", "%{host}"),
        ("host", "10.0.0.5"),
        ("db.port", "5432"),
    ]);
    assert_eq!(
        manager.resolve("url").value(),
        Some("jdbc:postgresql://10.0.0.5:5432")
    );
}

#[rstest]
fn test_unresolved_reference_makes_value_unresolved() {
    let manager = manager(&[("foo", "%{someReference}/staticPart")]);
    assert_eq!(manager.resolve("foo"), Resolution::Unresolved);
}

#[rstest]
fn test_keep_unresolved_references() {
    let manager = manager(&[("foo", "%{someReference}/staticPart")]).keep_unresolved_references(true);
    assert_eq!(manager.resolve("foo").value(), Some("%{someReference}/staticPart"));
}

#[rstest]
#[case(&[("a", "%{a}")], vec!["a", "a"])]
#[case(&[("a", "x%{b}"), ("b", "%{c}"), ("c", "%{a}")], vec!["a", "b", "c", "a"])]
fn test_cycle_detection(#[case] values: &[(&str, &str)], #[case] chain: Vec<&str>) {
    let manager = manager(values);
    let expected: Vec<String> = chain.into_iter().map(String::from).collect();
    assert_eq!(manager.resolve("a"), Resolution::Cyclic(expected));
}

#[rstest]
fn test_cycle_below_entry_point() {
    let manager = manager(&[("top", "%{b}"), ("b", "%{c}"), ("c", "%{b}")]);
    assert_eq!(
        manager.resolve("top"),
        Resolution::Cyclic(vec!["b".into(), "c".into(), "b".into()])
    );
}

#[rstest]
fn test_property_default() {
    let manager = manager(&[("level", "DEBUG")]);

    let mut spec = PropertySpec::new("logLevel");
    spec.default = Some("%{level}".into());
    let property = Property::from(&spec);
    assert_eq!(manager.resolve_property(&property).value(), Some("DEBUG"));

    let plain = Property::from(&PropertySpec::new("missing"));
    assert_eq!(manager.resolve_property(&plain), Resolution::Unresolved);
}

struct CountingResolver {
    calls: Arc<AtomicUsize>,
}

impl PropertyResolver for CountingResolver {
    fn name(&self) -> &str {
        "counting"
    }

    fn resolve(&self, id: &str) -> Option<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Some(format!("value-of-{id}"))
    }
}

#[rstest]
fn test_resolution_is_memoized() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut manager = PropertyResolveManager::new();
    manager.register(CountingResolver { calls: calls.clone() }, 0);

    let first = manager.resolve("x");
    let second = manager.resolve("x");
    assert_eq!(first, second);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

struct DuplicatingResolver;

impl PropertyResolver for DuplicatingResolver {
    fn name(&self) -> &str {
        "file"
    }

    fn resolve(&self, _id: &str) -> Option<String> {
        None
    }

    fn provenance(&self, id: &str) -> String {
        match id {
            "dbHost" => "a.properties:1".into(),
            _ => self.name().into(),
        }
    }

    fn duplicates(&self) -> Vec<DuplicateProperty> {
        vec![DuplicateProperty {
            property: "dbHost".into(),
            shadowed: "b.properties:4".into(),
        }]
    }
}

#[rstest]
fn test_check_for_duplicates() {
    let mut manager = PropertyResolveManager::new();
    manager.register(DuplicatingResolver, 0);

    let defects = manager.check_for_duplicates();
    assert_eq!(
        defects,
        vec![Defect::PropertyDuplicateInPropertyFile {
            property: "dbHost".into(),
            resolver: "file".into(),
            first: "a.properties:1".into(),
            second: "b.properties:4".into(),
        }]
    );
}
