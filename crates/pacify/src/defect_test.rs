// Copyright (c) Contributors to the Pacify project.
// SPDX-License-Identifier: Apache-2.0

use rstest::rstest;

use super::*;

fn not_replaced(property: &str) -> Defect {
    Defect::NotReplacedProperty {
        marker: PathBuf::from("/pkg/.pacify.yaml"),
        file: "app.properties".into(),
        property: property.into(),
    }
}

#[rstest]
fn test_defect_set_collapses_equal_defects() {
    let mut set = DefectSet::new();
    assert!(set.insert(not_replaced("a")));
    assert!(set.insert(not_replaced("b")));
    assert!(!set.insert(not_replaced("a")));

    let order: Vec<_> = set.iter().filter_map(Defect::property).collect();
    assert_eq!(order, vec!["a", "b"]);
}

#[rstest]
fn test_defect_accessors() {
    let defect = not_replaced("dbHost");
    assert_eq!(defect.kind(), "NotReplacedProperty");
    assert_eq!(defect.marker(), Some(Path::new("/pkg/.pacify.yaml")));
    assert_eq!(defect.property(), Some("dbHost"));
    assert!(!defect.is_fatal());

    let cycle = Defect::CyclicPropertyReference {
        marker: PathBuf::from("/pkg/.pacify.yaml"),
        file: "app.properties".into(),
        property: "a".into(),
        chain: vec!["a".into(), "b".into(), "a".into()],
    };
    assert!(cycle.is_fatal());
    assert_eq!(
        cycle.to_string(),
        "Cyclic reference while resolving a for app.properties: a -> b -> a"
    );
}

#[rstest]
fn test_defect_serializes_with_kind() {
    let value = serde_json::to_value(not_replaced("dbHost")).unwrap();
    assert_eq!(value["kind"], "not_replaced_property");
    assert_eq!(value["property"], "dbHost");
}

#[rstest]
fn test_diagnostic_code() {
    let defect = not_replaced("x");
    let code = Diagnostic::code(&defect).map(|c| c.to_string());
    assert_eq!(code.as_deref(), Some("pacify::not_replaced_property"));
}

#[rstest]
fn test_describe_includes_sources() {
    let err = crate::Error::ReadFailed {
        path: PathBuf::from("/x"),
        error: std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
    };
    assert_eq!(describe(&err), "Failed to read file: \"/x\": gone");
}

#[rstest]
fn test_skipped_artifact() {
    let defect = Defect::ArtifactSkipped {
        marker: PathBuf::from("/pkg/.pacify.yaml"),
        artifact: "lib/app.jar".into(),
    };
    assert_eq!(defect.kind(), "ArtifactSkipped");
    assert_eq!(defect.marker(), Some(Path::new("/pkg/.pacify.yaml")));
    assert_eq!(defect.property(), None);
    assert!(!defect.is_fatal());
    assert_eq!(defect.to_string(), "Skipped lib/app.jar after a fatal defect");
}
