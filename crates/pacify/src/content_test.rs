// Copyright (c) Contributors to the Pacify project.
// SPDX-License-Identifier: Apache-2.0

use rstest::rstest;
use tempfile::TempDir;

use super::*;
use crate::discovery::{EntityManager, LoadOptions};
use crate::fixtures::{build_zip, build_zip_bytes, write_file};

const MARKER: &str = r#"
beginToken: "%{"
endToken: "}"
files:
  - path: app.properties
  - path: missing.properties
  - path: binary.dat
archives:
  - path: lib/app.ear
    type: ear
    files:
      - path: META-INF/application.xml
    archives:
      - path: lib/inner.jar
        type: jar
        files:
          - path: conf/inner.properties
"#;

fn package() -> TempDir {
    let tmp = TempDir::new().unwrap();
    write_file(tmp.path(), ".pacify.yaml", MARKER);
    write_file(tmp.path(), "app.properties", "host=%{dbHost}\n");
    write_file(tmp.path(), "binary.dat", [0xffu8, 0xfe, 0x00]);

    let inner = build_zip(&[("conf/inner.properties", "inner=%{inner}")]);
    let ear = build_zip_bytes(&[
        ("META-INF/application.xml", b"<root>%{ctx}</root>".to_vec()),
        ("lib/inner.jar", inner),
    ]);
    write_file(tmp.path(), "lib/app.ear", ear);
    tmp
}

#[rstest]
fn test_snapshot_reads_files_and_nested_entries() {
    let tmp = package();
    let manager = EntityManager::initialize(tmp.path(), &LoadOptions::default()).unwrap();
    let graph = manager.graph();
    let filters = FilterRegistry::new();

    let snapshot = ContentSnapshot::load(graph, &filters, &graph.artifacts());
    let (marker, _) = graph.markers().next().unwrap();
    let files = graph.files_of(marker);

    assert_eq!(snapshot.content(files[0]), Some("host=%{dbHost}\n"));
    assert_eq!(snapshot.content(files[1]), None);
    assert_eq!(snapshot.content(files[2]), None);
    assert_eq!(snapshot.content(files[3]), Some("<root>%{ctx}</root>"));
    assert_eq!(snapshot.content(files[4]), Some("inner=%{inner}"));

    let archives = graph.archives_of(marker);
    let outer: Vec<_> = snapshot.archive_entries(archives[0]).unwrap().iter().collect();
    assert_eq!(outer, vec!["META-INF/application.xml", "lib/inner.jar"]);
    assert!(snapshot.archive_entries(archives[1]).unwrap().contains("conf/inner.properties"));
}

#[rstest]
fn test_snapshot_reports_undecodable_content() {
    let tmp = package();
    let manager = EntityManager::initialize(tmp.path(), &LoadOptions::default()).unwrap();
    let graph = manager.graph();

    let snapshot = ContentSnapshot::load(graph, &FilterRegistry::new(), &graph.artifacts());
    assert_eq!(snapshot.defects().len(), 1);
    let Defect::ArtifactIo { artifact, .. } = &snapshot.defects()[0] else {
        panic!("expected artifact defect");
    };
    assert_eq!(artifact, "binary.dat");
}

#[rstest]
fn test_snapshot_reports_corrupt_archive() {
    let tmp = package();
    write_file(tmp.path(), "lib/app.ear", "definitely not a zip");
    let manager = EntityManager::initialize(tmp.path(), &LoadOptions::default()).unwrap();
    let graph = manager.graph();
    let (marker, _) = graph.markers().next().unwrap();
    let ear = graph.archives_of(marker)[0];

    let snapshot = ContentSnapshot::load(graph, &FilterRegistry::new(), &[Artifact::Archive(ear)]);
    assert!(snapshot.archive_entries(ear).is_none());
    assert_eq!(snapshot.defects().len(), 1);
    assert_eq!(snapshot.defects()[0].kind(), "ArtifactIo");
}
