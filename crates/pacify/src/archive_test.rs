// Copyright (c) Contributors to the Pacify project.
// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeSet;
use std::io::Cursor;

use rstest::rstest;

use super::*;
use crate::fixtures::{build_tar, build_zip, read_entry};

/// Upper-cases every entry it is asked about.
struct Shout<'a> {
    targets: &'a [&'a str],
    seen: Vec<String>,
}

impl EntryVisitor for Shout<'_> {
    fn wants(&mut self, name: &str) -> bool {
        self.targets.contains(&name)
    }

    fn visit(&mut self, name: &str, data: &[u8]) -> crate::Result<Option<Vec<u8>>> {
        self.seen.push(name.to_string());
        Ok(Some(String::from_utf8_lossy(data).to_uppercase().into_bytes()))
    }
}

#[rstest]
fn test_rewrite_zip_keeps_entry_order_and_names() {
    let input = build_zip(&[
        ("conf/", ""),
        ("conf/app.properties", "host=a"),
        ("lib/readme.txt", "keep me"),
    ]);
    let mut visitor = Shout {
        targets: &["conf/app.properties"],
        seen: Vec::new(),
    };

    let output = rewrite(ArchiveType::Zip, Cursor::new(input.clone()), Cursor::new(Vec::new()), &mut visitor)
        .unwrap()
        .into_inner();

    assert_eq!(visitor.seen, vec!["conf/app.properties"]);
    assert_eq!(
        entry_names(ArchiveType::Zip, Cursor::new(&output)).unwrap(),
        entry_names(ArchiveType::Zip, Cursor::new(&input)).unwrap()
    );
    assert_eq!(
        read_entry(ArchiveType::Zip, &output, "conf/app.properties").as_deref(),
        Some("HOST=A")
    );
    assert_eq!(
        read_entry(ArchiveType::Zip, &output, "lib/readme.txt").as_deref(),
        Some("keep me")
    );
}

#[rstest]
#[case(ArchiveType::Jar)]
#[case(ArchiveType::War)]
#[case(ArchiveType::Ear)]
fn test_rewrite_java_archive_moves_manifest_first(#[case] kind: ArchiveType) {
    // zip tools happily write the manifest last
    let input = build_zip(&[
        ("app.properties", "x"),
        ("META-INF/", ""),
        (MANIFEST_ENTRY, "Manifest-Version: 1.0\n"),
    ]);
    let mut visitor = Shout {
        targets: &[],
        seen: Vec::new(),
    };

    let output = rewrite(kind, Cursor::new(input.clone()), Cursor::new(Vec::new()), &mut visitor)
        .unwrap()
        .into_inner();

    let names = entry_names(kind, Cursor::new(&output)).unwrap();
    assert_eq!(names, vec!["META-INF/", MANIFEST_ENTRY, "app.properties"]);

    let before: BTreeSet<_> = entry_names(kind, Cursor::new(&input)).unwrap().into_iter().collect();
    let after: BTreeSet<_> = names.into_iter().collect();
    assert_eq!(before, after);
}

#[rstest]
#[case("meta-inf/", "meta-inf/manifest.mf")]
#[case("Meta-Inf/", "META-INF/Manifest.MF")]
fn test_manifest_is_matched_ignoring_case(#[case] dir: &str, #[case] manifest: &str) {
    let input = build_zip(&[("app.properties", "x"), (dir, ""), (manifest, "Manifest-Version: 1.0\n")]);
    let mut visitor = Shout {
        targets: &[],
        seen: Vec::new(),
    };

    let output = rewrite(ArchiveType::Jar, Cursor::new(input), Cursor::new(Vec::new()), &mut visitor)
        .unwrap()
        .into_inner();

    assert_eq!(
        entry_names(ArchiveType::Jar, Cursor::new(&output)).unwrap(),
        vec![dir, manifest, "app.properties"]
    );
}

/// Collects the content of every entry it is offered.
#[derive(Default)]
struct Collect {
    found: Vec<(String, Vec<u8>)>,
}

impl EntryVisitor for Collect {
    fn wants(&mut self, _name: &str) -> bool {
        true
    }

    fn visit(&mut self, name: &str, data: &[u8]) -> crate::Result<Option<Vec<u8>>> {
        self.found.push((name.to_string(), data.to_vec()));
        Ok(None)
    }
}

#[rstest]
fn test_declared_entry_size_is_not_trusted() {
    let mut input = build_zip(&[("conf/app.properties", "host=a")]);
    // uncompressed size field of the central directory header
    let central = input
        .windows(4)
        .position(|w| w == b"PK\x01\x02")
        .unwrap();
    input[central + 24..central + 28].copy_from_slice(&0xFFFF_FFFEu32.to_le_bytes());

    let mut visitor = Collect::default();
    let result = for_each_entry(ArchiveType::Zip, Cursor::new(input), &mut visitor);

    if result.is_ok() {
        assert_eq!(
            visitor.found,
            vec![("conf/app.properties".to_string(), b"host=a".to_vec())]
        );
    }
}

#[rstest]
fn test_rewrite_plain_zip_does_not_reorder() {
    let input = build_zip(&[("a.txt", "a"), (MANIFEST_ENTRY, "m")]);
    let mut visitor = Shout {
        targets: &[],
        seen: Vec::new(),
    };

    let output = rewrite(ArchiveType::Zip, Cursor::new(input), Cursor::new(Vec::new()), &mut visitor)
        .unwrap()
        .into_inner();

    assert_eq!(
        entry_names(ArchiveType::Zip, Cursor::new(&output)).unwrap(),
        vec!["a.txt", MANIFEST_ENTRY]
    );
}

#[rstest]
fn test_rewrite_tar() {
    let input = build_tar(&[("./conf/app.properties", "host=a"), ("bin/run.sh", "echo")]);
    let mut visitor = Shout {
        targets: &["conf/app.properties"],
        seen: Vec::new(),
    };

    let output = rewrite(ArchiveType::Tar, Cursor::new(input), Cursor::new(Vec::new()), &mut visitor)
        .unwrap()
        .into_inner();

    assert_eq!(visitor.seen, vec!["conf/app.properties"]);
    assert_eq!(
        read_entry(ArchiveType::Tar, &output, "conf/app.properties").as_deref(),
        Some("HOST=A")
    );
    assert_eq!(read_entry(ArchiveType::Tar, &output, "bin/run.sh").as_deref(), Some("echo"));
}

#[rstest]
fn test_rewrite_rejects_garbage() {
    let mut visitor = Shout {
        targets: &[],
        seen: Vec::new(),
    };
    let result = rewrite(
        ArchiveType::Jar,
        Cursor::new(b"not a zip".to_vec()),
        Cursor::new(Vec::new()),
        &mut visitor,
    );
    assert!(result.is_err());
}
