// Copyright (c) Contributors to the Pacify project.
// SPDX-License-Identifier: Apache-2.0

use rstest::rstest;
use tempfile::TempDir;

use super::*;

#[rstest]
fn test_parse_properties() {
    let content = "# comment\n! also comment\n\n key = value \nflag\nurl=jdbc:x=y\n";
    let parsed = parse_properties(content);

    assert_eq!(
        parsed,
        vec![
            (4, "key".to_string(), "value".to_string()),
            (5, "flag".to_string(), String::new()),
            (6, "url".to_string(), "jdbc:x=y".to_string()),
        ]
    );
}

#[rstest]
fn test_map_resolver() {
    let resolver = MapResolver::new("cmdline").with("dbHost", "10.0.0.5");
    assert_eq!(resolver.resolve("dbHost").as_deref(), Some("10.0.0.5"));
    assert_eq!(resolver.resolve("missing"), None);
    assert_eq!(resolver.provenance("dbHost"), "cmdline");
}

#[rstest]
fn test_file_resolver_first_definition_wins() {
    let tmp = TempDir::new().unwrap();
    let first = tmp.path().join("first.properties");
    let second = tmp.path().join("second.properties");
    std::fs::write(&first, "dbHost=10.0.0.5\n").unwrap();
    std::fs::write(&second, "dbHost=10.0.0.6\nport=5432\n").unwrap();

    let resolver = FileResolver::load(&[&first, &second]).unwrap();
    assert_eq!(resolver.resolve("dbHost").as_deref(), Some("10.0.0.5"));
    assert_eq!(resolver.resolve("port").as_deref(), Some("5432"));
    assert_eq!(resolver.provenance("dbHost"), format!("{}:1", first.display()));

    let duplicates = resolver.duplicates();
    assert_eq!(duplicates.len(), 1);
    assert_eq!(duplicates[0].property, "dbHost");
    assert_eq!(duplicates[0].shadowed, format!("{}:1", second.display()));
}

#[rstest]
fn test_file_resolver_duplicate_within_one_file() {
    let tmp = TempDir::new().unwrap();
    let file = tmp.path().join("env.properties");
    std::fs::write(&file, "a=1\nb=2\na=3\n").unwrap();

    let resolver = FileResolver::load(&[&file]).unwrap();
    assert_eq!(resolver.resolve("a").as_deref(), Some("1"));

    let duplicates = resolver.duplicates();
    assert_eq!(duplicates.len(), 1);
    assert_eq!(duplicates[0].shadowed, format!("{}:3", file.display()));
    assert_eq!(resolver.provenance("a"), format!("{}:1", file.display()));
}

#[rstest]
fn test_file_resolver_unreadable_file() {
    let tmp = TempDir::new().unwrap();
    let missing = tmp.path().join("missing.properties");

    let result = FileResolver::load(&[&missing]);
    assert!(matches!(result, Err(crate::Error::ReadFailed { .. })));
}

#[rstest]
#[case(None, "HOME", Some("/root"))]
#[case(Some("PACIFY_"), "dbHost", Some("10.0.0.5"))]
#[case(Some("PACIFY_"), "HOME", None)]
fn test_env_resolver_prefix(
    #[case] prefix: Option<&str>,
    #[case] id: &str,
    #[case] expected: Option<&str>,
) {
    let vars = vec![("HOME", "/root"), ("PACIFY_dbHost", "10.0.0.5")];
    let resolver = EnvResolver::from_vars(prefix, vars);
    assert_eq!(resolver.resolve(id).as_deref(), expected);
}
