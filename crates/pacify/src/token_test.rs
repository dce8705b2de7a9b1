// Copyright (c) Contributors to the Pacify project.
// SPDX-License-Identifier: Apache-2.0

use rstest::rstest;

use super::*;

fn names(found: &[Placeholder]) -> Vec<&str> {
    found.iter().map(|p| p.name.as_str()).collect()
}

#[rstest]
fn test_find_single_placeholder() {
    let content = "host=%{dbHost}";
    let tokens = Tokens::new("%{", "}");
    let found = find_placeholders(content, &[0..content.len()], &tokens);

    assert_eq!(names(&found), vec!["dbHost"]);
    assert_eq!(&content[found[0].range.clone()], "%{dbHost}");
}

#[rstest]
#[case("@@", "@@", "a=@@one@@ b=@@two@@", vec!["one", "two"])]
#[case("%{", "}", "url=%{db.host}:%{db-port}", vec!["db.host", "db-port"])]
#[case("%{", "}", "%{} %{has space} %{ok}", vec!["ok"])]
#[case("%{", "}", "%{unterminated", vec![])]
#[case("${", "}", "$${nested}", vec!["nested"])]
#[case("__", "__", "host=__dbHost__", vec!["dbHost"])]
#[case("__", "__", "a=__db_host__ b=__port__", vec!["db_host", "port"])]
#[case("[", "_]", "[name_] [other_]", vec!["name", "other"])]
#[case("..", "..", "a=..x.. b=..y..", vec!["x", "y"])]
#[case(".", ".", "a=.host.", vec!["host"])]
#[case("-", "-", "-a- -b-", vec!["a", "b"])]
#[case("<", "-->", "<db.host-->", vec!["db.host"])]
fn test_find_placeholders(
    #[case] begin: &str,
    #[case] end: &str,
    #[case] content: &str,
    #[case] expected: Vec<&str>,
) {
    let tokens = Tokens::new(begin, end);
    let found = find_placeholders(content, &[0..content.len()], &tokens);
    assert_eq!(names(&found), expected);
}

#[rstest]
fn test_find_respects_ranges() {
    let content = "# %{ignored}\nkey=%{used}\n";
    let tokens = Tokens::new("%{", "}");
    let second_line = 13..content.len();
    let found = find_placeholders(content, &[second_line], &tokens);

    assert_eq!(names(&found), vec!["used"]);
    assert_eq!(&content[found[0].range.clone()], "%{used}");
}

#[rstest]
fn test_find_with_empty_tokens() {
    let tokens = Tokens::new("", "}");
    assert!(find_placeholders("%{a}", &[0..4], &tokens).is_empty());
}

#[rstest]
fn test_substitute_keeps_missing_values() {
    let content = "a=%{one} b=%{two}";
    let tokens = Tokens::new("%{", "}");
    let found = find_placeholders(content, &[0..content.len()], &tokens);

    let out = substitute(content, 0..content.len(), &found, |name| {
        (name == "one").then(|| "1".to_string())
    });
    assert_eq!(out, "a=1 b=%{two}");
}

#[rstest]
fn test_substitute_value_containing_tokens_is_not_rescanned() {
    let content = "x=%{a}";
    let tokens = Tokens::new("%{", "}");
    let found = find_placeholders(content, &[0..content.len()], &tokens);

    let out = substitute(content, 0..content.len(), &found, |_| Some("%{a}".to_string()));
    assert_eq!(out, "x=%{a}");
}
