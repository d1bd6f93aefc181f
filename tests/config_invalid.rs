use relaxng::config::{RuleLevel, ValidatorConfig};

fn err(yaml: &str) -> String {
    ValidatorConfig::from_yaml_str(yaml).expect_err("config should be rejected")
}

#[test]
fn top_level_must_be_a_mapping() {
    assert_eq!(err("- a\n- b\n"), "invalid config: not a mapping");
}

#[test]
fn yaml_syntax_errors_are_reported() {
    assert!(err("rules: [\n").starts_with("failed to parse config data:"));
}

#[test]
fn unknown_rule_is_rejected() {
    assert_eq!(
        err("rules:\n  indentation: enable\n"),
        "invalid config: unknown rule 'indentation'"
    );
}

#[test]
fn rule_values_are_checked() {
    assert_eq!(
        err("rules:\n  malformed-encoding: sometimes\n"),
        "invalid config: rule 'malformed-encoding' should be 'enable', 'disable', or a mapping"
    );
    assert_eq!(
        err("rules:\n  malformed-encoding:\n    level: fatal\n"),
        "invalid config: rule 'malformed-encoding' level should be \"error\" or \"warning\""
    );
    assert_eq!(
        err("rules:\n  malformed-encoding:\n    max: 3\n"),
        "invalid config: unknown option \"max\" for rule \"malformed-encoding\""
    );
    assert_eq!(err("rules: [a]\n"), "invalid config: rules should be a mapping");
}

#[test]
fn ignore_and_ignore_from_file_are_exclusive() {
    assert_eq!(
        err("ignore: ['a']\nignore-from-file: b\n"),
        "invalid config: ignore and ignore-from-file keys cannot be used together"
    );
}

#[test]
fn ignore_entries_must_be_strings() {
    assert_eq!(
        err("ignore: [1, 2]\n"),
        "invalid config: ignore should contain file patterns"
    );
    assert!(err("ignore-from-file: {a: b}\n").starts_with("invalid config: ignore-from-file"));
}

#[test]
fn xml_files_must_be_a_list_of_strings() {
    let expected = "invalid config: xml-files should be a list of file patterns";
    assert_eq!(err("xml-files: '*.xml'\n"), expected);
    assert_eq!(err("xml-files: ['*.xml', 3]\n"), expected);
}

#[test]
fn grammar_and_remove_todos_types() {
    assert_eq!(
        err("grammar: [a, b]\n"),
        "invalid config: grammar should be a file path"
    );
    assert_eq!(
        err("remove-todos: maybe\n"),
        "invalid config: remove-todos should be true or false"
    );
}

#[test]
fn extends_a_file_needs_filesystem_access() {
    assert_eq!(
        err("extends: other.yml\n"),
        "invalid config: extends 'other.yml' requires filesystem access for resolution"
    );
}

#[test]
fn rule_levels() {
    let cfg = ValidatorConfig::from_yaml_str("rules:\n  malformed-encoding: enable\n").unwrap();
    assert_eq!(cfg.rule_level("malformed-encoding"), Some(RuleLevel::Error));

    let cfg = ValidatorConfig::from_yaml_str("rules:\n  malformed-encoding: disable\n").unwrap();
    assert_eq!(cfg.rule_level("malformed-encoding"), None);

    let cfg = ValidatorConfig::from_yaml_str("rules:\n  malformed-encoding: {}\n").unwrap();
    assert_eq!(cfg.rule_level("malformed-encoding"), Some(RuleLevel::Error));

    let cfg = ValidatorConfig::from_yaml_str("").unwrap();
    assert_eq!(cfg.rule_level("malformed-encoding"), None);
    assert!(cfg.remove_todos());
}

#[test]
fn presets_extend_each_other() {
    let cfg = ValidatorConfig::from_yaml_str("extends: default\n").unwrap();
    assert_eq!(cfg.rule_level("malformed-encoding"), Some(RuleLevel::Warning));

    let cfg = ValidatorConfig::from_yaml_str("extends: strict\n").unwrap();
    assert_eq!(cfg.rule_level("malformed-encoding"), Some(RuleLevel::Error));

    let cfg = ValidatorConfig::from_yaml_str(
        "extends: strict\nrules:\n  malformed-encoding:\n    level: warning\n",
    )
    .unwrap();
    assert_eq!(cfg.rule_level("malformed-encoding"), Some(RuleLevel::Warning));

    for name in relaxng::conf::PRESETS {
        assert!(relaxng::conf::builtin(name).is_some(), "{name}");
    }
    assert!(relaxng::conf::builtin("relaxed").is_none());
}
