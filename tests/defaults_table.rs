use relaxng::default_content;
use relaxng::defaults::{DEFAULTS, FORMATS, RELAXNG, XML};

#[test]
fn table_has_exactly_relaxng_and_xml() {
    let keys: Vec<&str> = DEFAULTS.iter().map(|(k, _)| *k).collect();
    assert_eq!(keys, vec!["relaxng", "xml"]);
    assert_eq!(FORMATS, ["relaxng", "xml"]);
}

#[test]
fn relaxng_entry_is_a_grammar_document() {
    let grammar = default_content("relaxng").expect("relaxng entry");
    assert!(!grammar.is_empty());
    assert!(grammar.starts_with("<grammar>"));
    assert!(grammar.ends_with("</grammar>"));
    assert_eq!(grammar, RELAXNG);
}

#[test]
fn xml_entry_is_exact_literal() {
    assert_eq!(default_content("xml"), Some(r#"<Whats up="E"/>"#));
    assert_eq!(XML, r#"<Whats up="E"/>"#);
}

#[test]
fn unknown_format_has_no_entry() {
    assert_eq!(default_content("json"), None);
    assert_eq!(default_content(""), None);
    assert_eq!(default_content("RELAXNG"), None);
}

#[test]
fn repeated_lookups_return_the_same_text() {
    let first = default_content("relaxng");
    let second = default_content("relaxng");
    assert_eq!(first, second);
    assert!(std::ptr::eq(
        first.expect("first"),
        second.expect("second")
    ));
    for (key, value) in DEFAULTS {
        assert_eq!(default_content(key), Some(value));
    }
}

#[test]
fn default_grammar_parses_with_one_define() {
    let grammar = relaxng::parse_grammar(RELAXNG).expect("parse");
    assert_eq!(grammar.defines.len(), 1);
    assert_eq!(grammar.defines[0].name, "element1");
}
