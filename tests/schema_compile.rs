use relaxng::grammar::{Define, Grammar, NameClass, Pattern, Value};
use relaxng::{Error, Schema, parse_grammar, remove_todos};

fn compile_error(text: &str) -> String {
    let grammar = parse_grammar(text).expect("parse");
    match Schema::compile(&grammar) {
        Err(Error::Compile(msg)) => msg,
        other => panic!("expected compile error, got {other:?}"),
    }
}

#[test]
fn undefined_reference() {
    let msg = compile_error(r#"<grammar><start><ref name="nope"/></start></grammar>"#);
    assert_eq!(msg, "reference to undefined define nope");
}

#[test]
fn undefined_reference_inside_define() {
    let msg = compile_error(
        r#"<grammar>
  <start><ref name="a"/></start>
  <define name="a"><element><name>a</name><ref name="b"/></element></define>
</grammar>"#,
    );
    assert_eq!(msg, "reference to undefined define b");
}

#[test]
fn duplicate_define() {
    let msg = compile_error(
        r#"<grammar>
  <start><ref name="a"/></start>
  <define name="a"><element><name>a</name><empty/></element></define>
  <define name="a"><element><name>b</name><empty/></element></define>
</grammar>"#,
    );
    assert_eq!(msg, "define a is declared more than once");
}

#[test]
fn recursive_defines_compile_and_validate() {
    let grammar = parse_grammar(
        r#"<grammar>
  <start><ref name="node"/></start>
  <define name="node">
    <element>
      <name>node</name>
      <choice><empty/><oneOrMore><ref name="node"/></oneOrMore></choice>
    </element>
  </define>
</grammar>"#,
    )
    .expect("parse");
    let schema = Schema::compile(&grammar).expect("compile");
    assert_eq!(schema.elements().len(), 1);
    assert_eq!(schema.elements()[0].name, "node");
    assert!(
        schema
            .is_valid("<node><node/><node><node/></node></node>")
            .expect("xml")
    );
    assert!(!schema.is_valid("<node><leaf/></node>").expect("xml"));
}

fn todo_value() -> Pattern {
    Pattern::Value(Value {
        ns: "TODO".into(),
        text: "Hello".into(),
        ..Value::default()
    })
}

#[test]
fn remove_todos_clears_placeholder_namespaces() {
    let mut g = Grammar {
        start: todo_value(),
        defines: vec![Define {
            name: "a".into(),
            name_class: NameClass::Name {
                ns: "TODO".into(),
                local: "a".into(),
            },
            pattern: todo_value(),
        }],
    };
    remove_todos(&mut g);
    let Pattern::Value(start) = &g.start else {
        panic!("start changed kind");
    };
    assert_eq!(start.ns, "");
    assert_eq!(start.text, "Hello");
    let Pattern::Value(inner) = &g.defines[0].pattern else {
        panic!("define changed kind");
    };
    assert_eq!(inner.ns, "");
    assert_eq!(
        g.defines[0].name_class,
        NameClass::Name {
            ns: String::new(),
            local: "a".into(),
        }
    );
}

#[test]
fn remove_todos_keeps_real_namespaces() {
    let mut g = parse_grammar(
        r#"<grammar>
  <start><ref name="a"/></start>
  <define name="a">
    <element>
      <name ns="urn:keep">a</name>
      <attribute><nsName ns="TODO"/></attribute>
    </element>
  </define>
</grammar>"#,
    )
    .expect("parse");
    remove_todos(&mut g);
    assert_eq!(
        g.defines[0].name_class,
        NameClass::Name {
            ns: "urn:keep".into(),
            local: "a".into(),
        }
    );
    assert_eq!(
        g.defines[0].pattern,
        Pattern::Attribute(
            NameClass::NsName {
                ns: String::new(),
                except: None,
            },
            Box::new(Pattern::Text),
        )
    );
}

#[test]
fn todo_names_match_unqualified_elements_after_removal() {
    let text = r#"<grammar>
  <start><ref name="a"/></start>
  <define name="a"><element><name ns="TODO">a</name><empty/></element></define>
</grammar>"#;
    let g = parse_grammar(text).expect("parse");
    let raw = Schema::compile(&g).expect("compile");
    assert!(!raw.is_valid("<a/>").expect("xml"));

    let mut cleaned = g;
    remove_todos(&mut cleaned);
    let schema = Schema::compile(&cleaned).expect("compile");
    assert!(schema.is_valid("<a/>").expect("xml"));
}
