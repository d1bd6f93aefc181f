use relaxng::{Schema, parse_grammar};

fn schema(grammar: &str) -> Schema {
    Schema::compile(&parse_grammar(grammar).expect("parse grammar")).expect("compile")
}

fn valid(schema: &Schema, xml: &str) -> bool {
    schema.is_valid(xml).expect("well-formed xml")
}

const NESTED_NAMESPACES: &str = r#"<grammar xmlns="http://relaxng.org/ns/structure/1.0">
  <start><ref name="foo.element"/></start>
  <define name="foo.element">
    <element>
      <name ns="">foo</name>
      <group><ref name="bar1.element"/><ref name="bar2.element"/></group>
    </element>
  </define>
  <define name="bar1.element">
    <element><name ns="http://www.example.com/n1">bar1</name><empty/></element>
  </define>
  <define name="bar2.element">
    <element><name ns="http://www.example.com/n2">bar2</name><empty/></element>
  </define>
</grammar>"#;

#[test]
fn element_names_compare_namespace_and_local_name() {
    let s = schema(NESTED_NAMESPACES);
    assert!(valid(
        &s,
        r#"<foo><bar1 xmlns="http://www.example.com/n1"/><bar2 xmlns="http://www.example.com/n2"/></foo>"#
    ));
    assert!(valid(
        &s,
        r#"<foo xmlns:a="http://www.example.com/n1" xmlns:b="http://www.example.com/n2"><a:bar1/><b:bar2/></foo>"#
    ));
    assert!(!valid(&s, "<foo><bar1/><bar2/></foo>"));
    assert!(!valid(
        &s,
        r#"<foo xmlns="http://www.example.com/n1"><bar1/><bar2 xmlns="http://www.example.com/n2"/></foo>"#
    ));
}

#[test]
fn inherited_ns_applies_to_names() {
    let s = schema(
        r#"<grammar ns="urn:a">
  <start><ref name="item"/></start>
  <define name="item"><element><name>item</name><empty/></element></define>
</grammar>"#,
    );
    assert!(valid(&s, r#"<item xmlns="urn:a"/>"#));
    assert!(!valid(&s, "<item/>"));
}

#[test]
fn namespaced_attributes() {
    let s = schema(
        r#"<grammar>
  <start><ref name="e"/></start>
  <define name="e">
    <element>
      <name>e</name>
      <attribute><name ns="urn:x">id</name><text/></attribute>
    </element>
  </define>
</grammar>"#,
    );
    assert!(valid(&s, r#"<e xmlns:x="urn:x" x:id="1"/>"#));
    assert!(!valid(&s, r#"<e id="1"/>"#));
}

#[test]
fn unprefixed_attributes_have_no_namespace() {
    let s = schema(
        r#"<grammar ns="urn:a">
  <start><ref name="e"/></start>
  <define name="e">
    <element>
      <name>e</name>
      <attribute><name ns="">id</name></attribute>
    </element>
  </define>
</grammar>"#,
    );
    assert!(valid(&s, r#"<e xmlns="urn:a" id="1"/>"#));
}

#[test]
fn any_name_matches_everything_except_excluded() {
    let s = schema(
        r#"<grammar>
  <start><ref name="any"/></start>
  <define name="any">
    <element>
      <anyName><except><name>bad</name></except></anyName>
      <empty/>
    </element>
  </define>
</grammar>"#,
    );
    assert!(valid(&s, "<good/>"));
    assert!(valid(&s, r#"<bad xmlns="urn:other"/>"#));
    assert!(!valid(&s, "<bad/>"));
}

#[test]
fn ns_name_matches_its_namespace() {
    let s = schema(
        r#"<grammar>
  <start><ref name="x"/></start>
  <define name="x">
    <element>
      <nsName ns="urn:x"><except><name>no</name></except></nsName>
      <empty/>
    </element>
  </define>
</grammar>"#,
    );
    assert!(valid(&s, r#"<a xmlns="urn:x"/>"#));
    assert!(valid(&s, r#"<p:b xmlns:p="urn:x"/>"#));
    assert!(!valid(&s, "<a/>"));
    assert!(!valid(&s, r#"<no xmlns="urn:x"/>"#));
}

#[test]
fn name_class_choice() {
    let s = schema(
        r#"<grammar>
  <start><ref name="x"/></start>
  <define name="x">
    <element>
      <choice><name>one</name><name>two</name></choice>
      <empty/>
    </element>
  </define>
</grammar>"#,
    );
    assert!(valid(&s, "<one/>"));
    assert!(valid(&s, "<two/>"));
    assert!(!valid(&s, "<three/>"));
}

#[test]
fn any_attribute_name_with_one_or_more() {
    let s = schema(
        r#"<grammar>
  <start><ref name="e"/></start>
  <define name="e">
    <element>
      <name>e</name>
      <oneOrMore><attribute><anyName/></attribute></oneOrMore>
    </element>
  </define>
</grammar>"#,
    );
    assert!(valid(&s, r#"<e a="1"/>"#));
    assert!(valid(&s, r#"<e a="1" b="2" c="3"/>"#));
    assert!(!valid(&s, "<e/>"));
}
