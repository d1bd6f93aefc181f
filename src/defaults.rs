//! Default editor contents, keyed by format.

pub const RELAXNG: &str = r#"<grammar>
    <start>
        <ref name="element1"></ref>
    </start>
    <define name="element1">
        <element>
            <name>Whats</name>
            <attribute>
                <name>up</name>
                <text></text>
            </attribute>
        </element>
    </define>
</grammar>"#;

pub const XML: &str = r#"<Whats up="E"/>"#;

pub const FORMATS: [&str; 2] = ["relaxng", "xml"];

pub static DEFAULTS: [(&str, &str); 2] = [("relaxng", RELAXNG), ("xml", XML)];

#[must_use]
pub fn default_content(format: &str) -> Option<&'static str> {
    match format {
        "relaxng" => Some(RELAXNG),
        "xml" => Some(XML),
        _ => None,
    }
}
