//! Simplified RELAX NG grammar model and its XML syntax.
//!
//! ```text
//! grammar   ::= <grammar> <start> top </start> define* </grammar>
//! define    ::= <define name="NCName"> <element> nameClass top </element> </define>
//! top       ::= <notAllowed/> | Pattern
//! Pattern   ::= <empty/> | <text/>
//!             | <data type datatypeLibrary> param* [exceptPattern] </data>
//!             | <value datatypeLibrary type ns> string </value>
//!             | <list> Pattern </list>
//!             | <attribute> nameClass Pattern </attribute>
//!             | <ref name="NCName"/>
//!             | <oneOrMore> Pattern </oneOrMore>
//!             | <choice> Pattern Pattern </choice>
//!             | <group> Pattern Pattern </group>
//!             | <interleave> Pattern Pattern </interleave>
//! nameClass ::= <anyName> [exceptNameClass] </anyName>
//!             | <nsName ns> [exceptNameClass] </nsName>
//!             | <name ns> NCName </name>
//!             | <choice> nameClass nameClass </choice>
//! ```

use std::borrow::Cow;
use std::fmt;

use roxmltree::{Document, Node, ParsingOptions};
use tracing::debug;

use crate::error::{Error, Result};

/// Placeholder namespace left behind by some full-to-simplified converters.
pub const TODO_NS: &str = "TODO";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grammar {
    pub start: Pattern,
    pub defines: Vec<Define>,
}

/// A named element declaration. Every define in simplified form wraps exactly one element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Define {
    pub name: String,
    pub name_class: NameClass,
    pub pattern: Pattern,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pattern {
    NotAllowed,
    Empty,
    Text,
    Data(Data),
    Value(Value),
    List(Box<Pattern>),
    Attribute(NameClass, Box<Pattern>),
    Ref(String),
    OneOrMore(Box<Pattern>),
    Choice(Box<Pattern>, Box<Pattern>),
    /// Ordered, except that attributes may appear in any order in the start tag.
    Group(Box<Pattern>, Box<Pattern>),
    Interleave(Box<Pattern>, Box<Pattern>),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Data {
    pub datatype: String,
    pub datatype_library: String,
    pub params: Vec<Param>,
    pub except: Option<Box<Pattern>>,
}

impl Data {
    /// Only `string` preserves whitespace; an empty type means `token`.
    #[must_use]
    pub fn is_string(&self) -> bool {
        self.datatype == "string"
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Value {
    pub datatype: String,
    pub datatype_library: String,
    pub ns: String,
    pub text: String,
}

impl Value {
    #[must_use]
    pub fn is_string(&self) -> bool {
        self.datatype == "string"
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameClass {
    AnyName {
        except: Option<Box<NameClass>>,
    },
    NsName {
        ns: String,
        except: Option<Box<NameClass>>,
    },
    Name {
        ns: String,
        local: String,
    },
    Choice(Box<NameClass>, Box<NameClass>),
}

/// Parse a simplified RELAX NG grammar.
///
/// # Errors
///
/// Returns [`Error::Xml`] when the text is not well-formed and
/// [`Error::Grammar`] when it is not a simplified grammar.
pub fn parse_grammar(text: &str) -> Result<Grammar> {
    let doc = Document::parse_with_options(
        text,
        ParsingOptions {
            allow_dtd: true,
            ..ParsingOptions::default()
        },
    )?;
    let root = doc.root_element();
    if local(root) != "grammar" {
        return Err(Error::grammar(format!(
            "expected root element grammar, found {}",
            local(root)
        )));
    }
    let ns = root.attribute("ns").unwrap_or("");

    let mut start = None;
    let mut defines = Vec::new();
    for child in elements(root) {
        match local(child) {
            "start" => {
                if start.is_some() {
                    return Err(Error::grammar("grammar has more than one start"));
                }
                start = Some(group_of(child, inherited(child, ns))?);
            }
            "define" => defines.push(parse_define(child, inherited(child, ns))?),
            other => {
                return Err(Error::grammar(format!(
                    "unexpected element {other} in grammar"
                )));
            }
        }
    }
    let Some(start) = start else {
        return Err(Error::grammar("grammar has no start"));
    };
    debug!(defines = defines.len(), "parsed grammar");
    Ok(Grammar { start, defines })
}

fn parse_define(node: Node<'_, '_>, ns: &str) -> Result<Define> {
    let name = required_attribute(node, "name")?;
    let mut kids = elements(node);
    let element = match (kids.next(), kids.next()) {
        (Some(element), None) if local(element) == "element" => element,
        _ => {
            return Err(Error::grammar(format!(
                "define {name} must contain exactly one element"
            )));
        }
    };
    let ns = inherited(element, ns);
    let mut parts = elements(element);
    let (Some(first), Some(_)) = (parts.next(), parts.next()) else {
        return Err(Error::grammar(format!(
            "element in define {name} must contain a name class and a pattern"
        )));
    };
    let name_class = parse_name_class(first, inherited(first, ns))?;
    let pattern = fold(elements(element).skip(1), ns, Pattern::Group, "element")?;
    Ok(Define {
        name: name.to_owned(),
        name_class,
        pattern,
    })
}

fn parse_pattern(node: Node<'_, '_>, ns: &str) -> Result<Pattern> {
    let ns = inherited(node, ns);
    let pattern = match local(node) {
        "notAllowed" => Pattern::NotAllowed,
        "empty" => Pattern::Empty,
        "text" => Pattern::Text,
        "data" => Pattern::Data(parse_data(node, ns)?),
        "value" => Pattern::Value(Value {
            datatype: node.attribute("type").unwrap_or_default().to_owned(),
            datatype_library: node
                .attribute("datatypeLibrary")
                .unwrap_or_default()
                .to_owned(),
            ns: ns.to_owned(),
            text: text_content(node),
        }),
        "list" => Pattern::List(Box::new(group_of(node, ns)?)),
        "attribute" => {
            let Some(first) = elements(node).next() else {
                return Err(Error::grammar("attribute must contain a name class"));
            };
            let name_class = parse_name_class(first, inherited(first, ns))?;
            let content = if elements(node).nth(1).is_some() {
                fold(elements(node).skip(1), ns, Pattern::Group, "attribute")?
            } else {
                Pattern::Text
            };
            Pattern::Attribute(name_class, Box::new(content))
        }
        "ref" => Pattern::Ref(required_attribute(node, "name")?.to_owned()),
        "oneOrMore" => Pattern::OneOrMore(Box::new(group_of(node, ns)?)),
        "choice" => fold(elements(node), ns, Pattern::Choice, "choice")?,
        "group" => group_of(node, ns)?,
        "interleave" => fold(elements(node), ns, Pattern::Interleave, "interleave")?,
        other => return Err(Error::grammar(format!("unknown pattern {other}"))),
    };
    Ok(pattern)
}

fn parse_data(node: Node<'_, '_>, ns: &str) -> Result<Data> {
    let mut data = Data {
        datatype: node.attribute("type").unwrap_or_default().to_owned(),
        datatype_library: node
            .attribute("datatypeLibrary")
            .unwrap_or_default()
            .to_owned(),
        ..Data::default()
    };
    for child in elements(node) {
        match local(child) {
            "param" => data.params.push(Param {
                name: required_attribute(child, "name")?.to_owned(),
                text: text_content(child),
            }),
            "except" if data.except.is_none() => {
                data.except = Some(Box::new(group_of(child, inherited(child, ns))?));
            }
            other => {
                return Err(Error::grammar(format!("unexpected element {other} in data")));
            }
        }
    }
    Ok(data)
}

fn parse_name_class(node: Node<'_, '_>, ns: &str) -> Result<NameClass> {
    match local(node) {
        "anyName" => Ok(NameClass::AnyName {
            except: parse_name_except(node, ns)?,
        }),
        "nsName" => Ok(NameClass::NsName {
            ns: ns.to_owned(),
            except: parse_name_except(node, ns)?,
        }),
        "name" => Ok(NameClass::Name {
            ns: ns.to_owned(),
            local: text_content(node).trim().to_owned(),
        }),
        "choice" => {
            let mut classes = elements(node).map(|c| parse_name_class(c, inherited(c, ns)));
            let Some(first) = classes.next() else {
                return Err(Error::grammar("choice must contain at least one name class"));
            };
            classes.try_fold(first?, |acc, next| {
                Ok::<_, Error>(NameClass::Choice(Box::new(acc), Box::new(next?)))
            })
        }
        other => Err(Error::grammar(format!("unknown name class {other}"))),
    }
}

fn parse_name_except(node: Node<'_, '_>, ns: &str) -> Result<Option<Box<NameClass>>> {
    let mut except = None;
    for child in elements(node) {
        if local(child) != "except" || except.is_some() {
            return Err(Error::grammar(format!(
                "unexpected element {} in {}",
                local(child),
                local(node)
            )));
        }
        let ns = inherited(child, ns);
        let mut classes = elements(child).map(|c| parse_name_class(c, inherited(c, ns)));
        let Some(first) = classes.next() else {
            return Err(Error::grammar("except must contain at least one name class"));
        };
        let class = classes.try_fold(first?, |acc, next| {
            Ok::<_, Error>(NameClass::Choice(Box::new(acc), Box::new(next?)))
        })?;
        except = Some(Box::new(class));
    }
    Ok(except)
}

fn group_of(node: Node<'_, '_>, ns: &str) -> Result<Pattern> {
    fold(elements(node), ns, Pattern::Group, local(node))
}

fn fold<'a, 'i: 'a>(
    mut nodes: impl Iterator<Item = Node<'a, 'i>>,
    ns: &str,
    join: fn(Box<Pattern>, Box<Pattern>) -> Pattern,
    owner: &str,
) -> Result<Pattern> {
    let Some(first) = nodes.next() else {
        return Err(Error::grammar(format!(
            "{owner} must contain at least one pattern"
        )));
    };
    let mut acc = parse_pattern(first, ns)?;
    for node in nodes {
        acc = join(Box::new(acc), Box::new(parse_pattern(node, ns)?));
    }
    Ok(acc)
}

fn elements<'a, 'i>(node: Node<'a, 'i>) -> impl Iterator<Item = Node<'a, 'i>> {
    node.children().filter(Node::is_element)
}

fn local<'a>(node: Node<'a, '_>) -> &'a str {
    node.tag_name().name()
}

fn inherited<'a>(node: Node<'a, '_>, ns: &'a str) -> &'a str {
    node.attribute("ns").unwrap_or(ns)
}

fn text_content(node: Node<'_, '_>) -> String {
    node.descendants()
        .filter(Node::is_text)
        .filter_map(|n| n.text())
        .collect()
}

fn required_attribute<'a>(node: Node<'a, '_>, name: &str) -> Result<&'a str> {
    node.attribute(name).ok_or_else(|| {
        Error::grammar(format!(
            "{} is missing required attribute {name}",
            local(node)
        ))
    })
}

/// Clear every `ns="TODO"` placeholder in the grammar.
pub fn remove_todos(grammar: &mut Grammar) {
    clear_pattern(&mut grammar.start);
    for define in &mut grammar.defines {
        clear_name_class(&mut define.name_class);
        clear_pattern(&mut define.pattern);
    }
}

fn clear_ns(ns: &mut String) {
    if ns == TODO_NS {
        ns.clear();
    }
}

fn clear_pattern(pattern: &mut Pattern) {
    match pattern {
        Pattern::NotAllowed | Pattern::Empty | Pattern::Text | Pattern::Ref(_) => {}
        Pattern::Data(data) => {
            if let Some(except) = data.except.as_deref_mut() {
                clear_pattern(except);
            }
        }
        Pattern::Value(value) => clear_ns(&mut value.ns),
        Pattern::List(inner) | Pattern::OneOrMore(inner) => clear_pattern(inner),
        Pattern::Attribute(name_class, inner) => {
            clear_name_class(name_class);
            clear_pattern(inner);
        }
        Pattern::Choice(left, right)
        | Pattern::Group(left, right)
        | Pattern::Interleave(left, right) => {
            clear_pattern(left);
            clear_pattern(right);
        }
    }
}

fn clear_name_class(name_class: &mut NameClass) {
    match name_class {
        NameClass::AnyName { except } => {
            if let Some(except) = except.as_deref_mut() {
                clear_name_class(except);
            }
        }
        NameClass::NsName { ns, except } => {
            clear_ns(ns);
            if let Some(except) = except.as_deref_mut() {
                clear_name_class(except);
            }
        }
        NameClass::Name { ns, .. } => clear_ns(ns),
        NameClass::Choice(left, right) => {
            clear_name_class(left);
            clear_name_class(right);
        }
    }
}

impl fmt::Display for Grammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "<grammar>")?;
        writeln!(f, "\t<start>")?;
        write_pattern(f, &self.start, 2)?;
        writeln!(f, "\t</start>")?;
        for define in &self.defines {
            writeln!(f, "\t<define name=\"{}\">", escape(&define.name))?;
            writeln!(f, "\t\t<element>")?;
            write_name_class(f, &define.name_class, 3, "")?;
            write_pattern(f, &define.pattern, 3)?;
            writeln!(f, "\t\t</element>")?;
            writeln!(f, "\t</define>")?;
        }
        write!(f, "</grammar>")
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_pattern(f, self, 0)
    }
}

fn indent(f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
    for _ in 0..depth {
        f.write_str("\t")?;
    }
    Ok(())
}

fn write_pattern(f: &mut fmt::Formatter<'_>, pattern: &Pattern, depth: usize) -> fmt::Result {
    indent(f, depth)?;
    match pattern {
        Pattern::NotAllowed => writeln!(f, "<notAllowed/>"),
        Pattern::Empty => writeln!(f, "<empty/>"),
        Pattern::Text => writeln!(f, "<text/>"),
        Pattern::Data(data) => {
            f.write_str("<data")?;
            write_attribute(f, "type", &data.datatype)?;
            write_attribute(f, "datatypeLibrary", &data.datatype_library)?;
            if data.params.is_empty() && data.except.is_none() {
                return writeln!(f, "/>");
            }
            writeln!(f, ">")?;
            for param in &data.params {
                indent(f, depth + 1)?;
                writeln!(
                    f,
                    "<param name=\"{}\">{}</param>",
                    escape(&param.name),
                    escape(&param.text)
                )?;
            }
            if let Some(except) = &data.except {
                indent(f, depth + 1)?;
                writeln!(f, "<except>")?;
                write_pattern(f, except, depth + 2)?;
                indent(f, depth + 1)?;
                writeln!(f, "</except>")?;
            }
            indent(f, depth)?;
            writeln!(f, "</data>")
        }
        Pattern::Value(value) => {
            f.write_str("<value")?;
            write_attribute(f, "type", &value.datatype)?;
            write_attribute(f, "datatypeLibrary", &value.datatype_library)?;
            write_attribute(f, "ns", &value.ns)?;
            writeln!(f, ">{}</value>", escape(&value.text))
        }
        Pattern::List(inner) => write_wrapped(f, "list", &[&**inner], depth),
        Pattern::Attribute(name_class, inner) => {
            writeln!(f, "<attribute>")?;
            write_name_class(f, name_class, depth + 1, "")?;
            write_pattern(f, inner, depth + 1)?;
            indent(f, depth)?;
            writeln!(f, "</attribute>")
        }
        Pattern::Ref(name) => writeln!(f, "<ref name=\"{}\"/>", escape(name)),
        Pattern::OneOrMore(inner) => write_wrapped(f, "oneOrMore", &[&**inner], depth),
        Pattern::Choice(left, right) => write_wrapped(f, "choice", &[&**left, &**right], depth),
        Pattern::Group(left, right) => write_wrapped(f, "group", &[&**left, &**right], depth),
        Pattern::Interleave(left, right) => {
            write_wrapped(f, "interleave", &[&**left, &**right], depth)
        }
    }
}

fn write_wrapped(
    f: &mut fmt::Formatter<'_>,
    tag: &str,
    children: &[&Pattern],
    depth: usize,
) -> fmt::Result {
    writeln!(f, "<{tag}>")?;
    for child in children {
        write_pattern(f, child, depth + 1)?;
    }
    indent(f, depth)?;
    writeln!(f, "</{tag}>")
}

fn write_name_class(
    f: &mut fmt::Formatter<'_>,
    name_class: &NameClass,
    depth: usize,
    context_ns: &str,
) -> fmt::Result {
    indent(f, depth)?;
    match name_class {
        NameClass::AnyName { except } => {
            let Some(except) = except else {
                return writeln!(f, "<anyName/>");
            };
            writeln!(f, "<anyName>")?;
            write_name_except(f, except, depth + 1, context_ns)?;
            indent(f, depth)?;
            writeln!(f, "</anyName>")
        }
        NameClass::NsName { ns, except } => {
            write!(f, "<nsName ns=\"{}\"", escape(ns))?;
            let Some(except) = except else {
                return writeln!(f, "/>");
            };
            writeln!(f, ">")?;
            write_name_except(f, except, depth + 1, ns)?;
            indent(f, depth)?;
            writeln!(f, "</nsName>")
        }
        NameClass::Name { ns, local } => {
            f.write_str("<name")?;
            if ns != context_ns {
                write!(f, " ns=\"{}\"", escape(ns))?;
            }
            writeln!(f, ">{}</name>", escape(local))
        }
        NameClass::Choice(left, right) => {
            writeln!(f, "<choice>")?;
            write_name_class(f, left, depth + 1, context_ns)?;
            write_name_class(f, right, depth + 1, context_ns)?;
            indent(f, depth)?;
            writeln!(f, "</choice>")
        }
    }
}

fn write_name_except(
    f: &mut fmt::Formatter<'_>,
    except: &NameClass,
    depth: usize,
    context_ns: &str,
) -> fmt::Result {
    indent(f, depth)?;
    writeln!(f, "<except>")?;
    write_name_class(f, except, depth + 1, context_ns)?;
    indent(f, depth)?;
    writeln!(f, "</except>")
}

fn write_attribute(f: &mut fmt::Formatter<'_>, name: &str, value: &str) -> fmt::Result {
    if value.is_empty() {
        return Ok(());
    }
    write!(f, " {name}=\"{}\"", escape(value))
}

fn escape(text: &str) -> Cow<'_, str> {
    if !text.contains(['&', '<', '>', '"']) {
        return Cow::Borrowed(text);
    }
    let mut out = String::with_capacity(text.len() + 8);
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    Cow::Owned(out)
}
