//! RELAX NG compact syntax rendering of a simplified grammar.

use std::fmt;

use crate::grammar::{Data, Grammar, NameClass, Pattern, Value};

const XSD_DATATYPES: &str = "http://www.w3.org/2001/XMLSchema-datatypes";

const KEYWORDS: [&str; 19] = [
    "attribute",
    "default",
    "datatypes",
    "div",
    "element",
    "empty",
    "external",
    "grammar",
    "include",
    "inherit",
    "list",
    "mixed",
    "namespace",
    "notAllowed",
    "parent",
    "start",
    "string",
    "text",
    "token",
];

/// Display adapter: `Compact(&grammar).to_string()`.
pub struct Compact<'g>(pub &'g Grammar);

#[must_use]
pub fn to_compact(grammar: &Grammar) -> String {
    Compact(grammar).to_string()
}

impl fmt::Display for Compact<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let grammar = self.0;
        let renderer = Renderer::new(grammar);
        for (i, ns) in renderer.namespaces.iter().enumerate() {
            writeln!(f, "namespace ns{} = {}", i + 1, literal(ns))?;
        }
        if renderer.uses_xsd {
            writeln!(f, "datatypes xsd = {}", literal(XSD_DATATYPES))?;
        }
        for (i, library) in renderer.libraries.iter().enumerate() {
            writeln!(f, "datatypes dt{} = {}", i + 1, literal(library))?;
        }
        if renderer.uses_xsd || !renderer.namespaces.is_empty() || !renderer.libraries.is_empty()
        {
            writeln!(f)?;
        }
        let mut out = String::new();
        renderer.pattern(&mut out, &grammar.start);
        write!(f, "start = {out}")?;
        for define in &grammar.defines {
            out.clear();
            out.push_str("element ");
            renderer.name_class(&mut out, &define.name_class);
            out.push_str(" { ");
            renderer.pattern(&mut out, &define.pattern);
            out.push_str(" }");
            write!(f, "\n{} = {out}", identifier(&define.name))?;
        }
        Ok(())
    }
}

struct Renderer {
    namespaces: Vec<String>,
    /// Datatype libraries other than the built-in one and XSD, in first-use order.
    libraries: Vec<String>,
    uses_xsd: bool,
}

impl Renderer {
    fn new(grammar: &Grammar) -> Self {
        let mut namespaces = Vec::new();
        let mut all_libraries = Vec::new();
        collect_pattern_ns(&grammar.start, &mut namespaces);
        for define in &grammar.defines {
            collect_name_ns(&define.name_class, &mut namespaces);
            collect_pattern_ns(&define.pattern, &mut namespaces);
        }
        let patterns = grammar.defines.iter().map(|d| &d.pattern);
        for pattern in std::iter::once(&grammar.start).chain(patterns) {
            collect_libraries(pattern, &mut all_libraries);
        }
        let uses_xsd = all_libraries.iter().any(|l| l == XSD_DATATYPES);
        all_libraries.retain(|l| l != XSD_DATATYPES);
        Self {
            namespaces,
            libraries: all_libraries,
            uses_xsd,
        }
    }

    /// Compact name of a datatype. The built-in library only knows `string`
    /// and `token`; anything else there is validated as `token`.
    fn datatype_name(&self, library: &str, datatype: &str) -> String {
        match (library, datatype) {
            ("", "string") => "string".to_owned(),
            ("", _) => "token".to_owned(),
            (XSD_DATATYPES, name) => format!("xsd:{name}"),
            (library, name) => {
                let index = self
                    .libraries
                    .iter()
                    .position(|l| l == library)
                    .map_or(0, |i| i + 1);
                format!("dt{index}:{name}")
            }
        }
    }

    fn value(&self, out: &mut String, value: &Value) {
        let name = self.datatype_name(&value.datatype_library, &value.datatype);
        if name != "token" {
            out.push_str(&name);
            out.push(' ');
        }
        out.push_str(&literal(&value.text));
    }

    fn prefix(&self, ns: &str) -> Option<String> {
        self.namespaces
            .iter()
            .position(|n| n == ns)
            .map(|i| format!("ns{}", i + 1))
    }

    fn pattern(&self, out: &mut String, pattern: &Pattern) {
        match pattern {
            Pattern::NotAllowed => out.push_str("notAllowed"),
            Pattern::Empty => out.push_str("empty"),
            Pattern::Text => out.push_str("text"),
            Pattern::Data(data) => self.data(out, data),
            Pattern::Value(value) => self.value(out, value),
            Pattern::List(inner) => {
                out.push_str("list { ");
                self.pattern(out, inner);
                out.push_str(" }");
            }
            Pattern::Attribute(name_class, inner) => {
                out.push_str("attribute ");
                self.name_class(out, name_class);
                out.push_str(" { ");
                self.pattern(out, inner);
                out.push_str(" }");
            }
            Pattern::Ref(name) => out.push_str(&identifier(name)),
            Pattern::OneOrMore(inner) => {
                self.pattern(out, inner);
                out.push('+');
            }
            Pattern::Choice(..) | Pattern::Group(..) | Pattern::Interleave(..) => {
                let separator = match pattern {
                    Pattern::Choice(..) => " | ",
                    Pattern::Group(..) => ", ",
                    _ => " & ",
                };
                let mut operands = Vec::new();
                flatten(pattern, &mut operands);
                out.push('(');
                for (i, operand) in operands.into_iter().enumerate() {
                    if i > 0 {
                        out.push_str(separator);
                    }
                    self.pattern(out, operand);
                }
                out.push(')');
            }
        }
    }

    fn data(&self, out: &mut String, data: &Data) {
        let wrap = data.except.is_some();
        if wrap {
            out.push('(');
        }
        out.push_str(&self.datatype_name(&data.datatype_library, &data.datatype));
        if !data.params.is_empty() {
            out.push_str(" {");
            for param in &data.params {
                out.push_str(&format!(" {} = {}", param.name, literal(&param.text)));
            }
            out.push_str(" }");
        }
        if let Some(except) = &data.except {
            out.push_str(" - ");
            self.pattern(out, except);
            out.push(')');
        }
    }

    fn name_class(&self, out: &mut String, name_class: &NameClass) {
        match name_class {
            NameClass::AnyName { except } => {
                out.push('*');
                if let Some(except) = except {
                    out.push_str(" - ");
                    self.name_class(out, except);
                }
            }
            NameClass::NsName { ns, except } => {
                let prefix = self.prefix(ns).unwrap_or_default();
                out.push_str(&format!("{prefix}:*"));
                if let Some(except) = except {
                    out.push_str(" - ");
                    self.name_class(out, except);
                }
            }
            NameClass::Name { ns, local } => {
                if let Some(prefix) = self.prefix(ns) {
                    out.push_str(&format!("{prefix}:{local}"));
                } else {
                    out.push_str(&identifier(local));
                }
            }
            NameClass::Choice(left, right) => {
                out.push('(');
                self.name_class(out, left);
                out.push_str(" | ");
                self.name_class(out, right);
                out.push(')');
            }
        }
    }
}

fn flatten<'p>(pattern: &'p Pattern, out: &mut Vec<&'p Pattern>) {
    let (left, right) = match pattern {
        Pattern::Choice(l, r) | Pattern::Group(l, r) | Pattern::Interleave(l, r) => (l, r),
        _ => {
            out.push(pattern);
            return;
        }
    };
    for side in [left, right] {
        if std::mem::discriminant(&**side) == std::mem::discriminant(pattern) {
            flatten(&**side, out);
        } else {
            out.push(&**side);
        }
    }
}

fn collect_pattern_ns(pattern: &Pattern, out: &mut Vec<String>) {
    match pattern {
        Pattern::Attribute(name_class, inner) => {
            collect_name_ns(name_class, out);
            collect_pattern_ns(inner, out);
        }
        Pattern::List(inner) | Pattern::OneOrMore(inner) => collect_pattern_ns(inner, out),
        Pattern::Choice(l, r) | Pattern::Group(l, r) | Pattern::Interleave(l, r) => {
            collect_pattern_ns(l, out);
            collect_pattern_ns(r, out);
        }
        _ => {}
    }
}

fn collect_name_ns(name_class: &NameClass, out: &mut Vec<String>) {
    match name_class {
        NameClass::AnyName { except } => {
            if let Some(except) = except {
                collect_name_ns(except, out);
            }
        }
        NameClass::NsName { ns, except } => {
            add_ns(out, ns, true);
            if let Some(except) = except {
                collect_name_ns(except, out);
            }
        }
        NameClass::Name { ns, .. } => add_ns(out, ns, false),
        NameClass::Choice(l, r) => {
            collect_name_ns(l, out);
            collect_name_ns(r, out);
        }
    }
}

fn add_ns(out: &mut Vec<String>, ns: &str, force: bool) {
    if (force || !ns.is_empty()) && !out.iter().any(|n| n == ns) {
        out.push(ns.to_owned());
    }
}

fn collect_libraries(pattern: &Pattern, out: &mut Vec<String>) {
    match pattern {
        Pattern::Data(data) => {
            add_library(out, &data.datatype_library);
            if let Some(except) = &data.except {
                collect_libraries(except, out);
            }
        }
        Pattern::Value(value) => add_library(out, &value.datatype_library),
        Pattern::List(inner) | Pattern::OneOrMore(inner) | Pattern::Attribute(_, inner) => {
            collect_libraries(inner, out);
        }
        Pattern::Choice(l, r) | Pattern::Group(l, r) | Pattern::Interleave(l, r) => {
            collect_libraries(l, out);
            collect_libraries(r, out);
        }
        _ => {}
    }
}

fn add_library(out: &mut Vec<String>, library: &str) {
    if !library.is_empty() && !out.iter().any(|l| l == library) {
        out.push(library.to_owned());
    }
}

fn identifier(name: &str) -> String {
    if KEYWORDS.contains(&name) {
        format!("\\{name}")
    } else {
        name.to_owned()
    }
}

fn literal(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for ch in text.chars() {
        match ch {
            '"' => out.push_str("\\x{22}"),
            '\\' => out.push_str("\\x{5C}"),
            '\n' => out.push_str("\\x{A}"),
            '\r' => out.push_str("\\x{D}"),
            _ => out.push(ch),
        }
    }
    out.push('"');
    out
}
