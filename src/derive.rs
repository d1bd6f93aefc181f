//! Derivative-based validation.
//!
//! The schema is an expression; each start tag, attribute, text node and end
//! tag replaces it with its derivative. A document is valid when the final
//! expression is nullable. `After(p, q)` means "finish `p` inside the current
//! element, then continue with `q`".

use std::sync::Arc;

use roxmltree::Node;

use crate::datatype::{Datatype, ValueMatch, is_blank, tokens};
use crate::document::{Child, Instance, QName, attributes, children, element_name};
use crate::error::Violation;
use crate::grammar::NameClass;
use crate::schema::{ElementDecl, Schema};

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Empty,
    NotAllowed,
    Text,
    Choice(Arc<Expr>, Arc<Expr>),
    Interleave(Arc<Expr>, Arc<Expr>),
    Group(Arc<Expr>, Arc<Expr>),
    OneOrMore(Arc<Expr>),
    List(Arc<Expr>),
    Data(Arc<Datatype>),
    DataExcept(Arc<Datatype>, Arc<Expr>),
    Value(ValueMatch),
    Attribute(Arc<NameClass>, Arc<Expr>),
    /// Index into [`Schema::elements`].
    Element(usize),
    After(Arc<Expr>, Arc<Expr>),
}

impl Expr {
    const fn is_not_allowed(&self) -> bool {
        matches!(self, Self::NotAllowed)
    }

    const fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

#[must_use]
pub fn empty() -> Arc<Expr> {
    Arc::new(Expr::Empty)
}

#[must_use]
pub fn not_allowed() -> Arc<Expr> {
    Arc::new(Expr::NotAllowed)
}

fn same(a: &Arc<Expr>, b: &Arc<Expr>) -> bool {
    Arc::ptr_eq(a, b) || a == b
}

#[must_use]
pub fn choice(a: Arc<Expr>, b: Arc<Expr>) -> Arc<Expr> {
    if a.is_not_allowed() {
        return b;
    }
    if b.is_not_allowed() || same(&a, &b) {
        return a;
    }
    if let Expr::Choice(x, y) = &*b
        && (same(&a, x) || same(&a, y))
    {
        return b;
    }
    Arc::new(Expr::Choice(a, b))
}

#[must_use]
pub fn group(a: Arc<Expr>, b: Arc<Expr>) -> Arc<Expr> {
    if a.is_not_allowed() || b.is_not_allowed() {
        return not_allowed();
    }
    if a.is_empty() {
        return b;
    }
    if b.is_empty() {
        return a;
    }
    Arc::new(Expr::Group(a, b))
}

#[must_use]
pub fn interleave(a: Arc<Expr>, b: Arc<Expr>) -> Arc<Expr> {
    if a.is_not_allowed() || b.is_not_allowed() {
        return not_allowed();
    }
    if a.is_empty() {
        return b;
    }
    if b.is_empty() {
        return a;
    }
    Arc::new(Expr::Interleave(a, b))
}

#[must_use]
pub fn after(a: Arc<Expr>, b: Arc<Expr>) -> Arc<Expr> {
    if a.is_not_allowed() || b.is_not_allowed() {
        return not_allowed();
    }
    Arc::new(Expr::After(a, b))
}

#[must_use]
pub fn one_or_more(a: Arc<Expr>) -> Arc<Expr> {
    if a.is_not_allowed() {
        return a;
    }
    Arc::new(Expr::OneOrMore(a))
}

#[must_use]
pub fn nullable(expr: &Expr) -> bool {
    match expr {
        Expr::Empty | Expr::Text => true,
        Expr::Group(a, b) | Expr::Interleave(a, b) => nullable(a) && nullable(b),
        Expr::Choice(a, b) => nullable(a) || nullable(b),
        Expr::OneOrMore(a) => nullable(a),
        _ => false,
    }
}

#[must_use]
pub fn contains(name_class: &NameClass, name: QName<'_>) -> bool {
    match name_class {
        NameClass::AnyName { except } => except.as_deref().is_none_or(|e| !contains(e, name)),
        NameClass::NsName { ns, except } => {
            ns == name.ns && except.as_deref().is_none_or(|e| !contains(e, name))
        }
        NameClass::Name { ns, local } => ns == name.ns && local == name.local,
        NameClass::Choice(a, b) => contains(a, name) || contains(b, name),
    }
}

#[must_use]
pub fn text(expr: &Arc<Expr>, s: &str) -> Arc<Expr> {
    match &**expr {
        Expr::Choice(a, b) => choice(text(a, s), text(b, s)),
        Expr::Interleave(a, b) => choice(
            interleave(text(a, s), b.clone()),
            interleave(a.clone(), text(b, s)),
        ),
        Expr::Group(a, b) => {
            let first = group(text(a, s), b.clone());
            if nullable(a) {
                choice(first, text(b, s))
            } else {
                first
            }
        }
        Expr::After(a, b) => after(text(a, s), b.clone()),
        Expr::OneOrMore(a) => group(text(a, s), choice(expr.clone(), empty())),
        Expr::Text => expr.clone(),
        Expr::Value(value) => accept(value.matches(s)),
        Expr::Data(datatype) => accept(datatype.allows(s)),
        Expr::DataExcept(datatype, except) => {
            accept(datatype.allows(s) && !nullable(&text(except, s)))
        }
        Expr::List(inner) => {
            let rest = tokens(s).fold(inner.clone(), |acc, token| text(&acc, token));
            accept(nullable(&rest))
        }
        _ => not_allowed(),
    }
}

fn accept(ok: bool) -> Arc<Expr> {
    if ok { empty() } else { not_allowed() }
}

fn value_match(expr: &Arc<Expr>, s: &str) -> bool {
    (nullable(expr) && is_blank(s)) || nullable(&text(expr, s))
}

fn apply_after(expr: &Arc<Expr>, f: &dyn Fn(Arc<Expr>) -> Arc<Expr>) -> Arc<Expr> {
    match &**expr {
        Expr::After(a, b) => after(a.clone(), f(b.clone())),
        Expr::Choice(a, b) => choice(apply_after(a, f), apply_after(b, f)),
        _ => not_allowed(),
    }
}

#[must_use]
pub fn start_tag_open(expr: &Arc<Expr>, name: QName<'_>, elements: &[ElementDecl]) -> Arc<Expr> {
    match &**expr {
        Expr::Choice(a, b) => choice(
            start_tag_open(a, name, elements),
            start_tag_open(b, name, elements),
        ),
        Expr::Element(i) => match elements.get(*i) {
            Some(decl) if contains(&decl.name_class, name) => after(decl.content.clone(), empty()),
            _ => not_allowed(),
        },
        Expr::Interleave(a, b) => choice(
            apply_after(&start_tag_open(a, name, elements), &|x| {
                interleave(x, b.clone())
            }),
            apply_after(&start_tag_open(b, name, elements), &|x| {
                interleave(a.clone(), x)
            }),
        ),
        Expr::OneOrMore(a) => apply_after(&start_tag_open(a, name, elements), &|x| {
            group(x, choice(expr.clone(), empty()))
        }),
        Expr::Group(a, b) => {
            let first = apply_after(&start_tag_open(a, name, elements), &|x| group(x, b.clone()));
            if nullable(a) {
                choice(first, start_tag_open(b, name, elements))
            } else {
                first
            }
        }
        Expr::After(a, b) => apply_after(&start_tag_open(a, name, elements), &|x| {
            after(x, b.clone())
        }),
        _ => not_allowed(),
    }
}

#[must_use]
pub fn attribute(expr: &Arc<Expr>, name: QName<'_>, value: &str) -> Arc<Expr> {
    match &**expr {
        Expr::After(a, b) => after(attribute(a, name, value), b.clone()),
        Expr::Choice(a, b) => choice(attribute(a, name, value), attribute(b, name, value)),
        Expr::Group(a, b) => choice(
            group(attribute(a, name, value), b.clone()),
            group(a.clone(), attribute(b, name, value)),
        ),
        Expr::Interleave(a, b) => choice(
            interleave(attribute(a, name, value), b.clone()),
            interleave(a.clone(), attribute(b, name, value)),
        ),
        Expr::OneOrMore(a) => group(attribute(a, name, value), choice(expr.clone(), empty())),
        Expr::Attribute(name_class, content) => {
            accept(contains(name_class, name) && value_match(content, value))
        }
        _ => not_allowed(),
    }
}

#[must_use]
pub fn start_tag_close(expr: &Arc<Expr>) -> Arc<Expr> {
    match &**expr {
        Expr::After(a, b) => after(start_tag_close(a), b.clone()),
        Expr::Choice(a, b) => choice(start_tag_close(a), start_tag_close(b)),
        Expr::Group(a, b) => group(start_tag_close(a), start_tag_close(b)),
        Expr::Interleave(a, b) => interleave(start_tag_close(a), start_tag_close(b)),
        Expr::OneOrMore(a) => one_or_more(start_tag_close(a)),
        Expr::Attribute(..) => not_allowed(),
        _ => expr.clone(),
    }
}

#[must_use]
pub fn end_tag(expr: &Arc<Expr>) -> Arc<Expr> {
    match &**expr {
        Expr::After(a, b) if nullable(a) => b.clone(),
        Expr::Choice(a, b) => choice(end_tag(a), end_tag(b)),
        _ => not_allowed(),
    }
}

/// Validate the whole instance, reporting the first node that fails.
///
/// # Errors
///
/// Returns the [`Violation`] at the first node that cannot match.
pub fn validate(schema: &Schema, instance: &Instance<'_>) -> Result<(), Violation> {
    let walker = Walker {
        elements: schema.elements(),
        instance,
    };
    let root = instance.root();
    let rest = walker.element(schema.start().clone(), root)?;
    if nullable(&rest) {
        Ok(())
    } else {
        Err(walker.violation(root, "document is incomplete".to_string()))
    }
}

struct Walker<'s, 'd, 'i> {
    elements: &'s [ElementDecl],
    instance: &'d Instance<'i>,
}

impl<'i> Walker<'_, '_, 'i> {
    fn violation(&self, node: Node<'_, 'i>, message: String) -> Violation {
        let (line, column) = self.instance.position(node);
        Violation {
            line,
            column,
            message,
        }
    }

    fn element(&self, expr: Arc<Expr>, node: Node<'_, 'i>) -> Result<Arc<Expr>, Violation> {
        let name = element_name(node);
        let mut expr = start_tag_open(&expr, name, self.elements);
        if expr.is_not_allowed() {
            return Err(self.violation(node, format!("element \"{name}\" not allowed here")));
        }
        for (attr, value) in attributes(node) {
            expr = attribute(&expr, attr, value);
            if expr.is_not_allowed() {
                return Err(self.violation(
                    node,
                    format!("attribute \"{attr}\" not allowed or has an invalid value"),
                ));
            }
        }
        expr = start_tag_close(&expr);
        if expr.is_not_allowed() {
            return Err(self.violation(
                node,
                format!("element \"{name}\" is missing required attributes"),
            ));
        }
        expr = self.children(expr, node)?;
        expr = end_tag(&expr);
        if expr.is_not_allowed() {
            return Err(self.violation(node, format!("element \"{name}\" is incomplete")));
        }
        Ok(expr)
    }

    fn children(&self, expr: Arc<Expr>, node: Node<'_, 'i>) -> Result<Arc<Expr>, Violation> {
        let kids = children(node);
        match kids.as_slice() {
            [] => Ok(choice(expr.clone(), text(&expr, ""))),
            [Child::Text { text: s, at }] => {
                let derived = text(&expr, s);
                let derived = if is_blank(s) {
                    choice(expr, derived)
                } else {
                    derived
                };
                if derived.is_not_allowed() {
                    return Err(self.text_violation(*at, s));
                }
                Ok(derived)
            }
            _ => {
                let mut expr = expr;
                for kid in &kids {
                    match kid {
                        Child::Element(child) => expr = self.element(expr, *child)?,
                        Child::Text { text: s, .. } if is_blank(s) => {}
                        Child::Text { text: s, at } => {
                            expr = text(&expr, s);
                            if expr.is_not_allowed() {
                                return Err(self.text_violation(*at, s));
                            }
                        }
                    }
                }
                Ok(expr)
            }
        }
    }

    fn text_violation(&self, at: Node<'_, 'i>, s: &str) -> Violation {
        let trimmed = s.trim();
        let shown: String = trimmed.chars().take(40).collect();
        let ellipsis = if shown.len() < trimmed.len() { "..." } else { "" };
        self.violation(at, format!("text \"{shown}{ellipsis}\" not allowed here"))
    }
}
