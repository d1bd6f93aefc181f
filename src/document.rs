use roxmltree::{Document, Node, ParsingOptions};

use crate::error::Result;

/// Expanded element or attribute name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QName<'a> {
    pub ns: &'a str,
    pub local: &'a str,
}

impl std::fmt::Display for QName<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.ns.is_empty() {
            f.write_str(self.local)
        } else {
            write!(f, "{{{}}}{}", self.ns, self.local)
        }
    }
}

/// Content of an element as seen by the validator: comments and processing
/// instructions are dropped and adjacent text is merged.
#[derive(Debug)]
pub enum Child<'a, 'i> {
    Element(Node<'a, 'i>),
    Text { text: String, at: Node<'a, 'i> },
}

/// A parsed instance document.
pub struct Instance<'i> {
    doc: Document<'i>,
}

impl<'i> Instance<'i> {
    /// # Errors
    ///
    /// Returns [`crate::Error::Xml`] with the position of the first syntax error.
    pub fn parse(text: &'i str) -> Result<Self> {
        let doc = Document::parse_with_options(
            text,
            ParsingOptions {
                allow_dtd: true,
                ..ParsingOptions::default()
            },
        )?;
        Ok(Self { doc })
    }

    #[must_use]
    pub fn root(&self) -> Node<'_, 'i> {
        self.doc.root_element()
    }

    /// 1-based line and column of `node`.
    #[must_use]
    pub fn position(&self, node: Node<'_, 'i>) -> (usize, usize) {
        let pos = self.doc.text_pos_at(node.range().start);
        (pos.row as usize, pos.col as usize)
    }
}

#[must_use]
pub fn element_name<'a>(node: Node<'a, '_>) -> QName<'a> {
    let name = node.tag_name();
    QName {
        ns: name.namespace().unwrap_or(""),
        local: name.name(),
    }
}

/// Attributes of `node` as `(name, value)`; namespace declarations are not included.
pub fn attributes<'a>(node: Node<'a, '_>) -> impl Iterator<Item = (QName<'a>, &'a str)> {
    node.attributes().map(|attr| {
        (
            QName {
                ns: attr.namespace().unwrap_or(""),
                local: attr.name(),
            },
            attr.value(),
        )
    })
}

#[must_use]
pub fn children<'a, 'i>(node: Node<'a, 'i>) -> Vec<Child<'a, 'i>> {
    let mut out = Vec::new();
    for child in node.children() {
        if child.is_element() {
            out.push(Child::Element(child));
        } else if child.is_text() {
            let text = child.text().unwrap_or_default();
            if let Some(Child::Text { text: prev, .. }) = out.last_mut() {
                prev.push_str(text);
            } else {
                out.push(Child::Text {
                    text: text.to_owned(),
                    at: child,
                });
            }
        }
    }
    out
}
