use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::datatype::{Datatype, ValueMatch};
use crate::derive::{self, Expr};
use crate::document::Instance;
use crate::error::{Error, Result, Violation};
use crate::grammar::{Grammar, NameClass, Pattern};

/// An element declaration produced from one `<define>`.
#[derive(Debug, Clone)]
pub struct ElementDecl {
    pub name: String,
    pub name_class: Arc<NameClass>,
    pub content: Arc<Expr>,
}

/// A grammar compiled for validation. Immutable and shareable across threads.
#[derive(Debug, Clone)]
pub struct Schema {
    start: Arc<Expr>,
    elements: Vec<ElementDecl>,
}

impl Schema {
    /// Translate a parsed grammar into its executable form.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Compile`] for duplicate defines, references to
    /// undefined defines and unsupported datatype params.
    pub fn compile(grammar: &Grammar) -> Result<Self> {
        let mut index = HashMap::with_capacity(grammar.defines.len());
        for (i, define) in grammar.defines.iter().enumerate() {
            if index.insert(define.name.as_str(), i).is_some() {
                return Err(Error::compile(format!(
                    "define {} is declared more than once",
                    define.name
                )));
            }
        }
        let compiler = Compiler { index: &index };
        let start = compiler.pattern(&grammar.start)?;
        let elements = grammar
            .defines
            .iter()
            .map(|define| {
                Ok(ElementDecl {
                    name: define.name.clone(),
                    name_class: Arc::new(define.name_class.clone()),
                    content: compiler.pattern(&define.pattern)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        debug!(elements = elements.len(), "compiled schema");
        Ok(Self { start, elements })
    }

    #[must_use]
    pub fn elements(&self) -> &[ElementDecl] {
        &self.elements
    }

    #[must_use]
    pub fn start(&self) -> &Arc<Expr> {
        &self.start
    }

    /// Validate an already parsed document.
    ///
    /// # Errors
    ///
    /// Returns the first point where the document stops matching.
    pub fn check(&self, instance: &Instance<'_>) -> std::result::Result<(), Violation> {
        derive::validate(self, instance)
    }

    /// Parse and validate `xml`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Xml`] for malformed input and [`Error::NotValid`]
    /// when the document does not match.
    pub fn validate(&self, xml: &str) -> Result<()> {
        let instance = Instance::parse(xml)?;
        self.check(&instance).map_err(Error::NotValid)
    }

    /// Like [`Schema::validate`], but an invalid document is `Ok(false)`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Xml`] for malformed input.
    pub fn is_valid(&self, xml: &str) -> Result<bool> {
        match self.validate(xml) {
            Ok(()) => Ok(true),
            Err(Error::NotValid(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

struct Compiler<'g> {
    index: &'g HashMap<&'g str, usize>,
}

impl Compiler<'_> {
    fn pattern(&self, pattern: &Pattern) -> Result<Arc<Expr>> {
        let expr = match pattern {
            Pattern::NotAllowed => derive::not_allowed(),
            Pattern::Empty => derive::empty(),
            Pattern::Text => Arc::new(Expr::Text),
            Pattern::Data(data) => {
                let datatype = Arc::new(Datatype::compile(data)?);
                match &data.except {
                    Some(except) => Arc::new(Expr::DataExcept(datatype, self.pattern(except)?)),
                    None => Arc::new(Expr::Data(datatype)),
                }
            }
            Pattern::Value(value) => Arc::new(Expr::Value(ValueMatch::compile(value))),
            Pattern::List(inner) => Arc::new(Expr::List(self.pattern(inner)?)),
            Pattern::Attribute(name_class, inner) => Arc::new(Expr::Attribute(
                Arc::new(name_class.clone()),
                self.pattern(inner)?,
            )),
            Pattern::Ref(name) => match self.index.get(name.as_str()) {
                Some(&i) => Arc::new(Expr::Element(i)),
                None => {
                    return Err(Error::compile(format!(
                        "reference to undefined define {name}"
                    )));
                }
            },
            Pattern::OneOrMore(inner) => derive::one_or_more(self.pattern(inner)?),
            Pattern::Choice(left, right) => derive::choice(self.pattern(left)?, self.pattern(right)?),
            Pattern::Group(left, right) => derive::group(self.pattern(left)?, self.pattern(right)?),
            Pattern::Interleave(left, right) => {
                derive::interleave(self.pattern(left)?, self.pattern(right)?)
            }
        };
        Ok(expr)
    }
}
