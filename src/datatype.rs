use regex::Regex;

use crate::error::{Error, Result};
use crate::grammar::{Data, Param, Value};

/// XML whitespace as used by `token` normalization and list splitting.
#[must_use]
pub fn is_xml_whitespace(ch: char) -> bool {
    matches!(ch, ' ' | '\t' | '\n' | '\r')
}

#[must_use]
pub fn is_blank(text: &str) -> bool {
    text.chars().all(is_xml_whitespace)
}

pub fn tokens(text: &str) -> impl Iterator<Item = &str> {
    text.split(is_xml_whitespace).filter(|t| !t.is_empty())
}

#[must_use]
pub fn collapse(text: &str) -> String {
    tokens(text).collect::<Vec<_>>().join(" ")
}

#[derive(Debug, Clone)]
pub enum Facet {
    Length(usize),
    MinLength(usize),
    MaxLength(usize),
    Pattern(Regex),
}

impl PartialEq for Facet {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Length(a), Self::Length(b))
            | (Self::MinLength(a), Self::MinLength(b))
            | (Self::MaxLength(a), Self::MaxLength(b)) => a == b,
            (Self::Pattern(a), Self::Pattern(b)) => a.as_str() == b.as_str(),
            _ => false,
        }
    }
}

impl Facet {
    fn parse(param: &Param) -> Result<Self> {
        let count = || {
            param.text.trim().parse::<usize>().map_err(|_| {
                Error::compile(format!(
                    "param {} should be a non-negative integer, found {:?}",
                    param.name, param.text
                ))
            })
        };
        match param.name.as_str() {
            "length" => Ok(Self::Length(count()?)),
            "minLength" => Ok(Self::MinLength(count()?)),
            "maxLength" => Ok(Self::MaxLength(count()?)),
            "pattern" => Regex::new(&format!("^(?:{})$", param.text))
                .map(Self::Pattern)
                .map_err(|e| Error::compile(format!("param pattern is invalid: {e}"))),
            other => Err(Error::compile(format!("param {other} is not supported"))),
        }
    }

    fn allows(&self, value: &str) -> bool {
        match self {
            Self::Length(n) => value.chars().count() == *n,
            Self::MinLength(n) => value.chars().count() >= *n,
            Self::MaxLength(n) => value.chars().count() <= *n,
            Self::Pattern(re) => re.is_match(value),
        }
    }
}

/// A compiled `<data>` type. Every type other than `string` behaves like `token`.
#[derive(Debug, Clone, PartialEq)]
pub struct Datatype {
    preserve: bool,
    facets: Vec<Facet>,
}

impl Datatype {
    /// # Errors
    ///
    /// Returns [`Error::Compile`] for unknown or malformed params.
    pub fn compile(data: &Data) -> Result<Self> {
        let facets = data
            .params
            .iter()
            .map(Facet::parse)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            preserve: data.is_string(),
            facets,
        })
    }

    #[must_use]
    pub fn allows(&self, text: &str) -> bool {
        if self.facets.is_empty() {
            return true;
        }
        if self.preserve {
            self.facets.iter().all(|f| f.allows(text))
        } else {
            let value = collapse(text);
            self.facets.iter().all(|f| f.allows(&value))
        }
    }
}

/// A compiled `<value>`; token values are stored collapsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueMatch {
    preserve: bool,
    text: String,
}

impl ValueMatch {
    #[must_use]
    pub fn compile(value: &Value) -> Self {
        if value.is_string() {
            Self {
                preserve: true,
                text: value.text.clone(),
            }
        } else {
            Self {
                preserve: false,
                text: collapse(&value.text),
            }
        }
    }

    #[must_use]
    pub fn matches(&self, text: &str) -> bool {
        if self.preserve {
            text == self.text
        } else {
            collapse(text) == self.text
        }
    }
}
