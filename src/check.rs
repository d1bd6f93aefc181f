use std::borrow::Cow;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use encoding_rs::{Encoding, UTF_8};
use regex::bytes::Regex;
use serde::Serialize;
use tracing::trace;

use crate::config::{RuleLevel, ValidatorConfig};
use crate::document::Instance;
use crate::error::Error;
use crate::schema::Schema;

pub const SYNTAX: &str = "syntax";
pub const RELAXNG: &str = "relaxng";
pub const MALFORMED_ENCODING: &str = "malformed-encoding";

static XML_DECL_ENCODING: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r#"^<\?xml[^>]*?\sencoding\s*=\s*["']([A-Za-z0-9._:-]+)["']"#).ok()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

impl Severity {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warning => "warning",
        }
    }
}

impl From<RuleLevel> for Severity {
    fn from(value: RuleLevel) -> Self {
        match value {
            RuleLevel::Error => Self::Error,
            RuleLevel::Warning => Self::Warning,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Problem {
    pub line: usize,
    pub column: usize,
    pub level: Severity,
    pub message: String,
    pub rule: Option<&'static str>,
}

/// Decoded file contents.
pub struct Decoded<'b> {
    pub text: Cow<'b, str>,
    pub encoding: &'static Encoding,
    pub had_errors: bool,
}

/// Decode raw bytes: a byte order mark wins, then the XML declaration's
/// `encoding`, then UTF-8.
#[must_use]
pub fn decode(bytes: &[u8]) -> Decoded<'_> {
    let (encoding, bom_len) = Encoding::for_bom(bytes)
        .or_else(|| declared_encoding(bytes).map(|e| (e, 0)))
        .unwrap_or((UTF_8, 0));
    let (text, had_errors) = encoding.decode_without_bom_handling(&bytes[bom_len..]);
    Decoded {
        text,
        encoding,
        had_errors,
    }
}

fn declared_encoding(bytes: &[u8]) -> Option<&'static Encoding> {
    let re = XML_DECL_ENCODING.as_ref()?;
    let label = re.captures(bytes)?.get(1)?;
    Encoding::for_label(label.as_bytes())
}

/// Validate a single XML file and return its problems ordered by position.
///
/// # Errors
///
/// Returns `Err(String)` when the file cannot be read.
pub fn check_file(
    path: &Path,
    schema: &Schema,
    cfg: &ValidatorConfig,
) -> Result<Vec<Problem>, String> {
    let bytes = fs::read(path).map_err(|e| format!("failed to read {}: {e}", path.display()))?;
    let decoded = decode(&bytes);
    trace!(path = %path.display(), encoding = decoded.encoding.name(), "checking");

    let found = check_text(&decoded.text, schema);
    if found.iter().any(|p| p.rule == Some(SYNTAX)) {
        return Ok(found);
    }

    let mut problems = Vec::new();
    if decoded.had_errors
        && let Some(level) = cfg.rule_level(MALFORMED_ENCODING)
    {
        problems.push(Problem {
            line: 1,
            column: 1,
            level: level.into(),
            message: format!(
                "file contains byte sequences that are not valid {}",
                decoded.encoding.name()
            ),
            rule: Some(MALFORMED_ENCODING),
        });
    }
    problems.extend(found);
    problems.sort_by_key(|p| (p.line, p.column));
    Ok(problems)
}

/// Validate in-memory XML. A syntax error replaces any other finding.
#[must_use]
pub fn check_text(text: &str, schema: &Schema) -> Vec<Problem> {
    let instance = match Instance::parse(text) {
        Ok(instance) => instance,
        Err(err) => return vec![syntax_problem(err)],
    };
    match schema.check(&instance) {
        Ok(()) => Vec::new(),
        Err(violation) => vec![Problem {
            line: violation.line,
            column: violation.column,
            level: Severity::Error,
            message: violation.message,
            rule: Some(RELAXNG),
        }],
    }
}

fn syntax_problem(err: Error) -> Problem {
    let (line, column, message) = match err {
        Error::Xml {
            line,
            column,
            message,
        } => (line, column, message),
        other => (1, 1, other.to_string()),
    };
    Problem {
        line,
        column,
        level: Severity::Error,
        message: format!("syntax error: {message}"),
        rule: Some(SYNTAX),
    }
}
