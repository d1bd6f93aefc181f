//! String-in, string-out entry points for an interactive editor.
//!
//! Failures are reported in-band as `"Error: <message>"` so a front end can
//! display the result verbatim.

use crate::compact::to_compact;
use crate::document::Instance;
use crate::error::Result;
use crate::grammar::{Grammar, parse_grammar, remove_todos};
use crate::schema::Schema;

fn load(grammar: &str) -> Result<Grammar> {
    let mut grammar = parse_grammar(grammar)?;
    remove_todos(&mut grammar);
    Ok(grammar)
}

/// Check that `xml` is well-formed, then whether it matches `grammar`.
///
/// # Errors
///
/// Returns an error when either input cannot be parsed or the grammar cannot
/// be compiled. A document that does not match is `Ok(false)`.
pub fn validate(grammar: &str, xml: &str) -> Result<bool> {
    let grammar = load(grammar)?;
    let instance = Instance::parse(xml)?;
    let schema = Schema::compile(&grammar)?;
    Ok(schema.check(&instance).is_ok())
}

/// # Errors
///
/// Returns an error when the grammar cannot be parsed or compiled.
pub fn translate(grammar: &str) -> Result<String> {
    let grammar = load(grammar)?;
    Schema::compile(&grammar)?;
    Ok(to_compact(&grammar))
}

#[must_use]
pub fn validate_relaxng(grammar: &str, xml: &str) -> String {
    match validate(grammar, xml) {
        Ok(valid) => valid.to_string(),
        Err(e) => format!("Error: {e}"),
    }
}

#[must_use]
pub fn translate_relaxng(grammar: &str) -> String {
    translate(grammar).unwrap_or_else(|e| format!("Error: {e}"))
}
