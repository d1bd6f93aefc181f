use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::check::decode;
use crate::config::{ConfigContext, ValidatorConfig, discover_per_file};
use crate::defaults;
use crate::grammar::{self, Grammar, parse_grammar};
use crate::schema::Schema;

pub type ConfigCache = HashMap<PathBuf, (PathBuf, ValidatorConfig)>;

/// Resolve `(base_dir, config)` for `path`: the global context when one was
/// given on the command line, otherwise per-directory discovery with caching.
///
/// # Errors
/// Returns an error when a discovered config cannot be read or parsed.
pub fn resolve_ctx(
    path: &Path,
    global: Option<&ConfigContext>,
    cache: &mut ConfigCache,
) -> Result<(PathBuf, ValidatorConfig), String> {
    if let Some(ctx) = global {
        return Ok((ctx.base_dir.clone(), ctx.config.clone()));
    }
    let start = path.parent().unwrap_or(path).to_path_buf();
    if let Some(hit) = cache.get(&start) {
        return Ok(hit.clone());
    }
    let ctx = discover_per_file(path)?;
    let pair = (ctx.base_dir, ctx.config);
    cache.insert(start, pair.clone());
    Ok(pair)
}

/// Where a schema came from: a grammar file or the built-in default grammar.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GrammarSource {
    File(PathBuf),
    Builtin,
}

impl GrammarSource {
    #[must_use]
    pub fn resolve(cli_grammar: Option<&Path>, cfg: &ValidatorConfig) -> Self {
        cli_grammar
            .or_else(|| cfg.grammar())
            .map_or(Self::Builtin, |p| Self::File(p.to_path_buf()))
    }
}

/// Read, parse and optionally clean a grammar.
///
/// # Errors
/// Returns an error naming the grammar file when it cannot be read or parsed.
pub fn load_grammar(source: &GrammarSource, remove_todos: bool) -> Result<Grammar, String> {
    let (label, text) = match source {
        GrammarSource::File(path) => {
            let bytes = fs::read(path)
                .map_err(|e| format!("failed to read grammar {}: {e}", path.display()))?;
            (path.display().to_string(), decode(&bytes).text.into_owned())
        }
        GrammarSource::Builtin => (
            "<default>".to_string(),
            defaults::RELAXNG.to_string(),
        ),
    };
    let mut grammar = parse_grammar(&text).map_err(|e| format!("{label}: {e}"))?;
    if remove_todos {
        grammar::remove_todos(&mut grammar);
    }
    debug!(grammar = %label, "loaded grammar");
    Ok(grammar)
}

/// # Errors
/// Returns an error when the grammar cannot be loaded or compiled.
pub fn load_schema(source: &GrammarSource, remove_todos: bool) -> Result<Schema, String> {
    let grammar = load_grammar(source, remove_todos)?;
    Schema::compile(&grammar).map_err(|e| match source {
        GrammarSource::File(path) => format!("{}: {e}", path.display()),
        GrammarSource::Builtin => format!("<default>: {e}"),
    })
}
