#![forbid(unsafe_code)]
#![deny(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{ArgAction, Parser, ValueEnum};
use rayon::prelude::*;
use relaxng::cli_support::{ConfigCache, GrammarSource, load_grammar, load_schema, resolve_ctx};
use relaxng::config::{
    CONFIG_ENV_VAR, ConfigContext, Overrides, ValidatorConfig, discover_config,
};
use relaxng::discover::gather_inputs;
use relaxng::{Problem, Schema, Severity, check_file, default_content, to_compact};
use serde::Serialize;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Standard,
    Parsable,
    Json,
}

#[derive(Parser, Debug)]
#[command(
    name = "relaxng",
    version,
    about = "Validate XML files against simplified RELAX NG grammars"
)]
struct Cli {
    /// Paths: files and/or directories
    #[arg(value_name = "PATH_OR_FILE")]
    inputs: Vec<PathBuf>,

    /// Simplified RELAX NG grammar (overrides the config's `grammar`)
    #[arg(short = 'g', long = "grammar", value_name = "FILE")]
    grammar: Option<PathBuf>,

    /// Path to configuration file (yaml)
    #[arg(short = 'c', long = "config-file", value_name = "FILE")]
    config_file: Option<PathBuf>,

    /// Inline configuration data (yaml) or a preset name
    #[arg(short = 'd', long = "config-data", value_name = "YAML")]
    config_data: Option<String>,

    /// List files that would be validated
    #[arg(long = "list-files", default_value_t = false)]
    list_files: bool,

    /// Output format
    #[arg(short = 'f', long = "format", value_enum, default_value_t = OutputFormat::Standard)]
    format: OutputFormat,

    /// Return a non-zero exit code when only warnings are found
    #[arg(short = 's', long = "strict", default_value_t = false)]
    strict: bool,

    /// Suppress warnings
    #[arg(long = "no-warnings", default_value_t = false)]
    no_warnings: bool,

    /// Print the effective grammar in compact syntax and exit
    #[arg(long = "translate", default_value_t = false)]
    translate: bool,

    /// Print a default playground document and exit
    #[arg(long = "print-default", value_name = "FORMAT", value_parser = ["relaxng", "xml"])]
    print_default: Option<String>,

    /// Increase log verbosity (repeatable)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Serialize)]
struct JsonProblem<'a> {
    path: String,
    #[serde(flatten)]
    problem: &'a Problem,
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_env("RELAXNG_LOG").unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn build_global_cfg(inputs: &[PathBuf], cli: &Cli) -> Result<Option<ConfigContext>, String> {
    if cli.config_data.is_none()
        && cli.config_file.is_none()
        && std::env::var(CONFIG_ENV_VAR).is_err()
    {
        return Ok(None);
    }
    let config_data = cli.config_data.as_ref().map(|raw| {
        if !raw.is_empty() && !raw.contains(':') {
            format!("extends: {raw}")
        } else {
            raw.clone()
        }
    });
    discover_config(
        inputs,
        &Overrides {
            config_file: cli.config_file.clone(),
            config_data,
        },
    )
    .map(Some)
}

fn translate(cli: &Cli, global: Option<ConfigContext>) -> ExitCode {
    let ctx = match global.map_or_else(|| discover_config(&cli.inputs, &Overrides::default()), Ok) {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::from(2);
        }
    };
    let source = GrammarSource::resolve(cli.grammar.as_deref(), &ctx.config);
    let compiled = load_grammar(&source, ctx.config.remove_todos()).and_then(|grammar| {
        Schema::compile(&grammar)
            .map(|_| grammar)
            .map_err(|e| e.to_string())
    });
    match compiled {
        Ok(grammar) => {
            println!("{}", to_compact(&grammar));
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{e}");
            ExitCode::from(2)
        }
    }
}

fn select_files(
    cli: &Cli,
    global: Option<&ConfigContext>,
) -> Result<Vec<(PathBuf, ValidatorConfig)>, String> {
    let (candidates, explicit_files) = gather_inputs(&cli.inputs);
    let mut cache = ConfigCache::new();
    let mut files = Vec::new();
    for f in candidates {
        let (base_dir, cfg) = resolve_ctx(&f, global, &mut cache)?;
        if !cfg.is_file_ignored(&f, &base_dir) && cfg.is_xml_candidate(&f, &base_dir) {
            files.push((f, cfg));
        }
    }
    for ef in explicit_files {
        let (base_dir, cfg) = resolve_ctx(&ef, global, &mut cache)?;
        if !cfg.is_file_ignored(&ef, &base_dir) {
            files.push((ef, cfg));
        }
    }
    Ok(files)
}

fn compile_schemas(
    cli: &Cli,
    files: &[(PathBuf, ValidatorConfig)],
) -> Result<(Vec<(GrammarSource, bool)>, HashMap<(GrammarSource, bool), Schema>), String> {
    let mut keys = Vec::with_capacity(files.len());
    let mut schemas = HashMap::new();
    for (_, cfg) in files {
        let key = (
            GrammarSource::resolve(cli.grammar.as_deref(), cfg),
            cfg.remove_todos(),
        );
        if !schemas.contains_key(&key) {
            let schema = load_schema(&key.0, key.1)?;
            schemas.insert(key.clone(), schema);
        }
        keys.push(key);
    }
    info!(schemas = schemas.len(), files = files.len(), "compiled grammars");
    Ok((keys, schemas))
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Some(format) = &cli.print_default {
        return default_content(format).map_or_else(
            || {
                eprintln!("error: unknown default format {format}");
                ExitCode::from(2)
            },
            |content| {
                println!("{content}");
                ExitCode::SUCCESS
            },
        );
    }

    let global_cfg = match build_global_cfg(&cli.inputs, &cli) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::from(2);
        }
    };

    if cli.translate {
        return translate(&cli, global_cfg);
    }

    if cli.inputs.is_empty() {
        eprintln!("error: expected one or more paths (files and/or directories)");
        return ExitCode::from(2);
    }

    let files = match select_files(&cli, global_cfg.as_ref()) {
        Ok(files) => files,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::from(2);
        }
    };
    debug!(count = files.len(), "selected files");

    if cli.list_files {
        for (path, _) in &files {
            println!("{}", path.display());
        }
        return ExitCode::SUCCESS;
    }

    if files.is_empty() {
        return ExitCode::SUCCESS;
    }

    let (keys, schemas) = match compile_schemas(&cli, &files) {
        Ok(compiled) => compiled,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::from(2);
        }
    };

    let results: Vec<Result<Vec<Problem>, String>> = files
        .par_iter()
        .zip(keys.par_iter())
        .map(|((path, cfg), key)| match schemas.get(key) {
            Some(schema) => check_file(path, schema, cfg),
            None => Err(format!("no grammar compiled for {}", path.display())),
        })
        .collect();

    report(&cli, &files, &results)
}

fn report(
    cli: &Cli,
    files: &[(PathBuf, ValidatorConfig)],
    results: &[Result<Vec<Problem>, String>],
) -> ExitCode {
    let mut has_error = false;
    let mut has_warning = false;
    let mut json = Vec::new();

    for ((path, _), outcome) in files.iter().zip(results) {
        let diagnostics = match outcome {
            Err(message) => {
                eprintln!("{message}");
                has_error = true;
                continue;
            }
            Ok(diagnostics) => diagnostics,
        };
        let shown: Vec<&Problem> = diagnostics
            .iter()
            .filter(|p| !(cli.no_warnings && p.level == Severity::Warning))
            .collect();
        for problem in &shown {
            match problem.level {
                Severity::Error => has_error = true,
                Severity::Warning => has_warning = true,
            }
        }
        match cli.format {
            OutputFormat::Standard => print_standard(path, &shown),
            OutputFormat::Parsable => {
                for problem in &shown {
                    println!("{}", format_parsable(path, problem));
                }
            }
            OutputFormat::Json => json.extend(shown.iter().map(|problem| JsonProblem {
                path: path.display().to_string(),
                problem,
            })),
        }
    }

    if cli.format == OutputFormat::Json {
        match serde_json::to_string_pretty(&json) {
            Ok(text) => println!("{text}"),
            Err(e) => {
                eprintln!("failed to serialize diagnostics: {e}");
                return ExitCode::from(2);
            }
        }
    }

    if has_error {
        ExitCode::from(1)
    } else if has_warning && cli.strict {
        ExitCode::from(2)
    } else {
        ExitCode::SUCCESS
    }
}

fn print_standard(path: &Path, problems: &[&Problem]) {
    if problems.is_empty() {
        return;
    }
    println!("{}", path.display());
    for problem in problems {
        println!("{}", format_standard(problem));
    }
    println!();
}

fn format_standard(problem: &Problem) -> String {
    let mut line = format!("  {}:{}", problem.line, problem.column);
    line.push_str(&" ".repeat(12usize.saturating_sub(line.len())));
    line.push_str(problem.level.as_str());
    line.push_str(&" ".repeat(21usize.saturating_sub(line.len())));
    line.push_str(&problem.message);
    if let Some(rule) = problem.rule {
        line.push_str("  (");
        line.push_str(rule);
        line.push(')');
    }
    line
}

fn format_parsable(path: &Path, problem: &Problem) -> String {
    let mut line = format!(
        "{}:{}:{}: [{}] {}",
        path.display(),
        problem.line,
        problem.column,
        problem.level.as_str(),
        problem.message
    );
    if let Some(rule) = problem.rule {
        line.push_str(" (");
        line.push_str(rule);
        line.push(')');
    }
    line
}
