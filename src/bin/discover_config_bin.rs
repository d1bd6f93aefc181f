#![forbid(unsafe_code)]
#![deny(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]

// Prints where the effective config for a directory (or file) comes from,
// followed by the grammar it selects.

use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use relaxng::config::{ConfigContext, Overrides, discover_config, discover_per_file};

fn main() -> ExitCode {
    let mut per_file = false;
    let mut target = None;
    for arg in env::args().skip(1) {
        if arg == "--per-file" {
            per_file = true;
        } else {
            target = Some(PathBuf::from(arg));
        }
    }
    let target = target.unwrap_or_else(|| PathBuf::from("."));

    let found: Result<ConfigContext, String> = if per_file {
        discover_per_file(&target)
    } else {
        discover_config(&[target], &Overrides::default())
    };
    match found {
        Ok(ctx) => {
            match &ctx.source {
                Some(p) => println!("{}", p.display()),
                None => println!(),
            }
            match ctx.config.grammar() {
                Some(g) => println!("grammar: {}", g.display()),
                None => println!("grammar: <default>"),
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{e}");
            ExitCode::from(2)
        }
    }
}
