#![forbid(unsafe_code)]
#![deny(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]

pub mod check;
pub mod cli_support;
pub mod compact;
pub mod conf;
pub mod config;
pub mod datatype;
pub mod defaults;
pub mod derive;
pub mod discover;
pub mod document;
pub mod error;
pub mod grammar;
pub mod playground;
pub mod schema;

pub use check::{Problem, Severity, check_file, check_text};
pub use compact::to_compact;
pub use defaults::default_content;
pub use discover::{gather_xml_from_dir, is_xml_path};
pub use error::{Error, Result, Violation};
pub use grammar::{Grammar, parse_grammar, remove_todos};
pub use playground::{translate_relaxng, validate_relaxng};
pub use schema::Schema;
