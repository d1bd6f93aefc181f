use std::path::{Path, PathBuf};

use ignore::WalkBuilder;

#[must_use]
pub fn is_xml_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("xml"))
}

/// Recursively collect `.xml` files under `dir`, honouring `.gitignore` files.
#[must_use]
pub fn gather_xml_from_dir(dir: &Path) -> Vec<PathBuf> {
    walk_files(dir).into_iter().filter(|p| is_xml_path(p)).collect()
}

/// Every regular file below `dir`, in walk order.
#[must_use]
pub fn walk_files(dir: &Path) -> Vec<PathBuf> {
    WalkBuilder::new(dir)
        .hidden(false)
        .ignore(true)
        .git_ignore(true)
        .git_global(true)
        .git_exclude(true)
        .follow_links(false)
        .build()
        .flatten()
        .map(ignore::DirEntry::into_path)
        .filter(|p| p.is_file())
        .collect()
}

/// Split CLI inputs into files found by walking directories and files named explicitly.
#[must_use]
pub fn gather_inputs(inputs: &[PathBuf]) -> (Vec<PathBuf>, Vec<PathBuf>) {
    let mut candidates = Vec::new();
    let mut explicit_files = Vec::new();
    for p in inputs {
        if p.is_dir() {
            candidates.extend(walk_files(p));
        } else {
            explicit_files.push(p.clone());
        }
    }
    (candidates, explicit_files)
}
