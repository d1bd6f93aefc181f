use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use saphyr::{LoadableYamlNode, YamlOwned};
use tracing::debug;

use crate::conf;

pub const CONFIG_ENV_VAR: &str = "RELAXNG_CONFIG_FILE";

/// Project config file names, tried in this order in every directory.
const PROJECT_CONFIG_NAMES: [&str; 3] = [".relaxng", ".relaxng.yaml", ".relaxng.yml"];

/// Rules that may be configured under `rules:`.
pub const KNOWN_RULES: [&str; 1] = ["malformed-encoding"];

const DEFAULT_XML_FILE_PATTERNS: [&str; 1] = ["*.xml"];

/// Filesystem and process environment seen by config discovery.
pub trait Env {
    fn current_dir(&self) -> PathBuf;
    /// Platform configuration directory (e.g., XDG config dir).
    fn config_dir(&self) -> Option<PathBuf>;
    /// # Errors
    /// Returns an error string when the file cannot be read.
    fn read_to_string(&self, p: &Path) -> Result<String, String>;
    fn path_exists(&self, p: &Path) -> bool;
    fn env_var(&self, key: &str) -> Option<String>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemEnv;

impl Env for SystemEnv {
    fn current_dir(&self) -> PathBuf {
        PathBuf::from(".")
    }
    fn config_dir(&self) -> Option<PathBuf> {
        dirs_next::config_dir()
    }
    fn read_to_string(&self, p: &Path) -> Result<String, String> {
        fs::read_to_string(p).map_err(|e| format!("failed to read config file {}: {e}", p.display()))
    }
    fn path_exists(&self, p: &Path) -> bool {
        p.exists()
    }
    fn env_var(&self, key: &str) -> Option<String> {
        env::var(key).ok()
    }
}

/// `SystemEnv` with environment variables served by a closure.
struct VarsFrom<'a>(&'a dyn Fn(&str) -> Option<String>);

impl Env for VarsFrom<'_> {
    fn current_dir(&self) -> PathBuf {
        SystemEnv.current_dir()
    }
    fn config_dir(&self) -> Option<PathBuf> {
        SystemEnv.config_dir()
    }
    fn read_to_string(&self, p: &Path) -> Result<String, String> {
        SystemEnv.read_to_string(p)
    }
    fn path_exists(&self, p: &Path) -> bool {
        SystemEnv.path_exists(p)
    }
    fn env_var(&self, key: &str) -> Option<String> {
        (self.0)(key)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleLevel {
    Error,
    Warning,
}

impl RuleLevel {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "error" => Some(Self::Error),
            "warning" => Some(Self::Warning),
            _ => None,
        }
    }
}

/// One entry under `rules:`. `enable`/`disable` replace whatever a base
/// config said; a mapping only overrides the options it names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RuleSetting {
    Toggle(bool),
    Options { level: Option<RuleLevel> },
}

impl RuleSetting {
    fn parse(name: &str, value: &YamlOwned) -> Result<Self, String> {
        let shape_err =
            || format!("invalid config: rule '{name}' should be 'enable', 'disable', or a mapping");
        if let Some(text) = value.as_str() {
            return match text {
                "enable" => Ok(Self::Toggle(true)),
                "disable" => Ok(Self::Toggle(false)),
                _ => Err(shape_err()),
            };
        }
        let Some(map) = value.as_mapping() else {
            return Err(shape_err());
        };
        let mut level = None;
        for (key, val) in map {
            if key.as_str() != Some("level") {
                let key_name = key.as_str().map_or_else(|| format!("{key:?}"), str::to_owned);
                return Err(format!(
                    "invalid config: unknown option \"{key_name}\" for rule \"{name}\""
                ));
            }
            level = Some(val.as_str().and_then(RuleLevel::parse).ok_or_else(|| {
                format!("invalid config: rule '{name}' level should be \"error\" or \"warning\"")
            })?);
        }
        Ok(Self::Options { level })
    }

    const fn over(self, base: Self) -> Self {
        match (self, base) {
            (Self::Options { level: None }, Self::Options { level }) => Self::Options { level },
            (own, _) => own,
        }
    }

    const fn level(self) -> Option<RuleLevel> {
        match self {
            Self::Toggle(false) => None,
            Self::Toggle(true) | Self::Options { level: None } => Some(RuleLevel::Error),
            Self::Options { level } => level,
        }
    }
}

/// Settings read from one config document, with its `extends` already
/// folded in. `None` means the document left the key unset.
#[derive(Debug, Clone, Default)]
struct Settings {
    grammar: Option<PathBuf>,
    remove_todos: Option<bool>,
    xml_files: Option<Vec<String>>,
    ignore: Vec<String>,
    ignore_from_file: Vec<String>,
    rules: Vec<(String, RuleSetting)>,
}

impl Settings {
    /// Layer `self` on top of `base`: scalar keys fall through when unset,
    /// ignore lists accumulate base-first, rule options merge per rule.
    fn over(self, base: Self) -> Self {
        let mut rules = base.rules;
        for (name, setting) in self.rules {
            match rules.iter_mut().find(|(n, _)| *n == name) {
                Some((_, slot)) => *slot = setting.over(*slot),
                None => rules.push((name, setting)),
            }
        }
        Self {
            grammar: self.grammar.or(base.grammar),
            remove_todos: self.remove_todos.or(base.remove_todos),
            xml_files: self.xml_files.or(base.xml_files),
            ignore: [base.ignore, self.ignore].concat(),
            ignore_from_file: [base.ignore_from_file, self.ignore_from_file].concat(),
            rules,
        }
    }

    fn load(text: &str, envx: Option<&dyn Env>, base_dir: Option<&Path>) -> Result<Self, String> {
        let docs = YamlOwned::load_from_str(text)
            .map_err(|e| format!("failed to parse config data: {e}"))?;
        let Some(doc) = docs.first() else {
            return Ok(Self::default());
        };
        if doc.as_mapping().is_none() {
            return Err("invalid config: not a mapping".to_string());
        }

        let mut own = Self::default();
        let ignore = doc.as_mapping_get("ignore");
        let ignore_from_file = doc.as_mapping_get("ignore-from-file");
        if ignore.is_some() && ignore_from_file.is_some() {
            return Err(
                "invalid config: ignore and ignore-from-file keys cannot be used together"
                    .to_string(),
            );
        }
        if let Some(node) = ignore {
            own.ignore = ignore_patterns(node)?;
        }
        if let Some(node) = ignore_from_file {
            own.ignore_from_file = ignore_sources(node)?;
        }
        if let Some(node) = doc.as_mapping_get("xml-files") {
            own.xml_files = Some(xml_file_patterns(node)?);
        }
        if let Some(node) = doc.as_mapping_get("grammar") {
            let path = node
                .as_str()
                .map(PathBuf::from)
                .ok_or_else(|| "invalid config: grammar should be a file path".to_string())?;
            own.grammar = Some(match base_dir {
                Some(base) if path.is_relative() => base.join(path),
                _ => path,
            });
        }
        if let Some(node) = doc.as_mapping_get("remove-todos") {
            own.remove_todos = Some(node.as_bool().ok_or_else(|| {
                "invalid config: remove-todos should be true or false".to_string()
            })?);
        }
        if let Some(node) = doc.as_mapping_get("rules") {
            let Some(map) = node.as_mapping() else {
                return Err("invalid config: rules should be a mapping".to_string());
            };
            for (key, value) in map {
                let Some(name) = key.as_str() else {
                    continue;
                };
                if !KNOWN_RULES.contains(&name) {
                    return Err(format!("invalid config: unknown rule '{name}'"));
                }
                own.rules.push((name.to_owned(), RuleSetting::parse(name, value)?));
            }
        }

        let mut merged = Self::default();
        if let Some(node) = doc.as_mapping_get("extends") {
            let entries: Vec<&str> = match node.as_sequence() {
                Some(seq) => seq.iter().filter_map(|item| item.as_str()).collect(),
                None => node.as_str().into_iter().collect(),
            };
            for entry in entries {
                merged = Self::extended(entry, envx, base_dir)?.over(merged);
            }
        }
        Ok(own.over(merged))
    }

    fn extended(entry: &str, envx: Option<&dyn Env>, base_dir: Option<&Path>) -> Result<Self, String> {
        if let Some(preset) = conf::builtin(entry) {
            return Self::load(preset, None, None);
        }
        let Some(envx) = envx else {
            return Err(format!(
                "invalid config: extends '{entry}' requires filesystem access for resolution"
            ));
        };
        let path = locate_extended(entry, envx, base_dir);
        let text = envx
            .read_to_string(&path)
            .map_err(|err| format!("failed to read extended config {}: {err}", path.display()))?;
        let parent = path.parent().map(Path::to_path_buf);
        Self::load(&text, Some(envx), parent.as_deref().or(base_dir))
    }
}

fn ignore_patterns(node: &YamlOwned) -> Result<Vec<String>, String> {
    const MESSAGE: &str = "invalid config: ignore should contain file patterns";
    let lines = |text: &str| -> Vec<String> {
        text.lines()
            .map(|line| line.trim_end_matches('\r'))
            .filter(|line| !line.trim().is_empty())
            .map(str::to_owned)
            .collect()
    };
    if let Some(text) = node.as_str() {
        return Ok(lines(text));
    }
    let seq = node.as_sequence().ok_or_else(|| MESSAGE.to_string())?;
    let mut out = Vec::new();
    for item in seq {
        out.extend(lines(item.as_str().ok_or_else(|| MESSAGE.to_string())?));
    }
    Ok(out)
}

fn ignore_sources(node: &YamlOwned) -> Result<Vec<String>, String> {
    const MESSAGE: &str =
        "invalid config: ignore-from-file should contain filename(s), either as a list or string";
    if let Some(text) = node.as_str() {
        return Ok(vec![text.to_owned()]);
    }
    node.as_sequence()
        .ok_or_else(|| MESSAGE.to_string())?
        .iter()
        .map(|item| item.as_str().map(str::to_owned).ok_or_else(|| MESSAGE.to_string()))
        .collect()
}

fn xml_file_patterns(node: &YamlOwned) -> Result<Vec<String>, String> {
    const MESSAGE: &str = "invalid config: xml-files should be a list of file patterns";
    let seq = node.as_sequence().ok_or_else(|| MESSAGE.to_string())?;
    let mut out = Vec::with_capacity(seq.len());
    for item in seq {
        let pattern = item.as_str().ok_or_else(|| MESSAGE.to_string())?;
        Glob::new(pattern).map_err(|err| {
            format!("invalid config: xml-files pattern '{pattern}' is invalid: {err}")
        })?;
        out.push(pattern.to_owned());
    }
    Ok(out)
}

/// An `extends` path: absolute as given, else next to the extending config,
/// else under the working directory. Unresolved names are returned as-is so
/// the read error names what the user wrote.
fn locate_extended(entry: &str, envx: &dyn Env, base_dir: Option<&Path>) -> PathBuf {
    let entry = PathBuf::from(entry);
    if entry.is_absolute() {
        return entry;
    }
    base_dir
        .map(|base| base.join(&entry))
        .into_iter()
        .chain(std::iter::once(envx.current_dir().join(&entry)))
        .find(|candidate| envx.path_exists(candidate))
        .unwrap_or(entry)
}

#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub config_file: Option<PathBuf>,
    pub config_data: Option<String>,
}

/// Effective validator configuration: grammar selection, file selection and
/// rule levels.
#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    grammar: Option<PathBuf>,
    remove_todos: bool,
    xml_file_patterns: Vec<String>,
    ignore_patterns: Vec<String>,
    ignore_from_files: Vec<String>,
    rules: Vec<(String, RuleSetting)>,
    ignore_matcher: Option<Gitignore>,
    xml_matcher: Option<GlobSet>,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self::from_settings(Settings::default())
    }
}

impl ValidatorConfig {
    /// Parse configuration data without filesystem access. Only built-in
    /// presets may be extended.
    ///
    /// # Errors
    /// Returns an error when the data is invalid or `extends` names a file.
    pub fn from_yaml_str(s: &str) -> Result<Self, String> {
        Settings::load(s, None, None).map(Self::from_settings)
    }

    fn load(text: &str, envx: &dyn Env, base_dir: &Path) -> Result<Self, String> {
        Settings::load(text, Some(envx), Some(base_dir)).map(Self::from_settings)
    }

    fn from_settings(settings: Settings) -> Self {
        Self {
            grammar: settings.grammar,
            remove_todos: settings.remove_todos.unwrap_or(true),
            xml_file_patterns: settings.xml_files.unwrap_or_else(|| {
                DEFAULT_XML_FILE_PATTERNS.iter().map(|s| (*s).to_string()).collect()
            }),
            ignore_patterns: settings.ignore,
            ignore_from_files: settings.ignore_from_file,
            rules: settings.rules,
            ignore_matcher: None,
            xml_matcher: None,
        }
    }

    /// Grammar path, already resolved against the directory of the config that named it.
    #[must_use]
    pub fn grammar(&self) -> Option<&Path> {
        self.grammar.as_deref()
    }

    #[must_use]
    pub const fn remove_todos(&self) -> bool {
        self.remove_todos
    }

    #[must_use]
    pub fn ignore_patterns(&self) -> &[String] {
        &self.ignore_patterns
    }

    #[must_use]
    pub fn xml_file_patterns(&self) -> &[String] {
        &self.xml_file_patterns
    }

    /// Configured rules in the order they were first mentioned.
    pub fn rule_names(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|(name, _)| name.as_str())
    }

    /// `None` when the rule is disabled or not configured.
    #[must_use]
    pub fn rule_level(&self, rule: &str) -> Option<RuleLevel> {
        self.rules
            .iter()
            .find(|(name, _)| name == rule)
            .and_then(|(_, setting)| setting.level())
    }

    /// Matching is performed on the path relative to `base_dir`.
    #[must_use]
    pub fn is_file_ignored(&self, path: &Path, base_dir: &Path) -> bool {
        self.ignore_matcher.as_ref().is_some_and(|matcher| {
            let rel = path.strip_prefix(base_dir).unwrap_or(path);
            matcher.matched_path_or_any_parents(rel, false).is_ignore()
        })
    }

    /// Whether a walked file should be validated. Patterns are tried against
    /// the path relative to `base_dir` and against the bare file name.
    #[must_use]
    pub fn is_xml_candidate(&self, path: &Path, base_dir: &Path) -> bool {
        let Some(matcher) = &self.xml_matcher else {
            return crate::discover::is_xml_path(path);
        };
        let rel = path.strip_prefix(base_dir).unwrap_or(path);
        matcher.is_match(rel) || rel.file_name().is_some_and(|name| matcher.is_match(name))
    }

    /// Build the ignore and `xml-files` matchers. `ignore-from-file` entries
    /// are read here, relative to `base_dir`.
    fn compile_matchers(&mut self, envx: &dyn Env, base_dir: &Path) -> Result<(), String> {
        let mut builder = GitignoreBuilder::new(base_dir);
        let mut any = false;
        for pattern in &self.ignore_patterns {
            builder.add_line(None, pattern).map_err(|err| {
                format!("invalid config: ignore pattern '{pattern}' is invalid: {err}")
            })?;
            any = true;
        }
        for source in &self.ignore_from_files {
            let path = base_dir.join(source);
            let text = envx
                .read_to_string(&path)
                .map_err(|err| format!("failed to read ignore-from-file {}: {err}", path.display()))?;
            for line in text.lines().map(|l| l.trim_end_matches('\r')) {
                if line.trim().is_empty() {
                    continue;
                }
                builder.add_line(Some(path.clone()), line).map_err(|err| {
                    format!(
                        "invalid config: ignore-from-file pattern in {} is invalid: {err}",
                        path.display()
                    )
                })?;
                any = true;
            }
        }
        self.ignore_matcher = if any {
            Some(
                builder
                    .build()
                    .map_err(|err| format!("invalid config: ignore patterns: {err}"))?,
            )
        } else {
            None
        };

        self.xml_matcher = if self.xml_file_patterns.is_empty() {
            None
        } else {
            let mut set = GlobSetBuilder::new();
            for pattern in &self.xml_file_patterns {
                set.add(Glob::new(pattern).map_err(|err| {
                    format!("invalid config: xml-files pattern '{pattern}' is invalid: {err}")
                })?);
            }
            Some(
                set.build()
                    .map_err(|err| format!("invalid config: xml-files: {err}"))?,
            )
        };
        Ok(())
    }
}

/// Result of configuration discovery.
#[derive(Debug, Clone)]
pub struct ConfigContext {
    pub config: ValidatorConfig,
    pub base_dir: PathBuf,
    pub source: Option<PathBuf>,
}

impl ConfigContext {
    fn new(
        envx: &dyn Env,
        mut config: ValidatorConfig,
        base_dir: PathBuf,
        source: Option<PathBuf>,
    ) -> Result<Self, String> {
        config.compile_matchers(envx, &base_dir)?;
        debug!(
            source = ?source,
            base_dir = %base_dir.display(),
            grammar = ?config.grammar,
            "resolved config"
        );
        Ok(Self {
            config,
            base_dir,
            source,
        })
    }

    /// Load a config file whose relative paths resolve against `base_dir`.
    fn from_file(envx: &dyn Env, path: &Path, base_dir: PathBuf) -> Result<Self, String> {
        let text = envx.read_to_string(path)?;
        let config = ValidatorConfig::load(&text, envx, &base_dir)?;
        Self::new(envx, config, base_dir, Some(path.to_path_buf()))
    }

    fn preset(envx: &dyn Env, base_dir: PathBuf) -> Result<Self, String> {
        let config = ValidatorConfig::from_yaml_str(conf::builtin("default").unwrap_or_default())?;
        Self::new(envx, config, base_dir, None)
    }
}

fn parent_or_cwd(envx: &dyn Env, path: &Path) -> PathBuf {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map_or_else(|| envx.current_dir(), Path::to_path_buf)
}

/// Discover configuration with precedence:
/// config-data > config-file > project > env var > user-global > defaults.
///
/// # Errors
/// Returns an error when a config file cannot be read or parsed.
pub fn discover_config(inputs: &[PathBuf], overrides: &Overrides) -> Result<ConfigContext, String> {
    discover_config_with(inputs, overrides, &SystemEnv)
}

/// Variant of `discover_config` with injectable environment-variable access.
///
/// # Errors
/// Returns an error when a config file cannot be read or parsed.
pub fn discover_config_with_env(
    inputs: &[PathBuf],
    overrides: &Overrides,
    env_get: &dyn Fn(&str) -> Option<String>,
) -> Result<ConfigContext, String> {
    discover_config_with(inputs, overrides, &VarsFrom(env_get))
}

/// # Errors
/// Returns an error when a configuration file cannot be read or parsed.
pub fn discover_config_with(
    inputs: &[PathBuf],
    overrides: &Overrides,
    envx: &dyn Env,
) -> Result<ConfigContext, String> {
    if let Some(data) = &overrides.config_data {
        let cwd = envx.current_dir();
        let config = ValidatorConfig::load(data, envx, &cwd)?;
        return ConfigContext::new(envx, config, cwd, None);
    }
    if let Some(file) = &overrides.config_file {
        return ConfigContext::from_file(envx, file, parent_or_cwd(envx, file));
    }
    if let Some((path, dir)) = find_project_config(envx, inputs) {
        return ConfigContext::from_file(envx, &path, dir);
    }
    if let Some(path) = envx
        .env_var(CONFIG_ENV_VAR)
        .map(PathBuf::from)
        .filter(|p| envx.path_exists(p))
    {
        let base = parent_or_cwd(envx, &path);
        return ConfigContext::from_file(envx, &path, base);
    }
    user_global_or_preset(envx, envx.current_dir())
}

/// Discover the effective config for a single file, ignoring env/global overrides.
/// Precedence: nearest project config up-tree from the file's directory,
/// then user-global, then defaults.
///
/// # Errors
/// Returns an error when a config file cannot be read or parsed.
pub fn discover_per_file(path: &Path) -> Result<ConfigContext, String> {
    discover_per_file_with(path, &SystemEnv)
}

/// # Errors
/// Returns an error when a configuration file cannot be read or parsed.
pub fn discover_per_file_with(path: &Path, envx: &dyn Env) -> Result<ConfigContext, String> {
    let start = if path.is_dir() {
        path
    } else {
        path.parent().unwrap_or(path)
    };
    if let Some((cfg, dir)) = find_project_config(envx, &[start.to_path_buf()]) {
        return ConfigContext::from_file(envx, &cfg, dir);
    }
    match user_global(envx, start)? {
        Some(ctx) => Ok(ctx),
        None => ConfigContext::preset(envx, envx.current_dir()),
    }
}

fn user_global_or_preset(envx: &dyn Env, base_dir: PathBuf) -> Result<ConfigContext, String> {
    match user_global(envx, &base_dir)? {
        Some(ctx) => Ok(ctx),
        None => ConfigContext::preset(envx, base_dir),
    }
}

/// `<config dir>/relaxng/config`. Its own paths (`grammar`, `extends`)
/// resolve next to it, while ignores stay relative to `base_dir`.
fn user_global(envx: &dyn Env, base_dir: &Path) -> Result<Option<ConfigContext>, String> {
    let Some(path) = envx
        .config_dir()
        .map(|dir| dir.join("relaxng").join("config"))
        .filter(|p| envx.path_exists(p))
    else {
        return Ok(None);
    };
    let text = envx.read_to_string(&path)?;
    let own_dir = parent_or_cwd(envx, &path);
    let config = ValidatorConfig::load(&text, envx, &own_dir)?;
    ConfigContext::new(envx, config, base_dir.to_path_buf(), Some(path)).map(Some)
}

/// Walk up from each input's directory looking for a project config,
/// stopping after the home directory. Returns `(config path, its directory)`.
fn find_project_config(envx: &dyn Env, inputs: &[PathBuf]) -> Option<(PathBuf, PathBuf)> {
    let cwd = envx.current_dir();
    let absolute = |p: PathBuf| if p.is_absolute() { p } else { cwd.join(p) };

    let mut starts: Vec<PathBuf> = Vec::new();
    if inputs.is_empty() {
        starts.push(cwd.clone());
    }
    for input in inputs {
        let dir = if input.is_dir() {
            input.clone()
        } else {
            input.parent().map_or_else(|| cwd.clone(), Path::to_path_buf)
        };
        let dir = absolute(dir);
        if !starts.contains(&dir) {
            starts.push(dir);
        }
    }

    let home = envx
        .env_var("HOME")
        .map(PathBuf::from)
        .or_else(dirs_next::home_dir)
        .map(absolute);

    for start in &starts {
        for dir in start.ancestors() {
            let found = PROJECT_CONFIG_NAMES
                .iter()
                .map(|name| dir.join(name))
                .find(|candidate| envx.path_exists(candidate));
            if let Some(path) = found {
                return Some((path, dir.to_path_buf()));
            }
            if home.as_deref() == Some(dir) {
                break;
            }
        }
    }
    None
}
