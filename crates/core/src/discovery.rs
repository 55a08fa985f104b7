//! Input file discovery.
//!
//! Walks an input directory and returns a sorted, duplicate-free list of
//! files matching the configured glob patterns.

use crate::error::{ConversionError, Result};
use crate::format::InputFormat;
use regex::RegexSet;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Which pattern matches survive discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExtensionFilter {
    /// Keep only files with a recognized input extension.
    #[default]
    Supported,
    /// Keep every match; unsupported files fail later at dispatch.
    Any,
}

/// Options for [`discover`].
#[derive(Debug, Clone)]
pub struct DiscoveryOptions {
    /// Glob patterns. Patterns without `/` match the file name at any depth,
    /// patterns with `/` match the path relative to the input directory.
    /// Default: `["*"]`.
    pub patterns: Vec<String>,

    /// Descend into subdirectories.
    pub recursive: bool,

    pub filter: ExtensionFilter,

    /// Directories that are never descended into.
    pub exclude: Vec<PathBuf>,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            patterns: vec!["*".to_string()],
            recursive: false,
            filter: ExtensionFilter::Supported,
            exclude: Vec::new(),
        }
    }
}

impl DiscoveryOptions {
    pub fn with_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.patterns = patterns.into_iter().map(Into::into).collect();
        self
    }

    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    pub fn with_filter(mut self, filter: ExtensionFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn exclude_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.exclude.push(dir.into());
        self
    }
}

/// Compiled patterns, split by what they are matched against.
struct PatternSet {
    names: RegexSet,
    paths: RegexSet,
}

impl PatternSet {
    fn new(patterns: &[String]) -> Result<Self> {
        let default = ["*".to_string()];
        let patterns = if patterns.is_empty() {
            &default[..]
        } else {
            patterns
        };

        let (path_globs, name_globs): (Vec<&String>, Vec<&String>) =
            patterns.iter().partition(|p| p.contains('/'));

        let compile = |globs: Vec<&String>| {
            RegexSet::new(globs.iter().map(|g| glob_to_regex(g))).map_err(|e| {
                ConversionError::InvalidConfig(format!("invalid file pattern: {}", e))
            })
        };

        Ok(Self {
            names: compile(name_globs)?,
            paths: compile(path_globs)?,
        })
    }

    fn is_match(&self, file_name: &str, relative: &str) -> bool {
        self.names.is_match(file_name) || self.paths.is_match(relative)
    }
}

/// Translate a glob into an anchored regex.
///
/// Supports `*`, `?`, `[...]` (with `!` negation) and `**` across directories.
/// An unclosed `[` matches itself.
pub(crate) fn glob_to_regex(glob: &str) -> String {
    let mut out = String::from("^");
    let chars: Vec<char> = glob.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '*' if chars.get(i + 1) == Some(&'*') => {
                if chars.get(i + 2) == Some(&'/') {
                    out.push_str("(?:.*/)?");
                    i += 3;
                } else {
                    out.push_str(".*");
                    i += 2;
                }
                continue;
            }
            '*' => out.push_str("[^/]*"),
            '?' => out.push_str("[^/]"),
            '[' => match class_to_regex(&chars[i + 1..]) {
                Some((class, used)) => {
                    out.push_str(&class);
                    i += used + 1;
                    continue;
                }
                None => out.push_str("\\["),
            },
            c => out.push_str(&regex::escape(&c.to_string())),
        }
        i += 1;
    }

    out.push('$');
    out
}

/// Translate the bracket expression following a `[`.
///
/// Returns the regex class and the number of chars consumed, closing `]`
/// included, or `None` when the class is never closed. A leading `!`
/// negates; a `]` right after `[` or `[!` is a literal member. Members are
/// escaped so regex class operators (`&&`, `~~`, nested `[`) stay literal.
fn class_to_regex(chars: &[char]) -> Option<(String, usize)> {
    let mut out = String::from("[");
    let mut i = 0;
    if chars.first() == Some(&'!') {
        out.push('^');
        i = 1;
    }
    let start = i;

    while let Some(&c) = chars.get(i) {
        match c {
            ']' if i > start => {
                out.push(']');
                return Some((out, i + 1));
            }
            '-' => out.push('-'),
            c => out.push_str(&regex::escape(&c.to_string())),
        }
        i += 1;
    }
    None
}

fn relative_str(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn is_excluded(path: &Path, excluded: &[PathBuf]) -> bool {
    if excluded.is_empty() {
        return false;
    }
    let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    excluded.iter().any(|e| *e == canonical)
}

/// Discover input files under `dir`.
///
/// Returns an empty list when nothing matches. Fails with `InputNotFound`
/// if `dir` does not exist and `PermissionDenied` if it cannot be read.
pub fn discover(dir: &Path, options: &DiscoveryOptions) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Err(ConversionError::InputNotFound(dir.to_path_buf()));
    }
    if !dir.is_dir() {
        return Err(ConversionError::InvalidConfig(format!(
            "input path is not a directory: {}",
            dir.display()
        )));
    }
    std::fs::read_dir(dir).map_err(|e| ConversionError::from_io(dir, e))?;

    let patterns = PatternSet::new(&options.patterns)?;
    let excluded: Vec<PathBuf> = options
        .exclude
        .iter()
        .map(|p| p.canonicalize().unwrap_or_else(|_| p.clone()))
        .collect();

    let walker = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(if options.recursive { usize::MAX } else { 1 })
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            !(entry.file_type().is_dir() && is_excluded(entry.path(), &excluded))
        });

    let mut found = BTreeSet::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry under {:?}: {}", dir, e);
                continue;
            }
        };

        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        let file_name = entry.file_name().to_string_lossy();
        if !patterns.is_match(&file_name, &relative_str(dir, path)) {
            continue;
        }

        if options.filter == ExtensionFilter::Supported && InputFormat::from_path(path).is_none() {
            debug!("Ignoring unsupported file {:?}", path);
            continue;
        }

        found.insert(path.to_path_buf());
    }

    debug!("Discovered {} files in {:?}", found.len(), dir);
    Ok(found.into_iter().collect())
}
