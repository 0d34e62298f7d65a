//! `.kbignore` path filtering for directory uploads.
//!
//! One ignore file per upload root, gitignore-flavoured:
//!
//! - blank lines and lines starting with `#` are skipped
//! - a leading `!` negates the pattern (re-includes matching paths)
//! - later patterns override earlier ones (last match wins)
//! - a pattern with no `/` matches at any depth (`*.log`, `build`)
//! - a pattern containing `/` is anchored at the root (`docs/draft.md`, `/tmp`)
//! - a trailing `/` matches directories only (`cache/`)
//! - a pattern that matches a directory excludes everything beneath it
//!
//! Paths are matched in forward-slash form whatever the host separator is.
//! The ignore file itself is never uploaded, whether or not a rule says so.

use globset::{GlobBuilder, GlobMatcher};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::{Error, Result};

/// Default ignore file name, looked up at the upload root.
pub const IGNORE_FILE_NAME: &str = ".kbignore";

#[derive(Debug, Clone)]
struct IgnoreRule {
    pattern: String,
    negated: bool,
    dir_only: bool,
    matcher: GlobMatcher,
}

/// Ordered ignore patterns plus the implicit carve-outs for ignore files.
#[derive(Debug, Clone)]
pub struct IgnoreRuleSet {
    rules: Vec<IgnoreRule>,
    always_excluded: Vec<String>,
}

/// No patterns, but the root `.kbignore` is still never uploaded.
impl Default for IgnoreRuleSet {
    fn default() -> Self {
        Self {
            rules: Vec::new(),
            always_excluded: vec![IGNORE_FILE_NAME.to_string()],
        }
    }
}

impl IgnoreRuleSet {
    /// Parses ignore-file text. Invalid patterns are skipped with a warning.
    pub fn parse(text: &str) -> Self {
        let mut rules = Vec::new();
        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim_end();
            let trimmed = line.trim_start();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            match compile_rule(trimmed) {
                Some(Ok(rule)) => rules.push(rule),
                Some(Err(e)) => {
                    tracing::warn!(line = lineno + 1, pattern = trimmed, error = %e, "skipping invalid ignore pattern");
                }
                None => {}
            }
        }
        Self {
            rules,
            ..Self::default()
        }
    }

    /// Loads rules for `root`.
    ///
    /// `override_file` wins when it names an existing file; otherwise
    /// `<root>/.kbignore` is used if present. No file means no rules.
    pub fn load(root: &Path, override_file: Option<&Path>) -> Result<Self> {
        let effective = override_file
            .filter(|p| p.is_file())
            .map(Path::to_path_buf)
            .or_else(|| {
                let default = root.join(IGNORE_FILE_NAME);
                default.is_file().then_some(default)
            });

        let Some(path) = effective else {
            tracing::debug!(root = %root.display(), "no ignore file, every file is eligible");
            return Ok(Self::default());
        };

        let text = std::fs::read_to_string(&path).map_err(|e| Error::io(&path, e))?;
        let mut set = Self::parse(&text);
        if let Some(rel) = relative_to(root, &path) {
            if !set.always_excluded.contains(&rel) {
                set.always_excluded.push(rel);
            }
        }
        tracing::info!(path = %path.display(), rules = set.rules.len(), "loaded ignore rules");
        Ok(set)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Whether the file at `relative_path` (relative to the upload root)
    /// should be uploaded.
    pub fn should_upload(&self, relative_path: &str) -> bool {
        let path = to_posix(relative_path);
        if self.always_excluded.iter().any(|p| *p == path) {
            return false;
        }

        let ancestors = ancestor_dirs(&path);
        let mut ignored = false;
        for rule in &self.rules {
            let matched = (!rule.dir_only && rule.matcher.is_match(&path))
                || ancestors.iter().any(|dir| rule.matcher.is_match(dir));
            if matched {
                ignored = !rule.negated;
            }
        }
        !ignored
    }

    /// Patterns in file order, with `!` restored for negations.
    pub fn patterns(&self) -> impl Iterator<Item = String> + '_ {
        self.rules.iter().map(|r| {
            let mut p = String::new();
            if r.negated {
                p.push('!');
            }
            p.push_str(&r.pattern);
            p
        })
    }
}

fn compile_rule(line: &str) -> Option<std::result::Result<IgnoreRule, globset::Error>> {
    let (negated, body) = match line.strip_prefix('!') {
        Some(rest) => (true, rest),
        None => (false, line.strip_prefix('\\').unwrap_or(line)),
    };
    let dir_only = body.ends_with('/');
    let body = body.trim_end_matches('/');
    if body.is_empty() {
        return None;
    }

    let glob = if let Some(anchored) = body.strip_prefix('/') {
        anchored.to_string()
    } else if body.contains('/') {
        body.to_string()
    } else {
        format!("**/{body}")
    };

    Some(
        GlobBuilder::new(&glob)
            .literal_separator(true)
            .build()
            .map(|g| IgnoreRule {
                pattern: line.trim_start_matches('!').to_string(),
                negated,
                dir_only,
                matcher: g.compile_matcher(),
            }),
    )
}

/// `a/b/c.txt` → `["a", "a/b"]`
fn ancestor_dirs(path: &str) -> Vec<&str> {
    path.match_indices('/').map(|(i, _)| &path[..i]).collect()
}

fn to_posix(path: &str) -> String {
    let path = path.replace('\\', "/");
    path.trim_start_matches("./").trim_start_matches('/').to_string()
}

fn relative_to(root: &Path, path: &Path) -> Option<String> {
    let root = root.canonicalize().ok()?;
    let path = path.canonicalize().ok()?;
    path.strip_prefix(&root)
        .ok()
        .map(|rel| to_posix(&rel.to_string_lossy()))
}

/// A file selected for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadCandidate {
    pub path: PathBuf,
    /// Forward-slash path relative to the upload root.
    pub relative: String,
}

/// Walks `root` and returns the files `rules` allow, sorted by relative path.
pub fn collect_files(root: &Path, rules: &IgnoreRuleSet) -> Result<Vec<UploadCandidate>> {
    if !root.is_dir() {
        return Err(Error::InvalidInput(format!(
            "'{}' is not a directory",
            root.display()
        )));
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            let source = e
                .into_io_error()
                .unwrap_or_else(|| std::io::Error::other("directory walk failed"));
            Error::io(path, source)
        })?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let relative = to_posix(&relative.to_string_lossy());

        if !rules.should_upload(&relative) {
            tracing::debug!(path = %relative, "ignored");
            continue;
        }

        files.push(UploadCandidate {
            path: path.to_path_buf(),
            relative,
        });
    }

    files.sort_by(|a, b| a.relative.cmp(&b.relative));
    Ok(files)
}
