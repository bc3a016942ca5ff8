//! Template loading
//!
//! Resolves a template path, strips full-line comments, normalizes
//! shorthand tags and parses the result into a [`Document`]. Parse errors
//! carry the offending source line with a caret under the failing column.

use std::path::{Path, PathBuf};

use stackforge_types::Document;
use tracing::debug;

use crate::error::{CompileError, Result};
use crate::options::CompileOptions;
use crate::shorthand;

/// Resolve the file a template path refers to.
///
/// A directory resolves to `default_filename` inside it; a path that does
/// not exist resolves to its `.yaml` sibling when that exists.
pub fn resolve_template_path(path: &Path, default_filename: &str) -> PathBuf {
    let mut path = path.to_path_buf();
    if path.is_dir() {
        path = path.join(default_filename);
    }
    if !path.exists() {
        let with_ext = PathBuf::from(format!("{}.yaml", path.display()));
        if with_ext.exists() {
            return with_ext;
        }
    }
    path
}

/// Directory a file lives in, `.` for bare file names.
pub(crate) fn base_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Drop lines that start with `#`.
///
/// Comment lines between mapping entries can throw off the parser's
/// column tracking once shorthand tags have been expanded.
pub fn strip_comments(text: &str) -> String {
    text.split_inclusive('\n')
        .filter(|line| !(line.starts_with('#') && line.ends_with('\n')))
        .collect()
}

/// Parse template text into a document.
///
/// `path` is only used for error reporting.
pub fn parse_document(text: &str, path: &Path) -> Result<Document> {
    let text = shorthand::normalize(&strip_comments(text))?;
    let value: serde_yaml::Value =
        serde_yaml::from_str(&text).map_err(|err| parse_error(&text, path, err))?;
    Document::from_value(value).ok_or_else(|| CompileError::InvalidDocument {
        path: path.to_path_buf(),
    })
}

fn parse_error(text: &str, path: &Path, err: serde_yaml::Error) -> CompileError {
    let message = err.to_string();
    let problem = message
        .split(" at line ")
        .next()
        .unwrap_or(message.as_str())
        .to_string();

    let (line, column) = err
        .location()
        .map(|loc| (loc.line(), loc.column()))
        .unwrap_or((0, 0));

    let source_line = text
        .lines()
        .nth(line.saturating_sub(1))
        .unwrap_or_default();
    let excerpt = format!(
        "{}\n{}^- {}",
        source_line,
        " ".repeat(column.saturating_sub(1)),
        problem
    );

    CompileError::Parse {
        path: path.to_path_buf(),
        line,
        column,
        excerpt,
    }
}

/// A single loaded template file.
///
/// Each template owns its document. Includes are not expanded here; see
/// [`crate::Compiler`].
#[derive(Debug, Clone)]
pub struct Template {
    path: PathBuf,
    basedir: PathBuf,
    document: Document,
}

impl Template {
    /// Load and parse the template at `path`.
    pub fn load(path: &Path, options: &CompileOptions) -> Result<Self> {
        let path = resolve_template_path(path, &options.default_filename);
        debug!(path = %path.display(), "Loading template");

        let text = std::fs::read_to_string(&path).map_err(|e| CompileError::read(&path, e))?;
        let document = parse_document(&text, &path)?;

        Ok(Self {
            basedir: base_dir(&path),
            path,
            document,
        })
    }

    /// Resolved path of the template file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory relative file references are resolved against.
    pub fn basedir(&self) -> &Path {
        &self.basedir
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    pub fn into_document(self) -> Document {
        self.document
    }
}
