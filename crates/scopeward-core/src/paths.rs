//! Repository-relative path normalization and root containment.
//!
//! Every path that crosses the scope guard is reduced to a POSIX-style,
//! repository-relative form before comparison:
//!
//! - surrounding whitespace is trimmed and `\` becomes `/`
//! - repeated slashes collapse and `.` segments disappear (so `./a` is `a`)
//! - `..` segments resolve lexically; climbing above the root is an error
//! - absolute paths (`/etc/passwd`, `C:/x`) are errors
//! - input that resolves to the repository itself (`.`, `src/..`) becomes
//!   [`REPO_ROOT`]; only blank input becomes the empty path
//!
//! Roots use the same rules, except that an empty root also means the entire
//! repository.
//!
//! Comparison is case-sensitive and purely lexical. Symlinks are not
//! resolved; the guard reasons about the paths the caller intends to touch.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{PathError, PathResult};

/// Root value that covers the whole repository.
pub const REPO_ROOT: &str = ".";

/// A normalized repository-relative path.
///
/// The empty path is valid and means "not provided". [`REPO_ROOT`] names the
/// repository directory itself and is only covered by a `"."` root.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RelPath(String);

impl RelPath {
    /// Normalize a raw path into a [`RelPath`].
    ///
    /// # Errors
    ///
    /// See [`normalize_rel_path`].
    pub fn parse(raw: &str) -> PathResult<Self> {
        normalize_rel_path(raw)
    }

    /// The normalized path as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the path is empty (not provided).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether the path names the repository directory itself.
    #[must_use]
    pub fn is_repo_root(&self) -> bool {
        self.0 == REPO_ROOT
    }

    /// Check containment against already-normalized roots.
    #[must_use]
    pub fn is_within(&self, roots: &[RootPath]) -> bool {
        roots.iter().any(|root| root.contains(self))
    }

    /// Consume the path and return the inner string.
    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for RelPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RelPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A normalized root directory prefix.
///
/// [`REPO_ROOT`] (`"."`) covers the entire repository.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RootPath(String);

impl RootPath {
    /// The root covering the whole repository.
    #[must_use]
    pub fn repo() -> Self {
        Self(REPO_ROOT.to_owned())
    }

    /// Normalize a raw root.
    ///
    /// # Errors
    ///
    /// See [`normalize_root`].
    pub fn parse(raw: &str) -> PathResult<Self> {
        normalize_root(raw)
    }

    /// The normalized root as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this root covers the entire repository.
    #[must_use]
    pub fn is_repo(&self) -> bool {
        self.0 == REPO_ROOT
    }

    /// Whether `path` equals this root or lives beneath it.
    #[must_use]
    pub fn contains(&self, path: &RelPath) -> bool {
        if self.is_repo() {
            return true;
        }
        let p = path.as_str();
        p == self.0
            || p.strip_prefix(self.0.as_str())
                .is_some_and(|rest| rest.starts_with('/'))
    }
}

impl fmt::Display for RootPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RootPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for RootPath {
    type Error = PathError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        normalize_root(&value)
    }
}

impl From<RootPath> for String {
    fn from(root: RootPath) -> Self {
        root.0
    }
}

/// Whether `path` starts with a Windows drive designator such as `C:` or `C:/`.
fn has_drive_prefix(path: &str) -> bool {
    let bytes = path.as_bytes();
    match bytes {
        [letter, b':'] => letter.is_ascii_alphabetic(),
        [letter, b':', b'/', ..] => letter.is_ascii_alphabetic(),
        _ => false,
    }
}

fn normalize(raw: &str) -> PathResult<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(String::new());
    }

    let unified = trimmed.replace('\\', "/");
    if unified.starts_with('/') || has_drive_prefix(&unified) {
        return Err(PathError::Absolute {
            path: trimmed.to_owned(),
        });
    }

    let mut segments: Vec<&str> = Vec::new();
    for segment in unified.split('/') {
        match segment {
            "" | "." => {},
            ".." => {
                if segments.pop().is_none() {
                    return Err(PathError::EscapesRepository {
                        path: trimmed.to_owned(),
                    });
                }
            },
            other => segments.push(other),
        }
    }

    if segments.is_empty() {
        return Ok(REPO_ROOT.to_owned());
    }
    Ok(segments.join("/"))
}

/// Normalize a raw, caller-supplied path into a [`RelPath`].
///
/// Empty input (after trimming) yields the empty path. Non-empty input that
/// resolves to the repository itself yields [`REPO_ROOT`].
///
/// # Errors
///
/// Returns [`PathError::Absolute`] for absolute paths and
/// [`PathError::EscapesRepository`] when `..` climbs above the root.
pub fn normalize_rel_path(raw: &str) -> PathResult<RelPath> {
    normalize(raw).map(RelPath)
}

/// Normalize a raw root. Empty input and `.` become [`REPO_ROOT`].
///
/// # Errors
///
/// Same as [`normalize_rel_path`].
pub fn normalize_root(raw: &str) -> PathResult<RootPath> {
    let normalized = normalize(raw)?;
    if normalized.is_empty() || normalized == REPO_ROOT {
        Ok(RootPath::repo())
    } else {
        Ok(RootPath(normalized))
    }
}

/// Check whether `path` is covered by any of `roots`.
///
/// Both sides are normalized first. A root of `"."` covers every path that
/// normalizes; a path that fails normalization is never covered. Roots that
/// fail normalization are ignored.
#[must_use]
pub fn is_path_within_roots<R: AsRef<str>>(path: &str, roots: &[R]) -> bool {
    let Ok(path) = normalize_rel_path(path) else {
        return false;
    };
    roots
        .iter()
        .filter_map(|root| normalize_root(root.as_ref()).ok())
        .any(|root| root.contains(&path))
}

/// Turn a caller path into a [`RelPath`], accepting absolute paths that live
/// under `repo_root`.
///
/// # Errors
///
/// Returns [`PathError::OutsideRepository`] for absolute paths outside
/// `repo_root`, or any error from [`normalize_rel_path`].
pub fn relativize(repo_root: &Path, raw: &str) -> PathResult<RelPath> {
    let candidate = Path::new(raw.trim());
    if candidate.is_absolute() {
        let rest = candidate
            .strip_prefix(repo_root)
            .map_err(|_| PathError::OutsideRepository {
                path: raw.trim().to_owned(),
            })?;
        if rest.as_os_str().is_empty() {
            return Ok(RelPath(REPO_ROOT.to_owned()));
        }
        return normalize_rel_path(&rest.to_string_lossy());
    }
    normalize_rel_path(raw)
}
