//! Unified diff splitting.
//!
//! [`parse_proposal_unified_diff`] cuts a combined unified diff into one
//! [`DiffFileEntry`] per file. It never fails: input it cannot make sense of
//! yields placeholder entries for the proposal's declared files and a
//! [`DiffQuality::Degraded`] result.
//!
//! A file starts at a `diff --git a/<p> b/<p>` header, or at a `--- <p>` line
//! immediately followed by `+++ <p>` when not inside a git header or hunk.
//! Inside a hunk whose `@@ -a,b +c,d @@` header parsed, lines are classified
//! by their first byte until the announced line counts are used up, so a
//! removed line that reads `-- note` counts as a deletion.
//!
//! Renames and copies are keyed by their destination. The paths they read
//! from or remove (`--- a/<old>`, `rename from`, `copy from`) are kept in
//! [`ParsedDiff::source_paths`].

use scopeward_core::{RelPath, normalize_rel_path};
use serde::{Deserialize, Serialize};
use tracing::debug;

const DEV_NULL: &str = "/dev/null";

/// The slice of a diff that touches one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffFileEntry {
    /// Normalized path of the file.
    pub path: RelPath,
    /// The file's lines, from its boundary marker up to the next one.
    pub unified_patch: String,
    /// Added lines.
    pub additions: u32,
    /// Removed lines.
    pub deletions: u32,
    /// `@@` hunk headers.
    pub hunk_count: u32,
}

impl DiffFileEntry {
    fn placeholder(path: RelPath) -> Self {
        Self {
            path,
            unified_patch: String::new(),
            additions: 0,
            deletions: 0,
            hunk_count: 0,
        }
    }

    /// Whether the entry carries patch text to preview.
    #[must_use]
    pub fn has_preview(&self) -> bool {
        !self.unified_patch.is_empty()
    }
}

/// Whether the file split could be recovered from the diff itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffQuality {
    /// Every entry came from the diff.
    #[default]
    Clean,
    /// Entries were synthesized or dropped; see the warnings.
    Degraded,
}

/// Result of splitting a diff.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedDiff {
    /// One entry per file, in diff order.
    pub files: Vec<DiffFileEntry>,
    /// Human-readable notes about anything that did not parse cleanly.
    pub warnings: Vec<String>,
    /// Clean or degraded.
    pub quality: DiffQuality,
    /// Raw paths from file headers that failed normalization.
    pub invalid_paths: Vec<String>,
    /// Old-side paths of renames, copies and other sections whose source
    /// differs from the entry path.
    #[serde(default)]
    pub source_paths: Vec<RelPath>,
}

impl ParsedDiff {
    /// Look up the entry for `path`. The argument is normalized first.
    #[must_use]
    pub fn file(&self, path: &str) -> Option<&DiffFileEntry> {
        let path = normalize_rel_path(path).ok()?;
        self.files.iter().find(|entry| entry.path == path)
    }

    /// Paths of all entries.
    pub fn paths(&self) -> impl Iterator<Item = &RelPath> {
        self.files.iter().map(|entry| &entry.path)
    }

    /// Whether the result came from the fallback path.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.quality == DiffQuality::Degraded
    }

    /// Total added lines over all entries.
    #[must_use]
    pub fn total_additions(&self) -> u32 {
        self.files
            .iter()
            .fold(0, |acc, entry| acc.saturating_add(entry.additions))
    }

    /// Total removed lines over all entries.
    #[must_use]
    pub fn total_deletions(&self) -> u32 {
        self.files
            .iter()
            .fold(0, |acc, entry| acc.saturating_add(entry.deletions))
    }
}

/// Line budget of the hunk being read.
#[derive(Debug, Clone, Copy)]
struct HunkBudget {
    old: u32,
    new: u32,
}

impl HunkBudget {
    fn exhausted(self) -> bool {
        self.old == 0 && self.new == 0
    }
}

#[derive(Debug, Default)]
struct FileBuilder {
    header_path: Option<String>,
    header_old_path: Option<String>,
    old_path: Option<String>,
    new_path: Option<String>,
    copied_from: Option<String>,
    patch: String,
    additions: u32,
    deletions: u32,
    hunks: u32,
}

impl FileBuilder {
    fn raw_path(&self) -> Option<&str> {
        let usable = |p: &&String| p.as_str() != DEV_NULL && !p.is_empty();
        self.new_path
            .as_ref()
            .filter(usable)
            .or_else(|| self.old_path.as_ref().filter(usable))
            .or(self.header_path.as_ref())
            .map(String::as_str)
    }

    /// Old-side paths named by the section, in header order.
    fn source_candidates(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for raw in [&self.copied_from, &self.old_path, &self.header_old_path]
            .into_iter()
            .flatten()
        {
            let raw = raw.as_str();
            if raw != DEV_NULL && !raw.is_empty() && !out.contains(&raw) {
                out.push(raw);
            }
        }
        out
    }
}

/// Strip a header path down to the repository path: drop a trailing
/// tab-separated timestamp and the `a/` or `b/` side prefix.
fn clean_header_path(raw: &str) -> String {
    let path = raw.split('\t').next().unwrap_or(raw).trim();
    if path == DEV_NULL {
        return path.to_owned();
    }
    path.strip_prefix("a/")
        .or_else(|| path.strip_prefix("b/"))
        .unwrap_or(path)
        .to_owned()
}

/// The `(old, new)` sides of a `diff --git a/<old> b/<new>` line.
fn git_header_paths(rest: &str) -> (Option<String>, Option<String>) {
    if let Some(idx) = rest.rfind(" b/") {
        let old = rest.get(..idx).map(clean_header_path);
        let new = rest.get(idx.saturating_add(1)..).map(clean_header_path);
        return (old, new);
    }
    let mut sides = rest.split_whitespace();
    let old = sides.next().map(clean_header_path);
    (old, sides.next().map(clean_header_path))
}

fn parse_range(token: &str) -> Option<u32> {
    match token.split_once(',') {
        Some((start, count)) => {
            start.parse::<u32>().ok()?;
            count.parse().ok()
        },
        None => {
            token.parse::<u32>().ok()?;
            Some(1)
        },
    }
}

/// Parse `@@ -a,b +c,d @@` into the old and new line counts.
fn parse_hunk_header(line: &str) -> Option<HunkBudget> {
    let body = line.strip_prefix("@@ ")?;
    let (ranges, _) = body.split_once(" @@")?;
    let mut parts = ranges.split_whitespace();
    let old = parse_range(parts.next()?.strip_prefix('-')?)?;
    let new = parse_range(parts.next()?.strip_prefix('+')?)?;
    Some(HunkBudget { old, new })
}

struct Splitter {
    files: Vec<DiffFileEntry>,
    warnings: Vec<String>,
    invalid_paths: Vec<String>,
    source_paths: Vec<RelPath>,
    current: Option<FileBuilder>,
    in_git_header: bool,
    hunk: Option<HunkBudget>,
}

impl Splitter {
    fn new() -> Self {
        Self {
            files: Vec::new(),
            warnings: Vec::new(),
            invalid_paths: Vec::new(),
            source_paths: Vec::new(),
            current: None,
            in_git_header: false,
            hunk: None,
        }
    }

    fn start_file(&mut self, builder: FileBuilder, in_git_header: bool) {
        self.finish_file();
        self.current = Some(builder);
        self.in_git_header = in_git_header;
        self.hunk = None;
    }

    fn finish_file(&mut self) {
        let Some(builder) = self.current.take() else {
            return;
        };
        self.record_sources(&builder);
        let Some(raw) = builder.raw_path().map(str::to_owned) else {
            self.warnings
                .push("dropped a diff section with no file path".to_owned());
            return;
        };
        let path = match normalize_rel_path(&raw) {
            Ok(path) if !path.is_empty() => path,
            Ok(_) => {
                self.warnings
                    .push("dropped a diff section with an empty file path".to_owned());
                return;
            },
            Err(e) => {
                self.warnings
                    .push(format!("dropped diff section for '{raw}': {e}"));
                self.record_invalid(raw);
                return;
            },
        };

        if let Some(existing) = self.files.iter_mut().find(|entry| entry.path == path) {
            existing.unified_patch.push_str(&builder.patch);
            existing.additions = existing.additions.saturating_add(builder.additions);
            existing.deletions = existing.deletions.saturating_add(builder.deletions);
            existing.hunk_count = existing.hunk_count.saturating_add(builder.hunks);
            return;
        }

        self.files.push(DiffFileEntry {
            path,
            unified_patch: builder.patch,
            additions: builder.additions,
            deletions: builder.deletions,
            hunk_count: builder.hunks,
        });
    }

    fn record_sources(&mut self, builder: &FileBuilder) {
        let dest = builder.raw_path();
        let dest_path = dest.and_then(|raw| normalize_rel_path(raw).ok());
        for raw in builder.source_candidates() {
            if Some(raw) == dest {
                continue;
            }
            match normalize_rel_path(raw) {
                Ok(path) if path.is_empty() => {},
                Ok(path) => {
                    if dest_path.as_ref() != Some(&path) && !self.source_paths.contains(&path) {
                        self.source_paths.push(path);
                    }
                },
                Err(e) => {
                    self.warnings
                        .push(format!("invalid source path '{raw}': {e}"));
                    self.record_invalid(raw.to_owned());
                },
            }
        }
    }

    fn record_invalid(&mut self, raw: String) {
        if !self.invalid_paths.contains(&raw) {
            self.invalid_paths.push(raw);
        }
    }

    /// Consume a line inside an open hunk. Returns `false` when the line does
    /// not belong to the hunk, which closes it.
    fn hunk_line(&mut self, text: &str) -> bool {
        let (Some(mut budget), Some(file)) = (self.hunk, self.current.as_mut()) else {
            return false;
        };
        match text.as_bytes().first() {
            Some(b'+') => {
                file.additions = file.additions.saturating_add(1);
                budget.new = budget.new.saturating_sub(1);
            },
            Some(b'-') => {
                file.deletions = file.deletions.saturating_add(1);
                budget.old = budget.old.saturating_sub(1);
            },
            Some(b' ') | None => {
                budget.old = budget.old.saturating_sub(1);
                budget.new = budget.new.saturating_sub(1);
            },
            // "\ No newline at end of file"
            Some(b'\\') => {},
            Some(_) => {
                self.hunk = None;
                return false;
            },
        }
        self.hunk = (!budget.exhausted()).then_some(budget);
        true
    }

    fn push_line(&mut self, line: &str) {
        if let Some(file) = self.current.as_mut() {
            file.patch.push_str(line);
        }
    }
}

fn line_text(line: &str) -> &str {
    line.trim_end_matches('\n').trim_end_matches('\r')
}

/// Split `diff` into per-file entries.
///
/// `fallback_files` are the paths the proposal declares; they are used when
/// no file boundary can be found, and checked against the parsed entries
/// otherwise.
#[must_use]
pub fn parse_proposal_unified_diff<S: AsRef<str>>(diff: &str, fallback_files: &[S]) -> ParsedDiff {
    let mut splitter = Splitter::new();
    let mut lines = diff.split_inclusive('\n').peekable();

    while let Some(line) = lines.next() {
        let text = line_text(line);

        if splitter.hunk.is_some() && splitter.hunk_line(text) {
            splitter.push_line(line);
            continue;
        }

        if let Some(rest) = text.strip_prefix("diff --git ") {
            let (header_old_path, header_path) = git_header_paths(rest);
            splitter.start_file(
                FileBuilder {
                    header_path,
                    header_old_path,
                    ..FileBuilder::default()
                },
                true,
            );
            splitter.push_line(line);
            continue;
        }

        if text.starts_with("@@") {
            if let Some(file) = splitter.current.as_mut() {
                file.hunks = file.hunks.saturating_add(1);
                splitter.hunk = parse_hunk_header(text).filter(|b| !b.exhausted());
                splitter.in_git_header = false;
            }
            splitter.push_line(line);
            continue;
        }

        if let Some(rest) = text.strip_prefix("--- ") {
            let next_is_new_side = lines
                .peek()
                .is_some_and(|next| line_text(next).starts_with("+++ "));
            if splitter.in_git_header {
                if let Some(file) = splitter.current.as_mut() {
                    file.old_path = Some(clean_header_path(rest));
                }
                splitter.push_line(line);
                continue;
            }
            if next_is_new_side {
                splitter.start_file(
                    FileBuilder {
                        old_path: Some(clean_header_path(rest)),
                        ..FileBuilder::default()
                    },
                    true,
                );
                splitter.push_line(line);
                continue;
            }
        }

        if let Some(rest) = text.strip_prefix("+++ ")
            && splitter.in_git_header
        {
            if let Some(file) = splitter.current.as_mut() {
                file.new_path = Some(clean_header_path(rest));
            }
            splitter.push_line(line);
            continue;
        }

        if splitter.in_git_header
            && let Some(from) = text
                .strip_prefix("rename from ")
                .or_else(|| text.strip_prefix("copy from "))
        {
            if let Some(file) = splitter.current.as_mut() {
                file.copied_from = Some(from.trim().to_owned());
            }
            splitter.push_line(line);
            continue;
        }

        if let Some(file) = splitter.current.as_mut() {
            if text.starts_with('+') && !text.starts_with("+++") {
                file.additions = file.additions.saturating_add(1);
            } else if text.starts_with('-') && !text.starts_with("---") {
                file.deletions = file.deletions.saturating_add(1);
            }
        }
        splitter.push_line(line);
    }
    splitter.finish_file();

    let Splitter {
        files,
        mut warnings,
        invalid_paths,
        source_paths,
        ..
    } = splitter;

    if files.is_empty() && invalid_paths.is_empty() {
        return fallback(fallback_files, warnings);
    }

    let quality = if warnings.is_empty() {
        DiffQuality::Clean
    } else {
        DiffQuality::Degraded
    };

    for declared in fallback_files {
        let Ok(path) = normalize_rel_path(declared.as_ref()) else {
            continue;
        };
        if !path.is_empty() && !files.iter().any(|entry| entry.path == path) {
            warnings.push(format!("declared file '{path}' does not appear in the diff"));
        }
    }

    debug!(
        files = files.len(),
        warnings = warnings.len(),
        ?quality,
        "Split proposal diff"
    );
    ParsedDiff {
        files,
        warnings,
        quality,
        invalid_paths,
        source_paths,
    }
}

fn fallback<S: AsRef<str>>(fallback_files: &[S], mut warnings: Vec<String>) -> ParsedDiff {
    let mut files: Vec<DiffFileEntry> = Vec::new();
    let mut invalid_paths = Vec::new();
    for raw in fallback_files {
        match normalize_rel_path(raw.as_ref()) {
            Ok(path) if path.is_empty() => {},
            Ok(path) => {
                if !files.iter().any(|entry| entry.path == path) {
                    files.push(DiffFileEntry::placeholder(path));
                }
            },
            Err(e) => {
                warnings.push(format!("ignored declared file '{}': {e}", raw.as_ref()));
                invalid_paths.push(raw.as_ref().to_owned());
            },
        }
    }
    warnings.push(format!(
        "diff has no recognizable file boundaries; listing {} declared file(s) without preview",
        files.len()
    ));
    debug!(files = files.len(), "Diff split fell back to declared files");
    ParsedDiff {
        files,
        warnings,
        quality: DiffQuality::Degraded,
        invalid_paths,
        source_paths: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_FILES: &str = "\
diff --git a/a.ts b/a.ts
index 1111111..2222222 100644
--- a/a.ts
+++ b/a.ts
@@ -1,3 +1,4 @@
 const a = 1;
-const b = 2;
+const b = 3;
+const c = 4;
 export { a };
diff --git a/b.ts b/b.ts
index 3333333..4444444 100644
--- a/b.ts
+++ b/b.ts
@@ -10,2 +10,1 @@
-old line one
-old line two
+new line
@@ -20,1 +19,2 @@
 keep
+added
";

    #[test]
    fn test_two_file_split() {
        let parsed = parse_proposal_unified_diff(TWO_FILES, &["a.ts", "b.ts"]);
        assert_eq!(parsed.quality, DiffQuality::Clean);
        assert!(parsed.warnings.is_empty());
        assert_eq!(parsed.files.len(), 2);

        let a = parsed.file("a.ts").unwrap();
        assert_eq!((a.additions, a.deletions, a.hunk_count), (2, 1, 1));
        let b = parsed.file("./b.ts").unwrap();
        assert_eq!((b.additions, b.deletions, b.hunk_count), (2, 2, 2));
        assert!(b.unified_patch.starts_with("diff --git a/b.ts b/b.ts\n"));
        assert!(!b.unified_patch.contains("a.ts"));
        assert_eq!(parsed.total_additions(), 4);
    }

    #[test]
    fn test_patches_reassemble_input() {
        let parsed = parse_proposal_unified_diff(TWO_FILES, &[] as &[&str]);
        let joined: String = parsed.files.iter().map(|f| f.unified_patch.as_str()).collect();
        assert_eq!(joined, TWO_FILES);
    }

    #[test]
    fn test_dash_lines_inside_hunk_are_changes() {
        let diff = "\
--- a/notes.md
+++ b/notes.md
@@ -1,2 +1,2 @@
--- heading
+++ heading
 body
";
        let parsed = parse_proposal_unified_diff(diff, &["notes.md"]);
        assert_eq!(parsed.files.len(), 1);
        let entry = &parsed.files[0];
        assert_eq!((entry.additions, entry.deletions), (1, 1));
    }

    #[test]
    fn test_plain_header_pair_without_git_line() {
        let diff = "\
--- old/src/lib.rs\t2024-01-01 00:00:00
+++ new/src/lib.rs\t2024-01-02 00:00:00
@@ -1 +1 @@
-a
+b
";
        let parsed = parse_proposal_unified_diff(diff, &[] as &[&str]);
        assert_eq!(parsed.files[0].path.as_str(), "new/src/lib.rs");
    }

    #[test]
    fn test_new_and_deleted_files() {
        let diff = "\
diff --git a/added.txt b/added.txt
new file mode 100644
--- /dev/null
+++ b/added.txt
@@ -0,0 +1,2 @@
+one
+two
diff --git a/gone.txt b/gone.txt
deleted file mode 100644
--- a/gone.txt
+++ /dev/null
@@ -1 +0,0 @@
-bye
";
        let parsed = parse_proposal_unified_diff(diff, &[] as &[&str]);
        let names: Vec<&str> = parsed.paths().map(RelPath::as_str).collect();
        assert_eq!(names, vec!["added.txt", "gone.txt"]);
        assert_eq!(parsed.file("added.txt").unwrap().additions, 2);
        assert_eq!(parsed.file("gone.txt").unwrap().deletions, 1);
    }

    #[test]
    fn test_empty_diff_falls_back() {
        let parsed = parse_proposal_unified_diff("", &["c.ts"]);
        assert!(parsed.is_degraded());
        assert_eq!(parsed.files.len(), 1);
        let entry = parsed.file("c.ts").unwrap();
        assert!(entry.unified_patch.is_empty());
        assert!(!entry.has_preview());
        assert_eq!((entry.additions, entry.deletions, entry.hunk_count), (0, 0, 0));
        assert!(!parsed.warnings.is_empty());
    }

    #[test]
    fn test_garbage_falls_back_and_dedupes() {
        let parsed =
            parse_proposal_unified_diff("not a diff\n+++ nope\n", &["x/y.md", "./x/y.md", ""]);
        assert!(parsed.is_degraded());
        assert_eq!(parsed.files.len(), 1);
    }

    #[test]
    fn test_lookup_miss_is_none() {
        let parsed = parse_proposal_unified_diff(TWO_FILES, &["a.ts"]);
        assert!(parsed.file("c.ts").is_none());
        assert!(parsed.file("../a.ts").is_none());
    }

    #[test]
    fn test_missing_declared_file_warns() {
        let parsed = parse_proposal_unified_diff(TWO_FILES, &["a.ts", "b.ts", "c.ts"]);
        assert_eq!(parsed.quality, DiffQuality::Clean);
        assert_eq!(parsed.warnings.len(), 1);
        assert!(parsed.warnings[0].contains("c.ts"));
    }

    #[test]
    fn test_escaping_header_path_is_recorded() {
        let diff = "\
--- a/../../etc/passwd
+++ b/../../etc/passwd
@@ -1 +1 @@
-root
+evil
";
        let parsed = parse_proposal_unified_diff(diff, &["ok.txt"]);
        assert!(parsed.files.is_empty());
        assert!(parsed.is_degraded());
        assert_eq!(parsed.invalid_paths, vec!["../../etc/passwd"]);
    }

    #[test]
    fn test_unparseable_hunk_header_uses_plain_rule() {
        let diff = "\
diff --git a/f b/f
--- a/f
+++ b/f
@@ garbage @@
+x
-y
";
        let parsed = parse_proposal_unified_diff(diff, &["f"]);
        let entry = parsed.file("f").unwrap();
        assert_eq!((entry.additions, entry.deletions, entry.hunk_count), (1, 1, 1));
    }

    #[test]
    fn test_crlf_and_no_newline_marker() {
        let diff = "--- a/w.txt\r\n+++ b/w.txt\r\n@@ -1 +1 @@\r\n-a\r\n+b\r\n\\ No newline at end of file\r\n";
        let parsed = parse_proposal_unified_diff(diff, &["w.txt"]);
        let entry = parsed.file("w.txt").unwrap();
        assert_eq!((entry.additions, entry.deletions), (1, 1));
        assert_eq!(entry.unified_patch, diff);
    }

    #[test]
    fn test_rename_keeps_source_path() {
        let diff = "\
diff --git a/src/secret.rs b/content/story/moved.md
similarity index 90%
rename from src/secret.rs
rename to content/story/moved.md
--- a/src/secret.rs
+++ b/content/story/moved.md
@@ -1 +1 @@
-let key = 1;
+let key = 2;
";
        let parsed = parse_proposal_unified_diff(diff, &["content/story/moved.md"]);
        assert_eq!(parsed.quality, DiffQuality::Clean);
        let names: Vec<&str> = parsed.paths().map(RelPath::as_str).collect();
        assert_eq!(names, vec!["content/story/moved.md"]);
        let sources: Vec<&str> = parsed.source_paths.iter().map(RelPath::as_str).collect();
        assert_eq!(sources, vec!["src/secret.rs"]);
        assert_eq!(parsed.file("content/story/moved.md").unwrap().additions, 1);
    }

    #[test]
    fn test_pure_rename_and_copy_without_hunks() {
        let diff = "\
diff --git a/docs/old.md b/docs/new.md
similarity index 100%
rename from docs/old.md
rename to docs/new.md
diff --git a/lib/a.rs b/lib/b.rs
similarity index 100%
copy from lib/a.rs
copy to lib/b.rs
";
        let parsed = parse_proposal_unified_diff(diff, &[] as &[&str]);
        let names: Vec<&str> = parsed.paths().map(RelPath::as_str).collect();
        assert_eq!(names, vec!["docs/new.md", "lib/b.rs"]);
        let sources: Vec<&str> = parsed.source_paths.iter().map(RelPath::as_str).collect();
        assert_eq!(sources, vec!["docs/old.md", "lib/a.rs"]);
    }

    #[test]
    fn test_escaping_rename_source_is_invalid() {
        let diff = "\
diff --git a/../outside.txt b/inside.txt
rename from ../outside.txt
rename to inside.txt
";
        let parsed = parse_proposal_unified_diff(diff, &[] as &[&str]);
        assert!(parsed.source_paths.is_empty());
        assert_eq!(parsed.invalid_paths, vec!["../outside.txt"]);
        assert!(parsed.is_degraded());
    }

    #[test]
    fn test_edits_in_place_have_no_sources() {
        let parsed = parse_proposal_unified_diff(TWO_FILES, &["a.ts", "b.ts"]);
        assert!(parsed.source_paths.is_empty());
    }

    #[test]
    fn test_hunk_header_ranges() {
        let budget = parse_hunk_header("@@ -1,3 +1,4 @@ fn main()").unwrap();
        assert_eq!((budget.old, budget.new), (3, 4));
        let budget = parse_hunk_header("@@ -5 +7 @@").unwrap();
        assert_eq!((budget.old, budget.new), (1, 1));
        assert!(parse_hunk_header("@@ -x +1 @@").is_none());
        assert!(parse_hunk_header("@@@ -1 +1 @@@").is_none());
    }
}
