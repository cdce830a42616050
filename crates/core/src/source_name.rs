//! Canonical source names.
//!
//! A source name is a `/`-separated identifier for a Solidity source file,
//! independent of the host OS path flavor. The utilities here are purely
//! lexical; none of them touch the filesystem.

use std::path::{Path, PathBuf};

/// Joins the given fragments with single `/` separators, collapsing runs.
///
/// Empty fragments are skipped. A trailing `/` on the last non-empty fragment
/// is preserved, so `join(["a", "b", "/"])` yields `a/b/`.
pub fn join<I, S>(parts: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out = String::new();
    let mut trailing = false;
    for part in parts {
        let part = part.as_ref();
        if part.is_empty() {
            continue;
        }
        trailing = part.ends_with('/');
        for segment in part.split('/').filter(|s| !s.is_empty()) {
            if !out.is_empty() {
                out.push('/');
            }
            out.push_str(segment);
        }
    }
    if trailing && !out.is_empty() && !out.ends_with('/') {
        out.push('/');
    }
    out
}

/// Returns everything up to the last `/`, or `""` for a bare file name.
pub fn dirname(source_name: &str) -> &str {
    source_name.rsplit_once('/').map_or("", |(dir, _)| dir)
}

/// Appends a `/` unless the name already ends with one.
pub fn ensure_trailing_slash(name: &str) -> String {
    if name.ends_with('/') { name.to_string() } else { format!("{name}/") }
}

/// Lexically resolves `.` and `..` segments of a source name.
///
/// Returns `None` if a `..` would climb above the first segment, which for a
/// rooted source name means escaping the namespace entirely. Separator runs
/// are collapsed as in [`join`].
pub fn clean(source_name: &str) -> Option<String> {
    let mut segments = Vec::new();
    for segment in source_name.split('/').filter(|s| !s.is_empty()) {
        match segment {
            "." => {}
            ".." => {
                segments.pop()?;
            }
            _ => segments.push(segment),
        }
    }
    Some(segments.join("/"))
}

/// Converts a relative filesystem path into a source name.
///
/// This only swaps the separator on hosts where it differs from `/`; `.` and
/// `..` components are passed through untouched, the caller guarantees a
/// forward-only relative path.
pub fn from_fs_path(relative: &Path) -> String {
    #[cfg(windows)]
    {
        use path_slash::PathExt;
        relative.to_slash_lossy().into_owned()
    }
    #[cfg(not(windows))]
    {
        relative.to_string_lossy().into_owned()
    }
}

/// Converts a source name into a relative filesystem path.
pub fn to_fs_path(source_name: &str) -> PathBuf {
    #[cfg(windows)]
    {
        use path_slash::PathBufExt;
        PathBuf::from_slash(source_name)
    }
    #[cfg(not(windows))]
    {
        PathBuf::from(source_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn can_join_source_names() {
        assert_eq!(join(["a", "b", "c"]), "a/b/c");
        assert_eq!(join(["a/", "/b/", "c"]), "a/b/c");
        assert_eq!(join(["", "a", ""]), "a");
        assert_eq!(join(["a//b", "c"]), "a/b/c");
        assert_eq!(join(["project", "lib/submodule", "/"]), "project/lib/submodule/");
        assert_eq!(join(["npm/foo@1.0.0", "src/Foo.sol"]), "npm/foo@1.0.0/src/Foo.sol");
        assert_eq!(join::<_, &str>([]), "");
    }

    #[test]
    fn can_take_dirname() {
        assert_eq!(dirname("project/contracts/A.sol"), "project/contracts");
        assert_eq!(dirname("A.sol"), "");
        assert_eq!(dirname("npm/foo@1.0.0/Foo.sol"), "npm/foo@1.0.0");
    }

    #[test]
    fn can_clean_source_names() {
        assert_eq!(clean("a/b/c").as_deref(), Some("a/b/c"));
        assert_eq!(clean("a/./b").as_deref(), Some("a/b"));
        assert_eq!(clean("a/b/../c").as_deref(), Some("a/c"));
        assert_eq!(clean("a/b/../../c").as_deref(), Some("c"));
        assert_eq!(clean("a//b/.").as_deref(), Some("a/b"));
        assert_eq!(clean("a/../.."), None);
        assert_eq!(clean("../a"), None);
    }

    #[test]
    fn trailing_slash_is_preserved() {
        assert_eq!(ensure_trailing_slash("project"), "project/");
        assert_eq!(ensure_trailing_slash("project/"), "project/");
        assert_eq!(join(["project", "bar/"]), "project/bar/");
    }
}
