//! Filesystem helpers.
//!
//! Everything here is deliberately deterministic: directory listings are
//! sorted by Unicode code point before they are consumed, so walks and casing
//! probes produce identical results across runs and platforms.

use crate::IoError;
use std::{
    ffi::OsString,
    io,
    path::{Component, Path, PathBuf},
};
use walkdir::WalkDir;

/// Canonicalize the path, platform-agnostic.
///
/// On windows this will ensure the path only consists of `/` separators.
pub fn canonicalize(path: impl AsRef<Path>) -> Result<PathBuf, IoError> {
    let path = path.as_ref();
    let res = dunce::canonicalize(path);
    #[cfg(windows)]
    let res = res.map(|p| {
        use path_slash::PathBufExt;
        PathBuf::from(p.to_slash_lossy().as_ref())
    });
    res.map_err(|err| IoError::new(err, path))
}

/// Same as [`canonicalize`] but returns the input path unchanged if it cannot
/// be canonicalized, e.g. because it does not exist yet.
pub fn canonicalized(path: impl Into<PathBuf>) -> PathBuf {
    let path = path.into();
    canonicalize(&path).unwrap_or(path)
}

/// Discovers the OS-canonical casing of `relative` under `root`.
///
/// The path is walked one component at a time against the sorted directory
/// listing, so on a case-insensitive filesystem this reports the casing the
/// file was actually stored with. Returns `Ok(None)` if no entry matches the
/// component under any ASCII casing, or if the final entry is not a regular
/// file.
pub fn true_case_path(root: &Path, relative: &Path) -> Result<Option<PathBuf>, IoError> {
    let mut current = root.to_path_buf();
    let mut true_relative = PathBuf::new();
    for component in relative.components() {
        let requested = match component {
            Component::Normal(name) => name,
            Component::CurDir => continue,
            _ => return Ok(None),
        };
        let entries = match std::fs::read_dir(&current) {
            Ok(entries) => entries,
            Err(err)
                if matches!(err.kind(), io::ErrorKind::NotFound | io::ErrorKind::NotADirectory) =>
            {
                return Ok(None);
            }
            Err(err) => return Err(IoError::new(err, current)),
        };
        let mut names: Vec<OsString> =
            entries.filter_map(Result::ok).map(|e| e.file_name()).collect();
        names.sort_unstable();

        let matched = if names.iter().any(|name| name.as_os_str() == requested) {
            requested.to_os_string()
        } else {
            match names.iter().find(|name| name.eq_ignore_ascii_case(requested)) {
                Some(name) => {
                    debug!(
                        requested = %requested.display(),
                        actual = %name.display(),
                        "case mismatch in path component"
                    );
                    name.clone()
                }
                None => return Ok(None),
            }
        };
        current.push(&matched);
        true_relative.push(&matched);
    }

    match std::fs::metadata(&current) {
        Ok(metadata) if metadata.is_file() => Ok(Some(true_relative)),
        Ok(_) => Ok(None),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(IoError::new(err, current)),
    }
}

/// Recursively collects every file literally named `file_name` under `root`,
/// pruning any directory named `pruned_dir`.
///
/// Results come back in sorted walk order. This also follows symlinks.
pub fn find_files_named(root: &Path, file_name: &str, pruned_dir: &str) -> Vec<PathBuf> {
    WalkDir::new(root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !(e.file_type().is_dir() && e.file_name() == pruned_dir))
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file() && e.file_name() == file_name)
        .map(|e| e.into_path())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn tempdir() -> tempfile::TempDir {
        tempfile::tempdir().unwrap()
    }

    #[test]
    fn can_discover_true_casing() {
        let tmp = tempdir();
        fs::create_dir_all(tmp.path().join("contracts/token")).unwrap();
        fs::write(tmp.path().join("contracts/token/MyToken.sol"), "").unwrap();

        let exact = true_case_path(tmp.path(), "contracts/token/MyToken.sol".as_ref()).unwrap();
        assert_eq!(exact, Some(PathBuf::from("contracts/token/MyToken.sol")));

        let wrong = true_case_path(tmp.path(), "contracts/token/mytoken.sol".as_ref()).unwrap();
        assert_eq!(wrong, Some(PathBuf::from("contracts/token/MyToken.sol")));

        let missing = true_case_path(tmp.path(), "contracts/token/Other.sol".as_ref()).unwrap();
        assert_eq!(missing, None);
    }

    #[test]
    fn true_case_path_rejects_directories() {
        let tmp = tempdir();
        fs::create_dir_all(tmp.path().join("contracts")).unwrap();
        assert_eq!(true_case_path(tmp.path(), "contracts".as_ref()).unwrap(), None);
    }

    #[test]
    fn can_find_named_files_outside_pruned_dirs() {
        let tmp = tempdir();
        fs::create_dir_all(tmp.path().join("lib/sub")).unwrap();
        fs::create_dir_all(tmp.path().join("node_modules/dep")).unwrap();
        fs::write(tmp.path().join("remappings.txt"), "").unwrap();
        fs::write(tmp.path().join("lib/sub/remappings.txt"), "").unwrap();
        fs::write(tmp.path().join("node_modules/dep/remappings.txt"), "").unwrap();

        let found = find_files_named(tmp.path(), "remappings.txt", "node_modules");
        assert_eq!(
            found,
            vec![tmp.path().join("lib/sub/remappings.txt"), tmp.path().join("remappings.txt")]
        );
    }
}
