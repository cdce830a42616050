//! Lightweight Solidity source analysis.
//!
//! Extracts import path strings and `pragma solidity` version requirements
//! from a source buffer. No parsing beyond that; semantic analysis is out of
//! scope for the resolution pipeline.

use regex::Regex;
use semver::VersionReq;
use std::sync::LazyLock;

/// Matches the import path of any Solidity import statement shape, with the
/// path captured in one of the groups `p1`..`p4` depending on the quoting and
/// statement form.
static RE_IMPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"import\s+(?:(?:"(?P<p1>.*)"|'(?P<p2>.*)')(?:\s+as\s+\w+)?|(?:(?:\w+(?:\s+as\s+\w+)?|\*\s+as\s+\w+|\{\s*(?:\w+(?:\s+as\s+\w+)?(?:\s*,\s*)?)+\s*\})\s+from\s+(?:"(?P<p3>.*)"|'(?P<p4>.*)')))\s*;"#).unwrap()
});

/// Matches the version part of a solidity pragma, e.g. `pragma solidity
/// ^0.5.2;` => `^0.5.2`.
static RE_VERSION_PRAGMA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"pragma\s+solidity\s+(?P<version>.+?);").unwrap());

/// The import paths and version pragmas extracted from one source buffer.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SourceContents {
    /// Import path strings, verbatim, in order of appearance.
    pub import_paths: Vec<String>,
    /// Version pragma strings, e.g. `^0.8.0`, in order of appearance.
    pub version_pragmas: Vec<String>,
}

/// Extracts every import path and version pragma from the given source text.
pub fn analyze(source: &str) -> SourceContents {
    SourceContents {
        import_paths: find_import_paths(source).map(str::to_string).collect(),
        version_pragmas: find_version_pragmas(source).map(str::to_string).collect(),
    }
}

/// Returns all path parts of the solidity import statements in a string,
/// `import "./contracts/Contract.sol";` -> `"./contracts/Contract.sol"`.
///
/// See also <https://docs.soliditylang.org/en/v0.8.9/grammar.html>
pub fn find_import_paths(source: &str) -> impl Iterator<Item = &str> {
    RE_IMPORT.captures_iter(source).filter_map(|cap| {
        cap.name("p1")
            .or_else(|| cap.name("p2"))
            .or_else(|| cap.name("p3"))
            .or_else(|| cap.name("p4"))
            .map(|m| m.as_str())
    })
}

/// Returns all solidity version pragmas in the given source:
/// `pragma solidity ^0.5.2;` => `^0.5.2`
pub fn find_version_pragmas(source: &str) -> impl Iterator<Item = &str> {
    RE_VERSION_PRAGMA
        .captures_iter(source)
        .filter_map(|cap| cap.name("version").map(|m| m.as_str()))
}

/// Parses an extracted version pragma into a semver requirement.
///
/// Solidity allows `>=0.8.0 <0.9.0` style pragmas without a separating comma,
/// which `semver` rejects, so those are retried with comma separators.
pub fn parse_version_pragma(pragma: &str) -> Option<VersionReq> {
    VersionReq::parse(pragma)
        .or_else(|_| VersionReq::parse(&pragma.split_whitespace().collect::<Vec<_>>().join(", ")))
        .ok()
}
