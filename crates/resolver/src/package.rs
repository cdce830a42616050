//! Installed packages and their manifests.

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::{path::PathBuf, sync::LazyLock};

/// Canonical source-name root of the project package itself.
pub const PROJECT_ROOT_SOURCE_NAME: &str = "project";

/// Version sentinel for packages that live in the surrounding monorepo: not
/// under any `node_modules` and not under the project root.
pub const LOCAL_VERSION_SENTINEL: &str = "local";

/// Matches a leading npm module name, `(@scope/)?name`, at the start of a
/// specifier. Names start with `[a-z0-9~-]` and continue with
/// `[a-z0-9~._-]`; scopes follow the same rule after `@`.
static RE_MODULE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:@[a-z0-9~-][a-z0-9~._-]*/)?[a-z0-9~-][a-z0-9~._-]*").unwrap()
});

/// An installed Solidity package.
///
/// Packages are interned by the map: the same `(name, version)` reached
/// through any number of installation paths is one `Arc<Package>`, so
/// identity comparisons are `Arc::ptr_eq`.
#[derive(Debug, PartialEq, Eq)]
pub struct Package {
    /// Declared package name; may differ from the directory it was installed
    /// under when the dependency is aliased.
    pub name: String,
    /// Declared version, or [`LOCAL_VERSION_SENTINEL`].
    pub version: String,
    /// Absolute path of the package directory.
    pub root_fs_path: PathBuf,
    /// Canonical source-name prefix: `project` for the project itself,
    /// otherwise `npm/<name>@<version>`.
    pub root_source_name: String,
    /// The raw `exports` field of the manifest, if declared.
    pub exports: Option<Value>,
}

impl Package {
    pub fn is_project_package(&self) -> bool {
        self.root_source_name == PROJECT_ROOT_SOURCE_NAME
    }

    pub(crate) fn npm_root_source_name(name: &str, version: &str) -> String {
        format!("npm/{name}@{version}")
    }
}

/// The subset of `package.json` the resolver reads.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct PackageJson {
    pub name: Option<String>,
    pub version: Option<String>,
    pub exports: Option<Value>,
}

impl PackageJson {
    pub(crate) fn parse(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

/// Splits a specifier into its leading module name and the subpath after it,
/// without the separating `/`.
///
/// Returns `None` if the specifier does not start with a valid module name
/// or the name is followed by anything other than `/` or the end.
pub(crate) fn split_module_specifier(specifier: &str) -> Option<(&str, &str)> {
    let matched = RE_MODULE_NAME.find(specifier)?;
    let (name, rest) = specifier.split_at(matched.end());
    let subpath = match rest.strip_prefix('/') {
        Some(subpath) => subpath,
        None if rest.is_empty() => "",
        None => return None,
    };
    Some((name, subpath))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn can_split_module_specifiers() {
        assert_eq!(split_module_specifier("dep/src/A.sol"), Some(("dep", "src/A.sol")));
        assert_eq!(
            split_module_specifier("@scope/dep/src/A.sol"),
            Some(("@scope/dep", "src/A.sol"))
        );
        assert_eq!(split_module_specifier("dep"), Some(("dep", "")));
        assert_eq!(split_module_specifier("dep/"), Some(("dep", "")));
        assert_eq!(split_module_specifier("my-dep.js/a.sol"), Some(("my-dep.js", "a.sol")));
    }

    #[test]
    fn invalid_module_specifiers_are_rejected() {
        assert_eq!(split_module_specifier("Dep/src/A.sol"), None);
        assert_eq!(split_module_specifier("/abs/path.sol"), None);
        assert_eq!(split_module_specifier(""), None);
        assert_eq!(split_module_specifier("dep!name/a.sol"), None);
        assert_eq!(split_module_specifier("@scope"), None);
    }

    #[test]
    fn npm_root_source_names() {
        assert_eq!(Package::npm_root_source_name("dep", "1.2.0"), "npm/dep@1.2.0");
        assert_eq!(Package::npm_root_source_name("@scope/dep", "local"), "npm/@scope/dep@local");
    }
}
