//! Remapping parsing and remapping value types.
//!
//! A remapping rewrites the prefix of an import string before it is looked
//! up on disk. User remappings come from `remappings.txt` files; generated
//! remappings are synthesized by the package map to describe installation
//! edges.

use crate::package::Package;
use serde::{Deserialize, Serialize};
use std::{fmt, path::PathBuf, str::FromStr, sync::Arc};

/// A single `[context:]prefix=target` remapping.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Remapping {
    /// Only imports appearing in files whose source name starts with this
    /// apply the remapping. The empty context matches everything.
    pub context: String,
    /// The import prefix to replace.
    pub prefix: String,
    /// The replacement.
    pub target: String,
}

/// The parse failure for a line that does not match the remapping grammar:
/// missing `=`, empty prefix, or empty target.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("invalid remapping \"{line}\"")]
pub struct InvalidRemapping {
    pub line: String,
}

impl FromStr for Remapping {
    type Err = InvalidRemapping;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || InvalidRemapping { line: s.to_string() };
        let (head, target) = s.split_once('=').ok_or_else(err)?;
        let (context, prefix) = match head.split_once(':') {
            Some((context, prefix)) => (context, prefix),
            None => ("", head),
        };
        if prefix.is_empty() || target.is_empty() {
            return Err(err());
        }
        Ok(Self { context: context.to_string(), prefix: prefix.to_string(), target: target.to_string() })
    }
}

impl fmt::Display for Remapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.context.is_empty() {
            write!(f, "{}:", self.context)?;
        }
        write!(f, "{}={}", self.prefix, self.target)
    }
}

/// A remapping from a `remappings.txt`, after validation and source-name
/// rewriting: context and target use canonical source-name prefixes, never
/// on-disk paths.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserRemapping {
    pub remapping: Remapping,
    /// The verbatim line this was parsed from, trimmed.
    pub original_format: String,
    /// Absolute path of the `remappings.txt` the line came from.
    pub source: PathBuf,
    /// Present iff the raw target pointed into `node_modules/`.
    pub target_npm_package: Option<TargetNpmPackage>,
}

/// The dependency a user remapping targets.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TargetNpmPackage {
    /// The directory-level name the dependency was referenced by, which may
    /// differ from the package's declared name.
    pub installation_name: String,
    pub package: Arc<Package>,
}

/// Picks the best applicable remapping for `direct_import` appearing in
/// `from_source_name`.
///
/// Applicable means the context prefixes the importing file's source name
/// and the prefix prefixes the import. Ties go to the longest context, then
/// the longest prefix, then the most recently parsed entry.
pub(crate) fn select_best<'a>(
    remappings: &'a [UserRemapping],
    from_source_name: &str,
    direct_import: &str,
) -> Option<&'a UserRemapping> {
    remappings
        .iter()
        .enumerate()
        .filter(|(_, user)| {
            from_source_name.starts_with(&user.remapping.context)
                && direct_import.starts_with(&user.remapping.prefix)
        })
        .max_by_key(|(idx, user)| (user.remapping.context.len(), user.remapping.prefix.len(), *idx))
        .map(|(_, user)| user)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> Remapping {
        s.parse().unwrap()
    }

    #[test]
    fn can_parse_remappings() {
        assert_eq!(
            parse("foo/=bar/"),
            Remapping { context: String::new(), prefix: "foo/".into(), target: "bar/".into() }
        );
        assert_eq!(
            parse("context/:prefix/=target/"),
            Remapping { context: "context/".into(), prefix: "prefix/".into(), target: "target/".into() }
        );
        // a colon after the `=` belongs to the target
        assert_eq!(
            parse("a/=b:c/"),
            Remapping { context: String::new(), prefix: "a/".into(), target: "b:c/".into() }
        );
    }

    #[test]
    fn rejects_malformed_remappings() {
        assert!("foo/".parse::<Remapping>().is_err());
        assert!("=bar/".parse::<Remapping>().is_err());
        assert!("foo/=".parse::<Remapping>().is_err());
        assert!("ctx/:=bar/".parse::<Remapping>().is_err());
    }

    #[test]
    fn display_roundtrips() {
        for s in ["foo/=bar/", "context/:prefix/=target/"] {
            assert_eq!(parse(s).to_string(), s);
        }
    }

    fn user(context: &str, prefix: &str, target: &str) -> UserRemapping {
        UserRemapping {
            remapping: Remapping {
                context: context.into(),
                prefix: prefix.into(),
                target: target.into(),
            },
            original_format: format!("{prefix}={target}"),
            source: PathBuf::from("/p/remappings.txt"),
            target_npm_package: None,
        }
    }

    #[test]
    fn selection_prefers_longest_context_then_prefix_then_latest() {
        let remappings = vec![
            user("", "dep/", "project/a/"),
            user("project/", "dep/", "project/b/"),
            user("project/", "dep/nested/", "project/c/"),
            user("project/", "dep/nested/", "project/d/"),
        ];

        let best = select_best(&remappings, "project/Contract.sol", "dep/nested/X.sol").unwrap();
        assert_eq!(best.remapping.target, "project/d/");

        let best = select_best(&remappings, "project/Contract.sol", "dep/X.sol").unwrap();
        assert_eq!(best.remapping.target, "project/b/");

        assert!(select_best(&remappings, "project/Contract.sol", "other/X.sol").is_none());
    }
}
