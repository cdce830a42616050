//! Package-`exports` subpath resolution.
//!
//! Implements the standard node packages-exports algorithm over the raw JSON
//! value of a `package.json` `exports` field, with the condition set
//! restricted to `"default"`: every other condition name is skipped as if it
//! were unknown.

use serde_json::{Map, Value};

const DEFAULT_CONDITION: &str = "default";

/// Resolves `subpath` (without a leading `./`) against an `exports` value.
///
/// Returns the exported subpath relative to the package root, again without
/// the leading `./`, or `None` if the subpath is not exported under the
/// `"default"` condition.
pub fn resolve_subpath(exports: &Value, subpath: &str) -> Option<String> {
    let key = if subpath.is_empty() { ".".to_string() } else { format!("./{subpath}") };
    let resolved = match exports {
        Value::Object(map) if is_subpath_map(map) => resolve_from_map(map, &key)?,
        // A bare target (string, array or conditions object) is shorthand for
        // the "." subpath and exports nothing else.
        other => {
            if key != "." {
                return None;
            }
            resolve_target(other, "")?
        }
    };
    normalize_resolved(&resolved)
}

/// An exports object either maps subpaths (all keys start with `.`) or is a
/// single conditions object (no key does). Mixed objects are invalid; they
/// are treated as a subpath map, which makes the non-`.` keys unmatchable.
fn is_subpath_map(map: &Map<String, Value>) -> bool {
    map.keys().any(|key| key.starts_with('.'))
}

fn resolve_from_map(map: &Map<String, Value>, key: &str) -> Option<String> {
    if let Some(target) = map.get(key) {
        return resolve_target(target, "");
    }

    // No exact entry; find the pattern key with the longest base preceding
    // its `*`. Keys with more than one `*` are invalid and skipped.
    let mut best: Option<(&str, &str, &Value)> = None;
    for (pattern, target) in map {
        let Some((base, trailer)) = pattern.split_once('*') else { continue };
        if trailer.contains('*') {
            continue;
        }
        if key.starts_with(base)
            && key.len() >= base.len() + trailer.len()
            && key.ends_with(trailer)
            && best.is_none_or(|(b, _, _)| base.len() > b.len())
        {
            best = Some((base, trailer, target));
        }
    }
    let (base, trailer, target) = best?;
    let captured = &key[base.len()..key.len() - trailer.len()];
    resolve_target(target, captured)
}

fn resolve_target(target: &Value, captured: &str) -> Option<String> {
    match target {
        Value::String(s) => {
            if !s.starts_with("./") {
                return None;
            }
            Some(s.replace('*', captured))
        }
        Value::Object(conditions) => resolve_target(conditions.get(DEFAULT_CONDITION)?, captured),
        // Array targets are fallbacks: the first one that resolves wins.
        Value::Array(targets) => targets.iter().find_map(|t| resolve_target(t, captured)),
        // null (and any other value) blocks the subpath.
        _ => None,
    }
}

fn normalize_resolved(resolved: &str) -> Option<String> {
    let relative = resolved.strip_prefix("./")?;
    let valid = relative
        .split('/')
        .all(|segment| !matches!(segment, "" | "." | ".." | "node_modules"));
    valid.then(|| relative.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn string_shorthand_exports_only_the_root() {
        let exports = json!("./src/index.sol");
        assert_eq!(resolve_subpath(&exports, "").as_deref(), Some("src/index.sol"));
        assert_eq!(resolve_subpath(&exports, "src/index.sol"), None);
    }

    #[test]
    fn exact_subpath_keys_win() {
        let exports = json!({
            "./Token.sol": "./src/Token.sol",
            "./*": "./contracts/*"
        });
        assert_eq!(resolve_subpath(&exports, "Token.sol").as_deref(), Some("src/Token.sol"));
        assert_eq!(resolve_subpath(&exports, "Other.sol").as_deref(), Some("contracts/Other.sol"));
    }

    #[test]
    fn longest_pattern_base_wins() {
        let exports = json!({
            "./*": "./src/*",
            "./interfaces/*": "./src/ifaces/*"
        });
        assert_eq!(
            resolve_subpath(&exports, "interfaces/IToken.sol").as_deref(),
            Some("src/ifaces/IToken.sol")
        );
        assert_eq!(resolve_subpath(&exports, "Token.sol").as_deref(), Some("src/Token.sol"));
    }

    #[test]
    fn only_the_default_condition_is_honored() {
        let exports = json!({ "./*": { "import": "./esm/*", "default": "./src/*" } });
        assert_eq!(resolve_subpath(&exports, "A.sol").as_deref(), Some("src/A.sol"));

        let exports = json!({ "./*": { "import": "./esm/*" } });
        assert_eq!(resolve_subpath(&exports, "A.sol"), None);
    }

    #[test]
    fn array_targets_fall_back() {
        let exports = json!({ "./*": [{ "require": "./cjs/*" }, "./src/*"] });
        assert_eq!(resolve_subpath(&exports, "A.sol").as_deref(), Some("src/A.sol"));
    }

    #[test]
    fn null_blocks_a_subpath() {
        let exports = json!({
            "./internal/*": null,
            "./*": "./*"
        });
        assert_eq!(resolve_subpath(&exports, "internal/Secret.sol"), None);
        assert_eq!(resolve_subpath(&exports, "Public.sol").as_deref(), Some("Public.sol"));
    }

    #[test]
    fn bare_conditions_object_covers_the_root() {
        let exports = json!({ "default": "./index.sol" });
        assert_eq!(resolve_subpath(&exports, "").as_deref(), Some("index.sol"));
        assert_eq!(resolve_subpath(&exports, "index.sol"), None);
    }

    #[test]
    fn escaping_targets_are_rejected() {
        let exports = json!({ "./*": "../outside/*" });
        assert_eq!(resolve_subpath(&exports, "A.sol"), None);

        let exports = json!({ "./*": "./../*" });
        assert_eq!(resolve_subpath(&exports, "A.sol"), None);
    }
}
