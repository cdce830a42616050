//! Package-map construction and `remappings.txt` resolution.

mod common;

use common::project;
use similar_asserts::assert_eq;
use std::sync::Arc;
use trowel_resolver::{
    RemappedPackageMap,
    error::{PackageMapError, UserRemappingError},
    remappings::{Remapping, UserRemapping},
};

#[tokio::test]
async fn top_level_remappings_are_rewritten_to_source_names() {
    let fixture = project("top-level-remappings", "1.2.4");
    fixture.write("remappings.txt", "foo/=bar/\n\n context/:prefix/=target/\n");

    let map = RemappedPackageMap::load(fixture.root()).await.unwrap();
    let remappings = map.user_remappings(map.project_package());

    assert_eq!(
        remappings,
        &[
            UserRemapping {
                remapping: Remapping {
                    context: "project/".into(),
                    prefix: "foo/".into(),
                    target: "project/bar/".into(),
                },
                original_format: "foo/=bar/".into(),
                source: fixture.path("remappings.txt"),
                target_npm_package: None,
            },
            UserRemapping {
                remapping: Remapping {
                    context: "project/context/".into(),
                    prefix: "prefix/".into(),
                    target: "project/target/".into(),
                },
                original_format: "context/:prefix/=target/".into(),
                source: fixture.path("remappings.txt"),
                target_npm_package: None,
            },
        ]
    );
}

#[tokio::test]
async fn missing_trailing_slash_fails_construction() {
    let fixture = project("top-level-remappings", "1.2.4");
    fixture.write("lib/submodule/remappings.txt", "foo/=bar\n");

    let err = RemappedPackageMap::load(fixture.root()).await.unwrap_err();
    let PackageMapError::Remappings(errors) = err else {
        panic!("expected remapping errors, got: {err}");
    };
    assert_eq!(
        errors,
        vec![UserRemappingError::WithoutSlashEndings {
            source_file: fixture.path("lib/submodule/remappings.txt"),
            remapping: "foo/=bar".into(),
        }]
    );
}

#[tokio::test]
async fn nested_remappings_come_before_top_level_ones() {
    let fixture = project("top-level-remappings", "1.2.4");
    fixture
        .write("remappings.txt", "foo/=bar/\n")
        .write("lib/submodule/remappings.txt", "context/:prefix/=target/\n")
        .write("lib/submodule2/remappings.txt", "context/:prefix/=target/\n");

    let map = RemappedPackageMap::load(fixture.root()).await.unwrap();
    let remappings = map.user_remappings(map.project_package());

    assert_eq!(remappings.len(), 3);
    assert_eq!(remappings[0].source, fixture.path("lib/submodule/remappings.txt"));
    assert_eq!(
        remappings[0].remapping,
        Remapping {
            context: "project/lib/submodule/context/".into(),
            prefix: "prefix/".into(),
            target: "project/lib/submodule/target/".into(),
        }
    );
    assert_eq!(remappings[1].source, fixture.path("lib/submodule2/remappings.txt"));
    assert_eq!(remappings[1].remapping.context, "project/lib/submodule2/context/");
    assert_eq!(remappings[2].source, fixture.path("remappings.txt"));
    assert_eq!(remappings[2].remapping.prefix, "foo/");
}

#[tokio::test]
async fn npm_remappings_resolve_their_target_packages() {
    let fixture = project("top-level-remappings", "1.2.4");
    fixture.write(
        "remappings.txt",
        "@uniswap/core/=node_modules/@uniswap/core/src/\nno-scope/=node_modules/no-scope/src/",
    );
    fixture.install("@uniswap/core", "@uniswap/core", "1.0.0");
    fixture.install("no-scope", "no-scope", "1.2.0");

    let map = RemappedPackageMap::load(fixture.root()).await.unwrap();
    let remappings = map.user_remappings(map.project_package());

    assert_eq!(remappings.len(), 2);

    assert_eq!(remappings[0].remapping.prefix, "@uniswap/core/");
    assert_eq!(remappings[0].remapping.target, "npm/@uniswap/core@1.0.0/src/");
    let target = remappings[0].target_npm_package.as_ref().unwrap();
    assert_eq!(target.installation_name, "@uniswap/core");
    assert_eq!(target.package.version, "1.0.0");

    assert_eq!(remappings[1].remapping.prefix, "no-scope/");
    assert_eq!(remappings[1].remapping.target, "npm/no-scope@1.2.0/src/");
    let target = remappings[1].target_npm_package.as_ref().unwrap();
    assert_eq!(target.installation_name, "no-scope");
}

#[tokio::test]
async fn remapping_restating_an_installation_edge_is_dropped() {
    let fixture = project("top-level-remappings", "1.2.4");
    fixture.write("remappings.txt", "foo/=node_modules/foo/\n");
    fixture.install("foo", "foo", "1.0.0");

    let map = RemappedPackageMap::load(fixture.root()).await.unwrap();
    assert!(map.user_remappings(map.project_package()).is_empty());
}

#[tokio::test]
async fn remapping_to_uninstalled_package_fails() {
    let fixture = project("top-level-remappings", "1.2.4");
    fixture.write("remappings.txt", "dep/=node_modules/dep/src/\n");

    let err = RemappedPackageMap::load(fixture.root()).await.unwrap_err();
    let PackageMapError::Remappings(errors) = err else {
        panic!("expected remapping errors, got: {err}");
    };
    assert_eq!(
        errors,
        vec![UserRemappingError::ToUninstalledPackage {
            source_file: fixture.path("remappings.txt"),
            remapping: "dep/=node_modules/dep/src/".into(),
            installation_name: "dep".into(),
        }]
    );
}

#[tokio::test]
async fn invalid_lines_are_reported_in_traversal_order() {
    let fixture = project("top-level-remappings", "1.2.4");
    fixture
        .write("lib/sub/remappings.txt", "broken\n")
        .write("remappings.txt", "# comment\nfoo/=bar\nnope/=node_modules/nope/src/\n");

    let err = RemappedPackageMap::load(fixture.root()).await.unwrap_err();
    let PackageMapError::Remappings(errors) = err else {
        panic!("expected remapping errors, got: {err}");
    };
    assert_eq!(
        errors,
        vec![
            UserRemappingError::InvalidSyntax {
                source_file: fixture.path("lib/sub/remappings.txt"),
                remapping: "broken".into(),
            },
            UserRemappingError::WithoutSlashEndings {
                source_file: fixture.path("remappings.txt"),
                remapping: "foo/=bar".into(),
            },
            UserRemappingError::ToUninstalledPackage {
                source_file: fixture.path("remappings.txt"),
                remapping: "nope/=node_modules/nope/src/".into(),
                installation_name: "nope".into(),
            },
        ]
    );
}

#[tokio::test]
async fn all_remappings_into_one_package_share_its_identity() {
    let fixture = project("top-level-remappings", "1.2.4");
    fixture
        .write("remappings.txt", "dep1/=node_modules/dep1/src/\n\ndep1bis/=node_modules/dep1/src/")
        .write("lib/submodule/remappings.txt", "dep1/=node_modules/dep1/src2/")
        .install("dep1", "dep1", "1.2.0");

    let map = RemappedPackageMap::load(fixture.root()).await.unwrap();
    let remappings = map.user_remappings(map.project_package());
    assert_eq!(remappings.len(), 3);

    let packages: Vec<&Arc<_>> = remappings
        .iter()
        .map(|r| &r.target_npm_package.as_ref().unwrap().package)
        .collect();
    assert!(Arc::ptr_eq(packages[0], packages[1]));
    assert!(Arc::ptr_eq(packages[1], packages[2]));
    assert_eq!(packages[0].root_source_name, "npm/dep1@1.2.0");
}

#[tokio::test]
async fn repeated_queries_return_identical_remappings() {
    let fixture = project("top-level-remappings", "1.2.4");
    fixture.write("remappings.txt", "foo/=bar/\nbaz/=qux/\n");

    let map = RemappedPackageMap::load(fixture.root()).await.unwrap();
    let first = map.user_remappings(map.project_package()).to_vec();
    let second = map.user_remappings(map.project_package()).to_vec();
    assert_eq!(first, second);
}

#[tokio::test]
async fn crlf_comments_and_blanks_are_tolerated() {
    let fixture = project("top-level-remappings", "1.2.4");
    fixture.write("remappings.txt", "# leading comment\r\n\r\nfoo/=bar/\r\n\t \r\n");

    let map = RemappedPackageMap::load(fixture.root()).await.unwrap();
    let remappings = map.user_remappings(map.project_package());
    assert_eq!(remappings.len(), 1);
    assert_eq!(remappings[0].original_format, "foo/=bar/");
    assert_eq!(remappings[0].remapping.target, "project/bar/");
}

#[tokio::test]
async fn remappings_under_node_modules_are_ignored() {
    let fixture = project("top-level-remappings", "1.2.4");
    fixture
        .write("remappings.txt", "foo/=bar/\n")
        .write("node_modules/dep/remappings.txt", "this is not even parsed\n");

    let map = RemappedPackageMap::load(fixture.root()).await.unwrap();
    assert_eq!(map.user_remappings(map.project_package()).len(), 1);
}
