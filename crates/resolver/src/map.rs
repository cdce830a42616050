//! Package discovery and user-remapping resolution.
//!
//! The map owns the canonical package set: every `(name, version)` pair is
//! one [`Package`] value no matter how many installation paths reach it, and
//! every remapping that targets it shares that identity. Construction drives
//! a FIFO work queue seeded with the project package; resolving one
//! package's remappings may pull in dependencies, which are enqueued for
//! their own remapping discovery until the queue drains.
//!
//! The map performs no locking of its own; it is only safe when driven
//! through the resolver, which serializes all public operations.

use crate::{
    error::{InternalError, PackageMapError, UserRemappingError},
    package::{LOCAL_VERSION_SENTINEL, PROJECT_ROOT_SOURCE_NAME, Package, PackageJson,
        split_module_specifier},
    remappings::{Remapping, TargetNpmPackage, UserRemapping},
};
use std::{
    collections::{HashMap, VecDeque},
    path::{Path, PathBuf},
    sync::Arc,
};
use trowel_core::{fs, source_name};

const REMAPPINGS_FILE: &str = "remappings.txt";
const NODE_MODULES: &str = "node_modules";

/// How one package reaches a dependency under an installation name.
///
/// The generated remapping describes how an un-prefixed direct import from
/// the owner to that installation name is rewritten; it is created exactly
/// once per edge and shared from then on.
#[derive(Clone, Debug)]
pub struct InstallationEdge {
    pub package: Arc<Package>,
    pub generated_remapping: Arc<Remapping>,
}

/// The result of [`RemappedPackageMap::resolve_dependency_by_installation_name`].
#[derive(Debug)]
pub struct DependencyResolution {
    pub package: Arc<Package>,
    pub generated_remapping: Arc<Remapping>,
    /// Remapping errors of packages loaded by this call, if any.
    pub remapping_errors: Vec<UserRemappingError>,
}

/// The canonical set of packages reachable from a project, together with
/// their resolved user remappings and installation edges.
#[derive(Debug)]
pub struct RemappedPackageMap {
    project_root: PathBuf,
    project_package: Arc<Package>,
    /// `root_source_name` -> package; the canonical index.
    packages: HashMap<String, Arc<Package>>,
    /// owner `root_source_name` -> installation name -> edge.
    installations: HashMap<String, HashMap<String, InstallationEdge>>,
    /// owner `root_source_name` -> resolved user remappings, in parse order.
    user_remappings: HashMap<String, Vec<UserRemapping>>,
    /// Packages whose remappings have not been resolved yet.
    pending: VecDeque<Arc<Package>>,
}

impl RemappedPackageMap {
    /// Builds the map for the project rooted at `project_root`, transitively
    /// loading every package the project's remappings pull in.
    ///
    /// Yields either the assembled map or every remapping error collected
    /// across every `remappings.txt`, never both.
    pub async fn load(project_root: impl Into<PathBuf>) -> Result<Self, PackageMapError> {
        let project_root = fs::canonicalized(project_root.into());
        let manifest_path = project_root.join("package.json");
        let manifest = read_manifest(&manifest_path).await?;

        let name = manifest.name.unwrap_or_else(|| {
            project_root.file_name().map_or_else(String::new, |n| n.to_string_lossy().into_owned())
        });
        let version = manifest.version.unwrap_or_else(|| LOCAL_VERSION_SENTINEL.to_string());
        debug!(root = %project_root.display(), %name, %version, "loading project package");

        let project_package = Arc::new(Package {
            name,
            version,
            root_fs_path: project_root.clone(),
            root_source_name: PROJECT_ROOT_SOURCE_NAME.to_string(),
            exports: manifest.exports,
        });

        let mut map = Self {
            project_root,
            project_package: project_package.clone(),
            packages: HashMap::from([(
                project_package.root_source_name.clone(),
                project_package.clone(),
            )]),
            installations: HashMap::new(),
            user_remappings: HashMap::new(),
            pending: VecDeque::from([project_package]),
        };

        let mut errors = Vec::new();
        map.drain_pending(&mut errors).await?;
        if errors.is_empty() { Ok(map) } else { Err(PackageMapError::Remappings(errors)) }
    }

    /// The package the project itself is rooted in.
    pub fn project_package(&self) -> &Arc<Package> {
        &self.project_package
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// The resolved user remappings of `package`, in parse order: remappings
    /// from nested directories first, then the ones next to the package
    /// manifest.
    pub fn user_remappings(&self, package: &Package) -> &[UserRemapping] {
        self.user_remappings.get(&package.root_source_name).map_or(&[], Vec::as_slice)
    }

    /// Resolves `installation_name` as a dependency of `from`, loading the
    /// dependency and draining any packages its remappings pull in.
    ///
    /// `Ok(None)` means the dependency is not installed anywhere above
    /// `from`.
    pub async fn resolve_dependency_by_installation_name(
        &mut self,
        from: &Arc<Package>,
        installation_name: &str,
    ) -> Result<Option<DependencyResolution>, InternalError> {
        let Some(edge) = self.resolve_dependency(from, installation_name).await? else {
            return Ok(None);
        };
        let mut remapping_errors = Vec::new();
        self.drain_pending(&mut remapping_errors).await?;
        Ok(Some(DependencyResolution {
            package: edge.package,
            generated_remapping: edge.generated_remapping,
            remapping_errors,
        }))
    }

    /// Synthesizes a remapping that steers `direct_import` inside `from`
    /// straight to `target_source_name`.
    ///
    /// Used when exports rewriting changed the subpath, so the generic
    /// installation-name remapping of the edge would not reproduce the
    /// resolution.
    pub fn generate_remapping_into_npm_file(
        &self,
        from: &Package,
        direct_import: &str,
        target_source_name: &str,
    ) -> Remapping {
        Remapping {
            context: source_name::ensure_trailing_slash(&from.root_source_name),
            prefix: direct_import.to_string(),
            target: target_source_name.to_string(),
        }
    }

    /// The package owning `name`, by longest root-source-name match.
    pub fn owning_package_of_source_name(&self, name: &str) -> Option<&Arc<Package>> {
        self.packages
            .values()
            .filter(|package| {
                name.strip_prefix(&package.root_source_name)
                    .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
            })
            .max_by_key(|package| package.root_source_name.len())
    }

    /// Processes enqueued packages FIFO until the queue drains.
    ///
    /// A package is only popped once its remappings have been stored, so a
    /// cancelled operation leaves it pending and the next drain re-resolves
    /// it from scratch (storing remappings is idempotent, and dependency
    /// edges recorded by a partial pass are simply reused).
    async fn drain_pending(
        &mut self,
        errors: &mut Vec<UserRemappingError>,
    ) -> Result<(), InternalError> {
        while let Some(package) = self.pending.front().cloned() {
            self.resolve_package_remappings(&package, errors).await?;
            self.pending.pop_front();
        }
        Ok(())
    }

    /// Discovers and resolves every `remappings.txt` of `package`.
    async fn resolve_package_remappings(
        &mut self,
        package: &Arc<Package>,
        errors: &mut Vec<UserRemappingError>,
    ) -> Result<(), InternalError> {
        let files = fs::find_files_named(&package.root_fs_path, REMAPPINGS_FILE, NODE_MODULES);
        // Nested remappings apply before the package-root ones.
        let (nested, top): (Vec<_>, Vec<_>) = files
            .into_iter()
            .partition(|path| path.parent() != Some(package.root_fs_path.as_path()));

        let mut resolved = Vec::new();
        for file in nested.into_iter().chain(top) {
            trace!(file = %file.display(), "reading remappings file");
            let text = tokio::fs::read_to_string(&file)
                .await
                .map_err(|err| InternalError::io("failed to read remappings file", err, &file))?;
            self.resolve_remappings_file(package, &file, &text, &mut resolved, errors).await?;
        }
        self.user_remappings.insert(package.root_source_name.clone(), resolved);
        Ok(())
    }

    async fn resolve_remappings_file(
        &mut self,
        owner: &Arc<Package>,
        file: &Path,
        text: &str,
        resolved: &mut Vec<UserRemapping>,
        errors: &mut Vec<UserRemappingError>,
    ) -> Result<(), InternalError> {
        let relative_dir = file
            .parent()
            .and_then(|dir| dir.strip_prefix(&owner.root_fs_path).ok())
            .unwrap_or_else(|| Path::new(""));
        let relative_dir_name = source_name::from_fs_path(relative_dir);
        let context_path = source_name::join([
            owner.root_source_name.as_str(),
            relative_dir_name.as_str(),
            "/",
        ]);

        for raw_line in text.lines() {
            let line = raw_line.trim_matches([' ', '\t', '\r']);
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match self.resolve_remapping_line(owner, file, &context_path, line).await {
                Ok(Some(remapping)) => resolved.push(remapping),
                Ok(None) => trace!(line, "dropping no-op remapping"),
                Err(LineError::User(err)) => errors.push(err),
                Err(LineError::Internal(err)) => return Err(err),
            }
        }
        Ok(())
    }

    /// Validates and rewrites one remapping line.
    ///
    /// `Ok(None)` is a silently dropped no-op (`prefix/=node_modules/prefix/`).
    async fn resolve_remapping_line(
        &mut self,
        owner: &Arc<Package>,
        file: &Path,
        context_path: &str,
        line: &str,
    ) -> Result<Option<UserRemapping>, LineError> {
        let invalid_syntax = || {
            LineError::User(UserRemappingError::InvalidSyntax {
                source_file: file.to_path_buf(),
                remapping: line.to_string(),
            })
        };

        let parsed: Remapping = line.parse().map_err(|_| invalid_syntax())?;

        if !parsed.prefix.ends_with('/')
            || !parsed.target.ends_with('/')
            || (!parsed.context.is_empty() && !parsed.context.ends_with('/'))
        {
            return Err(LineError::User(UserRemappingError::WithoutSlashEndings {
                source_file: file.to_path_buf(),
                remapping: line.to_string(),
            }));
        }

        // Fragments already expressed in the npm namespace are kept verbatim;
        // everything else is anchored at the directory of the remappings file.
        let context = if parsed.context.starts_with("npm/") {
            parsed.context.clone()
        } else {
            format!("{context_path}{}", parsed.context)
        };

        let Some(stripped) = parsed.target.strip_prefix("node_modules/") else {
            let target = if parsed.target.starts_with("npm/") {
                parsed.target.clone()
            } else {
                format!("{context_path}{}", parsed.target)
            };
            return Ok(Some(UserRemapping {
                remapping: Remapping { context, prefix: parsed.prefix, target },
                original_format: line.to_string(),
                source: file.to_path_buf(),
                target_npm_package: None,
            }));
        };

        let Some((installation_name, remainder)) = split_module_specifier(stripped) else {
            return Err(invalid_syntax());
        };
        let installation_name = installation_name.to_string();

        // `prefix/=node_modules/prefix/` restates the generated remapping of
        // the installation edge.
        if remainder.is_empty() && parsed.prefix == format!("{installation_name}/") {
            return Ok(None);
        }

        match self.resolve_dependency(owner, &installation_name).await.map_err(LineError::Internal)?
        {
            Some(edge) => {
                let target = format!("{}/{remainder}", edge.package.root_source_name);
                Ok(Some(UserRemapping {
                    remapping: Remapping { context, prefix: parsed.prefix, target },
                    original_format: line.to_string(),
                    source: file.to_path_buf(),
                    target_npm_package: Some(TargetNpmPackage {
                        installation_name,
                        package: edge.package,
                    }),
                }))
            }
            None => Err(LineError::User(UserRemappingError::ToUninstalledPackage {
                source_file: file.to_path_buf(),
                remapping: line.to_string(),
                installation_name,
            })),
        }
    }

    /// Resolves a dependency of `from` by installation name, creating the
    /// package and its installation edge on first sight.
    ///
    /// The canonical index is consulted before creating anything: a package
    /// already known under the computed root source name is reused, no
    /// matter which installation path found it first.
    async fn resolve_dependency(
        &mut self,
        from: &Arc<Package>,
        installation_name: &str,
    ) -> Result<Option<InstallationEdge>, InternalError> {
        if let Some(edge) = self
            .installations
            .get(&from.root_source_name)
            .and_then(|edges| edges.get(installation_name))
        {
            return Ok(Some(edge.clone()));
        }

        let Some(manifest_path) =
            find_dependency_manifest(&from.root_fs_path, installation_name).await
        else {
            return Ok(None);
        };
        // Resolve symlinks so pnpm-style installs and monorepo links report
        // their real location.
        let package_root =
            fs::canonicalized(manifest_path.parent().unwrap_or(&manifest_path).to_path_buf());

        let package = if package_root == self.project_root {
            self.project_package.clone()
        } else {
            let manifest = read_manifest(&package_root.join("package.json")).await?;
            let name = manifest.name.unwrap_or_else(|| installation_name.to_string());
            let in_node_modules =
                package_root.components().any(|c| c.as_os_str() == NODE_MODULES);
            let version = if !in_node_modules && !package_root.starts_with(&self.project_root) {
                LOCAL_VERSION_SENTINEL.to_string()
            } else {
                manifest.version.unwrap_or_else(|| LOCAL_VERSION_SENTINEL.to_string())
            };
            let root_source_name = Package::npm_root_source_name(&name, &version);

            match self.packages.get(&root_source_name) {
                Some(existing) => existing.clone(),
                None => {
                    debug!(
                        %name,
                        %version,
                        root = %package_root.display(),
                        "discovered dependency package"
                    );
                    let package = Arc::new(Package {
                        name,
                        version,
                        root_fs_path: package_root,
                        root_source_name: root_source_name.clone(),
                        exports: manifest.exports,
                    });
                    self.packages.insert(root_source_name, package.clone());
                    self.pending.push_back(package.clone());
                    package
                }
            }
        };

        let generated_remapping = Arc::new(Remapping {
            context: source_name::ensure_trailing_slash(&from.root_source_name),
            prefix: format!("{installation_name}/"),
            target: source_name::ensure_trailing_slash(&package.root_source_name),
        });
        let edge = InstallationEdge { package, generated_remapping };
        self.installations
            .entry(from.root_source_name.clone())
            .or_default()
            .insert(installation_name.to_string(), edge.clone());
        Ok(Some(edge))
    }
}

enum LineError {
    User(UserRemappingError),
    Internal(InternalError),
}

async fn read_manifest(path: &Path) -> Result<PackageJson, InternalError> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|err| InternalError::io("failed to read package manifest", err, path))?;
    PackageJson::parse(&text).map_err(|err| {
        InternalError::with_source(
            format!("failed to parse package manifest \"{}\"", path.display()),
            err,
        )
    })
}

/// Standard node-module lookup: walks ancestor directories of `start`
/// probing `node_modules/<installation_name>/package.json`.
async fn find_dependency_manifest(start: &Path, installation_name: &str) -> Option<PathBuf> {
    let mut dir = Some(start);
    while let Some(current) = dir {
        let candidate = current.join(NODE_MODULES).join(installation_name).join("package.json");
        if tokio::fs::try_exists(&candidate).await.unwrap_or(false) {
            return Some(candidate);
        }
        dir = current.parent();
    }
    None
}
