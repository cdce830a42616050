//! Import resolution over the remapped package map.
//!
//! The resolver owns the map and an intern table of resolved files, both
//! behind a single async mutex: resolving one file may force loading a new
//! package, which may introduce new remappings, which may resolve further
//! files, and the map's invariants are only safe under mutual exclusion.

use crate::{
    error::{ImportResolutionError, InternalError, NpmRootError, PackageMapError,
        ProjectRootError},
    map::RemappedPackageMap,
    package::{PROJECT_ROOT_SOURCE_NAME, Package, split_module_specifier},
    remappings::{Remapping, select_best},
};
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::sync::Mutex;
use trowel_core::{analyzer, exports, fs, source_name};

const NODE_MODULES: &str = "node_modules";

/// The console shim is importable from every project regardless of exports,
/// so its resolution always carries a file-targeted remapping.
const CONSOLE_LOG_IMPORT: &str = "hardhat/console.sol";

/// Name of the in-memory file fabricated to resolve npm modules as
/// compilation roots. Never read from or written to disk.
const NPM_ROOT_FAKE_FILE: &str = "__npm_root_import__.sol";

/// The analyzed contents of a resolved file.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FileContent {
    pub text: String,
    /// Import path strings, verbatim, in order of appearance.
    pub import_paths: Vec<String>,
    /// Version pragma strings, in order of appearance.
    pub version_pragmas: Vec<String>,
}

/// A source file that has been located on disk and assigned its canonical
/// source name.
///
/// Interned by the resolver on first successful resolution and never mutated
/// afterwards.
#[derive(Debug)]
pub struct ResolvedFile {
    /// Stable, OS-independent identifier of the file.
    pub source_name: String,
    /// Absolute on-disk location, in the OS-canonical casing.
    pub fs_path: PathBuf,
    pub content: FileContent,
    /// The package the file belongs to.
    pub package: Arc<Package>,
}

impl ResolvedFile {
    pub fn is_project_file(&self) -> bool {
        self.package.is_project_package()
    }
}

/// A successful resolution: the file, plus the remapping that produced it
/// when one applied.
#[derive(Clone, Debug)]
pub struct ResolvedImport {
    pub file: Arc<ResolvedFile>,
    pub remapping: Option<Arc<Remapping>>,
}

/// Resolves Solidity files to canonical source names, loading packages on
/// demand through the remapped package map.
///
/// All operations are async and serialized by one internal mutex; while one
/// is executing, no other makes progress.
#[derive(Debug)]
pub struct Resolver {
    state: Mutex<State>,
}

impl Resolver {
    /// Builds the package map for `project_root` and wraps it in a resolver.
    pub async fn load(project_root: impl Into<PathBuf>) -> Result<Self, PackageMapError> {
        Ok(Self::new(RemappedPackageMap::load(project_root).await?))
    }

    pub fn new(map: RemappedPackageMap) -> Self {
        Self { state: Mutex::new(State { map, files: HashMap::new() }) }
    }

    /// Resolves an absolute path inside the project as a compilation root.
    pub async fn resolve_project_file(
        &self,
        fs_path: impl AsRef<Path>,
    ) -> Result<Arc<ResolvedFile>, ProjectRootError> {
        self.state.lock().await.resolve_project_file(fs_path.as_ref()).await
    }

    /// Resolves a bare npm module string (e.g. `@scope/pkg/File.sol`) as a
    /// compilation root living inside a dependency.
    pub async fn resolve_npm_dependency_file_as_root(
        &self,
        npm_module: &str,
    ) -> Result<ResolvedImport, NpmRootError> {
        self.state.lock().await.resolve_npm_root(npm_module).await
    }

    /// Resolves an import string appearing in `from`.
    pub async fn resolve_import(
        &self,
        from: &ResolvedFile,
        import_path: &str,
    ) -> Result<ResolvedImport, ImportResolutionError> {
        self.state.lock().await.resolve_import(from, import_path, true).await
    }

    /// Runs `f` against the package map. Mainly useful for inspecting the
    /// loaded packages and remappings in tests and diagnostics.
    pub async fn with_package_map<R>(&self, f: impl FnOnce(&RemappedPackageMap) -> R) -> R {
        f(&self.state.lock().await.map)
    }
}

#[derive(Debug)]
struct State {
    map: RemappedPackageMap,
    /// `source_name` -> file; a cached success is final.
    files: HashMap<String, Arc<ResolvedFile>>,
}

impl State {
    async fn resolve_project_file(
        &mut self,
        fs_path: &Path,
    ) -> Result<Arc<ResolvedFile>, ProjectRootError> {
        let project = self.map.project_package().clone();
        let relative = match fs_path.strip_prefix(&project.root_fs_path) {
            Ok(relative) => relative.to_path_buf(),
            // The project root is canonical; retry with a canonicalized path
            // before rejecting, so symlinked prefixes still resolve.
            Err(_) => match fs::canonicalized(fs_path).strip_prefix(&project.root_fs_path) {
                Ok(relative) => relative.to_path_buf(),
                Err(_) => {
                    return Err(ProjectRootError::NotInProject {
                        fs_path: fs_path.to_path_buf(),
                    });
                }
            },
        };

        // First lookup with the caller-supplied casing: a hit skips the
        // casing probe entirely.
        let requested_name = source_name::join([
            PROJECT_ROOT_SOURCE_NAME,
            source_name::from_fs_path(&relative).as_str(),
        ]);
        if let Some(file) = self.files.get(&requested_name) {
            return Ok(file.clone());
        }

        let true_relative = fs::true_case_path(&project.root_fs_path, &relative)
            .map_err(|err| {
                InternalError::with_source("failed to probe the casing of a project file", err)
            })?
            .ok_or_else(|| ProjectRootError::DoesntExist { fs_path: fs_path.to_path_buf() })?;

        if relative.components().any(|c| c.as_os_str() == NODE_MODULES) {
            return Err(ProjectRootError::InNodeModules { fs_path: fs_path.to_path_buf() });
        }

        // Second lookup with the OS-normalized casing; identifiers must stay
        // stable on case-insensitive filesystems.
        let true_name = source_name::join([
            PROJECT_ROOT_SOURCE_NAME,
            source_name::from_fs_path(&true_relative).as_str(),
        ]);
        if let Some(file) = self.files.get(&true_name) {
            return Ok(file.clone());
        }

        Ok(self.read_and_intern(&project, true_name, &true_relative).await?)
    }

    async fn resolve_npm_root(&mut self, npm_module: &str) -> Result<ResolvedImport, NpmRootError> {
        if npm_module.starts_with("./")
            || npm_module.starts_with("../")
            || npm_module.starts_with('/')
        {
            return Err(NpmRootError::NameWithInvalidFormat { module: npm_module.to_string() });
        }

        let project = self.map.project_package().clone();
        let fake_from = ResolvedFile {
            source_name: source_name::join([PROJECT_ROOT_SOURCE_NAME, NPM_ROOT_FAKE_FILE]),
            fs_path: project.root_fs_path.join(NPM_ROOT_FAKE_FILE),
            content: FileContent::default(),
            package: project,
        };

        match self.resolve_import(&fake_from, npm_module, false).await {
            Ok(resolved) => {
                if resolved.file.is_project_file() {
                    return Err(NpmRootError::ResolvesToProjectFile {
                        module: npm_module.to_string(),
                    });
                }
                Ok(resolved)
            }
            Err(err) => Err(npm_root_error(npm_module, err)),
        }
    }

    async fn resolve_import(
        &mut self,
        from: &ResolvedFile,
        import_path: &str,
        local_fallback: bool,
    ) -> Result<ResolvedImport, ImportResolutionError> {
        trace!(from = %from.source_name, import_path, "resolving import");
        if import_path.contains('\\') {
            return Err(ImportResolutionError::WindowsPathSeparators {
                import_path: import_path.to_string(),
                from: from.source_name.clone(),
            });
        }

        let relative = import_path.starts_with("./") || import_path.starts_with("../");
        let package_prefix = format!("{}/", from.package.root_source_name);

        let direct_import = if relative {
            let joined =
                source_name::join([source_name::dirname(&from.source_name), import_path]);
            match source_name::clean(&joined) {
                Some(cleaned) if cleaned.starts_with(&package_prefix) => cleaned,
                _ => {
                    return Err(ImportResolutionError::IllegalRelativeImport {
                        import_path: import_path.to_string(),
                        from: from.source_name.clone(),
                    });
                }
            }
        } else {
            import_path.to_string()
        };

        let best = select_best(
            self.map.user_remappings(&from.package),
            &from.source_name,
            &direct_import,
        );

        if let Some(user) = best {
            // A remapping can never apply to a relative import: the rewritten
            // prefix would have had to collide with the importing package's
            // own namespace, which remapping validation rules out.
            if relative {
                return Err(InternalError::msg(format!(
                    "user remapping \"{}\" matched the relative import \"{import_path}\"",
                    user.remapping,
                ))
                .into());
            }
            let user = user.clone();
            let Some(rest) = direct_import.strip_prefix(&user.remapping.prefix) else {
                return Err(InternalError::msg(format!(
                    "selected remapping \"{}\" does not prefix the import \"{direct_import}\"",
                    user.remapping,
                ))
                .into());
            };
            let target_name = format!("{}{rest}", user.remapping.target);

            let package = match &user.target_npm_package {
                Some(target) => target.package.clone(),
                None => match self.map.owning_package_of_source_name(&target_name) {
                    Some(package) => package.clone(),
                    None => {
                        return Err(ImportResolutionError::DoesntExist {
                            import_path: import_path.to_string(),
                            from: from.source_name.clone(),
                            suggested_remapping: None,
                        });
                    }
                },
            };
            let file = self
                .validate_and_intern(&package, &target_name)
                .await
                .map_err(|err| err.into_import_error(import_path, from))?;
            return Ok(ResolvedImport {
                file,
                remapping: Some(Arc::new(user.remapping.clone())),
            });
        }

        if !relative {
            return match self.resolve_npm_import(from, &direct_import).await {
                Err(
                    err @ (ImportResolutionError::OfUninstalledPackage { .. }
                    | ImportResolutionError::WithInvalidNpmSyntax { .. }),
                ) if local_fallback => {
                    // The import may be an attempt at a project-local direct
                    // import, which is specifically disallowed; look for the
                    // file to improve the diagnostic, never to resolve it.
                    match direct_local_suggestion(from, &direct_import) {
                        Some(suggested_remapping) => Err(ImportResolutionError::DoesntExist {
                            import_path: import_path.to_string(),
                            from: from.source_name.clone(),
                            suggested_remapping: Some(suggested_remapping),
                        }),
                        None => Err(err),
                    }
                }
                other => other,
            };
        }

        // Relative import with no remapping in play: resolve against the
        // importing file within its own package.
        let package = from.package.clone();
        let file = self
            .validate_and_intern(&package, &direct_import)
            .await
            .map_err(|err| err.into_import_error(import_path, from))?;
        Ok(ResolvedImport { file, remapping: None })
    }

    async fn resolve_npm_import(
        &mut self,
        from: &ResolvedFile,
        direct_import: &str,
    ) -> Result<ResolvedImport, ImportResolutionError> {
        let Some((package_name, subpath)) = split_module_specifier(direct_import) else {
            return Err(ImportResolutionError::WithInvalidNpmSyntax {
                import_path: direct_import.to_string(),
                from: from.source_name.clone(),
            });
        };

        let resolution = self
            .map
            .resolve_dependency_by_installation_name(&from.package, package_name)
            .await?;
        let Some(resolution) = resolution else {
            return Err(ImportResolutionError::OfUninstalledPackage {
                import_path: direct_import.to_string(),
                from: from.source_name.clone(),
                installation_name: package_name.to_string(),
            });
        };
        if !resolution.remapping_errors.is_empty() {
            return Err(ImportResolutionError::OfNpmPackageWithRemappingErrors {
                import_path: direct_import.to_string(),
                from: from.source_name.clone(),
                errors: resolution.remapping_errors,
            });
        }

        let dependency = resolution.package;
        let (final_subpath, exports_rewrote) = match &dependency.exports {
            Some(exports_value) => match exports::resolve_subpath(exports_value, subpath) {
                Some(resolved) => {
                    let rewrote = resolved != subpath;
                    (resolved, rewrote)
                }
                None => {
                    return Err(ImportResolutionError::OfNonExportedNpmFile {
                        import_path: direct_import.to_string(),
                        from: from.source_name.clone(),
                    });
                }
            },
            None => (subpath.to_string(), false),
        };

        let target_name =
            source_name::join([dependency.root_source_name.as_str(), final_subpath.as_str()]);

        // The edge's generic remapping reproduces this resolution unless the
        // exports field rewrote the subpath out from under it.
        let remapping = if exports_rewrote || direct_import == CONSOLE_LOG_IMPORT {
            Arc::new(self.map.generate_remapping_into_npm_file(
                &from.package,
                direct_import,
                &target_name,
            ))
        } else {
            resolution.generated_remapping
        };

        let file = self
            .validate_and_intern(&dependency, &target_name)
            .await
            .map_err(|err| err.into_import_error(direct_import, from))?;
        Ok(ResolvedImport { file, remapping: Some(remapping) })
    }

    /// Validates that `requested_name` exists with the requested casing under
    /// `package` and interns its contents.
    async fn validate_and_intern(
        &mut self,
        package: &Arc<Package>,
        requested_name: &str,
    ) -> Result<Arc<ResolvedFile>, FileLookupError> {
        if let Some(file) = self.files.get(requested_name) {
            return Ok(file.clone());
        }

        let package_prefix = format!("{}/", package.root_source_name);
        let relative_name = match requested_name.strip_prefix(&package_prefix) {
            Some(relative) if !relative.is_empty() => relative,
            // The name points at the package root itself, not a file in it.
            Some(_) => return Err(FileLookupError::DoesntExist),
            None => {
                return Err(FileLookupError::Internal(InternalError::msg(format!(
                    "source name \"{requested_name}\" is not rooted in \"{}\"",
                    package.root_source_name,
                ))));
            }
        };

        let relative_path = source_name::to_fs_path(relative_name);
        let true_relative = fs::true_case_path(&package.root_fs_path, &relative_path)
            .map_err(|err| {
                FileLookupError::Internal(InternalError::with_source(
                    "failed to probe the casing of an imported file",
                    err,
                ))
            })?
            .ok_or(FileLookupError::DoesntExist)?;

        let true_name = source_name::from_fs_path(&true_relative);
        if true_name != relative_name {
            return Err(FileLookupError::InvalidCasing { correct_casing: true_name });
        }

        Ok(self.read_and_intern(package, requested_name.to_string(), &true_relative).await?)
    }

    /// Reads, analyzes and interns a file already known to exist with the
    /// given casing.
    async fn read_and_intern(
        &mut self,
        package: &Arc<Package>,
        source_name: String,
        relative: &Path,
    ) -> Result<Arc<ResolvedFile>, InternalError> {
        let fs_path = package.root_fs_path.join(relative);
        let text = tokio::fs::read_to_string(&fs_path)
            .await
            .map_err(|err| InternalError::io("failed to read a source file", err, &fs_path))?;
        let analyzed = analyzer::analyze(&text);
        trace!(
            %source_name,
            imports = analyzed.import_paths.len(),
            "resolved and interned file"
        );

        let file = Arc::new(ResolvedFile {
            source_name,
            fs_path,
            content: FileContent {
                text,
                import_paths: analyzed.import_paths,
                version_pragmas: analyzed.version_pragmas,
            },
            package: package.clone(),
        });
        self.files.insert(file.source_name.clone(), file.clone());
        Ok(file)
    }
}

/// File-validation failures, before they are attributed to a particular
/// operation.
enum FileLookupError {
    DoesntExist,
    InvalidCasing { correct_casing: String },
    Internal(InternalError),
}

impl From<InternalError> for FileLookupError {
    fn from(err: InternalError) -> Self {
        Self::Internal(err)
    }
}

impl FileLookupError {
    fn into_import_error(self, import_path: &str, from: &ResolvedFile) -> ImportResolutionError {
        match self {
            Self::DoesntExist => ImportResolutionError::DoesntExist {
                import_path: import_path.to_string(),
                from: from.source_name.clone(),
                suggested_remapping: None,
            },
            Self::InvalidCasing { correct_casing } => ImportResolutionError::InvalidCasing {
                import_path: import_path.to_string(),
                from: from.source_name.clone(),
                correct_casing,
            },
            Self::Internal(err) => ImportResolutionError::Internal(err),
        }
    }
}

/// Walks the directories between the importing file and its package root
/// looking for the literal import path, and shapes the remapping that would
/// make such a direct import resolve.
fn direct_local_suggestion(from: &ResolvedFile, direct_import: &str) -> Option<Remapping> {
    let package_root = &from.package.root_fs_path;
    let import_relative = source_name::to_fs_path(direct_import);
    let first_segment = direct_import.split('/').next()?;

    let mut dir = from.fs_path.parent();
    while let Some(current) = dir {
        if !current.starts_with(package_root) {
            break;
        }
        if current.join(&import_relative).is_file() {
            let relative_dir = current.strip_prefix(package_root).unwrap_or(Path::new(""));
            let relative_dir_name = source_name::from_fs_path(relative_dir);
            let target = source_name::join([
                from.package.root_source_name.as_str(),
                relative_dir_name.as_str(),
                first_segment,
                "/",
            ]);
            return Some(Remapping {
                context: source_name::ensure_trailing_slash(&from.package.root_source_name),
                prefix: format!("{first_segment}/"),
                target,
            });
        }
        if current == package_root {
            break;
        }
        dir = current.parent();
    }
    None
}

fn npm_root_error(module: &str, err: ImportResolutionError) -> NpmRootError {
    let module = module.to_string();
    match err {
        ImportResolutionError::WindowsPathSeparators { .. }
        | ImportResolutionError::WithInvalidNpmSyntax { .. } => {
            NpmRootError::NameWithInvalidFormat { module }
        }
        ImportResolutionError::OfUninstalledPackage { installation_name, .. } => {
            NpmRootError::OfUninstalledPackage { installation_name }
        }
        ImportResolutionError::OfNpmPackageWithRemappingErrors { errors, .. } => {
            NpmRootError::OfPackageWithRemappingErrors { module, errors }
        }
        ImportResolutionError::OfNonExportedNpmFile { .. } => {
            NpmRootError::NonExportedFile { module }
        }
        ImportResolutionError::DoesntExist { .. } => {
            NpmRootError::DoesntExistWithinItsPackage { module }
        }
        ImportResolutionError::InvalidCasing { correct_casing, .. } => {
            NpmRootError::WithIncorrrectCasing { module, correct_casing }
        }
        // Impossible by construction: the fabricated importing file never
        // makes the module string relative.
        ImportResolutionError::IllegalRelativeImport { import_path, from } => {
            NpmRootError::Internal(InternalError::msg(format!(
                "npm root resolution of \"{import_path}\" from \"{from}\" failed as a relative import"
            )))
        }
        ImportResolutionError::Internal(err) => NpmRootError::Internal(err),
    }
}
