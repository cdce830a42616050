//! The closed error taxonomy of the resolution pipeline.
//!
//! Errors are values, never panics: each public operation returns one of the
//! enums below, and callers match exhaustively. The SCREAMING_SNAKE
//! discriminant of every variant (via [`code`](ProjectRootError::code) or
//! `&'static str` conversion) is part of the API contract and stable across
//! releases.

use crate::remappings::Remapping;
use itertools::Itertools;
use std::path::PathBuf;
use strum::IntoStaticStr;

/// An invariant violation or an unexpected environment failure (permission
/// errors, corrupt encodings, analyzer failures).
///
/// This is deliberately *not* part of the resolution taxonomy: encountering
/// one means the resolver has a defect or the filesystem misbehaved in a way
/// resolution does not model, not that the user's project is wrong.
#[derive(Debug, thiserror::Error)]
#[error("internal invariant violated: {message}")]
pub struct InternalError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl InternalError {
    pub fn msg(message: impl Into<String>) -> Self {
        Self { message: message.into(), source: None }
    }

    pub fn with_source(
        message: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self { message: message.into(), source: Some(source.into()) }
    }

    pub fn io(message: impl Into<String>, err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        Self::with_source(message, trowel_core::IoError::new(err, path))
    }
}

/// A failed `remappings.txt` line.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error, IntoStaticStr)]
pub enum UserRemappingError {
    /// The line does not match the `[context:]prefix=target` grammar, or an
    /// npm target does not start with a valid module name.
    #[error("invalid remapping \"{remapping}\" in \"{file}\"", file = .source_file.display())]
    #[strum(serialize = "REMAPPING_WITH_INVALID_SYNTAX")]
    InvalidSyntax { source_file: PathBuf, remapping: String },

    /// Prefix, target, or a non-empty context is missing its trailing `/`.
    #[error(
        "remapping \"{remapping}\" in \"{file}\" must end every component with \"/\"",
        file = .source_file.display()
    )]
    #[strum(serialize = "ILLEGAL_REMAPPING_WITHOUT_SLASH_ENDINGS")]
    WithoutSlashEndings { source_file: PathBuf, remapping: String },

    /// The target points into `node_modules/` but the named package is not
    /// installed anywhere above the remapping's package.
    #[error(
        "remapping \"{remapping}\" in \"{file}\" targets the uninstalled package \"{installation_name}\"",
        file = .source_file.display()
    )]
    #[strum(serialize = "REMAPPING_TO_UNINSTALLED_PACKAGE")]
    ToUninstalledPackage { source_file: PathBuf, remapping: String, installation_name: String },
}

impl UserRemappingError {
    /// The stable discriminant of this error.
    pub fn code(&self) -> &'static str {
        self.into()
    }
}

/// Errors constructing the remapped package map.
#[derive(Debug, thiserror::Error)]
pub enum PackageMapError {
    /// Every remapping error collected across every `remappings.txt`, in file
    /// traversal order within a package and work-queue order across packages.
    #[error("invalid remappings: {}", .0.iter().format("; "))]
    Remappings(Vec<UserRemappingError>),

    #[error(transparent)]
    Internal(#[from] InternalError),
}

/// Errors resolving an absolute path as a compilation root in the project.
#[derive(Debug, thiserror::Error, IntoStaticStr)]
pub enum ProjectRootError {
    #[error("\"{fs_path}\" is not inside the project", fs_path = .fs_path.display())]
    #[strum(serialize = "PROJECT_ROOT_FILE_NOT_IN_PROJECT")]
    NotInProject { fs_path: PathBuf },

    #[error("\"{fs_path}\" doesn't exist", fs_path = .fs_path.display())]
    #[strum(serialize = "PROJECT_ROOT_FILE_DOESNT_EXIST")]
    DoesntExist { fs_path: PathBuf },

    #[error("\"{fs_path}\" is inside node_modules", fs_path = .fs_path.display())]
    #[strum(serialize = "PROJECT_ROOT_FILE_IN_NODE_MODULES")]
    InNodeModules { fs_path: PathBuf },

    #[error(transparent)]
    #[strum(serialize = "INTERNAL_ERROR")]
    Internal(#[from] InternalError),
}

impl ProjectRootError {
    /// The stable discriminant of this error.
    pub fn code(&self) -> &'static str {
        self.into()
    }
}

/// Errors resolving a bare npm module string as a compilation root.
#[derive(Debug, thiserror::Error, IntoStaticStr)]
pub enum NpmRootError {
    #[error("\"{module}\" is not a valid npm module path")]
    #[strum(serialize = "NPM_ROOT_FILE_NAME_WITH_INVALID_FORMAT")]
    NameWithInvalidFormat { module: String },

    /// A user remapping steered the module into the project itself.
    #[error("\"{module}\" resolves to a file of the project, not of a dependency")]
    #[strum(serialize = "NPM_ROOT_FILE_RESOLVES_TO_PROJECT_FILE")]
    ResolvesToProjectFile { module: String },

    #[error("package \"{installation_name}\" is not installed")]
    #[strum(serialize = "NPM_ROOT_FILE_OF_UNINSTALLED_PACKAGE")]
    OfUninstalledPackage { installation_name: String },

    #[error("package of \"{module}\" has invalid remappings: {}", .errors.iter().format("; "))]
    #[strum(serialize = "NPM_ROOT_FILE_OF_PACKAGE_WITH_REMAPPING_ERRORS")]
    OfPackageWithRemappingErrors { module: String, errors: Vec<UserRemappingError> },

    #[error("\"{module}\" doesn't exist within its package")]
    #[strum(serialize = "NPM_ROOT_FILE_DOESNT_EXIST_WITHIN_ITS_PACKAGE")]
    DoesntExistWithinItsPackage { module: String },

    #[error("\"{module}\" has incorrect casing; the correct one is \"{correct_casing}\"")]
    #[strum(serialize = "NPM_ROOT_FILE_WITH_INCORRRECT_CASING")]
    WithIncorrrectCasing { module: String, correct_casing: String },

    #[error("\"{module}\" is not exported by its package")]
    #[strum(serialize = "NPM_ROOT_FILE_NON_EXPORTED_FILE")]
    NonExportedFile { module: String },

    #[error(transparent)]
    #[strum(serialize = "INTERNAL_ERROR")]
    Internal(#[from] InternalError),
}

impl NpmRootError {
    /// The stable discriminant of this error.
    pub fn code(&self) -> &'static str {
        self.into()
    }
}

/// Errors resolving an import string appearing in an already-resolved file.
#[derive(Debug, thiserror::Error, IntoStaticStr)]
pub enum ImportResolutionError {
    /// Import paths use `/` on every OS; `\` is never valid.
    #[error("import \"{import_path}\" in \"{from}\" uses windows path separators")]
    #[strum(serialize = "IMPORT_WITH_WINDOWS_PATH_SEPARATORS")]
    WindowsPathSeparators { import_path: String, from: String },

    /// A relative import may not escape the package of the importing file.
    #[error("relative import \"{import_path}\" in \"{from}\" escapes its package")]
    #[strum(serialize = "ILLEGAL_RELATIVE_IMPORT")]
    IllegalRelativeImport { import_path: String, from: String },

    #[error("import \"{import_path}\" in \"{from}\" doesn't exist{}", suggestion(.suggested_remapping))]
    #[strum(serialize = "IMPORT_DOESNT_EXIST")]
    DoesntExist { import_path: String, from: String, suggested_remapping: Option<Remapping> },

    #[error(
        "import \"{import_path}\" in \"{from}\" has incorrect casing; the correct one is \"{correct_casing}\""
    )]
    #[strum(serialize = "IMPORT_INVALID_CASING")]
    InvalidCasing { import_path: String, from: String, correct_casing: String },

    #[error("import \"{import_path}\" in \"{from}\" is not a valid npm module path")]
    #[strum(serialize = "IMPORT_WITH_INVALID_NPM_SYNTAX")]
    WithInvalidNpmSyntax { import_path: String, from: String },

    #[error("import \"{import_path}\" in \"{from}\": package \"{installation_name}\" is not installed")]
    #[strum(serialize = "IMPORT_OF_UNINSTALLED_PACKAGE")]
    OfUninstalledPackage { import_path: String, from: String, installation_name: String },

    #[error(
        "import \"{import_path}\" in \"{from}\": its package has invalid remappings: {}",
        .errors.iter().format("; ")
    )]
    #[strum(serialize = "IMPORT_OF_NPM_PACKAGE_WITH_REMAPPING_ERRORS")]
    OfNpmPackageWithRemappingErrors {
        import_path: String,
        from: String,
        errors: Vec<UserRemappingError>,
    },

    #[error("import \"{import_path}\" in \"{from}\" is not exported by its package")]
    #[strum(serialize = "IMPORT_OF_NON_EXPORTED_NPM_FILE")]
    OfNonExportedNpmFile { import_path: String, from: String },

    #[error(transparent)]
    #[strum(serialize = "INTERNAL_ERROR")]
    Internal(#[from] InternalError),
}

impl ImportResolutionError {
    /// The stable discriminant of this error.
    pub fn code(&self) -> &'static str {
        self.into()
    }
}

fn suggestion(remapping: &Option<Remapping>) -> String {
    match remapping {
        Some(remapping) => format!(" (a remapping like \"{remapping}\" would make it resolve)"),
        None => String::new(),
    }
}
