//! Throwaway npm-style project trees for resolver tests.

#![allow(dead_code)]

use std::{
    fs,
    path::{Path, PathBuf},
};
use tempfile::TempDir;

pub struct TestProject {
    _dir: TempDir,
    root: PathBuf,
}

/// Creates a temp project with a `package.json` carrying `name` and
/// `version`.
pub fn project(name: &str, version: &str) -> TestProject {
    let dir = tempfile::tempdir().unwrap();
    // The map canonicalizes the project root, so fixtures must too or path
    // assertions fail on hosts where the temp dir is behind a symlink.
    let root = trowel_core::fs::canonicalized(dir.path().to_path_buf());
    let project = TestProject { _dir: dir, root };
    project.write_manifest("", name, version);
    project
}

impl TestProject {
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    pub fn write(&self, relative: &str, content: &str) -> &Self {
        let path = self.root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
        self
    }

    pub fn write_manifest(&self, relative_dir: &str, name: &str, version: &str) -> &Self {
        let relative = if relative_dir.is_empty() {
            "package.json".to_string()
        } else {
            format!("{relative_dir}/package.json")
        };
        self.write(&relative, &format!(r#"{{"name":"{name}","version":"{version}"}}"#))
    }

    /// Installs a dependency under `node_modules/<installation_name>`.
    pub fn install(&self, installation_name: &str, name: &str, version: &str) -> &Self {
        self.write_manifest(&format!("node_modules/{installation_name}"), name, version)
    }

    /// Installs a dependency with a verbatim `package.json`.
    pub fn install_with_manifest(&self, installation_name: &str, manifest: &str) -> &Self {
        self.write(&format!("node_modules/{installation_name}/package.json"), manifest)
    }
}
