//! Hand-off to the external preview sandbox.
//!
//! Bundling and running the React code is done by whatever dev server watches
//! the exported project directory. This module only keeps that directory in
//! sync with the code buffer and the dependency manifest.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const ENTRY_POINT: &str = r#"import React from "react";
import { createRoot } from "react-dom/client";
import App from "./App";

createRoot(document.getElementById("root")).render(<App />);
"#;

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="UTF-8" />
    <title>Reactor preview</title>
  </head>
  <body>
    <div id="root"></div>
  </body>
</html>
"#;

#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    #[error("failed to write {path}: {source}")]
    Write { path: PathBuf, source: io::Error },
    #[error("failed to encode package manifest: {0}")]
    Manifest(#[from] serde_json::Error),
}

/// npm packages the preview template installs, name to version requirement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyManifest {
    dependencies: BTreeMap<String, String>,
}

impl Default for DependencyManifest {
    fn default() -> Self {
        let dependencies = [
            "react",
            "react-dom",
            "@mui/material",
            "@material-ui/core",
            "@mui/icons-material",
            "@emotion/styled",
            "@material-ui/icons",
            "react-router-dom",
            "@emotion/react",
            "@mui/styles",
        ]
        .into_iter()
        .map(|name| (name.to_string(), "latest".to_string()))
        .collect();
        Self { dependencies }
    }
}

impl DependencyManifest {
    pub fn dependencies(&self) -> &BTreeMap<String, String> {
        &self.dependencies
    }

    pub fn to_package_json(&self) -> Result<Vec<u8>, SandboxError> {
        let package = serde_json::json!({
            "name": "reactor-sandbox",
            "version": "0.0.0",
            "private": true,
            "main": "src/index.js",
            "dependencies": self.dependencies,
        });
        Ok(serde_json::to_vec_pretty(&package)?)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreviewStatus {
    pub location: String,
    pub revision: u64,
    pub last_error: Option<String>,
}

/// The editor/preview collaborator: receives the code buffer and the manifest.
pub trait PreviewHost {
    fn load(&mut self, code: &str, manifest: &DependencyManifest) -> Result<(), SandboxError>;
    fn refresh(&mut self) -> Result<(), SandboxError>;
    fn status(&self) -> PreviewStatus;
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), SandboxError> {
    let io_err = |source| SandboxError::Write {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_err)?;
    }

    let mut tmp_path = path.as_os_str().to_owned();
    tmp_path.push(".tmp");
    let tmp_path = PathBuf::from(tmp_path);
    fs::write(&tmp_path, bytes).map_err(io_err)?;
    match fs::rename(&tmp_path, path) {
        Ok(()) => Ok(()),
        Err(rename_err) => {
            if path.exists() {
                fs::remove_file(path).map_err(io_err)?;
                fs::rename(&tmp_path, path).map_err(io_err)
            } else {
                Err(io_err(rename_err))
            }
        }
    }
}

/// Writes a minimal React project (`src/App.js`, `src/index.js`, `package.json`)
/// into a directory watched by an external dev server.
pub struct ProjectExportHost {
    root: PathBuf,
    revision: u64,
    code: Option<String>,
    manifest: Option<DependencyManifest>,
    last_error: Option<String>,
}

impl ProjectExportHost {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            revision: 0,
            code: None,
            manifest: None,
            last_error: None,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn app_path(&self) -> PathBuf {
        self.root.join("src").join("App.js")
    }

    fn export_code(&self, code: &str) -> Result<(), SandboxError> {
        write_atomic(&self.app_path(), code.as_bytes())
    }

    fn export_scaffold(&self, manifest: &DependencyManifest) -> Result<(), SandboxError> {
        write_atomic(&self.root.join("package.json"), &manifest.to_package_json()?)?;
        write_atomic(&self.root.join("src").join("index.js"), ENTRY_POINT.as_bytes())?;
        write_atomic(&self.root.join("public").join("index.html"), INDEX_HTML.as_bytes())
    }

    fn record<T>(&mut self, result: Result<T, SandboxError>) -> Result<T, SandboxError> {
        match &result {
            Ok(_) => self.last_error = None,
            Err(err) => self.last_error = Some(err.to_string()),
        }
        result
    }
}

impl PreviewHost for ProjectExportHost {
    fn load(&mut self, code: &str, manifest: &DependencyManifest) -> Result<(), SandboxError> {
        let manifest_changed = self.manifest.as_ref() != Some(manifest);
        let code_changed = self.code.as_deref() != Some(code);
        if !manifest_changed && !code_changed {
            return Ok(());
        }

        let result = if manifest_changed {
            self.export_scaffold(manifest)
                .and_then(|()| self.export_code(code))
        } else {
            self.export_code(code)
        };
        self.record(result)?;

        self.manifest = Some(manifest.clone());
        self.code = Some(code.to_string());
        self.revision += 1;
        debug!(revision = self.revision, root = %self.root.display(), "sandbox updated");
        Ok(())
    }

    fn refresh(&mut self) -> Result<(), SandboxError> {
        let (Some(code), Some(manifest)) = (self.code.clone(), self.manifest.clone()) else {
            return Ok(());
        };
        let result = self
            .export_scaffold(&manifest)
            .and_then(|()| self.export_code(&code));
        self.record(result)?;
        self.revision += 1;
        info!(revision = self.revision, "sandbox refreshed");
        Ok(())
    }

    fn status(&self) -> PreviewStatus {
        PreviewStatus {
            location: self.root().display().to_string(),
            revision: self.revision,
            last_error: self.last_error.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_exports_code_and_manifest() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut host = ProjectExportHost::new(dir.path().join("sandbox"));

        host.load("export default 1;", &DependencyManifest::default())
            .expect("load should export");

        let app = fs::read_to_string(host.app_path()).expect("App.js should exist");
        assert_eq!(app, "export default 1;");
        let package: serde_json::Value = serde_json::from_slice(
            &fs::read(host.root().join("package.json")).expect("package.json should exist"),
        )
        .expect("package.json should parse");
        assert_eq!(package["dependencies"]["@mui/material"], "latest");
        assert_eq!(package["dependencies"]["react-router-dom"], "latest");
        assert!(host.root().join("src").join("index.js").exists());
        assert_eq!(host.status().revision, 1);
        assert!(host.status().last_error.is_none());
    }

    #[test]
    fn unchanged_load_does_not_bump_revision() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut host = ProjectExportHost::new(dir.path());
        let manifest = DependencyManifest::default();

        host.load("a", &manifest).expect("first load");
        host.load("a", &manifest).expect("same load");
        assert_eq!(host.status().revision, 1);

        host.load("b", &manifest).expect("changed load");
        assert_eq!(host.status().revision, 2);
        assert_eq!(fs::read_to_string(host.app_path()).expect("App.js"), "b");
    }

    #[test]
    fn refresh_rewrites_files_and_bumps_revision() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut host = ProjectExportHost::new(dir.path());
        host.refresh().expect("refresh before load is a no-op");
        assert_eq!(host.status().revision, 0);

        host.load("code", &DependencyManifest::default()).expect("load");
        fs::remove_file(host.app_path()).expect("remove App.js");
        host.refresh().expect("refresh");

        assert_eq!(fs::read_to_string(host.app_path()).expect("App.js"), "code");
        assert_eq!(host.status().revision, 2);
    }

    #[test]
    fn write_failure_is_recorded_in_status() {
        let dir = tempfile::tempdir().expect("tempdir");
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "file, not a directory").expect("blocker fixture");
        let mut host = ProjectExportHost::new(&blocker);

        let error = host
            .load("code", &DependencyManifest::default())
            .expect_err("export under a file should fail");
        assert!(matches!(error, SandboxError::Write { .. }));
        assert!(host.status().last_error.is_some());
        assert_eq!(host.status().revision, 0);
    }
}
