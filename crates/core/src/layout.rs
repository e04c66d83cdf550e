//! Local project layout checks.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Directories a project must contain, relative to its root.
#[derive(Debug, Clone)]
pub struct ProjectLayout {
    root: PathBuf,
    required: Vec<PathBuf>,
}

impl ProjectLayout {
    /// Create a layout rooted at `root`.
    pub fn new<I, P>(root: impl Into<PathBuf>, required: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            root: root.into(),
            required: required.into_iter().map(Into::into).collect(),
        }
    }

    /// Project root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a path relative to the project root.
    #[must_use]
    pub fn resolve(&self, relative: &Path) -> PathBuf {
        if relative.is_absolute() {
            relative.to_path_buf()
        } else {
            self.root.join(relative)
        }
    }

    /// Required directories that do not exist (or are not directories).
    #[must_use]
    pub fn missing(&self) -> Vec<PathBuf> {
        self.required
            .iter()
            .filter(|dir| !self.resolve(dir).is_dir())
            .cloned()
            .collect()
    }

    /// Fail with every missing directory listed.
    ///
    /// Only directories satisfy the check: a plain file at a required path is
    /// reported as missing.
    pub fn verify(&self) -> Result<()> {
        let missing = self.missing();
        if missing.is_empty() {
            tracing::info!(root = %self.root.display(), "All required directories are present");
            return Ok(());
        }

        for dir in &missing {
            tracing::warn!(directory = %dir.display(), "Required directory is missing");
        }
        Err(Error::missing_directories(self.root.clone(), missing))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verify_passes_when_all_present() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src/onnx2c")).unwrap();
        std::fs::create_dir_all(dir.path().join("environments/gcc")).unwrap();

        let layout = ProjectLayout::new(dir.path(), ["src/onnx2c", "environments/gcc"]);
        assert!(layout.verify().is_ok());
    }

    #[test]
    fn test_verify_lists_every_missing_directory_in_order() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("environments/gcc")).unwrap();

        let layout = ProjectLayout::new(
            dir.path(),
            ["src/pytorch_train", "environments/gcc", "src/onnx2c"],
        );

        match layout.verify() {
            Err(Error::MissingDirectories { missing, .. }) => assert_eq!(
                missing,
                vec![PathBuf::from("src/pytorch_train"), PathBuf::from("src/onnx2c")]
            ),
            other => panic!("expected missing directories, got {other:?}"),
        }
    }

    #[test]
    fn test_file_in_place_of_directory_is_missing() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/onnx2c"), b"not a dir").unwrap();

        let layout = ProjectLayout::new(dir.path(), ["src/onnx2c"]);
        assert_eq!(layout.missing(), vec![PathBuf::from("src/onnx2c")]);
    }
}
