//! Output locations for rendered artifacts.

use std::path::{Path, PathBuf};

/// Where one pipeline request writes its diagram source and image.
///
/// Concurrent requests sharing a directory must use distinct filename bases;
/// [`OutputTarget::unique`] guarantees that with a random suffix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputTarget {
    dir: PathBuf,
    filename_base: String,
}

impl OutputTarget {
    /// Creates a target with an exact filename base.
    pub fn new(dir: impl Into<PathBuf>, filename_base: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            filename_base: filename_base.into(),
        }
    }

    /// Creates a target whose filename base is `{stem}_{suffix}`, where the
    /// suffix is the first eight hex digits of a random UUID.
    ///
    /// # Example
    ///
    /// ```
    /// # use umlsmith::OutputTarget;
    /// let a = OutputTarget::unique("out", "cmdb_diagram");
    /// let b = OutputTarget::unique("out", "cmdb_diagram");
    /// assert!(a.filename_base().starts_with("cmdb_diagram_"));
    /// assert_ne!(a.filename_base(), b.filename_base());
    /// ```
    pub fn unique(dir: impl Into<PathBuf>, stem: &str) -> Self {
        let id = uuid::Uuid::new_v4().simple().to_string();
        Self::new(dir, format!("{stem}_{}", &id[..8]))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn filename_base(&self) -> &str {
        &self.filename_base
    }

    /// Expresses `path` relative to the target directory when possible.
    pub(crate) fn relative(&self, path: &Path) -> PathBuf {
        match path.strip_prefix(&self.dir) {
            Ok(relative) => relative.to_path_buf(),
            Err(_) => path
                .file_name()
                .map(PathBuf::from)
                .unwrap_or_else(|| path.to_path_buf()),
        }
    }
}
