//! Path allow-list validation
//!
//! Every path-like input crossing the crate boundary is validated against an
//! allow-list of permitted root directories before use, as defense against
//! path traversal. Rejection is a distinct error kind (`PathNotAllowed`),
//! not a generic I/O failure.

use crate::error::{CutoutError, Result};
use std::path::{Path, PathBuf};

/// Allow-list of permitted root directories
#[derive(Debug, Clone)]
pub struct PathGuard {
    roots: Vec<PathBuf>,
}

impl PathGuard {
    /// Guard permitting the given roots
    ///
    /// Roots are canonicalized where they exist; non-existent roots are
    /// dropped.
    #[must_use]
    pub fn new<I, P>(roots: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let roots = roots
            .into_iter()
            .filter_map(|root| root.as_ref().canonicalize().ok())
            .collect();
        Self { roots }
    }

    /// Guard permitting the user's home directory and the system temp dir
    #[must_use]
    pub fn with_default_roots() -> Self {
        let mut candidates = Vec::new();
        if let Some(home) = dirs::home_dir() {
            candidates.push(home);
        }
        candidates.push(std::env::temp_dir());
        Self::new(candidates)
    }

    /// Add another permitted root
    pub fn allow_root<P: AsRef<Path>>(&mut self, root: P) {
        if let Ok(canonical) = root.as_ref().canonicalize() {
            self.roots.push(canonical);
        } else {
            log::warn!(
                "Ignoring allow-list root that cannot be resolved: {}",
                root.as_ref().display()
            );
        }
    }

    /// Permitted roots currently in effect
    #[must_use]
    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Validate a path against the allow-list
    ///
    /// Symlinks in the existing portion of the path are resolved before the
    /// prefix check, so a link pointing outside the roots is rejected. The
    /// path itself need not exist (output files are validated before
    /// creation), but its non-existent tail must be plain names.
    ///
    /// # Errors
    /// `PathNotAllowed` when the resolved path is outside every root or
    /// cannot be resolved at all.
    pub fn check<P: AsRef<Path>>(&self, path: P) -> Result<PathBuf> {
        let path = path.as_ref();
        let resolved =
            Self::resolve(path).ok_or_else(|| CutoutError::path_not_allowed(path))?;

        if self.roots.iter().any(|root| resolved.starts_with(root)) {
            Ok(resolved)
        } else {
            Err(CutoutError::path_not_allowed(path))
        }
    }

    /// Resolve symlinks over the deepest existing ancestor and re-append the
    /// non-existent tail. `None` when the tail contains `..` or the path has
    /// no existing ancestor.
    fn resolve(path: &Path) -> Option<PathBuf> {
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir().ok()?.join(path)
        };

        if let Ok(real) = absolute.canonicalize() {
            return Some(real);
        }

        let mut existing = absolute;
        let mut tail = Vec::new();
        loop {
            let name = existing.file_name()?.to_os_string();
            tail.push(name);
            existing = existing.parent()?.to_path_buf();
            if let Ok(real) = existing.canonicalize() {
                let mut resolved = real;
                for component in tail.iter().rev() {
                    resolved.push(component);
                }
                return Some(resolved);
            }
        }
    }
}
