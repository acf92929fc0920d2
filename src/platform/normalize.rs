use crate::platform::traits::PathNormalizer;
use std::path::{Path, PathBuf};

/// Resolves paths to their canonical form, even when the tail does not exist yet
pub struct CanonicalPathNormalizer;

impl PathNormalizer for CanonicalPathNormalizer {
    fn normalize(&self, path: &Path) -> PathBuf {
        if let Ok(canonical) = dunce::canonicalize(path) {
            return canonical;
        }

        // Canonicalize the deepest existing ancestor and re-attach the rest
        let mut missing = Vec::new();
        let mut current = path;
        while let Some(parent) = current.parent() {
            if let Some(name) = current.file_name() {
                missing.push(name.to_os_string());
            }
            if let Ok(base) = dunce::canonicalize(parent) {
                return missing.iter().rev().fold(base, |acc, part| acc.join(part));
            }
            current = parent;
        }

        path.to_path_buf()
    }
}
