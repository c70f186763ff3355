use std::path::{Path, PathBuf};

use ignore::WalkBuilder;

use crate::config::ScanConfig;
use crate::error::Result;
use crate::languages::LanguageRegistry;

pub struct FileWalker {
    registry: LanguageRegistry,
    config: ScanConfig,
}

impl FileWalker {
    pub fn new(registry: LanguageRegistry) -> Self {
        Self::with_config(registry, ScanConfig::default())
    }

    pub fn with_config(registry: LanguageRegistry, config: ScanConfig) -> Self {
        Self { registry, config }
    }

    /// Source files under `root` in sorted path order.
    pub fn walk(&self, root: &Path) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        let respect = self.config.respect_gitignore;

        let walker = WalkBuilder::new(root)
            .hidden(true)
            .git_ignore(respect)
            .git_global(respect)
            .git_exclude(respect)
            .ignore(respect)
            .require_git(false)
            .build();

        for entry in walker.flatten() {
            let path = entry.path();
            if !path.is_file() || !self.is_supported(path) {
                continue;
            }
            if self.exceeds_size_limit(path) {
                tracing::debug!("Skipping oversized file {}", path.display());
                continue;
            }
            files.push(path.to_path_buf());
        }

        files.sort();
        Ok(files)
    }

    /// True for files whose language is registered and enabled by config.
    pub fn is_supported(&self, path: &Path) -> bool {
        self.registry
            .get_for_file(path)
            .is_some_and(|g| self.config.allows_language(g.name()))
    }

    pub fn get_language(&self, path: &Path) -> Option<String> {
        self.registry.get_for_file(path).map(|g| g.name().to_string())
    }

    fn exceeds_size_limit(&self, path: &Path) -> bool {
        match std::fs::metadata(path) {
            Ok(meta) => meta.len() > self.config.max_file_bytes,
            Err(e) => {
                tracing::warn!("Cannot stat {}: {}", path.display(), e);
                true
            }
        }
    }
}
