use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::DepGraphConfig;
use crate::error::Result;
use crate::graph::{Dependency, Entity, EntityKind, Location};
use crate::indexer::dependency_extractor::DependencyExtractor;
use crate::indexer::extractor::EntityExtractor;
use crate::indexer::parser::{ParsedFile, Parser};
use crate::indexer::resolver::ResolutionIndex;
use crate::indexer::staleness::EntityFingerprint;
use crate::indexer::walker::FileWalker;
use crate::languages::LanguageRegistry;

/// An entity detached from its syntax tree, as reported by a scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qualified_name: Option<String>,
    pub kind: EntityKind,
    pub language: String,
    pub location: Location,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub returns: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receiver: Option<String>,
    /// `sig:body` fingerprint pair.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hashes: Option<String>,
}

impl EntityRecord {
    pub fn from_entity(entity: &Entity<'_>, hashes: Option<String>) -> Self {
        Self {
            id: entity.id.clone(),
            name: entity.name.clone(),
            qualified_name: entity.qualified_name.clone(),
            kind: entity.kind,
            language: entity.language.clone(),
            location: entity.location.clone(),
            params: entity.params.clone(),
            returns: entity.returns.clone(),
            receiver: entity.receiver.clone(),
            hashes,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanReport {
    pub entities: Vec<EntityRecord>,
    pub dependencies: Vec<Dependency>,
}

impl ScanReport {
    pub fn to_json(&self, pretty: bool) -> Result<String> {
        let json = if pretty {
            serde_json::to_string_pretty(self)?
        } else {
            serde_json::to_string(self)?
        };
        Ok(json)
    }
}

/// Walks a directory and builds its dependency graph.
///
/// Files are parsed in parallel. Entities are then discovered for the whole
/// project and frozen into one resolution index, after which each file's
/// edges are extracted independently against that shared index.
pub struct ProjectScanner {
    registry: LanguageRegistry,
    config: DepGraphConfig,
}

impl ProjectScanner {
    pub fn new(registry: LanguageRegistry, config: DepGraphConfig) -> Self {
        Self { registry, config }
    }

    pub fn config(&self) -> &DepGraphConfig {
        &self.config
    }

    pub fn scan(&self, root: &Path) -> Result<ScanReport> {
        let walker = FileWalker::with_config(self.registry.clone(), self.config.scan.clone());
        let files = walker.walk(root)?;
        tracing::info!("Found {} files under {}", files.len(), root.display());

        let parsed = self.parse_files(root, &files);

        let extractor = EntityExtractor::new();
        let mut entities = Vec::new();
        for (path, file) in &parsed {
            match extractor.extract(file, path) {
                Ok(found) => entities.extend(found),
                Err(e) => tracing::warn!("Skipping entities of {}: {}", path, e),
            }
        }

        let index = ResolutionIndex::build(&entities)?;

        let records: Vec<EntityRecord> = entities
            .iter()
            .map(|entity| {
                let hashes = self
                    .config
                    .output
                    .include_hashes
                    .then(|| EntityFingerprint::for_entity(entity, &self.registry).pair());
                EntityRecord::from_entity(entity, hashes)
            })
            .collect();

        let dependencies = self.extract_dependencies(&parsed, &index);

        tracing::info!(
            "Scanned {} files: {} entities, {} dependencies",
            parsed.len(),
            records.len(),
            dependencies.len()
        );

        Ok(ScanReport {
            entities: records,
            dependencies,
        })
    }

    fn parse_files(&self, root: &Path, files: &[PathBuf]) -> Vec<(String, ParsedFile)> {
        let parser = Parser::new(self.registry.clone());
        let parse_one = |path: &PathBuf| match parser.parse_file(path) {
            Ok(parsed) => {
                if parsed.has_errors() {
                    tracing::debug!("{} has syntax errors", path.display());
                }
                Some((display_path(root, path), parsed))
            }
            Err(e) => {
                tracing::warn!("Error parsing {}: {}", path.display(), e);
                None
            }
        };

        if self.config.scan.parallel {
            files.par_iter().filter_map(parse_one).collect()
        } else {
            files.iter().filter_map(parse_one).collect()
        }
    }

    /// Per-file extraction against the shared index. Entities are
    /// rediscovered inside each task so no syntax handle crosses threads;
    /// ids are deterministic, so they match the ones already indexed.
    fn extract_dependencies(
        &self,
        parsed: &[(String, ParsedFile)],
        index: &ResolutionIndex,
    ) -> Vec<Dependency> {
        let extractor = EntityExtractor::new();
        let deps = DependencyExtractor::new(self.registry.clone());
        let extract_one = |(path, file): &(String, ParsedFile)| {
            let entities = extractor.extract(file, path).unwrap_or_default();
            deps.extract_with_index(&entities, index)
        };

        let per_file: Vec<Vec<Dependency>> = if self.config.scan.parallel {
            parsed.par_iter().map(extract_one).collect()
        } else {
            parsed.iter().map(extract_one).collect()
        };
        per_file.into_iter().flatten().collect()
    }
}

/// Path relative to the scan root with `/` separators.
fn display_path(root: &Path, path: &Path) -> String {
    let relative = match path.strip_prefix(root) {
        Ok(rel) if !rel.as_os_str().is_empty() => rel,
        _ => path,
    };
    relative.to_string_lossy().replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::DependencyKind;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, content: &str) {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, content).unwrap();
    }

    fn name_of<'r>(report: &'r ScanReport, id: &str) -> &'r str {
        report
            .entities
            .iter()
            .find(|e| e.id == id)
            .map(|e| e.name.as_str())
            .unwrap()
    }

    fn scanner(config: DepGraphConfig) -> ProjectScanner {
        ProjectScanner::new(LanguageRegistry::new(), config)
    }

    #[test]
    fn test_scan_resolves_across_files() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "src/store.rs", "pub fn save_user() {}\n");
        write(dir.path(), "src/api.rs", "pub fn create() {\n    save_user();\n}\n");

        let report = scanner(DepGraphConfig::default()).scan(dir.path()).unwrap();

        assert_eq!(report.entities.len(), 2);
        assert_eq!(report.dependencies.len(), 1);
        let dep = &report.dependencies[0];
        assert_eq!(dep.kind, DependencyKind::Calls);
        assert_eq!(name_of(&report, &dep.from_id), "create");
        assert_eq!(name_of(&report, dep.to_id.as_deref().unwrap()), "save_user");
        assert_eq!(dep.location, Location::new("src/api.rs", 2));
    }

    #[test]
    fn test_parallel_and_sequential_agree() {
        let dir = TempDir::new().unwrap();
        for i in 0..6 {
            write(
                dir.path(),
                &format!("m{}.py", i),
                &format!("def f{}():\n    f{}()\n", i, (i + 1) % 6),
            );
        }

        let parallel = scanner(DepGraphConfig::default()).scan(dir.path()).unwrap();
        let mut config = DepGraphConfig::default();
        config.scan.parallel = false;
        let sequential = scanner(config).scan(dir.path()).unwrap();

        assert_eq!(parallel.entities, sequential.entities);
        assert_eq!(parallel.dependencies, sequential.dependencies);
        assert_eq!(parallel.dependencies.len(), 6);
    }

    #[test]
    fn test_hashes_only_when_enabled() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "lib.rs", "fn run() { go(); }\n");

        let plain = scanner(DepGraphConfig::default()).scan(dir.path()).unwrap();
        assert!(plain.entities[0].hashes.is_none());

        let mut config = DepGraphConfig::default();
        config.output.include_hashes = true;
        let hashed = scanner(config).scan(dir.path()).unwrap();
        let pair = hashed.entities[0].hashes.as_deref().unwrap();
        assert_eq!(pair.len(), 17);
        assert!(pair.contains(':'));
    }

    #[test]
    fn test_report_json_shape() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a.go", "package a\nfunc A() { B() }\nfunc B() {}\n");

        let report = scanner(DepGraphConfig::default()).scan(dir.path()).unwrap();
        let json: serde_json::Value = serde_json::from_str(&report.to_json(false).unwrap()).unwrap();

        assert_eq!(json["entities"].as_array().unwrap().len(), 2);
        assert_eq!(json["entities"][0]["kind"], "function");
        assert_eq!(json["dependencies"][0]["kind"], "Calls");
        assert_eq!(json["dependencies"][0]["location"]["file_path"], "a.go");
    }

    #[test]
    fn test_display_path() {
        let root = Path::new("/repo");
        assert_eq!(display_path(root, Path::new("/repo/src/a.rs")), "src/a.rs");
        assert_eq!(display_path(Path::new("/repo/a.rs"), Path::new("/repo/a.rs")), "/repo/a.rs");
    }
}
