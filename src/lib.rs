pub mod config;
pub mod error;
pub mod graph;
pub mod indexer;
pub mod languages;

use once_cell::sync::Lazy;

pub use config::{DepGraphConfig, OutputConfig, ScanConfig};
pub use error::{DepGraphError, Result};
pub use graph::{Dependency, DependencyKind, Entity, EntityKind, Location, SyntaxRef};
pub use indexer::{
    ChangeKind, DependencyExtractor, EntityExtractor, EntityFingerprint, EntityRecord, FileWalker,
    ParsedFile, Parser, ProjectScanner, ResolutionIndex, ScanReport,
};
pub use languages::{LanguageGrammar, LanguageRegistry};

/// Global language registry instance (lazily initialized)
pub static REGISTRY: Lazy<LanguageRegistry> = Lazy::new(LanguageRegistry::new);
