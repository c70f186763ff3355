use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};

use code_depgraph::indexer::staleness::{
    classify_change, compare_hashes, compute_file_hash, EntityFingerprint,
};
use code_depgraph::indexer::{EntityExtractor, Parser as CodeParser};
use code_depgraph::{DepGraphConfig, ProjectScanner, REGISTRY};

#[derive(Parser)]
#[command(name = "code-depgraph")]
#[command(about = "Cross-language dependency graph and staleness fingerprints using tree-sitter")]
#[command(version)]
#[command(after_long_help = r#"
EXAMPLES:
    # Dependency graph of the current directory as JSON
    code-depgraph scan

    # Include signature/body fingerprints, single-line output
    code-depgraph scan ./src --hashes --compact

    # Fingerprint a file and its entities
    code-depgraph hash src/lib.rs --entities

    # Compare two stored fingerprint pairs
    code-depgraph compare 1a2b3c4d:5e6f7a8b 1a2b3c4d:00000000
"#)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build the dependency graph of a directory
    Scan {
        /// Directory to scan
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Config file (defaults to depgraph.toml in the scanned directory)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Attach sig:body fingerprints to every entity
        #[arg(long)]
        hashes: bool,

        /// Single-line JSON output
        #[arg(long)]
        compact: bool,
    },

    /// Print the fingerprint of a file
    Hash {
        file: PathBuf,

        /// Also print the sig:body pair of every entity in the file
        #[arg(long)]
        entities: bool,
    },

    /// Classify the change between two sig:body pairs
    Compare { old: String, new: String },

    /// List supported languages and their file extensions
    Languages,
}

pub fn load_config(root: &Path, explicit: Option<&Path>) -> anyhow::Result<DepGraphConfig> {
    let config = match explicit {
        Some(path) => DepGraphConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => DepGraphConfig::discover(root)?,
    };
    Ok(config)
}

pub fn scan(path: &Path, config: Option<&Path>, hashes: bool, compact: bool) -> anyhow::Result<()> {
    let mut config = load_config(path, config)?;
    if hashes {
        config.output.include_hashes = true;
    }
    if compact {
        config.output.pretty = false;
    }

    let scanner = ProjectScanner::new(REGISTRY.clone(), config);
    let report = scanner
        .scan(path)
        .with_context(|| format!("Failed to scan {}", path.display()))?;

    println!("{}", report.to_json(scanner.config().output.pretty)?);
    Ok(())
}

pub fn hash_file(file: &Path, entities: bool) -> anyhow::Result<()> {
    let bytes = std::fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    println!("{}  {}", compute_file_hash(&bytes), file.display());

    if entities {
        let parser = CodeParser::new(REGISTRY.clone());
        let parsed = parser.parse_file(file)?;
        let path = file.to_string_lossy();
        for entity in EntityExtractor::new().extract(&parsed, &path)? {
            let fingerprint = EntityFingerprint::for_entity(&entity, &REGISTRY);
            println!(
                "{}  {} {} (line {})",
                fingerprint.pair(),
                entity.kind,
                entity.qualified_name.as_deref().unwrap_or(&entity.name),
                entity.location.line
            );
        }
    }

    Ok(())
}

pub fn compare(old: &str, new: &str) -> anyhow::Result<()> {
    let (signature_changed, body_changed) = compare_hashes(old, new);
    println!("signature_changed: {}", signature_changed);
    println!("body_changed: {}", body_changed);
    println!("change: {}", classify_change(old, new));
    Ok(())
}

pub fn list_languages() -> anyhow::Result<()> {
    let mut names = REGISTRY.supported_languages();
    names.sort_unstable();

    for name in names {
        if let Some(grammar) = REGISTRY.get_by_name(name) {
            println!("{:<12} {}", name, grammar.file_extensions().join(", "));
        }
    }
    Ok(())
}
