pub mod ast;
pub mod dependency_extractor;
pub mod extractor;
pub mod parser;
pub mod resolver;
pub mod scanner;
pub mod staleness;
pub mod walker;

pub use dependency_extractor::DependencyExtractor;
pub use extractor::{entity_id, EntityExtractor};
pub use parser::{ParsedFile, Parser};
pub use resolver::ResolutionIndex;
pub use scanner::{EntityRecord, ProjectScanner, ScanReport};
pub use staleness::{
    classify_change, compare_hashes, compute_body_hash, compute_file_hash,
    compute_signature_hash, format_hash_pair, is_empty_hash, normalize_ast, parse_hash_pair,
    ChangeKind, EntityFingerprint, EMPTY_HASH,
};
pub use walker::FileWalker;
