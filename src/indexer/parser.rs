use std::path::Path;
use std::sync::Arc;

use crate::error::{DepGraphError, Result};
use crate::indexer::ast;
use crate::languages::{LanguageGrammar, LanguageRegistry};

pub struct Parser {
    registry: LanguageRegistry,
}

impl Parser {
    pub fn new(registry: LanguageRegistry) -> Self {
        Self { registry }
    }

    pub fn parse_file(&self, path: &Path) -> Result<ParsedFile> {
        let grammar = self
            .registry
            .get_for_file(path)
            .ok_or_else(|| DepGraphError::UnsupportedLanguage(path.display().to_string()))?;

        let bytes = std::fs::read(path)?;
        // Non-UTF-8 bytes are replaced rather than rejected so one odd file
        // does not abort a scan.
        let source = String::from_utf8_lossy(&bytes);
        self.parse_source(&source, grammar)
    }

    /// Parses `source` with `grammar`. A source with syntax errors still
    /// yields a tree containing `ERROR`/`MISSING` nodes.
    pub fn parse_source(&self, source: &str, grammar: Arc<dyn LanguageGrammar>) -> Result<ParsedFile> {
        let mut parser = tree_sitter::Parser::new();
        parser
            .set_language(&grammar.language())
            .map_err(|e| DepGraphError::Parse(e.to_string()))?;

        let tree = parser
            .parse(source, None)
            .ok_or_else(|| DepGraphError::Parse("Failed to parse source".to_string()))?;

        Ok(ParsedFile {
            tree,
            source: source.to_string(),
            language: grammar.name().to_string(),
            grammar,
        })
    }

    pub fn get_grammar(&self, path: &Path) -> Option<Arc<dyn LanguageGrammar>> {
        self.registry.get_for_file(path)
    }

    pub fn registry(&self) -> &LanguageRegistry {
        &self.registry
    }
}

/// A syntax tree together with the source it was parsed from.
///
/// Entities borrow nodes from here, so a `ParsedFile` must outlive every
/// entity extracted from it.
pub struct ParsedFile {
    pub tree: tree_sitter::Tree,
    pub source: String,
    pub language: String,
    pub grammar: Arc<dyn LanguageGrammar>,
}

impl std::fmt::Debug for ParsedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParsedFile")
            .field("tree", &self.tree)
            .field("source", &self.source)
            .field("language", &self.language)
            .finish_non_exhaustive()
    }
}

impl ParsedFile {
    pub fn root_node(&self) -> tree_sitter::Node<'_> {
        self.tree.root_node()
    }

    pub fn source_bytes(&self) -> &[u8] {
        self.source.as_bytes()
    }

    pub fn node_text(&self, node: &tree_sitter::Node) -> &str {
        ast::node_text(node, self.source_bytes()).unwrap_or("")
    }

    pub fn has_errors(&self) -> bool {
        self.root_node().has_error()
    }
}
