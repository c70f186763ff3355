use std::collections::HashSet;

use tree_sitter::{Node, Query, QueryCursor, StreamingIterator};
use xxhash_rust::xxh3::xxh3_64;

use crate::error::{DepGraphError, Result};
use crate::graph::{Entity, EntityKind, Location};
use crate::indexer::ast;
use crate::indexer::parser::ParsedFile;
use crate::indexer::resolver::last_component;
use crate::languages::LanguageGrammar;

/// Discovers functions, methods and types in a parsed file by running the
/// grammar's declaration queries.
#[derive(Debug, Default)]
pub struct EntityExtractor;

/// A query match before it becomes an entity.
struct Candidate<'t> {
    node: Node<'t>,
    name: Option<String>,
    capture: &'static str,
}

impl EntityExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Entities of `parsed` in source order. Every entity borrows its node
    /// from `parsed`.
    pub fn extract<'t>(&self, parsed: &'t ParsedFile, file_path: &str) -> Result<Vec<Entity<'t>>> {
        let grammar = parsed.grammar.as_ref();
        let source = parsed.source_bytes();
        let mut seen = HashSet::new();
        let mut entities = Vec::new();

        for candidate in self.run_query(parsed, QueryKind::Functions)? {
            if !seen.insert(candidate.node.id()) {
                continue;
            }
            if let Some(entity) = self.build_function(grammar, candidate, file_path, source) {
                entities.push(entity);
            }
        }

        for candidate in self.run_query(parsed, QueryKind::Types)? {
            if !seen.insert(candidate.node.id()) {
                continue;
            }
            if let Some(entity) = self.build_type(grammar, candidate, file_path, source) {
                entities.push(entity);
            }
        }

        entities.sort_by_key(|e| e.node().map(|n| n.start_byte()).unwrap_or(usize::MAX));

        tracing::trace!("Extracted {} entities from {}", entities.len(), file_path);
        Ok(entities)
    }

    fn run_query<'t>(&self, parsed: &'t ParsedFile, which: QueryKind) -> Result<Vec<Candidate<'t>>> {
        let grammar = parsed.grammar.as_ref();
        let (cached, query_str) = match which {
            QueryKind::Functions => (grammar.cached_functions_query(), grammar.functions_query()),
            QueryKind::Types => (grammar.cached_types_query(), grammar.types_query()),
        };
        if query_str.trim().is_empty() {
            return Ok(Vec::new());
        }

        let owned;
        let query: &Query = match cached {
            Some(query) => query,
            None => {
                owned = Query::new(&grammar.language(), query_str).map_err(|e| {
                    DepGraphError::Parse(format!("Invalid {} query: {}", which.as_str(), e))
                })?;
                &owned
            }
        };

        let mut candidates = Vec::new();
        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(query, parsed.root_node(), parsed.source_bytes());

        while let Some(m) = matches.next() {
            let mut name = None;
            let mut node = None;
            let mut capture_kind = "";

            for capture in m.captures {
                let capture_name = query.capture_names()[capture.index as usize];
                match capture_name {
                    "name" => name = Some(parsed.node_text(&capture.node).to_string()),
                    other => {
                        if let Some(kind) = declaration_capture(other) {
                            node = Some(capture.node);
                            capture_kind = kind;
                        }
                    }
                }
            }

            if let Some(node) = node {
                candidates.push(Candidate {
                    node,
                    name,
                    capture: capture_kind,
                });
            }
        }

        Ok(candidates)
    }

    fn build_function<'t>(
        &self,
        grammar: &dyn LanguageGrammar,
        candidate: Candidate<'t>,
        file_path: &str,
        source: &'t [u8],
    ) -> Option<Entity<'t>> {
        let node = candidate.node;
        let owner = grammar.extract_owner(node, source);

        // Qualified declarators (`Service::run`) are named by their last segment.
        let name = match candidate.name {
            Some(name) => last_component(&name).to_string(),
            None if candidate.capture == "constructor" => {
                owner.clone().unwrap_or_else(|| "constructor".to_string())
            }
            None => return None,
        };
        if name.is_empty() {
            return None;
        }

        let kind = if candidate.capture == "constructor"
            || grammar.is_constructor(&name, owner.as_deref())
        {
            EntityKind::Constructor
        } else if candidate.capture == "method" || owner.is_some() {
            EntityKind::Method
        } else {
            EntityKind::Function
        };

        let mut entity = self.new_entity(grammar, &name, owner.as_deref(), kind, file_path, node);
        entity = entity
            .with_params(grammar.extract_params(node, source))
            .with_returns(grammar.extract_returns(node, source))
            .with_syntax(node, source);
        if let Some(receiver) = grammar.extract_receiver(node, source) {
            entity = entity.with_receiver(receiver);
        }
        Some(entity)
    }

    fn build_type<'t>(
        &self,
        grammar: &dyn LanguageGrammar,
        candidate: Candidate<'t>,
        file_path: &str,
        source: &'t [u8],
    ) -> Option<Entity<'t>> {
        let node = candidate.node;
        let name = candidate.name.filter(|n| !n.is_empty())?;
        let captured = EntityKind::from_str(candidate.capture)?;
        let kind = grammar.refine_type_kind(node, captured);
        let owner = enclosing_type_name(grammar, node, source);

        let entity = self
            .new_entity(grammar, &name, owner.as_deref(), kind, file_path, node)
            .with_syntax(node, source);
        Some(entity)
    }

    fn new_entity<'t>(
        &self,
        grammar: &dyn LanguageGrammar,
        name: &str,
        owner: Option<&str>,
        kind: EntityKind,
        file_path: &str,
        node: Node,
    ) -> Entity<'t> {
        let qualified = owner.map(|o| format!("{}{}{}", o, grammar.scope_separator(), name));
        let id = entity_id(
            file_path,
            node.start_byte(),
            kind,
            qualified.as_deref().unwrap_or(name),
        );

        let mut entity = Entity::new(
            id,
            name,
            kind,
            grammar.name(),
            Location::of_node(file_path, &node),
        );
        if let Some(qualified) = qualified {
            entity = entity.with_qualified_name(qualified);
        }
        entity
    }
}

#[derive(Debug, Clone, Copy)]
enum QueryKind {
    Functions,
    Types,
}

impl QueryKind {
    fn as_str(&self) -> &'static str {
        match self {
            QueryKind::Functions => "functions",
            QueryKind::Types => "types",
        }
    }
}

fn declaration_capture(capture: &str) -> Option<&'static str> {
    match capture {
        "function" => Some("function"),
        "method" => Some("method"),
        "constructor" => Some("constructor"),
        "struct" => Some("struct"),
        "class" => Some("class"),
        "interface" => Some("interface"),
        "trait" => Some("trait"),
        "enum" => Some("enum"),
        "type_alias" => Some("type_alias"),
        _ => None,
    }
}

/// Deterministic entity id: the same declaration in the same file always
/// gets the same id.
pub fn entity_id(file_path: &str, start_byte: usize, kind: EntityKind, qualified: &str) -> String {
    let key = format!("{}\0{}\0{}\0{}", file_path, start_byte, kind.as_str(), qualified);
    format!("{:016x}", xxh3_64(key.as_bytes()))
}

/// Name of the nearest named type declaration lexically enclosing `node`,
/// stopping at function boundaries.
fn enclosing_type_name(grammar: &dyn LanguageGrammar, node: Node, source: &[u8]) -> Option<String> {
    let types = grammar.type_declaration_kinds();
    let boundaries = grammar.function_boundary_kinds();
    let mut current = node.parent();
    while let Some(parent) = current {
        let kind = parent.kind();
        if boundaries.contains(&kind) {
            return None;
        }
        if types.contains(&kind) {
            if let Some(name) = ast::field_text(&parent, "name", source) {
                return Some(name.to_string());
            }
        }
        current = parent.parent();
    }
    None
}
