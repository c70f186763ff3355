use std::collections::HashSet;

use once_cell::sync::{Lazy, OnceCell};
use tree_sitter::{Node, Query};

use super::{LanguageGrammar, Relation};
use crate::graph::{DependencyKind, EntityKind};
use crate::indexer::ast;

pub struct GoGrammar;

static GO_FUNCTIONS_QUERY: OnceCell<Query> = OnceCell::new();
static GO_TYPES_QUERY: OnceCell<Query> = OnceCell::new();

static GO_BUILTIN_SYMBOLS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        // predeclared functions
        "make", "len", "cap", "append", "copy", "delete", "new", "panic", "recover",
        "print", "println", "close", "min", "max", "clear", "complex", "real", "imag",
        // standard packages used as qualifiers
        "fmt", "os", "io", "bufio", "bytes", "strings", "strconv", "errors", "log", "slog",
        "time", "sync", "atomic", "context", "json", "http", "sort", "slices", "maps", "math",
        "filepath", "path", "regexp", "reflect", "runtime", "testing", "unicode", "utf8",
        // methods of standard types
        "Error", "String", "Lock", "Unlock", "RLock", "RUnlock", "Done", "Wait", "Add",
        "Close", "Err", "Value", "Unwrap", "Is", "As",
    ]
    .into_iter()
    .collect()
});

static GO_BUILTIN_TYPES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "string", "bool", "byte", "rune", "error", "any", "comparable", "int", "int8",
        "int16", "int32", "int64", "uint", "uint8", "uint16", "uint32", "uint64", "uintptr",
        "float32", "float64", "complex64", "complex128",
    ]
    .into_iter()
    .collect()
});

impl GoGrammar {
    fn is_simple_operand(node: &Node) -> bool {
        match node.kind() {
            "identifier" => true,
            "selector_expression" => node
                .child_by_field_name("operand")
                .map(|o| Self::is_simple_operand(&o))
                .unwrap_or(false),
            _ => false,
        }
    }

    /// Type node of the receiver parameter of a method declaration.
    fn receiver_type<'t>(method: &Node<'t>) -> Option<Node<'t>> {
        let receiver = method.child_by_field_name("receiver")?;
        let param = ast::named_children(&receiver)
            .into_iter()
            .find(|p| p.kind() == "parameter_declaration")?;
        param.child_by_field_name("type")
    }

    /// `*Cache[K]` -> `Cache`
    fn base_type_name(text: &str) -> &str {
        let text = text.trim().trim_start_matches('*').trim_start();
        let end = text.find(['[', '<']).unwrap_or(text.len());
        text[..end].trim_end()
    }
}

impl LanguageGrammar for GoGrammar {
    fn name(&self) -> &'static str {
        "go"
    }

    fn file_extensions(&self) -> &[&'static str] {
        &["go"]
    }

    fn language(&self) -> tree_sitter::Language {
        tree_sitter_go::LANGUAGE.into()
    }

    fn functions_query(&self) -> &str {
        r#"
        (function_declaration
            name: (identifier) @name
        ) @function

        (method_declaration
            name: (field_identifier) @name
        ) @method
        "#
    }

    fn types_query(&self) -> &str {
        // type_spec kinds are narrowed by refine_type_kind
        r#"
        (type_spec
            name: (type_identifier) @name
        ) @type_alias

        (type_alias
            name: (type_identifier) @name
        ) @type_alias
        "#
    }

    fn cached_functions_query(&self) -> Option<&'static Query> {
        GO_FUNCTIONS_QUERY
            .get_or_try_init(|| Query::new(&self.language(), self.functions_query()))
            .ok()
    }

    fn cached_types_query(&self) -> Option<&'static Query> {
        GO_TYPES_QUERY
            .get_or_try_init(|| Query::new(&self.language(), self.types_query()))
            .ok()
    }

    fn call_kinds(&self) -> &[&'static str] {
        // composite literals are Go's construction form
        &["call_expression", "composite_literal"]
    }

    fn conditional_kinds(&self) -> &[&'static str] {
        &[
            "if_statement",
            "expression_switch_statement",
            "type_switch_statement",
            "select_statement",
            "expression_case",
            "type_case",
            "communication_case",
            "default_case",
        ]
    }

    fn function_boundary_kinds(&self) -> &[&'static str] {
        &["function_declaration", "method_declaration", "func_literal"]
    }

    fn type_declaration_kinds(&self) -> &[&'static str] {
        &["type_spec", "type_alias"]
    }

    fn qualified_type_kinds(&self) -> &[&'static str] {
        &["qualified_type"]
    }

    fn builtin_symbols(&self) -> &HashSet<&'static str> {
        &GO_BUILTIN_SYMBOLS
    }

    fn builtin_types(&self) -> &HashSet<&'static str> {
        &GO_BUILTIN_TYPES
    }

    fn locate_body<'t>(&self, node: Node<'t>) -> Option<Node<'t>> {
        match node.kind() {
            "type_spec" | "type_alias" => node.child_by_field_name("type"),
            _ => node.child_by_field_name("body"),
        }
    }

    fn extract_call_target(&self, call: Node, source: &[u8]) -> Option<String> {
        if call.kind() == "composite_literal" {
            let ty = call.child_by_field_name("type")?;
            let ty = match ty.kind() {
                "generic_type" => ty.child_by_field_name("type")?,
                "type_identifier" | "qualified_type" => ty,
                // slice, map and array literals construct nothing named
                _ => return None,
            };
            return ast::node_text(&ty, source).map(|s| s.to_string());
        }

        let function = call.child_by_field_name("function")?;
        match function.kind() {
            "identifier" => ast::node_text(&function, source).map(|s| s.to_string()),
            "selector_expression" => {
                let field = ast::field_text(&function, "field", source)?;
                match function.child_by_field_name("operand") {
                    Some(operand) if Self::is_simple_operand(&operand) => {
                        let operand_text = ast::node_text(&operand, source)?;
                        Some(format!("{}.{}", operand_text, field))
                    }
                    _ => Some(field.to_string()),
                }
            }
            _ => None,
        }
    }

    fn extract_relations<'t>(&self, type_node: Node<'t>, source: &[u8]) -> Vec<Relation<'t>> {
        let mut relations = Vec::new();
        let Some(body) = type_node.child_by_field_name("type") else {
            return relations;
        };

        match body.kind() {
            "struct_type" => {
                let Some(fields) = ast::child_of_kind(&body, &["field_declaration_list"]) else {
                    return relations;
                };
                for field in ast::named_children(&fields) {
                    if field.kind() != "field_declaration"
                        || field.child_by_field_name("name").is_some()
                    {
                        continue;
                    }
                    // embedded field: `Base`, `*Base`, `pkg.Base`
                    let Some(ty) = field.child_by_field_name("type") else {
                        continue;
                    };
                    if let Some(text) = ast::node_text(&ty, source) {
                        let name = Self::base_type_name(text);
                        if !name.is_empty() {
                            relations.push(Relation::new(name, DependencyKind::Extends, ty));
                        }
                    }
                }
            }
            "interface_type" => {
                for elem in ast::named_children(&body) {
                    if !matches!(
                        elem.kind(),
                        "type_elem" | "constraint_elem" | "type_identifier" | "qualified_type"
                    ) {
                        continue;
                    }
                    let Some(text) = ast::node_text(&elem, source) else {
                        continue;
                    };
                    // type sets (`~int | ~string`) are constraints, not embeddings
                    if text.contains('|') || text.contains('~') {
                        continue;
                    }
                    let name = Self::base_type_name(text);
                    if !name.is_empty() {
                        relations.push(Relation::new(name, DependencyKind::Extends, elem));
                    }
                }
            }
            _ => {}
        }

        relations
    }

    fn extract_owner(&self, method_node: Node, source: &[u8]) -> Option<String> {
        if method_node.kind() != "method_declaration" {
            return None;
        }
        let ty = Self::receiver_type(&method_node)?;
        let text = ast::node_text(&ty, source)?;
        let name = Self::base_type_name(text);
        (!name.is_empty()).then(|| name.to_string())
    }

    fn extract_receiver(&self, node: Node, source: &[u8]) -> Option<String> {
        let ty = Self::receiver_type(&node)?;
        ast::node_text(&ty, source).map(ast::collapse_whitespace)
    }

    fn extract_returns(&self, node: Node, source: &[u8]) -> Vec<String> {
        let Some(result) = node.child_by_field_name("result") else {
            return Vec::new();
        };
        if result.kind() == "parameter_list" {
            return ast::named_children(&result)
                .iter()
                .filter_map(|p| {
                    let ty = p.child_by_field_name("type").unwrap_or(*p);
                    ast::node_text(&ty, source).map(ast::collapse_whitespace)
                })
                .collect();
        }
        ast::node_text(&result, source)
            .map(|text| vec![ast::collapse_whitespace(text)])
            .unwrap_or_default()
    }

    fn refine_type_kind(&self, node: Node, kind: EntityKind) -> EntityKind {
        if node.kind() != "type_spec" {
            return kind;
        }
        match node.child_by_field_name("type").map(|t| t.kind()) {
            Some("struct_type") => EntityKind::Struct,
            Some("interface_type") => EntityKind::Interface,
            _ => kind,
        }
    }
}
