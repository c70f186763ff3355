use std::collections::HashSet;

use once_cell::sync::{Lazy, OnceCell};
use tree_sitter::{Node, Query};

use super::{LanguageGrammar, Reference, Relation};
use crate::graph::{DependencyKind, EntityKind};
use crate::indexer::ast;

pub struct KotlinGrammar;

static KOTLIN_FUNCTIONS_QUERY: OnceCell<Query> = OnceCell::new();
static KOTLIN_TYPES_QUERY: OnceCell<Query> = OnceCell::new();

static KOTLIN_BUILTIN_SYMBOLS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "kotlin", "kotlinx", "java", "super",
        // stdlib top-level functions
        "println", "print", "listOf", "mutableListOf", "arrayListOf", "mapOf", "mutableMapOf",
        "hashMapOf", "setOf", "mutableSetOf", "arrayOf", "emptyList", "emptyMap", "emptySet",
        "require", "requireNotNull", "check", "checkNotNull", "error", "TODO", "lazy",
        "repeat", "maxOf", "minOf", "buildString", "buildList", "runCatching",
        // scope functions
        "let", "apply", "also", "run", "with", "takeIf", "takeUnless", "use",
        // collection and string members
        "map", "mapNotNull", "filter", "filterNot", "forEach", "first", "firstOrNull", "last",
        "lastOrNull", "any", "all", "none", "count", "sum", "sumOf", "sortedBy", "groupBy",
        "associateBy", "flatMap", "toList", "toMutableList", "toSet", "toMap", "joinToString",
        "get", "getOrNull", "getOrElse", "getOrDefault", "put", "add", "addAll", "remove",
        "contains", "containsKey", "isEmpty", "isNotEmpty", "isNullOrEmpty", "isBlank",
        "toString", "equals", "hashCode", "copy", "trim", "split", "substring", "format",
        "toInt", "toLong", "toDouble", "uppercase", "lowercase", "startsWith", "endsWith",
    ]
    .into_iter()
    .collect()
});

static KOTLIN_BUILTIN_TYPES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "String", "Int", "Long", "Short", "Byte", "Double", "Float", "Boolean", "Char",
        "Unit", "Any", "Nothing", "Number", "Array", "IntArray", "ByteArray", "List",
        "MutableList", "ArrayList", "Map", "MutableMap", "HashMap", "LinkedHashMap", "Set",
        "MutableSet", "HashSet", "Collection", "Iterable", "Sequence", "Pair", "Triple",
        "Result", "Lazy", "Comparable", "Comparator", "Exception", "RuntimeException",
        "Throwable", "Error", "IllegalArgumentException", "IllegalStateException",
        "StringBuilder", "Regex", "Enum", "Function", "Deprecated", "JvmStatic", "Suppress",
    ]
    .into_iter()
    .collect()
});

impl KotlinGrammar {
    fn is_simple_receiver(node: &Node) -> bool {
        match node.kind() {
            "identifier" | "this_expression" | "super_expression" => true,
            "navigation_expression" => ast::named_children(node)
                .first()
                .map(Self::is_simple_receiver)
                .unwrap_or(false),
            _ => false,
        }
    }

    /// Declared type of a `parameter` / `class_parameter`.
    fn parameter_type(param: &Node, source: &[u8]) -> Option<String> {
        let ty = ast::child_of_kind(param, &["type", "user_type", "nullable_type"])?;
        ast::node_text(&ty, source).map(ast::collapse_whitespace)
    }

    fn collect_user_types<'t>(
        &self,
        node: Node<'t>,
        root_id: usize,
        source: &[u8],
        refs: &mut Vec<Reference<'t>>,
    ) {
        let boundaries = self.function_boundary_kinds();
        let nested_types = self.type_declaration_kinds();
        ast::walk(node, &mut |n: Node<'t>| {
            let kind = n.kind();
            if n.id() != root_id && (boundaries.contains(&kind) || nested_types.contains(&kind)) {
                return false;
            }
            if kind == "user_type" {
                if let Some(text) = ast::node_text(&n, source) {
                    let name = ast::strip_generics(text);
                    if !name.is_empty() {
                        refs.push(Reference::new(name, n));
                    }
                }
            }
            // type arguments nest further user types
            true
        });
    }
}

impl LanguageGrammar for KotlinGrammar {
    fn name(&self) -> &'static str {
        "kotlin"
    }

    fn file_extensions(&self) -> &[&'static str] {
        &["kt", "kts"]
    }

    fn language(&self) -> tree_sitter::Language {
        tree_sitter_kotlin_ng::LANGUAGE.into()
    }

    fn functions_query(&self) -> &str {
        r#"
        (function_declaration
            name: (identifier) @name
        ) @function

        (secondary_constructor) @constructor
        "#
    }

    fn types_query(&self) -> &str {
        r#"
        (class_declaration
            name: (identifier) @name
        ) @class

        (object_declaration
            name: (identifier) @name
        ) @class

        (type_alias
            type: (identifier) @name
        ) @type_alias
        "#
    }

    fn cached_functions_query(&self) -> Option<&'static Query> {
        KOTLIN_FUNCTIONS_QUERY
            .get_or_try_init(|| Query::new(&self.language(), self.functions_query()))
            .ok()
    }

    fn cached_types_query(&self) -> Option<&'static Query> {
        KOTLIN_TYPES_QUERY
            .get_or_try_init(|| Query::new(&self.language(), self.types_query()))
            .ok()
    }

    fn call_kinds(&self) -> &[&'static str] {
        // `User(id)` is both a call and a construction
        &["call_expression"]
    }

    fn conditional_kinds(&self) -> &[&'static str] {
        &[
            "if_expression",
            "when_expression",
            "when_entry",
            "catch_block",
            "elvis_expression",
        ]
    }

    fn function_boundary_kinds(&self) -> &[&'static str] {
        &[
            "function_declaration",
            "secondary_constructor",
            "lambda_literal",
            "anonymous_function",
            "getter",
            "setter",
        ]
    }

    fn type_declaration_kinds(&self) -> &[&'static str] {
        &["class_declaration", "object_declaration", "companion_object"]
    }

    fn type_identifier_kinds(&self) -> &[&'static str] {
        &["user_type"]
    }

    fn builtin_symbols(&self) -> &HashSet<&'static str> {
        &KOTLIN_BUILTIN_SYMBOLS
    }

    fn builtin_types(&self) -> &HashSet<&'static str> {
        &KOTLIN_BUILTIN_TYPES
    }

    fn locate_body<'t>(&self, node: Node<'t>) -> Option<Node<'t>> {
        match node.kind() {
            "function_declaration" => ast::child_of_kind(&node, &["function_body"]),
            "secondary_constructor" => ast::child_of_kind(&node, &["block"]),
            "class_declaration" | "object_declaration" => {
                ast::child_of_kind(&node, &["class_body", "enum_class_body"])
                    .or_else(|| ast::child_of_kind(&node, &["primary_constructor"]))
            }
            "type_alias" => ast::child_of_kind(&node, &["type"]),
            _ => None,
        }
    }

    fn extract_call_target(&self, call: Node, source: &[u8]) -> Option<String> {
        let callee = ast::named_children(&call).into_iter().next()?;
        match callee.kind() {
            "identifier" => ast::node_text(&callee, source).map(|s| s.to_string()),
            "navigation_expression" => {
                let parts = ast::named_children(&callee);
                let member = parts.last().filter(|m| m.kind() == "identifier")?;
                let method = ast::node_text(member, source)?;
                let receiver = parts.first().filter(|r| r.id() != member.id());
                match receiver {
                    Some(r) if Self::is_simple_receiver(r) => {
                        let receiver_text = ast::node_text(r, source)?;
                        Some(format!("{}.{}", receiver_text, method))
                    }
                    _ => Some(method.to_string()),
                }
            }
            _ => None,
        }
    }

    fn extract_type_references<'t>(&self, node: Node<'t>, source: &[u8]) -> Vec<Reference<'t>> {
        let mut refs = Vec::new();

        // Properties declared in the primary constructor belong to the class
        if matches!(node.kind(), "class_body" | "enum_class_body") {
            if let Some(ctor) = node
                .parent()
                .and_then(|p| ast::child_of_kind(&p, &["primary_constructor"]))
            {
                self.collect_user_types(ctor, ctor.id(), source, &mut refs);
            }
        }

        self.collect_user_types(node, node.id(), source, &mut refs);
        refs
    }

    fn extract_relations<'t>(&self, type_node: Node<'t>, source: &[u8]) -> Vec<Relation<'t>> {
        let mut relations = Vec::new();
        let Some(specifiers) = ast::child_of_kind(&type_node, &["delegation_specifiers"]) else {
            return relations;
        };

        for spec in ast::named_children(&specifiers) {
            if spec.kind() != "delegation_specifier" {
                continue;
            }
            let Some(inner) = ast::named_children(&spec).into_iter().next() else {
                continue;
            };
            let (ty, kind) = match inner.kind() {
                "constructor_invocation" => {
                    match ast::child_of_kind(&inner, &["type", "user_type"]) {
                        Some(ty) => (ty, DependencyKind::Extends),
                        None => continue,
                    }
                }
                "explicit_delegation" => {
                    match ast::child_of_kind(&inner, &["type", "user_type"]) {
                        Some(ty) => (ty, DependencyKind::Implements),
                        None => continue,
                    }
                }
                _ => (inner, DependencyKind::Implements),
            };
            if let Some(text) = ast::node_text(&ty, source) {
                let name = ast::strip_generics(text);
                if !name.is_empty() {
                    relations.push(Relation::new(name, kind, ty));
                }
            }
        }

        relations
    }

    fn extract_owner(&self, method_node: Node, source: &[u8]) -> Option<String> {
        let mut current = method_node.parent();
        while let Some(parent) = current {
            match parent.kind() {
                "class_declaration" | "object_declaration" => {
                    return ast::field_text(&parent, "name", source).map(|s| s.to_string())
                }
                "function_declaration" | "lambda_literal" | "anonymous_function" => return None,
                _ => {}
            }
            current = parent.parent();
        }
        None
    }

    fn extract_params(&self, node: Node, source: &[u8]) -> Vec<String> {
        let Some(params) = ast::child_of_kind(&node, &["function_value_parameters"]) else {
            return Vec::new();
        };
        ast::named_children(&params)
            .iter()
            .filter(|p| p.kind() == "parameter")
            .filter_map(|p| Self::parameter_type(p, source))
            .collect()
    }

    fn extract_returns(&self, node: Node, source: &[u8]) -> Vec<String> {
        let Some(params) = ast::child_of_kind(&node, &["function_value_parameters"]) else {
            return Vec::new();
        };
        // the return type is the first type after the parameter list
        ast::children(&node)
            .into_iter()
            .filter(|c| c.start_byte() >= params.end_byte())
            .find(|c| matches!(c.kind(), "type" | "user_type" | "nullable_type"))
            .and_then(|ret| ast::node_text(&ret, source))
            .map(|text| vec![ast::collapse_whitespace(text)])
            .unwrap_or_default()
    }

    fn refine_type_kind(&self, node: Node, kind: EntityKind) -> EntityKind {
        if node.kind() != "class_declaration" {
            return kind;
        }
        let children = ast::children(&node);
        if children.iter().any(|c| c.kind() == "interface") {
            EntityKind::Interface
        } else if children.iter().any(|c| c.kind() == "enum_class_body") {
            EntityKind::Enum
        } else {
            kind
        }
    }
}
