use std::collections::HashSet;

use once_cell::sync::{Lazy, OnceCell};
use tree_sitter::{Node, Query};

use super::{LanguageGrammar, Relation};
use crate::graph::DependencyKind;
use crate::indexer::ast;

pub struct TypeScriptGrammar;

static TS_FUNCTIONS_QUERY: OnceCell<Query> = OnceCell::new();
static TS_TYPES_QUERY: OnceCell<Query> = OnceCell::new();

static TS_BUILTIN_SYMBOLS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        // globals
        "console", "Math", "JSON", "Object", "Array", "Promise", "Number", "String",
        "Boolean", "Symbol", "Reflect", "Date", "Error", "process", "window", "document",
        "parseInt", "parseFloat", "isNaN", "setTimeout", "setInterval", "clearTimeout",
        "clearInterval", "require", "fetch", "super",
        // common members
        "log", "warn", "error", "info", "debug", "push", "pop", "shift", "unshift", "map",
        "filter", "forEach", "reduce", "find", "findIndex", "some", "every", "includes",
        "indexOf", "slice", "splice", "concat", "join", "split", "sort", "reverse", "flat",
        "flatMap", "keys", "values", "entries", "assign", "freeze", "stringify", "parse",
        "then", "catch", "finally", "resolve", "reject", "all", "allSettled", "race",
        "toString", "valueOf", "trim", "replace", "toLowerCase", "toUpperCase", "startsWith",
        "endsWith", "padStart", "get", "set", "has", "delete", "add", "clear", "bind", "call",
        "apply", "now", "floor", "ceil", "round", "max", "min", "abs", "random", "isArray",
        "from", "of",
    ]
    .into_iter()
    .collect()
});

static TS_BUILTIN_TYPES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "string", "number", "boolean", "any", "unknown", "void", "never", "object",
        "undefined", "null", "bigint", "symbol", "String", "Number", "Boolean", "Object",
        "Array", "ReadonlyArray", "Promise", "PromiseLike", "Map", "Set", "WeakMap",
        "WeakSet", "Date", "Error", "TypeError", "RegExp", "Function", "Record", "Partial",
        "Required", "Readonly", "Pick", "Omit", "Exclude", "Extract", "NonNullable",
        "ReturnType", "Parameters", "InstanceType", "Awaited", "Iterable", "Iterator",
        "AsyncIterable", "Generator", "Uint8Array", "ArrayBuffer", "Buffer", "JSX",
    ]
    .into_iter()
    .collect()
});

impl TypeScriptGrammar {
    fn is_simple_receiver(node: &Node) -> bool {
        match node.kind() {
            "identifier" | "this" | "super" => true,
            "member_expression" => node
                .child_by_field_name("object")
                .map(|o| Self::is_simple_receiver(&o))
                .unwrap_or(false),
            _ => false,
        }
    }

    /// Text of a `type_annotation` without its leading colon.
    fn annotation_text(node: &Node, source: &[u8]) -> Option<String> {
        let text = ast::node_text(node, source)?;
        let text = ast::collapse_whitespace(text.trim_start_matches(':'));
        (!text.is_empty()).then_some(text)
    }

    fn heritage_types<'t>(
        clause: &Node<'t>,
        kind: DependencyKind,
        source: &[u8],
        relations: &mut Vec<Relation<'t>>,
    ) {
        for ty in ast::named_children(clause) {
            // extends Base<T>: the arguments are a sibling of the base expression
            if ty.kind() == "type_arguments" {
                continue;
            }
            if let Some(text) = ast::node_text(&ty, source) {
                let name = ast::strip_generics(text);
                if !name.is_empty() {
                    relations.push(Relation::new(name, kind, ty));
                }
            }
        }
    }
}

impl LanguageGrammar for TypeScriptGrammar {
    fn name(&self) -> &'static str {
        "typescript"
    }

    fn file_extensions(&self) -> &[&'static str] {
        &["ts", "tsx", "js", "jsx", "mjs", "cjs"]
    }

    fn language(&self) -> tree_sitter::Language {
        tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()
    }

    fn functions_query(&self) -> &str {
        r#"
        (function_declaration
            name: (identifier) @name
        ) @function

        (generator_function_declaration
            name: (identifier) @name
        ) @function

        (method_definition
            name: (property_identifier) @name
        ) @method

        (variable_declarator
            name: (identifier) @name
            value: (arrow_function)
        ) @function

        (variable_declarator
            name: (identifier) @name
            value: (function_expression)
        ) @function
        "#
    }

    fn types_query(&self) -> &str {
        r#"
        (class_declaration
            name: (type_identifier) @name
        ) @class

        (abstract_class_declaration
            name: (type_identifier) @name
        ) @class

        (interface_declaration
            name: (type_identifier) @name
        ) @interface

        (enum_declaration
            name: (identifier) @name
        ) @enum

        (type_alias_declaration
            name: (type_identifier) @name
        ) @type_alias
        "#
    }

    fn cached_functions_query(&self) -> Option<&'static Query> {
        TS_FUNCTIONS_QUERY
            .get_or_try_init(|| Query::new(&self.language(), self.functions_query()))
            .ok()
    }

    fn cached_types_query(&self) -> Option<&'static Query> {
        TS_TYPES_QUERY
            .get_or_try_init(|| Query::new(&self.language(), self.types_query()))
            .ok()
    }

    fn constructor_name(&self) -> Option<&'static str> {
        Some("constructor")
    }

    fn call_kinds(&self) -> &[&'static str] {
        &["call_expression"]
    }

    fn instantiation_kinds(&self) -> &[&'static str] {
        &["new_expression"]
    }

    fn conditional_kinds(&self) -> &[&'static str] {
        &[
            "if_statement",
            "else_clause",
            "switch_statement",
            "switch_case",
            "switch_default",
            "ternary_expression",
            "catch_clause",
        ]
    }

    fn function_boundary_kinds(&self) -> &[&'static str] {
        &[
            "function_declaration",
            "generator_function_declaration",
            "function_expression",
            "generator_function",
            "arrow_function",
            "method_definition",
        ]
    }

    fn type_declaration_kinds(&self) -> &[&'static str] {
        &[
            "class_declaration",
            "abstract_class_declaration",
            "class",
            "interface_declaration",
        ]
    }

    fn qualified_type_kinds(&self) -> &[&'static str] {
        &["nested_type_identifier"]
    }

    fn builtin_symbols(&self) -> &HashSet<&'static str> {
        &TS_BUILTIN_SYMBOLS
    }

    fn builtin_types(&self) -> &HashSet<&'static str> {
        &TS_BUILTIN_TYPES
    }

    fn locate_body<'t>(&self, node: Node<'t>) -> Option<Node<'t>> {
        match node.kind() {
            "variable_declarator" => node
                .child_by_field_name("value")
                .and_then(|f| f.child_by_field_name("body")),
            "type_alias_declaration" => node.child_by_field_name("value"),
            _ => node.child_by_field_name("body"),
        }
    }

    fn extract_call_target(&self, call: Node, source: &[u8]) -> Option<String> {
        let function = call.child_by_field_name("function")?;
        match function.kind() {
            "identifier" => ast::node_text(&function, source).map(|s| s.to_string()),
            "member_expression" => {
                let property = ast::field_text(&function, "property", source)?;
                match function.child_by_field_name("object") {
                    Some(object) if Self::is_simple_receiver(&object) => {
                        let receiver = ast::node_text(&object, source)?;
                        Some(format!("{}.{}", receiver, property))
                    }
                    _ => Some(property.to_string()),
                }
            }
            _ => None,
        }
    }

    fn extract_relations<'t>(&self, type_node: Node<'t>, source: &[u8]) -> Vec<Relation<'t>> {
        let mut relations = Vec::new();
        match type_node.kind() {
            "class_declaration" | "abstract_class_declaration" => {
                let Some(heritage) = ast::child_of_kind(&type_node, &["class_heritage"]) else {
                    return relations;
                };
                for clause in ast::named_children(&heritage) {
                    match clause.kind() {
                        "extends_clause" => Self::heritage_types(
                            &clause,
                            DependencyKind::Extends,
                            source,
                            &mut relations,
                        ),
                        "implements_clause" => Self::heritage_types(
                            &clause,
                            DependencyKind::Implements,
                            source,
                            &mut relations,
                        ),
                        _ => {}
                    }
                }
            }
            "interface_declaration" => {
                if let Some(clause) = ast::child_of_kind(&type_node, &["extends_type_clause"]) {
                    Self::heritage_types(&clause, DependencyKind::Extends, source, &mut relations);
                }
            }
            _ => {}
        }
        relations
    }

    fn extract_owner(&self, method_node: Node, source: &[u8]) -> Option<String> {
        let mut current = method_node.parent();
        while let Some(parent) = current {
            match parent.kind() {
                "class_declaration" | "abstract_class_declaration" | "interface_declaration" => {
                    return ast::field_text(&parent, "name", source).map(|s| s.to_string())
                }
                // `const Foo = class { ... }`
                "class" => {
                    return parent
                        .parent()
                        .filter(|p| p.kind() == "variable_declarator")
                        .and_then(|p| ast::field_text(&p, "name", source))
                        .map(|s| s.to_string())
                }
                "function_declaration" | "function_expression" | "arrow_function" => return None,
                _ => {}
            }
            current = parent.parent();
        }
        None
    }

    fn extract_params(&self, node: Node, source: &[u8]) -> Vec<String> {
        let function = match node.kind() {
            "variable_declarator" => match node.child_by_field_name("value") {
                Some(value) => value,
                None => return Vec::new(),
            },
            _ => node,
        };
        let Some(params) = function.child_by_field_name("parameters") else {
            return Vec::new();
        };
        ast::named_children(&params)
            .iter()
            .filter(|p| !ast::is_comment(p))
            .filter_map(|p| match p.child_by_field_name("type") {
                Some(ty) => Self::annotation_text(&ty, source),
                None => ast::node_text(p, source).map(ast::collapse_whitespace),
            })
            .collect()
    }

    fn extract_returns(&self, node: Node, source: &[u8]) -> Vec<String> {
        let function = match node.kind() {
            "variable_declarator" => match node.child_by_field_name("value") {
                Some(value) => value,
                None => return Vec::new(),
            },
            _ => node,
        };
        function
            .child_by_field_name("return_type")
            .and_then(|ret| Self::annotation_text(&ret, source))
            .map(|text| vec![text])
            .unwrap_or_default()
    }
}
