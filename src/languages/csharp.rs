use std::collections::HashSet;

use once_cell::sync::{Lazy, OnceCell};
use tree_sitter::{Node, Query};

use super::{LanguageGrammar, Reference, Relation};
use crate::graph::DependencyKind;
use crate::indexer::ast;
use crate::indexer::resolver::last_component;

pub struct CSharpGrammar;

// Static query caches for C#
static CSHARP_FUNCTIONS_QUERY: OnceCell<Query> = OnceCell::new();
static CSHARP_TYPES_QUERY: OnceCell<Query> = OnceCell::new();

static CSHARP_BUILTIN_SYMBOLS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "System", "Console", "Math", "Convert", "Task", "Enumerable", "Guid", "DateTime",
        "Debug", "Trace", "Environment", "File", "Path", "Directory", "Activator", "GC",
        "String", "Array", "Interlocked", "base", "nameof", "typeof", "sizeof",
        // object members
        "ToString", "Equals", "GetHashCode", "GetType", "Dispose", "DisposeAsync",
        // collections and LINQ
        "Add", "AddRange", "Remove", "Clear", "Contains", "ContainsKey", "TryGetValue",
        "TryAdd", "Any", "All", "Where", "Select", "SelectMany", "First", "FirstOrDefault",
        "Single", "SingleOrDefault", "Last", "LastOrDefault", "ToList", "ToArray",
        "ToDictionary", "OrderBy", "OrderByDescending", "ThenBy", "GroupBy", "Sum", "Max",
        "Min", "Count", "Aggregate", "Distinct", "Skip", "Take", "Concat", "Zip",
        // strings and tasks
        "WriteLine", "Write", "ReadLine", "Format", "Join", "Split", "Trim", "Substring",
        "StartsWith", "EndsWith", "Replace", "IsNullOrEmpty", "IsNullOrWhiteSpace",
        "ConfigureAwait", "FromResult", "Run", "WhenAll", "WhenAny", "Delay", "Wait",
    ]
    .into_iter()
    .collect()
});

static CSHARP_BUILTIN_TYPES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "string", "object", "var", "dynamic", "String", "Object", "Int32", "Int64",
        "Boolean", "Double", "Decimal", "Single", "Byte", "Char", "DateTime", "DateTimeOffset",
        "TimeSpan", "Guid", "Uri", "Type", "List", "Dictionary", "HashSet", "Queue", "Stack",
        "IEnumerable", "IEnumerator", "IList", "ICollection", "IDictionary",
        "IReadOnlyList", "IReadOnlyCollection", "IReadOnlyDictionary", "IQueryable",
        "Task", "ValueTask", "Func", "Action", "Predicate", "EventHandler", "Exception",
        "ArgumentException", "ArgumentNullException", "InvalidOperationException",
        "NotImplementedException", "NotSupportedException", "CancellationToken",
        "IDisposable", "IAsyncDisposable", "IEquatable", "IComparable", "Nullable",
        "StringBuilder", "Span", "ReadOnlySpan", "Memory", "Lazy", "Attribute", "Obsolete",
        "Serializable", "Tuple", "KeyValuePair",
    ]
    .into_iter()
    .collect()
});

/// Wrappers around a type that carry no name of their own.
const TYPE_WRAPPER_KINDS: &[&str] = &[
    "nullable_type",
    "array_type",
    "pointer_type",
    "ref_type",
    "tuple_type",
    "tuple_element",
    "type_argument_list",
];

impl CSharpGrammar {
    fn is_simple_receiver(node: &Node) -> bool {
        match node.kind() {
            "identifier" | "this_expression" | "this" | "base_expression" | "base" => true,
            "member_access_expression" => node
                .child_by_field_name("expression")
                .map(|e| Self::is_simple_receiver(&e))
                .unwrap_or(false),
            _ => false,
        }
    }

    /// Interfaces follow the `IName` convention.
    fn looks_like_interface(name: &str) -> bool {
        let mut chars = last_component(name).chars();
        matches!(
            (chars.next(), chars.next()),
            (Some('I'), Some(second)) if second.is_ascii_uppercase()
        )
    }

    /// Names inside a node occupying a type position.
    fn type_names<'t>(node: Node<'t>, source: &[u8], refs: &mut Vec<Reference<'t>>) {
        match node.kind() {
            "identifier" => {
                if let Some(text) = ast::node_text(&node, source) {
                    refs.push(Reference::new(text, node));
                }
            }
            "qualified_name" => {
                if let Some(text) = ast::node_text(&node, source) {
                    refs.push(Reference::new(ast::strip_generics(text), node));
                }
            }
            "generic_name" => {
                for child in ast::named_children(&node) {
                    Self::type_names(child, source, refs);
                }
            }
            kind if TYPE_WRAPPER_KINDS.contains(&kind) => {
                for child in ast::named_children(&node) {
                    // tuple element names are not types
                    if kind == "tuple_element" && node.child_by_field_name("name") == Some(child) {
                        continue;
                    }
                    Self::type_names(child, source, refs);
                }
            }
            _ => {}
        }
    }
}

impl LanguageGrammar for CSharpGrammar {
    fn name(&self) -> &'static str {
        "csharp"
    }

    fn file_extensions(&self) -> &[&'static str] {
        &["cs"]
    }

    fn language(&self) -> tree_sitter::Language {
        tree_sitter_c_sharp::LANGUAGE.into()
    }

    fn functions_query(&self) -> &str {
        r#"
        (method_declaration
            name: (identifier) @name
        ) @method

        (constructor_declaration
            name: (identifier) @name
        ) @constructor

        (local_function_statement
            name: (identifier) @name
        ) @function
        "#
    }

    fn types_query(&self) -> &str {
        r#"
        (class_declaration
            name: (identifier) @name
        ) @class

        (interface_declaration
            name: (identifier) @name
        ) @interface

        (struct_declaration
            name: (identifier) @name
        ) @struct

        (enum_declaration
            name: (identifier) @name
        ) @enum

        (record_declaration
            name: (identifier) @name
        ) @class
        "#
    }

    fn cached_functions_query(&self) -> Option<&'static Query> {
        CSHARP_FUNCTIONS_QUERY
            .get_or_try_init(|| Query::new(&self.language(), self.functions_query()))
            .ok()
    }

    fn cached_types_query(&self) -> Option<&'static Query> {
        CSHARP_TYPES_QUERY
            .get_or_try_init(|| Query::new(&self.language(), self.types_query()))
            .ok()
    }

    fn call_kinds(&self) -> &[&'static str] {
        &["invocation_expression"]
    }

    fn instantiation_kinds(&self) -> &[&'static str] {
        &["object_creation_expression"]
    }

    fn conditional_kinds(&self) -> &[&'static str] {
        &[
            "if_statement",
            "switch_statement",
            "switch_section",
            "switch_expression",
            "switch_expression_arm",
            "conditional_expression",
            "conditional_access_expression",
            "catch_clause",
        ]
    }

    fn function_boundary_kinds(&self) -> &[&'static str] {
        &[
            "method_declaration",
            "constructor_declaration",
            "local_function_statement",
            "lambda_expression",
            "anonymous_method_expression",
            "accessor_declaration",
        ]
    }

    fn type_declaration_kinds(&self) -> &[&'static str] {
        &[
            "class_declaration",
            "struct_declaration",
            "interface_declaration",
            "record_declaration",
            "enum_declaration",
        ]
    }

    fn type_identifier_kinds(&self) -> &[&'static str] {
        // identifiers are only types by position, see extract_type_references
        &[]
    }

    fn builtin_symbols(&self) -> &HashSet<&'static str> {
        &CSHARP_BUILTIN_SYMBOLS
    }

    fn builtin_types(&self) -> &HashSet<&'static str> {
        &CSHARP_BUILTIN_TYPES
    }

    fn locate_body<'t>(&self, node: Node<'t>) -> Option<Node<'t>> {
        node.child_by_field_name("body")
            .or_else(|| ast::child_of_kind(&node, &["declaration_list", "block"]))
    }

    fn extract_call_target(&self, call: Node, source: &[u8]) -> Option<String> {
        let function = call.child_by_field_name("function")?;
        match function.kind() {
            "identifier" => ast::node_text(&function, source).map(|s| s.to_string()),
            // Parse<T>(...)
            "generic_name" => ast::child_of_kind(&function, &["identifier"])
                .and_then(|id| ast::node_text(&id, source))
                .map(|s| s.to_string()),
            "member_access_expression" => {
                let name = function.child_by_field_name("name")?;
                let name = match name.kind() {
                    "generic_name" => ast::child_of_kind(&name, &["identifier"])?,
                    _ => name,
                };
                let method = ast::node_text(&name, source)?;
                match function.child_by_field_name("expression") {
                    Some(expr) if Self::is_simple_receiver(&expr) => {
                        let receiver = ast::node_text(&expr, source)?;
                        Some(format!("{}.{}", receiver, method))
                    }
                    _ => Some(method.to_string()),
                }
            }
            _ => None,
        }
    }

    fn extract_instantiation_target(&self, node: Node, source: &[u8]) -> Option<String> {
        let ty = node.child_by_field_name("type")?;
        let ty = match ty.kind() {
            "generic_name" => ast::child_of_kind(&ty, &["identifier"])?,
            _ => ty,
        };
        let text = ast::node_text(&ty, source)?;
        let name = ast::strip_generics(text);
        (!name.is_empty()).then(|| name.to_string())
    }

    fn extract_type_references<'t>(&self, node: Node<'t>, source: &[u8]) -> Vec<Reference<'t>> {
        let boundaries = self.function_boundary_kinds();
        let nested_types = self.type_declaration_kinds();
        let root_id = node.id();
        let mut visited_types: HashSet<usize> = HashSet::new();
        let mut refs = Vec::new();

        ast::walk(node, &mut |n: Node<'t>| {
            let kind = n.kind();
            if n.id() != root_id && (boundaries.contains(&kind) || nested_types.contains(&kind)) {
                return false;
            }
            if visited_types.contains(&n.id()) {
                return false;
            }
            for field in ["type", "returns"] {
                if let Some(ty) = n.child_by_field_name(field) {
                    if visited_types.insert(ty.id()) {
                        Self::type_names(ty, source, &mut refs);
                    }
                }
            }
            true
        });

        refs
    }

    fn extract_relations<'t>(&self, type_node: Node<'t>, source: &[u8]) -> Vec<Relation<'t>> {
        let mut relations = Vec::new();
        let Some(bases) = ast::child_of_kind(&type_node, &["base_list"]) else {
            return relations;
        };
        let is_interface = type_node.kind() == "interface_declaration";

        for base in ast::named_children(&bases) {
            // record primary-constructor arguments
            if base.kind() == "argument_list" {
                continue;
            }
            let base = match base.kind() {
                "primary_constructor_base_type" => match ast::named_children(&base).into_iter().next() {
                    Some(ty) => ty,
                    None => continue,
                },
                _ => base,
            };
            let Some(text) = ast::node_text(&base, source) else {
                continue;
            };
            let name = ast::strip_generics(text);
            if name.is_empty() {
                continue;
            }
            let kind = if !is_interface && Self::looks_like_interface(name) {
                DependencyKind::Implements
            } else {
                DependencyKind::Extends
            };
            relations.push(Relation::new(name, kind, base));
        }

        relations
    }

    fn extract_returns(&self, node: Node, source: &[u8]) -> Vec<String> {
        node.child_by_field_name("returns")
            .or_else(|| node.child_by_field_name("type"))
            .and_then(|ret| ast::node_text(&ret, source))
            .map(|text| vec![ast::collapse_whitespace(text)])
            .unwrap_or_default()
    }
}
