use std::collections::HashSet;

use once_cell::sync::{Lazy, OnceCell};
use tree_sitter::{Node, Query};

use super::{LanguageGrammar, Reference, Relation};
use crate::graph::DependencyKind;
use crate::indexer::ast;
use crate::indexer::resolver::last_component;

pub struct CppGrammar;

// Static query caches for C++
static CPP_FUNCTIONS_QUERY: OnceCell<Query> = OnceCell::new();
static CPP_TYPES_QUERY: OnceCell<Query> = OnceCell::new();

static CPP_BUILTIN_SYMBOLS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "std", "printf", "sprintf", "snprintf", "fprintf", "puts", "malloc", "calloc",
        "realloc", "free", "memcpy", "memmove", "memset", "strlen", "strcmp", "strcpy",
        "assert", "exit", "abort", "move", "forward", "make_shared", "make_unique",
        "make_pair", "swap", "min", "max", "static_cast", "dynamic_cast",
        "reinterpret_cast", "const_cast",
        // container and smart pointer members
        "push_back", "emplace_back", "pop_back", "push_front", "emplace", "size", "empty",
        "begin", "end", "cbegin", "cend", "find", "insert", "erase", "clear", "reserve",
        "resize", "at", "front", "back", "c_str", "data", "get", "reset", "release", "lock",
        "unlock", "count", "substr", "append", "length", "str", "what",
    ]
    .into_iter()
    .collect()
});

static CPP_BUILTIN_TYPES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "string", "wstring", "string_view", "vector", "map", "multimap", "unordered_map",
        "set", "unordered_set", "list", "deque", "array", "queue", "stack", "priority_queue",
        "pair", "tuple", "optional", "variant", "any", "function", "shared_ptr",
        "unique_ptr", "weak_ptr", "size_t", "ssize_t", "ptrdiff_t", "int8_t", "int16_t",
        "int32_t", "int64_t", "uint8_t", "uint16_t", "uint32_t", "uint64_t", "uintptr_t",
        "mutex", "lock_guard", "unique_lock", "thread", "atomic", "exception",
        "runtime_error", "logic_error", "invalid_argument", "ostream", "istream",
        "stringstream", "ostringstream", "FILE",
    ]
    .into_iter()
    .collect()
});

/// Declarators that wrap the function declarator of a definition.
const WRAPPING_DECLARATORS: &[&str] = &["pointer_declarator", "reference_declarator"];

impl CppGrammar {
    fn is_simple_argument(node: &Node) -> bool {
        match node.kind() {
            "identifier" | "this" | "field_identifier" => true,
            "field_expression" => node
                .child_by_field_name("argument")
                .map(|a| Self::is_simple_argument(&a))
                .unwrap_or(false),
            _ => false,
        }
    }

    /// The `function_declarator` of a definition, looking through `*` and `&`.
    fn function_declarator<'t>(node: &Node<'t>) -> Option<Node<'t>> {
        let mut current = node.child_by_field_name("declarator")?;
        loop {
            if current.kind() == "function_declarator" {
                return Some(current);
            }
            if !WRAPPING_DECLARATORS.contains(&current.kind()) {
                return None;
            }
            current = current
                .child_by_field_name("declarator")
                .or_else(|| ast::named_children(&current).into_iter().last())?;
        }
    }

    /// True when the rightmost name of a qualified identifier is a type.
    fn names_a_type(qualified: &Node) -> bool {
        match qualified.child_by_field_name("name") {
            Some(name) => match name.kind() {
                "type_identifier" | "template_type" => true,
                "qualified_identifier" => Self::names_a_type(&name),
                _ => false,
            },
            None => false,
        }
    }

    fn declarator_marks(declarator: Option<Node>) -> &'static str {
        match declarator.map(|d| d.kind()) {
            Some("pointer_declarator") => "*",
            Some("reference_declarator") => "&",
            _ => "",
        }
    }
}

impl LanguageGrammar for CppGrammar {
    fn name(&self) -> &'static str {
        "cpp"
    }

    fn file_extensions(&self) -> &[&'static str] {
        &["cpp", "cc", "cxx", "hpp", "hh", "hxx", "h", "c"]
    }

    fn language(&self) -> tree_sitter::Language {
        tree_sitter_cpp::LANGUAGE.into()
    }

    fn functions_query(&self) -> &str {
        r#"
        (function_definition
            declarator: (function_declarator
                declarator: [(identifier) (field_identifier) (qualified_identifier) (destructor_name) (operator_name)] @name
            )
        ) @function

        (function_definition
            declarator: (pointer_declarator
                declarator: (function_declarator
                    declarator: [(identifier) (field_identifier) (qualified_identifier)] @name
                )
            )
        ) @function

        (function_definition
            declarator: (reference_declarator
                (function_declarator
                    declarator: [(identifier) (field_identifier) (qualified_identifier)] @name
                )
            )
        ) @function
        "#
    }

    fn types_query(&self) -> &str {
        // only definitions: forward declarations have no body
        r#"
        (struct_specifier
            name: (type_identifier) @name
            body: (_)
        ) @struct

        (class_specifier
            name: (type_identifier) @name
            body: (_)
        ) @class

        (union_specifier
            name: (type_identifier) @name
            body: (_)
        ) @struct

        (enum_specifier
            name: (type_identifier) @name
            body: (_)
        ) @enum

        (alias_declaration
            name: (type_identifier) @name
        ) @type_alias
        "#
    }

    fn cached_functions_query(&self) -> Option<&'static Query> {
        CPP_FUNCTIONS_QUERY
            .get_or_try_init(|| Query::new(&self.language(), self.functions_query()))
            .ok()
    }

    fn cached_types_query(&self) -> Option<&'static Query> {
        CPP_TYPES_QUERY
            .get_or_try_init(|| Query::new(&self.language(), self.types_query()))
            .ok()
    }

    fn scope_separator(&self) -> &'static str {
        "::"
    }

    fn is_constructor(&self, name: &str, owner: Option<&str>) -> bool {
        owner == Some(name)
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
            "case_statement",
            "conditional_expression",
            "catch_clause",
        ]
    }

    fn function_boundary_kinds(&self) -> &[&'static str] {
        &["function_definition", "lambda_expression"]
    }

    fn type_declaration_kinds(&self) -> &[&'static str] {
        &["class_specifier", "struct_specifier", "union_specifier"]
    }

    fn builtin_symbols(&self) -> &HashSet<&'static str> {
        &CPP_BUILTIN_SYMBOLS
    }

    fn builtin_types(&self) -> &HashSet<&'static str> {
        &CPP_BUILTIN_TYPES
    }

    fn locate_body<'t>(&self, node: Node<'t>) -> Option<Node<'t>> {
        match node.kind() {
            "alias_declaration" => node.child_by_field_name("type"),
            _ => node.child_by_field_name("body"),
        }
    }

    fn extract_call_target(&self, call: Node, source: &[u8]) -> Option<String> {
        let function = call.child_by_field_name("function")?;
        match function.kind() {
            "identifier" => ast::node_text(&function, source).map(|s| s.to_string()),
            "qualified_identifier" => {
                let text = ast::node_text(&function, source)?;
                Some(ast::strip_generics(text).to_string())
            }
            // make<Widget>(...)
            "template_function" => ast::field_text(&function, "name", source).map(|s| s.to_string()),
            "field_expression" => {
                let field = ast::field_text(&function, "field", source)?;
                match function.child_by_field_name("argument") {
                    Some(argument) if Self::is_simple_argument(&argument) => {
                        let receiver = ast::node_text(&argument, source)?.replace("->", ".");
                        Some(format!("{}.{}", receiver, field))
                    }
                    _ => Some(field.to_string()),
                }
            }
            _ => None,
        }
    }

    fn extract_type_references<'t>(&self, node: Node<'t>, source: &[u8]) -> Vec<Reference<'t>> {
        let boundaries = self.function_boundary_kinds();
        let nested_types = self.type_declaration_kinds();
        let root_id = node.id();
        let mut refs = Vec::new();

        ast::walk(node, &mut |n: Node<'t>| {
            let kind = n.kind();
            if n.id() != root_id && (boundaries.contains(&kind) || nested_types.contains(&kind)) {
                // a field typed by an inline struct still names that struct
                if nested_types.contains(&kind) {
                    if let Some(name) = n.child_by_field_name("name") {
                        if let Some(text) = ast::node_text(&name, source) {
                            refs.push(Reference::new(text, name));
                        }
                    }
                }
                return false;
            }
            match kind {
                // std::vector<T> is a type, ns::call is not
                "qualified_identifier" if Self::names_a_type(&n) => {
                    if let Some(text) = ast::node_text(&n, source) {
                        refs.push(Reference::new(ast::strip_generics(text), n));
                    }
                    // template arguments still name types
                    let mut args = Vec::new();
                    ast::walk(n, &mut |inner: Node<'t>| {
                        if inner.kind() == "template_argument_list" {
                            args.push(inner);
                            return false;
                        }
                        true
                    });
                    for arg in args {
                        refs.extend(self.extract_type_references(arg, source));
                    }
                    false
                }
                "type_identifier" => {
                    if let Some(text) = ast::node_text(&n, source) {
                        refs.push(Reference::new(text, n));
                    }
                    false
                }
                _ => true,
            }
        });

        refs
    }

    fn extract_relations<'t>(&self, type_node: Node<'t>, source: &[u8]) -> Vec<Relation<'t>> {
        let mut relations = Vec::new();
        let Some(bases) = ast::child_of_kind(&type_node, &["base_class_clause"]) else {
            return relations;
        };

        for base in ast::named_children(&bases) {
            if !matches!(
                base.kind(),
                "type_identifier" | "qualified_identifier" | "template_type"
            ) {
                continue;
            }
            if let Some(text) = ast::node_text(&base, source) {
                let name = ast::strip_generics(text);
                if !name.is_empty() {
                    relations.push(Relation::new(name, DependencyKind::Extends, base));
                }
            }
        }

        relations
    }

    fn extract_owner(&self, method_node: Node, source: &[u8]) -> Option<String> {
        // out-of-line definition: `void Service::run()`
        if let Some(declarator) = Self::function_declarator(&method_node)
            .and_then(|f| f.child_by_field_name("declarator"))
        {
            if declarator.kind() == "qualified_identifier" {
                let text = ast::node_text(&declarator, source)?;
                let (scope, _) = text.rsplit_once("::")?;
                let owner = last_component(ast::strip_generics(scope));
                return (!owner.is_empty()).then(|| owner.to_string());
            }
        }

        let mut current = method_node.parent();
        while let Some(parent) = current {
            match parent.kind() {
                "class_specifier" | "struct_specifier" | "union_specifier" => {
                    return ast::field_text(&parent, "name", source).map(|s| s.to_string())
                }
                "function_definition" | "lambda_expression" => return None,
                _ => {}
            }
            current = parent.parent();
        }
        None
    }

    fn extract_params(&self, node: Node, source: &[u8]) -> Vec<String> {
        let Some(params) = Self::function_declarator(&node)
            .and_then(|f| f.child_by_field_name("parameters"))
        else {
            return Vec::new();
        };
        ast::named_children(&params)
            .iter()
            .filter(|p| !ast::is_comment(p))
            .filter_map(|p| {
                let declarator = p.child_by_field_name("declarator");
                // qualifiers such as `const` sit outside the type field
                let end = declarator.map(|d| d.start_byte()).unwrap_or(p.end_byte());
                let text = source
                    .get(p.start_byte()..end)
                    .and_then(|bytes| std::str::from_utf8(bytes).ok())?;
                let text = ast::collapse_whitespace(text);
                (!text.is_empty())
                    .then(|| format!("{}{}", text, Self::declarator_marks(declarator)))
            })
            .collect()
    }

    fn extract_returns(&self, node: Node, source: &[u8]) -> Vec<String> {
        let Some(ty) = node.child_by_field_name("type") else {
            return Vec::new();
        };
        let Some(text) = ast::node_text(&ty, source) else {
            return Vec::new();
        };
        let marks = Self::declarator_marks(node.child_by_field_name("declarator"));
        vec![format!("{}{}", ast::collapse_whitespace(text), marks)]
    }
}
