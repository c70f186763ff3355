use std::collections::HashSet;

use once_cell::sync::{Lazy, OnceCell};
use tree_sitter::{Node, Query};

use super::{LanguageGrammar, Relation};
use crate::graph::DependencyKind;
use crate::indexer::ast;

pub struct RustGrammar;

// Static query caches for Rust
static RUST_FUNCTIONS_QUERY: OnceCell<Query> = OnceCell::new();
static RUST_TYPES_QUERY: OnceCell<Query> = OnceCell::new();

static RUST_BUILTIN_SYMBOLS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        // prelude constructors
        "Some", "None", "Ok", "Err", "Box", "drop",
        // std modules used as call qualifiers
        "std", "core", "alloc", "mem", "ptr", "fmt", "io", "fs", "thread",
        // common std methods
        "unwrap", "unwrap_or", "unwrap_or_else", "unwrap_or_default", "expect", "clone",
        "to_string", "to_owned", "into", "from", "as_ref", "as_mut", "as_str", "iter",
        "iter_mut", "into_iter", "map", "map_err", "and_then", "ok_or", "ok_or_else",
        "filter", "filter_map", "collect", "push", "push_str", "pop", "len", "is_empty",
        "is_some", "is_none", "is_ok", "is_err", "contains", "contains_key", "insert",
        "extend", "join", "split", "trim", "starts_with", "ends_with", "format", "write",
        "writeln", "borrow", "borrow_mut", "lock", "default", "with_capacity", "to_vec",
        "sort", "sort_by", "sort_by_key", "retain", "enumerate", "zip", "rev", "chain",
        "take", "skip", "any", "all", "find_map", "flat_map", "cloned", "copied",
    ]
    .into_iter()
    .collect()
});

static RUST_BUILTIN_TYPES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "i8", "i16", "i32", "i64", "i128", "isize", "u8", "u16", "u32", "u64", "u128",
        "usize", "f32", "f64", "bool", "char", "str", "String", "Vec", "VecDeque",
        "Option", "Result", "Box", "Rc", "Arc", "Weak", "Cell", "RefCell", "Mutex",
        "RwLock", "HashMap", "HashSet", "BTreeMap", "BTreeSet", "Cow", "Path", "PathBuf",
        "Duration", "Instant", "PhantomData", "Pin", "Future", "Iterator",
        "IntoIterator", "Fn", "FnMut", "FnOnce", "Send", "Sync", "Sized", "Clone", "Copy",
        "Debug", "Display", "Default", "PartialEq", "Eq", "PartialOrd", "Ord", "Hash",
    ]
    .into_iter()
    .collect()
});

/// Receivers simple enough to keep in a `receiver.method` target.
const SIMPLE_RECEIVERS: &[&str] = &["identifier", "self", "field_expression"];

impl RustGrammar {
    /// Name of the type an `impl` block targets, without generic arguments.
    fn impl_target(impl_node: &Node, source: &[u8]) -> Option<String> {
        let ty = impl_node.child_by_field_name("type")?;
        let ty = match ty.kind() {
            "generic_type" => ty.child_by_field_name("type")?,
            _ => ty,
        };
        ast::node_text(&ty, source).map(|s| s.to_string())
    }

    fn trait_name(impl_node: &Node, source: &[u8]) -> Option<String> {
        let tr = impl_node.child_by_field_name("trait")?;
        let tr = match tr.kind() {
            "generic_type" => tr.child_by_field_name("type")?,
            _ => tr,
        };
        ast::node_text(&tr, source).map(|s| s.to_string())
    }

    fn receiver_chain_is_simple(node: &Node) -> bool {
        match node.kind() {
            "identifier" | "self" => true,
            "field_expression" => node
                .child_by_field_name("value")
                .map(|v| Self::receiver_chain_is_simple(&v))
                .unwrap_or(false),
            _ => false,
        }
    }
}

impl LanguageGrammar for RustGrammar {
    fn name(&self) -> &'static str {
        "rust"
    }

    fn file_extensions(&self) -> &[&'static str] {
        &["rs"]
    }

    fn language(&self) -> tree_sitter::Language {
        tree_sitter_rust::LANGUAGE.into()
    }

    fn functions_query(&self) -> &str {
        r#"
        (function_item
            name: (identifier) @name
        ) @function
        "#
    }

    fn types_query(&self) -> &str {
        r#"
        (struct_item
            name: (type_identifier) @name
        ) @struct

        (enum_item
            name: (type_identifier) @name
        ) @enum

        (trait_item
            name: (type_identifier) @name
        ) @trait

        (type_item
            name: (type_identifier) @name
        ) @type_alias
        "#
    }

    fn cached_functions_query(&self) -> Option<&'static Query> {
        RUST_FUNCTIONS_QUERY
            .get_or_try_init(|| Query::new(&self.language(), self.functions_query()))
            .ok()
    }

    fn cached_types_query(&self) -> Option<&'static Query> {
        RUST_TYPES_QUERY
            .get_or_try_init(|| Query::new(&self.language(), self.types_query()))
            .ok()
    }

    fn scope_separator(&self) -> &'static str {
        "::"
    }

    fn call_kinds(&self) -> &[&'static str] {
        // struct literals are Rust's construction form and count as calls
        &["call_expression", "struct_expression"]
    }

    fn conditional_kinds(&self) -> &[&'static str] {
        &["if_expression", "else_clause", "match_expression", "match_arm"]
    }

    fn function_boundary_kinds(&self) -> &[&'static str] {
        &["function_item", "function_signature_item", "closure_expression"]
    }

    fn type_declaration_kinds(&self) -> &[&'static str] {
        &["impl_item", "trait_item", "struct_item", "enum_item"]
    }

    fn qualified_type_kinds(&self) -> &[&'static str] {
        &["scoped_type_identifier"]
    }

    fn builtin_symbols(&self) -> &HashSet<&'static str> {
        &RUST_BUILTIN_SYMBOLS
    }

    fn builtin_types(&self) -> &HashSet<&'static str> {
        &RUST_BUILTIN_TYPES
    }

    fn locate_body<'t>(&self, node: Node<'t>) -> Option<Node<'t>> {
        match node.kind() {
            "type_item" => node.child_by_field_name("type"),
            _ => node.child_by_field_name("body"),
        }
    }

    fn extract_call_target(&self, call: Node, source: &[u8]) -> Option<String> {
        if call.kind() == "struct_expression" {
            let name = call.child_by_field_name("name")?;
            let name = match name.kind() {
                "generic_type_with_turbofish" | "generic_type" => {
                    name.child_by_field_name("type")?
                }
                _ => name,
            };
            return ast::node_text(&name, source).map(|s| s.to_string());
        }

        let mut function = call.child_by_field_name("function")?;
        if function.kind() == "generic_function" {
            function = function.child_by_field_name("function")?;
        }

        match function.kind() {
            "identifier" => ast::node_text(&function, source).map(|s| s.to_string()),
            "scoped_identifier" => {
                let name = ast::field_text(&function, "name", source)?;
                match function.child_by_field_name("path") {
                    Some(path) => {
                        let path = match path.kind() {
                            "generic_type" | "generic_type_with_turbofish" => {
                                path.child_by_field_name("type").unwrap_or(path)
                            }
                            _ => path,
                        };
                        let path_text = ast::node_text(&path, source)?;
                        let path_text = ast::strip_generics(path_text).trim_end_matches("::");
                        Some(format!("{}::{}", path_text, name))
                    }
                    None => Some(name.to_string()),
                }
            }
            "field_expression" => {
                let method = ast::field_text(&function, "field", source)?;
                let receiver = function.child_by_field_name("value")?;
                if SIMPLE_RECEIVERS.contains(&receiver.kind())
                    && Self::receiver_chain_is_simple(&receiver)
                {
                    let receiver_text = ast::node_text(&receiver, source)?;
                    Some(format!("{}.{}", receiver_text, method))
                } else {
                    Some(method.to_string())
                }
            }
            _ => None,
        }
    }

    fn extract_relations<'t>(&self, type_node: Node<'t>, source: &[u8]) -> Vec<Relation<'t>> {
        let mut relations = Vec::new();

        match type_node.kind() {
            "trait_item" => {
                // Supertraits: trait Admin: User + Auditable
                if let Some(bounds) = type_node.child_by_field_name("bounds") {
                    for bound in ast::named_children(&bounds) {
                        let bound = match bound.kind() {
                            "generic_type" => bound.child_by_field_name("type").unwrap_or(bound),
                            _ => bound,
                        };
                        if matches!(bound.kind(), "type_identifier" | "scoped_type_identifier") {
                            if let Some(text) = ast::node_text(&bound, source) {
                                relations.push(Relation::new(text, DependencyKind::Extends, bound));
                            }
                        }
                    }
                }
            }
            "struct_item" | "enum_item" => {
                // impl Trait for Type, anywhere in the same file
                let Some(name) = ast::field_text(&type_node, "name", source) else {
                    return relations;
                };
                let mut root = type_node;
                while let Some(parent) = root.parent() {
                    root = parent;
                }
                ast::walk(root, &mut |n: Node<'t>| {
                    if n.kind() != "impl_item" {
                        return true;
                    }
                    if Self::impl_target(&n, source).as_deref() == Some(name) {
                        if let (Some(trait_name), Some(trait_node)) =
                            (Self::trait_name(&n, source), n.child_by_field_name("trait"))
                        {
                            relations.push(Relation::new(
                                trait_name,
                                DependencyKind::Implements,
                                trait_node,
                            ));
                        }
                    }
                    false
                });
            }
            _ => {}
        }

        relations
    }

    fn extract_owner(&self, method_node: Node, source: &[u8]) -> Option<String> {
        let mut current = method_node.parent();
        while let Some(parent) = current {
            match parent.kind() {
                "impl_item" => return Self::impl_target(&parent, source),
                "trait_item" => {
                    return ast::field_text(&parent, "name", source).map(|s| s.to_string())
                }
                "function_item" | "closure_expression" => return None,
                _ => {}
            }
            current = parent.parent();
        }
        None
    }

    fn extract_params(&self, node: Node, source: &[u8]) -> Vec<String> {
        let Some(params) = node.child_by_field_name("parameters") else {
            return Vec::new();
        };
        ast::named_children(&params)
            .iter()
            .filter(|p| !ast::is_comment(p))
            .filter_map(|p| match p.kind() {
                // &self / &mut self
                "self_parameter" => ast::node_text(p, source).map(ast::collapse_whitespace),
                _ => {
                    let typed = p.child_by_field_name("type").unwrap_or(*p);
                    ast::node_text(&typed, source).map(ast::collapse_whitespace)
                }
            })
            .collect()
    }
}
