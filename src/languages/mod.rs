pub mod cpp;
pub mod csharp;
pub mod go;
pub mod java;
pub mod kotlin;
pub mod python;
pub mod rust;
pub mod typescript;

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use tree_sitter::{Node, Query};

use crate::graph::{DependencyKind, EntityKind};
use crate::indexer::ast;
use crate::indexer::resolver::{first_component, is_qualified, last_component};

/// A textual reference found in a syntax tree, with the node it came from.
#[derive(Debug, Clone)]
pub struct Reference<'t> {
    pub text: String,
    pub node: Node<'t>,
}

impl<'t> Reference<'t> {
    pub fn new(text: impl Into<String>, node: Node<'t>) -> Self {
        Self {
            text: text.into(),
            node,
        }
    }
}

/// An explicit base-type or interface declaration on a type.
#[derive(Debug, Clone)]
pub struct Relation<'t> {
    pub text: String,
    pub kind: DependencyKind,
    pub node: Node<'t>,
}

impl<'t> Relation<'t> {
    pub fn new(text: impl Into<String>, kind: DependencyKind, node: Node<'t>) -> Self {
        Self {
            text: text.into(),
            kind,
            node,
        }
    }
}

/// Per-grammar capability set.
///
/// The dependency algorithm is written once against this trait; a grammar
/// only supplies its node-type vocabulary and the handful of extractions that
/// genuinely differ between languages.
pub trait LanguageGrammar: Send + Sync {
    fn name(&self) -> &'static str;
    fn file_extensions(&self) -> &[&'static str];
    fn language(&self) -> tree_sitter::Language;

    /// Query capturing `@name` plus `@function`, `@method` or `@constructor`.
    fn functions_query(&self) -> &str;

    /// Query capturing `@name` plus one of `@struct`, `@class`, `@interface`,
    /// `@trait`, `@enum`, `@type_alias`.
    fn types_query(&self) -> &str;

    fn cached_functions_query(&self) -> Option<&'static Query> {
        None
    }

    fn cached_types_query(&self) -> Option<&'static Query> {
        None
    }

    /// Separator used to build qualified entity names.
    fn scope_separator(&self) -> &'static str {
        "."
    }

    /// Method name that marks a constructor (`constructor`, `__init__`).
    fn constructor_name(&self) -> Option<&'static str> {
        None
    }

    /// Whether a function named `name` inside `owner` constructs it.
    fn is_constructor(&self, name: &str, _owner: Option<&str>) -> bool {
        self.constructor_name() == Some(name)
    }

    // ---- node vocabularies ------------------------------------------------

    fn call_kinds(&self) -> &[&'static str];

    /// Explicit construction forms (`new X()`). Empty for grammars that fold
    /// construction into ordinary calls.
    fn instantiation_kinds(&self) -> &[&'static str] {
        &[]
    }

    fn conditional_kinds(&self) -> &[&'static str];

    fn function_boundary_kinds(&self) -> &[&'static str];

    /// Declarations that own methods or nest other types.
    fn type_declaration_kinds(&self) -> &[&'static str];

    fn type_identifier_kinds(&self) -> &[&'static str] {
        &["type_identifier"]
    }

    /// Path-like type nodes collected whole (`pkg.Type`, `a::B`).
    fn qualified_type_kinds(&self) -> &[&'static str] {
        &[]
    }

    fn builtin_symbols(&self) -> &HashSet<&'static str>;

    fn builtin_types(&self) -> &HashSet<&'static str>;

    // ---- extraction contract ----------------------------------------------

    /// Executable body of a function node, or the member sub-tree of a type
    /// node. `None` means there is nothing to analyze.
    fn locate_body<'t>(&self, node: Node<'t>) -> Option<Node<'t>> {
        node.child_by_field_name("body")
    }

    fn walk<'t>(&self, node: Node<'t>, visitor: &mut dyn FnMut(Node<'t>) -> bool) {
        ast::walk(node, visitor)
    }

    /// Name of the entity invoked at a call site; `None` for call forms that
    /// cannot be named statically.
    fn extract_call_target(&self, call: Node, source: &[u8]) -> Option<String>;

    /// Constructed type of an instantiation node.
    fn extract_instantiation_target(&self, node: Node, source: &[u8]) -> Option<String> {
        let target = node
            .child_by_field_name("type")
            .or_else(|| node.child_by_field_name("constructor"))?;
        let text = ast::node_text(&target, source)?;
        let name = ast::collapse_whitespace(ast::strip_generics(text));
        (!name.is_empty()).then_some(name)
    }

    /// Name-based filter for standard-library symbols. A qualified target is
    /// also builtin when its leading segment is a builtin module or type
    /// (`fmt.Println`, `String::from`).
    fn is_builtin_symbol(&self, name: &str) -> bool {
        let symbols = self.builtin_symbols();
        if symbols.contains(name) || self.builtin_types().contains(name) {
            return true;
        }
        if !is_qualified(name) {
            return false;
        }
        let first = first_component(name);
        symbols.contains(last_component(name))
            || symbols.contains(first)
            || self.builtin_types().contains(first)
    }

    fn is_builtin_type(&self, name: &str) -> bool {
        let types = self.builtin_types();
        if types.contains(name) {
            return true;
        }
        if !is_qualified(name) {
            return false;
        }
        types.contains(last_component(name))
            || self.builtin_symbols().contains(first_component(name))
    }

    /// True iff a conditional construct is reached strictly before a function
    /// boundary while ascending from `node`.
    fn is_conditional(&self, node: Node) -> bool {
        let conditionals = self.conditional_kinds();
        let boundaries = self.function_boundary_kinds();
        let mut current = node.parent();
        while let Some(parent) = current {
            let kind = parent.kind();
            if boundaries.contains(&kind) {
                return false;
            }
            if conditionals.contains(&kind) {
                return true;
            }
            current = parent.parent();
        }
        false
    }

    /// Type names referenced inside `node`. Nested function and type
    /// declarations are not entered unless `node` itself is one.
    fn extract_type_references<'t>(&self, node: Node<'t>, source: &[u8]) -> Vec<Reference<'t>> {
        let leaf_kinds = self.type_identifier_kinds();
        let qualified_kinds = self.qualified_type_kinds();
        let boundaries = self.function_boundary_kinds();
        let nested_types = self.type_declaration_kinds();
        let root_id = node.id();
        let mut refs = Vec::new();

        self.walk(node, &mut |n| {
            let kind = n.kind();
            if n.id() != root_id && (boundaries.contains(&kind) || nested_types.contains(&kind)) {
                return false;
            }
            if qualified_kinds.contains(&kind) {
                if let Some(text) = ast::node_text(&n, source) {
                    refs.push(Reference::new(ast::strip_generics(text), n));
                }
                return false;
            }
            if leaf_kinds.contains(&kind) {
                if let Some(text) = ast::node_text(&n, source) {
                    refs.push(Reference::new(text, n));
                }
            }
            true
        });

        refs
    }

    /// Explicit `Extends`/`Implements` declarations of a type node.
    fn extract_relations<'t>(&self, type_node: Node<'t>, source: &[u8]) -> Vec<Relation<'t>>;

    /// Name of the nearest enclosing type declaration of a method node.
    fn extract_owner(&self, method_node: Node, source: &[u8]) -> Option<String> {
        let types = self.type_declaration_kinds();
        let boundaries = self.function_boundary_kinds();
        let mut current = method_node.parent();
        while let Some(parent) = current {
            let kind = parent.kind();
            if types.contains(&kind) {
                return ast::field_text(&parent, "name", source).map(|s| s.to_string());
            }
            if boundaries.contains(&kind) {
                return None;
            }
            current = parent.parent();
        }
        None
    }

    // ---- signature components ---------------------------------------------

    fn extract_params(&self, node: Node, source: &[u8]) -> Vec<String> {
        let Some(params) = node.child_by_field_name("parameters") else {
            return Vec::new();
        };
        ast::named_children(&params)
            .iter()
            .filter(|p| !ast::is_comment(p))
            .filter_map(|p| {
                let typed = p.child_by_field_name("type").unwrap_or(*p);
                ast::node_text(&typed, source).map(ast::collapse_whitespace)
            })
            .collect()
    }

    fn extract_returns(&self, node: Node, source: &[u8]) -> Vec<String> {
        node.child_by_field_name("return_type")
            .and_then(|ret| ast::node_text(&ret, source))
            .map(|text| vec![ast::collapse_whitespace(text)])
            .unwrap_or_default()
    }

    fn extract_receiver(&self, node: Node, source: &[u8]) -> Option<String> {
        self.extract_owner(node, source)
    }

    /// Narrows the kind a types query assigned to a declaration.
    fn refine_type_kind(&self, _node: Node, kind: EntityKind) -> EntityKind {
        kind
    }
}

#[derive(Clone)]
pub struct LanguageRegistry {
    languages: HashMap<String, Arc<dyn LanguageGrammar>>,
    extension_map: HashMap<String, String>,
}

impl LanguageRegistry {
    pub fn new() -> Self {
        let mut registry = Self {
            languages: HashMap::new(),
            extension_map: HashMap::new(),
        };

        registry.register(Arc::new(rust::RustGrammar));
        registry.register(Arc::new(java::JavaGrammar));
        registry.register(Arc::new(kotlin::KotlinGrammar));
        registry.register(Arc::new(typescript::TypeScriptGrammar));
        registry.register(Arc::new(python::PythonGrammar));
        registry.register(Arc::new(go::GoGrammar));
        registry.register(Arc::new(csharp::CSharpGrammar));
        registry.register(Arc::new(cpp::CppGrammar));

        registry
    }

    pub fn register(&mut self, grammar: Arc<dyn LanguageGrammar>) {
        let name = grammar.name().to_string();
        for ext in grammar.file_extensions() {
            self.extension_map.insert(ext.to_string(), name.clone());
        }
        self.languages.insert(name, grammar);
    }

    pub fn get_by_name(&self, name: &str) -> Option<Arc<dyn LanguageGrammar>> {
        self.languages.get(name).cloned()
    }

    pub fn get_by_extension(&self, ext: &str) -> Option<Arc<dyn LanguageGrammar>> {
        self.extension_map
            .get(ext)
            .and_then(|name| self.languages.get(name))
            .cloned()
    }

    pub fn get_for_file(&self, path: &Path) -> Option<Arc<dyn LanguageGrammar>> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| self.get_by_extension(ext))
    }

    pub fn supported_extensions(&self) -> Vec<&str> {
        self.extension_map.keys().map(|s| s.as_str()).collect()
    }

    pub fn supported_languages(&self) -> Vec<&str> {
        self.languages.keys().map(|s| s.as_str()).collect()
    }
}

impl Default for LanguageRegistry {
    fn default() -> Self {
        Self::new()
    }
}
