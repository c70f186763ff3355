use std::collections::HashSet;

use once_cell::sync::{Lazy, OnceCell};
use tree_sitter::{Node, Query};

use super::{LanguageGrammar, Relation};
use crate::graph::DependencyKind;
use crate::indexer::ast;

pub struct JavaGrammar;

static JAVA_FUNCTIONS_QUERY: OnceCell<Query> = OnceCell::new();
static JAVA_TYPES_QUERY: OnceCell<Query> = OnceCell::new();

static JAVA_BUILTIN_SYMBOLS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "java", "javax", "System", "Math", "Objects", "Arrays", "Collections", "Collectors",
        "Thread", "Optional", "Stream", "IntStream", "List", "Map", "Set", "String",
        "Integer", "Long", "Double", "Boolean", "super",
        // java.lang.Object and friends
        "toString", "equals", "hashCode", "getClass", "clone", "notify", "notifyAll", "wait",
        // collections and streams
        "get", "put", "add", "addAll", "remove", "size", "isEmpty", "contains",
        "containsKey", "stream", "map", "filter", "collect", "forEach", "reduce", "sorted",
        "toList", "of", "ofNullable", "orElse", "orElseGet", "orElseThrow", "ifPresent",
        "isPresent", "iterator", "hasNext", "next", "keySet", "values", "entrySet",
        "getKey", "getValue", "computeIfAbsent", "putIfAbsent", "getOrDefault",
        // strings and output
        "println", "print", "printf", "format", "valueOf", "parseInt", "length", "charAt",
        "substring", "trim", "split", "append", "startsWith", "endsWith", "toUpperCase",
        "toLowerCase", "join", "requireNonNull", "asList", "emptyList", "unmodifiableList",
    ]
    .into_iter()
    .collect()
});

static JAVA_BUILTIN_TYPES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "String", "Object", "Integer", "Long", "Double", "Float", "Short", "Byte",
        "Character", "Boolean", "Number", "Void", "Class", "StringBuilder", "CharSequence",
        "List", "ArrayList", "LinkedList", "Map", "HashMap", "LinkedHashMap", "TreeMap",
        "Set", "HashSet", "LinkedHashSet", "TreeSet", "Collection", "Iterable", "Iterator",
        "Queue", "Deque", "ArrayDeque", "Optional", "Stream", "Function", "Supplier",
        "Consumer", "Predicate", "BiFunction", "Runnable", "Callable", "Comparable",
        "Comparator", "Exception", "RuntimeException", "Throwable", "Error",
        "IllegalArgumentException", "IllegalStateException", "IOException",
        "NullPointerException", "UnsupportedOperationException", "Override", "Deprecated",
        "FunctionalInterface", "SuppressWarnings", "Thread", "BigDecimal", "BigInteger",
        "UUID", "Instant", "Duration", "LocalDate", "LocalDateTime", "CompletableFuture",
        "AutoCloseable", "Serializable", "Cloneable", "Enum", "Record",
    ]
    .into_iter()
    .collect()
});

impl JavaGrammar {
    fn is_simple_receiver(node: &Node) -> bool {
        match node.kind() {
            "identifier" | "this" | "super" => true,
            "field_access" => node
                .child_by_field_name("object")
                .map(|o| Self::is_simple_receiver(&o))
                .unwrap_or(false),
            _ => false,
        }
    }

    /// Types listed in a `type_list`, or the single type of a `superclass`.
    fn listed_types<'t>(node: &Node<'t>) -> Vec<Node<'t>> {
        let mut types = Vec::new();
        for child in ast::named_children(node) {
            if child.kind() == "type_list" {
                types.extend(ast::named_children(&child));
            } else {
                types.push(child);
            }
        }
        types
    }

    fn push_relations<'t>(
        relations: &mut Vec<Relation<'t>>,
        container: Option<Node<'t>>,
        kind: DependencyKind,
        source: &[u8],
    ) {
        let Some(container) = container else {
            return;
        };
        for ty in Self::listed_types(&container) {
            if let Some(text) = ast::node_text(&ty, source) {
                let name = ast::strip_generics(text);
                if !name.is_empty() {
                    relations.push(Relation::new(name, kind, ty));
                }
            }
        }
    }
}

impl LanguageGrammar for JavaGrammar {
    fn name(&self) -> &'static str {
        "java"
    }

    fn file_extensions(&self) -> &[&'static str] {
        &["java"]
    }

    fn language(&self) -> tree_sitter::Language {
        tree_sitter_java::LANGUAGE.into()
    }

    fn functions_query(&self) -> &str {
        r#"
        (method_declaration
            name: (identifier) @name
        ) @method

        (constructor_declaration
            name: (identifier) @name
        ) @constructor
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

        (enum_declaration
            name: (identifier) @name
        ) @enum

        (record_declaration
            name: (identifier) @name
        ) @class

        (annotation_type_declaration
            name: (identifier) @name
        ) @interface
        "#
    }

    fn cached_functions_query(&self) -> Option<&'static Query> {
        JAVA_FUNCTIONS_QUERY
            .get_or_try_init(|| Query::new(&self.language(), self.functions_query()))
            .ok()
    }

    fn cached_types_query(&self) -> Option<&'static Query> {
        JAVA_TYPES_QUERY
            .get_or_try_init(|| Query::new(&self.language(), self.types_query()))
            .ok()
    }

    fn call_kinds(&self) -> &[&'static str] {
        &["method_invocation"]
    }

    fn instantiation_kinds(&self) -> &[&'static str] {
        &["object_creation_expression"]
    }

    fn conditional_kinds(&self) -> &[&'static str] {
        &[
            "if_statement",
            "switch_expression",
            "switch_block_statement_group",
            "switch_rule",
            "ternary_expression",
            "catch_clause",
        ]
    }

    fn function_boundary_kinds(&self) -> &[&'static str] {
        &[
            "method_declaration",
            "constructor_declaration",
            "compact_constructor_declaration",
            "lambda_expression",
        ]
    }

    fn type_declaration_kinds(&self) -> &[&'static str] {
        &[
            "class_declaration",
            "interface_declaration",
            "enum_declaration",
            "record_declaration",
            "annotation_type_declaration",
        ]
    }

    fn qualified_type_kinds(&self) -> &[&'static str] {
        &["scoped_type_identifier"]
    }

    fn builtin_symbols(&self) -> &HashSet<&'static str> {
        &JAVA_BUILTIN_SYMBOLS
    }

    fn builtin_types(&self) -> &HashSet<&'static str> {
        &JAVA_BUILTIN_TYPES
    }

    fn extract_call_target(&self, call: Node, source: &[u8]) -> Option<String> {
        let method = ast::field_text(&call, "name", source)?;
        match call.child_by_field_name("object") {
            Some(object) if Self::is_simple_receiver(&object) => {
                let receiver = ast::node_text(&object, source)?;
                Some(format!("{}.{}", receiver, method))
            }
            _ => Some(method.to_string()),
        }
    }

    fn extract_relations<'t>(&self, type_node: Node<'t>, source: &[u8]) -> Vec<Relation<'t>> {
        let mut relations = Vec::new();
        match type_node.kind() {
            "class_declaration" => {
                Self::push_relations(
                    &mut relations,
                    type_node.child_by_field_name("superclass"),
                    DependencyKind::Extends,
                    source,
                );
                Self::push_relations(
                    &mut relations,
                    type_node.child_by_field_name("interfaces"),
                    DependencyKind::Implements,
                    source,
                );
            }
            "enum_declaration" | "record_declaration" => {
                Self::push_relations(
                    &mut relations,
                    type_node.child_by_field_name("interfaces"),
                    DependencyKind::Implements,
                    source,
                );
            }
            "interface_declaration" => {
                Self::push_relations(
                    &mut relations,
                    ast::child_of_kind(&type_node, &["extends_interfaces"]),
                    DependencyKind::Extends,
                    source,
                );
            }
            _ => {}
        }
        relations
    }

    fn extract_returns(&self, node: Node, source: &[u8]) -> Vec<String> {
        node.child_by_field_name("type")
            .and_then(|ret| ast::node_text(&ret, source))
            .map(|text| vec![ast::collapse_whitespace(text)])
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::languages::test_support::*;

    const SOURCE: &str = r#"
package com.example.auth;

public class AuthService extends BaseService implements Auditable, Closeable<Session> {
    private UserRepository repo;
    private Map<String, Session> sessions;
    private com.example.audit.Logger logger;

    public AuthService(UserRepository repo) {
        this.repo = repo;
    }

    public Session login(Credentials creds) throws AuthError {
        User user = findUserByEmail(creds.email());
        if (user.isActive()) {
            checkPassword(user, creds);
        }
        Session session = new Session(user);
        this.repo.save(session);
        build().finish();
        return session;
    }

    static class Cache {
        private Session last;
    }
}

interface Auditable extends Named, Versioned<Long> {
    Report audit();
}
"#;

    #[test]
    fn test_call_targets() {
        let tree = parse(&JavaGrammar, SOURCE);
        let login = find_named(tree.root_node(), "method_declaration", "login", SOURCE);
        let body = JavaGrammar.locate_body(login).unwrap();
        let targets = call_targets(&JavaGrammar, body, SOURCE);

        assert!(targets.contains(&"findUserByEmail".to_string()));
        assert!(targets.contains(&"checkPassword".to_string()));
        assert!(targets.contains(&"this.repo.save".to_string()));
        assert!(targets.contains(&"user.isActive".to_string()));
        assert!(targets.contains(&"finish".to_string()));
        assert!(targets.contains(&"build".to_string()));
    }

    #[test]
    fn test_instantiation_target() {
        let tree = parse(&JavaGrammar, SOURCE);
        let creation = find(tree.root_node(), "object_creation_expression");
        assert_eq!(
            JavaGrammar.extract_instantiation_target(creation, SOURCE.as_bytes()),
            Some("Session".to_string())
        );
    }

    #[test]
    fn test_generic_instantiation_strips_arguments() {
        let source = "class A { void f() { Box<Item> b = new Box<Item>(); } }";
        let tree = parse(&JavaGrammar, source);
        let creation = find(tree.root_node(), "object_creation_expression");
        assert_eq!(
            JavaGrammar.extract_instantiation_target(creation, source.as_bytes()),
            Some("Box".to_string())
        );
    }

    #[test]
    fn test_is_conditional() {
        let tree = parse(&JavaGrammar, SOURCE);
        let calls = find_all(tree.root_node(), "method_invocation");
        let named = |name: &str| {
            *calls
                .iter()
                .find(|c| ast::field_text(c, "name", SOURCE.as_bytes()) == Some(name))
                .unwrap()
        };
        assert!(!JavaGrammar.is_conditional(named("findUserByEmail")));
        assert!(JavaGrammar.is_conditional(named("checkPassword")));
        // the if condition itself sits inside the if statement
        assert!(JavaGrammar.is_conditional(named("isActive")));
    }

    #[test]
    fn test_lambda_is_a_boundary() {
        let source = "class A { void f() { if (x) { run(() -> go()); } } }";
        let tree = parse(&JavaGrammar, source);
        let calls = find_all(tree.root_node(), "method_invocation");
        let go = calls
            .iter()
            .find(|c| ast::field_text(c, "name", source.as_bytes()) == Some("go"))
            .unwrap();
        assert!(!JavaGrammar.is_conditional(*go));
    }

    #[test]
    fn test_ternary_and_switch_are_conditional() {
        let source = r#"
class A {
    void f(int k) {
        int v = k > 0 ? left() : right();
        switch (k) {
            case 1: one(); break;
            default: other();
        }
    }
}
"#;
        let tree = parse(&JavaGrammar, source);
        for call in find_all(tree.root_node(), "method_invocation") {
            assert!(JavaGrammar.is_conditional(call));
        }
    }

    #[test]
    fn test_field_type_references() {
        let tree = parse(&JavaGrammar, SOURCE);
        let class = find_named(tree.root_node(), "class_declaration", "AuthService", SOURCE);
        let body = JavaGrammar.locate_body(class).unwrap();
        let refs = type_refs(&JavaGrammar, body, SOURCE);

        assert!(refs.contains(&"UserRepository".to_string()));
        assert!(refs.contains(&"Map".to_string()));
        assert!(refs.contains(&"Session".to_string()));
        assert!(refs.contains(&"com.example.audit.Logger".to_string()));
        // method signatures are not field declarations
        assert!(!refs.contains(&"Credentials".to_string()));
    }

    #[test]
    fn test_nested_type_fields_stay_with_nested_type() {
        let source = "class Outer { static class Inner { private Widget w; } }";
        let tree = parse(&JavaGrammar, source);
        let outer = find_named(tree.root_node(), "class_declaration", "Outer", source);
        let body = JavaGrammar.locate_body(outer).unwrap();
        assert!(type_refs(&JavaGrammar, body, source).is_empty());
    }

    #[test]
    fn test_method_signature_references() {
        let tree = parse(&JavaGrammar, SOURCE);
        let login = find_named(tree.root_node(), "method_declaration", "login", SOURCE);
        let refs = type_refs(&JavaGrammar, login, SOURCE);
        assert!(refs.contains(&"Credentials".to_string()));
        assert!(refs.contains(&"AuthError".to_string()));
        assert!(refs.contains(&"User".to_string()));
    }

    #[test]
    fn test_class_relations() {
        let tree = parse(&JavaGrammar, SOURCE);
        let class = find_named(tree.root_node(), "class_declaration", "AuthService", SOURCE);
        let rels = relations(&JavaGrammar, class, SOURCE);

        assert_eq!(
            rels,
            vec![
                ("BaseService".to_string(), DependencyKind::Extends),
                ("Auditable".to_string(), DependencyKind::Implements),
                ("Closeable".to_string(), DependencyKind::Implements),
            ]
        );
    }

    #[test]
    fn test_interface_relations() {
        let tree = parse(&JavaGrammar, SOURCE);
        let iface = find_named(tree.root_node(), "interface_declaration", "Auditable", SOURCE);
        assert_eq!(
            relations(&JavaGrammar, iface, SOURCE),
            vec![
                ("Named".to_string(), DependencyKind::Extends),
                ("Versioned".to_string(), DependencyKind::Extends),
            ]
        );
    }

    #[test]
    fn test_owner_and_signature() {
        let tree = parse(&JavaGrammar, SOURCE);
        let login = find_named(tree.root_node(), "method_declaration", "login", SOURCE);
        let src = SOURCE.as_bytes();
        assert_eq!(JavaGrammar.extract_owner(login, src), Some("AuthService".to_string()));
        assert_eq!(JavaGrammar.extract_params(login, src), vec!["Credentials".to_string()]);
        assert_eq!(JavaGrammar.extract_returns(login, src), vec!["Session".to_string()]);
    }

    #[test]
    fn test_abstract_method_has_no_body() {
        let tree = parse(&JavaGrammar, SOURCE);
        let audit = find_named(tree.root_node(), "method_declaration", "audit", SOURCE);
        assert!(JavaGrammar.locate_body(audit).is_none());
        assert_eq!(
            JavaGrammar.extract_owner(audit, SOURCE.as_bytes()),
            Some("Auditable".to_string())
        );
    }

    #[test]
    fn test_builtins() {
        assert!(JavaGrammar.is_builtin_symbol("System.out.println"));
        assert!(JavaGrammar.is_builtin_symbol("list.stream"));
        assert!(!JavaGrammar.is_builtin_symbol("this.repo.save"));
        assert!(JavaGrammar.is_builtin_type("Optional"));
        assert!(!JavaGrammar.is_builtin_type("Session"));
    }
}
