use std::collections::HashSet;

use once_cell::sync::{Lazy, OnceCell};
use tree_sitter::{Node, Query};

use super::{LanguageGrammar, Reference, Relation};
use crate::graph::DependencyKind;
use crate::indexer::ast;

pub struct PythonGrammar;

static PYTHON_FUNCTIONS_QUERY: OnceCell<Query> = OnceCell::new();
static PYTHON_TYPES_QUERY: OnceCell<Query> = OnceCell::new();

static PYTHON_BUILTIN_SYMBOLS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        // builtins
        "print", "len", "range", "enumerate", "zip", "map", "filter", "sorted", "reversed",
        "isinstance", "issubclass", "hasattr", "getattr", "setattr", "delattr", "open",
        "super", "min", "max", "sum", "any", "all", "abs", "round", "repr", "iter", "next",
        "format", "input", "vars", "dir", "callable", "hash", "id", "divmod", "pow", "__init__",
        // stdlib modules used as qualifiers
        "os", "sys", "json", "re", "math", "time", "datetime", "logging", "typing",
        "collections", "itertools", "functools", "asyncio", "pathlib", "subprocess", "random",
        // common methods
        "append", "extend", "pop", "get", "items", "keys", "values", "update", "setdefault",
        "join", "split", "strip", "lstrip", "rstrip", "startswith", "endswith", "lower",
        "upper", "replace", "encode", "decode", "copy", "add", "remove", "discard", "insert",
        "sort", "index", "count", "clear", "read", "write", "close",
    ]
    .into_iter()
    .collect()
});

static PYTHON_BUILTIN_TYPES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "str", "int", "float", "bool", "bytes", "bytearray", "complex", "list", "dict",
        "set", "frozenset", "tuple", "None", "object", "type", "range", "Any", "Optional",
        "List", "Dict", "Set", "FrozenSet", "Tuple", "Union", "Callable", "Iterable",
        "Iterator", "Sequence", "Mapping", "MutableMapping", "Generator", "AsyncIterator",
        "Awaitable", "Coroutine", "Type", "TypeVar", "Generic", "Protocol", "ClassVar",
        "Final", "Literal", "Self", "Exception", "BaseException", "ValueError", "TypeError",
        "KeyError", "IndexError", "RuntimeError", "AttributeError", "NotImplementedError",
        "OSError", "IOError", "StopIteration", "Enum", "IntEnum", "Path", "datetime",
        "timedelta", "Decimal",
    ]
    .into_iter()
    .collect()
});

impl PythonGrammar {
    fn is_simple_receiver(node: &Node) -> bool {
        match node.kind() {
            "identifier" => true,
            "attribute" => node
                .child_by_field_name("object")
                .map(|o| Self::is_simple_receiver(&o))
                .unwrap_or(false),
            _ => false,
        }
    }

    /// Names inside one annotation (`Optional[models.User]`).
    fn annotation_names<'t>(annotation: Node<'t>, source: &[u8], refs: &mut Vec<Reference<'t>>) {
        ast::walk(annotation, &mut |n: Node<'t>| match n.kind() {
            "attribute" | "member_type" => {
                if let Some(text) = ast::node_text(&n, source) {
                    refs.push(Reference::new(ast::collapse_whitespace(text), n));
                }
                false
            }
            "identifier" => {
                if let Some(text) = ast::node_text(&n, source) {
                    refs.push(Reference::new(text, n));
                }
                false
            }
            // string annotations are forward references and are not parsed
            "string" => false,
            _ => true,
        });
    }
}

impl LanguageGrammar for PythonGrammar {
    fn name(&self) -> &'static str {
        "python"
    }

    fn file_extensions(&self) -> &[&'static str] {
        &["py", "pyi"]
    }

    fn language(&self) -> tree_sitter::Language {
        tree_sitter_python::LANGUAGE.into()
    }

    fn functions_query(&self) -> &str {
        r#"
        (function_definition
            name: (identifier) @name
        ) @function
        "#
    }

    fn types_query(&self) -> &str {
        r#"
        (class_definition
            name: (identifier) @name
        ) @class
        "#
    }

    fn cached_functions_query(&self) -> Option<&'static Query> {
        PYTHON_FUNCTIONS_QUERY
            .get_or_try_init(|| Query::new(&self.language(), self.functions_query()))
            .ok()
    }

    fn cached_types_query(&self) -> Option<&'static Query> {
        PYTHON_TYPES_QUERY
            .get_or_try_init(|| Query::new(&self.language(), self.types_query()))
            .ok()
    }

    fn constructor_name(&self) -> Option<&'static str> {
        Some("__init__")
    }

    fn call_kinds(&self) -> &[&'static str] {
        // `User(name)` constructs through an ordinary call
        &["call"]
    }

    fn conditional_kinds(&self) -> &[&'static str] {
        &[
            "if_statement",
            "elif_clause",
            "else_clause",
            "conditional_expression",
            "match_statement",
            "case_clause",
            "except_clause",
        ]
    }

    fn function_boundary_kinds(&self) -> &[&'static str] {
        &["function_definition", "lambda"]
    }

    fn type_declaration_kinds(&self) -> &[&'static str] {
        &["class_definition"]
    }

    fn type_identifier_kinds(&self) -> &[&'static str] {
        &["type"]
    }

    fn builtin_symbols(&self) -> &HashSet<&'static str> {
        &PYTHON_BUILTIN_SYMBOLS
    }

    fn builtin_types(&self) -> &HashSet<&'static str> {
        &PYTHON_BUILTIN_TYPES
    }

    fn extract_call_target(&self, call: Node, source: &[u8]) -> Option<String> {
        let function = call.child_by_field_name("function")?;
        match function.kind() {
            "identifier" => ast::node_text(&function, source).map(|s| s.to_string()),
            "attribute" => {
                let attr = ast::field_text(&function, "attribute", source)?;
                match function.child_by_field_name("object") {
                    Some(object) if Self::is_simple_receiver(&object) => {
                        let receiver = ast::node_text(&object, source)?;
                        Some(format!("{}.{}", receiver, attr))
                    }
                    _ => Some(attr.to_string()),
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
                return false;
            }
            if kind == "type" {
                Self::annotation_names(n, source, &mut refs);
                return false;
            }
            true
        });

        refs
    }

    fn extract_relations<'t>(&self, type_node: Node<'t>, source: &[u8]) -> Vec<Relation<'t>> {
        let mut relations = Vec::new();
        let Some(bases) = type_node.child_by_field_name("superclasses") else {
            return relations;
        };

        for base in ast::named_children(&bases) {
            let base = match base.kind() {
                // Generic[T], Base[Config]
                "subscript" => match base.child_by_field_name("value") {
                    Some(value) => value,
                    None => continue,
                },
                "identifier" | "attribute" => base,
                // metaclass=..., *mixins
                _ => continue,
            };
            if let Some(text) = ast::node_text(&base, source) {
                relations.push(Relation::new(text, DependencyKind::Extends, base));
            }
        }

        relations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::languages::test_support::*;

    const SOURCE: &str = r#"
class AuthService(BaseService, mixins.Auditable, Generic[T], metaclass=ABCMeta):
    repo: UserRepository
    sessions: Dict[str, Session]

    def __init__(self, repo: UserRepository):
        self.repo = repo

    def login(self, creds: Credentials, retries=3) -> Optional[Session]:
        user = find_user_by_email(creds.email)
        if user.active:
            check_password(user, creds)
        elif user.locked:
            notify_admin(user)
        session = Session(user)
        self.repo.save(session)
        build().finish()
        return session

    class Cache:
        last: Session
"#;

    #[test]
    fn test_call_targets() {
        let tree = parse(&PythonGrammar, SOURCE);
        let login = find_named(tree.root_node(), "function_definition", "login", SOURCE);
        let body = PythonGrammar.locate_body(login).unwrap();
        let targets = call_targets(&PythonGrammar, body, SOURCE);

        assert!(targets.contains(&"find_user_by_email".to_string()));
        assert!(targets.contains(&"check_password".to_string()));
        assert!(targets.contains(&"Session".to_string()));
        assert!(targets.contains(&"self.repo.save".to_string()));
        assert!(targets.contains(&"finish".to_string()));
    }

    #[test]
    fn test_is_conditional() {
        let tree = parse(&PythonGrammar, SOURCE);
        let calls = find_all(tree.root_node(), "call");
        let src = SOURCE.as_bytes();
        let by_name = |name: &str| {
            *calls
                .iter()
                .find(|c| PythonGrammar.extract_call_target(**c, src).as_deref() == Some(name))
                .unwrap()
        };
        assert!(!PythonGrammar.is_conditional(by_name("find_user_by_email")));
        assert!(PythonGrammar.is_conditional(by_name("check_password")));
        assert!(PythonGrammar.is_conditional(by_name("notify_admin")));
        assert!(!PythonGrammar.is_conditional(by_name("Session")));
    }

    #[test]
    fn test_lambda_is_a_boundary() {
        let source = "def f(xs):\n    if xs:\n        sorted(xs, key=lambda x: rank(x))\n";
        let tree = parse(&PythonGrammar, source);
        let calls = find_all(tree.root_node(), "call");
        let src = source.as_bytes();
        let rank = calls
            .iter()
            .find(|c| PythonGrammar.extract_call_target(**c, src).as_deref() == Some("rank"))
            .unwrap();
        assert!(!PythonGrammar.is_conditional(*rank));
    }

    #[test]
    fn test_class_annotation_references() {
        let tree = parse(&PythonGrammar, SOURCE);
        let class = find_named(tree.root_node(), "class_definition", "AuthService", SOURCE);
        let body = PythonGrammar.locate_body(class).unwrap();
        let refs = type_refs(&PythonGrammar, body, SOURCE);

        assert!(refs.contains(&"UserRepository".to_string()));
        assert!(refs.contains(&"Dict".to_string()));
        assert!(refs.contains(&"Session".to_string()));
        // methods and nested classes are their own entities
        assert!(!refs.contains(&"Credentials".to_string()));
        assert_eq!(refs.iter().filter(|r| *r == "Session").count(), 1);
    }

    #[test]
    fn test_signature_references() {
        let tree = parse(&PythonGrammar, SOURCE);
        let login = find_named(tree.root_node(), "function_definition", "login", SOURCE);
        let refs = type_refs(&PythonGrammar, login, SOURCE);
        assert!(refs.contains(&"Credentials".to_string()));
        assert!(refs.contains(&"Optional".to_string()));
        assert!(refs.contains(&"Session".to_string()));
    }

    #[test]
    fn test_relations() {
        let tree = parse(&PythonGrammar, SOURCE);
        let class = find_named(tree.root_node(), "class_definition", "AuthService", SOURCE);
        assert_eq!(
            relations(&PythonGrammar, class, SOURCE),
            vec![
                ("BaseService".to_string(), DependencyKind::Extends),
                ("mixins.Auditable".to_string(), DependencyKind::Extends),
                ("Generic".to_string(), DependencyKind::Extends),
            ]
        );
    }

    #[test]
    fn test_owner_and_signature() {
        let tree = parse(&PythonGrammar, SOURCE);
        let login = find_named(tree.root_node(), "function_definition", "login", SOURCE);
        let src = SOURCE.as_bytes();
        assert_eq!(PythonGrammar.extract_owner(login, src), Some("AuthService".to_string()));
        assert_eq!(
            PythonGrammar.extract_params(login, src),
            vec!["self".to_string(), "Credentials".to_string(), "retries=3".to_string()]
        );
        assert_eq!(
            PythonGrammar.extract_returns(login, src),
            vec!["Optional[Session]".to_string()]
        );
    }

    #[test]
    fn test_nested_function_has_no_owner() {
        let source = "class A:\n    def f(self):\n        def inner():\n            pass\n";
        let tree = parse(&PythonGrammar, source);
        let inner = find_named(tree.root_node(), "function_definition", "inner", source);
        assert_eq!(PythonGrammar.extract_owner(inner, source.as_bytes()), None);
    }

    #[test]
    fn test_builtins() {
        assert!(PythonGrammar.is_builtin_symbol("print"));
        assert!(PythonGrammar.is_builtin_symbol("os.path.join"));
        assert!(PythonGrammar.is_builtin_symbol("items.append"));
        assert!(!PythonGrammar.is_builtin_symbol("self.repo.save"));
        assert!(PythonGrammar.is_builtin_type("Optional"));
        assert!(!PythonGrammar.is_builtin_type("Session"));
    }
}
