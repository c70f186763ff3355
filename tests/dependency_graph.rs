//! Integration tests for dependency extraction.
//!
//! Sources are parsed in memory, entities discovered with the reference
//! extractor, and the graph checked for the properties callers rely on.

use code_depgraph::{
    Dependency, DependencyExtractor, DependencyKind, Entity, EntityExtractor, EntityKind,
    LanguageRegistry, Location, ParsedFile, Parser, ResolutionIndex,
};

fn parse_all(files: &[(&str, &str, &str)]) -> Vec<(String, ParsedFile)> {
    let registry = LanguageRegistry::new();
    let parser = Parser::new(registry.clone());
    files
        .iter()
        .map(|(path, language, source)| {
            let grammar = registry.get_by_name(language).expect("grammar");
            let parsed = parser.parse_source(source, grammar).expect("parse");
            (path.to_string(), parsed)
        })
        .collect()
}

fn discover(parsed: &[(String, ParsedFile)]) -> Vec<Entity<'_>> {
    let extractor = EntityExtractor::new();
    parsed
        .iter()
        .flat_map(|(path, file)| extractor.extract(file, path).expect("extract"))
        .collect()
}

fn extract(entities: &[Entity<'_>]) -> Vec<Dependency> {
    DependencyExtractor::new(LanguageRegistry::new())
        .extract_dependencies(entities)
        .expect("extract dependencies")
}

fn name_of<'a>(entities: &'a [Entity<'_>], id: &str) -> &'a str {
    entities
        .iter()
        .find(|e| e.id == id)
        .map(|e| e.name.as_str())
        .expect("known id")
}

fn kind_of(entities: &[Entity<'_>], id: &str) -> EntityKind {
    entities
        .iter()
        .find(|e| e.id == id)
        .map(|e| e.kind)
        .expect("known id")
}

/// (from, kind, to, optional)
fn summarize(entities: &[Entity<'_>], deps: &[Dependency]) -> Vec<(String, DependencyKind, String, bool)> {
    deps.iter()
        .map(|d| {
            (
                name_of(entities, &d.from_id).to_string(),
                d.kind,
                d.to_name.clone(),
                d.optional,
            )
        })
        .collect()
}

const AUTH_RS: &str = r#"
pub struct User {
    pub admin: bool,
}

pub fn find_user_by_email(email: &str) -> Option<User> {
    None
}

pub fn check_password(user: &User, password: &str) -> bool {
    !password.is_empty()
}

pub fn login(email: &str, password: &str) -> bool {
    let user = find_user_by_email(email);
    check_password(&user, password)
}

pub fn process_admin(user: &User) {}

pub fn process_regular(user: &User) {}

pub fn process_users(user: User) {
    if user.admin {
        process_admin(&user)
    } else {
        process_regular(&user)
    }
}
"#;

mod scenario {
    use super::*;

    #[test]
    fn test_login_calls_are_unconditional() {
        let parsed = parse_all(&[("src/auth.rs", "rust", AUTH_RS)]);
        let entities = discover(&parsed);
        let deps = extract(&entities);
        let edges = summarize(&entities, &deps);

        let login_calls: Vec<_> = edges
            .iter()
            .filter(|(from, kind, _, _)| from == "login" && *kind == DependencyKind::Calls)
            .cloned()
            .collect();
        assert_eq!(
            login_calls,
            vec![
                ("login".to_string(), DependencyKind::Calls, "find_user_by_email".to_string(), false),
                ("login".to_string(), DependencyKind::Calls, "check_password".to_string(), false),
            ]
        );
    }

    #[test]
    fn test_branch_calls_are_optional() {
        let parsed = parse_all(&[("src/auth.rs", "rust", AUTH_RS)]);
        let entities = discover(&parsed);
        let deps = extract(&entities);
        let edges = summarize(&entities, &deps);

        let calls: Vec<_> = edges
            .iter()
            .filter(|(from, kind, _, _)| from == "process_users" && *kind == DependencyKind::Calls)
            .cloned()
            .collect();
        assert_eq!(
            calls,
            vec![
                ("process_users".to_string(), DependencyKind::Calls, "process_admin".to_string(), true),
                ("process_users".to_string(), DependencyKind::Calls, "process_regular".to_string(), true),
            ]
        );
    }

    #[test]
    fn test_signature_types_are_used() {
        let parsed = parse_all(&[("src/auth.rs", "rust", AUTH_RS)]);
        let entities = discover(&parsed);
        let deps = extract(&entities);
        let edges = summarize(&entities, &deps);

        for from in ["find_user_by_email", "check_password", "process_users"] {
            assert!(
                edges.contains(&(from.to_string(), DependencyKind::UsesType, "User".to_string(), false)),
                "{} should use User",
                from
            );
        }
    }
}

mod properties {
    use super::*;

    #[test]
    fn test_every_edge_starts_at_a_known_entity() {
        let parsed = parse_all(&[("src/auth.rs", "rust", AUTH_RS)]);
        let entities = discover(&parsed);
        let deps = extract(&entities);

        assert!(!deps.is_empty());
        for dep in &deps {
            assert!(entities.iter().any(|e| e.id == dep.from_id), "{:?}", dep);
        }
    }

    #[test]
    fn test_calls_and_type_uses_round_trip_through_the_index() {
        let parsed = parse_all(&[
            ("src/auth.rs", "rust", AUTH_RS),
            (
                "svc/users.go",
                "go",
                "package svc\ntype Store struct{}\nfunc (s *Store) Load() {}\nfunc Run(s *Store) { s.Load() }\n",
            ),
        ]);
        let entities = discover(&parsed);
        let index = ResolutionIndex::build(&entities).unwrap();
        let deps = DependencyExtractor::new(LanguageRegistry::new()).extract_with_index(&entities, &index);

        let checked: Vec<_> = deps
            .iter()
            .filter(|d| matches!(d.kind, DependencyKind::Calls | DependencyKind::UsesType))
            .collect();
        assert!(checked.len() >= 6);
        for dep in checked {
            let to_id = dep.to_id.as_deref().expect("resolved edge");
            assert_eq!(index.resolve(dep.target_text()), Some(to_id), "{:?}", dep);
        }
    }

    #[test]
    fn test_extraction_is_deterministic() {
        let parsed = parse_all(&[
            ("src/auth.rs", "rust", AUTH_RS),
            ("web/api.ts", "typescript", "class Api { get() { return fetchAll(); } }\nfunction fetchAll() {}\n"),
        ]);
        let entities = discover(&parsed);

        let first = extract(&entities);
        let second = extract(&entities);
        assert_eq!(first, second);

        let reparsed = parse_all(&[
            ("src/auth.rs", "rust", AUTH_RS),
            ("web/api.ts", "typescript", "class Api { get() { return fetchAll(); } }\nfunction fetchAll() {}\n"),
        ]);
        let rediscovered = discover(&reparsed);
        assert_eq!(first, extract(&rediscovered));
    }

    #[test]
    fn test_entities_without_syntax_source_no_edges() {
        let parsed = parse_all(&[("src/auth.rs", "rust", AUTH_RS)]);
        let mut entities = discover(&parsed);
        let login = entities.iter().position(|e| e.name == "login").unwrap();
        entities[login].syntax = None;
        let login_id = entities[login].id.clone();

        let deps = extract(&entities);
        assert!(deps.iter().all(|d| d.from_id != login_id));
        // other entities are unaffected
        assert!(deps.iter().any(|d| d.kind == DependencyKind::UsesType));
    }

    #[test]
    fn test_first_occurrence_decides_optional() {
        let source = r#"package svc
func notify() {}
func onSave(ok bool) {
	if ok {
		notify()
	}
	notify()
}
func onDelete(ok bool) {
	notify()
	if ok {
		notify()
	}
}
"#;
        let parsed = parse_all(&[("svc/events.go", "go", source)]);
        let entities = discover(&parsed);
        let edges = summarize(&entities, &extract(&entities));

        assert_eq!(
            edges,
            vec![
                ("onSave".to_string(), DependencyKind::Calls, "notify".to_string(), true),
                ("onDelete".to_string(), DependencyKind::Calls, "notify".to_string(), false),
            ]
        );
    }

    #[test]
    fn test_builtin_filter_is_name_based() {
        // A user type named like a builtin is still suppressed.
        let source = r#"
pub struct String { raw: Vec<u8> }
pub struct Name { value: String }
pub fn wrap(s: String) -> String { s }
"#;
        let parsed = parse_all(&[("src/text.rs", "rust", source)]);
        let entities = discover(&parsed);
        assert!(entities.iter().any(|e| e.name == "String" && e.kind == EntityKind::Struct));

        let deps = extract(&entities);
        assert!(deps.iter().all(|d| d.to_name != "String"), "{:?}", deps);
    }

    #[test]
    fn test_unresolved_references_are_dropped() {
        let source = "def handler(request):\n    validate(request)\n    external.client.send(request)\n";
        let parsed = parse_all(&[("app/views.py", "python", source)]);
        let entities = discover(&parsed);
        assert!(extract(&entities).is_empty());
    }

    #[test]
    fn test_name_collisions_resolve_to_the_later_entity() {
        let parsed = parse_all(&[
            ("a/first.py", "python", "def save():\n    pass\n"),
            ("b/second.py", "python", "def save():\n    pass\n\ndef run():\n    save()\n"),
            ("c/third.py", "python", "def save():\n    pass\n"),
        ]);
        let entities = discover(&parsed);
        let deps = extract(&entities);

        assert_eq!(deps.len(), 1);
        let target = entities
            .iter()
            .find(|e| Some(e.id.as_str()) == deps[0].to_id.as_deref())
            .unwrap();
        assert_eq!(target.location.file_path, "c/third.py");
    }
}

mod languages {
    use super::*;

    fn has(edges: &[(String, DependencyKind, String, bool)], from: &str, kind: DependencyKind, to: &str) -> bool {
        edges.iter().any(|(f, k, t, _)| f == from && *k == kind && t == to)
    }

    #[test]
    fn test_java_graph() {
        let source = r#"
public interface Repository { void save(User user); }
public class User {}
public class BaseService {}
public class UserService extends BaseService implements Repository {
    private final Validator validator = new Validator();

    public void save(User user) {
        if (user != null) {
            validator.check(user);
        }
    }

    static class Validator {
        void check(User user) {}
    }
}
"#;
        let parsed = parse_all(&[("src/UserService.java", "java", source)]);
        let entities = discover(&parsed);
        let edges = summarize(&entities, &extract(&entities));

        assert!(has(&edges, "UserService", DependencyKind::Extends, "BaseService"));
        assert!(has(&edges, "UserService", DependencyKind::Implements, "Repository"));
        assert!(has(&edges, "UserService", DependencyKind::UsesType, "Validator"));
        assert!(has(&edges, "UserService", DependencyKind::Contains, "Validator"));
        assert!(has(&edges, "check", DependencyKind::MethodOf, "Validator"));
        assert!(edges.contains(&(
            "save".to_string(),
            DependencyKind::Calls,
            "check".to_string(),
            true
        )));
    }

    #[test]
    fn test_typescript_graph() {
        let source = r#"
interface Auditable { audit(): void; }
class Logger {}
class Service implements Auditable {
    audit(): void {
        const logger = new Logger();
        record(logger);
    }
}
function record(logger: Logger): void {}
"#;
        let parsed = parse_all(&[("src/service.ts", "typescript", source)]);
        let entities = discover(&parsed);
        let edges = summarize(&entities, &extract(&entities));

        assert!(has(&edges, "Service", DependencyKind::Implements, "Auditable"));
        assert!(has(&edges, "audit", DependencyKind::Instantiates, "Logger"));
        assert!(has(&edges, "audit", DependencyKind::Calls, "record"));
        assert!(has(&edges, "audit", DependencyKind::MethodOf, "Service"));
        assert!(has(&edges, "record", DependencyKind::UsesType, "Logger"));
    }

    #[test]
    fn test_csharp_interface_convention() {
        let source = r#"
public interface IAuditable {}
public class BaseService {}
public class AuthService : BaseService, IAuditable {
    public AuthService() { Init(); }
    private void Init() {}
}
"#;
        let parsed = parse_all(&[("Auth.cs", "csharp", source)]);
        let entities = discover(&parsed);
        let edges = summarize(&entities, &extract(&entities));

        assert!(has(&edges, "AuthService", DependencyKind::Extends, "BaseService"));
        assert!(has(&edges, "AuthService", DependencyKind::Implements, "IAuditable"));
        assert!(has(&edges, "AuthService", DependencyKind::Calls, "Init"));
        let ctor = entities
            .iter()
            .find(|e| e.kind == EntityKind::Constructor)
            .unwrap();
        assert_eq!(ctor.name, "AuthService");

        let deps = extract(&entities);
        let method_of = deps
            .iter()
            .find(|d| d.kind == DependencyKind::MethodOf)
            .unwrap();
        assert_eq!(name_of(&entities, &method_of.from_id), "Init");
        assert_eq!(kind_of(&entities, method_of.to_id.as_deref().unwrap()), EntityKind::Class);
    }

    /// (from, kind, kind of the target entity) for edges into `to`.
    fn edges_into(language: &str, path: &str, source: &str, to: &str) -> Vec<(String, DependencyKind, EntityKind)> {
        let parsed = parse_all(&[(path, language, source)]);
        let entities = discover(&parsed);
        extract(&entities)
            .iter()
            .filter(|d| d.to_name == to)
            .map(|d| {
                (
                    name_of(&entities, &d.from_id).to_string(),
                    d.kind,
                    kind_of(&entities, d.to_id.as_deref().unwrap()),
                )
            })
            .collect()
    }

    #[test]
    fn test_java_constructor_does_not_shadow_its_class() {
        let source = r#"
class Service {
    Service() {}
    void run() {}
}
class Child extends Service {
    Service f;
}
"#;
        let edges = edges_into("java", "Service.java", source, "Service");
        assert!(edges.contains(&("run".to_string(), DependencyKind::MethodOf, EntityKind::Class)));
        assert!(edges.contains(&("Child".to_string(), DependencyKind::Extends, EntityKind::Class)));
        assert!(edges.contains(&("Child".to_string(), DependencyKind::UsesType, EntityKind::Class)));
        assert!(edges.iter().all(|(_, _, kind)| *kind == EntityKind::Class));
    }

    #[test]
    fn test_csharp_constructor_does_not_shadow_its_class() {
        let source = r#"
public class Service {
    public Service() {}
    public void Run() {}
}
public class Child : Service {
    private Service f;
}
"#;
        let edges = edges_into("csharp", "Service.cs", source, "Service");
        assert!(edges.contains(&("Run".to_string(), DependencyKind::MethodOf, EntityKind::Class)));
        assert!(edges.contains(&("Child".to_string(), DependencyKind::Extends, EntityKind::Class)));
        assert!(edges.contains(&("Child".to_string(), DependencyKind::UsesType, EntityKind::Class)));
        assert!(edges.iter().all(|(_, _, kind)| *kind == EntityKind::Class));
    }

    #[test]
    fn test_kotlin_construction_is_a_call() {
        let source = r#"
open class Base
interface Named
class Account(val id: Long) : Base(), Named
fun openAccount(): Account = Account(1)
"#;
        let parsed = parse_all(&[("Account.kt", "kotlin", source)]);
        let entities = discover(&parsed);
        let edges = summarize(&entities, &extract(&entities));

        assert!(has(&edges, "Account", DependencyKind::Extends, "Base"));
        assert!(has(&edges, "Account", DependencyKind::Implements, "Named"));
        assert!(has(&edges, "openAccount", DependencyKind::Calls, "Account"));
        assert!(!edges.iter().any(|(_, k, _, _)| *k == DependencyKind::Instantiates));
    }

    #[test]
    fn test_cpp_graph() {
        let source = r#"
class Engine {};
class Car : public Engine {
public:
    void start();
};
void ignite(Engine* e) {}
void Car::start() {
    Engine* e = new Engine();
    ignite(e);
}
"#;
        let parsed = parse_all(&[("car.cpp", "cpp", source)]);
        let entities = discover(&parsed);
        let edges = summarize(&entities, &extract(&entities));

        assert!(has(&edges, "Car", DependencyKind::Extends, "Engine"));
        assert!(has(&edges, "start", DependencyKind::Instantiates, "Engine"));
        assert!(has(&edges, "start", DependencyKind::Calls, "ignite"));
        assert!(has(&edges, "start", DependencyKind::MethodOf, "Car"));
        assert!(has(&edges, "ignite", DependencyKind::UsesType, "Engine"));
    }

    #[test]
    fn test_go_embedding_and_method_of() {
        let source = r#"package svc
type Base struct{}
type Service struct {
	Base
	name string
}
func (s *Service) Start() {}
"#;
        let parsed = parse_all(&[("svc.go", "go", source)]);
        let entities = discover(&parsed);
        let edges = summarize(&entities, &extract(&entities));

        assert!(has(&edges, "Service", DependencyKind::Extends, "Base"));
        assert!(has(&edges, "Start", DependencyKind::MethodOf, "Service"));
    }

    #[test]
    fn test_call_location_points_at_the_site() {
        let parsed = parse_all(&[("src/auth.rs", "rust", AUTH_RS)]);
        let entities = discover(&parsed);
        let deps = extract(&entities);

        let call = deps
            .iter()
            .find(|d| d.to_name == "check_password")
            .unwrap();
        assert_eq!(call.location, Location::new("src/auth.rs", 16));
    }
}
