//! Staleness fingerprints
//!
//! Short structural hashes that tell whether an entity's signature, body or
//! both changed between two scans. A hash is the first four bytes of SHA-256
//! as eight lowercase hex characters: a change detector, not an integrity
//! check.

use std::fmt::{self, Write};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tree_sitter::Node;

use crate::graph::Entity;
use crate::indexer::ast;
use crate::languages::LanguageRegistry;

/// Body hash of entities that have no body.
pub const EMPTY_HASH: &str = "00000000";

const PAIR_SEPARATOR: char = ':';

fn short_hash(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let mut out = String::with_capacity(8);
    for b in &digest[..4] {
        let _ = write!(out, "{b:02x}");
    }
    out
}

pub fn compute_file_hash(bytes: &[u8]) -> String {
    short_hash(bytes)
}

/// Hash of an entity's public contract. Whitespace inside each component is
/// collapsed first, so reformatting a signature does not change it.
pub fn compute_signature_hash(
    name: &str,
    params: &[String],
    returns: &[String],
    receiver: Option<&str>,
) -> String {
    let join = |parts: &[String]| {
        parts
            .iter()
            .map(|p| ast::collapse_whitespace(p))
            .collect::<Vec<_>>()
            .join(",")
    };
    let normalized = format!(
        "{}|{}|({})|{}|{}",
        ast::collapse_whitespace(receiver.unwrap_or("")),
        ast::collapse_whitespace(name),
        join(params),
        join(returns),
        params.len()
    );
    short_hash(normalized.as_bytes())
}

/// Pre-order rendering of a subtree: `kind(` then leaf text or children then
/// `)`. Comments contribute nothing, so layout and comment edits leave the
/// result unchanged.
pub fn normalize_ast(root: Node, source: &[u8]) -> String {
    enum Step<'t> {
        Enter(Node<'t>),
        Exit,
    }

    let mut out = String::new();
    let mut stack = vec![Step::Enter(root)];

    while let Some(step) = stack.pop() {
        let node = match step {
            Step::Exit => {
                out.push(')');
                continue;
            }
            Step::Enter(node) => node,
        };
        if ast::is_comment(&node) {
            continue;
        }

        out.push_str(node.kind());
        out.push('(');
        if node.child_count() == 0 {
            if let Some(text) = ast::node_text(&node, source) {
                out.push_str(text);
            }
        }
        stack.push(Step::Exit);
        for child in ast::children(&node).into_iter().rev() {
            stack.push(Step::Enter(child));
        }
    }

    out
}

/// Hash of a body subtree, or [`EMPTY_HASH`] when there is no body.
pub fn compute_body_hash(body: Option<Node>, source: &[u8]) -> String {
    match body {
        Some(node) => short_hash(normalize_ast(node, source).as_bytes()),
        None => EMPTY_HASH.to_string(),
    }
}

pub fn is_empty_hash(hash: &str) -> bool {
    hash == EMPTY_HASH
}

pub fn format_hash_pair(signature: &str, body: &str) -> String {
    format!("{}{}{}", signature, PAIR_SEPARATOR, body)
}

/// Splits `sig:body`. `None` when the separator is missing.
pub fn parse_hash_pair(pair: &str) -> Option<(&str, &str)> {
    pair.split_once(PAIR_SEPARATOR)
}

/// `(signature_changed, body_changed)`. A pair that cannot be parsed reports
/// both as changed.
pub fn compare_hashes(old: &str, new: &str) -> (bool, bool) {
    match (parse_hash_pair(old), parse_hash_pair(new)) {
        (Some((old_sig, old_body)), Some((new_sig, new_body))) => {
            (old_sig != new_sig, old_body != new_body)
        }
        _ => (true, true),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Unchanged,
    SignatureOnly,
    BodyOnly,
    Both,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Unchanged => "unchanged",
            ChangeKind::SignatureOnly => "signature_only",
            ChangeKind::BodyOnly => "body_only",
            ChangeKind::Both => "both",
        }
    }

    pub fn needs_reanalysis(&self) -> bool {
        *self != ChangeKind::Unchanged
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn classify_change(old: &str, new: &str) -> ChangeKind {
    match compare_hashes(old, new) {
        (false, false) => ChangeKind::Unchanged,
        (true, false) => ChangeKind::SignatureOnly,
        (false, true) => ChangeKind::BodyOnly,
        (true, true) => ChangeKind::Both,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityFingerprint {
    pub signature_hash: String,
    pub body_hash: String,
}

impl EntityFingerprint {
    /// Fingerprint of `entity`. The body is located through the entity's
    /// grammar; entities without syntax or without a body get [`EMPTY_HASH`].
    pub fn for_entity(entity: &Entity<'_>, registry: &LanguageRegistry) -> Self {
        let signature_hash = compute_signature_hash(
            &entity.name,
            &entity.params,
            &entity.returns,
            entity.receiver.as_deref(),
        );

        let body_hash = match (entity.syntax, registry.get_by_name(&entity.language)) {
            (Some(syntax), Some(grammar)) => {
                compute_body_hash(grammar.locate_body(syntax.node), syntax.source)
            }
            _ => EMPTY_HASH.to_string(),
        };

        Self {
            signature_hash,
            body_hash,
        }
    }

    pub fn pair(&self) -> String {
        format_hash_pair(&self.signature_hash, &self.body_hash)
    }

    pub fn has_body(&self) -> bool {
        !is_empty_hash(&self.body_hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::languages::test_support::{find, parse};

    fn body_hash(language: &str, source: &str) -> String {
        let registry = LanguageRegistry::new();
        let grammar = registry.get_by_name(language).unwrap();
        let tree = parse(grammar.as_ref(), source);
        let kind = match language {
            "python" => "function_definition",
            "java" => "method_declaration",
            _ => "function_item",
        };
        let function = find(tree.root_node(), kind);
        compute_body_hash(grammar.locate_body(function), source.as_bytes())
    }

    #[test]
    fn test_hash_shape() {
        let hash = compute_file_hash(b"fn main() {}");
        assert_eq!(hash.len(), 8);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_file_hash_known_value() {
        // sha256("") = e3b0c442...
        assert_eq!(compute_file_hash(b""), "e3b0c442");
    }

    #[test]
    fn test_body_hash_ignores_whitespace_and_comments() {
        let original = "fn run() { let total = a + b; save(total); }";
        let reflowed = "fn run() {\n    // sum first\n    let total = a + b;\n\n    /* then persist */\n    save(total);\n}";
        assert_eq!(body_hash("rust", original), body_hash("rust", reflowed));
    }

    #[test]
    fn test_body_hash_sensitive_to_tokens() {
        let original = body_hash("rust", "fn run() { save(1); }");
        assert_ne!(original, body_hash("rust", "fn run() { save(2); }"));
        assert_ne!(original, body_hash("rust", "fn run() { store(1); }"));
        assert_ne!(
            body_hash("rust", "fn run() { let x = a + b; }"),
            body_hash("rust", "fn run() { let x = a - b; }")
        );
    }

    #[test]
    fn test_body_hash_python_comment_invariance() {
        let a = "def run():\n    x = load()\n    return x\n";
        let b = "def run():\n    # load it\n    x = load()  # trailing\n    return x\n";
        assert_eq!(body_hash("python", a), body_hash("python", b));
    }

    #[test]
    fn test_missing_body_is_empty_hash() {
        let hash = body_hash("java", "interface Repo { void save(); }");
        assert!(is_empty_hash(&hash));
        assert!(!is_empty_hash(&body_hash("rust", "fn run() { go(); }")));
    }

    #[test]
    fn test_normalize_ast_shape() {
        let source = "fn f() { g(); }";
        let registry = LanguageRegistry::new();
        let grammar = registry.get_by_name("rust").unwrap();
        let tree = parse(grammar.as_ref(), source);
        let call = find(tree.root_node(), "call_expression");
        assert_eq!(
            normalize_ast(call, source.as_bytes()),
            "call_expression(identifier(g)arguments(((())())))"
        );
    }

    #[test]
    fn test_signature_hash_whitespace_insensitive() {
        let a = compute_signature_hash(
            "find",
            &["Map<String, User>".to_string()],
            &["Option<User>".to_string()],
            None,
        );
        let b = compute_signature_hash(
            "find",
            &["Map<String,  User>".to_string()],
            &["Option<User>".to_string()],
            None,
        );
        assert_eq!(a, b);
    }

    #[test]
    fn test_signature_hash_detects_changes() {
        let base = compute_signature_hash("save", &["User".to_string()], &[], None);
        assert_ne!(base, compute_signature_hash("store", &["User".to_string()], &[], None));
        assert_ne!(base, compute_signature_hash("save", &["Account".to_string()], &[], None));
        assert_ne!(
            base,
            compute_signature_hash("save", &["User".to_string()], &["bool".to_string()], None)
        );
        assert_ne!(
            base,
            compute_signature_hash("save", &["User".to_string()], &[], Some("*Repo"))
        );
    }

    #[test]
    fn test_hash_pair_round_trip() {
        let pair = format_hash_pair("aaaaaaaa", "bbbbbbbb");
        assert_eq!(pair, "aaaaaaaa:bbbbbbbb");
        assert_eq!(parse_hash_pair(&pair), Some(("aaaaaaaa", "bbbbbbbb")));
        assert_eq!(parse_hash_pair("malformed"), None);
    }

    #[test]
    fn test_compare_hashes() {
        assert_eq!(compare_hashes("aaaaaaaa:bbbbbbbb", "aaaaaaaa:cccccccc"), (false, true));
        assert_eq!(compare_hashes("aaaaaaaa:bbbbbbbb", "dddddddd:bbbbbbbb"), (true, false));
        assert_eq!(compare_hashes("aaaaaaaa:bbbbbbbb", "aaaaaaaa:bbbbbbbb"), (false, false));
        assert_eq!(compare_hashes("malformed", "aaaaaaaa:bbbbbbbb"), (true, true));
        assert_eq!(compare_hashes("aaaaaaaa:bbbbbbbb", ""), (true, true));
    }

    #[test]
    fn test_classify_change() {
        assert_eq!(classify_change("a:b", "a:b"), ChangeKind::Unchanged);
        assert_eq!(classify_change("a:b", "x:b"), ChangeKind::SignatureOnly);
        assert_eq!(classify_change("a:b", "a:x"), ChangeKind::BodyOnly);
        assert_eq!(classify_change("a:b", "x:y"), ChangeKind::Both);
        assert_eq!(classify_change("broken", "a:b"), ChangeKind::Both);
        assert!(!ChangeKind::Unchanged.needs_reanalysis());
        assert_eq!(ChangeKind::SignatureOnly.to_string(), "signature_only");
    }
}
