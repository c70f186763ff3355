//! Syntax tree helpers shared by every grammar
//!
//! All helpers are total: a missing child, an offset past the end of a
//! truncated source buffer or invalid UTF-8 yields `None`/empty instead of
//! panicking, so partial trees from files with syntax errors stay usable.

use tree_sitter::Node;

/// Returns the source text covered by `node`, or `None` when the node's byte
/// range does not fit inside `source`.
pub fn node_text<'s>(node: &Node, source: &'s [u8]) -> Option<&'s str> {
    let start = node.start_byte();
    let end = node.end_byte();
    if start > end || end > source.len() {
        return None;
    }
    std::str::from_utf8(&source[start..end]).ok()
}

/// Text of the child stored under `field`.
pub fn field_text<'s>(node: &Node, field: &str, source: &'s [u8]) -> Option<&'s str> {
    node.child_by_field_name(field)
        .and_then(|child| node_text(&child, source))
}

/// Depth-first, pre-order traversal with an explicit stack.
///
/// The visitor returns `true` to descend into the node's children. Siblings
/// are visited in source order.
pub fn walk<'t, F>(root: Node<'t>, visitor: &mut F)
where
    F: FnMut(Node<'t>) -> bool + ?Sized,
{
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if !visitor(node) {
            continue;
        }
        let mut cursor = node.walk();
        let children: Vec<Node<'t>> = node.children(&mut cursor).collect();
        stack.extend(children.into_iter().rev());
    }
}

pub fn named_children<'t>(node: &Node<'t>) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor).collect()
}

pub fn children<'t>(node: &Node<'t>) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    node.children(&mut cursor).collect()
}

/// First direct child whose kind is one of `kinds`.
pub fn child_of_kind<'t>(node: &Node<'t>, kinds: &[&str]) -> Option<Node<'t>> {
    let mut cursor = node.walk();
    let found = node
        .children(&mut cursor)
        .find(|child| kinds.contains(&child.kind()));
    found
}

/// Nearest ancestor (excluding `node`) whose kind is one of `kinds`.
pub fn ancestor_of_kind<'t>(node: &Node<'t>, kinds: &[&str]) -> Option<Node<'t>> {
    let mut current = node.parent();
    while let Some(parent) = current {
        if kinds.contains(&parent.kind()) {
            return Some(parent);
        }
        current = parent.parent();
    }
    None
}

pub fn is_comment(node: &Node) -> bool {
    node.kind().contains("comment")
}

/// Collapses every whitespace run to a single space.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Drops generic/template arguments: `List<Foo>` becomes `List`,
/// `Map[str, int]` stays untouched.
pub fn strip_generics(text: &str) -> &str {
    match text.find('<') {
        Some(idx) => text[..idx].trim_end(),
        None => text.trim(),
    }
}
