use std::fmt;

use serde::{Deserialize, Serialize};
use tree_sitter::Node;

// =====================================================
// Entity Models
// =====================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Function,
    Method,
    Constructor,
    Struct,
    Class,
    Interface,
    Trait,
    Enum,
    TypeAlias,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Function => "function",
            EntityKind::Method => "method",
            EntityKind::Constructor => "constructor",
            EntityKind::Struct => "struct",
            EntityKind::Class => "class",
            EntityKind::Interface => "interface",
            EntityKind::Trait => "trait",
            EntityKind::Enum => "enum",
            EntityKind::TypeAlias => "type_alias",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "function" => Some(EntityKind::Function),
            "method" => Some(EntityKind::Method),
            "constructor" => Some(EntityKind::Constructor),
            "struct" => Some(EntityKind::Struct),
            "class" => Some(EntityKind::Class),
            "interface" => Some(EntityKind::Interface),
            "trait" => Some(EntityKind::Trait),
            "enum" => Some(EntityKind::Enum),
            "type_alias" => Some(EntityKind::TypeAlias),
            _ => None,
        }
    }

    /// Kinds whose node carries an executable body.
    pub fn is_callable(&self) -> bool {
        matches!(
            self,
            EntityKind::Function | EntityKind::Method | EntityKind::Constructor
        )
    }

    /// Kinds whose node declares fields, members or base types.
    pub fn is_type(&self) -> bool {
        !self.is_callable()
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A `file:line` position. Lines are 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    pub file_path: String,
    pub line: u32,
}

impl Location {
    pub fn new(file_path: impl Into<String>, line: u32) -> Self {
        Self {
            file_path: file_path.into(),
            line,
        }
    }

    /// Location of a syntax node's first row.
    pub fn of_node(file_path: &str, node: &Node) -> Self {
        Self::new(file_path, node.start_position().row as u32 + 1)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file_path, self.line)
    }
}

/// Borrowed handle into a parsed tree plus the bytes it was parsed from.
///
/// Both halves borrow from the `ParsedFile` that owns the tree, so the handle
/// cannot outlive the scan that produced it.
#[derive(Debug, Clone, Copy)]
pub struct SyntaxRef<'tree> {
    pub node: Node<'tree>,
    pub source: &'tree [u8],
}

impl<'tree> SyntaxRef<'tree> {
    pub fn new(node: Node<'tree>, source: &'tree [u8]) -> Self {
        Self { node, source }
    }
}

/// A discovered code construct.
#[derive(Debug, Clone, Serialize)]
pub struct Entity<'tree> {
    pub id: String,
    pub name: String,
    pub qualified_name: Option<String>,
    pub kind: EntityKind,
    pub language: String,
    pub location: Location,
    /// Parameter types in declaration order, used for the signature hash.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub returns: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receiver: Option<String>,
    #[serde(skip)]
    pub syntax: Option<SyntaxRef<'tree>>,
}

impl<'tree> Entity<'tree> {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        kind: EntityKind,
        language: impl Into<String>,
        location: Location,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            qualified_name: None,
            kind,
            language: language.into(),
            location,
            params: Vec::new(),
            returns: Vec::new(),
            receiver: None,
            syntax: None,
        }
    }

    pub fn with_qualified_name(mut self, qualified_name: impl Into<String>) -> Self {
        self.qualified_name = Some(qualified_name.into());
        self
    }

    pub fn with_syntax(mut self, node: Node<'tree>, source: &'tree [u8]) -> Self {
        self.syntax = Some(SyntaxRef::new(node, source));
        self
    }

    pub fn with_params(mut self, params: Vec<String>) -> Self {
        self.params = params;
        self
    }

    pub fn with_returns(mut self, returns: Vec<String>) -> Self {
        self.returns = returns;
        self
    }

    pub fn with_receiver(mut self, receiver: impl Into<String>) -> Self {
        self.receiver = Some(receiver.into());
        self
    }

    pub fn node(&self) -> Option<Node<'tree>> {
        self.syntax.map(|s| s.node)
    }
}

// =====================================================
// Dependency Models
// =====================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DependencyKind {
    Calls,
    UsesType,
    Implements,
    Extends,
    MethodOf,
    Contains,
    Instantiates,
}

impl DependencyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DependencyKind::Calls => "calls",
            DependencyKind::UsesType => "uses_type",
            DependencyKind::Implements => "implements",
            DependencyKind::Extends => "extends",
            DependencyKind::MethodOf => "method_of",
            DependencyKind::Contains => "contains",
            DependencyKind::Instantiates => "instantiates",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "calls" => Some(DependencyKind::Calls),
            "uses_type" => Some(DependencyKind::UsesType),
            "implements" => Some(DependencyKind::Implements),
            "extends" => Some(DependencyKind::Extends),
            "method_of" => Some(DependencyKind::MethodOf),
            "contains" => Some(DependencyKind::Contains),
            "instantiates" => Some(DependencyKind::Instantiates),
            _ => None,
        }
    }
}

impl fmt::Display for DependencyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A directed edge between two entities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub from_id: String,
    /// Resolved target. Extraction never returns an edge without one.
    pub to_id: Option<String>,
    /// Final component of the reference text.
    pub to_name: String,
    /// Full reference text when it carried a scope (`recv.method`, `mod::f`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_qualified: Option<String>,
    pub kind: DependencyKind,
    /// Reached only through a conditional construct.
    pub optional: bool,
    pub location: Location,
}

impl Dependency {
    pub fn new(
        from_id: impl Into<String>,
        to_name: impl Into<String>,
        kind: DependencyKind,
        location: Location,
    ) -> Self {
        Self {
            from_id: from_id.into(),
            to_id: None,
            to_name: to_name.into(),
            to_qualified: None,
            kind,
            optional: false,
            location,
        }
    }

    pub fn with_to_id(mut self, id: impl Into<String>) -> Self {
        self.to_id = Some(id.into());
        self
    }

    pub fn with_qualified(mut self, qualified: impl Into<String>) -> Self {
        self.to_qualified = Some(qualified.into());
        self
    }

    pub fn with_optional(mut self, optional: bool) -> Self {
        self.optional = optional;
        self
    }

    /// The text the edge was resolved from.
    pub fn target_text(&self) -> &str {
        self.to_qualified.as_deref().unwrap_or(&self.to_name)
    }
}
