//! Dependency extraction
//!
//! One pass over the entity list. Each entity is dispatched to the grammar of
//! its language; the grammar finds candidate references and this module
//! filters, deduplicates and resolves them into edges.
//!
//! Unresolved targets are dropped rather than emitted dangling. Edges keep
//! discovery order, so output is stable for a given input.

use std::collections::{HashMap, HashSet};

use tree_sitter::Node;

use crate::error::Result;
use crate::graph::{Dependency, DependencyKind, Entity, EntityKind, Location, SyntaxRef};
use crate::indexer::resolver::{is_qualified, last_component, ResolutionIndex};
use crate::languages::{LanguageGrammar, LanguageRegistry};

/// Entities addressed by the syntax node they were discovered from.
type NodeMap<'a> = HashMap<(&'a str, usize), &'a str>;

pub struct DependencyExtractor {
    registry: LanguageRegistry,
}

impl DependencyExtractor {
    pub fn new(registry: LanguageRegistry) -> Self {
        Self { registry }
    }

    /// Builds the resolution index from `entities` and extracts every edge.
    ///
    /// Fails only on scan-level inconsistencies such as duplicate ids.
    pub fn extract_dependencies(&self, entities: &[Entity<'_>]) -> Result<Vec<Dependency>> {
        let index = ResolutionIndex::build(entities)?;
        Ok(self.extract_with_index(entities, &index))
    }

    /// Extracts edges sourced from `entities`, resolving targets through a
    /// prebuilt `index` that may cover more entities than are passed here.
    pub fn extract_with_index(
        &self,
        entities: &[Entity<'_>],
        index: &ResolutionIndex,
    ) -> Vec<Dependency> {
        let nodes = node_map(entities);
        let mut deps = Vec::new();

        for entity in entities {
            let Some(syntax) = entity.syntax else {
                continue;
            };
            let Some(grammar) = self.registry.get_by_name(&entity.language) else {
                tracing::warn!(
                    "No grammar for language '{}', skipping {}",
                    entity.language,
                    entity.name
                );
                continue;
            };

            let before = deps.len();
            let ctx = EntityContext {
                grammar: grammar.as_ref(),
                entity,
                syntax,
                index,
                nodes: &nodes,
            };
            if entity.kind.is_callable() {
                ctx.extract_callable(&mut deps);
            } else {
                ctx.extract_type(&mut deps);
            }

            tracing::debug!(
                "{} ({}): {} dependencies",
                entity.qualified_name.as_deref().unwrap_or(&entity.name),
                entity.kind,
                deps.len() - before
            );
        }

        deps
    }
}

fn node_map<'a>(entities: &'a [Entity<'_>]) -> NodeMap<'a> {
    entities
        .iter()
        .filter_map(|e| {
            e.node()
                .map(|n| ((e.location.file_path.as_str(), n.id()), e.id.as_str()))
        })
        .collect()
}

struct EntityContext<'a, 't> {
    grammar: &'a dyn LanguageGrammar,
    entity: &'a Entity<'t>,
    syntax: SyntaxRef<'t>,
    index: &'a ResolutionIndex,
    nodes: &'a NodeMap<'a>,
}

impl<'a, 't> EntityContext<'a, 't> {
    fn file(&self) -> &'a str {
        &self.entity.location.file_path
    }

    fn is_entity_node(&self, node: &Node) -> bool {
        self.nodes.contains_key(&(self.file(), node.id()))
    }

    fn extract_callable(&self, deps: &mut Vec<Dependency>) {
        let node = self.syntax.node;

        if let Some(body) = self.grammar.locate_body(node) {
            self.extract_calls(body, deps);
            // parameters, return types, generic arguments, local annotations
            self.extract_type_uses(node, deps);
        } else {
            tracing::trace!("{} has no body", self.entity.name);
        }

        if self.entity.kind == EntityKind::Method {
            self.extract_method_of(deps);
        }
    }

    /// Call and construction sites in `body`. A target text is considered
    /// once per entity; its first occurrence decides `optional`.
    fn extract_calls(&self, body: Node<'t>, deps: &mut Vec<Dependency>) {
        let grammar = self.grammar;
        let source = self.syntax.source;
        let call_kinds = grammar.call_kinds();
        let instantiation_kinds = grammar.instantiation_kinds();
        let body_id = body.id();
        // keyed by kind too: `Foo()` and `new Foo()` are separate candidates
        let mut seen: HashSet<(String, DependencyKind)> = HashSet::new();

        grammar.walk(body, &mut |n: Node<'t>| {
            // Nested declarations are entities of their own.
            if n.id() != body_id && self.is_entity_node(&n) {
                return false;
            }

            let kind = n.kind();
            let (target, dep_kind) = if call_kinds.contains(&kind) {
                (grammar.extract_call_target(n, source), DependencyKind::Calls)
            } else if instantiation_kinds.contains(&kind) {
                (
                    grammar.extract_instantiation_target(n, source),
                    DependencyKind::Instantiates,
                )
            } else {
                return true;
            };

            let Some(target) = target else {
                return true;
            };
            if !seen.insert((target.clone(), dep_kind)) {
                return true;
            }

            let builtin = match dep_kind {
                DependencyKind::Instantiates => grammar.is_builtin_type(&target),
                _ => grammar.is_builtin_symbol(&target),
            };
            if builtin {
                tracing::trace!("Dropping builtin {} in {}", target, self.entity.name);
                return true;
            }

            if let Some(dep) = self.resolve_edge(&target, dep_kind, n) {
                deps.push(dep.with_optional(grammar.is_conditional(n)));
            }
            true
        });
    }

    /// `UsesType` edges for type names under `node`. Never optional.
    fn extract_type_uses(&self, node: Node<'t>, deps: &mut Vec<Dependency>) {
        let mut seen = HashSet::new();
        for reference in self.grammar.extract_type_references(node, self.syntax.source) {
            if !seen.insert(reference.text.clone()) {
                continue;
            }
            if self.grammar.is_builtin_type(&reference.text) {
                tracing::trace!("Dropping builtin type {}", reference.text);
                continue;
            }
            if let Some(dep) =
                self.resolve_edge(&reference.text, DependencyKind::UsesType, reference.node)
            {
                deps.push(dep);
            }
        }
    }

    fn extract_method_of(&self, deps: &mut Vec<Dependency>) {
        let Some(owner) = self
            .grammar
            .extract_owner(self.syntax.node, self.syntax.source)
        else {
            return;
        };
        if let Some(to_id) = self.index.resolve_type(&owner) {
            deps.push(
                Dependency::new(
                    &self.entity.id,
                    last_component(&owner),
                    DependencyKind::MethodOf,
                    self.entity.location.clone(),
                )
                .with_to_id(to_id),
            );
        }
    }

    fn extract_type(&self, deps: &mut Vec<Dependency>) {
        let node = self.syntax.node;

        let mut seen = HashSet::new();
        for relation in self.grammar.extract_relations(node, self.syntax.source) {
            if !seen.insert((relation.text.clone(), relation.kind)) {
                continue;
            }
            if let Some(dep) = self.resolve_edge(&relation.text, relation.kind, relation.node) {
                deps.push(dep);
            }
        }

        if let Some(body) = self.grammar.locate_body(node) {
            self.extract_type_uses(body, deps);
        }

        self.extract_contains(deps);
    }

    /// Links a nested type to the nearest enclosing type entity by node
    /// identity.
    fn extract_contains(&self, deps: &mut Vec<Dependency>) {
        let types = self.grammar.type_declaration_kinds();
        let boundaries = self.grammar.function_boundary_kinds();
        let mut current = self.syntax.node.parent();

        while let Some(parent) = current {
            let kind = parent.kind();
            if boundaries.contains(&kind) {
                return;
            }
            if types.contains(&kind) {
                if let Some(outer_id) = self.nodes.get(&(self.file(), parent.id())) {
                    let mut dep = Dependency::new(
                        *outer_id,
                        &self.entity.name,
                        DependencyKind::Contains,
                        self.entity.location.clone(),
                    )
                    .with_to_id(&self.entity.id);
                    if let Some(ref qualified) = self.entity.qualified_name {
                        dep = dep.with_qualified(qualified);
                    }
                    deps.push(dep);
                    return;
                }
            }
            current = parent.parent();
        }
    }

    fn resolve_edge(&self, target: &str, kind: DependencyKind, site: Node) -> Option<Dependency> {
        // base types only ever name types
        let resolved = match kind {
            DependencyKind::Extends | DependencyKind::Implements => self.index.resolve_type(target),
            _ => self.index.resolve(target),
        };
        let Some(to_id) = resolved else {
            tracing::trace!("Unresolved {} {} in {}", kind, target, self.entity.name);
            return None;
        };

        let mut dep = Dependency::new(
            &self.entity.id,
            last_component(target),
            kind,
            Location::of_node(self.file(), &site),
        )
        .with_to_id(to_id);
        if is_qualified(target) {
            dep = dep.with_qualified(target);
        }
        Some(dep)
    }
}
