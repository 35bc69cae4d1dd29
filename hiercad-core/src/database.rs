use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use slotmap::{new_key_type, SlotMap};

use crate::error::{LayoutError, LayoutResult};
use crate::node::{Node, NodeBuilder};
use crate::reference::{Reference, Target};

// Generation-checked keys: a key to a removed entry never resolves to a newer one.
new_key_type! {
    /// Key of a [Node] in a [Layout]
    pub struct NodeKey;
    /// Key of a shared, stackable [Reference] in a [Layout]
    pub struct RefKey;
}

/// Arena owning every Node and every shared Reference of a design.
///
/// Keys are only handed out for values already inserted, and inserted values never change,
/// so the reference graph cannot contain cycles. [Layout::from_json] checks the same
/// property on loaded data.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Layout {
    /// Design name.
    pub name: String,
    nodes: SlotMap<NodeKey, Node>,
    references: SlotMap<RefKey, Reference>,
}

impl Layout {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    // ── Nodes ────────────────────────────────────────────────────────

    /// Finish `builder` and store the node. Every child must point at a live target.
    pub fn add_node(&mut self, builder: NodeBuilder) -> LayoutResult<NodeKey> {
        for (name, child) in builder.children() {
            if !self.contains(child.target()) {
                return Err(LayoutError::InvalidChild {
                    name: name.to_string(),
                    reason: "target is not in this layout".into(),
                });
            }
        }
        let node = builder.build();
        log::debug!(
            "Adding node '{}' ({} polygons, {} children)",
            node.name(),
            node.polygon_count(),
            node.child_count()
        );
        Ok(self.nodes.insert(node))
    }

    pub fn node(&self, key: NodeKey) -> LayoutResult<&Node> {
        self.nodes.get(key).ok_or(LayoutError::StaleKey("node"))
    }

    /// Release a node. References still pointing at it fail with [LayoutError::StaleKey].
    pub fn remove_node(&mut self, key: NodeKey) -> Option<Node> {
        self.nodes.remove(key)
    }

    pub fn find_node_by_name(&self, name: &str) -> Option<(NodeKey, &Node)> {
        self.nodes.iter().find(|(_, n)| n.name() == name)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeKey, &Node)> {
        self.nodes.iter()
    }

    /// Identity-transform Reference to an existing node.
    pub fn wrap(&self, key: NodeKey) -> LayoutResult<Reference> {
        self.node(key)?;
        Ok(Reference::wrap(key))
    }

    // ── Shared References ────────────────────────────────────────────

    /// Store a Reference so that other References can stack on top of it.
    pub fn add_reference(&mut self, reference: Reference) -> LayoutResult<RefKey> {
        if !self.contains(reference.target()) {
            return Err(LayoutError::StaleKey(match reference.target() {
                Target::Node(_) => "node",
                Target::Reference(_) => "reference",
            }));
        }
        Ok(self.references.insert(reference))
    }

    pub fn reference(&self, key: RefKey) -> LayoutResult<&Reference> {
        self.references
            .get(key)
            .ok_or(LayoutError::StaleKey("reference"))
    }

    pub fn reference_count(&self) -> usize {
        self.references.len()
    }

    pub fn contains(&self, target: Target) -> bool {
        match target {
            Target::Node(key) => self.nodes.contains_key(key),
            Target::Reference(key) => self.references.contains_key(key),
        }
    }

    // ── Serialization ────────────────────────────────────────────────

    pub fn to_json(&self) -> LayoutResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load a layout, rejecting dangling targets and reference cycles.
    pub fn from_json(json: &str) -> LayoutResult<Self> {
        let layout: Self = serde_json::from_str(json)?;
        layout.validate()?;
        Ok(layout)
    }

    /// Iterative depth-first walk over every Node and shared Reference.
    fn validate(&self) -> LayoutResult<()> {
        let mut visits: HashMap<Target, Visit> = HashMap::new();
        let roots = self
            .nodes
            .keys()
            .map(Target::Node)
            .chain(self.references.keys().map(Target::Reference));

        for root in roots {
            if visits.contains_key(&root) {
                continue;
            }
            visits.insert(root, Visit::Open);
            let mut stack = vec![(root, self.successors(root)?, 0usize)];
            loop {
                let Some((vertex, successors, next)) = stack.last_mut() else {
                    break;
                };
                let vertex = *vertex;
                let successor = successors.get(*next).copied();
                *next += 1;
                match successor {
                    None => {
                        visits.insert(vertex, Visit::Done);
                        stack.pop();
                    }
                    Some(target) => match visits.get(&target) {
                        Some(Visit::Open) => return Err(LayoutError::Cycle(self.describe(target))),
                        Some(Visit::Done) => {}
                        None => {
                            visits.insert(target, Visit::Open);
                            stack.push((target, self.successors(target)?, 0));
                        }
                    },
                }
            }
        }
        log::debug!(
            "Validated '{}': {} nodes, {} shared references",
            self.name,
            self.node_count(),
            self.reference_count()
        );
        Ok(())
    }

    fn successors(&self, target: Target) -> LayoutResult<Vec<Target>> {
        let targets: Vec<Target> = match target {
            Target::Node(key) => self.node(key)?.children().map(|(_, r)| r.target()).collect(),
            Target::Reference(key) => vec![self.reference(key)?.target()],
        };
        for t in &targets {
            if !self.contains(*t) {
                return Err(LayoutError::StaleKey(match t {
                    Target::Node(_) => "node",
                    Target::Reference(_) => "reference",
                }));
            }
        }
        Ok(targets)
    }

    fn describe(&self, target: Target) -> String {
        match target {
            Target::Node(key) => match self.nodes.get(key) {
                Some(node) => format!("node '{}'", node.name()),
                None => "a removed node".to_string(),
            },
            Target::Reference(_) => "a shared reference".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Visit {
    Open,
    Done,
}
