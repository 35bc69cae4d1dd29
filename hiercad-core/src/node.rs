use serde::{Deserialize, Serialize};

use crate::database::NodeKey;
use crate::error::{LayoutError, LayoutResult};
use crate::geometry::{geometry_bbox, BBox, LayerGeometry, Polygon};
use crate::reference::Reference;

/// Anything a caller may try to assign as a child of a node.
///
/// Only [Child::Reference] is accepted. Nodes are shared exclusively through References.
#[derive(Debug)]
pub enum Child {
    Reference(Reference),
    Node(NodeKey),
    Geometry(Polygon),
}

impl From<Reference> for Child {
    fn from(r: Reference) -> Self {
        Child::Reference(r)
    }
}

impl From<NodeKey> for Child {
    fn from(key: NodeKey) -> Self {
        Child::Node(key)
    }
}

impl From<Polygon> for Child {
    fn from(p: Polygon) -> Self {
        Child::Geometry(p)
    }
}

/// A named bundle of per-layer geometry and named child References.
///
/// Geometry is always in the node's own frame; a node carries no transform.
/// Nodes are built with [NodeBuilder] and immutable once added to a [crate::Layout].
#[derive(Debug, Serialize, Deserialize)]
pub struct Node {
    name: String,
    geometry: LayerGeometry,
    children: Vec<(String, Reference)>,
}

impl Node {
    pub fn builder(name: &str) -> NodeBuilder {
        NodeBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn geometry(&self) -> &LayerGeometry {
        &self.geometry
    }

    pub fn layers(&self) -> impl Iterator<Item = &str> {
        self.geometry.keys().map(String::as_str)
    }

    pub fn polygons(&self, layer: &str) -> &[Polygon] {
        self.geometry.get(layer).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Child References in insertion order.
    pub fn children(&self) -> impl Iterator<Item = (&str, &Reference)> {
        self.children.iter().map(|(name, r)| (name.as_str(), r))
    }

    pub fn child(&self, name: &str) -> Option<&Reference> {
        self.children
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, r)| r)
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    pub fn polygon_count(&self) -> usize {
        self.geometry.values().map(Vec::len).sum()
    }

    /// Bounding box of this node's own geometry, not including children.
    pub fn local_bbox(&self) -> Option<BBox> {
        geometry_bbox(&self.geometry)
    }
}

/// Factory for [Node]s.
#[derive(Debug, Default)]
pub struct NodeBuilder {
    name: String,
    geometry: LayerGeometry,
    children: Vec<(String, Reference)>,
}

impl NodeBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn polygon(mut self, layer: &str, polygon: Polygon) -> Self {
        self.geometry
            .entry(layer.to_string())
            .or_default()
            .push(polygon);
        self
    }

    pub fn polygons(mut self, layer: &str, polygons: impl IntoIterator<Item = Polygon>) -> Self {
        self.geometry
            .entry(layer.to_string())
            .or_default()
            .extend(polygons);
        self
    }

    /// Add a named child. Only References are accepted.
    pub fn child(mut self, name: &str, child: impl Into<Child>) -> LayoutResult<Self> {
        let reference = match child.into() {
            Child::Reference(r) => r,
            Child::Node(_) => {
                return Err(LayoutError::BareNodeChild {
                    name: name.to_string(),
                })
            }
            Child::Geometry(_) => {
                return Err(LayoutError::InvalidChild {
                    name: name.to_string(),
                    reason: "not a Reference; add geometry with `polygon` instead".into(),
                })
            }
        };
        if name.is_empty() {
            return Err(LayoutError::InvalidChild {
                name: name.to_string(),
                reason: "child names must be non-empty".into(),
            });
        }
        if self.children.iter().any(|(n, _)| n == name) {
            return Err(LayoutError::InvalidChild {
                name: name.to_string(),
                reason: "duplicate child name".into(),
            });
        }
        self.children.push((name.to_string(), reference));
        Ok(self)
    }

    pub(crate) fn children(&self) -> impl Iterator<Item = (&str, &Reference)> {
        self.children.iter().map(|(name, r)| (name.as_str(), r))
    }

    pub(crate) fn build(self) -> Node {
        Node {
            name: self.name,
            geometry: self.geometry,
            children: self.children,
        }
    }
}
