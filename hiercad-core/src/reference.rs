//! References: transform- and layer-map-qualified edges.
//!
//! A [Reference] points at a [crate::Node] or, through a [RefKey], at another shared
//! Reference, so edges can stack. Its `depth` counts the Reference layers down
//! to the eventual Node. Stack queries walk the chain iteratively, outermost first.

use serde::{Deserialize, Serialize};

use crate::database::{Layout, NodeKey, RefKey};
use crate::error::{LayoutError, LayoutResult};
use crate::geometry::{geometry_bbox, BBox, LayerGeometry, Polygon};
use crate::layer::LayerMap;
use crate::transform::Transform;

/// What a [Reference] points at. Also the identity of a shared design fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Target {
    Node(NodeKey),
    Reference(RefKey),
}

impl From<NodeKey> for Target {
    fn from(key: NodeKey) -> Self {
        Target::Node(key)
    }
}

impl From<RefKey> for Target {
    fn from(key: RefKey) -> Self {
        Target::Reference(key)
    }
}

/// Steamrolled geometry: every transform and layer map below a Reference baked into raw coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct Flattened {
    /// The Node the flattened Reference resolves to.
    pub node: NodeKey,
    pub geometry: LayerGeometry,
}

impl Flattened {
    pub fn polygons(&self, layer: &str) -> &[Polygon] {
        self.geometry.get(layer).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn polygon_count(&self) -> usize {
        self.geometry.values().map(Vec::len).sum()
    }

    pub fn bbox(&self) -> Option<BBox> {
        geometry_bbox(&self.geometry)
    }
}

/// A (Transform, LayerMap)-qualified edge to a [Target].
///
/// Not `Clone`: duplicating a stacked Reference is ambiguous, so copies go through
/// [Reference::copy] and [Reference::copy_reassign].
#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct Reference {
    target: Target,
    transform: Transform,
    layer_map: LayerMap,
}

impl Reference {
    pub fn new(target: Target, layer_map: LayerMap, transform: Transform) -> Self {
        Self {
            target,
            transform,
            layer_map,
        }
    }

    /// Identity Reference to a Node.
    pub fn wrap(key: NodeKey) -> Self {
        Self::new(Target::Node(key), LayerMap::Identity, Transform::identity())
    }

    /// Identity Reference stacked on a shared Reference.
    pub fn stack_on(key: RefKey) -> Self {
        Self::new(Target::Reference(key), LayerMap::Identity, Transform::identity())
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_layer_map(mut self, layer_map: LayerMap) -> Self {
        self.layer_map = layer_map;
        self
    }

    /// Apply `transform` after this Reference's current transform.
    pub fn then_transform(mut self, transform: &Transform) -> Self {
        self.transform = transform.compose(&self.transform);
        self
    }

    pub fn target(&self) -> Target {
        self.target
    }

    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    pub fn layer_map(&self) -> &LayerMap {
        &self.layer_map
    }

    /// The chain of References from `self` down to the Node, and that Node.
    fn stack<'a>(&'a self, layout: &'a Layout) -> LayoutResult<(Vec<&'a Reference>, NodeKey)> {
        let mut stack = vec![self];
        let mut current = self;
        loop {
            match current.target {
                Target::Node(key) => return Ok((stack, key)),
                Target::Reference(key) => {
                    current = layout.reference(key)?;
                    stack.push(current);
                }
            }
        }
    }

    pub fn depth(&self, layout: &Layout) -> LayoutResult<usize> {
        Ok(self.stack(layout)?.0.len())
    }

    /// The Node this Reference eventually points at.
    pub fn resolve(&self, layout: &Layout) -> LayoutResult<NodeKey> {
        Ok(self.stack(layout)?.1)
    }

    /// The target reached after peeling `depth` Reference layers, `1..=self.depth()`.
    pub fn target_at(&self, layout: &Layout, depth: usize) -> LayoutResult<Target> {
        let (stack, _) = self.stack(layout)?;
        if depth == 0 || depth > stack.len() {
            return Err(LayoutError::InvalidDepth {
                depth,
                max: stack.len(),
            });
        }
        Ok(stack[depth - 1].target)
    }

    /// Compose the transforms of the outermost `max_depth` layers (all of them for `None`).
    pub fn flat_transform(&self, layout: &Layout, max_depth: Option<usize>) -> LayoutResult<Transform> {
        let (stack, _) = self.stack(layout)?;
        Ok(fold_transforms(&stack, max_depth))
    }

    /// Compose the layer maps of the outermost `max_depth` layers. Inner maps apply first.
    pub fn flat_layer_map(&self, layout: &Layout, max_depth: Option<usize>) -> LayoutResult<LayerMap> {
        let (stack, _) = self.stack(layout)?;
        fold_layer_maps(&stack, max_depth)
    }

    fn flat(&self, layout: &Layout) -> LayoutResult<(NodeKey, Transform, LayerMap)> {
        let (stack, key) = self.stack(layout)?;
        Ok((key, fold_transforms(&stack, None), fold_layer_maps(&stack, None)?))
    }

    /// Freshly materialized child References, with this Reference's flattened
    /// transform and layer map composed on top of each child's own.
    pub fn children(&self, layout: &Layout) -> LayoutResult<Vec<(String, Reference)>> {
        let (key, transform, layer_map) = self.flat(layout)?;
        layout
            .node(key)?
            .children()
            .map(|(name, child)| {
                Ok((
                    name.to_string(),
                    Reference {
                        target: child.target,
                        transform: transform.compose(&child.transform),
                        layer_map: child.layer_map.compose(&layer_map)?,
                    },
                ))
            })
            .collect()
    }

    /// Steamroll everything below this Reference into raw per-layer polygons.
    pub fn flatten(&self, layout: &Layout) -> LayoutResult<Flattened> {
        let (root, transform, layer_map) = self.flat(layout)?;
        let mut geometry = LayerGeometry::new();
        let mut work = vec![(root, transform, layer_map)];

        while let Some((key, transform, layer_map)) = work.pop() {
            if layer_map == LayerMap::Constant(None) {
                continue;
            }
            let node = layout.node(key)?;
            for (layer, polygons) in node.geometry() {
                if let Some(dest) = layer_map.lookup(layer)? {
                    geometry
                        .entry(dest)
                        .or_default()
                        .extend(polygons.iter().map(|p| p.transform(&transform)));
                }
            }
            let children: Vec<_> = node.children().collect();
            // Reversed so children come off the stack in declaration order.
            for (_, child) in children.into_iter().rev() {
                let (child_key, child_transform, child_map) = child.flat(layout)?;
                work.push((
                    child_key,
                    transform.compose(&child_transform),
                    child_map.compose(&layer_map)?,
                ));
            }
        }

        Ok(Flattened {
            node: root,
            geometry,
        })
    }

    /// Bounding box of the flattened geometry.
    pub fn bbox(&self, layout: &Layout) -> LayoutResult<BBox> {
        self.flatten(layout)?
            .bbox()
            .ok_or(LayoutError::EmptyGeometry)
    }

    /// Shallow duplicate. Refused for stacked References.
    pub fn copy(&self, layout: &Layout) -> LayoutResult<Reference> {
        self.copy_reassign(layout, self.target)
    }

    /// Shallow duplicate pointing at `target`. Refused for stacked References.
    pub fn copy_reassign(&self, layout: &Layout, target: Target) -> LayoutResult<Reference> {
        let depth = self.depth(layout)?;
        if depth > 1 {
            return Err(LayoutError::CopyStacked { depth });
        }
        if !layout.contains(target) {
            return Err(LayoutError::StaleKey(match target {
                Target::Node(_) => "node",
                Target::Reference(_) => "reference",
            }));
        }
        Ok(Reference {
            target,
            transform: self.transform,
            layer_map: self.layer_map.clone(),
        })
    }
}

fn fold_transforms(stack: &[&Reference], max_depth: Option<usize>) -> Transform {
    let n = max_depth.map_or(stack.len(), |d| d.min(stack.len()));
    stack[..n]
        .iter()
        .fold(Transform::identity(), |acc, r| acc.compose(&r.transform))
}

fn fold_layer_maps(stack: &[&Reference], max_depth: Option<usize>) -> LayoutResult<LayerMap> {
    let n = max_depth.map_or(stack.len(), |d| d.min(stack.len()));
    stack[..n]
        .iter()
        .rev()
        .try_fold(LayerMap::Identity, |acc, r| acc.compose(&r.layer_map))
}
