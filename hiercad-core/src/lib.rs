//! # hiercad Core
//!
//! Hierarchical layout model: per-layer geometry held in immutable [Node]s,
//! shared through [Reference]s that carry a [Transform] and a [LayerMap].
//! References may stack on other References, and every transform and layer
//! rename composes across arbitrary nesting depth.
//!
//! All Nodes and shared References live in a [Layout] arena and are addressed
//! by generation-checked keys, which double as the identity of a fragment.

pub mod database;
pub mod error;
pub mod geometry;
pub mod layer;
pub mod node;
pub mod reference;
pub mod transform;

pub use database::{Layout, NodeKey, RefKey};
pub use error::{LayoutError, LayoutResult};
pub use geometry::{BBox, LayerGeometry, Point, Polygon};
pub use layer::LayerMap;
pub use node::{Child, Node, NodeBuilder};
pub use reference::{Flattened, Reference, Target};
pub use transform::Transform;
