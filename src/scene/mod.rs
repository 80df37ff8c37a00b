//! Scene graph and JSON scene import
//!
//! - [`SceneGraph`]: nodes with parent/child links and attached items
//! - [`SceneNodeResolver`]: builds the hierarchy from an index-addressed node list
//! - [`SceneFormatImporter`]: reads a scene document into a fresh graph

mod decode;
pub mod graph;
pub mod importer;
pub mod item;
pub mod node;
pub mod resolver;
pub mod transform;

use slotmap::new_key_type;

pub use graph::SceneGraph;
pub use importer::{ImportedScene, MeshSource, SceneFormatImporter};
pub use item::{Aabb, DatablockRef, Item, MovableObject, SubItem};
pub use node::SceneNode;
pub use resolver::SceneNodeResolver;
pub use transform::{DerivedTransform, Transform};

new_key_type! {
    pub struct NodeHandle;
    pub struct ItemHandle;
}

/// Which node/object pool something lives in.
///
/// Static objects are expected to rarely move; the two classes have separate
/// roots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MemoryClass {
    #[default]
    Dynamic,
    Static,
}

impl MemoryClass {
    #[inline]
    #[must_use]
    pub fn from_static(is_static: bool) -> Self {
        if is_static { Self::Static } else { Self::Dynamic }
    }
}
