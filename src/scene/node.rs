use smallvec::SmallVec;

use crate::scene::transform::Transform;
use crate::scene::{ItemHandle, MemoryClass, NodeHandle};

/// A node of the [`SceneGraph`](crate::scene::SceneGraph).
///
/// # Hierarchy
///
/// - `parent`: `None` for the two memory-class roots and for loose nodes
/// - `children`: handles in creation order
///
/// Nodes never change memory class after creation.
#[derive(Debug, Clone)]
pub struct SceneNode {
    pub(crate) parent: Option<NodeHandle>,
    pub(crate) children: Vec<NodeHandle>,
    pub(crate) memory_class: MemoryClass,
    pub(crate) attached: SmallVec<[ItemHandle; 2]>,

    pub transform: Transform,
}

impl SceneNode {
    pub(crate) fn new(memory_class: MemoryClass, parent: Option<NodeHandle>) -> Self {
        Self {
            parent,
            children: Vec::new(),
            memory_class,
            attached: SmallVec::new(),
            transform: Transform::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn parent(&self) -> Option<NodeHandle> {
        self.parent
    }

    #[inline]
    #[must_use]
    pub fn children(&self) -> &[NodeHandle] {
        &self.children
    }

    #[inline]
    #[must_use]
    pub fn memory_class(&self) -> MemoryClass {
        self.memory_class
    }

    #[inline]
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.memory_class == MemoryClass::Static
    }

    /// Items attached to this node.
    #[inline]
    #[must_use]
    pub fn attached_items(&self) -> &[ItemHandle] {
        &self.attached
    }
}
