use slotmap::SlotMap;

use crate::errors::{HlmsError, Result};
use crate::scene::item::Item;
use crate::scene::node::SceneNode;
use crate::scene::transform::DerivedTransform;
use crate::scene::{ItemHandle, MemoryClass, NodeHandle};

/// Node hierarchy plus the items attached to it.
///
/// The graph owns one root per [`MemoryClass`]. Nodes created without a parent
/// are *loose*: they live in the graph but are not reachable from either root.
#[derive(Debug)]
pub struct SceneGraph {
    nodes: SlotMap<NodeHandle, SceneNode>,
    items: SlotMap<ItemHandle, Item>,
    roots: [NodeHandle; 2],
    loose_nodes: Vec<NodeHandle>,
}

impl SceneGraph {
    #[must_use]
    pub fn new() -> Self {
        let mut nodes = SlotMap::with_key();
        let roots = [
            nodes.insert(SceneNode::new(MemoryClass::Dynamic, None)),
            nodes.insert(SceneNode::new(MemoryClass::Static, None)),
        ];
        Self {
            nodes,
            items: SlotMap::with_key(),
            roots,
            loose_nodes: Vec::new(),
        }
    }

    /// The root node of the given memory class.
    #[inline]
    #[must_use]
    pub fn root(&self, memory_class: MemoryClass) -> NodeHandle {
        self.roots[memory_class as usize]
    }

    #[inline]
    #[must_use]
    pub fn is_root(&self, handle: NodeHandle) -> bool {
        self.roots.contains(&handle)
    }

    /// Creates a node with no parent.
    pub fn create_node(&mut self, memory_class: MemoryClass) -> NodeHandle {
        let handle = self.nodes.insert(SceneNode::new(memory_class, None));
        self.loose_nodes.push(handle);
        handle
    }

    /// Creates a node under `parent`.
    pub fn create_child(
        &mut self,
        parent: NodeHandle,
        memory_class: MemoryClass,
    ) -> Result<NodeHandle> {
        if !self.nodes.contains_key(parent) {
            return Err(HlmsError::UnknownResource(format!("scene node {parent:?}")));
        }
        let child = self.nodes.insert(SceneNode::new(memory_class, Some(parent)));
        if let Some(p) = self.nodes.get_mut(parent) {
            p.children.push(child);
        }
        Ok(child)
    }

    #[inline]
    #[must_use]
    pub fn node(&self, handle: NodeHandle) -> Option<&SceneNode> {
        self.nodes.get(handle)
    }

    #[inline]
    pub fn node_mut(&mut self, handle: NodeHandle) -> Option<&mut SceneNode> {
        self.nodes.get_mut(handle)
    }

    /// Nodes created without a parent, in creation order.
    #[inline]
    #[must_use]
    pub fn loose_nodes(&self) -> &[NodeHandle] {
        &self.loose_nodes
    }

    /// Number of nodes, including both roots.
    #[inline]
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeHandle, &SceneNode)> {
        self.nodes.iter()
    }

    // ========================================================================
    // Items
    // ========================================================================

    pub fn add_item(&mut self, item: Item) -> ItemHandle {
        self.items.insert(item)
    }

    #[inline]
    #[must_use]
    pub fn item(&self, handle: ItemHandle) -> Option<&Item> {
        self.items.get(handle)
    }

    #[inline]
    pub fn item_mut(&mut self, handle: ItemHandle) -> Option<&mut Item> {
        self.items.get_mut(handle)
    }

    #[inline]
    #[must_use]
    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Attaches `item` to `node`, detaching it from its previous node.
    pub fn attach_item(&mut self, node: NodeHandle, item: ItemHandle) -> Result<()> {
        if !self.nodes.contains_key(node) {
            return Err(HlmsError::UnknownResource(format!("scene node {node:?}")));
        }
        let Some(it) = self.items.get_mut(item) else {
            return Err(HlmsError::UnknownResource(format!("item {item:?}")));
        };
        let previous = it.parent_node.replace(node);

        if let Some(old) = previous.and_then(|h| self.nodes.get_mut(h)) {
            old.attached.retain(|h| *h != item);
        }
        if let Some(n) = self.nodes.get_mut(node) {
            n.attached.push(item);
        }
        Ok(())
    }

    // ========================================================================
    // Transforms
    // ========================================================================

    /// World-space transform of `handle`, composed from the root down.
    #[must_use]
    pub fn derived_transform(&self, handle: NodeHandle) -> Option<DerivedTransform> {
        let mut chain = Vec::new();
        let mut current = Some(handle);
        while let Some(h) = current {
            let node = self.nodes.get(h)?;
            chain.push(node);
            current = node.parent;
        }

        Some(
            chain
                .iter()
                .rev()
                .fold(DerivedTransform::IDENTITY, |parent, node| {
                    node.transform.derive_from(&parent)
                }),
        )
    }
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}
