//! Renderable items and the per-object state the scene format carries.

use std::collections::BTreeMap;

use glam::{Vec3, Vec4};

use crate::scene::{MemoryClass, NodeHandle};

/// Resource group that asks the resource system to search every group.
pub const AUTODETECT_RESOURCE_GROUP: &str = "Autodetect";

/// Axis-aligned box stored as center and half extents.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Aabb {
    pub center: Vec3,
    pub half_size: Vec3,
}

impl Aabb {
    #[must_use]
    pub fn new(center: Vec3, half_size: Vec3) -> Self {
        Self { center, half_size }
    }

    #[inline]
    #[must_use]
    pub fn min(&self) -> Vec3 {
        self.center - self.half_size
    }

    #[inline]
    #[must_use]
    pub fn max(&self) -> Vec3 {
        self.center + self.half_size
    }
}

/// State shared by everything that can be attached to a node.
#[derive(Debug, Clone, PartialEq)]
pub struct MovableObject {
    pub name: String,
    pub memory_class: MemoryClass,
    pub render_queue: u8,
    pub local_aabb: Aabb,
    pub local_radius: f32,
    /// 0 means never culled by distance.
    pub rendering_distance: f32,
    pub visibility_flags: u32,
    pub query_flags: u32,
    pub light_mask: u32,
}

impl MovableObject {
    #[must_use]
    pub fn new(memory_class: MemoryClass) -> Self {
        Self {
            name: String::new(),
            memory_class,
            render_queue: 0,
            local_aabb: Aabb::default(),
            local_radius: 0.0,
            rendering_distance: 0.0,
            visibility_flags: u32::MAX,
            query_flags: u32::MAX,
            light_mask: u32::MAX,
        }
    }
}

/// How a sub-item names its material.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatablockRef {
    /// An HLMS datablock looked up by name.
    Datablock(String),
    /// A legacy material, falling back to a datablock of the same name.
    Material { name: String, resource_group: String },
}

impl DatablockRef {
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Datablock(name) | Self::Material { name, .. } => name,
        }
    }
}

/// Per-submesh render state.
#[derive(Debug, Clone, PartialEq)]
pub struct SubItem {
    pub datablock: Option<DatablockRef>,
    pub custom_parameter: u8,
    pub render_queue_sub_group: u8,
    pub custom_parameters: BTreeMap<u32, Vec4>,
    pub polygon_mode_overrideable: bool,
    pub use_identity_view: bool,
    pub use_identity_projection: bool,
}

impl Default for SubItem {
    fn default() -> Self {
        Self {
            datablock: None,
            custom_parameter: 0,
            render_queue_sub_group: 0,
            custom_parameters: BTreeMap::new(),
            polygon_mode_overrideable: true,
            use_identity_view: false,
            use_identity_projection: false,
        }
    }
}

/// A mesh instance with one [`SubItem`] per submesh.
#[derive(Debug, Clone)]
pub struct Item {
    pub mesh: String,
    pub resource_group: String,
    pub movable: MovableObject,
    pub(crate) sub_items: Vec<SubItem>,
    pub(crate) parent_node: Option<NodeHandle>,
}

impl Item {
    /// Creates an item with `num_sub_items` default sub-items.
    ///
    /// An empty `resource_group` becomes [`AUTODETECT_RESOURCE_GROUP`].
    #[must_use]
    pub fn new(
        mesh: impl Into<String>,
        resource_group: impl Into<String>,
        memory_class: MemoryClass,
        num_sub_items: usize,
    ) -> Self {
        let mut resource_group = resource_group.into();
        if resource_group.is_empty() {
            resource_group = AUTODETECT_RESOURCE_GROUP.to_owned();
        }
        Self {
            mesh: mesh.into(),
            resource_group,
            movable: MovableObject::new(memory_class),
            sub_items: vec![SubItem::default(); num_sub_items],
            parent_node: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn sub_items(&self) -> &[SubItem] {
        &self.sub_items
    }

    #[inline]
    pub fn sub_item_mut(&mut self, index: usize) -> Option<&mut SubItem> {
        self.sub_items.get_mut(index)
    }

    #[inline]
    #[must_use]
    pub fn parent_node(&self) -> Option<NodeHandle> {
        self.parent_node
    }
}
