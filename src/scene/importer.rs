//! JSON scene import.
//!
//! A scene document has two optional top-level arrays:
//!
//! ```json
//! {
//!   "scene_nodes": [ { "node": { "parent_id": 0, "position": [...] }, "is_root_node": true } ],
//!   "items": [ { "mesh": "cube.mesh", "movable_object": { "parent_node_id": 0 }, "sub_items": [...] } ]
//! }
//! ```
//!
//! Nodes are resolved first (see [`SceneNodeResolver`]); items then attach to
//! the node index they name. An item naming a node that was never created is
//! kept unattached and a warning is logged.

use std::path::Path;

use log::{info, warn};
use serde_json::Value;

use crate::errors::{HlmsError, Result};
use crate::scene::decode::{
    decode_aabb, decode_vec4, get_array, get_bool, get_float, get_str, get_u32,
};
use crate::scene::item::{AUTODETECT_RESOURCE_GROUP, DatablockRef, Item, MovableObject, SubItem};
use crate::scene::resolver::SceneNodeResolver;
use crate::scene::{ItemHandle, MemoryClass, NodeHandle, SceneGraph};

/// Answers how many submeshes a mesh has, which fixes how many sub-items an
/// imported item gets.
pub trait MeshSource {
    fn sub_mesh_count(&self, mesh: &str, resource_group: &str) -> usize;
}

impl<F> MeshSource for F
where
    F: Fn(&str, &str) -> usize,
{
    fn sub_mesh_count(&self, mesh: &str, resource_group: &str) -> usize {
        self(mesh, resource_group)
    }
}

/// Result of [`SceneFormatImporter::import_scene`].
#[derive(Debug)]
pub struct ImportedScene {
    pub graph: SceneGraph,
    /// Handle created for each `scene_nodes` index.
    pub nodes: Vec<Option<NodeHandle>>,
    /// Items in document order.
    pub items: Vec<ItemHandle>,
}

impl ImportedScene {
    #[inline]
    #[must_use]
    pub fn node(&self, index: usize) -> Option<NodeHandle> {
        self.nodes.get(index).copied().flatten()
    }
}

pub struct SceneFormatImporter<M: MeshSource> {
    meshes: M,
}

impl<M: MeshSource> SceneFormatImporter<M> {
    pub fn new(meshes: M) -> Self {
        Self { meshes }
    }

    /// Reads and imports a scene file from disk.
    pub fn import_scene_file(&self, path: impl AsRef<Path>) -> Result<ImportedScene> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        self.import_scene(&path.to_string_lossy(), &json)
    }

    /// Imports a scene document. `filename` is only used in diagnostics.
    pub fn import_scene(&self, filename: &str, json: &str) -> Result<ImportedScene> {
        let doc: Value = serde_json::from_str(json).map_err(|source| HlmsError::SceneParse {
            file: filename.to_owned(),
            source,
        })?;

        let mut graph = SceneGraph::new();

        let nodes = match get_array(&doc, "scene_nodes") {
            Some(entries) => SceneNodeResolver::new(entries, filename).resolve(&mut graph)?,
            None => Vec::new(),
        };

        let items = get_array(&doc, "items")
            .unwrap_or_default()
            .iter()
            .filter(|v| v.is_object())
            .map(|v| self.import_item(v, &nodes, &mut graph))
            .collect::<Result<Vec<_>>>()?;

        info!(
            "Imported scene {filename}: {} nodes, {} items",
            nodes.iter().flatten().count(),
            items.len()
        );

        Ok(ImportedScene { graph, nodes, items })
    }

    fn import_item(
        &self,
        value: &Value,
        nodes: &[Option<NodeHandle>],
        graph: &mut SceneGraph,
    ) -> Result<ItemHandle> {
        let mesh = get_str(value, "mesh").unwrap_or_default();
        let resource_group = get_str(value, "mesh_resource_group").unwrap_or_default();
        let movable_value = value.get("movable_object").filter(|v| v.is_object());
        let is_static = movable_value
            .and_then(|m| get_bool(m, "is_static"))
            .unwrap_or(false);

        let mut item = Item::new(
            mesh,
            resource_group,
            MemoryClass::from_static(is_static),
            0,
        );
        let count = self.meshes.sub_mesh_count(&item.mesh, &item.resource_group);
        item.sub_items = vec![SubItem::default(); count];

        let mut parent_node = None;
        if let Some(m) = movable_value {
            parent_node = import_movable_object(m, &mut item.movable, nodes);
        }

        if let Some(sub_items) = get_array(value, "sub_items") {
            for (sub_item, sub_value) in item.sub_items.iter_mut().zip(sub_items) {
                if let Some(renderable) = sub_value.get("renderable").filter(|r| r.is_object()) {
                    import_renderable(renderable, sub_item);
                }
            }
        }

        let handle = graph.add_item(item);
        if let Some(node) = parent_node {
            graph.attach_item(node, handle)?;
        }
        Ok(handle)
    }
}

/// Applies the movable-object fields and returns the node to attach to.
fn import_movable_object(
    value: &Value,
    movable: &mut MovableObject,
    nodes: &[Option<NodeHandle>],
) -> Option<NodeHandle> {
    if let Some(name) = get_str(value, "name") {
        movable.name = name.to_owned();
    }

    let mut parent_node = None;
    if let Some(id) = get_u32(value, "parent_node_id") {
        parent_node = nodes.get(id as usize).copied().flatten();
        if parent_node.is_none() {
            warn!(
                "MovableObject '{}' references SceneNode {id} which does not exist or couldn't be created",
                movable.name
            );
        }
    }

    if let Some(rq) = get_u32(value, "render_queue") {
        match u8::try_from(rq) {
            Ok(rq) => movable.render_queue = rq,
            Err(_) => warn!("Render queue {rq} of '{}' is out of range", movable.name),
        }
    }
    if let Some(a) = get_array(value, "local_aabb") {
        movable.local_aabb = decode_aabb(a, movable.local_aabb);
    }
    if let Some(r) = get_float(value, "local_radius") {
        movable.local_radius = r;
    }
    if let Some(d) = get_float(value, "rendering_distance") {
        movable.rendering_distance = d;
    }
    if let Some(f) = get_u32(value, "visibility_flags") {
        movable.visibility_flags = f;
    }
    if let Some(f) = get_u32(value, "query_flags") {
        movable.query_flags = f;
    }
    if let Some(f) = get_u32(value, "light_mask") {
        movable.light_mask = f;
    }

    parent_node
}

fn import_renderable(value: &Value, sub_item: &mut SubItem) {
    if let Some(params) = value.get("custom_parameters").and_then(Value::as_object) {
        for (key, v) in params {
            let (Ok(slot), Some(a)) = (key.parse::<u32>(), v.as_array()) else {
                continue;
            };
            sub_item.custom_parameters.insert(slot, decode_vec4(a));
        }
    }

    let is_v1_material = get_bool(value, "is_v1_material").unwrap_or(false);
    if let Some(name) = get_str(value, "datablock") {
        sub_item.datablock = Some(if is_v1_material {
            DatablockRef::Material {
                name: name.to_owned(),
                resource_group: AUTODETECT_RESOURCE_GROUP.to_owned(),
            }
        } else {
            DatablockRef::Datablock(name.to_owned())
        });
    }

    // Byte fields keep the low 8 bits.
    if let Some(p) = get_u32(value, "custom_parameter") {
        sub_item.custom_parameter = p as u8;
    }
    if let Some(g) = get_u32(value, "render_queue_sub_group") {
        sub_item.render_queue_sub_group = g as u8;
    }
    if let Some(b) = get_bool(value, "polygon_mode_overrideable") {
        sub_item.polygon_mode_overrideable = b;
    }
    if let Some(b) = get_bool(value, "use_identity_view") {
        sub_item.use_identity_view = b;
    }
    if let Some(b) = get_bool(value, "use_identity_projection") {
        sub_item.use_identity_projection = b;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec4;

    fn importer() -> SceneFormatImporter<impl MeshSource> {
        SceneFormatImporter::new(|_: &str, _: &str| 2)
    }

    #[test]
    fn invalid_json_names_the_file() {
        let err = importer().import_scene("broken.json", "{ nope").unwrap_err();
        assert!(matches!(err, HlmsError::SceneParse { ref file, .. } if file == "broken.json"));
    }

    #[test]
    fn top_level_arrays_are_optional() {
        let scene = importer().import_scene("empty.json", r#"{ "items": 3 }"#).unwrap();
        assert!(scene.nodes.is_empty());
        assert!(scene.items.is_empty());
        assert_eq!(scene.graph.node_count(), 2);
    }

    #[test]
    fn sub_items_are_limited_by_mesh() {
        let json = r#"{ "items": [ { "mesh": "a.mesh", "sub_items": [
            { "renderable": { "datablock": "A" } },
            { "renderable": { "datablock": "B", "is_v1_material": true } },
            { "renderable": { "datablock": "C" } }
        ] } ] }"#;
        let scene = importer().import_scene("s.json", json).unwrap();
        let item = scene.graph.item(scene.items[0]).unwrap();

        assert_eq!(item.resource_group, AUTODETECT_RESOURCE_GROUP);
        assert_eq!(item.sub_items().len(), 2);
        assert_eq!(
            item.sub_items()[0].datablock,
            Some(DatablockRef::Datablock("A".into()))
        );
        assert!(matches!(
            item.sub_items()[1].datablock,
            Some(DatablockRef::Material { ref name, .. }) if name == "B"
        ));
    }

    #[test]
    fn custom_parameters_use_numeric_keys() {
        let one = 1.0f32.to_bits();
        let json = format!(
            r#"{{ "items": [ {{ "sub_items": [ {{ "renderable": {{
                "custom_parameters": {{ "3": [{one}, 0, 0, {one}], "x": [{one}] }},
                "custom_parameter": 300
            }} }} ] }} ] }}"#
        );
        let scene = importer().import_scene("s.json", &json).unwrap();
        let sub = &scene.graph.item(scene.items[0]).unwrap().sub_items()[0];

        assert_eq!(sub.custom_parameters.len(), 1);
        assert_eq!(sub.custom_parameters[&3], Vec4::new(1.0, 0.0, 0.0, 1.0));
        assert_eq!(sub.custom_parameter, 44);
    }
}
