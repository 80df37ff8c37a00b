//! Builds the node hierarchy from the flat `scene_nodes` array.
//!
//! Entries reference their parent by array index, and a parent may appear after
//! its children. Resolution walks an explicit stack: when a node's parent has
//! not been created yet, the parent is pushed and resolved first. A parent that
//! is already on the stack means the `parent_id` chain loops without reaching a
//! self-parented node, and the document is rejected.

use log::debug;
use serde_json::Value;

use crate::errors::{HlmsError, Result};
use crate::scene::decode::{decode_quat, decode_vec3, get_array, get_bool, get_u32};
use crate::scene::{MemoryClass, NodeHandle, SceneGraph, Transform};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VisitState {
    Unvisited,
    InProgress,
    Done(NodeHandle),
}

/// The fields of one `scene_nodes` entry that decide where the node goes.
struct NodeRecord<'a> {
    node: &'a Value,
    parent: usize,
    memory_class: MemoryClass,
    is_root: bool,
}

impl<'a> NodeRecord<'a> {
    fn parse(entry: &'a Value, index: usize, file: &str) -> Result<Self> {
        let Some(node) = entry.get("node").filter(|n| n.is_object()) else {
            return Err(HlmsError::MissingNodeObject {
                index,
                file: file.to_owned(),
            });
        };

        let parent = get_u32(node, "parent_id").map_or(index, |p| p as usize);
        let is_static = get_bool(node, "is_static").unwrap_or(false);
        let is_root = get_bool(entry, "is_root_node")
            .or_else(|| get_bool(node, "is_root_node"))
            .unwrap_or(false);

        Ok(Self {
            node,
            parent,
            memory_class: MemoryClass::from_static(is_static),
            is_root,
        })
    }
}

/// Resolves `scene_nodes` into `graph`, returning the handle created for each
/// index (`None` for entries that are not objects).
pub struct SceneNodeResolver<'a> {
    entries: &'a [Value],
    file: &'a str,
    states: Vec<VisitState>,
}

impl<'a> SceneNodeResolver<'a> {
    #[must_use]
    pub fn new(entries: &'a [Value], file: &'a str) -> Self {
        Self {
            entries,
            file,
            states: vec![VisitState::Unvisited; entries.len()],
        }
    }

    pub fn resolve(mut self, graph: &mut SceneGraph) -> Result<Vec<Option<NodeHandle>>> {
        for index in 0..self.entries.len() {
            if self.entries[index].is_object() && self.states[index] == VisitState::Unvisited {
                self.resolve_from(index, graph)?;
            }
        }

        Ok(self
            .states
            .into_iter()
            .map(|state| match state {
                VisitState::Done(handle) => Some(handle),
                _ => None,
            })
            .collect())
    }

    fn resolve_from(&mut self, start: usize, graph: &mut SceneGraph) -> Result<()> {
        let mut stack = vec![start];

        while let Some(&index) = stack.last() {
            let record = NodeRecord::parse(&self.entries[index], index, self.file)?;
            self.states[index] = VisitState::InProgress;

            let handle = if record.parent == index {
                if record.is_root {
                    graph.root(record.memory_class)
                } else {
                    graph.create_node(record.memory_class)
                }
            } else {
                match self.states.get(record.parent).copied() {
                    Some(VisitState::Done(parent)) => {
                        graph.create_child(parent, record.memory_class)?
                    }
                    Some(VisitState::InProgress) => {
                        return Err(HlmsError::CyclicParent {
                            node: index,
                            file: self.file.to_owned(),
                        });
                    }
                    Some(VisitState::Unvisited) if self.entries[record.parent].is_object() => {
                        debug!("Scene node {index} waits for parent {}", record.parent);
                        stack.push(record.parent);
                        continue;
                    }
                    _ => {
                        return Err(HlmsError::UnresolvableParent {
                            node: index,
                            parent: record.parent,
                            file: self.file.to_owned(),
                        });
                    }
                }
            };

            if let Some(node) = graph.node_mut(handle) {
                apply_node_fields(record.node, &mut node.transform);
            }
            self.states[index] = VisitState::Done(handle);
            stack.pop();
        }

        Ok(())
    }
}

fn apply_node_fields(node: &Value, transform: &mut Transform) {
    if let Some(a) = get_array(node, "position") {
        transform.position = decode_vec3(a);
    }
    if let Some(a) = get_array(node, "rotation") {
        transform.set_rotation(decode_quat(a));
    }
    if let Some(a) = get_array(node, "scale") {
        transform.scale = decode_vec3(a);
    }
    if let Some(b) = get_bool(node, "inherit_orientation") {
        transform.inherit_orientation = b;
    }
    if let Some(b) = get_bool(node, "inherit_scale") {
        transform.inherit_scale = b;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn resolve(doc: Value) -> Result<(SceneGraph, Vec<Option<NodeHandle>>)> {
        let mut graph = SceneGraph::new();
        let entries = doc.as_array().cloned().unwrap_or_default();
        let nodes = SceneNodeResolver::new(&entries, "test.json").resolve(&mut graph)?;
        Ok((graph, nodes))
    }

    #[test]
    fn forward_parent_is_created_first() {
        let (graph, nodes) = resolve(json!([
            { "node": { "parent_id": 1 } },
            { "node": { "parent_id": 1, "is_root_node": true } },
        ]))
        .unwrap();

        let child = nodes[0].unwrap();
        let parent = nodes[1].unwrap();
        assert_eq!(parent, graph.root(MemoryClass::Dynamic));
        assert_eq!(graph.node(child).unwrap().parent(), Some(parent));
    }

    #[test]
    fn parent_chain_three_deep_resolves_in_any_order() {
        let (graph, nodes) = resolve(json!([
            { "node": { "parent_id": 1, "is_static": true } },
            { "node": { "parent_id": 2 } },
            { "node": {} },
        ]))
        .unwrap();

        let [a, b, c] = [nodes[0].unwrap(), nodes[1].unwrap(), nodes[2].unwrap()];
        assert_eq!(graph.node(a).unwrap().parent(), Some(b));
        assert_eq!(graph.node(b).unwrap().parent(), Some(c));
        assert_eq!(graph.loose_nodes(), &[c]);
        assert!(graph.node(a).unwrap().is_static());
        assert!(!graph.node(b).unwrap().is_static());
    }

    #[test]
    fn two_node_cycle_is_rejected() {
        let err = resolve(json!([
            { "node": { "parent_id": 1 } },
            { "node": { "parent_id": 0 } },
        ]))
        .unwrap_err();
        assert!(matches!(err, HlmsError::CyclicParent { node: 1, .. }));
    }

    #[test]
    fn parent_out_of_range_is_unresolvable() {
        let err = resolve(json!([{ "node": { "parent_id": 7 } }])).unwrap_err();
        assert!(matches!(
            err,
            HlmsError::UnresolvableParent { node: 0, parent: 7, .. }
        ));
    }

    #[test]
    fn non_object_entries_are_skipped_but_cannot_be_parents() {
        let (_, nodes) = resolve(json!([5, { "node": {} }])).unwrap();
        assert!(nodes[0].is_none());
        assert!(nodes[1].is_some());

        let err = resolve(json!([5, { "node": { "parent_id": 0 } }])).unwrap_err();
        assert!(matches!(err, HlmsError::UnresolvableParent { node: 1, .. }));
    }

    #[test]
    fn missing_node_object_names_the_index() {
        let err = resolve(json!([{ "node": {} }, { "other": 1 }])).unwrap_err();
        assert!(matches!(err, HlmsError::MissingNodeObject { index: 1, .. }));
    }

    #[test]
    fn transform_fields_are_applied() {
        let (graph, nodes) = resolve(json!([{
            "node": {
                "position": [1.0f32.to_bits(), 2.0f32.to_bits(), 3.0f32.to_bits()],
                "scale": [2.0f32.to_bits(), 2.0f32.to_bits(), 2.0f32.to_bits()],
                "inherit_scale": false,
            }
        }]))
        .unwrap();

        let t = graph.node(nodes[0].unwrap()).unwrap().transform;
        assert_eq!(t.position, glam::Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(t.scale, glam::Vec3::splat(2.0));
        assert!(!t.inherit_scale);
        assert!(t.inherit_orientation);
    }
}
