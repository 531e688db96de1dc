use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use slotmap::SlotMap;

use super::SkeletonPoint;
use crate::error::TopologyError;

slotmap::new_key_type! {
    /// Unique identifier for a point in a [`SkeletonTree`].
    pub struct NodeKey;
}

/// A skeleton point together with its resolved links.
#[derive(Debug, Clone)]
pub struct NodeData {
    /// The point as supplied.
    pub point: SkeletonPoint,
    /// Position of the point in the input slice.
    pub input_index: usize,
    /// Parent node, `None` for roots.
    pub parent: Option<NodeKey>,
    /// Child nodes in input order.
    pub children: Vec<NodeKey>,
}

/// Arena of skeleton points with explicit parent and child links.
///
/// Points are looked up by their SWC id once, while building the arena.
/// Afterwards all traversal goes through [`NodeKey`]s, so the order of rows
/// in the input no longer matters.
#[derive(Debug, Default)]
pub struct SkeletonTree {
    nodes: SlotMap<NodeKey, NodeData>,
    index: HashMap<i64, NodeKey>,
    input_order: Vec<NodeKey>,
    roots: Vec<NodeKey>,
}

impl SkeletonTree {
    /// Builds the arena from a slice of points.
    ///
    /// # Errors
    ///
    /// Returns [`TopologyError::DuplicateId`] if two points share an id and
    /// [`TopologyError::MissingParent`] if a parent id does not resolve.
    pub fn from_points(points: &[SkeletonPoint]) -> Result<Self, TopologyError> {
        let mut tree = Self {
            nodes: SlotMap::with_capacity_and_key(points.len()),
            index: HashMap::with_capacity(points.len()),
            input_order: Vec::with_capacity(points.len()),
            roots: Vec::new(),
        };

        for (input_index, point) in points.iter().enumerate() {
            if tree.index.contains_key(&point.id) {
                return Err(TopologyError::DuplicateId(point.id));
            }
            let key = tree.nodes.insert(NodeData {
                point: point.clone(),
                input_index,
                parent: None,
                children: Vec::new(),
            });
            tree.index.insert(point.id, key);
            tree.input_order.push(key);
        }

        for i in 0..tree.input_order.len() {
            let key = tree.input_order[i];
            let point = &tree.nodes[key].point;
            let Some(parent_id) = point.parent else {
                tree.roots.push(key);
                continue;
            };
            let parent = *tree
                .index
                .get(&parent_id)
                .ok_or(TopologyError::MissingParent {
                    id: point.id,
                    parent: parent_id,
                })?;
            tree.nodes[key].parent = Some(parent);
            tree.nodes[parent].children.push(key);
        }

        Ok(tree)
    }

    /// Returns the number of points in the tree.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if the tree holds no points.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns the node data for `key`, if it belongs to this tree.
    #[must_use]
    pub fn node(&self, key: NodeKey) -> Option<&NodeData> {
        self.nodes.get(key)
    }

    /// Looks up the node holding the point with SWC id `id`.
    #[must_use]
    pub fn key_of(&self, id: i64) -> Option<NodeKey> {
        self.index.get(&id).copied()
    }

    /// Root nodes in input order.
    #[must_use]
    pub fn roots(&self) -> &[NodeKey] {
        &self.roots
    }

    /// Children of `key` in input order. Unknown keys have no children.
    #[must_use]
    pub fn children(&self, key: NodeKey) -> &[NodeKey] {
        self.nodes.get(key).map_or(&[], |n| n.children.as_slice())
    }

    /// Nodes in input order.
    #[must_use]
    pub fn input_order(&self) -> &[NodeKey] {
        &self.input_order
    }

    /// Returns all nodes ordered so that every parent precedes its
    /// children.
    ///
    /// Among the nodes whose parent has already been placed, the one that
    /// came first in the input is placed next. Input that is already
    /// parent-first therefore keeps its row order exactly; other input is
    /// reordered as little as needed.
    ///
    /// # Errors
    ///
    /// Returns [`TopologyError::Unreachable`] if some point cannot be reached
    /// from a root, which happens when parent links form a cycle.
    pub fn topological_order(&self) -> Result<Vec<NodeKey>, TopologyError> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut ready: BinaryHeap<Reverse<usize>> = self
            .roots
            .iter()
            .map(|k| Reverse(self.nodes[*k].input_index))
            .collect();

        while let Some(Reverse(index)) = ready.pop() {
            let key = self.input_order[index];
            order.push(key);
            ready.extend(
                self.nodes[key]
                    .children
                    .iter()
                    .map(|c| Reverse(self.nodes[*c].input_index)),
            );
        }

        if order.len() != self.nodes.len() {
            let mut placed = vec![false; self.nodes.len()];
            for key in &order {
                placed[self.nodes[*key].input_index] = true;
            }
            if let Some(index) = placed.iter().position(|p| !p) {
                let key = self.input_order[index];
                return Err(TopologyError::Unreachable(self.nodes[key].point.id));
            }
        }

        Ok(order)
    }
}

impl std::ops::Index<NodeKey> for SkeletonTree {
    type Output = NodeData;

    fn index(&self, key: NodeKey) -> &NodeData {
        &self.nodes[key]
    }
}
