#![forbid(unsafe_code)]

use crate::model::Node;
use std::collections::BTreeMap;

/// Parent/child links reconstructed purely from `(grove, depth, queue)`
/// ordering, without any further lookups against the store.
#[derive(Clone, Debug, Default)]
pub struct NestedNodes {
    order: Vec<i64>,
    parents: BTreeMap<i64, Option<i64>>,
    children: BTreeMap<i64, Vec<i64>>,
}

impl NestedNodes {
    /// All ids in queue order.
    pub fn ids(&self) -> &[i64] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Parent within the set; `None` for set roots and unknown ids.
    pub fn parent(&self, id: i64) -> Option<i64> {
        self.parents.get(&id).copied().flatten()
    }

    pub fn children(&self, id: i64) -> &[i64] {
        self.children.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Ids without a parent in the set, in queue order.
    pub fn roots(&self) -> Vec<i64> {
        self.order
            .iter()
            .copied()
            .filter(|id| self.parent(*id).is_none())
            .collect()
    }
}

/// Rebuild hierarchy from a flat node set.
///
/// The set need not start at depth 0 (a subtree slice is fine) and may mix
/// several groves; one reconstruction stack is kept per grove. A node whose
/// parent slot is vacant (depth fault, or parent outside the slice) becomes
/// a root of the set.
pub fn nested_nodes(nodes: &[Node]) -> NestedNodes {
    if nodes.is_empty() {
        return NestedNodes::default();
    }

    let mut sorted: Vec<Node> = nodes.to_vec();
    // Queue alone fixes the visit order; groves are dispatched to their own
    // stacks below, so no grove sort key is needed.
    sorted.sort_by_key(|node| node.queue);

    let min_depth = sorted
        .iter()
        .map(|node| node.depth)
        .min()
        .unwrap_or(crate::model::ROOT_DEPTH);

    let mut order = Vec::with_capacity(sorted.len());
    let mut parents = BTreeMap::new();
    let mut children: BTreeMap<i64, Vec<i64>> = BTreeMap::new();
    let mut stacks: BTreeMap<Option<i64>, Vec<Option<i64>>> = BTreeMap::new();

    for node in &sorted {
        let slot = usize::try_from(node.depth - min_depth).unwrap_or(0);
        let stack = stacks.entry(node.grove).or_default();

        let parent = if slot == 0 {
            None
        } else {
            stack.get(slot - 1).copied().flatten()
        };
        if let Some(parent_id) = parent {
            children.entry(parent_id).or_default().push(node.id);
        }
        parents.insert(node.id, parent);
        order.push(node.id);

        // Drop deeper slots, then occupy this one; a jump over missing
        // depths leaves vacant slots in between.
        stack.truncate(slot);
        if stack.len() < slot {
            stack.resize(slot, None);
        }
        stack.push(Some(node.id));
    }

    NestedNodes {
        order,
        parents,
        children,
    }
}

/// Id tree materialized from [`nested_nodes`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IdTree {
    pub id: i64,
    pub children: Vec<IdTree>,
}

pub fn nested_ids(nodes: &[Node]) -> Vec<IdTree> {
    let nested = nested_nodes(nodes);
    nested
        .roots()
        .into_iter()
        .map(|id| id_tree(id, &nested))
        .collect()
}

fn id_tree(id: i64, nested: &NestedNodes) -> IdTree {
    IdTree {
        id,
        children: nested
            .children(id)
            .iter()
            .map(|child| id_tree(*child, nested))
            .collect(),
    }
}
