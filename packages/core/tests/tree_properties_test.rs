//! Property tests for the in-memory tree helpers
//!
//! Forests are generated so that every node's parent comes earlier in the
//! list, which makes them acyclic by construction. The properties compare
//! `TreeIndex` and `build_tree` against a plain parent-chain walk.

use menutree_core::{build_tree, MenuNode, MenuServiceError, MenuTreeNode, TreeIndex};
use proptest::prelude::*;
use proptest::sample::Index;
use std::collections::{HashMap, HashSet};

fn node(id: String, parent_id: Option<String>, order: u32) -> MenuNode {
    let mut node = MenuNode::new(id.to_uppercase(), None, parent_id, order);
    node.id = id;
    node
}

/// Acyclic forest with dense sibling orders
fn arb_forest() -> impl Strategy<Value = Vec<MenuNode>> {
    prop::collection::vec(prop::option::of(any::<Index>()), 1..40).prop_map(|parents| {
        let mut next_order: HashMap<Option<String>, u32> = HashMap::new();
        let mut nodes: Vec<MenuNode> = Vec::with_capacity(parents.len());

        for (i, parent) in parents.iter().enumerate() {
            let parent_id = match parent {
                Some(index) if i > 0 => Some(nodes[index.index(i)].id.clone()),
                _ => None,
            };
            let slot = next_order.entry(parent_id.clone()).or_insert(0);
            nodes.push(node(format!("n{:03}", i), parent_id, *slot));
            *slot += 1;
        }
        nodes
    })
}

/// Forest plus two picked node ids
fn arb_forest_with_pair() -> impl Strategy<Value = (Vec<MenuNode>, String, String)> {
    (arb_forest(), any::<Index>(), any::<Index>()).prop_map(|(nodes, a, b)| {
        let a = nodes[a.index(nodes.len())].id.clone();
        let b = nodes[b.index(nodes.len())].id.clone();
        (nodes, a, b)
    })
}

/// Whether walking up from `node` reaches `root` (a node is in its own subtree)
fn in_subtree(parents: &HashMap<&str, Option<&str>>, node: &str, root: &str) -> bool {
    let mut current = Some(node);
    while let Some(id) = current {
        if id == root {
            return true;
        }
        current = parents.get(id).copied().flatten();
    }
    false
}

fn parent_map(nodes: &[MenuNode]) -> HashMap<&str, Option<&str>> {
    nodes
        .iter()
        .map(|n| (n.id.as_str(), n.parent_id.as_deref()))
        .collect()
}

fn collect_ids(tree: &[MenuTreeNode]) -> Vec<String> {
    tree.iter().flat_map(|root| root.ids()).collect()
}

fn assert_siblings_sorted(tree: &[MenuTreeNode]) -> Result<(), TestCaseError> {
    let mut stack: Vec<&[MenuTreeNode]> = vec![tree];
    while let Some(group) = stack.pop() {
        for pair in group.windows(2) {
            let left = (pair[0].node.order, &pair[0].node.id);
            let right = (pair[1].node.order, &pair[1].node.id);
            prop_assert!(left < right, "siblings out of order: {:?} before {:?}", left, right);
        }
        for child in group {
            stack.push(&child.children);
        }
    }
    Ok(())
}

proptest! {
    #[test]
    fn check_new_parent_rejects_exactly_self_and_descendants(
        (nodes, node_id, parent_id) in arb_forest_with_pair()
    ) {
        let index = TreeIndex::from_nodes(&nodes);
        let parents = parent_map(&nodes);

        let result = index.check_new_parent(&node_id, &parent_id);

        if node_id == parent_id {
            let is_self_parent = matches!(result, Err(MenuServiceError::SelfParent { .. }));
            prop_assert!(is_self_parent);
        } else if in_subtree(&parents, &parent_id, &node_id) {
            let is_cycle = matches!(result, Err(MenuServiceError::CycleDetected { .. }));
            prop_assert!(is_cycle);
        } else {
            prop_assert!(result.is_ok());
        }
    }

    #[test]
    fn descendant_ids_match_parent_chain_walk((nodes, root_id, _) in arb_forest_with_pair()) {
        let index = TreeIndex::from_nodes(&nodes);
        let parents = parent_map(&nodes);

        let descendants: HashSet<String> = index.descendant_ids(&root_id).into_iter().collect();
        let expected: HashSet<String> = nodes
            .iter()
            .filter(|n| n.id != root_id && in_subtree(&parents, &n.id, &root_id))
            .map(|n| n.id.clone())
            .collect();

        prop_assert_eq!(&descendants, &expected);
        let subtree = index.subtree_ids(&root_id);
        prop_assert_eq!(subtree.first(), Some(&root_id));
        prop_assert_eq!(subtree.len(), expected.len() + 1);
    }

    #[test]
    fn generated_forests_pass_audit(nodes in arb_forest()) {
        let violations = TreeIndex::from_nodes(&nodes).audit();
        prop_assert!(violations.is_empty(), "unexpected violations: {:?}", violations);
    }

    #[test]
    fn build_tree_ignores_input_order(
        (nodes, shuffled) in arb_forest()
            .prop_flat_map(|nodes| (Just(nodes.clone()), Just(nodes).prop_shuffle()))
    ) {
        prop_assert_eq!(build_tree(&nodes), build_tree(&shuffled));
    }

    #[test]
    fn build_tree_keeps_every_node_once(nodes in arb_forest()) {
        let tree = build_tree(&nodes);
        let ids = collect_ids(&tree);

        let unique: HashSet<&String> = ids.iter().collect();
        let expected: HashSet<&String> = nodes.iter().map(|n| &n.id).collect();
        prop_assert_eq!(ids.len(), nodes.len());
        prop_assert_eq!(unique, expected);

        assert_siblings_sorted(&tree)?;
    }
}
