//! Newick rendering for tree logs and topology keys.

use msc_core::errors::{ErrorInfo, MscError};

use crate::tree::BinaryTree;

/// Renders a tree as Newick with numeric leaf labels and branch lengths.
///
/// Leaves are written as their taxon number (index plus one) so the output
/// pairs with a translate table. Children are ordered by the largest node
/// index in their clade, which keeps output stable across structurally equal
/// trees. No trailing semicolon is appended.
pub fn numeric_newick(tree: &BinaryTree) -> Result<String, MscError> {
    let order = post_order(tree)?;
    let mut max_node = vec![0usize; tree.node_count()];
    let mut rendered = vec![String::new(); tree.node_count()];
    for &node in &order {
        match tree.children(node)? {
            None => {
                max_node[node] = node;
                rendered[node] = (node + 1).to_string();
            }
            Some((l, r)) => {
                max_node[node] = node.max(max_node[l]).max(max_node[r]);
                let (first, second) = if max_node[l] <= max_node[r] { (l, r) } else { (r, l) };
                let first_len = tree.height(node)? - tree.height(first)?;
                let second_len = tree.height(node)? - tree.height(second)?;
                let clade = format!(
                    "({}:{},{}:{})",
                    rendered[first], first_len, rendered[second], second_len
                );
                rendered[node] = clade;
            }
        }
    }
    Ok(std::mem::take(&mut rendered[tree.root()]))
}

/// Renders the topology of a tree as a canonical parenthesised string.
///
/// Children are ordered by the smallest taxon number in their clade, so any
/// two trees with the same unrooted-label topology and root placement map to
/// the same string. Heights and branch lengths are ignored.
pub fn topology_signature(tree: &BinaryTree) -> Result<String, MscError> {
    let order = post_order(tree)?;
    let mut min_leaf = vec![usize::MAX; tree.node_count()];
    let mut rendered = vec![String::new(); tree.node_count()];
    for &node in &order {
        match tree.children(node)? {
            None => {
                min_leaf[node] = node;
                rendered[node] = (node + 1).to_string();
            }
            Some((l, r)) => {
                min_leaf[node] = min_leaf[l].min(min_leaf[r]);
                let (first, second) = if min_leaf[l] <= min_leaf[r] { (l, r) } else { (r, l) };
                let clade = format!("({},{})", rendered[first], rendered[second]);
                rendered[node] = clade;
            }
        }
    }
    Ok(std::mem::take(&mut rendered[tree.root()]))
}

fn post_order(tree: &BinaryTree) -> Result<Vec<usize>, MscError> {
    let mut order = Vec::with_capacity(tree.node_count());
    let mut stack = vec![tree.root()];
    while let Some(node) = stack.pop() {
        if order.len() > tree.node_count() {
            return Err(MscError::Tree(
                ErrorInfo::new("cyclic-structure", "tree traversal revisited a node")
                    .with_context("tree", &tree.label),
            ));
        }
        order.push(node);
        if let Some((l, r)) = tree.children(node)? {
            stack.push(l);
            stack.push(r);
        }
    }
    order.reverse();
    Ok(order)
}
