use msc_core::rng::RngHandle;
use msc_core::{DistId, OperatorId, StateNodeId};
use msc_kernel::{
    GeneTreeLink, GeneTreeOperator, ModelState, OperatorBase, TreeScale, TreeSource,
    UniformNodeHeight,
};
use msc_tree::{BinaryTree, TaxonSet};

fn sample_taxa(n: usize) -> TaxonSet {
    let labels: Vec<String> = (0..n).map(|i| format!("t{}", i + 1)).collect();
    TaxonSet::new(labels).unwrap()
}

fn sample_single_tree_state(n: usize, root_height: f64) -> (ModelState, msc_core::TreeId) {
    let species =
        BinaryTree::ladder(StateNodeId::from_raw(1), "species", sample_taxa(3), 5.0).unwrap();
    let mut state = ModelState::new(species);
    let tree =
        BinaryTree::ladder(StateNodeId::from_raw(10), "gene1", sample_taxa(n), root_height)
            .unwrap();
    let id = state.insert_tree(tree);
    (state, id)
}

fn fixed_base(state: &ModelState, tree: msc_core::TreeId, label: &str) -> OperatorBase {
    let links = vec![GeneTreeLink::new(tree, DistId::from_raw(100))];
    let source = TreeSource::configure(links, None, state).unwrap();
    OperatorBase::new(OperatorId::from_raw(1), label, source)
}

#[test]
fn uniform_height_moves_one_internal_node_within_bounds() {
    let (mut state, tree_id) = sample_single_tree_state(4, 3.0);
    let mut op = UniformNodeHeight::new(fixed_base(&state, tree_id, "uniform"));
    let mut rng = RngHandle::from_seed(41);

    let before = state.trees.get(tree_id).unwrap().clone();
    let proposal = op.propose(&mut state, &mut rng).unwrap();
    assert_eq!(proposal.log_hastings, 0.0);
    assert_eq!(proposal.tree, Some(tree_id));

    let after = state.trees.get(tree_id).unwrap();
    after.validate().unwrap();
    let mut changed = Vec::new();
    for node in 0..after.node_count() {
        if after.height(node).unwrap() != before.height(node).unwrap() {
            changed.push(node);
        }
    }
    assert_eq!(changed.len(), 1);
    let node = changed[0];
    assert!(!after.is_leaf(node));
    assert_ne!(node, after.root());
    let parent = after.parent(node).unwrap().unwrap();
    assert!(after.height(node).unwrap() <= after.height(parent).unwrap());
    assert!(after.height(node).unwrap() >= after.max_child_height(node).unwrap());
}

#[test]
fn uniform_height_rejects_a_two_taxon_tree() {
    let (mut state, tree_id) = sample_single_tree_state(2, 1.0);
    let mut op = UniformNodeHeight::new(fixed_base(&state, tree_id, "uniform"));
    let mut rng = RngHandle::from_seed(1);

    let before = state.trees.get(tree_id).unwrap().clone();
    let proposal = op.propose(&mut state, &mut rng).unwrap();
    assert!(proposal.is_rejected());
    assert_eq!(state.trees.get(tree_id).unwrap(), &before);
}

#[test]
fn full_scale_multiplies_every_internal_height() {
    let (mut state, tree_id) = sample_single_tree_state(3, 2.0);
    let mut op = TreeScale::new(fixed_base(&state, tree_id, "scale"), 0.75, false).unwrap();
    let mut rng = RngHandle::from_seed(13);

    let before = state.trees.get(tree_id).unwrap().clone();
    let proposal = op.propose(&mut state, &mut rng).unwrap();
    let after = state.trees.get(tree_id).unwrap();
    after.validate().unwrap();

    let factor = after.height(after.root()).unwrap() / before.height(before.root()).unwrap();
    assert!(factor >= 0.75 && factor <= 1.0 / 0.75);
    for node in after.internal_nodes() {
        let ratio = after.height(node).unwrap() / before.height(node).unwrap();
        assert!((ratio - factor).abs() < 1e-12);
    }
    for leaf in after.leaves() {
        assert_eq!(after.height(leaf).unwrap(), 0.0);
    }
    // Two internal nodes scaled.
    assert!((proposal.log_hastings - 2.0 * factor.ln()).abs() < 1e-9);
}

#[test]
fn root_only_scale_leaves_the_rest_alone() {
    let (mut state, tree_id) = sample_single_tree_state(4, 3.0);
    let mut op = TreeScale::new(fixed_base(&state, tree_id, "scale"), 0.9, true).unwrap();
    let mut rng = RngHandle::from_seed(29);

    let before = state.trees.get(tree_id).unwrap().clone();
    let proposal = op.propose(&mut state, &mut rng).unwrap();
    assert!(!proposal.is_rejected());
    let after = state.trees.get(tree_id).unwrap();
    after.validate().unwrap();

    let root = after.root();
    let factor = after.height(root).unwrap() / before.height(root).unwrap();
    assert!((proposal.log_hastings - factor.ln()).abs() < 1e-9);
    for node in 0..after.node_count() {
        if node != root {
            assert_eq!(after.height(node).unwrap(), before.height(node).unwrap());
        }
    }
}

#[test]
fn root_only_scale_rejects_instead_of_inverting() {
    // Zero slack between the root and its taller child, so every shrinking
    // draw must reject and every growing draw must keep validity.
    let mut rejections = 0;
    let mut acceptances = 0;
    for seed in 0..40 {
        let (mut state, tree_id) = sample_single_tree_state(3, 2.0);
        {
            let tree = state.trees.get_mut(tree_id).unwrap();
            let root = tree.root();
            let bound = tree.max_child_height(root).unwrap();
            tree.set_height(root, bound).unwrap();
        }
        let before = state.trees.get(tree_id).unwrap().clone();
        let mut op = TreeScale::new(fixed_base(&state, tree_id, "scale"), 0.5, true).unwrap();
        let mut rng = RngHandle::from_seed(seed);
        let proposal = op.propose(&mut state, &mut rng).unwrap();
        if proposal.is_rejected() {
            rejections += 1;
            assert_eq!(state.trees.get(tree_id).unwrap(), &before);
        } else {
            acceptances += 1;
            state.trees.get(tree_id).unwrap().validate().unwrap();
        }
    }
    assert!(rejections > 0);
    assert!(acceptances > 0);
}

#[test]
fn scale_factor_must_sit_inside_the_unit_interval() {
    let (state, tree_id) = sample_single_tree_state(3, 2.0);
    for factor in [0.0, 1.0, 1.5, -0.3] {
        let err = TreeScale::new(fixed_base(&state, tree_id, "scale"), factor, false).unwrap_err();
        assert_eq!(err.info().code, "scale-factor-range");
    }
}
