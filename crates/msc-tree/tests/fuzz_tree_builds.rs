use msc_core::rng::RngHandle;
use msc_core::StateNodeId;
use msc_tree::{numeric_newick, topology_signature, BinaryTree, TaxonSet};
use proptest::prelude::*;

fn sample_taxa(n: usize) -> TaxonSet {
    let labels: Vec<String> = (0..n).map(|i| format!("t{}", i + 1)).collect();
    TaxonSet::new(labels).unwrap()
}

fn random_coalescence(n: usize, rng: &mut RngHandle) -> BinaryTree {
    let node_count = 2 * n - 1;
    let mut parent = vec![None; node_count];
    let mut left = vec![None; node_count];
    let mut right = vec![None; node_count];
    let mut height = vec![0.0; node_count];
    let mut active: Vec<usize> = (0..n).collect();
    let mut time = 0.0;
    for k in 0..n - 1 {
        let internal = n + k;
        let a = active.swap_remove(rng.next_index(active.len()));
        let b = active.swap_remove(rng.next_index(active.len()));
        time += 0.1 + rng.next_f64();
        left[internal] = Some(a);
        right[internal] = Some(b);
        parent[a] = Some(internal);
        parent[b] = Some(internal);
        height[internal] = time;
        active.push(internal);
    }
    BinaryTree::from_parts(
        StateNodeId::from_raw(7),
        "fuzzed",
        sample_taxa(n),
        parent,
        left,
        right,
        height,
    )
    .unwrap()
}

fn check_invariants(tree: &BinaryTree) {
    tree.validate().unwrap();
    let root = tree.root();
    let root_height = tree.height(root).unwrap();
    for node in 0..tree.node_count() {
        assert!(tree.height(node).unwrap() <= root_height);
    }
    let signature = topology_signature(tree).unwrap();
    assert_eq!(
        signature.matches('(').count(),
        tree.internal_node_count(),
        "signature {signature} does not close over every internal node"
    );
}

proptest! {
    #[test]
    fn random_coalescences_stay_well_formed(seed in any::<u64>(), n in 2usize..12) {
        let mut rng = RngHandle::from_seed(seed);
        let tree = random_coalescence(n, &mut rng);
        check_invariants(&tree);

        let mut scaled = tree.clone();
        let factor = 0.5 + rng.next_f64() * 1.5;
        scaled.scale(factor).unwrap();
        check_invariants(&scaled);
        prop_assert_eq!(
            topology_signature(&tree).unwrap(),
            topology_signature(&scaled).unwrap()
        );

        let mut copy = BinaryTree::ladder(StateNodeId::from_raw(8), "copy", sample_taxa(n), 1.0).unwrap();
        copy.assign_from(&tree).unwrap();
        prop_assert_eq!(numeric_newick(&copy).unwrap(), numeric_newick(&tree).unwrap());
    }
}
