use msc_core::params::IntegerParameter;
use msc_core::rng::RngHandle;
use msc_core::{DistId, KernelPriorId, OperatorId, StateNodeId};
use msc_kernel::{
    GeneTreeKernel, GeneTreeOperator, KernelExpander, KernelPrior, ModelState, OperatorBase,
    PointerTree, TreeSource,
};
use msc_tree::{BinaryTree, TaxonSet};

fn sample_taxa(n: usize) -> TaxonSet {
    let labels: Vec<String> = (0..n).map(|i| format!("t{}", i + 1)).collect();
    TaxonSet::new(labels).unwrap()
}

fn sample_kernel_state(
    members: usize,
    pointers: usize,
    size_lower: i64,
    size_upper: i64,
) -> (ModelState, KernelPriorId) {
    let species =
        BinaryTree::ladder(StateNodeId::from_raw(1), "species", sample_taxa(3), 5.0).unwrap();
    let mut state = ModelState::new(species);
    let mut member_ids = Vec::new();
    for i in 0..members {
        let tree = BinaryTree::ladder(
            StateNodeId::from_raw(10 + i as u64),
            format!("kernel-m{}", i + 1),
            sample_taxa(4),
            2.0,
        )
        .unwrap();
        member_ids.push(state.insert_tree(tree));
    }
    let kernel = GeneTreeKernel::new(StateNodeId::from_raw(50), "kernel", member_ids);
    let size = IntegerParameter::new(
        StateNodeId::from_raw(51),
        "kernel-size",
        vec![members as i64],
        size_lower,
        size_upper,
    );
    let indicator_values: Vec<i64> = (0..pointers).map(|i| (i % members) as i64).collect();
    let indicator = IntegerParameter::new(
        StateNodeId::from_raw(52),
        "indicator",
        indicator_values,
        0,
        members as i64 - 1,
    );
    let ptrs: Vec<PointerTree> = (0..pointers)
        .map(|i| PointerTree::new(StateNodeId::from_raw(60 + i as u64), format!("gene{}", i + 1), i))
        .collect();
    let prior = KernelPrior::new(
        KernelPriorId::from_raw(1),
        "gtk",
        DistId::from_raw(5),
        kernel,
        size,
        indicator,
        ptrs,
    )
    .unwrap();
    let id = prior.id;
    state.insert_prior(prior);
    (state, id)
}

fn sample_expander(state: &ModelState, prior_id: KernelPriorId, poisson: f64) -> KernelExpander {
    let source = TreeSource::configure(Vec::new(), Some(prior_id), state).unwrap();
    let base = OperatorBase::new(OperatorId::from_raw(8), "expander", source);
    KernelExpander::new(base, poisson).unwrap()
}

fn check_kernel_invariants(state: &mut ModelState, prior_id: KernelPriorId) {
    let probe = OperatorBase::new(
        OperatorId::from_raw(99),
        "probe",
        TreeSource::Kernel(prior_id),
    );
    let links = probe.links(state).unwrap();
    let prior = state.prior(prior_id).unwrap();
    let size = prior.kernel().size();
    assert_eq!(links.len(), size);
    assert_eq!(prior.size().value(0).unwrap(), size as i64);
    assert!(prior.size().value(0).unwrap() >= prior.size().lower());
    assert!(prior.size().value(0).unwrap() <= prior.size().upper());
    assert_eq!(prior.indicator().upper(), size as i64 - 1);
    for pointer in prior.pointers() {
        pointer.resolve(prior.indicator(), prior.kernel()).unwrap();
    }
}

#[test]
fn expand_is_forced_at_the_lower_bound() {
    let (mut state, prior_id) = sample_kernel_state(1, 2, 1, 8);
    let mut op = sample_expander(&state, prior_id, 1.0);
    let mut rng = RngHandle::from_seed(3);

    let proposal = op.propose(&mut state, &mut rng).unwrap();
    assert!(proposal.log_hastings.is_finite());
    assert!(proposal.description.starts_with("kernel-expand:1->2"));
    assert_eq!(state.prior(prior_id).unwrap().kernel().size(), 2);
    assert_eq!(state.trees.len(), 2);
    let new_tree = proposal.tree.unwrap();
    assert!(state.trees.contains(new_tree));
    check_kernel_invariants(&mut state, prior_id);
}

#[test]
fn contract_is_forced_at_the_upper_bound() {
    let (mut state, prior_id) = sample_kernel_state(3, 6, 1, 3);
    let mut op = sample_expander(&state, prior_id, 1.0);
    let mut rng = RngHandle::from_seed(5);

    let proposal = op.propose(&mut state, &mut rng).unwrap();
    assert!(proposal.log_hastings.is_finite());
    assert!(proposal.description.starts_with("kernel-contract:3->2"));
    assert_eq!(state.prior(prior_id).unwrap().kernel().size(), 2);
    assert_eq!(state.trees.len(), 2);
    check_kernel_invariants(&mut state, prior_id);
}

#[test]
fn expand_hastings_matches_the_dimension_change() {
    // Lower bound pinned at the current size, so the move must expand. A
    // vanishing poisson scale keeps every pointer where it is, which makes
    // the Hastings ratio ln(orig/proposed) up to the poisson rate itself.
    let (mut state, prior_id) = sample_kernel_state(3, 4, 3, 8);
    let mut op = sample_expander(&state, prior_id, 1e-9);
    let mut rng = RngHandle::from_seed(17);

    let before: Vec<i64> = state
        .prior(prior_id)
        .unwrap()
        .indicator()
        .values()
        .to_vec();
    let proposal = op.propose(&mut state, &mut rng).unwrap();
    let expected = (3.0f64 / 4.0).ln();
    assert!(
        (proposal.log_hastings - expected).abs() < 1e-6,
        "log hastings {} expected {}",
        proposal.log_hastings,
        expected
    );
    let after: Vec<i64> = state
        .prior(prior_id)
        .unwrap()
        .indicator()
        .values()
        .to_vec();
    assert_eq!(before, after);
    check_kernel_invariants(&mut state, prior_id);
}

#[test]
fn contract_renumbers_survivors_and_reassigns_orphans() {
    let (mut state, prior_id) = sample_kernel_state(3, 6, 1, 3);
    let mut op = sample_expander(&state, prior_id, 1.0);
    let mut rng = RngHandle::from_seed(23);

    op.propose(&mut state, &mut rng).unwrap();
    let prior = state.prior(prior_id).unwrap();
    assert_eq!(prior.kernel().size(), 2);
    for slot in 0..6 {
        let value = prior.indicator().index_value(slot).unwrap();
        assert!(value < 2, "indicator slot {slot} points at {value}");
    }
    check_kernel_invariants(&mut state, prior_id);
}

#[test]
fn size_parameter_mismatch_is_fatal() {
    let (mut state, prior_id) = sample_kernel_state(2, 3, 1, 8);
    state
        .prior_mut(prior_id)
        .unwrap()
        .size_mut()
        .set_value(0, 3)
        .unwrap();
    let mut op = sample_expander(&state, prior_id, 1.0);
    let mut rng = RngHandle::from_seed(2);

    let err = op.propose(&mut state, &mut rng).unwrap_err();
    assert_eq!(err.info().code, "kernel-size-mismatch");
}

#[test]
fn expander_rejects_bad_configuration() {
    let (state, prior_id) = sample_kernel_state(2, 3, 1, 8);
    let source = TreeSource::configure(Vec::new(), Some(prior_id), &state).unwrap();

    let base = OperatorBase::new(OperatorId::from_raw(1), "expander", source.clone());
    let err = KernelExpander::new(base, 0.0).unwrap_err();
    assert_eq!(err.info().code, "poisson-scale-range");

    let fixed = OperatorBase::new(
        OperatorId::from_raw(2),
        "expander",
        TreeSource::Fixed(vec![msc_kernel::GeneTreeLink::new(
            msc_core::TreeId::from_raw(0),
            DistId::from_raw(0),
        )]),
    );
    let err = KernelExpander::new(fixed, 1.0).unwrap_err();
    assert_eq!(err.info().code, "expander-needs-kernel");
}

#[test]
fn randomized_resizes_keep_every_invariant() {
    let (mut state, prior_id) = sample_kernel_state(2, 4, 1, 5);
    let mut op = sample_expander(&state, prior_id, 1.0);
    let mut rng = RngHandle::from_seed(20240801);

    let mut grew = 0;
    let mut shrank = 0;
    for _ in 0..300 {
        let before = state.prior(prior_id).unwrap().kernel().size();
        let proposal = op.propose(&mut state, &mut rng).unwrap();
        assert!(!proposal.log_hastings.is_nan());
        let after = state.prior(prior_id).unwrap().kernel().size();
        if after > before {
            grew += 1;
        } else {
            shrank += 1;
        }
        assert_eq!(state.trees.len(), after);
        check_kernel_invariants(&mut state, prior_id);
    }
    assert!(grew > 0);
    assert!(shrank > 0);
}
