//! Assembly of a runnable simulation from its configuration.

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use msc_core::errors::ErrorInfo;
use msc_core::params::RealParameter;
use msc_core::{DistId, MscError, StateNodeId, TreeId};
use msc_kernel::ModelState;
use msc_tree::{BinaryTree, GeneTaxonMap, TaxonSet};

use crate::coalescent::{GeneTreeCoalescent, MultispeciesCoalescent, YuleSpeciesTree};
use crate::config::SimulationConfig;
use crate::determinism;
use crate::driver::{DirectSimulator, DriverOptions, RunReport};
use crate::graph::ModelGraph;
use crate::init::{ConstantParameterInit, LadderTreeInit};
use crate::loggers::{TopologyCountLogger, TraceLogger, TreeLogger, TreeTarget};

/// A fully wired simulation: state, distribution graph and driver.
pub struct SimulationModel {
    /// Mutable model state the samples are drawn into.
    pub state: ModelState,
    /// Distribution graph rooted at the compound coalescent term.
    pub graph: ModelGraph,
    /// Root distribution of the graph.
    pub root: DistId,
    /// Configured driver, ready to run once.
    pub driver: DirectSimulator,
}

impl SimulationModel {
    /// Runs the driver over this model's graph and state.
    pub fn run(&mut self) -> Result<RunReport, MscError> {
        self.driver.run(&mut self.graph, &mut self.state)
    }
}

/// Builds the model a configuration describes.
///
/// State node ids 1 and up are assigned in construction order, starting
/// with the species tree. Distribution ids follow the same scheme with the
/// compound root at id 1.
pub fn build(config: &SimulationConfig) -> Result<SimulationModel, MscError> {
    config.validate()?;
    let digest = config.digest()?;
    let master_seed = config.seed_policy.master_seed;

    let species_taxa = TaxonSet::new(config.species.taxa.clone())?;
    let species = BinaryTree::ladder(
        StateNodeId::from_raw(1),
        config.species.label.as_str(),
        species_taxa,
        config.species.initial_root_height,
    )?;
    let species_count = species.leaf_count();
    let species_nodes = species.node_count();
    let mut state = ModelState::new(species);

    let pop_id = state.allocate_state_node_id();
    state.insert_real_param(
        RealParameter::new(pop_id, "popSize", vec![config.population.size; species_nodes])
            .with_bounds(0.0, f64::INFINITY),
    );
    let birth_id = state.allocate_state_node_id();
    state.insert_real_param(
        RealParameter::new(birth_id, "birthRate", vec![config.species.birth_rate])
            .with_bounds(0.0, f64::INFINITY),
    );

    let mut graph = ModelGraph::new();
    let root = DistId::from_raw(1);
    let species_term = DistId::from_raw(2);
    graph.insert(
        species_term,
        Box::new(YuleSpeciesTree::new("speciesTreePrior", birth_id)),
    )?;

    struct GeneEntry {
        label: String,
        tree: TreeId,
        state_node: StateNodeId,
        term: DistId,
    }

    let mut components = vec![species_term];
    let mut genes = Vec::new();
    for (slot, gene) in config.genes.iter().enumerate() {
        let map = GeneTaxonMap::regular(species_count, gene.lineages_per_species)?;
        let mut labels = Vec::with_capacity(map.gene_leaf_count());
        for gene_leaf in 0..map.gene_leaf_count() {
            let species_leaf = map.species_of(gene_leaf)?;
            let copy = gene_leaf % gene.lineages_per_species + 1;
            labels.push(format!("{}_{}", config.species.taxa[species_leaf], copy));
        }
        let gene_taxa = TaxonSet::new(labels)?;
        let state_node = state.allocate_state_node_id();
        let tree = BinaryTree::ladder(
            state_node,
            gene.label.as_str(),
            gene_taxa,
            config.species.initial_root_height,
        )?;
        let tree_id = state.insert_tree(tree);
        let term = DistId::from_raw(3 + slot as u64);
        graph.insert(
            term,
            Box::new(GeneTreeCoalescent::new(
                format!("{}.prior", gene.label),
                tree_id,
                species_term,
                map,
                pop_id,
                gene.ploidy,
            )?),
        )?;
        components.push(term);
        genes.push(GeneEntry {
            label: gene.label.clone(),
            tree: tree_id,
            state_node,
            term,
        });
    }
    graph.insert(
        root,
        Box::new(MultispeciesCoalescent::new(
            "multispeciesCoalescent",
            components,
        )?),
    )?;

    let mut driver = DirectSimulator::configure(DriverOptions {
        label: "directSimulator".to_string(),
        root: Some(root),
        sample_count: Some(config.sample_count),
        resume: config.resume,
        master_seed,
        seed_label: config.seed_policy.label.clone(),
        config_digest: Some(digest),
    })?;

    driver.add_initializer(Box::new(ConstantParameterInit::new(
        "popSizeInit",
        pop_id,
        config.population.size,
    )));
    for gene in &genes {
        driver.add_initializer(Box::new(LadderTreeInit::new(
            format!("{}.init", gene.label),
            gene.tree,
            gene.state_node,
            config.species.initial_root_height,
        )));
    }

    let out_dir = &config.output.directory;
    fs::create_dir_all(out_dir).map_err(|err| {
        MscError::Io(
            ErrorInfo::new("output-directory", err.to_string())
                .with_context("path", out_dir.display().to_string()),
        )
    })?;
    if config.output.trees {
        let species_path = out_dir.join(format!("{}.trees", config.species.label));
        driver.add_logger(Box::new(TreeLogger::new(
            format!("{}.trees", config.species.label),
            TreeTarget::Species,
            create_sink(&species_path)?,
            Some(species_path.clone()),
        )));
        for gene in &genes {
            let path = out_dir.join(format!("{}.trees", gene.label));
            driver.add_logger(Box::new(TreeLogger::new(
                format!("{}.trees", gene.label),
                TreeTarget::Stored(gene.tree),
                create_sink(&path)?,
                Some(path.clone()),
            )));
        }
    }
    if config.output.trace {
        let path = out_dir.join(&config.output.trace_file);
        driver.add_logger(Box::new(TraceLogger::new(
            "trace",
            vec![pop_id, birth_id],
            create_sink(&path)?,
            Some(path.clone()),
        )));
    }
    if let Some(draws) = config.output.topology_draws {
        for (slot, gene) in genes.iter().enumerate() {
            let path = out_dir.join(format!("{}.topologies.tsv", gene.label));
            driver.add_logger(Box::new(TopologyCountLogger::new(
                format!("{}.topologies", gene.label),
                gene.term,
                gene.tree,
                draws,
                determinism::logger_seed(master_seed, slot),
                create_sink(&path)?,
                Some(path.clone()),
            )?));
        }
    }

    Ok(SimulationModel {
        state,
        graph,
        root,
        driver,
    })
}

fn create_sink(path: &Path) -> Result<Box<dyn Write>, MscError> {
    let file = File::create(path).map_err(|err| {
        MscError::Io(
            ErrorInfo::new("logger-open", err.to_string())
                .with_context("path", path.display().to_string()),
        )
    })?;
    Ok(Box::new(file))
}
