//! Sample loggers writing trees and traces to injected sinks.

use std::fmt;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use indexmap::IndexSet;

use msc_core::errors::ErrorInfo;
use msc_core::{DistId, MscError, RngHandle, StateNodeId, TreeId};
use msc_kernel::ModelState;
use msc_tree::{numeric_newick, topology_signature, BinaryTree};

use crate::graph::ModelGraph;

/// Borrowed view of the model handed to loggers for one sample.
pub struct SampleContext<'a> {
    /// Distribution graph, available for loggers that redraw subtrees.
    pub graph: &'a mut ModelGraph,
    /// Model state realised by the current sample.
    pub state: &'a mut ModelState,
}

/// Receives every drawn sample of a run.
///
/// The driver calls [`open`](SampleLogger::open) once before the first
/// sample, [`log_sample`](SampleLogger::log_sample) per sample and
/// [`close`](SampleLogger::close) once after the last one.
pub trait SampleLogger {
    /// Human readable label used in logs and diagnostics.
    fn label(&self) -> &str;

    /// Destination file, when the logger writes to one.
    fn output_path(&self) -> Option<&Path> {
        None
    }

    /// Writes headers before the first sample.
    fn open(&mut self, state: &ModelState) -> Result<(), MscError>;

    /// Records one drawn sample.
    fn log_sample(&mut self, index: u64, ctx: &mut SampleContext<'_>) -> Result<(), MscError>;

    /// Writes trailers and flushes after the last sample.
    fn close(&mut self, state: &ModelState) -> Result<(), MscError>;
}

/// Tree a logger reads, either the species tree or a stored gene tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeTarget {
    /// The species tree embedded in the model state.
    Species,
    /// A gene tree held by the tree store.
    Stored(TreeId),
}

impl TreeTarget {
    fn resolve<'a>(&self, state: &'a ModelState) -> Result<&'a BinaryTree, MscError> {
        match self {
            TreeTarget::Species => Ok(&state.species_tree),
            TreeTarget::Stored(id) => state.trees.get(*id),
        }
    }
}

/// Writes sampled trees as a NEXUS trees block.
pub struct TreeLogger {
    label: String,
    target: TreeTarget,
    sink: Box<dyn Write>,
    path: Option<PathBuf>,
}

impl TreeLogger {
    /// Creates the logger writing into `sink`.
    ///
    /// `path` only describes the destination for reporting. The sink is
    /// used as handed in.
    pub fn new(
        label: impl Into<String>,
        target: TreeTarget,
        sink: Box<dyn Write>,
        path: Option<PathBuf>,
    ) -> Self {
        Self {
            label: label.into(),
            target,
            sink,
            path,
        }
    }

    fn write_header(&mut self, labels: &[String]) -> io::Result<()> {
        writeln!(self.sink, "#NEXUS")?;
        writeln!(self.sink)?;
        writeln!(self.sink, "Begin taxa;")?;
        writeln!(self.sink, "\tDimensions ntax={};", labels.len())?;
        writeln!(self.sink, "\t\tTaxlabels")?;
        for label in labels {
            writeln!(self.sink, "\t\t\t{label}")?;
        }
        writeln!(self.sink, "\t\t\t;")?;
        writeln!(self.sink, "End;")?;
        writeln!(self.sink, "Begin trees;")?;
        writeln!(self.sink, "\tTranslate")?;
        for (index, label) in labels.iter().enumerate() {
            let separator = if index + 1 == labels.len() { "" } else { "," };
            writeln!(self.sink, "\t\t{:>4} {}{}", index + 1, label, separator)?;
        }
        writeln!(self.sink, ";")?;
        Ok(())
    }
}

impl SampleLogger for TreeLogger {
    fn label(&self) -> &str {
        &self.label
    }

    fn output_path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn open(&mut self, state: &ModelState) -> Result<(), MscError> {
        let tree = self.target.resolve(state)?;
        let labels: Vec<String> = tree.taxa().iter().map(str::to_string).collect();
        self.write_header(&labels)
            .map_err(|err| MscError::from_io("tree-log-open", &err))
    }

    fn log_sample(&mut self, index: u64, ctx: &mut SampleContext<'_>) -> Result<(), MscError> {
        let tree = self.target.resolve(ctx.state)?;
        let newick = numeric_newick(tree)?;
        writeln!(self.sink, "tree STATE_{index} = {newick};")
            .map_err(|err| MscError::from_io("tree-log-write", &err))
    }

    fn close(&mut self, _state: &ModelState) -> Result<(), MscError> {
        writeln!(self.sink, "End;")
            .and_then(|_| self.sink.flush())
            .map_err(|err| MscError::from_io("tree-log-close", &err))
    }
}

/// Writes a tab separated trace of scalar model summaries.
///
/// The first column is the sample number, followed by the species tree
/// root height and one column per tracked parameter dimension.
pub struct TraceLogger {
    label: String,
    params: Vec<StateNodeId>,
    sink: Box<dyn Write>,
    path: Option<PathBuf>,
}

impl TraceLogger {
    /// Creates the logger tracking the given parameters.
    pub fn new(
        label: impl Into<String>,
        params: Vec<StateNodeId>,
        sink: Box<dyn Write>,
        path: Option<PathBuf>,
    ) -> Self {
        Self {
            label: label.into(),
            params,
            sink,
            path,
        }
    }

    fn columns(&self, state: &ModelState) -> Result<Vec<String>, MscError> {
        let mut columns = vec![format!("{}.height", state.species_tree.label)];
        for &param in &self.params {
            let param = state.real_param(param)?;
            if param.dimension() == 1 {
                columns.push(param.label.clone());
            } else {
                for dim in 0..param.dimension() {
                    columns.push(format!("{}.{}", param.label, dim + 1));
                }
            }
        }
        Ok(columns)
    }
}

impl SampleLogger for TraceLogger {
    fn label(&self) -> &str {
        &self.label
    }

    fn output_path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn open(&mut self, state: &ModelState) -> Result<(), MscError> {
        let columns = self.columns(state)?;
        writeln!(self.sink, "Sample\t{}", columns.join("\t"))
            .map_err(|err| MscError::from_io("trace-log-open", &err))
    }

    fn log_sample(&mut self, index: u64, ctx: &mut SampleContext<'_>) -> Result<(), MscError> {
        let state = &*ctx.state;
        let root = state.species_tree.root();
        let mut values = vec![state.species_tree.height(root)?];
        for &param in &self.params {
            values.extend_from_slice(state.real_param(param)?.values());
        }
        let rendered: Vec<String> = values.iter().map(|value| value.to_string()).collect();
        writeln!(self.sink, "{}\t{}", index, rendered.join("\t"))
            .map_err(|err| MscError::from_io("trace-log-write", &err))
    }

    fn close(&mut self, _state: &ModelState) -> Result<(), MscError> {
        self.sink
            .flush()
            .map_err(|err| MscError::from_io("trace-log-close", &err))
    }
}

/// Counts distinct gene tree topologies under the current species tree.
///
/// Per sample the logger redraws one gene tree term a fixed number of
/// times from its own random stream, records how many distinct topologies
/// appeared, and restores the tree it overwrote. Only the gene term's draw
/// flag is cleared, so the species tree stays fixed across the redraws.
pub struct TopologyCountLogger {
    label: String,
    gene_term: DistId,
    tree: TreeId,
    draws: u64,
    rng: RngHandle,
    sink: Box<dyn Write>,
    path: Option<PathBuf>,
}

impl TopologyCountLogger {
    /// Creates the logger redrawing `gene_term` `draws` times per sample.
    pub fn new(
        label: impl Into<String>,
        gene_term: DistId,
        tree: TreeId,
        draws: u64,
        seed: u64,
        sink: Box<dyn Write>,
        path: Option<PathBuf>,
    ) -> Result<Self, MscError> {
        let label = label.into();
        if draws == 0 {
            return Err(MscError::Config(
                ErrorInfo::new(
                    "invalid-draw-count",
                    "topology counting needs at least one draw per sample",
                )
                .with_context("logger", &label),
            ));
        }
        Ok(Self {
            label,
            gene_term,
            tree,
            draws,
            rng: RngHandle::from_seed(seed),
            sink,
            path,
        })
    }
}

impl fmt::Debug for TopologyCountLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TopologyCountLogger")
            .field("label", &self.label)
            .field("gene_term", &self.gene_term)
            .field("tree", &self.tree)
            .field("draws", &self.draws)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl SampleLogger for TopologyCountLogger {
    fn label(&self) -> &str {
        &self.label
    }

    fn output_path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn open(&mut self, _state: &ModelState) -> Result<(), MscError> {
        writeln!(self.sink, "Sample\tunique_topologies\tdraws")
            .map_err(|err| MscError::from_io("topology-log-open", &err))
    }

    fn log_sample(&mut self, index: u64, ctx: &mut SampleContext<'_>) -> Result<(), MscError> {
        let snapshot = ctx.state.trees.get(self.tree)?.clone();
        let mut seen = IndexSet::new();
        for _ in 0..self.draws {
            ctx.graph.set_sampled(self.gene_term, false)?;
            ctx.graph.sample(self.gene_term, ctx.state, &mut self.rng)?;
            seen.insert(topology_signature(ctx.state.trees.get(self.tree)?)?);
        }
        ctx.state.trees.get_mut(self.tree)?.assign_from(&snapshot)?;
        writeln!(self.sink, "{}\t{}\t{}", index, seen.len(), self.draws)
            .map_err(|err| MscError::from_io("topology-log-write", &err))
    }

    fn close(&mut self, _state: &ModelState) -> Result<(), MscError> {
        self.sink
            .flush()
            .map_err(|err| MscError::from_io("topology-log-close", &err))
    }
}
