//! Driver drawing a fixed number of independent samples from the model.

use std::fmt;
use std::path::PathBuf;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use msc_core::errors::ErrorInfo;
use msc_core::{DistId, MscError, RngHandle};
use msc_kernel::ModelState;

use crate::determinism;
use crate::graph::ModelGraph;
use crate::init::{InitializedSet, StateInitializer};
use crate::loggers::{SampleContext, SampleLogger};

/// Lifecycle phase of a [`DirectSimulator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunPhase {
    /// Configured but not started.
    Configured,
    /// Running state initialisers.
    Initializing,
    /// Drawing samples.
    Sampling,
    /// Closing loggers.
    Finalizing,
    /// Completed successfully.
    Done,
    /// Aborted by an error.
    Failed,
}

impl RunPhase {
    fn as_str(&self) -> &'static str {
        match self {
            RunPhase::Configured => "configured",
            RunPhase::Initializing => "initializing",
            RunPhase::Sampling => "sampling",
            RunPhase::Finalizing => "finalizing",
            RunPhase::Done => "done",
            RunPhase::Failed => "failed",
        }
    }
}

/// Inputs collected before a driver is built.
///
/// The distribution and the sample count are required; configuring without
/// them is an error.
#[derive(Debug, Clone)]
pub struct DriverOptions {
    /// Label of the driver in diagnostics.
    pub label: String,
    /// Root of the distribution graph to sample from.
    pub root: Option<DistId>,
    /// Number of independent samples to draw.
    pub sample_count: Option<u64>,
    /// Resume an earlier run, skipping state initialisation.
    pub resume: bool,
    /// Master seed the driver derives its substream from.
    pub master_seed: u64,
    /// Optional label recorded next to the seed in the report.
    pub seed_label: Option<String>,
    /// Canonical configuration hash recorded in the report.
    pub config_digest: Option<String>,
}

/// File produced by one logger during a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggerOutput {
    /// Label of the logger that wrote the file.
    pub label: String,
    /// Destination path.
    pub path: PathBuf,
}

/// Summary returned to callers after a run completes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Number of samples drawn.
    pub samples: u64,
    /// Master seed the run was derived from.
    pub master_seed: u64,
    /// Optional seed label captured from the configuration.
    pub seed_label: Option<String>,
    /// Canonical hash of the configuration, when one was supplied.
    pub config_digest: Option<String>,
    /// Wall clock time the sampling loop started, RFC 3339.
    pub started_at: String,
    /// Wall clock time the sampling loop finished, RFC 3339.
    pub finished_at: String,
    /// Files written by the loggers, in registration order.
    pub outputs: Vec<LoggerOutput>,
}

impl RunReport {
    /// One line completion message.
    pub fn summary(&self) -> String {
        format!("Direct simulation of {} samples completed.", self.samples)
    }
}

/// Draws repeated independent samples by ancestral simulation.
///
/// Each draw clears every flag reachable from the root distribution and
/// samples the root, realising conditions before dependents. Loggers record
/// every draw. A driver runs at most once.
pub struct DirectSimulator {
    label: String,
    root: DistId,
    sample_count: u64,
    resume: bool,
    master_seed: u64,
    seed_label: Option<String>,
    config_digest: Option<String>,
    phase: RunPhase,
    rng: RngHandle,
    initializers: Vec<Box<dyn StateInitializer>>,
    loggers: Vec<Box<dyn SampleLogger>>,
}

impl fmt::Debug for DirectSimulator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectSimulator")
            .field("label", &self.label)
            .field("root", &self.root)
            .field("sample_count", &self.sample_count)
            .field("resume", &self.resume)
            .field("master_seed", &self.master_seed)
            .field("seed_label", &self.seed_label)
            .field("config_digest", &self.config_digest)
            .field("phase", &self.phase)
            .field("initializers", &self.initializers.len())
            .field("loggers", &self.loggers.len())
            .finish_non_exhaustive()
    }
}

impl DirectSimulator {
    /// Builds a driver from its options, checking the required inputs.
    pub fn configure(options: DriverOptions) -> Result<Self, MscError> {
        let root = options.root.ok_or_else(|| {
            MscError::Config(
                ErrorInfo::new("missing-distribution", "a distribution to sample is required")
                    .with_context("driver", &options.label),
            )
        })?;
        let sample_count = options.sample_count.ok_or_else(|| {
            MscError::Config(
                ErrorInfo::new("missing-sample-count", "the number of samples is required")
                    .with_context("driver", &options.label),
            )
        })?;
        if sample_count == 0 {
            return Err(MscError::Config(
                ErrorInfo::new("invalid-sample-count", "a run must draw at least one sample")
                    .with_context("driver", &options.label),
            ));
        }
        let rng = RngHandle::from_seed(determinism::driver_seed(options.master_seed));
        Ok(Self {
            label: options.label,
            root,
            sample_count,
            resume: options.resume,
            master_seed: options.master_seed,
            seed_label: options.seed_label,
            config_digest: options.config_digest,
            phase: RunPhase::Configured,
            rng,
            initializers: Vec::new(),
            loggers: Vec::new(),
        })
    }

    /// Registers a state initialiser, run in registration order.
    pub fn add_initializer(&mut self, initializer: Box<dyn StateInitializer>) {
        self.initializers.push(initializer);
    }

    /// Registers a sample logger, invoked in registration order.
    pub fn add_logger(&mut self, logger: Box<dyn SampleLogger>) {
        self.loggers.push(logger);
    }

    /// Returns the driver label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Returns the current lifecycle phase.
    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    /// Draws every sample, logging each one.
    ///
    /// Fresh runs first check that no state node is claimed by two
    /// initialisers and then run each initialiser once. Resumed runs skip
    /// both steps. Any error aborts the run and leaves the driver in the
    /// failed phase.
    pub fn run(
        &mut self,
        graph: &mut ModelGraph,
        state: &mut ModelState,
    ) -> Result<RunReport, MscError> {
        if self.phase != RunPhase::Configured {
            return Err(MscError::InvalidState(
                ErrorInfo::new("driver-already-run", "a driver can only run once")
                    .with_context("driver", &self.label)
                    .with_context("phase", self.phase.as_str()),
            ));
        }
        let outcome = self.run_inner(graph, state);
        if outcome.is_err() {
            self.phase = RunPhase::Failed;
        }
        outcome
    }

    fn run_inner(
        &mut self,
        graph: &mut ModelGraph,
        state: &mut ModelState,
    ) -> Result<RunReport, MscError> {
        self.phase = RunPhase::Initializing;
        if !self.resume {
            let mut claimed = InitializedSet::new();
            for initializer in &self.initializers {
                for node in initializer.targets() {
                    claimed.claim(node, initializer.label())?;
                }
            }
            for initializer in &mut self.initializers {
                initializer.initialize(state, &mut self.rng)?;
            }
        }
        for logger in &mut self.loggers {
            logger.open(state)?;
        }

        self.phase = RunPhase::Sampling;
        let started_at = Utc::now().to_rfc3339();
        for index in 0..self.sample_count {
            graph.clear_sampled_flags(self.root)?;
            graph.sample(self.root, state, &mut self.rng)?;
            for logger in &mut self.loggers {
                let mut ctx = SampleContext {
                    graph: &mut *graph,
                    state: &mut *state,
                };
                logger.log_sample(index, &mut ctx)?;
            }
        }

        self.phase = RunPhase::Finalizing;
        for logger in &mut self.loggers {
            logger.close(state)?;
        }
        let finished_at = Utc::now().to_rfc3339();
        let outputs = self
            .loggers
            .iter()
            .filter_map(|logger| {
                logger.output_path().map(|path| LoggerOutput {
                    label: logger.label().to_string(),
                    path: path.to_path_buf(),
                })
            })
            .collect();
        self.phase = RunPhase::Done;
        Ok(RunReport {
            samples: self.sample_count,
            master_seed: self.master_seed,
            seed_label: self.seed_label.clone(),
            config_digest: self.config_digest.clone(),
            started_at,
            finished_at,
            outputs,
        })
    }
}
