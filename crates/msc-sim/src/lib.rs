#![deny(missing_docs)]

//! Direct simulation of multispecies coalescent models by repeated
//! ancestral sampling.

/// Ancestral samplers for species trees and gene trees.
pub mod coalescent;
/// YAML configuration schema and defaults.
pub mod config;
/// Deterministic seed derivation helpers.
pub mod determinism;
/// The run driver and its lifecycle.
pub mod driver;
/// Distribution graph with per-node draw flags.
pub mod graph;
/// State initialisation for fresh runs.
pub mod init;
/// Tree, trace and topology count loggers.
pub mod loggers;
/// Assembly of a runnable model from a configuration.
pub mod model;

pub use config::{ExecutionMode, SeedPolicy, SimulationConfig};
pub use driver::{DirectSimulator, DriverOptions, LoggerOutput, RunPhase, RunReport};
pub use graph::{ModelGraph, SampleableDistribution};
pub use init::{InitializedSet, StateInitializer};
pub use loggers::{SampleContext, SampleLogger};
pub use model::{build, SimulationModel};
