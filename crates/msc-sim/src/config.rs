//! YAML-configurable description of a direct simulation run.

use std::collections::BTreeSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use msc_core::errors::ErrorInfo;
use msc_core::MscError;

/// Parameters governing one direct simulation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Number of independent joint samples to draw.
    pub sample_count: u64,
    /// Resume an earlier run. Resumed runs skip state initialisation.
    #[serde(default)]
    pub resume: bool,
    /// Master seed and substream policy.
    #[serde(default)]
    pub seed_policy: SeedPolicy,
    /// Execution backend for the sampling loop.
    #[serde(default)]
    pub execution: ExecutionMode,
    /// Species level model settings.
    pub species: SpeciesConfig,
    /// One entry per gene tree embedded in the species tree.
    pub genes: Vec<GeneConfig>,
    /// Effective population size settings.
    #[serde(default)]
    pub population: PopulationConfig,
    /// Output file layout.
    #[serde(default)]
    pub output: OutputConfig,
}

impl SimulationConfig {
    /// Parses a configuration from YAML text.
    pub fn from_yaml(text: &str) -> Result<Self, MscError> {
        serde_yaml::from_str(text)
            .map_err(|err| MscError::Serde(ErrorInfo::new("config-parse", err.to_string())))
    }

    /// Canonical hash of the configuration, recorded in run reports.
    pub fn digest(&self) -> Result<String, MscError> {
        let bytes = serde_json::to_vec(self)
            .map_err(|err| MscError::Serde(ErrorInfo::new("config-serialize", err.to_string())))?;
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        Ok(format!("msc-{:x}", hasher.finalize()))
    }

    /// Checks that the configuration describes a runnable simulation.
    pub fn validate(&self) -> Result<(), MscError> {
        if self.sample_count == 0 {
            return Err(config_error(
                "invalid-sample-count",
                "a run must draw at least one sample",
            ));
        }
        if let ExecutionMode::Threaded { threads } = self.execution {
            return Err(MscError::Config(
                ErrorInfo::new(
                    "unsupported-execution-mode",
                    "threaded execution is not implemented",
                )
                .with_context("threads", threads)
                .with_hint("use the single-threaded execution mode"),
            ));
        }
        if self.species.taxa.len() < 2 {
            return Err(MscError::Config(
                ErrorInfo::new("too-few-species", "at least two species taxa are required")
                    .with_context("taxa", self.species.taxa.len()),
            ));
        }
        if !self.species.birth_rate.is_finite() || self.species.birth_rate <= 0.0 {
            return Err(MscError::Config(
                ErrorInfo::new("invalid-birth-rate", "birth rate must be positive and finite")
                    .with_context("rate", self.species.birth_rate),
            ));
        }
        if !self.species.initial_root_height.is_finite() || self.species.initial_root_height <= 0.0
        {
            return Err(MscError::Config(
                ErrorInfo::new("invalid-root-height", "initial root height must be positive")
                    .with_context("height", self.species.initial_root_height),
            ));
        }
        if !self.population.size.is_finite() || self.population.size <= 0.0 {
            return Err(MscError::Config(
                ErrorInfo::new("non-positive-population", "population size must be positive")
                    .with_context("size", self.population.size),
            ));
        }
        if self.genes.is_empty() {
            return Err(config_error(
                "no-gene-trees",
                "at least one gene tree must be configured",
            ));
        }
        let mut labels = BTreeSet::new();
        for gene in &self.genes {
            if gene.label.is_empty() {
                return Err(config_error("empty-gene-label", "gene labels must be non-empty"));
            }
            if !labels.insert(gene.label.as_str()) {
                return Err(MscError::Config(
                    ErrorInfo::new("duplicate-gene-label", "gene labels must be unique")
                        .with_context("label", &gene.label)
                        .with_hint("output files are named after gene labels"),
                ));
            }
            if gene.lineages_per_species == 0 {
                return Err(MscError::Config(
                    ErrorInfo::new(
                        "invalid-lineage-count",
                        "each species must contribute at least one lineage",
                    )
                    .with_context("gene", &gene.label),
                ));
            }
            if !gene.ploidy.is_finite() || gene.ploidy <= 0.0 {
                return Err(MscError::Config(
                    ErrorInfo::new("invalid-ploidy", "ploidy must be positive and finite")
                        .with_context("gene", &gene.label)
                        .with_context("ploidy", gene.ploidy),
                ));
            }
        }
        if self.output.topology_draws == Some(0) {
            return Err(config_error(
                "invalid-draw-count",
                "topology counting needs at least one draw per sample",
            ));
        }
        Ok(())
    }
}

fn config_error(code: &'static str, message: &'static str) -> MscError {
    MscError::Config(ErrorInfo::new(code, message))
}

/// Deterministic seeding configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedPolicy {
    /// Master seed used for the run.
    #[serde(default = "default_master_seed")]
    pub master_seed: u64,
    /// Optional label recorded alongside the seed in run reports.
    #[serde(default)]
    pub label: Option<String>,
}

fn default_master_seed() -> u64 {
    0xC0A1_E5CE_D15E_ED00_u64
}

impl Default for SeedPolicy {
    fn default() -> Self {
        Self {
            master_seed: default_master_seed(),
            label: None,
        }
    }
}

/// Execution backend for the sampling loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ExecutionMode {
    /// Draw every sample on the calling thread.
    SingleThreaded,
    /// Pooled backend reserved for later work; rejected during validation.
    Threaded {
        /// Requested worker threads.
        #[serde(default = "default_threads")]
        threads: usize,
    },
}

fn default_threads() -> usize {
    2
}

impl Default for ExecutionMode {
    fn default() -> Self {
        ExecutionMode::SingleThreaded
    }
}

/// Species tree settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeciesConfig {
    /// Label of the species tree in logs and trace columns.
    #[serde(default = "default_species_label")]
    pub label: String,
    /// Species taxon labels, one leaf each.
    pub taxa: Vec<String>,
    /// Birth rate of the pure birth prior over the species tree.
    #[serde(default = "default_birth_rate")]
    pub birth_rate: f64,
    /// Root height of the deterministic starting tree.
    #[serde(default = "default_root_height")]
    pub initial_root_height: f64,
}

fn default_species_label() -> String {
    "species".to_string()
}

fn default_birth_rate() -> f64 {
    1.0
}

fn default_root_height() -> f64 {
    1.0
}

/// Settings of one gene tree drawn inside the species tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneConfig {
    /// Gene label, also used to name output files.
    pub label: String,
    /// Gene lineages sampled per species.
    #[serde(default = "default_lineages")]
    pub lineages_per_species: usize,
    /// Ploidy scaling of the effective population size.
    #[serde(default = "default_ploidy")]
    pub ploidy: f64,
}

fn default_lineages() -> usize {
    2
}

fn default_ploidy() -> f64 {
    2.0
}

/// Effective population size settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PopulationConfig {
    /// Constant effective size assigned to every species branch.
    #[serde(default = "default_population_size")]
    pub size: f64,
}

fn default_population_size() -> f64 {
    1.0
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            size: default_population_size(),
        }
    }
}

/// Output file layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory receiving every output file. Created if missing.
    #[serde(default = "default_output_directory")]
    pub directory: PathBuf,
    /// Write one NEXUS trees file per logged tree.
    #[serde(default = "default_enabled")]
    pub trees: bool,
    /// Write the tab separated trace file.
    #[serde(default = "default_enabled")]
    pub trace: bool,
    /// Trace filename relative to `directory`.
    #[serde(default = "default_trace_filename")]
    pub trace_file: PathBuf,
    /// Redraws per sample for topology counting. Disabled when absent.
    #[serde(default)]
    pub topology_draws: Option<u64>,
}

fn default_output_directory() -> PathBuf {
    PathBuf::from(".")
}

fn default_enabled() -> bool {
    true
}

fn default_trace_filename() -> PathBuf {
    PathBuf::from("trace.tsv")
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_output_directory(),
            trees: default_enabled(),
            trace: default_enabled(),
            trace_file: default_trace_filename(),
            topology_draws: None,
        }
    }
}
