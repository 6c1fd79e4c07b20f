use std::collections::BTreeSet;

use msc_core::errors::{ErrorInfo, MscError};
use serde::{Deserialize, Serialize};

/// Ordered set of taxon labels. Leaf `i` of a tree carries label `i`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxonSet {
    labels: Vec<String>,
}

impl TaxonSet {
    /// Creates a taxon set from ordered labels.
    ///
    /// Labels must be unique and there must be at least two of them, the
    /// minimum for a rooted binary tree.
    pub fn new(labels: Vec<String>) -> Result<Self, MscError> {
        if labels.len() < 2 {
            return Err(MscError::Config(
                ErrorInfo::new("too-few-taxa", "a taxon set needs at least two labels")
                    .with_context("count", labels.len()),
            ));
        }
        let mut seen = BTreeSet::new();
        for label in &labels {
            if !seen.insert(label.as_str()) {
                return Err(MscError::Config(
                    ErrorInfo::new("duplicate-taxon", "taxon labels must be unique")
                        .with_context("label", label),
                ));
            }
        }
        Ok(Self { labels })
    }

    /// Returns the number of taxa.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Returns whether the set is empty. Always false for a validated set.
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Returns the label of the taxon at the given position.
    pub fn label(&self, index: usize) -> Result<&str, MscError> {
        self.labels.get(index).map(String::as_str).ok_or_else(|| {
            MscError::Config(
                ErrorInfo::new("unknown-taxon", "taxon index out of range")
                    .with_context("index", index)
                    .with_context("count", self.labels.len()),
            )
        })
    }

    /// Returns the position of the given label, if present.
    pub fn index_of(&self, label: &str) -> Option<usize> {
        self.labels.iter().position(|l| l == label)
    }

    /// Iterates over the labels in order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(String::as_str)
    }
}

/// Assignment of every gene tree leaf to a species tree leaf.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneTaxonMap {
    species_of: Vec<usize>,
}

impl GeneTaxonMap {
    /// Creates a map from per-gene-leaf species leaf indices.
    pub fn new(species_of: Vec<usize>, species_leaf_count: usize) -> Result<Self, MscError> {
        if species_of.is_empty() {
            return Err(MscError::Config(ErrorInfo::new(
                "empty-taxon-map",
                "a gene taxon map needs at least one lineage",
            )));
        }
        for (gene_leaf, &species_leaf) in species_of.iter().enumerate() {
            if species_leaf >= species_leaf_count {
                return Err(MscError::Config(
                    ErrorInfo::new("unknown-species-leaf", "mapped species leaf does not exist")
                        .with_context("gene-leaf", gene_leaf)
                        .with_context("species-leaf", species_leaf)
                        .with_context("species-count", species_leaf_count),
                ));
            }
        }
        Ok(Self { species_of })
    }

    /// Builds the map for `lineages` gene lineages sampled per species.
    ///
    /// Gene leaf `i` maps to species leaf `i / lineages`.
    pub fn regular(species_count: usize, lineages: usize) -> Result<Self, MscError> {
        if species_count == 0 || lineages == 0 {
            return Err(MscError::Config(
                ErrorInfo::new("empty-taxon-map", "species and lineage counts must be positive")
                    .with_context("species", species_count)
                    .with_context("lineages", lineages),
            ));
        }
        let species_of = (0..species_count * lineages).map(|i| i / lineages).collect();
        Self::new(species_of, species_count)
    }

    /// Returns the number of gene tree leaves covered by the map.
    pub fn gene_leaf_count(&self) -> usize {
        self.species_of.len()
    }

    /// Returns the species leaf a gene leaf belongs to.
    pub fn species_of(&self, gene_leaf: usize) -> Result<usize, MscError> {
        self.species_of.get(gene_leaf).copied().ok_or_else(|| {
            MscError::Config(
                ErrorInfo::new("unknown-gene-leaf", "gene leaf index out of range")
                    .with_context("gene-leaf", gene_leaf)
                    .with_context("count", self.species_of.len()),
            )
        })
    }
}
