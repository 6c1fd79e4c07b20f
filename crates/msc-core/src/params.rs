//! Bounded real and integer parameter state nodes.

use serde::{Deserialize, Serialize};

use crate::errors::{ErrorInfo, MscError};
use crate::StateNodeId;

/// Multi-dimensional real valued parameter with inclusive bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealParameter {
    /// State node identity of the parameter.
    pub id: StateNodeId,
    /// Human readable label used in logs and diagnostics.
    pub label: String,
    values: Vec<f64>,
    lower: f64,
    upper: f64,
}

impl RealParameter {
    /// Creates an unbounded parameter from initial values.
    pub fn new(id: StateNodeId, label: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            id,
            label: label.into(),
            values,
            lower: f64::NEG_INFINITY,
            upper: f64::INFINITY,
        }
    }

    /// Sets inclusive bounds, returning the parameter for chaining.
    pub fn with_bounds(mut self, lower: f64, upper: f64) -> Self {
        self.lower = lower;
        self.upper = upper;
        self
    }

    /// Returns the number of dimensions.
    pub fn dimension(&self) -> usize {
        self.values.len()
    }

    /// Returns the lower bound.
    pub fn lower(&self) -> f64 {
        self.lower
    }

    /// Returns the upper bound.
    pub fn upper(&self) -> f64 {
        self.upper
    }

    /// Returns the value at the given dimension.
    pub fn value(&self, dim: usize) -> Result<f64, MscError> {
        self.values
            .get(dim)
            .copied()
            .ok_or_else(|| index_error(&self.label, dim, self.values.len()))
    }

    /// Returns all values in dimension order.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Sets the value at the given dimension, enforcing the bounds.
    pub fn set_value(&mut self, dim: usize, value: f64) -> Result<(), MscError> {
        if value < self.lower || value > self.upper {
            return Err(bounds_error(&self.label, dim, value.to_string()));
        }
        let len = self.values.len();
        let slot = self
            .values
            .get_mut(dim)
            .ok_or_else(|| index_error(&self.label, dim, len))?;
        *slot = value;
        Ok(())
    }

    /// Overwrites every dimension with the same value.
    pub fn fill(&mut self, value: f64) -> Result<(), MscError> {
        for dim in 0..self.values.len() {
            self.set_value(dim, value)?;
        }
        Ok(())
    }

    /// Grows or shrinks the parameter, filling new dimensions with `value`.
    pub fn resize(&mut self, dimension: usize, value: f64) {
        self.values.resize(dimension, value);
    }
}

/// Multi-dimensional integer valued parameter with inclusive bounds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegerParameter {
    /// State node identity of the parameter.
    pub id: StateNodeId,
    /// Human readable label used in logs and diagnostics.
    pub label: String,
    values: Vec<i64>,
    lower: i64,
    upper: i64,
}

impl IntegerParameter {
    /// Creates a parameter from initial values and inclusive bounds.
    pub fn new(
        id: StateNodeId,
        label: impl Into<String>,
        values: Vec<i64>,
        lower: i64,
        upper: i64,
    ) -> Self {
        Self {
            id,
            label: label.into(),
            values,
            lower,
            upper,
        }
    }

    /// Returns the number of dimensions.
    pub fn dimension(&self) -> usize {
        self.values.len()
    }

    /// Returns the lower bound.
    pub fn lower(&self) -> i64 {
        self.lower
    }

    /// Returns the upper bound.
    pub fn upper(&self) -> i64 {
        self.upper
    }

    /// Replaces the lower bound. Existing values are not revalidated.
    pub fn set_lower(&mut self, lower: i64) {
        self.lower = lower;
    }

    /// Replaces the upper bound. Existing values are not revalidated.
    ///
    /// Kernel resize moves adjust the bound before or after rewriting the
    /// affected entries, so the intermediate state may be out of range.
    pub fn set_upper(&mut self, upper: i64) {
        self.upper = upper;
    }

    /// Returns the value at the given dimension.
    pub fn value(&self, dim: usize) -> Result<i64, MscError> {
        self.values
            .get(dim)
            .copied()
            .ok_or_else(|| index_error(&self.label, dim, self.values.len()))
    }

    /// Returns all values in dimension order.
    pub fn values(&self) -> &[i64] {
        &self.values
    }

    /// Sets the value at the given dimension, enforcing the bounds.
    pub fn set_value(&mut self, dim: usize, value: i64) -> Result<(), MscError> {
        if value < self.lower || value > self.upper {
            return Err(bounds_error(&self.label, dim, value.to_string()));
        }
        let len = self.values.len();
        let slot = self
            .values
            .get_mut(dim)
            .ok_or_else(|| index_error(&self.label, dim, len))?;
        *slot = value;
        Ok(())
    }

    /// Returns the value at the given dimension as a non-negative index.
    pub fn index_value(&self, dim: usize) -> Result<usize, MscError> {
        let value = self.value(dim)?;
        usize::try_from(value).map_err(|_| {
            MscError::Config(
                ErrorInfo::new("negative-index-value", "parameter value is not a valid index")
                    .with_context("parameter", &self.label)
                    .with_context("dimension", dim)
                    .with_context("value", value),
            )
        })
    }
}

fn index_error(label: &str, dim: usize, dimension: usize) -> MscError {
    MscError::Config(
        ErrorInfo::new("parameter-index", "dimension index out of range")
            .with_context("parameter", label)
            .with_context("dimension", dim)
            .with_context("size", dimension),
    )
}

fn bounds_error(label: &str, dim: usize, value: String) -> MscError {
    MscError::Config(
        ErrorInfo::new("parameter-bounds", "value outside parameter bounds")
            .with_context("parameter", label)
            .with_context("dimension", dim)
            .with_context("value", value),
    )
}
