//! Fatal error taxonomy for an inversion run.
//!
//! Soft conditions (non-convergence, degenerate quadratics, undefined error
//! ratios) are never raised; they are carried in the per-sample results.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// The measured curve a validation failure refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SampleField {
    Rv,
    Rh,
}

impl fmt::Display for SampleField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SampleField::Rv => write!(f, "Rv"),
            SampleField::Rh => write!(f, "Rh"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum InversionError {
    #[error("Invalid configuration for {field}: {reason}")]
    Configuration { field: &'static str, reason: String },

    #[error("Sample {index} at depth {depth} has non-positive {field} ({value})")]
    InvalidSample {
        index: usize,
        depth: f64,
        field: SampleField,
        value: f64,
    },

    #[error("Sample {index} at depth {depth} does not follow depth {previous}; depth must be strictly increasing")]
    UnorderedDepth {
        index: usize,
        depth: f64,
        previous: f64,
    },
}

impl InversionError {
    pub fn configuration(field: &'static str, reason: impl Into<String>) -> Self {
        InversionError::Configuration {
            field,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, InversionError>;
