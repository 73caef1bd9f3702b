mod cg;

pub use cg::*;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Copy, Clone, Debug, PartialEq, Error, Serialize, Deserialize)]
pub enum Status {
    #[error("Success")]
    Success,
    #[error("Maximum number of linear solver iterations exceeded")]
    MaximumIterationsExceeded,
    #[error("Operator is not positive definite along the search direction")]
    IndefiniteOperator,
    #[error("NaN detected")]
    NanDetected,
}

impl Default for Status {
    fn default() -> Self {
        Status::Success
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct SolveResult {
    /// Number of iterations of an iterative solver.
    pub iterations: u32,
    /// Absolute residual 2-norm.
    pub residual: f64,
    /// Relative residual 2-norm.
    ///
    /// Residual divided by the norm of the initial residual.
    pub error: f64,
    /// Final status of the linear solve.
    pub status: Status,
}

impl std::fmt::Display for SolveResult {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "{} after {} iterations (residual: {:.3e}, relative: {:.3e})",
            self.status, self.iterations, self.residual, self.error
        )
    }
}
