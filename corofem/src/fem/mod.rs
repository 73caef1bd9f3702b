//! Time integration of the corotated FEM model.

pub mod explicit;
pub mod implicit;
pub mod linsolve;
pub mod solver;
pub mod state;

use serde::{Deserialize, Serialize};

use crate::boundary::BoundingBox;
use crate::Error;
use linsolve::{SolveResult, Status};

/// Time integration scheme together with its scheme specific parameters.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Integrator {
    /// Symplectic (semi-implicit) Euler.
    ///
    /// The velocity update is additionally scaled by `damping_scale`, an empirical factor
    /// that must be tuned together with the time step and stiffness for stability.
    Explicit { damping_scale: f64 },
    /// Backward Euler linearized about the rest stiffness and solved with conjugate gradient.
    Implicit { max_iterations: u32, tolerance: f64 },
}

impl Integrator {
    pub const fn explicit() -> Self {
        Integrator::Explicit {
            damping_scale: 1.25e-5,
        }
    }
    pub const fn implicit() -> Self {
        Integrator::Implicit {
            max_iterations: 10,
            tolerance: 1e-6,
        }
    }
}

impl Default for Integrator {
    fn default() -> Self {
        Integrator::explicit()
    }
}

/// Simulation parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimParams {
    pub time_step: f64,
    pub gravity: [f64; 3],
    pub integrator: Integrator,
    /// Box confining the simulated vertices. No confinement if `None`.
    pub bounds: Option<BoundingBox>,
    /// If set, the mesh is uniformly rescaled to this volume before precomputation.
    pub volume_normalization: Option<f64>,
}

impl Default for SimParams {
    fn default() -> Self {
        SimParams::explicit()
    }
}

impl SimParams {
    /// Parameters of the reference explicit scene.
    pub const fn explicit() -> Self {
        SimParams {
            time_step: 7e-4,
            gravity: [0.0, -9.8, 0.0],
            integrator: Integrator::explicit(),
            bounds: Some(BoundingBox {
                half_extents: [1.0, 0.1, 1.0],
            }),
            volume_normalization: None,
        }
    }

    /// Parameters of the reference implicit scene.
    pub const fn implicit() -> Self {
        SimParams {
            time_step: 1.0 / 30.0,
            integrator: Integrator::implicit(),
            ..SimParams::explicit()
        }
    }

    pub fn validate(&self) -> Result<(), Error> {
        let invalid = |name: &str| {
            Err(Error::InvalidParameter {
                name: name.to_string(),
            })
        };
        if !(self.time_step > 0.0) || !self.time_step.is_finite() {
            return invalid("time_step");
        }
        if !self.gravity.iter().all(|g| g.is_finite()) {
            return invalid("gravity");
        }
        match self.integrator {
            Integrator::Explicit { damping_scale } => {
                if !(damping_scale > 0.0) {
                    return invalid("damping_scale");
                }
            }
            Integrator::Implicit {
                max_iterations,
                tolerance,
            } => {
                if max_iterations == 0 {
                    return invalid("max_iterations");
                }
                if !(tolerance > 0.0) || !tolerance.is_finite() {
                    return invalid("tolerance");
                }
            }
        }
        if let Some(bounds) = self.bounds.as_ref() {
            bounds.validate()?;
        }
        if let Some(target) = self.volume_normalization {
            if !(target > 0.0) {
                return invalid("volume_normalization");
            }
        }
        Ok(())
    }
}

/// Summary of one or more simulation substeps.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StepResult {
    /// Number of substeps taken.
    pub substeps: u32,
    /// Linear solve reports, one per implicit substep. Empty for explicit integration.
    pub linear_solves: Vec<SolveResult>,
    /// Number of vertices touching the bounding box after the last substep.
    pub contacts: usize,
}

impl StepResult {
    /// Returns `true` if every linear solve met its tolerance.
    pub fn converged(&self) -> bool {
        self.linear_solves
            .iter()
            .all(|r| r.status == Status::Success)
    }

    /// Total number of linear solver iterations over all substeps.
    pub fn linear_iterations(&self) -> u32 {
        self.linear_solves.iter().map(|r| r.iterations).sum()
    }

    pub(crate) fn merge(&mut self, other: StepResult) {
        self.substeps += other.substeps;
        self.linear_solves.extend(other.linear_solves);
        self.contacts = other.contacts;
    }
}

impl std::fmt::Display for StepResult {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        writeln!(f, "Substeps: {}", self.substeps)?;
        writeln!(f, "Contacts: {}", self.contacts)?;
        if !self.linear_solves.is_empty() {
            writeln!(f, "Linear iterations: {}", self.linear_iterations())?;
            if let Some(last) = self.linear_solves.last() {
                writeln!(f, "Last linear solve: {}", last)?;
            }
        }
        Ok(())
    }
}
