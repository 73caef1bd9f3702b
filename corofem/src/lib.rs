//! Corotated finite element simulation of tetrahedral soft bodies.
//!
//! A mesh is handed to a [`SolverBuilder`] along with a [`Material`] and [`SimParams`].
//! The resulting [`Solver`] advances the body with either an explicit symplectic
//! integrator or a backward Euler integrator solved with matrix-free conjugate gradient.

pub mod boundary;
pub mod elements;
pub mod energy_models;
pub mod fem;
pub mod io;
pub mod material;
pub mod matrix;
pub mod mesh;

// Shared fixtures for unit tests, integration tests and benchmarks.
pub mod test_utils;

pub use self::boundary::BoundingBox;
pub use self::elements::TetElements;
pub use self::fem::linsolve;
pub use self::fem::solver::*;
pub use self::fem::{Integrator, SimParams, StepResult};
pub use self::material::*;
pub use self::mesh::TetMesh;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Size mismatch error")]
    SizeMismatch,
    #[error("Missing simulation mesh")]
    NoSimulationMesh,
    #[error("Mesh has no tetrahedra")]
    EmptyMesh,
    #[error("Cell {cell} references a vertex that does not exist")]
    InvalidCell { cell: usize },
    #[error("Vertex {vertex} does not belong to any cell")]
    IsolatedVertex { vertex: usize },
    #[error("Degenerate reference element detected: {cell}")]
    DegenerateReferenceElement { cell: usize },
    #[error("Inverted reference element detected: {:?}", .inverted)]
    InvertedReferenceElement { inverted: Vec<usize> },
    #[error("Element {cell} degenerated during the simulation step")]
    DegenerateElement { cell: usize },
    #[error("Invalid parameter: {name:?}")]
    InvalidParameter { name: String },
    #[error("File I/O Error")]
    Io {
        #[from]
        source: std::io::Error,
    },
    #[error("Failed to parse configuration: {reason}")]
    ConfigParse { reason: String },
    #[error("Failed to parse mesh at line {line}: {reason}")]
    MeshParse { line: usize, reason: String },
}

impl From<ron::error::SpannedError> for Error {
    fn from(err: ron::error::SpannedError) -> Error {
        Error::ConfigParse {
            reason: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Error {
        Error::ConfigParse {
            reason: err.to_string(),
        }
    }
}
