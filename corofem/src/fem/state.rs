//! Simulation state shared by both time integrators.

use na::{Matrix3, Vector3};
use rayon::prelude::*;

use crate::elements::TetElements;
use crate::energy_models::{CorotatedTetElasticity, Gravity};
use crate::matrix::shape_matrix;
use crate::mesh::TetMesh;
use crate::Error;

/// Mesh, reference configuration and per-element quantities updated every step.
#[allow(non_snake_case)]
#[derive(Clone, Debug)]
pub struct State {
    pub mesh: TetMesh,
    pub elements: TetElements,
    /// Deformation gradient of every cell from the last force evaluation.
    pub F: Vec<Matrix3<f64>>,
    /// Green strain of every cell from the last force evaluation.
    pub strain: Vec<Matrix3<f64>>,
    /// Per-cell vertex forces, gathered into the mesh after every evaluation.
    cell_forces: Vec<[Vector3<f64>; 4]>,
}

impl State {
    pub fn new(mesh: TetMesh, elements: TetElements) -> Self {
        let num_cells = mesh.num_cells();
        debug_assert_eq!(num_cells, elements.num_cells());
        State {
            mesh,
            elements,
            F: vec![Matrix3::identity(); num_cells],
            strain: vec![Matrix3::zeros(); num_cells],
            cell_forces: vec![[Vector3::zeros(); 4]; num_cells],
        }
    }

    /// Evaluate gravity and elastic forces at the current positions.
    ///
    /// Forces are first reset to gravity, then elastic forces computed per cell are gathered
    /// into the vertices. Fails on the first (lowest index) cell whose deformed shape is
    /// singular.
    #[allow(non_snake_case)]
    pub fn compute_forces(&mut self, gravity: &Gravity, mu: f64) -> Result<(), Error> {
        let State {
            mesh,
            elements,
            F,
            strain,
            cell_forces,
        } = self;

        gravity.reset_forces(&elements.vertex_mass, &mut mesh.forces);

        let mesh_ref = &*mesh;
        let degenerate = cell_forces
            .par_iter_mut()
            .zip(F.par_iter_mut())
            .zip(strain.par_iter_mut())
            .enumerate()
            .filter_map(|(cell, ((forces, F), strain))| {
                let elem = CorotatedTetElasticity::new(
                    shape_matrix(&mesh_ref.cell_positions(cell)),
                    elements.ref_shape_mtx_inv[cell],
                    elements.ref_volume[cell],
                    mu,
                );
                match elem.evaluate() {
                    Some(result) => {
                        *forces = result.forces;
                        *F = result.F;
                        *strain = result.strain;
                        None
                    }
                    None => Some(cell),
                }
            })
            .min();

        if let Some(cell) = degenerate {
            log::error!("Element {} collapsed during force evaluation", cell);
            return Err(Error::DegenerateElement { cell });
        }

        let TetMesh {
            vertex_cells,
            forces,
            ..
        } = mesh;
        vertex_cells.gather_add(cell_forces, forces);
        Ok(())
    }

    /// Kinetic energy `½ Σ m|v|²`.
    pub fn kinetic_energy(&self) -> f64 {
        0.5 * self
            .mesh
            .velocities
            .par_iter()
            .zip(self.elements.vertex_mass.par_iter())
            .map(|(v, &m)| m * Vector3::from(*v).norm_squared())
            .sum::<f64>()
    }

    /// Returns `true` if all positions and velocities are finite.
    pub fn is_finite(&self) -> bool {
        let finite = |x: &[f64; 3]| x.iter().all(|c| c.is_finite());
        self.mesh.positions.par_iter().all(finite) && self.mesh.velocities.par_iter().all(finite)
    }
}
