//! Linearized backward Euler time integration.
//!
//! Each substep solves `(M - dt² K) v' = M v + dt f` for the new velocity `v'`, where `K` is
//! the stiffness of the unrotated linear stress `dP = 2μ dF`. The system matrix is never
//! assembled; conjugate gradient only needs its action on a vector.

use na::Vector3;
use rayon::prelude::*;

use super::linsolve::{ConjugateGradient, SolveResult, Status};
use super::state::State;
use crate::elements::TetElements;
use crate::energy_models::{split_columns, CorotatedTetElasticity};
use crate::matrix::shape_matrix;
use crate::mesh::{TetMesh, VertexCells};

/// Matrix-free action of `M - dt² K` on a per-vertex velocity field.
#[derive(Copy, Clone)]
pub struct ImplicitOperator<'a> {
    cells: &'a [[usize; 4]],
    vertex_cells: &'a VertexCells,
    elements: &'a TetElements,
    mu: f64,
    dt: f64,
}

impl<'a> ImplicitOperator<'a> {
    pub fn new(
        cells: &'a [[usize; 4]],
        vertex_cells: &'a VertexCells,
        elements: &'a TetElements,
        mu: f64,
        dt: f64,
    ) -> Self {
        ImplicitOperator {
            cells,
            vertex_cells,
            elements,
            mu,
            dt,
        }
    }

    /// Build the operator for the given mesh.
    pub fn from_mesh(mesh: &'a TetMesh, elements: &'a TetElements, mu: f64, dt: f64) -> Self {
        Self::new(&mesh.cells, &mesh.vertex_cells, elements, mu, dt)
    }

    /// Computes `out = (M - dt² K) vel`.
    ///
    /// The stiffness term is evaluated element by element: the velocity differences of each
    /// cell form a shape matrix differential, which is mapped through the linearized force
    /// and gathered back into the vertices.
    #[allow(non_snake_case)]
    pub fn apply(&self, vel: &[[f64; 3]], out: &mut [[f64; 3]]) {
        debug_assert_eq!(vel.len(), out.len());
        let ImplicitOperator {
            cells,
            vertex_cells,
            elements,
            mu,
            dt,
        } = *self;

        out.par_iter_mut()
            .zip(vel.par_iter())
            .zip(elements.vertex_mass.par_iter())
            .for_each(|((out, v), &m)| *out = (Vector3::from(*v) * m).into());

        let scale = -dt * dt;
        let per_cell: Vec<[Vector3<f64>; 4]> = cells
            .par_iter()
            .enumerate()
            .map(|(c, cell)| {
                let dDx = shape_matrix(&cell.map(|i| Vector3::from(vel[i])));
                let dH = CorotatedTetElasticity::force_differential(
                    &elements.ref_shape_mtx_inv[c],
                    elements.ref_volume[c],
                    mu,
                    &dDx,
                );
                split_columns(&(dH * scale))
            })
            .collect();

        vertex_cells.gather_add(&per_cell, out);
    }
}

/// Backward Euler integrator with a conjugate gradient velocity solve.
#[derive(Clone, Debug)]
pub struct ImplicitIntegrator {
    cg: ConjugateGradient,
    rhs: Vec<[f64; 3]>,
}

impl ImplicitIntegrator {
    pub fn new(num_vertices: usize, max_iterations: u32, tolerance: f64) -> Self {
        ImplicitIntegrator {
            cg: ConjugateGradient::new(3 * num_vertices, max_iterations, tolerance),
            rhs: vec![[0.0; 3]; num_vertices],
        }
    }

    /// Integrate one substep of size `dt` using the forces stored in `state`.
    ///
    /// The current velocities are the initial guess for the solve. Running out of iterations
    /// is not an error: the last iterate is used and the status is reported in the result.
    pub fn advance(&mut self, state: &mut State, dt: f64, mu: f64) -> SolveResult {
        let ImplicitIntegrator { cg, rhs } = self;
        let State { mesh, elements, .. } = state;
        let TetMesh {
            positions,
            velocities,
            forces,
            cells,
            vertex_cells,
        } = mesh;

        // b = M v + dt f
        rhs.par_iter_mut()
            .zip(velocities.par_iter())
            .zip(forces.par_iter())
            .zip(elements.vertex_mass.par_iter())
            .for_each(|(((b, v), f), &m)| {
                *b = (Vector3::from(*v) * m + Vector3::from(*f) * dt).into();
            });

        let op = ImplicitOperator::new(cells, vertex_cells, elements, mu, dt);
        let result = cg.solve(
            |x, out| {
                op.apply(
                    bytemuck::cast_slice(x),
                    bytemuck::cast_slice_mut(out),
                )
            },
            bytemuck::cast_slice_mut(velocities.as_mut_slice()),
            bytemuck::cast_slice(rhs.as_slice()),
        );

        match result.status {
            Status::Success => log::debug!("Linear solve: {}", result),
            _ => log::warn!("Linear solve did not converge: {}", result),
        }

        // x = x + dt v'
        positions
            .par_iter_mut()
            .zip(velocities.par_iter())
            .for_each(|(x, v)| *x = (Vector3::from(*x) + Vector3::from(*v) * dt).into());

        result
    }
}

/// Dense stiffness action built from unit shape matrix perturbations, one per vertex degree of
/// freedom of each cell. Used to cross-check the compact operator.
#[cfg(test)]
#[allow(non_snake_case)]
fn apply_by_perturbation(
    mesh: &TetMesh,
    elements: &TetElements,
    mu: f64,
    dt: f64,
    vel: &[[f64; 3]],
) -> Vec<[f64; 3]> {
    let mut out: Vec<[f64; 3]> = vel
        .iter()
        .zip(elements.vertex_mass.iter())
        .map(|(v, &m)| (Vector3::from(*v) * m).into())
        .collect();

    for (c, cell) in mesh.cells().iter().enumerate() {
        let B = elements.ref_shape_mtx_inv[c];
        let W = elements.ref_volume[c];
        for u in 0..4 {
            for d in 0..3 {
                let mut dD = na::Matrix3::zeros();
                if u == 3 {
                    for j in 0..3 {
                        dD[(d, j)] = -1.0;
                    }
                } else {
                    dD[(d, u)] = 1.0;
                }
                let dH = CorotatedTetElasticity::force_differential(&B, W, mu, &dD);
                for i in 0..3 {
                    for j in 0..3 {
                        let dv = vel[cell[i]][j] - vel[cell[3]][j];
                        out[cell[u]][d] += -dt * dt * dH[(j, i)] * dv;
                    }
                }
            }
        }
    }
    out
}
