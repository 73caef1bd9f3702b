//! Symplectic Euler time integration.

use na::Vector3;
use rayon::prelude::*;

use super::state::State;
use crate::mesh::TetMesh;

/// Advances velocities with the current forces, then positions with the new velocities.
///
/// There is no step size control. The caller is responsible for choosing a time step and
/// scale that are stable for the given material stiffness.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ExplicitIntegrator {
    /// Empirical factor applied to the velocity increment.
    pub damping_scale: f64,
}

impl ExplicitIntegrator {
    pub fn new(damping_scale: f64) -> Self {
        ExplicitIntegrator { damping_scale }
    }

    /// Integrate one substep of size `dt` using the forces stored in `state`.
    pub fn advance(&self, state: &mut State, dt: f64) {
        let scale = self.damping_scale;
        let State { mesh, elements, .. } = state;
        let TetMesh {
            positions,
            velocities,
            forces,
            ..
        } = mesh;

        positions
            .par_iter_mut()
            .zip(velocities.par_iter_mut())
            .zip(forces.par_iter())
            .zip(elements.vertex_mass.par_iter())
            .for_each(|(((x, v), f), &m)| {
                let mut vel = Vector3::from(*v);
                vel += Vector3::from(*f) * (dt / m * scale);
                *v = vel.into();
                *x = (Vector3::from(*x) + vel * dt).into();
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elements::TetElements;
    use crate::energy_models::Gravity;
    use crate::test_utils::*;
    use approx::assert_relative_eq;

    #[test]
    fn free_fall() {
        let mesh = make_one_tet_mesh();
        let elements = TetElements::new(&mesh, 1000.0).unwrap();
        let mut state = State::new(mesh.clone(), elements);
        let integrator = ExplicitIntegrator::new(1.0);

        let dt = 0.01;
        state
            .compute_forces(&Gravity::new([0.0, -10.0, 0.0]), 1e4)
            .unwrap();
        integrator.advance(&mut state, dt);

        // Rigid translation: every vertex gets the same velocity and displacement.
        for (v, (x, x0)) in state
            .mesh
            .velocities()
            .iter()
            .zip(state.mesh.vertex_positions().iter().zip(mesh.vertex_positions()))
        {
            assert_relative_eq!(v[1], -0.1, epsilon = 1e-9);
            assert_relative_eq!(x[1], x0[1] - 0.001, epsilon = 1e-9);
            assert_relative_eq!(x[0], x0[0], epsilon = 1e-12);
        }
    }

    #[test]
    fn scale_slows_velocity_update() {
        let mesh = make_one_tet_mesh();
        let elements = TetElements::new(&mesh, 1000.0).unwrap();
        let mut state = State::new(mesh, elements);
        state
            .compute_forces(&Gravity::new([0.0, -10.0, 0.0]), 1e4)
            .unwrap();
        ExplicitIntegrator::new(0.5).advance(&mut state, 0.01);
        for v in state.mesh.velocities() {
            assert_relative_eq!(v[1], -0.05, epsilon = 1e-9);
        }
    }
}
