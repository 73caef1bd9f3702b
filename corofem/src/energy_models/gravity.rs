use na::Vector3;
use rayon::prelude::*;

/// A constant directional body force acting on every vertex in proportion to its mass.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Gravity {
    g: Vector3<f64>,
}

impl Gravity {
    pub fn new(g: [f64; 3]) -> Self {
        Gravity { g: g.into() }
    }

    /// Overwrite `forces` with the gravitational force on each vertex.
    ///
    /// This is the starting point of every force evaluation; elastic forces are added on top.
    pub fn reset_forces(&self, vertex_mass: &[f64], forces: &mut [[f64; 3]]) {
        debug_assert_eq!(vertex_mass.len(), forces.len());
        let g = self.g;
        forces
            .par_iter_mut()
            .zip(vertex_mass.par_iter())
            .for_each(|(f, &m)| *f = (g * m).into());
    }
}
