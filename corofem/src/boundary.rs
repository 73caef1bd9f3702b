use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::Error;

/// An axis-aligned box `[-half_extents, half_extents]` confining all vertices.
///
/// Contact with a wall is fully inelastic and frictionless: the position is clamped onto the
/// wall and any outward velocity component is removed.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub half_extents: [f64; 3],
}

impl Default for BoundingBox {
    fn default() -> Self {
        BoundingBox {
            half_extents: [1.0, 0.1, 1.0],
        }
    }
}

impl BoundingBox {
    pub fn new(half_extents: [f64; 3]) -> Self {
        BoundingBox { half_extents }
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.half_extents.iter().all(|&h| h >= 0.0) {
            Ok(())
        } else {
            Err(Error::InvalidParameter {
                name: "bounds".to_string(),
            })
        }
    }

    /// Returns `true` if the point lies inside or on the box.
    pub fn contains(&self, pos: &[f64; 3]) -> bool {
        pos.iter()
            .zip(self.half_extents.iter())
            .all(|(&x, &h)| -h <= x && x <= h)
    }

    /// Clamp positions to the box and stop velocities pointing further out.
    ///
    /// Returns the number of vertices that were in contact with the box.
    pub fn apply(&self, pos: &mut [[f64; 3]], vel: &mut [[f64; 3]]) -> usize {
        debug_assert_eq!(pos.len(), vel.len());
        let bounds = self.half_extents;
        pos.par_iter_mut()
            .zip(vel.par_iter_mut())
            .map(|(x, v)| {
                let mut contact = false;
                for i in 0..3 {
                    if x[i] < -bounds[i] {
                        x[i] = -bounds[i];
                        if v[i] < 0.0 {
                            v[i] = 0.0;
                        }
                        contact = true;
                    }
                    if x[i] > bounds[i] {
                        x[i] = bounds[i];
                        if v[i] > 0.0 {
                            v[i] = 0.0;
                        }
                        contact = true;
                    }
                }
                contact as usize
            })
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_outside_vertices() {
        let bbox = BoundingBox::new([1.0, 0.1, 1.0]);
        let mut pos = vec![[0.0, -0.5, 0.0], [2.0, 0.0, -3.0], [0.5, 0.05, 0.5]];
        let mut vel = vec![[1.0, -2.0, 0.0], [1.0, 1.0, 1.0], [1.0, -1.0, 1.0]];
        let contacts = bbox.apply(&mut pos, &mut vel);

        assert_eq!(contacts, 2);
        assert_eq!(pos[0], [0.0, -0.1, 0.0]);
        assert_eq!(vel[0], [1.0, 0.0, 0.0]);
        assert_eq!(pos[1], [1.0, 0.0, -1.0]);
        // Only outward components are removed.
        assert_eq!(vel[1], [0.0, 1.0, 1.0]);
        assert_eq!(pos[2], [0.5, 0.05, 0.5]);
        assert_eq!(vel[2], [1.0, -1.0, 1.0]);
        assert!(pos.iter().all(|p| bbox.contains(p)));
    }

    #[test]
    fn inward_velocity_is_kept() {
        let bbox = BoundingBox::default();
        let mut pos = vec![[0.0, -0.2, 0.0]];
        let mut vel = vec![[0.0, 3.0, 0.0]];
        bbox.apply(&mut pos, &mut vel);
        assert_eq!(pos[0][1], -0.1);
        assert_eq!(vel[0][1], 3.0);
    }

    #[test]
    fn negative_extents_are_invalid() {
        assert!(BoundingBox::new([1.0, -0.1, 1.0]).validate().is_err());
        assert!(BoundingBox::default().validate().is_ok());
    }
}
