//! Reference configuration of the tetrahedral elements.
//!
//! Everything here is computed once from the rest pose before the simulation starts and is
//! never updated afterwards.

use na::Matrix3;
use rayon::prelude::*;

use crate::matrix::shape_matrix;
use crate::mesh::TetMesh;
use crate::Error;

/// Relative determinant threshold below which a shape matrix is considered singular.
///
/// The determinant is compared against the cube of the longest edge column, which makes the
/// test independent of the mesh scale.
pub const DEGENERACY_TOLERANCE: f64 = 1e-10;

/// Returns `true` if the given shape matrix has a negligible determinant relative to its size.
pub fn is_degenerate(shape_mtx: &Matrix3<f64>) -> bool {
    let scale = shape_mtx
        .column_iter()
        .map(|c| c.norm())
        .fold(0.0, f64::max);
    !(scale > 0.0) || shape_mtx.determinant().abs() <= DEGENERACY_TOLERANCE * scale.powi(3)
}

/// Signed volume of a tetrahedron given its shape matrix.
///
/// Positive for tetrahedra whose vertices `1, 2, 3` wind counter-clockwise as seen from
/// vertex `0` pointing outward, which is the winding expected from input meshes.
#[inline]
pub fn signed_volume(shape_mtx: &Matrix3<f64>) -> f64 {
    -shape_mtx.determinant() / 6.0
}

/// Sum of signed element volumes at the current vertex positions.
pub fn mesh_volume(mesh: &TetMesh) -> f64 {
    (0..mesh.num_cells())
        .into_par_iter()
        .map(|cell| signed_volume(&shape_matrix(&mesh.cell_positions(cell))))
        .sum()
}

/// Uniformly scales the mesh about the origin so that its volume becomes `target_volume`.
///
/// This must happen before [`TetElements::new`] since masses and reference shapes depend on
/// absolute geometry. Returns the applied scale factor.
pub fn normalize_volume(mesh: &mut TetMesh, target_volume: f64) -> Result<f64, Error> {
    if !(target_volume > 0.0) {
        return Err(Error::InvalidParameter {
            name: "volume_normalization".to_string(),
        });
    }

    let volume = mesh_volume(mesh);
    if !(volume > 0.0) {
        log::error!("Cannot normalize a mesh with non-positive volume {}", volume);
        return Err(Error::InvalidParameter {
            name: "volume_normalization".to_string(),
        });
    }

    // Volume scales with the cube of the length scale.
    let scale = (target_volume / volume).cbrt();
    mesh.vertex_positions_mut().par_iter_mut().for_each(|p| {
        p[0] *= scale;
        p[1] *= scale;
        p[2] *= scale;
    });

    log::info!(
        "Normalized mesh volume from {} to {} (scale factor {})",
        volume,
        target_volume,
        scale
    );

    Ok(scale)
}

#[derive(Default)]
struct RefShapes {
    shape_mtx: Vec<Matrix3<f64>>,
    shape_mtx_inv: Vec<Matrix3<f64>>,
    volume: Vec<f64>,
}

/// Precomputed per-element and per-vertex quantities of the rest configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct TetElements {
    /// Reference shape matrix `Dm` of every cell.
    pub ref_shape_mtx: Vec<Matrix3<f64>>,
    /// Inverse of the reference shape matrix of every cell.
    pub ref_shape_mtx_inv: Vec<Matrix3<f64>>,
    /// Rest volume of every cell.
    pub ref_volume: Vec<f64>,
    /// Lumped mass of every vertex.
    pub vertex_mass: Vec<f64>,
    /// Sum of all rest volumes.
    pub total_volume: f64,
}

impl TetElements {
    /// Compute the reference configuration from the current positions of `mesh`.
    pub fn new(mesh: &TetMesh, density: f64) -> Result<TetElements, Error> {
        let RefShapes {
            shape_mtx: ref_shape_mtx,
            shape_mtx_inv: ref_shape_mtx_inv,
            volume: ref_volume,
        } = Self::compute_ref_tet_shape_matrices(mesh)?;

        let inverted: Vec<_> = ref_volume
            .iter()
            .enumerate()
            .filter_map(|(i, &v)| if v <= 0.0 { Some(i) } else { None })
            .collect();
        if !inverted.is_empty() {
            return Err(Error::InvertedReferenceElement { inverted });
        }

        let total_volume = ref_volume.par_iter().sum();

        // Each cell distributes its mass equally among its four vertices.
        let vertex_mass = (0..mesh.num_vertices())
            .into_par_iter()
            .map(|vtx| {
                mesh.vertex_cells()
                    .incident(vtx)
                    .iter()
                    .map(|&(cell, _)| 0.25 * density * ref_volume[cell])
                    .sum()
            })
            .collect();

        Ok(TetElements {
            ref_shape_mtx,
            ref_shape_mtx_inv,
            ref_volume,
            vertex_mass,
            total_volume,
        })
    }

    /// Compute shape matrices, their inverses and signed volumes for reference elements.
    fn compute_ref_tet_shape_matrices(mesh: &TetMesh) -> Result<RefShapes, Error> {
        let results: Vec<Option<(Matrix3<f64>, Matrix3<f64>, f64)>> = (0..mesh.num_cells())
            .into_par_iter()
            .map(|cell| {
                let dm = shape_matrix(&mesh.cell_positions(cell));
                if is_degenerate(&dm) {
                    return None;
                }
                dm.try_inverse().map(|inv| (dm, inv, signed_volume(&dm)))
            })
            .collect();

        if let Some(cell) = results.iter().position(Option::is_none) {
            return Err(Error::DegenerateReferenceElement { cell });
        }

        let mut shapes = RefShapes::default();
        for (dm, inv, vol) in results.into_iter().flatten() {
            shapes.shape_mtx.push(dm);
            shapes.shape_mtx_inv.push(inv);
            shapes.volume.push(vol);
        }
        Ok(shapes)
    }

    #[inline]
    pub fn num_cells(&self) -> usize {
        self.ref_volume.len()
    }

    /// Sum of all lumped vertex masses.
    pub fn total_mass(&self) -> f64 {
        self.vertex_mass.par_iter().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;
    use approx::assert_relative_eq;

    #[test]
    fn one_tet_reference() {
        let mesh = make_one_tet_mesh();
        let elements = TetElements::new(&mesh, 1000.0).unwrap();
        assert_relative_eq!(elements.ref_volume[0], 1.0 / 6.0);
        assert_relative_eq!(elements.total_volume, 1.0 / 6.0);
        for &m in elements.vertex_mass.iter() {
            assert_relative_eq!(m, 0.25 * 1000.0 / 6.0);
        }

        let dm = shape_matrix(&mesh.cell_positions(0));
        assert_eq!(elements.ref_shape_mtx[0], dm);
        assert_relative_eq!(
            dm * elements.ref_shape_mtx_inv[0],
            Matrix3::identity(),
            epsilon = 1e-12
        );
        assert_relative_eq!(
            signed_volume(&elements.ref_shape_mtx[0]),
            elements.ref_volume[0]
        );
    }

    #[test]
    fn volumes_positive_and_mass_conserved() {
        for mesh in [make_three_tet_mesh(), make_box_mesh([3, 2, 4], 0.5)] {
            let density = 250.0;
            let elements = TetElements::new(&mesh, density).unwrap();
            assert!(elements.ref_volume.iter().all(|&v| v > 0.0));
            assert_relative_eq!(
                elements.total_mass(),
                density * elements.total_volume,
                max_relative = 1e-12
            );
        }
    }

    #[test]
    fn box_volume() {
        // A [3, 2, 4] grid of cubes with side 0.5.
        let mesh = make_box_mesh([3, 2, 4], 0.5);
        let elements = TetElements::new(&mesh, 1.0).unwrap();
        assert_relative_eq!(elements.total_volume, 1.5 * 1.0 * 2.0, max_relative = 1e-12);
    }

    #[test]
    fn degenerate_reference_element() {
        let verts = vec![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [1.0, 1.0, 0.0],
        ];
        let mesh = TetMesh::new(verts, vec![[0, 1, 2, 3]]).unwrap();
        match TetElements::new(&mesh, 1.0) {
            Err(Error::DegenerateReferenceElement { cell: 0 }) => {}
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn inverted_reference_element() {
        let mut mesh = make_three_tet_mesh();
        // Swap two vertices of the middle cell.
        mesh.cells[1].swap(0, 1);
        match TetElements::new(&mesh, 1.0) {
            Err(Error::InvertedReferenceElement { inverted }) => assert_eq!(inverted, vec![1]),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn normalization_hits_target_volume() {
        let mut mesh = make_box_mesh([2, 3, 1], 0.37);
        let raw = mesh_volume(&mesh);
        let scale = normalize_volume(&mut mesh, 1000.0).unwrap();
        assert_relative_eq!(scale, (1000.0 / raw).cbrt(), max_relative = 1e-12);
        assert_relative_eq!(mesh_volume(&mesh), 1000.0, max_relative = 1e-10);

        let elements = TetElements::new(&mesh, 1.0).unwrap();
        assert_relative_eq!(elements.total_volume, 1000.0, max_relative = 1e-10);
    }

    #[test]
    fn normalization_rejects_bad_target() {
        let mut mesh = make_one_tet_mesh();
        assert!(normalize_volume(&mut mesh, 0.0).is_err());
        assert!(normalize_volume(&mut mesh, -1.0).is_err());
    }
}
