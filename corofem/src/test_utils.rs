use crate::{Material, TetMesh};

/*
 * Setup code
 */

pub const EXPLICIT_MATERIAL: Material = Material::explicit();
pub const IMPLICIT_MATERIAL: Material = Material::implicit();

// Note: Keep stiffness and density in a similar range for tests that run many steps. Stiff
// materials with light vertices need tiny explicit time steps and many CG iterations.
pub const SOFT_MATERIAL: Material = Material {
    young_modulus: 1e4,
    poisson_ratio: 0.3,
    density: 1000.0,
};

pub fn make_one_tet_mesh() -> TetMesh {
    let verts = vec![
        [0.0, 0.0, 0.0],
        [1.0, 0.0, 0.0],
        [0.0, 1.0, 0.0],
        [0.0, 0.0, 1.0],
    ];
    TetMesh::new(verts, vec![[0, 1, 2, 3]]).unwrap()
}

pub fn make_three_tet_mesh_with_verts(verts: Vec<[f64; 3]>) -> TetMesh {
    let indices = [2, 5, 4, 0, 2, 3, 5, 0, 0, 1, 3, 5];
    TetMesh::from_flat_indices(verts, &indices).unwrap()
}

/// Triangular prism split into three tetrahedra.
pub fn make_three_tet_mesh() -> TetMesh {
    let verts = vec![
        [0.0, 0.0, 0.0],
        [1.0, 0.0, 0.0],
        [0.0, 1.0, 0.0],
        [1.0, 1.0, 0.0],
        [0.0, 0.0, 1.0],
        [1.0, 0.0, 1.0],
    ];
    make_three_tet_mesh_with_verts(verts)
}

/// Axes permutations of the Kuhn subdivision paired with their parity.
const KUHN_PERMUTATIONS: [([usize; 3], bool); 6] = [
    ([0, 1, 2], true),
    ([1, 2, 0], true),
    ([2, 0, 1], true),
    ([0, 2, 1], false),
    ([1, 0, 2], false),
    ([2, 1, 0], false),
];

/// Regular grid of `n[0] x n[1] x n[2]` cubes of side `cell_size` with the minimum corner at
/// the origin. Each cube is split into six positively oriented tetrahedra sharing its main
/// diagonal.
pub fn make_box_mesh(n: [usize; 3], cell_size: f64) -> TetMesh {
    let [nx, ny, nz] = n;
    let index = |i: usize, j: usize, k: usize| i + (nx + 1) * (j + (ny + 1) * k);

    let mut verts = Vec::with_capacity((nx + 1) * (ny + 1) * (nz + 1));
    for k in 0..=nz {
        for j in 0..=ny {
            for i in 0..=nx {
                verts.push([
                    i as f64 * cell_size,
                    j as f64 * cell_size,
                    k as f64 * cell_size,
                ]);
            }
        }
    }

    let mut cells = Vec::with_capacity(6 * nx * ny * nz);
    for k in 0..nz {
        for j in 0..ny {
            for i in 0..nx {
                for &(axes, even) in KUHN_PERMUTATIONS.iter() {
                    let mut corner = [i, j, k];
                    let mut tet = [index(i, j, k); 4];
                    for (t, &axis) in tet[1..].iter_mut().zip(axes.iter()) {
                        corner[axis] += 1;
                        *t = index(corner[0], corner[1], corner[2]);
                    }
                    if !even {
                        tet.swap(1, 2);
                    }
                    cells.push(tet);
                }
            }
        }
    }

    TetMesh::new(verts, cells).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elements::TetElements;
    use approx::assert_relative_eq;

    #[test]
    fn box_mesh_is_positively_oriented() {
        let mesh = make_box_mesh([3, 2, 1], 0.5);
        assert_eq!(mesh.num_vertices(), 4 * 3 * 2);
        assert_eq!(mesh.num_cells(), 6 * 6);
        let elements = TetElements::new(&mesh, 1.0).unwrap();
        assert_relative_eq!(elements.total_volume, 1.5 * 1.0 * 0.5, max_relative = 1e-12);
        for &v in elements.ref_volume.iter() {
            assert_relative_eq!(v, 0.125 / 6.0, max_relative = 1e-12);
        }
    }

    #[test]
    fn three_tet_mesh_is_positively_oriented() {
        let elements = TetElements::new(&make_three_tet_mesh(), 1.0).unwrap();
        assert_relative_eq!(elements.total_volume, 0.5, max_relative = 1e-12);
    }
}
