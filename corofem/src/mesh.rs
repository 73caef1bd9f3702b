//! Tetrahedral mesh with per-vertex simulation state.

use ahash::AHashMap;
use na::Vector3;
use rayon::prelude::*;

use crate::Error;

/// Local vertex orderings of the four triangular faces of a tetrahedron.
pub const TET_FACES: [[usize; 3]; 4] = [[0, 2, 1], [0, 3, 2], [0, 1, 3], [1, 2, 3]];

/// Vertex to cell incidence stored in compressed row format.
///
/// Each vertex lists the `(cell, local_index)` pairs of the cells it belongs to, where
/// `local_index` is the position of the vertex within the cell (`0..4`).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct VertexCells {
    offsets: Vec<usize>,
    incidences: Vec<(usize, usize)>,
}

impl VertexCells {
    fn new(num_vertices: usize, cells: &[[usize; 4]]) -> Self {
        let mut counts = vec![0usize; num_vertices + 1];
        for cell in cells {
            for &v in cell {
                counts[v + 1] += 1;
            }
        }
        for i in 0..num_vertices {
            counts[i + 1] += counts[i];
        }
        let offsets = counts;

        let mut fill = offsets.clone();
        let mut incidences = vec![(0, 0); offsets[num_vertices]];
        for (cell_idx, cell) in cells.iter().enumerate() {
            for (local, &v) in cell.iter().enumerate() {
                incidences[fill[v]] = (cell_idx, local);
                fill[v] += 1;
            }
        }

        VertexCells {
            offsets,
            incidences,
        }
    }

    /// Cells incident to vertex `vtx` as `(cell, local_index)` pairs.
    #[inline]
    pub fn incident(&self, vtx: usize) -> &[(usize, usize)] {
        &self.incidences[self.offsets[vtx]..self.offsets[vtx + 1]]
    }

    /// Sum per-cell vertex contributions into `out`, one vertex at a time.
    ///
    /// `per_cell[c][l]` is the contribution of cell `c` to its `l`-th vertex. Every output
    /// vertex is written by exactly one task, so no synchronization is needed.
    pub fn gather_add(&self, per_cell: &[[Vector3<f64>; 4]], out: &mut [[f64; 3]]) {
        debug_assert_eq!(out.len() + 1, self.offsets.len());
        out.par_iter_mut().enumerate().for_each(|(vtx, out)| {
            let sum = self
                .incident(vtx)
                .iter()
                .fold(Vector3::zeros(), |acc, &(cell, local)| {
                    acc + per_cell[cell][local]
                });
            out[0] += sum[0];
            out[1] += sum[1];
            out[2] += sum[2];
        });
    }
}

/// A tetrahedral mesh carrying the dynamic state of every vertex.
///
/// Vertex and cell indices are assigned at construction and never change.
#[derive(Clone, Debug, PartialEq)]
pub struct TetMesh {
    pub(crate) positions: Vec<[f64; 3]>,
    pub(crate) velocities: Vec<[f64; 3]>,
    pub(crate) forces: Vec<[f64; 3]>,
    pub(crate) cells: Vec<[usize; 4]>,
    pub(crate) vertex_cells: VertexCells,
}

impl TetMesh {
    /// Build a mesh at rest with zero velocities and forces.
    ///
    /// Every vertex must belong to at least one cell, since vertices without cells carry no mass.
    pub fn new(positions: Vec<[f64; 3]>, cells: Vec<[usize; 4]>) -> Result<TetMesh, Error> {
        if cells.is_empty() {
            return Err(Error::EmptyMesh);
        }
        let num_vertices = positions.len();
        if let Some(cell) = cells
            .iter()
            .position(|cell| cell.iter().any(|&v| v >= num_vertices))
        {
            return Err(Error::InvalidCell { cell });
        }

        let vertex_cells = VertexCells::new(num_vertices, &cells);
        if let Some(vertex) = (0..num_vertices).find(|&v| vertex_cells.incident(v).is_empty()) {
            return Err(Error::IsolatedVertex { vertex });
        }

        Ok(TetMesh {
            velocities: vec![[0.0; 3]; num_vertices],
            forces: vec![[0.0; 3]; num_vertices],
            positions,
            cells,
            vertex_cells,
        })
    }

    /// Build a mesh from a flat index buffer with four indices per tetrahedron.
    pub fn from_flat_indices(positions: Vec<[f64; 3]>, indices: &[usize]) -> Result<TetMesh, Error> {
        if indices.len() % 4 != 0 {
            return Err(Error::SizeMismatch);
        }
        let cells = indices
            .chunks_exact(4)
            .map(|c| [c[0], c[1], c[2], c[3]])
            .collect();
        TetMesh::new(positions, cells)
    }

    /// Replace the initial velocities.
    pub fn with_velocities(mut self, velocities: Vec<[f64; 3]>) -> Result<TetMesh, Error> {
        if velocities.len() != self.positions.len() {
            return Err(Error::SizeMismatch);
        }
        self.velocities = velocities;
        Ok(self)
    }

    #[inline]
    pub fn num_vertices(&self) -> usize {
        self.positions.len()
    }

    #[inline]
    pub fn num_cells(&self) -> usize {
        self.cells.len()
    }

    #[inline]
    pub fn vertex_positions(&self) -> &[[f64; 3]] {
        &self.positions
    }

    #[inline]
    pub fn vertex_positions_mut(&mut self) -> &mut [[f64; 3]] {
        &mut self.positions
    }

    #[inline]
    pub fn velocities(&self) -> &[[f64; 3]] {
        &self.velocities
    }

    #[inline]
    pub fn velocities_mut(&mut self) -> &mut [[f64; 3]] {
        &mut self.velocities
    }

    /// Forces accumulated during the last force evaluation.
    #[inline]
    pub fn forces(&self) -> &[[f64; 3]] {
        &self.forces
    }

    #[inline]
    pub fn cells(&self) -> &[[usize; 4]] {
        &self.cells
    }

    #[inline]
    pub fn cell(&self, cell: usize) -> &[usize; 4] {
        &self.cells[cell]
    }

    #[inline]
    pub fn vertex_cells(&self) -> &VertexCells {
        &self.vertex_cells
    }

    /// Positions of the four vertices of the given cell.
    #[inline]
    pub fn cell_positions(&self, cell: usize) -> [Vector3<f64>; 4] {
        let [a, b, c, d] = self.cells[cell];
        let pos = &self.positions;
        [
            pos[a].into(),
            pos[b].into(),
            pos[c].into(),
            pos[d].into(),
        ]
    }

    /// Triangle indices of all four faces of every tetrahedron, three per face.
    ///
    /// Interior faces appear twice, once from each side.
    pub fn surface_indices(&self) -> Vec<usize> {
        self.cells
            .iter()
            .flat_map(|cell| {
                TET_FACES
                    .iter()
                    .flat_map(move |face| face.iter().map(move |&i| cell[i]))
            })
            .collect()
    }

    /// Triangles that belong to exactly one tetrahedron.
    pub fn boundary_faces(&self) -> Vec<[usize; 3]> {
        let mut face_count: AHashMap<[usize; 3], (usize, [usize; 3])> = AHashMap::new();
        for cell in self.cells.iter() {
            for face in TET_FACES.iter() {
                let tri = [cell[face[0]], cell[face[1]], cell[face[2]]];
                let mut key = tri;
                key.sort_unstable();
                face_count
                    .entry(key)
                    .and_modify(|(count, _)| *count += 1)
                    .or_insert((1, tri));
            }
        }

        let mut faces: Vec<_> = face_count
            .into_iter()
            .filter_map(|(_, (count, tri))| if count == 1 { Some(tri) } else { None })
            .collect();
        faces.sort_unstable();
        faces
    }

    /// Mean vertex position.
    pub fn barycenter(&self) -> [f64; 3] {
        let sum = self
            .positions
            .par_iter()
            .map(|&p| Vector3::from(p))
            .reduce(Vector3::zeros, |a, b| a + b);
        (sum / self.num_vertices().max(1) as f64).into()
    }
}
