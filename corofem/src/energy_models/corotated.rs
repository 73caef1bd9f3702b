//! Corotated linear elasticity for tetrahedral elements.
//!
//! The stress is computed from the deformation gradient with the element rotation factored out
//! through a signed SVD, `P = 2μ (F - R)`. The first Lamé parameter does not enter the force.

use na::{Matrix3, Vector3};

use crate::elements::is_degenerate;
use crate::matrix::ssvd;

/// Per-tetrahedron corotated elasticity model. Stores the current shape matrix together with
/// the precomputed reference quantities needed for force computation.
#[allow(non_snake_case)]
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct CorotatedTetElasticity {
    Dx: Matrix3<f64>,
    DX_inv: Matrix3<f64>,
    volume: f64,
    mu: f64,
}

/// Quantities produced by a single element force evaluation.
#[allow(non_snake_case)]
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ElementForces {
    /// Deformation gradient.
    pub F: Matrix3<f64>,
    /// Green strain `½(FᵗF - I)`.
    pub strain: Matrix3<f64>,
    /// Force on each of the four element vertices. These always sum to zero.
    pub forces: [Vector3<f64>; 4],
}

impl CorotatedTetElasticity {
    #[allow(non_snake_case)]
    pub fn new(Dx: Matrix3<f64>, DX_inv: Matrix3<f64>, volume: f64, mu: f64) -> Self {
        CorotatedTetElasticity {
            Dx,
            DX_inv,
            volume,
            mu,
        }
    }

    /// Compute the deformation gradient `F` for this tet.
    #[allow(non_snake_case)]
    #[inline]
    pub fn deformation_gradient(&self) -> Matrix3<f64> {
        self.Dx * self.DX_inv
    }

    /// Green strain tensor of the given deformation gradient.
    #[allow(non_snake_case)]
    #[inline]
    pub fn green_strain(F: &Matrix3<f64>) -> Matrix3<f64> {
        (F.transpose() * F - Matrix3::identity()) * 0.5
    }

    /// First Piola-Kirchhoff stress. Returns `None` if `F` is singular.
    #[allow(non_snake_case)]
    pub fn stress(&self, F: &Matrix3<f64>) -> Option<Matrix3<f64>> {
        if is_degenerate(F) {
            return None;
        }
        let svd = ssvd(F)?;
        Some((F - svd.rotation()) * (2.0 * self.mu))
    }

    /// Force matrix `H = -W P Bᵗ`. Column `i` is the force on vertex `i` for `i < 3`.
    #[allow(non_snake_case)]
    #[inline]
    pub fn force_matrix(&self, P: &Matrix3<f64>) -> Matrix3<f64> {
        P * self.DX_inv.transpose() * (-self.volume)
    }

    /// Evaluate the elastic forces on all four vertices.
    ///
    /// Returns `None` when the element has collapsed to a singular configuration.
    #[allow(non_snake_case)]
    pub fn evaluate(&self) -> Option<ElementForces> {
        let F = self.deformation_gradient();
        let P = self.stress(&F)?;
        let H = self.force_matrix(&P);
        Some(ElementForces {
            F,
            strain: Self::green_strain(&F),
            forces: split_columns(&H),
        })
    }

    /// Linearized force differential of this element for a shape matrix differential `dDx`.
    ///
    /// The stress is linearized without rotation, `dP = 2μ dF`, which keeps the resulting
    /// stiffness operator symmetric and independent of the current deformation.
    #[allow(non_snake_case)]
    #[inline]
    pub fn force_differential(
        DX_inv: &Matrix3<f64>,
        volume: f64,
        mu: f64,
        dDx: &Matrix3<f64>,
    ) -> Matrix3<f64> {
        let dF = dDx * DX_inv;
        let dP = dF * (2.0 * mu);
        dP * DX_inv.transpose() * (-volume)
    }
}

/// Split a 3x3 force matrix into four vertex forces. The last vertex receives the negated sum
/// of the first three, so the element exerts no net force.
#[allow(non_snake_case)]
#[inline]
pub fn split_columns(H: &Matrix3<f64>) -> [Vector3<f64>; 4] {
    let f0 = H.column(0).into_owned();
    let f1 = H.column(1).into_owned();
    let f2 = H.column(2).into_owned();
    [f0, f1, f2, -(f0 + f1 + f2)]
}
