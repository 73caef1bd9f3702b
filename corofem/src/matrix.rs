//! Small dense linear algebra helpers used by the element and solver code.

use na::{Matrix3, Vector3};
use rayon::prelude::*;

/// Shape matrix of a tetrahedron.
///
/// Column `i` is the edge vector from the last vertex to vertex `i`.
#[inline]
pub fn shape_matrix(verts: &[Vector3<f64>; 4]) -> Matrix3<f64> {
    Matrix3::from_columns(&[verts[0] - verts[3], verts[1] - verts[3], verts[2] - verts[3]])
}

/// Singular value decomposition with rotation factors.
///
/// `F = U * diag(sigma) * Vᵗ` where both `U` and `V` are proper rotations. Reflections are
/// absorbed into the sign of the last singular value.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SignedSvd {
    pub u: Matrix3<f64>,
    pub sigma: Vector3<f64>,
    pub v: Matrix3<f64>,
}

impl SignedSvd {
    /// The rotation `U * Vᵗ` closest to the decomposed matrix.
    #[inline]
    pub fn rotation(&self) -> Matrix3<f64> {
        self.u * self.v.transpose()
    }

    /// Reassemble `U * diag(sigma) * Vᵗ`.
    pub fn recompose(&self) -> Matrix3<f64> {
        self.u * Matrix3::from_diagonal(&self.sigma) * self.v.transpose()
    }
}

/// Signed SVD of a 3x3 matrix.
///
/// Singular values come out in decreasing magnitude, so the sign flip always lands on the
/// smallest one. Returns `None` if the iterative decomposition fails to converge.
pub fn ssvd(f: &Matrix3<f64>) -> Option<SignedSvd> {
    let svd = f.try_svd(true, true, f64::EPSILON, 0)?;
    let mut u = svd.u?;
    let mut v = svd.v_t?.transpose();
    let mut sigma = svd.singular_values;

    if u.determinant() < 0.0 {
        u.column_mut(2).neg_mut();
        sigma[2] = -sigma[2];
    }
    if v.determinant() < 0.0 {
        v.column_mut(2).neg_mut();
        sigma[2] = -sigma[2];
    }

    Some(SignedSvd { u, sigma, v })
}

/// Parallel dot product of two flat vectors.
pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    debug_assert_eq!(a.len(), b.len());
    a.par_iter().zip(b.par_iter()).map(|(&a, &b)| a * b).sum()
}

/// Computes `y = a * x + b * y` in parallel.
pub fn axpby(a: f64, x: &[f64], b: f64, y: &mut [f64]) {
    debug_assert_eq!(x.len(), y.len());
    y.par_iter_mut()
        .zip(x.par_iter())
        .for_each(|(y, &x)| *y = a * x + b * *y);
}

/// Computes `out = x - y` in parallel.
pub fn sub(x: &[f64], y: &[f64], out: &mut [f64]) {
    debug_assert_eq!(x.len(), y.len());
    debug_assert_eq!(x.len(), out.len());
    out.par_iter_mut()
        .zip(x.par_iter().zip(y.par_iter()))
        .for_each(|(out, (&x, &y))| *out = x - y);
}

pub(crate) fn inf_norm<I>(iter: I) -> f64
where
    I: IntoIterator<Item = f64>,
{
    iter.into_iter()
        .map(|x| x.abs())
        .max_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Less))
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::distributions::Uniform;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn random_matrix(rng: &mut StdRng) -> Matrix3<f64> {
        let range = Uniform::new(-2.0, 2.0);
        Matrix3::from_fn(|_, _| rng.sample(range))
    }

    #[test]
    fn shape_matrix_columns() {
        let verts = [
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(0.0, 2.0, 0.0),
            Vector3::new(0.0, 0.0, 3.0),
            Vector3::new(1.0, 1.0, 1.0),
        ];
        let m = shape_matrix(&verts);
        assert_eq!(m.column(0), Vector3::new(0.0, -1.0, -1.0));
        assert_eq!(m.column(1), Vector3::new(-1.0, 1.0, -1.0));
        assert_eq!(m.column(2), Vector3::new(-1.0, -1.0, 2.0));
    }

    #[test]
    fn ssvd_yields_rotations() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        let mut tested = 0;
        while tested < 500 {
            let f = random_matrix(&mut rng);
            if f.determinant().abs() < 1e-3 {
                continue;
            }
            tested += 1;

            let svd = ssvd(&f).unwrap();
            assert_relative_eq!(svd.u.determinant(), 1.0, epsilon = 1e-9);
            assert_relative_eq!(svd.v.determinant(), 1.0, epsilon = 1e-9);
            assert_relative_eq!(svd.recompose(), f, epsilon = 1e-9);

            // Only the smallest singular value may carry the sign of det(F).
            assert!(svd.sigma[0] >= 0.0 && svd.sigma[1] >= 0.0);
            assert_eq!(svd.sigma[2] < 0.0, f.determinant() < 0.0);
        }
    }

    #[test]
    fn ssvd_of_reflection() {
        let f = Matrix3::from_diagonal(&Vector3::new(1.0, 1.0, -1.0));
        let svd = ssvd(&f).unwrap();
        assert_relative_eq!(svd.sigma[2], -1.0, epsilon = 1e-12);
        assert_relative_eq!(svd.rotation(), Matrix3::identity(), epsilon = 1e-12);
    }

    #[test]
    fn ssvd_of_rotation_is_identity_stretch() {
        let r = na::Rotation3::from_euler_angles(0.3, -1.1, 2.0);
        let svd = ssvd(r.matrix()).unwrap();
        assert_relative_eq!(svd.sigma, Vector3::new(1.0, 1.0, 1.0), epsilon = 1e-9);
        assert_relative_eq!(svd.rotation(), *r.matrix(), epsilon = 1e-9);
    }

    #[test]
    fn vector_ops() {
        let x = vec![1.0, 2.0, 3.0];
        let mut y = vec![4.0, 5.0, 6.0];
        assert_eq!(dot(&x, &y), 32.0);
        axpby(2.0, &x, -1.0, &mut y);
        assert_eq!(y, vec![-2.0, -1.0, 0.0]);
        let mut out = vec![0.0; 3];
        sub(&x, &y, &mut out);
        assert_eq!(out, vec![3.0, 3.0, 3.0]);
        assert_eq!(inf_norm(out.iter().cloned()), 3.0);
    }
}
