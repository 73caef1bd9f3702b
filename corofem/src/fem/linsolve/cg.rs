use crate::matrix::{axpby, dot, sub};

use super::{SolveResult, Status};

/// Implementation of the conjugate gradient method.
///
/// Solves `Ax = b` for a symmetric positive definite `A` that is only available through its
/// action on a vector. No preconditioner is used.
/// https://en.wikipedia.org/wiki/Conjugate_gradient_method
#[allow(non_snake_case)]
#[derive(Clone, Debug)]
pub struct ConjugateGradient {
    max_iter: u32,
    tol: f64,
    r: Vec<f64>,
    p: Vec<f64>,
    Ap: Vec<f64>,
}

impl ConjugateGradient {
    /// Create a solver for systems of the given size.
    ///
    /// The solve stops once the residual norm drops below `tol` times the initial residual norm
    /// or after `max_iter` iterations, whichever comes first.
    #[allow(non_snake_case)]
    pub fn new(size: usize, max_iter: u32, tol: f64) -> Self {
        ConjugateGradient {
            max_iter,
            tol,
            r: vec![0.0; size],
            p: vec![0.0; size],
            Ap: vec![0.0; size],
        }
    }

    /// Solves `Ax = b` where the product `Ax` is provided by the function `matvec`.
    ///
    /// `matvec` takes in the vector `x` and writes `Ax` to the output slice. The initial value
    /// of `x` is used as the starting guess and is overwritten with the solution. If the
    /// iteration budget runs out, `x` holds the last iterate.
    #[allow(non_snake_case)]
    pub fn solve<F>(&mut self, mut matvec: F, x: &mut [f64], b: &[f64]) -> SolveResult
    where
        F: FnMut(&[f64], &mut [f64]),
    {
        let ConjugateGradient {
            max_iter,
            tol,
            ref mut r,
            ref mut p,
            ref mut Ap,
        } = *self;

        debug_assert_eq!(b.len(), x.len());
        r.resize(x.len(), 0.0);
        p.resize(x.len(), 0.0);
        Ap.resize(x.len(), 0.0);

        // r0 = b - A*x0
        matvec(x, Ap);
        sub(b, Ap, r);

        let r_norm_sq_init = dot(r, r);
        let mut r_norm_sq = r_norm_sq_init;

        let result = |iterations, r_norm_sq: f64, status| {
            let residual = r_norm_sq.sqrt();
            let error = if r_norm_sq_init > 0.0 {
                (r_norm_sq / r_norm_sq_init).sqrt()
            } else {
                0.0
            };
            SolveResult {
                iterations,
                residual,
                error,
                status,
            }
        };

        if r_norm_sq_init.is_nan() {
            return result(0, r_norm_sq, Status::NanDetected);
        }

        // The initial guess is already exact.
        if r_norm_sq == 0.0 {
            return result(0, r_norm_sq, Status::Success);
        }

        // p0 = r0
        p.copy_from_slice(r);

        let mut iterations = 0;
        loop {
            if iterations >= max_iter {
                return result(iterations, r_norm_sq, Status::MaximumIterationsExceeded);
            }

            matvec(p, Ap);
            let pAp = dot(p, Ap);
            if pAp.is_nan() {
                return result(iterations, r_norm_sq, Status::NanDetected);
            }
            if pAp <= 0.0 {
                return result(iterations, r_norm_sq, Status::IndefiniteOperator);
            }

            // α = r'r / p'Ap
            let alpha = r_norm_sq / pAp;

            // x = x + α * p
            axpby(alpha, p, 1.0, x);

            // r = r - α * Ap
            axpby(-alpha, Ap, 1.0, r);

            iterations += 1;

            let r_norm_sq_new = dot(r, r);
            log::trace!(
                "CG iteration {}: squared residual = {:e}",
                iterations,
                r_norm_sq_new
            );

            // Stop if |r_new| / |r_init| <= tol.
            if r_norm_sq_new <= tol * tol * r_norm_sq_init {
                return result(iterations, r_norm_sq_new, Status::Success);
            }

            let beta = r_norm_sq_new / r_norm_sq;
            r_norm_sq = r_norm_sq_new;

            // p = r + βp
            axpby(1.0, r, beta, p);
        }
    }
}
