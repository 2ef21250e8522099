use super::{SolverOptions, Verbosity};
use crate::errors::{EquilError, EquilResult};
use itertools::izip;
use ndarray::{s, Array1, Array2};
use num_dual::linalg::LU;

const MAX_ITER_MIN: usize = 200;
const TOL_MIN: f64 = 1e-10;
/// Largest step per variable in ln-space.
const MAX_STEP: f64 = 2.0;
/// Interior floor for amounts that start at zero, relative to the upper
/// bound.
const SEED_FLOOR: f64 = 1e-10;

/// Objective value, gradient and Hessian at a trial point.
pub(super) struct Objective {
    pub value: f64,
    pub gradient: Array1<f64>,
    pub hessian: Array2<f64>,
}

/// Minimizes a convex objective subject to `A x = b` and
/// `0 <= x <= upper`.
///
/// The variables are substituted by `y = ln x`, which keeps all amounts
/// strictly positive and turns the lower bound into an open boundary the
/// iteration can approach but never cross. The KKT conditions of the
/// substituted problem are solved with a damped Newton method that moves
/// every variable by at most [`MAX_STEP`] in ln-space per iteration, so a
/// variable seeded at the floor climbs into the interior within a bounded
/// number of steps. Convergence requires feasibility, the amount-weighted
/// stationarity and non-negative reduced costs for all amounts off their
/// upper bound.
pub(super) fn minimize<F>(
    mut objective: F,
    a: &Array2<f64>,
    b: &Array1<f64>,
    x0: &Array1<f64>,
    upper: f64,
    options: SolverOptions,
) -> EquilResult<Array1<f64>>
where
    F: FnMut(&Array1<f64>) -> EquilResult<Objective>,
{
    let (max_iter, tol, verbosity) = options.unwrap_or(MAX_ITER_MIN, TOL_MIN);
    let (a, b) = independent_rows(a, b)?;
    let (nc, nv) = a.dim();

    // strictly interior starting point
    let mut x = x0.mapv(|xi| xi.clamp(SEED_FLOOR * upper, upper));
    let mut obj = objective(&x)?;
    let b_norm = 1.0 + b.fold(0.0f64, |acc, bk| acc.max(bk.abs()));

    log_iter!(
        verbosity,
        " iter |   objective    |  stationarity  |  feasibility  "
    );
    log_iter!(verbosity, "{:-<56}", "");

    for iteration in 1..=max_iter {
        // Newton-KKT system in ln-space. The unknowns are the step dy and
        // fresh multipliers lambda. The curvature of the substitution
        // vanishes at the solution and is left out, so the upper left
        // block stays positive semi-definite for convex objectives.
        let mut kkt = Array2::zeros((nv + nc, nv + nc));
        let mut diagonal_max = 0.0f64;
        for i in 0..nv {
            for j in 0..nv {
                kkt[(i, j)] = x[i] * obj.hessian[(i, j)] * x[j];
            }
            diagonal_max = diagonal_max.max(kkt[(i, i)].abs());
        }
        let regularization = 1e-12 * (1.0 + diagonal_max);
        for i in 0..nv {
            kkt[(i, i)] += regularization;
        }
        for k in 0..nc {
            for i in 0..nv {
                kkt[(nv + k, i)] = a[(k, i)] * x[i];
                kkt[(i, nv + k)] = a[(k, i)] * x[i];
            }
        }
        let residual = &b - &a.dot(&x);
        let mut rhs = Array1::zeros(nv + nc);
        for i in 0..nv {
            rhs[i] = -x[i] * obj.gradient[i];
        }
        for k in 0..nc {
            rhs[nv + k] = residual[k];
        }

        let solution = LU::new(kkt)?.solve(&rhs);
        let dy = solution.slice(s![..nv]).to_owned();
        let lambda = solution.slice(s![nv..]).to_owned();

        // KKT error at the current point with the fresh multipliers. The
        // amount-weighted stationarity of a vanishing amount is blind to
        // the sign of its reduced cost, so amounts below the upper bound
        // also pass through an unweighted dual feasibility measure: a
        // negative reduced cost means the amount still has to grow.
        let mut stationarity = 0.0f64;
        let mut dual_infeasibility = 0.0f64;
        for i in 0..nv {
            let mut gradient = obj.gradient[i];
            for k in 0..nc {
                gradient += a[(k, i)] * lambda[k];
            }
            stationarity = stationarity.max((x[i] * gradient).abs());
            if x[i] < upper {
                dual_infeasibility = dual_infeasibility.max(-gradient);
            }
        }
        let feasibility = residual.fold(0.0f64, |acc, r| acc.max(r.abs())) / b_norm;

        log_iter!(
            verbosity,
            " {:4} | {:14.8e} | {:14.8e} | {:14.8e}",
            iteration,
            obj.value,
            stationarity,
            feasibility
        );

        let scale = 1.0 + obj.value.abs();
        if stationarity < tol * scale
            && dual_infeasibility < tol.sqrt() * scale
            && feasibility < tol
        {
            log_result!(
                verbosity,
                "Equilibrium minimization converged in {} step(s)\n",
                iteration
            );
            return Ok(x);
        }

        // damped step with a per-variable cap; the upper bound is enforced
        // by clamping
        let stepped: Array1<f64> = izip!(&x, &dy)
            .map(|(&xi, &di)| (xi * di.clamp(-MAX_STEP, MAX_STEP).exp()).min(upper))
            .collect();
        x = stepped;
        obj = objective(&x)?;
    }
    Err(EquilError::InnerSolveFailed(
        "no convergence within the maximum number of iterations".to_owned(),
    ))
}

/// Reduces the constraint system to linearly independent rows.
///
/// Dependent rows appear whenever two conserved quantities only occur in a
/// fixed ratio, for example the elements of a feed that contains a single
/// species. An inconsistent dependent row means no composition can satisfy
/// the constraints.
fn independent_rows(a: &Array2<f64>, b: &Array1<f64>) -> EquilResult<(Array2<f64>, Array1<f64>)> {
    let (nc, nv) = a.dim();
    let mut work = a.clone();
    let mut rhs = b.clone();
    let b_norm = 1.0 + b.fold(0.0f64, |acc, bk| acc.max(bk.abs()));

    // Gaussian elimination with partial pivoting
    let mut rank = 0;
    for col in 0..nv {
        if rank == nc {
            break;
        }
        let mut pivot = rank;
        for row in (rank + 1)..nc {
            if work[(row, col)].abs() > work[(pivot, col)].abs() {
                pivot = row;
            }
        }
        if work[(pivot, col)].abs() <= 1e-10 {
            continue;
        }
        if pivot != rank {
            for c in 0..nv {
                work.swap((pivot, c), (rank, c));
            }
            rhs.swap(pivot, rank);
        }
        for row in (rank + 1)..nc {
            let factor = work[(row, col)] / work[(rank, col)];
            if factor != 0.0 {
                for c in col..nv {
                    work[(row, c)] -= factor * work[(rank, c)];
                }
                work[(row, col)] = 0.0;
                rhs[row] -= factor * rhs[rank];
            }
        }
        rank += 1;
    }

    for row in rank..nc {
        if rhs[row].abs() > 1e-10 * b_norm {
            return Err(EquilError::InnerSolveFailed(
                "the conservation constraints are inconsistent".to_owned(),
            ));
        }
    }
    Ok((
        work.slice(s![..rank, ..]).to_owned(),
        rhs.slice(s![..rank]).to_owned(),
    ))
}
