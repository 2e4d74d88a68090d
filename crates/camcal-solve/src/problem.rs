//! Joint bundle problem: shared camera parameters plus per-view poses.
//!
//! The parameter vector is laid out as
//! `[camera (CAM_DIM)] [rvec_0 t_0] [rvec_1 t_1] ...` with poses as
//! axis-angle + translation. Residuals are reprojection errors in pixels,
//! two rows per observed corner. The Jacobian is assembled per block with
//! central finite differences: a camera column touches every row, a pose
//! column only its own view's rows.

use levenberg_marquardt::{LeastSquaresProblem, LevenbergMarquardt, TerminationReason};
use nalgebra::{storage::Owned, DMatrix, DVector, Dyn, Rotation3};

use camcal_core::{CorrespondenceView, Pt2, Real, Vec3};

/// Reprojection residual substituted when a point leaves the model's valid
/// projection domain; large enough to steer the solver back.
const INVALID_RESIDUAL: Real = 1e4;

const POSE_DIM: usize = 6;
const FD_STEP: Real = 1e-6;

/// Stopping rule for the bundle refinement.
#[derive(Debug, Clone, Copy)]
pub struct SolveOptions {
    /// Maximum number of solver iterations before termination.
    pub max_iters: usize,
    /// Relative tolerance on the objective reduction.
    pub ftol: Real,
    /// Gradient tolerance.
    pub gtol: Real,
    /// Relative tolerance on parameter updates.
    pub xtol: Real,
}

impl Default for SolveOptions {
    fn default() -> Self {
        Self {
            max_iters: 100,
            ftol: 1e-12,
            gtol: 1e-12,
            xtol: 1e-12,
        }
    }
}

impl SolveOptions {
    /// The omnidirectional stopping rule: 200 iterations, 1e-4 parameter
    /// tolerance.
    pub fn omnidir() -> Self {
        Self {
            max_iters: 200,
            xtol: 1e-4,
            ..Self::default()
        }
    }
}

/// Outcome of one bundle refinement.
#[derive(Debug, Clone)]
pub struct SolveReport {
    pub iterations: usize,
    pub final_cost: Real,
    pub converged: bool,
}

/// Camera parameterization used by the bundle problem.
pub(crate) trait BundleCamera {
    /// Number of shared camera parameters at the head of the vector.
    const CAM_DIM: usize;

    /// Project a camera-frame point under the given parameter slice.
    fn project_with(cam: &[Real], p: &Vec3) -> Option<Pt2>;
}

pub(crate) struct BundleProblem<'a, C: BundleCamera> {
    views: &'a [CorrespondenceView],
    params: DVector<Real>,
    num_residuals: usize,
    _camera: std::marker::PhantomData<C>,
}

impl<'a, C: BundleCamera> BundleProblem<'a, C> {
    pub fn new(views: &'a [CorrespondenceView], x0: DVector<Real>) -> Self {
        debug_assert_eq!(x0.len(), C::CAM_DIM + POSE_DIM * views.len());
        let num_residuals = 2 * views.iter().map(CorrespondenceView::len).sum::<usize>();
        Self {
            views,
            params: x0,
            num_residuals,
            _camera: std::marker::PhantomData,
        }
    }

    fn pose_offset(view_idx: usize) -> usize {
        C::CAM_DIM + POSE_DIM * view_idx
    }

    /// Residual rows `[start, start + 2 * len)` of one view.
    fn view_rows(&self, view_idx: usize) -> (usize, usize) {
        let start: usize = self.views[..view_idx]
            .iter()
            .map(|v| 2 * v.len())
            .sum();
        (start, start + 2 * self.views[view_idx].len())
    }

    /// Residuals of a single view for an arbitrary parameter vector.
    fn view_residuals(&self, x: &DVector<Real>, view_idx: usize, out: &mut [Real]) {
        let cam = &x.as_slice()[..C::CAM_DIM];
        let off = Self::pose_offset(view_idx);
        let rvec = Vec3::new(x[off], x[off + 1], x[off + 2]);
        let tvec = Vec3::new(x[off + 3], x[off + 4], x[off + 5]);
        let rot = Rotation3::from_scaled_axis(rvec);

        for (i, (obj, img)) in self.views[view_idx].pairs().enumerate() {
            let p_cam = rot * obj.coords + tvec;
            match C::project_with(cam, &p_cam) {
                Some(proj) => {
                    out[2 * i] = proj.x - img.x;
                    out[2 * i + 1] = proj.y - img.y;
                }
                None => {
                    out[2 * i] = INVALID_RESIDUAL;
                    out[2 * i + 1] = INVALID_RESIDUAL;
                }
            }
        }
    }

    fn all_residuals(&self, x: &DVector<Real>) -> DVector<Real> {
        let mut r = DVector::zeros(self.num_residuals);
        for view_idx in 0..self.views.len() {
            let (start, end) = self.view_rows(view_idx);
            self.view_residuals(x, view_idx, &mut r.as_mut_slice()[start..end]);
        }
        r
    }

    /// Root-mean-square reprojection error (pixels) at the current
    /// parameters, normalized per point as OpenCV does.
    pub fn rms(&self) -> Real {
        let r = self.all_residuals(&self.params);
        (r.norm_squared() / (self.num_residuals as Real / 2.0)).sqrt()
    }

    pub fn into_params(self) -> DVector<Real> {
        self.params
    }
}

impl<C: BundleCamera> LeastSquaresProblem<Real, Dyn, Dyn> for BundleProblem<'_, C> {
    type ResidualStorage = Owned<Real, Dyn>;
    type JacobianStorage = Owned<Real, Dyn, Dyn>;
    type ParameterStorage = Owned<Real, Dyn>;

    fn set_params(&mut self, x: &DVector<Real>) {
        self.params.clone_from(x);
    }

    fn params(&self) -> DVector<Real> {
        self.params.clone()
    }

    fn residuals(&self) -> Option<DVector<Real>> {
        Some(self.all_residuals(&self.params))
    }

    fn jacobian(&self) -> Option<DMatrix<Real>> {
        let n = self.params.len();
        let mut jac = DMatrix::zeros(self.num_residuals, n);
        let mut x = self.params.clone();

        // Camera block: every residual row depends on it.
        for j in 0..C::CAM_DIM {
            let h = FD_STEP * self.params[j].abs().max(1.0);
            x[j] = self.params[j] + h;
            let r_plus = self.all_residuals(&x);
            x[j] = self.params[j] - h;
            let r_minus = self.all_residuals(&x);
            x[j] = self.params[j];

            let col = (r_plus - r_minus) / (2.0 * h);
            jac.column_mut(j).copy_from(&col);
        }

        // Pose blocks: only the owning view's rows are non-zero.
        let mut r_plus = vec![0.0; self.num_residuals];
        let mut r_minus = vec![0.0; self.num_residuals];
        for view_idx in 0..self.views.len() {
            let (start, end) = self.view_rows(view_idx);
            for k in 0..POSE_DIM {
                let j = Self::pose_offset(view_idx) + k;
                let h = FD_STEP * self.params[j].abs().max(1.0);

                x[j] = self.params[j] + h;
                self.view_residuals(&x, view_idx, &mut r_plus[start..end]);
                x[j] = self.params[j] - h;
                self.view_residuals(&x, view_idx, &mut r_minus[start..end]);
                x[j] = self.params[j];

                for row in start..end {
                    jac[(row, j)] = (r_plus[row] - r_minus[row]) / (2.0 * h);
                }
            }
        }

        Some(jac)
    }
}

/// Run LM on a bundle problem. Returns the refined problem (holding the
/// optimized parameters) and a report.
///
/// Running out of iterations is a regular termination per the configured
/// stopping rule, reported as `converged: false`; numerical failures are
/// surfaced as `Err`.
pub(crate) fn solve_bundle<'a, C: BundleCamera>(
    problem: BundleProblem<'a, C>,
    opts: &SolveOptions,
) -> Result<(BundleProblem<'a, C>, SolveReport), String> {
    let lm = LevenbergMarquardt::new()
        .with_ftol(opts.ftol)
        .with_xtol(opts.xtol)
        .with_gtol(opts.gtol)
        .with_patience(opts.max_iters.max(1));

    let (problem, report) = lm.minimize(problem);

    let converged = report.termination.was_successful();
    if !converged && !matches!(report.termination, TerminationReason::LostPatience) {
        return Err(format!("{:?}", report.termination));
    }
    if !converged {
        log::warn!(
            "bundle refinement stopped at the iteration cap ({} evaluations)",
            report.number_of_evaluations
        );
    }

    Ok((
        problem,
        SolveReport {
            iterations: report.number_of_evaluations,
            final_cost: report.objective_function,
            converged,
        },
    ))
}
