//! Solving for the camera matrix.
//!
//! [`solve`] extracts the null space of the homogeneous system built by
//! [`crate::system::build`]. Minimizing `|A p|` subject to `|p| = 1` is solved
//! exactly by the right singular vector of `A` with the smallest singular
//! value, so noise is spread over all correspondences.
//!
//! The solvers are also available behind the [`PmatSolver`] trait so that
//! the homogeneous formulation ([`SvdNullSpace`]) and the classic formulation
//! with `P[(2, 3)] = 1` ([`InhomogeneousDlt`]) can be compared on the same
//! data.
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::normalize::{normalize_2d, normalize_3d};
use crate::system::{build, N_UNKNOWNS};
use crate::{CameraMatrix, Correspondences, DltCalError, Result, ShapeMismatch};

pub const DEFAULT_DEGENERACY_TOLERANCE: f64 = 1e-10;
pub const DEFAULT_LSTSQ_EPSILON: f64 = 1e-10;

const SVD_MAX_ITERATIONS: usize = 1_000_000;

/// Why a solution is not unique.
///
/// The matrix is still returned, the caller decides whether an approximate
/// result is acceptable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegenerateSolution {
    /// The two smallest singular values of the homogeneous system are too
    /// close, so the null space is not one dimensional.
    NullSpaceNotUnique {
        smallest: f64,
        second_smallest: f64,
        largest: f64,
        tolerance: f64,
    },
    /// The inhomogeneous system does not have full column rank.
    RankDeficient { rank: usize, unknowns: usize },
}

impl std::fmt::Display for DegenerateSolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DegenerateSolution::NullSpaceNotUnique {
                smallest,
                second_smallest,
                largest,
                tolerance,
            } => write!(
                f,
                "smallest singular values {smallest:e} and {second_smallest:e} \
                 differ by less than {tolerance:e} of {largest:e}"
            ),
            DegenerateSolution::RankDeficient { rank, unknowns } => {
                write!(f, "rank {rank} with {unknowns} unknowns")
            }
        }
    }
}

/// A camera matrix together with what was learned while solving for it.
#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    pub pmat: CameraMatrix,
    /// Singular values of the solved system, in decreasing order. Empty for
    /// solvers that do not expose them.
    pub singular_values: Vec<f64>,
    pub degenerate: Option<DegenerateSolution>,
}

/// A method to find the camera matrix from correspondences.
pub trait PmatSolver {
    /// Short identifier used in logs.
    fn name(&self) -> &'static str;
    fn solve(&self, corr: &Correspondences) -> Result<Solution>;
}

/// Solve `A p = 0` via SVD.
///
/// `A` must have 12 columns and at least 12 rows, i.e. come from at least
/// six correspondences. Uses [`DEFAULT_DEGENERACY_TOLERANCE`].
pub fn solve(a: &DMatrix<f64>) -> Result<Solution> {
    SvdNullSpace::default().solve_system(a)
}

/// The homogeneous DLT solved by SVD.
#[derive(Debug, Clone, PartialEq)]
pub struct SvdNullSpace {
    pub degeneracy_tolerance: f64,
    /// Condition points before building the system and undo it afterwards.
    pub normalize: bool,
}

impl Default for SvdNullSpace {
    fn default() -> Self {
        Self {
            degeneracy_tolerance: DEFAULT_DEGENERACY_TOLERANCE,
            normalize: false,
        }
    }
}

impl SvdNullSpace {
    /// Find the camera matrix from an already built coefficient matrix.
    pub fn solve_system(&self, a: &DMatrix<f64>) -> Result<Solution> {
        let (nrows, ncols) = a.shape();
        if ncols != N_UNKNOWNS || nrows < N_UNKNOWNS {
            return Err(ShapeMismatch::CoefficientMatrix { nrows, ncols }.into());
        }
        // The SVD does not converge on NaN and would spin until the
        // iteration limit.
        if !a.iter().all(|v| v.is_finite()) {
            return Err(DltCalError::NonFiniteCoefficient);
        }

        // Thin SVD: with at least as many rows as columns, V^T is 12x12 and
        // thus contains the null space direction.
        let svd = nalgebra::linalg::SVD::try_new(
            a.clone(),
            false,
            true,
            f64::EPSILON,
            SVD_MAX_ITERATIONS,
        )
        .ok_or(DltCalError::SvdFailed)?;
        let v_t = svd.v_t.as_ref().ok_or(DltCalError::SvdFailed)?;

        // Do not rely on the sort order of the SVD implementation.
        let sv: Vec<f64> = svd.singular_values.iter().map(|s| s.abs()).collect();
        let mut order: Vec<usize> = (0..sv.len()).collect();
        order.sort_by(|&i, &j| sv[i].total_cmp(&sv[j]));
        let (i_min, i_next, i_max) = (order[0], order[1], order[sv.len() - 1]);
        tracing::debug!("singular values of {nrows}x{ncols} system: {sv:?}");

        let mut pmat = CameraMatrix::zeros();
        for r in 0..3 {
            for c in 0..4 {
                pmat[(r, c)] = v_t[(i_min, 4 * r + c)];
            }
        }

        let (smallest, second_smallest, largest) = (sv[i_min], sv[i_next], sv[i_max]);
        let degenerate = if second_smallest - smallest <= self.degeneracy_tolerance * largest {
            Some(DegenerateSolution::NullSpaceNotUnique {
                smallest,
                second_smallest,
                largest,
                tolerance: self.degeneracy_tolerance,
            })
        } else {
            None
        };

        let singular_values = order.iter().rev().map(|&i| sv[i]).collect();
        Ok(Solution {
            pmat,
            singular_values,
            degenerate,
        })
    }
}

impl PmatSolver for SvdNullSpace {
    fn name(&self) -> &'static str {
        "svd"
    }

    fn solve(&self, corr: &Correspondences) -> Result<Solution> {
        if self.normalize {
            match (
                normalize_3d(corr.object_points()),
                normalize_2d(corr.image_points()),
            ) {
                (Some((world, t_world)), Some((cam, t_cam_inv))) => {
                    let a = build(&world, &cam)?;
                    let mut sln = self.solve_system(&a)?;
                    sln.pmat = t_cam_inv * sln.pmat * t_world;
                    sln.pmat /= sln.pmat.norm();
                    return Ok(sln);
                }
                _ => {
                    tracing::warn!("points cannot be normalized, solving unnormalized system");
                }
            }
        }
        let a = build(corr.object_points(), corr.image_points())?;
        self.solve_system(&a)
    }
}

/// The DLT with `P[(2, 3)]` fixed to one, solved by linear least squares.
///
/// Cannot represent cameras for which the world origin lies on the principal
/// plane, as those have `P[(2, 3)] = 0`.
#[derive(Debug, Clone, PartialEq)]
pub struct InhomogeneousDlt {
    /// Singular values below this are treated as zero.
    pub epsilon: f64,
}

impl Default for InhomogeneousDlt {
    fn default() -> Self {
        Self {
            epsilon: DEFAULT_LSTSQ_EPSILON,
        }
    }
}

impl InhomogeneousDlt {
    /// Column rank of the 2N x 11 system the DLT solves: the homogeneous
    /// system without its last column.
    fn rank(&self, a: &DMatrix<f64>) -> Result<usize> {
        let b = a.columns(0, N_UNKNOWNS - 1).into_owned();
        let c = -a.column(N_UNKNOWNS - 1).into_owned();
        let results = lstsq::lstsq(&b, &c, self.epsilon).map_err(|msg| DltCalError::Lstsq { msg })?;
        tracing::debug!(
            "inhomogeneous DLT: rank {}, residuals {}",
            results.rank,
            results.residuals
        );
        Ok(results.rank)
    }
}

impl PmatSolver for InhomogeneousDlt {
    fn name(&self) -> &'static str {
        "inhomogeneous"
    }

    fn solve(&self, corr: &Correspondences) -> Result<Solution> {
        let points: Vec<dlt::CorrespondingPoint<f64>> = corr
            .object_points()
            .iter()
            .zip(corr.image_points().iter())
            .map(|(wc, ic)| dlt::CorrespondingPoint {
                object_point: [wc.x, wc.y, wc.z],
                image_point: [ic.x, ic.y],
            })
            .collect();
        let pmat = dlt::dlt_corresponding(&points, self.epsilon)
            .map_err(|msg| DltCalError::Lstsq { msg })?;

        let a = build(corr.object_points(), corr.image_points())?;
        let unknowns = N_UNKNOWNS - 1;
        let rank = self.rank(&a)?;
        let degenerate = if rank < unknowns {
            Some(DegenerateSolution::RankDeficient { rank, unknowns })
        } else {
            None
        };

        Ok(Solution {
            pmat,
            singular_values: Vec::new(),
            degenerate,
        })
    }
}
