//! Single camera calibration with the direct linear transform (DLT).
//!
//! Given at least six corresponding 3D world points and 2D image points, this
//! crate recovers the 3x4 projection matrix `P` such that `P * [X, Y, Z, 1]^T`
//! is proportional to `[u, v, 1]^T`. The homogeneous linear system `A p = 0`
//! is assembled from the correspondences and solved by taking the right
//! singular vector of `A` that belongs to its smallest singular value. The
//! quality of the result is then measured by the reprojection error.
//!
//! The computation is a straight pipeline:
//!
//! - [`points`]: load point files (a count line followed by one point per
//!   line), skipping or rejecting malformed rows according to
//!   [`MalformedRowPolicy`].
//! - [`system::build`]: build the 2N x 12 coefficient matrix.
//! - [`solve::solve`]: find the null space vector with nalgebra's SVD and
//!   reshape it into `P`. Alternative formulations implement [`PmatSolver`].
//! - [`reproject::evaluate`]: compute per-point and mean reprojection error.
//!
//! [`calibrate`] and [`calibrate_files`] compose these stages.
//!
//! ## Example
//!
//! ```rust
//! use dlt_cal::{calibrate, project_points, CalibrationConfig, Correspondences, Point3D};
//!
//! #[rustfmt::skip]
//! let p0 = nalgebra::Matrix3x4::new(
//!     800.0,   0.0, 320.0, 10.0,
//!       0.0, 780.0, 240.0, 20.0,
//!       0.0,   0.0,   1.0,  5.0,
//! );
//! let world = vec![
//!     Point3D::new(0.0, 0.0, 0.0),
//!     Point3D::new(1.0, 0.0, 0.5),
//!     Point3D::new(0.0, 1.0, 1.0),
//!     Point3D::new(1.0, 1.0, 0.2),
//!     Point3D::new(0.5, 0.2, 1.5),
//!     Point3D::new(0.3, 0.8, 0.7),
//!     Point3D::new(0.9, 0.4, 1.1),
//! ];
//! let image = project_points(&p0, &world)
//!     .into_iter()
//!     .collect::<Option<Vec<_>>>()
//!     .unwrap();
//!
//! let corr = Correspondences::new(world, image).unwrap();
//! let cal = calibrate(&corr, &CalibrationConfig::default()).unwrap();
//! assert!(cal.reprojection.mean < 1e-6);
//! assert!(cal.solution.degenerate.is_none());
//! ```
#![deny(rust_2018_idioms)]

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A point in the world frame.
pub type Point3D = nalgebra::Point3<f64>;

/// A point in pixel coordinates.
pub type Point2D = nalgebra::Point2<f64>;

/// A 3x4 projection matrix, defined up to a nonzero scale.
pub type CameraMatrix = nalgebra::Matrix3x4<f64>;

/// Minimum number of correspondences for a determined DLT solution.
pub const MIN_CORRESPONDENCES: usize = 6;

#[derive(Error, Debug)]
pub enum DltCalError {
    #[error("shape mismatch: {0}")]
    ShapeMismatch(#[from] ShapeMismatch),
    #[error("malformed row: {0}")]
    MalformedRow(#[from] MalformedRow),
    #[error("correspondence {index} has a non-finite coordinate")]
    NonFiniteCoordinate { index: usize },
    #[error("coefficient matrix has a non-finite entry")]
    NonFiniteCoefficient,
    #[error("SVD failed")]
    SvdFailed,
    #[error("least squares failed: {msg}")]
    Lstsq { msg: &'static str },
    #[error("IO error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
    #[error("serde_yaml error: {source}")]
    SerdeYaml {
        #[from]
        source: serde_yaml::Error,
    },
}

/// Structural problems with the input. These abort the calibration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShapeMismatch {
    #[error("{object_points} 3D points but {image_points} 2D points")]
    LengthMismatch {
        object_points: usize,
        image_points: usize,
    },
    #[error("no correspondences")]
    Empty,
    #[error("{found} correspondences, at least {required} required")]
    NotEnoughPoints { found: usize, required: usize },
    #[error("coefficient matrix is {nrows}x{ncols}, expected at least 12x12")]
    CoefficientMatrix { nrows: usize, ncols: usize },
}

/// A line of a point file that could not be turned into a point.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[error("line {line}: {reason}")]
pub struct MalformedRow {
    /// 1-based line number in the source file, including the count line.
    pub line: usize,
    pub reason: MalformedReason,
}

#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MalformedReason {
    #[error("expected {expected} values, found {found}")]
    WrongTokenCount { expected: usize, found: usize },
    #[error("cannot parse \"{token}\" as a number")]
    InvalidNumber { token: String },
}

pub type Result<M> = std::result::Result<M, DltCalError>;

mod config;
pub use crate::config::{CalibrationConfig, MalformedRowPolicy, StrategyKind};

mod normalize;

pub mod points;
pub use crate::points::{load_correspondences, LoadedCorrespondences, LoadedPoints};

pub mod system;
pub use crate::system::build;

pub mod solve;
pub use crate::solve::{
    solve, DegenerateSolution, InhomogeneousDlt, PmatSolver, Solution, SvdNullSpace,
};

pub mod reproject;
pub use crate::reproject::{evaluate, project_point, project_points, Reprojection};

mod report;
pub use crate::report::{save_report_yaml, CalibrationReport, Diagnostics};

/// Paired 3D object points and 2D image points.
///
/// Index `i` of one sequence corresponds to index `i` of the other. Both
/// sequences have the same length of at least [`MIN_CORRESPONDENCES`].
#[derive(Debug, Clone, PartialEq)]
pub struct Correspondences {
    object_points: Vec<Point3D>,
    image_points: Vec<Point2D>,
}

impl Correspondences {
    pub fn new(object_points: Vec<Point3D>, image_points: Vec<Point2D>) -> Result<Self> {
        check_lengths(object_points.len(), image_points.len())?;
        if object_points.len() < MIN_CORRESPONDENCES {
            return Err(ShapeMismatch::NotEnoughPoints {
                found: object_points.len(),
                required: MIN_CORRESPONDENCES,
            }
            .into());
        }
        let finite = |p: &Point3D, q: &Point2D| {
            p.coords.iter().chain(q.coords.iter()).all(|v| v.is_finite())
        };
        if let Some(index) = object_points
            .iter()
            .zip(image_points.iter())
            .position(|(p, q)| !finite(p, q))
        {
            return Err(DltCalError::NonFiniteCoordinate { index });
        }
        Ok(Self {
            object_points,
            image_points,
        })
    }

    pub fn object_points(&self) -> &[Point3D] {
        &self.object_points
    }

    pub fn image_points(&self) -> &[Point2D] {
        &self.image_points
    }

    /// Number of correspondences.
    pub fn len(&self) -> usize {
        self.object_points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.object_points.is_empty()
    }
}

/// Equal, nonzero lengths.
pub(crate) fn check_lengths(object_points: usize, image_points: usize) -> Result<()> {
    if object_points != image_points {
        return Err(ShapeMismatch::LengthMismatch {
            object_points,
            image_points,
        }
        .into());
    }
    if object_points == 0 {
        return Err(ShapeMismatch::Empty.into());
    }
    Ok(())
}

/// The result of one run of the pipeline.
#[derive(Debug, Clone)]
pub struct Calibration {
    pub strategy: StrategyKind,
    pub solution: Solution,
    pub reprojection: Reprojection,
}

impl Calibration {
    pub fn pmat(&self) -> &CameraMatrix {
        &self.solution.pmat
    }
}

/// Solve for the camera matrix and evaluate it on the same points.
pub fn calibrate(corr: &Correspondences, cfg: &CalibrationConfig) -> Result<Calibration> {
    let solver = cfg.solver();
    tracing::debug!(
        "calibrating {} correspondences with {} solver",
        corr.len(),
        solver.name()
    );
    let solution = solver.solve(corr)?;
    if let Some(degenerate) = &solution.degenerate {
        tracing::warn!(
            "{} solution is not unique ({degenerate}). Are the 3D points coplanar?",
            solver.name()
        );
    }

    let reprojection = reproject::evaluate_with_epsilon(
        &solution.pmat,
        corr.object_points(),
        corr.image_points(),
        cfg.projection_epsilon,
    )?;

    Ok(Calibration {
        strategy: cfg.strategy,
        solution,
        reprojection,
    })
}

/// Load both point files, calibrate, and collect everything into a report.
pub fn calibrate_files<P1, P2>(
    points_3d: P1,
    points_2d: P2,
    cfg: &CalibrationConfig,
) -> Result<CalibrationReport>
where
    P1: AsRef<std::path::Path>,
    P2: AsRef<std::path::Path>,
{
    let loaded = load_correspondences(points_3d, points_2d, cfg.malformed_rows)?;
    let calibration = calibrate(&loaded.correspondences, cfg)?;
    Ok(CalibrationReport::new(&calibration, &loaded))
}
