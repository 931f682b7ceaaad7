//! Reprojection of 3D points through a camera matrix.
use nalgebra::Vector4;
use serde::{Deserialize, Serialize};

use crate::{CameraMatrix, Point2D, Point3D, Result};

pub const DEFAULT_PROJECTION_EPSILON: f64 = 1e-12;

/// Per-point and mean reprojection distance, in pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reprojection {
    /// One entry per point. NaN where the projection is degenerate.
    pub errors: Vec<f64>,
    /// Mean over the points with a defined error. NaN if there are none.
    pub mean: f64,
    /// Indices of points projecting to (or near) infinity.
    pub degenerate_projections: Vec<usize>,
}

/// Project one point. Returns `None` if its homogeneous depth is negligible,
/// i.e. `|q2| <= epsilon * |P| * |[X, Y, Z, 1]|`.
///
/// The test is invariant to the scale of `pmat`.
pub fn project_point(pmat: &CameraMatrix, pt: &Point3D, epsilon: f64) -> Option<Point2D> {
    let xh: Vector4<f64> = pt.to_homogeneous();
    let q = pmat * xh;
    // Also false for NaN.
    let finite_depth = q.z.abs() > epsilon * pmat.norm() * xh.norm();
    if !finite_depth {
        return None;
    }
    Some(Point2D::new(q.x / q.z, q.y / q.z))
}

/// Project all points with [`DEFAULT_PROJECTION_EPSILON`].
pub fn project_points(pmat: &CameraMatrix, points: &[Point3D]) -> Vec<Option<Point2D>> {
    points
        .iter()
        .map(|pt| project_point(pmat, pt, DEFAULT_PROJECTION_EPSILON))
        .collect()
}

/// Reprojection error of `pmat` on the correspondences.
pub fn evaluate(pmat: &CameraMatrix, world: &[Point3D], cam: &[Point2D]) -> Result<Reprojection> {
    evaluate_with_epsilon(pmat, world, cam, DEFAULT_PROJECTION_EPSILON)
}

pub fn evaluate_with_epsilon(
    pmat: &CameraMatrix,
    world: &[Point3D],
    cam: &[Point2D],
    epsilon: f64,
) -> Result<Reprojection> {
    crate::check_lengths(world.len(), cam.len())?;

    let mut degenerate_projections = Vec::new();
    let errors: Vec<f64> = world
        .iter()
        .zip(cam.iter())
        .enumerate()
        .map(|(i, (pt, observed))| match project_point(pmat, pt, epsilon) {
            Some(projected) => nalgebra::distance(&projected, observed),
            None => {
                tracing::warn!("point {i} ({pt}) projects to infinity");
                degenerate_projections.push(i);
                f64::NAN
            }
        })
        .collect();

    let defined: Vec<f64> = errors.iter().copied().filter(|e| !e.is_nan()).collect();
    let mean = if defined.is_empty() {
        f64::NAN
    } else {
        defined.iter().sum::<f64>() / defined.len() as f64
    };

    Ok(Reprojection {
        errors,
        mean,
        degenerate_projections,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[rustfmt::skip]
    fn pmat() -> CameraMatrix {
        CameraMatrix::new(
            1.0, 0.0, 0.0, 0.0,
            0.0, 1.0, 0.0, 0.0,
            0.0, 0.0, 1.0, 0.0,
        )
    }

    #[test]
    fn test_errors_and_mean() {
        let world = [Point3D::new(2.0, 4.0, 2.0), Point3D::new(3.0, 3.0, 3.0)];
        let cam = [Point2D::new(1.0, 2.0), Point2D::new(4.0, 5.0)];
        let r = evaluate(&pmat(), &world, &cam).unwrap();
        assert_eq!(r.errors.len(), 2);
        approx::assert_relative_eq!(r.errors[0], 0.0);
        approx::assert_relative_eq!(r.errors[1], 5.0);
        approx::assert_relative_eq!(r.mean, 2.5);
        assert!(r.degenerate_projections.is_empty());
    }

    #[test]
    fn test_scale_invariance() {
        let world = [
            Point3D::new(2.0, 4.0, 2.0),
            Point3D::new(3.0, 3.0, 3.0),
            Point3D::new(-1.0, 0.5, 4.0),
        ];
        let cam = [
            Point2D::new(1.1, 2.0),
            Point2D::new(4.0, 5.0),
            Point2D::new(0.0, 0.0),
        ];
        let r1 = evaluate(&pmat(), &world, &cam).unwrap();
        for c in [-3.0, 1e-6, 250.0] {
            let r2 = evaluate(&(pmat() * c), &world, &cam).unwrap();
            for (e1, e2) in r1.errors.iter().zip(r2.errors.iter()) {
                approx::assert_relative_eq!(e1, e2, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_degenerate_projection_isolated() {
        let world = [
            Point3D::new(2.0, 4.0, 2.0),
            Point3D::new(1.0, 1.0, 0.0),
            Point3D::new(3.0, 3.0, 3.0),
        ];
        let cam = [
            Point2D::new(1.0, 2.0),
            Point2D::new(1.0, 1.0),
            Point2D::new(1.0, 2.0),
        ];
        let r = evaluate(&pmat(), &world, &cam).unwrap();
        assert_eq!(r.degenerate_projections, vec![1]);
        assert!(r.errors[1].is_nan());
        approx::assert_relative_eq!(r.mean, 0.5);

        assert_eq!(project_points(&pmat(), &world)[1], None);
    }

    #[test]
    fn test_all_degenerate() {
        let world = [Point3D::new(1.0, 1.0, 0.0)];
        let cam = [Point2D::new(1.0, 1.0)];
        let r = evaluate(&pmat(), &world, &cam).unwrap();
        assert!(r.mean.is_nan());
    }

    #[test]
    fn test_shape_mismatch() {
        let world = [Point3D::new(1.0, 1.0, 1.0)];
        assert!(evaluate(&pmat(), &world, &[]).is_err());
    }
}
