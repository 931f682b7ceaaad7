use nalgebra::{Matrix3, Matrix4};

use crate::{Point2D, Point3D};

/// Similarity transform moving the centroid to the origin and scaling the
/// mean distance from it to `target`. Returns `(centroid, scale)`, or `None`
/// if all points coincide.
fn centroid_and_scale<const D: usize>(
    points: impl Iterator<Item = nalgebra::SVector<f64, D>> + Clone,
    target: f64,
) -> Option<(nalgebra::SVector<f64, D>, f64)> {
    let n = points.clone().count();
    if n == 0 {
        return None;
    }
    let centroid = points.clone().sum::<nalgebra::SVector<f64, D>>() / n as f64;
    let mean_dist = points.map(|p| (p - centroid).norm()).sum::<f64>() / n as f64;
    if mean_dist <= f64::EPSILON {
        return None;
    }
    Some((centroid, target / mean_dist))
}

/// Normalize 3D points to centroid zero and mean distance `sqrt(3)`.
///
/// Returns the normalized points and the 4x4 transform that produced them.
pub(crate) fn normalize_3d(points: &[Point3D]) -> Option<(Vec<Point3D>, Matrix4<f64>)> {
    let (c, s) = centroid_and_scale(points.iter().map(|p| p.coords), 3.0_f64.sqrt())?;
    #[rustfmt::skip]
    let t = Matrix4::new(
        s, 0.0, 0.0, -s * c.x,
        0.0, s, 0.0, -s * c.y,
        0.0, 0.0, s, -s * c.z,
        0.0, 0.0, 0.0, 1.0,
    );
    let normed = points.iter().map(|p| Point3D::from((p - c).coords * s)).collect();
    Some((normed, t))
}

/// Normalize 2D points to centroid zero and mean distance `sqrt(2)`.
///
/// Returns the normalized points and the inverse of the 3x3 transform that
/// produced them.
pub(crate) fn normalize_2d(points: &[Point2D]) -> Option<(Vec<Point2D>, Matrix3<f64>)> {
    let (c, s) = centroid_and_scale(points.iter().map(|p| p.coords), 2.0_f64.sqrt())?;
    #[rustfmt::skip]
    let t_inv = Matrix3::new(
        1.0 / s, 0.0, c.x,
        0.0, 1.0 / s, c.y,
        0.0, 0.0, 1.0,
    );
    let normed = points.iter().map(|p| Point2D::from((p - c).coords * s)).collect();
    Some((normed, t_inv))
}
