//! The homogeneous DLT system.
//!
//! `P * [X, Y, Z, 1]^T ~ [u, v, 1]^T` is cross multiplied to eliminate the
//! unknown projective scale. Each correspondence then contributes two rows
//! which are linear in the 12 entries of `P` (taken row-major):
//!
//! ```text
//! [X, Y, Z, 1, 0, 0, 0, 0, -u*X, -u*Y, -u*Z, -u]
//! [0, 0, 0, 0, X, Y, Z, 1, -v*X, -v*Y, -v*Z, -v]
//! ```
use nalgebra::DMatrix;

use crate::{Point2D, Point3D, Result};

/// Number of unknowns of the homogeneous system.
pub const N_UNKNOWNS: usize = 12;

/// Build the 2N x 12 coefficient matrix `A`.
///
/// Row `2i` holds the x equation and row `2i + 1` the y equation of
/// correspondence `i`. Fails if the inputs have different lengths or are
/// empty.
#[allow(non_snake_case)]
pub fn build(world: &[Point3D], cam: &[Point2D]) -> Result<DMatrix<f64>> {
    crate::check_lengths(world.len(), cam.len())?;

    let mut a_data = Vec::with_capacity(world.len() * 2 * N_UNKNOWNS);
    for (w, c) in world.iter().zip(cam.iter()) {
        let (X, Y, Z) = (w.x, w.y, w.z);
        let (u, v) = (c.x, c.y);

        let r1 = [X, Y, Z, 1.0, 0.0, 0.0, 0.0, 0.0, -u * X, -u * Y, -u * Z, -u];
        let r2 = [0.0, 0.0, 0.0, 0.0, X, Y, Z, 1.0, -v * X, -v * Y, -v * Z, -v];
        a_data.extend_from_slice(&r1);
        a_data.extend_from_slice(&r2);
    }

    Ok(DMatrix::from_row_slice(world.len() * 2, N_UNKNOWNS, &a_data))
}
