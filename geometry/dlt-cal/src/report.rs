use serde::{Deserialize, Serialize};

use crate::{
    Calibration, DegenerateSolution, LoadedCorrespondences, MalformedRow, Result, StrategyKind,
};

/// Everything that went wrong short of aborting the calibration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    pub malformed_rows_3d: Vec<MalformedRow>,
    pub malformed_rows_2d: Vec<MalformedRow>,
    pub degenerate_solution: Option<DegenerateSolution>,
    pub degenerate_projections: Vec<usize>,
}

impl Diagnostics {
    pub fn malformed_row_count(&self) -> usize {
        self.malformed_rows_3d.len() + self.malformed_rows_2d.len()
    }

    /// True if nothing was reported.
    pub fn is_clean(&self) -> bool {
        self.malformed_row_count() == 0
            && self.degenerate_solution.is_none()
            && self.degenerate_projections.is_empty()
    }
}

/// Serializable summary of one calibration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationReport {
    pub strategy: StrategyKind,
    /// Row-major 3x4 camera matrix.
    pub camera_matrix: [[f64; 4]; 3],
    pub singular_values: Vec<f64>,
    pub mean_reprojection_error: f64,
    pub reprojection_errors: Vec<f64>,
    pub diagnostics: Diagnostics,
}

impl CalibrationReport {
    pub fn new(calibration: &Calibration, loaded: &LoadedCorrespondences) -> Self {
        let mut report = Self::from_calibration(calibration);
        report.diagnostics.malformed_rows_3d = loaded.malformed_3d.clone();
        report.diagnostics.malformed_rows_2d = loaded.malformed_2d.clone();
        report
    }

    /// A report without loader diagnostics.
    pub fn from_calibration(calibration: &Calibration) -> Self {
        let pmat = calibration.pmat();
        let mut camera_matrix = [[0.0; 4]; 3];
        for (r, row) in camera_matrix.iter_mut().enumerate() {
            for (c, el) in row.iter_mut().enumerate() {
                *el = pmat[(r, c)];
            }
        }
        Self {
            strategy: calibration.strategy,
            camera_matrix,
            singular_values: calibration.solution.singular_values.clone(),
            mean_reprojection_error: calibration.reprojection.mean,
            reprojection_errors: calibration.reprojection.errors.clone(),
            diagnostics: Diagnostics {
                degenerate_solution: calibration.solution.degenerate.clone(),
                degenerate_projections: calibration.reprojection.degenerate_projections.clone(),
                ..Default::default()
            },
        }
    }

    pub fn camera_matrix(&self) -> crate::CameraMatrix {
        crate::CameraMatrix::from_fn(|r, c| self.camera_matrix[r][c])
    }
}

/// Save the report as YAML, preceded by a comment header.
pub fn save_report_yaml<P: AsRef<std::path::Path>>(
    path: P,
    report: &CalibrationReport,
    pkg_name: &str,
) -> Result<()> {
    let local = chrono::Local::now();
    let mut f = std::fs::File::create(&path)?;
    std::io::Write::write_all(
        &mut f,
        format!(
            "# Saved by {} at {}\n\
             # Mean reprojection distance: {:.2}\n",
            pkg_name, local, report.mean_reprojection_error
        )
        .as_bytes(),
    )?;
    serde_yaml::to_writer(f, report)?;
    Ok(())
}
