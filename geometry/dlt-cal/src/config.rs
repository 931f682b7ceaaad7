use serde::{Deserialize, Serialize};

use crate::solve::{InhomogeneousDlt, PmatSolver, SvdNullSpace};

/// What to do with a point file line that does not hold a point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[serde(rename_all = "snake_case")]
pub enum MalformedRowPolicy {
    /// Drop the row, record it and keep going.
    #[default]
    Skip,
    /// Stop loading with [`crate::DltCalError::MalformedRow`].
    Fail,
}

/// Which linear formulation to solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Homogeneous system with 12 unknowns, null space found by SVD.
    #[default]
    Svd,
    /// 11 unknowns with `P[(2, 3)] = 1`, solved by least squares.
    Inhomogeneous,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 2] = [StrategyKind::Svd, StrategyKind::Inhomogeneous];

    /// Short human readable name.
    pub fn label(&self) -> &'static str {
        match self {
            StrategyKind::Svd => "SVD",
            StrategyKind::Inhomogeneous => "inhomogeneous DLT",
        }
    }
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Tunable parameters of [`crate::calibrate`] and the point loaders.
///
/// Usually read from YAML:
///
/// ```yaml
/// malformed_rows: fail
/// strategy: svd
/// normalize: true
/// degeneracy_tolerance: 1.0e-9
/// ```
///
/// Missing keys keep their default values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CalibrationConfig {
    pub malformed_rows: MalformedRowPolicy,
    pub strategy: StrategyKind,
    /// Condition the points before building the system (SVD strategy only).
    pub normalize: bool,
    /// Gap between the two smallest singular values, relative to the largest,
    /// below which the solution is reported as degenerate.
    pub degeneracy_tolerance: f64,
    /// Relative homogeneous depth below which a projection is degenerate.
    pub projection_epsilon: f64,
    /// Singular value cutoff of the inhomogeneous least squares solution.
    pub lstsq_epsilon: f64,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            malformed_rows: MalformedRowPolicy::default(),
            strategy: StrategyKind::default(),
            normalize: false,
            degeneracy_tolerance: crate::solve::DEFAULT_DEGENERACY_TOLERANCE,
            projection_epsilon: crate::reproject::DEFAULT_PROJECTION_EPSILON,
            lstsq_epsilon: crate::solve::DEFAULT_LSTSQ_EPSILON,
        }
    }
}

impl CalibrationConfig {
    pub fn from_yaml<R: std::io::Read>(rdr: R) -> crate::Result<Self> {
        Ok(serde_yaml::from_reader(rdr)?)
    }

    pub fn from_path<P: AsRef<std::path::Path>>(path: P) -> crate::Result<Self> {
        let fd = std::fs::File::open(path.as_ref())?;
        Self::from_yaml(std::io::BufReader::new(fd))
    }

    /// Same configuration with another strategy.
    pub fn with_strategy(&self, strategy: StrategyKind) -> Self {
        Self {
            strategy,
            ..self.clone()
        }
    }

    /// The solver selected by [`Self::strategy`].
    pub fn solver(&self) -> Box<dyn PmatSolver> {
        match self.strategy {
            StrategyKind::Svd => Box::new(SvdNullSpace {
                degeneracy_tolerance: self.degeneracy_tolerance,
                normalize: self.normalize,
            }),
            StrategyKind::Inhomogeneous => Box::new(InhomogeneousDlt {
                epsilon: self.lstsq_epsilon,
            }),
        }
    }
}
