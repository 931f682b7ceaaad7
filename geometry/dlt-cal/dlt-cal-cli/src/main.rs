use camino::Utf8PathBuf;
use clap::Parser;
use eyre::{self, WrapErr};

use dlt_cal::{CalibrationConfig, CalibrationReport, MalformedRowPolicy, StrategyKind};

mod logging;

#[derive(Debug, Parser)]
#[command(name = "dlt-cal", author, version, about, long_about = None)]
struct Cli {
    /// Text file with 3D object points.
    ///
    /// The first line holds the number of points, each following line holds
    /// "X Y Z".
    #[arg(default_value = "3D.txt")]
    points_3d: Utf8PathBuf,

    /// Text file with the 2D image points, in the same order.
    ///
    /// The first line holds the number of points, each following line holds
    /// "u v".
    #[arg(default_value = "2D.txt")]
    points_2d: Utf8PathBuf,

    /// YAML file with calibration options. Command line flags take
    /// precedence over it.
    #[arg(long)]
    config: Option<Utf8PathBuf>,

    /// Linear formulation to solve.
    #[arg(long, value_enum)]
    strategy: Option<StrategyKind>,

    /// Fail on malformed rows in the point files instead of skipping them.
    #[arg(long)]
    strict: bool,

    /// Normalize the points before solving (SVD strategy).
    #[arg(long)]
    normalize: bool,

    /// Gap between the two smallest singular values, relative to the
    /// largest, below which the solution is reported as degenerate.
    #[arg(long)]
    degeneracy_tolerance: Option<f64>,

    /// Solve with every strategy and print all results.
    #[arg(long)]
    compare: bool,

    /// Save a YAML report to this file.
    #[arg(long, conflicts_with = "compare")]
    output: Option<Utf8PathBuf>,

    /// Also write log messages to this file.
    #[arg(long)]
    log_file: Option<Utf8PathBuf>,
}

impl Cli {
    fn calibration_config(&self) -> eyre::Result<CalibrationConfig> {
        let mut cfg = match &self.config {
            Some(path) => CalibrationConfig::from_path(path)
                .with_context(|| format!("while reading config \"{path}\""))?,
            None => CalibrationConfig::default(),
        };
        if let Some(strategy) = self.strategy {
            cfg.strategy = strategy;
        }
        if self.strict {
            cfg.malformed_rows = MalformedRowPolicy::Fail;
        }
        if self.normalize {
            cfg.normalize = true;
        }
        if let Some(tol) = self.degeneracy_tolerance {
            cfg.degeneracy_tolerance = tol;
        }
        Ok(cfg)
    }
}

fn print_report(report: &CalibrationReport) {
    let label = report.strategy.label();
    println!("===> {label} Calibration Matrix (3x4) <===");
    println!("{}", report.camera_matrix());
    println!(
        "Average Reprojection Error ({label}): {}",
        report.mean_reprojection_error
    );

    let diagnostics = &report.diagnostics;
    let n_malformed = diagnostics.malformed_row_count();
    if n_malformed > 0 {
        println!("Skipped {n_malformed} malformed row(s).");
    }
    if let Some(degenerate) = &diagnostics.degenerate_solution {
        println!("Warning: degenerate solution, {degenerate}.");
    }
    if !diagnostics.degenerate_projections.is_empty() {
        println!(
            "Warning: points {:?} project to infinity and were left out of the average.",
            diagnostics.degenerate_projections
        );
    }
}

fn main() -> eyre::Result<()> {
    let cli = Cli::parse();
    let _tracing_guard = logging::init(cli.log_file.as_deref())?;
    let cfg = cli.calibration_config()?;
    tracing::debug!("{cfg:?}");

    let loaded = dlt_cal::load_correspondences(&cli.points_3d, &cli.points_2d, cfg.malformed_rows)
        .with_context(|| {
            format!(
                "while loading points from \"{}\" and \"{}\"",
                cli.points_3d, cli.points_2d
            )
        })?;
    tracing::info!(
        "Loaded {} corresponding points.",
        loaded.correspondences.len()
    );

    let strategies = if cli.compare {
        StrategyKind::ALL.to_vec()
    } else {
        vec![cfg.strategy]
    };

    for (i, strategy) in strategies.into_iter().enumerate() {
        let cal = dlt_cal::calibrate(&loaded.correspondences, &cfg.with_strategy(strategy))
            .with_context(|| format!("while calibrating with {strategy} strategy"))?;
        let report = CalibrationReport::new(&cal, &loaded);

        if i > 0 {
            println!();
        }
        print_report(&report);

        if let Some(output) = &cli.output {
            dlt_cal::save_report_yaml(output, &report, env!("CARGO_PKG_NAME"))
                .with_context(|| format!("while saving report to \"{output}\""))?;
            tracing::info!("Saved report to \"{output}\".");
        }
    }
    Ok(())
}
