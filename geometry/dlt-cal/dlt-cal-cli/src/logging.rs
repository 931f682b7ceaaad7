use camino::Utf8Path;
use eyre::WrapErr;
use time::{UtcOffset, format_description::well_known::Iso8601};
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, time::OffsetTime},
    layer::SubscriberExt,
};

struct Guard {}

impl Drop for Guard {
    fn drop(&mut self) {
        tracing::trace!("Logging finished.");
    }
}

/// Log to stderr and, if given, to `log_file`.
///
/// The level filter is read from `RUST_LOG` and defaults to `info`. Stdout is
/// left to the calibration results. Keep the returned guard alive until the
/// end of `main`.
pub(crate) fn init(log_file: Option<&Utf8Path>) -> eyre::Result<impl Drop> {
    // Fixed offset of the local timezone at startup.
    let timer = OffsetTime::new(
        UtcOffset::from_whole_seconds(chrono::Local::now().offset().local_minus_utc())?,
        Iso8601::DEFAULT,
    );

    let file_layer = match log_file {
        Some(path) => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("while creating log file \"{path}\""))?;
            Some(
                fmt::layer()
                    .with_timer(timer.clone())
                    .with_writer(std::sync::Mutex::new(file))
                    .with_ansi(false)
                    .with_file(true)
                    .with_line_number(true),
            )
        }
        None => None,
    };

    let console_layer = fmt::layer()
        .with_timer(timer)
        .with_writer(std::io::stderr)
        .with_ansi(!cfg!(windows))
        .with_file(true)
        .with_line_number(true);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let collector = tracing_subscriber::registry()
        .with(file_layer)
        .with(console_layer)
        .with(filter);
    tracing::subscriber::set_global_default(collector)?;

    if let Some(path) = log_file {
        tracing::debug!("Logging initiated to file \"{path}\".");
    }
    Ok(Guard {})
}
