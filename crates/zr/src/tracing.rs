//! Logging subscriber setup. Grounded in `tracing.rs`'s `TurboSubscriber`,
//! stripped of daemon log-rotation and chrome-tracing layers (this crate has
//! no daemon): `--verbose` raises the global filter, `--quiet` lowers it,
//! and `ZR_LOG` follows `EnvFilter`'s directive syntax for per-module
//! overrides.
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Installs the global subscriber. Returns an error if one is already set
/// (e.g. a second call within the same process, which only happens in
/// tests).
pub fn init(verbosity: u8, quiet: bool, no_color: bool) -> Result<(), tracing_subscriber::util::TryInitError> {
    let default_level = if quiet {
        LevelFilter::ERROR
    } else {
        match verbosity {
            0 => LevelFilter::WARN,
            1 => LevelFilter::INFO,
            2 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        }
    };

    let filter = EnvFilter::builder()
        .with_default_directive(default_level.into())
        .with_env_var("ZR_LOG")
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(!no_color)
        .with_target(false)
        .try_init()
}
