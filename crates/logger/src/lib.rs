use tracing_subscriber::EnvFilter;

/// Default filter when `RUST_LOG` is not set.
pub const DEFAULT_FILTER: &str = "info";

/// Initialize tracing for a binary.
///
/// `RUST_LOG` wins over `default_filter`. Calling this twice is harmless: the second
/// call leaves the already-installed subscriber in place.
pub fn init(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into());

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Same as [`init`] with `-v` style verbosity: 0 = default, 1 = debug, 2+ = trace.
pub fn init_with_verbosity(verbosity: u8) {
    init(filter_for_verbosity(verbosity));
}

fn filter_for_verbosity(verbosity: u8) -> &'static str {
    match verbosity {
        0 => DEFAULT_FILTER,
        1 => "debug",
        _ => "trace",
    }
}
