//! Logging setup.
//!
//! Logs go to stderr so that reports printed on stdout stay pipeable.
//! `RUST_LOG` takes precedence over the `-v` count.

use tracing_subscriber::EnvFilter;

/// Install the global `tracing` subscriber.
///
/// Calling this more than once is harmless: later calls are ignored.
pub fn init(verbosity: u8) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity)));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn default_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "heatrisk=warn",
        1 => "heatrisk=info",
        _ => "heatrisk=debug",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_maps_to_levels() {
        assert_eq!(default_directive(0), "heatrisk=warn");
        assert_eq!(default_directive(1), "heatrisk=info");
        assert_eq!(default_directive(5), "heatrisk=debug");
    }
}
