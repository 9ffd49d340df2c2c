use tracing_core::Level;
use tracing_subscriber::{filter::Targets, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;

/// Install the global `tracing` subscriber.
///
/// Events are written to stderr so that formatted command output on stdout
/// stays machine-readable. `verbose` raises the configured level to `DEBUG`.
pub fn init(config: &Config, verbose: bool) {
    let fmt = fmt::format().with_target(false).compact();

    let level = if verbose {
        Level::DEBUG.into()
    } else {
        config.logging.level
    };

    let target_filters = Targets::new()
        .with_target("reqwest", Level::WARN)
        .with_target("rustls", Level::WARN)
        .with_default(level);

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).event_format(fmt))
        .with(target_filters)
        .init();
}
