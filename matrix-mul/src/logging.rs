//! Log setup shared by the binaries. Logs go to stderr so that stdout only carries
//! result records. `RUST_LOG` overrides the default level.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Installs the global subscriber. Calling it a second time has no effect.
///
/// * `verbose`: Use `debug` instead of `info` as the default level.
pub fn init(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_thread_names(true),
        )
        .try_init();
}
