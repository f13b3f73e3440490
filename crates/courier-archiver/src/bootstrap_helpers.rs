use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// `RUST_LOG` wins when set; otherwise everything at `default_level` and above is logged.
pub(crate) fn archiver_env_filter(default_level: LevelFilter) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy()
}

pub(crate) fn init_tracing(default_level: LevelFilter) {
    tracing_subscriber::fmt()
        .with_env_filter(archiver_env_filter(default_level))
        .with_target(false)
        .compact()
        .init();
}
