use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "tubedeck=info";

/// Installs the global fmt subscriber. `RUST_LOG` overrides the default
/// filter; set `RUST_LOG=tubedeck=debug` to see raw yt-dlp output.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into());
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
