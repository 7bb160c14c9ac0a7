/// Entry point for the tracer discovery daemon.
///
/// Reads the configuration from the environment, sets up logging and hands over to
/// [`tracer_discovery::run`]. The log filter follows `RUST_LOG`, defaulting to `info`,
/// or `debug` if `TRACER_DEBUG` is set.
///
/// # Errors
///
/// Returns an error if the configuration is invalid or the daemon fails to start.
///
/// # Examples
///
/// ```bash
/// TRACER_PROCFS=/hostproc TRACER_CMDLINE_REGEX='curl|python' cargo run
/// ```
#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let config = tracer_discovery::config::Config::from_env()?;

    let default_filter = if config.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    tracer_discovery::run(config).await
}
