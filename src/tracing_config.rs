use tracing_appender::rolling;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing with file and console logging
///
/// - Console (stdout): `RUST_LOG` if set, otherwise INFO and above
/// - File: DEBUG and above, rotated daily under `./logs` (foodgram.log.YYYY-MM-DD)
///
/// The returned WorkerGuard owns the background file writer; keep it alive
/// for the whole program (`let _guard = init_tracing();`) so buffered lines
/// are flushed on shutdown.
pub fn init_tracing() -> tracing_appender::non_blocking::WorkerGuard {
    let file_appender = rolling::daily("./logs", "foodgram.log");
    let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking_file)
        .with_ansi(false)
        .with_filter(EnvFilter::new("debug,sqlx=info"));

    let console_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout)
        .with_ansi(false)
        .with_filter(console_filter);

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .init();

    tracing::info!("Tracing initialized (console=INFO+, file=DEBUG+)");

    guard
}
