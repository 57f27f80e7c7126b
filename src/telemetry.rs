use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Installs the global subscriber on stderr, keeping stdout for the processing log.
/// `RUST_LOG` overrides `level`; later calls are no-ops.
pub fn init_tracing(json: bool, level: Level) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    let (json_layer, text_layer) = if json {
        let layer = fmt::layer().with_target(false).with_writer(std::io::stderr);
        (Some(layer.json()), None)
    } else {
        let layer = fmt::layer().with_target(false).with_writer(std::io::stderr);
        (None, Some(layer))
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(text_layer)
        .try_init()
        .ok();
}
