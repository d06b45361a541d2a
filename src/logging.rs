use std::sync::Once;

use tracing::Level;

static INIT_LOGGING: Once = Once::new();

/// Installs the global fmt subscriber. The first call wins; later calls
/// are no-ops. Records emitted through the `log` facade (the HTTP access
/// log among them) are forwarded to the same subscriber.
pub fn init(level: Level) {
    INIT_LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(level)
            .with_target(true)
            .try_init();
    });
}

/// Quiet variant for tests: captured output, no colors.
#[cfg(test)]
pub(crate) fn init_test_logging() {
    INIT_LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(Level::DEBUG)
            .with_test_writer()
            .with_ansi(false)
            .try_init();
    });
}

#[test]
fn test_init_is_idempotent() {
    init_test_logging();
    init(Level::TRACE);
    init_test_logging();
    tracing::debug!(pins = 3, "logging initialised");
}
