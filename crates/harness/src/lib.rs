mod bridge;
mod desk;
mod fakes;

pub use bridge::LocalBridge;
pub use desk::{EPOCH, TestDesk};
pub use fakes::{FakeContainer, ManualClock};

/// Installs a test-friendly tracing subscriber. Safe to call from every test;
/// only the first call wins. Filter with `RUST_LOG`.
pub fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt};

    let _ = fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}
