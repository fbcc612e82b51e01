#![allow(dead_code)]

pub mod apps;

/// Route harness diagnostics to the test output.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("wiretest=trace")
        .with_test_writer()
        .try_init();
}
