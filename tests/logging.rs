//! Global log subscriber installation, isolated in its own test binary

use scrypt_mining_client::config::{LogFormat, LogLevel};
use scrypt_mining_client::logging::init_logging;

#[test]
fn test_init_logging_only_once() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("init.log");

    let guard = init_logging(LogLevel::Info, LogFormat::Json, Some(&path)).unwrap();
    assert!(guard.is_some());
    tracing::info!("logging initialized");

    assert!(init_logging(LogLevel::Info, LogFormat::Plain, None).is_err());
    drop(guard);
    assert!(path.exists());
}
