//! Integration tests for connection timeout and failure handling.
//! These run without a database.

use orathin::{AuthParams, ConnectParams, Connection, Error};
use std::time::{Duration, Instant};

#[tokio::test]
async fn test_connection_timeout_unreachable_host() {
    // 192.0.2.1 is a TEST-NET address that should be unreachable (RFC 5737)
    let params =
        ConnectParams::new("192.0.2.1", 1521, "ORCL").with_connect_timeout(Duration::from_secs(2));

    let start = Instant::now();
    let result = Connection::connect_with_params(&params, AuthParams::new("user", "pass")).await;
    let elapsed = start.elapsed();

    assert!(matches!(result, Err(Error::ConnectionTimeout { .. })));
    assert!(
        elapsed < Duration::from_secs(5),
        "Timeout took too long: {:?}",
        elapsed
    );

    if let Err(Error::ConnectionTimeout {
        host,
        port,
        timeout,
    }) = result
    {
        assert_eq!(host, "192.0.2.1");
        assert_eq!(port, 1521);
        assert_eq!(timeout, Duration::from_secs(2));
    }
}

#[tokio::test]
async fn test_dns_resolution_failure() {
    let params = ConnectParams::new(
        "this-hostname-definitely-does-not-exist-12345.invalid",
        1521,
        "ORCL",
    );

    let result = Connection::connect_with_params(&params, AuthParams::new("user", "pass")).await;
    assert!(matches!(result, Err(Error::Io(_))));
}

#[tokio::test]
async fn test_retries_are_attempted() {
    let params = ConnectParams::new("192.0.2.1", 1521, "ORCL")
        .with_connect_timeout(Duration::from_millis(300))
        .with_retries(2, Duration::from_millis(50));

    let start = Instant::now();
    let result = Connection::connect_with_params(&params, AuthParams::new("user", "pass")).await;
    let elapsed = start.elapsed();

    assert!(result.is_err());
    // At minimum the two retry delays passed
    assert!(
        elapsed >= Duration::from_millis(100),
        "Retries finished too quickly: {:?}",
        elapsed
    );
}

#[tokio::test]
async fn test_default_timeout_is_10_seconds() {
    let params = ConnectParams::new("localhost", 1521, "ORCL");
    assert_eq!(params.connect_timeout, Duration::from_secs(10));
}

#[tokio::test]
async fn test_custom_timeout_via_builder() {
    let params =
        ConnectParams::new("localhost", 1521, "ORCL").with_connect_timeout(Duration::from_secs(10));
    assert_eq!(params.connect_timeout, Duration::from_secs(10));
}
