//! REST Client Integration Tests
//!
//! Exercises the rate-limited REST client against a scripted mock API.
//! Timing assertions use short windows, so these run in real time without
//! external services.
//!
//! Run with: cargo test -p integration-tests --test rest_tests

use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use integration_tests::{Scripted, TestApi};
use relay_core::error::GatewayError;

// ============================================================================
// Discovery Tests
// ============================================================================

#[tokio::test]
async fn test_gateway_discovery_carries_bot_auth() {
    let api = TestApi::start().await.expect("Failed to start api");
    *api.state.gateway_url.lock() = "wss://gateway.example".to_string();
    let (rest, _shutdown) = integration_tests::test_rest(&api.base_url()).unwrap();

    let info = rest.get_gateway_bot().await.unwrap();
    assert_eq!(info.url, "wss://gateway.example");
    assert_eq!(
        api.state.last_auth.lock().as_deref(),
        Some("Bot test-token")
    );
}

// ============================================================================
// Message Endpoint Tests
// ============================================================================

#[tokio::test]
async fn test_create_message_parses_response() {
    let api = TestApi::start().await.expect("Failed to start api");
    let (rest, _shutdown) = integration_tests::test_rest(&api.base_url()).unwrap();

    let message = rest
        .create_message("chan-1", r#"{"content":"hello"}"#)
        .await
        .unwrap();
    assert_eq!(message.channel_id, "chan-1");
    assert_eq!(message.content, "hello");

    let messages = api.state.messages.lock();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].1["content"], "hello");
}

#[tokio::test]
async fn test_delete_message_maps_missing_to_not_found() {
    let api = TestApi::start().await.expect("Failed to start api");
    let (rest, _shutdown) = integration_tests::test_rest(&api.base_url()).unwrap();

    rest.delete_message("chan-1", "existing").await.unwrap();

    let err = rest.delete_message("chan-1", "missing").await.unwrap_err();
    assert!(matches!(err, GatewayError::NotFound));
}

// ============================================================================
// Rate Limit Tests
// ============================================================================

#[tokio::test]
async fn test_route_bucket_blocks_until_reset() {
    let api = TestApi::start().await.expect("Failed to start api");
    let (rest, _shutdown) = integration_tests::test_rest(&api.base_url()).unwrap();
    api.script_create([
        Scripted::RateLimitHeaders {
            limit: 2,
            reset_after: 0.3,
        },
        Scripted::RateLimitHeaders {
            limit: 2,
            reset_after: 0.3,
        },
        Scripted::RateLimitHeaders {
            limit: 2,
            reset_after: 0.3,
        },
        Scripted::RateLimitHeaders {
            limit: 2,
            reset_after: 0.3,
        },
    ]);

    // The first call rides the route's initial token
    rest.create_message("chan", r#"{"content":"1"}"#).await.unwrap();

    // The second waits for the refill announced by the first response
    let start = Instant::now();
    rest.create_message("chan", r#"{"content":"2"}"#).await.unwrap();
    assert!(start.elapsed() >= Duration::from_millis(250));

    // The third takes the refilled window's second token without waiting
    let start = Instant::now();
    rest.create_message("chan", r#"{"content":"3"}"#).await.unwrap();
    assert!(start.elapsed() < Duration::from_millis(200));

    // The window is spent again; the fourth waits for the next reset
    let start = Instant::now();
    rest.create_message("chan", r#"{"content":"4"}"#).await.unwrap();
    assert!(start.elapsed() >= Duration::from_millis(250));
}

#[tokio::test]
async fn test_local_429_is_retried_after_reset() {
    let api = TestApi::start().await.expect("Failed to start api");
    let (rest, _shutdown) = integration_tests::test_rest(&api.base_url()).unwrap();
    api.script_create([Scripted::TooManyRequests {
        retry_after: 0.2,
        global: false,
    }]);

    let start = Instant::now();
    rest.create_message("chan", r#"{"content":"x"}"#).await.unwrap();
    assert!(start.elapsed() >= Duration::from_millis(200));
    assert_eq!(api.state.create_attempts.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_global_429_freezes_every_route() {
    let api = TestApi::start().await.expect("Failed to start api");
    let (rest, _shutdown) = integration_tests::test_rest(&api.base_url()).unwrap();
    api.script_create([Scripted::TooManyRequests {
        retry_after: 0.5,
        global: true,
    }]);

    // Retry-After plus the client's one second safety margin
    let start = Instant::now();
    rest.create_message("chan", r#"{"content":"x"}"#).await.unwrap();
    assert!(start.elapsed() >= Duration::from_millis(1400));

    // The deadline has passed; other routes move freely again
    let start = Instant::now();
    rest.get_gateway_bot().await.unwrap();
    assert!(start.elapsed() < Duration::from_millis(500));
}

// ============================================================================
// Retry Budget Tests
// ============================================================================

#[tokio::test]
async fn test_persistent_429_reports_rate_limited() {
    let api = TestApi::start().await.expect("Failed to start api");
    let (rest, _shutdown) = integration_tests::test_rest(&api.base_url()).unwrap();
    api.script_create(vec![
        Scripted::TooManyRequests {
            retry_after: 0.1,
            global: false,
        };
        4
    ]);

    let err = rest
        .create_message("chan", r#"{"content":"x"}"#)
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::RateLimited { .. }));
    assert_eq!(api.state.create_attempts.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_server_errors_exhaust_the_retry_budget() {
    let api = TestApi::start().await.expect("Failed to start api");
    let (rest, _shutdown) = integration_tests::test_rest(&api.base_url()).unwrap();
    api.script_create(vec![Scripted::ServerError; 4]);

    let err = rest
        .create_message("chan", r#"{"content":"x"}"#)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        GatewayError::MaxRetriesExceeded { attempts: 4, .. }
    ));
    assert_eq!(api.state.create_attempts.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_create_message_404_maps_to_not_found() {
    let api = TestApi::start().await.expect("Failed to start api");
    let (rest, _shutdown) = integration_tests::test_rest(&api.base_url()).unwrap();
    api.script_create([Scripted::NotFound]);

    let err = rest
        .create_message("chan", r#"{"content":"x"}"#)
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::NotFound));
}
