use std::time::{Duration, Instant};

use chatorder_core::retry::AttemptFailure;
use chatorder_core::{parse_extraction, PayloadBuilder, RetryPolicy, TurnContext, WebhookRequest};
use chatorder_webhook::{DispatchError, OrderWebhook, WebhookDispatcher, WEBHOOK_SECRET_HEADER};
use chrono::{TimeZone, Utc};
use secrecy::SecretString;
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SECRET: &str = "test-shared-secret";

fn fast_policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        delays: vec![Duration::from_millis(10), Duration::from_millis(20)],
        attempt_timeout: Duration::from_millis(200),
        deadline: Duration::from_secs(5),
    }
}

fn dispatcher(server: &MockServer, policy: RetryPolicy) -> WebhookDispatcher {
    WebhookDispatcher::new(server.uri(), SecretString::from(SECRET), policy)
        .expect("client builds")
}

fn request(raw: &str) -> WebhookRequest {
    let extracted = parse_extraction(raw).expect("extraction parses");
    let timestamp = Utc.with_ymd_and_hms(2025, 8, 18, 9, 30, 0).single().expect("valid timestamp");
    PayloadBuilder::new("company-42")
        .build_from_extraction(extracted, &TurnContext::new("session-1"), timestamp)
        .expect("request builds")
}

fn create_request() -> WebhookRequest {
    request(r#"{"intent":"create_order","products":[{"name":"Latte","quantity":2}]}"#)
}

fn ok_body() -> serde_json::Value {
    json!({ "success": true, "message": "Order created", "data": { "orderCode": "ORD1" } })
}

#[tokio::test]
async fn every_operation_sends_the_exact_secret_header() {
    let server = MockServer::start().await;
    Mock::given(header(WEBHOOK_SECRET_HEADER, SECRET))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
        .expect(3)
        .mount(&server)
        .await;

    let dispatcher = dispatcher(&server, fast_policy(1));
    let requests = [
        create_request(),
        request(r#"{"intent":"update_order","orderCode":"ORD7","changes":{"notes":"gift wrap"}}"#),
        request(r#"{"intent":"check_quantity","products":[{"name":"Latte","quantity_needed":40}]}"#),
    ];
    for request in &requests {
        dispatcher.dispatch(request).await.expect("delivered");
    }

    let received = server.received_requests().await.expect("recording enabled");
    let routes: Vec<(String, String)> = received
        .iter()
        .map(|request| (request.method.to_string(), request.url.path().to_string()))
        .collect();
    assert_eq!(
        routes,
        vec![
            ("POST".to_string(), "/api/webhooks/orders/ai".to_string()),
            ("PUT".to_string(), "/api/webhooks/orders/ORD7/ai".to_string()),
            ("POST".to_string(), "/api/webhooks/orders/check-quantity/ai".to_string()),
        ]
    );
    for request in &received {
        assert!(request.headers.get("authorization").is_none());
        assert_eq!(
            request.headers.get("x-webhook-secret").and_then(|value| value.to_str().ok()),
            Some(SECRET)
        );
    }
}

#[tokio::test]
async fn retries_transient_statuses_until_success() {
    for status in [408u16, 500, 502, 503, 504] {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/webhooks/orders/ai"))
            .respond_with(ResponseTemplate::new(status))
            .up_to_n_times(2)
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/webhooks/orders/ai"))
            .respond_with(ResponseTemplate::new(201).set_body_json(ok_body()))
            .expect(1)
            .mount(&server)
            .await;

        let delivered = dispatcher(&server, fast_policy(4))
            .dispatch(&create_request())
            .await
            .unwrap_or_else(|error| panic!("status {status} should be retried: {error}"));

        assert_eq!(delivered.status, 201);
        assert_eq!(delivered.attempts, 3);
        assert!(delivered.response.success);
    }
}

#[tokio::test]
async fn gives_up_after_max_attempts() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let error = dispatcher(&server, fast_policy(3))
        .dispatch(&create_request())
        .await
        .expect_err("backend never recovers");

    assert!(matches!(
        error,
        DispatchError::Exhausted {
            attempts: 3,
            last_failure: AttemptFailure::Status { status: 503, .. }
        }
    ));
}

#[tokio::test]
async fn slow_backend_counts_as_timeout_and_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(ok_body()).set_delay(Duration::from_secs(2)))
        .expect(2)
        .mount(&server)
        .await;

    let error = dispatcher(&server, fast_policy(2))
        .dispatch(&create_request())
        .await
        .expect_err("every attempt times out");

    assert_eq!(
        error,
        DispatchError::Exhausted { attempts: 2, last_failure: AttemptFailure::Timeout }
    );
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    for status in [400u16, 401, 403, 404, 422] {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(status))
            .expect(1)
            .mount(&server)
            .await;

        let error = dispatcher(&server, fast_policy(4))
            .dispatch(&create_request())
            .await
            .expect_err("empty 4xx body is not a delivered response");

        assert_eq!(error.attempts(), 1, "status {status} must not be retried");
        server.verify().await;
    }
}

#[tokio::test]
async fn rejected_secret_is_a_configuration_alarm() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({ "success": false, "message": "Invalid webhook secret" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let error = dispatcher(&server, fast_policy(4))
        .dispatch(&create_request())
        .await
        .expect_err("401 is never a delivered response");

    assert_eq!(error, DispatchError::Authentication { status: 401, attempts: 1 });
    assert!(error.is_configuration_alarm());
}

#[tokio::test]
async fn unknown_order_is_delivered_as_business_failure() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/api/webhooks/orders/ORD404/ai"))
        .respond_with(
            ResponseTemplate::new(404)
                .set_body_json(json!({ "success": false, "message": "Order not found" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let delivered = dispatcher(&server, fast_policy(4))
        .dispatch(&request(
            r#"{"intent":"update_order","orderCode":"ORD404","changes":{"notes":"x"}}"#,
        ))
        .await
        .expect("business failure carries a webhook body");

    assert_eq!(delivered.status, 404);
    assert_eq!(delivered.attempts, 1);
    assert!(!delivered.response.success);
    assert_eq!(delivered.response.message, "Order not found");
}

#[tokio::test]
async fn unreachable_backend_is_retried_then_exhausted() {
    let dispatcher =
        WebhookDispatcher::new("http://127.0.0.1:1", SecretString::from(SECRET), fast_policy(3))
            .expect("client builds");

    let error = dispatcher.dispatch(&create_request()).await.expect_err("nothing listens");

    match error {
        DispatchError::Exhausted { attempts, last_failure } => {
            assert_eq!(attempts, 3);
            assert!(last_failure.is_retryable());
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn whole_call_stays_within_deadline() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(ok_body()).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let policy = RetryPolicy {
        max_attempts: 10,
        delays: vec![Duration::from_millis(50)],
        attempt_timeout: Duration::from_secs(1),
        deadline: Duration::from_millis(400),
    };
    let started = Instant::now();
    let error = dispatcher(&server, policy)
        .dispatch(&create_request())
        .await
        .expect_err("backend is slower than the deadline");

    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(matches!(
        error,
        DispatchError::DeadlineExceeded { deadline_ms: 400, .. } | DispatchError::Exhausted { .. }
    ));
    assert!(error.attempts() >= 1, "attempt count lost: {error:?}");
}

#[tokio::test]
async fn mixed_case_order_code_reaches_the_path_unchanged() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/api/webhooks/orders/ord-aB3x/ai"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
        .expect(1)
        .mount(&server)
        .await;

    let request =
        request(r#"{"intent":"update_order","orderCode":"ord-aB3x","changes":{"notes":"x"}}"#);
    assert_eq!(request.to_json().expect("serializes")["data"]["orderCode"], "ord-aB3x");

    dispatcher(&server, fast_policy(1)).dispatch(&request).await.expect("delivered");
}
