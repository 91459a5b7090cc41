use crate::helpers::{json_body, otp_from_email, TestApp, EMAIL_TIMEOUT_MILLISECONDS};
use claims::{assert_none, assert_some};
use serde_json::json;
use std::time::Duration as StdDuration;
use time::{Duration, OffsetDateTime};
use wiremock::{
    matchers::{any, method, path},
    Mock, ResponseTemplate,
};

#[tokio::test]
async fn send_otp_returns_a_200_for_a_valid_email() {
    // given
    let app = TestApp::spawn().await;
    app.mock_email_delivery().await;

    // when
    let response = app
        .post_send_otp(&json!({ "email": "imie.nazwisko@example.com" }))
        .await;

    // then
    assert_eq!(response.status(), 200);
    let body = json_body(response).await;
    assert_eq!(body["success"], true);
    assert!(body.get("otp").is_none());
}

#[tokio::test]
async fn send_otp_persists_a_pending_subscriber() {
    // given
    let app = TestApp::spawn().await;
    app.mock_email_delivery().await;

    // when
    app.post_send_otp(&json!({ "email": "imie.nazwisko@example.com" }))
        .await;

    // then
    let saved = assert_some!(app.stored_subscriber("imie.nazwisko@example.com").await);
    let code = assert_some!(saved.otp_code);
    assert_eq!(code.len(), 6);
    assert!(code.chars().all(|c| c.is_ascii_digit()));
    assert!(!saved.verified);

    let expires_at = assert_some!(saved.otp_expires_at);
    let ttl = expires_at - OffsetDateTime::now_utc();
    assert!(ttl > Duration::minutes(9) && ttl <= Duration::minutes(10));
}

#[tokio::test]
async fn send_otp_normalizes_the_email() {
    // given
    let app = TestApp::spawn().await;
    app.mock_email_delivery().await;

    // when
    let response = app
        .post_send_otp(&json!({ "email": "  Imie.Nazwisko@Example.COM " }))
        .await;

    // then
    assert_eq!(response.status(), 200);
    assert_some!(app.stored_subscriber("imie.nazwisko@example.com").await);
    assert_eq!(app.subscriber_rows().await, 1);
}

#[tokio::test]
async fn send_otp_emails_the_stored_code() {
    // given
    let app = TestApp::spawn().await;

    Mock::given(path("/v3/smtp/email"))
        .and(method("POST"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&app.email_server)
        .await;

    // when
    app.post_send_otp(&json!({ "email": "imie.nazwisko@example.com" }))
        .await;

    // then
    let requests = app.email_server.received_requests().await.unwrap();
    let emailed = otp_from_email(&requests[0]);
    let saved = assert_some!(app.stored_subscriber("imie.nazwisko@example.com").await);
    assert_eq!(saved.otp_code.as_deref(), Some(emailed.as_str()));

    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["to"][0]["email"], "imie.nazwisko@example.com");
    assert_eq!(body["subject"], "Your Tone2vibe Verification Code");
}

#[tokio::test]
async fn send_otp_returns_a_400_for_invalid_emails() {
    // given
    let app = TestApp::spawn().await;
    let label = "b".repeat(60);
    let too_long = format!("{}@{label}.{label}.{label}.{}", "a".repeat(64), "c".repeat(7));
    let test_cases = vec![
        (json!({ "email": "" }), "empty email"),
        (json!({}), "missing email"),
        (json!({ "email": "definitely-not-an-email" }), "missing @"),
        (json!({ "email": "imie.nazwisko@" }), "missing domain"),
        (json!({ "email": "@example.com" }), "missing subject"),
        (json!({ "email": "imie@localhost" }), "missing top level domain"),
        (json!({ "email": too_long }), "longer than 254 characters"),
        (
            json!({ "email": format!("{}@example.com", "a".repeat(65)) }),
            "local part longer than 64 characters",
        ),
    ];

    Mock::given(any())
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&app.email_server)
        .await;

    for (body, description) in test_cases {
        // when
        let response = app.post_send_otp(&body).await;

        // then
        assert_eq!(
            response.status(),
            400,
            "The API did not return a 400 BAD_REQUEST when the payload had {description}"
        );
        assert_eq!(json_body(response).await["code"], "invalid_email");
    }
    assert_eq!(app.subscriber_rows().await, 0);
}

#[tokio::test]
async fn send_otp_returns_a_400_for_malformed_json() {
    // given
    let app = TestApp::spawn().await;

    // when
    let response = app.post_raw("/send-otp", "{ definitely not json").await;

    // then
    assert_eq!(response.status(), 400);
    let body = json_body(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "invalid_input");
}

#[tokio::test]
async fn send_otp_does_not_email_an_already_verified_subscriber() {
    // given
    let app = TestApp::spawn().await;
    app.insert_verified_subscriber("imie.nazwisko@example.com")
        .await;

    Mock::given(any())
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&app.email_server)
        .await;

    // when
    let response = app
        .post_send_otp(&json!({ "email": "imie.nazwisko@example.com" }))
        .await;

    // then
    assert_eq!(response.status(), 200);
    let body = json_body(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["code"], "already_subscribed");

    let saved = assert_some!(app.stored_subscriber("imie.nazwisko@example.com").await);
    assert!(saved.verified);
    assert_none!(saved.otp_code);
}

#[tokio::test]
async fn second_request_within_the_cooldown_is_rate_limited() {
    // given
    let app = TestApp::spawn().await;
    let body = json!({ "email": "imie.nazwisko@example.com" });

    Mock::given(path("/v3/smtp/email"))
        .and(method("POST"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&app.email_server)
        .await;

    app.post_send_otp(&body).await.error_for_status().unwrap();
    let first = app.stored_subscriber("imie.nazwisko@example.com").await;

    // when
    let response = app.post_send_otp(&body).await;

    // then
    assert_eq!(response.status(), 429);
    assert_some!(response.headers().get("retry-after"));
    assert_eq!(json_body(response).await["code"], "rate_limited");

    let second = app.stored_subscriber("imie.nazwisko@example.com").await;
    assert_eq!(
        first.and_then(|s| s.otp_code),
        second.and_then(|s| s.otp_code)
    );
}

#[tokio::test]
async fn request_after_the_cooldown_replaces_the_outstanding_code() {
    // given
    let app = TestApp::spawn().await;
    let email = "imie.nazwisko@example.com";
    let issued = OffsetDateTime::now_utc() - Duration::seconds(31);
    app.insert_pending_subscriber(email, "123456", issued + Duration::minutes(10))
        .await;

    Mock::given(path("/v3/smtp/email"))
        .and(method("POST"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&app.email_server)
        .await;

    // when
    let response = app.post_send_otp(&json!({ "email": email })).await;

    // then
    assert_eq!(response.status(), 200);
    let requests = app.email_server.received_requests().await.unwrap();
    let new_code = otp_from_email(&requests[0]);
    let saved = assert_some!(app.stored_subscriber(email).await);
    assert_eq!(saved.otp_code.as_deref(), Some(new_code.as_str()));
    assert!(assert_some!(saved.otp_expires_at) > issued + Duration::minutes(10));

    if new_code != "123456" {
        let response = app
            .post_verify_otp(&json!({ "email": email, "otp": "123456" }))
            .await;
        assert_eq!(json_body(response).await["code"], "wrong_otp");
    }
}

#[tokio::test]
async fn aged_code_no_longer_blocks_a_resend() {
    // given
    let app = TestApp::spawn().await;
    let email = "imie.nazwisko@example.com";
    app.issue_otp(email).await;
    app.age_outstanding_code(email, Duration::seconds(30)).await;

    // when
    let response = app.post_send_otp(&json!({ "email": email })).await;

    // then
    assert_eq!(response.status(), 200);
    assert_eq!(app.email_server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn send_otp_returns_a_502_if_the_email_provider_fails_and_keeps_the_code() {
    // given
    let app = TestApp::spawn().await;

    Mock::given(path("/v3/smtp/email"))
        .and(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&app.email_server)
        .await;

    // when
    let response = app
        .post_send_otp(&json!({ "email": "imie.nazwisko@example.com" }))
        .await;

    // then
    assert_eq!(response.status(), 502);
    let body = json_body(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "send_failed");

    let saved = assert_some!(app.stored_subscriber("imie.nazwisko@example.com").await);
    assert_some!(saved.otp_code);
}

#[tokio::test]
async fn send_otp_returns_a_504_if_the_email_provider_times_out() {
    // given
    let app = TestApp::spawn().await;
    let delay = StdDuration::from_millis(EMAIL_TIMEOUT_MILLISECONDS * 2);

    Mock::given(path("/v3/smtp/email"))
        .and(method("POST"))
        .respond_with(ResponseTemplate::new(201).set_delay(delay))
        .expect(1)
        .mount(&app.email_server)
        .await;

    // when
    let response = app
        .post_send_otp(&json!({ "email": "imie.nazwisko@example.com" }))
        .await;

    // then
    assert_eq!(response.status(), 504);
    assert_eq!(json_body(response).await["code"], "send_timeout");
}
