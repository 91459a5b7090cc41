use crate::{
    app_state::AppState,
    domain::{IssueCheck, OtpCode, OtpPolicy, SubscriberEmail},
    email_client::EmailClient,
    persistence::{get_subscriber_by_email, store_pending_otp},
    utils::{wait_seconds, with_retry_after, Reply},
};
use anyhow::Context;
use askama::Template;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use secrecy::ExposeSecret;
use serde::Deserialize;
use time::{Duration, OffsetDateTime};

const EMAIL_SUBJECT: &str = "Your Tone2vibe Verification Code";

pub fn router() -> Router<AppState> {
    Router::new().route("/send-otp", post(send_otp))
}

#[tracing::instrument(
    name = "Issue a one-time passcode",
    skip(app_state, body),
    fields(subscriber_email = tracing::field::Empty)
)]
async fn send_otp(
    State(app_state): State<AppState>,
    body: Result<Json<BodyData>, JsonRejection>,
) -> Result<Reply, SendOtpError> {
    let Json(body) = body.map_err(|e| SendOtpError::InvalidInput(e.body_text()))?;
    let email = SubscriberEmail::parse(body.email).map_err(SendOtpError::InvalidEmail)?;
    tracing::Span::current().record("subscriber_email", tracing::field::display(&email));

    let now = OffsetDateTime::now_utc();
    let policy = app_state.otp_policy;

    if let Some(subscriber) = get_subscriber_by_email(&app_state.db_pool, &email).await? {
        match subscriber.issue_check(&policy, now) {
            IssueCheck::AlreadyVerified => return Ok(already_subscribed()),
            IssueCheck::CoolingDown(remaining) => {
                return Err(SendOtpError::RateLimited(remaining))
            }
            IssueCheck::Ready => {}
        }
    }

    let otp = OtpCode::generate();
    if !store_pending_otp(&app_state.db_pool, &email, &otp, policy.expires_at(now)).await? {
        return Ok(already_subscribed());
    }

    send_otp_email(&app_state.email_client, &email, &otp, &policy).await?;

    Ok(Reply::success("Verification code sent."))
}

fn already_subscribed() -> Reply {
    Reply::notice("already_subscribed", "This email is already subscribed.")
}

#[derive(Deserialize)]
struct BodyData {
    #[serde(default)]
    email: String,
}

#[tracing::instrument(name = "Send passcode email", skip(email_client, otp, policy))]
async fn send_otp_email(
    email_client: &EmailClient,
    email: &SubscriberEmail,
    otp: &OtpCode,
    policy: &OtpPolicy,
) -> Result<(), SendOtpError> {
    let html = OtpEmailHtml {
        code: otp.expose_secret(),
        ttl_minutes: policy.ttl_minutes(),
    }
    .render()
    .context("Failed to render html passcode email")?;

    let text = OtpEmailText {
        code: otp.expose_secret(),
        ttl_minutes: policy.ttl_minutes(),
    }
    .render()
    .context("Failed to render plain text passcode email")?;

    email_client
        .send_email(email, EMAIL_SUBJECT, &html, &text)
        .await
        .map_err(|e| {
            if e.is_timeout() {
                SendOtpError::EmailSendTimeout(e)
            } else {
                SendOtpError::EmailSendFailed(e)
            }
        })
}

#[derive(Template)]
#[template(path = "email/otp_code.html")]
struct OtpEmailHtml<'a> {
    code: &'a str,
    ttl_minutes: i64,
}

#[derive(Template)]
#[template(path = "email/otp_code.txt")]
struct OtpEmailText<'a> {
    code: &'a str,
    ttl_minutes: i64,
}

#[derive(Debug, thiserror::Error)]
enum SendOtpError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("{0}")]
    InvalidEmail(String),
    #[error("A passcode was issued too recently")]
    RateLimited(Duration),
    #[error("Failed to send passcode email")]
    EmailSendFailed(#[source] reqwest::Error),
    #[error("Timed out sending passcode email")]
    EmailSendTimeout(#[source] reqwest::Error),
    #[error(transparent)]
    UnexpectedError(#[from] anyhow::Error),
}

impl IntoResponse for SendOtpError {
    fn into_response(self) -> Response {
        match &self {
            Self::InvalidInput(_) | Self::InvalidEmail(_) | Self::RateLimited(_) => {
                tracing::warn!("{:#?}", self)
            }
            _ => tracing::error!("{:#?}", self),
        }

        match self {
            Self::InvalidInput(_) => Reply::failure("invalid_input", "Valid email is required")
                .with_status(StatusCode::BAD_REQUEST),
            Self::InvalidEmail(_) => Reply::failure("invalid_email", "Invalid email format")
                .with_status(StatusCode::BAD_REQUEST),
            Self::RateLimited(wait) => with_retry_after(
                Reply::failure(
                    "rate_limited",
                    format!(
                        "Please wait {} seconds before requesting again.",
                        wait_seconds(wait)
                    ),
                )
                .with_status(StatusCode::TOO_MANY_REQUESTS),
                wait,
            ),
            Self::EmailSendFailed(_) => Reply::failure("send_failed", "Failed to send email.")
                .with_status(StatusCode::BAD_GATEWAY),
            Self::EmailSendTimeout(_) => Reply::failure(
                "send_timeout",
                "Sending the email took too long. Please try again.",
            )
            .with_status(StatusCode::GATEWAY_TIMEOUT),
            Self::UnexpectedError(_) => Reply::failure("server_error", "Something went wrong.")
                .with_status(StatusCode::INTERNAL_SERVER_ERROR),
        }
    }
}
