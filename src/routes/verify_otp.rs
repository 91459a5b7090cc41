use crate::{
    app_state::AppState,
    domain::{CodeCheck, OtpCode, SubscriberEmail, SubscriptionStatus},
    persistence::{get_subscriber_by_email, mark_verified},
    utils::Reply,
};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use time::OffsetDateTime;

pub fn router() -> Router<AppState> {
    Router::new().route("/verify-otp", post(verify_otp))
}

#[tracing::instrument(
    name = "Verify a one-time passcode",
    skip(app_state, body),
    fields(
        subscriber_email = tracing::field::Empty,
        subscriber_status = tracing::field::Empty
    )
)]
async fn verify_otp(
    State(app_state): State<AppState>,
    body: Result<Json<BodyData>, JsonRejection>,
) -> Result<Reply, VerifyOtpError> {
    let Json(body) = body.map_err(|e| VerifyOtpError::InvalidInput(e.body_text()))?;

    if body.email.trim().is_empty() || body.otp.trim().is_empty() {
        return Err(VerifyOtpError::InvalidInput(
            "Email and OTP are required".into(),
        ));
    }

    let otp = OtpCode::parse(body.otp).map_err(VerifyOtpError::InvalidOtp)?;
    let email = SubscriberEmail::parse(body.email).map_err(VerifyOtpError::InvalidInput)?;
    tracing::Span::current().record("subscriber_email", tracing::field::display(&email));

    let subscriber = get_subscriber_by_email(&app_state.db_pool, &email)
        .await?
        .ok_or(VerifyOtpError::NotFound)?;
    tracing::Span::current().record("subscriber_status", subscriber.status().as_ref());

    match subscriber.check_code(&otp, OffsetDateTime::now_utc()) {
        CodeCheck::AlreadyVerified => Ok(already_verified()),
        CodeCheck::Expired => Err(VerifyOtpError::Expired),
        CodeCheck::Mismatch => Err(VerifyOtpError::WrongOtp),
        CodeCheck::Accepted => {
            if mark_verified(&app_state.db_pool, subscriber.id, &otp).await? {
                return Ok(Reply::success("Verification successful!"));
            }

            // Lost a race with a resend or a parallel verification.
            match get_subscriber_by_email(&app_state.db_pool, &email).await? {
                Some(s) if s.status() == SubscriptionStatus::Verified => Ok(already_verified()),
                _ => Err(VerifyOtpError::WrongOtp),
            }
        }
    }
}

fn already_verified() -> Reply {
    Reply::notice("already_verified", "You're already subscribed!")
}

#[derive(Deserialize)]
struct BodyData {
    #[serde(default)]
    email: String,
    #[serde(default)]
    otp: String,
}

#[derive(Debug, thiserror::Error)]
enum VerifyOtpError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("{0}")]
    InvalidOtp(String),
    #[error("No subscription found for this email")]
    NotFound,
    #[error("Code has expired")]
    Expired,
    #[error("Incorrect code")]
    WrongOtp,
    #[error(transparent)]
    UnexpectedError(#[from] anyhow::Error),
}

impl VerifyOtpError {
    fn is_client_fault(&self) -> bool {
        !matches!(self, Self::UnexpectedError(_))
    }
}

impl IntoResponse for VerifyOtpError {
    fn into_response(self) -> Response {
        if self.is_client_fault() {
            tracing::warn!("{:#?}", self);
        } else {
            tracing::error!("{:#?}", self);
        }

        match self {
            Self::InvalidInput(_) => {
                Reply::failure("invalid_input", "Email and OTP are required.")
                    .with_status(StatusCode::BAD_REQUEST)
            }
            Self::InvalidOtp(_) => Reply::failure("invalid_otp", "OTP must be 6 digits.")
                .with_status(StatusCode::BAD_REQUEST),
            Self::NotFound => {
                Reply::failure("not_found", "No subscription found for this email.")
                    .with_status(StatusCode::NOT_FOUND)
            }
            Self::Expired => Reply::failure(
                "expired",
                "Code has expired. Please request a new one.",
            )
            .with_status(StatusCode::BAD_REQUEST),
            Self::WrongOtp => {
                Reply::failure("wrong_otp", "Incorrect code. Please try again.")
                    .with_status(StatusCode::UNAUTHORIZED)
            }
            Self::UnexpectedError(_) => {
                Reply::failure("server_error", "An internal server error occurred.")
                    .with_status(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }
}
