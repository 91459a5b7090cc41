use crate::domain::{OtpCode, Subscriber, SubscriberEmail};
use anyhow::Context;
use secrecy::ExposeSecret;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

#[tracing::instrument(name = "Fetch subscriber by email", skip(db_pool))]
pub async fn get_subscriber_by_email(
    db_pool: &PgPool,
    email: &SubscriberEmail,
) -> Result<Option<Subscriber>, anyhow::Error> {
    sqlx::query_as::<_, Subscriber>(
        r#"
        SELECT id, email, otp_code, otp_expires_at, verified
        FROM subscribers
        WHERE email = $1
        "#,
    )
    .bind(email.as_ref())
    .fetch_optional(db_pool)
    .await
    .context("Failed to fetch subscriber by email")
}

/// Inserts a pending subscriber or replaces the outstanding code of an
/// unverified one. Returns `false` when the row is already verified.
#[tracing::instrument(name = "Store pending passcode", skip(db_pool, otp))]
pub async fn store_pending_otp(
    db_pool: &PgPool,
    email: &SubscriberEmail,
    otp: &OtpCode,
    expires_at: OffsetDateTime,
) -> Result<bool, anyhow::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO subscribers (id, email, otp_code, otp_expires_at)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (email) DO UPDATE
        SET otp_code = EXCLUDED.otp_code,
            otp_expires_at = EXCLUDED.otp_expires_at
        WHERE subscribers.verified = false
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(email.as_ref())
    .bind(otp.expose_secret())
    .bind(expires_at)
    .execute(db_pool)
    .await
    .context("Failed to store pending passcode")?;

    Ok(result.rows_affected() == 1)
}

/// Marks the subscriber as verified, provided `otp` is still the outstanding
/// code. Returns `false` when another request replaced or consumed it first.
#[tracing::instrument(name = "Mark subscriber as verified", skip(db_pool, otp))]
pub async fn mark_verified(
    db_pool: &PgPool,
    subscriber_id: Uuid,
    otp: &OtpCode,
) -> Result<bool, anyhow::Error> {
    let result = sqlx::query(
        r#"
        UPDATE subscribers
        SET verified = true, otp_code = NULL, otp_expires_at = NULL
        WHERE id = $1 AND verified = false AND otp_code = $2
        "#,
    )
    .bind(subscriber_id)
    .bind(otp.expose_secret())
    .execute(db_pool)
    .await
    .context("Failed to mark subscriber as verified")?;

    Ok(result.rows_affected() == 1)
}

#[tracing::instrument(name = "Count verified subscribers", skip(db_pool))]
pub async fn count_verified_subscribers(db_pool: &PgPool) -> Result<i64, anyhow::Error> {
    let (count,): (i64,) = sqlx::query_as(
        r#"
        SELECT COUNT(*)
        FROM subscribers
        WHERE verified = true
        "#,
    )
    .fetch_one(db_pool)
    .await
    .context("Failed to count verified subscribers")?;

    Ok(count)
}
