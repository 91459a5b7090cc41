use super::{OtpCode, OtpPolicy, SubscriberEmail, SubscriptionStatus};
use sqlx::FromRow;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

#[derive(Debug, FromRow)]
pub struct Subscriber {
    pub id: Uuid,
    pub email: SubscriberEmail,
    pub otp_code: Option<OtpCode>,
    pub otp_expires_at: Option<OffsetDateTime>,
    pub verified: bool,
}

#[derive(Debug, PartialEq)]
pub enum IssueCheck {
    AlreadyVerified,
    CoolingDown(Duration),
    Ready,
}

#[derive(Debug, PartialEq)]
pub enum CodeCheck {
    AlreadyVerified,
    Expired,
    Mismatch,
    Accepted,
}

impl Subscriber {
    pub fn status(&self) -> SubscriptionStatus {
        self.verified.into()
    }

    pub fn issue_check(&self, policy: &OtpPolicy, now: OffsetDateTime) -> IssueCheck {
        if self.status() == SubscriptionStatus::Verified {
            return IssueCheck::AlreadyVerified;
        }

        match self
            .otp_expires_at
            .and_then(|expires_at| policy.cooldown_remaining(expires_at, now))
        {
            Some(remaining) => IssueCheck::CoolingDown(remaining),
            None => IssueCheck::Ready,
        }
    }

    /// A code is valid strictly before `otp_expires_at`.
    pub fn check_code(&self, candidate: &OtpCode, now: OffsetDateTime) -> CodeCheck {
        if self.status() == SubscriptionStatus::Verified {
            return CodeCheck::AlreadyVerified;
        }

        match (&self.otp_code, self.otp_expires_at) {
            (_, None) => CodeCheck::Expired,
            (_, Some(expires_at)) if now >= expires_at => CodeCheck::Expired,
            (Some(stored), Some(_)) if stored.matches(candidate) => CodeCheck::Accepted,
            _ => CodeCheck::Mismatch,
        }
    }
}
