use time::{Duration, OffsetDateTime};

/// Timing rules for issuing passcodes.
#[derive(Clone, Copy, Debug)]
pub struct OtpPolicy {
    pub ttl: Duration,
    pub resend_cooldown: Duration,
}

impl OtpPolicy {
    pub fn expires_at(&self, now: OffsetDateTime) -> OffsetDateTime {
        now + self.ttl
    }

    /// The moment the outstanding code was issued, recovered from its expiry.
    pub fn issued_at(&self, expires_at: OffsetDateTime) -> OffsetDateTime {
        expires_at - self.ttl
    }

    pub fn cooldown_remaining(
        &self,
        expires_at: OffsetDateTime,
        now: OffsetDateTime,
    ) -> Option<Duration> {
        let elapsed = now - self.issued_at(expires_at);

        if elapsed < self.resend_cooldown {
            Some(self.resend_cooldown - elapsed)
        } else {
            None
        }
    }

    pub fn ttl_minutes(&self) -> i64 {
        self.ttl.whole_minutes()
    }
}

impl Default for OtpPolicy {
    fn default() -> Self {
        Self {
            ttl: Duration::minutes(10),
            resend_cooldown: Duration::seconds(30),
        }
    }
}
