#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SubscriptionStatus {
    Pending,
    Verified,
}

impl AsRef<str> for SubscriptionStatus {
    fn as_ref(&self) -> &'static str {
        match self {
            SubscriptionStatus::Pending => "pending",
            SubscriptionStatus::Verified => "verified",
        }
    }
}

impl From<bool> for SubscriptionStatus {
    fn from(verified: bool) -> Self {
        if verified {
            SubscriptionStatus::Verified
        } else {
            SubscriptionStatus::Pending
        }
    }
}
