mod otp_code;
mod otp_policy;
mod subscriber;
mod subscriber_email;
mod subscription_status;

pub use otp_code::OtpCode;
pub use otp_policy::OtpPolicy;
pub use subscriber::{CodeCheck, IssueCheck, Subscriber};
pub use subscriber_email::SubscriberEmail;
pub use subscription_status::SubscriptionStatus;
